/// Patient lifecycle bookkeeping.
///
/// Maps each patient to their current status and the time of the last
/// transition. Patients that reached a terminal status stay on record so
/// late or repeated calls are rejected instead of silently recreated.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::models::{PatientId, PatientStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: PatientStatus,
    pub changed_at: DateTime<Utc>,
    /// When the patient entered consultation, if they did.
    pub consultation_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    records: HashMap<PatientId, StatusRecord>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly arrived patient.
    pub fn record_arrival(&mut self, patient_id: PatientId, at: DateTime<Utc>) -> Result<()> {
        if self.records.contains_key(&patient_id) {
            warn!(patient = %patient_id, "Arrival for a patient already on record");
            return Err(QueueError::InvalidPatient(format!(
                "Patient {} is already on record",
                patient_id
            )));
        }
        self.records.insert(
            patient_id,
            StatusRecord {
                status: PatientStatus::Arrived,
                changed_at: at,
                consultation_started_at: None,
            },
        );
        Ok(())
    }

    /// Move a patient to a new status, returning the previous one.
    pub fn set_status(
        &mut self,
        patient_id: &PatientId,
        new_status: PatientStatus,
        at: DateTime<Utc>,
    ) -> Result<PatientStatus> {
        let record = self
            .records
            .get_mut(patient_id)
            .ok_or_else(|| QueueError::PatientNotFound(patient_id.clone()))?;

        let current = record.status;
        if !current.can_transition_to(new_status) {
            warn!(patient = %patient_id, from = %current, to = %new_status, "Rejected status transition");
            return Err(QueueError::InvalidTransition {
                patient: patient_id.clone(),
                from: current,
                to: new_status,
            });
        }

        record.status = new_status;
        record.changed_at = at;
        if new_status == PatientStatus::InConsultation {
            record.consultation_started_at = Some(at);
        }
        debug!(patient = %patient_id, from = %current, to = %new_status, "Status changed");
        Ok(current)
    }

    /// Check that a transition would be accepted without applying it.
    pub fn check_transition(&self, patient_id: &PatientId, new_status: PatientStatus) -> Result<PatientStatus> {
        let current = self.get_status(patient_id)?;
        if !current.can_transition_to(new_status) {
            return Err(QueueError::InvalidTransition {
                patient: patient_id.clone(),
                from: current,
                to: new_status,
            });
        }
        Ok(current)
    }

    pub fn get_status(&self, patient_id: &PatientId) -> Result<PatientStatus> {
        self.records
            .get(patient_id)
            .map(|r| r.status)
            .ok_or_else(|| QueueError::PatientNotFound(patient_id.clone()))
    }

    pub fn get_record(&self, patient_id: &PatientId) -> Option<&StatusRecord> {
        self.records.get(patient_id)
    }

    /// Forget a patient that never made it past arrival.
    pub(crate) fn discard_arrival(&mut self, patient_id: &PatientId) {
        if let Some(record) = self.records.get(patient_id) {
            if record.status == PatientStatus::Arrived {
                self.records.remove(patient_id);
            }
        }
    }

    /// Drop terminal records whose last transition happened before `cutoff`.
    /// Active patients are never touched.
    pub fn purge_terminal_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| !(r.status.is_terminal() && r.changed_at < cutoff));
        let purged = before - self.records.len();
        if purged > 0 {
            debug!(purged, "Purged terminal status records");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let mut tracker = StatusTracker::new();
        let id = PatientId::from("P1");
        tracker.record_arrival(id.clone(), t0()).unwrap();
        assert_eq!(tracker.get_status(&id).unwrap(), PatientStatus::Arrived);

        tracker.set_status(&id, PatientStatus::Waiting, t0()).unwrap();
        let start = t0() + Duration::minutes(30);
        tracker.set_status(&id, PatientStatus::InConsultation, start).unwrap();
        let prev = tracker
            .set_status(&id, PatientStatus::Consulted, start + Duration::minutes(12))
            .unwrap();
        assert_eq!(prev, PatientStatus::InConsultation);

        let record = tracker.get_record(&id).unwrap();
        assert_eq!(record.status, PatientStatus::Consulted);
        assert_eq!(record.consultation_started_at, Some(start));
        assert_eq!(record.changed_at, start + Duration::minutes(12));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut tracker = StatusTracker::new();
        let id = PatientId::from("P1");
        tracker.record_arrival(id.clone(), t0()).unwrap();
        tracker.set_status(&id, PatientStatus::Waiting, t0()).unwrap();
        tracker.set_status(&id, PatientStatus::NoShow, t0()).unwrap();

        for next in [
            PatientStatus::Waiting,
            PatientStatus::InConsultation,
            PatientStatus::Consulted,
            PatientStatus::NoShow,
        ] {
            let err = tracker.set_status(&id, next, t0()).unwrap_err();
            assert!(matches!(err, QueueError::InvalidTransition { .. }));
        }
        assert_eq!(tracker.get_status(&id).unwrap(), PatientStatus::NoShow);
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut tracker = StatusTracker::new();
        let id = PatientId::from("P1");
        tracker.record_arrival(id.clone(), t0()).unwrap();
        tracker.set_status(&id, PatientStatus::Waiting, t0()).unwrap();
        tracker.set_status(&id, PatientStatus::InConsultation, t0()).unwrap();
        assert!(tracker.set_status(&id, PatientStatus::Waiting, t0()).is_err());
        assert!(tracker.check_transition(&id, PatientStatus::Consulted).is_ok());
    }

    #[test]
    fn test_unknown_patient() {
        let mut tracker = StatusTracker::new();
        let id = PatientId::from("ghost");
        assert!(matches!(
            tracker.get_status(&id),
            Err(QueueError::PatientNotFound(_))
        ));
        assert!(matches!(
            tracker.set_status(&id, PatientStatus::Waiting, t0()),
            Err(QueueError::PatientNotFound(_))
        ));
    }

    #[test]
    fn test_purge_drops_only_old_terminal_records() {
        let mut tracker = StatusTracker::new();
        let done = PatientId::from("P1");
        let waiting = PatientId::from("P2");
        let recent = PatientId::from("P3");
        for id in [&done, &waiting, &recent] {
            tracker.record_arrival(id.clone(), t0()).unwrap();
            tracker.set_status(id, PatientStatus::Waiting, t0()).unwrap();
        }
        tracker.set_status(&done, PatientStatus::NoShow, t0()).unwrap();
        tracker
            .set_status(&recent, PatientStatus::NoShow, t0() + Duration::hours(2))
            .unwrap();

        assert_eq!(tracker.purge_terminal_before(t0() + Duration::hours(1)), 1);
        assert!(matches!(
            tracker.get_status(&done),
            Err(QueueError::PatientNotFound(_))
        ));
        assert_eq!(tracker.get_status(&waiting).unwrap(), PatientStatus::Waiting);
        assert_eq!(tracker.get_status(&recent).unwrap(), PatientStatus::NoShow);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_duplicate_arrival_rejected() {
        let mut tracker = StatusTracker::new();
        tracker.record_arrival(PatientId::from("P1"), t0()).unwrap();
        assert!(tracker.record_arrival(PatientId::from("P1"), t0()).is_err());
        assert_eq!(tracker.len(), 1);
    }
}
