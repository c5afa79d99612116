/// Per-doctor waiting line.
///
/// This module provides the DoctorQueue struct which keeps a doctor's
/// availability windows and the patients waiting for that doctor, ordered
/// by priority.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{QueueError, Result};
use crate::models::{AvailabilityWindow, DoctorId, Patient, PatientId};
use crate::priority::PriorityKey;

#[derive(Debug, Clone)]
pub struct DoctorQueue {
    doctor_id: DoctorId,
    windows: Vec<AvailabilityWindow>,
    entries: BTreeMap<PriorityKey, Patient>,
    keys: HashMap<PatientId, PriorityKey>,
}

/// Sort windows by start hour and reject overlaps.
pub fn validate_windows(mut windows: Vec<AvailabilityWindow>) -> Result<Vec<AvailabilityWindow>> {
    windows.sort();
    for pair in windows.windows(2) {
        if pair[0].overlaps_with(&pair[1]) {
            return Err(QueueError::InvalidConfig(format!(
                "Availability windows overlap: {}-{} and {}-{}",
                pair[0].start_hour, pair[0].end_hour, pair[1].start_hour, pair[1].end_hour
            )));
        }
    }
    Ok(windows)
}

impl DoctorQueue {
    /// Initialize an empty queue for a doctor.
    pub fn new(doctor_id: DoctorId, windows: Vec<AvailabilityWindow>) -> Result<Self> {
        let windows = validate_windows(windows)?;
        Ok(DoctorQueue {
            doctor_id,
            windows,
            entries: BTreeMap::new(),
            keys: HashMap::new(),
        })
    }

    pub fn doctor_id(&self) -> &DoctorId {
        &self.doctor_id
    }

    /// Availability windows sorted by start hour.
    pub fn windows(&self) -> &[AvailabilityWindow] {
        &self.windows
    }

    /// Insert a patient in O(log n).
    pub fn insert(&mut self, patient: Patient) -> Result<()> {
        if self.keys.contains_key(&patient.patient_id) {
            return Err(QueueError::InvalidPatient(format!(
                "Patient {} is already queued for doctor {}",
                patient.patient_id, self.doctor_id
            )));
        }

        let key = PriorityKey::for_patient(&patient);
        self.keys.insert(patient.patient_id.clone(), key.clone());
        self.entries.insert(key, patient);
        Ok(())
    }

    /// 0-based position of a queued patient in pop order.
    ///
    /// Walks the entries ahead of the patient, so this is O(n); callers use it
    /// for reporting, never on the insert/pop path.
    pub fn position_of(&self, patient_id: &PatientId) -> Option<usize> {
        let key = self.keys.get(patient_id)?;
        Some(self.entries.range(..key).count())
    }

    /// Remove and return the highest-priority patient.
    pub fn pop_next(&mut self) -> Option<Patient> {
        let (key, patient) = self.entries.pop_first()?;
        self.keys.remove(&key.patient_id);
        Some(patient)
    }

    pub fn peek_next(&self) -> Option<&Patient> {
        self.entries.values().next()
    }

    /// Remove a specific patient from anywhere in the queue.
    pub fn remove(&mut self, patient_id: &PatientId) -> Option<Patient> {
        let key = self.keys.remove(patient_id)?;
        self.entries.remove(&key)
    }

    pub fn contains(&self, patient_id: &PatientId) -> bool {
        self.keys.contains_key(patient_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Patients in the order they will be seen.
    pub fn iter(&self) -> impl Iterator<Item = &Patient> {
        self.entries.values()
    }

    /// Check whether the doctor sees patients at the given hour of the day.
    pub fn is_within_availability(&self, at_hour: u32) -> bool {
        self.windows.iter().any(|w| w.contains(at_hour))
    }

    /// Recompute every waiting patient's score against `now` and rebuild the
    /// order. Returns how many scores changed.
    pub fn reprioritize(&mut self, now: DateTime<Utc>) -> usize {
        let patients: Vec<Patient> = std::mem::take(&mut self.entries).into_values().collect();
        self.keys.clear();

        let mut changed = 0;
        for mut patient in patients {
            if patient.recompute_priority(now) {
                changed += 1;
            }
            let key = PriorityKey::for_patient(&patient);
            self.keys.insert(patient.patient_id.clone(), key.clone());
            self.entries.insert(key, patient);
        }

        debug!(doctor = %self.doctor_id, changed, "Reprioritized queue");
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceChannel, Urgency};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn patient(id: &str, urgency: u8, scheduled_offset: Option<i64>, source: SourceChannel) -> Patient {
        Patient::new(
            PatientId::from(id),
            t0(),
            scheduled_offset.map(|m| t0() + Duration::minutes(m)),
            Urgency::new(urgency).unwrap(),
            source,
        )
    }

    fn clinic_queue() -> DoctorQueue {
        DoctorQueue::new(
            DoctorId::from("D1"),
            vec![
                AvailabilityWindow::new(15, 18).unwrap(),
                AvailabilityWindow::new(9, 12).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_windows_sorted_and_checked() {
        let queue = clinic_queue();
        assert_eq!(queue.windows()[0].start_hour, 9);
        assert!(queue.is_within_availability(10));
        assert!(queue.is_within_availability(15));
        assert!(!queue.is_within_availability(13));
        assert!(!queue.is_within_availability(18));
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let result = DoctorQueue::new(
            DoctorId::from("D1"),
            vec![
                AvailabilityWindow::new(9, 12).unwrap(),
                AvailabilityWindow::new(11, 14).unwrap(),
            ],
        );
        assert!(matches!(result, Err(QueueError::InvalidConfig(_))));
    }

    #[test]
    fn test_pop_order_follows_score() {
        let mut queue = clinic_queue();
        queue.insert(patient("P1", 2, Some(15), SourceChannel::App)).unwrap();
        queue.insert(patient("P2", 3, Some(10), SourceChannel::WalkIn)).unwrap();
        queue.insert(patient("P3", 5, Some(-5), SourceChannel::WhatsApp)).unwrap();

        assert_eq!(queue.peek_next().unwrap().patient_id.as_str(), "P3");
        let order: Vec<String> = std::iter::from_fn(|| queue.pop_next())
            .map(|p| p.patient_id.to_string())
            .collect();
        assert_eq!(order, vec!["P3", "P2", "P1"]);
        assert!(queue.pop_next().is_none());
        assert!(queue.peek_next().is_none());
    }

    #[test]
    fn test_position_of_follows_pop_order() {
        let mut queue = clinic_queue();
        queue.insert(patient("P1", 2, Some(15), SourceChannel::App)).unwrap();
        assert_eq!(queue.position_of(&PatientId::from("P1")), Some(0));
        queue.insert(patient("P2", 3, Some(10), SourceChannel::WalkIn)).unwrap();
        assert_eq!(queue.position_of(&PatientId::from("P2")), Some(0));
        assert_eq!(queue.position_of(&PatientId::from("P1")), Some(1));
        queue.insert(patient("P4", 1, None, SourceChannel::WalkIn)).unwrap();
        assert_eq!(queue.position_of(&PatientId::from("P4")), Some(2));
        assert_eq!(queue.position_of(&PatientId::from("P9")), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut queue = clinic_queue();
        queue.insert(patient("P1", 2, None, SourceChannel::App)).unwrap();
        let err = queue.insert(patient("P1", 4, None, SourceChannel::App)).unwrap_err();
        assert!(matches!(err, QueueError::InvalidPatient(_)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_from_middle() {
        let mut queue = clinic_queue();
        queue.insert(patient("P1", 1, None, SourceChannel::App)).unwrap();
        queue.insert(patient("P2", 2, None, SourceChannel::App)).unwrap();
        queue.insert(patient("P3", 3, None, SourceChannel::App)).unwrap();

        let removed = queue.remove(&PatientId::from("P2")).unwrap();
        assert_eq!(removed.patient_id.as_str(), "P2");
        assert!(!queue.contains(&PatientId::from("P2")));
        assert!(queue.remove(&PatientId::from("P2")).is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_order_stable_without_reprioritize() {
        let mut queue = clinic_queue();
        queue.insert(patient("P1", 2, Some(-20), SourceChannel::App)).unwrap();
        queue.insert(patient("P2", 3, Some(0), SourceChannel::WalkIn)).unwrap();

        let before: Vec<i64> = queue.iter().map(|p| p.priority_score).collect();
        let again: Vec<i64> = queue.iter().map(|p| p.priority_score).collect();
        assert_eq!(before, again);
    }

    #[test]
    fn test_reprioritize_ages_late_patients() {
        let mut queue = clinic_queue();
        // P1: urgency 2, app, scheduled at t0 -> -25
        // P2: urgency 3, walk-in, no appointment -> -30
        queue.insert(patient("P1", 2, Some(0), SourceChannel::App)).unwrap();
        queue.insert(patient("P2", 3, None, SourceChannel::WalkIn)).unwrap();
        assert_eq!(queue.peek_next().unwrap().patient_id.as_str(), "P2");

        // Twenty minutes on, P1 has waited past the slot: -(20 - 20 + 5) = -5
        let changed = queue.reprioritize(t0() + Duration::minutes(20));
        assert_eq!(changed, 1);
        assert_eq!(queue.peek_next().unwrap().patient_id.as_str(), "P2");
        let p1 = queue.iter().find(|p| p.patient_id.as_str() == "P1").unwrap();
        assert_eq!(p1.priority_score, -5);
        assert_eq!(queue.len(), 2);
    }
}
