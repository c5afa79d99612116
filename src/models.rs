/// Data models for the queue scheduling system.
///
/// This module defines the core data structures used throughout the system:
/// - DoctorId / PatientId: stable identifiers
/// - Urgency: bounded clinical severity score
/// - SourceChannel: booking channel a patient arrived through
/// - PatientStatus: lifecycle state of a patient
/// - AvailabilityWindow: hour range during which a doctor sees patients
/// - Patient: a patient waiting for (or in) consultation
/// - ArrivalEvent: normalized arrival produced by channel adapters

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{QueueError, Result};
use crate::priority::compute_priority;

/// Identifier of a doctor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DoctorId(String);

impl DoctorId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(QueueError::InvalidConfig(
                "Doctor ID cannot be empty".to_string(),
            ));
        }
        Ok(DoctorId(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoctorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DoctorId {
    fn from(value: &str) -> Self {
        DoctorId(value.to_string())
    }
}

/// Identifier of a patient. Unique and immutable for the patient's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatientId(String);

impl PatientId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(QueueError::InvalidPatient(
                "Patient ID cannot be empty".to_string(),
            ));
        }
        Ok(PatientId(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatientId {
    fn from(value: &str) -> Self {
        PatientId(value.to_string())
    }
}

/// Clinical severity score. Higher values are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Urgency(u8);

impl Urgency {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(QueueError::InvalidPatient(format!(
                "Urgency {} out of range {}..={}",
                value,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Urgency(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Channel through which a patient booked or arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceChannel {
    Ivr,
    App,
    WhatsApp,
    WalkIn,
}

impl SourceChannel {
    /// Convert a string to a SourceChannel value.
    pub fn from_string(value: &str) -> Result<Self> {
        match value.to_lowercase().trim() {
            "ivr" => Ok(SourceChannel::Ivr),
            "app" => Ok(SourceChannel::App),
            "whatsapp" => Ok(SourceChannel::WhatsApp),
            "walk-in" | "walkin" | "walk_in" => Ok(SourceChannel::WalkIn),
            _ => Err(QueueError::InvalidPatient(format!(
                "Invalid source: '{}'. Must be one of: ivr, app, whatsapp, walk-in",
                value
            ))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceChannel::Ivr => "IVR",
            SourceChannel::App => "App",
            SourceChannel::WhatsApp => "WhatsApp",
            SourceChannel::WalkIn => "Walk-in",
        }
    }

    /// Every channel except walk-in carries a prior booking.
    pub fn is_pre_booked(&self) -> bool {
        !matches!(self, SourceChannel::WalkIn)
    }
}

/// Lifecycle state of a patient.
///
/// States only move forward: Arrived -> Waiting -> InConsultation ->
/// {Consulted, NoShow}. Consulted and NoShow are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatientStatus {
    Arrived,
    Waiting,
    InConsultation,
    Consulted,
    NoShow,
}

impl PatientStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PatientStatus::Consulted | PatientStatus::NoShow)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: PatientStatus) -> bool {
        use PatientStatus::*;
        matches!(
            (self, next),
            (Arrived, Waiting)
                | (Waiting, InConsultation)
                | (Waiting, NoShow)
                | (InConsultation, Consulted)
                | (InConsultation, NoShow)
        )
    }

    pub fn name(&self) -> &str {
        match self {
            PatientStatus::Arrived => "ARRIVED",
            PatientStatus::Waiting => "WAITING",
            PatientStatus::InConsultation => "IN_CONSULTATION",
            PatientStatus::Consulted => "CONSULTED",
            PatientStatus::NoShow => "NO_SHOW",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal outcome reported for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Consulted,
    NoShow,
}

impl TerminalOutcome {
    pub fn status(&self) -> PatientStatus {
        match self {
            TerminalOutcome::Consulted => PatientStatus::Consulted,
            TerminalOutcome::NoShow => PatientStatus::NoShow,
        }
    }
}

/// Hour range `[start_hour, end_hour)` during which a doctor sees patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AvailabilityWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl AvailabilityWindow {
    /// Create a new availability window with validation.
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self> {
        if end_hour > 24 {
            return Err(QueueError::InvalidConfig(format!(
                "End hour {} is past the end of the day",
                end_hour
            )));
        }
        if start_hour >= end_hour {
            return Err(QueueError::InvalidConfig(format!(
                "Window start {} must be before end {}",
                start_hour, end_hour
            )));
        }
        Ok(AvailabilityWindow {
            start_hour,
            end_hour,
        })
    }

    /// Check if an hour of the day falls within this window.
    pub fn contains(&self, hour: u32) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }

    /// Check if this window overlaps with another.
    pub fn overlaps_with(&self, other: &AvailabilityWindow) -> bool {
        self.start_hour < other.end_hour && self.end_hour > other.start_hour
    }
}

/// A patient in the scheduling system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patient {
    pub patient_id: PatientId,
    pub arrival_time: DateTime<Utc>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub urgency: Urgency,
    pub source: SourceChannel,
    pub priority_score: i64,
    pub status: PatientStatus,
}

impl Patient {
    /// Create a newly arrived patient. The priority score is computed from
    /// the arrival itself.
    pub fn new(
        patient_id: PatientId,
        arrival_time: DateTime<Utc>,
        scheduled_time: Option<DateTime<Utc>>,
        urgency: Urgency,
        source: SourceChannel,
    ) -> Self {
        let priority_score = compute_priority(urgency, arrival_time, scheduled_time, source);
        Patient {
            patient_id,
            arrival_time,
            scheduled_time,
            urgency,
            source,
            priority_score,
            status: PatientStatus::Arrived,
        }
    }

    /// Recompute the priority score as if the patient were evaluated at `now`.
    ///
    /// Returns true when the score changed.
    pub fn recompute_priority(&mut self, now: DateTime<Utc>) -> bool {
        let effective = now.max(self.arrival_time);
        let score = compute_priority(self.urgency, effective, self.scheduled_time, self.source);
        let changed = score != self.priority_score;
        self.priority_score = score;
        changed
    }
}

/// Normalized arrival produced by a channel adapter.
#[derive(Debug, Clone)]
pub struct ArrivalEvent {
    pub doctor_id: DoctorId,
    pub patient_id: String,
    pub arrival_time: DateTime<Utc>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub urgency: u8,
    pub source: SourceChannel,
}

impl ArrivalEvent {
    /// Validate the raw event and build the patient it describes.
    pub fn into_patient(self) -> Result<(DoctorId, Patient)> {
        let patient_id = PatientId::new(self.patient_id)?;
        let urgency = Urgency::new(self.urgency)?;
        let patient = Patient::new(
            patient_id,
            self.arrival_time,
            self.scheduled_time,
            urgency,
            self.source,
        );
        Ok((self.doctor_id, patient))
    }
}

/// Result of placing a patient in a doctor's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub doctor_id: DoctorId,
    pub patient_id: PatientId,
    /// 0-based position in the ordered queue at the time of insertion.
    pub position: usize,
    pub priority_score: i64,
}

/// One row of a queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub patient_id: PatientId,
    pub priority_score: i64,
    pub status: PatientStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_bounds() {
        assert!(Urgency::new(0).is_err());
        assert!(Urgency::new(6).is_err());
        assert_eq!(Urgency::new(3).unwrap().value(), 3);
    }

    #[test]
    fn test_source_from_string() {
        assert_eq!(SourceChannel::from_string("Walk-in").unwrap(), SourceChannel::WalkIn);
        assert_eq!(SourceChannel::from_string(" WhatsApp ").unwrap(), SourceChannel::WhatsApp);
        assert!(SourceChannel::from_string("fax").is_err());
        assert!(!SourceChannel::WalkIn.is_pre_booked());
        assert!(SourceChannel::Ivr.is_pre_booked());
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        use PatientStatus::*;
        assert!(Arrived.can_transition_to(Waiting));
        assert!(Waiting.can_transition_to(InConsultation));
        assert!(InConsultation.can_transition_to(Consulted));
        assert!(Waiting.can_transition_to(NoShow));
        assert!(!Waiting.can_transition_to(Arrived));
        assert!(!InConsultation.can_transition_to(Waiting));
        assert!(!Consulted.can_transition_to(NoShow));
        assert!(!NoShow.can_transition_to(Consulted));
        assert!(!Waiting.can_transition_to(Consulted));
    }

    #[test]
    fn test_window_validation() {
        assert!(AvailabilityWindow::new(12, 9).is_err());
        assert!(AvailabilityWindow::new(9, 9).is_err());
        assert!(AvailabilityWindow::new(20, 25).is_err());

        let window = AvailabilityWindow::new(9, 12).unwrap();
        assert!(window.contains(9));
        assert!(window.contains(11));
        assert!(!window.contains(12));
        assert!(window.overlaps_with(&AvailabilityWindow::new(11, 13).unwrap()));
        assert!(!window.overlaps_with(&AvailabilityWindow::new(12, 13).unwrap()));
    }

    #[test]
    fn test_empty_ids_rejected() {
        assert!(PatientId::new("  ").is_err());
        assert!(DoctorId::new("").is_err());
    }
}
