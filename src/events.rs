/// Notifications published to collaborators (UI, reporting, messaging).

use chrono::{DateTime, Utc};

use crate::models::{DoctorId, PatientId, PatientStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    DoctorRegistered {
        doctor_id: DoctorId,
    },
    PatientAssigned {
        doctor_id: DoctorId,
        patient_id: PatientId,
        position: usize,
        priority_score: i64,
    },
    PatientReassigned {
        patient_id: PatientId,
        from: DoctorId,
        to: DoctorId,
        priority_score: i64,
    },
    StatusChanged {
        patient_id: PatientId,
        from: PatientStatus,
        to: PatientStatus,
        at: DateTime<Utc>,
    },
    QueueAdvanced {
        doctor_id: DoctorId,
        patient_id: PatientId,
        remaining: usize,
    },
}

/// Receives queue events. Called after the scheduler has released its locks,
/// so implementations may call back into the scheduler.
pub trait QueueObserver: Send + Sync {
    fn on_event(&self, event: &QueueEvent);
}
