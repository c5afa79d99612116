/// Error types for the queue scheduling system.
///
/// Every condition here is local and recoverable: callers get a typed
/// result back and decide what to do. An empty queue is not an error.

use thiserror::Error;

use crate::models::{DoctorId, PatientId, PatientStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Unknown doctor: {0}")]
    UnknownDoctor(DoctorId),

    #[error("Doctor already registered: {0}")]
    DuplicateDoctor(DoctorId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(PatientId),

    #[error("Invalid patient: {0}")]
    InvalidPatient(String),

    #[error("Invalid status transition for {patient}: {from} -> {to}")]
    InvalidTransition {
        patient: PatientId,
        from: PatientStatus,
        to: PatientStatus,
    },

    #[error("No doctor available at hour {0}")]
    NoAvailableDoctor(u32),

    #[error("Failed to install logger: {0}")]
    Logging(String),

    #[error("Failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
