//! Priority-based patient-to-doctor queue scheduling.
//!
//! Channel adapters (IVR, app, WhatsApp, walk-in desk) hand normalized
//! arrivals to a [`QueueManagementSystem`], which places each patient in a
//! doctor's waiting line ordered by a computed priority score, tracks the
//! patient's lifecycle, and reports queue-derived wait estimates.

pub mod clock;
pub mod config;
pub mod consult;
pub mod doctor_queue;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod priority;
pub mod scheduler;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use consult::{ConsultTimeModel, FixedAverage, RollingAverage};
pub use doctor_queue::DoctorQueue;
pub use error::{QueueError, Result};
pub use events::{QueueEvent, QueueObserver};
pub use models::{
    ArrivalEvent, Assignment, AvailabilityWindow, DoctorId, Patient, PatientId, PatientStatus,
    SnapshotEntry, SourceChannel, TerminalOutcome, Urgency,
};
pub use priority::compute_priority;
pub use scheduler::QueueManagementSystem;
pub use status::StatusTracker;
