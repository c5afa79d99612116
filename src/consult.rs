/// Consultation length models used for wait estimates.
///
/// The scheduler never guesses consultation lengths itself; a model supplies
/// the average and the estimate is `queue length * average`.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::models::DoctorId;

pub trait ConsultTimeModel: Send + Sync {
    /// Average consultation length in minutes for a doctor.
    fn average_minutes(&self, doctor_id: &DoctorId) -> u32;
}

/// Same average for every doctor.
#[derive(Debug, Clone, Copy)]
pub struct FixedAverage(pub u32);

impl ConsultTimeModel for FixedAverage {
    fn average_minutes(&self, _doctor_id: &DoctorId) -> u32 {
        self.0
    }
}

/// Average of the most recent observed consultations per doctor.
///
/// Falls back to a fixed value until a doctor has any observations.
#[derive(Debug)]
pub struct RollingAverage {
    window: usize,
    fallback: u32,
    samples: Mutex<HashMap<DoctorId, VecDeque<u32>>>,
}

impl RollingAverage {
    pub fn new(window: usize, fallback: u32) -> Self {
        RollingAverage {
            window: window.max(1),
            fallback,
            samples: Mutex::new(HashMap::new()),
        }
    }

    /// Record how long one consultation took.
    pub fn record(&self, doctor_id: &DoctorId, minutes: u32) {
        let mut samples = self.samples.lock();
        let history = samples.entry(doctor_id.clone()).or_default();
        if history.len() == self.window {
            history.pop_front();
        }
        history.push_back(minutes);
    }

    pub fn sample_count(&self, doctor_id: &DoctorId) -> usize {
        self.samples.lock().get(doctor_id).map_or(0, |h| h.len())
    }
}

impl ConsultTimeModel for RollingAverage {
    fn average_minutes(&self, doctor_id: &DoctorId) -> u32 {
        let samples = self.samples.lock();
        match samples.get(doctor_id) {
            Some(history) if !history.is_empty() => {
                let total: u64 = history.iter().map(|&m| u64::from(m)).sum();
                let count = history.len() as u64;
                // round half up
                ((total + count / 2) / count) as u32
            }
            _ => self.fallback,
        }
    }
}
