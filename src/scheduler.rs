/// Patient-to-doctor queue scheduler.
///
/// This module provides the QueueManagementSystem struct which owns every
/// doctor's queue, routes arriving patients, drives status transitions and
/// produces wait estimates.
///
/// Locking: the doctor table is read-locked only long enough to clone a
/// queue handle. Queue locks are taken before the patient directory lock,
/// and operations touching two doctors lock them in ascending id order.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::consult::{ConsultTimeModel, RollingAverage};
use crate::doctor_queue::DoctorQueue;
use crate::error::{QueueError, Result};
use crate::events::{QueueEvent, QueueObserver};
use crate::models::{
    ArrivalEvent, Assignment, AvailabilityWindow, DoctorId, Patient, PatientId, PatientStatus,
    SnapshotEntry, TerminalOutcome,
};

pub const DEFAULT_AVERAGE_CONSULT_MINUTES: u32 = 15;
pub const DEFAULT_ROLLING_WINDOW: usize = 20;

type SharedQueue = Arc<RwLock<DoctorQueue>>;

/// Where an active (non-terminal) patient currently is.
#[derive(Debug, Clone)]
enum Location {
    Waiting(DoctorId),
    InConsultation { doctor_id: DoctorId, patient: Patient },
}

#[derive(Debug, Default)]
struct Directory {
    locations: HashMap<PatientId, Location>,
    tracker: crate::status::StatusTracker,
}

pub struct QueueManagementSystem {
    doctors: RwLock<BTreeMap<DoctorId, SharedQueue>>,
    directory: Mutex<Directory>,
    clock: Arc<dyn Clock>,
    consult_history: Arc<RollingAverage>,
    observers: RwLock<Vec<Arc<dyn QueueObserver>>>,
}

impl Default for QueueManagementSystem {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl QueueManagementSystem {
    /// Initialize an empty system reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_consult_history(
            clock,
            RollingAverage::new(DEFAULT_ROLLING_WINDOW, DEFAULT_AVERAGE_CONSULT_MINUTES),
        )
    }

    pub fn with_consult_history(clock: Arc<dyn Clock>, history: RollingAverage) -> Self {
        QueueManagementSystem {
            doctors: RwLock::new(BTreeMap::new()),
            directory: Mutex::new(Directory::default()),
            clock,
            consult_history: Arc::new(history),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register a collaborator for queue events.
    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        self.observers.write().push(observer);
    }

    /// Observed consultation lengths, recorded as patients are marked consulted.
    pub fn consult_history(&self) -> Arc<RollingAverage> {
        Arc::clone(&self.consult_history)
    }

    fn publish(&self, events: Vec<QueueEvent>) {
        let observers = self.observers.read().clone();
        for event in &events {
            for observer in &observers {
                observer.on_event(event);
            }
        }
    }

    fn queue(&self, doctor_id: &DoctorId) -> Result<SharedQueue> {
        self.doctors
            .read()
            .get(doctor_id)
            .cloned()
            .ok_or_else(|| QueueError::UnknownDoctor(doctor_id.clone()))
    }

    /// Register a doctor with `(start_hour, end_hour)` availability windows.
    pub fn register_doctor(&self, doctor_id: DoctorId, windows: &[(u32, u32)]) -> Result<()> {
        if doctor_id.as_str().trim().is_empty() {
            warn!("Rejected doctor with empty id");
            return Err(QueueError::InvalidConfig(
                "Doctor ID cannot be empty".to_string(),
            ));
        }
        let windows = windows
            .iter()
            .map(|&(start, end)| AvailabilityWindow::new(start, end))
            .collect::<Result<Vec<_>>>()?;

        {
            let mut doctors = self.doctors.write();
            if doctors.contains_key(&doctor_id) {
                warn!(doctor = %doctor_id, "Doctor already registered");
                return Err(QueueError::DuplicateDoctor(doctor_id));
            }
            let queue = DoctorQueue::new(doctor_id.clone(), windows)?;
            doctors.insert(doctor_id.clone(), Arc::new(RwLock::new(queue)));
        }

        info!(doctor = %doctor_id, "Registered doctor");
        self.publish(vec![QueueEvent::DoctorRegistered { doctor_id }]);
        Ok(())
    }

    /// Registered doctors in ascending id order.
    pub fn doctor_ids(&self) -> Vec<DoctorId> {
        self.doctors.read().keys().cloned().collect()
    }

    /// Place a newly arrived patient in a doctor's queue.
    ///
    /// Nothing is changed when the doctor is unknown or the patient id is
    /// already on record.
    pub fn assign_patient(&self, doctor_id: &DoctorId, mut patient: Patient) -> Result<Assignment> {
        if patient.patient_id.as_str().trim().is_empty() {
            warn!(doctor = %doctor_id, "Rejected patient with empty id");
            return Err(QueueError::InvalidPatient(
                "Patient ID cannot be empty".to_string(),
            ));
        }
        let queue = self.queue(doctor_id).map_err(|e| {
            warn!(doctor = %doctor_id, patient = %patient.patient_id, "Assignment to unknown doctor");
            e
        })?;
        let now = self.clock.now();
        let patient_id = patient.patient_id.clone();
        patient.recompute_priority(patient.arrival_time);
        patient.status = PatientStatus::Waiting;
        let score = patient.priority_score;

        let position = {
            let mut queue = queue.write();
            let mut dir = self.directory.lock();

            if dir.locations.contains_key(&patient_id) {
                warn!(patient = %patient_id, "Patient is already active");
                return Err(QueueError::InvalidPatient(format!(
                    "Patient {} is already active",
                    patient_id
                )));
            }
            dir.tracker.record_arrival(patient_id.clone(), patient.arrival_time)?;

            if let Err(e) = queue.insert(patient) {
                dir.tracker.discard_arrival(&patient_id);
                return Err(e);
            }
            let position = queue.position_of(&patient_id).unwrap_or_default();
            dir.tracker.set_status(&patient_id, PatientStatus::Waiting, now)?;
            dir.locations
                .insert(patient_id.clone(), Location::Waiting(doctor_id.clone()));
            position
        };

        info!(
            doctor = %doctor_id,
            patient = %patient_id,
            position,
            score,
            "Assigned patient"
        );
        self.publish(vec![
            QueueEvent::StatusChanged {
                patient_id: patient_id.clone(),
                from: PatientStatus::Arrived,
                to: PatientStatus::Waiting,
                at: now,
            },
            QueueEvent::PatientAssigned {
                doctor_id: doctor_id.clone(),
                patient_id: patient_id.clone(),
                position,
                priority_score: score,
            },
        ]);

        Ok(Assignment {
            doctor_id: doctor_id.clone(),
            patient_id,
            position,
            priority_score: score,
        })
    }

    /// Validate an arrival from a channel adapter and assign it.
    pub fn submit_arrival(&self, event: ArrivalEvent) -> Result<Assignment> {
        let (doctor_id, patient) = event.into_patient()?;
        self.assign_patient(&doctor_id, patient)
    }

    /// Assign a patient to the least loaded doctor available at `at_hour`.
    ///
    /// Ties go to the lowest doctor id.
    pub fn assign_balanced(&self, patient: Patient, at_hour: u32) -> Result<Assignment> {
        let queues: Vec<(DoctorId, SharedQueue)> = self
            .doctors
            .read()
            .iter()
            .map(|(id, q)| (id.clone(), Arc::clone(q)))
            .collect();

        let mut best: Option<(DoctorId, usize)> = None;
        {
            // Ascending id order; all read guards held together for a consistent view.
            let guards: Vec<_> = queues.iter().map(|(id, q)| (id, q.read())).collect();
            for (id, queue) in &guards {
                if !queue.is_within_availability(at_hour) {
                    continue;
                }
                let len = queue.len();
                if best.as_ref().map_or(true, |(_, best_len)| len < *best_len) {
                    best = Some(((*id).clone(), len));
                }
            }
        }

        let (doctor_id, load) = best.ok_or_else(|| {
            warn!(at_hour, patient = %patient.patient_id, "No doctor available");
            QueueError::NoAvailableDoctor(at_hour)
        })?;
        debug!(doctor = %doctor_id, load, "Balanced assignment target");
        self.assign_patient(&doctor_id, patient)
    }

    /// Move a waiting patient to another doctor's queue.
    ///
    /// The priority is recomputed against the current time, so a patient
    /// who is now later than their slot carries that delay into the new queue.
    pub fn reassign_patient(
        &self,
        patient_id: &PatientId,
        from_doctor: &DoctorId,
        to_doctor: &DoctorId,
    ) -> Result<Assignment> {
        let source = self.queue(from_doctor)?;
        let target = self.queue(to_doctor)?;
        let now = self.clock.now();

        let (position, score) = if from_doctor == to_doctor {
            let mut queue = source.write();
            let mut dir = self.directory.lock();
            let mut patient = queue
                .remove(patient_id)
                .ok_or_else(|| QueueError::PatientNotFound(patient_id.clone()))?;
            patient.recompute_priority(now);
            let score = patient.priority_score;
            queue.insert(patient)?;
            let position = queue.position_of(patient_id).unwrap_or_default();
            dir.locations
                .insert(patient_id.clone(), Location::Waiting(to_doctor.clone()));
            (position, score)
        } else {
            let (mut src, mut dst) = if from_doctor < to_doctor {
                let src = source.write();
                let dst = target.write();
                (src, dst)
            } else {
                let dst = target.write();
                let src = source.write();
                (src, dst)
            };
            let mut dir = self.directory.lock();

            let mut patient = src
                .remove(patient_id)
                .ok_or_else(|| QueueError::PatientNotFound(patient_id.clone()))?;
            patient.recompute_priority(now);
            let score = patient.priority_score;
            if let Err(e) = dst.insert(patient.clone()) {
                src.insert(patient)?;
                return Err(e);
            }
            let position = dst.position_of(patient_id).unwrap_or_default();
            dir.locations
                .insert(patient_id.clone(), Location::Waiting(to_doctor.clone()));
            (position, score)
        };

        info!(
            patient = %patient_id,
            from = %from_doctor,
            to = %to_doctor,
            position,
            score,
            "Reassigned patient"
        );
        self.publish(vec![QueueEvent::PatientReassigned {
            patient_id: patient_id.clone(),
            from: from_doctor.clone(),
            to: to_doctor.clone(),
            priority_score: score,
        }]);

        Ok(Assignment {
            doctor_id: to_doctor.clone(),
            patient_id: patient_id.clone(),
            position,
            priority_score: score,
        })
    }

    /// Recompute every waiting patient's priority for a doctor against the
    /// current time. Returns the number of scores that changed.
    pub fn reprioritize(&self, doctor_id: &DoctorId) -> Result<usize> {
        let queue = self.queue(doctor_id)?;
        let now = self.clock.now();
        let changed = queue.write().reprioritize(now);
        info!(doctor = %doctor_id, changed, "Reprioritized queue");
        Ok(changed)
    }

    /// `queue length * average_consult_minutes`.
    pub fn estimate_wait_time(&self, doctor_id: &DoctorId, average_consult_minutes: u32) -> Result<u64> {
        let length = self.queue(doctor_id)?.read().len() as u64;
        Ok(length * u64::from(average_consult_minutes))
    }

    pub fn estimate_wait_with(&self, doctor_id: &DoctorId, model: &dyn ConsultTimeModel) -> Result<u64> {
        self.estimate_wait_time(doctor_id, model.average_minutes(doctor_id))
    }

    /// Estimate using the consultation lengths observed so far.
    pub fn estimate_wait_from_history(&self, doctor_id: &DoctorId) -> Result<u64> {
        self.estimate_wait_with(doctor_id, self.consult_history.as_ref())
    }

    /// Pop the doctor's next patient and move them into consultation.
    pub fn next_for_doctor(&self, doctor_id: &DoctorId) -> Result<Option<Patient>> {
        let queue = self.queue(doctor_id)?;
        let now = self.clock.now();

        let (patient, remaining) = {
            let mut queue = queue.write();
            let mut dir = self.directory.lock();
            let Some(mut patient) = queue.pop_next() else {
                debug!(doctor = %doctor_id, "Queue is empty");
                return Ok(None);
            };
            if let Err(e) = dir
                .tracker
                .set_status(&patient.patient_id, PatientStatus::InConsultation, now)
            {
                queue.insert(patient)?;
                return Err(e);
            }
            patient.status = PatientStatus::InConsultation;
            dir.locations.insert(
                patient.patient_id.clone(),
                Location::InConsultation {
                    doctor_id: doctor_id.clone(),
                    patient: patient.clone(),
                },
            );
            (patient, queue.len())
        };

        info!(doctor = %doctor_id, patient = %patient.patient_id, remaining, "Advanced queue");
        self.publish(vec![
            QueueEvent::StatusChanged {
                patient_id: patient.patient_id.clone(),
                from: PatientStatus::Waiting,
                to: PatientStatus::InConsultation,
                at: now,
            },
            QueueEvent::QueueAdvanced {
                doctor_id: doctor_id.clone(),
                patient_id: patient.patient_id.clone(),
                remaining,
            },
        ]);
        Ok(Some(patient))
    }

    pub fn advance_queue(&self, doctor_id: &DoctorId) -> Result<Option<PatientId>> {
        Ok(self.next_for_doctor(doctor_id)?.map(|p| p.patient_id))
    }

    pub fn mark_consulted(&self, patient_id: &PatientId) -> Result<()> {
        self.set_terminal_status(patient_id, TerminalOutcome::Consulted)
    }

    pub fn mark_no_show(&self, patient_id: &PatientId) -> Result<()> {
        self.set_terminal_status(patient_id, TerminalOutcome::NoShow)
    }

    /// Close out a patient as consulted or no-show and drop them from the
    /// queues. Waiting patients may only be marked no-show.
    pub fn set_terminal_status(&self, patient_id: &PatientId, outcome: TerminalOutcome) -> Result<()> {
        let target = outcome.status();

        loop {
            let waiting_for = {
                let mut dir = self.directory.lock();
                let location = dir.locations.get(patient_id).cloned();
                match location {
                    None => {
                        let current = dir.tracker.get_status(patient_id)?;
                        warn!(patient = %patient_id, from = %current, to = %target, "Patient already closed");
                        return Err(QueueError::InvalidTransition {
                            patient: patient_id.clone(),
                            from: current,
                            to: target,
                        });
                    }
                    Some(Location::InConsultation { doctor_id, .. }) => {
                        let now = self.clock.now();
                        let started = dir
                            .tracker
                            .get_record(patient_id)
                            .and_then(|r| r.consultation_started_at);
                        let from = dir.tracker.set_status(patient_id, target, now)?;
                        dir.locations.remove(patient_id);
                        drop(dir);

                        if target == PatientStatus::Consulted {
                            if let Some(started) = started {
                                self.consult_history
                                    .record(&doctor_id, consult_minutes(started, now));
                            }
                        }
                        info!(doctor = %doctor_id, patient = %patient_id, outcome = %target, "Closed patient");
                        self.publish(vec![QueueEvent::StatusChanged {
                            patient_id: patient_id.clone(),
                            from,
                            to: target,
                            at: now,
                        }]);
                        return Ok(());
                    }
                    Some(Location::Waiting(doctor_id)) => {
                        dir.tracker.check_transition(patient_id, target)?;
                        doctor_id
                    }
                }
            };

            let queue = self.queue(&waiting_for)?;
            let mut queue = queue.write();
            let mut dir = self.directory.lock();
            let still_there = matches!(
                dir.locations.get(patient_id),
                Some(Location::Waiting(d)) if *d == waiting_for
            );
            if !still_there {
                // moved while unlocked
                continue;
            }

            let now = self.clock.now();
            let from = dir.tracker.set_status(patient_id, target, now)?;
            queue.remove(patient_id);
            dir.locations.remove(patient_id);
            drop(dir);
            drop(queue);

            info!(doctor = %waiting_for, patient = %patient_id, outcome = %target, "Closed waiting patient");
            self.publish(vec![QueueEvent::StatusChanged {
                patient_id: patient_id.clone(),
                from,
                to: target,
                at: now,
            }]);
            return Ok(());
        }
    }

    pub fn get_status(&self, patient_id: &PatientId) -> Result<PatientStatus> {
        self.directory.lock().tracker.get_status(patient_id)
    }

    /// Forget patients that reached a terminal status before `cutoff`.
    ///
    /// Until purged, a closed patient's record rejects repeated terminal calls
    /// and reuse of the id. Returns the number of records dropped.
    pub fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let purged = self.directory.lock().tracker.purge_terminal_before(cutoff);
        info!(purged, cutoff = %cutoff, "Purged closed patients");
        purged
    }

    /// Number of patients the status tracker holds, closed ones included.
    pub fn tracked_patients(&self) -> usize {
        self.directory.lock().tracker.len()
    }

    /// The doctor a waiting or in-consultation patient belongs to.
    pub fn doctor_of(&self, patient_id: &PatientId) -> Result<DoctorId> {
        match self.directory.lock().locations.get(patient_id) {
            Some(Location::Waiting(doctor_id)) => Ok(doctor_id.clone()),
            Some(Location::InConsultation { doctor_id, .. }) => Ok(doctor_id.clone()),
            None => Err(QueueError::PatientNotFound(patient_id.clone())),
        }
    }

    /// Patients currently in consultation with a doctor.
    pub fn in_consultation(&self, doctor_id: &DoctorId) -> Vec<Patient> {
        let dir = self.directory.lock();
        let mut patients: Vec<Patient> = dir
            .locations
            .values()
            .filter_map(|l| match l {
                Location::InConsultation { doctor_id: d, patient } if d == doctor_id => {
                    Some(patient.clone())
                }
                _ => None,
            })
            .collect();
        patients.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        patients
    }

    pub fn peek_next(&self, doctor_id: &DoctorId) -> Result<Option<Patient>> {
        Ok(self.queue(doctor_id)?.read().peek_next().cloned())
    }

    pub fn queue_length(&self, doctor_id: &DoctorId) -> Result<usize> {
        Ok(self.queue(doctor_id)?.read().len())
    }

    pub fn is_doctor_available(&self, doctor_id: &DoctorId, at_hour: u32) -> Result<bool> {
        Ok(self.queue(doctor_id)?.read().is_within_availability(at_hour))
    }

    /// Ordered view of a doctor's waiting line.
    pub fn query_snapshot(&self, doctor_id: &DoctorId) -> Result<Vec<SnapshotEntry>> {
        let queue = self.queue(doctor_id)?;
        let queue = queue.read();
        Ok(queue
            .iter()
            .map(|p| SnapshotEntry {
                patient_id: p.patient_id.clone(),
                priority_score: p.priority_score,
                status: p.status,
            })
            .collect())
    }
}

fn consult_minutes(started: DateTime<Utc>, finished: DateTime<Utc>) -> u32 {
    (finished - started).num_minutes().clamp(0, i64::from(u32::MAX)) as u32
}
