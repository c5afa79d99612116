/// Priority model for patients waiting in a doctor's queue.
///
/// The score is a pure function of urgency, lateness and booking channel.
/// Lower scores are seen first.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::debug;

use crate::models::{Patient, PatientId, SourceChannel, Urgency};

/// Weight applied to each urgency level.
pub const URGENCY_WEIGHT: i64 = 10;

/// Bonus for patients who booked through a channel other than walk-in.
pub const PRE_BOOKED_BONUS: i64 = 5;

/// Whole minutes the patient arrived after their scheduled time, floored at 0.
///
/// Patients without a scheduled time have no delay.
pub fn delay_minutes(arrival_time: DateTime<Utc>, scheduled_time: Option<DateTime<Utc>>) -> i64 {
    match scheduled_time {
        Some(scheduled) => (arrival_time - scheduled).num_minutes().max(0),
        None => 0,
    }
}

pub fn source_bonus(source: SourceChannel) -> i64 {
    if source.is_pre_booked() {
        PRE_BOOKED_BONUS
    } else {
        0
    }
}

/// Compute a patient's priority score.
///
/// `score = -(urgency * 10 - delay + bonus)`
pub fn compute_priority(
    urgency: Urgency,
    arrival_time: DateTime<Utc>,
    scheduled_time: Option<DateTime<Utc>>,
    source: SourceChannel,
) -> i64 {
    let delay = delay_minutes(arrival_time, scheduled_time);
    let score = -(i64::from(urgency.value()) * URGENCY_WEIGHT - delay + source_bonus(source));
    debug!(
        urgency = urgency.value(),
        delay,
        source = source.name(),
        score,
        "Computed priority"
    );
    score
}

/// Total ordering key for a queued patient.
///
/// Ordered by score, then scheduled time (arrival time when no appointment
/// exists), then arrival time, then patient id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityKey {
    pub score: i64,
    pub scheduled_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub patient_id: PatientId,
}

impl PriorityKey {
    pub fn for_patient(patient: &Patient) -> Self {
        PriorityKey {
            score: patient.priority_score,
            scheduled_time: patient.scheduled_time.unwrap_or(patient.arrival_time),
            arrival_time: patient.arrival_time,
            patient_id: patient.patient_id.clone(),
        }
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| self.scheduled_time.cmp(&other.scheduled_time))
            .then_with(|| self.arrival_time.cmp(&other.arrival_time))
            .then_with(|| self.patient_id.cmp(&other.patient_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn urgency(value: u8) -> Urgency {
        Urgency::new(value).unwrap()
    }

    #[test]
    fn test_early_app_patient() {
        let score = compute_priority(
            urgency(2),
            t0(),
            Some(t0() + Duration::minutes(15)),
            SourceChannel::App,
        );
        assert_eq!(score, -25);
    }

    #[test]
    fn test_walk_in_gets_no_bonus() {
        let score = compute_priority(
            urgency(3),
            t0(),
            Some(t0() + Duration::minutes(10)),
            SourceChannel::WalkIn,
        );
        assert_eq!(score, -30);
    }

    #[test]
    fn test_late_arrival_delay_counts() {
        let score = compute_priority(
            urgency(5),
            t0(),
            Some(t0() - Duration::minutes(5)),
            SourceChannel::WhatsApp,
        );
        assert_eq!(score, -50);
    }

    #[test]
    fn test_delay_truncates_partial_minutes() {
        let scheduled = t0() - Duration::seconds(119);
        assert_eq!(delay_minutes(t0(), Some(scheduled)), 1);
        assert_eq!(delay_minutes(t0(), None), 0);
        assert_eq!(delay_minutes(t0(), Some(t0() + Duration::hours(2))), 0);
    }

    #[test]
    fn test_missing_schedule_means_no_delay() {
        let score = compute_priority(urgency(1), t0(), None, SourceChannel::Ivr);
        assert_eq!(score, -15);
    }

    #[test]
    fn test_key_tie_breaks() {
        let make = |id: &str, scheduled: Option<DateTime<Utc>>, arrival: DateTime<Utc>| {
            let mut patient = Patient::new(
                PatientId::from(id),
                arrival,
                scheduled,
                urgency(3),
                SourceChannel::WalkIn,
            );
            patient.priority_score = -30;
            PriorityKey::for_patient(&patient)
        };

        let earlier_slot = make("B", Some(t0()), t0());
        let later_slot = make("A", Some(t0() + Duration::minutes(5)), t0());
        assert!(earlier_slot < later_slot);

        let earlier_arrival = make("B", Some(t0()), t0() - Duration::minutes(1));
        assert!(earlier_arrival < earlier_slot);

        let same_a = make("A", Some(t0()), t0());
        assert!(same_a < earlier_slot);
    }
}
