/// Scheduler configuration loaded from TOML.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::consult::RollingAverage;
use crate::error::Result;
use crate::models::DoctorId;
use crate::scheduler::{QueueManagementSystem, DEFAULT_AVERAGE_CONSULT_MINUTES, DEFAULT_ROLLING_WINDOW};

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorConfig {
    pub id: String,
    /// `(start_hour, end_hour)` pairs.
    #[serde(default)]
    pub windows: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub log_level: String,
    pub average_consult_minutes: u32,
    pub rolling_window: usize,
    pub doctors: Vec<DoctorConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            log_level: "info".to_string(),
            average_consult_minutes: DEFAULT_AVERAGE_CONSULT_MINUTES,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            doctors: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            path = %path.as_ref().display(),
            doctors = config.doctors.len(),
            "Loaded scheduler config"
        );
        Ok(config)
    }

    /// Build a scheduler with every configured doctor registered.
    pub fn build_system(&self, clock: Arc<dyn Clock>) -> Result<QueueManagementSystem> {
        let history = RollingAverage::new(self.rolling_window, self.average_consult_minutes);
        let system = QueueManagementSystem::with_consult_history(clock, history);
        for doctor in &self.doctors {
            system.register_doctor(DoctorId::new(doctor.id.clone())?, &doctor.windows)?;
        }
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::QueueError;

    const SAMPLE: &str = r#"
log_level = "debug"
average_consult_minutes = 12

[[doctors]]
id = "D1"
windows = [[9, 12], [15, 18]]

[[doctors]]
id = "D2"
windows = [[8, 16]]
"#;

    #[test]
    fn test_parse_sample() {
        let config = SchedulerConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.average_consult_minutes, 12);
        assert_eq!(config.rolling_window, DEFAULT_ROLLING_WINDOW);
        assert_eq!(config.doctors.len(), 2);
        assert_eq!(config.doctors[0].windows, vec![(9, 12), (15, 18)]);
    }

    #[test]
    fn test_build_registers_doctors() {
        let config = SchedulerConfig::from_toml_str(SAMPLE).unwrap();
        let system = config.build_system(Arc::new(SystemClock)).unwrap();
        assert_eq!(
            system.doctor_ids(),
            vec![DoctorId::from("D1"), DoctorId::from("D2")]
        );
        assert!(system.is_doctor_available(&DoctorId::from("D1"), 16).unwrap());
        assert_eq!(system.estimate_wait_from_history(&DoctorId::from("D2")).unwrap(), 0);
    }

    #[test]
    fn test_bad_windows_surface_as_invalid_config() {
        let config = SchedulerConfig::from_toml_str(
            r#"
[[doctors]]
id = "D1"
windows = [[12, 9]]
"#,
        )
        .unwrap();
        assert!(matches!(
            config.build_system(Arc::new(SystemClock)),
            Err(QueueError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unparsable_config() {
        assert!(matches!(
            SchedulerConfig::from_toml_str("doctors = 3"),
            Err(QueueError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SchedulerConfig::from_toml_str("").unwrap();
        assert_eq!(config.average_consult_minutes, DEFAULT_AVERAGE_CONSULT_MINUTES);
        assert!(config.doctors.is_empty());
    }
}
