use std::time::Duration;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogLoadError, ConfigurationError};

use super::{
    action::ActionMode,
    catalog::{ScenarioCatalog, Situation},
    observation::ObservationShapes,
    reward::RewardWeights,
};

/// How the backend clock advances relative to `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockMode {
    /// The harness ticks the backend once per step, before applying control.
    LockStep,
    /// The backend runs on its own cadence.
    FreeRunning,
}

#[derive(Config, Debug)]
pub struct EnvConfig {
    /// JSON file holding the scenario catalog.
    pub scenarios_file: Option<String>,
    /// Restrict episodes to these situations. Empty keeps all.
    #[config(default = "Vec::new()")]
    pub situations: Vec<Situation>,
    #[config(default = "ClockMode::LockStep")]
    pub clock_mode: ClockMode,
    #[config(default = 0.05)]
    pub fixed_delta_seconds: f64,
    #[config(default = 10.0)]
    pub time_limit_seconds: f64,
    /// Step budget used to scale the destination bonus.
    #[config(default = 1000)]
    pub max_steps: usize,
    /// Pause after loading a scenario so actors and sensors settle.
    #[config(default = 1.0)]
    pub settle_delay_seconds: f64,
    #[config(default = false)]
    pub random_weather: bool,
    #[config(default = false)]
    pub random_traffic: bool,
    #[config(default = 0)]
    pub pedestrians: usize,
    #[config(default = true)]
    pub traffic_autopilot: bool,
    #[config(default = "String::from(\"vehicle.tesla.model3\")")]
    pub vehicle_model: String,
    #[config(default = "ObservationShapes::default()")]
    pub observation: ObservationShapes,
    #[config(default = "ActionMode::default()")]
    pub action_mode: ActionMode,
    #[config(default = "RewardWeights::default()")]
    pub reward_weights: RewardWeights,
    /// Seeds the environment's generator. Drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl EnvConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_seconds).unwrap_or(Duration::MAX)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.settle_delay_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.observation.validate()?;
        self.action_mode.validate()?;

        if self.max_steps == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_steps must be positive".to_string(),
            ));
        }
        if self.time_limit_seconds <= 0.0 {
            return Err(ConfigurationError::InvalidValue(format!(
                "time limit must be positive, got {}",
                self.time_limit_seconds
            )));
        }
        if self.fixed_delta_seconds <= 0.0 {
            return Err(ConfigurationError::InvalidValue(format!(
                "fixed delta must be positive, got {}",
                self.fixed_delta_seconds
            )));
        }
        for (name, seconds) in [
            ("time_limit_seconds", self.time_limit_seconds),
            ("fixed_delta_seconds", self.fixed_delta_seconds),
            ("settle_delay_seconds", self.settle_delay_seconds),
        ] {
            // rejects NaN, infinities, negatives and values past Duration::MAX
            if Duration::try_from_secs_f64(seconds).is_err() {
                return Err(ConfigurationError::InvalidValue(format!(
                    "{name} is not a valid duration: {seconds}"
                )));
            }
        }

        Ok(())
    }

    /// Loads `scenarios_file`, if set, and applies the situation filter.
    pub fn load_catalog(&self) -> Result<Option<ScenarioCatalog>, CatalogLoadError> {
        self.scenarios_file
            .as_ref()
            .map(|path| ScenarioCatalog::load(path).map(|c| c.filter(&self.situations)))
            .transpose()
    }
}
