//! Episodic driving environment over an external simulator.

pub mod action;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod env;
pub mod observation;
pub mod reward;
pub mod seeding;
pub mod traffic;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionMode, DiscreteActionMap};
pub use catalog::{ScenarioCatalog, ScenarioDescriptor, Situation};
pub use config::{ClockMode, EnvConfig};
pub use env::{DrivingEnv, EpisodePhase, InterruptFlag};
pub use observation::{Observation, ObservationShapes};
pub use reward::{RewardTerm, RewardWeights};
