use serde::{Deserialize, Serialize};

use crate::{
    common::spaces::{BoxSpace, Discrete, Space},
    error::{ConfigurationError, EnvError},
};

use super::backend::VehicleControl;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `[steer, accel]` or `[steer, throttle, brake]`.
    Continuous(Vec<f32>),
    Discrete(usize),
}

/// One discrete control adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscreteCommand {
    Accelerate,
    Decelerate,
    BrakeMore,
    BrakeLess,
    SteerLeft,
    SteerRight,
    Coast,
}

/// Mapping from discrete action codes to control adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteActionMap {
    pub commands: Vec<DiscreteCommand>,
    pub throttle_step: f32,
    pub brake_step: f32,
    pub steer_step: f32,
}

impl DiscreteActionMap {
    pub fn six_way() -> Self {
        Self {
            commands: vec![
                DiscreteCommand::Accelerate,
                DiscreteCommand::Decelerate,
                DiscreteCommand::BrakeMore,
                DiscreteCommand::BrakeLess,
                DiscreteCommand::SteerLeft,
                DiscreteCommand::SteerRight,
            ],
            throttle_step: 0.05,
            brake_step: 0.05,
            steer_step: 0.1,
        }
    }

    pub fn four_way() -> Self {
        Self {
            commands: vec![
                DiscreteCommand::Accelerate,
                DiscreteCommand::Decelerate,
                DiscreteCommand::SteerLeft,
                DiscreteCommand::SteerRight,
            ],
            ..Self::six_way()
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionMode {
    Continuous { with_brake: bool },
    Discrete(DiscreteActionMap),
}

impl Default for ActionMode {
    fn default() -> Self {
        ActionMode::Discrete(DiscreteActionMap::six_way())
    }
}

impl ActionMode {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            ActionMode::Continuous { .. } => Ok(()),
            ActionMode::Discrete(map) if map.is_empty() => Err(
                ConfigurationError::InvalidActionMap("no discrete commands".to_string()),
            ),
            ActionMode::Discrete(map) => {
                let steps = [map.throttle_step, map.brake_step, map.steer_step];
                if steps.iter().all(|s| s.is_finite() && *s >= 0.0) {
                    Ok(())
                } else {
                    Err(ConfigurationError::InvalidActionMap(
                        "control steps must be non-negative".to_string(),
                    ))
                }
            }
        }
    }

    pub fn space(&self) -> ActionSpace {
        match self {
            ActionMode::Continuous { with_brake: false } => {
                ActionSpace::Continuous(box_space(vec![-1.0, -1.0], vec![1.0, 1.0]))
            }
            ActionMode::Continuous { with_brake: true } => {
                ActionSpace::Continuous(box_space(vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]))
            }
            ActionMode::Discrete(map) => ActionSpace::Discrete(Discrete::from(map.len())),
        }
    }
}

fn box_space(low: Vec<f32>, high: Vec<f32>) -> BoxSpace {
    // literal bounds, always valid
    BoxSpace::new(low, high).unwrap_or_else(|_| BoxSpace::unbounded(0))
}

#[derive(Debug, Clone)]
pub enum ActionSpace {
    Continuous(BoxSpace),
    Discrete(Discrete),
}

impl Space<Action> for ActionSpace {
    fn contains(&self, sample: &Action) -> bool {
        match (self, sample) {
            (ActionSpace::Continuous(space), Action::Continuous(v)) => space.contains(v),
            (ActionSpace::Discrete(space), Action::Discrete(i)) => space.contains(i),
            _ => false,
        }
    }

    fn sample(&mut self) -> Action {
        match self {
            ActionSpace::Continuous(space) => Action::Continuous(space.sample()),
            ActionSpace::Discrete(space) => Action::Discrete(space.sample()),
        }
    }

    fn shape(&self) -> Action {
        match self {
            ActionSpace::Continuous(space) => Action::Continuous(space.shape()),
            ActionSpace::Discrete(space) => Action::Discrete(space.shape()),
        }
    }
}

/// Control held across steps. Discrete actions nudge it, continuous
/// actions overwrite it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    control: VehicleControl,
}

impl ControlState {
    pub fn control(&self) -> VehicleControl {
        self.control
    }

    pub fn reset(&mut self) {
        self.control = VehicleControl::default();
    }

    pub fn apply(&mut self, action: &Action, mode: &ActionMode) -> Result<VehicleControl, EnvError> {
        match (mode, action) {
            (ActionMode::Continuous { with_brake }, Action::Continuous(values)) => {
                self.control = continuous_control(values, *with_brake)?;
            }
            (ActionMode::Discrete(map), Action::Discrete(code)) => {
                let command = map.commands.get(*code).ok_or_else(|| {
                    EnvError::InvalidAction(format!(
                        "discrete action {code} outside [0, {})",
                        map.len()
                    ))
                })?;
                self.nudge(*command, map);
            }
            (mode, action) => {
                return Err(EnvError::InvalidAction(format!(
                    "{action:?} does not fit action mode {mode:?}"
                )))
            }
        }

        Ok(self.control)
    }

    fn nudge(&mut self, command: DiscreteCommand, map: &DiscreteActionMap) {
        let c = &mut self.control;
        match command {
            DiscreteCommand::Accelerate => c.throttle = (c.throttle + map.throttle_step).min(1.0),
            DiscreteCommand::Decelerate => c.throttle = (c.throttle - map.throttle_step).max(0.0),
            DiscreteCommand::BrakeMore => c.brake = (c.brake + map.brake_step).min(1.0),
            DiscreteCommand::BrakeLess => c.brake = (c.brake - map.brake_step).max(0.0),
            DiscreteCommand::SteerLeft => c.steer = (c.steer - map.steer_step).max(-1.0),
            DiscreteCommand::SteerRight => c.steer = (c.steer + map.steer_step).min(1.0),
            DiscreteCommand::Coast => {}
        }
    }
}

fn continuous_control(values: &[f32], with_brake: bool) -> Result<VehicleControl, EnvError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EnvError::InvalidAction(format!(
            "non-finite control values {values:?}"
        )));
    }

    match (with_brake, values) {
        (false, &[steer, accel]) => Ok(VehicleControl {
            steer: steer.clamp(-1.0, 1.0),
            throttle: accel.clamp(0.0, 1.0),
            brake: (-accel).clamp(0.0, 1.0),
        }),
        (true, &[steer, throttle, brake]) => Ok(VehicleControl {
            steer: steer.clamp(-1.0, 1.0),
            throttle: throttle.clamp(0.0, 1.0),
            brake: brake.clamp(0.0, 1.0),
        }),
        _ => Err(EnvError::InvalidAction(format!(
            "expected {} continuous values, got {}",
            if with_brake { 3 } else { 2 },
            values.len()
        ))),
    }
}
