use crate::{common::spaces::Space, error::Result};

/// Seed handed to `reset` by a training loop.
///
/// Scripts are loose about seed types, so non-integer values are accepted
/// here and dealt with by the environment.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SeedValue {
    /// The seed as an integer, if it is integer-like.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SeedValue::Int(v) => Some(*v as u64),
            SeedValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64 as u64),
            _ => None,
        }
    }
}

impl From<i64> for SeedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for SeedValue {
    fn from(value: u64) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for SeedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SeedValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOptions {
    /// Load this scenario instead of drawing one.
    pub scenario_name: Option<String>,
}

impl ResetOptions {
    pub fn scenario(name: impl Into<String>) -> Self {
        Self {
            scenario_name: Some(name.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnvObservation<O, I> {
    pub obs: O,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: I,
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct RewardRange {
    pub low: f32,
    pub high: f32,
}

pub trait Env<O: Clone, A: Clone> {
    type Info;

    fn step(&mut self, action: &A) -> Result<EnvObservation<O, Self::Info>>;
    fn reset(
        &mut self,
        seed: Option<SeedValue>,
        options: Option<ResetOptions>,
    ) -> Result<(O, Self::Info)>;
    fn action_space(&self) -> Box<dyn Space<A>>;
    fn observation_space(&self) -> Box<dyn Space<O>>;
    fn reward_range(&self) -> RewardRange;
    fn close(&mut self);
}
