//! Weighted multi-term reward.
//!
//! Every term is evaluated on every step and multiplied by its weight, even
//! when it is zero, so the total is a pure function of the inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::utils::{euclidean_distance, normalize_degrees, planar_distance};

use super::backend::{Location, Waypoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTerm {
    /// Cosine of the heading error against the lane.
    Orientation,
    /// Planar distance to the lane waypoint.
    Distance,
    /// Efficiency bonus for reaching the target. Terminates.
    Destination,
    /// Collision or lane invasion. Terminates. The sign lives in the weight.
    Collision,
    /// The episode ran out of time. Never terminates by itself.
    TimeLimit,
    /// Per-step bonus for moving while the episode is live.
    TimeDriving,
    /// Throttle and brake pressed together.
    ThrottleBrake,
}

impl RewardTerm {
    pub const ALL: [RewardTerm; 7] = [
        RewardTerm::Orientation,
        RewardTerm::Distance,
        RewardTerm::Destination,
        RewardTerm::Collision,
        RewardTerm::TimeLimit,
        RewardTerm::TimeDriving,
        RewardTerm::ThrottleBrake,
    ];
}

/// Coefficients per reward term. Terms without an entry weigh zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardWeights(BTreeMap<RewardTerm, f32>);

impl Default for RewardWeights {
    fn default() -> Self {
        Self::from_iter([
            (RewardTerm::Orientation, 0.1),
            (RewardTerm::Distance, -0.05),
            (RewardTerm::Destination, 1.0),
            (RewardTerm::Collision, -1.0),
            (RewardTerm::TimeLimit, -0.5),
            (RewardTerm::TimeDriving, 0.01),
            (RewardTerm::ThrottleBrake, 0.0),
        ])
    }
}

impl FromIterator<(RewardTerm, f32)> for RewardWeights {
    fn from_iter<T: IntoIterator<Item = (RewardTerm, f32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl RewardWeights {
    pub fn weight(&self, term: RewardTerm) -> f32 {
        self.0.get(&term).copied().unwrap_or(0.0)
    }

    pub fn with(mut self, term: RewardTerm, weight: f32) -> Self {
        self.0.insert(term, weight);
        self
    }
}

/// What the engine needs to know about the ego vehicle this step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleState {
    pub location: Location,
    /// Heading in degrees.
    pub yaw: f32,
    pub speed: f32,
    pub collision: bool,
    pub lane_invasion: bool,
    pub throttle: f32,
    pub brake: f32,
}

/// Episode bookkeeping the reward depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardContext {
    pub steps: usize,
    pub max_steps: usize,
    pub target: Location,
    pub time_limit_reached: bool,
    /// The episode already ended on an earlier step.
    pub already_terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermValue {
    pub term: RewardTerm,
    pub raw: f32,
    pub weighted: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardOutcome {
    pub reward: f32,
    pub terminate: bool,
    pub terms: Vec<TermValue>,
}

impl RewardOutcome {
    pub fn weighted(&self, term: RewardTerm) -> f32 {
        self.terms
            .iter()
            .find(|t| t.term == term)
            .map(|t| t.weighted)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct RewardEngine {
    weights: RewardWeights,
    destination_radius: f32,
    destination_floor: f32,
    min_driving_speed: f32,
}

impl RewardEngine {
    pub fn new(weights: RewardWeights) -> Self {
        Self {
            weights,
            destination_radius: 2.0,
            destination_floor: 0.35,
            min_driving_speed: 1.0,
        }
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }

    pub fn orientation(vehicle_yaw: f32, waypoint_yaw: f32) -> f32 {
        let diff = normalize_degrees(vehicle_yaw) - normalize_degrees(waypoint_yaw);
        (diff as f64).to_radians().cos() as f32
    }

    pub fn distance(vehicle: &Location, waypoint: &Location) -> f32 {
        planar_distance(vehicle.to_array(), waypoint.to_array())
    }

    /// Raw destination bonus, and whether the target was reached.
    pub fn destination(&self, vehicle: &Location, ctx: &RewardContext) -> (f32, bool) {
        let reached =
            euclidean_distance(vehicle.to_array(), ctx.target.to_array()) < self.destination_radius;
        if !reached {
            return (0.0, false);
        }

        let progress = ctx.steps as f32 / ctx.max_steps.max(1) as f32;
        ((1.0 - progress).max(self.destination_floor), true)
    }

    pub fn compute(
        &self,
        vehicle: &VehicleState,
        waypoint: &Waypoint,
        ctx: &RewardContext,
    ) -> RewardOutcome {
        let orientation = Self::orientation(vehicle.yaw, waypoint.transform.rotation.yaw);
        let distance = Self::distance(&vehicle.location, &waypoint.transform.location);
        let (destination, reached) = self.destination(&vehicle.location, ctx);

        let crashed = vehicle.collision || vehicle.lane_invasion;
        let collision = if crashed { 1.0 } else { 0.0 };

        let time_limit = if ctx.time_limit_reached { 1.0 } else { 0.0 };

        let terminate = reached || crashed;
        let live = !terminate && !ctx.already_terminal;
        let time_driving = if live && vehicle.speed > self.min_driving_speed {
            1.0
        } else {
            0.0
        };

        let throttle_brake = if vehicle.throttle > 0.0 && vehicle.brake > 0.0 {
            1.0
        } else {
            0.0
        };

        let terms: Vec<TermValue> = [
            (RewardTerm::Orientation, orientation),
            (RewardTerm::Distance, distance),
            (RewardTerm::Destination, destination),
            (RewardTerm::Collision, collision),
            (RewardTerm::TimeLimit, time_limit),
            (RewardTerm::TimeDriving, time_driving),
            (RewardTerm::ThrottleBrake, throttle_brake),
        ]
        .into_iter()
        .map(|(term, raw)| TermValue {
            term,
            raw,
            weighted: raw * self.weights.weight(term),
        })
        .collect();

        RewardOutcome {
            reward: terms.iter().map(|t| t.weighted).sum(),
            terminate,
            terms,
        }
    }
}

#[cfg(test)]
mod test {
    use assert_approx_eq::assert_approx_eq;

    use crate::env::driving::backend::{Location, Rotation, Transform, Waypoint};

    use super::{RewardContext, RewardEngine, RewardTerm, RewardWeights, VehicleState};

    fn waypoint(x: f32, y: f32, yaw: f32) -> Waypoint {
        Waypoint {
            transform: Transform {
                location: Location::new(x, y, 0.0),
                rotation: Rotation {
                    yaw,
                    ..Default::default()
                },
            },
        }
    }

    fn ctx(target: Location, steps: usize) -> RewardContext {
        RewardContext {
            steps,
            max_steps: 100,
            target,
            time_limit_reached: false,
            already_terminal: false,
        }
    }

    fn unit_weights() -> RewardWeights {
        RewardTerm::ALL.into_iter().map(|t| (t, 1.0)).collect()
    }

    #[test]
    fn test_orientation_aligned_and_opposite() {
        assert_eq!(RewardEngine::orientation(90.0, 90.0), 1.0);
        assert_eq!(RewardEngine::orientation(450.0, 90.0), 1.0);
        assert_eq!(RewardEngine::orientation(-90.0, 270.0), 1.0);
        assert_approx_eq!(RewardEngine::orientation(0.0, 180.0), -1.0);
        assert_approx_eq!(RewardEngine::orientation(10.0, -170.0), -1.0);
        assert_approx_eq!(RewardEngine::orientation(0.0, 90.0), 0.0);
    }

    #[test]
    fn test_distance_ignores_height() {
        let d = RewardEngine::distance(&Location::new(0.0, 0.0, 10.0), &Location::new(3.0, 4.0, 0.0));
        assert_approx_eq!(d, 5.0);
    }

    #[test]
    fn test_destination_at_target() {
        let engine = RewardEngine::new(unit_weights());
        let target = Location::new(50.0, 50.0, 0.0);

        let (bonus, reached) = engine.destination(&target, &ctx(target, 20));
        assert!(reached);
        assert_approx_eq!(bonus, 0.8);

        // late arrivals still get the floor
        let (bonus, reached) = engine.destination(&target, &ctx(target, 90));
        assert!(reached);
        assert_approx_eq!(bonus, 0.35);
    }

    #[test]
    fn test_destination_outside_radius() {
        let engine = RewardEngine::new(unit_weights());
        let target = Location::new(0.0, 0.0, 0.0);

        let (bonus, reached) = engine.destination(&Location::new(2.0, 0.0, 0.0), &ctx(target, 1));
        assert!(!reached);
        assert_eq!(bonus, 0.0);
    }

    #[test]
    fn test_reaching_target_terminates() {
        let engine = RewardEngine::new(unit_weights());
        let target = Location::new(5.0, 0.0, 0.0);
        let vehicle = VehicleState {
            location: Location::new(5.0, 0.5, 0.0),
            speed: 4.0,
            ..Default::default()
        };

        let out = engine.compute(&vehicle, &waypoint(5.0, 0.0, 0.0), &ctx(target, 10));

        assert!(out.terminate);
        assert_approx_eq!(out.weighted(RewardTerm::Destination), 0.9);
        // no driving bonus on the terminal step
        assert_eq!(out.weighted(RewardTerm::TimeDriving), 0.0);
        assert_approx_eq!(out.reward, 1.0 + 0.5 + 0.9);
    }

    #[test]
    fn test_collision_sign_follows_weight() {
        let vehicle = VehicleState {
            collision: true,
            ..Default::default()
        };
        let far = ctx(Location::new(100.0, 0.0, 0.0), 1);
        let wp = waypoint(0.0, 0.0, 0.0);

        let penalty = RewardEngine::new(RewardWeights::default().with(RewardTerm::Collision, -1.0))
            .compute(&vehicle, &wp, &far);
        let bonus = RewardEngine::new(RewardWeights::default().with(RewardTerm::Collision, 1.0))
            .compute(&vehicle, &wp, &far);

        assert!(penalty.terminate && bonus.terminate);
        assert_eq!(penalty.weighted(RewardTerm::Collision), -1.0);
        assert_eq!(bonus.weighted(RewardTerm::Collision), 1.0);
    }

    #[test]
    fn test_lane_invasion_terminates() {
        let vehicle = VehicleState {
            lane_invasion: true,
            ..Default::default()
        };
        let out = RewardEngine::new(unit_weights()).compute(
            &vehicle,
            &waypoint(0.0, 0.0, 0.0),
            &ctx(Location::new(100.0, 0.0, 0.0), 1),
        );

        assert!(out.terminate);
    }

    #[test]
    fn test_time_limit_does_not_terminate() {
        let mut c = ctx(Location::new(100.0, 0.0, 0.0), 1);
        c.time_limit_reached = true;

        let out = RewardEngine::new(unit_weights()).compute(
            &VehicleState::default(),
            &waypoint(0.0, 0.0, 0.0),
            &c,
        );

        assert!(!out.terminate);
        assert_eq!(out.weighted(RewardTerm::TimeLimit), 1.0);
    }

    #[test]
    fn test_time_driving_needs_speed_and_live_episode() {
        let engine = RewardEngine::new(unit_weights());
        let wp = waypoint(0.0, 0.0, 0.0);
        let mut c = ctx(Location::new(100.0, 0.0, 0.0), 1);

        let slow = VehicleState {
            speed: 1.0,
            ..Default::default()
        };
        let fast = VehicleState {
            speed: 1.5,
            ..Default::default()
        };

        assert_eq!(engine.compute(&slow, &wp, &c).weighted(RewardTerm::TimeDriving), 0.0);
        assert_eq!(engine.compute(&fast, &wp, &c).weighted(RewardTerm::TimeDriving), 1.0);

        c.already_terminal = true;
        assert_eq!(engine.compute(&fast, &wp, &c).weighted(RewardTerm::TimeDriving), 0.0);
    }

    #[test]
    fn test_throttle_brake_conflict() {
        let engine = RewardEngine::new(unit_weights());
        let both = VehicleState {
            throttle: 0.5,
            brake: 0.2,
            ..Default::default()
        };

        let out = engine.compute(
            &both,
            &waypoint(0.0, 0.0, 0.0),
            &ctx(Location::new(100.0, 0.0, 0.0), 1),
        );
        assert_eq!(out.weighted(RewardTerm::ThrottleBrake), 1.0);
    }

    #[test]
    fn test_every_term_is_reported() {
        let engine = RewardEngine::new(RewardWeights::from_iter([]));
        let out = engine.compute(
            &VehicleState::default(),
            &waypoint(3.0, 4.0, 0.0),
            &ctx(Location::new(100.0, 0.0, 0.0), 1),
        );

        assert_eq!(out.terms.len(), RewardTerm::ALL.len());
        assert_eq!(out.reward, 0.0);
        assert_approx_eq!(out.terms[1].raw, 5.0);
    }
}
