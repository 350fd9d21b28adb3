//! Contracts consumed from the simulation backend.
//!
//! The simulator itself (physics, rendering, actor bookkeeping, process
//! management) lives outside this crate. `DrivingEnv` only talks to it
//! through these traits.

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, SensorUnavailable};

use super::config::ClockMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Location {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn offset(self, dx: f32, dy: f32, dz: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Rotation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: Location,
    pub rotation: Rotation,
}

/// Geodetic coordinate as reported by a GNSS sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoLocation {
    pub fn to_array(self) -> [f32; 3] {
        [
            self.latitude as f32,
            self.longitude as f32,
            self.altitude as f32,
        ]
    }
}

/// Nearest drivable-lane reference point for a location.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Waypoint {
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorBlueprint {
    /// Any four-wheeled traffic vehicle, picked by the backend.
    TrafficVehicle,
    /// Any pedestrian, picked by the backend.
    Pedestrian,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherSelection {
    Preset(String),
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldSettings {
    pub clock_mode: ClockMode,
    pub fixed_delta_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleControl {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

/// Raw sensor sample pulled from the ego vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub image: Array3<u8>,
    /// Flattened `points x channels` lidar returns.
    pub point_cloud: Vec<f32>,
    pub position: [f32; 3],
}

pub trait VehicleActor {
    fn id(&self) -> ActorId;
    fn apply_control(&mut self, control: VehicleControl) -> Result<(), BackendError>;
    fn transform(&self) -> Result<Transform, BackendError>;
    /// Speed in backend distance units per second.
    fn speed(&self) -> Result<f32, BackendError>;
    /// Whether a collision happened since the last call.
    fn collision_occurred(&mut self) -> bool;
    /// Whether a lane marking was crossed since the last call.
    fn lane_invasion_occurred(&mut self) -> bool;
    fn observation_data(&mut self) -> Result<SensorFrame, SensorUnavailable>;
}

pub trait SimulationBackend {
    type Vehicle: VehicleActor;

    fn apply_settings(&mut self, settings: WorldSettings) -> Result<(), BackendError>;
    fn tick(&mut self) -> Result<(), BackendError>;

    fn current_map(&self) -> Result<String, BackendError>;
    fn set_map(&mut self, name: &str) -> Result<(), BackendError>;
    fn reload_map(&mut self) -> Result<(), BackendError>;

    fn set_weather(&mut self, weather: &WeatherSelection) -> Result<(), BackendError>;
    fn active_weather(&self) -> String;

    /// Spawns the ego vehicle. `Ok(None)` means the pose was occupied.
    fn spawn_vehicle(
        &mut self,
        model: &str,
        pose: &Transform,
    ) -> Result<Option<Self::Vehicle>, BackendError>;
    fn spawn_actor(
        &mut self,
        blueprint: &ActorBlueprint,
        pose: &Transform,
    ) -> Result<Option<ActorId>, BackendError>;
    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), BackendError>;
    fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), BackendError>;

    fn place_spectator(&mut self, transform: &Transform) -> Result<(), BackendError>;
    fn spawn_points(&self) -> Result<Vec<Transform>, BackendError>;
    fn random_navigation_location(&mut self) -> Option<Location>;
    fn nearest_waypoint(&self, location: &Location) -> Result<Waypoint, BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle(pub u32);

/// Starts and stops the simulator process.
pub trait ProcessLifecycle {
    fn start(&mut self) -> Result<ProcessHandle, BackendError>;
    fn stop(&mut self, handle: ProcessHandle) -> Result<(), BackendError>;
}
