//! Scripted backend, vehicle and clock for exercising the episode loop
//! without a simulator.

use std::{
    cell::{Cell, RefCell},
    error::Error,
    rc::Rc,
    time::Duration,
};

use ndarray::Array3;

use crate::{
    common::{
        logger::{LogItem, Logger},
        timer::Clock,
    },
    error::{BackendError, SensorUnavailable},
};

use super::{
    backend::{
        ActorBlueprint, ActorId, GeoLocation, Location, ProcessHandle, ProcessLifecycle,
        Rotation, SensorFrame, SimulationBackend, Transform, VehicleActor, VehicleControl,
        Waypoint, WeatherSelection, WorldSettings,
    },
    catalog::{ScenarioDescriptor, Situation, TargetPosition, TrafficDensity},
    env::InterruptFlag,
    observation::ObservationShapes,
};

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

pub fn descriptor(name: &str, situation: Situation) -> ScenarioDescriptor {
    ScenarioDescriptor {
        name: name.to_string(),
        situation,
        map: "Town01".to_string(),
        weather: "ClearNoon".to_string(),
        initial_pose: Transform {
            location: Location::new(10.0, 20.0, 0.5),
            rotation: Rotation {
                yaw: 90.0,
                ..Default::default()
            },
        },
        target: TargetPosition {
            local: Location::new(200.0, 20.0, 0.5),
            geodetic: GeoLocation {
                latitude: 0.001,
                longitude: 0.002,
                altitude: 0.5,
            },
        },
        traffic_density: TrafficDensity::None,
    }
}

pub fn frame(shapes: &ObservationShapes, position: [f32; 3]) -> SensorFrame {
    SensorFrame {
        image: Array3::from_elem(shapes.image_dim(), 7),
        point_cloud: vec![0.5; shapes.point_cloud_len()],
        position,
    }
}

/// What the fake ego vehicle reports. Shared with the test so it can be
/// changed mid-episode.
#[derive(Debug, Clone)]
pub struct VehicleScript {
    pub transform: Transform,
    pub speed: f32,
    pub sensors_ready: bool,
    pub collision: bool,
    pub lane_invasion: bool,
    pub controls: Vec<VehicleControl>,
}

impl Default for VehicleScript {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            speed: 0.0,
            sensors_ready: true,
            collision: false,
            lane_invasion: false,
            controls: Vec::new(),
        }
    }
}

pub struct FakeVehicle {
    id: ActorId,
    shapes: ObservationShapes,
    script: Rc<RefCell<VehicleScript>>,
}

impl VehicleActor for FakeVehicle {
    fn id(&self) -> ActorId {
        self.id
    }

    fn apply_control(&mut self, control: VehicleControl) -> Result<(), BackendError> {
        self.script.borrow_mut().controls.push(control);
        Ok(())
    }

    fn transform(&self) -> Result<Transform, BackendError> {
        Ok(self.script.borrow().transform)
    }

    fn speed(&self) -> Result<f32, BackendError> {
        Ok(self.script.borrow().speed)
    }

    fn collision_occurred(&mut self) -> bool {
        std::mem::take(&mut self.script.borrow_mut().collision)
    }

    fn lane_invasion_occurred(&mut self) -> bool {
        std::mem::take(&mut self.script.borrow_mut().lane_invasion)
    }

    fn observation_data(&mut self) -> Result<SensorFrame, SensorUnavailable> {
        let script = self.script.borrow();
        if !script.sensors_ready {
            return Err(SensorUnavailable("rgb_camera".to_string()));
        }

        Ok(frame(&self.shapes, script.transform.location.to_array()))
    }
}

/// Every mutating call the fake backend has seen.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub settings: Vec<WorldSettings>,
    pub ticks: usize,
    pub set_map: Vec<String>,
    pub reloads: usize,
    pub weather: Vec<WeatherSelection>,
    pub spawned_poses: Vec<Transform>,
    pub destroyed: Vec<ActorId>,
    pub autopilot: Vec<(ActorId, bool)>,
    pub spectator: Vec<Transform>,
}

pub struct FakeBackend {
    clock: ManualClock,
    delta: Duration,
    map: String,
    weather: String,
    next_id: u64,
    pub shapes: ObservationShapes,
    pub log: CallLog,
    pub vehicle: Rc<RefCell<VehicleScript>>,
    /// Traffic spawns that report an occupied spawn point before any succeed.
    pub occupied_spawns: usize,
    /// Navigation locations left before the backend runs out.
    pub navigation_locations: usize,
    pub ego_spawn_blocked: bool,
    pub spawn_points_fail: bool,
    /// Added to the ego yaw when reporting the lane heading.
    pub lane_yaw_offset: f32,
    /// Lateral distance between the ego and its lane waypoint.
    pub lane_offset: f32,
    /// Raised as soon as the ego is spawned.
    pub interrupt_on_spawn: Option<InterruptFlag>,
}

impl FakeBackend {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            delta: Duration::from_millis(50),
            map: "Town01".to_string(),
            weather: "ClearNoon".to_string(),
            next_id: 1,
            shapes: ObservationShapes::default(),
            log: CallLog::default(),
            vehicle: Rc::new(RefCell::new(VehicleScript::default())),
            occupied_spawns: 0,
            navigation_locations: 100,
            ego_spawn_blocked: false,
            spawn_points_fail: false,
            lane_yaw_offset: 0.0,
            lane_offset: 0.0,
            interrupt_on_spawn: None,
        }
    }

    fn next_actor(&mut self) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl SimulationBackend for FakeBackend {
    type Vehicle = FakeVehicle;

    fn apply_settings(&mut self, settings: WorldSettings) -> Result<(), BackendError> {
        self.delta = Duration::from_secs_f64(settings.fixed_delta_seconds);
        self.log.settings.push(settings);
        Ok(())
    }

    fn tick(&mut self) -> Result<(), BackendError> {
        self.log.ticks += 1;
        self.clock.advance(self.delta);
        Ok(())
    }

    fn current_map(&self) -> Result<String, BackendError> {
        Ok(self.map.clone())
    }

    fn set_map(&mut self, name: &str) -> Result<(), BackendError> {
        self.map = name.to_string();
        self.log.set_map.push(name.to_string());
        Ok(())
    }

    fn reload_map(&mut self) -> Result<(), BackendError> {
        self.log.reloads += 1;
        Ok(())
    }

    fn set_weather(&mut self, weather: &WeatherSelection) -> Result<(), BackendError> {
        self.weather = match weather {
            WeatherSelection::Preset(name) => name.clone(),
            WeatherSelection::Random => "WetCloudySunset".to_string(),
        };
        self.log.weather.push(weather.clone());
        Ok(())
    }

    fn active_weather(&self) -> String {
        self.weather.clone()
    }

    fn spawn_vehicle(
        &mut self,
        _model: &str,
        pose: &Transform,
    ) -> Result<Option<FakeVehicle>, BackendError> {
        if self.ego_spawn_blocked {
            return Ok(None);
        }

        let id = self.next_actor();
        self.vehicle.borrow_mut().transform = *pose;
        if let Some(flag) = &self.interrupt_on_spawn {
            flag.raise();
        }

        Ok(Some(FakeVehicle {
            id,
            shapes: self.shapes,
            script: Rc::clone(&self.vehicle),
        }))
    }

    fn spawn_actor(
        &mut self,
        blueprint: &ActorBlueprint,
        pose: &Transform,
    ) -> Result<Option<ActorId>, BackendError> {
        if *blueprint == ActorBlueprint::TrafficVehicle && self.occupied_spawns > 0 {
            self.occupied_spawns -= 1;
            return Ok(None);
        }

        self.log.spawned_poses.push(*pose);
        Ok(Some(self.next_actor()))
    }

    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), BackendError> {
        self.log.destroyed.push(actor);
        Ok(())
    }

    fn set_autopilot(&mut self, actor: ActorId, enabled: bool) -> Result<(), BackendError> {
        self.log.autopilot.push((actor, enabled));
        Ok(())
    }

    fn place_spectator(&mut self, transform: &Transform) -> Result<(), BackendError> {
        self.log.spectator.push(*transform);
        Ok(())
    }

    fn spawn_points(&self) -> Result<Vec<Transform>, BackendError> {
        if self.spawn_points_fail {
            return Err(BackendError::call("spawn_points", "map has no spawn points"));
        }

        Ok((0..30)
            .map(|i| Transform {
                location: Location::new(i as f32 * 10.0, 0.0, 0.5),
                rotation: Rotation::default(),
            })
            .collect())
    }

    fn random_navigation_location(&mut self) -> Option<Location> {
        if self.navigation_locations == 0 {
            return None;
        }
        self.navigation_locations -= 1;

        Some(Location::new(self.navigation_locations as f32, 5.0, 0.0))
    }

    fn nearest_waypoint(&self, location: &Location) -> Result<Waypoint, BackendError> {
        let yaw = self.vehicle.borrow().transform.rotation.yaw + self.lane_yaw_offset;

        Ok(Waypoint {
            transform: Transform {
                location: location.offset(0.0, self.lane_offset, 0.0),
                rotation: Rotation {
                    yaw,
                    ..Default::default()
                },
            },
        })
    }
}

/// Counts lifecycle calls.
#[derive(Debug, Clone, Default)]
pub struct FakeLifecycle {
    pub starts: Rc<Cell<usize>>,
    pub stops: Rc<Cell<usize>>,
}

impl ProcessLifecycle for FakeLifecycle {
    fn start(&mut self) -> Result<ProcessHandle, BackendError> {
        self.starts.set(self.starts.get() + 1);
        Ok(ProcessHandle(4242))
    }

    fn stop(&mut self, _handle: ProcessHandle) -> Result<(), BackendError> {
        self.stops.set(self.stops.get() + 1);
        Ok(())
    }
}

/// Logger whose items stay readable after it is boxed into the env.
#[derive(Debug, Clone, Default)]
pub struct SharedLogger {
    pub items: Rc<RefCell<Vec<LogItem>>>,
}

impl Logger for SharedLogger {
    fn log(&mut self, data: LogItem) {
        self.items.borrow_mut().push(data);
    }

    fn dump(&self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn check_can_log(&self, _try_to_fix: bool) -> Result<(), &str> {
        Ok(())
    }
}
