use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    common::{
        logger::{LogData, LogItem, Logger},
        spaces::{seed_spaces_rng, Space},
        timer::{Clock, SystemClock, TruncationTimer},
    },
    env::base::{Env, EnvObservation, ResetOptions, RewardRange, SeedValue},
    error::{BackendError, ConfigurationError, EnvError, Result, SensorUnavailable},
};

use super::{
    action::{Action, ControlState},
    backend::{
        ProcessHandle, ProcessLifecycle, SimulationBackend, Transform, VehicleActor,
        WeatherSelection, WorldSettings,
    },
    catalog::{ScenarioCatalog, ScenarioDescriptor},
    config::{ClockMode, EnvConfig},
    observation::{Observation, ObservationAssembler, ObservationSpace},
    reward::{RewardContext, RewardEngine, VehicleState},
    seeding::{choose_scenario, traffic_count},
    traffic::TrafficPopulator,
};

/// Spectator offset from the ego start pose: behind and above.
const SPECTATOR_OFFSET: (f32, f32, f32) = (-6.0, 0.0, 2.5);

/// Out-of-band cancellation shared with a signal handler.
///
/// The episode loop polls it at every suspension point. When raised, the
/// current scenario is cleaned up and the call returns
/// [`EnvError::Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    Idle,
    Loading,
    Ready,
    Running,
    Ending,
    /// Actors are cleaned up but the ended episode's flags stay observable.
    Finished,
}

#[derive(Debug, Clone)]
pub struct EpisodeState {
    /// Scenario of the current or most recent episode.
    pub active: Option<ScenarioDescriptor>,
    pub steps: usize,
    pub terminal: bool,
    pub truncated: bool,
    pub time_limit_reached: bool,
    /// No map has been applied yet in this process.
    pub first_episode: bool,
    pub last_observation: Option<Observation>,
    pub episode_reward: f32,
}

impl Default for EpisodeState {
    fn default() -> Self {
        Self {
            active: None,
            steps: 0,
            terminal: false,
            truncated: false,
            time_limit_reached: false,
            first_episode: true,
            last_observation: None,
            episode_reward: 0.0,
        }
    }
}

impl EpisodeState {
    fn begin(&mut self, descriptor: ScenarioDescriptor, first: Observation) {
        *self = Self {
            active: Some(descriptor),
            first_episode: self.first_episode,
            last_observation: Some(first),
            ..Self::default()
        };
    }
}

/// Episodic driving environment on top of a [`SimulationBackend`].
pub struct DrivingEnv<B: SimulationBackend, C: Clock = SystemClock> {
    config: EnvConfig,
    catalog: ScenarioCatalog,
    backend: B,
    clock: C,
    rng: StdRng,
    assembler: ObservationAssembler,
    rewards: RewardEngine,
    controls: ControlState,
    timer: TruncationTimer,
    traffic: TrafficPopulator,
    ego: Option<B::Vehicle>,
    state: EpisodeState,
    phase: EpisodePhase,
    interrupt: InterruptFlag,
    logger: Option<Box<dyn Logger>>,
    server: Option<(Box<dyn ProcessLifecycle>, ProcessHandle)>,
}

impl<B: SimulationBackend, C: Clock> DrivingEnv<B, C> {
    /// Builds an environment around an already connected backend.
    ///
    /// The catalog is narrowed to `config.situations`; an empty result is a
    /// configuration error.
    pub fn new(config: EnvConfig, catalog: ScenarioCatalog, mut backend: B, clock: C) -> Result<Self> {
        config.validate()?;

        let catalog = catalog.filter(&config.situations);
        if catalog.is_empty() {
            return Err(ConfigurationError::EmptyCatalog.into());
        }

        backend.apply_settings(WorldSettings {
            clock_mode: config.clock_mode,
            fixed_delta_seconds: config.fixed_delta_seconds,
        })?;

        let rng = match config.seed {
            Some(seed) => {
                seed_spaces_rng(seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        tracing::info!(
            scenarios = catalog.len(),
            clock_mode = ?config.clock_mode,
            "driving environment ready"
        );

        Ok(Self {
            assembler: ObservationAssembler::new(config.observation),
            rewards: RewardEngine::new(config.reward_weights.clone()),
            timer: TruncationTimer::new(config.time_limit()),
            config,
            catalog,
            backend,
            clock,
            rng,
            controls: ControlState::default(),
            traffic: TrafficPopulator::default(),
            ego: None,
            state: EpisodeState::default(),
            phase: EpisodePhase::Idle,
            interrupt: InterruptFlag::default(),
            logger: None,
            server: None,
        })
    }

    /// Starts the simulator process, connects to it, and builds the
    /// environment. The process is stopped again if anything fails, and on
    /// `close`.
    pub fn with_server<F>(
        config: EnvConfig,
        catalog: ScenarioCatalog,
        mut lifecycle: Box<dyn ProcessLifecycle>,
        connect: F,
        clock: C,
    ) -> Result<Self>
    where
        F: FnOnce(&ProcessHandle) -> std::result::Result<B, BackendError>,
    {
        let handle = lifecycle.start()?;
        tracing::info!(pid = handle.0, "simulator process started");

        let built = connect(&handle)
            .map_err(EnvError::from)
            .and_then(|backend| Self::new(config, catalog, backend, clock));

        match built {
            Ok(mut env) => {
                env.server = Some((lifecycle, handle));
                Ok(env)
            }
            Err(e) => {
                if let Err(stop_err) = lifecycle.stop(handle) {
                    tracing::warn!(error = %stop_err, "could not stop simulator process");
                }
                Err(e)
            }
        }
    }

    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Episode summaries go to `logger` from now on.
    pub fn set_logger(&mut self, logger: Box<dyn Logger>) {
        self.logger = Some(logger);
    }

    pub fn take_logger(&mut self) -> Option<Box<dyn Logger>> {
        self.logger.take()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Destroys the ego vehicle and every spawned actor.
    ///
    /// Does nothing when no actors are alive, so repeated calls are safe.
    pub fn clean(&mut self) {
        if let Some(ego) = self.ego.take() {
            let id = ego.id();
            if let Err(e) = self.backend.destroy_actor(id) {
                tracing::warn!(actor = id.0, error = %e, "could not destroy ego vehicle");
            }
        }
        self.traffic.destroy_all(&mut self.backend);
        self.timer.stop();
        self.phase = EpisodePhase::Idle;
    }

    fn check_interrupt(&mut self, during: &'static str) -> Result<()> {
        if !self.interrupt.is_raised() {
            return Ok(());
        }

        tracing::warn!(during, "interrupt received, cleaning up");
        self.clean();
        Err(EnvError::Interrupted(during))
    }

    fn lock_step(&self) -> bool {
        self.config.clock_mode == ClockMode::LockStep
    }

    fn select_scenario(
        &mut self,
        seed: Option<&SeedValue>,
        options: Option<ResetOptions>,
    ) -> Result<ScenarioDescriptor> {
        let requested = options.and_then(|o| o.scenario_name);

        let name = match requested {
            Some(name) if self.catalog.contains(&name) => name,
            Some(name) => {
                tracing::warn!(scenario = %name, "unknown scenario, choosing a random one");
                choose_scenario(&self.catalog, None, &mut self.rng)?
            }
            None => choose_scenario(&self.catalog, seed, &mut self.rng)?,
        };

        Ok(self.catalog.get(&name)?.clone())
    }

    fn apply_map(&mut self, map: &str) -> Result<()> {
        let current = self.backend.current_map()?;
        // backends may report a full asset path such as `/Game/Maps/Town01`
        let same_map = current.rsplit('/').next() == Some(map);

        if !same_map {
            tracing::info!(from = %current, to = map, "loading map");
            self.backend.set_map(map)?;
        } else if self.state.first_episode {
            // the first load of an already open map leaves stale actors
            self.backend.reload_map()?;
        }
        self.state.first_episode = false;

        Ok(())
    }

    fn load_scenario(&mut self, descriptor: &ScenarioDescriptor, seed: Option<&SeedValue>) -> Result<()> {
        self.check_interrupt("scenario load")?;

        self.apply_map(&descriptor.map)?;

        let weather = if self.config.random_weather {
            WeatherSelection::Random
        } else {
            WeatherSelection::Preset(descriptor.weather.clone())
        };
        self.backend.set_weather(&weather)?;

        let ego = self
            .backend
            .spawn_vehicle(&self.config.vehicle_model, &descriptor.initial_pose)?
            .ok_or_else(|| EnvError::EgoSpawnFailed(descriptor.name.clone()))?;
        self.ego = Some(ego);

        let (dx, dy, dz) = SPECTATOR_OFFSET;
        self.backend.place_spectator(&Transform {
            location: descriptor.initial_pose.location.offset(dx, dy, dz),
            rotation: descriptor.initial_pose.rotation,
        })?;

        let (plan, mut traffic_rng) = traffic_count(
            descriptor,
            self.config.random_traffic,
            seed.and_then(SeedValue::as_u64),
            &mut self.rng,
        );
        let vehicles = self.traffic.populate(
            &mut self.backend,
            &plan,
            &mut traffic_rng,
            self.config.traffic_autopilot,
        );
        let pedestrians = self
            .traffic
            .spawn_pedestrians(&mut self.backend, self.config.pedestrians);

        if self.lock_step() {
            self.backend.tick()?;
            self.check_interrupt("scenario load")?;
        }

        self.clock.sleep(self.config.settle_delay());
        self.check_interrupt("scenario load")?;

        tracing::info!(
            scenario = %descriptor.name,
            weather = %self.backend.active_weather(),
            vehicles,
            pedestrians,
            traffic_seed = ?plan.effective_seed,
            "scenario loaded"
        );

        Ok(())
    }

    fn observe(&mut self, descriptor: &ScenarioDescriptor) -> Observation {
        let frame = match self.ego.as_mut() {
            Some(ego) => ego.observation_data(),
            None => Err(SensorUnavailable("no ego vehicle".to_string())),
        };

        self.assembler.assemble(frame, descriptor)
    }

    fn finish_episode(&mut self, descriptor: &ScenarioDescriptor) {
        self.phase = EpisodePhase::Ending;
        let elapsed = self.timer.elapsed(self.clock.now()).as_secs_f32();

        tracing::info!(
            scenario = %descriptor.name,
            steps = self.state.steps,
            reward = self.state.episode_reward,
            terminated = self.state.terminal,
            truncated = self.state.truncated,
            elapsed,
            "episode finished"
        );

        if let Some(logger) = self.logger.as_mut() {
            logger.log(
                LogItem::default()
                    .push("scenario", LogData::String(descriptor.name.clone()))
                    .push("ep_len", LogData::Int(self.state.steps as i32))
                    .push("ep_reward", LogData::Float(self.state.episode_reward))
                    .push("terminated", LogData::Bool(self.state.terminal))
                    .push("truncated", LogData::Bool(self.state.truncated))
                    .push("elapsed_secs", LogData::Float(elapsed)),
            );
        }

        self.clean();
        self.phase = EpisodePhase::Finished;
    }

    /// Answers a step on an ended episode without touching the simulator:
    /// the last observation, no reward, and the latched end flags.
    fn repeat_finished(&mut self) -> Result<EnvObservation<Observation, ScenarioDescriptor>> {
        self.check_interrupt("step")?;

        let info = self.state.active.clone().ok_or(EnvError::NeedsReset)?;
        let obs = self
            .state
            .last_observation
            .clone()
            .ok_or(EnvError::NeedsReset)?;
        tracing::debug!(scenario = %info.name, "step on a finished episode");

        Ok(EnvObservation {
            obs,
            reward: 0.0,
            terminated: self.state.terminal,
            truncated: self.state.truncated,
            info,
        })
    }
}

impl<B: SimulationBackend, C: Clock> Env<Observation, Action> for DrivingEnv<B, C> {
    type Info = ScenarioDescriptor;

    fn reset(
        &mut self,
        seed: Option<SeedValue>,
        options: Option<ResetOptions>,
    ) -> Result<(Observation, ScenarioDescriptor)> {
        if self.phase != EpisodePhase::Idle {
            self.clean();
        }

        let descriptor = self.select_scenario(seed.as_ref(), options)?;

        self.phase = EpisodePhase::Loading;
        tracing::info!(
            scenario = %descriptor.name,
            map = %descriptor.map,
            situation = %descriptor.situation,
            "loading scenario"
        );

        if let Err(e) = self.load_scenario(&descriptor, seed.as_ref()) {
            tracing::warn!(scenario = %descriptor.name, error = %e, "scenario load failed");
            self.clean();
            return Err(e);
        }

        self.controls.reset();
        self.timer.start(self.clock.now());
        let obs = self.observe(&descriptor);
        self.state.begin(descriptor.clone(), obs.clone());
        self.phase = EpisodePhase::Ready;

        Ok((obs, descriptor))
    }

    fn step(&mut self, action: &Action) -> Result<EnvObservation<Observation, ScenarioDescriptor>> {
        if self.phase == EpisodePhase::Finished {
            return self.repeat_finished();
        }
        if !matches!(self.phase, EpisodePhase::Ready | EpisodePhase::Running) {
            return Err(EnvError::NeedsReset);
        }
        let descriptor = self.state.active.clone().ok_or(EnvError::NeedsReset)?;

        if self.lock_step() {
            self.backend.tick()?;
        }
        self.check_interrupt("step")?;

        let control = self.controls.apply(action, &self.config.action_mode)?;
        self.ego
            .as_mut()
            .ok_or(EnvError::NeedsReset)?
            .apply_control(control)?;
        self.phase = EpisodePhase::Running;
        self.state.steps += 1;

        let obs = self.observe(&descriptor);

        let ego = self.ego.as_mut().ok_or(EnvError::NeedsReset)?;
        let transform = ego.transform()?;
        let vehicle = VehicleState {
            location: transform.location,
            yaw: transform.rotation.yaw,
            speed: ego.speed()?,
            collision: ego.collision_occurred(),
            lane_invasion: ego.lane_invasion_occurred(),
            throttle: control.throttle,
            brake: control.brake,
        };
        let waypoint = self.backend.nearest_waypoint(&transform.location)?;

        let time_up = self.timer.check(self.clock.now());
        self.state.time_limit_reached = time_up;

        let outcome = self.rewards.compute(
            &vehicle,
            &waypoint,
            &RewardContext {
                steps: self.state.steps,
                max_steps: self.config.max_steps,
                target: descriptor.target.local,
                time_limit_reached: time_up,
                already_terminal: self.state.terminal,
            },
        );
        tracing::debug!(
            step = self.state.steps,
            reward = outcome.reward,
            terms = ?outcome.terms,
            "step reward"
        );

        self.state.terminal |= outcome.terminate;
        self.state.truncated |= time_up;
        self.state.episode_reward += outcome.reward;
        self.state.last_observation = Some(obs.clone());

        let (terminated, truncated) = (self.state.terminal, self.state.truncated);
        if terminated || truncated {
            self.finish_episode(&descriptor);
        }

        Ok(EnvObservation {
            obs,
            reward: outcome.reward,
            terminated,
            truncated,
            info: descriptor,
        })
    }

    fn action_space(&self) -> Box<dyn Space<Action>> {
        Box::new(self.config.action_mode.space())
    }

    fn observation_space(&self) -> Box<dyn Space<Observation>> {
        Box::new(ObservationSpace::from(self.config.observation))
    }

    fn reward_range(&self) -> RewardRange {
        RewardRange {
            low: f32::NEG_INFINITY,
            high: f32::INFINITY,
        }
    }

    /// Cleans up, then stops the simulator process if this env started it.
    fn close(&mut self) {
        self.clean();

        if let Some((mut lifecycle, handle)) = self.server.take() {
            match lifecycle.stop(handle) {
                Ok(()) => tracing::info!(pid = handle.0, "simulator process stopped"),
                Err(e) => tracing::warn!(error = %e, "could not stop simulator process"),
            }
        }
    }
}

impl<B: SimulationBackend, C: Clock> Drop for DrivingEnv<B, C> {
    fn drop(&mut self) {
        <Self as Env<Observation, Action>>::close(self);
    }
}
