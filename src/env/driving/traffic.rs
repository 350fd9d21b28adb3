use rand::{rngs::StdRng, seq::SliceRandom};

use super::{
    backend::{ActorBlueprint, ActorId, Rotation, SimulationBackend, Transform},
    seeding::TrafficPlan,
};

/// Owns every non-ego actor spawned for an episode.
#[derive(Debug, Default)]
pub struct TrafficPopulator {
    vehicles: Vec<ActorId>,
    pedestrians: Vec<ActorId>,
}

impl TrafficPopulator {
    pub fn vehicles(&self) -> &[ActorId] {
        &self.vehicles
    }

    pub fn pedestrians(&self) -> &[ActorId] {
        &self.pedestrians
    }

    /// Spawns `plan.vehicles` traffic vehicles on shuffled spawn points.
    ///
    /// Occupied or failing spawn points are skipped, so fewer vehicles than
    /// planned may appear. When the spawn points cannot be listed at all the
    /// episode runs without traffic. Returns how many were spawned.
    pub fn populate<B: SimulationBackend>(
        &mut self,
        backend: &mut B,
        plan: &TrafficPlan,
        rng: &mut StdRng,
        autopilot: bool,
    ) -> usize {
        if plan.vehicles == 0 {
            return 0;
        }

        let mut spawn_points = match backend.spawn_points() {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(error = %e, "spawn points unavailable, skipping traffic");
                return 0;
            }
        };
        spawn_points.shuffle(rng);

        let mut spawned = 0;
        for pose in spawn_points.iter().take(plan.vehicles) {
            match backend.spawn_actor(&ActorBlueprint::TrafficVehicle, pose) {
                Ok(Some(id)) => {
                    if let Err(e) = backend.set_autopilot(id, autopilot) {
                        tracing::warn!(actor = id.0, error = %e, "could not set autopilot");
                    }
                    self.vehicles.push(id);
                    spawned += 1;
                }
                Ok(None) => tracing::debug!(?pose, "spawn point occupied, skipping"),
                Err(e) => tracing::warn!(error = %e, "traffic spawn failed, skipping"),
            }
        }

        if spawned < plan.vehicles {
            tracing::info!(planned = plan.vehicles, spawned, "traffic partially spawned");
        }

        spawned
    }

    /// Spawns up to `count` pedestrians at random navigable locations.
    pub fn spawn_pedestrians<B: SimulationBackend>(&mut self, backend: &mut B, count: usize) -> usize {
        let mut spawned = 0;
        for _ in 0..count {
            let Some(location) = backend.random_navigation_location() else {
                continue;
            };
            let pose = Transform {
                location,
                rotation: Rotation::default(),
            };

            match backend.spawn_actor(&ActorBlueprint::Pedestrian, &pose) {
                Ok(Some(id)) => {
                    self.pedestrians.push(id);
                    spawned += 1;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "pedestrian spawn failed, skipping"),
            }
        }

        spawned
    }

    /// Destroys every tracked actor. Safe to call repeatedly.
    pub fn destroy_all<B: SimulationBackend>(&mut self, backend: &mut B) {
        for id in self.vehicles.drain(..).chain(self.pedestrians.drain(..)) {
            if let Err(e) = backend.destroy_actor(id) {
                tracing::warn!(actor = id.0, error = %e, "could not destroy actor");
            }
        }
    }
}
