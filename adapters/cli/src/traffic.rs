//! Minimal ambient traffic the headless runner keeps around the observer.

use std::{f32::consts::TAU, time::Duration};

use ambient_traffic_core::{Command, EntityId, Vec3, VehicleModel, WorldAdapter};
use ambient_traffic_world::{apply, World};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

const ROUTE_HALF_LENGTH: f32 = 1_500.0;
const OBSERVER_SPEED: f32 = 12.0;
const REFILL_INTERVAL: Duration = Duration::from_secs(5);
const NEAR_RADIUS: f32 = 40.0;
const FAR_RADIUS: f32 = 140.0;
const AMBULANCE_CHANCE: f64 = 0.08;
const CIVILIAN_MODELS: [VehicleModel; 5] = [
    VehicleModel::Sedan,
    VehicleModel::Compact,
    VehicleModel::Suv,
    VehicleModel::CargoVan,
    VehicleModel::Taxi,
];

/// Drives the observer along a street and keeps ordinary traffic around it.
#[derive(Debug)]
pub(crate) struct TrafficDriver {
    rng: ChaCha8Rng,
    density: usize,
    fleet: Vec<EntityId>,
    last_refill: Option<Duration>,
}

impl TrafficDriver {
    pub(crate) fn new(seed: u64, density: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            density,
            fleet: Vec::new(),
            last_refill: None,
        }
    }

    /// Moves the observer and tops the surrounding traffic back up.
    pub(crate) fn step(&mut self, world: &mut World) {
        let now = world.now();
        world.place_observer(observer_position(now), None);

        if let Some(last) = self.last_refill {
            if now.saturating_sub(last) < REFILL_INTERVAL {
                return;
            }
        }
        self.last_refill = Some(now);

        self.fleet.retain(|vehicle| world.exists(*vehicle));
        while self.fleet.len() < self.density {
            match self.spawn(world) {
                Some(vehicle) => self.fleet.push(vehicle),
                None => break,
            }
        }
    }

    fn spawn(&mut self, world: &mut World) -> Option<EntityId> {
        let center = world.observer().position;
        let angle = self.rng.gen_range(0.0..TAU);
        let radius = self.rng.gen_range(NEAR_RADIUS..FAR_RADIUS);
        let street = world.snap_to_street(center + Vec3::new(angle.cos(), angle.sin(), 0.0) * radius)?;

        let responding = self.rng.gen_bool(AMBULANCE_CHANCE);
        let model = if responding {
            VehicleModel::Ambulance
        } else {
            *CIVILIAN_MODELS.choose(&mut self.rng)?
        };
        let vehicle = world.spawn_traffic(model, street.position, street.heading);
        if responding {
            if let Err(error) = apply(
                world,
                Command::SetSiren {
                    vehicle,
                    active: true,
                },
            ) {
                debug!(%error, "siren could not be switched on");
            }
        }
        // Released traffic ages out once the observer drives away from it.
        if let Err(error) = world.release(vehicle) {
            debug!(%error, "traffic vehicle vanished on spawn");
        }
        Some(vehicle)
    }
}

/// Observer position after `now`, driving back and forth along the main street.
fn observer_position(now: Duration) -> Vec3 {
    let span = 2.0 * ROUTE_HALF_LENGTH;
    let travelled = (now.as_secs_f32() * OBSERVER_SPEED) % (2.0 * span);
    let x = if travelled < span {
        -ROUTE_HALF_LENGTH + travelled
    } else {
        ROUTE_HALF_LENGTH - (travelled - span)
    };
    Vec3::new(x, 0.0, 0.0)
}
