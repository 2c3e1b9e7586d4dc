#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Zone population controller that keeps specialized districts stocked with
//! zone-appropriate traffic during their active hours.

use std::{f32::consts::TAU, mem, time::Duration};

use ambient_traffic_core::{
    ActorModel, Command, DrivingStyle, EntityId, Model, Seat, Vec3, VehicleModel, WorldAdapter,
    WorldError, ZoneKind,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};

mod catalog;

pub use catalog::{default_catalog, ActiveHours, ZoneDefinition};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RNG_SEED: u64 = 0x2d0e_5eed_0000_0002;
const PASSENGER_PROBABILITY: f64 = 0.5;
const INDUSTRIAL_SPEED: f32 = 8.0;
const RESIDENTIAL_SPEED: f32 = 11.0;
const CITY_SPEED: f32 = 14.0;

/// Errors reported by the zone population controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SystemError {
    /// A zone definition cannot be populated.
    #[error("zone `{zone}` is invalid: {reason}")]
    InvalidZone {
        /// Name of the offending zone.
        zone: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Two zones share a name.
    #[error("zone `{0}` is defined twice")]
    DuplicateZone(String),
    /// No street was found near the sampled spawn point.
    #[error("zone `{zone}` found no street near {point}")]
    NoStreet {
        /// Name of the zone.
        zone: String,
        /// Sampled point that failed to snap.
        point: Vec3,
    },
    /// The host refused part of the spawn.
    #[error("zone `{zone}` could not spawn a vehicle")]
    Spawn {
        /// Name of the zone.
        zone: String,
        /// Failure reported by the host.
        #[source]
        source: WorldError,
    },
}

/// Configuration parameters required to construct the population controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    interval: Duration,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided pass interval and seed.
    #[must_use]
    pub const fn new(interval: Duration, rng_seed: u64) -> Self {
        Self { interval, rng_seed }
    }

    /// Minimum time between two full passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_RNG_SEED)
    }
}

/// Read-only status of one zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneStatus {
    /// Zone name.
    pub name: String,
    /// Behavioral category.
    pub kind: ZoneKind,
    /// Vehicles currently tracked.
    pub vehicles: usize,
    /// Capacity of the zone.
    pub max_vehicles: usize,
    /// Whether the zone is inside its active hours.
    pub in_window: bool,
}

/// Result of one full pass over every zone.
#[derive(Debug, Default, PartialEq)]
pub struct PassReport {
    /// Hour of day the pass evaluated windows against.
    pub hour: u8,
    /// Vehicles spawned, with the index of their zone in the catalog.
    pub spawned: Vec<(usize, EntityId)>,
    /// Tracked vehicles dropped because the host no longer knows them.
    pub pruned: usize,
    /// Spawns abandoned this pass.
    pub failures: Vec<SystemError>,
}

#[derive(Debug)]
struct Zone {
    definition: ZoneDefinition,
    vehicles: Vec<EntityId>,
}

/// Controller owning every zone's spawned vehicles.
#[derive(Debug)]
pub struct PopulationController {
    interval: Duration,
    rng: ChaCha8Rng,
    zones: Vec<Zone>,
    last_pass: Option<Duration>,
}

impl PopulationController {
    /// Creates a controller with an empty catalog.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            interval: config.interval,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            zones: Vec::new(),
            last_pass: None,
        }
    }

    /// Adds validated zones to the catalog.
    ///
    /// Nothing is installed when any definition is rejected.
    pub fn install(&mut self, definitions: Vec<ZoneDefinition>) -> Result<usize, SystemError> {
        for (index, definition) in definitions.iter().enumerate() {
            definition.validate()?;
            let duplicate = self
                .zones
                .iter()
                .map(|zone| &zone.definition)
                .chain(&definitions[..index])
                .any(|other| other.name == definition.name);
            if duplicate {
                return Err(SystemError::DuplicateZone(definition.name.clone()));
            }
        }

        let count = definitions.len();
        self.zones
            .extend(definitions.into_iter().map(|definition| Zone {
                definition,
                vehicles: Vec::new(),
            }));
        Ok(count)
    }

    /// Runs a full pass when the interval has elapsed since the previous one.
    ///
    /// Returns `None` while gated. The first call always runs.
    pub fn tick<W>(&mut self, now: Duration, world: &mut W) -> Option<PassReport>
    where
        W: WorldAdapter + ?Sized,
    {
        if let Some(last) = self.last_pass {
            if now.saturating_sub(last) < self.interval {
                return None;
            }
        }
        self.last_pass = Some(now);

        let hour = world.hour_of_day();
        let mut report = PassReport {
            hour,
            ..PassReport::default()
        };

        for (index, zone) in self.zones.iter_mut().enumerate() {
            if !zone.definition.hours.contains(hour) {
                debug!(zone = %zone.definition.name, hour, "zone outside active hours");
                continue;
            }

            let before = zone.vehicles.len();
            zone.vehicles.retain(|vehicle| world.exists(*vehicle));
            report.pruned += before - zone.vehicles.len();

            if zone.vehicles.len() >= zone.definition.max_vehicles {
                continue;
            }
            if !self.rng.gen_bool(zone.definition.activity) {
                continue;
            }

            match populate(&zone.definition, world, &mut self.rng) {
                Ok(vehicle) => {
                    zone.vehicles.push(vehicle);
                    info!(
                        zone = %zone.definition.name,
                        vehicle = vehicle.get(),
                        count = zone.vehicles.len(),
                        "zone vehicle spawned"
                    );
                    report.spawned.push((index, vehicle));
                }
                Err(error) => report.failures.push(error),
            }
        }

        Some(report)
    }

    /// Hands every tracked vehicle back to the host and forgets it.
    ///
    /// Returns how many vehicles were released. Safe to call repeatedly.
    pub fn release_all<W>(&mut self, world: &mut W) -> usize
    where
        W: WorldAdapter + ?Sized,
    {
        let mut released = 0;
        for zone in &mut self.zones {
            for vehicle in mem::take(&mut zone.vehicles) {
                match world.release(vehicle) {
                    Ok(()) => released += 1,
                    Err(error) => {
                        debug!(zone = %zone.definition.name, vehicle = vehicle.get(), %error, "zone vehicle already gone");
                    }
                }
            }
        }
        released
    }

    /// Status of every zone evaluated against `hour`.
    #[must_use]
    pub fn zones(&self, hour: u8) -> Vec<ZoneStatus> {
        self.zones
            .iter()
            .map(|zone| ZoneStatus {
                name: zone.definition.name.clone(),
                kind: zone.definition.kind,
                vehicles: zone.vehicles.len(),
                max_vehicles: zone.definition.max_vehicles,
                in_window: zone.definition.hours.contains(hour),
            })
            .collect()
    }

    /// Vehicles tracked for the zone at `index` in the catalog.
    #[must_use]
    pub fn vehicles(&self, index: usize) -> &[EntityId] {
        self.zones
            .get(index)
            .map_or(&[], |zone| zone.vehicles.as_slice())
    }

    /// Number of zones in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Reports whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Spawns one driven vehicle inside the zone and configures it for the zone kind.
fn populate<W, R>(zone: &ZoneDefinition, world: &mut W, rng: &mut R) -> Result<EntityId, SystemError>
where
    W: WorldAdapter + ?Sized,
    R: Rng + ?Sized,
{
    let model = zone
        .models
        .choose(rng)
        .copied()
        .ok_or_else(|| SystemError::InvalidZone {
            zone: zone.name.clone(),
            reason: "no vehicle models allowed",
        })?;

    // Square root keeps the samples uniform over the disc.
    let angle = rng.gen_range(0.0..TAU);
    let radius = zone.radius * rng.gen::<f32>().sqrt();
    let point = zone.center + Vec3::new(angle.cos(), angle.sin(), 0.0) * radius;
    let street = world
        .snap_to_street(point)
        .ok_or_else(|| SystemError::NoStreet {
            zone: zone.name.clone(),
            point,
        })?;

    let spawn_error = |source| SystemError::Spawn {
        zone: zone.name.clone(),
        source,
    };

    world
        .request_model(Model::Vehicle(model))
        .map_err(spawn_error)?;
    let vehicle = world
        .spawn_vehicle(model, street.position, street.heading)
        .map_err(spawn_error)?;

    if let Err(error) = crew(zone.kind, model, vehicle, street.position, world, rng) {
        if let Err(cleanup) = world.delete(vehicle) {
            debug!(zone = %zone.name, %cleanup, "crewless vehicle already gone");
        }
        return Err(spawn_error(error));
    }

    Ok(vehicle)
}

/// Seats the driver and any passengers, applies zone behavior and releases the occupants.
fn crew<W, R>(
    kind: ZoneKind,
    model: VehicleModel,
    vehicle: EntityId,
    position: Vec3,
    world: &mut W,
    rng: &mut R,
) -> Result<(), WorldError>
where
    W: WorldAdapter + ?Sized,
    R: Rng + ?Sized,
{
    let driver = seat(ActorModel::Driver, vehicle, Seat::Driver, position, world)?;
    world.release(driver)?;

    let (dirt, speed, style) = match kind {
        ZoneKind::Industrial => (
            rng.gen_range(10.0..=15.0),
            INDUSTRIAL_SPEED,
            DrivingStyle::CAUTIOUS,
        ),
        ZoneKind::Residential => (0.0, RESIDENTIAL_SPEED, DrivingStyle::LAW_ABIDING),
        ZoneKind::Commercial => (rng.gen_range(3.0..=7.0), CITY_SPEED, DrivingStyle::NORMAL),
        ZoneKind::Airport => (rng.gen_range(0.0..=3.0), CITY_SPEED, DrivingStyle::NORMAL),
    };
    world.apply(Command::SetDirtLevel {
        vehicle,
        level: dirt,
    })?;
    world.apply(Command::Cruise {
        vehicle,
        speed,
        style,
    })?;

    if kind == ZoneKind::Airport && model.carries_passengers() {
        for index in 0..model.passenger_seats() {
            if !rng.gen_bool(PASSENGER_PROBABILITY) {
                continue;
            }
            // A missing passenger leaves an empty seat, not a failed spawn.
            match seat(
                ActorModel::Traveller,
                vehicle,
                Seat::Passenger(index),
                position,
                world,
            ) {
                Ok(passenger) => world.release(passenger)?,
                Err(error) => debug!(vehicle = vehicle.get(), %error, "passenger skipped"),
            }
        }
    }

    Ok(())
}

/// Spawns an actor and seats it. An actor that cannot be seated is deleted again.
fn seat<W>(
    model: ActorModel,
    vehicle: EntityId,
    seat: Seat,
    position: Vec3,
    world: &mut W,
) -> Result<EntityId, WorldError>
where
    W: WorldAdapter + ?Sized,
{
    world.request_model(Model::Actor(model))?;
    let actor = world.spawn_actor(model, position)?;
    if let Err(error) = world.apply(Command::SeatActor {
        actor,
        vehicle,
        seat,
    }) {
        if let Err(cleanup) = world.delete(actor) {
            debug!(actor = actor.get(), %cleanup, "unseated actor already gone");
        }
        return Err(error);
    }
    Ok(actor)
}
