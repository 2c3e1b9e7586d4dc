#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure reactive behavior system that makes ordinary traffic near the observer
//! slow down around incidents and pull aside for emergency vehicles.
//!
//! The system never touches the world. It consumes vehicle snapshots and the
//! active incident view, keeps one [`OverrideRecord`] per affected vehicle and
//! emits [`Command`]s for the caller to apply.

use std::{collections::BTreeMap, time::Duration};

use ambient_traffic_core::{
    Command, DrivingStyle, EntityId, IncidentView, LaneSide, Observer, VehicleSnapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

const DEFAULT_SCAN_RADIUS: f32 = 100.0;
const DEFAULT_INCIDENT_RADIUS: f32 = 50.0;
const DEFAULT_LANE_CHANGE_PROBABILITY: f64 = 0.3;
const DEFAULT_EMERGENCY_RADIUS: f32 = 30.0;
const DEFAULT_RNG_SEED: u64 = 0x3e4c_7e5e_ed00_0003;

/// Configuration parameters required to construct the reactive enhancer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    scan_radius: f32,
    incident_radius: f32,
    lane_change_probability: f64,
    emergency_radius: f32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration. Negative radii are treated as zero and the
    /// probability is clamped into `0.0..=1.0`.
    #[must_use]
    pub fn new(
        scan_radius: f32,
        incident_radius: f32,
        lane_change_probability: f64,
        emergency_radius: f32,
        rng_seed: u64,
    ) -> Self {
        Self {
            scan_radius: scan_radius.max(0.0),
            incident_radius: incident_radius.max(0.0),
            lane_change_probability: lane_change_probability.clamp(0.0, 1.0),
            emergency_radius: emergency_radius.max(0.0),
            rng_seed,
        }
    }

    /// Radius around the observer within which vehicles react.
    #[must_use]
    pub const fn scan_radius(&self) -> f32 {
        self.scan_radius
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_SCAN_RADIUS,
            DEFAULT_INCIDENT_RADIUS,
            DEFAULT_LANE_CHANGE_PROBABILITY,
            DEFAULT_EMERGENCY_RADIUS,
            DEFAULT_RNG_SEED,
        )
    }
}

/// Bookkeeping for one vehicle whose behavior the enhancer manages.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverrideRecord {
    last_update: Duration,
    original_style: DrivingStyle,
    reacting: bool,
    lane_change_drawn: bool,
    yielded: bool,
}

impl OverrideRecord {
    fn new(now: Duration, original_style: DrivingStyle) -> Self {
        Self {
            last_update: now,
            original_style,
            reacting: false,
            lane_change_drawn: false,
            yielded: false,
        }
    }

    /// Time the vehicle was last evaluated.
    #[must_use]
    pub const fn last_update(&self) -> Duration {
        self.last_update
    }

    /// Driving style the vehicle had when first tracked.
    #[must_use]
    pub const fn original_style(&self) -> DrivingStyle {
        self.original_style
    }

    /// Whether the vehicle is currently reacting to something.
    #[must_use]
    pub const fn reacting(&self) -> bool {
        self.reacting
    }

    fn begin_episode(&mut self) {
        if !self.reacting {
            self.reacting = true;
            self.lane_change_drawn = false;
            self.yielded = false;
        }
    }
}

/// Pure system that overrides the driving behavior of nearby traffic.
#[derive(Debug)]
pub struct ReactiveEnhancer {
    config: Config,
    rng: ChaCha8Rng,
    records: BTreeMap<EntityId, OverrideRecord>,
}

impl ReactiveEnhancer {
    /// Creates a new enhancer using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            records: BTreeMap::new(),
        }
    }

    /// Radius around the observer the caller should query so that emergency
    /// vehicles just outside the scan area are still seen.
    #[must_use]
    pub fn query_radius(&self) -> f32 {
        self.config.scan_radius + self.config.emergency_radius
    }

    /// Evaluates nearby vehicles against incidents and emergency traffic.
    ///
    /// `exists` reports whether a handle still resolves in the world; records
    /// for vehicles it rejects are dropped.
    pub fn handle<F>(
        &mut self,
        now: Duration,
        observer: &Observer,
        vehicles: &[VehicleSnapshot],
        incidents: &IncidentView,
        exists: F,
        out: &mut Vec<Command>,
    ) where
        F: Fn(EntityId) -> bool,
    {
        self.records.retain(|vehicle, _| exists(*vehicle));

        let emergencies: Vec<&VehicleSnapshot> = vehicles
            .iter()
            .filter(|vehicle| vehicle.is_active_emergency())
            .collect();

        for vehicle in vehicles {
            if vehicle.position.distance(observer.position) > self.config.scan_radius
                || observer.vehicle == Some(vehicle.id)
                || incidents.owns_vehicle(vehicle.id)
                || vehicle.is_active_emergency()
            {
                continue;
            }

            let record = self
                .records
                .entry(vehicle.id)
                .or_insert_with(|| OverrideRecord::new(now, vehicle.driving_style));
            record.last_update = now;

            let near_incident = incidents.iter().any(|incident| {
                incident.position.distance(vehicle.position) <= self.config.incident_radius
            });
            let emergency = emergencies.iter().find(|emergency| {
                emergency.position.distance(vehicle.position) <= self.config.emergency_radius
            });

            if !near_incident && emergency.is_none() {
                if record.reacting {
                    record.reacting = false;
                    out.push(Command::SetDrivingStyle {
                        vehicle: vehicle.id,
                        style: record.original_style,
                    });
                }
                continue;
            }
            record.begin_episode();

            if near_incident {
                if vehicle.driving_style != DrivingStyle::HALTING {
                    out.push(Command::SetDrivingStyle {
                        vehicle: vehicle.id,
                        style: DrivingStyle::HALTING,
                    });
                }
                if !record.lane_change_drawn {
                    record.lane_change_drawn = true;
                    if self.rng.gen_bool(self.config.lane_change_probability) {
                        let side = if self.rng.gen_bool(0.5) {
                            LaneSide::Left
                        } else {
                            LaneSide::Right
                        };
                        out.push(Command::ChangeLane {
                            vehicle: vehicle.id,
                            side,
                        });
                    }
                }
            }

            if let Some(emergency) = emergency {
                if !record.yielded {
                    record.yielded = true;
                    debug!(
                        vehicle = vehicle.id.get(),
                        emergency = emergency.id.get(),
                        "yielding to emergency vehicle"
                    );
                    out.push(Command::YieldToEmergency {
                        vehicle: vehicle.id,
                        emergency: emergency.id,
                    });
                }
            }
        }

        // Vehicles that left the scan area end their episode.
        for (vehicle, record) in &mut self.records {
            if record.reacting && record.last_update != now {
                record.reacting = false;
                out.push(Command::SetDrivingStyle {
                    vehicle: *vehicle,
                    style: record.original_style,
                });
            }
        }
    }

    /// Restores every reacting vehicle's original style and forgets all records.
    pub fn clear(&mut self, out: &mut Vec<Command>) {
        for (vehicle, record) in std::mem::take(&mut self.records) {
            if record.reacting {
                out.push(Command::SetDrivingStyle {
                    vehicle,
                    style: record.original_style,
                });
            }
        }
    }

    /// Override record for the vehicle, if tracked.
    #[must_use]
    pub fn record(&self, vehicle: EntityId) -> Option<&OverrideRecord> {
        self.records.get(&vehicle)
    }

    /// Number of tracked vehicles.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    /// Number of vehicles currently reacting.
    #[must_use]
    pub fn reacting(&self) -> usize {
        self.records.values().filter(|record| record.reacting).count()
    }
}
