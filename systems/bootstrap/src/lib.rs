#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Director that owns every ambient traffic system and drives them from one tick.
//!
//! The director replaces process-wide registries: the incident scheduler,
//! zone population controller and reactive enhancer live inside it, are
//! created from one [`SimulationConfig`] and are torn down together. Errors
//! surfaced by a system are logged at the tick boundary and never stop the
//! remaining systems from running.

use std::time::Duration;

use ambient_traffic_core::{Command, IncidentId, IncidentKind, Notifier, WorldAdapter, WorldError};
use ambient_traffic_system_incidents::{IncidentScheduler, TickOutcome};
use ambient_traffic_system_reactions::ReactiveEnhancer;
use ambient_traffic_system_zones::{self as zones, default_catalog, PassReport, PopulationController};
use thiserror::Error;
use tracing::{debug, info, warn};

mod config;

pub use config::{ConfigError, IncidentSettings, ReactionSettings, SimulationConfig, ZoneSettings};

/// Failures the director reports from its own operations.
#[derive(Debug, Error)]
pub enum DirectorError {
    /// The zone catalog could not be installed.
    #[error("zone catalog rejected")]
    Catalog(#[from] zones::SystemError),
    /// The nearby vehicle query failed; reactions skip this cycle.
    #[error("nearby vehicle query failed: {0}")]
    Query(WorldError),
}

/// What happened during one director tick.
#[derive(Debug, Default, PartialEq)]
pub struct TickSummary {
    /// Session time the tick ran at.
    pub now: Duration,
    /// Incident scheduler outcome, when its interval elapsed.
    pub incidents: Option<TickOutcome>,
    /// Zone pass report, when a pass ran.
    pub zones: Option<PassReport>,
    /// Reaction commands applied to the world.
    pub reactions_applied: usize,
    /// Reaction commands the world refused.
    pub reactions_rejected: usize,
    /// Errors logged at the tick boundary.
    pub errors: usize,
}

/// Counts of what a teardown released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Incident scene entities deleted.
    pub incident_entities: usize,
    /// Zone vehicles handed back to the world.
    pub zone_vehicles: usize,
    /// Vehicles whose original driving style was restored.
    pub styles_restored: usize,
}

/// Owner of all ambient traffic state.
#[derive(Debug)]
pub struct Director {
    config: SimulationConfig,
    incidents: IncidentScheduler,
    zones: PopulationController,
    reactions: ReactiveEnhancer,
    initialized: bool,
    last_incident_tick: Option<Duration>,
    commands: Vec<Command>,
}

impl Director {
    /// Creates a director from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration violates its bounds.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            incidents: IncidentScheduler::new(config.incident_config()),
            zones: PopulationController::new(config.zone_config()),
            reactions: ReactiveEnhancer::new(config.reaction_config()),
            config,
            initialized: false,
            last_incident_tick: None,
            commands: Vec::new(),
        })
    }

    /// Installs the zone catalog. Calling it again has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`DirectorError::Catalog`] when a catalog zone is invalid.
    pub fn init(&mut self) -> Result<(), DirectorError> {
        if self.initialized {
            return Ok(());
        }
        let zones = self.zones.install(default_catalog())?;
        self.initialized = true;
        info!(zones, "ambient traffic initialized");
        Ok(())
    }

    /// Runs every system whose gate is open at the world's current time.
    pub fn tick<W, N>(&mut self, world: &mut W, notifier: &mut N) -> TickSummary
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        let now = world.now();
        let mut summary = TickSummary {
            now,
            ..TickSummary::default()
        };

        if due(&mut self.last_incident_tick, now, self.config.incident_interval()) {
            summary.incidents = Some(self.incidents.tick(now, world, notifier));
        }

        if self.config.zones.enabled {
            summary.zones = self.zones.tick(now, world);
            if let Some(report) = &summary.zones {
                for failure in &report.failures {
                    warn!(error = %failure, "zone spawn abandoned");
                }
                summary.errors += report.failures.len();
            }
        }

        if self.config.reactions.enabled {
            match self.react(now, world) {
                Ok((applied, rejected)) => {
                    summary.reactions_applied = applied;
                    summary.reactions_rejected = rejected;
                }
                Err(error) => {
                    warn!(%error, "reaction pass skipped");
                    summary.errors += 1;
                }
            }
        }

        summary
    }

    /// Forces an incident of the given kind near the observer, still honoring the cap.
    pub fn spawn_incident<W, N>(
        &mut self,
        kind: IncidentKind,
        world: &mut W,
        notifier: &mut N,
    ) -> Option<IncidentId>
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        let now = world.now();
        self.incidents.spawn_now(kind, now, world, notifier)
    }

    /// Releases everything the systems own. Safe to call repeatedly.
    pub fn teardown<W>(&mut self, world: &mut W) -> TeardownReport
    where
        W: WorldAdapter + ?Sized,
    {
        let incident_entities = self.incidents.dispose(world);
        let zone_vehicles = self.zones.release_all(world);

        self.commands.clear();
        self.reactions.clear(&mut self.commands);
        let (styles_restored, _) = apply_all(&mut self.commands, world);

        let report = TeardownReport {
            incident_entities,
            zone_vehicles,
            styles_restored,
        };
        info!(?report, "ambient traffic torn down");
        report
    }

    /// Incident scheduler owned by the director.
    #[must_use]
    pub fn incidents(&self) -> &IncidentScheduler {
        &self.incidents
    }

    /// Zone population controller owned by the director.
    #[must_use]
    pub fn zones(&self) -> &PopulationController {
        &self.zones
    }

    /// Reactive enhancer owned by the director.
    #[must_use]
    pub fn reactions(&self) -> &ReactiveEnhancer {
        &self.reactions
    }

    /// Configuration the director was built from.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn react<W>(&mut self, now: Duration, world: &mut W) -> Result<(usize, usize), DirectorError>
    where
        W: WorldAdapter + ?Sized,
    {
        let observer = world.observer();
        let vehicles = world
            .vehicles_near(observer.position, self.reactions.query_radius())
            .map_err(DirectorError::Query)?;
        let view = self.incidents.view();

        self.commands.clear();
        {
            let host = &*world;
            self.reactions.handle(
                now,
                &observer,
                &vehicles,
                &view,
                |vehicle| host.exists(vehicle),
                &mut self.commands,
            );
        }
        Ok(apply_all(&mut self.commands, world))
    }
}

/// Opens the gate when `interval` has passed since it last opened. The first check always opens.
fn due(last: &mut Option<Duration>, now: Duration, interval: Duration) -> bool {
    if let Some(previous) = *last {
        if now.saturating_sub(previous) < interval {
            return false;
        }
    }
    *last = Some(now);
    true
}

/// Applies queued commands and returns how many were applied and rejected.
fn apply_all<W>(commands: &mut Vec<Command>, world: &mut W) -> (usize, usize)
where
    W: WorldAdapter + ?Sized,
{
    let mut applied = 0;
    let mut rejected = 0;
    for command in commands.drain(..) {
        let subject = command.subject();
        match world.apply(command) {
            Ok(()) => applied += 1,
            Err(error) if error.is_missing_entity() => {
                rejected += 1;
                debug!(entity = subject.get(), "command target already gone");
            }
            Err(error) => {
                rejected += 1;
                warn!(entity = subject.get(), %error, "command rejected");
            }
        }
    }
    (applied, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_opens_first_then_waits_for_interval() {
        let mut last = None;
        let second = Duration::from_secs(1);

        assert!(due(&mut last, Duration::from_millis(400), second));
        assert!(!due(&mut last, Duration::from_millis(900), second));
        assert!(due(&mut last, Duration::from_millis(1_400), second));
    }

    #[test]
    fn invalid_configuration_is_refused() {
        let mut config = SimulationConfig::default();
        config.reactions.lane_change_probability = -0.1;
        assert!(Director::new(config).is_err());
    }

    #[test]
    fn init_is_idempotent() {
        let mut director = Director::new(SimulationConfig::default()).expect("valid config");
        director.init().expect("catalog installs");
        director.init().expect("second init is a no-op");
        assert_eq!(director.zones().len(), 4);
    }
}
