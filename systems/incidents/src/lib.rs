#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Incident scheduler that creates, tracks and tears down ambient traffic incidents.
//!
//! Each tick first expires incidents whose lifetime elapsed, releasing every
//! entity their scene owns, and then, subject to a cooldown, a concurrency cap
//! and a probability draw, places one new incident on a street near the
//! observer.

use std::{collections::BTreeMap, f32::consts::TAU, mem, time::Duration};

use ambient_traffic_core::{
    IncidentId, IncidentKind, IncidentView, Notifier, Vec3, WorldAdapter,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

mod incident;
mod scene;

pub use incident::Incident;
pub use scene::SceneReport;

const DEFAULT_COOLDOWN: Duration = Duration::from_secs(180);
const DEFAULT_MAX_ACTIVE: usize = 3;
const DEFAULT_SPAWN_PROBABILITY: f64 = 0.2;
const DEFAULT_MIN_DISTANCE: f32 = 100.0;
const DEFAULT_MAX_DISTANCE: f32 = 500.0;
const DEFAULT_RNG_SEED: u64 = 0x1c1d_e47a_5eed_0001;

/// Configuration parameters required to construct the incident scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    cooldown: Duration,
    max_active: usize,
    spawn_probability: f64,
    min_distance: f32,
    max_distance: f32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided pacing and seed.
    ///
    /// The probability is clamped into `0.0..=1.0`.
    #[must_use]
    pub fn new(cooldown: Duration, max_active: usize, spawn_probability: f64, rng_seed: u64) -> Self {
        Self {
            cooldown,
            max_active,
            spawn_probability: spawn_probability.clamp(0.0, 1.0),
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            rng_seed,
        }
    }

    /// Sets the band of distances from the observer new incidents are placed in.
    ///
    /// A band with a non-finite bound is ignored and the defaults are kept.
    #[must_use]
    pub fn with_spawn_distance(mut self, min_distance: f32, max_distance: f32) -> Self {
        if !(min_distance.is_finite() && max_distance.is_finite()) {
            return self;
        }
        let min_distance = min_distance.max(0.0);
        self.min_distance = min_distance.min(max_distance);
        self.max_distance = max_distance.max(min_distance);
        self
    }

    /// Minimum time between two generated incidents.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Maximum number of concurrently active incidents.
    #[must_use]
    pub const fn max_active(&self) -> usize {
        self.max_active
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            DEFAULT_COOLDOWN,
            DEFAULT_MAX_ACTIVE,
            DEFAULT_SPAWN_PROBABILITY,
            DEFAULT_RNG_SEED,
        )
    }
}

/// Lifetime counters collected by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncidentStats {
    /// Incidents created.
    pub generated: u32,
    /// Incidents removed because their lifetime elapsed.
    pub expired: u32,
    /// Incidents removed by explicit cancellation or disposal.
    pub cancelled: u32,
    /// Incidents created per kind.
    pub by_kind: BTreeMap<IncidentKind, u32>,
}

/// Changes made to the active set during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Incidents that expired and were released.
    pub expired: Vec<IncidentId>,
    /// Incident created this tick, if any.
    pub generated: Option<IncidentId>,
}

/// Scheduler owning the full lifecycle of every active incident.
#[derive(Debug)]
pub struct IncidentScheduler {
    config: Config,
    rng: ChaCha8Rng,
    active: Vec<Incident>,
    last_generated: Option<Duration>,
    next_id: u32,
    stats: IncidentStats,
}

impl IncidentScheduler {
    /// Creates a new scheduler using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            active: Vec::new(),
            last_generated: None,
            next_id: 1,
            stats: IncidentStats::default(),
        }
    }

    /// Expires elapsed incidents, then attempts to generate a new one.
    pub fn tick<W, N>(&mut self, now: Duration, world: &mut W, notifier: &mut N) -> TickOutcome
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        let expired = self.expire(now, world);
        let generated = self.try_generate(now, world, notifier);
        TickOutcome { expired, generated }
    }

    /// Creates an incident of the requested kind right away, bypassing cooldown and chance.
    ///
    /// The concurrency cap still applies.
    pub fn spawn_now<W, N>(
        &mut self,
        kind: IncidentKind,
        now: Duration,
        world: &mut W,
        notifier: &mut N,
    ) -> Option<IncidentId>
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        if self.active.len() >= self.config.max_active {
            debug!(?kind, "forced incident suppressed by cap");
            return None;
        }
        self.generate(kind, now, world, notifier)
    }

    /// Releases the incident immediately. Returns `false` when it is not active.
    pub fn cancel<W>(&mut self, id: IncidentId, world: &mut W) -> bool
    where
        W: WorldAdapter + ?Sized,
    {
        let Some(index) = self.active.iter().position(|incident| incident.id() == id) else {
            return false;
        };
        let mut incident = self.active.remove(index);
        let removed = incident.release(world);
        self.stats.cancelled += 1;
        info!(incident = %id, kind = ?incident.kind(), removed, "incident cancelled");
        true
    }

    /// Releases every active incident. Safe to call repeatedly.
    pub fn dispose<W>(&mut self, world: &mut W) -> usize
    where
        W: WorldAdapter + ?Sized,
    {
        let mut removed = 0;
        for mut incident in mem::take(&mut self.active) {
            removed += incident.release(world);
            self.stats.cancelled += 1;
        }
        removed
    }

    /// Incidents currently active, oldest first.
    #[must_use]
    pub fn active(&self) -> &[Incident] {
        &self.active
    }

    /// Looks up an active incident.
    #[must_use]
    pub fn get(&self, id: IncidentId) -> Option<&Incident> {
        self.active.iter().find(|incident| incident.id() == id)
    }

    /// Captures a read-only view of the active incidents.
    #[must_use]
    pub fn view(&self) -> IncidentView {
        IncidentView::from_snapshots(self.active.iter().map(Incident::snapshot).collect())
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &IncidentStats {
        &self.stats
    }

    fn expire<W>(&mut self, now: Duration, world: &mut W) -> Vec<IncidentId>
    where
        W: WorldAdapter + ?Sized,
    {
        let (elapsed, remaining): (Vec<Incident>, Vec<Incident>) = mem::take(&mut self.active)
            .into_iter()
            .partition(|incident| incident.is_expired(now));
        self.active = remaining;

        for incident in &mut self.active {
            incident.update(now);
        }

        let mut expired = Vec::with_capacity(elapsed.len());
        for mut incident in elapsed {
            let removed = incident.release(world);
            self.stats.expired += 1;
            info!(incident = %incident.id(), kind = ?incident.kind(), removed, "incident expired");
            expired.push(incident.id());
        }
        expired
    }

    fn try_generate<W, N>(
        &mut self,
        now: Duration,
        world: &mut W,
        notifier: &mut N,
    ) -> Option<IncidentId>
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        if let Some(last) = self.last_generated {
            if now.saturating_sub(last) < self.config.cooldown {
                return None;
            }
        }
        if self.active.len() >= self.config.max_active {
            return None;
        }
        if !self.rng.gen_bool(self.config.spawn_probability) {
            return None;
        }

        let kind = *IncidentKind::ALL.choose(&mut self.rng)?;
        self.generate(kind, now, world, notifier)
    }

    fn generate<W, N>(
        &mut self,
        kind: IncidentKind,
        now: Duration,
        world: &mut W,
        notifier: &mut N,
    ) -> Option<IncidentId>
    where
        W: WorldAdapter + ?Sized,
        N: Notifier + ?Sized,
    {
        let observer = world.observer().position;
        let angle = self.rng.gen_range(0.0..TAU);
        let radius = self
            .rng
            .gen_range(self.config.min_distance..=self.config.max_distance);
        let candidate = observer + Vec3::new(angle.cos(), angle.sin(), 0.0) * radius;
        let Some(origin) = world.snap_to_street(candidate) else {
            debug!(?kind, %candidate, "no street near incident candidate");
            return None;
        };

        let lanes = self.rng.gen_range(1..=2);
        let id = IncidentId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let mut incident = Incident::new(id, kind, origin, now, lanes);
        let report = scene::populate(&mut incident, world, &mut self.rng);
        notifier.notify(&format!("{} reported nearby", kind.label()));
        info!(
            incident = %id,
            ?kind,
            x = origin.position.x,
            y = origin.position.y,
            lanes,
            created = report.created,
            skipped = report.skipped,
            "incident created"
        );

        self.active.push(incident);
        self.last_generated = Some(now);
        self.stats.generated += 1;
        *self.stats.by_kind.entry(kind).or_insert(0) += 1;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_clamps_probability_and_orders_distances() {
        let config = Config::new(Duration::ZERO, 1, 4.0, 7).with_spawn_distance(500.0, 100.0);
        assert_eq!(config.spawn_probability, 1.0);
        assert!(config.min_distance <= config.max_distance);
    }

    #[test]
    fn non_finite_band_keeps_defaults() {
        let config = Config::default().with_spawn_distance(100.0, f32::INFINITY);
        assert_eq!(config.max_distance, DEFAULT_MAX_DISTANCE);
        let config = Config::default().with_spawn_distance(f32::NAN, 200.0);
        assert_eq!(config.min_distance, DEFAULT_MIN_DISTANCE);
    }

    #[test]
    fn default_config_matches_pacing() {
        let config = Config::default();
        assert_eq!(config.cooldown(), Duration::from_secs(180));
        assert_eq!(config.max_active(), 3);
        assert!((config.spawn_probability - 0.2).abs() < f64::EPSILON);
    }
}
