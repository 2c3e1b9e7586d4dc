//! Tunables for every ambient traffic system, loadable from TOML.

use std::time::Duration;

use ambient_traffic_system_incidents as incidents;
use ambient_traffic_system_reactions as reactions;
use ambient_traffic_system_zones as zones;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const MIN_ZONE_INTERVAL_SECS: u64 = 60;
const INCIDENT_STREAM: &str = "ambient-traffic/incidents";
const ZONE_STREAM: &str = "ambient-traffic/zones";
const REACTION_STREAM: &str = "ambient-traffic/reactions";

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A value lies outside its permitted range.
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        /// Offending field.
        field: &'static str,
        /// Smallest accepted value.
        min: f64,
        /// Largest accepted value.
        max: f64,
        /// Value found.
        value: f64,
    },
    /// The incident placement band is inverted, negative or unbounded.
    #[error("incident distance band {min}..={max} is not a finite, ordered range")]
    DistanceBand {
        /// Configured minimum.
        min: f32,
        /// Configured maximum.
        max: f32,
    },
    /// An interval that gates a system is zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval {
        /// Offending field.
        field: &'static str,
    },
    /// Zone passes run more often than once a minute.
    #[error("zone interval must be at least 60s (got {0}s)")]
    ZoneIntervalTooShort(u64),
}

/// Complete configuration of the ambient traffic simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Master seed every system's random stream is derived from.
    pub seed: u64,
    /// Incident scheduling.
    pub incidents: IncidentSettings,
    /// Zone population.
    pub zones: ZoneSettings,
    /// Reactive driving behavior.
    pub reactions: ReactionSettings,
}

/// Incident scheduling tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncidentSettings {
    /// Milliseconds between two scheduler ticks.
    pub tick_interval_ms: u64,
    /// Seconds between two generated incidents.
    pub cooldown_secs: u64,
    /// Maximum number of concurrently active incidents.
    pub max_active: usize,
    /// Chance that an eligible tick generates an incident.
    pub spawn_probability: f64,
    /// Closest distance from the observer an incident is placed at.
    pub min_distance: f32,
    /// Farthest distance from the observer an incident is placed at.
    pub max_distance: f32,
}

/// Zone population tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoneSettings {
    /// Whether zones are populated at all.
    pub enabled: bool,
    /// Seconds between two population passes.
    pub interval_secs: u64,
}

/// Reactive behavior tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReactionSettings {
    /// Whether nearby traffic reacts at all.
    pub enabled: bool,
    /// Radius around the observer within which vehicles react.
    pub scan_radius: f32,
    /// Distance from an incident at which vehicles slow down.
    pub incident_radius: f32,
    /// Chance that a vehicle slowing for an incident also changes lane.
    pub lane_change_probability: f64,
    /// Distance from an emergency vehicle at which vehicles pull aside.
    pub emergency_radius: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0x0a3b_1e47_7a4f_f1c5,
            incidents: IncidentSettings::default(),
            zones: ZoneSettings::default(),
            reactions: ReactionSettings::default(),
        }
    }
}

impl Default for IncidentSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            cooldown_secs: 180,
            max_active: 3,
            spawn_probability: 0.2,
            min_distance: 100.0,
            max_distance: 500.0,
        }
    }
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: MIN_ZONE_INTERVAL_SECS,
        }
    }
}

impl Default for ReactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_radius: 100.0,
            incident_radius: 50.0,
            lane_change_probability: 0.3,
            emergency_radius: 30.0,
        }
    }
}

impl SimulationConfig {
    /// Validates configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any field violates its documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let incidents = &self.incidents;
        if incidents.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "incidents.tick_interval_ms",
            });
        }
        probability("incidents.spawn_probability", incidents.spawn_probability)?;
        if !(incidents.min_distance >= 0.0
            && incidents.max_distance.is_finite()
            && incidents.min_distance <= incidents.max_distance)
        {
            return Err(ConfigError::DistanceBand {
                min: incidents.min_distance,
                max: incidents.max_distance,
            });
        }

        if self.zones.interval_secs < MIN_ZONE_INTERVAL_SECS {
            return Err(ConfigError::ZoneIntervalTooShort(self.zones.interval_secs));
        }

        let reactions = &self.reactions;
        probability(
            "reactions.lane_change_probability",
            reactions.lane_change_probability,
        )?;
        for (field, radius) in [
            ("reactions.scan_radius", reactions.scan_radius),
            ("reactions.incident_radius", reactions.incident_radius),
            ("reactions.emergency_radius", reactions.emergency_radius),
        ] {
            if !(0.0..=1_000.0).contains(&radius) {
                return Err(ConfigError::RangeViolation {
                    field,
                    min: 0.0,
                    max: 1_000.0,
                    value: f64::from(radius),
                });
            }
        }
        Ok(())
    }

    /// Time between two incident scheduler ticks.
    #[must_use]
    pub fn incident_interval(&self) -> Duration {
        Duration::from_millis(self.incidents.tick_interval_ms)
    }

    /// Scheduler configuration derived from these settings.
    #[must_use]
    pub fn incident_config(&self) -> incidents::Config {
        let settings = &self.incidents;
        incidents::Config::new(
            Duration::from_secs(settings.cooldown_secs),
            settings.max_active,
            settings.spawn_probability,
            derive_labeled_seed(self.seed, INCIDENT_STREAM),
        )
        .with_spawn_distance(settings.min_distance, settings.max_distance)
    }

    /// Population controller configuration derived from these settings.
    #[must_use]
    pub fn zone_config(&self) -> zones::Config {
        zones::Config::new(
            Duration::from_secs(self.zones.interval_secs),
            derive_labeled_seed(self.seed, ZONE_STREAM),
        )
    }

    /// Reactive enhancer configuration derived from these settings.
    #[must_use]
    pub fn reaction_config(&self) -> reactions::Config {
        let settings = &self.reactions;
        reactions::Config::new(
            settings.scan_radius,
            settings.incident_radius,
            settings.lane_change_probability,
            settings.emergency_radius,
            derive_labeled_seed(self.seed, REACTION_STREAM),
        )
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}

/// Gives every system an independent random stream from one master seed.
fn derive_labeled_seed(seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimulationConfig::default()
            .validate()
            .expect("defaults validate");
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let config: SimulationConfig = toml::from_str(
            r#"
            seed = 7

            [incidents]
            max_active = 5
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.seed, 7);
        assert_eq!(config.incidents.max_active, 5);
        assert_eq!(config.incidents.cooldown_secs, 180);
        assert_eq!(config.zones, ZoneSettings::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = toml::from_str::<SimulationConfig>("[incidents]\ncooldown = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn probability_out_of_range_is_reported() {
        let mut config = SimulationConfig::default();
        config.incidents.spawn_probability = 1.5;

        assert_eq!(
            config.validate(),
            Err(ConfigError::RangeViolation {
                field: "incidents.spawn_probability",
                min: 0.0,
                max: 1.0,
                value: 1.5,
            })
        );
    }

    #[test]
    fn zone_interval_below_a_minute_is_rejected() {
        let mut config = SimulationConfig::default();
        config.zones.interval_secs = 30;
        assert_eq!(config.validate(), Err(ConfigError::ZoneIntervalTooShort(30)));
    }

    #[test]
    fn inverted_distance_band_is_rejected() {
        let mut config = SimulationConfig::default();
        config.incidents.min_distance = 600.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DistanceBand { .. })
        ));
    }

    #[test]
    fn unbounded_distance_band_from_toml_is_rejected() {
        let config: SimulationConfig =
            toml::from_str("[incidents]\nmax_distance = inf\n").expect("valid toml");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DistanceBand { .. })
        ));

        let config: SimulationConfig =
            toml::from_str("[incidents]\nmin_distance = nan\n").expect("valid toml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn system_streams_differ() {
        let seeds = [
            derive_labeled_seed(1, INCIDENT_STREAM),
            derive_labeled_seed(1, ZONE_STREAM),
            derive_labeled_seed(1, REACTION_STREAM),
        ];
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[1], seeds[2]);
        assert_ne!(seeds[0], seeds[2]);
        assert_eq!(seeds[0], derive_labeled_seed(1, INCIDENT_STREAM));
    }

    #[test]
    fn streams_do_not_collide_across_master_seeds() {
        for master in 0..64_u64 {
            for other in [master ^ 1, master ^ (1 << 63), !master] {
                assert_ne!(
                    derive_labeled_seed(master, INCIDENT_STREAM),
                    derive_labeled_seed(other, ZONE_STREAM)
                );
            }
        }
    }
}
