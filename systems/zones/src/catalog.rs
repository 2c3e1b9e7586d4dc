//! Static catalog of specialized zones.

use ambient_traffic_core::{Vec3, VehicleModel, ZoneKind};

use crate::SystemError;

/// Hour-of-day window, inclusive at both ends, that wraps past midnight when `start > end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActiveHours {
    start: u8,
    end: u8,
}

impl ActiveHours {
    /// Window spanning the whole day.
    pub const ALL_DAY: Self = Self { start: 0, end: 23 };

    /// Creates a window; hours are reduced modulo 24.
    #[must_use]
    pub const fn new(start: u8, end: u8) -> Self {
        Self {
            start: start % 24,
            end: end % 24,
        }
    }

    /// First hour of the window.
    #[must_use]
    pub const fn start(&self) -> u8 {
        self.start
    }

    /// Last hour of the window.
    #[must_use]
    pub const fn end(&self) -> u8 {
        self.end
    }

    /// Reports whether the window runs across midnight.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Reports whether `hour` falls inside the window.
    #[must_use]
    pub const fn contains(&self, hour: u8) -> bool {
        if self.wraps() {
            hour >= self.start || hour <= self.end
        } else {
            hour >= self.start && hour <= self.end
        }
    }
}

/// Geography and population rules of one zone.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneDefinition {
    /// Unique, human readable name.
    pub name: String,
    /// Behavioral category.
    pub kind: ZoneKind,
    /// Center of the zone.
    pub center: Vec3,
    /// Radius around the center vehicles are placed within.
    pub radius: f32,
    /// Hours during which the zone tops up its population.
    pub hours: ActiveHours,
    /// Models a spawned vehicle is drawn from.
    pub models: Vec<VehicleModel>,
    /// Maximum number of vehicles the zone keeps alive at once.
    pub max_vehicles: usize,
    /// Probability that a pass below capacity spawns a vehicle.
    pub activity: f64,
}

impl ZoneDefinition {
    /// Checks that the definition can be populated.
    pub fn validate(&self) -> Result<(), SystemError> {
        let reason = if self.name.trim().is_empty() {
            Some("name is empty")
        } else if !(self.radius.is_finite() && self.radius > 0.0) {
            Some("radius must be positive")
        } else if self.models.is_empty() {
            Some("no vehicle models allowed")
        } else if !(0.0..=1.0).contains(&self.activity) {
            Some("activity must lie in 0..=1")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SystemError::InvalidZone {
                zone: self.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Zones shipped with the simulation.
#[must_use]
pub fn default_catalog() -> Vec<ZoneDefinition> {
    vec![
        ZoneDefinition {
            name: "Harbor Industrial Park".to_owned(),
            kind: ZoneKind::Industrial,
            center: Vec3::new(-1_500.0, -1_200.0, 0.0),
            radius: 250.0,
            hours: ActiveHours::new(6, 18),
            models: vec![
                VehicleModel::BoxTruck,
                VehicleModel::Flatbed,
                VehicleModel::Mixer,
                VehicleModel::DumpTruck,
            ],
            max_vehicles: 8,
            activity: 0.5,
        },
        ZoneDefinition {
            name: "Maple Heights".to_owned(),
            kind: ZoneKind::Residential,
            center: Vec3::new(900.0, 1_400.0, 0.0),
            radius: 300.0,
            hours: ActiveHours::new(7, 22),
            models: vec![VehicleModel::Sedan, VehicleModel::Compact, VehicleModel::Suv],
            max_vehicles: 12,
            activity: 0.6,
        },
        ZoneDefinition {
            name: "Market District".to_owned(),
            kind: ZoneKind::Commercial,
            center: Vec3::new(200.0, -400.0, 0.0),
            radius: 350.0,
            hours: ActiveHours::new(9, 21),
            models: vec![
                VehicleModel::CargoVan,
                VehicleModel::Sedan,
                VehicleModel::Limousine,
                VehicleModel::Taxi,
            ],
            max_vehicles: 10,
            activity: 0.5,
        },
        ZoneDefinition {
            name: "International Airport".to_owned(),
            kind: ZoneKind::Airport,
            center: Vec3::new(2_800.0, -2_500.0, 0.0),
            radius: 400.0,
            hours: ActiveHours::new(5, 1),
            models: vec![
                VehicleModel::AirportBus,
                VehicleModel::Taxi,
                VehicleModel::Limousine,
            ],
            max_vehicles: 10,
            activity: 0.7,
        },
    ]
}
