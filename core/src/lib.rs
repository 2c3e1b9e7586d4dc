#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the ambient traffic engine.
//!
//! This crate defines the vocabulary that connects the simulation host and the
//! ambient traffic systems. Hosts implement [`WorldAdapter`] and [`Notifier`]
//! to expose entity creation, spatial queries, and the clock. Systems create
//! entities through the adapter and express every behavioral mutation of an
//! existing entity as a [`Command`] value, which the host executes via
//! [`WorldAdapter::apply`].

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
    time::Duration,
};

use serde::{Deserialize, Serialize};

mod adapter;

pub use adapter::{Notifier, WorldAdapter, WorldError};
pub use glam::Vec3;

/// Opaque handle of an entity living in the simulation host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an incident by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentId(u32);

impl IncidentId {
    /// Creates a new incident identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of ambient incident flavours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncidentKind {
    /// Broken-down sedan with its motorist waiting beside it.
    Breakdown,
    /// Cargo van unloading with its driver on board.
    Delivery,
    /// Work van with crew hammering at the roadside.
    Construction,
    /// Patrol car that pulled over a civilian vehicle.
    PoliceStop,
    /// Armored transport escorted by two patrol cars.
    ConvoyEscort,
}

impl IncidentKind {
    /// Every incident kind in declaration order.
    pub const ALL: [IncidentKind; 5] = [
        Self::Breakdown,
        Self::Delivery,
        Self::Construction,
        Self::PoliceStop,
        Self::ConvoyEscort,
    ];

    /// Lifetime of an incident of this kind before it is cleaned up.
    #[must_use]
    pub const fn duration(self) -> Duration {
        let minutes = match self {
            Self::Breakdown => 5,
            Self::Delivery => 2,
            Self::Construction => 10,
            Self::PoliceStop => 4,
            Self::ConvoyEscort => 3,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Human readable label used in notices.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Breakdown => "Vehicle breakdown",
            Self::Delivery => "Delivery in progress",
            Self::Construction => "Road works",
            Self::PoliceStop => "Police traffic stop",
            Self::ConvoyEscort => "Escorted convoy",
        }
    }

    /// Map marker style representing the incident.
    #[must_use]
    pub const fn marker_style(self) -> MarkerStyle {
        match self {
            Self::Breakdown | Self::Construction => MarkerStyle::Caution,
            Self::Delivery => MarkerStyle::Info,
            Self::PoliceStop | Self::ConvoyEscort => MarkerStyle::Police,
        }
    }

    /// Parses the kebab-case name used by configuration and command lines.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "breakdown" => Some(Self::Breakdown),
            "delivery" => Some(Self::Delivery),
            "construction" => Some(Self::Construction),
            "police-stop" => Some(Self::PoliceStop),
            "convoy-escort" => Some(Self::ConvoyEscort),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Behavioral category of a specialized zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Docks, yards and factories.
    Industrial,
    /// Quiet housing districts.
    Residential,
    /// Shopping and office streets.
    Commercial,
    /// Terminals and airside roads.
    Airport,
}

/// Coarse classification used when reasoning about vehicle roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    /// Private cars.
    Civilian,
    /// Vans and trucks moving goods.
    Commercial,
    /// Heavy plant and haulers.
    Industrial,
    /// Police, ambulance and fire vehicles.
    Emergency,
    /// Buses and taxis carrying passengers.
    Transit,
    /// Security and armored vehicles.
    Security,
}

/// Vehicle models the ambient systems may request from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleModel {
    /// Mid-size four door sedan.
    Sedan,
    /// Small hatchback.
    Compact,
    /// Sport utility vehicle.
    Suv,
    /// Panel van used for deliveries and trades.
    CargoVan,
    /// Medium box truck.
    BoxTruck,
    /// Flatbed hauler.
    Flatbed,
    /// Cement mixer.
    Mixer,
    /// Tipper truck.
    DumpTruck,
    /// Stretched limousine.
    Limousine,
    /// City taxi cab.
    Taxi,
    /// Airport shuttle bus.
    AirportBus,
    /// Marked police cruiser.
    PatrolCar,
    /// Ambulance.
    Ambulance,
    /// Fire engine.
    FireTruck,
    /// Cash-in-transit armored truck.
    ArmoredTruck,
}

impl VehicleModel {
    /// Classification of the model.
    #[must_use]
    pub const fn class(self) -> VehicleClass {
        match self {
            Self::Sedan | Self::Compact | Self::Suv | Self::Limousine => VehicleClass::Civilian,
            Self::CargoVan | Self::BoxTruck => VehicleClass::Commercial,
            Self::Flatbed | Self::Mixer | Self::DumpTruck => VehicleClass::Industrial,
            Self::Taxi | Self::AirportBus => VehicleClass::Transit,
            Self::PatrolCar | Self::Ambulance | Self::FireTruck => VehicleClass::Emergency,
            Self::ArmoredTruck => VehicleClass::Security,
        }
    }

    /// Number of seats available to passengers, excluding the driver.
    #[must_use]
    pub const fn passenger_seats(self) -> u8 {
        match self {
            Self::AirportBus => 8,
            Self::Limousine => 5,
            Self::Sedan | Self::Suv | Self::Taxi | Self::PatrolCar => 3,
            Self::Compact | Self::CargoVan | Self::BoxTruck | Self::Ambulance => 1,
            Self::Flatbed | Self::Mixer | Self::DumpTruck | Self::FireTruck => 1,
            Self::ArmoredTruck => 1,
        }
    }

    /// Reports whether the model carries fare-paying passengers.
    #[must_use]
    pub const fn carries_passengers(self) -> bool {
        matches!(self.class(), VehicleClass::Transit)
    }
}

/// Actor models the ambient systems may request from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorModel {
    /// Motorist stranded with a broken vehicle.
    Motorist,
    /// Courier driving a delivery van.
    Courier,
    /// Road crew worker.
    Worker,
    /// Generic driver of an ambient vehicle.
    Driver,
    /// Passenger riding a transit vehicle.
    Traveller,
}

/// Static props placed around incident scenes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropModel {
    /// Orange traffic cone.
    TrafficCone,
    /// Reflective warning triangle.
    WarningTriangle,
}

/// Any asset that must be loaded before an entity can be created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Model {
    /// Vehicle asset.
    Vehicle(VehicleModel),
    /// Actor asset.
    Actor(ActorModel),
    /// Prop asset.
    Prop(PropModel),
}

impl From<VehicleModel> for Model {
    fn from(model: VehicleModel) -> Self {
        Self::Vehicle(model)
    }
}

impl From<ActorModel> for Model {
    fn from(model: ActorModel) -> Self {
        Self::Actor(model)
    }
}

impl From<PropModel> for Model {
    fn from(model: PropModel) -> Self {
        Self::Prop(model)
    }
}

/// Appearance of a map marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerStyle {
    /// Yellow hazard marker.
    Caution,
    /// Neutral informational marker.
    Info,
    /// Blue police marker.
    Police,
}

/// Set of driving behavior flags applied to a vehicle's driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrivingStyle(u32);

impl DrivingStyle {
    /// No flags set.
    pub const EMPTY: Self = Self(0);
    /// Brake for vehicles ahead instead of driving through them.
    pub const STOP_FOR_VEHICLES: Self = Self(1);
    /// Brake for pedestrians.
    pub const STOP_FOR_PEDESTRIANS: Self = Self(1 << 1);
    /// Swerve around slower vehicles.
    pub const SWERVE_AROUND_VEHICLES: Self = Self(1 << 2);
    /// Steer around parked vehicles.
    pub const STEER_AROUND_PARKED: Self = Self(1 << 3);
    /// Obey traffic lights.
    pub const STOP_AT_LIGHTS: Self = Self(1 << 7);
    /// Overtake slower traffic using the opposite lane.
    pub const ALLOW_OVERTAKING: Self = Self(1 << 9);
    /// Keep to the posted speed limit.
    pub const RESPECT_SPEED_LIMIT: Self = Self(1 << 18);

    /// Everyday driving.
    pub const NORMAL: Self = Self(
        Self::STOP_FOR_VEHICLES.0
            | Self::STOP_FOR_PEDESTRIANS.0
            | Self::SWERVE_AROUND_VEHICLES.0
            | Self::STEER_AROUND_PARKED.0
            | Self::STOP_AT_LIGHTS.0,
    );
    /// Slow, conservative driving that never weaves through traffic.
    pub const CAUTIOUS: Self = Self(
        Self::STOP_FOR_VEHICLES.0
            | Self::STOP_FOR_PEDESTRIANS.0
            | Self::STEER_AROUND_PARKED.0
            | Self::STOP_AT_LIGHTS.0,
    );
    /// Strict adherence to every traffic rule.
    pub const LAW_ABIDING: Self = Self(Self::CAUTIOUS.0 | Self::RESPECT_SPEED_LIMIT.0);
    /// Queue behind stopped traffic instead of weaving around it.
    pub const HALTING: Self = Self(
        Self::STOP_FOR_VEHICLES.0 | Self::STOP_FOR_PEDESTRIANS.0 | Self::STOP_AT_LIGHTS.0,
    );

    /// Creates a style from raw flag bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reports whether every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the style with the flags of `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for DrivingStyle {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for DrivingStyle {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.with(rhs);
    }
}

/// Side of the road used for lateral repositioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaneSide {
    /// Lane to the driver's left.
    Left,
    /// Lane to the driver's right.
    Right,
}

/// Seat inside a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Seat {
    /// Driver's seat.
    Driver,
    /// Passenger seat by zero-based index.
    Passenger(u8),
}

/// Looping activity an actor performs while on foot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorTask {
    /// Stand and wait, glancing at the traffic.
    StandIdle,
    /// Work with a hammer.
    Hammer,
}

/// Commands that express every mutation applied to an existing entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Changes engine state.
    SetEngine {
        /// Vehicle whose engine is configured.
        vehicle: EntityId,
        /// Whether the engine is running.
        running: bool,
        /// Whether the engine can be started at all.
        operable: bool,
    },
    /// Sets the engine health as a fraction of its maximum.
    SetEngineHealth {
        /// Vehicle whose engine is damaged or repaired.
        vehicle: EntityId,
        /// Health in the range 0.0..=1.0.
        fraction: f32,
    },
    /// Sets the fuel level as a fraction of tank capacity.
    SetFuelLevel {
        /// Vehicle being refuelled.
        vehicle: EntityId,
        /// Fuel in the range 0.0..=1.0.
        fraction: f32,
    },
    /// Toggles hazard lights.
    SetHazardLights {
        /// Vehicle whose hazards are toggled.
        vehicle: EntityId,
        /// Whether the hazards blink.
        active: bool,
    },
    /// Toggles the siren and light bar of an emergency vehicle.
    SetSiren {
        /// Vehicle whose siren is toggled.
        vehicle: EntityId,
        /// Whether the siren sounds.
        active: bool,
    },
    /// Sets how dirty the bodywork looks.
    SetDirtLevel {
        /// Vehicle whose paint is dirtied or cleaned.
        vehicle: EntityId,
        /// Dirt in the range 0.0..=15.0.
        level: f32,
    },
    /// Replaces the driving style of the vehicle's driver.
    SetDrivingStyle {
        /// Vehicle whose driver changes behavior.
        vehicle: EntityId,
        /// Style to apply.
        style: DrivingStyle,
    },
    /// Sends the vehicle's driver wandering the street network.
    Cruise {
        /// Vehicle to drive.
        vehicle: EntityId,
        /// Target speed in world units per second.
        speed: f32,
        /// Style to drive with.
        style: DrivingStyle,
    },
    /// Places an actor into a vehicle seat.
    SeatActor {
        /// Actor to seat.
        actor: EntityId,
        /// Vehicle receiving the actor.
        vehicle: EntityId,
        /// Seat to occupy.
        seat: Seat,
    },
    /// Starts a looping on-foot task.
    AssignTask {
        /// Actor receiving the task.
        actor: EntityId,
        /// Task to perform.
        task: ActorTask,
    },
    /// Moves the vehicle over by one lane.
    ChangeLane {
        /// Vehicle to reposition.
        vehicle: EntityId,
        /// Direction of the move.
        side: LaneSide,
    },
    /// Pulls the vehicle aside to let an emergency vehicle pass.
    YieldToEmergency {
        /// Vehicle that yields.
        vehicle: EntityId,
        /// Emergency vehicle being yielded to.
        emergency: EntityId,
    },
}

impl Command {
    /// Entity the command mutates.
    #[must_use]
    pub const fn subject(&self) -> EntityId {
        match self {
            Self::SetEngine { vehicle, .. }
            | Self::SetEngineHealth { vehicle, .. }
            | Self::SetFuelLevel { vehicle, .. }
            | Self::SetHazardLights { vehicle, .. }
            | Self::SetSiren { vehicle, .. }
            | Self::SetDirtLevel { vehicle, .. }
            | Self::SetDrivingStyle { vehicle, .. }
            | Self::Cruise { vehicle, .. }
            | Self::ChangeLane { vehicle, .. }
            | Self::YieldToEmergency { vehicle, .. } => *vehicle,
            Self::SeatActor { actor, .. } | Self::AssignTask { actor, .. } => *actor,
        }
    }
}

/// Point on the street network together with the direction of travel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreetPoint {
    /// Location on the road surface.
    pub position: Vec3,
    /// Direction of travel in radians, measured counter-clockwise from +X.
    pub heading: f32,
}

impl StreetPoint {
    /// Creates a new street point.
    #[must_use]
    pub const fn new(position: Vec3, heading: f32) -> Self {
        Self { position, heading }
    }

    /// Unit vector pointing along the direction of travel.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.heading.cos(), self.heading.sin(), 0.0)
    }

    /// Unit vector pointing to the right of the direction of travel.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.heading.sin(), -self.heading.cos(), 0.0)
    }

    /// Point `distance` units ahead along the direction of travel.
    #[must_use]
    pub fn ahead(&self, distance: f32) -> Vec3 {
        self.position + self.forward() * distance
    }

    /// Point `distance` units to the right of the direction of travel.
    #[must_use]
    pub fn beside(&self, distance: f32) -> Vec3 {
        self.position + self.right() * distance
    }
}

/// Local player's viewpoint that anchors ambient activity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observer {
    /// Current position.
    pub position: Vec3,
    /// Vehicle the observer is driving, if any.
    pub vehicle: Option<EntityId>,
}

/// Immutable representation of a vehicle returned by spatial queries.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSnapshot {
    /// Handle of the vehicle.
    pub id: EntityId,
    /// Model the vehicle was created from.
    pub model: VehicleModel,
    /// Current position.
    pub position: Vec3,
    /// Driving style currently applied to its driver.
    pub driving_style: DrivingStyle,
    /// Whether the siren is sounding.
    pub siren_active: bool,
    /// Whether a driver occupies the driver's seat.
    pub has_driver: bool,
}

impl VehicleSnapshot {
    /// Reports whether the vehicle is an emergency vehicle responding to a call.
    #[must_use]
    pub fn is_active_emergency(&self) -> bool {
        self.model.class() == VehicleClass::Emergency && self.siren_active && self.has_driver
    }
}

/// Immutable representation of an active incident used by reactive systems.
#[derive(Clone, Debug, PartialEq)]
pub struct IncidentSnapshot {
    /// Identifier of the incident.
    pub id: IncidentId,
    /// Kind of incident.
    pub kind: IncidentKind,
    /// Anchor position of the scene.
    pub position: Vec3,
    /// Vehicles owned by the scene.
    pub vehicles: Vec<EntityId>,
}

/// Read-only snapshot describing all active incidents.
#[derive(Clone, Debug, Default)]
pub struct IncidentView {
    snapshots: Vec<IncidentSnapshot>,
}

impl IncidentView {
    /// Creates a new incident view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<IncidentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &IncidentSnapshot> {
        self.snapshots.iter()
    }

    /// Number of active incidents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no incident is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Reports whether the vehicle belongs to any incident scene.
    #[must_use]
    pub fn owns_vehicle(&self, vehicle: EntityId) -> bool {
        self.snapshots
            .iter()
            .any(|snapshot| snapshot.vehicles.contains(&vehicle))
    }
}

#[cfg(test)]
mod tests {
    use super::{DrivingStyle, EntityId, IncidentKind, VehicleModel, ZoneKind};
    use serde::{de::DeserializeOwned, Serialize};
    use std::time::Duration;

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn incident_durations_stay_within_two_to_ten_minutes() {
        for kind in IncidentKind::ALL {
            let duration = kind.duration();
            assert!(duration >= Duration::from_secs(120), "{kind:?} too short");
            assert!(duration <= Duration::from_secs(600), "{kind:?} too long");
        }
    }

    #[test]
    fn incident_kind_names_parse() {
        assert_eq!(
            IncidentKind::from_name("police-stop"),
            Some(IncidentKind::PoliceStop)
        );
        assert_eq!(IncidentKind::from_name("parade"), None);
    }

    #[test]
    fn driving_style_union_and_removal() {
        let style = DrivingStyle::CAUTIOUS.without(DrivingStyle::STOP_FOR_VEHICLES);
        assert!(!style.contains(DrivingStyle::STOP_FOR_VEHICLES));

        let forced = style | DrivingStyle::STOP_FOR_VEHICLES;
        assert!(forced.contains(DrivingStyle::STOP_FOR_VEHICLES));
        assert_eq!(forced, DrivingStyle::CAUTIOUS);
    }

    #[test]
    fn law_abiding_extends_cautious() {
        assert!(DrivingStyle::LAW_ABIDING.contains(DrivingStyle::CAUTIOUS));
        assert!(!DrivingStyle::CAUTIOUS.contains(DrivingStyle::SWERVE_AROUND_VEHICLES));
    }

    #[test]
    fn halting_never_swerves() {
        assert!(DrivingStyle::HALTING.contains(DrivingStyle::STOP_FOR_VEHICLES));
        assert!(!DrivingStyle::HALTING.contains(DrivingStyle::SWERVE_AROUND_VEHICLES));
        assert_ne!(DrivingStyle::HALTING, DrivingStyle::NORMAL);
    }

    #[test]
    fn transit_models_carry_passengers() {
        assert!(VehicleModel::AirportBus.carries_passengers());
        assert!(VehicleModel::Taxi.carries_passengers());
        assert!(!VehicleModel::Sedan.carries_passengers());
    }

    #[test]
    fn identifiers_and_kinds_round_trip_through_bincode() {
        assert_round_trip(&EntityId::new(42));
        assert_round_trip(&IncidentKind::ConvoyEscort);
        assert_round_trip(&ZoneKind::Airport);
        assert_round_trip(&DrivingStyle::LAW_ABIDING);
    }
}
