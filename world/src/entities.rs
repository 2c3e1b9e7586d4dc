//! Authoritative entity state management utilities.

use std::collections::BTreeMap;

use ambient_traffic_core::{
    ActorModel, ActorTask, DrivingStyle, EntityId, MarkerStyle, PropModel, Seat, Vec3,
    VehicleModel,
};

/// Mutable state of a vehicle stored inside the world.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleState {
    /// Model the vehicle was created from.
    pub model: VehicleModel,
    /// Current position.
    pub position: Vec3,
    /// Direction of travel in radians.
    pub heading: f32,
    /// Whether the engine is running.
    pub engine_running: bool,
    /// Whether the engine can be started.
    pub engine_operable: bool,
    /// Engine health as a fraction of its maximum.
    pub engine_health: f32,
    /// Fuel as a fraction of tank capacity.
    pub fuel: f32,
    /// Whether hazard lights blink.
    pub hazard_lights: bool,
    /// Whether the siren sounds.
    pub siren: bool,
    /// Bodywork dirt level in `0.0..=15.0`.
    pub dirt: f32,
    /// Driving style applied to the driver.
    pub driving_style: DrivingStyle,
    /// Cruise speed when the driver wanders the street network.
    pub cruise_speed: Option<f32>,
    /// Actor in the driver's seat.
    pub driver: Option<EntityId>,
    /// Actors in passenger seats.
    pub passengers: Vec<(u8, EntityId)>,
    /// Number of lane changes ordered so far.
    pub lane_changes: u32,
    /// Number of times the driver pulled aside for an emergency vehicle.
    pub yields: u32,
}

impl VehicleState {
    pub(crate) fn new(model: VehicleModel, position: Vec3, heading: f32) -> Self {
        Self {
            model,
            position,
            heading,
            engine_running: false,
            engine_operable: true,
            engine_health: 1.0,
            fuel: 0.5,
            hazard_lights: false,
            siren: false,
            dirt: 0.0,
            driving_style: DrivingStyle::NORMAL,
            cruise_speed: None,
            driver: None,
            passengers: Vec::new(),
            lane_changes: 0,
            yields: 0,
        }
    }

    /// Reports whether the passenger seat is taken.
    #[must_use]
    pub fn seat_taken(&self, seat: Seat) -> bool {
        match seat {
            Seat::Driver => self.driver.is_some(),
            Seat::Passenger(index) => self.passengers.iter().any(|(taken, _)| *taken == index),
        }
    }

    fn vacate(&mut self, actor: EntityId) {
        if self.driver == Some(actor) {
            self.driver = None;
        }
        self.passengers.retain(|(_, occupant)| *occupant != actor);
    }
}

/// Mutable state of an actor stored inside the world.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorState {
    /// Model the actor was created from.
    pub model: ActorModel,
    /// Current position.
    pub position: Vec3,
    /// Vehicle and seat the actor occupies.
    pub seat: Option<(EntityId, Seat)>,
    /// Looping on-foot task.
    pub task: Option<ActorTask>,
}

/// Kind-specific payload of an entity.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityKind {
    /// A vehicle.
    Vehicle(VehicleState),
    /// A person.
    Actor(ActorState),
    /// A static prop.
    Prop {
        /// Prop model.
        model: PropModel,
        /// Prop position.
        position: Vec3,
    },
    /// A map marker.
    Marker {
        /// Marker appearance.
        style: MarkerStyle,
        /// Marker position.
        position: Vec3,
    },
}

/// Entity stored by the world together with its lifecycle flag.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Kind-specific payload.
    pub kind: EntityKind,
    /// Whether ownership was handed back to the world.
    pub released: bool,
}

impl Entity {
    /// Position of the entity.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        match &self.kind {
            EntityKind::Vehicle(vehicle) => vehicle.position,
            EntityKind::Actor(actor) => actor.position,
            EntityKind::Prop { position, .. } | EntityKind::Marker { position, .. } => *position,
        }
    }
}

/// Registry that stores entities and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct EntityRegistry {
    entries: BTreeMap<EntityId, Entity>,
    next_id: u32,
}

impl EntityRegistry {
    /// Creates an empty registry. Identifiers start at one.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn insert(&mut self, kind: EntityKind) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        let _ = self.entries.insert(
            id,
            Entity {
                kind,
                released: false,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entries.iter().map(|(id, entity)| (*id, entity))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes the entity and detaches any seat relationships it took part in.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entries.remove(&id)?;
        match &removed.kind {
            EntityKind::Vehicle(vehicle) => {
                let occupants = vehicle
                    .driver
                    .into_iter()
                    .chain(vehicle.passengers.iter().map(|(_, actor)| *actor));
                for occupant in occupants {
                    if let Some(Entity {
                        kind: EntityKind::Actor(actor),
                        ..
                    }) = self.entries.get_mut(&occupant)
                    {
                        actor.seat = None;
                    }
                }
            }
            EntityKind::Actor(actor) => {
                if let Some((vehicle_id, _)) = actor.seat {
                    if let Some(Entity {
                        kind: EntityKind::Vehicle(vehicle),
                        ..
                    }) = self.entries.get_mut(&vehicle_id)
                    {
                        vehicle.vacate(id);
                    }
                }
            }
            EntityKind::Prop { .. } | EntityKind::Marker { .. } => {}
        }
        Some(removed)
    }
}
