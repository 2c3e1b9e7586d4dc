#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless authoritative world that hosts the ambient traffic systems.
//!
//! [`World`] implements [`WorldAdapter`] on top of an in-memory entity
//! registry, an orthogonal street grid and a scaled day clock. It backs the
//! command-line runner and every integration test, and exposes failure
//! injection so callers can observe how systems degrade when the host cannot
//! load a model, refuses a spawn, or drops a spatial query.

use std::{cell::Cell, collections::HashSet, time::Duration};

use ambient_traffic_core::{
    ActorModel, Command, EntityId, LaneSide, MarkerStyle, Model, Notifier, Observer, PropModel,
    Seat, StreetPoint, Vec3, VehicleModel, VehicleSnapshot, WorldAdapter, WorldError,
};

mod entities;
mod streets;

use entities::EntityRegistry;
pub use entities::{ActorState, Entity, EntityKind, VehicleState};
use streets::StreetGrid;

const DEFAULT_START_HOUR: f64 = 8.0;
const GAME_SECONDS_PER_SECOND: f64 = 30.0;
const BLOCK_LENGTH: f32 = 100.0;
const MAP_EXTENT: f32 = 4_000.0;
const DESPAWN_DISTANCE: f32 = 300.0;
const LANE_WIDTH: f32 = 3.5;

/// Represents the authoritative ambient traffic world state.
#[derive(Debug)]
pub struct World {
    elapsed: Duration,
    clock_offset_hours: f64,
    observer: Observer,
    streets: StreetGrid,
    entities: EntityRegistry,
    loaded_models: HashSet<Model>,
    unavailable_models: HashSet<Model>,
    rejected_models: HashSet<Model>,
    failing_queries: Cell<u32>,
    refused_commands: u32,
    pinned: HashSet<EntityId>,
    history: Vec<Command>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world at 08:00 with the observer on foot at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elapsed: Duration::ZERO,
            clock_offset_hours: DEFAULT_START_HOUR,
            observer: Observer {
                position: Vec3::ZERO,
                vehicle: None,
            },
            streets: StreetGrid::new(BLOCK_LENGTH, MAP_EXTENT),
            entities: EntityRegistry::new(),
            loaded_models: HashSet::new(),
            unavailable_models: HashSet::new(),
            rejected_models: HashSet::new(),
            failing_queries: Cell::new(0),
            refused_commands: 0,
            pinned: HashSet::new(),
            history: Vec::new(),
        }
    }

    /// Advances the session clock and lets released entities out of sight age out.
    pub fn advance(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);

        let observer = self.observer.position;
        let expired: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| {
                entity.released && entity.position().distance(observer) > DESPAWN_DISTANCE
            })
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            let _ = self.entities.remove(id);
        }
    }

    /// Moves the day clock so that the current hour of day equals `hour`.
    pub fn set_hour(&mut self, hour: u8) {
        let target = f64::from(hour % 24) + 0.5 / 60.0;
        self.clock_offset_hours = target - self.elapsed_game_hours();
    }

    /// Relocates the observer, optionally seated in one of the world's vehicles.
    pub fn place_observer(&mut self, position: Vec3, vehicle: Option<EntityId>) {
        self.observer = Observer { position, vehicle };
    }

    /// Creates a driven ambient vehicle without going through model streaming.
    pub fn spawn_traffic(&mut self, model: VehicleModel, position: Vec3, heading: f32) -> EntityId {
        let vehicle = self
            .entities
            .insert(EntityKind::Vehicle(VehicleState::new(model, position, heading)));
        let driver = self.entities.insert(EntityKind::Actor(ActorState {
            model: ActorModel::Driver,
            position,
            seat: Some((vehicle, Seat::Driver)),
            task: None,
        }));
        if let Ok(state) = self.vehicle_mut(vehicle) {
            state.driver = Some(driver);
            state.engine_running = true;
            state.cruise_speed = Some(12.0);
        }
        vehicle
    }

    /// Makes every request for `model` fail as if the asset were missing.
    pub fn make_unavailable(&mut self, model: impl Into<Model>) {
        let model = model.into();
        let _ = self.loaded_models.remove(&model);
        let _ = self.unavailable_models.insert(model);
    }

    /// Makes entity creation for `model` fail even after it loaded.
    pub fn reject_spawns_of(&mut self, model: impl Into<Model>) {
        let _ = self.rejected_models.insert(model.into());
    }

    /// Makes the next `count` spatial queries fail.
    pub fn fail_next_queries(&mut self, count: u32) {
        self.failing_queries.set(count);
    }

    /// Makes the next `count` commands fail without touching their subject.
    pub fn refuse_next_commands(&mut self, count: u32) {
        self.refused_commands = count;
    }

    /// Makes explicit deletion of the entity fail. Released pinned entities still age out.
    pub fn pin(&mut self, entity: EntityId) {
        let _ = self.pinned.insert(entity);
    }

    /// Removes the entity the way the host's own lifecycle would.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        self.entities.remove(entity).is_some()
    }

    fn elapsed_game_hours(&self) -> f64 {
        self.elapsed.as_secs_f64() * GAME_SECONDS_PER_SECOND / 3_600.0
    }

    fn ensure_spawnable(&self, model: Model) -> Result<(), WorldError> {
        if self.rejected_models.contains(&model) {
            return Err(WorldError::SpawnRejected(model));
        }
        if !self.loaded_models.contains(&model) {
            return Err(WorldError::ModelUnavailable(model));
        }
        Ok(())
    }

    fn vehicle_mut(&mut self, id: EntityId) -> Result<&mut VehicleState, WorldError> {
        match self.entities.get_mut(id) {
            Some(Entity {
                kind: EntityKind::Vehicle(vehicle),
                ..
            }) => Ok(vehicle),
            Some(_) => Err(WorldError::NotAVehicle(id)),
            None => Err(WorldError::MissingEntity(id)),
        }
    }

    fn actor_mut(&mut self, id: EntityId) -> Result<&mut ActorState, WorldError> {
        match self.entities.get_mut(id) {
            Some(Entity {
                kind: EntityKind::Actor(actor),
                ..
            }) => Ok(actor),
            Some(_) => Err(WorldError::NotAnActor(id)),
            None => Err(WorldError::MissingEntity(id)),
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command) -> Result<(), WorldError> {
    if world.refused_commands > 0 {
        world.refused_commands -= 1;
        return Err(WorldError::Refused(command.subject()));
    }
    let record = command.clone();
    match command {
        Command::SetEngine {
            vehicle,
            running,
            operable,
        } => {
            let state = world.vehicle_mut(vehicle)?;
            state.engine_operable = operable;
            state.engine_running = running && operable;
        }
        Command::SetEngineHealth { vehicle, fraction } => {
            world.vehicle_mut(vehicle)?.engine_health = fraction.clamp(0.0, 1.0);
        }
        Command::SetFuelLevel { vehicle, fraction } => {
            world.vehicle_mut(vehicle)?.fuel = fraction.clamp(0.0, 1.0);
        }
        Command::SetHazardLights { vehicle, active } => {
            world.vehicle_mut(vehicle)?.hazard_lights = active;
        }
        Command::SetSiren { vehicle, active } => {
            world.vehicle_mut(vehicle)?.siren = active;
        }
        Command::SetDirtLevel { vehicle, level } => {
            world.vehicle_mut(vehicle)?.dirt = level.clamp(0.0, 15.0);
        }
        Command::SetDrivingStyle { vehicle, style } => {
            world.vehicle_mut(vehicle)?.driving_style = style;
        }
        Command::Cruise {
            vehicle,
            speed,
            style,
        } => {
            let state = world.vehicle_mut(vehicle)?;
            state.cruise_speed = Some(speed.max(0.0));
            state.driving_style = style;
            state.engine_running = state.engine_operable;
        }
        Command::SeatActor {
            actor,
            vehicle,
            seat,
        } => {
            let _ = world.vehicle_mut(vehicle)?;
            world.actor_mut(actor)?.seat = Some((vehicle, seat));
            let state = world.vehicle_mut(vehicle)?;
            match seat {
                Seat::Driver => state.driver = Some(actor),
                Seat::Passenger(index) => state.passengers.push((index, actor)),
            }
        }
        Command::AssignTask { actor, task } => {
            world.actor_mut(actor)?.task = Some(task);
        }
        Command::ChangeLane { vehicle, side } => {
            let state = world.vehicle_mut(vehicle)?;
            let street = StreetPoint::new(state.position, state.heading);
            let offset = match side {
                LaneSide::Left => -LANE_WIDTH,
                LaneSide::Right => LANE_WIDTH,
            };
            state.position = street.beside(offset);
            state.lane_changes = state.lane_changes.saturating_add(1);
        }
        Command::YieldToEmergency { vehicle, emergency } => {
            if !world.entities.contains(emergency) {
                return Err(WorldError::MissingEntity(emergency));
            }
            let state = world.vehicle_mut(vehicle)?;
            let street = StreetPoint::new(state.position, state.heading);
            state.position = street.beside(LANE_WIDTH);
            state.yields = state.yields.saturating_add(1);
        }
    }
    world.history.push(record);
    Ok(())
}

impl WorldAdapter for World {
    fn now(&self) -> Duration {
        self.elapsed
    }

    fn hour_of_day(&self) -> u8 {
        let hours = (self.clock_offset_hours + self.elapsed_game_hours()).rem_euclid(24.0);
        (hours.floor() as u8).min(23)
    }

    fn observer(&self) -> Observer {
        self.observer
    }

    fn snap_to_street(&self, point: Vec3) -> Option<StreetPoint> {
        self.streets.snap(point)
    }

    fn request_model(&mut self, model: Model) -> Result<(), WorldError> {
        if self.unavailable_models.contains(&model) {
            return Err(WorldError::ModelUnavailable(model));
        }
        let _ = self.loaded_models.insert(model);
        Ok(())
    }

    fn spawn_vehicle(
        &mut self,
        model: VehicleModel,
        position: Vec3,
        heading: f32,
    ) -> Result<EntityId, WorldError> {
        self.ensure_spawnable(Model::Vehicle(model))?;
        Ok(self
            .entities
            .insert(EntityKind::Vehicle(VehicleState::new(model, position, heading))))
    }

    fn spawn_actor(&mut self, model: ActorModel, position: Vec3) -> Result<EntityId, WorldError> {
        self.ensure_spawnable(Model::Actor(model))?;
        Ok(self.entities.insert(EntityKind::Actor(ActorState {
            model,
            position,
            seat: None,
            task: None,
        })))
    }

    fn spawn_prop(&mut self, model: PropModel, position: Vec3) -> Result<EntityId, WorldError> {
        self.ensure_spawnable(Model::Prop(model))?;
        Ok(self.entities.insert(EntityKind::Prop { model, position }))
    }

    fn add_marker(&mut self, position: Vec3, style: MarkerStyle) -> Result<EntityId, WorldError> {
        Ok(self.entities.insert(EntityKind::Marker { style, position }))
    }

    fn delete(&mut self, entity: EntityId) -> Result<(), WorldError> {
        if self.pinned.contains(&entity) && self.entities.contains(entity) {
            return Err(WorldError::Refused(entity));
        }
        self.entities
            .remove(entity)
            .map(|_| ())
            .ok_or(WorldError::MissingEntity(entity))
    }

    fn release(&mut self, entity: EntityId) -> Result<(), WorldError> {
        let stored = self
            .entities
            .get_mut(entity)
            .ok_or(WorldError::MissingEntity(entity))?;
        stored.released = true;
        Ok(())
    }

    fn exists(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    fn vehicles_near(
        &self,
        center: Vec3,
        radius: f32,
    ) -> Result<Vec<VehicleSnapshot>, WorldError> {
        let pending = self.failing_queries.get();
        if pending > 0 {
            self.failing_queries.set(pending - 1);
            return Err(WorldError::QueryFailed(format!(
                "streaming stalled around {center}"
            )));
        }

        Ok(self
            .entities
            .iter()
            .filter_map(|(id, entity)| match &entity.kind {
                EntityKind::Vehicle(vehicle) if vehicle.position.distance(center) <= radius => {
                    Some(VehicleSnapshot {
                        id,
                        model: vehicle.model,
                        position: vehicle.position,
                        driving_style: vehicle.driving_style,
                        siren_active: vehicle.siren,
                        has_driver: vehicle.driver.is_some(),
                    })
                }
                _ => None,
            })
            .collect())
    }

    fn apply(&mut self, command: Command) -> Result<(), WorldError> {
        apply(self, command)
    }
}

/// Notifier that keeps every posted notice in memory.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    messages: Vec<String>,
}

impl NoticeBoard {
    /// Creates an empty notice board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices posted so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Removes and returns every notice posted so far.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

impl Notifier for NoticeBoard {
    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_owned());
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use ambient_traffic_core::{Command, EntityId, MarkerStyle, Vec3};

    use super::{ActorState, Entity, EntityKind, VehicleState, World};

    /// Looks up an entity by handle.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<&Entity> {
        world.entities.get(id)
    }

    /// Looks up a vehicle by handle.
    #[must_use]
    pub fn vehicle(world: &World, id: EntityId) -> Option<&VehicleState> {
        match world.entities.get(id).map(|entity| &entity.kind) {
            Some(EntityKind::Vehicle(vehicle)) => Some(vehicle),
            _ => None,
        }
    }

    /// Looks up an actor by handle.
    #[must_use]
    pub fn actor(world: &World, id: EntityId) -> Option<&ActorState> {
        match world.entities.get(id).map(|entity| &entity.kind) {
            Some(EntityKind::Actor(actor)) => Some(actor),
            _ => None,
        }
    }

    /// Reports whether ownership of the entity was handed back to the world.
    #[must_use]
    pub fn is_released(world: &World, id: EntityId) -> bool {
        world.entities.get(id).is_some_and(|entity| entity.released)
    }

    /// Every map marker currently placed.
    #[must_use]
    pub fn markers(world: &World) -> Vec<(EntityId, MarkerStyle, Vec3)> {
        world
            .entities
            .iter()
            .filter_map(|(id, entity)| match entity.kind {
                EntityKind::Marker { style, position } => Some((id, style, position)),
                _ => None,
            })
            .collect()
    }

    /// Number of live entities of every kind.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Commands applied successfully so far, oldest first.
    #[must_use]
    pub fn history(world: &World) -> &[Command] {
        &world.history
    }

    /// Half-width of the square map; streets do not exist beyond it.
    #[must_use]
    pub fn map_extent(world: &World) -> f32 {
        world.streets.extent()
    }
}
