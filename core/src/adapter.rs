//! Collaborator seams implemented by the simulation host.

use std::time::Duration;

use thiserror::Error;

use crate::{
    ActorModel, Command, EntityId, MarkerStyle, Model, Observer, PropModel, StreetPoint, Vec3,
    VehicleModel, VehicleSnapshot,
};

/// Failures reported by the simulation host.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum WorldError {
    /// The asset could not be streamed in.
    #[error("model {0:?} is unavailable")]
    ModelUnavailable(Model),
    /// The host refused to create the entity.
    #[error("host refused to create {0:?}")]
    SpawnRejected(Model),
    /// The handle no longer resolves to a live entity.
    #[error("entity {} no longer exists", .0.get())]
    MissingEntity(EntityId),
    /// A vehicle command targeted an entity that is not a vehicle.
    #[error("entity {} is not a vehicle", .0.get())]
    NotAVehicle(EntityId),
    /// An actor command targeted an entity that is not an actor.
    #[error("entity {} is not an actor", .0.get())]
    NotAnActor(EntityId),
    /// The host refused to change the entity.
    #[error("host refused to change entity {}", .0.get())]
    Refused(EntityId),
    /// A spatial query could not be answered this frame.
    #[error("spatial query failed: {0}")]
    QueryFailed(String),
}

impl WorldError {
    /// Reports whether the error only signals a stale handle.
    #[must_use]
    pub fn is_missing_entity(&self) -> bool {
        matches!(self, Self::MissingEntity(_))
    }
}

/// Simulation host exposing the clock, spatial queries and entity lifecycle.
pub trait WorldAdapter {
    /// Simulated time elapsed since the session started.
    fn now(&self) -> Duration;

    /// Current simulated hour of day in `0..24`.
    fn hour_of_day(&self) -> u8;

    /// Viewpoint ambient activity is centred on.
    fn observer(&self) -> Observer;

    /// Snaps a point to the nearest traversable street.
    fn snap_to_street(&self, point: Vec3) -> Option<StreetPoint>;

    /// Ensures the model is loaded and ready for entity creation.
    fn request_model(&mut self, model: Model) -> Result<(), WorldError>;

    /// Creates a vehicle facing `heading` radians.
    fn spawn_vehicle(
        &mut self,
        model: VehicleModel,
        position: Vec3,
        heading: f32,
    ) -> Result<EntityId, WorldError>;

    /// Creates an actor standing at `position`.
    fn spawn_actor(&mut self, model: ActorModel, position: Vec3) -> Result<EntityId, WorldError>;

    /// Creates a static prop.
    fn spawn_prop(&mut self, model: PropModel, position: Vec3) -> Result<EntityId, WorldError>;

    /// Places a map marker.
    fn add_marker(&mut self, position: Vec3, style: MarkerStyle) -> Result<EntityId, WorldError>;

    /// Deletes the entity immediately.
    fn delete(&mut self, entity: EntityId) -> Result<(), WorldError>;

    /// Hands the entity back to the host, which removes it once it is out of sight.
    fn release(&mut self, entity: EntityId) -> Result<(), WorldError>;

    /// Reports whether the handle still resolves to a live entity.
    fn exists(&self, entity: EntityId) -> bool;

    /// Lists vehicles within `radius` of `center`.
    fn vehicles_near(&self, center: Vec3, radius: f32)
        -> Result<Vec<VehicleSnapshot>, WorldError>;

    /// Executes a behavioral command against an existing entity.
    fn apply(&mut self, command: Command) -> Result<(), WorldError>;
}

/// Presents transient on-screen text.
pub trait Notifier {
    /// Posts a short notice.
    fn notify(&mut self, message: &str);
}
