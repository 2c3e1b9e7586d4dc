//! Scene factory materializing the entities of each incident kind.
//!
//! Every strategy follows the same shape: stream models, create the vehicles,
//! place actors and props around them, then apply kind-specific state through
//! [`Command`]s. A step that fails is skipped and counted; the remaining steps
//! still run, so a scene may end up partially built.

use std::f32::consts::TAU;

use ambient_traffic_core::{
    ActorModel, ActorTask, Command, EntityId, IncidentKind, Model, PropModel, Seat, StreetPoint,
    Vec3, VehicleModel, WorldAdapter, WorldError,
};
use rand::{seq::SliceRandom, Rng};
use tracing::debug;

use crate::incident::Incident;

const BREAKDOWN_ENGINE_HEALTH: f32 = 0.3;
const MOTORIST_OFFSET: f32 = 3.0;
const WARNING_TRIANGLE_DISTANCE: f32 = 8.0;
const WORKER_MIN_RADIUS: f32 = 2.0;
const WORKER_MAX_RADIUS: f32 = 8.0;
const CONE_DISTANCES: [f32; 2] = [6.0, 10.0];
const STOPPED_VEHICLE_GAP: f32 = 10.0;
const CONVOY_SPACING: f32 = 15.0;
const STOPPED_MODELS: [VehicleModel; 3] =
    [VehicleModel::Sedan, VehicleModel::Compact, VehicleModel::Suv];

/// Outcome of building a scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneReport {
    /// Entities created and registered on the incident.
    pub created: u32,
    /// Steps skipped because the host refused them.
    pub skipped: u32,
}

impl SceneReport {
    /// Reports whether every step succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.skipped == 0
    }
}

/// Builds the scene for the incident's kind and registers every created handle on it.
pub(crate) fn populate<W, R>(incident: &mut Incident, world: &mut W, rng: &mut R) -> SceneReport
where
    W: WorldAdapter + ?Sized,
    R: Rng + ?Sized,
{
    let origin = incident.origin();
    let kind = incident.kind();
    let mut scene = Scene {
        incident,
        world,
        report: SceneReport::default(),
    };

    match kind {
        IncidentKind::Breakdown => stage_breakdown(&mut scene, origin),
        IncidentKind::Delivery => stage_delivery(&mut scene, origin),
        IncidentKind::Construction => stage_construction(&mut scene, origin, rng),
        IncidentKind::PoliceStop => stage_police_stop(&mut scene, origin, rng),
        IncidentKind::ConvoyEscort => stage_convoy_escort(&mut scene, origin),
    }
    scene.marker(origin.position, kind);

    scene.report
}

fn stage_breakdown<W>(scene: &mut Scene<'_, W>, origin: StreetPoint)
where
    W: WorldAdapter + ?Sized,
{
    if let Some(car) = scene.vehicle(VehicleModel::Sedan, origin.position, origin.heading) {
        scene.command(Command::SetEngine {
            vehicle: car,
            running: false,
            operable: false,
        });
        scene.command(Command::SetEngineHealth {
            vehicle: car,
            fraction: BREAKDOWN_ENGINE_HEALTH,
        });
        scene.command(Command::SetHazardLights {
            vehicle: car,
            active: true,
        });
    }

    if let Some(motorist) = scene.actor(ActorModel::Motorist, origin.beside(MOTORIST_OFFSET)) {
        scene.command(Command::AssignTask {
            actor: motorist,
            task: ActorTask::StandIdle,
        });
    }

    scene.prop(
        PropModel::WarningTriangle,
        origin.ahead(-WARNING_TRIANGLE_DISTANCE),
    );
}

fn stage_delivery<W>(scene: &mut Scene<'_, W>, origin: StreetPoint)
where
    W: WorldAdapter + ?Sized,
{
    let van = scene.vehicle(VehicleModel::CargoVan, origin.position, origin.heading);
    let courier = scene.actor(ActorModel::Courier, origin.position);

    let Some(van) = van else {
        return;
    };
    if let Some(courier) = courier {
        scene.command(Command::SeatActor {
            actor: courier,
            vehicle: van,
            seat: Seat::Driver,
        });
    }
    scene.command(Command::SetEngine {
        vehicle: van,
        running: true,
        operable: true,
    });
    scene.command(Command::SetFuelLevel {
        vehicle: van,
        fraction: 1.0,
    });
}

fn stage_construction<W, R>(scene: &mut Scene<'_, W>, origin: StreetPoint, rng: &mut R)
where
    W: WorldAdapter + ?Sized,
    R: Rng + ?Sized,
{
    let _ = scene.vehicle(VehicleModel::CargoVan, origin.position, origin.heading);

    for _ in 0..2 {
        let angle = rng.gen_range(0.0..TAU);
        let radius = rng.gen_range(WORKER_MIN_RADIUS..=WORKER_MAX_RADIUS);
        let position = origin.position + Vec3::new(angle.cos(), angle.sin(), 0.0) * radius;
        if let Some(worker) = scene.actor(ActorModel::Worker, position) {
            scene.command(Command::AssignTask {
                actor: worker,
                task: ActorTask::Hammer,
            });
        }
    }

    for distance in CONE_DISTANCES {
        scene.prop(PropModel::TrafficCone, origin.ahead(-distance));
    }
}

fn stage_police_stop<W, R>(scene: &mut Scene<'_, W>, origin: StreetPoint, rng: &mut R)
where
    W: WorldAdapter + ?Sized,
    R: Rng + ?Sized,
{
    if let Some(patrol) = scene.vehicle(VehicleModel::PatrolCar, origin.position, origin.heading)
    {
        scene.command(Command::SetSiren {
            vehicle: patrol,
            active: true,
        });
    }

    let model = STOPPED_MODELS
        .choose(rng)
        .copied()
        .unwrap_or(VehicleModel::Sedan);
    let _ = scene.vehicle(model, origin.ahead(STOPPED_VEHICLE_GAP), origin.heading);
}

fn stage_convoy_escort<W>(scene: &mut Scene<'_, W>, origin: StreetPoint)
where
    W: WorldAdapter + ?Sized,
{
    let lead = scene.vehicle(
        VehicleModel::PatrolCar,
        origin.ahead(CONVOY_SPACING),
        origin.heading,
    );
    let _ = scene.vehicle(VehicleModel::ArmoredTruck, origin.position, origin.heading);
    let rear = scene.vehicle(
        VehicleModel::PatrolCar,
        origin.ahead(-CONVOY_SPACING),
        origin.heading,
    );

    for escort in lead.into_iter().chain(rear) {
        scene.command(Command::SetSiren {
            vehicle: escort,
            active: true,
        });
    }
}

/// Scratch state shared by the staging steps of one scene.
struct Scene<'a, W: ?Sized> {
    incident: &'a mut Incident,
    world: &'a mut W,
    report: SceneReport,
}

impl<W> Scene<'_, W>
where
    W: WorldAdapter + ?Sized,
{
    fn vehicle(&mut self, model: VehicleModel, position: Vec3, heading: f32) -> Option<EntityId> {
        let created = self
            .world
            .request_model(Model::Vehicle(model))
            .and_then(|()| self.world.spawn_vehicle(model, position, heading));
        let vehicle = self.settle(created)?;
        self.incident.vehicles.push(vehicle);
        Some(vehicle)
    }

    fn actor(&mut self, model: ActorModel, position: Vec3) -> Option<EntityId> {
        let created = self
            .world
            .request_model(Model::Actor(model))
            .and_then(|()| self.world.spawn_actor(model, position));
        let actor = self.settle(created)?;
        self.incident.actors.push(actor);
        Some(actor)
    }

    fn prop(&mut self, model: PropModel, position: Vec3) {
        let created = self
            .world
            .request_model(Model::Prop(model))
            .and_then(|()| self.world.spawn_prop(model, position));
        if let Some(prop) = self.settle(created) {
            self.incident.props.push(prop);
        }
    }

    fn marker(&mut self, position: Vec3, kind: IncidentKind) {
        let created = self.world.add_marker(position, kind.marker_style());
        self.incident.marker = self.settle(created);
    }

    fn command(&mut self, command: Command) {
        if let Err(error) = self.world.apply(command) {
            self.skip(&error);
        }
    }

    fn settle(&mut self, created: Result<EntityId, WorldError>) -> Option<EntityId> {
        match created {
            Ok(entity) => {
                self.report.created += 1;
                Some(entity)
            }
            Err(error) => {
                self.skip(&error);
                None
            }
        }
    }

    fn skip(&mut self, error: &WorldError) {
        self.report.skipped += 1;
        debug!(incident = %self.incident.id(), %error, "scene step skipped");
    }
}
