use std::time::Duration;

use ambient_traffic_core::{
    ActorTask, IncidentKind, Model, PropModel, Vec3, VehicleModel, WorldAdapter,
};
use ambient_traffic_system_incidents::{Config, IncidentScheduler};
use ambient_traffic_world::{query, NoticeBoard, World};

const MINUTE: Duration = Duration::from_secs(60);

fn eager_scheduler() -> IncidentScheduler {
    IncidentScheduler::new(Config::new(3 * MINUTE, 3, 1.0, 0x5eed))
}

#[test]
fn active_count_never_exceeds_cap() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = IncidentScheduler::new(Config::new(Duration::ZERO, 3, 1.0, 0xabcd));

    let mut peak = 0;
    for second in 0..900 {
        let now = Duration::from_secs(second);
        let _ = scheduler.tick(now, &mut world, &mut notices);
        assert!(scheduler.active().len() <= 3, "cap exceeded at {second}s");
        peak = peak.max(scheduler.active().len());
    }
    assert_eq!(peak, 3, "eager scheduler should saturate the cap");
}

#[test]
fn cooldown_scenario_keeps_first_incident_until_it_expires() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let first = scheduler
        .spawn_now(IncidentKind::Breakdown, Duration::ZERO, &mut world, &mut notices)
        .expect("first incident");
    assert_eq!(
        scheduler.get(first).map(|incident| incident.duration()),
        Some(5 * MINUTE)
    );

    let early = scheduler.tick(2 * MINUTE, &mut world, &mut notices);
    assert_eq!(early.generated, None, "cooldown still running");

    let eligible = scheduler.tick(3 * MINUTE, &mut world, &mut notices);
    let second = eligible.generated.expect("cooldown elapsed and draw succeeds");
    assert_eq!(scheduler.active().len(), 2);
    assert!(scheduler.get(first).is_some());
    let second_expiry = scheduler.get(second).expect("second active").expires_at();

    let later = 5 * MINUTE + Duration::from_secs(1);
    let outcome = scheduler.tick(later, &mut world, &mut notices);
    assert!(outcome.expired.contains(&first));
    assert!(scheduler.get(first).is_none());
    assert_eq!(outcome.generated, None, "cooldown restarted at three minutes");
    assert_eq!(scheduler.get(second).is_some(), second_expiry > later);
}

#[test]
fn incident_is_present_until_its_lifetime_elapses() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = IncidentScheduler::new(Config::new(MINUTE, 3, 0.0, 1));

    let created = Duration::from_secs(30);
    let id = scheduler
        .spawn_now(IncidentKind::Delivery, created, &mut world, &mut notices)
        .expect("incident");
    let expires = created + IncidentKind::Delivery.duration();

    let _ = scheduler.tick(expires - Duration::from_millis(1), &mut world, &mut notices);
    assert!(scheduler.get(id).is_some());

    let outcome = scheduler.tick(expires, &mut world, &mut notices);
    assert_eq!(outcome.expired, vec![id]);
    assert!(scheduler.active().is_empty());
    assert_eq!(scheduler.stats().expired, 1);
}

#[test]
fn expiry_releases_every_scene_entity() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = IncidentScheduler::new(Config::new(MINUTE, 3, 0.0, 2));
    let baseline = query::entity_count(&world);

    let id = scheduler
        .spawn_now(IncidentKind::Construction, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let handles: Vec<_> = {
        let incident = scheduler.get(id).expect("active");
        incident
            .vehicles()
            .iter()
            .chain(incident.actors())
            .chain(incident.props())
            .copied()
            .chain(incident.marker())
            .collect()
    };
    assert!(query::entity_count(&world) > baseline);

    let _ = scheduler.tick(IncidentKind::Construction.duration(), &mut world, &mut notices);

    for handle in handles {
        assert!(!world.exists(handle), "{handle:?} leaked");
    }
    assert_eq!(query::entity_count(&world), baseline);
}

#[test]
fn generation_posts_a_notice_and_places_a_marker() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let outcome = scheduler.tick(Duration::ZERO, &mut world, &mut notices);
    let id = outcome.generated.expect("first tick is eligible");
    let incident = scheduler.get(id).expect("active");

    assert_eq!(notices.messages().len(), 1);
    assert!(notices.messages()[0].contains(incident.kind().label()));

    let markers = query::markers(&world);
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].1, incident.kind().marker_style());
    assert_eq!(Some(markers[0].0), incident.marker());
}

#[test]
fn incidents_are_placed_on_streets_within_distance_band() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = IncidentScheduler::new(Config::new(Duration::ZERO, 3, 1.0, 99));

    for second in 0..3 {
        let _ = scheduler.tick(Duration::from_secs(second), &mut world, &mut notices);
    }

    let observer = world.observer().position;
    for incident in scheduler.active() {
        let position = incident.position();
        let on_street = position.x % 100.0 == 0.0 || position.y % 100.0 == 0.0;
        assert!(on_street, "{position} is off the street grid");
        // Snapping moves a candidate by at most half a block.
        let distance = position.distance(observer);
        assert!((50.0..=550.0).contains(&distance), "distance {distance}");
        assert!((1..=2).contains(&incident.affected_lanes()));
    }
}

#[test]
fn breakdown_scene_disables_the_sedan() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::Breakdown, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");

    assert_eq!(incident.vehicles().len(), 1);
    let car = query::vehicle(&world, incident.vehicles()[0]).expect("sedan");
    assert_eq!(car.model, VehicleModel::Sedan);
    assert!(!car.engine_running);
    assert!(!car.engine_operable);
    assert!((car.engine_health - 0.3).abs() < f32::EPSILON);

    assert_eq!(incident.actors().len(), 1);
    let motorist = query::actor(&world, incident.actors()[0]).expect("motorist");
    assert!(motorist.position.distance(incident.position()) <= 8.0);
    assert_eq!(motorist.task, Some(ActorTask::StandIdle));
}

#[test]
fn delivery_scene_seats_a_running_driver() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::Delivery, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");

    let van = query::vehicle(&world, incident.vehicles()[0]).expect("van");
    assert_eq!(van.model, VehicleModel::CargoVan);
    assert!(van.engine_running);
    assert!((van.fuel - 1.0).abs() < f32::EPSILON);
    assert_eq!(van.driver, Some(incident.actors()[0]));
}

#[test]
fn construction_scene_has_two_hammering_workers_nearby() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::Construction, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");

    assert_eq!(incident.actors().len(), 2);
    for worker in incident.actors() {
        let worker = query::actor(&world, *worker).expect("worker");
        assert_eq!(worker.task, Some(ActorTask::Hammer));
        assert!(worker.position.distance(incident.position()) <= 8.0 + 1e-3);
    }
    assert_eq!(incident.props().len(), 2);
}

#[test]
fn police_stop_places_civilian_ahead_of_patrol_with_siren() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::PoliceStop, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");
    assert_eq!(incident.vehicles().len(), 2);

    let patrol = query::vehicle(&world, incident.vehicles()[0]).expect("patrol");
    let civilian = query::vehicle(&world, incident.vehicles()[1]).expect("civilian");
    assert_eq!(patrol.model, VehicleModel::PatrolCar);
    assert!(patrol.siren);
    assert!((patrol.position.distance(civilian.position) - 10.0).abs() < 1e-3);
    assert!(!civilian.siren);
}

#[test]
fn convoy_escort_spaces_three_vehicles_with_both_sirens() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::ConvoyEscort, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");
    let vehicles: Vec<_> = incident
        .vehicles()
        .iter()
        .map(|id| query::vehicle(&world, *id).expect("convoy vehicle"))
        .collect();

    assert_eq!(
        vehicles.iter().map(|v| v.model).collect::<Vec<_>>(),
        vec![
            VehicleModel::PatrolCar,
            VehicleModel::ArmoredTruck,
            VehicleModel::PatrolCar
        ]
    );
    assert!(vehicles[0].siren && vehicles[2].siren);
    assert!((vehicles[0].position.distance(vehicles[1].position) - 15.0).abs() < 1e-3);
    assert!((vehicles[1].position.distance(vehicles[2].position) - 15.0).abs() < 1e-3);
}

#[test]
fn missing_models_leave_a_partial_scene() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();
    world.make_unavailable(VehicleModel::Sedan);
    world.make_unavailable(Model::Prop(PropModel::WarningTriangle));

    let id = scheduler
        .spawn_now(IncidentKind::Breakdown, Duration::ZERO, &mut world, &mut notices)
        .expect("partial incidents are still registered");
    let incident = scheduler.get(id).expect("active");

    assert!(incident.vehicles().is_empty());
    assert!(incident.props().is_empty());
    assert_eq!(incident.actors().len(), 1, "motorist still placed");
    assert!(incident.marker().is_some());
}

#[test]
fn rejected_spawns_do_not_abort_the_convoy() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();
    world.reject_spawns_of(VehicleModel::ArmoredTruck);

    let id = scheduler
        .spawn_now(IncidentKind::ConvoyEscort, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let incident = scheduler.get(id).expect("active");

    assert_eq!(incident.vehicles().len(), 2);
    for patrol in incident.vehicles() {
        assert!(query::vehicle(&world, *patrol).expect("patrol").siren);
    }
}

#[test]
fn disposal_is_idempotent_and_tolerates_vanished_entities() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();
    let baseline = query::entity_count(&world);

    let id = scheduler
        .spawn_now(IncidentKind::PoliceStop, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let gone = scheduler.get(id).expect("active").vehicles()[1];
    assert!(world.despawn(gone));

    let removed = scheduler.dispose(&mut world);
    assert_eq!(removed, 2, "patrol and marker remained");
    assert_eq!(scheduler.dispose(&mut world), 0);
    assert!(scheduler.active().is_empty());
    assert_eq!(query::entity_count(&world), baseline);
}

#[test]
fn undeletable_scene_entities_are_handed_back_to_the_world() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let id = scheduler
        .spawn_now(IncidentKind::Breakdown, Duration::ZERO, &mut world, &mut notices)
        .expect("incident");
    let sedan = scheduler.get(id).expect("active").vehicles()[0];
    world.pin(sedan);

    let removed = scheduler.dispose(&mut world);

    assert_eq!(removed, 3, "motorist, triangle and marker deleted");
    assert!(world.exists(sedan));
    assert!(query::is_released(&world, sedan));
}

#[test]
fn failed_placement_does_not_consume_the_cooldown() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    world.place_observer(Vec3::new(10_000.0, 0.0, 0.0), None);
    let off_map = scheduler.tick(Duration::ZERO, &mut world, &mut notices);
    assert_eq!(off_map.generated, None);
    assert!(notices.messages().is_empty());

    world.place_observer(Vec3::ZERO, None);
    let on_map = scheduler.tick(Duration::from_secs(1), &mut world, &mut notices);
    assert!(on_map.generated.is_some(), "cooldown was consumed by the failed attempt");
    assert_eq!(scheduler.active().len(), 1);
}

#[test]
fn cancel_releases_only_the_named_incident() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    let first = scheduler
        .spawn_now(IncidentKind::Delivery, Duration::ZERO, &mut world, &mut notices)
        .expect("first");
    let second = scheduler
        .spawn_now(IncidentKind::Construction, Duration::ZERO, &mut world, &mut notices)
        .expect("second");

    assert!(scheduler.cancel(first, &mut world));
    assert!(!scheduler.cancel(first, &mut world));
    assert!(scheduler.get(second).is_some());
    assert_eq!(scheduler.stats().cancelled, 1);
}

#[test]
fn forced_spawns_respect_the_cap() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut scheduler = eager_scheduler();

    for kind in IncidentKind::ALL {
        let _ = scheduler.spawn_now(kind, Duration::ZERO, &mut world, &mut notices);
    }

    assert_eq!(scheduler.active().len(), 3);
    assert_eq!(scheduler.stats().generated, 3);
    assert_eq!(scheduler.view().len(), 3);
}
