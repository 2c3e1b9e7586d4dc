use std::time::Duration;

use ambient_traffic_core::{DrivingStyle, IncidentKind, Vec3, VehicleModel, WorldAdapter};
use ambient_traffic_system_bootstrap::{Director, SimulationConfig, TickSummary};
use ambient_traffic_world::{query, NoticeBoard, World};

const STEP: Duration = Duration::from_millis(250);

fn eager() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.incidents.cooldown_secs = 0;
    config.incidents.spawn_probability = 1.0;
    config
}

fn run(
    director: &mut Director,
    world: &mut World,
    notices: &mut NoticeBoard,
    steps: u32,
) -> Vec<TickSummary> {
    (0..steps)
        .map(|_| {
            world.advance(STEP);
            director.tick(world, notices)
        })
        .collect()
}

#[test]
fn incident_ticks_follow_the_coarse_interval() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(SimulationConfig::default()).expect("valid config");

    let summaries = run(&mut director, &mut world, &mut notices, 8);
    let incident_ticks = summaries
        .iter()
        .filter(|summary| summary.incidents.is_some())
        .count();

    assert_eq!(incident_ticks, 2);
}

#[test]
fn cap_holds_while_the_director_runs() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(eager()).expect("valid config");
    director.init().expect("catalog installs");

    for _ in 0..2_400 {
        world.advance(STEP);
        let _ = director.tick(&mut world, &mut notices);
        assert!(director.incidents().active().len() <= 3);
    }
    assert!(director.incidents().stats().generated > 3);
    assert!(director.incidents().stats().expired > 0);
}

#[test]
fn zone_passes_run_once_a_minute() {
    let mut world = World::new();
    world.set_hour(10);
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(SimulationConfig::default()).expect("valid config");
    director.init().expect("catalog installs");

    let summaries = run(&mut director, &mut world, &mut notices, 4 * 60 * 3);
    let passes = summaries
        .iter()
        .filter(|summary| summary.zones.is_some())
        .count();

    assert_eq!(passes, 3);
}

#[test]
fn disabled_zones_never_run() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut config = SimulationConfig::default();
    config.zones.enabled = false;
    let mut director = Director::new(config).expect("valid config");
    director.init().expect("catalog installs");

    let summaries = run(&mut director, &mut world, &mut notices, 10);
    assert!(summaries.iter().all(|summary| summary.zones.is_none()));
}

#[test]
fn failed_query_skips_one_reaction_pass_only() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(SimulationConfig::default()).expect("valid config");
    world.fail_next_queries(1);

    let first = run(&mut director, &mut world, &mut notices, 1);
    let second = run(&mut director, &mut world, &mut notices, 1);

    assert_eq!(first[0].errors, 1);
    assert_eq!(second[0].errors, 0);
}

#[test]
fn nearby_traffic_stops_for_a_forced_incident_and_recovers_on_teardown() {
    let mut world = World::new();
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(SimulationConfig::default()).expect("valid config");

    let id = director
        .spawn_incident(IncidentKind::Breakdown, &mut world, &mut notices)
        .expect("cap leaves room");
    let scene = director.incidents().get(id).expect("active").position();
    world.place_observer(scene, None);
    let car = world.spawn_traffic(VehicleModel::Sedan, scene + Vec3::new(0.0, 40.0, 0.0), 0.0);

    let summary = run(&mut director, &mut world, &mut notices, 1).remove(0);
    assert!(summary.reactions_applied >= 1);
    let style = query::vehicle(&world, car).expect("car").driving_style;
    assert_eq!(style, DrivingStyle::HALTING);

    let report = director.teardown(&mut world);
    assert_eq!(report.styles_restored, 1);
    assert!(report.incident_entities > 0);
    assert_eq!(
        query::vehicle(&world, car).expect("car").driving_style,
        DrivingStyle::NORMAL
    );
    assert_eq!(notices.messages().len(), 1);
}

#[test]
fn teardown_is_idempotent() {
    let mut world = World::new();
    world.set_hour(12);
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(eager()).expect("valid config");
    director.init().expect("catalog installs");
    let _ = run(&mut director, &mut world, &mut notices, 4 * 60 * 5);

    let first = director.teardown(&mut world);
    let second = director.teardown(&mut world);

    assert!(first.incident_entities > 0);
    assert_eq!(second, Default::default());
    assert!(director.incidents().active().is_empty());
    assert!(director
        .zones()
        .zones(world.hour_of_day())
        .iter()
        .all(|zone| zone.vehicles == 0));
}

#[test]
fn identical_seeds_produce_identical_runs() {
    fn replay() -> (Vec<String>, usize) {
        let mut world = World::new();
        world.set_hour(9);
        let mut notices = NoticeBoard::new();
        let mut director = Director::new(eager()).expect("valid config");
        director.init().expect("catalog installs");
        let _ = run(&mut director, &mut world, &mut notices, 4 * 60 * 10);
        (notices.drain(), query::entity_count(&world))
    }

    assert_eq!(replay(), replay());
}
