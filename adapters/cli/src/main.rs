#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the ambient traffic simulation headlessly.

use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};

use ambient_traffic_core::{IncidentKind, WorldAdapter};
use ambient_traffic_system_bootstrap::{Director, SimulationConfig, TickSummary};
use ambient_traffic_world::{query, NoticeBoard, World};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

mod traffic;

use traffic::TrafficDriver;

/// Runs ambient incidents, zone population and reactive traffic around a moving observer.
#[derive(Debug, Parser)]
#[command(name = "ambient-traffic", version)]
struct Cli {
    /// Simulated session length in minutes.
    #[arg(long, default_value_t = 15)]
    minutes: u64,
    /// Length of one simulation step in milliseconds.
    #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
    step_ms: u64,
    /// Master seed; overrides the seed from the configuration file.
    #[arg(long)]
    seed: Option<u64>,
    /// Hour of day the session starts at.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(0..24))]
    start_hour: u8,
    /// TOML file with simulation settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Incident kinds to create right away (breakdown, delivery, construction, police-stop, convoy-escort).
    #[arg(long, value_parser = parse_kind)]
    force: Vec<IncidentKind>,
    /// Ordinary vehicles kept around the observer.
    #[arg(long, default_value_t = 12)]
    traffic: usize,
}

/// Aggregates per-tick summaries over a whole run.
#[derive(Debug, Default)]
struct RunTotals {
    ticks: u64,
    zone_passes: u64,
    zone_spawns: usize,
    reactions_applied: usize,
    reactions_rejected: usize,
    errors: usize,
}

impl RunTotals {
    fn record(&mut self, summary: &TickSummary) {
        self.ticks += 1;
        if let Some(report) = &summary.zones {
            self.zone_passes += 1;
            self.zone_spawns += report.spawned.len();
        }
        self.reactions_applied += summary.reactions_applied;
        self.reactions_rejected += summary.reactions_rejected;
        self.errors += summary.errors;
    }
}

/// Entry point for the ambient traffic command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut world = World::new();
    world.set_hour(cli.start_hour);
    let mut notices = NoticeBoard::new();
    let mut director = Director::new(config).context("invalid simulation configuration")?;
    director.init().context("zone catalog could not be installed")?;
    let mut traffic = TrafficDriver::new(director.config().seed, cli.traffic);
    traffic.step(&mut world);

    for kind in &cli.force {
        if director
            .spawn_incident(*kind, &mut world, &mut notices)
            .is_none()
        {
            warn!(?kind, "forced incident not created");
        }
    }

    let step = Duration::from_millis(cli.step_ms);
    let length = Duration::from_secs(cli.minutes.saturating_mul(60));
    info!(minutes = cli.minutes, step_ms = cli.step_ms, seed = director.config().seed, "session started");

    let mut totals = RunTotals::default();
    print_notices(&mut notices, world.now());
    while world.now() < length {
        world.advance(step);
        traffic.step(&mut world);
        let summary = director.tick(&mut world, &mut notices);
        totals.record(&summary);
        print_notices(&mut notices, world.now());
    }

    print_summary(&director, &world, &totals);
    let report = director.teardown(&mut world);
    println!(
        "teardown: {} incident entities deleted, {} zone vehicles released, {} driving styles restored",
        report.incident_entities, report.zone_vehicles, report.styles_restored
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> Result<SimulationConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse configuration {}", path.display()))
}

fn parse_kind(value: &str) -> Result<IncidentKind, String> {
    IncidentKind::from_name(value).ok_or_else(|| {
        format!(
            "unknown incident kind `{value}`; expected breakdown, delivery, construction, police-stop or convoy-escort"
        )
    })
}

fn print_notices(notices: &mut NoticeBoard, now: Duration) {
    for notice in notices.drain() {
        println!("[{}] {notice}", clock(now));
    }
}

fn clock(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn print_summary(director: &Director, world: &World, totals: &RunTotals) {
    let stats = director.incidents().stats();
    println!();
    println!("session length: {} ({} ticks)", clock(world.now()), totals.ticks);
    println!(
        "incidents: {} generated, {} expired, {} still active",
        stats.generated,
        stats.expired,
        director.incidents().active().len()
    );
    let by_kind: BTreeMap<String, u32> = stats
        .by_kind
        .iter()
        .map(|(kind, count)| (kind.label().to_owned(), *count))
        .collect();
    for (label, count) in by_kind {
        println!("  {label}: {count}");
    }

    let hour = world.hour_of_day();
    println!(
        "zones at {hour:02}:00: {} passes, {} vehicles spawned",
        totals.zone_passes, totals.zone_spawns
    );
    for zone in director.zones().zones(hour) {
        println!(
            "  {} ({:?}): {}/{}{}",
            zone.name,
            zone.kind,
            zone.vehicles,
            zone.max_vehicles,
            if zone.in_window { "" } else { " (closed)" }
        );
    }

    println!(
        "reactions: {} commands applied, {} rejected, {} vehicles tracked",
        totals.reactions_applied,
        totals.reactions_rejected,
        director.reactions().tracked()
    );
    println!(
        "world: {} entities, {} errors logged",
        query::entity_count(world),
        totals.errors
    );
}
