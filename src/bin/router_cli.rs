use std::time::Instant;

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{debug, error, info};

use sail_router::engine::config::RouterConfig;
use sail_router::engine::environment::{EnvironmentProvider, SampleGrid};
use sail_router::engine::error::EnvironmentError;
use sail_router::engine::land::LandConstraint;
use sail_router::engine::models::{CurrentData, EnvironmentalSample, GeoPoint, WindData, MS_TO_KNOTS};
use sail_router::engine::route::LegMode;
use sail_router::engine::router::RoutingContext;
use sail_router::engine::statistics::isochrones;
use sail_router::engine::vessel::VesselProfile;
use sail_router::parsers::polars::PolarData;

/// A Mistral blowing from the north-west, easing over two days, with a weak
/// east-going current.
fn mistral(
    departure: DateTime<Utc>,
) -> impl Fn(&GeoPoint, DateTime<Utc>) -> Result<EnvironmentalSample, EnvironmentError> + Sync {
    move |point: &GeoPoint, time: DateTime<Utc>| {
        let hours = (time - departure).num_minutes() as f64 / 60.0;
        // m/s, strongest near the Gulf of Lion
        let strength = (14.0 - 0.15 * hours).max(2.0) * (1.0 - 0.05 * (point.lon - 4.0).max(0.0));
        let wind = WindData { u: strength * 0.7, v: -strength * 0.7 };
        let current = CurrentData { u: 0.2 / MS_TO_KNOTS, v: 0.0 };
        let wave_height = 0.15 * wind.speed();
        Ok(EnvironmentalSample::from_components(&wind, &current, wave_height))
    }
}

fn main() {
    env_logger::builder().filter_level(log::LevelFilter::Info).init();
    println!("--- Sail Router CLI ---");

    let mut vessel = VesselProfile::cruiser_40();
    if let Some(path) = std::env::args().nth(1) {
        match PolarData::load_from_csv(&path) {
            Ok(polar) => {
                println!("Polar loaded: {} TWA, {} TWS points", polar.twa.len(), polar.tws.len());
                vessel = vessel.with_polar(polar);
            }
            Err(err) => {
                error!("Could not load polar {}: {}", path, err);
                std::process::exit(1);
            }
        }
    }

    let start = GeoPoint::new(43.2, 5.3); // Marseille
    let goal = GeoPoint::new(42.0, 11.5); // Off Civitavecchia
    let Some(departure) = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).single() else {
        error!("Invalid departure time");
        std::process::exit(1);
    };

    // Pre-fetch the forecast on a 0.25 degree grid every 3 hours
    let points: Vec<GeoPoint> = (0..=16)
        .flat_map(|row| (0..=32).map(move |col| GeoPoint::new(40.5 + row as f64 * 0.25, 4.0 + col as f64 * 0.25)))
        .collect();
    let times: Vec<DateTime<Utc>> = (0..=16).map(|step| departure + Duration::hours(3 * step)).collect();

    let fetch_started = Instant::now();
    let (grid, failures) = SampleGrid::prefetch(&mistral(departure), &points, &times);
    info!("Forecast grid: {} samples ({} failed) in {:?}", grid.len(), failures, fetch_started.elapsed());
    if let Ok(sample) = grid.sample_at(&start, departure) {
        println!(
            "Wind at departure: {:.1} kn from {:.0} deg, waves {:.1} m",
            sample.wind_speed, sample.wind_direction, sample.wave_height
        );
    }

    let config = RouterConfig { time_limit: Some(std::time::Duration::from_secs(30)), ..RouterConfig::default() };
    let mut context = RoutingContext::new(grid, config)
        .with_land(LandConstraint::western_mediterranean(0.15))
        .on_progress(|percent, phase| debug!("{}: {:.0}%", phase, percent));

    let search_started = Instant::now();
    let plan = match context.find_route(start, goal, departure, &vessel) {
        Ok(plan) => plan,
        Err(err) => {
            error!("Routing failed: {}", err);
            std::process::exit(1);
        }
    };
    println!("Search: {:?} in {:?} ({:?})", plan.termination, search_started.elapsed(), plan.stats);

    println!(
        "\n{:>3} {:>8} {:>8} {:>6} {:>6} {:>6} {:>8} {:>17}",
        "#", "lat", "lon", "hdg", "stw", "sog", "mode", "arrival"
    );
    for (i, (leg, waypoint)) in plan.route.legs().iter().zip(plan.route.waypoints().iter().skip(1)).enumerate() {
        let mode = match leg.mode {
            LegMode::Sailing => "sail",
            LegMode::Motoring => "motor",
        };
        println!(
            "{:>3} {:>8.3} {:>8.3} {:>6.0} {:>6.1} {:>6.1} {:>8} {:>17}",
            i + 1,
            leg.to.lat,
            leg.to.lon,
            leg.heading,
            leg.boat_speed,
            leg.speed_over_ground,
            mode,
            waypoint.arrival_time.format("%d %H:%M")
        );
    }

    let stats = &plan.statistics;
    println!("\nDistance: {:.1} NM", stats.total_distance_nm);
    println!("Duration: {:.1} h (avg {:.1} kn)", stats.total_hours, stats.average_speed);
    println!("Sailing {:.0}%, motoring {:.0}%", stats.sailing_percent, stats.motoring_percent);
    println!("Fuel: {:.1} l", stats.fuel_consumed);

    println!("\nIsochrones:");
    for iso in isochrones(std::slice::from_ref(&plan.route), 6) {
        if let Some(p) = iso.frontier_points.first() {
            println!("  +{:>5.1} h  {:.3}, {:.3}", iso.elapsed_hours, p.lat, p.lon);
        }
    }
}
