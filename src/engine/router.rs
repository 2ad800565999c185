//! Time-dependent A* route search.
//!
//! Nodes live in an arena owned by a single search call and point to their
//! predecessor by index. Edge costs are elapsed hours priced at the time the
//! boat would actually leave each node, so the same lattice edge can cost
//! differently depending on when it is reached.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::engine::config::RouterConfig;
use crate::engine::cost::{point_key, CostModel, PointKey};
use crate::engine::environment::EnvironmentProvider;
use crate::engine::error::{Endpoint, RoutingError};
use crate::engine::geodesy::{self, distance_km};
use crate::engine::land::LandConstraint;
use crate::engine::lattice::SearchLattice;
use crate::engine::models::{EnvironmentalSample, GeoPoint};
use crate::engine::performance::PerformanceModel;
use crate::engine::route::{hours_to_duration, LegMode, Route, RouteLeg};
use crate::engine::statistics::RouteStatistics;
use crate::engine::vessel::VesselProfile;

/// Neighbour radius as a multiple of the lattice spacing when not configured.
const DEFAULT_RADIUS_CELLS: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GoalReached,
    /// Open list emptied before reaching the goal tolerance
    Exhausted,
    /// Iteration or wall-clock budget ran out
    BudgetExceeded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub lattice_points: usize,
    pub nodes_expanded: usize,
    pub nodes_generated: usize,
    pub prunes: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub environment_fallbacks: usize,
}

/// Result of [`RoutingContext::find_route`]. When `converged` is false the
/// route is the land-corrected base route.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub route: Route,
    pub statistics: RouteStatistics,
    pub converged: bool,
    pub termination: Termination,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchNode {
    pub position: GeoPoint,
    pub arrival_time: DateTime<Utc>,
    /// g, hours from departure
    pub cost_from_start: f64,
    /// h, hours
    pub heuristic_to_goal: f64,
    /// f = g + h
    pub total_cost: f64,
    pub predecessor: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    total_cost: FloatOrd,
    index: usize,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // Equal f falls back to arena order, i.e. generation order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cost
            .cmp(&other.total_cost)
            .then_with(|| self.index.cmp(&other.index))
    }
}

type ProgressFn<'p> = dyn FnMut(f64, &str) + 'p;

struct SearchOutcome {
    path: Option<Vec<GeoPoint>>,
    termination: Termination,
}

/// One A* run. Owns the node arena, open list and closed set for the
/// duration of a single search.
pub struct RouteOptimizer<'r, 'c, 'p> {
    config: &'r RouterConfig,
    lattice: &'r SearchLattice,
    land: &'r LandConstraint,
    cost: &'r mut CostModel<'c>,
    progress: Option<&'r mut ProgressFn<'p>>,
    goal: GeoPoint,
    radius_nm: f64,
    wind_estimate: EnvironmentalSample,
    arena: Vec<SearchNode>,
    open: BinaryHeap<Reverse<OpenEntry>>,
    closed: HashSet<PointKey>,
    best_g: HashMap<PointKey, f64>,
    stats: SearchStats,
}

impl<'r, 'c, 'p> RouteOptimizer<'r, 'c, 'p> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: &'r RouterConfig,
        lattice: &'r SearchLattice,
        land: &'r LandConstraint,
        cost: &'r mut CostModel<'c>,
        progress: Option<&'r mut ProgressFn<'p>>,
        goal: GeoPoint,
        radius_nm: f64,
        wind_estimate: EnvironmentalSample,
    ) -> Self {
        Self {
            config,
            lattice,
            land,
            cost,
            progress,
            goal,
            radius_nm,
            wind_estimate,
            arena: Vec::new(),
            open: BinaryHeap::new(),
            closed: HashSet::new(),
            best_g: HashMap::new(),
            stats: SearchStats { lattice_points: lattice.len(), ..SearchStats::default() },
        }
    }

    fn report(&mut self, percent: f64, phase: &str) {
        if let Some(callback) = self.progress.as_mut() {
            callback(percent.clamp(0.0, 100.0), phase);
        }
    }

    fn push(&mut self, node: SearchNode) {
        let index = self.arena.len();
        self.arena.push(node);
        self.open.push(Reverse(OpenEntry { total_cost: FloatOrd(node.total_cost), index }));
    }

    fn run(&mut self, start: GeoPoint, departure: DateTime<Utc>) -> SearchOutcome {
        let started = Instant::now();
        let initial_distance = distance_km(&start, &self.goal);
        let mut closest_km = initial_distance;

        let h = self.cost.heuristic_hours(&start, &self.goal, &self.wind_estimate);
        self.best_g.insert(point_key(&start), 0.0);
        self.push(SearchNode {
            position: start,
            arrival_time: departure,
            cost_from_start: 0.0,
            heuristic_to_goal: h,
            total_cost: h,
            predecessor: None,
        });

        let mut pops = 0usize;

        while let Some(Reverse(entry)) = self.open.pop() {
            let node = self.arena[entry.index];
            let key = point_key(&node.position);
            if self.closed.contains(&key) {
                continue;
            }
            let best = self.best_g.get(&key).copied().unwrap_or(f64::INFINITY);
            if node.cost_from_start > best {
                continue;
            }

            pops += 1;
            if pops % self.config.budget_check_interval.max(1) == 0 && self.budget_spent(pops, started) {
                info!("Search budget exhausted after {} expansions", self.stats.nodes_expanded);
                return SearchOutcome { path: None, termination: Termination::BudgetExceeded };
            }

            let to_goal = distance_km(&node.position, &self.goal);
            closest_km = closest_km.min(to_goal);
            if pops % self.config.progress_interval.max(1) == 0 && initial_distance > 0.0 {
                self.report(100.0 * (1.0 - closest_km / initial_distance), "searching");
            }

            if to_goal < self.config.goal_tolerance_km {
                return SearchOutcome {
                    path: Some(self.reconstruct(entry.index)),
                    termination: Termination::GoalReached,
                };
            }

            self.closed.insert(key);
            self.stats.nodes_expanded += 1;
            self.expand(entry.index, &node);

            if self.open.len() > self.config.max_nodes {
                self.prune();
            }
        }

        SearchOutcome { path: None, termination: Termination::Exhausted }
    }

    fn budget_spent(&self, pops: usize, started: Instant) -> bool {
        if let Some(max) = self.config.max_iterations {
            if pops >= max {
                return true;
            }
        }
        matches!(self.config.time_limit, Some(limit) if started.elapsed() >= limit)
    }

    fn expand(&mut self, index: usize, node: &SearchNode) {
        for neighbor in self.lattice.neighbors(&node.position, self.radius_nm) {
            let key = point_key(&neighbor);
            if self.closed.contains(&key) {
                continue;
            }
            if self.land.crosses(&node.position, &neighbor)
                || self.land.touches_land(&node.position, &neighbor)
            {
                continue;
            }
            let Some(edge) = self.cost.edge_cost(&node.position, &neighbor, node.arrival_time) else {
                continue;
            };

            let g = node.cost_from_start + edge.hours;
            // Only strictly better paths replace a known one
            if g >= self.best_g.get(&key).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            self.best_g.insert(key, g);

            let h = self.cost.heuristic_hours(&neighbor, &self.goal, &self.wind_estimate);
            self.push(SearchNode {
                position: neighbor,
                arrival_time: node.arrival_time + hours_to_duration(edge.hours),
                cost_from_start: g,
                heuristic_to_goal: h,
                total_cost: g + h,
                predecessor: Some(index),
            });
            self.stats.nodes_generated += 1;
        }
    }

    /// Keeps the best tenth of `max_nodes` open entries. Discarded positions
    /// forget their best cost so a later expansion may find them again.
    fn prune(&mut self) {
        let keep = self.config.max_nodes / 10;
        let mut entries: Vec<OpenEntry> = self.open.drain().map(|Reverse(e)| e).collect();
        entries.sort();
        let discarded = entries.split_off(keep.min(entries.len()));

        for entry in &discarded {
            let node = &self.arena[entry.index];
            let key = point_key(&node.position);
            if self.best_g.get(&key) == Some(&node.cost_from_start) {
                self.best_g.remove(&key);
            }
        }

        debug!("Pruned open list from {} to {} entries", entries.len() + discarded.len(), entries.len());
        self.stats.prunes += 1;
        self.open = entries.into_iter().map(Reverse).collect();
    }

    fn reconstruct(&self, mut index: usize) -> Vec<GeoPoint> {
        let mut path = vec![self.arena[index].position];
        while let Some(previous) = self.arena[index].predecessor {
            path.push(self.arena[previous].position);
            index = previous;
        }
        path.reverse();
        path
    }
}

/// Everything a caller needs to plan routes: configuration, land, the
/// environmental data source and optional collaborators. Each context owns
/// its caches; nothing is shared between contexts.
pub struct RoutingContext<'a> {
    config: RouterConfig,
    land: LandConstraint,
    environment: Box<dyn EnvironmentProvider + 'a>,
    base_route: Option<Box<dyn Fn(&GeoPoint, &GeoPoint) -> Vec<GeoPoint> + 'a>>,
    on_progress: Option<Box<ProgressFn<'a>>>,
    performance_models: HashMap<String, (VesselProfile, PerformanceModel)>,
}

impl<'a> RoutingContext<'a> {
    pub fn new<P>(environment: P, config: RouterConfig) -> Self
    where
        P: EnvironmentProvider + 'a,
    {
        Self {
            land: LandConstraint::new(Vec::new(), config.detour_margin_deg),
            config,
            environment: Box::new(environment),
            base_route: None,
            on_progress: None,
            performance_models: HashMap::new(),
        }
    }

    pub fn with_land(mut self, land: LandConstraint) -> Self {
        self.land = land;
        self
    }

    pub fn with_base_route<F>(mut self, provider: F) -> Self
    where
        F: Fn(&GeoPoint, &GeoPoint) -> Vec<GeoPoint> + 'a,
    {
        self.base_route = Some(Box::new(provider));
        self
    }

    /// `callback(percent, phase)` runs on the calling thread between search iterations.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f64, &str) + 'a,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn land(&self) -> &LandConstraint {
        &self.land
    }

    /// The caller's base route, or a straight line, always running from
    /// `start` to `goal`.
    pub fn base_route(&self, start: &GeoPoint, goal: &GeoPoint) -> Vec<GeoPoint> {
        let mut points = match &self.base_route {
            Some(provider) => provider(start, goal),
            None => Vec::new(),
        };
        if points.len() < 2 {
            return geodesy::straight_line(start, goal, self.config.base_route_points);
        }
        if points.first() != Some(start) {
            points.insert(0, *start);
        }
        if points.last() != Some(goal) {
            points.push(*goal);
        }
        points
    }

    fn check_endpoint(&self, endpoint: Endpoint, point: &GeoPoint) -> Result<(), RoutingError> {
        match self.land.containing(point) {
            Some(land) => Err(RoutingError::InvalidInput {
                endpoint,
                lat: point.lat,
                lon: point.lon,
                land: land.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Plans a passage from `start` to `goal` leaving at `departure`.
    ///
    /// Only an endpoint on land (or a bad configuration) is an error. If the
    /// search cannot reach the goal, the land-corrected base route is
    /// returned with `converged == false`.
    pub fn find_route(
        &mut self,
        start: GeoPoint,
        goal: GeoPoint,
        departure: DateTime<Utc>,
        vessel: &VesselProfile,
    ) -> Result<RoutePlan, RoutingError> {
        self.config.validate()?;
        self.check_endpoint(Endpoint::Start, &start)?;
        self.check_endpoint(Endpoint::Goal, &goal)?;

        let base = self.base_route(&start, &goal);
        let corrected_base = self.land.correct_route(&base);

        let mut shape = base.clone();
        shape.push(start);
        shape.push(goal);
        let lattice = SearchLattice::covering(&shape, self.config.lattice_density);
        let radius_nm = self
            .config
            .exploration_radius_nm
            .unwrap_or(DEFAULT_RADIUS_CELLS * lattice.spacing_nm());

        info!(
            "Routing {} from ({:.3}, {:.3}) to ({:.3}, {:.3}) over {} lattice points, radius {:.1} NM",
            vessel.name, start.lat, start.lon, goal.lat, goal.lon, lattice.len(), radius_nm
        );

        let performance = Self::performance_for(&mut self.performance_models, vessel);
        let mut cost = CostModel::new(vessel, performance, self.environment.as_ref(), self.config.time_bucket_minutes);
        let wind_estimate = cost.sample(&start, departure);

        let progress = self.on_progress.as_deref_mut();
        let mut optimizer = RouteOptimizer::new(
            &self.config,
            &lattice,
            &self.land,
            &mut cost,
            progress,
            goal,
            radius_nm,
            wind_estimate,
        );
        optimizer.report(0.0, "searching");
        let outcome = optimizer.run(start, departure);
        let mut stats = optimizer.stats;

        let positions = match &outcome.path {
            Some(path) => self.land.correct_route(path),
            None => {
                warn!("Search did not converge ({:?}); using base route", outcome.termination);
                corrected_base
            }
        };

        let route = price_path(&positions, departure, vessel, &mut cost);
        let statistics = RouteStatistics::compute(&route, vessel, performance);

        stats.cache_hits = cost.stats.cache_hits;
        stats.cache_misses = cost.stats.cache_misses;
        stats.environment_fallbacks = cost.stats.environment_fallbacks;

        info!(
            "Route ready: {:?}, {} waypoints, {:.1} NM in {:.1} h ({} expanded, {} generated, {} prunes)",
            outcome.termination,
            route.waypoints().len(),
            statistics.total_distance_nm,
            statistics.total_hours,
            stats.nodes_expanded,
            stats.nodes_generated,
            stats.prunes
        );

        if let Some(callback) = self.on_progress.as_mut() {
            callback(100.0, "done");
        }

        Ok(RoutePlan {
            route,
            statistics,
            converged: outcome.termination == Termination::GoalReached,
            termination: outcome.termination,
            stats,
        })
    }

    fn performance_for<'m>(
        models: &'m mut HashMap<String, (VesselProfile, PerformanceModel)>,
        vessel: &VesselProfile,
    ) -> &'m PerformanceModel {
        let entry = models
            .entry(vessel.name.clone())
            .or_insert_with(|| (vessel.clone(), PerformanceModel::for_vessel(vessel)));
        if entry.0 != *vessel {
            *entry = (vessel.clone(), PerformanceModel::for_vessel(vessel));
        }
        &entry.1
    }
}

/// Prices consecutive legs from `departure`. A leg the vessel cannot make
/// under the sampled conditions is kept at cruising speed so the route is
/// never cut short.
fn price_path(
    positions: &[GeoPoint],
    departure: DateTime<Utc>,
    vessel: &VesselProfile,
    cost: &mut CostModel,
) -> Route {
    let start = positions.first().copied().unwrap_or(GeoPoint::new(0.0, 0.0));
    let mut legs = Vec::with_capacity(positions.len().saturating_sub(1));
    let mut elapsed = 0.0;

    for pair in positions.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let leaving = departure + hours_to_duration(elapsed);
        let leg = match cost.edge_cost(&from, &to, leaving) {
            Some(edge) => edge.to_leg(from, to),
            None => {
                warn!(
                    "Leg ({:.3}, {:.3}) -> ({:.3}, {:.3}) not sailable; assuming cruising speed",
                    from.lat, from.lon, to.lat, to.lon
                );
                nominal_leg(from, to, vessel, cost.sample(&from, leaving))
            }
        };
        elapsed += leg.duration_hours;
        legs.push(leg);
    }

    Route::from_legs(start, departure, legs)
}

fn nominal_leg(from: GeoPoint, to: GeoPoint, vessel: &VesselProfile, conditions: EnvironmentalSample) -> RouteLeg {
    let speed = if vessel.cruising_speed > 0.0 { vessel.cruising_speed } else { 1.0 };
    RouteLeg {
        from,
        to,
        heading: geodesy::initial_bearing(&from, &to),
        boat_speed: speed,
        speed_over_ground: speed,
        mode: if vessel.engine.is_some() { LegMode::Motoring } else { LegMode::Sailing },
        conditions,
        duration_hours: geodesy::distance_nm(&from, &to) / speed,
    }
}
