use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rail_routing::planner::{DEFAULT_ENDPOINT_RADIUS_M, DEFAULT_TOLERANCE_SCHEDULE};
use rail_routing::topology::DEFAULT_PRECISION;
use rail_routing::{
    all_paths, find_route, path_geometry, shortest_path, EqualityMode, MergedGeometry, Path as SegmentPath,
    PlannerConfig, RouteError, Segment, SegmentIdentifier, SegmentStore, StaticSegmentStore, TopologyGraph, Waypoint,
    DEFAULT_MAX_DEPTH,
};
use std::io::Write;
use std::path::PathBuf;

mod input;
mod output;

use input::{parse_waypoint, read_planner_config, read_segments, read_stations};
use output::write_routes_geojson;

/// How segment endpoints are matched
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Rounded coordinates must be equal (see --precision)
    Exact,
    /// Endpoints closer than --endpoint-radius meters connect
    Tolerant,
}

#[derive(Parser, Debug)]
#[command(
    name = "route-finder",
    author,
    version,
    about = "Find rail routes through a set of track segments",
    long_about = "Builds the adjacency graph of the given track segments and searches it for \
                  a route between two waypoints.\n\n\
                  A waypoint is a segment id, `station:<id>` (requires --stations), or a \
                  `lon,lat` position. Two segment ids are searched directly over the whole \
                  network; anything else goes through the multi-waypoint planner, which \
                  widens its search radius per leg until a path is found."
)]
struct Args {
    /// Track segments GeoJSON (LineString features with an `id`)
    #[arg(short, long)]
    segments: PathBuf,

    /// Stations GeoJSON (Point features with `id` and `name`)
    #[arg(long)]
    stations: Option<PathBuf>,

    /// Start waypoint (put `--` before a negative longitude)
    from: String,

    /// End waypoint
    to: String,

    /// Intermediate waypoint (repeatable, in travel order)
    #[arg(long, allow_hyphen_values = true)]
    via: Vec<String>,

    /// Enumerate every simple path instead of only the shortest
    #[arg(long)]
    all_paths: bool,

    /// Hop limit for --all-paths
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Print the connections at each endpoint of the waypoint segments
    #[arg(long)]
    info: bool,

    /// Print each path as one quoted, semicolon-joined token ("" when none)
    #[arg(long)]
    list: bool,

    /// Endpoint matching (default: exact, or the planner config's mode)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Decimal places compared in exact mode
    #[arg(long, default_value_t = DEFAULT_PRECISION)]
    precision: u32,

    /// Connection radius in meters for tolerant mode
    #[arg(long, default_value_t = DEFAULT_ENDPOINT_RADIUS_M)]
    endpoint_radius: f64,

    /// Candidate search radii in meters, tried in order (e.g. 100,500,2000)
    #[arg(long, value_delimiter = ',')]
    tolerances: Option<Vec<f64>>,

    /// Planner settings as JSON; flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the merged route(s) to this GeoJSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn waypoints(&self) -> Result<Vec<Waypoint>> {
        std::iter::once(&self.from)
            .chain(&self.via)
            .chain(std::iter::once(&self.to))
            .map(|token| parse_waypoint(token).with_context(|| format!("Invalid waypoint {:?}", token)))
            .collect()
    }

    fn planner_config(&self) -> Result<PlannerConfig> {
        let mut config = match &self.config {
            Some(path) => read_planner_config(path)?,
            None => PlannerConfig {
                tolerance_schedule: DEFAULT_TOLERANCE_SCHEDULE.to_vec(),
                equality: EqualityMode::Exact {
                    precision: self.precision,
                },
                ..PlannerConfig::default()
            },
        };

        if let Some(mode) = self.mode {
            config.equality = match mode {
                Mode::Exact => EqualityMode::Exact {
                    precision: self.precision,
                },
                Mode::Tolerant => EqualityMode::Tolerant {
                    radius_m: self.endpoint_radius,
                },
            };
        }
        if let Some(tolerances) = &self.tolerances {
            config.tolerance_schedule = tolerances.clone();
        }

        config.validate().context("Invalid planner settings")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    let waypoints = args.waypoints()?;
    let config = args.planner_config()?;

    if !args.segments.exists() {
        bail!("Segments file does not exist: {}", args.segments.display());
    }
    if args.stations.is_none() && waypoints.iter().any(|w| matches!(w, Waypoint::Station(_))) {
        bail!("Station waypoints need --stations <geojson>");
    }

    let segments = read_segments(&args.segments).context("Failed to load segments")?;
    let stations = match &args.stations {
        Some(path) => read_stations(path).context("Failed to load stations")?,
        None => Vec::new(),
    };
    let store = StaticSegmentStore::from_data(segments, stations);
    if store.is_empty() {
        bail!("No segments in {}", args.segments.display());
    }

    let mut out = std::io::stdout().lock();

    if args.info {
        print_connections(&mut out, &store, &waypoints, config.equality)?;
    }

    let routes = match direct_pair(&waypoints) {
        Some((from, to)) => search_direct(&mut out, &args, &store, config.equality, from, to)?,
        None => {
            if args.all_paths {
                bail!("--all-paths needs exactly two segment ids");
            }
            search_planned(&mut out, &args, &store, &waypoints, &config)?
        }
    };

    if let Some(output_path) = &args.output {
        if routes.is_empty() {
            log::warn!("No route found, not writing {}", output_path.display());
        } else {
            let merged = routes
                .into_iter()
                .map(|(path, geometry)| match geometry {
                    Some(geometry) => Ok((path, geometry)),
                    None => path_geometry(&store, &path)
                        .with_context(|| format!("Failed to merge geometry of {}", path))
                        .map(|geometry| (path, geometry)),
                })
                .collect::<Result<Vec<_>>>()?;
            write_routes_geojson(&merged, output_path).context("Failed to write route GeoJSON")?;
        }
    }

    Ok(())
}

/// A found path, with its geometry when the search already merged it
type Found = (SegmentPath, Option<MergedGeometry>);

/// Two bare segment ids are searched over the whole network
fn direct_pair(waypoints: &[Waypoint]) -> Option<(&SegmentIdentifier, &SegmentIdentifier)> {
    match waypoints {
        [Waypoint::Segment(from), Waypoint::Segment(to)] => Some((from, to)),
        _ => None,
    }
}

fn full_graph(store: &StaticSegmentStore, equality: EqualityMode) -> TopologyGraph {
    let segments: Vec<Segment> = store.all_segments().cloned().collect();
    TopologyGraph::build(&segments, equality)
}

fn search_direct(
    out: &mut impl Write,
    args: &Args,
    store: &StaticSegmentStore,
    equality: EqualityMode,
    from: &SegmentIdentifier,
    to: &SegmentIdentifier,
) -> Result<Vec<Found>> {
    for id in [from, to] {
        store.segment(id).with_context(|| format!("Unknown segment {}", id))?;
    }

    let graph = full_graph(store, equality);
    log::info!(
        "Network: {} segments, {} connections",
        graph.node_count(),
        graph.edge_count()
    );

    let paths = if args.all_paths {
        all_paths(from, to, &graph, args.max_depth)
    } else {
        shortest_path(std::slice::from_ref(from), std::slice::from_ref(to), &graph)
            .into_iter()
            .collect()
    };

    report_paths(out, &paths, args.list)?;
    Ok(paths.into_iter().map(|path| (path, None)).collect())
}

fn search_planned(
    out: &mut impl Write,
    args: &Args,
    store: &StaticSegmentStore,
    waypoints: &[Waypoint],
    config: &PlannerConfig,
) -> Result<Vec<Found>> {
    log::info!(
        "Planning {} leg(s), tolerances {:?} m",
        waypoints.len() - 1,
        config.tolerance_schedule
    );

    match find_route(store, waypoints, config) {
        Ok(route) => {
            for leg in &route.report.legs {
                log::info!(
                    "  Leg {}: {} -> {} ({} segments at {} m)",
                    leg.leg_index,
                    leg.from,
                    leg.to,
                    leg.path.len(),
                    leg.tolerance_m
                );
            }
            report_paths(out, std::slice::from_ref(&route.path), args.list)?;
            Ok(vec![(route.path, Some(route.geometry))])
        }
        // A search that ran but found nothing is a result, not a failure
        Err(RouteError::Planner(err)) if err.partial().is_some() => {
            log::warn!("{}", err);
            if let Some(partial) = err.partial() {
                for leg in &partial.legs {
                    log::info!("  Resolved leg {}: {}", leg.leg_index, leg.path);
                }
            }
            report_paths(out, &[], args.list)?;
            Ok(Vec::new())
        }
        Err(err) => Err(err).context("Route planning failed"),
    }
}

fn report_paths(out: &mut impl Write, paths: &[SegmentPath], list: bool) -> std::io::Result<()> {
    if list {
        if paths.is_empty() {
            writeln!(out, "{}", SegmentPath::list_token(None))?;
        }
        for path in paths {
            writeln!(out, "{}", SegmentPath::list_token(Some(path)))?;
        }
        return Ok(());
    }

    if paths.is_empty() {
        return writeln!(out, "No path found");
    }
    for (i, path) in paths.iter().enumerate() {
        writeln!(out, "Path {} ({} segments): {}", i + 1, path.len(), describe_path(path))?;
    }
    Ok(())
}

fn describe_path(path: &SegmentPath) -> String {
    path.segments()
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Per-endpoint neighbors of every segment waypoint
fn print_connections(
    out: &mut impl Write,
    store: &StaticSegmentStore,
    waypoints: &[Waypoint],
    equality: EqualityMode,
) -> Result<()> {
    let graph = full_graph(store, equality);

    for waypoint in waypoints {
        let Waypoint::Segment(id) = waypoint else {
            continue;
        };
        let Some(connections) = graph.connections_at(id) else {
            bail!("Unknown segment {}", id);
        };

        writeln!(out, "Segment {}:", id)?;
        writeln!(
            out,
            "  start ({}, {}): {}",
            connections.start.x,
            connections.start.y,
            describe_ids(&connections.at_start)
        )?;
        writeln!(
            out,
            "  end   ({}, {}): {}",
            connections.end.x,
            connections.end.y,
            describe_ids(&connections.at_end)
        )?;
    }
    Ok(())
}

fn describe_ids(ids: &[SegmentIdentifier]) -> String {
    if ids.is_empty() {
        return "(dead end)".to_string();
    }
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_waypoints_in_travel_order() {
        let args = Args::try_parse_from([
            "route-finder",
            "--segments",
            "net.geojson",
            "a",
            "station:osl",
            "--via",
            "b",
            "--via",
            "-1.5,52.0",
        ])
        .unwrap();

        let waypoints = args.waypoints().unwrap();
        assert_eq!(waypoints.len(), 4);
        assert_eq!(waypoints[0], Waypoint::Segment("a".into()));
        assert_eq!(waypoints[1], Waypoint::Segment("b".into()));
        assert!(matches!(waypoints[2], Waypoint::Point(_)));
        assert!(matches!(waypoints[3], Waypoint::Station(_)));
    }

    #[test]
    fn test_planner_config_from_flags() {
        let args = Args::try_parse_from([
            "route-finder",
            "-s",
            "net.geojson",
            "a",
            "b",
            "--mode",
            "tolerant",
            "--endpoint-radius",
            "12.5",
            "--tolerances",
            "50,250",
        ])
        .unwrap();

        let config = args.planner_config().unwrap();
        assert_eq!(config.equality, EqualityMode::Tolerant { radius_m: 12.5 });
        assert_eq!(config.tolerance_schedule, vec![50.0, 250.0]);

        let defaults = Args::try_parse_from(["route-finder", "-s", "net.geojson", "a", "b"]).unwrap();
        assert_eq!(
            defaults.planner_config().unwrap().equality,
            EqualityMode::Exact { precision: DEFAULT_PRECISION }
        );
    }

    #[test]
    fn test_bad_tolerances_rejected() {
        let args =
            Args::try_parse_from(["route-finder", "-s", "net.geojson", "a", "b", "--tolerances", "500,100"]).unwrap();
        assert!(args.planner_config().is_err());
    }

    #[test]
    fn test_direct_pair() {
        let segments = vec![Waypoint::Segment("a".into()), Waypoint::Segment("b".into())];
        assert!(direct_pair(&segments).is_some());

        let with_station = vec![Waypoint::Segment("a".into()), Waypoint::Station("osl".into())];
        assert!(direct_pair(&with_station).is_none());
    }

    fn small_store() -> StaticSegmentStore {
        let segment = |id: &str, coords: Vec<(f64, f64)>| Segment::new(id, coords.into()).unwrap();
        StaticSegmentStore::from_data(
            vec![
                segment("a", vec![(10.00, 59.0), (10.01, 59.0)]),
                segment("b", vec![(10.01, 59.0), (10.02, 59.0)]),
                segment("far", vec![(12.00, 59.0), (12.01, 59.0)]),
            ],
            vec![],
        )
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["route-finder", "-s", "net.geojson"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn run_direct(args: &Args, from: &str, to: &str) -> (Result<Vec<Found>>, String) {
        let mut out = Vec::new();
        let result = search_direct(
            &mut out,
            args,
            &small_store(),
            args.planner_config().unwrap().equality,
            &from.into(),
            &to.into(),
        );
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_direct_search_prints_path() {
        let (found, printed) = run_direct(&args(&["a", "b"]), "a", "b");
        assert_eq!(found.unwrap().len(), 1);
        assert_eq!(printed, "Path 1 (2 segments): a -> b\n");

        let (_, listed) = run_direct(&args(&["a", "b", "--list"]), "a", "b");
        assert_eq!(listed, "\"a;b\"\n");
    }

    #[test]
    fn test_direct_search_without_path_succeeds() {
        let (found, printed) = run_direct(&args(&["a", "far", "--list"]), "a", "far");
        assert!(found.unwrap().is_empty());
        assert_eq!(printed, "\"\"\n");

        let (found, printed) = run_direct(&args(&["a", "far"]), "a", "far");
        assert!(found.unwrap().is_empty());
        assert_eq!(printed, "No path found\n");
    }

    #[test]
    fn test_direct_search_unknown_segment_fails() {
        let (found, printed) = run_direct(&args(&["a", "nope"]), "a", "nope");
        assert!(found.is_err());
        assert!(printed.is_empty());
    }

    #[test]
    fn test_planned_search_with_partial_progress_succeeds() {
        // The first leg resolves; nothing connects b to the far segment
        let args = args(&["a", "far", "--via", "b", "--list"]);
        let waypoints = args.waypoints().unwrap();
        let config = args.planner_config().unwrap();

        let mut out = Vec::new();
        let found = search_planned(&mut out, &args, &small_store(), &waypoints, &config).unwrap();

        assert!(found.is_empty());
        assert_eq!(String::from_utf8(out).unwrap(), "\"\"\n");
    }

    #[test]
    fn test_planned_search_without_any_leg_fails() {
        let args = args(&["a", "b", "--via", "station:ghost"]);
        let waypoints = args.waypoints().unwrap();
        let config = args.planner_config().unwrap();

        let mut out = Vec::new();
        assert!(search_planned(&mut out, &args, &small_store(), &waypoints, &config).is_err());
    }

    #[test]
    fn test_describe() {
        let path = SegmentPath::from_segments(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(describe_path(&path), "a -> b");
        assert_eq!(describe_ids(&[]), "(dead end)");
    }
}
