use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use wallnav_core::{Axis, PointSet};
use wallnav_pipeline::{Pipeline, PipelineConfig, RouteReport, WallReport};

// ---------- helpers ----------

fn t0() -> std::time::Instant { std::time::Instant::now() }
fn lap(t: std::time::Instant, label: &str) {
    let ms = t.elapsed().as_secs_f64() * 1000.0;
    println!("[{label}] {ms:.1} ms");
}

/// "x,y" -> [x, y]
fn parse_xy(s: &str) -> Result<[f32; 2], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y] = parts.as_slice() else {
        return Err(format!("expected x,y, got '{s}'"));
    };
    let x: f32 = x.parse().map_err(|e| format!("bad x in '{s}': {e}"))?;
    let y: f32 = y.parse().map_err(|e| format!("bad y in '{s}': {e}"))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("coordinates must be finite, got '{s}'"));
    }
    Ok([x, y])
}

fn parse_axis(s: &str) -> Result<Axis, String> {
    match s.to_ascii_lowercase().as_str() {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        "z" => Ok(Axis::Z),
        other => Err(format!("axis must be x, y or z, got '{other}'")),
    }
}

// ---------- CLI ----------

#[derive(Parser)]
#[command(name = "wallnav", version, about = "Indoor point cloud -> walls -> occupancy grid -> route")]
struct Args { #[command(subcommand)] cmd: Cmd }

/// Overrides applied on top of the config file.
#[derive(clap::Args, Clone, Default)]
struct Overrides {
    /// YAML pipeline config
    #[arg(short, long)] config: Option<PathBuf>,
    #[arg(long)] seed: Option<u64>,
    #[arg(long, value_parser = parse_axis)] up: Option<Axis>,
    /// grid cell size (world units)
    #[arg(long)] cell_size: Option<f32>,
    /// obstacle inflation radius (world units)
    #[arg(long)] inflate: Option<f32>,
    /// skip outlier removal and voxel downsampling
    #[arg(long)] raw: bool,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print point count and bounds
    Info { input: PathBuf },

    /// Voxel downsample to PLY
    Voxel {
        input: PathBuf, output: PathBuf,
        #[arg(short, long, default_value_t = 0.05)] size: f32,
    },

    /// Statistical Outlier Removal (kNN µ±σ) to PLY
    Sor {
        input: PathBuf, output: PathBuf,
        #[arg(short = 'k', long, default_value_t = 20)] k: usize,
        #[arg(short = 's', long, default_value_t = 2.0)] std_ratio: f32,
    },

    /// Ground removal and wall extraction; prints a JSON wall report
    Walls {
        input: PathBuf,
        #[command(flatten)] overrides: Overrides,
        /// write ground/walls/remaining PLY files and walls.json here
        #[arg(long)] out_dir: Option<PathBuf>,
    },

    /// Full pipeline plus an A* route between two world points
    Route {
        input: PathBuf,
        #[arg(long, value_parser = parse_xy, allow_hyphen_values = true)] start: [f32; 2],
        #[arg(long, value_parser = parse_xy, allow_hyphen_values = true)] goal: [f32; 2],
        #[command(flatten)] overrides: Overrides,
        /// write the route report as JSON
        #[arg(long)] json: Option<PathBuf>,
        /// write the grid (and route, if found) as a PGM image
        #[arg(long)] pgm: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    match args.cmd {
        Cmd::Info { input } => cmd_info(&input),
        Cmd::Voxel { input, output, size } => cmd_voxel(&input, &output, size),
        Cmd::Sor { input, output, k, std_ratio } => cmd_sor(&input, &output, k, std_ratio),
        Cmd::Walls { input, overrides, out_dir } => cmd_walls(&input, &overrides, out_dir.as_deref()),
        Cmd::Route { input, start, goal, overrides, json, pgm } =>
            cmd_route(&input, start, goal, &overrides, json.as_deref(), pgm.as_deref()),
    }
}

fn load_config(o: &Overrides) -> Result<PipelineConfig> {
    let mut cfg = match &o.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = o.seed { cfg.seed = Some(seed); }
    if let Some(up) = o.up { cfg.up_axis = up; }
    if let Some(cs) = o.cell_size { cfg.raster.cell_size = cs; }
    if let Some(r) = o.inflate { cfg.raster.inflate_radius = r; }
    if o.raw {
        cfg.preprocess.outliers = None;
        cfg.preprocess.voxel_size = None;
    }
    cfg.validate()?;
    Ok(cfg)
}

// ---------- commands ----------

fn cmd_info(path: &Path) -> Result<()> {
    let cloud = wallnav_io::read_auto(path)?;
    println!("points: {}", cloud.len());
    if let Some(bb) = cloud.aabb() {
        let e = bb.extent();
        println!("min: [{:.3}, {:.3}, {:.3}]", bb.min[0], bb.min[1], bb.min[2]);
        println!("max: [{:.3}, {:.3}, {:.3}]", bb.max[0], bb.max[1], bb.max[2]);
        println!("extent: [{:.3}, {:.3}, {:.3}]", e[0], e[1], e[2]);
    }
    let keys = cloud.aligned_attr_keys();
    if !keys.is_empty() {
        println!("attributes: {}", keys.join(", "));
    }
    Ok(())
}

fn cmd_voxel(input: &Path, output: &Path, size: f32) -> Result<()> {
    let cloud = wallnav_io::read_auto(input)?;
    let out = wallnav_filters::voxel_downsample(&cloud, size)?;
    wallnav_io::write_ply_ascii(output, &out)?;
    println!("downsampled: {} -> {}", cloud.len(), out.len());
    Ok(())
}

fn cmd_sor(input: &Path, output: &Path, k: usize, std_ratio: f32) -> Result<()> {
    let cloud = wallnav_io::read_auto(input)?;
    let out = wallnav_filters::statistical_outlier(&cloud, k, std_ratio)?;
    wallnav_io::write_ply_ascii(output, &out)?;
    println!("sor: {} -> {} (k={}, std_ratio={})", cloud.len(), out.len(), k, std_ratio);
    Ok(())
}

fn cmd_walls(input: &Path, o: &Overrides, out_dir: Option<&Path>) -> Result<()> {
    let mut pipeline = Pipeline::new(load_config(o)?)?;

    let t = t0();
    let raw = wallnav_io::read_auto(input)?;
    lap(t, "read");

    let t = t0();
    let cloud = pipeline.preprocess(&raw)?;
    lap(t, "preprocess");

    let t = t0();
    let seg = pipeline.segment(&cloud)?;
    lap(t, "segment");

    let report = WallReport::new(&seg, pipeline.config().up_axis);
    for (i, w) in report.walls.iter().enumerate() {
        println!(
            "wall {i}: {} pts, length {:.2}, width {:.2}, height {:.2}",
            w.inliers, w.length, w.width, w.height
        );
    }
    println!(
        "walls: {} accepted, {} rejected, {} passes ({:?})",
        report.walls.len(), report.rejected, report.iterations, report.stop
    );

    if let Some(dir) = out_dir {
        let t = t0();
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(File::create(dir.join("walls.json"))?), &report)?;
        write_subset(&dir.join("ground.ply"), &cloud, &seg.ground.ground)?;
        write_subset(&dir.join("walls.ply"), &cloud, &seg.wall_indices())?;
        write_subset(&dir.join("remaining.ply"), &cloud, &seg.walls.remaining)?;
        for (i, w) in seg.walls.walls.iter().enumerate() {
            write_subset(&dir.join(format!("wall_{i:02}.ply")), &cloud, &w.indices)?;
        }
        lap(t, "write");
        println!("wrote report and point sets -> {}", dir.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn write_subset(path: &Path, cloud: &PointSet, indices: &[usize]) -> Result<()> {
    wallnav_io::write_ply_ascii(path, &cloud.select(indices))
}

fn cmd_route(
    input: &Path, start: [f32; 2], goal: [f32; 2], o: &Overrides,
    json: Option<&Path>, pgm: Option<&Path>,
) -> Result<()> {
    let mut pipeline = Pipeline::new(load_config(o)?)?;

    let t = t0();
    let raw = wallnav_io::read_auto(input)?;
    lap(t, "read");

    let t = t0();
    let out = pipeline.run(&raw)?;
    lap(t, "pipeline");
    let grid = &out.grid;
    let (lo, hi) = grid.world_bounds();
    println!(
        "grid: {}x{} @ {} covering [{:.2}, {:.2}]..[{:.2}, {:.2}], {} walls",
        grid.width(), grid.height(), grid.cell_size(), lo[0], lo[1], hi[0], hi[1],
        out.segmentation.walls.walls.len()
    );

    let t = t0();
    let route = pipeline.route(grid, start, goal);
    lap(t, "plan");

    if let Some(path) = pgm {
        let cells = route.as_ref().map(|r| r.path.cells.as_slice()).unwrap_or(&[]);
        grid.write_pgm(BufWriter::new(File::create(path)?), cells)
            .with_context(|| format!("write {}", path.display()))?;
        println!("wrote grid -> {}", path.display());
    }

    let route = match route {
        Ok(r) => r,
        Err(e) if e.is_no_path() => bail!("no route from {start:?} to {goal:?}: {e}"),
        Err(e) => return Err(e.into()),
    };
    println!("route: {} waypoints, length {:.3}", route.waypoints.len(), route.length);
    for w in &route.waypoints {
        println!("  {:.3} {:.3}", w[0], w[1]);
    }
    if let Some(path) = json {
        let report = RouteReport::new(&route, start, goal);
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &report)?;
        println!("wrote route -> {}", path.display());
    }
    Ok(())
}
