//! Benchmark sphere-broadphase at large scales.
//!
//! Run with: cargo run --release --bin bench_broadphase
//!
//! Usage:
//!   bench_broadphase                Run default size (100k)
//!   bench_broadphase 100k 500k 1m   Run multiple sizes
//!   bench_broadphase --clustered    Pack spheres into a few dense clusters
//!   bench_broadphase --validate     Compare against the O(N²) reference (max 50k)
//!   bench_broadphase -n 10          Run 10 iterations on one reused field
//!
//! For per-stage timing, build with: cargo run --release --features timing --bin bench_broadphase

use clap::Parser;
use glam::Vec3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sphere_broadphase::{
    validation, CellHash, DeviceBuffer, SpatialPartitionField, SpatialPartitionLauncher, Sphere,
    Stream,
};
use std::io::{self, Write};
use std::time::Instant;

const VALIDATE_LIMIT: usize = 50_000;

fn parse_count(s: &str) -> Result<usize, String> {
    let s = s.to_lowercase();
    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 1_000_000)
    } else if let Some(stripped) = s.strip_suffix('k') {
        (stripped, 1_000)
    } else {
        (s.as_str(), 1)
    };

    num_str
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as usize)
        .map_err(|e| format!("Invalid number '{}': {}", s, e))
}

#[derive(Parser)]
#[command(name = "bench_broadphase")]
#[command(about = "Benchmark sphere-broadphase at various scales")]
struct Args {
    /// Sphere counts to benchmark (e.g., 100k, 1m)
    #[arg(value_parser = parse_count)]
    sizes: Vec<usize>,

    /// Random seed
    #[arg(short, long, default_value_t = 12345)]
    seed: u64,

    /// Mean number of overlaps per sphere to aim for (controls density)
    #[arg(long, default_value_t = 4.0)]
    contacts: f32,

    /// Ratio between the largest and smallest radius
    #[arg(long, default_value_t = 4.0)]
    radius_spread: f32,

    /// Pack spheres into a few dense clusters instead of a uniform box
    #[arg(long)]
    clustered: bool,

    /// Explicit cell size (default: derived from the largest radius)
    #[arg(long)]
    cell_size: Option<f32>,

    /// Bucket cells by Morton code instead of the shift hash
    #[arg(long)]
    morton: bool,

    /// Compare against the O(N²) reference
    #[arg(long)]
    validate: bool,

    /// Number of iterations to run (useful for profiling)
    #[arg(short = 'n', long, default_value_t = 1)]
    repeat: usize,
}

/// Random spheres in a cube sized so that a sphere of mean radius overlaps
/// about `contacts` others.
fn generate_spheres(n: usize, args: &Args) -> Vec<Sphere> {
    if n == 0 {
        return Vec::new();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let r_min = 0.5f32;
    let r_max = r_min * args.radius_spread.max(1.0);
    let r_mean = 0.5 * (r_min + r_max);
    // Contact volume of a mean sphere: (4/3)π(2r)³.
    let contact_volume = 4.0 / 3.0 * std::f32::consts::PI * (2.0 * r_mean).powi(3);
    let box_volume = n as f32 * contact_volume / args.contacts.max(0.01);
    let half = 0.5 * box_volume.cbrt();

    let centers: Vec<Vec3> = if args.clustered {
        let clusters = 8;
        let hubs: Vec<Vec3> = (0..clusters)
            .map(|_| Vec3::new(rng.gen_range(-half..half), rng.gen_range(-half..half), rng.gen_range(-half..half)))
            .collect();
        let spread = half / (clusters as f32).cbrt();
        (0..n)
            .map(|i| {
                let hub = hubs[i % clusters];
                hub + Vec3::new(
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                    rng.gen_range(-spread..spread),
                )
            })
            .collect()
    } else {
        (0..n)
            .map(|_| Vec3::new(rng.gen_range(-half..half), rng.gen_range(-half..half), rng.gen_range(-half..half)))
            .collect()
    };

    centers
        .into_iter()
        .map(|c| Sphere::new(c, rng.gen_range(r_min..=r_max)))
        .collect()
}

fn format_num(n: usize) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{}k", n / 1_000)
    } else {
        format!("{}", n)
    }
}

fn format_rate(count: usize, ms: f64) -> String {
    if ms <= 0.0 {
        return "N/A".to_string();
    }
    let per_sec = count as f64 / (ms / 1000.0);
    if per_sec >= 1_000_000.0 {
        format!("{:.2}M/s", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.1}k/s", per_sec / 1000.0)
    } else {
        format!("{:.0}/s", per_sec)
    }
}

fn main() {
    let args = Args::parse();

    println!("sphere-broadphase Benchmark");
    println!("===========================\n");

    let sizes: Vec<usize> = if args.sizes.is_empty() {
        vec![100_000]
    } else {
        args.sizes.clone()
    };

    println!("Configuration:");
    println!("  seed = {}", args.seed);
    println!(
        "  distribution = {}",
        if args.clustered { "clustered" } else { "uniform" }
    );
    println!("  target contacts = {}", args.contacts);
    println!("  radius spread = {}", args.radius_spread);
    println!(
        "  sizes = {:?}",
        sizes.iter().map(|&n| format_num(n)).collect::<Vec<_>>()
    );
    if args.repeat > 1 {
        println!("  repeat = {}", args.repeat);
    }

    #[cfg(feature = "timing")]
    println!("  timing = enabled (per-stage timing will be printed)");

    let stream = Stream::new();
    let mut field = SpatialPartitionField::new();
    let mut pairs = DeviceBuffer::labeled("collision pairs");

    for &n in &sizes {
        println!("\n{}", "=".repeat(60));
        println!("Benchmarking n = {}", format_num(n));
        println!("{}", "=".repeat(60));

        let t_gen = Instant::now();
        let spheres = generate_spheres(n, &args);
        println!("Sphere generation: {:.1}ms", t_gen.elapsed().as_secs_f64() * 1000.0);

        let mut times: Vec<f64> = Vec::with_capacity(args.repeat);
        for iter in 0..args.repeat.max(1) {
            if args.repeat > 1 {
                print!("  Iteration {}/{}... ", iter + 1, args.repeat);
                let _ = io::stdout().flush();
            }

            stream.reset_stats();
            let t0 = Instant::now();
            let result = SpatialPartitionLauncher::new(&mut field, &stream)
                .config_spatial_hash(Vec3::ZERO)
                .with_cell_hash(if args.morton { CellHash::Morton } else { CellHash::Shift })
                .set_cell_size(args.cell_size.unwrap_or(0.0))
                .setup(&spheres)
                .and_then(|launcher| launcher.create_collision_pairs(&mut pairs));
            let ms = t0.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(launcher) => launcher.wait(),
                Err(e) => {
                    eprintln!("broad phase failed: {}", e);
                    std::process::exit(1);
                }
            }
            times.push(ms);
            if args.repeat > 1 {
                println!("{:.1}ms", ms);
            }
        }

        let best = times.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = times.iter().sum::<f64>() / times.len() as f64;
        let stats = field.stats();
        let launches = stream.stats();

        println!("  time:      {:>8.1}ms best, {:.1}ms mean ({})", best, mean, format_rate(n, best));
        println!("  pairs:     {:>8}", pairs.len());
        println!("  stats:     {}", stats);
        println!(
            "  launches:  {} light, {} heavy, {} read-backs",
            launches.light_launches, launches.heavy_launches, launches.readbacks
        );
        field.timings().report(n);

        if args.validate {
            if n > VALIDATE_LIMIT {
                println!("  validation skipped (n > {})", format_num(VALIDATE_LIMIT));
                continue;
            }
            let t_ref = Instant::now();
            let report = validation::validate(&spheres, pairs.as_slice());
            println!(
                "  reference: {:>8.1}ms, {}",
                t_ref.elapsed().as_secs_f64() * 1000.0,
                report
            );
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
    }
}
