use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bar_cut::engine::{self, MaterialOutcome};
use bar_cut::gate;
use bar_cut::render::{self, format_length};
use bar_cut::{MaterialJob, PartRow, SolveStatus, SolverConfig, StockSpec};
use clap::Parser;
use serde::Deserialize;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "bar_cut",
    about = "1D bar cutting stock optimizer with kerf and edge trim"
)]
struct Cli {
    /// Stock bar length in mm (e.g. 6000)
    #[arg(long, required_unless_present = "job", conflicts_with = "job")]
    stock: Option<f64>,

    /// Material code shown in the report
    #[arg(long, default_value = engine::DEFAULT_CODE, conflicts_with = "job")]
    code: String,

    /// Cut pieces as LENGTH:qty or LENGTH (e.g. 2000:3 1450.5:2 800)
    #[arg(long = "cuts", num_args = 1.., requires = "stock")]
    cuts: Vec<String>,

    /// Blade kerf width in mm (default: 0)
    #[arg(long, default_value_t = 0.0)]
    kerf: f64,

    /// Material trimmed from each end of a bar in mm (default: 0)
    #[arg(long, default_value_t = 0.0)]
    edge_trim: f64,

    /// Linear mass in kg/m, reports purchased and used mass
    #[arg(long)]
    kg_per_meter: Option<f64>,

    /// JSON job with per-code stock specs and configurator part rows
    #[arg(long, value_name = "FILE")]
    job: Option<PathBuf>,

    /// Solve time budget per material code in milliseconds
    #[arg(long, env = bar_cut::config::TIME_LIMIT_ENV)]
    time_limit_ms: Option<u64>,

    /// Worker threads for multi-material jobs (0 = all cores)
    #[arg(long, env = bar_cut::config::THREADS_ENV)]
    threads: Option<usize>,

    /// Show ASCII layout of each bar
    #[arg(long)]
    layout: bool,

    /// Log solver progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Job file layout: stock per material code plus the derived part list.
#[derive(Deserialize)]
struct JobFile {
    stock: BTreeMap<String, StockSpec>,
    parts: Vec<PartRow>,
}

fn parse_cut(s: &str) -> Result<(f64, u32), String> {
    let (length, qty) = match s.split_once(':') {
        Some((length, qty)) => (length, Some(qty)),
        None => (s, None),
    };
    let length = length
        .parse::<f64>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let qty = match qty {
        Some(qty) => qty
            .parse::<u32>()
            .map_err(|_| format!("invalid quantity in '{}'", s))?,
        None => 1,
    };
    if qty == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok((length, qty))
}

fn load_job(path: &Path) -> Result<JobFile, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid job file {}: {}", path.display(), e))
}

fn print_outcome(outcome: &MaterialOutcome, layout: bool) -> bool {
    let plan = match &outcome.result {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("Error: {}", err);
            return false;
        }
    };

    println!("Material {}: stock {}", plan.code, plan.stock);
    for (i, bar) in plan.bars.iter().enumerate() {
        let cuts: Vec<String> = bar.pieces.iter().map(|&p| format_length(p)).collect();
        println!(
            "  Bar {}: {} | leftover {}",
            i + 1,
            cuts.join(" + "),
            format_length(bar.leftover)
        );
        if layout {
            print!("{}", render::render_bar(&plan.stock, bar));
        }
    }

    println!(
        "  Summary: {} bar{} used, {:.1}% waste ({} purchased, {} used)",
        plan.bar_count(),
        if plan.bar_count() == 1 { "" } else { "s" },
        plan.waste_percent(),
        format_length(plan.purchased_length()),
        format_length(plan.used_length()),
    );
    if let (Some(purchased), Some(used)) = (plan.purchased_mass(), plan.used_mass()) {
        println!("  Mass: {:.2} kg purchased, {:.2} kg used", purchased, used);
    }
    if plan.stats.status == SolveStatus::Feasible {
        println!(
            "  Note: optimality not proven within the time limit (lower bound {} bars)",
            plan.stats.lower_bound
        );
    }
    println!();
    true
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut config = SolverConfig::default();
    if let Some(ms) = cli.time_limit_ms {
        config = config.with_time_limit(Duration::from_millis(ms));
    }
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }

    let outcomes = if let Some(path) = &cli.job {
        let job = load_job(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
        engine::optimize_parts(&job.parts, &job.stock, &config)
    } else {
        let cuts: Vec<(f64, u32)> = cli
            .cuts
            .iter()
            .map(|c| parse_cut(c))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });

        let mut stock = StockSpec::new(cli.stock.unwrap_or_default())
            .with_kerf(cli.kerf)
            .with_edge_trim(cli.edge_trim);
        if let Some(kg) = cli.kg_per_meter {
            stock = stock.with_kg_per_meter(kg);
        }
        let pieces = gate::expand_pieces(&cli.code, &cuts).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

        let job = MaterialJob::new(cli.code.clone(), stock, pieces);
        engine::optimize_materials(vec![job], &config)
    };

    let mut all_ok = true;
    for outcome in &outcomes {
        all_ok &= print_outcome(outcome, cli.layout);
    }
    if !all_ok {
        std::process::exit(1);
    }
}
