use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use mutual_fund_plan::{
    load_csv, run_pipeline, LoadedPrices, PlanConfig, PlanReport, ReportRenderer,
    SvgReportRenderer,
};

#[derive(Parser, Debug)]
#[command(name = "mutual-fund-plan", version, about = "Return/risk screening and SIP projection over price histories")]
struct Cli {
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug detail (thresholds, weights)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute metrics, build the plan and project it
    Analyze(AnalyzeArgs),
    /// Browse the report in the terminal viewer
    View(PlanArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Price CSV: a date column followed by one column per entity
    csv: PathBuf,

    /// TOML file with plan settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Contribution per period
    #[arg(long)]
    monthly: Option<f64>,

    /// Projection horizons in years, comma separated
    #[arg(long, value_delimiter = ',')]
    horizons: Option<Vec<u32>>,

    /// Size of the top-growth peer group
    #[arg(long)]
    peers: Option<usize>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    plan: PlanArgs,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the HTML chart report
    #[arg(long)]
    html: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::View(args) => run_ui_mode(&args),
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn resolve_config(args: &PlanArgs) -> Result<PlanConfig> {
    let mut config = match &args.config {
        Some(path) => PlanConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlanConfig::default(),
    };

    if let Some(amount) = args.monthly {
        config = config.with_monthly_investment(amount);
    }
    if let Some(horizons) = &args.horizons {
        config = config.with_horizons(horizons.clone());
    }
    if let Some(size) = args.peers {
        config = config.with_peer_group_size(size);
    }

    config.validate().context("invalid plan settings")?;
    Ok(config)
}

fn load_and_run(args: &PlanArgs) -> Result<(LoadedPrices, PlanReport)> {
    let config = resolve_config(args)?;

    println!("\n📂 Loading CSV...");
    let loaded = load_csv(&args.csv)
        .with_context(|| format!("failed to load prices from {}", args.csv.display()))?;
    println!(
        "✓ Loaded {} rows x {} entities",
        loaded.table.len(),
        loaded.table.entities().len()
    );
    if let Some((first, last)) = loaded.table.date_range() {
        println!("  Period: {} → {}", first, last);
    }

    if loaded.missing_before_fill.is_clean() {
        println!("✓ No missing values");
    } else {
        println!("⚠️  {} (forward filled)", loaded.missing_before_fill.summary());
    }
    for (entity, gap) in &loaded.leading_gaps {
        println!("⚠️  {} has no data for its first {} rows", entity, gap);
    }

    println!("\n📊 Computing return / risk metrics...");
    let report = run_pipeline(&loaded.table, &config).context("analysis failed")?;
    println!("✓ Metrics for {} entities", report.metrics.len());

    Ok((loaded, report))
}

fn print_ranking(title: &str, rows: &[(String, f64)], unit: &str) {
    println!("\n{}", title);
    for (i, (entity, value)) in rows.iter().enumerate() {
        println!("  {:>2}. {:<24} {:>10.2}{}", i + 1, entity, value, unit);
    }
}

fn print_report(report: &PlanReport) {
    print_ranking("🔥 Riskiest (volatility)", &report.rankings.riskiest, "");
    print_ranking("🚀 Fastest growing (mean daily growth)", &report.rankings.fastest_growing, "%");
    print_ranking("💰 Best ROI", &report.rankings.best_roi, "%");

    let criteria = report.outcome.criteria();
    println!("\n🎯 Selection thresholds");
    println!("  ROI        > {:.2}%", criteria.roi_threshold);
    println!("  Volatility < {:.2}", criteria.volatility_threshold);

    let Some(plan) = report.plan() else {
        println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("❌ No entity passed both thresholds");
        println!("   Nothing to allocate, no projection.");
        return;
    };

    println!("\n📋 Allocation plan ({} entities)", plan.len());
    for (entity, weight) in plan.ranked() {
        println!("  {:<24} {:>7.2}%", entity, weight * 100.0);
    }

    print_ranking("📈 Selected by ROI", &report.selected_by_roi, "%");

    if let Some(projection) = &report.projection {
        println!(
            "\n💵 Projection: {:.2} per period at {:.2}% a year",
            projection.contribution,
            projection.annual_rate * 100.0
        );
        println!("  {:<10} {:>18} {:>20} {:>20}", "Horizon", "Contributed", "Future value", "Gain");
        for v in &projection.values {
            println!(
                "  {:<10} {:>18.2} {:>20.2} {:>20.2}",
                format!("{} year", v.years),
                v.total_contributed,
                v.future_value,
                v.gain
            );
        }
    }

    let overlap = report.comparison.overlap();
    println!(
        "\n🔍 Plan vs. top {} growth peers: {} in common",
        report.comparison.peer_entities.len(),
        overlap.len()
    );
    if !overlap.is_empty() {
        println!("  {}", overlap.join(", "));
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", report.summary());
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    println!("📊 Mutual Fund Plan - Return/Risk Screening");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (loaded, report) = load_and_run(&args.plan)?;
    print_report(&report);

    if let Some(path) = &args.json {
        write_json(&report, path)?;
    }
    if let Some(path) = &args.html {
        SvgReportRenderer::default()
            .render_to_file(&loaded.table, &report, path)
            .with_context(|| format!("failed to write HTML report {}", path.display()))?;
        println!("💾 HTML report written to {}", path.display());
    }

    Ok(())
}

fn write_json(report: &PlanReport, path: &Path) -> Result<()> {
    report
        .write_json(path)
        .with_context(|| format!("failed to write JSON report {}", path.display()))?;
    println!("💾 JSON report written to {}", path.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(args: &PlanArgs) -> Result<()> {
    println!("🖥️  Loading Mutual Fund Plan viewer...");

    let (_, report) = load_and_run(args)?;
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = mutual_fund_plan::ui::App::new(report);
    mutual_fund_plan::ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_args: &PlanArgs) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: mutual-fund-plan analyze <csv> --html report.html");
    std::process::exit(1);
}
