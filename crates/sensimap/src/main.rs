use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use jiff::Timestamp;
use sensimap::{RunConfig, SensitivityReport, init_logging};
use sensimap::report::REPORT_FILE;
use sensimap_core::RunProgress;

#[derive(Parser, Debug)]
#[command(name = "sensimap")]
#[command(about = "Map where a perturbation to an observation would be detectable")]
struct Args {
    /// Path to the YAML run configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the data directory (default: ~/.sensimap/)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Override the number of worker threads
    #[arg(long)]
    cores: Option<usize>,

    /// Print the grid points and output paths without running any fits
    #[arg(long)]
    dry_run: bool,

    /// Where to write the report (default: <path_prefix>/<name>/report.json)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sensimap")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    init_logging(&data_dir, &args.log_level)?;

    let mut config = RunConfig::load(&args.config)?;
    if let Some(cores) = args.cores {
        config.number_of_cores = cores;
    }
    config.validate()?;

    let sensitivity = config.sensitivity();

    if args.dry_run {
        for plan in sensitivity.plan()? {
            println!(
                "{:>5}  {}  {}  {}",
                plan.index,
                plan.label,
                plan.baseline_paths.output_path().display(),
                plan.perturbed_paths.output_path().display()
            );
        }
        return Ok(());
    }

    let progress = RunProgress::default();
    let started = Timestamp::now();
    let results = thread::scope(|scope| {
        let run = scope.spawn(|| sensitivity.run_with_progress(&progress));
        while !run.is_finished() {
            thread::sleep(Duration::from_millis(500));
            if progress.total() > 0 {
                eprint!(
                    "\r{}/{} grid points ({:.0}%)",
                    progress.completed(),
                    progress.total(),
                    100.0 * progress.fraction()
                );
            }
        }
        eprintln!();
        run.join()
    });
    let finished = Timestamp::now();

    let results = match results {
        Ok(results) => results?,
        Err(_) => color_eyre::eyre::bail!("sensitivity run panicked"),
    };

    let report = SensitivityReport::new(
        config.output.name.clone(),
        started,
        finished,
        &results,
        config.detection_threshold,
    );
    let report_path = args
        .output
        .unwrap_or_else(|| config.output.run_dir().join(REPORT_FILE));
    report
        .save(&report_path)
        .wrap_err_with(|| format!("failed to write report {}", report_path.display()))?;

    print!("{}", report.render_table());
    if let Some(plane) = report.render_plane() {
        print!("\n{plane}");
    }
    tracing::info!(report = %report_path.display(), "report written");

    Ok(())
}
