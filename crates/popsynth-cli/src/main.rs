//! popsynth - population synthesis of single and binary stars
//!
//! Runs one sweep per invocation: a linear single-star mass sweep, a batch
//! of binaries, or one object per record of a grid file. Results go to a
//! fresh output container under `--output-path`.
//!
//! ## Exit status
//!
//! - `0`: sweep completed
//! - `2`: invalid command line or options
//! - `3`: logging could not be started; no sweep was attempted
//! - `4`: sweep stopped early (grid error or output file failure), or
//!   logging failed to flush at the end of the run

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};

use popsynth_core::{
    AisOptions, CheMode, Delimiter, EvolutionDriver, FileLogger, LogError, OutputOptions,
    ProgramOptions, RunContext, RunDetails, StdoutConsole, SweepMode,
};

const EXIT_INVALID_OPTIONS: u8 = 2;
const EXIT_LOGGING_FAILED: u8 = 3;
const EXIT_SWEEP_STOPPED: u8 = 4;

#[derive(Parser, Debug)]
#[command(name = "popsynth")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Population synthesis of single and binary stars", long_about = None)]
struct Cli {
    /// Evolve single stars or binaries
    #[arg(long, default_value = "binary")]
    mode: SweepMode,

    /// Fixed base random seed (default: derived from the clock)
    #[arg(long, env = "POPSYNTH_RANDOM_SEED")]
    random_seed: Option<u64>,

    /// Grid file with one object per line
    #[arg(long, env = "POPSYNTH_GRID")]
    grid: Option<PathBuf>,

    /// Lowest single-star mass in the linear sweep (M☉)
    #[arg(long, default_value_t = 5.0)]
    single_star_mass_min: f64,

    /// Upper bound of the linear sweep, exclusive (M☉)
    #[arg(long, default_value_t = 100.0)]
    single_star_mass_max: f64,

    /// Number of single stars in the linear sweep
    #[arg(long, default_value_t = 100)]
    single_star_mass_steps: usize,

    /// Number of binaries to evolve
    #[arg(short = 'n', long, default_value_t = 10)]
    number_of_binaries: usize,

    /// Metallicity Z
    #[arg(long, default_value_t = popsynth_core::options::SOLAR_METALLICITY)]
    metallicity: f64,

    /// Fixed single-star initial mass (M☉)
    #[arg(long)]
    initial_mass: Option<f64>,

    /// Fixed primary mass (M☉)
    #[arg(long)]
    initial_mass_1: Option<f64>,

    /// Fixed secondary mass (M☉)
    #[arg(long)]
    initial_mass_2: Option<f64>,

    /// Fixed semi-major axis (AU)
    #[arg(long)]
    semi_major_axis: Option<f64>,

    /// Lower bound of drawn primary masses (M☉)
    #[arg(long, default_value_t = 5.0)]
    initial_mass_min: f64,

    /// Upper bound of drawn primary masses (M☉)
    #[arg(long, default_value_t = 150.0)]
    initial_mass_max: f64,

    /// Lower bound of drawn separations (AU)
    #[arg(long, default_value_t = 0.1)]
    semi_major_axis_min: f64,

    /// Upper bound of drawn separations (AU)
    #[arg(long, default_value_t = 1000.0)]
    semi_major_axis_max: f64,

    /// Natal kick magnitude for single stars (km/s)
    #[arg(long)]
    kick_magnitude: Option<f64>,

    /// Random number in [0, 1) used to draw a single star's kick
    #[arg(long)]
    kick_magnitude_random: Option<f64>,

    /// Natal kick magnitude for the primary (km/s)
    #[arg(long)]
    kick_magnitude_1: Option<f64>,

    /// Natal kick magnitude for the secondary (km/s)
    #[arg(long)]
    kick_magnitude_2: Option<f64>,

    /// Random number in [0, 1) used to draw the primary's kick
    #[arg(long)]
    kick_magnitude_random_1: Option<f64>,

    /// Random number in [0, 1) used to draw the secondary's kick
    #[arg(long)]
    kick_magnitude_random_2: Option<f64>,

    /// Chemically homogeneous evolution: none, optimistic or pessimistic
    #[arg(long, default_value = "none")]
    che_mode: CheMode,

    /// Evolution time limit (Myr)
    #[arg(long, default_value_t = 13_700.0)]
    max_evolution_time: f64,

    /// Timestep limit per object
    #[arg(long, default_value_t = 100_000)]
    max_timesteps: u64,

    /// Run the adaptive importance sampling exploratory phase
    #[arg(long)]
    ais_exploratory: bool,

    /// Fraction of requested binaries to sample before the exploratory phase may stop
    #[arg(long, default_value_t = 1.0)]
    ais_fraction: f64,

    /// Double compact objects to find before the exploratory phase may stop
    #[arg(long, default_value_t = 1)]
    ais_min_hits: usize,

    /// Directory the output container is created in
    #[arg(long, env = "POPSYNTH_OUTPUT_PATH", default_value = ".")]
    output_path: PathBuf,

    /// Output container name
    #[arg(long, default_value = "popsynth_Output")]
    output_container: String,

    /// Prefix for every log file name
    #[arg(long, default_value = "")]
    logfile_prefix: String,

    /// Field delimiter: comma, tab or space
    #[arg(long, default_value = "comma")]
    delimiter: Delimiter,

    /// Write per-object detailed output files
    #[arg(long)]
    detailed_output: bool,

    /// Log single-star stellar-type switches
    #[arg(long)]
    sse_switch_log: bool,

    /// Log binary stellar-type switches
    #[arg(long)]
    bse_switch_log: bool,

    /// Suppress per-object progress lines
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn options(&self) -> ProgramOptions {
        ProgramOptions {
            mode: self.mode,
            random_seed: self.random_seed,
            grid_file: self.grid.clone(),
            single_star_mass_min: self.single_star_mass_min,
            single_star_mass_max: self.single_star_mass_max,
            single_star_mass_steps: self.single_star_mass_steps,
            number_of_binaries: self.number_of_binaries,
            metallicity: self.metallicity,
            initial_mass: self.initial_mass,
            initial_mass_1: self.initial_mass_1,
            initial_mass_2: self.initial_mass_2,
            semi_major_axis: self.semi_major_axis,
            initial_mass_min: self.initial_mass_min,
            initial_mass_max: self.initial_mass_max,
            semi_major_axis_min: self.semi_major_axis_min,
            semi_major_axis_max: self.semi_major_axis_max,
            kick_magnitude: self.kick_magnitude,
            kick_magnitude_random: self.kick_magnitude_random,
            kick_magnitude_1: self.kick_magnitude_1,
            kick_magnitude_2: self.kick_magnitude_2,
            kick_magnitude_random_1: self.kick_magnitude_random_1,
            kick_magnitude_random_2: self.kick_magnitude_random_2,
            che_mode: self.che_mode,
            max_evolution_time: self.max_evolution_time,
            max_timesteps: self.max_timesteps,
            ais: AisOptions {
                exploratory: self.ais_exploratory,
                fraction: self.ais_fraction,
                min_hits: self.ais_min_hits,
            },
            output: OutputOptions {
                path: self.output_path.clone(),
                container: self.output_container.clone(),
                prefix: self.logfile_prefix.clone(),
                delimiter: self.delimiter,
                detailed_output: self.detailed_output,
                sse_switch_log: self.sse_switch_log,
                bse_switch_log: self.bse_switch_log,
            },
            quiet: self.quiet,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    popsynth_core::init_tracing(cli.json, level);

    match run(&cli.options()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "run aborted");
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_INVALID_OPTIONS)
        }
    }
}

/// Validate, start logging, run the sweep and stop logging. Returns the
/// process exit code.
fn run(options: &ProgramOptions) -> Result<u8> {
    options.validate().context("invalid options")?;

    let logger = match FileLogger::start(&options.output) {
        Ok(logger) => logger,
        Err(e) => {
            error!(error = %e, "logging failed to start");
            eprintln!("Error: failed to start logging: {e}");
            return Ok(EXIT_LOGGING_FAILED);
        }
    };
    info!(container = %logger.container().display(), "writing output");

    let ctx = RunContext::new(Box::new(logger), Box::new(StdoutConsole));
    let mut driver = EvolutionDriver::new(options, &ctx);
    let base_seed = driver.base_seed();
    let summary = driver.run();

    let succeeded = summary.succeeded();
    let details = RunDetails::new(options, base_seed, summary);
    let stopped = ctx.with_logger(|logger| logger.stop(&details));

    Ok(exit_code(succeeded, &stopped))
}

/// A sweep whose records could not all be flushed at stop has lost output,
/// so it fails like a stopped sweep.
fn exit_code(succeeded: bool, stopped: &Result<(), LogError>) -> u8 {
    if let Err(e) = stopped {
        error!(error = %e, "logging did not stop cleanly");
        eprintln!("Error: failed to stop logging: {e}");
        return EXIT_SWEEP_STOPPED;
    }
    if succeeded {
        0
    } else {
        EXIT_SWEEP_STOPPED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["popsynth"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_program_options() {
        let mut expected = ProgramOptions::default();
        // The CLI reads the env fallback; the test environment may not set it.
        let cli = parse(&[]);
        expected.random_seed = cli.random_seed;
        expected.grid_file = cli.grid.clone();
        expected.output.path = cli.output_path.clone();
        assert_eq!(cli.options(), expected);
    }

    #[test]
    fn test_enum_options_parse() {
        let cli = parse(&["--mode", "single", "--che-mode", "pessimistic", "--delimiter", "tab"]);
        let options = cli.options();
        assert_eq!(options.mode, SweepMode::Single);
        assert_eq!(options.che_mode, CheMode::Pessimistic);
        assert_eq!(options.output.delimiter, Delimiter::Tab);

        assert!(Cli::try_parse_from(["popsynth", "--mode", "triple"]).is_err());
    }

    #[test]
    fn test_kick_options_reach_program_options() {
        let options = parse(&["--kick-magnitude-1", "50", "--kick-magnitude-random-2", "0.3"])
            .options();
        assert_eq!(options.kick_magnitude_1, Some(50.0));
        assert_eq!(options.kick_magnitude_random_2, Some(0.3));
        assert_eq!(options.kick_magnitude, None);
    }

    #[test]
    fn test_run_single_sweep_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = parse(&[
            "--mode",
            "single",
            "--random-seed",
            "7",
            "--single-star-mass-min",
            "10",
            "--single-star-mass-max",
            "20",
            "--single-star-mass-steps",
            "2",
            "--quiet",
        ])
        .options();
        options.output.path = tmp.path().to_path_buf();

        assert_eq!(run(&options).unwrap(), 0);

        let container = tmp.path().join("popsynth_Output");
        assert!(container.join("SSE_System_Parameters.csv").exists());
        assert!(container.join("Run_Details.json").exists());
    }

    #[test]
    fn test_unwritable_output_reports_logging_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let mut options = parse(&["--random-seed", "1"]).options();
        options.output.path = blocker;

        assert_eq!(run(&options).unwrap(), EXIT_LOGGING_FAILED);
    }

    #[test]
    fn test_grid_error_exits_with_sweep_stopped() {
        let tmp = tempfile::tempdir().unwrap();
        let grid = tmp.path().join("bad.grid");
        std::fs::write(&grid, "--initial-mass 10\n--initial-mass heavy\n").unwrap();

        let mut options = parse(&["--mode", "single", "--random-seed", "1", "--quiet"]).options();
        options.grid_file = Some(grid);
        options.output.path = tmp.path().to_path_buf();

        assert_eq!(run(&options).unwrap(), EXIT_SWEEP_STOPPED);
    }

    #[test]
    fn test_failed_stop_is_a_failed_run() {
        let lost = Err(LogError::NotClosed {
            file: "SSE_System_Parameters".to_string(),
        });
        assert_eq!(exit_code(true, &lost), EXIT_SWEEP_STOPPED);
        assert_eq!(exit_code(true, &Ok(())), 0);
        assert_eq!(exit_code(false, &Ok(())), EXIT_SWEEP_STOPPED);
    }

    #[test]
    fn test_invalid_options_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = parse(&["--metallicity", "2.0"]).options();
        options.output.path = tmp.path().to_path_buf();
        assert!(run(&options).is_err());
    }
}
