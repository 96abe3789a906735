//! The evolution loop.
//!
//! `EvolutionDriver` runs one sweep: it creates objects one at a time,
//! evolves each to completion and decides when the sweep ends. Both sweep
//! modes share the same state machine:
//!
//! 1. reset the evolving-binary handle
//! 2. take the next parameters from the grid or the linear sweep
//! 3. stop on a grid error, finish on grid exhaustion
//! 4. seed, construct, publish (binaries), evolve, report progress
//! 5. binaries: ask the sampler whether the exploratory phase is over
//! 6. close the results file and per-object files; a failed close (or an
//!    earlier failed write to one of them) stops the sweep
//! 7. clean the error catalog
//! 8. advance the index
//!
//! The loop runs while the status is `Continue` and the index is below the
//! target count. A grid sweep grows its target by one per applied record.

use std::io::BufRead;
use std::rc::Rc;

use tracing::warn;

use crate::context::RunContext;
use crate::domain::{EvolutionStatus, GridError, RequestedCount};
use crate::grid::{GridRead, GridSweepController, LinearSweep};
use crate::logging::LogFile;
use crate::metrics::METRICS;
use crate::obs;
use crate::options::{CheMode, ObjectParameters, ProgramOptions, SweepMode};
use crate::physics::{
    BinaryConfig, BinaryOutcome, BinaryStar, EvolutionContext, EvolutionLimits, Star, StarOutcome,
};
use crate::sampler::{ExploratorySampler, NoSampler, Sampler};
use crate::seed::{ObjectSeed, SeedAllocator};
use crate::summary::{RunSummary, SweepTimer};
use crate::switch_log::SwitchLogBridge;

/// Loop bookkeeping shared by both sweep modes.
#[derive(Debug)]
struct SweepState {
    status: EvolutionStatus,
    index: usize,
    target: usize,
    created: usize,
    records: usize,
    using_grid: bool,
}

impl SweepState {
    fn new(using_grid: bool, linear_target: usize) -> Self {
        Self {
            status: EvolutionStatus::Continue,
            index: 0,
            // A grid sweep must enter the loop to read its first record.
            target: if using_grid { 1 } else { linear_target },
            created: 0,
            records: 0,
            using_grid,
        }
    }

    fn running(&self) -> bool {
        self.status == EvolutionStatus::Continue && self.index < self.target
    }
}

pub struct EvolutionDriver<'a> {
    options: &'a ProgramOptions,
    ctx: &'a RunContext,
    seeds: SeedAllocator,
    using_grid: bool,
    grid: Option<GridSweepController<Box<dyn BufRead>>>,
    grid_open_error: Option<GridError>,
}

impl<'a> EvolutionDriver<'a> {
    /// Prepare a sweep. The base seed is fixed here for the whole run. A grid
    /// file that cannot be opened stops the sweep on its first read.
    pub fn new(options: &'a ProgramOptions, ctx: &'a RunContext) -> Self {
        let defaults = options.base_parameters();
        let (grid, grid_open_error) = match &options.grid_file {
            Some(path) => match GridSweepController::open(path, options.mode, defaults) {
                Ok(grid) => (Some(grid), None),
                Err(e) => (None, Some(e)),
            },
            None => (None, None),
        };

        Self {
            options,
            ctx,
            seeds: SeedAllocator::from_option(options.random_seed),
            using_grid: options.using_grid(),
            grid,
            grid_open_error,
        }
    }

    /// Read grid records from `reader` instead of a file.
    pub fn with_grid_reader(mut self, reader: Box<dyn BufRead>) -> Self {
        self.grid = Some(GridSweepController::new(
            reader,
            self.options.mode,
            self.options.base_parameters(),
        ));
        self.grid_open_error = None;
        self.using_grid = true;
        self
    }

    pub fn base_seed(&self) -> u64 {
        self.seeds.base()
    }

    pub fn using_grid(&self) -> bool {
        self.using_grid
    }

    /// Run the sweep selected by the options.
    pub fn run(&mut self) -> RunSummary {
        match self.options.mode {
            SweepMode::Single => self.evolve_single_stars(),
            SweepMode::Binary => {
                let requested = (!self.using_grid).then_some(self.options.number_of_binaries);
                if self.options.ais.exploratory {
                    let mut sampler = ExploratorySampler::new(requested, &self.options.ais);
                    self.evolve_binary_stars(&mut sampler)
                } else {
                    self.evolve_binary_stars(&mut NoSampler)
                }
            }
        }
    }

    fn seed_for(&self, index: usize, params: &ObjectParameters) -> ObjectSeed {
        match params.random_seed {
            Some(base) => SeedAllocator::fixed(base).seed(index as u64),
            None => self.seeds.seed(index as u64),
        }
    }

    fn next_parameters(
        &mut self,
        state: &mut SweepState,
        linear: impl FnOnce(usize) -> ObjectParameters,
    ) -> Option<ObjectParameters> {
        if !state.using_grid {
            return Some(linear(state.index));
        }

        let read = match (self.grid_open_error.take(), self.grid.as_mut()) {
            (Some(e), _) => GridRead::StopError(e),
            (None, Some(grid)) => grid.next_record(),
            (None, None) => GridRead::Exhausted,
        };

        match read {
            GridRead::StopError(e) => {
                obs::emit_grid_stopped(&e);
                state.status = EvolutionStatus::Stopped;
                None
            }
            GridRead::Exhausted => {
                state.status = EvolutionStatus::Done;
                None
            }
            GridRead::RecordApplied(params) => {
                state.target += 1;
                state.records += 1;
                METRICS.inc_grid_records();
                Some(params)
            }
        }
    }

    fn close_object_files(&self, state: &mut SweepState, files: &[LogFile]) {
        for &file in files {
            if let Err(e) = self.ctx.close_standard_file(file) {
                obs::emit_file_close_failed(state.index, file, &e);
                METRICS.inc_close_failures();
                state.status = EvolutionStatus::Stopped;
            }
        }
    }

    fn start_lines(&self, timer: &SweepTimer, noun: &str) {
        self.ctx.say(&format!(
            "Start generating {noun} at {}",
            timer.started_at().to_rfc2822()
        ));
        self.ctx.say("");
    }

    fn finish(&self, mode: SweepMode, state: SweepState, timer: SweepTimer) -> RunSummary {
        let mut status = state.status;
        if status == EvolutionStatus::Continue {
            status = EvolutionStatus::Done;
        }

        // Counted before early-stop normalisation: an early-stopped grid
        // sweep did not see all of its records.
        let requested = if !state.using_grid {
            RequestedCount::Known(state.target)
        } else if status == EvolutionStatus::Done {
            RequestedCount::Known(state.records)
        } else {
            RequestedCount::Unknown
        };

        let early_stopped = status == EvolutionStatus::SamplerEarlyStop;
        if early_stopped {
            obs::emit_sampler_early_stop(state.index.saturating_sub(1), state.created);
            status = EvolutionStatus::Done;
        }

        let summary = RunSummary {
            mode,
            status,
            requested,
            created: state.created,
            early_stopped,
            started_at: timer.started_at(),
            finished_at: chrono::Utc::now(),
            cpu_seconds: timer.cpu_elapsed().as_secs_f64(),
            wall_seconds: timer.wall_elapsed().as_secs_f64(),
        };

        self.ctx.say("");
        self.ctx.say(&summary.generated_line());
        if status != EvolutionStatus::Done {
            warn!(status = %status, "sweep did not complete");
        }
        if !self.options.quiet {
            let label = if early_stopped {
                EvolutionStatus::SamplerEarlyStop.label()
            } else {
                status.label()
            };
            self.ctx.say(label);
        }
        self.ctx.say("");
        self.ctx.say(&format!(
            "End generating {} at {}",
            summary.noun(),
            summary.finished_at.to_rfc2822()
        ));
        self.ctx.say("");
        self.ctx.say(&summary.cpu_line());
        self.ctx.say(&summary.wall_line());

        obs::emit_sweep_finished(&summary);
        METRICS.flush();
        summary
    }

    /// Evolve single stars over the linear mass sweep or the grid.
    pub fn evolve_single_stars(&mut self) -> RunSummary {
        let options = self.options;
        let ctx = self.ctx;
        let _span = obs::SweepSpan::enter(SweepMode::Single, self.seeds.base());

        let sweep = LinearSweep::new(
            options.single_star_mass_min,
            options.single_star_mass_max,
            options.single_star_mass_steps,
        );
        let base = options.base_parameters();
        let limits = EvolutionLimits::from_options(options);
        let mut state = SweepState::new(self.using_grid, sweep.len());

        obs::emit_sweep_started(
            SweepMode::Single,
            (!state.using_grid).then_some(state.target),
            state.using_grid,
        );
        let timer = SweepTimer::start();
        self.start_lines(&timer, "stars");

        let mut star: Option<Star> = None;
        while state.running() {
            ctx.reset_evolving_binary();

            let params = self.next_parameters(&mut state, |index| ObjectParameters {
                initial_mass: Some(sweep.value(index)),
                ..base.clone()
            });

            if let Some(params) = params {
                let index = state.index;
                let seed = self.seed_for(index, &params);
                let mass = params
                    .initial_mass
                    .unwrap_or(options.single_star_mass_min);

                ctx.with_logger(|logger| logger.begin_object(index));
                star = None;
                match Star::new(
                    ctx.next_object_id(),
                    seed.seed,
                    mass,
                    params.metallicity,
                    params.single_kick(),
                ) {
                    Ok(s) => {
                        let s = star.insert(s.with_switch_log(options.output.sse_switch_log));
                        let outcome = s.evolve(index, ctx, &limits);
                        if !options.quiet {
                            ctx.say(&single_progress_line(index, &outcome));
                        }
                        state.created += 1;
                        METRICS.inc_objects_created();
                        obs::emit_object_evolved(index, seed.seed, outcome.status.label());
                    }
                    Err(e) => {
                        obs::emit_construction_failed(index, seed.seed, &e);
                        METRICS.inc_construction_failures();
                    }
                }
            }

            self.close_object_files(
                &mut state,
                &[
                    LogFile::SseSystemParameters,
                    LogFile::SseDetailedOutput,
                    LogFile::SseSwitchLog,
                ],
            );
            ctx.errors().clean();
            state.index += 1;
        }
        drop(star);

        self.finish(SweepMode::Single, state, timer)
    }

    /// Evolve binaries, consulting `sampler` after each one.
    pub fn evolve_binary_stars(&mut self, sampler: &mut dyn Sampler) -> RunSummary {
        let options = self.options;
        let ctx = self.ctx;
        let _span = obs::SweepSpan::enter(SweepMode::Binary, self.seeds.base());
        let _observer = ctx.register_observer(Rc::new(SwitchLogBridge::new(
            options.output.bse_switch_log,
        )));

        let base = options.base_parameters();
        let config = BinaryConfig::from_options(options);
        let limits = EvolutionLimits::from_options(options);
        let mut state = SweepState::new(self.using_grid, options.number_of_binaries);

        obs::emit_sweep_started(
            SweepMode::Binary,
            (!state.using_grid).then_some(state.target),
            state.using_grid,
        );
        sampler.announce();
        let timer = SweepTimer::start();
        self.start_lines(&timer, "binaries");

        let mut binary: Option<Rc<BinaryStar>> = None;
        while state.running() {
            ctx.reset_evolving_binary();

            let params = self.next_parameters(&mut state, |_| base.clone());

            if let Some(params) = params {
                let index = state.index;
                let seed = self.seed_for(index, &params);

                ctx.with_logger(|logger| logger.begin_object(index));
                binary = None;
                match BinaryStar::new(index, seed.seed, &params, &config, ctx) {
                    Ok(b) => {
                        let b = binary.insert(Rc::new(b));
                        ctx.publish_evolving_binary(b);

                        let outcome = b.evolve(ctx, &limits);
                        if !options.quiet {
                            ctx.say(&binary_progress_line(
                                index,
                                &outcome,
                                options.che_mode != CheMode::None,
                            ));
                        }
                        state.created += 1;
                        METRICS.inc_objects_created();
                        obs::emit_object_evolved(index, seed.seed, outcome.status.label());

                        sampler.observe(index, &outcome);
                        if sampler.is_exploratory() && sampler.should_stop_exploratory(index) {
                            state.status = EvolutionStatus::SamplerEarlyStop;
                        }
                    }
                    Err(e) => {
                        obs::emit_construction_failed(index, seed.seed, &e);
                        METRICS.inc_construction_failures();
                    }
                }
            }

            self.close_object_files(
                &mut state,
                &[
                    LogFile::BseSystemParameters,
                    LogFile::BseDetailedOutput,
                    LogFile::BseSwitchLog,
                ],
            );
            ctx.errors().clean();
            state.index += 1;
        }

        ctx.reset_evolving_binary();
        drop(binary);

        self.finish(SweepMode::Binary, state, timer)
    }
}

pub fn single_progress_line(index: usize, outcome: &StarOutcome) -> String {
    format!(
        "{}: RandomSeed = {}, Initial Mass = {}, Metallicity = {}, {}",
        index, outcome.seed, outcome.initial_mass, outcome.metallicity, outcome.stellar_type
    )
}

pub fn binary_progress_line(index: usize, outcome: &BinaryOutcome, che: bool) -> String {
    let (t1, t2) = outcome.stellar_types;
    if che {
        let (i1, i2) = outcome.initial_types;
        format!(
            "{}: {}: ({} -> {}) + ({} -> {})",
            index, outcome.status, i1, t1, i2, t2
        )
    } else {
        format!("{}: {}: {} + {}", index, outcome.status, t1, t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryConsole, MemoryLogSink};
    use crate::physics::{BinaryStatus, StellarType};

    fn context() -> (RunContext, MemoryLogSink, MemoryConsole) {
        let sink = MemoryLogSink::new();
        let console = MemoryConsole::new();
        let ctx = RunContext::new(Box::new(sink.clone()), Box::new(console.clone()));
        (ctx, sink, console)
    }

    #[test]
    fn test_linear_single_sweep_masses_and_seeds() {
        let options = ProgramOptions {
            mode: SweepMode::Single,
            random_seed: Some(100),
            single_star_mass_min: 10.0,
            single_star_mass_max: 30.0,
            single_star_mass_steps: 4,
            ..ProgramOptions::default()
        };
        let (ctx, sink, console) = context();
        let summary = EvolutionDriver::new(&options, &ctx).run();

        assert_eq!(summary.status, EvolutionStatus::Done);
        assert_eq!(summary.created, 4);
        assert_eq!(summary.requested, RequestedCount::Known(4));

        let rows = sink.records(LogFile::SseSystemParameters);
        let masses: Vec<f64> = rows
            .iter()
            .map(|r| r.record.get("Mass@ZAMS").and_then(|v| v.as_f64()).unwrap())
            .collect();
        assert_eq!(masses, vec![10.0, 15.0, 20.0, 25.0]);
        let seeds: Vec<u64> = rows
            .iter()
            .map(|r| r.record.get("SEED").and_then(|v| v.as_u64()).unwrap())
            .collect();
        assert_eq!(seeds, vec![100, 101, 102, 103]);

        let lines = console.lines();
        assert!(lines.iter().any(|l| l.starts_with("0: RandomSeed = 100, Initial Mass = 10,")));
        assert!(lines.contains(&"Generated 4 of 4 stars requested".to_string()));
    }

    #[test]
    fn test_quiet_suppresses_progress_not_summary() {
        let options = ProgramOptions {
            mode: SweepMode::Single,
            random_seed: Some(1),
            single_star_mass_steps: 2,
            quiet: true,
            ..ProgramOptions::default()
        };
        let (ctx, _sink, console) = context();
        EvolutionDriver::new(&options, &ctx).run();

        let lines = console.lines();
        assert!(!lines.iter().any(|l| l.contains("RandomSeed")));
        assert!(lines.contains(&"Generated 2 of 2 stars requested".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Wall time  = ")));
    }

    #[test]
    fn test_missing_grid_file_stops_sweep() {
        let tmp = tempfile::tempdir().unwrap();
        let options = ProgramOptions {
            grid_file: Some(tmp.path().join("absent.grid")),
            random_seed: Some(1),
            ..ProgramOptions::default()
        };
        let (ctx, _sink, console) = context();
        let summary = EvolutionDriver::new(&options, &ctx).run();

        assert_eq!(summary.status, EvolutionStatus::Stopped);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.requested, RequestedCount::Unknown);
        assert!(console
            .lines()
            .contains(&"Generated 0 of <INCOMPLETE GRID> binaries requested".to_string()));
    }

    #[test]
    fn test_grid_seed_override_applies_per_record() {
        let options = ProgramOptions {
            mode: SweepMode::Single,
            random_seed: Some(1_000),
            ..ProgramOptions::default()
        };
        let grid = "--initial-mass 12\n--initial-mass 14 --random-seed 50\n";
        let (ctx, sink, _console) = context();
        EvolutionDriver::new(&options, &ctx)
            .with_grid_reader(Box::new(std::io::Cursor::new(grid)))
            .run();

        let seeds: Vec<u64> = sink
            .records(LogFile::SseSystemParameters)
            .iter()
            .map(|r| r.record.get("SEED").and_then(|v| v.as_u64()).unwrap())
            .collect();
        assert_eq!(seeds, vec![1_000, 51]);
    }

    #[test]
    fn test_construction_failure_is_not_counted() {
        let options = ProgramOptions {
            random_seed: Some(9),
            number_of_binaries: 2,
            initial_mass_1: Some(50.0),
            initial_mass_2: Some(45.0),
            semi_major_axis: Some(0.01),
            ..ProgramOptions::default()
        };
        let (ctx, sink, _console) = context();
        let summary = EvolutionDriver::new(&options, &ctx).run();

        assert_eq!(summary.status, EvolutionStatus::Done);
        assert_eq!(summary.created, 0);
        assert_eq!(summary.requested, RequestedCount::Known(2));
        assert!(sink.records(LogFile::BseSystemParameters).is_empty());
        assert_eq!(
            sink.closes()
                .iter()
                .filter(|(f, _)| *f == LogFile::BseDetailedOutput)
                .count(),
            2
        );
    }

    #[test]
    fn test_binary_progress_line_formats() {
        let outcome = BinaryOutcome {
            index: 3,
            seed: 0,
            object_id: 0,
            status: BinaryStatus::DoubleCompactObject,
            initial_masses: (40.0, 38.0),
            masses: (15.0, 14.0),
            initial_types: (StellarType::Che, StellarType::MsGt07),
            stellar_types: (StellarType::BlackHole, StellarType::BlackHole),
            initial_separation: 0.2,
            separation: 0.3,
            time: 5.0,
            timesteps: 200,
        };
        assert_eq!(
            binary_progress_line(3, &outcome, false),
            "3: Double compact object formed: Black_Hole + Black_Hole"
        );
        assert_eq!(
            binary_progress_line(3, &outcome, true),
            "3: Double compact object formed: (Chemically_Homogeneous -> Black_Hole) + (Main_Sequence_>_0.7 -> Black_Hole)"
        );
    }
}
