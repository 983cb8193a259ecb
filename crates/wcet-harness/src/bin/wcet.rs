//! CLI entrypoint for allocator WCET measurement.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use wcet_core::sizes::DEFAULT_MAX_REQUEST;
use wcet_harness::config::DEFAULT_HEAP_CAPACITY;
use wcet_harness::menu::{prompt_cache_size, run_menu};
use wcet_harness::{
    AllocatorKind, ClockKind, FATAL_EXIT_CODE, LogEmitter, RunConfig, RunError, ScenarioRunner,
    ScenarioSelection,
};

/// Worst-case and average-case timing of allocate/release.
#[derive(Debug, Parser)]
#[command(name = "wcet")]
#[command(about = "Worst-case execution time measurement for memory allocators")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario, or all four in menu order, and print result records.
    Run {
        /// Cache-size estimate in bytes, used for every flush.
        #[arg(long)]
        cache_size: usize,
        /// Scenario to run.
        #[arg(long, value_enum, default_value_t = ScenarioSelection::All)]
        scenario: ScenarioSelection,
        #[command(flatten)]
        measure: MeasureArgs,
    },
    /// Interactive numbered menu.
    Menu {
        /// Cache-size estimate in bytes (prompted for if omitted).
        #[arg(long)]
        cache_size: Option<usize>,
        #[command(flatten)]
        measure: MeasureArgs,
    },
}

#[derive(Debug, Args)]
struct MeasureArgs {
    /// Allocator under test [env: WCET_ALLOCATOR].
    #[arg(long, value_enum)]
    allocator: Option<AllocatorKind>,
    /// Tick source [env: WCET_CLOCK].
    #[arg(long, value_enum)]
    clock: Option<ClockKind>,
    /// Seed for average-case request sizes (entropy if omitted).
    #[arg(long)]
    seed: Option<u64>,
    /// Largest average-case request, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST)]
    max_request: usize,
    /// Logical size of the segregated-fit model heap, in bytes.
    #[arg(long, default_value_t = DEFAULT_HEAP_CAPACITY)]
    heap_capacity: usize,
    /// Structured JSONL log output path.
    #[arg(long)]
    log: Option<PathBuf>,
    /// Log every segregated-model heap decision (slows the timed calls).
    #[arg(long, requires = "log")]
    trace_heap: bool,
}

impl MeasureArgs {
    fn config(&self, cache_size: usize) -> RunConfig {
        RunConfig::new(cache_size)
            .with_selection(self.allocator, self.clock)
            .with_seed(self.seed)
            .with_max_request(self.max_request)
            .with_heap_capacity(self.heap_capacity)
            .with_heap_trace(self.trace_heap)
    }

    fn runner(&self, cache_size: usize) -> io::Result<ScenarioRunner> {
        let runner = ScenarioRunner::from_config(&self.config(cache_size));
        Ok(match &self.log {
            Some(path) => {
                let run_id = format!("run-{}", std::process::id());
                runner.with_log(LogEmitter::to_file(path, &run_id)?)
            }
            None => runner,
        })
    }
}

/// Fatal errors were already reported by the runner.
fn exit_on_fatal<T>(result: Result<T, RunError>) -> Result<T, Box<dyn std::error::Error>> {
    match result {
        Ok(value) => Ok(value),
        Err(RunError::Fatal(_)) => std::process::exit(FATAL_EXIT_CODE),
        Err(err) => Err(err.into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            cache_size,
            scenario,
            measure,
        } => {
            let mut runner = measure.runner(cache_size)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let measured = exit_on_fatal(runner.run(scenario, &mut out))?;
            runner.finish();
            eprintln!("wcet: {} scenario(s) measured", measured.len());
        }
        Command::Menu {
            cache_size,
            measure,
        } => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let stdout = io::stdout();
            let mut out = stdout.lock();

            let cache_size = match cache_size {
                Some(bytes) => bytes,
                None => match prompt_cache_size(&mut input, &mut out)? {
                    Some(bytes) => bytes,
                    None => return Ok(()),
                },
            };
            let mut runner = measure.runner(cache_size)?;
            exit_on_fatal(run_menu(&mut runner, &mut input, &mut out))?;
            runner.finish();
            out.flush()?;
        }
    }

    Ok(())
}
