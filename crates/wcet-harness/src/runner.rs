//! Scenario runner.
//!
//! Owns the allocator under test, the clock, the cache flusher and the size
//! sampler. Each scenario prints one result record to the output sink and
//! is followed by a cache flush, always outside any measurement bracket.
//! Setup failures skip the scenario; a failed measured allocation ends the
//! run with [`RunError::Fatal`]. Allocator lifecycle records, when the
//! allocator keeps any, are drained after each scenario and logged as
//! `heap_lifecycle` entries.

use std::io::{self, Write};

use thiserror::Error;
use wcet_core::allocator::{HeapLogLevel, HeapLogRecord};
use wcet_core::{
    Allocator, BenchError, CacheFlusher, Clock, Measurement, ResultRecord, Scenario, SizeSampler,
    TouchFlusher,
};

use crate::config::{RunConfig, ScenarioSelection};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::FATAL_EXIT_CODE;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Fatal(BenchError),
    #[error("output: {0}")]
    Io(#[from] io::Error),
}

pub struct ScenarioRunner {
    allocator: Box<dyn Allocator>,
    clock: Box<dyn Clock>,
    flusher: Box<dyn CacheFlusher>,
    sizes: SizeSampler,
    cache_size: usize,
    clock_name: String,
    log: Option<LogEmitter>,
}

impl ScenarioRunner {
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        let mut runner = Self::with_parts(
            config.allocator.build(config.heap_capacity, config.trace_heap),
            config.clock.build(),
            Box::new(TouchFlusher),
            SizeSampler::new(config.seed, config.max_request),
            config.cache_size,
        );
        runner.clock_name = config.clock.name().to_string();
        runner
    }

    #[must_use]
    pub fn with_parts(
        allocator: Box<dyn Allocator>,
        clock: Box<dyn Clock>,
        flusher: Box<dyn CacheFlusher>,
        sizes: SizeSampler,
        cache_size: usize,
    ) -> Self {
        Self {
            allocator,
            clock,
            flusher,
            sizes,
            cache_size,
            clock_name: "custom".to_string(),
            log: None,
        }
    }

    /// Attaches a JSONL log and records the run parameters.
    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = Some(log);
        let entry = self
            .entry(LogLevel::Info, "run_start")
            .with_cache_bytes(self.cache_size)
            .with_details(serde_json::json!({
                "seed": self.sizes.seed(),
                "max_request": self.sizes.max_request(),
            }));
        self.log_entry(entry);
        self
    }

    /// Runs every scenario in `selection`, in order.
    pub fn run(
        &mut self,
        selection: ScenarioSelection,
        out: &mut dyn Write,
    ) -> Result<Vec<Measurement>, RunError> {
        let mut measured = Vec::new();
        for scenario in selection.scenarios() {
            if let Some(m) = self.run_scenario(scenario, out)? {
                measured.push(m);
            }
        }
        Ok(measured)
    }

    /// Runs one scenario, prints its record, then flushes the cache.
    ///
    /// Returns `Ok(None)` when setup failed and the scenario was skipped.
    pub fn run_scenario(
        &mut self,
        scenario: Scenario,
        out: &mut dyn Write,
    ) -> Result<Option<Measurement>, RunError> {
        let result = scenario.run(&mut *self.allocator, &*self.clock, &mut self.sizes);
        self.log_heap_lifecycle(scenario);
        let measured = match result {
            Ok(m) => {
                writeln!(out, "{}", ResultRecord::from(&m))?;
                out.flush()?;
                self.log_measurement(&m);
                Some(m)
            }
            Err(err) if err.is_fatal() => {
                eprintln!("wcet: {err}");
                let entry = self
                    .entry(LogLevel::Fatal, "scenario_fatal")
                    .with_scenario(scenario.name())
                    .with_outcome(Outcome::Error)
                    .with_exit_code(FATAL_EXIT_CODE)
                    .with_details(serde_json::json!({ "error": err.to_string() }));
                self.log_entry(entry);
                self.finish();
                return Err(RunError::Fatal(err));
            }
            Err(err) => {
                eprintln!("wcet: {err}; skipping {scenario}");
                let entry = self
                    .entry(LogLevel::Warn, "scenario_skipped")
                    .with_scenario(scenario.name())
                    .with_outcome(Outcome::Skip)
                    .with_details(serde_json::json!({ "error": err.to_string() }));
                self.log_entry(entry);
                None
            }
        };
        self.flush_cache();
        Ok(measured)
    }

    /// Touches a cache-sized region. Failure is reported and tolerated.
    pub fn flush_cache(&mut self) {
        match self.flusher.flush(self.cache_size) {
            Ok(report) => {
                let entry = LogEntry::new("", LogLevel::Debug, "cache_flush")
                    .with_cache_bytes(report.bytes);
                self.log_entry(entry);
            }
            Err(err) => {
                eprintln!("wcet: {err}; continuing without flush");
                let entry = LogEntry::new("", LogLevel::Warn, "cache_flush_failed")
                    .with_cache_bytes(self.cache_size)
                    .with_details(serde_json::json!({ "error": err.to_string() }));
                self.log_entry(entry);
            }
        }
    }

    /// Writes `run_end` and flushes the log, if any.
    pub fn finish(&mut self) {
        if self.log.is_none() {
            return;
        }
        let entry = self.entry(LogLevel::Info, "run_end");
        self.log_entry(entry);
        if let Some(log) = self.log.as_mut()
            && let Err(err) = log.flush()
        {
            eprintln!("wcet: log flush failed: {err}");
        }
    }

    fn entry(&self, level: LogLevel, event: &str) -> LogEntry {
        LogEntry::new("", level, event).with_subject(
            self.allocator.name(),
            self.clock_name.as_str(),
            self.clock.unit().to_string(),
        )
    }

    fn log_measurement(&mut self, m: &Measurement) {
        let outcome = if m.failures == 0 {
            Outcome::Pass
        } else {
            Outcome::Fail
        };
        let entry = self
            .entry(LogLevel::Info, "scenario_measured")
            .with_scenario(m.scenario.name())
            .with_timing(m.samples, m.total_ticks, m.mean_ticks)
            .with_failures(m.failures)
            .with_outcome(outcome);
        self.log_entry(entry);
    }

    /// Drains the allocator's lifecycle records. They are dropped when no
    /// log is attached so the trace cannot grow across scenarios.
    fn log_heap_lifecycle(&mut self, scenario: Scenario) {
        let records = self.allocator.drain_lifecycle_logs();
        if self.log.is_none() {
            return;
        }
        for record in records {
            let entry = self
                .entry(heap_level(record.level), "heap_lifecycle")
                .with_scenario(scenario.name())
                .with_details(heap_details(&record));
            self.log_entry(entry);
        }
    }

    fn log_entry(&mut self, entry: LogEntry) {
        if let Some(log) = self.log.as_mut()
            && let Err(err) = log.emit_entry(entry)
        {
            eprintln!("wcet: log write failed: {err}");
        }
    }
}

fn heap_level(level: HeapLogLevel) -> LogLevel {
    match level {
        HeapLogLevel::Trace => LogLevel::Trace,
        HeapLogLevel::Debug => LogLevel::Debug,
        HeapLogLevel::Info => LogLevel::Info,
        HeapLogLevel::Warn => LogLevel::Warn,
        HeapLogLevel::Error => LogLevel::Error,
    }
}

fn heap_details(record: &HeapLogRecord) -> serde_json::Value {
    serde_json::json!({
        "decision_id": record.decision_id,
        "heap_trace_id": record.trace_id,
        "symbol": record.symbol,
        "heap_event": record.event,
        "offset": record.offset,
        "size": record.size,
        "bin": record.bin.map(|(fl, sl)| [fl, sl]),
        "heap_outcome": record.outcome,
        "details": record.details,
        "used_blocks": record.used_blocks,
        "free_blocks": record.free_blocks,
        "free_bytes": record.free_bytes,
    })
}
