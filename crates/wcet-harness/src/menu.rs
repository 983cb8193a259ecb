//! Interactive numbered menu over a [`ScenarioRunner`].
//!
//! Reads one choice per line. Choices 1-4 run a scenario and flush the
//! cache; 5 exits. Anything else gets a diagnostic and the menu again.
//! End of input exits cleanly.

use std::io::{BufRead, Write};

use wcet_core::Scenario;

use crate::runner::{RunError, ScenarioRunner};

const OPTIONS: [(Scenario, &str); 4] = [
    (
        Scenario::AllocationWorstCase,
        "Worst case execution time for allocation",
    ),
    (
        Scenario::AllocationAverageCase,
        "Average case execution time for allocation",
    ),
    (
        Scenario::ReleaseWorstCase,
        "Worst case execution time for release",
    ),
    (
        Scenario::ReleaseAverageCase,
        "Average case execution time for release",
    ),
];

const EXIT_CHOICE: usize = OPTIONS.len() + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Run(Scenario),
    Exit,
}

fn parse_choice(line: &str) -> Option<Choice> {
    let n: usize = line.trim().parse().ok()?;
    match n {
        EXIT_CHOICE => Some(Choice::Exit),
        1..EXIT_CHOICE => Some(Choice::Run(OPTIONS[n - 1].0)),
        _ => None,
    }
}

/// Reads one line; `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Asks for the cache size until a byte count is entered.
///
/// Returns `None` at end of input.
pub fn prompt_cache_size<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
) -> Result<Option<usize>, RunError> {
    loop {
        write!(out, "Please enter your cache size in terms of bytes for flushing: ")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        match line.trim().parse::<usize>() {
            Ok(bytes) => return Ok(Some(bytes)),
            Err(_) => writeln!(out, "Not a byte count: {:?}", line.trim())?,
        }
    }
}

/// Runs the menu loop until the user exits or input ends.
///
/// Returns the number of scenarios that produced a record.
pub fn run_menu<R: BufRead, W: Write>(
    runner: &mut ScenarioRunner,
    input: &mut R,
    out: &mut W,
) -> Result<usize, RunError> {
    let mut measured = 0;
    loop {
        for (i, (_, label)) in OPTIONS.iter().enumerate() {
            writeln!(out, "{}. {label}", i + 1)?;
        }
        writeln!(out, "{EXIT_CHOICE}. Exit")?;
        write!(out, "Choose an option to proceed: ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            writeln!(out)?;
            return Ok(measured);
        };
        match parse_choice(&line) {
            Some(Choice::Run(scenario)) => {
                if runner.run_scenario(scenario, &mut *out)?.is_some() {
                    measured += 1;
                }
            }
            Some(Choice::Exit) => {
                writeln!(out, "Exiting the program!")?;
                return Ok(measured);
            }
            None => writeln!(out, "Bad input {:?}, choose 1-{EXIT_CHOICE}.", line.trim())?,
        }
    }
}
