//! Result records: the textual contract read by result-parsing tooling.
//!
//! One record per scenario, `<key>_time:<ticks>;`, ticks printed with six
//! fractional digits. Values are raw clock ticks; the unit is whatever the
//! run's clock reports and is logged separately.

use std::fmt;

use crate::workload::Measurement;

const RECORD_SUFFIX: &str = "_time:";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub key: String,
    pub ticks: f64,
}

impl ResultRecord {
    #[must_use]
    pub fn new(key: impl Into<String>, ticks: f64) -> Self {
        Self {
            key: key.into(),
            ticks,
        }
    }
}

impl From<&Measurement> for ResultRecord {
    fn from(m: &Measurement) -> Self {
        Self::new(m.scenario.record_key(), m.mean_ticks)
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:.6};", self.key, RECORD_SUFFIX, self.ticks)
    }
}

/// Parses one `<key>_time:<ticks>;` record, ignoring surrounding whitespace.
#[must_use]
pub fn parse_result_line(line: &str) -> Option<ResultRecord> {
    let body = line.trim().strip_suffix(';')?;
    let (key, value) = body.split_once(RECORD_SUFFIX)?;
    if key.is_empty() || value.contains(';') {
        return None;
    }
    let ticks = value.parse::<f64>().ok()?;
    Some(ResultRecord::new(key, ticks))
}
