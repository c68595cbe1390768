//! Pass/fail scoring over the narrative.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// A sub-task whose status line reads `OK`.
pub const OK_PATTERN: &str = r"Command: (.*)\nOK";

/// A sub-task whose status line reads `Not OK`.
pub const NOT_OK_PATTERN: &str = r"Command: (.*)\nNot OK";

static OK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(OK_PATTERN).ok());
static NOT_OK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(NOT_OK_PATTERN).ok());

fn count(re: &Option<Regex>, text: &str) -> usize {
    re.as_ref().map_or(0, |re| re.find_iter(text).count())
}

/// Percentage of passing probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Percent(u32),
    /// Nothing passed or failed, so there is nothing to score.
    Undeterminable,
}

impl Score {
    /// `round_half_even(ok / (ok + not_ok) * 100)`.
    pub fn from_counts(ok: usize, not_ok: usize) -> Score {
        let total = ok + not_ok;
        if total == 0 {
            return Score::Undeterminable;
        }
        let pct = (ok as f64 / total as f64 * 100.0).round_ties_even();
        Score::Percent(pct as u32)
    }

    pub fn percent(self) -> Option<u32> {
        match self {
            Score::Percent(p) => Some(p),
            Score::Undeterminable => None,
        }
    }

    /// The digest line, e.g. `Your score: 75%`.
    pub fn headline(self) -> String {
        match self {
            Score::Percent(p) => format!("Your score: {}%", p),
            Score::Undeterminable => "Your score: undeterminable".to_string(),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Percent(p) => write!(f, "{}", p),
            Score::Undeterminable => f.write_str("undeterminable"),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Percent(p) => serializer.serialize_u32(*p),
            Score::Undeterminable => serializer.serialize_str("undeterminable"),
        }
    }
}

/// Counts behind a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreTally {
    pub ok: usize,
    pub not_ok: usize,
    pub score: Score,
}

impl ScoreTally {
    /// Count `OK` and `Not OK` sub-tasks in a narrative.
    pub fn from_narrative(narrative: &str) -> Self {
        let ok = count(&OK_RE, narrative);
        let not_ok = count(&NOT_OK_RE, narrative);
        ScoreTally {
            ok,
            not_ok,
            score: Score::from_counts(ok, not_ok),
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.not_ok
    }

    /// `<ok>/<total> tests passed`.
    pub fn passed_line(&self) -> String {
        format!("{}/{} tests passed", self.ok, self.total())
    }
}
