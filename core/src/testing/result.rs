use std::{collections::BTreeMap, time::Duration};

use serde::{Serialize, Serializer};
use strum::IntoEnumIterator as _;

use super::process::Termination;

/// Verdict for one test case in one judge run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::EnumIter,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Correct,
    NoAnswerProvided,
    WrongAnswer,
    PresentationError,
    NoOutputProduced,
    TimeLimitExceeded,
    RuntimeError,
}

impl RunOutcome {
    pub fn label(self) -> &'static str {
        use RunOutcome::*;
        match self {
            Correct => "Correct",
            NoAnswerProvided => "No answer provided",
            WrongAnswer => "Wrong answer",
            PresentationError => "Presentation error",
            NoOutputProduced => "No output produced",
            TimeLimitExceeded => "Time limit exceeded",
            RuntimeError => "Runtime error",
        }
    }

    /// Short badge text, e.g. `TLE`.
    pub fn abbrev(self) -> &'static str {
        use RunOutcome::*;
        match self {
            Correct => "AC",
            NoAnswerProvided => "NA",
            WrongAnswer => "WA",
            PresentationError => "PE",
            NoOutputProduced => "NO",
            TimeLimitExceeded => "TLE",
            RuntimeError => "RE",
        }
    }

    pub fn is_correct(self) -> bool {
        self == RunOutcome::Correct
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn as_lossy_str<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}

fn termination_str<S: Serializer>(t: &Termination, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(t)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub test_id: String,
    pub outcome: RunOutcome,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    #[serde(serialize_with = "termination_str")]
    pub termination: Termination,
    #[serde(serialize_with = "as_lossy_str")]
    pub output: Vec<u8>,
    #[serde(serialize_with = "as_lossy_str")]
    pub stderr: Vec<u8>,
    #[serde(skip)]
    pub answer: Option<Vec<u8>>,
}

/// Count per outcome over one judge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    counts: BTreeMap<RunOutcome, usize>,
    total: usize,
}

impl Summary {
    pub fn add(&mut self, outcome: RunOutcome) {
        *self.counts.entry(outcome).or_default() += 1;
        self.total += 1;
    }

    pub fn count(&self, outcome: RunOutcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Every outcome kind with its count, zeros included, in a fixed order.
    pub fn distribution(&self) -> impl Iterator<Item = (RunOutcome, usize)> + '_ {
        RunOutcome::iter().map(|o| (o, self.count(o)))
    }

    /// `100 * correct / total`, or `None` when nothing ran.
    pub fn score(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(100.0 * self.count(RunOutcome::Correct) as f64 / self.total as f64)
    }

    pub fn all_correct(&self) -> bool {
        self.count(RunOutcome::Correct) == self.total
    }
}

impl FromIterator<RunOutcome> for Summary {
    fn from_iter<I: IntoIterator<Item = RunOutcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.add(outcome);
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeReport {
    pub problem: String,
    pub env_name: String,
    pub cases: Vec<CaseReport>,
    pub summary: Summary,
    pub score: Option<f64>,
}

#[cfg(test)]
mod test {
    use super::*;
    use RunOutcome::*;

    #[test]
    fn score_over_runs() {
        let s: Summary = [Correct, WrongAnswer, Correct, TimeLimitExceeded]
            .into_iter()
            .collect();
        assert_eq!(s.total(), 4);
        assert_eq!(s.count(Correct), 2);
        assert_eq!(s.count(RuntimeError), 0);
        assert_eq!(s.score(), Some(50.0));
        assert!(!s.all_correct());
        assert_eq!(s.distribution().count(), 7);
    }

    #[test]
    fn empty_run_has_no_score() {
        let s = Summary::default();
        assert_eq!(s.score(), None);
        assert!(s.all_correct());
    }

    #[test]
    fn single_tle_scores_zero() {
        let s: Summary = [TimeLimitExceeded].into_iter().collect();
        assert_eq!(s.score(), Some(0.0));
    }

    #[test]
    fn serializes_with_screaming_names() {
        let s: Summary = [PresentationError].into_iter().collect();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["counts"]["PRESENTATION_ERROR"], 1);
        assert_eq!(PresentationError.to_string(), "PRESENTATION_ERROR");
        assert_eq!(PresentationError.label(), "Presentation error");
    }
}
