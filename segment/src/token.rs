use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SegmentError;

const SEPARATOR: &str = "_demarcation_";

/// The instance number reserved for the first marker ever written for a run.
pub const FIRST_INSTANCE: u64 = 1;

/// A demarcation marker `<run_id>_demarcation_<instance>` written into the
/// logs to bound one processing window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DemarcationToken {
    run_id: String,
    instance: u64,
}

impl DemarcationToken {
    pub fn new(run_id: impl Into<String>, instance: u64) -> Self {
        Self {
            run_id: run_id.into(),
            instance,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// The marker that closes the window this token opens.
    pub fn next(&self) -> Self {
        Self {
            run_id: self.run_id.clone(),
            instance: self.instance.saturating_add(1),
        }
    }

    pub fn is_first_instance(&self) -> bool {
        self.instance == FIRST_INSTANCE
    }
}

impl Ord for DemarcationToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instance
            .cmp(&other.instance)
            .then_with(|| self.run_id.cmp(&other.run_id))
    }
}

impl PartialOrd for DemarcationToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DemarcationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.run_id, self.instance)
    }
}

impl FromStr for DemarcationToken {
    type Err = SegmentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let malformed = || SegmentError::MalformedToken(trimmed.to_string());
        let (run_id, instance) = trimmed.rsplit_once(SEPARATOR).ok_or_else(malformed)?;
        if run_id.is_empty() || run_id.chars().any(char::is_whitespace) {
            return Err(malformed());
        }
        let instance = instance.parse::<u64>().map_err(|_| malformed())?;
        Ok(Self::new(run_id, instance))
    }
}

/// True when `line` contains `token` as a whole word, i.e. the bytes around
/// the occurrence are not ASCII alphanumerics or `_`. `run_demarcation_1`
/// therefore never matches inside `run_demarcation_12`.
pub fn line_contains_token(line: &[u8], token: &[u8]) -> bool {
    if token.is_empty() || line.len() < token.len() {
        return false;
    }
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    line.windows(token.len())
        .enumerate()
        .filter(|(_, window)| *window == token)
        .any(|(idx, _)| {
            let before_ok = idx == 0 || !is_word(line[idx - 1]);
            let after = idx + token.len();
            let after_ok = after >= line.len() || !is_word(line[after]);
            before_ok && after_ok
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_and_serializes_round_trip() {
        let token: DemarcationToken = "run1_demarcation_3\n".parse().expect("token");
        assert_eq!(token.run_id(), "run1");
        assert_eq!(token.instance(), 3);
        assert_eq!(token.to_string(), "run1_demarcation_3");
    }

    #[test]
    fn run_id_may_contain_underscores() {
        let token: DemarcationToken = "eniq_stats_demarcation_12".parse().expect("token");
        assert_eq!(token.run_id(), "eniq_stats");
        assert_eq!(token.next().to_string(), "eniq_stats_demarcation_13");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for raw in ["", "run1", "_demarcation_3", "run1_demarcation_x", "a b_demarcation_1"] {
            assert!(
                raw.parse::<DemarcationToken>().is_err(),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn orders_by_instance() {
        let a = DemarcationToken::new("run1", 9);
        let b = DemarcationToken::new("run1", 10);
        assert!(a < b);
        assert!(a.next() == b);
        assert!(DemarcationToken::new("run1", 1).is_first_instance());
    }

    #[test]
    fn whole_word_matching() {
        let token = b"run1_demarcation_1";
        assert!(line_contains_token(
            b"insert into t values('run1_demarcation_1');",
            token
        ));
        assert!(line_contains_token(b"run1_demarcation_1", token));
        assert!(!line_contains_token(b"'run1_demarcation_12'", token));
        assert!(!line_contains_token(b"xrun1_demarcation_1 ", token));
        assert!(line_contains_token(
            b"run1_demarcation_12 then run1_demarcation_1.",
            token
        ));
    }
}
