use std::time::Duration;

use thiserror::Error;

/// Type-erased failure of a single candidate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a race produced no result.
#[derive(Error, Debug)]
pub enum RaceError {
    #[error("no candidates to race")]
    NoCandidates,

    /// Every launched candidate finished without success.
    #[error("all {attempted} candidates failed, first error: {cause}")]
    Exhausted {
        attempted: usize,
        #[source]
        cause: BoxError,
    },

    /// The overall deadline fired before any candidate succeeded.
    #[error("deadline of {deadline:?} elapsed while waiting for result{}", describe_cause(.cause))]
    DeadlineElapsed {
        deadline: Duration,
        #[source]
        cause: Option<BoxError>,
    },
}

impl RaceError {
    /// The first failure recorded among the losing candidates, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::NoCandidates => None,
            Self::Exhausted { cause, .. } => Some(cause.as_ref()),
            Self::DeadlineElapsed { cause, .. } => cause.as_deref(),
        }
    }
}

fn describe_cause(cause: &Option<BoxError>) -> String {
    match cause {
        Some(cause) => format!(", but got: {cause}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, RaceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn deadline_message_includes_cause_when_present() {
        let err = RaceError::DeadlineElapsed {
            deadline: Duration::from_secs(1),
            cause: Some("connection refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "deadline of 1s elapsed while waiting for result, but got: connection refused"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn deadline_message_without_cause() {
        let err = RaceError::DeadlineElapsed {
            deadline: Duration::from_millis(1500),
            cause: None,
        };
        assert_eq!(err.to_string(), "deadline of 1.5s elapsed while waiting for result");
        assert!(err.cause().is_none());
    }

    #[test]
    fn exhausted_exposes_cause() {
        let err = RaceError::Exhausted {
            attempted: 3,
            cause: "no route to host".into(),
        };
        assert_eq!(err.to_string(), "all 3 candidates failed, first error: no route to host");
        assert_eq!(err.cause().map(|c| c.to_string()).as_deref(), Some("no route to host"));
    }
}
