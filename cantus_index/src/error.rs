// Error taxonomy for indexer construction and execution.
//
// Every failure in an indexer chain is fatal and synchronous: constructors
// validate shapes and preconditions before any computation starts, and
// `run()` either returns a complete table or one of these errors. Nothing is
// retried and no partial result survives a failure, since every operation is
// a deterministic function of data already in memory.
//
// An "Other" dissonance classification is not an error. It is an ordinary
// value (`Classification::Other` in figures.rs).

use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Label/column counts disagree, axes differ, or an input has the wrong
    /// kind of columns for the indexer consuming it.
    #[error("{indexer}: shape mismatch: {detail}")]
    Shape {
        indexer: &'static str,
        detail: String,
    },

    /// An input violates a contract of the consuming indexer, e.g. vertical
    /// intervals that were not forward-filled or were built without quality.
    #[error("{indexer}: precondition failed: {detail}")]
    Precondition {
        indexer: &'static str,
        detail: String,
    },

    #[error("{indexer}: needs at least {window} offsets, got {offsets}")]
    WindowTooShort {
        indexer: &'static str,
        window: usize,
        offsets: usize,
    },

    #[error("part '{part}': offset {offset} does not come after {previous}")]
    UnorderedOffsets {
        part: String,
        offset: f64,
        previous: f64,
    },

    #[error("offset {0} is not a finite number")]
    NonFiniteOffset(f64),

    #[error("invalid pitch name '{0}'")]
    InvalidPitch(String),

    #[error("invalid interval name '{0}'")]
    InvalidInterval(String),

    #[error("invalid meter '{0}'")]
    InvalidMeter(String),

    #[error("unsupported MIDI layout: {0}")]
    MidiLayout(String),

    /// Malformed or wrongly typed JSON settings or piece description.
    #[error("invalid JSON input: {0}")]
    Config(#[from] serde_json::Error),

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    pub fn shape(indexer: &'static str, detail: impl Into<String>) -> Self {
        IndexError::Shape {
            indexer,
            detail: detail.into(),
        }
    }

    pub fn precondition(indexer: &'static str, detail: impl Into<String>) -> Self {
        IndexError::Precondition {
            indexer,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_indexer() {
        let err = IndexError::shape("vertical_interval", "3 labels for 2 columns");
        assert_eq!(
            err.to_string(),
            "vertical_interval: shape mismatch: 3 labels for 2 columns"
        );

        let err = IndexError::WindowTooShort {
            indexer: "nota_cambiata",
            window: 4,
            offsets: 2,
        };
        assert_eq!(err.to_string(), "nota_cambiata: needs at least 4 offsets, got 2");
    }

    #[test]
    fn test_json_errors_convert() {
        let parse: Result<u32, _> = serde_json::from_str("not json");
        let err: IndexError = parse.unwrap_err().into();
        assert!(matches!(err, IndexError::Config(_)));
    }
}
