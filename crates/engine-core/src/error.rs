use model::core::identifiers::Sid;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Segmenter round-trip invariant violated:\noriginal: {original:?}\nrejoined: {rejoined:?}")]
    RoundTrip { original: String, rejoined: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(#[from] SegmentError),

    #[error("Manifest invalid: {0}")]
    Invalid(#[from] ManifestViolation),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestViolation {
    #[error("manifest has no items")]
    Empty,

    #[error("SID sequence is not dense and zero-based")]
    SidSequence,

    #[error("invalid signature for SID {0}")]
    Signature(Sid),

    #[error("source text does not match the joined items")]
    SourceMismatch,

    #[error("empty item at SID {0}")]
    EmptyItem(Sid),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsmViolation {
    #[error("tracked SIDs do not match 0..{expected}")]
    SidSetMismatch { expected: usize },

    #[error("marked as ready but {unfinished} SIDs are still pending or retrying")]
    ReadyWithUnfinishedSids { unfinished: usize },

    #[error("{processed} chunks processed but only {total} exist")]
    TooManyChunks { processed: usize, total: usize },
}
