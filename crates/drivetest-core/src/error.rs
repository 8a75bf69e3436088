//! Trainer error types.
//!
//! Every failure the engine can report to a caller is a distinct variant so
//! the presentation layer can branch on it without string matching.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Partition, QuestionId};

/// Errors produced by the bank loader, progress store and engines.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// No question bank file exists for the partition.
    #[error("question bank not found for {partition} (expected {})", path.display())]
    BankNotFound { partition: Partition, path: PathBuf },

    /// The bank or mnemonic file exists but cannot be used.
    #[error("malformed bank data in {}: {reason}", path.display())]
    MalformedBank { path: PathBuf, reason: String },

    /// A vehicle type code outside the supported set.
    #[error("unknown vehicle type: {0}")]
    UnknownVehicleType(String),

    /// A category filter that names no category of the partition.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// A topic tag outside the fixed vocabulary.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Hard mode needs more attempt history.
    #[error("not enough attempt history: {attempted} questions attempted, {required} required")]
    InsufficientData { attempted: usize, required: usize },

    /// No partition contains the question.
    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    /// The question id exists in more than one partition.
    #[error("question {id} is ambiguous across partitions: {}", join(partitions))]
    AmbiguousQuestion {
        id: QuestionId,
        partitions: Vec<Partition>,
    },

    /// The submitted answer does not fit the question kind.
    #[error("invalid answer format for question {id}: {reason}")]
    InvalidAnswerFormat { id: QuestionId, reason: String },

    /// Persisted progress exists but cannot be parsed or breaks its invariants.
    #[error("corrupt progress file {}: {reason}", path.display())]
    CorruptProgress { path: PathBuf, reason: String },

    /// Another invocation holds the partition lock.
    #[error("progress for {partition} is locked, gave up after {waited_ms}ms")]
    ProgressLocked { partition: Partition, waited_ms: u64 },

    /// `record_exam` was called before the session finished.
    #[error("exam for {0} is not finished")]
    ExamNotFinished(Partition),

    /// No exam session is active for the partition.
    #[error("no active exam for {0}")]
    NoActiveExam(Partition),

    /// The answered question is not an open item of the current batch.
    #[error("question {id} rejected by exam session: {reason}")]
    ExamItemRejected { id: QuestionId, reason: String },

    /// A recorded score outside the 100-point scale.
    #[error("invalid exam score {score}: must be within 0..=100")]
    InvalidScore { score: u32 },

    /// An underlying filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join(partitions: &[Partition]) -> String {
    partitions
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl TrainerError {
    /// Stable machine-readable identifier for the wire format.
    pub fn kind(&self) -> &'static str {
        match self {
            TrainerError::BankNotFound { .. } => "bank_not_found",
            TrainerError::MalformedBank { .. } => "malformed_bank",
            TrainerError::UnknownVehicleType(_) => "unknown_vehicle_type",
            TrainerError::UnknownCategory(_) => "unknown_category",
            TrainerError::UnknownTopic(_) => "unknown_topic",
            TrainerError::InsufficientData { .. } => "insufficient_data",
            TrainerError::QuestionNotFound(_) => "question_not_found",
            TrainerError::AmbiguousQuestion { .. } => "ambiguous_question",
            TrainerError::InvalidAnswerFormat { .. } => "invalid_answer_format",
            TrainerError::CorruptProgress { .. } => "corrupt_progress",
            TrainerError::ProgressLocked { .. } => "progress_locked",
            TrainerError::ExamNotFinished(_) => "exam_not_finished",
            TrainerError::NoActiveExam(_) => "no_active_exam",
            TrainerError::ExamItemRejected { .. } => "exam_item_rejected",
            TrainerError::InvalidScore { .. } => "invalid_score",
            TrainerError::Io { .. } => "io",
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrainerError::ProgressLocked { .. })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TrainerError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = TrainerError> = std::result::Result<T, E>;
