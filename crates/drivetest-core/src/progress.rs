//! Per-partition user progress and the store trait that persists it.
//!
//! The durable file-backed implementation lives in the `drivetest-store`
//! crate; [`MemoryProgressStore`] here backs tests and embedders that do not
//! need persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::exam::{normalize_score, ExamSession, PASS_THRESHOLD};
use crate::model::{Partition, QuestionId, Subject, VehicleType};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Attempt counters of one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_count: u32,
    pub wrong_count: u32,
}

impl AttemptRecord {
    /// `wrong / attempts`, 0 for an unseen question.
    pub fn error_rate(&self) -> f64 {
        if self.attempt_count == 0 {
            0.0
        } else {
            f64::from(self.wrong_count) / f64::from(self.attempt_count)
        }
    }

    pub fn correct_count(&self) -> u32 {
        self.attempt_count.saturating_sub(self.wrong_count)
    }

    fn record(&mut self, correct: bool) {
        self.attempt_count += 1;
        if !correct {
            self.wrong_count += 1;
        }
    }
}

/// A committed mock exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub timestamp: DateTime<Utc>,
    pub subject: Subject,
    pub vehicle_type: VehicleType,
    /// Score on the 100-point scale.
    pub score: u32,
    pub total_questions: usize,
    /// Raw correct answers, when recorded from a coordinated session.
    #[serde(default)]
    pub correct_count: Option<usize>,
    pub pass_threshold: u32,
    pub passed: bool,
}

impl ExamResult {
    /// Build a result from a score already on the 100-point scale.
    pub fn new(partition: Partition, score: u32, total_questions: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            subject: partition.subject,
            vehicle_type: partition.vehicle_type,
            score,
            total_questions,
            correct_count: None,
            pass_threshold: PASS_THRESHOLD,
            passed: score >= PASS_THRESHOLD,
        }
    }

    /// Build a result from a raw correct count.
    pub fn from_correct(partition: Partition, correct: usize, total_questions: usize) -> Self {
        let mut result = Self::new(
            partition,
            normalize_score(correct, total_questions),
            total_questions,
        );
        result.correct_count = Some(correct);
        result
    }
}

/// Everything persisted for one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    /// Resume point for sequential practice; never exceeds the bank size.
    pub sequential_position: usize,
    pub attempts: BTreeMap<QuestionId, AttemptRecord>,
    pub favorites: BTreeSet<QuestionId>,
    /// Questions whose most recent answer was wrong.
    pub wrong_set: BTreeSet<QuestionId>,
    pub exam_history: Vec<ExamResult>,
    pub active_exam: Option<ExamSession>,
}

impl ProgressState {
    /// Check the invariants a deserialized document must hold.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if let Some((id, record)) = self
            .attempts
            .iter()
            .find(|(_, r)| r.wrong_count > r.attempt_count)
        {
            return Err(format!(
                "question {id}: {} wrong answers out of {} attempts",
                record.wrong_count, record.attempt_count
            ));
        }
        if let Some(session) = &self.active_exam {
            if session.batch_size == 0 {
                return Err(format!("exam {} has a batch size of 0", session.id));
            }
        }
        Ok(())
    }

    /// Attempt counters of a question (zero when never attempted).
    pub fn attempt(&self, id: QuestionId) -> AttemptRecord {
        self.attempts.get(&id).copied().unwrap_or_default()
    }

    pub fn error_rate(&self, id: QuestionId) -> f64 {
        self.attempt(id).error_rate()
    }

    pub fn is_attempted(&self, id: QuestionId) -> bool {
        self.attempt(id).attempt_count > 0
    }

    /// Number of distinct questions with at least one attempt.
    pub fn attempted_count(&self) -> usize {
        self.attempts.values().filter(|r| r.attempt_count > 0).count()
    }

    /// Count one graded answer and keep the wrong set in step with it.
    pub fn record_attempt(&mut self, id: QuestionId, correct: bool) -> AttemptRecord {
        let record = self.attempts.entry(id).or_default();
        record.record(correct);
        let record = *record;
        if correct {
            self.wrong_set.remove(&id);
        } else {
            self.wrong_set.insert(id);
        }
        record
    }

    /// Move the sequential cursor forward by up to `count`, pinned at `total`.
    pub fn advance_sequential(&mut self, total: usize, count: usize) -> usize {
        let position = self.sequential_position.min(total);
        self.sequential_position = position + count.min(total - position);
        self.sequential_position
    }

    pub fn reset_sequential(&mut self) {
        self.sequential_position = 0;
    }

    /// Add or remove a favorite; returns `true` if membership changed.
    pub fn set_favorite(&mut self, id: QuestionId, favorite: bool) -> bool {
        if favorite {
            self.favorites.insert(id)
        } else {
            self.favorites.remove(&id)
        }
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Durable per-partition progress with atomic read-modify-write.
pub trait ProgressStore: Send + Sync {
    /// Current state, or an empty default if nothing was persisted yet.
    fn read(&self, partition: Partition) -> Result<ProgressState>;

    /// Apply `mutation` under the partition's exclusive lock.
    ///
    /// The new state is committed only when `mutation` returns `Ok`; an error
    /// leaves the previously committed state untouched.
    fn update<T, F>(&self, partition: Partition, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut ProgressState) -> Result<T>;

    /// Return the sequential cursor to the start of the bank.
    fn reset_sequential(&self, partition: Partition) -> Result<()> {
        self.update(partition, |state| {
            state.reset_sequential();
            Ok(())
        })
    }
}

/// In-memory store with the same all-or-nothing update semantics.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    states: Mutex<HashMap<Partition, ProgressState>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn read(&self, partition: Partition) -> Result<ProgressState> {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        Ok(states.get(&partition).cloned().unwrap_or_default())
    }

    fn update<T, F>(&self, partition: Partition, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut ProgressState) -> Result<T>,
    {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = states.get(&partition).cloned().unwrap_or_default();
        let value = mutation(&mut next)?;
        states.insert(partition, next);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainerError;

    #[test]
    fn error_rate_of_unseen_question_is_zero() {
        let state = ProgressState::default();
        assert_eq!(state.error_rate(QuestionId(1)), 0.0);
        assert!(!state.is_attempted(QuestionId(1)));
    }

    #[test]
    fn wrong_set_follows_latest_answer() {
        let mut state = ProgressState::default();
        let id = QuestionId(7);

        state.record_attempt(id, false);
        assert!(state.wrong_set.contains(&id));

        let record = state.record_attempt(id, true);
        assert!(!state.wrong_set.contains(&id));
        assert_eq!(record.attempt_count, 2);
        assert_eq!(record.wrong_count, 1);
        assert!((record.error_rate() - 0.5).abs() < f64::EPSILON);

        state.record_attempt(id, false);
        assert!(state.wrong_set.contains(&id));
        assert!(state.attempt(id).wrong_count <= state.attempt(id).attempt_count);
    }

    #[test]
    fn sequential_cursor_saturates_and_resets() {
        let mut state = ProgressState::default();
        assert_eq!(state.advance_sequential(12, 5), 5);
        assert_eq!(state.advance_sequential(12, 5), 10);
        assert_eq!(state.advance_sequential(12, 5), 12);
        assert_eq!(state.advance_sequential(12, 5), 12);
        state.reset_sequential();
        assert_eq!(state.sequential_position, 0);
    }

    #[test]
    fn favorites_are_independent_of_attempts() {
        let mut state = ProgressState::default();
        assert!(state.set_favorite(QuestionId(3), true));
        assert!(!state.set_favorite(QuestionId(3), true));
        assert!(!state.is_attempted(QuestionId(3)));
        assert!(state.set_favorite(QuestionId(3), false));
        assert!(state.favorites.is_empty());
    }

    #[test]
    fn json_roundtrip_preserves_state() {
        let fresh = ProgressState::default();
        let json = serde_json::to_string(&fresh).unwrap();
        let back: ProgressState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fresh);
        assert_eq!(back.sequential_position, 0);
        assert!(back.attempts.is_empty() && back.wrong_set.is_empty());

        let mut state = ProgressState::default();
        state.record_attempt(QuestionId(10001), false);
        state.record_attempt(QuestionId(10002), true);
        state.set_favorite(QuestionId(10003), true);
        state.advance_sequential(100, 3);
        let partition = Partition::new(VehicleType::C1, Subject::Four);
        state
            .exam_history
            .push(ExamResult::from_correct(partition, 46, 50));

        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: ProgressState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn missing_fields_default() {
        let back: ProgressState = serde_json::from_str("{}").unwrap();
        assert_eq!(back, ProgressState::default());
    }

    #[test]
    fn exam_result_pass_threshold() {
        let partition = Partition::new(VehicleType::C1, Subject::Four);
        let pass = ExamResult::from_correct(partition, 46, 50);
        assert_eq!(pass.score, 92);
        assert!(pass.passed);
        let fail = ExamResult::from_correct(partition, 44, 50);
        assert_eq!(fail.score, 88);
        assert!(!fail.passed);
        assert!(ExamResult::new(partition, 90, 50).passed);
    }

    #[test]
    fn memory_store_discards_failed_mutation() {
        let store = MemoryProgressStore::new();
        let partition = Partition::new(VehicleType::A2, Subject::One);
        store
            .update(partition, |s| {
                s.record_attempt(QuestionId(1), true);
                Ok(())
            })
            .unwrap();

        let err = store
            .update(partition, |s| -> Result<()> {
                s.record_attempt(QuestionId(2), false);
                Err(TrainerError::QuestionNotFound(QuestionId(2)))
            })
            .unwrap_err();
        assert_eq!(err.kind(), "question_not_found");

        let state = store.read(partition).unwrap();
        assert!(state.is_attempted(QuestionId(1)));
        assert!(!state.is_attempted(QuestionId(2)));
        assert!(state.wrong_set.is_empty());

        store.reset_sequential(partition).unwrap();
        let other = Partition::new(VehicleType::D, Subject::Four);
        assert_eq!(store.read(other).unwrap(), ProgressState::default());
    }

    #[test]
    fn validate_rejects_impossible_counters() {
        let parsed: ProgressState =
            serde_json::from_str(r#"{"attempts":{"1":{"attempt_count":1,"wrong_count":3}}}"#)
                .unwrap();
        let reason = parsed.validate().unwrap_err();
        assert!(reason.contains("question 1"));
        assert_eq!(parsed.attempt(QuestionId(1)).correct_count(), 0);

        let mut state = ProgressState::default();
        state.record_attempt(QuestionId(1), false);
        assert!(state.validate().is_ok());
    }
}
