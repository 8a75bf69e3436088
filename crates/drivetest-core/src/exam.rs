//! Mock exam sessions.
//!
//! An exam draws a fixed question set, delivers it in batches and grades
//! each answer through the same statistics update as practice. The session
//! lives inside the partition's progress so grading and session bookkeeping
//! commit together.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bank::BankLoader;
use crate::error::{Result, TrainerError};
use crate::grading::{apply_grade, normalize_answer};
use crate::model::{AnswerKey, Partition, QuestionId};
use crate::progress::{ExamResult, ProgressStore};
use crate::selection::{self, ExamPaper};

/// Minimum score (out of 100) to pass.
pub const PASS_THRESHOLD: u32 = 90;

/// `correct × 100 / total`, rounded half up. Zero for an empty exam.
pub fn normalize_score(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let (correct, total) = (correct as u64, total as u64);
    ((correct * 200 + total) / (2 * total)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExamPhase {
    NotStarted,
    InProgress {
        batch_index: usize,
        /// Correct answers so far.
        accumulated_score: usize,
    },
    Finished {
        score: u32,
        passed: bool,
    },
}

/// A mock exam in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: Uuid,
    pub partition: Partition,
    pub question_ids: Vec<QuestionId>,
    pub batch_size: usize,
    /// Answered questions and whether each was correct.
    pub answers: BTreeMap<QuestionId, bool>,
    pub phase: ExamPhase,
    pub started_at: DateTime<Utc>,
}

impl ExamSession {
    pub fn new(paper: ExamPaper) -> Self {
        Self {
            id: Uuid::new_v4(),
            partition: paper.partition,
            question_ids: paper.ids,
            batch_size: paper.batch_size.max(1),
            answers: BTreeMap::new(),
            phase: ExamPhase::NotStarted,
            started_at: Utc::now(),
        }
    }

    /// Move to the first batch. An empty paper finishes immediately.
    pub fn begin(&mut self) {
        self.started_at = Utc::now();
        self.phase = if self.question_ids.is_empty() {
            ExamPhase::Finished {
                score: 0,
                passed: false,
            }
        } else {
            ExamPhase::InProgress {
                batch_index: 0,
                accumulated_score: 0,
            }
        };
    }

    pub fn batch_count(&self) -> usize {
        self.question_ids.len().div_ceil(self.batch_size.max(1))
    }

    pub fn batch(&self, index: usize) -> &[QuestionId] {
        self.question_ids
            .chunks(self.batch_size.max(1))
            .nth(index)
            .unwrap_or(&[])
    }

    /// Ids of the batch being answered; empty unless in progress.
    pub fn current_batch(&self) -> &[QuestionId] {
        match self.phase {
            ExamPhase::InProgress { batch_index, .. } => self.batch(batch_index),
            _ => &[],
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ExamPhase::Finished { .. })
    }

    pub fn correct_count(&self) -> usize {
        self.answers.values().filter(|c| **c).count()
    }

    /// Official time limit measured from `started_at`.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.started_at
            + Duration::minutes(i64::from(self.partition.subject.time_limit_minutes()))
    }

    fn ensure_open(&self, id: QuestionId) -> Result<()> {
        let reject = |reason: &str| TrainerError::ExamItemRejected {
            id,
            reason: reason.to_string(),
        };
        if !matches!(self.phase, ExamPhase::InProgress { .. }) {
            return Err(reject("exam is not in progress"));
        }
        if !self.current_batch().contains(&id) {
            return Err(reject("not part of the current batch"));
        }
        if self.answers.contains_key(&id) {
            return Err(reject("already answered"));
        }
        Ok(())
    }

    fn record_answer(&mut self, id: QuestionId, correct: bool) {
        self.answers.insert(id, correct);
        let ExamPhase::InProgress {
            batch_index,
            accumulated_score,
        } = self.phase
        else {
            return;
        };
        let accumulated_score = accumulated_score + usize::from(correct);

        let batch_done = self
            .batch(batch_index)
            .iter()
            .all(|q| self.answers.contains_key(q));
        self.phase = if !batch_done {
            ExamPhase::InProgress {
                batch_index,
                accumulated_score,
            }
        } else if batch_index + 1 < self.batch_count() {
            ExamPhase::InProgress {
                batch_index: batch_index + 1,
                accumulated_score,
            }
        } else {
            let score = normalize_score(accumulated_score, self.question_ids.len());
            ExamPhase::Finished {
                score,
                passed: score >= PASS_THRESHOLD,
            }
        };
    }
}

/// Result of answering one exam item.
#[derive(Debug, Clone, Serialize)]
pub struct ExamAnswer {
    pub session_id: Uuid,
    pub question_id: QuestionId,
    pub correct: bool,
    pub normalized: AnswerKey,
    pub correct_answer: AnswerKey,
    pub explanation: String,
    pub phase: ExamPhase,
    /// `true` when this answer closed its batch.
    pub batch_complete: bool,
    /// The batch to answer next (empty once finished).
    pub next_batch: Vec<QuestionId>,
}

/// Runs mock exams on top of the bank loader and a progress store.
pub struct ExamCoordinator<'a, S> {
    loader: &'a BankLoader,
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: ProgressStore> ExamCoordinator<'a, S> {
    pub fn new(loader: &'a BankLoader, store: &'a S, batch_size: usize) -> Self {
        Self {
            loader,
            store,
            batch_size,
        }
    }

    /// Draw a paper and persist a fresh session, replacing any previous one.
    pub fn start<R: Rng + ?Sized>(&self, partition: Partition, rng: &mut R) -> Result<ExamSession> {
        let bank = self.loader.load(partition)?;
        let mut session = ExamSession::new(selection::exam(&bank, self.batch_size, rng));
        session.begin();

        self.store.update(partition, |state| {
            if let Some(previous) = state.active_exam.replace(session.clone()) {
                if !previous.is_finished() {
                    tracing::warn!("replacing unfinished exam {} for {partition}", previous.id);
                }
            }
            Ok(())
        })?;
        tracing::info!(
            "started exam {} for {partition}: {} questions",
            session.id,
            session.question_ids.len()
        );
        Ok(session)
    }

    pub fn current_batch(&self, partition: Partition) -> Result<Vec<QuestionId>> {
        let state = self.store.read(partition)?;
        let session = state
            .active_exam
            .ok_or(TrainerError::NoActiveExam(partition))?;
        Ok(session.current_batch().to_vec())
    }

    /// Grade one item of the current batch.
    pub fn answer(
        &self,
        partition: Partition,
        question_id: QuestionId,
        raw_answer: &str,
    ) -> Result<ExamAnswer> {
        let bank = self.loader.load(partition)?;

        self.store.update(partition, |state| {
            let session = state
                .active_exam
                .as_ref()
                .ok_or(TrainerError::NoActiveExam(partition))?;
            session.ensure_open(question_id)?;
            let batch_before = session.current_batch().to_vec();

            let question = bank
                .get(question_id)
                .ok_or(TrainerError::QuestionNotFound(question_id))?;
            let normalized = normalize_answer(question, raw_answer)?;
            let correct = normalized == question.correct_answer;

            apply_grade(state, &bank, question, correct);

            let session = state
                .active_exam
                .as_mut()
                .ok_or(TrainerError::NoActiveExam(partition))?;
            session.record_answer(question_id, correct);
            let next_batch = session.current_batch().to_vec();
            if let ExamPhase::Finished { score, passed } = session.phase {
                tracing::info!("exam {} finished: score {score}, passed {passed}", session.id);
            }

            Ok(ExamAnswer {
                session_id: session.id,
                question_id,
                correct,
                normalized,
                correct_answer: question.correct_answer.clone(),
                explanation: question.explanation.clone(),
                phase: session.phase,
                batch_complete: next_batch != batch_before,
                next_batch,
            })
        })
    }

    /// Commit the finished session to the exam history.
    pub fn record_exam(&self, partition: Partition) -> Result<ExamResult> {
        self.store.update(partition, |state| {
            let session = state
                .active_exam
                .as_ref()
                .filter(|s| s.is_finished())
                .ok_or(TrainerError::ExamNotFinished(partition))?;

            let result = ExamResult::from_correct(
                partition,
                session.correct_count(),
                session.question_ids.len(),
            );
            state.exam_history.push(result.clone());
            state.active_exam = None;
            tracing::info!("recorded exam for {partition}: score {}", result.score);
            Ok(result)
        })
    }

    /// Append an externally computed score on the 100-point scale.
    pub fn record_score(
        &self,
        partition: Partition,
        score: u32,
        total_questions: usize,
    ) -> Result<ExamResult> {
        if score > 100 {
            return Err(TrainerError::InvalidScore { score });
        }
        let result = ExamResult::new(partition, score, total_questions);
        self.store.update(partition, |state| {
            state.exam_history.push(result.clone());
            Ok(())
        })?;
        tracing::info!("recorded external score {score} for {partition}");
        Ok(result)
    }

    pub fn status(&self, partition: Partition) -> Result<Option<ExamSession>> {
        Ok(self.store.read(partition)?.active_exam)
    }

    /// Drop the active session without recording; returns whether one existed.
    pub fn abandon(&self, partition: Partition) -> Result<bool> {
        self.store.update(partition, |state| {
            let abandoned = state.active_exam.take();
            if let Some(session) = &abandoned {
                tracing::info!("abandoned exam {} for {partition}", session.id);
            }
            Ok(abandoned.is_some())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Subject, VehicleType};
    use crate::progress::MemoryProgressStore;
    use crate::selection::EXAM_BATCH_SIZE;
    use crate::test_support::c1s1;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn c1s4() -> Partition {
        Partition::new(VehicleType::C1, Subject::Four)
    }

    /// Subject-4 bank of 120 judge questions, all answered "对".
    fn subject4_data_dir() -> (TempDir, BankLoader) {
        let questions: Vec<String> = (1..=120)
            .map(|i| {
                format!(
                    r#"{{"id": {}, "category": "cat{}", "type": "judge", "question": "q{i}", "answer": "对"}}"#,
                    40000 + i,
                    i % 4
                )
            })
            .collect();
        let json = format!(r#"{{"questions": [{}]}}"#, questions.join(","));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c1_subject4.json"), json).unwrap();
        let loader = BankLoader::new(dir.path());
        (dir, loader)
    }

    /// Answer every question, getting `wrong` of them wrong.
    fn run_exam(coordinator: &ExamCoordinator<'_, MemoryProgressStore>, wrong: usize) -> ExamPhase {
        let mut remaining_wrong = wrong;
        let mut phase = ExamPhase::NotStarted;
        loop {
            let batch = coordinator.current_batch(c1s4()).unwrap();
            if batch.is_empty() {
                return phase;
            }
            for id in batch {
                let raw = if remaining_wrong > 0 {
                    remaining_wrong -= 1;
                    "错"
                } else {
                    "对"
                };
                phase = coordinator.answer(c1s4(), id, raw).unwrap().phase;
            }
        }
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(normalize_score(46, 50), 92);
        assert_eq!(normalize_score(44, 50), 88);
        assert_eq!(normalize_score(1, 8), 13);
        assert_eq!(normalize_score(2, 3), 67);
        assert_eq!(normalize_score(0, 0), 0);
        assert_eq!(normalize_score(100, 100), 100);
    }

    #[test]
    fn subject_four_exam_runs_in_ten_batches_and_passes() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);

        let session = coordinator
            .start(c1s4(), &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(session.question_ids.len(), 50);
        assert_eq!(session.batch_count(), 10);
        assert_eq!(
            session.phase,
            ExamPhase::InProgress {
                batch_index: 0,
                accumulated_score: 0
            }
        );

        let phase = run_exam(&coordinator, 4);
        assert_eq!(
            phase,
            ExamPhase::Finished {
                score: 92,
                passed: true
            }
        );

        let result = coordinator.record_exam(c1s4()).unwrap();
        assert_eq!(result.score, 92);
        assert_eq!(result.correct_count, Some(46));
        let state = store.read(c1s4()).unwrap();
        assert!(state.active_exam.is_none());
        assert_eq!(state.exam_history.len(), 1);
        // Exam answers share practice statistics.
        assert_eq!(state.attempted_count(), 50);
        assert_eq!(state.wrong_set.len(), 4);
    }

    #[test]
    fn failing_exam_is_not_recorded_until_asked() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);
        coordinator
            .start(c1s4(), &mut StdRng::seed_from_u64(2))
            .unwrap();

        let phase = run_exam(&coordinator, 6);
        assert_eq!(
            phase,
            ExamPhase::Finished {
                score: 88,
                passed: false
            }
        );
        assert!(store.read(c1s4()).unwrap().exam_history.is_empty());
        assert!(!coordinator.record_exam(c1s4()).unwrap().passed);
    }

    #[test]
    fn answers_outside_batch_or_repeated_are_rejected() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);
        let session = coordinator
            .start(c1s4(), &mut StdRng::seed_from_u64(3))
            .unwrap();

        let later = session.batch(1)[0];
        let err = coordinator.answer(c1s4(), later, "对").unwrap_err();
        assert_eq!(err.kind(), "exam_item_rejected");

        let first = session.batch(0)[0];
        let answer = coordinator.answer(c1s4(), first, "对").unwrap();
        assert!(answer.correct);
        assert!(!answer.batch_complete);
        let err = coordinator.answer(c1s4(), first, "对").unwrap_err();
        assert_eq!(err.kind(), "exam_item_rejected");

        // A malformed answer is rejected without consuming the item.
        let second = session.batch(0)[1];
        let err = coordinator.answer(c1s4(), second, "X").unwrap_err();
        assert_eq!(err.kind(), "invalid_answer_format");
        assert!(coordinator.answer(c1s4(), second, "错").is_ok());
        assert_eq!(store.read(c1s4()).unwrap().attempted_count(), 2);
    }

    #[test]
    fn record_requires_finished_session() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);

        let err = coordinator.record_exam(c1s4()).unwrap_err();
        assert!(matches!(err, TrainerError::ExamNotFinished(_)));

        coordinator
            .start(c1s4(), &mut StdRng::seed_from_u64(4))
            .unwrap();
        let err = coordinator.record_exam(c1s4()).unwrap_err();
        assert!(matches!(err, TrainerError::ExamNotFinished(_)));

        assert!(coordinator.abandon(c1s4()).unwrap());
        assert!(coordinator.status(c1s4()).unwrap().is_none());
        assert!(!coordinator.abandon(c1s4()).unwrap());
        assert!(matches!(
            coordinator.current_batch(c1s4()),
            Err(TrainerError::NoActiveExam(_))
        ));
    }

    #[test]
    fn external_scores_are_validated() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);

        let result = coordinator.record_score(c1s1(), 95, 100).unwrap();
        assert!(result.passed);
        assert_eq!(result.correct_count, None);
        let err = coordinator.record_score(c1s1(), 101, 100).unwrap_err();
        assert!(matches!(err, TrainerError::InvalidScore { score: 101 }));
        assert_eq!(store.read(c1s1()).unwrap().exam_history.len(), 1);
    }

    #[test]
    fn session_survives_serialization() {
        let (_dir, loader) = subject4_data_dir();
        let store = MemoryProgressStore::new();
        let coordinator = ExamCoordinator::new(&loader, &store, EXAM_BATCH_SIZE);
        let session = coordinator
            .start(c1s4(), &mut StdRng::seed_from_u64(5))
            .unwrap();

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains(r#""state":"in_progress""#));
        let back: ExamSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
        assert_eq!(
            (back.deadline() - back.started_at).num_minutes(),
            i64::from(Subject::Four.time_limit_minutes())
        );
    }
}
