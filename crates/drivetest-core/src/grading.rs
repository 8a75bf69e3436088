//! Answer checking and the statistics update it drives.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::bank::{Bank, BankLoader, PartitionHint};
use crate::error::{Result, TrainerError};
use crate::mnemonics::Mnemonic;
use crate::model::{
    parse_judgement, parse_letters, AnswerKey, Partition, Question, QuestionId, QuestionKind,
};
use crate::progress::{AttemptRecord, ProgressState, ProgressStore};
use crate::topics::Topic;

/// Outcome of grading one answer.
#[derive(Debug, Clone, Serialize)]
pub struct GradeResult {
    pub question_id: QuestionId,
    pub partition: Partition,
    pub correct: bool,
    /// The answer as submitted.
    pub submitted: String,
    /// The submitted answer after normalisation.
    pub normalized: AnswerKey,
    pub correct_answer: AnswerKey,
    pub explanation: String,
    pub category: String,
    pub topics: BTreeSet<Topic>,
    /// Error rate after this attempt.
    pub error_rate: f64,
    pub attempt_count: u32,
    pub wrong_count: u32,
    pub mnemonics: Vec<Mnemonic>,
}

/// Result of a favorite toggle.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteChange {
    pub question_id: QuestionId,
    pub partition: Partition,
    pub favorite: bool,
    /// `false` when the question already had the requested membership.
    pub changed: bool,
    pub favorites_count: usize,
}

/// Normalise a raw answer against the question's kind and options.
pub fn normalize_answer(question: &Question, raw: &str) -> Result<AnswerKey> {
    let invalid = |reason: String| TrainerError::InvalidAnswerFormat {
        id: question.id,
        reason,
    };

    match question.kind {
        QuestionKind::Judge => parse_judgement(raw)
            .map(AnswerKey::Judgement)
            .ok_or_else(|| invalid(format!("'{raw}' is not a true/false answer"))),
        QuestionKind::Single | QuestionKind::Multi => {
            let letters =
                parse_letters(raw).ok_or_else(|| invalid(format!("'{raw}' is not an option letter")))?;
            if question.kind == QuestionKind::Single && letters.len() != 1 {
                return Err(invalid(format!(
                    "single choice expects one letter, got {}",
                    letters.len()
                )));
            }
            if let Some(out_of_range) = letters.iter().find(|c| !question.has_option(**c)) {
                return Err(invalid(format!(
                    "option {out_of_range} does not exist ({} options)",
                    question.options.len()
                )));
            }
            Ok(AnswerKey::Choice(letters))
        }
    }
}

/// Record one graded answer in `state`.
///
/// Updates the attempt counters and wrong set, and moves the sequential
/// cursor forward by one when the question sits exactly at the cursor.
pub fn apply_grade(
    state: &mut ProgressState,
    bank: &Bank,
    question: &Question,
    correct: bool,
) -> AttemptRecord {
    let record = state.record_attempt(question.id, correct);
    if bank.position(question.id) == Some(state.sequential_position) {
        state.advance_sequential(bank.len(), 1);
    }
    record
}

/// Grades answers and keeps per-question statistics.
pub struct Grader<'a, S> {
    loader: &'a BankLoader,
    store: &'a S,
}

impl<'a, S: ProgressStore> Grader<'a, S> {
    pub fn new(loader: &'a BankLoader, store: &'a S) -> Self {
        Self { loader, store }
    }

    /// Grade `raw_answer` for `question_id` and persist the attempt.
    pub fn check(
        &self,
        question_id: QuestionId,
        raw_answer: &str,
        hint: PartitionHint,
    ) -> Result<GradeResult> {
        let bank = self.loader.locate(question_id, hint)?;
        let question = bank
            .get(question_id)
            .ok_or(TrainerError::QuestionNotFound(question_id))?;

        let normalized = normalize_answer(question, raw_answer)?;
        let correct = normalized == question.correct_answer;
        let partition = bank.partition();
        // Every fallible lookup happens before the commit.
        let mnemonics = self.loader.mnemonics()?.for_topics(&question.topics);

        let record = self
            .store
            .update(partition, |state| Ok(apply_grade(state, &bank, question, correct)))?;
        tracing::info!(
            "graded {question_id} in {partition}: {} ({} attempts, {} wrong)",
            if correct { "correct" } else { "wrong" },
            record.attempt_count,
            record.wrong_count
        );

        Ok(GradeResult {
            question_id,
            partition,
            correct,
            submitted: raw_answer.to_string(),
            normalized,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            category: question.category.clone(),
            topics: question.topics.clone(),
            error_rate: record.error_rate(),
            attempt_count: record.attempt_count,
            wrong_count: record.wrong_count,
            mnemonics,
        })
    }

    pub fn favorite(&self, question_id: QuestionId, hint: PartitionHint) -> Result<FavoriteChange> {
        self.set_favorite(question_id, hint, true)
    }

    pub fn unfavorite(&self, question_id: QuestionId, hint: PartitionHint) -> Result<FavoriteChange> {
        self.set_favorite(question_id, hint, false)
    }

    fn set_favorite(
        &self,
        question_id: QuestionId,
        hint: PartitionHint,
        favorite: bool,
    ) -> Result<FavoriteChange> {
        let partition = self.loader.locate(question_id, hint)?.partition();
        let (changed, favorites_count) = self.store.update(partition, |state| {
            let changed = state.set_favorite(question_id, favorite);
            Ok((changed, state.favorites.len()))
        })?;
        Ok(FavoriteChange {
            question_id,
            partition,
            favorite,
            changed,
            favorites_count,
        })
    }
}
