//! Question selection for every practice mode.
//!
//! All functions are pure reads over a bank and a progress snapshot and
//! return question ids only; rendering is left to the caller. Randomised
//! modes take the RNG as a parameter so a seeded one gives repeatable output.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::bank::Bank;
use crate::error::{Result, TrainerError};
use crate::model::{Partition, Question, QuestionId};
use crate::progress::{AttemptRecord, ProgressState};
use crate::topics::Topic;

/// Default size of the curated subset.
pub const DEFAULT_TOP500_TARGET: usize = 500;

/// Default number of attempted questions required before hard mode opens.
pub const DEFAULT_HARD_MIN_ATTEMPTED: usize = 20;

/// Questions delivered per exam batch.
pub const EXAM_BATCH_SIZE: usize = 5;

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

/// The next slice of the bank in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequentialBatch {
    pub ids: Vec<QuestionId>,
    /// Cursor the batch starts at (0-based).
    pub position: usize,
    /// Cursor after the batch is confirmed.
    pub end_position: usize,
    pub total: usize,
    /// `true` once the cursor has reached the end of the bank.
    pub completed: bool,
}

/// Up to `n` ids starting at the sequential cursor. Does not move the cursor.
pub fn sequential(bank: &Bank, state: &ProgressState, n: usize) -> SequentialBatch {
    let total = bank.len();
    let position = state.sequential_position.min(total);
    let end_position = position + n.min(total - position);
    SequentialBatch {
        ids: bank.questions()[position..end_position]
            .iter()
            .map(|q| q.id)
            .collect(),
        position,
        end_position,
        total,
        completed: position >= total,
    }
}

// ---------------------------------------------------------------------------
// Random / topic
// ---------------------------------------------------------------------------

/// Eligibility filters for random practice.
#[derive(Debug, Clone, Default)]
pub struct RandomFilter {
    /// Restrict to one category.
    pub category: Option<String>,
    /// Skip questions that have been attempted at least once.
    pub exclude_attempted: bool,
}

/// Uniform sample without replacement of `min(n, eligible)` ids.
pub fn random<R: Rng + ?Sized>(
    bank: &Bank,
    state: &ProgressState,
    n: usize,
    filter: &RandomFilter,
    rng: &mut R,
) -> Result<Vec<QuestionId>> {
    if let Some(category) = &filter.category {
        if !bank.questions().iter().any(|q| &q.category == category) {
            return Err(TrainerError::UnknownCategory(category.clone()));
        }
    }

    let eligible = bank.questions().iter().filter(|q| {
        filter.category.as_ref().is_none_or(|c| &q.category == c)
            && !(filter.exclude_attempted && state.is_attempted(q.id))
    });
    Ok(sample(eligible, n, rng))
}

/// Random practice restricted to questions tagged with `topic`.
pub fn topic_practice<R: Rng + ?Sized>(
    bank: &Bank,
    topic: &str,
    n: usize,
    rng: &mut R,
) -> Result<Vec<QuestionId>> {
    let topic: Topic = topic.parse()?;
    let tagged = bank.questions().iter().filter(|q| q.topics.contains(&topic));
    Ok(sample(tagged, n, rng))
}

fn sample<'a, R: Rng + ?Sized>(
    pool: impl Iterator<Item = &'a Question>,
    n: usize,
    rng: &mut R,
) -> Vec<QuestionId> {
    let mut ids: Vec<QuestionId> = pool.map(|q| q.id).collect();
    ids.shuffle(rng);
    ids.truncate(n);
    ids
}

// ---------------------------------------------------------------------------
// Top 500
// ---------------------------------------------------------------------------

/// Priority bucket of a curated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Currently in the wrong set.
    Wrong,
    /// Never attempted.
    Unseen,
    /// Attempted and not owed.
    Mastered,
}

/// Bucket counts of a list of curated questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Composition {
    pub wrong: usize,
    pub unseen: usize,
    pub mastered: usize,
}

impl Composition {
    fn of(entries: &[(QuestionId, Bucket)]) -> Self {
        let mut c = Composition::default();
        for (_, bucket) in entries {
            match bucket {
                Bucket::Wrong => c.wrong += 1,
                Bucket::Unseen => c.unseen += 1,
                Bucket::Mastered => c.mastered += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.wrong + self.unseen + self.mastered
    }
}

/// A batch drawn from the front of the curated subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Top500Batch {
    pub ids: Vec<QuestionId>,
    /// Size of the whole curated subset.
    pub total_selected: usize,
    /// Buckets of the returned ids.
    pub composition: Composition,
    /// Buckets of the whole curated subset.
    pub subset_composition: Composition,
}

/// Materialise the curated subset: wrong, then unseen round-robin by
/// category, then mastered; truncated to `target`.
pub fn curated_subset(
    bank: &Bank,
    state: &ProgressState,
    target: usize,
) -> Vec<(QuestionId, Bucket)> {
    let mut wrong = Vec::new();
    let mut unseen = Vec::new();
    let mut mastered = Vec::new();
    for q in bank.questions() {
        if state.wrong_set.contains(&q.id) {
            wrong.push(q);
        } else if state.is_attempted(q.id) {
            mastered.push(q);
        } else {
            unseen.push(q);
        }
    }

    // Shakiest mastered questions first; the sort is stable so bank order
    // breaks ties.
    mastered.sort_by(|a, b| cmp_error_rate(state.attempt(b.id), state.attempt(a.id)));

    let mut subset = Vec::with_capacity(target.min(bank.len()));
    let buckets = [
        (Bucket::Wrong, wrong),
        (Bucket::Unseen, round_robin_by_category(unseen)),
        (Bucket::Mastered, mastered),
    ];
    for (bucket, questions) in buckets {
        let room = target.saturating_sub(subset.len());
        subset.extend(questions.into_iter().take(room).map(|q| (q.id, bucket)));
    }
    subset
}

/// The first `n` ids of the curated subset, with bucket breakdowns.
pub fn top500(bank: &Bank, state: &ProgressState, n: usize, target: usize) -> Top500Batch {
    let subset = curated_subset(bank, state, target);
    let batch = &subset[..n.min(subset.len())];
    tracing::debug!(
        "top500 for {}: subset {} questions, returning {}",
        bank.partition(),
        subset.len(),
        batch.len()
    );
    Top500Batch {
        ids: batch.iter().map(|(id, _)| *id).collect(),
        total_selected: subset.len(),
        composition: Composition::of(batch),
        subset_composition: Composition::of(&subset),
    }
}

/// Interleave questions one category at a time, categories in order of first
/// appearance and questions in their original order. Exhausted categories
/// drop out while the others keep contributing.
fn round_robin_by_category(questions: Vec<&Question>) -> Vec<&Question> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, VecDeque<&Question>> = HashMap::new();
    for &q in &questions {
        let group = groups.entry(q.category.as_str()).or_insert_with(|| {
            order.push(q.category.as_str());
            VecDeque::new()
        });
        group.push_back(q);
    }

    let mut out = Vec::with_capacity(questions.len());
    while out.len() < questions.len() {
        for category in &order {
            if let Some(q) = groups.get_mut(category).and_then(VecDeque::pop_front) {
                out.push(q);
            }
        }
    }
    out
}

/// Exact comparison of two error rates without floating point.
fn cmp_error_rate(a: AttemptRecord, b: AttemptRecord) -> Ordering {
    let (aw, aa) = (u64::from(a.wrong_count), u64::from(a.attempt_count.max(1)));
    let (bw, ba) = (u64::from(b.wrong_count), u64::from(b.attempt_count.max(1)));
    (aw * ba).cmp(&(bw * aa))
}

// ---------------------------------------------------------------------------
// Hard / wrong / favorites
// ---------------------------------------------------------------------------

/// Attempted questions by descending error rate, ties by descending attempt
/// count, then bank order.
pub fn hard(
    bank: &Bank,
    state: &ProgressState,
    n: usize,
    min_attempted: usize,
) -> Result<Vec<QuestionId>> {
    let mut attempted: Vec<(QuestionId, AttemptRecord)> = bank
        .questions()
        .iter()
        .map(|q| (q.id, state.attempt(q.id)))
        .filter(|(_, r)| r.attempt_count > 0)
        .collect();

    if attempted.len() < min_attempted {
        return Err(TrainerError::InsufficientData {
            attempted: attempted.len(),
            required: min_attempted,
        });
    }

    attempted.sort_by(|(_, a), (_, b)| {
        cmp_error_rate(*b, *a).then(b.attempt_count.cmp(&a.attempt_count))
    });
    Ok(attempted.into_iter().take(n).map(|(id, _)| id).collect())
}

/// Up to `n` ids from the wrong set, ascending id.
pub fn wrong(bank: &Bank, state: &ProgressState, n: usize) -> Vec<QuestionId> {
    state
        .wrong_set
        .iter()
        .copied()
        .filter(|id| bank.contains(*id))
        .take(n)
        .collect()
}

/// Up to `n` favorited ids, ascending id.
pub fn favorites(bank: &Bank, state: &ProgressState, n: usize) -> Vec<QuestionId> {
    state
        .favorites
        .iter()
        .copied()
        .filter(|id| bank.contains(*id))
        .take(n)
        .collect()
}

// ---------------------------------------------------------------------------
// Exam
// ---------------------------------------------------------------------------

/// A fixed exam question set, delivered in batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamPaper {
    pub partition: Partition,
    pub ids: Vec<QuestionId>,
    pub batch_size: usize,
}

impl ExamPaper {
    pub fn batches(&self) -> std::slice::Chunks<'_, QuestionId> {
        self.ids.chunks(self.batch_size.max(1))
    }

    pub fn batch_count(&self) -> usize {
        self.ids.len().div_ceil(self.batch_size.max(1))
    }
}

/// Draw an exam for the bank's subject, stratified across categories.
///
/// Each category contributes in proportion to its size (largest remainder
/// rounding); questions are sampled uniformly within a category and the
/// final order is shuffled.
pub fn exam<R: Rng + ?Sized>(bank: &Bank, batch_size: usize, rng: &mut R) -> ExamPaper {
    let partition = bank.partition();
    let target = partition.subject.exam_size().min(bank.len());

    let categories = bank.categories();
    let mut groups: Vec<Vec<QuestionId>> = categories
        .iter()
        .map(|c| {
            bank.questions()
                .iter()
                .filter(|q| q.category == *c)
                .map(|q| q.id)
                .collect()
        })
        .collect();
    let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
    let quotas = category_quotas(&sizes, target);

    let mut ids = Vec::with_capacity(target);
    for (group, quota) in groups.iter_mut().zip(quotas) {
        group.shuffle(rng);
        ids.extend(group.iter().take(quota));
    }
    ids.shuffle(rng);

    tracing::debug!(
        "exam for {partition}: {} questions from {} categories",
        ids.len(),
        categories.len()
    );
    ExamPaper {
        partition,
        ids,
        batch_size,
    }
}

/// Split `target` across groups proportionally to `sizes`.
fn category_quotas(sizes: &[usize], target: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return vec![0; sizes.len()];
    }
    let target = target.min(total);

    let mut quotas: Vec<usize> = sizes.iter().map(|&s| s * target / total).collect();
    let leftover = target - quotas.iter().sum::<usize>();

    let mut by_remainder: Vec<usize> = (0..sizes.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = sizes[a] * target % total;
        let rb = sizes[b] * target % total;
        rb.cmp(&ra).then(a.cmp(&b))
    });
    for &i in by_remainder.iter().take(leftover) {
        quotas[i] += 1;
    }
    quotas
}
