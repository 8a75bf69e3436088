//! Progress reports over banks and persisted state.
//!
//! Accuracy figures are percentages in `0.0..=100.0`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::bank::Bank;
use crate::mnemonics::MnemonicTable;
use crate::model::{Partition, QuestionKind};
use crate::progress::{ExamResult, ProgressState};
use crate::topics::Topic;

/// Categories need this many answers before they can be called weak.
pub const WEAK_MIN_ANSWERS: u64 = 5;

/// Categories below this accuracy are weak.
pub const WEAK_ACCURACY: f64 = 80.0;

const MAX_WEAK_CATEGORIES: usize = 5;
const RECENT_EXAMS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub single: usize,
    pub multi: usize,
    pub judge: usize,
}

impl KindCounts {
    fn add(&mut self, kind: QuestionKind) {
        match kind {
            QuestionKind::Single => self.single += 1,
            QuestionKind::Multi => self.multi += 1,
            QuestionKind::Judge => self.judge += 1,
        }
    }
}

/// Per-category totals and practice results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub name: String,
    pub total: usize,
    pub kinds: KindCounts,
    /// Sum of attempts over the category's questions.
    pub answered: u64,
    pub correct: u64,
    /// `None` until the category has been practised.
    pub accuracy: Option<f64>,
}

/// Per-topic coverage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicStats {
    pub topic: Topic,
    pub slug: &'static str,
    pub total: usize,
    /// Distinct questions attempted at least once.
    pub attempted: usize,
    /// Questions currently in the wrong set.
    pub wrong: usize,
    /// `attempted / total` as a percentage.
    pub progress: f64,
    pub has_mnemonic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakCategory {
    pub name: String,
    pub accuracy: f64,
    pub answered: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequentialProgress {
    pub partition: Partition,
    pub position: usize,
    pub total: usize,
    pub progress: f64,
}

/// Cross-partition summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_answered: u64,
    pub total_correct: u64,
    pub accuracy: f64,
    pub wrong_count: usize,
    pub favorites_count: usize,
    /// Lowest accuracy first.
    pub weak_categories: Vec<WeakCategory>,
    pub sequential_progress: Vec<SequentialProgress>,
    /// Most recent mock exams, newest last.
    pub recent_exams: Vec<ExamResult>,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// `(answered, correct)` per category name.
fn category_answers(bank: &Bank, state: &ProgressState) -> HashMap<String, (u64, u64)> {
    let mut answers: HashMap<String, (u64, u64)> = HashMap::new();
    for q in bank.questions() {
        let record = state.attempt(q.id);
        let entry = answers.entry(q.category.clone()).or_default();
        entry.0 += u64::from(record.attempt_count);
        entry.1 += u64::from(record.correct_count());
    }
    answers
}

/// Category breakdown, largest category first.
pub fn category_stats(bank: &Bank, state: &ProgressState) -> Vec<CategoryStats> {
    let mut kinds: BTreeMap<&str, (usize, KindCounts)> = BTreeMap::new();
    for q in bank.questions() {
        let entry = kinds.entry(q.category.as_str()).or_default();
        entry.0 += 1;
        entry.1.add(q.kind);
    }
    let answers = category_answers(bank, state);

    let mut stats: Vec<CategoryStats> = kinds
        .into_iter()
        .map(|(name, (total, kinds))| {
            let (answered, correct) = answers.get(name).copied().unwrap_or_default();
            CategoryStats {
                name: name.to_string(),
                total,
                kinds,
                answered,
                correct,
                accuracy: (answered > 0).then(|| percent(correct, answered)),
            }
        })
        .collect();
    // BTreeMap iteration already orders ties by name.
    stats.sort_by(|a, b| b.total.cmp(&a.total));
    stats
}

/// Coverage of every topic present in the bank, largest first.
pub fn topic_stats(bank: &Bank, state: &ProgressState, mnemonics: &MnemonicTable) -> Vec<TopicStats> {
    let mut counts: BTreeMap<Topic, (usize, usize, usize)> = BTreeMap::new();
    for q in bank.questions() {
        for topic in &q.topics {
            let entry = counts.entry(*topic).or_default();
            entry.0 += 1;
            if state.is_attempted(q.id) {
                entry.1 += 1;
            }
            if state.wrong_set.contains(&q.id) {
                entry.2 += 1;
            }
        }
    }

    let mut stats: Vec<TopicStats> = counts
        .into_iter()
        .map(|(topic, (total, attempted, wrong))| TopicStats {
            topic,
            slug: topic.slug(),
            total,
            attempted,
            wrong,
            progress: percent(attempted as u64, total as u64),
            has_mnemonic: mnemonics.has(topic),
        })
        .collect();
    stats.sort_by(|a, b| b.total.cmp(&a.total));
    stats
}

/// Summary across the given partitions.
pub fn overall_stats(partitions: &[(&Bank, &ProgressState)]) -> OverallStats {
    let mut total_answered = 0;
    let mut total_correct = 0;
    let mut wrong_count = 0;
    let mut favorites_count = 0;
    let mut by_category: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut sequential_progress = Vec::new();
    let mut exams: Vec<ExamResult> = Vec::new();

    for (bank, state) in partitions {
        for record in state.attempts.values() {
            total_answered += u64::from(record.attempt_count);
            total_correct += u64::from(record.correct_count());
        }
        wrong_count += state.wrong_set.len();
        favorites_count += state.favorites.len();

        for (name, (answered, correct)) in category_answers(bank, state) {
            let entry = by_category.entry(name).or_default();
            entry.0 += answered;
            entry.1 += correct;
        }

        if state.sequential_position > 0 {
            let position = state.sequential_position.min(bank.len());
            sequential_progress.push(SequentialProgress {
                partition: bank.partition(),
                position,
                total: bank.len(),
                progress: percent(position as u64, bank.len() as u64),
            });
        }
        exams.extend(state.exam_history.iter().cloned());
    }

    let mut weak_categories: Vec<WeakCategory> = by_category
        .into_iter()
        .filter(|(_, (answered, _))| *answered >= WEAK_MIN_ANSWERS)
        .map(|(name, (answered, correct))| WeakCategory {
            name,
            accuracy: percent(correct, answered),
            answered,
        })
        .filter(|c| c.accuracy < WEAK_ACCURACY)
        .collect();
    weak_categories.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
    weak_categories.truncate(MAX_WEAK_CATEGORIES);

    exams.sort_by_key(|e| e.timestamp);
    let recent_exams = exams.split_off(exams.len().saturating_sub(RECENT_EXAMS));

    OverallStats {
        total_answered,
        total_correct,
        accuracy: percent(total_correct, total_answered),
        wrong_count,
        favorites_count,
        weak_categories,
        sequential_progress,
        recent_exams,
    }
}
