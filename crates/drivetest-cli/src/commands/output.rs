//! JSON rendering shared by the commands.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::Serialize;

use drivetest_core::bank::Bank;
use drivetest_core::model::{Question, QuestionId, QuestionKind, VehicleType};
use drivetest_core::progress::ProgressState;
use drivetest_core::topics::Topic;

/// A question as shown to the learner (no answer or explanation).
#[derive(Debug, Serialize)]
pub struct QuestionView<'a> {
    pub id: QuestionId,
    pub subject: u8,
    pub vehicle_type: VehicleType,
    pub category: &'a str,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: &'a str,
    pub options: &'a [String],
    pub image: Option<&'a str>,
    pub topics: &'a BTreeSet<Topic>,
}

impl<'a> From<&'a Question> for QuestionView<'a> {
    fn from(q: &'a Question) -> Self {
        Self {
            id: q.id,
            subject: q.subject.number(),
            vehicle_type: q.vehicle_type,
            category: &q.category,
            kind: q.kind,
            question: &q.content,
            options: &q.options,
            image: q.image.as_deref(),
            topics: &q.topics,
        }
    }
}

/// A question together with the learner's history on it.
#[derive(Debug, Serialize)]
pub struct ReviewView<'a> {
    #[serde(flatten)]
    pub question: QuestionView<'a>,
    pub attempt_count: u32,
    pub wrong_count: u32,
    pub error_rate: f64,
}

/// Views for `ids`, in order, skipping ids the bank does not hold.
pub fn views<'a>(bank: &'a Bank, ids: &[QuestionId]) -> Vec<QuestionView<'a>> {
    ids.iter()
        .filter_map(|id| bank.get(*id))
        .map(QuestionView::from)
        .collect()
}

pub fn review_views<'a>(
    bank: &'a Bank,
    state: &ProgressState,
    ids: &[QuestionId],
) -> Vec<ReviewView<'a>> {
    ids.iter()
        .filter_map(|id| bank.get(*id))
        .map(|q| {
            let record = state.attempt(q.id);
            ReviewView {
                question: QuestionView::from(q),
                attempt_count: record.attempt_count,
                wrong_count: record.wrong_count,
                error_rate: record.error_rate(),
            }
        })
        .collect()
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}
