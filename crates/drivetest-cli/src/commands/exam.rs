//! The `drivetest exam` and `drivetest record-exam` commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use drivetest_core::exam::{ExamCoordinator, ExamPhase, ExamSession, PASS_THRESHOLD};
use drivetest_core::model::QuestionId;

use super::output::{print_json, views};
use super::{Context, PartitionArgs};

#[derive(Subcommand, Debug)]
pub enum ExamCommand {
    /// Draw a new exam paper and start a session
    Start {
        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Show the batch waiting to be answered
    Batch {
        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Answer one question of the current batch
    Answer {
        #[command(flatten)]
        partition: PartitionArgs,

        /// Question id
        #[arg(long)]
        id: u64,

        /// Answer, e.g. "B", "A,C" or "对"
        #[arg(long)]
        answer: String,
    },

    /// Show the active session
    Status {
        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Discard the active session without recording it
    Abandon {
        #[command(flatten)]
        partition: PartitionArgs,
    },
}

pub fn execute(ctx: &Context, command: ExamCommand) -> Result<()> {
    let coordinator = ExamCoordinator::new(&ctx.loader, &ctx.store, ctx.config.exam_batch_size);

    match command {
        ExamCommand::Start { partition } => {
            let partition = partition.partition()?;
            let session = coordinator.start(partition, &mut ctx.rng())?;
            let bank = ctx.loader.load(partition)?;
            print_json(&json!({
                "mode": "exam",
                "session": summary(&session),
                "pass_score": PASS_THRESHOLD,
                "time_limit_minutes": partition.subject.time_limit_minutes(),
                "questions": views(&bank, session.current_batch()),
            }))
        }
        ExamCommand::Batch { partition } => {
            let partition = partition.partition()?;
            let ids = coordinator.current_batch(partition)?;
            let bank = ctx.loader.load(partition)?;
            let session = coordinator.status(partition)?;
            print_json(&json!({
                "mode": "exam",
                "session": session.as_ref().map(summary),
                "questions": views(&bank, &ids),
            }))
        }
        ExamCommand::Answer {
            partition,
            id,
            answer,
        } => {
            let partition = partition.partition()?;
            let outcome = coordinator.answer(partition, QuestionId(id), &answer)?;
            let bank = ctx.loader.load(partition)?;
            let next = if outcome.batch_complete {
                views(&bank, &outcome.next_batch)
            } else {
                Vec::new()
            };
            print_json(&json!({
                "result": outcome,
                "next_questions": next,
            }))
        }
        ExamCommand::Status { partition } => {
            let partition = partition.partition()?;
            let session = coordinator.status(partition)?;
            print_json(&json!({
                "partition": partition.key(),
                "session": session.as_ref().map(summary),
            }))
        }
        ExamCommand::Abandon { partition } => {
            let partition = partition.partition()?;
            let abandoned = coordinator.abandon(partition)?;
            print_json(&json!({
                "partition": partition.key(),
                "abandoned": abandoned,
            }))
        }
    }
}

/// Commit a finished session, or an externally computed score when given.
pub fn record(
    ctx: &Context,
    partition: &PartitionArgs,
    score: Option<u32>,
    total: Option<usize>,
) -> Result<()> {
    let partition = partition.partition()?;
    let coordinator = ExamCoordinator::new(&ctx.loader, &ctx.store, ctx.config.exam_batch_size);
    let result = match score {
        Some(score) => coordinator.record_score(
            partition,
            score,
            total.unwrap_or_else(|| partition.subject.exam_size()),
        )?,
        None => coordinator.record_exam(partition)?,
    };
    print_json(&json!({
        "recorded": true,
        "result": result,
    }))
}

fn summary(session: &ExamSession) -> serde_json::Value {
    let (batch_index, finished) = match session.phase {
        ExamPhase::InProgress { batch_index, .. } => (Some(batch_index), false),
        ExamPhase::Finished { .. } => (None, true),
        ExamPhase::NotStarted => (None, false),
    };
    json!({
        "id": session.id,
        "partition": session.partition.key(),
        "phase": session.phase,
        "total_questions": session.question_ids.len(),
        "batch_size": session.batch_size,
        "batch_count": session.batch_count(),
        "batch_index": batch_index,
        "answered": session.answers.len(),
        "correct": session.correct_count(),
        "finished": finished,
        "started_at": session.started_at,
        "deadline": session.deadline(),
    })
}
