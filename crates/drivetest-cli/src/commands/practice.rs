//! Practice modes: `sequential`, `random`, `topic-practice`, `top500`,
//! `hard`, `wrong` and `favorites`.

use std::collections::BTreeSet;

use anyhow::Result;
use serde_json::json;

use drivetest_core::bank::Bank;
use drivetest_core::model::{Partition, QuestionId};
use drivetest_core::progress::{ProgressState, ProgressStore};
use drivetest_core::selection::{self, RandomFilter};
use drivetest_core::topics::Topic;

use super::output::{print_json, review_views, views, ReviewView};
use super::{Context, HintArgs, PartitionArgs};

pub fn sequential(
    ctx: &Context,
    partition: &PartitionArgs,
    count: usize,
    reset: bool,
    advance: Option<usize>,
) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;

    if reset {
        ctx.store.reset_sequential(partition)?;
        return print_json(&json!({
            "mode": "sequential",
            "partition": partition.key(),
            "reset": true,
            "position": 0,
            "total": bank.len(),
        }));
    }

    if let Some(n) = advance {
        let position = ctx
            .store
            .update(partition, |state| Ok(state.advance_sequential(bank.len(), n)))?;
        return print_json(&json!({
            "mode": "sequential",
            "partition": partition.key(),
            "position": position,
            "total": bank.len(),
            "completed": position >= bank.len(),
        }));
    }

    let state = ctx.store.read(partition)?;
    let batch = selection::sequential(&bank, &state, count);
    print_json(&json!({
        "mode": "sequential",
        "partition": partition.key(),
        "position": batch.position,
        "end_position": batch.end_position,
        "total": batch.total,
        "remaining": batch.total - batch.end_position,
        "completed": batch.completed,
        "count": batch.ids.len(),
        "questions": views(&bank, &batch.ids),
    }))
}

pub fn random(
    ctx: &Context,
    partition: &PartitionArgs,
    count: usize,
    category: Option<String>,
    exclude_done: bool,
) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let state = ctx.store.read(partition)?;
    let filter = RandomFilter {
        category,
        exclude_attempted: exclude_done,
    };
    let ids = selection::random(&bank, &state, count, &filter, &mut ctx.rng())?;

    print_json(&json!({
        "mode": "random",
        "partition": partition.key(),
        "category": filter.category,
        "count": ids.len(),
        "questions": views(&bank, &ids),
    }))
}

pub fn topic_practice(
    ctx: &Context,
    partition: &PartitionArgs,
    topic: &str,
    count: usize,
) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let ids = selection::topic_practice(&bank, topic, count, &mut ctx.rng())?;
    let topic: Topic = topic.parse()?;
    let mnemonics = ctx.loader.mnemonics()?.for_topics(&BTreeSet::from([topic]));

    print_json(&json!({
        "mode": "topic_practice",
        "partition": partition.key(),
        "topic": topic,
        "count": ids.len(),
        "mnemonics": mnemonics,
        "questions": views(&bank, &ids),
    }))
}

pub fn top500(ctx: &Context, partition: &PartitionArgs, count: usize) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let state = ctx.store.read(partition)?;
    let batch = selection::top500(&bank, &state, count, ctx.config.top500_target);

    print_json(&json!({
        "mode": "top500",
        "partition": partition.key(),
        "total_selected": batch.total_selected,
        "composition": batch.composition,
        "subset_composition": batch.subset_composition,
        "count": batch.ids.len(),
        "questions": views(&bank, &batch.ids),
    }))
}

pub fn hard(ctx: &Context, partition: &PartitionArgs, count: usize) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let state = ctx.store.read(partition)?;
    let ids = selection::hard(&bank, &state, count, ctx.config.hard_min_attempted)?;

    print_json(&json!({
        "mode": "hard",
        "partition": partition.key(),
        "attempted": state.attempted_count(),
        "count": ids.len(),
        "questions": review_views(&bank, &state, &ids),
    }))
}

#[derive(Clone, Copy)]
pub enum Collection {
    Wrong,
    Favorites,
}

impl Collection {
    fn mode(self) -> &'static str {
        match self {
            Collection::Wrong => "wrong",
            Collection::Favorites => "favorites",
        }
    }
}

/// List the wrong set or favorites, across every partition matching `hint`.
pub fn collection(
    ctx: &Context,
    which: Collection,
    hint: &HintArgs,
    count: Option<usize>,
) -> Result<()> {
    let partitions = ctx.partitions_for(hint.hint()?);
    let mut remaining = count.unwrap_or(usize::MAX);

    // Load everything first so the views can borrow from it.
    let mut loaded = Vec::with_capacity(partitions.len());
    for partition in partitions {
        loaded.push((partition, ctx.loader.load(partition)?, ctx.store.read(partition)?));
    }

    let mut groups = Vec::new();
    for (partition, bank, state) in &loaded {
        if remaining == 0 {
            break;
        }
        let ids = select(which, bank, state, remaining);
        if ids.is_empty() {
            continue;
        }
        remaining -= ids.len();
        groups.push(Group {
            partition: *partition,
            questions: review_views(bank, state, &ids),
        });
    }

    let total: usize = groups.iter().map(|g| g.questions.len()).sum();
    print_json(&json!({
        "mode": which.mode(),
        "count": total,
        "partitions": groups
            .iter()
            .map(|g| json!({ "partition": g.partition.key(), "questions": g.questions }))
            .collect::<Vec<_>>(),
    }))
}

struct Group<'a> {
    partition: Partition,
    questions: Vec<ReviewView<'a>>,
}

fn select(
    which: Collection,
    bank: &Bank,
    state: &ProgressState,
    n: usize,
) -> Vec<QuestionId> {
    match which {
        Collection::Wrong => selection::wrong(bank, state, n),
        Collection::Favorites => selection::favorites(bank, state, n),
    }
}
