//! The `drivetest categories`, `topics` and `stats` commands.

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde_json::json;

use drivetest_core::model::Partition;
use drivetest_core::progress::ProgressStore;
use drivetest_core::statistics::{category_stats, overall_stats, topic_stats};

use super::output::{format_percent, print_json};
use super::{Context, OutputFormat, PartitionArgs};

pub fn categories(ctx: &Context, partition: &PartitionArgs, format: OutputFormat) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let state = ctx.store.read(partition)?;
    let stats = category_stats(&bank, &state);

    if format == OutputFormat::Json {
        return print_json(&json!({
            "partition": partition.key(),
            "categories": stats,
        }));
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Total", "Single", "Multi", "Judge", "Answered", "Accuracy"]);
    for c in &stats {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(c.total),
            Cell::new(c.kinds.single),
            Cell::new(c.kinds.multi),
            Cell::new(c.kinds.judge),
            Cell::new(c.answered),
            Cell::new(c.accuracy.map_or_else(|| "-".to_string(), format_percent)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn topics(ctx: &Context, partition: &PartitionArgs, format: OutputFormat) -> Result<()> {
    let partition = partition.partition()?;
    let bank = ctx.loader.load(partition)?;
    let state = ctx.store.read(partition)?;
    let mnemonics = ctx.loader.mnemonics()?;
    let stats = topic_stats(&bank, &state, &mnemonics);

    if format == OutputFormat::Json {
        return print_json(&json!({
            "partition": partition.key(),
            "topics": stats,
        }));
    }

    let mut table = Table::new();
    table.set_header(vec!["Topic", "Slug", "Total", "Attempted", "Wrong", "Progress", "Mnemonic"]);
    for t in &stats {
        table.add_row(vec![
            Cell::new(t.topic),
            Cell::new(t.slug),
            Cell::new(t.total),
            Cell::new(t.attempted),
            Cell::new(t.wrong),
            Cell::new(format_percent(t.progress)),
            Cell::new(if t.has_mnemonic { "yes" } else { "" }),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn stats(ctx: &Context, format: OutputFormat) -> Result<()> {
    let mut loaded = Vec::new();
    for partition in ctx.loader.available_partitions() {
        loaded.push((ctx.loader.load(partition)?, ctx.store.read(partition)?));
    }
    let pairs: Vec<_> = loaded.iter().map(|(bank, state)| (&**bank, state)).collect();
    let stats = overall_stats(&pairs);

    if format == OutputFormat::Json {
        return print_json(&stats);
    }

    let mut summary = Table::new();
    summary.set_header(vec!["Answered", "Correct", "Accuracy", "Wrong", "Favorites"]);
    summary.add_row(vec![
        Cell::new(stats.total_answered),
        Cell::new(stats.total_correct),
        Cell::new(format_percent(stats.accuracy)),
        Cell::new(stats.wrong_count),
        Cell::new(stats.favorites_count),
    ]);
    println!("{summary}");

    if !stats.weak_categories.is_empty() {
        let mut weak = Table::new();
        weak.set_header(vec!["Weak category", "Answered", "Accuracy"]);
        for c in &stats.weak_categories {
            weak.add_row(vec![
                Cell::new(&c.name),
                Cell::new(c.answered),
                Cell::new(format_percent(c.accuracy)),
            ]);
        }
        println!("{weak}");
    }

    if !stats.recent_exams.is_empty() {
        let mut exams = Table::new();
        exams.set_header(vec!["Date", "Partition", "Score", "Passed"]);
        for e in &stats.recent_exams {
            exams.add_row(vec![
                Cell::new(e.timestamp.format("%Y-%m-%d %H:%M")),
                Cell::new(Partition::new(e.vehicle_type, e.subject)),
                Cell::new(e.score),
                Cell::new(if e.passed { "yes" } else { "no" }),
            ]);
        }
        println!("{exams}");
    }
    Ok(())
}
