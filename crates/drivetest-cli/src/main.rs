//! drivetest CLI — the user-facing command-line interface.
//!
//! Every command prints one JSON document on stdout; failures print
//! `{"error": <kind>, "message": ...}` so a front end can branch on them.

use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;

use drivetest_core::error::TrainerError;

mod commands;

use commands::exam::ExamCommand;
use commands::practice::Collection;
use commands::{Context, GlobalArgs, HintArgs, OutputFormat, PartitionArgs};

#[derive(Parser)]
#[command(name = "drivetest", version, about = "Driving-test practice trainer")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicle types and their bank sizes
    Vtypes {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Next questions in bank order (resumes where you left off)
    Sequential {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, default_value = "5")]
        count: usize,

        /// Move the cursor back to the first question
        #[arg(long)]
        reset: bool,

        /// Confirm N delivered questions and move the cursor past them
        #[arg(long, conflicts_with = "reset")]
        advance: Option<usize>,
    },

    /// Random questions
    Random {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, default_value = "5")]
        count: usize,

        /// Restrict to one category
        #[arg(long)]
        category: Option<String>,

        /// Skip questions already attempted
        #[arg(long)]
        exclude_done: bool,
    },

    /// Random questions tagged with a topic
    TopicPractice {
        #[command(flatten)]
        partition: PartitionArgs,

        /// Topic label (e.g. 灯光使用) or slug (e.g. vehicle_lights)
        #[arg(long)]
        topic: String,

        #[arg(long, default_value = "5")]
        count: usize,
    },

    /// Curated subset: wrong first, then unseen, then mastered
    Top500 {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, default_value = "5")]
        count: usize,
    },

    /// Questions you get wrong most often
    Hard {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Questions whose latest answer was wrong
    Wrong {
        #[command(flatten)]
        hint: HintArgs,

        #[arg(long)]
        count: Option<usize>,
    },

    /// Favorited questions
    Favorites {
        #[command(flatten)]
        hint: HintArgs,

        #[arg(long)]
        count: Option<usize>,
    },

    /// Categories of a bank with practice results
    Categories {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Topics of a bank with coverage
    Topics {
        #[command(flatten)]
        partition: PartitionArgs,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Check an answer and record the attempt
    Check {
        /// Question id
        #[arg(long)]
        id: u64,

        /// Answer, e.g. "B", "A,C" or "对"
        #[arg(long)]
        answer: String,

        #[command(flatten)]
        hint: HintArgs,
    },

    /// Add a question to favorites
    Favorite {
        #[arg(long)]
        id: u64,

        #[command(flatten)]
        hint: HintArgs,
    },

    /// Remove a question from favorites
    Unfavorite {
        #[arg(long)]
        id: u64,

        #[command(flatten)]
        hint: HintArgs,
    },

    /// Mock exam sessions
    Exam {
        #[command(subcommand)]
        command: ExamCommand,
    },

    /// Record the finished exam, or an external score with --score
    RecordExam {
        #[command(flatten)]
        partition: PartitionArgs,

        /// Score out of 100
        #[arg(long)]
        score: Option<u32>,

        /// Number of questions in the exam
        #[arg(long, requires = "score")]
        total: Option<usize>,
    },

    /// Practice statistics across all banks
    Stats {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "drivetest=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = Context::load(&cli.global).and_then(|ctx| run(&ctx, cli.command));

    if let Err(e) = result {
        let (kind, code) = match e.downcast_ref::<TrainerError>() {
            Some(err) if err.is_retryable() => (err.kind(), 2),
            Some(err) => (err.kind(), 1),
            None => ("internal", 1),
        };
        println!(
            "{}",
            json!({ "error": kind, "message": format!("{e:#}") })
        );
        eprintln!("Error: {e:#}");
        process::exit(code);
    }
}

fn run(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Vtypes { format } => commands::vtypes::execute(ctx, format),
        Commands::Sequential {
            partition,
            count,
            reset,
            advance,
        } => commands::practice::sequential(ctx, &partition, count, reset, advance),
        Commands::Random {
            partition,
            count,
            category,
            exclude_done,
        } => commands::practice::random(ctx, &partition, count, category, exclude_done),
        Commands::TopicPractice {
            partition,
            topic,
            count,
        } => commands::practice::topic_practice(ctx, &partition, &topic, count),
        Commands::Top500 { partition, count } => commands::practice::top500(ctx, &partition, count),
        Commands::Hard { partition, count } => commands::practice::hard(ctx, &partition, count),
        Commands::Wrong { hint, count } => {
            commands::practice::collection(ctx, Collection::Wrong, &hint, count)
        }
        Commands::Favorites { hint, count } => {
            commands::practice::collection(ctx, Collection::Favorites, &hint, count)
        }
        Commands::Categories { partition, format } => {
            commands::introspect::categories(ctx, &partition, format)
        }
        Commands::Topics { partition, format } => {
            commands::introspect::topics(ctx, &partition, format)
        }
        Commands::Check { id, answer, hint } => commands::check::execute(ctx, id, &answer, &hint),
        Commands::Favorite { id, hint } => commands::check::favorite(ctx, id, &hint, true),
        Commands::Unfavorite { id, hint } => commands::check::favorite(ctx, id, &hint, false),
        Commands::Exam { command } => commands::exam::execute(ctx, command),
        Commands::RecordExam {
            partition,
            score,
            total,
        } => commands::exam::record(ctx, &partition, score, total),
        Commands::Stats { format } => commands::introspect::stats(ctx, format),
    }
}
