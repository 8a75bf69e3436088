pub mod check;
pub mod exam;
pub mod introspect;
pub mod output;
pub mod practice;
pub mod vtypes;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;

use drivetest_core::bank::{BankLoader, PartitionHint};
use drivetest_core::config::{load_config_from, TrainerConfig};
use drivetest_core::model::{Partition, Subject, VehicleType};
use drivetest_store::FileProgressStore;

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the question banks
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding progress files
    #[arg(long, global = true)]
    pub progress_dir: Option<PathBuf>,

    /// Seed for random selection (repeatable output)
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

/// A required partition.
#[derive(Args, Debug, Clone)]
pub struct PartitionArgs {
    /// Subject: 1 or 4
    #[arg(long, value_parser = parse_subject)]
    pub subject: Subject,

    /// Vehicle type: c1 (car), a1 (bus), a2 (truck), d (motorcycle)
    #[arg(long, default_value = "c1")]
    pub vtype: String,
}

impl PartitionArgs {
    pub fn partition(&self) -> Result<Partition> {
        let vehicle_type: VehicleType = self.vtype.parse()?;
        Ok(Partition::new(vehicle_type, self.subject))
    }
}

/// An optional partition restriction for id lookups.
#[derive(Args, Debug, Clone)]
pub struct HintArgs {
    /// Only look in this subject
    #[arg(long, value_parser = parse_subject)]
    pub subject: Option<Subject>,

    /// Only look in this vehicle type
    #[arg(long)]
    pub vtype: Option<String>,
}

impl HintArgs {
    pub fn hint(&self) -> Result<PartitionHint> {
        let vehicle_type = self
            .vtype
            .as_deref()
            .map(str::parse::<VehicleType>)
            .transpose()?;
        Ok(PartitionHint {
            vehicle_type,
            subject: self.subject,
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

fn parse_subject(raw: &str) -> Result<Subject, String> {
    raw.parse()
}

/// Resolved configuration plus the bank loader and progress store built
/// from it.
pub struct Context {
    pub config: TrainerConfig,
    pub loader: BankLoader,
    pub store: FileProgressStore,
    seed: Option<u64>,
}

impl Context {
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let mut config = load_config_from(args.config.as_deref())?;
        if let Some(dir) = &args.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &args.progress_dir {
            config.progress_dir = dir.clone();
        }
        tracing::debug!(
            "data dir {}, progress dir {}",
            config.data_dir.display(),
            config.progress_dir.display()
        );

        let loader = BankLoader::new(&config.data_dir);
        let store = FileProgressStore::new(&config.progress_dir)
            .with_lock_timeout(Duration::from_millis(config.lock_timeout_ms));
        Ok(Self {
            config,
            loader,
            store,
            seed: args.seed,
        })
    }

    /// Seeded RNG when `--seed` was given, OS entropy otherwise.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Available partitions matching `hint`.
    pub fn partitions_for(&self, hint: PartitionHint) -> Vec<Partition> {
        self.loader
            .available_partitions()
            .into_iter()
            .filter(|p| hint.matches(p))
            .collect()
    }
}
