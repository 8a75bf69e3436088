//! Question bank loader.
//!
//! Reads one JSON file per partition from the data directory and caches the
//! parsed banks for the lifetime of the loader.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::mnemonics::{Mnemonic, MnemonicTable};
use crate::model::{AnswerKey, Partition, Question, QuestionId, QuestionKind, Subject, VehicleType};
use crate::topics::{self, Topic};

/// Intermediate structure of a bank file.
#[derive(Debug, Deserialize)]
struct BankFile {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    questions: Vec<BankRecord>,
}

#[derive(Debug, Deserialize)]
struct BankRecord {
    id: u64,
    #[serde(default = "default_category")]
    category: String,
    #[serde(rename = "type")]
    kind: String,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

fn default_category() -> String {
    "未分类".to_string()
}

/// The ordered questions of one partition.
#[derive(Debug, Clone)]
pub struct Bank {
    partition: Partition,
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
}

impl Bank {
    /// Build a bank from questions in canonical order.
    ///
    /// Fails if two questions share an id.
    pub fn new(partition: Partition, questions: Vec<Question>) -> Result<Self> {
        Self::build(partition, questions, Path::new(&partition.key()))
    }

    fn build(partition: Partition, questions: Vec<Question>, source: &Path) -> Result<Self> {
        let mut index = HashMap::with_capacity(questions.len());
        for (pos, q) in questions.iter().enumerate() {
            if index.insert(q.id, pos).is_some() {
                return Err(TrainerError::MalformedBank {
                    path: source.to_path_buf(),
                    reason: format!("duplicate question id {}", q.id),
                });
            }
        }
        Ok(Self {
            partition,
            questions,
            index,
        })
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Questions in canonical (sequential practice) order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.index.get(&id).map(|&pos| &self.questions[pos])
    }

    /// Canonical index of a question.
    pub fn position(&self, id: QuestionId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: QuestionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Category names in order of first appearance.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.questions
            .iter()
            .map(|q| q.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }
}

/// Parse a bank JSON document (useful for testing).
pub fn parse_bank_str(content: &str, partition: Partition, source: &Path) -> Result<Bank> {
    let malformed = |reason: String| TrainerError::MalformedBank {
        path: source.to_path_buf(),
        reason,
    };

    let file: BankFile =
        serde_json::from_str(content).map_err(|e| malformed(format!("invalid JSON: {e}")))?;

    if let Some(total) = file.total {
        if total != file.questions.len() {
            tracing::warn!(
                "{}: declares {} questions but contains {}",
                source.display(),
                total,
                file.questions.len()
            );
        }
    }

    let questions = file
        .questions
        .into_iter()
        .map(|r| {
            let kind: QuestionKind = r
                .kind
                .parse()
                .map_err(|e: String| malformed(format!("question {}: {e}", r.id)))?;

            let correct_answer = AnswerKey::parse(kind, &r.answer).ok_or_else(|| {
                malformed(format!("question {}: unusable answer '{}'", r.id, r.answer))
            })?;

            let topics = match r.topics {
                Some(labels) => labels
                    .iter()
                    .map(|l| l.parse::<Topic>())
                    .collect::<Result<BTreeSet<_>>>()
                    .map_err(|e| malformed(format!("question {}: {e}", r.id)))?,
                None => topics::classify(&r.question, &r.options, &r.explanation),
            };

            Ok(Question {
                id: QuestionId(r.id),
                vehicle_type: partition.vehicle_type,
                subject: partition.subject,
                category: r.category,
                topics,
                kind,
                content: r.question,
                options: r.options,
                correct_answer,
                explanation: r.explanation,
                image: r.image.filter(|s| !s.trim().is_empty()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Bank::build(partition, questions, source)
}

/// Restricts a question lookup to some partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionHint {
    pub vehicle_type: Option<VehicleType>,
    pub subject: Option<Subject>,
}

impl PartitionHint {
    pub fn matches(&self, partition: &Partition) -> bool {
        self.vehicle_type.is_none_or(|vt| vt == partition.vehicle_type)
            && self.subject.is_none_or(|s| s == partition.subject)
    }
}

impl From<Partition> for PartitionHint {
    fn from(p: Partition) -> Self {
        Self {
            vehicle_type: Some(p.vehicle_type),
            subject: Some(p.subject),
        }
    }
}

/// Question counts available for a vehicle type.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleCoverage {
    pub vehicle_type: VehicleType,
    pub name: String,
    pub covers: Vec<String>,
    pub subject1: usize,
    pub subject4: usize,
}

/// Loads and caches question banks from a data directory.
pub struct BankLoader {
    data_dir: PathBuf,
    cache: Mutex<HashMap<Partition, Arc<Bank>>>,
    mnemonics: Mutex<Option<Arc<MnemonicTable>>>,
}

impl BankLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: Mutex::new(HashMap::new()),
            mnemonics: Mutex::new(None),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn bank_path(&self, partition: Partition) -> PathBuf {
        self.data_dir.join(format!("{}.json", partition.key()))
    }

    pub fn exists(&self, partition: Partition) -> bool {
        self.bank_path(partition).is_file()
    }

    /// Load a partition's bank, reading the file only on first access.
    pub fn load(&self, partition: Partition) -> Result<Arc<Bank>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bank) = cache.get(&partition) {
            return Ok(Arc::clone(bank));
        }

        let path = self.bank_path(partition);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrainerError::BankNotFound { partition, path });
            }
            Err(e) => return Err(TrainerError::io(path, e)),
        };

        let bank = Arc::new(parse_bank_str(&content, partition, &path)?);
        tracing::debug!("loaded {} questions for {partition}", bank.len());
        cache.insert(partition, Arc::clone(&bank));
        Ok(bank)
    }

    /// Partitions whose bank file is present.
    pub fn available_partitions(&self) -> Vec<Partition> {
        Partition::all().filter(|p| self.exists(*p)).collect()
    }

    /// Question counts per vehicle type and subject (0 when absent).
    pub fn coverage(&self) -> Result<Vec<VehicleCoverage>> {
        let count = |p: Partition| -> Result<usize> {
            if self.exists(p) {
                Ok(self.load(p)?.len())
            } else {
                Ok(0)
            }
        };

        VehicleType::ALL
            .into_iter()
            .map(|vt| {
                Ok(VehicleCoverage {
                    vehicle_type: vt,
                    name: vt.label().to_string(),
                    covers: vt.covers().iter().map(|c| c.to_string()).collect(),
                    subject1: count(Partition::new(vt, Subject::One))?,
                    subject4: count(Partition::new(vt, Subject::Four))?,
                })
            })
            .collect()
    }

    /// Find the single bank containing `id` among the hinted partitions.
    ///
    /// Malformed banks are skipped. If `id` is found nowhere else, the first
    /// skipped bank's error is returned instead of `QuestionNotFound`.
    pub fn locate(&self, id: QuestionId, hint: PartitionHint) -> Result<Arc<Bank>> {
        let mut matches = Vec::new();
        let mut skipped = None;
        for partition in self.available_partitions() {
            if !hint.matches(&partition) {
                continue;
            }
            let bank = match self.load(partition) {
                Ok(bank) => bank,
                Err(e @ TrainerError::MalformedBank { .. }) => {
                    tracing::warn!("skipping {partition} while looking up {id}: {e}");
                    if skipped.is_none() {
                        skipped = Some(e);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            if bank.contains(id) {
                matches.push(bank);
            }
        }

        match matches.len() {
            0 => Err(skipped.unwrap_or(TrainerError::QuestionNotFound(id))),
            1 => Ok(matches.remove(0)),
            _ => Err(TrainerError::AmbiguousQuestion {
                id,
                partitions: matches.iter().map(|b| b.partition()).collect(),
            }),
        }
    }

    /// The mnemonic table (empty when the data directory has none).
    pub fn mnemonics(&self) -> Result<Arc<MnemonicTable>> {
        let mut slot = self.mnemonics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(table) = slot.as_ref() {
            return Ok(Arc::clone(table));
        }

        let path = self.data_dir.join("mnemonics.json");
        let table = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let raw: HashMap<String, Vec<Mnemonic>> =
                    serde_json::from_str(&content).map_err(|e| TrainerError::MalformedBank {
                        path: path.clone(),
                        reason: format!("invalid mnemonic table: {e}"),
                    })?;
                MnemonicTable::from_raw(raw)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MnemonicTable::default(),
            Err(e) => return Err(TrainerError::io(path, e)),
        };

        let table = Arc::new(table);
        *slot = Some(Arc::clone(&table));
        Ok(table)
    }
}
