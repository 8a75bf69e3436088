//! Mnemonic lookup by topic.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::topics::Topic;

/// A memory aid attached to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mnemonic {
    pub title: String,
    #[serde(default, alias = "text")]
    pub content: String,
}

/// Topic → mnemonics, read from the external mnemonic table.
#[derive(Debug, Clone, Default)]
pub struct MnemonicTable {
    entries: HashMap<Topic, Vec<Mnemonic>>,
}

impl MnemonicTable {
    /// Build a table from raw `label → entries` pairs, skipping unknown labels.
    pub fn from_raw(raw: HashMap<String, Vec<Mnemonic>>) -> Self {
        let mut entries = HashMap::new();
        for (label, list) in raw {
            match label.parse::<Topic>() {
                Ok(topic) => {
                    entries.insert(topic, list);
                }
                Err(_) => tracing::warn!("skipping mnemonics for unknown topic '{label}'"),
            }
        }
        Self { entries }
    }

    pub fn has(&self, topic: Topic) -> bool {
        self.entries.get(&topic).is_some_and(|list| !list.is_empty())
    }

    /// Mnemonics for a set of topics, in vocabulary order, deduplicated by title.
    pub fn for_topics(&self, topics: &BTreeSet<Topic>) -> Vec<Mnemonic> {
        let mut seen = HashSet::new();
        topics
            .iter()
            .filter_map(|t| self.entries.get(t))
            .flatten()
            .filter(|m| seen.insert(m.title.clone()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mnemonic(title: &str) -> Mnemonic {
        Mnemonic {
            title: title.into(),
            content: format!("{title} content"),
        }
    }

    #[test]
    fn lookup_dedupes_by_title() {
        let mut raw = HashMap::new();
        raw.insert("灯光使用".to_string(), vec![mnemonic("会车"), mnemonic("雾灯")]);
        raw.insert("恶劣天气".to_string(), vec![mnemonic("雾灯")]);
        raw.insert("不存在".to_string(), vec![mnemonic("x")]);
        let table = MnemonicTable::from_raw(raw);

        let topics: BTreeSet<Topic> = [Topic::VehicleLights, Topic::SevereWeather]
            .into_iter()
            .collect();
        let found = table.for_topics(&topics);
        assert_eq!(found.len(), 2);
        assert!(table.has(Topic::SevereWeather));
        assert!(!table.has(Topic::Parking));
    }

    #[test]
    fn empty_topics_yield_nothing() {
        let table = MnemonicTable::default();
        assert!(table.for_topics(&BTreeSet::new()).is_empty());
    }
}
