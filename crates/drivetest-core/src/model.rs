//! Core data model types for drivetest.
//!
//! Vehicle types, subjects and partitions identify a question bank; questions
//! are immutable records supplied by the bank files.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::TrainerError;
use crate::topics::Topic;

/// Licence families sharing one question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    /// Small cars (C1/C2/C3).
    C1,
    /// Buses (A1/A3/B1).
    A1,
    /// Trucks (A2/B2).
    A2,
    /// Motorcycles (D/E/F).
    D,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [
        VehicleType::C1,
        VehicleType::A1,
        VehicleType::A2,
        VehicleType::D,
    ];

    /// Lowercase code used in file names.
    pub fn code(self) -> &'static str {
        match self {
            VehicleType::C1 => "c1",
            VehicleType::A1 => "a1",
            VehicleType::A2 => "a2",
            VehicleType::D => "d",
        }
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            VehicleType::C1 => "小车 (C1/C2/C3)",
            VehicleType::A1 => "客车 (A1/A3/B1)",
            VehicleType::A2 => "货车 (A2/B2)",
            VehicleType::D => "摩托车 (D/E/F)",
        }
    }

    /// Licence codes answered by this bank.
    pub fn covers(self) -> &'static [&'static str] {
        match self {
            VehicleType::C1 => &["C1", "C2", "C3"],
            VehicleType::A1 => &["A1", "A3", "B1"],
            VehicleType::A2 => &["A2", "B2"],
            VehicleType::D => &["D", "E", "F"],
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VehicleType {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        VehicleType::ALL
            .into_iter()
            .find(|vt| vt.covers().contains(&key.as_str()))
            .ok_or_else(|| TrainerError::UnknownVehicleType(s.trim().to_string()))
    }
}

/// The two written exam subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Subject {
    One,
    Four,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::One, Subject::Four];

    pub fn number(self) -> u8 {
        match self {
            Subject::One => 1,
            Subject::Four => 4,
        }
    }

    /// Number of questions in a mock exam.
    pub fn exam_size(self) -> usize {
        match self {
            Subject::One => 100,
            Subject::Four => 50,
        }
    }

    /// Official time limit of the exam, in minutes.
    pub fn time_limit_minutes(self) -> u32 {
        match self {
            Subject::One => 45,
            Subject::Four => 30,
        }
    }
}

impl TryFrom<u8> for Subject {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Subject::One),
            4 => Ok(Subject::Four),
            other => Err(format!("unknown subject: {other} (expected 1 or 4)")),
        }
    }
}

impl From<Subject> for u8 {
    fn from(subject: Subject) -> Self {
        subject.number()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("subject").unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .map_err(|_| format!("unknown subject: {trimmed}"))
            .and_then(Subject::try_from)
    }
}

/// The question set of one (vehicle type, subject) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub vehicle_type: VehicleType,
    pub subject: Subject,
}

impl Partition {
    pub fn new(vehicle_type: VehicleType, subject: Subject) -> Self {
        Self {
            vehicle_type,
            subject,
        }
    }

    /// Every partition the trainer knows about, in a fixed order.
    pub fn all() -> impl Iterator<Item = Partition> {
        VehicleType::ALL.into_iter().flat_map(|vt| {
            Subject::ALL
                .into_iter()
                .map(move |subject| Partition::new(vt, subject))
        })
    }

    /// File stem shared by the bank and progress files, e.g. `c1_subject4`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_subject{}", self.vehicle_type, self.subject)
    }
}

/// Question identifier, unique within its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuestionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(QuestionId)
    }
}

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Exactly one option letter.
    Single,
    /// A set of option letters, all required.
    Multi,
    /// True/false.
    Judge,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Single => write!(f, "single"),
            QuestionKind::Multi => write!(f, "multi"),
            QuestionKind::Judge => write!(f, "judge"),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(QuestionKind::Single),
            "multi" | "multiple" => Ok(QuestionKind::Multi),
            "judge" | "boolean" => Ok(QuestionKind::Judge),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A canonical or submitted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// Option letters (one for single choice).
    Choice(BTreeSet<char>),
    /// True/false judgement.
    Judgement(bool),
}

impl AnswerKey {
    /// Parse a bank-supplied answer for a question of the given kind.
    pub fn parse(kind: QuestionKind, raw: &str) -> Option<AnswerKey> {
        match kind {
            QuestionKind::Judge => parse_judgement(raw).map(AnswerKey::Judgement),
            QuestionKind::Single => {
                parse_letters(raw).filter(|letters| letters.len() == 1).map(AnswerKey::Choice)
            }
            QuestionKind::Multi => parse_letters(raw).map(AnswerKey::Choice),
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerKey::Choice(letters) => {
                let joined: Vec<String> = letters.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", joined.join(","))
            }
            AnswerKey::Judgement(true) => write!(f, "对"),
            AnswerKey::Judgement(false) => write!(f, "错"),
        }
    }
}

impl Serialize for AnswerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

const TRUE_TOKENS: &[&str] = &["对", "正确", "√", "✓", "T", "TRUE", "Y", "YES", "RIGHT"];
const FALSE_TOKENS: &[&str] = &["错", "错误", "×", "✗", "F", "FALSE", "N", "NO", "WRONG"];

/// Interpret a true/false token.
pub fn parse_judgement(raw: &str) -> Option<bool> {
    let token = raw.trim().to_uppercase();
    if TRUE_TOKENS.contains(&token.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Interpret a string of option letters such as `"B"`, `"A,C"` or `"a c d"`.
///
/// Separators (`,`, `，`, `、`, whitespace) are ignored and duplicates
/// collapse. Returns `None` for empty input or any other character.
pub fn parse_letters(raw: &str) -> Option<BTreeSet<char>> {
    let mut letters = BTreeSet::new();
    for c in raw.chars() {
        if c.is_whitespace() || matches!(c, ',' | '，' | '、') {
            continue;
        }
        if !c.is_ascii_alphabetic() {
            return None;
        }
        letters.insert(c.to_ascii_uppercase());
    }
    if letters.is_empty() {
        None
    } else {
        Some(letters)
    }
}

/// Letter of the option at `index` (`0` → `'A'`).
pub fn option_letter(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .filter(|b| b.is_ascii_uppercase())
        .map(char::from)
}

/// An immutable exam question.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub vehicle_type: VehicleType,
    pub subject: Subject,
    /// Coarse grouping (chapter).
    pub category: String,
    /// Knowledge tags from the fixed vocabulary.
    pub topics: BTreeSet<Topic>,
    pub kind: QuestionKind,
    pub content: String,
    /// Ordered options; empty for judge questions.
    pub options: Vec<String>,
    pub correct_answer: AnswerKey,
    pub explanation: String,
    pub image: Option<String>,
}

impl Question {
    pub fn partition(&self) -> Partition {
        Partition::new(self.vehicle_type, self.subject)
    }

    /// Returns `true` if `letter` names one of this question's options.
    pub fn has_option(&self, letter: char) -> bool {
        (0..self.options.len()).any(|i| option_letter(i) == Some(letter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_type_aliases() {
        assert_eq!("c1".parse::<VehicleType>().unwrap(), VehicleType::C1);
        assert_eq!("C3".parse::<VehicleType>().unwrap(), VehicleType::C1);
        assert_eq!("b2".parse::<VehicleType>().unwrap(), VehicleType::A2);
        assert_eq!("b1".parse::<VehicleType>().unwrap(), VehicleType::A1);
        assert_eq!(" e ".parse::<VehicleType>().unwrap(), VehicleType::D);
        assert!(matches!(
            "z9".parse::<VehicleType>(),
            Err(TrainerError::UnknownVehicleType(_))
        ));
    }

    #[test]
    fn subject_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Subject::Four).unwrap(), "4");
        let parsed: Subject = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Subject::One);
        assert!(serde_json::from_str::<Subject>("2").is_err());
        assert_eq!("subject4".parse::<Subject>().unwrap(), Subject::Four);
    }

    #[test]
    fn partition_key() {
        let p = Partition::new(VehicleType::A2, Subject::Four);
        assert_eq!(p.key(), "a2_subject4");
        assert_eq!(Partition::all().count(), 8);
    }

    #[test]
    fn letters_parse_with_separators() {
        let expected: BTreeSet<char> = ['A', 'C', 'D'].into_iter().collect();
        assert_eq!(parse_letters("A,C,D"), Some(expected.clone()));
        assert_eq!(parse_letters("d c a"), Some(expected.clone()));
        assert_eq!(parse_letters("a、c，d"), Some(expected));
        assert_eq!(parse_letters("AAB").map(|s| s.len()), Some(2));
        assert_eq!(parse_letters(""), None);
        assert_eq!(parse_letters("A1"), None);
    }

    #[test]
    fn judgement_tokens() {
        assert_eq!(parse_judgement("对"), Some(true));
        assert_eq!(parse_judgement("正确"), Some(true));
        assert_eq!(parse_judgement("true"), Some(true));
        assert_eq!(parse_judgement(" wrong "), Some(false));
        assert_eq!(parse_judgement("错误"), Some(false));
        assert_eq!(parse_judgement("A"), None);
    }

    #[test]
    fn answer_key_display() {
        let key = AnswerKey::parse(QuestionKind::Multi, "B,A").unwrap();
        assert_eq!(key.to_string(), "A,B");
        assert_eq!(AnswerKey::Judgement(false).to_string(), "错");
        assert!(AnswerKey::parse(QuestionKind::Single, "AB").is_none());
    }

    #[test]
    fn option_letters() {
        assert_eq!(option_letter(0), Some('A'));
        assert_eq!(option_letter(3), Some('D'));
        assert_eq!(option_letter(26), None);
    }
}
