//! Shared fixtures for unit tests.

use std::collections::BTreeSet;

use tempfile::TempDir;

use crate::bank::{Bank, BankLoader};
use crate::model::{AnswerKey, Partition, Question, QuestionId, QuestionKind, Subject, VehicleType};

/// A single-choice question with options A-D and answer A.
pub(crate) fn question(id: u64, category: &str) -> Question {
    Question {
        id: QuestionId(id),
        vehicle_type: VehicleType::C1,
        subject: Subject::One,
        category: category.to_string(),
        topics: BTreeSet::new(),
        kind: QuestionKind::Single,
        content: format!("question {id}"),
        options: ["A", "B", "C", "D"].iter().map(|o| o.to_string()).collect(),
        correct_answer: AnswerKey::Choice(['A'].into_iter().collect()),
        explanation: String::new(),
        image: None,
    }
}

pub(crate) fn bank_with(subject: Subject, questions: Vec<Question>) -> Bank {
    let partition = Partition::new(VehicleType::C1, subject);
    let questions = questions
        .into_iter()
        .map(|mut q| {
            q.subject = subject;
            q
        })
        .collect();
    Bank::new(partition, questions).unwrap()
}

pub(crate) const C1_SUBJECT1: &str = r#"{
  "total": 3,
  "questions": [
    {"id": 10001, "category": "交通信号", "type": "single",
     "question": "这个标志是何含义？", "options": ["停车让行", "减速让行", "会车让行"],
     "answer": "B", "explanation": "减速让行标志。"},
    {"id": 10002, "category": "安全行车", "type": "judge",
     "question": "饮酒后可以驾驶机动车。", "answer": "错",
     "explanation": "饮酒后不得驾驶机动车。"},
    {"id": 10003, "category": "安全行车", "type": "multi",
     "question": "通过无信号路口时，以下哪些做法正确？",
     "options": ["减速慢行", "加速通过", "让右方道路来车先行", "鸣喇叭催促"],
     "answer": "A,C", "topics": ["让行规则"]}
  ]
}"#;

pub(crate) const MNEMONICS: &str = r#"{
  "让行规则": [{"title": "路口让行", "content": "右侧先行，转弯让直行"}],
  "酒驾醉驾": [
    {"title": "酒驾", "content": "喝酒不开车"},
    {"title": "醉驾", "text": "醉驾吊销驾照"}
  ],
  "交通标志": [{"title": "让行标志", "content": "倒三角减速让行"}]
}"#;

pub(crate) fn c1s1() -> Partition {
    Partition::new(VehicleType::C1, Subject::One)
}

/// A data directory holding the c1 subject-1 sample bank and mnemonics.
pub(crate) fn sample_data_dir() -> (TempDir, BankLoader) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("c1_subject1.json"), C1_SUBJECT1).unwrap();
    std::fs::write(dir.path().join("mnemonics.json"), MNEMONICS).unwrap();
    let loader = BankLoader::new(dir.path());
    (dir, loader)
}
