use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::{AnswerPolicy, CleanClueRecord, RawClueRecord};
use crate::error::EtlError;

pub const REQUIRED_FIELDS: [&str; 4] = ["rowid", "clue", "answer", "definition"];

const MIN_ANSWER_LEN: usize = 2;

pub fn is_valid_answer(answer: Option<&str>) -> bool {
    match answer {
        Some(answer) => {
            answer.chars().count() >= MIN_ANSWER_LEN && answer.chars().all(char::is_alphabetic)
        }
        None => false,
    }
}

pub fn is_valid_definition(definition: Option<&str>) -> bool {
    definition.is_some()
}

/// Uppercases the answer and keeps only ASCII letters, digits and whitespace.
/// Dashes joining two words become a space.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .to_uppercase()
        .chars()
        .filter_map(|ch| {
            if is_word_joiner(ch) {
                Some(' ')
            } else if ch.is_ascii_alphanumeric() || ch.is_whitespace() {
                Some(ch)
            } else {
                None
            }
        })
        .collect()
}

pub fn normalize_clue(clue: &str) -> String {
    clue.trim().to_string()
}

pub fn normalize_definition(definition: &str) -> String {
    definition.trim().to_string()
}

fn is_word_joiner(ch: char) -> bool {
    matches!(ch, '-' | '\u{2010}' | '\u{2013}' | '\u{2014}')
}

/// Coarse pre-filter applied before normalization: answer present with at
/// least two characters, definition present.
fn passes_filter(record: &RawClueRecord) -> bool {
    record
        .answer
        .as_deref()
        .is_some_and(|answer| answer.chars().count() >= MIN_ANSWER_LEN)
        && is_valid_definition(record.definition.as_deref())
}

/// Decodes the raw download. The top level must be a JSON array.
pub fn parse_raw(bytes: &[u8]) -> Result<Vec<Value>, EtlError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| EtlError::RawDecode(err.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(EtlError::RawNotArray),
    }
}

pub fn project(index: usize, value: &Value) -> Result<RawClueRecord, EtlError> {
    let object = value.as_object().ok_or_else(|| EtlError::RecordShape {
        index,
        reason: format!("expected a JSON object, found {}", json_kind(value)),
    })?;

    for field in REQUIRED_FIELDS {
        if !object.contains_key(field) {
            return Err(EtlError::Schema { index, field });
        }
    }

    let rowid = object["rowid"]
        .as_i64()
        .ok_or_else(|| EtlError::RecordShape {
            index,
            reason: format!(
                "`rowid` must be an integer, found {}",
                json_kind(&object["rowid"])
            ),
        })?;

    Ok(RawClueRecord {
        rowid,
        clue: text_field(index, object, "clue")?,
        answer: text_field(index, object, "answer")?,
        definition: text_field(index, object, "definition")?,
    })
}

fn text_field(
    index: usize,
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, EtlError> {
    match &object[field] {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        other => Err(EtlError::RecordShape {
            index,
            reason: format!(
                "`{field}` must be a string or null, found {}",
                json_kind(other)
            ),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    pub records: Vec<CleanClueRecord>,
    pub raw_count: usize,
    /// Records that passed the pre-filter, before policy checks and dedup.
    pub filtered_count: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner {
    policy: AnswerPolicy,
}

impl Cleaner {
    pub fn new(policy: AnswerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AnswerPolicy {
        self.policy
    }

    pub fn clean(&self, raw: &[Value]) -> Result<CleanOutcome, EtlError> {
        let projected = raw
            .iter()
            .enumerate()
            .map(|(index, value)| project(index, value))
            .collect::<Result<Vec<_>, EtlError>>()?;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut filtered_count = 0usize;
        let mut dropped = 0usize;
        let mut duplicates = 0usize;

        for (index, record) in projected.iter().enumerate() {
            if !passes_filter(record) {
                debug!(rowid = record.rowid, "dropping record with missing answer or definition");
                dropped += 1;
                continue;
            }
            filtered_count += 1;

            let clean = self.normalize(index, record)?;
            if !self.accepts(&clean.answer) {
                debug!(rowid = clean.rowid, answer = %clean.answer, policy = %self.policy, "dropping answer after normalization");
                dropped += 1;
                continue;
            }

            let key = (
                clean.clue.clone(),
                clean.answer.clone(),
                clean.definition.clone(),
            );
            if !seen.insert(key) {
                duplicates += 1;
                continue;
            }
            records.push(clean);
        }

        info!(
            raw = raw.len(),
            kept = records.len(),
            dropped,
            duplicates,
            policy = %self.policy,
            "cleaned dataset"
        );

        Ok(CleanOutcome {
            records,
            raw_count: raw.len(),
            filtered_count,
            dropped,
            duplicates,
        })
    }

    /// Every normalized answer must keep at least two characters; strict mode
    /// also requires it to be purely alphabetic.
    fn accepts(&self, answer: &str) -> bool {
        match self.policy {
            AnswerPolicy::Lenient => answer.chars().count() >= MIN_ANSWER_LEN,
            AnswerPolicy::Strict => is_valid_answer(Some(answer)),
        }
    }

    fn normalize(&self, index: usize, record: &RawClueRecord) -> Result<CleanClueRecord, EtlError> {
        let clue = record.clue.as_deref().ok_or_else(|| EtlError::RecordShape {
            index,
            reason: "`clue` is null".to_string(),
        })?;
        // Both are present once the pre-filter has passed.
        let answer = record.answer.as_deref().unwrap_or_default();
        let definition = record.definition.as_deref().unwrap_or_default();

        Ok(CleanClueRecord {
            rowid: record.rowid,
            clue: normalize_clue(clue),
            answer: normalize_answer(answer),
            definition: normalize_definition(definition),
        })
    }
}

/// Cleans with the default (lenient) answer policy.
pub fn clean_records(raw: &[Value]) -> Result<Vec<CleanClueRecord>, EtlError> {
    Cleaner::default().clean(raw).map(|outcome| outcome.records)
}
