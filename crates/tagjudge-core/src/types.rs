//! Core types for Tagjudge

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::AddAssign;

/// Speaker of a conversation turn
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single turn in an interrogation dialogue
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Ordered dialogue owned by one in-flight judgment.
///
/// Only grows. Sharing a prefix between checks goes through `extended`,
/// which copies, so every check starts from the same turns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationContext {
    turns: Vec<Turn>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Copy of this context with `more` appended.
    pub fn extended<'a>(&self, more: impl IntoIterator<Item = &'a Turn>) -> Self {
        let mut turns = self.turns.clone();
        turns.extend(more.into_iter().cloned());
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn assistant_turns(&self) -> Vec<Turn> {
        self.turns.iter().filter(|t| t.is_assistant()).cloned().collect()
    }

    pub fn char_len(&self) -> usize {
        self.turns.iter().map(Turn::char_len).sum()
    }
}

/// A place-of-interest record as delivered by the data loader
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoiRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub poi_type: Option<String>,
    pub mobi_id: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub reviews: [Option<String>; 3],
}

impl PoiRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, poi_type: impl Into<String>) -> Self {
        self.poi_type = Some(poi_type.into());
        self
    }

    pub fn with_review(mut self, index: usize, review: impl Into<String>) -> Self {
        if let Some(slot) = self.reviews.get_mut(index) {
            *slot = Some(review.into());
        }
        self
    }

    /// Text of a searchable field, if present.
    pub fn field(&self, field: EvidenceField) -> Option<&str> {
        match field {
            EvidenceField::Name => Some(self.name.as_str()),
            EvidenceField::Description => self.description.as_deref(),
            EvidenceField::Review0 => self.reviews[0].as_deref(),
            EvidenceField::Review1 => self.reviews[1].as_deref(),
            EvidenceField::Review2 => self.reviews[2].as_deref(),
        }
    }
}

/// Taxonomy label attached to a record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub parent: Option<String>,
    pub name: String,
}

impl Tag {
    pub fn new(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            name: name.into(),
        }
    }
}

/// One (record, tag) pair awaiting judgment
#[derive(Clone, Debug)]
pub struct Sample {
    pub record: PoiRecord,
    pub tag: Tag,
}

/// Record fields searched for evidence, in priority order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceField {
    Name,
    Description,
    Review0,
    Review1,
    Review2,
}

impl EvidenceField {
    pub const PRIORITY: [EvidenceField; 5] = [
        EvidenceField::Name,
        EvidenceField::Description,
        EvidenceField::Review0,
        EvidenceField::Review1,
        EvidenceField::Review2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceField::Name => "name",
            EvidenceField::Description => "description",
            EvidenceField::Review0 => "review0",
            EvidenceField::Review1 => "review1",
            EvidenceField::Review2 => "review2",
        }
    }
}

impl fmt::Display for EvidenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The field and sentence a keyword was found in
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceMatch {
    pub field: EvidenceField,
    pub sentence: String,
}

/// The five interrogation dimensions.
///
/// `ORDER` is both the order checks are asked in and the order causes are reported in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    WrongMeaning,
    Nearby,
    Negative,
    Outdated,
    BadQuality,
}

impl CheckKind {
    pub const ORDER: [CheckKind; 5] = [
        CheckKind::WrongMeaning,
        CheckKind::Nearby,
        CheckKind::Negative,
        CheckKind::Outdated,
        CheckKind::BadQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::WrongMeaning => "wrong_meaning",
            CheckKind::Nearby => "nearby",
            CheckKind::Negative => "negative",
            CheckKind::Outdated => "outdated",
            CheckKind::BadQuality => "bad_quality",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported reason for judging a tag invalid
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    WrongMeaning,
    Nearby,
    Negative,
    Outdated,
    BadQuality,
    Other,
}

impl Cause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cause::WrongMeaning => "wrong_meaning",
            Cause::Nearby => "nearby",
            Cause::Negative => "negative",
            Cause::Outdated => "outdated",
            Cause::BadQuality => "bad_quality",
            Cause::Other => "other",
        }
    }
}

impl From<CheckKind> for Cause {
    fn from(kind: CheckKind) -> Self {
        match kind {
            CheckKind::WrongMeaning => Cause::WrongMeaning,
            CheckKind::Nearby => Cause::Nearby,
            CheckKind::Negative => Cause::Negative,
            CheckKind::Outdated => Cause::Outdated,
            CheckKind::BadQuality => Cause::BadQuality,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical answer extracted from a free-text oracle reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// The extraction step returned something other than yes or no. Keeps the raw token.
    Unparseable(String),
}

impl Answer {
    /// Normalize an extraction reply: trim, lowercase, drop quotes and trailing punctuation.
    pub fn normalize(raw: &str) -> Self {
        let token = raw
            .trim()
            .to_lowercase()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim()
            .to_string();
        match token.as_str() {
            "yes" => Answer::Yes,
            "no" => Answer::No,
            _ => Answer::Unparseable(raw.trim().to_string()),
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Answer::Yes)
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Answer::Unparseable(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
            Answer::Unparseable(_) => "unparseable",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Answer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of one check, with the exchange to keep if it fired
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub answer: Answer,
    /// The question turn and the oracle's reasoning turn for this check.
    pub evidence_turns: Vec<Turn>,
}

impl CheckOutcome {
    pub fn triggered(&self) -> bool {
        self.answer.is_yes()
    }
}

/// Characters sent to and received from the oracle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CharUsage {
    pub input: usize,
    pub output: usize,
}

impl AddAssign for CharUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatus {
    #[default]
    Ok,
    Failed,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Ok => "ok",
            SampleStatus::Failed => "failed",
        }
    }
}

/// Verdict for one (record, tag) pair
#[derive(Clone, Debug, Serialize)]
pub struct JudgmentResult {
    pub record_name: String,
    pub tag: Tag,
    pub evidence: Option<EvidenceMatch>,
    pub causes: Vec<Cause>,
    /// `None` only when no evidence was found or the sample failed.
    pub has_conflict: Option<Answer>,
    /// Oracle-authored turns carrying the reasoning behind the verdict.
    pub retained_turns: Vec<Turn>,
    /// Checks (or `other`) whose extraction answer was neither yes nor no.
    pub unparseable: Vec<String>,
    pub usage: CharUsage,
    pub status: SampleStatus,
    pub error: Option<String>,
}

impl JudgmentResult {
    pub fn no_evidence(record: &PoiRecord, tag: &Tag) -> Self {
        Self {
            record_name: record.name.clone(),
            tag: tag.clone(),
            evidence: None,
            causes: Vec::new(),
            has_conflict: None,
            retained_turns: Vec::new(),
            unparseable: Vec::new(),
            usage: CharUsage::default(),
            status: SampleStatus::Ok,
            error: None,
        }
    }

    pub fn failed(
        record: &PoiRecord,
        tag: &Tag,
        evidence: Option<EvidenceMatch>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            evidence,
            status: SampleStatus::Failed,
            error: Some(error.into()),
            ..Self::no_evidence(record, tag)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == SampleStatus::Failed
    }

    /// Whether the oracle was consulted and produced a verdict.
    pub fn is_judged(&self) -> bool {
        self.evidence.is_some() && !self.is_failed()
    }

    pub fn matched_line(&self) -> Option<&str> {
        self.evidence.as_ref().map(|e| e.sentence.as_str())
    }
}
