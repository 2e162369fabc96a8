//! Shared dialogue prefix for one (record, tag) judgment

use crate::prompts::PromptSet;
use serde::Serialize;
use tagjudge_core::{ConversationContext, EvidenceMatch, PoiRecord, Result, Tag, Turn};

/// Synthetic assistant turn that makes the next question read as a continuation.
pub const QUESTION_PLACEHOLDER: &str = "What is your question?";

/// What the oracle gets to see of a record. Field order is the serialized key order.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RecordView<'a> {
    Full {
        name: &'a str,
        description: Option<&'a str>,
        #[serde(rename = "type")]
        poi_type: Option<&'a str>,
        review: Option<&'a str>,
        matched_field_name: &'a str,
        matched_line: &'a str,
        matched_field: Option<&'a str>,
    },
    Minimized {
        name: &'a str,
        #[serde(rename = "type")]
        poi_type: Option<&'a str>,
        matched_line: &'a str,
        matched_field: Option<&'a str>,
    },
}

impl<'a> RecordView<'a> {
    /// Full view: description, type and the first review alongside the match.
    pub fn full(record: &'a PoiRecord, evidence: &'a EvidenceMatch) -> Self {
        RecordView::Full {
            name: &record.name,
            description: record.description.as_deref(),
            poi_type: record.poi_type.as_deref(),
            review: record.reviews[0].as_deref(),
            matched_field_name: evidence.field.as_str(),
            matched_line: &evidence.sentence,
            matched_field: record.field(evidence.field),
        }
    }

    /// Minimized view: only what is needed to judge the matched sentence.
    pub fn minimized(record: &'a PoiRecord, evidence: &'a EvidenceMatch) -> Self {
        RecordView::Minimized {
            name: &record.name,
            poi_type: record.poi_type.as_deref(),
            matched_line: &evidence.sentence,
            matched_field: record.field(evidence.field),
        }
    }

    pub fn select(record: &'a PoiRecord, evidence: &'a EvidenceMatch, minimized: bool) -> Self {
        if minimized {
            Self::minimized(record, evidence)
        } else {
            Self::full(record, evidence)
        }
    }
}

/// System instruction, serialized record and tag, then the placeholder assistant turn.
pub fn build_context(view: &RecordView<'_>, tag: &Tag, prompts: &PromptSet) -> Result<ConversationContext> {
    let user = format!(
        "data point: {} \n tag: {}",
        to_pretty_json(view)?,
        to_pretty_json(tag)?
    );

    Ok(ConversationContext::from_turns(vec![
        Turn::system(prompts.system_prompt.clone()),
        Turn::user(user),
        Turn::assistant(QUESTION_PLACEHOLDER),
    ]))
}

/// Four-space indented JSON with non-ASCII text kept as is.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
