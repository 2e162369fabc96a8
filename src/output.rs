//! Result table writer

use crate::config::TestingType;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tagjudge_core::{JudgmentResult, Result, Role};

/// One output row. Field order is column order.
#[derive(Debug, Serialize)]
pub struct OutputRow {
    pub name: String,
    pub matched_line: String,
    pub tag_parent: String,
    pub tag_name: String,
    pub eval_res: String,
    pub has_conflict: String,
    pub causes: String,
    pub status: String,
    pub error: String,
    pub unparseable: String,
}

#[derive(Serialize)]
struct RetainedTurn<'a> {
    role: &'a str,
    content: &'a str,
}

impl OutputRow {
    pub fn from_result(result: &JudgmentResult) -> Result<Self> {
        let eval_res = if result.evidence.is_some() && !result.is_failed() {
            let turns: Vec<RetainedTurn> = result
                .retained_turns
                .iter()
                .filter(|t| t.role == Role::Assistant)
                .map(|t| RetainedTurn {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect();
            serde_json::to_string(&turns)?
        } else {
            String::new()
        };

        Ok(Self {
            name: result.record_name.clone(),
            matched_line: result.matched_line().unwrap_or_default().to_string(),
            tag_parent: result.tag.parent.clone().unwrap_or_default(),
            tag_name: result.tag.name.clone(),
            eval_res,
            has_conflict: result
                .has_conflict
                .as_ref()
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            causes: serde_json::to_string(&result.causes)?,
            status: result.status.as_str().to_string(),
            error: result.error.clone().unwrap_or_default(),
            unparseable: serde_json::to_string(&result.unparseable)?,
        })
    }
}

pub fn output_path(result_dir: &Path, testing_type: TestingType, matched_line_only: bool) -> PathBuf {
    let suffix = if matched_line_only { "_matched_line_only" } else { "" };
    result_dir.join(format!("{}_tag_eval_res{}.csv", testing_type.as_str(), suffix))
}

/// Write every result in order, creating the parent directory if needed.
pub fn write_results(path: &Path, results: &[JudgmentResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for result in results {
        writer.serialize(OutputRow::from_result(result)?)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagjudge_core::*;

    fn judged() -> JudgmentResult {
        let record = PoiRecord::new("Seaside Inn");
        let tag = Tag::new("on site feature", "hot tub");
        JudgmentResult {
            evidence: Some(EvidenceMatch {
                field: EvidenceField::Description,
                sentence: "No hot tub available".into(),
            }),
            causes: vec![Cause::Negative],
            has_conflict: Some(Answer::Yes),
            retained_turns: vec![
                Turn::assistant("What is your question?"),
                Turn::assistant("It says there is no hot tub."),
            ],
            ..JudgmentResult::no_evidence(&record, &tag)
        }
    }

    #[test]
    fn judged_row() {
        let row = OutputRow::from_result(&judged()).unwrap();
        assert_eq!(row.matched_line, "No hot tub available");
        assert_eq!(row.tag_parent, "on site feature");
        assert_eq!(row.has_conflict, "yes");
        assert_eq!(row.causes, r#"["negative"]"#);
        assert_eq!(row.status, "ok");
        let turns: serde_json::Value = serde_json::from_str(&row.eval_res).unwrap();
        assert_eq!(turns[1]["role"], "assistant");
        assert_eq!(turns[1]["content"], "It says there is no hot tub.");
    }

    #[test]
    fn no_evidence_row_has_empty_cells() {
        let record = PoiRecord::new("Motel 9");
        let tag = Tag {
            parent: None,
            name: "pool".into(),
        };
        let row = OutputRow::from_result(&JudgmentResult::no_evidence(&record, &tag)).unwrap();
        assert_eq!(row.matched_line, "");
        assert_eq!(row.tag_parent, "");
        assert_eq!(row.eval_res, "");
        assert_eq!(row.has_conflict, "");
        assert_eq!(row.causes, "[]");
    }

    #[test]
    fn failed_row_carries_error() {
        let record = PoiRecord::new("Inn");
        let tag = Tag::new("p", "spa");
        let result = JudgmentResult::failed(&record, &tag, None, "gave up after 3 attempts");
        let row = OutputRow::from_result(&result).unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.error, "gave up after 3 attempts");
    }

    #[test]
    fn writes_header_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path(&dir.path().join("result"), TestingType::Lodging, true);
        assert!(path.ends_with("lodging_tag_eval_res_matched_line_only.csv"));

        let record = PoiRecord::new("Motel 9");
        let tag = Tag::new("on site feature", "pool");
        write_results(&path, &[judged(), JudgmentResult::no_evidence(&record, &tag)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec![
                "name", "matched_line", "tag_parent", "tag_name", "eval_res",
                "has_conflict", "causes", "status", "error", "unparseable",
            ]
        );
        let names: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(names, vec!["Seaside Inn", "Motel 9"]);
    }
}
