//! Tests for the judgment engine against a scripted oracle

use std::collections::HashMap;
use std::sync::Arc;
use tagjudge_core::*;
use tagjudge_engine::*;
use tagjudge_llm::mock::transient_error;
use tagjudge_llm::{LlmError, LlmRequest, MockProvider, ResilientProvider, RetryPolicy};

const EXTRACT: &str = "EXTRACT";

fn prompts() -> PromptSet {
    PromptSet {
        system_prompt: "SYSTEM".into(),
        extract_answer: EXTRACT.into(),
        wrong_meaning: "Q:wrong_meaning".into(),
        nearby: "Q:nearby".into(),
        negative: "Q:negative".into(),
        outdated_relevancy: "Q:outdated".into(),
        bad_quality: "Q:bad_quality".into(),
        other: "Q:other".into(),
    }
}

/// Free-text replies end in "VERDICT: <token>"; the extraction step echoes the token.
/// Questions not listed in `verdicts` get "no".
fn scripted(verdicts: &[(&str, &str)]) -> Arc<MockProvider> {
    scripted_for(None, verdicts)
}

/// Like `scripted`, but `verdicts` only apply when the data point names `record`.
/// Every other record gets "no" throughout.
fn scripted_for(record: Option<&str>, verdicts: &[(&str, &str)]) -> Arc<MockProvider> {
    let verdicts: HashMap<String, String> = verdicts
        .iter()
        .map(|(q, v)| (format!("Q:{}", q), v.to_string()))
        .collect();
    let record = record.map(|name| format!("\"name\": \"{}\"", name));
    Arc::new(MockProvider::from_fn(move |req: &LlmRequest| {
        let last = req.last_user_content().unwrap_or_default();
        if let Some(reply) = last.strip_prefix(&format!("{}\n", EXTRACT)) {
            let token = reply.rsplit("VERDICT: ").next().unwrap_or("");
            return Ok(match token {
                "yes" => "Yes.".to_string(),
                "no" => "no".to_string(),
                other => format!("unsure ({})", other),
            });
        }
        let applies = match &record {
            Some(marker) => req.messages.iter().any(|m| m.content.contains(marker.as_str())),
            None => true,
        };
        let verdict = if applies {
            verdicts.get(last).map(String::as_str).unwrap_or("no")
        } else {
            "no"
        };
        Ok(format!("Reasoning about {}. VERDICT: {}", last, verdict))
    }))
}

fn engine(oracle: Arc<dyn tagjudge_llm::LlmProvider>, minimized: bool) -> JudgmentEngine {
    JudgmentEngine::new(
        oracle,
        Arc::new(prompts()),
        EngineConfig {
            model: "mock".into(),
            minimized_view: minimized,
        },
    )
}

fn seaside() -> (PoiRecord, Tag) {
    (
        PoiRecord::new("Seaside Inn")
            .with_type("lodging")
            .with_description("No hot tub available.")
            .with_review(0, ""),
        Tag::new("on site feature", "hot tub"),
    )
}

fn a_frame() -> (PoiRecord, Tag) {
    (
        PoiRecord::new("A Frame Cabin").with_description("A Frame Cabin"),
        Tag::new("architecture style", "A Frame"),
    )
}

fn contents(turns: &[Turn]) -> Vec<&str> {
    turns.iter().map(|t| t.content.as_str()).collect()
}

// ===========================================================================
// End-to-end examples
// ===========================================================================

#[tokio::test]
async fn negated_feature_is_a_negative_conflict() {
    let oracle = scripted(&[("negative", "yes")]);
    let (record, tag) = seaside();
    let result = engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let evidence = result.evidence.clone().unwrap();
    assert_eq!(evidence.field, EvidenceField::Description);
    assert_eq!(evidence.sentence, "No hot tub available");
    assert_eq!(result.causes, vec![Cause::Negative]);
    assert_eq!(result.has_conflict, Some(Answer::Yes));
    assert_eq!(result.status, SampleStatus::Ok);
    // five checks, two calls each, no fallback
    assert_eq!(oracle.call_count().await, 10);
    assert_eq!(
        contents(&result.retained_turns),
        vec!["What is your question?", "Reasoning about Q:negative. VERDICT: yes"]
    );
}

#[tokio::test]
async fn valid_tag_passes_every_check_and_the_fallback() {
    let oracle = scripted(&[]);
    let (record, tag) = a_frame();
    let result = engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let evidence = result.evidence.clone().unwrap();
    assert_eq!(evidence.field, EvidenceField::Name);
    assert_eq!(evidence.sentence, "A Frame Cabin");
    assert!(result.causes.is_empty());
    assert_eq!(result.has_conflict, Some(Answer::No));
    assert_eq!(oracle.call_count().await, 12);
    // placeholder, five check replies, fallback reply
    assert_eq!(result.retained_turns.len(), 7);
    assert!(result.retained_turns.iter().all(Turn::is_assistant));
    assert_eq!(
        result.retained_turns.last().unwrap().content,
        "Reasoning about Q:other. VERDICT: no"
    );
}

// ===========================================================================
// Aggregation
// ===========================================================================

#[tokio::test]
async fn causes_follow_check_order() {
    let oracle = scripted(&[("negative", "yes"), ("nearby", "yes")]);
    let (record, tag) = seaside();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;

    assert_eq!(result.causes, vec![Cause::Nearby, Cause::Negative]);
    assert_eq!(result.has_conflict, Some(Answer::Yes));
    assert_eq!(
        contents(&result.retained_turns),
        vec![
            "What is your question?",
            "Reasoning about Q:nearby. VERDICT: yes",
            "Reasoning about Q:negative. VERDICT: yes",
        ]
    );
}

#[tokio::test]
async fn every_check_can_fire_at_once() {
    let oracle = scripted(&[
        ("bad_quality", "yes"),
        ("outdated", "yes"),
        ("negative", "yes"),
        ("nearby", "yes"),
        ("wrong_meaning", "yes"),
    ]);
    let (record, tag) = seaside();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;
    let names: Vec<_> = result.causes.iter().map(Cause::as_str).collect();
    assert_eq!(
        names,
        vec!["wrong_meaning", "nearby", "negative", "outdated", "bad_quality"]
    );
}

#[tokio::test]
async fn fallback_yes_reports_other() {
    let oracle = scripted(&[("other", "yes")]);
    let (record, tag) = a_frame();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;

    assert_eq!(result.causes, vec![Cause::Other]);
    assert_eq!(result.has_conflict, Some(Answer::Yes));
}

#[tokio::test]
async fn fallback_is_asked_only_when_no_check_fires() {
    let (record, tag) = seaside();
    let evidence = EvidenceLocator::new().locate(&tag.name, &record).unwrap();
    let prompts = prompts();
    let base = build_context(&RecordView::full(&record, &evidence), &tag, &prompts).unwrap();

    let quiet = Interrogator::new(scripted(&[]), Arc::new(prompts.clone()), "mock");
    let verdict = quiet.judge(&base).await.unwrap();
    assert!(verdict.fallback_asked);
    assert_eq!(verdict.has_conflict, Answer::No);

    let firing = Interrogator::new(scripted(&[("outdated", "yes")]), Arc::new(prompts), "mock");
    let verdict = firing.judge(&base).await.unwrap();
    assert!(!verdict.fallback_asked);
    assert_eq!(verdict.causes, vec![Cause::Outdated]);
}

#[tokio::test]
async fn conflict_iff_causes_over_many_scripts() {
    let scripts: Vec<Vec<(&str, &str)>> = vec![
        vec![],
        vec![("other", "yes")],
        vec![("wrong_meaning", "yes")],
        vec![("outdated", "yes"), ("other", "yes")],
        vec![("bad_quality", "yes")],
    ];
    for script in scripts {
        let (record, tag) = seaside();
        let result = engine(scripted(&script), false).judge_sample(&record, &tag).await;
        assert_eq!(
            !result.causes.is_empty(),
            result.has_conflict == Some(Answer::Yes),
            "script {:?}",
            script
        );
    }
}

// ===========================================================================
// Protocol shape
// ===========================================================================

#[tokio::test]
async fn checks_start_from_the_same_prefix() {
    let oracle = scripted(&[]);
    let (record, tag) = seaside();
    engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let requests = oracle.requests().await;
    let questions: Vec<&LlmRequest> = requests
        .iter()
        .filter(|r| r.messages.len() == 4)
        .collect();
    assert_eq!(questions.len(), 5);

    let prefix = &questions[0].messages[..3];
    for q in &questions {
        assert_eq!(&q.messages[..3], prefix);
    }
    let asked: Vec<_> = questions.iter().filter_map(|q| q.last_user_content()).collect();
    assert_eq!(
        asked,
        vec!["Q:wrong_meaning", "Q:nearby", "Q:negative", "Q:outdated", "Q:bad_quality"]
    );
}

#[tokio::test]
async fn extraction_requests_are_standalone() {
    let oracle = scripted(&[]);
    let (record, tag) = seaside();
    engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let requests = oracle.requests().await;
    let extractions: Vec<_> = requests
        .iter()
        .filter(|r| r.messages.len() == 1)
        .collect();
    assert_eq!(extractions.len(), 6);
    for r in extractions {
        assert_eq!(r.messages[0].role, "user");
        assert!(r.messages[0].content.starts_with("EXTRACT\nReasoning about"));
    }
}

#[tokio::test]
async fn fallback_sees_all_five_exchanges_in_order() {
    let oracle = scripted(&[]);
    let (record, tag) = seaside();
    engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let requests = oracle.requests().await;
    let fallback = requests
        .iter()
        .find(|r| r.last_user_content() == Some("Q:other"))
        .unwrap();
    // base (3) + five exchanges (10) + fallback question
    assert_eq!(fallback.messages.len(), 14);
    let questions: Vec<_> = fallback.messages[3..13]
        .iter()
        .step_by(2)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        questions,
        vec!["Q:wrong_meaning", "Q:nearby", "Q:negative", "Q:outdated", "Q:bad_quality"]
    );
    assert!(fallback.messages[4..13].iter().step_by(2).all(|m| m.role == "assistant"));
}

#[tokio::test]
async fn usage_is_counted() {
    let oracle = scripted(&[("negative", "yes")]);
    let (record, tag) = seaside();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;
    assert!(result.usage.input > 0);
    assert!(result.usage.output > 0);
    assert!(result.usage.input > result.usage.output);
}

// ===========================================================================
// Record views
// ===========================================================================

#[tokio::test]
async fn minimized_view_hides_description_from_the_oracle() {
    let oracle = scripted(&[]);
    let (record, tag) = seaside();
    engine(oracle.clone(), true).judge_sample(&record, &tag).await;

    let first = &oracle.requests().await[0];
    let data = &first.messages[1].content;
    assert!(data.contains("\"matched_line\": \"No hot tub available\""));
    assert!(!data.contains("\"description\""));
    assert!(!data.contains("\"review\""));
}

#[tokio::test]
async fn full_view_includes_description() {
    let oracle = scripted(&[]);
    let (record, tag) = seaside();
    engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    let first = &oracle.requests().await[0];
    assert!(first.messages[1].content.contains("\"description\": \"No hot tub available.\""));
    assert!(first.messages[1].content.contains("\"matched_field_name\": \"description\""));
}

// ===========================================================================
// No evidence / malformed answers / failures
// ===========================================================================

#[tokio::test]
async fn no_evidence_never_calls_the_oracle() {
    let oracle = scripted(&[]);
    let record = PoiRecord::new("Motel 9").with_description("carpool available");
    let tag = Tag::new("on site feature", "pool");
    let result = engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    assert!(result.evidence.is_none());
    assert!(result.has_conflict.is_none());
    assert!(result.causes.is_empty());
    assert!(result.retained_turns.is_empty());
    assert_eq!(oracle.call_count().await, 0);
}

#[tokio::test]
async fn unparseable_check_is_reported_not_coerced() {
    let oracle = scripted(&[("negative", "perhaps")]);
    let (record, tag) = seaside();
    let result = engine(oracle.clone(), false).judge_sample(&record, &tag).await;

    assert!(result.causes.is_empty());
    assert_eq!(result.unparseable, vec!["negative".to_string()]);
    // nothing fired, so the fallback was asked
    assert_eq!(oracle.call_count().await, 12);
    assert_eq!(result.has_conflict, Some(Answer::No));
}

#[tokio::test]
async fn unparseable_fallback_surfaces_in_has_conflict() {
    let oracle = scripted(&[("other", "perhaps")]);
    let (record, tag) = a_frame();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;

    assert!(result.causes.is_empty());
    assert!(matches!(result.has_conflict, Some(Answer::Unparseable(_))));
    assert_eq!(result.unparseable, vec!["other".to_string()]);
}

#[tokio::test]
async fn oracle_failure_marks_sample_failed() {
    let oracle = Arc::new(
        MockProvider::constant("no").fail_first(vec![LlmError::AuthFailed("bad key".into())]),
    );
    let (record, tag) = seaside();
    let result = engine(oracle, false).judge_sample(&record, &tag).await;

    assert!(result.is_failed());
    assert!(result.evidence.is_some());
    assert!(result.has_conflict.is_none());
    assert!(result.error.unwrap().contains("bad key"));
}

#[tokio::test]
async fn transient_failures_are_retried_through_the_wrapper() {
    let scripted_oracle = scripted(&[("negative", "yes")]);
    let flaky = Arc::new(ResilientProvider::new(
        Arc::new(FlakyOnce::new(scripted_oracle)),
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
            multiplier: 1.0,
            max_backoff_ms: 1,
            timeout_ms: 1_000,
        },
        4,
    ));
    let (record, tag) = seaside();
    let result = engine(flaky, false).judge_sample(&record, &tag).await;

    assert_eq!(result.status, SampleStatus::Ok);
    assert_eq!(result.causes, vec![Cause::Negative]);
}

/// Fails the first call with a transient error, then delegates.
struct FlakyOnce {
    inner: Arc<MockProvider>,
    failed: std::sync::atomic::AtomicBool,
}

impl FlakyOnce {
    fn new(inner: Arc<MockProvider>) -> Self {
        Self {
            inner,
            failed: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl tagjudge_llm::LlmProvider for FlakyOnce {
    fn name(&self) -> &str {
        "flaky"
    }

    fn models(&self) -> &[&str] {
        &["mock"]
    }

    async fn complete(&self, request: LlmRequest) -> tagjudge_llm::LlmResult<String> {
        if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Err(transient_error());
        }
        self.inner.complete(request).await
    }
}

// ===========================================================================
// Batch
// ===========================================================================

#[tokio::test]
async fn batch_keeps_order_and_counts_outcomes() {
    let oracle = scripted_for(Some("Seaside Inn"), &[("negative", "yes")]);
    let engine = Arc::new(engine(oracle, false));

    let (seaside_record, seaside_tag) = seaside();
    let (frame_record, frame_tag) = a_frame();
    let samples = vec![
        Sample { record: seaside_record, tag: seaside_tag },
        Sample {
            record: PoiRecord::new("Motel 9"),
            tag: Tag::new("on site feature", "pool"),
        },
        Sample { record: frame_record, tag: frame_tag },
    ];

    let report = BatchRunner::new(engine, 2)
        .with_progress_every(1)
        .run(samples)
        .await;

    let names: Vec<_> = report.results.iter().map(|r| r.record_name.as_str()).collect();
    assert_eq!(names, vec!["Seaside Inn", "Motel 9", "A Frame Cabin"]);
    assert_eq!(report.total(), 3);
    assert_eq!(report.judged(), 2);
    assert_eq!(report.without_evidence(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.conflicts(), 1);
    assert_eq!(report.results[0].causes, vec![Cause::Negative]);
    assert_eq!(report.results[0].has_conflict, Some(Answer::Yes));
    assert!(report.results[1].has_conflict.is_none());
    assert_eq!(report.results[2].has_conflict, Some(Answer::No));
    assert!(report.results[2].causes.is_empty());
    assert_eq!(report.usage().len(), 2);
    assert!(report.cost(&Pricing::default()).per_sample_usd > 0.0);
}

#[tokio::test]
async fn batch_records_failures_without_dropping_samples() {
    let oracle = Arc::new(MockProvider::from_fn(|_| {
        Err(LlmError::InvalidResponse("garbled".into()))
    }));
    let engine = Arc::new(engine(oracle, false));
    let samples: Vec<Sample> = (0..4)
        .map(|_| {
            let (record, tag) = seaside();
            Sample { record, tag }
        })
        .collect();

    let report = BatchRunner::new(engine, 3).run(samples).await;
    assert_eq!(report.total(), 4);
    assert_eq!(report.failed(), 4);
    assert!(report.usage().is_empty());
}
