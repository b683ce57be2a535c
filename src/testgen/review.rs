// src/testgen/review.rs
//
// Review driver: one structured LLM judgment per test, paired with the
// outcome the test produced when it was run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::detectors::ast::spans::{extract_test_spans_from_file, TestSpan};
use crate::error::Result;
use crate::executor::run::run_bounded;
use crate::llm::backend::{complete_structured, Completion, ResponseSchema};
use crate::llm::prompt::review_prompt;
use crate::testgen::report::{ExecutionOutcome, ExecutionReport, OutcomeCounts};
use crate::testgen::runner::collect_outcomes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    #[serde(alias = "okay")]
    pub acceptable: bool,
    #[serde(default, alias = "issue")]
    pub diagnosis: String,
    #[serde(default, alias = "fix")]
    pub remedy: String,
}

impl ReviewVerdict {
    pub fn is_defective(&self) -> bool {
        !self.acceptable
    }

    /// Defective, but missing the explanation a repair needs.
    pub fn is_incomplete(&self) -> bool {
        self.is_defective() && (self.diagnosis.trim().is_empty() || self.remedy.trim().is_empty())
    }
}

pub fn verdict_schema() -> ResponseSchema {
    ResponseSchema {
        name: "review_verdict",
        schema: json!({
            "type": "object",
            "properties": {
                "acceptable": { "type": "boolean" },
                "diagnosis": { "type": "string" },
                "remedy": { "type": "string" }
            },
            "required": ["acceptable", "diagnosis", "remedy"],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub reviewed: usize,
    pub acceptable: usize,
    pub defective: usize,
    /// Defective verdicts lacking a diagnosis or remedy.
    pub incomplete: usize,
    /// Requests that produced no verdict at all.
    pub missing: usize,
    pub execution: OutcomeCounts,
}

/// What `review` prints and `improve` reads back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub test_file: String,
    #[serde(default)]
    pub summary: ReviewSummary,
    pub reviews: BTreeMap<String, Option<ReviewVerdict>>,
}

impl ReviewReport {
    /// Verdict for a test key (`test_x` or `Class.test_x`).
    pub fn verdict_for(&self, key: &str) -> Option<&ReviewVerdict> {
        self.reviews.get(key).and_then(Option::as_ref)
    }
}

/// One verdict per span, positionally aligned with `spans`.
///
/// A span absent from `report` is reviewed as `unknown`. A failed request
/// yields `None` for that span only.
pub async fn review_spans(
    llm: &dyn Completion,
    spans: &[TestSpan],
    report: &ExecutionReport,
    max_concurrent: usize,
) -> Vec<Option<ReviewVerdict>> {
    let schema = verdict_schema();
    let schema = &schema;

    let items: Vec<(&TestSpan, ExecutionOutcome)> = spans
        .iter()
        .map(|span| (span, report.outcome_for(&span.key())))
        .collect();

    run_bounded(
        items,
        max_concurrent,
        |(span, _)| span.key(),
        |(span, outcome)| async move {
            let prompt = review_prompt(&span.source_text, &outcome);
            complete_structured::<ReviewVerdict>(llm, &prompt, schema).await
        },
    )
    .await
}

fn summarize(verdicts: &[Option<ReviewVerdict>], execution: OutcomeCounts) -> ReviewSummary {
    let mut summary = ReviewSummary {
        reviewed: verdicts.len(),
        execution,
        ..ReviewSummary::default()
    };

    for v in verdicts {
        match v {
            None => summary.missing += 1,
            Some(v) if v.acceptable => summary.acceptable += 1,
            Some(v) => {
                summary.defective += 1;
                if v.is_incomplete() {
                    summary.incomplete += 1;
                }
            }
        }
    }

    summary
}

/// Run `test_file`, then review every test in it.
pub async fn review(
    test_file: &Path,
    llm: &dyn Completion,
    runner: &RunnerConfig,
    max_concurrent: usize,
) -> Result<ReviewReport> {
    let spans = extract_test_spans_from_file(test_file)?;
    info!(file = %test_file.display(), tests = spans.len(), "reviewing");

    let execution = collect_outcomes(test_file, runner).await?;
    let verdicts = review_spans(llm, &spans, &execution, max_concurrent).await;

    for (span, verdict) in spans.iter().zip(&verdicts) {
        if verdict.as_ref().is_some_and(ReviewVerdict::is_incomplete) {
            warn!(test = %span.key(), "defective verdict without diagnosis or remedy");
        }
    }

    let summary = summarize(&verdicts, execution.counts);
    info!(
        "{} defective of {} reviewed ({} without verdict)",
        summary.defective, summary.reviewed, summary.missing
    );

    let reviews = spans
        .into_iter()
        .map(|s| s.key())
        .zip(verdicts)
        .collect();

    Ok(ReviewReport {
        test_file: test_file.display().to_string(),
        summary,
        reviews,
    })
}
