// src/testgen/improve.rs
//
// Repair driver: rewrites tests a review marked defective and reassembles
// the file around them.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, info, warn};

use crate::detectors::ast::ast::defined_function_names;
use crate::detectors::ast::spans::{
    extract_test_spans, header_before, header_line_count, TestSpan,
};
use crate::error::Result;
use crate::executor::run::run_bounded;
use crate::llm::backend::{complete_code, Completion};
use crate::llm::prompt::improve_prompt;
use crate::testgen::assemble::assemble;
use crate::testgen::review::{ReviewReport, ReviewVerdict};

#[derive(Debug, Default)]
pub struct RepairPlan {
    /// Every span in file order.
    pub spans: Vec<TestSpan>,
    /// Indices into `spans` that need a rewrite, with their verdict.
    pub defective: Vec<(usize, ReviewVerdict)>,
}

/// What happened to one defective test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    Replaced(String),
    /// The rewrite came back empty; the test is dropped.
    Discarded,
    /// The rewrite failed or was unusable; the original stays.
    Kept,
}

/// Split spans into those to keep and those to rewrite.
///
/// Spans without a verdict are kept. So are defective verdicts lacking a
/// diagnosis or remedy, which are reported instead.
pub fn plan_repairs(spans: Vec<TestSpan>, reviews: &ReviewReport) -> RepairPlan {
    let mut defective = Vec::new();

    for (i, span) in spans.iter().enumerate() {
        let key = span.key();
        let Some(verdict) = reviews.verdict_for(&key) else {
            debug!(test = %key, "no verdict, keeping");
            continue;
        };
        if !verdict.is_defective() {
            continue;
        }
        if verdict.is_incomplete() {
            warn!(test = %key, "defective verdict lacks diagnosis or remedy, keeping as is");
            continue;
        }
        defective.push((i, verdict.clone()));
    }

    RepairPlan { spans, defective }
}

/// Whether any test in `source` has a verdict that calls for a rewrite.
pub fn needs_repair(source: &str, reviews: &ReviewReport) -> Result<bool> {
    Ok(!plan_repairs(extract_test_spans(source)?, reviews)
        .defective
        .is_empty())
}

/// Raw rewrites, positionally aligned with `targets`.
pub async fn repair_spans(
    llm: &dyn Completion,
    targets: Vec<(&TestSpan, &ReviewVerdict)>,
    max_concurrent: usize,
) -> Vec<Option<String>> {
    run_bounded(
        targets,
        max_concurrent,
        |(span, _)| span.key(),
        |(span, verdict)| async move {
            let prompt = improve_prompt(&span.source_text, verdict);
            complete_code(llm, &prompt).await
        },
    )
    .await
}

/// Decide what a rewrite of `name` turns into. Accepted code is returned
/// flush left.
pub fn judge_repair(name: &str, rewrite: Option<String>) -> RepairOutcome {
    let Some(code) = rewrite else {
        return RepairOutcome::Kept;
    };

    let code = dedent(&code);
    let code = code.trim();
    if code.is_empty() {
        return RepairOutcome::Discarded;
    }

    match defined_function_names(code) {
        Ok(names) if names.iter().any(|n| n == name) => RepairOutcome::Replaced(code.to_string()),
        Ok(names) => {
            warn!(test = %name, found = ?names, "rewrite renamed the test, keeping original");
            RepairOutcome::Kept
        }
        Err(e) => {
            warn!(test = %name, error = %e, "rewrite does not parse, keeping original");
            RepairOutcome::Kept
        }
    }
}

/// Rewrite every defective test of `source` and return the new file text.
///
/// With nothing to rewrite the source comes back unchanged.
pub async fn improve_source(
    source: &str,
    reviews: &ReviewReport,
    llm: &dyn Completion,
    max_concurrent: usize,
) -> Result<String> {
    let plan = plan_repairs(extract_test_spans(source)?, reviews);

    if plan.defective.is_empty() {
        info!("no tests need repair");
        return Ok(source.to_string());
    }
    info!("repairing {} of {} tests", plan.defective.len(), plan.spans.len());

    let targets = plan
        .defective
        .iter()
        .map(|(i, v)| (&plan.spans[*i], v))
        .collect();
    let rewrites = repair_spans(llm, targets, max_concurrent).await;

    let mut edits = HashMap::new();
    let (mut replaced, mut discarded, mut rejected) = (0usize, 0usize, 0usize);

    for ((i, _), rewrite) in plan.defective.iter().zip(rewrites) {
        match judge_repair(&plan.spans[*i].name, rewrite) {
            RepairOutcome::Kept => rejected += 1,
            outcome => {
                if matches!(outcome, RepairOutcome::Discarded) {
                    discarded += 1;
                } else {
                    replaced += 1;
                }
                edits.insert(*i, outcome);
            }
        }
    }

    info!(
        "{} repaired, {} discarded, {} kept after failed repair",
        replaced, discarded, rejected
    );

    Ok(rebuild(source, &plan.spans, &edits))
}

/// Reassemble `source` with `edits` (keyed by span index) applied.
///
/// Rewritten module-level tests go after everything else. Rewritten methods
/// stay where they were inside their class. Code between tests, classes and
/// helpers included, is carried over with its original spacing.
fn rebuild(source: &str, spans: &[TestSpan], edits: &HashMap<usize, RepairOutcome>) -> String {
    let lines: Vec<&str> = source.split('\n').collect();

    let mut kept = Vec::new();
    let mut repaired = Vec::new();
    let mut cursor = header_line_count(source, spans);

    for (i, span) in spans.iter().enumerate().filter(|(_, s)| !s.is_method()) {
        if cursor < span.start_line {
            kept.push(edit_region(&lines, cursor..span.start_line, spans, edits));
        }
        match edits.get(&i) {
            Some(RepairOutcome::Replaced(code)) => repaired.push(code.clone()),
            Some(RepairOutcome::Discarded) => {}
            _ => kept.push(span.source_text.clone()),
        }
        cursor = span.end_line + 1;
    }
    if cursor < lines.len() {
        kept.push(edit_region(&lines, cursor..lines.len(), spans, edits));
    }

    assemble(&header_before(source, spans), &[kept.join("\n")], &repaired)
}

/// The text of `range`, with edits to the methods inside it applied.
fn edit_region(
    lines: &[&str],
    range: Range<usize>,
    spans: &[TestSpan],
    edits: &HashMap<usize, RepairOutcome>,
) -> String {
    let start = range.start;
    let mut out: Vec<String> = lines[range].iter().map(|l| l.to_string()).collect();

    let mut inside: Vec<(&TestSpan, &RepairOutcome)> = spans
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_method() && s.start_line >= start && s.end_line < start + out.len())
        .filter_map(|(i, s)| edits.get(&i).map(|e| (s, e)))
        .collect();
    // Bottom-up, so earlier offsets stay valid.
    inside.sort_by_key(|(s, _)| std::cmp::Reverse(s.start_line));

    for (span, edit) in inside {
        let (from, to) = (span.start_line - start, span.end_line - start + 1);
        let indent = indentation(&span.source_text);

        match edit {
            RepairOutcome::Replaced(code) => {
                let blank_lead = span
                    .source_text
                    .lines()
                    .take_while(|l| l.trim().is_empty())
                    .count();
                let body: Vec<String> = std::iter::repeat(String::new())
                    .take(blank_lead)
                    .chain(reindent(code, &indent))
                    .collect();
                out.splice(from..to, body);
            }
            RepairOutcome::Discarded => {
                out.drain(from..to);
                if class_body_is_empty(&out, from, &indent) {
                    out.insert(from, format!("{indent}pass"));
                }
            }
            RepairOutcome::Kept => {}
        }
    }

    out.join("\n")
}

/// Leading whitespace of the first non-blank line.
fn indentation(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l[..l.len() - l.trim_start().len()].to_string())
        .unwrap_or_default()
}

/// Strip the whitespace margin every non-blank line shares.
fn dedent(code: &str) -> String {
    let margin = code
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    code.lines()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.get(margin..).unwrap_or_else(|| l.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn reindent(code: &str, indent: &str) -> Vec<String> {
    code.lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{l}")
            }
        })
        .collect()
}

/// Whether the class a method was just removed from at `at` has no
/// statement left.
fn class_body_is_empty(lines: &[String], at: usize, indent: &str) -> bool {
    let in_class = |l: &String| l.trim().is_empty() || l.starts_with(indent);
    let is_statement = |l: &String| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with('#')
    };

    let above = lines[..at]
        .iter()
        .rev()
        .take_while(|l| in_class(l))
        .any(|l| is_statement(l));
    let below = lines[at..]
        .iter()
        .take_while(|l| in_class(l))
        .any(|l| is_statement(l));

    !(above || below)
}
