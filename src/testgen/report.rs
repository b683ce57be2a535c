// src/testgen/report.rs
//
// Parses the JUnit XML pytest writes into per-test outcomes.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hypothesis prints the shrunk input after this marker.
pub const COUNTEREXAMPLE_MARKER: &str = "Falsifying example";

const DIAGNOSTIC_LIMIT: usize = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
    Unknown,
}

impl TestStatus {
    fn severity(self) -> u8 {
        match self {
            TestStatus::Unknown => 0,
            TestStatus::Skipped => 1,
            TestStatus::Passed => 2,
            TestStatus::Failed => 3,
            TestStatus::Error => 4,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Error => "ERROR",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: TestStatus,
    pub counterexample: Option<String>,
    pub diagnostic_text: Option<String>,
}

impl ExecutionOutcome {
    pub fn unknown() -> Self {
        Self {
            status: TestStatus::Unknown,
            counterexample: None,
            diagnostic_text: None,
        }
    }

    /// Text block describing this outcome for a review prompt.
    pub fn render(&self) -> String {
        let mut out = format!("Status: {}\n", self.status);

        if let Some(example) = &self.counterexample {
            out.push_str("\nFalsifying example:\n");
            out.push_str(example);
            out.push('\n');
        }

        if let Some(text) = &self.diagnostic_text {
            out.push_str("\nError message:\n");
            out.push_str(text);
            out.push('\n');
        }

        out
    }

    fn merge(&mut self, other: ExecutionOutcome) {
        if other.status.severity() > self.status.severity() {
            self.status = other.status;
        }
        if self.counterexample.is_none() {
            self.counterexample = other.counterexample;
        }
        if self.diagnostic_text.is_none() {
            self.diagnostic_text = other.diagnostic_text;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub passed: usize,
    pub failed: usize,
    pub error: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    fn record(&mut self, status: TestStatus) {
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.error += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Unknown => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Keyed by bare test name.
    pub outcomes: HashMap<String, ExecutionOutcome>,
    /// Keyed by `Class.test`, for cases whose `classname` names a class.
    pub class_outcomes: HashMap<String, ExecutionOutcome>,
    pub counts: OutcomeCounts,
}

impl ExecutionReport {
    /// Outcome for `name` (or `Class.name`), or `unknown` when the report
    /// never mentioned it. A qualified name the report has no class entry
    /// for falls back to the bare name.
    pub fn outcome_for(&self, name: &str) -> ExecutionOutcome {
        let found = match name.rsplit_once('.') {
            Some((_, bare)) => self
                .class_outcomes
                .get(name)
                .or_else(|| self.outcomes.get(bare)),
            None => self.outcomes.get(name),
        };
        found.cloned().unwrap_or_else(ExecutionOutcome::unknown)
    }
}

fn record_outcome(map: &mut HashMap<String, ExecutionOutcome>, key: String, outcome: ExecutionOutcome) {
    match map.get_mut(&key) {
        Some(existing) => existing.merge(outcome),
        None => {
            map.insert(key, outcome);
        }
    }
}

/* ---------- Parsing ---------- */

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

fn suite_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<testsuites?[\s>/]")
}

fn case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<testcase\b([^>]*?)(?:/>|>(.*?)</testcase>)")
}

fn child_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?s)<(failure|error|skipped)\b([^>]*?)(?:/>|>(.*?)</(?:failure|error|skipped)>)",
    )
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"(?:^|\s)name="([^"]*)""#)
}

fn classname_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"(?:^|\s)classname="([^"]*)""#)
}

fn message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"(?:^|\s)message="([^"]*)""#)
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|amp|quot|apos);")
}

/// Parse a JUnit XML report.
///
/// A document without a test suite is rejected outright. Individual test
/// cases that cannot be read are skipped, which leaves their test `unknown`.
pub fn parse_junit(xml: &str) -> Result<ExecutionReport> {
    if !suite_re().is_match(xml) {
        return Err(Error::Report("no <testsuite> element".into()));
    }

    let mut report = ExecutionReport::default();

    for case in case_re().captures_iter(xml) {
        let attrs = case.get(1).map_or("", |m| m.as_str());
        let Some(raw_name) = name_re().captures(attrs).and_then(|c| c.get(1)) else {
            continue;
        };

        let name = base_name(&decode_entities(raw_name.as_str())).to_string();
        if name.is_empty() {
            continue;
        }

        let outcome = parse_case_body(case.get(2).map_or("", |m| m.as_str()));
        report.counts.record(outcome.status);

        if let Some(class) = classname_re()
            .captures(attrs)
            .and_then(|c| c.get(1))
            .and_then(|m| class_segment(m.as_str()))
        {
            record_outcome(
                &mut report.class_outcomes,
                format!("{class}.{name}"),
                outcome.clone(),
            );
        }
        record_outcome(&mut report.outcomes, name, outcome);
    }

    Ok(report)
}

fn parse_case_body(body: &str) -> ExecutionOutcome {
    let Some(child) = child_re().captures(body) else {
        return ExecutionOutcome {
            status: TestStatus::Passed,
            counterexample: None,
            diagnostic_text: None,
        };
    };

    let status = match &child[1] {
        "failure" => TestStatus::Failed,
        "error" => TestStatus::Error,
        _ => TestStatus::Skipped,
    };

    if status == TestStatus::Skipped {
        return ExecutionOutcome {
            status,
            counterexample: None,
            diagnostic_text: None,
        };
    }

    let text = child_text(&child);
    let counterexample = if status == TestStatus::Failed {
        text.as_deref().and_then(extract_counterexample)
    } else {
        None
    };

    ExecutionOutcome {
        status,
        counterexample,
        diagnostic_text: text.map(|t| truncate_output(&t)),
    }
}

fn child_text(child: &Captures) -> Option<String> {
    let body = child
        .get(3)
        .map(|m| strip_cdata(m.as_str()))
        .filter(|b| !b.trim().is_empty());

    let text = match body {
        Some(b) => decode_entities(b),
        None => {
            let attrs = child.get(2).map_or("", |m| m.as_str());
            decode_entities(message_re().captures(attrs)?.get(1)?.as_str())
        }
    };

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// The marker line plus every following line up to the next blank one.
pub fn extract_counterexample(text: &str) -> Option<String> {
    let mut lines = text.lines();
    let first = lines.by_ref().find(|l| l.contains(COUNTEREXAMPLE_MARKER))?;

    let mut block = vec![first];
    block.extend(lines.take_while(|l| !l.trim().is_empty()));
    Some(block.join("\n"))
}

/// Last dotted segment of a pytest `classname` when it names a class.
/// Module paths (`tests.test_stats`) yield nothing.
fn class_segment(classname: &str) -> Option<&str> {
    let last = classname.rsplit('.').next()?;
    last.chars()
        .next()
        .is_some_and(char::is_uppercase)
        .then_some(last)
}

/// `test_x[3-abc]` and `test_x` report into the same outcome.
fn base_name(name: &str) -> &str {
    match name.find('[') {
        Some(i) => &name[..i],
        None => name,
    }
}

fn strip_cdata(s: &str) -> &str {
    let t = s.trim();
    t.strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .unwrap_or(s)
}

fn decode_entities(s: &str) -> String {
    entity_re()
        .replace_all(s, |c: &Captures| {
            let ent = &c[1];
            let decoded = match ent {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if ent.starts_with("#x") => u32::from_str_radix(&ent[2..], 16)
                    .ok()
                    .and_then(char::from_u32),
                _ => ent[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| c[0].to_string(), |ch| ch.to_string())
        })
        .into_owned()
}

fn truncate_output(s: &str) -> String {
    if s.chars().count() <= DIAGNOSTIC_LIMIT {
        return s.to_string();
    }

    let tail: String = s
        .chars()
        .rev()
        .take(DIAGNOSTIC_LIMIT)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    format!("...truncated...\n{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites><testsuite name="pytest" errors="1" failures="1" skipped="1" tests="5" time="0.41">
<testcase classname="test_stats" name="test_mean_constant" time="0.12" />
<testcase classname="test_stats" name="test_mean_bounds" time="0.20"><failure message="AssertionError: assert 1.5 &lt;= 1">xs = [1, 2]

    @given(st.lists(st.integers(), min_size=1))
    def test_mean_bounds(xs):
&gt;       assert min(xs) &lt;= mean(xs) &lt;= 1
E       AssertionError
E       Falsifying example: test_mean_bounds(
E           xs=[1, 2],
E       )

test_stats.py:12: AssertionError</failure></testcase>
<testcase classname="test_stats" name="test_median" time="0.01"><error message="fixture 'data' not found">file test_stats.py, line 20
  def test_median(data):
E       fixture 'data' not found</error></testcase>
<testcase classname="test_stats" name="test_mode" time="0.00"><skipped type="pytest.skip" message="later">test_stats.py:30: later</skipped></testcase>
<testcase classname="test_stats" time="0.00" />
</testsuite></testsuites>"#;

    #[test]
    fn parses_every_status() {
        let r = parse_junit(REPORT).unwrap();
        assert_eq!(r.outcome_for("test_mean_constant").status, TestStatus::Passed);
        assert_eq!(r.outcome_for("test_mean_bounds").status, TestStatus::Failed);
        assert_eq!(r.outcome_for("test_median").status, TestStatus::Error);
        assert_eq!(r.outcome_for("test_mode").status, TestStatus::Skipped);
        assert_eq!(
            r.counts,
            OutcomeCounts {
                passed: 1,
                failed: 1,
                error: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn failure_carries_decoded_text_and_counterexample() {
        let r = parse_junit(REPORT).unwrap();
        let o = r.outcome_for("test_mean_bounds");
        let text = o.diagnostic_text.unwrap();
        assert!(text.contains(">       assert min(xs) <= mean(xs) <= 1"));

        let example = o.counterexample.unwrap();
        assert!(example.starts_with("E       Falsifying example: test_mean_bounds("));
        assert!(example.contains("xs=[1, 2],"));
        assert!(!example.contains("test_stats.py:12"));
    }

    #[test]
    fn errors_have_no_counterexample() {
        let r = parse_junit(REPORT).unwrap();
        let o = r.outcome_for("test_median");
        assert!(o.counterexample.is_none());
        assert!(o.diagnostic_text.unwrap().contains("fixture 'data' not found"));
    }

    #[test]
    fn absent_names_default_to_unknown() {
        let r = parse_junit(REPORT).unwrap();
        assert_eq!(r.outcome_for("test_nowhere"), ExecutionOutcome::unknown());
    }

    #[test]
    fn message_attribute_used_when_body_empty() {
        let xml = r#"<testsuite><testcase name="test_a"><failure message="boom &amp; bust" /></testcase></testsuite>"#;
        let o = parse_junit(xml).unwrap().outcome_for("test_a");
        assert_eq!(o.diagnostic_text.as_deref(), Some("boom & bust"));
    }

    #[test]
    fn parametrised_cases_merge_by_severity() {
        let xml = r#"<testsuite>
<testcase name="test_p[1]" />
<testcase name="test_p[2]"><failure>bad</failure></testcase>
<testcase name="test_p[3]" />
</testsuite>"#;
        let r = parse_junit(xml).unwrap();
        assert_eq!(r.outcomes.len(), 1);
        let o = r.outcome_for("test_p");
        assert_eq!(o.status, TestStatus::Failed);
        assert_eq!(o.diagnostic_text.as_deref(), Some("bad"));
        assert_eq!(r.counts.passed, 2);
    }

    #[test]
    fn class_methods_are_keyed_by_class() {
        let xml = r#"<testsuite>
<testcase classname="tests.test_roots.TestRoots" name="test_sqrt"><failure>neg</failure></testcase>
<testcase classname="tests.test_roots.TestOther" name="test_sqrt" />
<testcase classname="tests.test_roots" name="test_top" />
</testsuite>"#;
        let r = parse_junit(xml).unwrap();

        assert_eq!(r.outcome_for("TestRoots.test_sqrt").status, TestStatus::Failed);
        assert_eq!(r.outcome_for("TestOther.test_sqrt").status, TestStatus::Passed);
        assert_eq!(r.outcome_for("test_top").status, TestStatus::Passed);
        assert_eq!(r.outcome_for("TestMissing.test_top").status, TestStatus::Passed);
        assert_eq!(r.outcome_for("TestMissing.test_none").status, TestStatus::Unknown);
        assert_eq!(r.class_outcomes.len(), 2);
        assert_eq!(r.counts.passed, 2);
    }

    #[test]
    fn document_without_suite_is_rejected() {
        assert!(matches!(parse_junit("<html></html>"), Err(Error::Report(_))));
    }

    #[test]
    fn counterexample_stops_at_blank_line() {
        let text = "boom\nFalsifying example: f(\n    x=0,\n)\n\nTraceback";
        assert_eq!(
            extract_counterexample(text).as_deref(),
            Some("Falsifying example: f(\n    x=0,\n)")
        );
        assert!(extract_counterexample("no marker").is_none());
    }

    #[test]
    fn render_includes_present_sections_only() {
        let o = ExecutionOutcome {
            status: TestStatus::Failed,
            counterexample: Some("Falsifying example: f(x=0)".into()),
            diagnostic_text: None,
        };
        let text = o.render();
        assert!(text.starts_with("Status: FAILED"));
        assert!(text.contains("Falsifying example: f(x=0)"));
        assert!(!text.contains("Error message"));
        assert_eq!(ExecutionOutcome::unknown().render(), "Status: UNKNOWN\n");
    }
}
