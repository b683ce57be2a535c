mod common;

use std::fs;

use common::{verdict_json, Reply, Scripted, SAMPLE, SAMPLE_JUNIT};
use hypollm::config::RunnerConfig;
use hypollm::detectors::ast::spans::extract_test_spans;
use hypollm::testgen::report::parse_junit;
use hypollm::testgen::review::{review, review_spans};

const NAMES: [&str; 5] = ["test_a", "test_b", "test_c", "test_d", "test_e"];

fn all_acceptable(delays: [u64; 5]) -> Scripted {
    NAMES
        .iter()
        .zip(delays)
        .fold(Scripted::new(), |s, (name, ms)| s.on(name, ms, verdict_json(name, true)))
}

#[tokio::test]
async fn one_failed_request_leaves_the_rest_intact() {
    let spans = extract_test_spans(SAMPLE).unwrap();
    let report = parse_junit(SAMPLE_JUNIT).unwrap();

    let llm = Scripted::new()
        .on("test_a", 5, verdict_json("test_a", true))
        .on("test_b", 5, verdict_json("test_b", true))
        .on("test_c", 5, Reply::Fail)
        .on("test_d", 5, verdict_json("test_d", false))
        .on("test_e", 5, verdict_json("test_e", true));

    let verdicts = review_spans(&llm, &spans, &report, 3).await;

    assert_eq!(verdicts.len(), 5);
    assert!(verdicts[2].is_none());
    for (i, name) in NAMES.iter().enumerate().filter(|(i, _)| *i != 2) {
        let v = verdicts[i].as_ref().unwrap();
        assert_eq!(v.diagnosis, format!("about {name}"));
    }
    assert!(verdicts[3].as_ref().unwrap().is_defective());
}

#[tokio::test]
async fn verdicts_never_cross_under_scrambled_completion() {
    let spans = extract_test_spans(SAMPLE).unwrap();
    let report = parse_junit(SAMPLE_JUNIT).unwrap();
    let llm = all_acceptable([60, 1, 35, 5, 20]);

    let verdicts = review_spans(&llm, &spans, &report, 5).await;

    for (span, verdict) in spans.iter().zip(&verdicts) {
        assert_eq!(verdict.as_ref().unwrap().diagnosis, format!("about {}", span.name));
    }
}

#[tokio::test]
async fn concurrency_stays_within_the_bound() {
    let spans = extract_test_spans(SAMPLE).unwrap();
    let report = parse_junit(SAMPLE_JUNIT).unwrap();
    let llm = all_acceptable([20; 5]);

    let verdicts = review_spans(&llm, &spans, &report, 2).await;

    assert!(verdicts.iter().all(Option::is_some));
    assert!(llm.peak() <= 2);
}

#[tokio::test]
async fn test_missing_from_report_is_reviewed_as_unknown() {
    let spans = extract_test_spans(SAMPLE).unwrap();
    let report = parse_junit(SAMPLE_JUNIT).unwrap();
    let llm = all_acceptable([1; 5]);

    review_spans(&llm, &spans, &report, 4).await;

    assert!(llm.prompt_for("test_e").unwrap().contains("Status: UNKNOWN"));
    assert!(llm.prompt_for("test_a").unwrap().contains("Status: PASSED"));

    let failing = llm.prompt_for("test_c").unwrap();
    assert!(failing.contains("Status: FAILED"));
    assert!(failing.contains("x=nan,"));
}

#[tokio::test]
async fn review_runs_the_file_and_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let test_file = dir.path().join("test_sample.py");
    let fixture = dir.path().join("fixture.xml");
    fs::write(&test_file, SAMPLE).unwrap();
    fs::write(&fixture, SAMPLE_JUNIT).unwrap();

    let runner = RunnerConfig {
        pytest_command: vec![
            "sh".into(),
            "-c".into(),
            format!("cp '{}' \"${{2#--junitxml=}}\"", fixture.display()),
            "sh".into(),
        ],
        timeout_secs: 10,
    };

    let llm = Scripted::new()
        .on("test_a", 1, verdict_json("test_a", true))
        .on("test_b", 1, verdict_json("test_b", true))
        .on("test_c", 1, verdict_json("test_c", false))
        .on("test_d", 1, Reply::Fail)
        .on("test_e", 1, verdict_json("test_e", true));

    let out = review(&test_file, &llm, &runner, 3).await.unwrap();

    assert_eq!(out.reviews.len(), 5);
    assert!(out.reviews["test_d"].is_none());
    assert!(out.verdict_for("test_c").unwrap().is_defective());
    assert_eq!(out.summary.reviewed, 5);
    assert_eq!(out.summary.defective, 1);
    assert_eq!(out.summary.missing, 1);
    assert_eq!(out.summary.execution.failed, 1);
    assert_eq!(out.summary.execution.passed, 3);

    let json = serde_json::to_value(&out).unwrap();
    assert!(json["reviews"]["test_d"].is_null());
    assert_eq!(json["reviews"]["test_c"]["remedy"], "fix test_c");
}

#[tokio::test]
async fn review_requests_carry_the_verdict_schema() {
    let spans = extract_test_spans(SAMPLE).unwrap();
    let report = parse_junit(SAMPLE_JUNIT).unwrap();
    let llm = all_acceptable([1; 5]);

    review_spans(&llm, &spans, &report, 5).await;

    for name in NAMES {
        assert_eq!(llm.schema_for(name), Some(Some("review_verdict")));
    }
}

const CLASS_SAMPLE: &str = r#"import math
from hypothesis import given, strategies as st


class TestRoots:
    @given(st.floats())
    def test_sqrt(self, x):
        assert math.sqrt(x) >= 0


def test_top():
    assert math.sqrt(4) == 2
"#;

const CLASS_JUNIT: &str = r#"<testsuite name="pytest" tests="2">
<testcase classname="test_roots.TestRoots" name="test_sqrt"><failure message="ValueError">Falsifying example: test_sqrt(
    self=&lt;test_roots.TestRoots object&gt;,
    x=-1.0,
)

ValueError: math domain error</failure></testcase>
<testcase classname="test_roots" name="test_top" />
</testsuite>"#;

#[tokio::test]
async fn methods_of_test_classes_are_reviewed_with_their_own_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let test_file = dir.path().join("test_roots.py");
    let fixture = dir.path().join("fixture.xml");
    fs::write(&test_file, CLASS_SAMPLE).unwrap();
    fs::write(&fixture, CLASS_JUNIT).unwrap();

    let runner = RunnerConfig {
        pytest_command: vec![
            "sh".into(),
            "-c".into(),
            format!("cp '{}' \"${{2#--junitxml=}}\"", fixture.display()),
            "sh".into(),
        ],
        timeout_secs: 10,
    };

    let llm = Scripted::new()
        .on("test_sqrt", 1, verdict_json("test_sqrt", false))
        .on("test_top", 1, verdict_json("test_top", true));

    let out = review(&test_file, &llm, &runner, 2).await.unwrap();

    let keys: Vec<&str> = out.reviews.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["TestRoots.test_sqrt", "test_top"]);
    assert!(out.verdict_for("TestRoots.test_sqrt").unwrap().is_defective());

    let prompt = llm.prompt_for("test_sqrt").unwrap();
    assert!(prompt.contains("Status: FAILED"));
    assert!(prompt.contains("x=-1.0,"));
    assert!(llm.prompt_for("test_top").unwrap().contains("Status: PASSED"));
}
