mod common;

use std::collections::HashMap;

use common::{Reply, Scripted};
use hypollm::detectors::ast::ast::defined_function_names;
use hypollm::introspect::FunctionInfo;
use hypollm::testgen::candidate::SuggestionReport;
use hypollm::testgen::suggest::suggest_for;
use hypollm::testgen::write::write_with_infos;

fn info(name: &str) -> FunctionInfo {
    FunctionInfo {
        name: name.into(),
        signature: Some("(data)".into()),
        docstring: format!("{name} of data"),
        source: format!("def {name}(data):\n    return data"),
    }
}

#[tokio::test]
async fn suggest_collects_single_and_multi_properties() {
    let single = r#"{"items": [{"property": "bounded by min and max", "reasoning": "average", "confidence": "certain"}]}"#;
    let multi = r#"{"items": [{"property": "median([x]) == mean([x])", "reasoning": "one element", "confidence": "high", "functions_involved": ["mean", "median"]}]}"#;

    let llm = Scripted::new()
        .on_text("relate two or more", 1, Reply::Text(multi.into()))
        .on("mean", 5, Reply::Text(single.into()))
        .on("median", 1, Reply::Fail);

    let report = suggest_for("statistics", &[info("mean"), info("median")], &llm, 2).await;

    assert_eq!(report.module_name, "statistics");
    assert_eq!(report.single_function_properties.len(), 1);
    assert_eq!(report.single_function_properties["mean"][0].property, "bounded by min and max");
    assert_eq!(report.multi_function_properties.len(), 1);
    assert_eq!(report.multi_function_properties[0].functions_involved, vec!["mean", "median"]);
    assert_eq!(llm.prompts().len(), 3);
}

#[tokio::test]
async fn single_function_skips_multi_pass() {
    let single = r#"{"items": []}"#;
    let llm = Scripted::new().on("mean", 1, Reply::Text(single.into()));

    let report = suggest_for("statistics", &[info("mean")], &llm, 2).await;

    assert!(report.single_function_properties["mean"].is_empty());
    assert!(report.multi_function_properties.is_empty());
    assert_eq!(llm.prompts().len(), 1);
}

#[tokio::test]
async fn write_emits_header_and_generated_tests() {
    let report: SuggestionReport = serde_json::from_str(
        r#"{
            "module_name": "statistics",
            "single_function_properties": {
                "mean": [{"property": "bounded", "reasoning": "r", "confidence": "high"}],
                "median": []
            },
            "multi_function_properties": []
        }"#,
    )
    .unwrap();

    let infos: HashMap<String, FunctionInfo> =
        ["mean", "median"].map(|n| (n.to_string(), info(n))).into_iter().collect();

    let llm = Scripted::new().on(
        "mean",
        1,
        Reply::Text("```python\n@given(st.lists(st.integers(), min_size=1))\ndef test_mean_bounded(xs):\n    assert min(xs) <= mean(xs) <= max(xs)\n```".into()),
    );

    let code = write_with_infos(&report, &infos, &llm, 2).await.unwrap();

    assert!(code.contains("from statistics import (\n    mean,\n    median\n)"));
    assert_eq!(defined_function_names(&code).unwrap(), vec!["test_mean_bounded"]);
    assert_eq!(llm.prompts().len(), 1);
}
