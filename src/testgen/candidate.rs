use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Certain,
    High,
    Medium,
    Low,
    Uncertain,
}

impl Confidence {
    pub const ALL: [&'static str; 5] = ["certain", "high", "medium", "low", "uncertain"];
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Certain => "certain",
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Uncertain => "uncertain",
        };
        f.write_str(s)
    }
}

/// A property one function should satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySuggestion {
    pub property: String,
    pub reasoning: String,
    pub confidence: Confidence,
}

/// A property relating several functions of the same module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPropertySuggestion {
    pub property: String,
    pub reasoning: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub functions_involved: Vec<String>,
}

/// Output of `suggest`, input of `write`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub module_name: String,
    #[serde(default)]
    pub single_function_properties: BTreeMap<String, Vec<PropertySuggestion>>,
    #[serde(default)]
    pub multi_function_properties: Vec<MultiPropertySuggestion>,
}

impl SuggestionReport {
    /// Every function name referenced anywhere, sorted and deduplicated.
    pub fn referenced_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .single_function_properties
            .keys()
            .cloned()
            .chain(
                self.multi_function_properties
                    .iter()
                    .flat_map(|p| p.functions_involved.iter().cloned()),
            )
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_reads_suggest_output() {
        let raw = r#"{
            "module_name": "statistics",
            "single_function_properties": {
                "mean": [{"property": "min <= mean <= max", "reasoning": "averages", "confidence": "certain"}]
            },
            "multi_function_properties": [
                {"property": "median of one element equals mean", "reasoning": "trivial", "confidence": "high",
                 "functions_involved": ["median", "mean"]}
            ]
        }"#;

        let report: SuggestionReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.single_function_properties["mean"][0].confidence, Confidence::Certain);
        assert_eq!(report.referenced_functions(), vec!["mean", "median"]);
    }

    #[test]
    fn unknown_confidence_is_rejected() {
        let raw = r#"{"property": "p", "reasoning": "r", "confidence": "maybe"}"#;
        assert!(serde_json::from_str::<PropertySuggestion>(raw).is_err());
    }
}
