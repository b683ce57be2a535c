// src/testgen/suggest.rs
//
// Property suggestion for the functions of one module.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::Result;
use crate::executor::run::run_bounded;
use crate::introspect::{FunctionInfo, ModuleDescriptor};
use crate::llm::backend::{complete_structured, Completion, ResponseSchema};
use crate::llm::prompt::{suggest_multi_prompt, suggest_single_prompt, LlmPrompt};
use crate::testgen::candidate::{
    Confidence, MultiPropertySuggestion, PropertySuggestion, SuggestionReport,
};

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

fn items_schema(name: &'static str, multi: bool) -> ResponseSchema {
    let mut item = json!({
        "type": "object",
        "properties": {
            "property": { "type": "string" },
            "reasoning": { "type": "string" },
            "confidence": { "type": "string", "enum": Confidence::ALL }
        },
        "required": ["property", "reasoning", "confidence"],
        "additionalProperties": false
    });

    if multi {
        item["properties"]["functions_involved"] = json!({
            "type": "array",
            "items": { "type": "string" }
        });
        if let Some(req) = item["required"].as_array_mut() {
            req.push(Value::from("functions_involved"));
        }
    }

    ResponseSchema {
        name,
        schema: json!({
            "type": "object",
            "properties": { "items": { "type": "array", "items": item } },
            "required": ["items"],
            "additionalProperties": false
        }),
    }
}

pub fn single_function_schema() -> ResponseSchema {
    items_schema("single_function_properties", false)
}

pub fn multi_function_schema() -> ResponseSchema {
    items_schema("multi_function_properties", true)
}

async fn request_items<T: DeserializeOwned>(
    llm: &dyn Completion,
    prompt: &LlmPrompt,
    schema: &ResponseSchema,
) -> Result<Vec<T>> {
    let parsed: Items<T> = complete_structured(llm, prompt, schema).await?;
    Ok(parsed.items)
}

/// Suggest properties for already-described functions.
///
/// A function whose request fails is left out of the report. The
/// multi-function pass only runs with two or more functions.
pub async fn suggest_for(
    module: &str,
    functions: &[FunctionInfo],
    llm: &dyn Completion,
    max_concurrent: usize,
) -> SuggestionReport {
    let single_schema = single_function_schema();
    let single_schema = &single_schema;

    let singles = run_bounded(
        functions.iter().collect(),
        max_concurrent,
        |f: &&FunctionInfo| format!("{}()", f.name),
        |f| async move {
            request_items::<PropertySuggestion>(llm, &suggest_single_prompt(f), single_schema).await
        },
    )
    .await;

    let single_function_properties: BTreeMap<String, Vec<PropertySuggestion>> = functions
        .iter()
        .zip(singles)
        .filter_map(|(f, props)| props.map(|p| (f.name.clone(), p)))
        .collect();

    let multi_function_properties = if functions.len() >= 2 {
        let prompt = suggest_multi_prompt(functions);
        match request_items::<MultiPropertySuggestion>(llm, &prompt, &multi_function_schema()).await {
            Ok(props) => props,
            Err(e) => {
                warn!(error = %e, "multi-function suggestion failed");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    info!(
        "{} functions analysed, {} multi-function properties",
        single_function_properties.len(),
        multi_function_properties.len()
    );

    SuggestionReport {
        module_name: module.to_string(),
        single_function_properties,
        multi_function_properties,
    }
}

/// Describe `functions` of `module` (all public ones when `None`) and
/// suggest properties for them.
pub async fn suggest(
    descriptor: &ModuleDescriptor,
    module: &str,
    functions: Option<&[String]>,
    llm: &dyn Completion,
    max_concurrent: usize,
) -> Result<SuggestionReport> {
    let infos = descriptor.describe(module, functions).await?;
    info!(module, functions = infos.len(), "suggesting properties");
    Ok(suggest_for(module, &infos, llm, max_concurrent).await)
}
