// src/testgen/write.rs
//
// Test file generation from a suggestion report.

use std::collections::HashMap;

use tracing::info;

use crate::error::{Error, Result};
use crate::executor::run::run_bounded;
use crate::introspect::{FunctionInfo, ModuleDescriptor};
use crate::llm::backend::{complete_code, Completion};
use crate::llm::prompt::{write_multi_prompt, write_single_prompt};
use crate::testgen::assemble::assemble;
use crate::testgen::candidate::{MultiPropertySuggestion, PropertySuggestion, SuggestionReport};

/// Module docstring and imports of a generated test file.
pub fn render_header(module: &str, functions: &[String]) -> String {
    let imports = match functions {
        [] => format!("# No functions to import from {module}"),
        [only] => format!("from {module} import {only}"),
        many => {
            let body: Vec<String> = many.iter().map(|f| format!("    {f}")).collect();
            format!("from {module} import (\n{}\n)", body.join(",\n"))
        }
    };

    format!(
        "\"\"\"Property-based tests for {module} module.\nGenerated by hypollm.\n\"\"\"\n\n\
         import hypothesis\n\
         from hypothesis import given, strategies as st\n\
         {imports}\n"
    )
}

fn lookup<'a>(
    infos: &'a HashMap<String, FunctionInfo>,
    module: &str,
    name: &str,
) -> Result<&'a FunctionInfo> {
    infos.get(name).ok_or_else(|| Error::FunctionNotFound {
        module: module.to_string(),
        function: name.to_string(),
    })
}

/// Generate the test file for `report` from already-described functions.
///
/// Functions with no properties and multi-function properties naming no
/// function are skipped. A failed or empty generation leaves its test out.
pub async fn write_with_infos(
    report: &SuggestionReport,
    infos: &HashMap<String, FunctionInfo>,
    llm: &dyn Completion,
    max_concurrent: usize,
) -> Result<String> {
    let module = report.module_name.as_str();

    let mut singles: Vec<(&FunctionInfo, &[PropertySuggestion])> = Vec::new();
    for (name, props) in &report.single_function_properties {
        if !props.is_empty() {
            singles.push((lookup(infos, module, name)?, props.as_slice()));
        }
    }

    let mut multis: Vec<(&MultiPropertySuggestion, Vec<FunctionInfo>)> = Vec::new();
    for prop in &report.multi_function_properties {
        if prop.functions_involved.is_empty() {
            continue;
        }
        let involved = prop
            .functions_involved
            .iter()
            .map(|n| lookup(infos, module, n).cloned())
            .collect::<Result<Vec<_>>>()?;
        multis.push((prop, involved));
    }

    info!(
        "generating tests for {} functions and {} multi-function properties",
        singles.len(),
        multis.len()
    );

    let single_tests = run_bounded(
        singles,
        max_concurrent,
        |(f, _)| format!("{}()", f.name),
        |(f, props)| async move { complete_code(llm, &write_single_prompt(module, f, props)).await },
    )
    .await;

    let multi_tests = run_bounded(
        multis,
        max_concurrent,
        |_| "multi-function property".to_string(),
        |(prop, involved)| async move {
            complete_code(llm, &write_multi_prompt(module, prop, &involved)).await
        },
    )
    .await;

    let keep = |tests: Vec<Option<String>>| -> Vec<String> {
        tests
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect()
    };

    let header = render_header(module, &report.referenced_functions());
    Ok(assemble(&header, &keep(single_tests), &keep(multi_tests)))
}

/// Describe every function `report` references, then generate its tests.
pub async fn write(
    report: &SuggestionReport,
    descriptor: &ModuleDescriptor,
    llm: &dyn Completion,
    max_concurrent: usize,
) -> Result<String> {
    let names = report.referenced_functions();
    let infos = if names.is_empty() {
        HashMap::new()
    } else {
        descriptor
            .describe(&report.module_name, Some(names.as_slice()))
            .await?
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect()
    };

    write_with_infos(report, &infos, llm, max_concurrent).await
}
