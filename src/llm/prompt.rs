use crate::introspect::FunctionInfo;
use crate::testgen::candidate::{MultiPropertySuggestion, PropertySuggestion};
use crate::testgen::report::ExecutionOutcome;
use crate::testgen::review::ReviewVerdict;

#[derive(Debug, Clone)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

impl LlmPrompt {
    fn new(user: String) -> Self {
        Self {
            system: system_prompt(),
            user,
        }
    }
}

/* ============================================================
   System prompt (stable, reused)
   ============================================================ */

fn system_prompt() -> String {
    r#"
You are an expert in property-based testing with the Python `hypothesis` library.

Rules:
- Properties must be precise and testable
- Tests must be deterministic apart from hypothesis-generated inputs
- Never change the code under test
- Answer with exactly what is asked for, nothing else
"#
    .trim()
    .to_string()
}

const AVAILABLE_IMPORTS: &str = "\
Assume these imports are already available, together with the function(s) under test:
```python
import hypothesis
from hypothesis import given, strategies as st
```
Anything else must be imported inside the test function itself.
";

const TEST_GUIDELINES: &str = "\
GUIDELINES
- Use `@given` with strategies inferred from the signature or docstring
- Assert the stated property directly
- Explain the property in a short docstring so a human can review it
- Handle edge cases and expected exceptions explicitly
- Name the test after the property it checks

Avoid these, prefer the alternative:
- `st.data()`: use a proper strategy unless it is genuinely needed
- `assume()`: use a proper strategy, or `.filter()` / `.map()`
- `st.floats()` for compared values: `st.floats(allow_nan=False, allow_infinity=False)`
- exact float equality: `math.isclose`, `numpy.isclose` or `numpy.allclose`
";

const CONFIDENCE_SCALE: &str = "\
Confidence scale:
- certain: follows from a mathematical definition
- high: a well-established pattern
- medium: likely but not guaranteed
- low: speculative
- uncertain: you are unsure
";

fn describe_function(out: &mut String, f: &FunctionInfo) {
    out.push_str(&format!("Function: {}\n", f.name));
    out.push_str(&format!(
        "Signature: {}\n",
        f.signature.as_deref().unwrap_or("(unknown)")
    ));
    out.push_str(&format!("Docstring: {}\n", f.docstring));
    out.push_str("Source:\n```python\n");
    out.push_str(f.source.trim_end());
    out.push_str("\n```\n");
}

/* ============================================================
   Review
   ============================================================ */

pub fn review_prompt(test_source: &str, outcome: &ExecutionOutcome) -> LlmPrompt {
    let mut out = String::new();

    out.push_str("TEST\n```python\n");
    out.push_str(test_source);
    out.push_str("\n```\n\n");

    out.push_str("EXECUTION RESULT\n");
    out.push_str(&outcome.render());
    out.push('\n');

    out.push_str(
        "TASK\n\
         Decide whether this test is acceptable.\n\n\
         If it PASSED:\n\
         - acceptable=true when the test is well written\n\
         - acceptable=false when the test code itself has problems\n\n\
         If it FAILED or ERRORED:\n\
         - acceptable=true when the failure looks like a genuine bug in the code under test; say why in diagnosis\n\
         - acceptable=false when the test itself is wrong; describe the problem and a concrete remedy\n\n\
         Typical test defects:\n\
         - strategies producing invalid values (overflow, NaN, undefined names)\n\
         - float tolerances that are too strict or too loose\n\
         - missing imports or syntax errors\n\
         - a property that does not actually hold\n\n\
         Typical signs of a genuine bug:\n\
         - sound test logic contradicted by the implementation\n\
         - a property that must hold failing on valid inputs\n\
         - error messages pointing into the implementation\n\n",
    );

    out.push_str(AVAILABLE_IMPORTS);
    out.push_str("\nRespond with JSON: {\"acceptable\": bool, \"diagnosis\": string, \"remedy\": string}.\n");

    LlmPrompt::new(out)
}

/* ============================================================
   Repair
   ============================================================ */

pub fn improve_prompt(test_source: &str, verdict: &ReviewVerdict) -> LlmPrompt {
    let mut out = String::new();

    out.push_str("TEST\n```python\n");
    out.push_str(test_source);
    out.push_str("\n```\n\n");

    out.push_str(&format!("PROBLEM\n{}\n\n", verdict.diagnosis.trim()));
    out.push_str(&format!("REMEDY\n{}\n\n", verdict.remedy.trim()));

    out.push_str(AVAILABLE_IMPORTS);
    out.push_str(
        "\nRewrite the function with the remedy applied:\n\
         1. Keep the same function name and overall structure\n\
         2. Apply the remedy above\n\
         3. Keep the property logic sound\n\
         4. Use appropriate hypothesis strategies\n\
         5. Import anything extra inside the function\n\n",
    );
    out.push_str(TEST_GUIDELINES);
    out.push_str("\nReturn only the fixed function code, no prose.\n");

    LlmPrompt::new(out)
}

/* ============================================================
   Suggest
   ============================================================ */

pub fn suggest_single_prompt(f: &FunctionInfo) -> LlmPrompt {
    let mut out = String::new();

    out.push_str("FUNCTION\n");
    describe_function(&mut out, f);

    out.push_str(
        "\nTASK\n\
         List the mathematical or logical properties this function should satisfy.\n\
         For each: state it precisely, explain why it should hold, rate your confidence.\n\n\
         Look for:\n\
         - algebraic laws (commutativity, associativity, identity)\n\
         - invariants and bounds\n\
         - monotonicity\n\
         - edge case behaviour\n\n",
    );
    out.push_str(CONFIDENCE_SCALE);

    LlmPrompt::new(out)
}

pub fn suggest_multi_prompt(functions: &[FunctionInfo]) -> LlmPrompt {
    let mut out = String::new();

    out.push_str("FUNCTIONS\n");
    for (i, f) in functions.iter().enumerate() {
        out.push_str(&format!("\n#{}\n", i + 1));
        describe_function(&mut out, f);
    }

    out.push_str(
        "\nTASK\n\
         List properties that relate two or more of these functions.\n\
         For each: state it precisely, explain why it should hold, name the functions involved, rate your confidence.\n\n\
         Look for:\n\
         - inverse pairs (f(g(x)) == x)\n\
         - composition and algebraic relationships\n\
         - shared domain or range constraints\n\
         - symmetries and functional equations\n\n\
         Skip properties that involve a single function.\n\n",
    );
    out.push_str(CONFIDENCE_SCALE);

    LlmPrompt::new(out)
}

/* ============================================================
   Write
   ============================================================ */

pub fn write_single_prompt(
    module: &str,
    f: &FunctionInfo,
    properties: &[PropertySuggestion],
) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(&format!("MODULE\n{module}\n\n"));
    out.push_str("FUNCTION\n");
    describe_function(&mut out, f);

    out.push_str("\nPROPERTIES\n");
    for (i, p) in properties.iter().enumerate() {
        out.push_str(&format!("{}. {} (confidence: {})\n", i + 1, p.property, p.confidence));
    }

    out.push('\n');
    out.push_str(TEST_GUIDELINES);
    out.push('\n');
    out.push_str(AVAILABLE_IMPORTS);
    out.push_str("\nGenerate only the hypothesis test functions.\n");

    LlmPrompt::new(out)
}

pub fn write_multi_prompt(
    module: &str,
    property: &MultiPropertySuggestion,
    functions: &[FunctionInfo],
) -> LlmPrompt {
    let mut out = String::new();

    out.push_str(&format!("MODULE\n{module}\n\n"));
    out.push_str(&format!(
        "PROPERTY\n{} (confidence: {})\nReasoning: {}\n\n",
        property.property, property.confidence, property.reasoning
    ));

    out.push_str("FUNCTIONS INVOLVED\n");
    for f in functions {
        describe_function(&mut out, f);
        out.push('\n');
    }

    out.push_str(TEST_GUIDELINES);
    out.push('\n');
    out.push_str(AVAILABLE_IMPORTS);
    out.push_str("\nGenerate only the hypothesis test function.\n");

    LlmPrompt::new(out)
}
