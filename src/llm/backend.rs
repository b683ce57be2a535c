use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::llm::parse::{extract_code_block, parse_structured};
use crate::llm::prompt::LlmPrompt;

/// JSON schema the response must conform to.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

/// One prompt in, one completion out.
///
/// With a schema the returned text is expected to be JSON conforming to it;
/// without one it is free text. Timeouts and retries belong to the
/// implementation.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &LlmPrompt, schema: Option<&ResponseSchema>) -> Result<String>;
}

pub async fn complete_structured<T: DeserializeOwned>(
    llm: &dyn Completion,
    prompt: &LlmPrompt,
    schema: &ResponseSchema,
) -> Result<T> {
    let text = llm.complete(prompt, Some(schema)).await?;
    parse_structured(&text)
}

/// Free-text completion reduced to the code it contains.
pub async fn complete_code(llm: &dyn Completion, prompt: &LlmPrompt) -> Result<String> {
    let text = llm.complete(prompt, None).await?;
    Ok(extract_code_block(&text))
}
