#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use hypollm::error::{Error, Result};
use hypollm::llm::backend::{Completion, ResponseSchema};
use hypollm::llm::prompt::LlmPrompt;

pub enum Reply {
    Text(String),
    Fail,
}

/// In-memory completion keyed on what a prompt is about.
///
/// A prompt is routed to the first script entry whose needle it contains.
#[derive(Default)]
pub struct Scripted {
    script: Vec<(String, Duration, Reply)>,
    prompts: Mutex<Vec<(String, Option<&'static str>)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer prompts about function `name`, i.e. containing `def name(`.
    pub fn on(self, name: &str, delay_ms: u64, reply: Reply) -> Self {
        self.on_text(&format!("def {name}("), delay_ms, reply)
    }

    pub fn on_text(mut self, needle: &str, delay_ms: u64, reply: Reply) -> Self {
        self.script
            .push((needle.to_string(), Duration::from_millis(delay_ms), reply));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn prompt_for(&self, test: &str) -> Option<String> {
        let needle = format!("def {test}(");
        self.prompts().into_iter().find(|p| p.contains(&needle))
    }

    /// Name of the response schema sent with the prompt about `test`;
    /// `None` when no such prompt was sent.
    pub fn schema_for(&self, test: &str) -> Option<Option<&'static str>> {
        let needle = format!("def {test}(");
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p.contains(&needle))
            .map(|(_, schema)| *schema)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completion for Scripted {
    async fn complete(&self, prompt: &LlmPrompt, schema: Option<&ResponseSchema>) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.user.clone(), schema.map(|s| s.name)));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let entry = self
            .script
            .iter()
            .find(|(needle, _, _)| prompt.user.contains(needle.as_str()));

        let result = match entry {
            Some((_, delay, reply)) => {
                tokio::time::sleep(*delay).await;
                match reply {
                    Reply::Text(t) => Ok(t.clone()),
                    Reply::Fail => Err(Error::Llm("scripted failure".into())),
                }
            }
            None => Err(Error::Llm("no scripted reply".into())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Verdict JSON whose diagnosis names the test it was written for.
pub fn verdict_json(test: &str, acceptable: bool) -> Reply {
    Reply::Text(format!(
        r#"{{"acceptable": {acceptable}, "diagnosis": "about {test}", "remedy": "fix {test}"}}"#
    ))
}

pub const SAMPLE: &str = r#""""Sample property tests."""

import math
from hypothesis import given, strategies as st


@given(st.integers())
def test_a(x):
    assert x == x


# doubling is monotone
@given(st.integers(), st.integers())
def test_b(x, y):
    if x <= y:
        assert 2 * x <= 2 * y


@given(st.floats())
def test_c(x):
    assert math.isclose(x + 0.0, x)


def test_d():
    assert sorted([3, 1, 2]) == [1, 2, 3]


@given(st.lists(st.integers()))
def test_e(xs):
    assert len(sorted(xs)) == len(xs)
"#;

pub const SAMPLE_JUNIT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<testsuites><testsuite name="pytest" errors="0" failures="1" skipped="0" tests="4">
<testcase classname="test_sample" name="test_a" time="0.010" />
<testcase classname="test_sample" name="test_b" time="0.020" />
<testcase classname="test_sample" name="test_c" time="0.030"><failure message="AssertionError">Falsifying example: test_c(
    x=nan,
)

AssertionError: assert False</failure></testcase>
<testcase classname="test_sample" name="test_d" time="0.001" />
</testsuite></testsuites>
"#;
