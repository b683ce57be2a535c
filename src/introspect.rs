//! Module descriptor: signature, docstring and source of functions in a
//! Python module, obtained by asking the interpreter itself.

use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

const DESCRIBE_SCRIPT: &str = r#"
import importlib, inspect, json, sys

def emit(obj):
    print(json.dumps(obj))
    sys.exit(0)

try:
    mod = importlib.import_module(sys.argv[1])
except ImportError as e:
    emit({"error": "module", "detail": str(e)})

names = sys.argv[2:] or [n for n, _ in inspect.getmembers(mod, callable) if not n.startswith("_")]
out = []
for name in names:
    obj = getattr(mod, name, None)
    if obj is None or not callable(obj):
        emit({"error": "function", "detail": name})
    try:
        source = inspect.getsource(obj)
    except (TypeError, OSError):
        source = ""
    try:
        signature = str(inspect.signature(obj))
    except (TypeError, ValueError):
        signature = None
    out.append({
        "name": name,
        "signature": signature,
        "docstring": inspect.getdoc(obj) or "",
        "source": source,
    })

emit({"functions": out})
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub signature: Option<String>,
    pub docstring: String,
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct DescribeOutput {
    error: Option<String>,
    detail: Option<String>,
    #[serde(default)]
    functions: Vec<FunctionInfo>,
}

#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    python: String,
}

impl ModuleDescriptor {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Describe `functions` of `module`, or every public callable when `None`.
    pub async fn describe(&self, module: &str, functions: Option<&[String]>) -> Result<Vec<FunctionInfo>> {
        debug!(module, python = %self.python, "introspecting module");

        let output = Command::new(&self.python)
            .arg("-c")
            .arg(DESCRIBE_SCRIPT)
            .arg(module)
            .args(functions.unwrap_or_default())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                command: self.python.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::Introspect(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_describe_output(module, &String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_describe_output(module: &str, stdout: &str) -> Result<Vec<FunctionInfo>> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| Error::Introspect("interpreter printed nothing".into()))?;

    let out: DescribeOutput = serde_json::from_str(line)
        .map_err(|e| Error::Introspect(format!("unreadable descriptor output: {e}")))?;

    match out.error.as_deref() {
        None => Ok(out.functions),
        Some("module") => Err(Error::ModuleNotFound(module.to_string())),
        Some("function") => Err(Error::FunctionNotFound {
            module: module.to_string(),
            function: out.detail.unwrap_or_default(),
        }),
        Some(other) => Err(Error::Introspect(other.to_string())),
    }
}
