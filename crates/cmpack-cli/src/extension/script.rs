//! Evaluating project scripts through an external JavaScript runtime.
//!
//! Values cross the process boundary as JSON on stdin/stdout. Regular
//! expressions travel as `{"regex": "<source>"}`; functions in a mock module
//! are replaced by [`HANDLER_MARKER`] and invoked later, one process per
//! request.

use crate::bundler_config::BundlerConfig;
use crate::error::ConfigError;
use crate::extension::{ConfigOverride, ConfigScript};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Key of the object standing in for a function exported by a mock module.
pub const HANDLER_MARKER: &str = "__cmpackHandler";

const PRELUDE: &str = r#"
const { pathToFileURL } = require('url');
const out = v => JSON.stringify(v === undefined ? null : v, (k, x) =>
  typeof x === 'function' ? { __cmpackHandler: true }
  : x instanceof RegExp ? { regex: x.source } : x);
const revive = (k, x) => x && typeof x === 'object' && !Array.isArray(x)
  && Object.keys(x).length === 1 && typeof x.regex === 'string' ? new RegExp(x.regex) : x;
const load = p => import(pathToFileURL(p).href).then(m => (m && 'default' in m ? m.default : m));
const stdin = () => new Promise(r => { let d = ''; process.stdin.on('data', c => (d += c)).on('end', () => r(d)); });
const fail = e => { console.error((e && e.stack) || String(e)); process.exit(1); };
"#;

const EVALUATE: &str = r#"
load(process.argv[1]).then(v => process.stdout.write(out(v))).catch(fail);
"#;

const EVALUATE_TRACKED: &str = r#"
load(process.argv[1]).then(v => process.stdout.write('{"value":' + out(v)
  + ',"files":' + JSON.stringify(Object.keys(require.cache)) + '}')).catch(fail);
"#;

const APPLY: &str = r#"
Promise.all([load(process.argv[1]), stdin()])
  .then(([f, d]) => f(JSON.parse(d, revive), process.argv[2]))
  .then(v => process.stdout.write(out(v))).catch(fail);
"#;

const INVOKE: &str = r#"
Promise.all([load(process.argv[1]), stdin()]).then(([m, d]) => {
  const req = JSON.parse(d);
  const res = { statusCode: 200, headers: {}, body: null,
    status(c) { this.statusCode = c; return this; },
    set(k, v) { this.headers[k] = String(v); return this; },
    json(b) { this.body = b; return this; },
    send(b) { this.body = b; return this; },
    end(b) { if (b !== undefined) this.body = b; return this; } };
  return Promise.resolve(m[process.argv[2]](req, res)).then(() =>
    process.stdout.write(JSON.stringify({ status: res.statusCode, headers: res.headers, body: res.body })));
}).catch(fail);
"#;

/// Runs project scripts with the configured runtime (`CMPACK_NODE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRunner {
    program: String,
    args: Vec<String>,
}

impl ScriptRunner {
    /// Build a runner from a command line such as `node` or
    /// `node --experimental-vm-modules`.
    pub fn new(command_line: &str) -> Self {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "node".to_string());
        Self {
            program,
            args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn snippet_args(&self, body: &str, path: &Path, extra: &[&str]) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("-e".to_string());
        args.push(format!("{PRELUDE}{body}"));
        args.push(path.display().to_string());
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    fn run(
        &self,
        body: &str,
        path: &Path,
        extra: &[&str],
        input: Option<&[u8]>,
    ) -> Result<Value, ConfigError> {
        let script_error = |message: String| ConfigError::Script {
            path: path.to_path_buf(),
            message,
        };

        tracing::debug!(program = %self.program, path = %path.display(), "evaluating script");

        let mut child = Command::new(&self.program)
            .args(self.snippet_args(body, path, extra))
            .current_dir(path.parent().unwrap_or(Path::new(".")))
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| script_error(format!("failed to start '{}': {}", self.program, e)))?;

        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin
                .write_all(bytes)
                .map_err(|e| script_error(format!("failed to write input: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| script_error(e.to_string()))?;

        decode_output(output.status.success(), &output.stdout, &output.stderr)
            .map_err(script_error)
    }

    /// Evaluate a module and return its (default) export as JSON.
    pub fn evaluate_module(&self, path: &Path) -> Result<Value, ConfigError> {
        self.run(EVALUATE, path, &[], None)
    }

    /// Like [`ScriptRunner::evaluate_module`], also returning every CommonJS
    /// file the module loaded.
    pub fn evaluate_module_tracked(
        &self,
        path: &Path,
    ) -> Result<(Value, Vec<PathBuf>), ConfigError> {
        self.run(EVALUATE_TRACKED, path, &[], None)
            .map(split_tracked)
    }

    /// Call the function exported by `path` with `(config, environment)`.
    pub fn apply_override(
        &self,
        path: &Path,
        config: &Value,
        environment: &str,
    ) -> Result<Value, ConfigError> {
        let input = serde_json::to_vec(config).map_err(|e| ConfigError::Script {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.run(APPLY, path, &[environment], Some(&input))
    }

    /// Invoke the handler exported under `key` by a mock module.
    ///
    /// The handler receives a request object decoded from `request` and an
    /// express-style response recorder; the result is
    /// `{ status, headers, body }`.
    pub async fn invoke_handler(
        &self,
        path: &Path,
        key: &str,
        request: &Value,
    ) -> Result<Value, ConfigError> {
        use tokio::io::AsyncWriteExt;

        let script_error = |message: String| ConfigError::Script {
            path: path.to_path_buf(),
            message,
        };
        let input = serde_json::to_vec(request).map_err(|e| script_error(e.to_string()))?;

        let mut child = tokio::process::Command::new(&self.program)
            .args(self.snippet_args(INVOKE, path, &[key]))
            .current_dir(path.parent().unwrap_or(Path::new(".")))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| script_error(format!("failed to start '{}': {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| script_error(format!("failed to write input: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| script_error(e.to_string()))?;

        decode_output(output.status.success(), &output.stdout, &output.stderr)
            .map_err(script_error)
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new("node")
    }
}

impl ConfigScript for ScriptRunner {
    fn evaluate(&self, path: &Path) -> Result<Value, ConfigError> {
        self.evaluate_module(path)
    }
}

fn decode_output(success: bool, stdout: &[u8], stderr: &[u8]) -> Result<Value, String> {
    if !success {
        let stderr = String::from_utf8_lossy(stderr).trim().to_string();
        return Err(if stderr.is_empty() {
            "script exited with an error".to_string()
        } else {
            stderr
        });
    }
    serde_json::from_slice(stdout).map_err(|e| format!("script did not produce JSON: {}", e))
}

fn split_tracked(mut document: Value) -> (Value, Vec<PathBuf>) {
    let files = match document.get_mut("files").map(Value::take) {
        Some(Value::Array(files)) => files
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect(),
        _ => Vec::new(),
    };
    let value = document
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);
    (value, files)
}

/// The project's `webpack.config.js`, run through a [`ScriptRunner`].
#[derive(Debug, Clone)]
pub struct ScriptOverride {
    runner: ScriptRunner,
    path: PathBuf,
}

impl ScriptOverride {
    pub fn new(runner: ScriptRunner, path: PathBuf) -> Self {
        Self { runner, path }
    }
}

impl ConfigOverride for ScriptOverride {
    fn apply(
        &self,
        config: BundlerConfig,
        environment: &str,
    ) -> Result<BundlerConfig, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidShape {
            path: self.path.clone(),
            message,
        };
        let input = serde_json::to_value(&config).map_err(|e| invalid(e.to_string()))?;
        let output = self.runner.apply_override(&self.path, &input, environment)?;
        serde_json::from_value(output).map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_splits_command_line() {
        let runner = ScriptRunner::new("node --no-warnings");
        assert_eq!(runner.program(), "node");
        let args = runner.snippet_args(EVALUATE, Path::new("/app/.cmpack.js"), &[]);
        assert_eq!(args[0], "--no-warnings");
        assert_eq!(args[1], "-e");
        assert!(args[2].contains("pathToFileURL"));
        assert_eq!(args[3], "/app/.cmpack.js");
    }

    #[test]
    fn test_empty_command_line_defaults_to_node() {
        assert_eq!(ScriptRunner::new("  ").program(), "node");
    }

    #[test]
    fn test_decode_output() {
        assert_eq!(
            decode_output(true, br#"{"a":1}"#, b""),
            Ok(serde_json::json!({ "a": 1 }))
        );
        assert_eq!(
            decode_output(false, b"", b"  SyntaxError: nope \n"),
            Err("SyntaxError: nope".to_string())
        );
        assert!(decode_output(true, b"not json", b"").is_err());
    }

    #[test]
    fn test_split_tracked() {
        let (value, files) = split_tracked(serde_json::json!({
            "value": { "GET /api": { "ok": true } },
            "files": ["/app/.cmpack.mock.js", "/app/fixtures/users.js"]
        }));
        assert_eq!(value, serde_json::json!({ "GET /api": { "ok": true } }));
        assert_eq!(
            files,
            vec![
                PathBuf::from("/app/.cmpack.mock.js"),
                PathBuf::from("/app/fixtures/users.js")
            ]
        );

        let (value, files) = split_tracked(serde_json::json!({ "value": null }));
        assert_eq!(value, Value::Null);
        assert!(files.is_empty());
    }

    #[test]
    fn test_missing_runtime_is_script_error() {
        let runner = ScriptRunner::new("cmpack-no-such-runtime-binary");
        let err = runner
            .evaluate_module(Path::new("/tmp/.cmpack.js"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Script { .. }));
        assert!(err.to_string().contains("failed to start"));
    }
}
