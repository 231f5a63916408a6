//! Probing candidate binaries.
//!
//! A probe runs the tool's version query, extracts the version token and
//! collects the supported formats. Each candidate moves through
//! `Unprobed -> Probing -> Valid | Invalid` exactly once per discovery pass.

use crate::config::{ProbeConfig, ToolKind};
use crate::discovery::formats::{fallback_formats, parse_format_list};
use crate::models::{InvalidReason, ToolInfo, ToolManager, ToolSource};
use crate::platform::{is_executable, CommandError, CommandRunner, CommandSpec};
use crate::version::extract_version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MAX_REASON_LEN: usize = 200;

/// Probe lifecycle of one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Unprobed,
    Probing,
    Valid(ToolInfo),
    Invalid(InvalidReason),
}

/// A path that may hold a usable binary, and what probing it found.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub tool: ToolKind,
    pub source: ToolSource,
    pub path: PathBuf,
    state: ProbeState,
}

impl Candidate {
    pub fn new(tool: ToolKind, source: ToolSource, path: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            source,
            path: path.into(),
            state: ProbeState::Unprobed,
        }
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    /// Probe once. Later calls keep the first outcome.
    pub async fn probe(&mut self, prober: &Prober) {
        if self.state != ProbeState::Unprobed {
            return;
        }
        self.state = ProbeState::Probing;
        self.state = match prober.probe(self.tool, &self.path).await {
            Ok(info) => ProbeState::Valid(info),
            Err(reason) => {
                debug!("{} candidate {} rejected: {}", self.tool, self.path.display(), reason);
                ProbeState::Invalid(reason)
            }
        };
    }

    pub fn into_manager(self) -> ToolManager {
        match self.state {
            ProbeState::Valid(info) => ToolManager::available(self.source, info),
            ProbeState::Invalid(reason) => ToolManager::unavailable(self.source, self.path, reason),
            ProbeState::Unprobed | ProbeState::Probing => ToolManager::unavailable(
                self.source,
                self.path,
                InvalidReason::SpawnFailed {
                    message: "candidate was never probed".into(),
                },
            ),
        }
    }
}

/// Runs probes through a [`CommandRunner`].
#[derive(Clone)]
pub struct Prober {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl Prober {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            timeout: ProbeConfig::PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe `path` as a `tool` binary.
    pub async fn probe(&self, tool: ToolKind, path: &Path) -> Result<ToolInfo, InvalidReason> {
        if !path.exists() {
            return Err(InvalidReason::NotFound);
        }
        if !is_executable(path) {
            return Err(InvalidReason::NotExecutable);
        }

        let output = self.run(path, tool.version_args()).await?;
        let version = extract_version(&output).ok_or_else(|| InvalidReason::UnrecognizedOutput {
            output: truncate(output.lines().next().unwrap_or_default()),
        })?;

        let (inputs, outputs) = self.formats(tool, path, &version).await;
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        debug!("Probed {} {} at {}", tool, version, path.display());

        Ok(ToolInfo {
            tool,
            version,
            path,
            is_working: true,
            supported_input_formats: inputs,
            supported_output_formats: outputs,
            detected_paths: Vec::new(),
            search_paths: Vec::new(),
        })
    }

    async fn formats(&self, tool: ToolKind, path: &Path, version: &str) -> (Vec<String>, Vec<String>) {
        let (fallback_inputs, fallback_outputs) = fallback_formats(tool, version);
        let Some((input_args, output_args)) = tool.format_query_args() else {
            return (fallback_inputs, fallback_outputs);
        };

        let (inputs, outputs) = tokio::join!(self.run(path, input_args), self.run(path, output_args));
        let pick = |result: Result<String, InvalidReason>, fallback: Vec<String>| {
            match result.map(|out| parse_format_list(&out)) {
                Ok(list) if !list.is_empty() => list,
                _ => fallback,
            }
        };
        (pick(inputs, fallback_inputs), pick(outputs, fallback_outputs))
    }

    async fn run(&self, path: &Path, args: &[&str]) -> Result<String, InvalidReason> {
        let spec = CommandSpec::new(path, self.timeout).args(args.iter().copied());
        let output = self.runner.run(spec).await.map_err(|e| match e {
            CommandError::TimedOut(t) => InvalidReason::Timeout { secs: t.as_secs().max(1) },
            CommandError::Spawn(err) => InvalidReason::SpawnFailed {
                message: err.to_string(),
            },
        })?;

        if !output.success {
            return Err(InvalidReason::NonZeroExit {
                code: output.code,
                stderr: truncate(output.stderr.trim()),
            });
        }
        Ok(output.stdout)
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_REASON_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_REASON_LEN).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::platform::CommandOutput;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted runner keyed by `(program, first argument)`.
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        responses: Mutex<HashMap<(PathBuf, String), FakeResponse>>,
    }

    #[derive(Clone)]
    pub(crate) enum FakeResponse {
        Ok(String),
        Fail(i32, String),
        Hang,
    }

    impl FakeRunner {
        pub(crate) fn respond(&self, program: &Path, arg: &str, response: FakeResponse) {
            self.responses
                .lock()
                .unwrap()
                .insert((program.to_path_buf(), arg.to_string()), response);
        }

        /// Respond like a pandoc binary of the given version.
        pub(crate) fn pandoc(&self, program: &Path, version: &str) {
            self.respond(program, "--version", FakeResponse::Ok(format!("pandoc {}\n", version)));
            self.respond(program, "--list-input-formats", FakeResponse::Ok("markdown\nhtml\n".into()));
            self.respond(
                program,
                "--list-output-formats",
                FakeResponse::Ok("html\npdf\ndocx\n".into()),
            );
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
            let arg = spec
                .args
                .first()
                .map(|a| a.to_string_lossy().into_owned())
                .unwrap_or_default();
            let response = self
                .responses
                .lock()
                .unwrap()
                .get(&(spec.program.clone(), arg))
                .cloned();
            match response {
                Some(FakeResponse::Ok(stdout)) => Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    stdout,
                    stderr: String::new(),
                }),
                Some(FakeResponse::Fail(code, stderr)) => Ok(CommandOutput {
                    success: false,
                    code: Some(code),
                    stdout: String::new(),
                    stderr,
                }),
                Some(FakeResponse::Hang) => Err(CommandError::TimedOut(spec.timeout)),
                None => Err(CommandError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no scripted response",
                ))),
            }
        }
    }

    /// Create an empty file that passes the executable check.
    pub(crate) fn touch_executable(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
        crate::platform::set_executable(path).unwrap();
    }

    pub(crate) fn exe(dir: &Path, name: &str) -> PathBuf {
        if cfg!(windows) {
            dir.join(format!("{}.exe", name))
        } else {
            dir.join(name)
        }
    }

    #[tokio::test]
    async fn test_probe_valid_pandoc() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = exe(dir.path(), "pandoc");
        touch_executable(&path);
        let runner = Arc::new(FakeRunner::default());
        runner.pandoc(&path, "3.1.2");

        let info = Prober::new(runner).probe(ToolKind::Pandoc, &path).await.unwrap();
        assert_eq!(info.version, "3.1.2");
        assert!(info.is_working);
        assert_eq!(info.supported_input_formats, vec!["markdown", "html"]);
        assert!(info.supports_output("pdf"));
    }

    #[tokio::test]
    async fn test_format_query_failure_uses_fallback() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = exe(dir.path(), "pandoc");
        touch_executable(&path);
        let runner = Arc::new(FakeRunner::default());
        runner.respond(&path, "--version", FakeResponse::Ok("pandoc 3.7.0.2".into()));
        runner.respond(&path, "--list-input-formats", FakeResponse::Fail(1, "nope".into()));
        runner.respond(&path, "--list-output-formats", FakeResponse::Ok("\n".into()));

        let info = Prober::new(runner).probe(ToolKind::Pandoc, &path).await.unwrap();
        assert!(info.supported_input_formats.contains(&"djot".to_string()));
        assert!(info.supported_output_formats.contains(&"typst".to_string()));
    }

    #[tokio::test]
    async fn test_probe_rejections() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::default());
        let prober = Prober::new(runner.clone());

        let missing = dir.path().join("missing");
        assert_eq!(
            prober.probe(ToolKind::Pandoc, &missing).await.unwrap_err(),
            InvalidReason::NotFound
        );

        let hanging = exe(dir.path(), "hanging");
        touch_executable(&hanging);
        runner.respond(&hanging, "--version", FakeResponse::Hang);
        assert!(matches!(
            prober.probe(ToolKind::Pandoc, &hanging).await.unwrap_err(),
            InvalidReason::Timeout { .. }
        ));

        let failing = exe(dir.path(), "failing");
        touch_executable(&failing);
        runner.respond(&failing, "--version", FakeResponse::Fail(127, "crash".into()));
        assert_eq!(
            prober.probe(ToolKind::Pandoc, &failing).await.unwrap_err(),
            InvalidReason::NonZeroExit {
                code: Some(127),
                stderr: "crash".into()
            }
        );

        let garbled = exe(dir.path(), "garbled");
        touch_executable(&garbled);
        runner.respond(&garbled, "--version", FakeResponse::Ok("hello world".into()));
        assert!(matches!(
            prober.probe(ToolKind::Pandoc, &garbled).await.unwrap_err(),
            InvalidReason::UnrecognizedOutput { .. }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_executable_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pandoc");
        std::fs::write(&path, b"").unwrap();

        let prober = Prober::new(Arc::new(FakeRunner::default()));
        assert_eq!(
            prober.probe(ToolKind::Pandoc, &path).await.unwrap_err(),
            InvalidReason::NotExecutable
        );
    }

    #[tokio::test]
    async fn test_candidate_state_machine() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = exe(dir.path(), "typst");
        touch_executable(&path);
        let runner = Arc::new(FakeRunner::default());
        runner.respond(&path, "--version", FakeResponse::Ok("typst 0.13.1 (8ace67d9)".into()));
        let prober = Prober::new(runner.clone());

        let mut candidate = Candidate::new(ToolKind::Typst, ToolSource::Managed, &path);
        assert_eq!(candidate.state(), &ProbeState::Unprobed);
        candidate.probe(&prober).await;
        assert!(matches!(candidate.state(), ProbeState::Valid(info) if info.version == "0.13.1"));

        // A second probe keeps the first outcome.
        runner.respond(&path, "--version", FakeResponse::Fail(1, String::new()));
        candidate.probe(&prober).await;
        assert!(matches!(candidate.state(), ProbeState::Valid(_)));

        let manager = candidate.into_manager();
        assert!(manager.is_available());
        assert_eq!(manager.source(), &ToolSource::Managed);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(500);
        assert_eq!(truncate(&long).len(), MAX_REASON_LEN + 3);
    }
}
