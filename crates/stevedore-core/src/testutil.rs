//! Scripted sandbox for unit tests.
//!
//! Queues canned exec results, records every interaction, and backs
//! files with an in-memory map. An exec entry can mutate files to
//! model the package manager rewriting the manifest as a side effect.

use crate::sandbox::{
    ExecRequest, ExecResult, LineSender, OutputLine, OutputSource, Sandbox, SandboxError,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// One scripted command outcome.
pub(crate) struct ScriptedExec {
    pub result: ExecResult,
    /// Files written as a side effect of the command.
    pub set_files: Vec<(PathBuf, String)>,
}

impl ScriptedExec {
    pub fn ok(stdout: &str) -> Self {
        Self {
            result: ExecResult {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
                timed_out: false,
            },
            set_files: Vec::new(),
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            result: ExecResult {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
                timed_out: false,
            },
            set_files: Vec::new(),
        }
    }

    pub fn set_file(mut self, path: &str, contents: &str) -> Self {
        self.set_files.push((PathBuf::from(path), contents.to_string()));
        self
    }
}

/// A detached-process launch observed by the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpawnRecord {
    pub command: String,
    pub env: Vec<(String, String)>,
}

#[derive(Default)]
pub(crate) struct ScriptedSandbox {
    execs: Mutex<VecDeque<ScriptedExec>>,
    exec_calls: Mutex<Vec<String>>,
    files: Mutex<HashMap<PathBuf, String>>,
    touched: Mutex<Vec<PathBuf>>,
    spawned: Mutex<Vec<SpawnRecord>>,
    signals: Mutex<Vec<u32>>,
    pkills: Mutex<Vec<String>>,
    next_pid: AtomicU32,
    fail_next_exec: AtomicBool,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(4000),
            ..Self::default()
        }
    }

    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), contents.to_string());
        self
    }

    pub fn push_exec(self, exec: ScriptedExec) -> Self {
        self.execs.lock().unwrap().push_back(exec);
        self
    }

    /// Make the next `exec` fail at the transport level, as if the
    /// command binary did not exist.
    pub fn with_exec_failure(self) -> Self {
        self.fail_next_exec.store(true, Ordering::SeqCst);
        self
    }

    pub fn exec_count(&self) -> usize {
        self.exec_calls.lock().unwrap().len()
    }

    pub fn exec_calls(&self) -> Vec<String> {
        self.exec_calls.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }

    pub fn touched(&self) -> Vec<PathBuf> {
        self.touched.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<SpawnRecord> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<u32> {
        self.signals.lock().unwrap().clone()
    }

    pub fn pkills(&self) -> Vec<String> {
        self.pkills.lock().unwrap().clone()
    }

    fn stream(text: &str, source: OutputSource, lines: &LineSender) {
        for line in text.lines() {
            let _ = lines.send(OutputLine {
                source,
                text: line.to_string(),
            });
        }
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn exec(
        &self,
        req: &ExecRequest,
        lines: Option<LineSender>,
    ) -> Result<ExecResult, SandboxError> {
        if self.fail_next_exec.swap(false, Ordering::SeqCst) {
            return Err(SandboxError::Spawn {
                program: req.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
            });
        }
        self.exec_calls.lock().unwrap().push(req.command_line());
        let scripted = self
            .execs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedExec::ok(""));

        if let Some(tx) = &lines {
            Self::stream(&scripted.result.stdout, OutputSource::Stdout, tx);
            Self::stream(&scripted.result.stderr, OutputSource::Stderr, tx);
        }
        let mut files = self.files.lock().unwrap();
        for (path, contents) in &scripted.set_files {
            files.insert(path.clone(), contents.clone());
        }
        Ok(scripted.result)
    }

    async fn read_file(&self, path: &Path) -> Result<String, SandboxError> {
        self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
            SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            ))
        })
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), SandboxError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    async fn touch(&self, path: &Path) -> Result<(), SandboxError> {
        self.touched.lock().unwrap().push(path.to_path_buf());
        self.files
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default();
        Ok(())
    }

    async fn spawn_detached(&self, req: &ExecRequest) -> Result<u32, SandboxError> {
        self.spawned.lock().unwrap().push(SpawnRecord {
            command: req.command_line(),
            env: req.env.clone(),
        });
        Ok(self.next_pid.fetch_add(1, Ordering::SeqCst))
    }

    async fn signal(&self, pid: u32) -> Result<(), SandboxError> {
        self.signals.lock().unwrap().push(pid);
        Ok(())
    }

    async fn kill_by_pattern(&self, pattern: &str) -> Result<(), SandboxError> {
        self.pkills.lock().unwrap().push(pattern.to_string());
        Ok(())
    }
}
