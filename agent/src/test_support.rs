//! Test-only doubles for the agent's seams.
//!
//! Enabled for this crate's tests and, through the `test-support` feature,
//! for other crates' integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Decision;
use crate::io::model::{ChatRequest, ModelClient};
use crate::io::pipeline::{PipelineMode, PipelineRun, PipelineRunner, PipelineStatus};
use crate::reason::Reasoner;

/// Reasoner that replays a fixed list of decisions.
///
/// Once the script runs out it keeps answering with an error decision.
pub struct ScriptedReasoner {
    script: RefCell<VecDeque<Decision>>,
    repeat: Option<Decision>,
    observations: RefCell<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            script: RefCell::new(decisions.into()),
            repeat: None,
            observations: RefCell::new(Vec::new()),
        }
    }

    /// Answer every call with `decision`.
    pub fn always(decision: Decision) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            repeat: Some(decision),
            observations: RefCell::new(Vec::new()),
        }
    }

    /// Observations received so far, in call order.
    pub fn observations(&self) -> Vec<String> {
        self.observations.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.observations.borrow().len()
    }
}

impl Reasoner for ScriptedReasoner {
    fn reason(&self, observation: &str) -> Decision {
        self.observations.borrow_mut().push(observation.to_string());
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .unwrap_or_else(|| Decision::error("scripted reasoner exhausted"))
    }
}

/// Model that replays canned replies (or errors) in order.
pub struct ScriptedModel {
    replies: RefCell<VecDeque<Result<String, String>>>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn from_results(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.borrow().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model exhausted")),
        }
    }
}

type PipelineFn = dyn Fn(&Path) -> Result<PipelineRun>;

/// Pipeline evaluated in-process by a closure.
///
/// `run_tests` uses the same closure and reports `PipelineMode::Fallback`.
pub struct ScriptedPipeline {
    check: Box<PipelineFn>,
    runs: Cell<u32>,
}

impl ScriptedPipeline {
    pub fn from_fn<F>(check: F) -> Self
    where
        F: Fn(&Path) -> Result<PipelineRun> + 'static,
    {
        Self {
            check: Box::new(check),
            runs: Cell::new(0),
        }
    }

    fn fixed(status: PipelineStatus, stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::from_fn(move |_| {
            Ok(PipelineRun {
                mode: PipelineMode::Script,
                status,
                stdout: stdout.clone(),
                stderr: String::new(),
            })
        })
    }

    pub fn passing() -> Self {
        Self::fixed(
            PipelineStatus::Passed,
            r#"{"overall_status": "pass", "checks": []}"#,
        )
    }

    pub fn failing(stdout: &str) -> Self {
        Self::fixed(PipelineStatus::Failed, stdout)
    }

    pub fn timing_out() -> Self {
        Self::fixed(PipelineStatus::TimedOut, "")
    }

    pub fn erroring(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_| Err(anyhow!(message.clone())))
    }

    /// Number of pipeline and test runs so far.
    pub fn runs(&self) -> u32 {
        self.runs.get()
    }
}

impl PipelineRunner for ScriptedPipeline {
    fn run(&self, workspace: &Path) -> Result<PipelineRun> {
        self.runs.set(self.runs.get() + 1);
        (self.check)(workspace)
    }

    fn run_tests(&self, workspace: &Path) -> Result<PipelineRun> {
        self.runs.set(self.runs.get() + 1);
        let mut run = (self.check)(workspace)?;
        run.mode = PipelineMode::Fallback;
        Ok(run)
    }
}

/// Scratch workspace in a temp directory.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write `contents`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.file(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.file(relative)).expect("read file")
    }
}
