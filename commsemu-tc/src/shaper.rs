use std::{collections::HashSet, collections::VecDeque, io, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    command::{self, Runner},
    directive::{Directive, QdiscNetemRequest},
};

/// Issues [`Directive`]s to the operating system's traffic control.
///
/// Implementations must be safe to call concurrently; ordering between calls is the caller's
/// concern.
#[async_trait]
pub trait Shaper: Send + Sync + 'static {
    /// Executes a single directive. An `Err` means the directive was not (fully) applied.
    async fn execute(&self, directive: &Directive) -> command::Result<()>;
}

#[async_trait]
impl<S: Shaper + ?Sized> Shaper for Arc<S> {
    async fn execute(&self, directive: &Directive) -> command::Result<()> {
        (**self).execute(directive).await
    }
}

/// A [`Shaper`] that runs the `tc` binary.
#[derive(Debug, Clone, Default)]
pub struct TcShaper {
    runner: Runner,
}

impl TcShaper {
    pub const PROGRAM: &'static str = "tc";

    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }

    /// The argument vector spawned for `directive`.
    pub fn command_line(&self, directive: &Directive) -> Vec<String> {
        self.runner.command_line(Self::PROGRAM, directive.args().as_slice())
    }
}

#[async_trait]
impl Shaper for TcShaper {
    async fn execute(&self, directive: &Directive) -> command::Result<()> {
        self.runner.run(Self::PROGRAM, directive.args().as_slice()).await.map(|_| ())
    }
}

#[derive(Debug, Default)]
struct Recording {
    directives: VecDeque<Directive>,
    history: Option<usize>,
    failing: HashSet<String>,
    stall: Option<Duration>,
}

/// A [`Shaper`] that records directives instead of executing them.
///
/// Cloning shares the recording. Interfaces can be marked as failing, in which case directives
/// for them are still recorded but reported as rejected. A stall delays every call, standing in
/// for a slow `tc`.
#[derive(Debug, Clone, Default)]
pub struct RecordingShaper {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingShaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `history` directives.
    pub fn with_history(self, history: usize) -> Self {
        self.inner.lock().history = Some(history);
        self
    }

    /// Directives for `interface` fail from now on.
    pub fn fail_interface(&self, interface: impl Into<String>) {
        self.inner.lock().failing.insert(interface.into());
    }

    /// Directives for `interface` succeed again.
    pub fn heal_interface(&self, interface: &str) {
        self.inner.lock().failing.remove(interface);
    }

    pub fn set_stall(&self, stall: Option<Duration>) {
        self.inner.lock().stall = stall;
    }

    /// Every recorded directive, oldest first.
    pub fn directives(&self) -> Vec<Directive> {
        self.inner.lock().directives.iter().cloned().collect()
    }

    /// Recorded netem directives, oldest first.
    pub fn netem_requests(&self) -> Vec<QdiscNetemRequest> {
        self.inner
            .lock()
            .directives
            .iter()
            .filter_map(|d| match d {
                Directive::Netem(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().directives.clear();
    }
}

#[async_trait]
impl Shaper for RecordingShaper {
    async fn execute(&self, directive: &Directive) -> command::Result<()> {
        let (stall, fails) = {
            let mut recording = self.inner.lock();
            if let Some(history) = recording.history {
                while recording.directives.len() >= history.max(1) {
                    recording.directives.pop_front();
                }
            }
            recording.directives.push_back(directive.clone());
            (recording.stall, recording.failing.contains(directive.interface()))
        };

        tracing::info!(%directive, "recorded directive");

        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }

        if fails {
            return Err(io::Error::other(format!("{} rejected", directive.interface())).into());
        }

        Ok(())
    }
}
