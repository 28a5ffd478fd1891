//! Background task table

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::exec::{self, CommandOutput};
use super::output::{drain, pump, CaptureBuffer};
use super::{CommandSpec, TaskId, TaskSnapshot, TaskStatus, TaskSummary};
use crate::error::TaskError;
use crate::CallContext;

/// How long a finished process's pipes may stay open before readers are detached
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Limits for synchronous runs and task retention
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub default_timeout: Duration,
    /// Byte ceiling for each of stdout/stderr in synchronous runs
    pub max_output_bytes: usize,
    /// Keep at most this many terminal tasks; `None` keeps all of them
    pub retention: Option<usize>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            max_output_bytes: 10 * 1024 * 1024,
            retention: None,
        }
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    exit_code: Option<i32>,
    ended_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
}

struct TaskRecord {
    id: TaskId,
    command: String,
    started_at: DateTime<Utc>,
    started: Instant,
    stdout: CaptureBuffer,
    stderr: CaptureBuffer,
    state: Mutex<TaskState>,
    cancel: CancellationToken,
}

impl TaskRecord {
    fn new(id: TaskId, command: String) -> Self {
        Self {
            id,
            command,
            started_at: Utc::now(),
            started: Instant::now(),
            stdout: CaptureBuffer::unbounded(),
            stderr: CaptureBuffer::unbounded(),
            state: Mutex::new(TaskState {
                status: TaskStatus::Created,
                exit_code: None,
                ended_at: None,
                duration: None,
            }),
            cancel: CancellationToken::new(),
        }
    }

    fn mark_running(&self) {
        let mut state = self.state.lock();
        if state.status == TaskStatus::Created {
            state.status = TaskStatus::Running;
        }
    }

    /// The single terminal transition. Only a running task moves; every
    /// later call is a no-op and returns false.
    fn finish(&self, status: TaskStatus, exit_code: Option<i32>) -> bool {
        debug_assert!(status.is_terminal());
        let mut state = self.state.lock();
        if state.status != TaskStatus::Running {
            return false;
        }
        state.status = status;
        state.exit_code = exit_code;
        state.ended_at = Some(Utc::now());
        state.duration = Some(self.started.elapsed());
        self.stdout.seal();
        self.stderr.seal();
        true
    }

    fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().ended_at
    }

    fn snapshot(&self) -> TaskSnapshot {
        // Buffers are read under the state lock: `finish` seals them under it too
        let state = self.state.lock();
        let terminal = state.status.is_terminal();
        TaskSnapshot {
            id: self.id.clone(),
            command: self.command.clone(),
            status: state.status,
            exit_code: state.exit_code,
            stdout: self.stdout.render(),
            stderr: self.stderr.render(),
            started_at: self.started_at,
            ended_at: state.ended_at,
            elapsed_ms: (!terminal).then(|| millis(self.started.elapsed())),
            duration_ms: state.duration.map(millis),
        }
    }

    fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            command: self.command.clone(),
            status: self.status(),
            started_at: self.started_at,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Spawns, tracks, polls and cancels subprocess-backed tasks.
///
/// Owned by the server instance; every access to the table takes its lock.
pub struct TaskManager {
    settings: TaskSettings,
    tasks: RwLock<HashMap<TaskId, Arc<TaskRecord>>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(TaskSettings::default())
    }
}

impl TaskManager {
    pub fn new(settings: TaskSettings) -> Self {
        Self { settings, tasks: RwLock::new(HashMap::new()) }
    }

    /// Start `spec` in the background and return its id without waiting.
    ///
    /// Must be called from within a tokio runtime. If the process cannot be
    /// started no task record is created.
    pub fn spawn(&self, spec: CommandSpec) -> Result<TaskId, TaskError> {
        let id = Uuid::new_v4().to_string();
        let record = Arc::new(TaskRecord::new(id.clone(), spec.command_line()));

        let mut child = spec
            .to_command()
            .spawn()
            .map_err(|source| TaskError::Spawn { program: spec.program.clone(), source })?;
        record.mark_running();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump(stdout, record.stdout.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump(stderr, record.stderr.clone()));
        }

        self.tasks.write().insert(id.clone(), record.clone());
        tokio::spawn(watch(child, record, readers));
        tracing::info!(task_id = %id, command = %spec.command_line(), "spawned background task");

        self.enforce_retention();
        Ok(id)
    }

    pub fn status(&self, id: &str) -> Option<TaskSnapshot> {
        self.get(id).map(|record| record.snapshot())
    }

    /// Cancel a running task. Returns true only for the call that moved it
    /// to `cancelled`; unknown and terminal tasks return false.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(record) = self.get(id) else {
            return false;
        };
        if !record.finish(TaskStatus::Cancelled, None) {
            return false;
        }
        // The watcher kills and reaps the process
        record.cancel.cancel();
        tracing::info!(task_id = %id, "cancelled background task");
        true
    }

    /// Cancel every running task; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<TaskId> = self.tasks.read().keys().cloned().collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// All tracked tasks, oldest first
    pub fn list(&self) -> Vec<TaskSummary> {
        let mut rows: Vec<TaskSummary> = self.tasks.read().values().map(|r| r.summary()).collect();
        rows.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    /// Drop a terminal task's record
    pub fn remove(&self, id: &str) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write();
        let record = tasks.get(id).ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if !record.status().is_terminal() {
            return Err(TaskError::StillRunning(id.to_string()));
        }
        tasks.remove(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `spec` to completion, bounded by `timeout` or the default deadline
    pub async fn run_sync(&self, ctx: &CallContext, spec: &CommandSpec, timeout: Option<Duration>) -> CommandOutput {
        let timeout = timeout.unwrap_or(self.settings.default_timeout);
        exec::run(ctx, spec, timeout, self.settings.max_output_bytes, OUTPUT_DRAIN_GRACE).await
    }

    fn get(&self, id: &str) -> Option<Arc<TaskRecord>> {
        self.tasks.read().get(id).cloned()
    }

    fn enforce_retention(&self) {
        let Some(keep) = self.settings.retention else {
            return;
        };
        let mut tasks = self.tasks.write();
        let mut terminal: Vec<(DateTime<Utc>, TaskId)> = tasks
            .values()
            .filter_map(|r| r.ended_at().map(|ended| (ended, r.id.clone())))
            .collect();
        if terminal.len() <= keep {
            return;
        }
        terminal.sort();
        let excess = terminal.len() - keep;
        for (_, id) in terminal.into_iter().take(excess) {
            tasks.remove(&id);
            tracing::debug!(task_id = %id, "evicted finished task");
        }
    }
}

/// Per-task watcher: waits for exit or cancellation and applies the
/// terminal transition.
async fn watch(mut child: Child, record: Arc<TaskRecord>, readers: Vec<JoinHandle<()>>) {
    let cancel = record.cancel.clone();
    let exit = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    let Some(exit) = exit else {
        if let Err(e) = child.kill().await {
            tracing::warn!(task_id = %record.id, "failed to kill cancelled task: {e}");
        }
        for reader in &readers {
            reader.abort();
        }
        // Normally a no-op: `cancel` already applied the transition
        record.finish(TaskStatus::Cancelled, None);
        return;
    };

    drain(readers, OUTPUT_DRAIN_GRACE).await;
    let (status, code) = classify(exit);
    if record.finish(status, Some(code)) {
        tracing::info!(task_id = %record.id, %status, exit_code = code, "background task finished");
    }
}

fn classify(exit: std::io::Result<ExitStatus>) -> (TaskStatus, i32) {
    match exit {
        Ok(status) if status.success() => (TaskStatus::Completed, 0),
        // Killed by a signal: no exit code
        Ok(status) => (TaskStatus::Failed, status.code().unwrap_or(-1)),
        Err(e) => {
            tracing::warn!("waiting on task process failed: {e}");
            (TaskStatus::Failed, -1)
        }
    }
}
