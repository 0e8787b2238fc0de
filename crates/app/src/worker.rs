//! Background jobs: open, save and image export
//!
//! One worker thread takes jobs over a channel and reports outcomes on
//! another. The window polls outcomes every frame and keeps editing disabled
//! while a job runs. Jobs work on an [`ExportSnapshot`] so the session itself
//! never leaves the UI thread.

use pdf_editor_core::{
    export_snapshot_images, CancellationToken, DocumentState, EditSession, EditorResult,
    ExportSnapshot,
};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug)]
pub enum Job {
    Open { path: PathBuf },
    Save { snapshot: ExportSnapshot, path: PathBuf },
    ExportImages { snapshot: ExportSnapshot, dir: PathBuf, scale: f32 },
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Open { .. } => JobKind::Open,
            Job::Save { .. } => JobKind::Save,
            Job::ExportImages { .. } => JobKind::ExportImages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Open,
    Save,
    ExportImages,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Open => "Opening document",
            JobKind::Save => "Saving document",
            JobKind::ExportImages => "Exporting page images",
        }
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Opened { path: PathBuf, result: EditorResult<EditSession> },
    /// `state` is what was written, for [`EditSession::mark_saved`]
    Saved { path: PathBuf, state: DocumentState, result: EditorResult<()> },
    ImagesExported { dir: PathBuf, result: EditorResult<Vec<PathBuf>> },
}

pub struct Worker {
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<JobOutcome>,
    cancel: CancellationToken,
    running: Option<JobKind>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread; `notify` runs after every finished job
    pub fn spawn(notify: impl Fn() + Send + 'static) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let thread = std::thread::Builder::new().name("pdf-editor-worker".to_owned()).spawn(move || {
            for job in job_rx {
                let outcome = run_job(job, &token);
                if outcome_tx.send(outcome).is_err() {
                    break;
                }
                notify();
            }
            tracing::debug!("worker thread stopped");
        })?;

        Ok(Self { jobs: Some(job_tx), outcomes: outcome_rx, cancel, running: None, thread: Some(thread) })
    }

    pub fn running(&self) -> Option<JobKind> {
        self.running
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    /// Queue `job`; refused while another job runs
    pub fn submit(&mut self, job: Job) -> bool {
        if self.running.is_some() {
            return false;
        }
        let Some(jobs) = &self.jobs else { return false };
        let kind = job.kind();
        self.cancel.reset();
        if jobs.send(job).is_err() {
            tracing::error!("worker thread is gone");
            return false;
        }
        tracing::debug!(?kind, "job submitted");
        self.running = Some(kind);
        true
    }

    /// Ask the running job to stop at its next checkpoint
    pub fn cancel(&self) {
        if self.running.is_some() {
            self.cancel.cancel();
        }
    }

    /// Finished job, if any, without blocking
    pub fn poll(&mut self) -> Option<JobOutcome> {
        let outcome = self.outcomes.try_recv().ok()?;
        self.running = None;
        Some(outcome)
    }

    /// Block up to `timeout` for the running job
    pub fn wait(&mut self, timeout: Duration) -> Option<JobOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => {
                self.running = None;
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.jobs = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_job(job: Job, cancel: &CancellationToken) -> JobOutcome {
    match job {
        Job::Open { path } => {
            let result = EditSession::open_with_cancel(&path, cancel);
            if let Err(err) = &result {
                tracing::warn!(path = %path.display(), error = %err, "open failed");
            }
            JobOutcome::Opened { path, result }
        }
        Job::Save { snapshot, path } => {
            let result = snapshot.write_pdf(&path, cancel);
            if let Err(err) = &result {
                tracing::warn!(path = %path.display(), error = %err, "save failed");
            }
            JobOutcome::Saved { path, state: snapshot.state, result }
        }
        Job::ExportImages { snapshot, dir, scale } => {
            let mut engine = pdf_engine::default_engine();
            let result = export_snapshot_images(&snapshot, &mut engine, &dir, scale, cancel);
            JobOutcome::ImagesExported { dir, result }
        }
    }
}
