//! Task orchestrator.
//!
//! [`TaskManager`] owns the task registry, a bounded work queue, a fixed pool
//! of worker routines and the observer fan-out. It is constructed explicitly
//! and shared behind an `Arc`; there is no global state.
//!
//! # Architecture
//!
//! - **Admission**: `create_task` registers a `pending` task, enqueues a job
//!   and returns without waiting for the download
//! - **Workers**: `max_concurrent` routines pull jobs from one FIFO queue
//! - **Bridges**: per-job tasks fold progress into the registry and broadcast
//!   throttled events
//!
//! # Concurrency Model
//!
//! - Registry and observer set each sit behind their own `RwLock`
//! - A full queue makes `create_task` wait (backpressure, not rejection)
//! - Each task id is enqueued once and claimed by exactly one worker
//! - `cancel_task` marks the task and fires its `CancellationToken`, which
//!   kills the transfer process and aborts platform requests
//! - `shutdown` drops the queue sender and fires the parent token; workers
//!   drain what is left, so running and queued tasks both end `cancelled`

mod observers;
mod registry;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vhunter_core::{
    DirectDownloadPort, DownloadRequest, DownloaderSettings, MetadataPort, ObserverId, Remuxer,
    Settings, Task, TaskEvent, TaskId, TaskObserver, TaskStatus, TransferPort, VideoDescriptor,
    VideoError,
};

use crate::artifact::FfmpegRemuxer;
use crate::direct::DouyinDirect;
use crate::extract::ExtractionClient;
use crate::info::VideoInfoService;
use crate::platform::DouyinResolver;
use crate::transfer::TransferDriver;

use observers::ObserverSet;
use registry::TaskRegistry;
use worker::{DownloadJob, WorkerDeps, run_job};

/// Backends the orchestrator drives.
pub struct TaskManagerDeps {
    /// Generic transfer into the output directory.
    pub transfer: Arc<dyn TransferPort>,
    /// Platform fast path, tried first when it handles the URL.
    pub direct: Option<Arc<dyn DirectDownloadPort>>,
    pub metadata: Arc<dyn MetadataPort>,
    pub remuxer: Arc<dyn Remuxer>,
    /// Transfer into a scratch directory, used by task-less downloads.
    pub scratch_transfer: Arc<dyn TransferPort>,
}

/// Pool and queue sizing.
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub progress_interval: Duration,
}

impl TaskManagerConfig {
    pub fn from_settings(settings: &DownloaderSettings) -> Self {
        Self {
            workers: settings.max_concurrent.max(1),
            queue_capacity: settings.queue_capacity.max(1),
            progress_interval: Duration::from_secs(1),
        }
    }
}

pub struct TaskManager {
    registry: Arc<TaskRegistry>,
    observers: Arc<ObserverSet>,
    queue: StdMutex<Option<mpsc::Sender<DownloadJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metadata: Arc<dyn MetadataPort>,
    scratch_transfer: Arc<dyn TransferPort>,
    shutdown: CancellationToken,
}

impl TaskManager {
    /// Build the manager and spawn its workers. Must run inside a Tokio runtime.
    pub fn start(config: &TaskManagerConfig, deps: TaskManagerDeps) -> Arc<Self> {
        let registry = Arc::new(TaskRegistry::default());
        let observers = Arc::new(ObserverSet::default());
        let (tx, rx) = mpsc::channel::<DownloadJob>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let worker_deps = WorkerDeps {
            registry: Arc::clone(&registry),
            observers: Arc::clone(&observers),
            transfer: deps.transfer,
            direct: deps.direct,
            remuxer: deps.remuxer,
            progress_interval: config.progress_interval,
        };

        let workers = (0..config.workers)
            .map(|n| {
                let deps = worker_deps.clone();
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    debug!(worker = n, "worker started");
                    loop {
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };
                        run_job(&deps, job).await;
                    }
                    debug!(worker = n, "worker stopped");
                })
            })
            .collect();

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "task manager started"
        );

        Arc::new(Self {
            registry,
            observers,
            queue: StdMutex::new(Some(tx)),
            workers: Mutex::new(workers),
            metadata: deps.metadata,
            scratch_transfer: deps.scratch_transfer,
            shutdown: CancellationToken::new(),
        })
    }

    /// Admit a request. Returns the task in `pending`.
    pub async fn create_task(&self, mut request: DownloadRequest) -> Result<Task, VideoError> {
        request.validate()?;
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| VideoError::tool_unavailable("task queue", "shutting down"))?;

        let id = TaskId::generate();
        request.assign_task_id(id.clone())?;
        request.output = request
            .output
            .as_deref()
            .and_then(Path::file_name)
            .map(PathBuf::from);

        let mut task = Task::new(id.clone());
        task.metadata.extend(request.metadata.clone());
        task.metadata
            .insert("save_to_local".to_string(), request.save_to_local.to_string());

        let cancel = self.shutdown.child_token();
        self.registry.insert(task.clone(), cancel.clone()).await;
        self.observers.broadcast(&TaskEvent::from_task(&task)).await;
        info!(task_id = %id, url = %request.url, "task admitted");

        let job = DownloadJob { request, cancel };
        if sender.send(job).await.is_err() {
            warn!(task_id = %id, "queue closed during admission");
            let abandoned = self
                .registry
                .update(&id, |entry| {
                    entry.task.cancel()?;
                    entry.task.error = Some("task queue closed".to_string());
                    Ok::<_, VideoError>(TaskEvent::from_task(&entry.task))
                })
                .await;
            match abandoned {
                Some(Ok(event)) => self.observers.broadcast(&event).await,
                Some(Err(e)) => warn!(task_id = %id, error = %e, "could not cancel unqueued task"),
                None => {}
            }
            return Err(VideoError::tool_unavailable("task queue", "shutting down"));
        }
        Ok(task)
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Task, VideoError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| VideoError::TaskNotFound(id.to_string()))
    }

    /// Every task, oldest first.
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.registry.list().await
    }

    /// Mark a task cancelled and abort its in-flight work.
    ///
    /// Cancelling an already-cancelled task is a no-op; cancelling a
    /// completed or failed task is rejected.
    pub async fn cancel_task(&self, id: &TaskId) -> Result<Task, VideoError> {
        let (task, changed) = self
            .registry
            .update(id, |entry| {
                let changed = entry.task.cancel()?;
                if changed {
                    entry.cancel.cancel();
                }
                Ok::<_, VideoError>((entry.task.clone(), changed))
            })
            .await
            .ok_or_else(|| VideoError::TaskNotFound(id.to_string()))??;

        if changed {
            info!(task_id = %id, "task cancelled");
            self.observers.broadcast(&TaskEvent::from_task(&task)).await;
        }
        Ok(task)
    }

    /// Empty the registry. In-flight downloads keep running but their
    /// updates no longer land anywhere.
    pub async fn clear_tasks(&self) -> usize {
        let removed = self.registry.clear().await;
        if removed > 0 {
            info!(removed, "task registry cleared");
            self.observers
                .broadcast(&TaskEvent::Cleared { updated: Utc::now() })
                .await;
        }
        removed
    }

    /// Metadata for a URL without creating a task.
    pub async fn resolve_video_info(&self, url: &str) -> Result<VideoDescriptor, VideoError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(VideoError::invalid_input("url is required"));
        }
        self.metadata.resolve(url, self.shutdown.child_token()).await
    }

    /// One-off download into the scratch directory, outside the registry.
    pub async fn direct_download(
        &self,
        url: &str,
        format: Option<String>,
    ) -> Result<PathBuf, VideoError> {
        let mut request = DownloadRequest::new(url.trim());
        request.format = format.filter(|f| !f.trim().is_empty());
        request.validate()?;
        request.assign_task_id(TaskId::generate())?;
        info!(url = %request.url, "direct download");
        self.scratch_transfer
            .download(&request, None, self.shutdown.child_token())
            .await
    }

    pub async fn subscribe(&self, observer: Arc<dyn TaskObserver>) -> ObserverId {
        let id = self.observers.subscribe(observer).await;
        debug!(observer = %id, "observer subscribed");
        id
    }

    pub async fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id).await
    }

    /// One progress event per known task, for newly connected observers.
    pub async fn snapshot_events(&self) -> Vec<TaskEvent> {
        self.registry
            .list()
            .await
            .iter()
            .map(TaskEvent::from_task)
            .collect()
    }

    pub async fn task_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.len().await
    }

    /// Number of tasks currently in `status`.
    pub async fn count_in(&self, status: TaskStatus) -> usize {
        self.registry
            .list()
            .await
            .iter()
            .filter(|t| t.status == status)
            .count()
    }

    /// Stop accepting work, abort in-flight jobs and wait for the workers.
    pub async fn shutdown(&self) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shutdown.cancel();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for handle in workers {
            let _ = handle.await;
        }
        info!("task manager stopped");
    }
}

/// Wire the production backends from settings and start the manager.
///
/// `scratch_dir` receives task-less direct downloads.
pub fn build_task_manager(
    settings: &Settings,
    scratch_dir: impl Into<PathBuf>,
) -> Result<Arc<TaskManager>, VideoError> {
    let output_dir = settings.downloader.output_dir.clone();
    let remuxer: Arc<dyn Remuxer> =
        Arc::new(FfmpegRemuxer::new(settings.downloader.ffmpeg_path.clone()));

    let resolver = if settings.douyin.enable_direct_api {
        Some(Arc::new(DouyinResolver::new(settings)?))
    } else {
        None
    };
    let direct = resolver.as_ref().map(|r| {
        Arc::new(DouyinDirect::new(settings, Arc::clone(r), output_dir.clone()))
            as Arc<dyn DirectDownloadPort>
    });

    let deps = TaskManagerDeps {
        transfer: Arc::new(TransferDriver::new(settings, output_dir, Arc::clone(&remuxer))),
        direct,
        metadata: Arc::new(VideoInfoService::new(resolver, ExtractionClient::new(settings))),
        scratch_transfer: Arc::new(TransferDriver::new(settings, scratch_dir, Arc::clone(&remuxer))),
        remuxer,
    };

    Ok(TaskManager::start(
        &TaskManagerConfig::from_settings(&settings.downloader),
        deps,
    ))
}
