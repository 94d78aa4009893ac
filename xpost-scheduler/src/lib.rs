//! The scheduler: `spec.md` §4.6. A cron-tick loop enqueues `auto` tasks, a
//! bounded worker pool drains a priority-FIFO queue, and aggregate
//! statistics are exposed through `status()`.

mod cron;
mod queue;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use slog_scope::{info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use xpost_common::{IdGenerator, Metrics, XpostError};
use xpost_core::{Priority, SyncFilters, SyncTask, TaskStatus, TaskType};
use xpost_engine::SyncEngine;

pub use cron::CronJob;
pub use queue::TaskQueue;

const ERROR_RING_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_tasks: usize,
    pub queue_size: usize,
    pub auto_sync_enabled: bool,
    pub default_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub task_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 3,
            queue_size: 100,
            auto_sync_enabled: true,
            default_interval: Duration::from_secs(15 * 60),
            max_retries: 3,
            retry_delay: Duration::from_secs(5 * 60),
            task_timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl SchedulerConfig {
    fn grace_period(&self) -> Duration {
        self.task_timeout.min(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub total_processed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub avg_task_duration_ms: f64,
    pub recent_errors: Vec<String>,
    pub dropped_retries: u64,
}

/// A read-only snapshot of everything `spec.md` §4.6's `Status()` exposes.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub running: bool,
    pub active_workers: u32,
    pub queued: usize,
    pub stats: SchedulerStats,
    pub cron_jobs: Vec<CronJob>,
}

/// The capability a webhook transport invokes to turn an external event
/// into scheduler work (`spec.md` §4.8). No concrete transport (HTTP,
/// signature verification, replay protection) is implemented here.
#[async_trait::async_trait]
pub trait WebhookAdapter: Send + Sync {
    async fn process_event(
        &self,
        source: &str,
        event_type: &str,
        payload: &[u8],
    ) -> Result<u64, XpostError>;
}

struct StatsInner {
    total_processed: u64,
    last_success: Option<DateTime<Utc>>,
    avg_task_duration_ms: f64,
    recent_errors: VecDeque<String>,
    dropped_retries: u64,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            total_processed: 0,
            last_success: None,
            avg_task_duration_ms: 0.0,
            recent_errors: VecDeque::with_capacity(ERROR_RING_CAPACITY),
            dropped_retries: 0,
        }
    }
}

impl StatsInner {
    fn record_success(&mut self, duration: Duration, now: DateTime<Utc>) {
        self.total_processed += 1;
        self.last_success = Some(now);
        let millis = duration.as_secs_f64() * 1000.0;
        self.avg_task_duration_ms = if self.total_processed == 1 {
            millis
        } else {
            self.avg_task_duration_ms + (millis - self.avg_task_duration_ms) / self.total_processed as f64
        };
    }

    fn record_error(&mut self, message: String) {
        if self.recent_errors.len() == ERROR_RING_CAPACITY {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            total_processed: self.total_processed,
            last_success: self.last_success,
            avg_task_duration_ms: self.avg_task_duration_ms,
            recent_errors: self.recent_errors.iter().cloned().collect(),
            dropped_retries: self.dropped_retries,
        }
    }
}

pub struct Scheduler {
    engine: Arc<SyncEngine>,
    config: SchedulerConfig,
    metrics: Metrics,
    queue: Arc<TaskQueue>,
    running: Arc<AtomicBool>,
    active_workers: Arc<AtomicU32>,
    next_task_id: IdGenerator,
    stats: Arc<Mutex<StatsInner>>,
    cron_jobs: Arc<Mutex<Vec<CronJob>>>,
    cron_task_origin: Arc<Mutex<std::collections::HashMap<u64, usize>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    cron_handle: Mutex<Option<JoinHandle<()>>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, metrics: Metrics, config: SchedulerConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let queue = Arc::new(TaskQueue::new(config.queue_size));
        let cron_jobs = if config.auto_sync_enabled {
            vec![CronJob::new("primary-sync", config.default_interval, Utc::now())]
        } else {
            Vec::new()
        };
        Self {
            engine,
            config,
            metrics,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            active_workers: Arc::new(AtomicU32::new(0)),
            next_task_id: IdGenerator::default(),
            stats: Arc::new(Mutex::new(StatsInner::default())),
            cron_jobs: Arc::new(Mutex::new(cron_jobs)),
            cron_task_origin: Arc::new(Mutex::new(std::collections::HashMap::new())),
            worker_handles: Mutex::new(Vec::new()),
            cron_handle: Mutex::new(None),
            stop_tx,
            stop_rx,
        }
    }

    /// Idempotent: returns an error if already running (`spec.md` §4.6).
    pub fn start(self: &Arc<Self>) -> Result<(), XpostError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(XpostError::config("scheduler already running"));
        }
        self.stop_tx.send_replace(false);

        let mut handles = self.worker_handles.lock().unwrap();
        for worker_id in 0..self.config.max_concurrent_tasks {
            let scheduler = Arc::clone(self);
            let mut stop_rx = self.stop_rx.clone();
            handles.push(tokio::spawn(async move {
                scheduler.worker_loop(worker_id, &mut stop_rx).await;
            }));
        }
        drop(handles);

        if self.config.auto_sync_enabled {
            let scheduler = Arc::clone(self);
            let mut stop_rx = self.stop_rx.clone();
            *self.cron_handle.lock().unwrap() = Some(tokio::spawn(async move {
                scheduler.cron_loop(&mut stop_rx).await;
            }));
        }

        info!("scheduler started"; "workers" => self.config.max_concurrent_tasks);
        Ok(())
    }

    /// Idempotent: signals workers to stop, waits up to the grace period for
    /// them to drain (`spec.md` §5 Cancellation & timeouts).
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(true);

        let handles: Vec<_> = self.worker_handles.lock().unwrap().drain(..).collect();
        let cron_handle = self.cron_handle.lock().unwrap().take();

        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
            if let Some(handle) = cron_handle {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.config.grace_period(), drain).await.is_err() {
            warn!("scheduler stop exceeded grace period"; "grace_period_secs" => self.config.grace_period().as_secs());
        }
        info!("scheduler stopped");
    }

    /// `Schedule(...)`: enqueues a task, returning `QueueFull` if the bounded
    /// queue is saturated (`spec.md` §4.6).
    pub fn schedule(
        &self,
        task_type: TaskType,
        priority: Priority,
        targets: Option<Vec<String>>,
        filters: Option<SyncFilters>,
    ) -> Result<u64, XpostError> {
        let id = self.next_task_id.next();
        let now = Utc::now();
        let task = SyncTask {
            id,
            task_type,
            priority,
            created_at: now,
            scheduled_at: now,
            retries: 0,
            max_retries: self.config.max_retries,
            targets,
            filters,
            status: TaskStatus::Pending,
        };
        self.queue.push(task)?;
        self.metrics.gauge("posts_in_queue", self.queue.len() as u64, &[]);
        Ok(id)
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.running.load(Ordering::SeqCst),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            queued: self.queue.len(),
            stats: self.stats.lock().unwrap().snapshot(),
            cron_jobs: self.cron_jobs.lock().unwrap().clone(),
        }
    }

    async fn cron_loop(self: Arc<Self>, stop_rx: &mut watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                }
            }
            if *stop_rx.borrow() {
                return;
            }
            self.tick_cron_jobs();
        }
    }

    fn tick_cron_jobs(&self) {
        let now = Utc::now();
        let mut jobs = self.cron_jobs.lock().unwrap();
        for (index, job) in jobs.iter_mut().enumerate() {
            if !job.due(now) {
                continue;
            }
            let id = self.next_task_id.next();
            match self.queue.push(SyncTask {
                id,
                task_type: TaskType::Auto,
                priority: Priority::Normal,
                created_at: now,
                scheduled_at: now,
                retries: 0,
                max_retries: self.config.max_retries,
                targets: None,
                filters: None,
                status: TaskStatus::Pending,
            }) {
                Ok(()) => {
                    job.mark_enqueued(now);
                    self.cron_task_origin.lock().unwrap().insert(id, index);
                }
                Err(_) => {
                    warn!("cron tick skipped: queue full"; "job" => %job.name);
                }
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize, stop_rx: &mut watch::Receiver<bool>) {
        loop {
            let task = tokio::select! {
                task = self.queue.pop() => task,
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        return;
                    }
                    continue;
                }
            };
            if *stop_rx.borrow() {
                return;
            }
            self.active_workers.fetch_add(1, Ordering::SeqCst);
            Self::run_task(self.clone(), worker_id, task).await;
            self.active_workers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_task(scheduler: Arc<Self>, worker_id: usize, mut task: SyncTask) {
        task.status = TaskStatus::Running;
        let started = std::time::Instant::now();

        let outcome = tokio::time::timeout(
            scheduler.config.task_timeout,
            scheduler
                .engine
                .sync_with_overrides(task.targets.as_deref(), task.filters.as_ref()),
        )
        .await;

        let succeeded = match outcome {
            Ok(Ok(report)) => {
                task.status = TaskStatus::Completed;
                info!("task completed"; "worker" => worker_id, "task_id" => task.id, "processed" => report.processed);
                scheduler.stats.lock().unwrap().record_success(started.elapsed(), Utc::now());
                true
            }
            Ok(Err(err)) => {
                task.status = TaskStatus::Failed;
                warn!("task failed"; "worker" => worker_id, "task_id" => task.id, "error" => %err);
                scheduler.stats.lock().unwrap().record_error(err.to_string());
                Self::maybe_retry(scheduler.clone(), task.clone());
                false
            }
            Err(_elapsed) => {
                task.status = TaskStatus::Failed;
                let err = XpostError::deadline_exceeded(started.elapsed());
                warn!("task exceeded deadline"; "worker" => worker_id, "task_id" => task.id);
                scheduler.stats.lock().unwrap().record_error(err.to_string());
                Self::maybe_retry(scheduler.clone(), task.clone());
                false
            }
        };

        scheduler.metrics.incr_with_tags(
            "scheduler_tasks_total",
            &[("status", if succeeded { "completed" } else { "failed" })],
        );

        if let Some(index) = scheduler.cron_task_origin.lock().unwrap().remove(&task.id) {
            if let Some(job) = scheduler.cron_jobs.lock().unwrap().get_mut(index) {
                job.mark_finished(succeeded);
            }
        }
    }

    /// `spec.md` §4.6 Retry policy: delayed re-enqueue, dropped (and counted)
    /// rather than blocking the worker when the queue is full once the delay
    /// elapses.
    fn maybe_retry(scheduler: Arc<Self>, failed: SyncTask) {
        if failed.retries >= failed.max_retries {
            return;
        }
        let delay = scheduler.config.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let id = scheduler.next_task_id.next();
            let retry = SyncTask {
                id,
                task_type: TaskType::Retry,
                priority: Priority::High,
                created_at: Utc::now(),
                scheduled_at: Utc::now(),
                retries: failed.retries + 1,
                max_retries: failed.max_retries,
                targets: failed.targets.clone(),
                filters: failed.filters.clone(),
                status: TaskStatus::Pending,
            };
            if scheduler.queue.push(retry).is_err() {
                scheduler.stats.lock().unwrap().dropped_retries += 1;
                warn!("retry dropped: queue full"; "task_id" => failed.id);
            }
        });
    }
}
