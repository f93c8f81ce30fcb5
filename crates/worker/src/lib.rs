//! # Reconciliation worker
//!
//! Keeps Discord roles in sync with wallet holdings. Work arrives from two
//! directions: scheduled full cycles over every guild with at least one
//! enabled rule, and on-demand jobs queued by the verification flow and the
//! internal API.
//!
//! The queue is an unbounded channel drained by a single consumer task, so
//! jobs for the same member always run in submission order and never
//! concurrently with themselves. Scheduled cycles additionally take the
//! cross-process run lock, keeping one cycle in flight per deployment.
//!
//! The single most important behavioral rule lives in [`sync`]: a transient
//! upstream failure must never strip a role (fail-open).

mod cleanup;
pub mod evaluate;
mod scheduler;
mod sync;

use std::sync::Arc;

use chain::HoldingsProvider;
use db::{lock::RunLock, DatabaseConnection};
use discord::ChatPlatform;
use prices::PriceLookup;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};

pub use evaluate::{decide, evaluate, Evaluation, Outcome, RoleDecision, RuleInput};
pub use sync::SyncError;

/// Unit of work accepted by the on-demand queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Re-evaluate a single member, or every linked member of a guild
    /// when `member_id` is unset.
    Recheck {
        guild_id: i64,
        member_id: Option<i64>,
    },

    /// Strip every rule-managed role from a member whose wallet
    /// was unlinked.
    RemoveManagedRoles { guild_id: i64, member_id: i64 },
}

/// Cloneable handle appending jobs to the worker queue.
///
/// Enqueueing returns immediately; the queue consumer picks jobs up
/// in FIFO order.
#[derive(Clone)]
pub struct JobQueue {
    sender: UnboundedSender<Job>,
}

impl JobQueue {
    /// Append a job to the queue.
    pub fn enqueue(&self, job: Job) {
        if self.sender.send(job).is_err() {
            error!("worker queue consumer is gone, dropping job");
        }
    }

    /// Queue with no consumer attached, letting tests observe
    /// enqueued jobs through the returned receiver.
    #[cfg(feature = "test-utils")]
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (Self { sender }, receiver)
    }
}

/// Reconciliation worker state shared by the queue consumer and schedulers.
pub struct Worker {
    db: DatabaseConnection,
    chat: Arc<dyn ChatPlatform>,
    holdings: Arc<dyn HoldingsProvider>,
    prices: Arc<dyn PriceLookup>,
    concurrency: usize,
    audit_retention_days: u32,
}

impl Worker {
    /// Create a new worker over shared service singletons.
    pub fn new(
        db: DatabaseConnection,
        chat: Arc<dyn ChatPlatform>,
        holdings: Arc<dyn HoldingsProvider>,
        prices: Arc<dyn PriceLookup>,
        config: &common::config::Worker,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            chat,
            holdings,
            prices,
            concurrency: config.concurrency,
            audit_retention_days: config.audit_retention_days,
        })
    }

    /// Spawn the single queue consumer task and hand out its queue.
    pub fn spawn_queue(self: &Arc<Self>) -> JobQueue {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let worker = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                debug!(?job, "processing queued job");

                if let Err(error) = worker.run_job(&job).await {
                    error!(%error, ?job, "queued job failed");
                }
            }
        });

        JobQueue { sender }
    }

    /// Spawn the cron-driven full cycle scheduler.
    pub fn spawn_scheduler(
        self: &Arc<Self>,
        lock: RunLock,
        cron_expression: &str,
    ) -> Result<(), cron::error::Error> {
        scheduler::spawn(Arc::clone(self), lock, cron_expression)
    }

    /// Spawn the daily retention cleanup task.
    pub fn spawn_cleanup(self: &Arc<Self>) {
        cleanup::spawn(Arc::clone(self));
    }

    async fn run_job(&self, job: &Job) -> Result<(), SyncError> {
        match *job {
            Job::Recheck {
                guild_id,
                member_id: None,
            } => self.check_guild(guild_id).await,
            Job::Recheck {
                guild_id,
                member_id: Some(member_id),
            } => self.check_member(guild_id, member_id).await,
            Job::RemoveManagedRoles {
                guild_id,
                member_id,
            } => self.remove_managed_roles_for_member(guild_id, member_id).await,
        }
    }

    /// One scheduled cycle: lock, reconcile every rule-bearing guild, unlock.
    pub(crate) async fn run_cycle(&self, lock: &RunLock) {
        match lock.try_acquire().await {
            Ok(true) => {}
            Ok(false) => {
                info!("another process is running the scheduled cycle, skipping");
                return;
            }
            Err(error) => {
                error!(%error, "unable to acquire the run lock, skipping cycle");
                return;
            }
        }

        if let Err(error) = self.reconcile_all().await {
            error!(%error, "scheduled cycle failed");
        }

        if let Err(error) = lock.release().await {
            error!(%error, "unable to release the run lock");
        }
    }
}
