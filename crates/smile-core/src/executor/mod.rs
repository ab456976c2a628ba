//! ============================================================================
//! Task Executor - Sequential job runs over a wallet list
//! ============================================================================
//! For every wallet, in order, while the run is live:
//! - every task of the job runs in order, each followed by a task delay
//! - all tasks succeeded: one completion record is appended
//! - first failure: recorded in the run result, next wallet
//! - wallet delay, then a progress tick
//!
//! Tasks are never retried. Storage errors stop the run.
//! ============================================================================

pub mod backend;
pub mod tasks;

pub use backend::{Operation, OperationBackend, OperationError, Receipt, RpcRotator, SimulatedBackend};
pub use tasks::{default_amount_bounds, TaskOutcome, DEFAULT_MINT_COUNT};

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{BotConfig, TimingConfig};
use crate::db::BotDb;
use crate::error::{Result, SmileError};
use crate::jitter::Jitter;
use crate::run::RunGuard;
use crate::types::{FailureDetail, Progress, RunResult, TaskDefinition, TestnetJob, Wallet};
use tasks::TaskContext;

pub struct TaskExecutor {
    db: Arc<BotDb>,
    backend: Arc<dyn OperationBackend>,
    jitter: Jitter,
    timing: TimingConfig,
}

impl TaskExecutor {
    pub fn new(
        db: Arc<BotDb>,
        backend: Arc<dyn OperationBackend>,
        jitter: Jitter,
        timing: TimingConfig,
    ) -> Self {
        Self {
            db,
            backend,
            jitter,
            timing,
        }
    }

    /// Executor over a [`SimulatedBackend`] built from `config`.
    pub fn simulated(db: Arc<BotDb>, config: &BotConfig) -> Result<Self> {
        let backend = SimulatedBackend::from_config(config)?;
        Ok(Self::new(
            db,
            Arc::new(backend),
            Jitter::new(config.jitter)?,
            config.timing,
        ))
    }

    pub fn backend(&self) -> Arc<dyn OperationBackend> {
        self.backend.clone()
    }

    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Run one task for one wallet.
    pub async fn execute_task(
        &self,
        task: &TaskDefinition,
        wallet: &str,
        chain: &str,
    ) -> Result<TaskOutcome> {
        let ctx = TaskContext {
            backend: self.backend.as_ref(),
            jitter: &self.jitter,
            wallet,
            chain,
        };
        ctx.run(task).await
    }

    /// Every task of `job` for one wallet, stopping at the first failure.
    async fn run_wallet(&self, job: &TestnetJob, wallet: &Wallet) -> Result<()> {
        for task in &job.tasks {
            let outcome = self.execute_task(task, &wallet.address, &job.chain).await?;
            info!(
                "{} {} -> {}",
                wallet.short_address(),
                outcome.kind,
                outcome.tx_hash
            );
            self.jitter.pause(self.timing.task_delay).await;
        }
        Ok(())
    }

    /// Apply `job` to every wallet in order.
    ///
    /// `total` in the result is always `wallets.len()`; after a cancellation
    /// `successful + failed` counts only the wallets actually visited.
    pub async fn execute_tasks<P>(
        &self,
        job: &TestnetJob,
        wallets: &[Wallet],
        run: &RunGuard,
        mut on_progress: P,
    ) -> Result<RunResult>
    where
        P: FnMut(Progress),
    {
        if wallets.is_empty() {
            return Err(SmileError::invalid("No wallets to run"));
        }
        if job.tasks.is_empty() {
            return Err(SmileError::invalid(format!("Job {} has no tasks", job.id)));
        }

        let total = wallets.len();
        let mut result = RunResult {
            total,
            ..RunResult::default()
        };
        info!("Running {} on {} wallets ({} tasks each)", job.name, total, job.tasks.len());

        for (i, wallet) in wallets.iter().enumerate() {
            if !run.is_running() {
                warn!("Run cancelled after {}/{} wallets", i, total);
                break;
            }

            match self.run_wallet(job, wallet).await {
                Ok(()) => {
                    self.db.record_completion(&job.id, &wallet.address)?;
                    result.successful += 1;
                    info!("Wallet {} completed {}", wallet.short_address(), job.id);
                }
                Err(e) if e.is_per_unit() => {
                    error!("Wallet {} failed: {}", wallet.short_address(), e);
                    result.failed += 1;
                    result.details.push(FailureDetail {
                        wallet: wallet.address.clone(),
                        error_message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            self.jitter.pause(self.timing.wallet_delay).await;
            on_progress(Progress::new(i + 1, total));
        }

        info!(
            "{} finished: {} ok, {} failed, {} skipped",
            job.id,
            result.successful,
            result.failed,
            total - result.processed()
        );
        Ok(result)
    }

    /// Run `jobs` one after another, stopping between jobs on cancellation.
    pub async fn execute_all<P>(
        &self,
        jobs: &[TestnetJob],
        wallets: &[Wallet],
        run: &RunGuard,
        mut on_progress: P,
    ) -> Result<Vec<(String, RunResult)>>
    where
        P: FnMut(&TestnetJob, Progress),
    {
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            if !run.is_running() {
                warn!("Run cancelled before {}", job.id);
                break;
            }
            let result = self
                .execute_tasks(job, wallets, run, |p| on_progress(job, p))
                .await?;
            results.push((job.id.clone(), result));
        }
        Ok(results)
    }
}
