//! ============================================================================
//! Cascade Engine - Chained transfers across an ordered wallet list
//! ============================================================================
//! - forward: wallets[0] -> wallets[1] -> ... -> wallets[n-1], equal shares
//! - reverse: wallets[n-1] -> ... -> wallets[1] -> destination
//!
//! A failed step is logged and recorded; the chain continues with the next
//! step. Every step is followed by the wallet delay and a progress tick.
//! ============================================================================

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::TimingConfig;
use crate::error::{Result, SmileError};
use crate::executor::{Operation, OperationBackend, TaskExecutor};
use crate::jitter::{Jitter, AMOUNT_SCALE};
use crate::run::RunGuard;
use crate::types::{short, Progress, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDirection {
    Forward,
    Reverse,
}

/// One transfer of a cascade. `amount` is None for a reverse sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeStep {
    pub from: String,
    pub to: String,
    pub amount: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl CascadeStep {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub direction: CascadeDirection,
    /// Steps the full chain would take (`wallets.len() - 1`)
    pub total_steps: usize,
    pub steps: Vec<CascadeStep>,
}

impl CascadeReport {
    pub fn successful(&self) -> usize {
        self.steps.iter().filter(|s| s.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.steps.len() - self.successful()
    }
}

pub struct CascadeEngine {
    backend: Arc<dyn OperationBackend>,
    jitter: Jitter,
    timing: TimingConfig,
}

impl CascadeEngine {
    pub fn new(backend: Arc<dyn OperationBackend>, jitter: Jitter, timing: TimingConfig) -> Self {
        Self {
            backend,
            jitter,
            timing,
        }
    }

    /// Share the executor's backend and timing.
    pub fn from_executor(executor: &TaskExecutor) -> Self {
        Self::new(executor.backend(), *executor.jitter(), *executor.timing())
    }

    /// Spread `total_amount` along the chain in equal shares.
    pub async fn forward<P>(
        &self,
        wallets: &[Wallet],
        total_amount: Decimal,
        run: &RunGuard,
        on_progress: P,
    ) -> Result<CascadeReport>
    where
        P: FnMut(Progress),
    {
        require_chain(wallets)?;
        if total_amount <= Decimal::ZERO {
            return Err(SmileError::invalid("Cascade amount must be positive"));
        }

        let share = (total_amount / Decimal::from(wallets.len())).round_dp(AMOUNT_SCALE);
        info!(
            "Forward cascade of {} over {} wallets ({} each)",
            total_amount,
            wallets.len(),
            share
        );

        let hops: Vec<(&str, &str)> = wallets
            .windows(2)
            .map(|pair| (pair[0].address.as_str(), pair[1].address.as_str()))
            .collect();
        self.run_chain(CascadeDirection::Forward, &hops, Some(share), run, on_progress)
            .await
    }

    /// Sweep the chain back towards `destination` (defaults to the first wallet).
    pub async fn reverse<P>(
        &self,
        wallets: &[Wallet],
        destination: Option<&str>,
        run: &RunGuard,
        on_progress: P,
    ) -> Result<CascadeReport>
    where
        P: FnMut(Progress),
    {
        require_chain(wallets)?;
        let destination = destination.unwrap_or(&wallets[0].address);
        info!(
            "Reverse cascade over {} wallets into {}",
            wallets.len(),
            short(destination)
        );

        let hops: Vec<(&str, &str)> = (1..wallets.len())
            .rev()
            .map(|i| {
                let to = if i == 1 {
                    destination
                } else {
                    wallets[i - 1].address.as_str()
                };
                (wallets[i].address.as_str(), to)
            })
            .collect();
        self.run_chain(CascadeDirection::Reverse, &hops, None, run, on_progress)
            .await
    }

    async fn run_chain<P>(
        &self,
        direction: CascadeDirection,
        hops: &[(&str, &str)],
        amount: Option<Decimal>,
        run: &RunGuard,
        mut on_progress: P,
    ) -> Result<CascadeReport>
    where
        P: FnMut(Progress),
    {
        let total_steps = hops.len();
        let mut report = CascadeReport {
            direction,
            total_steps,
            steps: Vec::with_capacity(total_steps),
        };

        for (i, &(from, to)) in hops.iter().enumerate() {
            if !run.is_running() {
                warn!("Cascade cancelled after {}/{} steps", i, total_steps);
                break;
            }

            let operation = Operation::Transfer { from, to, amount };
            let step = match self.backend.submit(&operation).await {
                Ok(receipt) => {
                    info!("Step {}/{}: {} -> {}", i + 1, total_steps, short(from), short(to));
                    CascadeStep {
                        from: from.to_string(),
                        to: to.to_string(),
                        amount,
                        tx_hash: Some(receipt.tx_hash),
                        error: None,
                    }
                }
                Err(e) => {
                    error!("Step {}/{} failed: {}", i + 1, total_steps, e);
                    CascadeStep {
                        from: from.to_string(),
                        to: to.to_string(),
                        amount,
                        tx_hash: None,
                        error: Some(SmileError::from(e).to_string()),
                    }
                }
            };
            report.steps.push(step);

            self.jitter.pause(self.timing.wallet_delay).await;
            on_progress(Progress::new(i + 1, total_steps));
        }

        info!(
            "{:?} cascade done: {} ok, {} failed",
            direction,
            report.successful(),
            report.failed()
        );
        Ok(report)
    }
}

fn require_chain(wallets: &[Wallet]) -> Result<()> {
    if wallets.len() < 2 {
        return Err(SmileError::invalid("Cascade needs at least 2 wallets"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::wallet;
    use crate::executor::{OperationError, Receipt, RpcRotator, SimulatedBackend};
    use crate::config::JitterConfig;
    use crate::run::RunController;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    fn engine(backend: Arc<dyn OperationBackend>) -> CascadeEngine {
        CascadeEngine::new(backend, Jitter::default(), TimingConfig::immediate())
    }

    fn simulated() -> Arc<dyn OperationBackend> {
        Arc::new(SimulatedBackend::new(Jitter::default(), 0.0, 0.0, RpcRotator::default()))
    }

    /// Records transfers and fails the n-th one (0-based).
    #[derive(Default)]
    struct Scripted {
        fail_at: Option<usize>,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl OperationBackend for Scripted {
        async fn submit(&self, op: &Operation<'_>) -> std::result::Result<Receipt, OperationError> {
            let mut seen = self.seen.lock().unwrap();
            if let Operation::Transfer { from, to, .. } = op {
                seen.push((from.to_string(), to.to_string()));
            }
            if self.fail_at == Some(seen.len() - 1) {
                return Err(OperationError::Transient("nonce too low".into()));
            }
            Ok(Receipt { tx_hash: "0x01".into(), rpc_endpoint: None })
        }
    }

    fn abc() -> Vec<Wallet> {
        (1..=3).map(wallet).collect()
    }

    #[tokio::test]
    async fn test_forward_three_wallets() {
        let wallets = abc();
        let controller = RunController::new();
        let run = controller.begin().unwrap();

        let mut ticks = Vec::new();
        let report = engine(simulated())
            .forward(&wallets, Decimal::from_str("0.3").unwrap(), &run, |p| ticks.push(p))
            .await
            .unwrap();

        assert_eq!(report.total_steps, 2);
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].from, wallets[0].address);
        assert_eq!(report.steps[0].to, wallets[1].address);
        assert_eq!(report.steps[1].from, wallets[1].address);
        assert_eq!(report.steps[1].to, wallets[2].address);
        let share = Decimal::from_str("0.1").unwrap();
        assert!(report.steps.iter().all(|s| s.amount == Some(share)));
        assert_eq!(ticks.iter().map(|p| (p.done, p.total)).collect::<Vec<_>>(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_reverse_defaults_to_first_wallet() {
        let wallets = abc();
        let controller = RunController::new();
        let run = controller.begin().unwrap();

        let report = engine(simulated())
            .reverse(&wallets, None, &run, |_| {})
            .await
            .unwrap();

        let hops: Vec<(&str, &str)> = report
            .steps
            .iter()
            .map(|s| (s.from.as_str(), s.to.as_str()))
            .collect();
        assert_eq!(
            hops,
            vec![
                (wallets[2].address.as_str(), wallets[1].address.as_str()),
                (wallets[1].address.as_str(), wallets[0].address.as_str()),
            ]
        );
        assert!(report.steps.iter().all(|s| s.amount.is_none()));
    }

    #[tokio::test]
    async fn test_reverse_ends_at_explicit_destination() {
        let wallets: Vec<Wallet> = (1..=4).map(wallet).collect();
        let controller = RunController::new();
        let run = controller.begin().unwrap();

        let report = engine(simulated())
            .reverse(&wallets, Some("0xvault"), &run, |_| {})
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.steps[1].to, wallets[1].address);
        assert_eq!(report.steps[2].from, wallets[1].address);
        assert_eq!(report.steps[2].to, "0xvault");
    }

    #[tokio::test]
    async fn test_failed_step_does_not_halt_chain() {
        let wallets: Vec<Wallet> = (1..=4).map(wallet).collect();
        let backend = Arc::new(Scripted { fail_at: Some(1), ..Scripted::default() });
        let controller = RunController::new();
        let run = controller.begin().unwrap();

        let report = engine(backend.clone())
            .forward(&wallets, Decimal::ONE, &run, |_| {})
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.successful(), 2);
        assert!(report.steps[1].error.as_deref().unwrap_or("").contains("nonce too low"));
        assert_eq!(backend.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_steps() {
        let wallets: Vec<Wallet> = (1..=6).map(wallet).collect();
        let controller = RunController::new();
        let run = controller.begin().unwrap();
        let handle = run.handle();

        let report = engine(simulated())
            .forward(&wallets, Decimal::from(6), &run, |p| {
                if p.done == 2 {
                    handle.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(report.total_steps, 5);
        assert_eq!(report.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_short_chain_and_bad_amount() {
        let controller = RunController::new();
        let run = controller.begin().unwrap();
        let eng = engine(simulated());

        let one = vec![wallet(1)];
        assert!(matches!(
            eng.forward(&one, Decimal::ONE, &run, |_| {}).await,
            Err(SmileError::InvalidArgument(_))
        ));
        assert!(matches!(
            eng.reverse(&one, None, &run, |_| {}).await,
            Err(SmileError::InvalidArgument(_))
        ));
        assert!(matches!(
            eng.forward(&abc(), Decimal::ZERO, &run, |_| {}).await,
            Err(SmileError::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_after_every_step() {
        let wallets: Vec<Wallet> = (1..=4).map(wallet).collect();
        let jitter = Jitter::new(JitterConfig {
            delay_min: 1.0,
            delay_max: 1.0,
            amount_min: 1.0,
            amount_max: 1.0,
        })
        .unwrap();
        let timing = TimingConfig {
            task_delay: Duration::from_secs(5),
            wallet_delay: Duration::from_secs(45),
            simulation_scale: 0.0,
        };
        let eng = CascadeEngine::new(Arc::new(Scripted::default()), jitter, timing);
        let controller = RunController::new();
        let run = controller.begin().unwrap();

        let start = Instant::now();
        let report = eng.reverse(&wallets, None, &run, |_| {}).await.unwrap();

        assert_eq!(report.steps.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 45));
    }
}
