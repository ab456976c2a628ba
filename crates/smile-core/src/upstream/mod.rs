//! ============================================================================
//! Upstream - Job discovery, eligibility checks and task parsing
//! ============================================================================
//! `JobSource` is the seam to the backend service. `JobService` wraps any
//! source with the store and never fails on upstream errors:
//! - discovery falls back to the built-in catalogue
//! - eligibility falls back to "nobody eligible"
//! - parsing falls back to the local keyword parser
//! ============================================================================

pub mod http;
pub mod mock;
pub mod parser;

pub use http::HttpJobSource;
pub use mock::{mock_testnets, mock_testnets_excluding, OfflineJobSource};
pub use parser::{Complexity, ParsedTask};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::BotDb;
use crate::error::Result;
use crate::types::{ClaimRecord, TestnetJob};

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Campaigns not in `exclude_ids`.
    async fn fetch_new_jobs(&self, exclude_ids: &[String]) -> Result<Vec<TestnetJob>>;

    /// Subset of `addresses` eligible for a claim.
    async fn check_eligibility(&self, addresses: &[String]) -> Result<Vec<String>>;

    async fn parse_task(&self, text: &str) -> Result<ParsedTask>;
}

pub struct JobService {
    db: Arc<BotDb>,
    source: Arc<dyn JobSource>,
}

impl JobService {
    pub fn new(db: Arc<BotDb>, source: Arc<dyn JobSource>) -> Self {
        Self { db, source }
    }

    /// Fetch campaigns not yet completed by any wallet and store them.
    pub async fn discover(&self) -> Result<Vec<TestnetJob>> {
        let completed = self.db.completed_job_ids()?;
        let mut jobs = match self.source.fetch_new_jobs(&completed).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Discovery failed ({}), using built-in testnets", e);
                mock_testnets()
            }
        };
        jobs.retain(|j| !completed.contains(&j.id));

        self.db.put_batch(&jobs)?;
        info!(
            "{} testnets available ({} already completed)",
            jobs.len(),
            completed.len()
        );
        Ok(jobs)
    }

    /// Campaigns stored by earlier discoveries.
    pub fn stored_jobs(&self) -> Result<Vec<TestnetJob>> {
        Ok(self.db.get_all()?)
    }

    /// Ask upstream which addresses may claim and record them.
    pub async fn check_eligibility(&self, addresses: &[String]) -> Result<Vec<String>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let eligible = match self.source.check_eligibility(addresses).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!("Eligibility check failed: {}", e);
                return Ok(Vec::new());
            }
        };

        let now = Utc::now();
        let claims: Vec<ClaimRecord> = eligible
            .iter()
            .map(|address| ClaimRecord {
                id: 0,
                address: address.clone(),
                checked_at: now,
            })
            .collect();
        self.db.append(claims)?;
        info!("{} of {} wallets eligible", eligible.len(), addresses.len());
        Ok(eligible)
    }

    /// Structured steps for `text`, locally parsed if upstream is unavailable.
    pub async fn parse_task(&self, text: &str) -> ParsedTask {
        match self.source.parse_task(text).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Task parsing failed ({}), using local parser", e);
                parser::parse(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{temp_db, wallet};
    use crate::db::Collection;
    use crate::error::SmileError;
    use crate::types::{ClaimRecord, TaskKind};
    use std::sync::Mutex;

    /// Always unreachable.
    struct Down;

    #[async_trait]
    impl JobSource for Down {
        async fn fetch_new_jobs(&self, _: &[String]) -> Result<Vec<TestnetJob>> {
            Err(SmileError::Upstream("connection refused".into()))
        }
        async fn check_eligibility(&self, _: &[String]) -> Result<Vec<String>> {
            Err(SmileError::Upstream("connection refused".into()))
        }
        async fn parse_task(&self, _: &str) -> Result<ParsedTask> {
            Err(SmileError::Upstream("connection refused".into()))
        }
    }

    /// Records the exclusion list and marks every other address eligible.
    #[derive(Default)]
    struct Scripted {
        excluded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobSource for Scripted {
        async fn fetch_new_jobs(&self, exclude_ids: &[String]) -> Result<Vec<TestnetJob>> {
            *self.excluded.lock().unwrap() = exclude_ids.to_vec();
            Ok(mock_testnets_excluding(exclude_ids))
        }
        async fn check_eligibility(&self, addresses: &[String]) -> Result<Vec<String>> {
            Ok(addresses.iter().step_by(2).cloned().collect())
        }
        async fn parse_task(&self, text: &str) -> Result<ParsedTask> {
            Ok(parser::parse(text))
        }
    }

    fn service(source: Arc<dyn JobSource>) -> (tempfile::TempDir, Arc<BotDb>, JobService) {
        let (dir, db) = temp_db();
        let db = Arc::new(db);
        let svc = JobService::new(db.clone(), source);
        (dir, db, svc)
    }

    #[tokio::test]
    async fn test_discover_excludes_completed_ids() {
        let source = Arc::new(Scripted::default());
        let (_dir, db, svc) = service(source.clone());
        db.put_batch(&[wallet(1)]).unwrap();
        db.record_completion("scroll-sepolia", &wallet(1).address).unwrap();
        db.record_completion("base-sepolia", &wallet(1).address).unwrap();

        let jobs = svc.discover().await.unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["linea-goerli", "optimism-sepolia", "arbitrum-sepolia"]);
        assert_eq!(
            *source.excluded.lock().unwrap(),
            vec!["base-sepolia".to_string(), "scroll-sepolia".to_string()]
        );
        assert_eq!(db.count(Collection::Jobs).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_catalogue() {
        let (_dir, db, svc) = service(Arc::new(Down));
        db.put_batch(&[wallet(1)]).unwrap();
        db.record_completion("linea-goerli", &wallet(1).address).unwrap();

        let jobs = svc.discover().await.unwrap();
        assert_eq!(jobs.len(), 4);
        assert!(jobs.iter().all(|j| j.id != "linea-goerli"));
        assert_eq!(svc.stored_jobs().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_eligibility_records_claims() {
        let (_dir, db, svc) = service(Arc::new(Scripted::default()));
        let addresses: Vec<String> = (1..=5).map(|i| wallet(i).address).collect();

        let eligible = svc.check_eligibility(&addresses).await.unwrap();
        assert_eq!(eligible.len(), 3);

        let claims: Vec<ClaimRecord> = db.get_all().unwrap();
        assert_eq!(
            claims.iter().map(|c| c.address.as_str()).collect::<Vec<_>>(),
            vec![addresses[0].as_str(), addresses[2].as_str(), addresses[4].as_str()]
        );
    }

    #[tokio::test]
    async fn test_eligibility_failure_is_empty() {
        let (_dir, db, svc) = service(Arc::new(Down));
        let eligible = svc.check_eligibility(&["0x1".to_string()]).await.unwrap();
        assert!(eligible.is_empty());
        assert_eq!(db.count(Collection::Claims).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_parse_falls_back_to_local() {
        let (_dir, _db, svc) = service(Arc::new(Down));
        let parsed = svc.parse_task("Claim faucet\nBridge 0.2 ETH to Scroll").await;
        let kinds: Vec<TaskKind> = parsed.steps.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![TaskKind::ClaimFaucet, TaskKind::Bridge]);
        assert_eq!(parsed.network, "scroll");
    }
}
