//! Built-in testnet catalogue and an offline [`JobSource`].

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::parser::{self, ParsedTask};
use super::JobSource;
use crate::error::Result;
use crate::types::{TaskDefinition, TestnetJob};

fn faucet(description: &str) -> TaskDefinition {
    TaskDefinition::ClaimFaucet {
        description: description.to_string(),
    }
}

/// Hundredths, e.g. `cents(8)` is 0.08.
fn cents(n: i64) -> Option<Decimal> {
    Some(Decimal::new(n, 2))
}

fn job(id: &str, name: &str, chain: &str, score: u32, tasks: Vec<TaskDefinition>) -> TestnetJob {
    TestnetJob {
        id: id.to_string(),
        name: name.to_string(),
        chain: chain.to_string(),
        tasks,
        score: Some(score),
        status: Some("active".to_string()),
    }
}

/// The five campaigns served when the discovery service is unreachable.
pub fn mock_testnets() -> Vec<TestnetJob> {
    vec![
        job(
            "scroll-sepolia",
            "Scroll Sepolia",
            "scroll",
            95,
            vec![
                faucet("Claim testnet ETH"),
                TaskDefinition::SwapTokens {
                    description: "Swap 0.1 ETH to USDC".into(),
                    amount_min: cents(8),
                    amount_max: cents(12),
                },
                TaskDefinition::Bridge {
                    description: "Bridge to Ethereum".into(),
                    amount_min: cents(5),
                    amount_max: cents(10),
                },
            ],
        ),
        job(
            "linea-goerli",
            "Linea Goerli",
            "linea",
            92,
            vec![
                faucet("Claim testnet tokens"),
                TaskDefinition::SwapTokens {
                    description: "Swap tokens".into(),
                    amount_min: cents(5),
                    amount_max: cents(15),
                },
                TaskDefinition::MintNft {
                    description: "Mint test NFT".into(),
                    count_min: Some(1),
                    count_max: Some(3),
                },
            ],
        ),
        job(
            "base-sepolia",
            "Base Sepolia",
            "base",
            90,
            vec![
                faucet("Claim Base ETH"),
                TaskDefinition::SwapTokens {
                    description: "Swap on Uniswap".into(),
                    amount_min: cents(1),
                    amount_max: cents(5),
                },
            ],
        ),
        job(
            "optimism-sepolia",
            "Optimism Sepolia",
            "optimism",
            88,
            vec![
                faucet("Claim OP tokens"),
                TaskDefinition::ProvideLiquidity {
                    description: "Add liquidity".into(),
                    amount_min: cents(10),
                    amount_max: cents(30),
                },
            ],
        ),
        job(
            "arbitrum-sepolia",
            "Arbitrum Sepolia",
            "arbitrum",
            85,
            vec![
                faucet("Claim ARB tokens"),
                TaskDefinition::Stake {
                    description: "Stake tokens".into(),
                    amount_min: cents(10),
                    amount_max: cents(50),
                },
            ],
        ),
    ]
}

/// Catalogue without the excluded ids.
pub fn mock_testnets_excluding(exclude_ids: &[String]) -> Vec<TestnetJob> {
    mock_testnets()
        .into_iter()
        .filter(|j| !exclude_ids.contains(&j.id))
        .collect()
}

/// Serves the built-in catalogue; nothing is eligible.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineJobSource;

#[async_trait]
impl JobSource for OfflineJobSource {
    async fn fetch_new_jobs(&self, exclude_ids: &[String]) -> Result<Vec<TestnetJob>> {
        Ok(mock_testnets_excluding(exclude_ids))
    }

    async fn check_eligibility(&self, _addresses: &[String]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn parse_task(&self, text: &str) -> Result<ParsedTask> {
        Ok(parser::parse(text))
    }
}
