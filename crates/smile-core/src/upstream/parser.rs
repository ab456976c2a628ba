//! Local keyword parser for free-form task descriptions.
//!
//! Used when the parsing service is unreachable. Each non-empty line is
//! classified by the first matching keyword group; lines matching nothing
//! are dropped.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::jitter::AMOUNT_SCALE;
use crate::types::{TaskDefinition, TestnetJob};

pub const CUSTOM_TESTNET_NAME: &str = "Custom Task";
pub const DEFAULT_NETWORK: &str = "ethereum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Unknown,
    Simple,
    Medium,
    Hard,
}

impl Complexity {
    pub fn for_steps(steps: usize) -> Self {
        match steps {
            0 => Self::Unknown,
            1 => Self::Simple,
            2..=3 => Self::Medium,
            _ => Self::Hard,
        }
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_testnet() -> String {
    CUSTOM_TESTNET_NAME.to_string()
}

/// Structured form of a free-text task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTask {
    #[serde(default = "default_testnet")]
    pub testnet: String,
    #[serde(default = "default_network")]
    pub network: String,
    pub steps: Vec<TaskDefinition>,
    #[serde(default)]
    pub complexity: Complexity,
}

impl ParsedTask {
    /// True unless a step needs a human.
    pub fn can_automate(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s, TaskDefinition::Custom { manual: true, .. }))
    }

    /// Runnable job with a fresh `custom-<millis>` id.
    pub fn into_job(self) -> TestnetJob {
        TestnetJob {
            id: format!("custom-{}", Utc::now().timestamp_millis()),
            name: self.testnet,
            chain: self.network,
            tasks: self.steps,
            score: None,
            status: Some("custom".to_string()),
        }
    }
}

pub fn parse(text: &str) -> ParsedTask {
    let steps: Vec<TaskDefinition> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(parse_line)
        .collect();

    ParsedTask {
        testnet: default_testnet(),
        network: detect_network(text).to_string(),
        complexity: Complexity::for_steps(steps.len()),
        steps,
    }
}

fn parse_line(line: &str) -> Option<TaskDefinition> {
    let lower = line.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    let description = line.to_string();

    let task = if has(&["claim", "faucet"]) {
        TaskDefinition::ClaimFaucet { description }
    } else if has(&["swap", "exchange"]) {
        let (amount_min, amount_max) = amount_bounds(line);
        TaskDefinition::SwapTokens { description, amount_min: Some(amount_min), amount_max: Some(amount_max) }
    } else if has(&["bridge"]) {
        let (amount_min, amount_max) = amount_bounds(line);
        TaskDefinition::Bridge { description, amount_min: Some(amount_min), amount_max: Some(amount_max) }
    } else if has(&["mint"]) && has(&["nft", "token"]) {
        let (count_min, count_max) = count_bounds(line);
        TaskDefinition::MintNft { description, count_min: Some(count_min), count_max: Some(count_max) }
    } else if has(&["stake", "deposit"]) {
        let (amount_min, amount_max) = amount_bounds(line);
        TaskDefinition::Stake { description, amount_min: Some(amount_min), amount_max: Some(amount_max) }
    } else if has(&["liquidity", "pool"]) {
        let (amount_min, amount_max) = amount_bounds(line);
        TaskDefinition::ProvideLiquidity {
            description,
            amount_min: Some(amount_min),
            amount_max: Some(amount_max),
        }
    } else if has(&["step", "task"]) {
        TaskDefinition::Custom { description, manual: has(&["manual"]) }
    } else {
        return None;
    };
    Some(task)
}

/// First `\d+(\.\d*)?` run in `text`.
fn first_number(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    Some(&text[start..end])
}

/// First number ±10 %, or the swap defaults when absent or out of range.
fn amount_bounds(text: &str) -> (Decimal, Decimal) {
    first_number(text)
        .map(|n| n.trim_end_matches('.'))
        .and_then(|n| Decimal::from_str(n).ok())
        .and_then(|a| {
            let min = a.checked_mul(Decimal::new(9, 1))?;
            let max = a.checked_mul(Decimal::new(11, 1))?;
            Some((min.round_dp(AMOUNT_SCALE), max.round_dp(AMOUNT_SCALE)))
        })
        .unwrap_or((Decimal::new(1, 2), Decimal::new(1, 1)))
}

/// First integer as an exact count, or 1..=3.
fn count_bounds(text: &str) -> (u32, u32) {
    first_number(text)
        .and_then(|n| n.split('.').next())
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| (n, n))
        .unwrap_or((1, 3))
}

pub fn detect_network(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let has_word = |w: &str| {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == w)
    };

    if lower.contains("scroll") {
        "scroll"
    } else if lower.contains("linea") {
        "linea"
    } else if lower.contains("base") {
        "base"
    } else if lower.contains("optimism") || has_word("op") {
        "optimism"
    } else if lower.contains("arbitrum") || has_word("arb") {
        "arbitrum"
    } else if lower.contains("polygon") {
        "polygon"
    } else {
        DEFAULT_NETWORK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskKind;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_multiline_campaign() {
        let text = "Claim from the Scroll faucet\n\
                    Swap 0.5 ETH to USDC\n\
                    \n\
                    Bridge back to Sepolia\n\
                    Mint 2 NFT badges\n\
                    Read the blog";
        let parsed = parse(text);

        let kinds: Vec<TaskKind> = parsed.steps.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![TaskKind::ClaimFaucet, TaskKind::SwapTokens, TaskKind::Bridge, TaskKind::MintNft]
        );
        assert_eq!(parsed.network, "scroll");
        assert_eq!(parsed.complexity, Complexity::Hard);
        assert_eq!(parsed.steps[0].description(), "Claim from the Scroll faucet");

        match &parsed.steps[1] {
            TaskDefinition::SwapTokens { amount_min, amount_max, .. } => {
                assert_eq!(*amount_min, Some(dec("0.45")));
                assert_eq!(*amount_max, Some(dec("0.55")));
            }
            other => panic!("unexpected step: {:?}", other),
        }
        match &parsed.steps[3] {
            TaskDefinition::MintNft { count_min, count_max, .. } => {
                assert_eq!((*count_min, *count_max), (Some(2), Some(2)));
            }
            other => panic!("unexpected step: {:?}", other),
        }
    }

    #[test]
    fn test_amount_defaults_without_number() {
        assert_eq!(amount_bounds("swap some tokens"), (dec("0.01"), dec("0.1")));
        assert_eq!(count_bounds("mint an nft"), (1, 3));
        assert_eq!(amount_bounds("deposit 3. ETH"), (dec("2.7"), dec("3.3")));
    }

    #[test]
    fn test_oversized_amount_uses_defaults() {
        assert_eq!(
            amount_bounds("Swap 75000000000000000000000000000 ETH"),
            (dec("0.01"), dec("0.1"))
        );
        // More digits than a Decimal holds at all
        assert_eq!(
            amount_bounds("bridge 123456789012345678901234567890123 ETH"),
            (dec("0.01"), dec("0.1"))
        );

        let parsed = parse("Swap 75000000000000000000000000000 ETH");
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.steps[0].kind(), TaskKind::SwapTokens);
    }

    #[test]
    fn test_liquidity_and_stake_keywords() {
        let parsed = parse("Add to the pool\nDeposit into vault");
        let kinds: Vec<TaskKind> = parsed.steps.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![TaskKind::ProvideLiquidity, TaskKind::Stake]);
        assert_eq!(parsed.complexity, Complexity::Medium);
    }

    #[test]
    fn test_manual_step_blocks_automation() {
        let parsed = parse("Step 1: follow on twitter manually");
        assert_eq!(parsed.steps.len(), 1);
        assert!(!parsed.can_automate());

        let auto = parse("Task: send a transaction");
        assert!(auto.can_automate());
        assert_eq!(auto.complexity, Complexity::Simple);
    }

    #[test]
    fn test_unrecognized_text_has_no_steps() {
        let parsed = parse("hello world");
        assert!(parsed.steps.is_empty());
        assert_eq!(parsed.complexity, Complexity::Unknown);
        assert_eq!(parsed.network, DEFAULT_NETWORK);
    }

    #[test]
    fn test_network_detection() {
        assert_eq!(detect_network("bridge to Linea"), "linea");
        assert_eq!(detect_network("claim OP rewards"), "optimism");
        assert_eq!(detect_network("develop a shop"), DEFAULT_NETWORK);
        assert_eq!(detect_network("stake ARB"), "arbitrum");
    }

    #[test]
    fn test_into_job() {
        let job = parse("Claim faucet on base").into_job();
        assert!(job.id.starts_with("custom-"));
        assert_eq!(job.chain, "base");
        assert_eq!(job.name, CUSTOM_TESTNET_NAME);
        assert_eq!(job.tasks.len(), 1);
    }
}
