//! ============================================================================
//! Jitter - Randomized delays and amounts
//! ============================================================================
//! Every pause and every amount is scaled by a uniform factor so consecutive
//! operations never share the same timing or on-chain footprint:
//! - delay  = base × U(delay_min, delay_max)
//! - amount = U(min, max) × U(amount_min, amount_max), 6 decimal places
//! ============================================================================

use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::JitterConfig;
use crate::error::Result;

/// Decimal places kept on randomized amounts
pub const AMOUNT_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct Jitter {
    config: JitterConfig,
}

impl Default for Jitter {
    fn default() -> Self {
        Self {
            config: JitterConfig::default(),
        }
    }
}

impl Jitter {
    pub fn new(config: JitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    fn factor(min: f64, max: f64) -> f64 {
        if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        }
    }

    /// `base` scaled into the delay window.
    pub fn delay(&self, base: Duration) -> Duration {
        base.mul_f64(Self::factor(self.config.delay_min, self.config.delay_max))
    }

    /// Sleep for a jittered `base`. A zero base only yields to the scheduler.
    pub async fn pause(&self, base: Duration) {
        if base.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(self.delay(base)).await;
        }
    }

    /// Uniform draw in `[min, max]` perturbed by the amount window.
    pub fn amount(&self, min: Decimal, max: Decimal) -> Decimal {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let lo_f = lo.to_f64().unwrap_or(0.0);
        let hi_f = hi.to_f64().unwrap_or(lo_f);

        let drawn = Self::factor(lo_f, hi_f);
        let scaled = drawn * Self::factor(self.config.amount_min, self.config.amount_max);

        Decimal::from_f64(scaled)
            .unwrap_or(lo)
            .round_dp(AMOUNT_SCALE)
    }

    /// Uniform integer in `[min, max]`.
    pub fn count(&self, min: u32, max: u32) -> u32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        rand::thread_rng().gen_range(lo..=hi)
    }
}

/// Synthetic `0x` + 64 hex transaction reference.
pub fn synthetic_tx_hash() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_delay_within_window() {
        let jitter = Jitter::default();
        for _ in 0..50 {
            let d = jitter.delay(Duration::from_secs(10));
            assert!(d >= Duration::from_millis(7000), "{:?}", d);
            assert!(d <= Duration::from_millis(13000), "{:?}", d);
        }
    }

    #[test]
    fn test_fixed_window_is_deterministic() {
        let jitter = Jitter::new(JitterConfig {
            delay_min: 1.0,
            delay_max: 1.0,
            amount_min: 1.0,
            amount_max: 1.0,
        })
        .unwrap();
        assert_eq!(jitter.delay(Duration::from_millis(250)), Duration::from_millis(250));
        assert_eq!(jitter.amount(dec("0.1"), dec("0.1")), dec("0.1"));
    }

    #[test]
    fn test_amount_within_jittered_bounds() {
        let jitter = Jitter::default();
        let (min, max) = (dec("0.08"), dec("0.12"));
        for _ in 0..100 {
            let a = jitter.amount(min, max);
            assert!(a >= dec("0.068"), "{}", a);
            assert!(a <= dec("0.138"), "{}", a);
            assert!(a.scale() <= AMOUNT_SCALE);
        }
    }

    #[test]
    fn test_amount_accepts_swapped_bounds() {
        let jitter = Jitter::default();
        let a = jitter.amount(dec("1"), dec("0.1"));
        assert!(a >= dec("0.085") && a <= dec("1.15"));
    }

    #[test]
    fn test_count_inclusive() {
        let jitter = Jitter::default();
        let mut seen = [false; 4];
        for _ in 0..200 {
            let c = jitter.count(1, 3);
            assert!((1..=3).contains(&c));
            seen[c as usize] = true;
        }
        assert!(seen[1] && seen[2] && seen[3]);
        assert_eq!(jitter.count(2, 2), 2);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let bad = JitterConfig { delay_min: 2.0, delay_max: 1.0, ..Default::default() };
        assert!(Jitter::new(bad).is_err());
    }

    #[test]
    fn test_tx_hash_shape() {
        let h = synthetic_tx_hash();
        assert_eq!(h.len(), 66);
        assert!(h.starts_with("0x"));
        assert!(h[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_zero_pause_returns() {
        Jitter::default().pause(Duration::ZERO).await;
    }
}
