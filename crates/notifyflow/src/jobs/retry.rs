use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub base_ms: i64,
    pub max_ms: i64,
    pub jitter_pct: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_ms: 2_000,
            max_ms: 15 * 60 * 1_000,
            // 0.0 keeps the delay sequence exactly base, 2*base, 4*base, ...
            jitter_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// Transient failures retry under backoff; payload/type problems don't,
/// since no amount of retrying fixes a message the handler cannot interpret.
/// Unrecognized codes are assumed transient.
pub fn classify_error(code: &str) -> ErrorClass {
    match code {
        "TIMEOUT" | "TRANSPORT" | "DEPENDENCY_DOWN" | "RATE_LIMIT" | "LOOKUP_FAILED" => {
            ErrorClass::Retryable
        }
        "BAD_PAYLOAD" | "UNKNOWN_JOB_TYPE" => ErrorClass::NonRetryable,
        _ => ErrorClass::Retryable,
    }
}

/// Delay before re-attempting after failed attempt number `attempt_no`
/// (1-based). The exponent is `attempt_no - 1`, so a job that failed its
/// first attempt waits `base_ms`, then `2 * base_ms`, and so on.
pub fn next_delay_ms(attempt_no: i32, cfg: &RetryConfig, rng: &mut impl Rng) -> i64 {
    let attempt_no = attempt_no.max(1) as u32;

    let exp = attempt_no.saturating_sub(1);

    // Compute 2^exp safely. If exp is too large, treat the multiplier as huge
    // and let the cap handle it.
    let pow2 = 1_i64.checked_shl(exp).unwrap_or(i64::MAX);

    let mut delay = cfg.base_ms.saturating_mul(pow2);

    if delay > cfg.max_ms {
        delay = cfg.max_ms;
    }

    if cfg.jitter_pct <= 0.0 {
        return delay.clamp(0, cfg.max_ms);
    }

    // jitter in range [-jitter_pct, +jitter_pct]
    let jitter_range = (delay as f64) * cfg.jitter_pct;
    let jitter = rng.gen_range(-jitter_range..=jitter_range);

    let jittered = (delay as f64 + jitter).round() as i64;
    jittered.clamp(0, cfg.max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn backoff_doubles_per_attempt() {
        let cfg = RetryConfig {
            base_ms: 2_000,
            max_ms: 15 * 60 * 1_000,
            jitter_pct: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(next_delay_ms(1, &cfg, &mut rng), 2_000);
        assert_eq!(next_delay_ms(2, &cfg, &mut rng), 4_000);
        assert_eq!(next_delay_ms(3, &cfg, &mut rng), 8_000);
        assert_eq!(next_delay_ms(4, &cfg, &mut rng), 16_000);
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig {
            base_ms: 1_000,
            max_ms: 10_000,
            jitter_pct: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(next_delay_ms(5, &cfg, &mut rng), 10_000);
        // Large attempt numbers must not overflow the shift.
        assert_eq!(next_delay_ms(200, &cfg, &mut rng), 10_000);
    }

    #[test]
    fn jitter_stays_within_cap_and_pct() {
        let cfg = RetryConfig {
            base_ms: 1_000,
            max_ms: 60_000,
            jitter_pct: 0.2,
        };
        let mut rng = StdRng::seed_from_u64(42);

        for attempt in 1..=5 {
            let base = next_delay_ms(
                attempt,
                &RetryConfig {
                    jitter_pct: 0.0,
                    ..cfg.clone()
                },
                &mut rng,
            );
            let jittered = next_delay_ms(attempt, &cfg, &mut rng);
            let spread = (base as f64 * 0.2).ceil() as i64;
            assert!(jittered >= base - spread && jittered <= (base + spread).min(cfg.max_ms));
        }
    }

    #[test]
    fn unknown_codes_default_to_retryable() {
        assert_eq!(classify_error("SOMETHING_NEW"), ErrorClass::Retryable);
        assert_eq!(classify_error("BAD_PAYLOAD"), ErrorClass::NonRetryable);
        assert_eq!(classify_error("UNKNOWN_JOB_TYPE"), ErrorClass::NonRetryable);
    }
}
