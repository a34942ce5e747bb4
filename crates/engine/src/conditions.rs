//! Step skip / run-only conditions, evaluated against the loop index.

use rand::Rng;

const DEFAULT_PROBABILITY: f64 = 0.5;

/// Evaluate a named condition for `loop_index`.
///
/// Known names: `loop_index_is_even`, `loop_index_is_odd`,
/// `loop_index_is_prime` and `random` (true with `probability`, default
/// 0.5). Anything else is false.
pub fn evaluate(condition: &str, loop_index: usize, probability: Option<f64>) -> bool {
    match condition.trim() {
        "loop_index_is_even" => loop_index % 2 == 0,
        "loop_index_is_odd" => loop_index % 2 == 1,
        "loop_index_is_prime" => is_prime(loop_index),
        "random" => {
            let p = probability
                .filter(|p| !p.is_nan())
                .unwrap_or(DEFAULT_PROBABILITY)
                .clamp(0.0, 1.0);
            rand::thread_rng().gen_bool(p)
        }
        _ => false,
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Whether a step with these conditions should be skipped for `loop_index`.
///
/// A non-empty skip condition that holds skips the step; a non-empty
/// run-only condition that does not hold skips it too.
pub fn should_skip(
    skip_condition: Option<&str>,
    run_only_condition: Option<&str>,
    loop_index: usize,
    probability: Option<f64>,
) -> bool {
    if let Some(skip) = present(skip_condition) {
        if evaluate(skip, loop_index, probability) {
            return true;
        }
    }
    if let Some(only) = present(run_only_condition) {
        if !evaluate(only, loop_index, probability) {
            return true;
        }
    }
    false
}

fn present(condition: Option<&str>) -> Option<&str> {
    condition.filter(|c| !c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity() {
        assert!(evaluate("loop_index_is_even", 0, None));
        assert!(!evaluate("loop_index_is_even", 3, None));
        assert!(evaluate("loop_index_is_odd", 3, None));
    }

    /// Sieve of Eratosthenes over `0..limit`.
    fn sieve(limit: usize) -> Vec<bool> {
        let mut is_prime = vec![true; limit];
        is_prime[0] = false;
        is_prime[1] = false;
        let mut i = 2;
        while i * i < limit {
            if is_prime[i] {
                for multiple in (i * i..limit).step_by(i) {
                    is_prime[multiple] = false;
                }
            }
            i += 1;
        }
        is_prime
    }

    #[test]
    fn primes_by_trial_division() {
        let primes: Vec<usize> = (0..30).filter(|&n| evaluate("loop_index_is_prime", n, None)).collect();
        assert_eq!(primes, [2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn primality_matches_sieve_below_ten_thousand() {
        let reference = sieve(10_000);
        for (n, expected) in reference.iter().enumerate() {
            assert_eq!(evaluate("loop_index_is_prime", n, None), *expected, "loop index {n}");
        }
    }

    #[test]
    fn random_honours_degenerate_probabilities() {
        for i in 0..50 {
            assert!(evaluate("random", i, Some(1.0)));
            assert!(!evaluate("random", i, Some(0.0)));
        }
        assert!(evaluate("random", 0, Some(7.0)), "probability is clamped");
    }

    #[test]
    fn unknown_conditions_are_false() {
        assert!(!evaluate("loop_index_is_perfect", 6, None));
        assert!(!evaluate("", 0, None));
    }

    #[test]
    fn skip_and_run_only() {
        assert!(should_skip(Some("loop_index_is_even"), None, 2, None));
        assert!(!should_skip(Some("loop_index_is_even"), None, 1, None));
        assert!(should_skip(None, Some("loop_index_is_prime"), 4, None));
        assert!(!should_skip(None, Some("loop_index_is_prime"), 5, None));
        assert!(!should_skip(Some(""), Some("  "), 0, None));
        assert!(!should_skip(None, None, 0, None));
    }
}
