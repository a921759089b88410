//! Token-count bucketing on a rounded base-2 logarithmic scale.
//!
//! Prompt and completion lengths vary over orders of magnitude, so the
//! predictor tracks them in `round(log2(n))` buckets: tiny fixed storage,
//! bounded indices regardless of input.

/// Number of buckets needed to cover token counts in `[0, max_tokens]`.
///
/// Computed as `ceil(log2(max_tokens + 1))`, so the top bucket index is
/// always a valid clamp target for counts at or beyond the maximum.
pub fn bucket_count(max_tokens: u32) -> usize {
    (f64::from(max_tokens) + 1.0).log2().ceil() as usize
}

/// Map a token count to its bucket index, clamped to `[0, limit)`.
///
/// Zero-token inputs collapse into bucket 0 together with one-token
/// inputs. Counts beyond the configured maximum land in the top bucket,
/// which keeps the mapping total under misconfiguration.
pub fn token_to_bucket(tokens: u32, limit: usize) -> usize {
    let mut bucket = 0;
    if tokens > 0 {
        bucket = f64::from(tokens).log2().round() as usize;
    }
    bucket.min(limit - 1)
}

/// The representative token count of a bucket: `2^bucket`.
pub fn bucket_tokens(bucket: usize) -> u32 {
    1u32 << bucket
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_count() {
        assert_eq!(bucket_count(1), 1);
        assert_eq!(bucket_count(2), 2);
        assert_eq!(bucket_count(1023), 10);
        assert_eq!(bucket_count(1024), 11);
        assert_eq!(bucket_count(4096), 13);
    }

    #[test]
    fn test_zero_and_one_share_bucket_zero() {
        assert_eq!(token_to_bucket(0, 11), 0);
        assert_eq!(token_to_bucket(1, 11), 0);
    }

    #[test]
    fn test_rounding_picks_nearest_power() {
        // log2(5) = 2.32 rounds down, log2(6) = 2.58 rounds up.
        assert_eq!(token_to_bucket(5, 11), 2);
        assert_eq!(token_to_bucket(6, 11), 3);
        // Values from typical request sizes.
        assert_eq!(token_to_bucket(50, 11), 6);
        assert_eq!(token_to_bucket(200, 11), 8);
        assert_eq!(token_to_bucket(400, 11), 9);
        assert_eq!(token_to_bucket(500, 11), 9);
    }

    #[test]
    fn test_exact_powers_of_two() {
        for exp in 0..10 {
            assert_eq!(token_to_bucket(1 << exp, 11), exp as usize);
        }
    }

    #[test]
    fn test_clamp_to_top_bucket() {
        assert_eq!(token_to_bucket(1_000_000, 11), 10);
        assert_eq!(token_to_bucket(u32::MAX, 11), 10);
        assert_eq!(token_to_bucket(u32::MAX, 1), 0);
    }

    #[test]
    fn test_monotone_non_decreasing() {
        let limit = bucket_count(1024);
        let mut previous = 0;
        for tokens in 0..=2048u32 {
            let bucket = token_to_bucket(tokens, limit);
            assert!(bucket >= previous, "bucket regressed at {tokens}");
            assert!(bucket < limit);
            previous = bucket;
        }
    }

    #[test]
    fn test_bucket_tokens_round_trip() {
        assert_eq!(bucket_tokens(0), 1);
        assert_eq!(bucket_tokens(6), 64);
        assert_eq!(bucket_tokens(9), 512);
        assert_eq!(bucket_tokens(10), 1024);
        for bucket in 0..11 {
            assert_eq!(token_to_bucket(bucket_tokens(bucket), 11), bucket);
        }
    }
}
