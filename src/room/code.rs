use rand::Rng;
use std::collections::HashSet;
use tracing::warn;

use crate::shared::AppError;

/// Full size of the numeric code space (000000-999999)
const CODE_SPACE: u32 = 1_000_000;

/// Random draws attempted before falling back to a linear scan
const MAX_RANDOM_ATTEMPTS: u32 = 32;

/// Generates a 6-digit zero-padded code not present in `taken`.
///
/// Generation is pure with respect to the snapshot: the caller reserves
/// the code by inserting the room while holding the registry lock.
pub fn generate(taken: &HashSet<String>) -> Result<String, AppError> {
    generate_in_space(taken, CODE_SPACE)
}

/// Formats a numeric code as a fixed-width 6-character string
fn format_code(n: u32) -> String {
    format!("{:06}", n)
}

fn generate_in_space(taken: &HashSet<String>, space: u32) -> Result<String, AppError> {
    let mut rng = rand::rng();

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let candidate = format_code(rng.random_range(0..space));
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }

    // Every random draw collided; walk the space in ascending order.
    warn!(
        taken = taken.len(),
        "Random code draws exhausted, scanning code space"
    );
    for n in 0..space {
        let candidate = format_code(n);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AppError::CodeSpaceExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_generate_is_six_digit_zero_padded() {
        let code = generate(&HashSet::new()).unwrap();

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_avoids_taken_codes() {
        // Saturate all but one slot of a tiny space so any draw collides
        // and the scan has exactly one code left to find.
        let taken: HashSet<String> = (0..10).filter(|n| *n != 7).map(format_code).collect();

        let code = generate_in_space(&taken, 10).unwrap();
        assert_eq!(code, "000007");
    }

    #[test]
    fn test_generate_scan_returns_lowest_free_code() {
        let taken: HashSet<String> = (0..4).map(format_code).collect();

        // Space of 6 with 0-3 taken: random draws may find 4 or 5, the
        // fallback scan finds 4 first. Either way the result is free.
        let code = generate_in_space(&taken, 6).unwrap();
        assert!(!taken.contains(&code));
    }

    #[test]
    fn test_generate_full_space_is_exhaustion_error() {
        let taken: HashSet<String> = (0..10).map(format_code).collect();

        let result = generate_in_space(&taken, 10);
        assert!(matches!(result, Err(AppError::CodeSpaceExhausted)));
    }

    #[rstest]
    #[case(0, "000000")]
    #[case(42, "000042")]
    #[case(1_234, "001234")]
    #[case(999_999, "999999")]
    fn test_format_code_pads_to_width(#[case] n: u32, #[case] expected: &str) {
        assert_eq!(format_code(n), expected);
    }
}
