//! Maximum-size string parsing.

use crate::ConfigError;

const KIB: u64 = 1024;

/// Parses a size string of the form `<integer>[G|M|K]` into bytes.
///
/// The unit suffix multiplies by 1024³, 1024² or 1024 respectively; without a suffix the
/// number is taken as raw bytes. Units are upper-case only. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns `ConfigError::InvalidMaxSize` if the numeric part is not an unsigned decimal
/// integer or the converted value does not fit in a `u64`.
pub fn parse_max_size(size: &str) -> Result<u64, ConfigError> {
    let trimmed = size.trim();
    let invalid = || ConfigError::InvalidMaxSize(size.to_owned());

    let (digits, multiplier) = match trimmed.as_bytes().last() {
        Some(b'G') => (&trimmed[..trimmed.len() - 1], KIB.pow(3)),
        Some(b'M') => (&trimmed[..trimmed.len() - 1], KIB.pow(2)),
        Some(b'K') => (&trimmed[..trimmed.len() - 1], KIB),
        _ => (trimmed, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_max_size("10M").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_max_size("2K").unwrap(), 2048);
        assert_eq!(parse_max_size("500").unwrap(), 500);
        assert_eq!(parse_max_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_max_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_max_size(" 5K ").unwrap(), 5120);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = ["abc", "", "K", "M", "-5", "1.5K", "10m", "10 K", "1KB", "+3"];

        for case in cases {
            assert!(
                matches!(parse_max_size(case), Err(ConfigError::InvalidMaxSize(_))),
                "expected failure for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let result = parse_max_size("18446744073709551615G");
        assert!(matches!(result, Err(ConfigError::InvalidMaxSize(_))));
    }

    #[test]
    fn test_error_keeps_original_input() {
        match parse_max_size("abc") {
            Err(ConfigError::InvalidMaxSize(raw)) => assert_eq!(raw, "abc"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
