//! Card number validation and fingerprinting.
//!
//! The raw card number only ever exists inside [`CardNumber`]; everything
//! downstream of ingestion sees the one-way fingerprint.

use sha2::{Digest, Sha256};

use crate::error::DomainError;

/// A structurally valid card number.
///
/// Construction via [`CardNumber::parse`] enforces the Luhn checksum,
/// so holding a `CardNumber` is proof the digits passed validation.
/// The type deliberately implements neither `Serialize` nor `Display`,
/// and its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber {
    digits: String,
}

impl CardNumber {
    /// Parses and validates a raw card number.
    ///
    /// Whitespace is stripped before validation; the remaining string
    /// must be 13-19 digits and pass the Luhn checksum. This is a
    /// structural sanity check, not a card-network lookup.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        if digits.len() < 13 || digits.len() > 19 {
            return Err(DomainError::InvalidCard(
                "card number must be 13-19 digits".to_string(),
            ));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidCard(
                "card number contains non-digit characters".to_string(),
            ));
        }
        if !luhn_checksum_ok(&digits) {
            return Err(DomainError::InvalidCard(
                "card number failed checksum".to_string(),
            ));
        }

        Ok(Self { digits })
    }

    /// Returns the one-way fingerprint of the normalized digits.
    ///
    /// Deterministic: the same card always yields the same fingerprint,
    /// regardless of how the caller spaced the input.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.digits.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CardNumber(<redacted>)")
    }
}

/// Luhn checksum: double every second digit from the right, subtract 9
/// from any result above 9, and require the total to be divisible by 10.
fn luhn_checksum_ok(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for b in digits.bytes().rev() {
        let mut d = (b - b'0') as u32;
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_known_valid_numbers() {
        for number in [
            "4242424242424242",
            "4111111111111111",
            "4222222222222",    // 13 digits
            "5555555555554444", // Mastercard test number
        ] {
            assert!(CardNumber::parse(number).is_ok(), "rejected {number}");
        }
    }

    #[test]
    fn test_strips_whitespace_before_validation() {
        assert!(CardNumber::parse("4242 4242 4242 4242").is_ok());
        assert!(CardNumber::parse(" 4111111111111111 ").is_ok());
    }

    #[test]
    fn test_rejects_bad_length() {
        assert!(matches!(
            CardNumber::parse("424242424242"), // 12 digits
            Err(DomainError::InvalidCard(_))
        ));
        assert!(matches!(
            CardNumber::parse("42424242424242424242"), // 20 digits
            Err(DomainError::InvalidCard(_))
        ));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(matches!(
            CardNumber::parse("4242-4242-4242-4242"),
            Err(DomainError::InvalidCard(_))
        ));
        assert!(matches!(
            CardNumber::parse("424242424242424x"),
            Err(DomainError::InvalidCard(_))
        ));
    }

    #[test]
    fn test_rejects_failed_checksum() {
        assert!(matches!(
            CardNumber::parse("1234567812345678"),
            Err(DomainError::InvalidCard(_))
        ));
        assert!(matches!(
            CardNumber::parse("4242424242424241"),
            Err(DomainError::InvalidCard(_))
        ));
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_one_way() {
        let raw = "4242424242424242";
        let a = CardNumber::parse(raw).unwrap().fingerprint();
        let b = CardNumber::parse(raw).unwrap().fingerprint();

        assert_eq!(a, b);
        assert_ne!(a, raw);
        assert_eq!(a.len(), 64); // hex-encoded SHA-256
    }

    #[test]
    fn test_fingerprint_ignores_input_spacing() {
        let spaced = CardNumber::parse("4242 4242 4242 4242").unwrap();
        let plain = CardNumber::parse("4242424242424242").unwrap();
        assert_eq!(spaced.fingerprint(), plain.fingerprint());
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let card = CardNumber::parse("4242424242424242").unwrap();
        let debug = format!("{card:?}");
        assert!(!debug.contains("4242"));
    }
}
