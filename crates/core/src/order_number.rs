//! Human-facing order numbers.
//!
//! Format: `KD-YYYYMMDD-XXXXXX`, where the suffix is six characters drawn from
//! an alphabet without look-alikes (`0`/`O`, `1`/`I`) so numbers survive
//! being read out over the phone.

use chrono::{DateTime, Utc};
use rand::Rng;

pub const PREFIX: &str = "KD";
const SUFFIX_LEN: usize = 6;
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate an order number for an order created at `now`.
pub fn generate<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET.get(idx).copied().map_or('X', char::from)
        })
        .collect();
    format!("{PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

/// Whether `s` has the shape of an order number.
#[must_use]
pub fn is_valid(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == PREFIX
        && date.len() == 8
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).single().unwrap_or_default();
        let mut rng = rand::rng();
        for _ in 0..200 {
            let n = generate(now, &mut rng);
            assert!(n.starts_with("KD-20250307-"), "{n}");
            assert!(is_valid(&n), "{n}");
            assert!(!n[12..].contains(['0', 'O', '1', 'I']), "{n}");
        }
    }

    #[test]
    fn test_is_valid_rejects() {
        assert!(!is_valid("KD-2025037-ABCDEF"));
        assert!(!is_valid("XX-20250307-ABCDEF"));
        assert!(!is_valid("KD-20250307-ABCDE0"));
        assert!(!is_valid("KD-20250307-ABCDEF-1"));
    }
}
