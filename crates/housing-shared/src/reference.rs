use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use crate::constants::REFERENCE_PREFIX;

/// Build a receipt number of the form `NU-YYYY-MMDD-RRRR`.
///
/// `RRRR` is a random 4-digit suffix; two applications saved on the same day
/// can collide, and callers must not treat the result as a key.
pub fn generate_reference_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: u16 = rng.gen_range(1000..10_000);
    format!(
        "{REFERENCE_PREFIX}-{:04}-{:02}{:02}-{suffix}",
        now.year(),
        now.month(),
        now.day()
    )
}

/// Check that `value` has the shape produced by [`generate_reference_number`].
pub fn is_reference_number(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(year), Some(date), Some(suffix), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());

    prefix == REFERENCE_PREFIX && digits(year, 4) && digits(date, 4) && digits(suffix, 4)
}
