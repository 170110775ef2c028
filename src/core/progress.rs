//! Progress accounting for streamget

use reqwest::header::{HeaderMap, CONTENT_LENGTH};

/// Ratio of bytes received so far
///
/// With a declared size the ratio is `transferred / declared` and is not
/// clamped, so a server that understates its length shows up as a value above
/// one. Without a declared size the denominator is `10^digits(transferred) + 1`,
/// which keeps the ratio strictly below one; completion is reported separately
/// by the caller.
pub fn progress(declared: Option<u64>, transferred: u64) -> f64 {
    match declared {
        Some(size) => transferred as f64 / size as f64,
        None => transferred as f64 / synthetic_target(transferred),
    }
}

fn synthetic_target(transferred: u64) -> f64 {
    10f64.powi(digit_count(transferred) as i32) + 1.0
}

fn digit_count(value: u64) -> u32 {
    value.checked_ilog10().map_or(1, |log| log + 1)
}

/// Declared body size, if the Content-Length header is a non-negative integer
pub fn parse_declared_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
