// src/flow/compare.rs

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::model::CheckupId;
use crate::types::Conditional;

const MACRO_PATTERN: &str = r"^\$\{\s*(\d+)\s*\}$";

/// `${N}` refers to the latest logged value of checkup N.
static MACRO: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(MACRO_PATTERN) {
    Ok(r) => Some(r),
    Err(e) => {
        warn!(pattern = MACRO_PATTERN, error = %e, "invalid macro regex; thresholds are literal");
        None
    }
});

/// Checkup a threshold refers to, if it is a `${N}` macro.
pub fn macro_reference(threshold: &str) -> Option<CheckupId> {
    MACRO
        .as_ref()?
        .captures(threshold.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
        .map(CheckupId)
}

/// Compare a checkup value against its (already resolved) threshold.
///
/// Both sides are parsed as floats after trimming. If either side is not a
/// number the comparison is never satisfied.
pub fn check(value: &str, threshold: &str, conditional: Conditional) -> bool {
    let (Some(value), Some(threshold)) = (parse_number(value), parse_number(threshold)) else {
        debug!(value, threshold, "non-numeric checkup comparison");
        return false;
    };

    match conditional {
        Conditional::Equal => value == threshold,
        Conditional::NotEqual => value != threshold,
        Conditional::LowerThan => value < threshold,
        Conditional::LowerThanOrEqual => value <= threshold,
        Conditional::GreaterThan => value > threshold,
        Conditional::GreaterThanOrEqual => value >= threshold,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}
