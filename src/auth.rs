//! Authenticator token validation
//!
//! Accounts may carry a shared secret from which a time-based token is
//! derived. A supplied token is accepted for the current period and the
//! periods directly before and after it, absorbing clock drift between
//! client and server. The derivation itself is a login-provider black
//! box; this module only owns the window rule.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current token period index for the given period length
pub fn current_period(period: Duration) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() / period.as_secs().max(1)) as i64
}

/// Check a supplied token against the acceptance window
///
/// `derive` produces the expected token for a period index. Accounts
/// without a secret accept any token; with a secret, an empty token is
/// always rejected.
pub fn verify_token<F>(secret: Option<&str>, supplied: &str, period_index: i64, derive: F) -> bool
where
    F: Fn(&str, i64) -> String,
{
    let Some(secret) = secret else {
        return true;
    };

    if supplied.is_empty() {
        return false;
    }

    [period_index, period_index - 1, period_index + 1]
        .iter()
        .any(|&p| derive(secret, p) == supplied)
}
