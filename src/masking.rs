//! Best-effort PII masking applied to text before it leaves the process.
//!
//! Two substitutions run over the whole input: email local parts are reduced
//! to their first character, and 11-digit phone-like runs lose their middle
//! four digits. This is pattern matching, not compliance-grade redaction:
//! anything the patterns do not recognise is sent through unchanged.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Fixed-width token replacing the hidden part of a match.
pub const EMAIL_MASK: &str = "***";
/// Fixed-width token replacing the middle digits of a phone-like run.
pub const PHONE_MASK: &str = "****";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9_.+-])([a-zA-Z0-9_.+-]*)@([a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+)")
        .expect("valid email regex")
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})\d{4}(\d{4})").expect("valid phone regex"));

/// Mask emails and phone-like digit runs in `text`.
///
/// Never fails. Idempotent for isolated emails and for digit runs of 11–17
/// digits; longer runs can expose a fresh 11-digit window on a second pass.
///
/// # Examples
///
/// ```
/// use versa::masking::mask;
///
/// assert_eq!(mask("alice@x.com"), "a***@x.com");
/// assert_eq!(mask("call 13812345678"), "call 138****5678");
/// ```
pub fn mask(text: &str) -> String {
    let masked = mask_emails(text);
    mask_phones(&masked)
}

/// Keep the first character of the local part and the full domain.
pub fn mask_emails(text: &str) -> String {
    EMAIL_RE
        .replace_all(text, |caps: &Captures| {
            format!("{}{}@{}", &caps[1], EMAIL_MASK, &caps[3])
        })
        .into_owned()
}

/// Keep the leading three and trailing four digits of each 11-digit run.
pub fn mask_phones(text: &str) -> String {
    PHONE_RE
        .replace_all(text, |caps: &Captures| {
            format!("{}{}{}", &caps[1], PHONE_MASK, &caps[2])
        })
        .into_owned()
}
