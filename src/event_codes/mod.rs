//! Event Code Resolution
//!
//! Resolves the `TYPE`, `CODE` and `VALUE` tokens of a device rule file into
//! numbers. A token is either a C-style integer literal (`30`, `0x1e`, `036`)
//! or one of the symbolic names defined by `<linux/input-event-codes.h>`
//! (`EV_KEY`, `KEY_PAGEDOWN`, `BTN_RIGHT`, ...).
//!
//! The name table is built once on first use and never mutated.

use std::collections::HashMap;
use std::sync::OnceLock;

mod table;

use table::EVENT_CODES;

fn codes() -> &'static HashMap<&'static str, i32> {
    static CODES: OnceLock<HashMap<&'static str, i32>> = OnceLock::new();
    CODES.get_or_init(|| EVENT_CODES.iter().copied().collect())
}

/// Resolve a rule token to its numeric value
///
/// Integer literals win over the name table; names are matched verbatim
/// (case-sensitive). Returns `None` if the token is neither.
pub fn resolve(token: &str) -> Option<i32> {
    parse_integer(token).or_else(|| lookup(token))
}

/// Look up a symbolic event code name
pub fn lookup(name: &str) -> Option<i32> {
    codes().get(name).copied()
}

/// Number of symbolic names known to the resolver
pub fn known_name_count() -> usize {
    codes().len()
}

/// Parse an integer literal using C base auto-detection
///
/// Accepts an optional sign followed by `0x`/`0X` hex digits, a leading `0`
/// with octal digits, or plain decimal digits. The result must fit in `i32`.
pub fn parse_integer(token: &str) -> Option<i32> {
    let (negative, digits) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    // from_str_radix tolerates its own sign; the sign was consumed above
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i64::from_str_radix(body, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}
