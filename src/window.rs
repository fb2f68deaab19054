use chrono::{Local, NaiveTime, Timelike};

use crate::rule::Rule;

/// Current local wall-clock time, truncated to the rule's second-precision
/// domain.
///
/// Rule fields carry second precision and the window's end is inclusive for
/// the whole end second; evaluating a raw sub-second reading against them
/// would end the window partway through its final second.
pub fn local_now() -> NaiveTime {
    let now = Local::now().time();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Decide whether `now` falls inside the rule's blocking window.
///
/// Pure and side-effect free; safe to call from any task without
/// synchronization since both inputs are value copies.
///
/// For a non-wrapping window (`start <= end`) the decision is true exactly
/// for `start <= now <= end`, both ends inclusive. For a window that wraps
/// midnight (`start > end`, e.g. 22:00-06:00) it is true for
/// `now >= start || now <= end`.
///
/// Callers handle the sentinel (`start == end`) before calling: the
/// enforcement loop skips the tick entirely in that case, so this function
/// is never consulted for a disabled rule.
pub fn should_block(rule: Rule, now: NaiveTime) -> bool {
    if rule.start <= rule.end {
        rule.start <= now && now <= rule.end
    } else {
        now >= rule.start || now <= rule.end
    }
}
