//! Reminder time parsing: "in 30 minutes Call mom", "at 09:00 Standup".

use chrono::{DateTime, Days, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

/// Used when the user gives no message after the time.
pub const DEFAULT_MESSAGE: &str = "Reminder!";

static RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^in\s+([+-]?\d+)\s+(\S+)\s*(.*)$").unwrap());
static ABSOLUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^at\s+(\d{1,2}):(\d{2})(?:\s+(.*))?$").unwrap());

/// A parsed reminder request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub at: DateTime<Utc>,
    pub message: String,
    /// The time could not be understood and `at` is the one-hour fallback.
    pub guessed: bool,
}

/// Parse `in <N> <unit> [message]` or `at <HH:MM> [message]`.
///
/// Units are matched by substring (minute, hour, day, week) or short form
/// (m, h, d, w). "at" times are local to `now`'s timezone and roll over to
/// tomorrow when already past. Anything else falls back to one hour from now
/// with the whole text as the message and `guessed` set.
pub fn parse_reminder(text: &str, now: DateTime<Tz>) -> ReminderRequest {
    let text = text.trim();
    if let Some(request) = parse_relative(text, now).or_else(|| parse_absolute(text, now)) {
        return request;
    }
    ReminderRequest {
        at: (now + TimeDelta::hours(1)).with_timezone(&Utc),
        message: message_or_default(text),
        guessed: true,
    }
}

/// Parse a free-text reply to the "when should I remind you?" prompt.
///
/// "30 minutes Take the pizza out" is read as "in 30 minutes ...".
pub fn parse_reply(text: &str, now: DateTime<Tz>) -> ReminderRequest {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("in ") || lower.starts_with("at ") {
        return parse_reminder(trimmed, now);
    }
    let prefixed = parse_reminder(&format!("in {trimmed}"), now);
    if prefixed.guessed {
        parse_reminder(trimmed, now)
    } else {
        prefixed
    }
}

fn parse_relative(text: &str, now: DateTime<Tz>) -> Option<ReminderRequest> {
    let caps = RELATIVE.captures(text)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();

    let delta = if unit.contains("minute") || matches!(unit.as_str(), "m" | "min" | "mins") {
        TimeDelta::try_minutes(amount)
    } else if unit.contains("hour") || matches!(unit.as_str(), "h" | "hr" | "hrs") {
        TimeDelta::try_hours(amount)
    } else if unit.contains("day") || unit == "d" {
        TimeDelta::try_days(amount)
    } else if unit.contains("week") || unit == "w" {
        TimeDelta::try_weeks(amount)
    } else {
        None
    }?;

    let at = now.checked_add_signed(delta)?;
    Some(ReminderRequest {
        at: at.with_timezone(&Utc),
        message: message_or_default(&caps[3]),
        guessed: false,
    })
}

fn parse_absolute(text: &str, now: DateTime<Tz>) -> Option<ReminderRequest> {
    let caps = ABSOLUTE.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let naive = now.date_naive().and_hms_opt(hour, minute, 0)?;

    let tz = now.timezone();
    let mut at = tz.from_local_datetime(&naive).earliest()?;
    if at < now {
        let tomorrow = naive.checked_add_days(Days::new(1))?;
        at = tz.from_local_datetime(&tomorrow).earliest()?;
    }

    Some(ReminderRequest {
        at: at.with_timezone(&Utc),
        message: message_or_default(caps.get(3).map_or("", |m| m.as_str())),
        guessed: false,
    })
}

fn message_or_default(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        DEFAULT_MESSAGE.to_string()
    } else {
        text.to_string()
    }
}
