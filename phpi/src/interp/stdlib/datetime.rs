//! Date and time functions
//!
//! Times are rendered in UTC, the default timezone of an unconfigured PHP.

use super::{Context, NativeFn};
use crate::interp::env::Environment;
use crate::interp::error::PhpResult;
use crate::interp::validator::ParamValidator;
use crate::interp::value::{Array, ArrayKey, Value};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::fmt::Write;

pub fn register(env: &mut Environment) {
    let functions: [(&str, NativeFn); 7] = [
        ("checkdate", checkdate),
        ("date", date),
        ("getdate", getdate),
        ("localtime", localtime),
        ("microtime", microtime),
        ("mktime", mktime),
        ("time", time),
    ];
    for (name, function) in functions {
        env.register_native(name, function);
    }
}

fn time(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    ParamValidator::new("time").bind::<0>(args)?;
    Ok(Value::Int(Utc::now().timestamp()))
}

fn microtime(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [as_float] = ParamValidator::new("microtime")
        .optional("$as_float", &["bool"], Value::Bool(false))
        .bind(args)?;
    let now = Utc::now();
    let micros = now.timestamp_subsec_micros();
    Ok(if as_float.to_bool() {
        Value::Float(now.timestamp() as f64 + micros as f64 / 1e6)
    } else {
        Value::Str(format!("0.{micros:06}00 {}", now.timestamp()))
    })
}

fn checkdate(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [month, day, year] = ParamValidator::new("checkdate")
        .param("$month", &["int"])
        .param("$day", &["int"])
        .param("$year", &["int"])
        .bind(args)?;
    let (month, day, year) = (month.to_int(), day.to_int(), year.to_int());
    let valid = (1..=32767).contains(&year)
        && (1..=12).contains(&month)
        && (1..=31).contains(&day)
        && NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).is_some();
    Ok(Value::Bool(valid))
}

fn date(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [format, timestamp] = ParamValidator::new("date")
        .param("$format", &["string"])
        .optional("$timestamp", &["int"], Value::Null)
        .bind(args)?;
    Ok(Value::Str(format_date(&format.to_php_string(), &at(&timestamp))))
}

/// Time of an optional `$timestamp` argument; `null` is now
fn at(timestamp: &Value) -> DateTime<Utc> {
    match timestamp {
        Value::Null => Utc::now(),
        timestamp => DateTime::from_timestamp(timestamp.to_int(), 0).unwrap_or_default(),
    }
}

/// `mktime($hour, $minute, $second, $month, $day, $year)`; omitted parts are
/// taken from the current time and out-of-range parts carry over
fn mktime(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [hour, minute, second, month, day, year] = ParamValidator::new("mktime")
        .param("$hour", &["int"])
        .optional("$minute", &["int"], Value::Null)
        .optional("$second", &["int"], Value::Null)
        .optional("$month", &["int"], Value::Null)
        .optional("$day", &["int"], Value::Null)
        .optional("$year", &["int"], Value::Null)
        .bind(args)?;
    let now = Utc::now();
    let part = |value: &Value, current: i64| match value {
        Value::Null => current,
        value => value.to_int(),
    };
    let year = match year {
        Value::Null => now.year() as i64,
        year => match year.to_int() {
            y @ 0..=69 => y + 2000,
            y @ 70..=100 => y + 1900,
            y => y,
        },
    };
    let parts = [
        year,
        part(&month, now.month() as i64),
        part(&day, now.day() as i64),
        part(&hour, now.hour() as i64),
        part(&minute, now.minute() as i64),
        part(&second, now.second() as i64),
    ];
    Ok(make_timestamp(parts).map_or(Value::Bool(false), Value::Int))
}

/// Seconds since the epoch of `[year, month, day, hour, minute, second]`
fn make_timestamp([year, month, day, hour, minute, second]: [i64; 6]) -> Option<i64> {
    let months = year.checked_mul(12)?.checked_add(month.checked_sub(1)?)?;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let first = NaiveDate::from_ymd_opt(year, months.rem_euclid(12) as u32 + 1, 1)?;
    let days = first.and_hms_opt(0, 0, 0)?.and_utc().timestamp() / 86_400;
    let days = days.checked_add(day.checked_sub(1)?)?;
    days.checked_mul(86_400)?
        .checked_add(hour.checked_mul(3_600)?)?
        .checked_add(minute.checked_mul(60)?)?
        .checked_add(second)
}

fn getdate(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [timestamp] = ParamValidator::new("getdate")
        .optional("$timestamp", &["int"], Value::Null)
        .bind(args)?;
    let time = at(&timestamp);
    let fields = [
        ("seconds", Value::Int(time.second() as i64)),
        ("minutes", Value::Int(time.minute() as i64)),
        ("hours", Value::Int(time.hour() as i64)),
        ("mday", Value::Int(time.day() as i64)),
        ("wday", Value::Int(time.weekday().num_days_from_sunday() as i64)),
        ("mon", Value::Int(time.month() as i64)),
        ("year", Value::Int(time.year() as i64)),
        ("yday", Value::Int(time.ordinal0() as i64)),
        ("weekday", Value::Str(time.format("%A").to_string())),
        ("month", Value::Str(time.format("%B").to_string())),
    ];
    let mut array: Array = fields
        .into_iter()
        .map(|(key, value)| (ArrayKey::from(key), value))
        .collect();
    array.insert(ArrayKey::Int(0), Value::Int(time.timestamp()));
    Ok(Value::Array(array))
}

/// `localtime($timestamp, $associative)`: the C `struct tm` fields
fn localtime(_ctx: &mut Context<'_>, args: Vec<Value>) -> PhpResult<Value> {
    let [timestamp, associative] = ParamValidator::new("localtime")
        .optional("$timestamp", &["int"], Value::Null)
        .optional("$associative", &["bool"], Value::Bool(false))
        .bind(args)?;
    let time = at(&timestamp);
    let fields = [
        ("tm_sec", time.second() as i64),
        ("tm_min", time.minute() as i64),
        ("tm_hour", time.hour() as i64),
        ("tm_mday", time.day() as i64),
        ("tm_mon", time.month0() as i64),
        ("tm_year", time.year() as i64 - 1900),
        ("tm_wday", time.weekday().num_days_from_sunday() as i64),
        ("tm_yday", time.ordinal0() as i64),
        ("tm_isdst", 0),
    ];
    Ok(Value::Array(if associative.to_bool() {
        fields
            .into_iter()
            .map(|(key, value)| (ArrayKey::from(key), Value::Int(value)))
            .collect()
    } else {
        Array::from_list(fields.into_iter().map(|(_, value)| Value::Int(value)))
    }))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn days_in_month(time: &DateTime<Utc>) -> u32 {
    let (year, month) = (time.year(), time.month());
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|next| next.pred_opt()).map_or(31, |last| last.day())
}

/// Render `format` with PHP's `date()` characters; `\` escapes the next one
pub fn format_date(format: &str, time: &DateTime<Utc>) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let hour12 = match time.hour() % 12 {
        0 => 12,
        h => h,
    };
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let _ = match c {
            'd' => write!(out, "{:02}", time.day()),
            'D' => write!(out, "{}", time.format("%a")),
            'j' => write!(out, "{}", time.day()),
            'l' => write!(out, "{}", time.format("%A")),
            'N' => write!(out, "{}", time.weekday().number_from_monday()),
            'S' => write!(out, "{}", ordinal_suffix(time.day())),
            'w' => write!(out, "{}", time.weekday().num_days_from_sunday()),
            'z' => write!(out, "{}", time.ordinal0()),
            'W' => write!(out, "{:02}", time.iso_week().week()),
            'F' => write!(out, "{}", time.format("%B")),
            'm' => write!(out, "{:02}", time.month()),
            'M' => write!(out, "{}", time.format("%b")),
            'n' => write!(out, "{}", time.month()),
            't' => write!(out, "{}", days_in_month(time)),
            'L' => write!(out, "{}", u8::from(NaiveDate::from_ymd_opt(time.year(), 2, 29).is_some())),
            'o' => write!(out, "{}", time.iso_week().year()),
            'Y' => write!(out, "{}", time.year()),
            'y' => write!(out, "{:02}", time.year().rem_euclid(100)),
            'a' => write!(out, "{}", if time.hour() < 12 { "am" } else { "pm" }),
            'A' => write!(out, "{}", if time.hour() < 12 { "AM" } else { "PM" }),
            'g' => write!(out, "{hour12}"),
            'G' => write!(out, "{}", time.hour()),
            'h' => write!(out, "{hour12:02}"),
            'H' => write!(out, "{:02}", time.hour()),
            'i' => write!(out, "{:02}", time.minute()),
            's' => write!(out, "{:02}", time.second()),
            'u' => write!(out, "{:06}", time.timestamp_subsec_micros()),
            'v' => write!(out, "{:03}", time.timestamp_subsec_millis()),
            'e' => write!(out, "UTC"),
            'T' => write!(out, "GMT"),
            'P' => write!(out, "+00:00"),
            'p' => write!(out, "Z"),
            'O' => write!(out, "+0000"),
            'Z' => write!(out, "0"),
            'I' => write!(out, "0"),
            'U' => write!(out, "{}", time.timestamp()),
            'c' => write!(out, "{}", time.format("%Y-%m-%dT%H:%M:%S+00:00")),
            'r' => write!(out, "{}", time.format("%a, %d %b %Y %H:%M:%S +0000")),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                Ok(())
            }
            other => {
                out.push(other);
                Ok(())
            }
        };
    }
    out
}
