//! Status normalization, date parsing and SLA day counts.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use pipeval_core::{keys, DerivedFields, Record, StatusClass};
use pipeval_normalize::fold_text;
use regex::Regex;

use crate::notify::resolve_notify_target;

const MILLIS_PER_DAY: i64 = 86_400_000;

// Checked in order: loss first, then win, then in-progress.
const LOST_KEYWORDS: &[&str] = &["perdid", "lost", "cancelad", "recusad", "declin"];
const WIN_KEYWORDS: &[&str] = &["ganh", "won", "fechad", "assinad", "win"];
const ONGOING_KEYWORDS: &[&str] = &["andamento", "aberto", "open", "negociacao", "pendente", "ongoing", "progress"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{1,2})/([0-9]{1,2})/([0-9]{4})(?:\s+([0-9]{1,2}):([0-9]{2})(?::([0-9]{2}))?)?$")
        .expect("valid day/month/year regex")
});

pub fn normalize_status(raw: &str) -> StatusClass {
    let folded = fold_text(raw);
    let hit = |words: &[&str]| words.iter().any(|w| folded.contains(w));
    if hit(LOST_KEYWORDS) {
        StatusClass::Lost
    } else if hit(WIN_KEYWORDS) {
        StatusClass::Win
    } else if hit(ONGOING_KEYWORDS) {
        StatusClass::Ongoing
    } else {
        StatusClass::Unrecognized(raw.trim().to_lowercase())
    }
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

fn parse_day_month_year(raw: &str) -> Option<NaiveDateTime> {
    let caps = DMY_RE.captures(raw)?;
    let num = |i: usize| -> Option<u32> {
        caps.get(i)
            .map_or(Some(0), |m| m.as_str().parse::<u32>().ok())
    };
    let year = caps[3].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

/// Parse ISO-8601 or `D/M/YYYY[ H:mm[:ss]]`. Values without an offset are read in `tz`.
pub fn parse_date(raw: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).fixed_offset());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return localize(naive, tz);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return localize(date.and_hms_opt(0, 0, 0)?, tz);
    }
    localize(parse_day_month_year(raw)?, tz)
}

/// Whole days between `reference` and `now`, floored, never negative.
pub fn days_since(reference: DateTime<FixedOffset>, now: DateTime<Utc>) -> u32 {
    let elapsed = now
        .signed_duration_since(reference.with_timezone(&Utc))
        .num_milliseconds();
    u32::try_from(elapsed.div_euclid(MILLIS_PER_DAY).max(0)).unwrap_or(u32::MAX)
}

pub fn derive_fields(record: &Record, tz: Tz, now: DateTime<Utc>) -> DerivedFields {
    let status_raw = record.get(keys::STATUS).trim().to_string();
    let created = parse_date(record.get(keys::CREATED_AT), tz);
    let updated = parse_date(record.get(keys::UPDATED_AT), tz);
    let target = resolve_notify_target(record);

    DerivedFields {
        status: normalize_status(&status_raw),
        status_raw,
        created_at_iso: created.map(|dt| dt.to_rfc3339()),
        updated_at_iso: updated.map(|dt| dt.to_rfc3339()),
        days_since_reference: updated.or(created).map(|reference| days_since(reference, now)),
        notify_email: target.email,
        notify_phone: target.phone,
    }
}
