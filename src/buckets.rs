//! Only [`observer_offset`] reads the system clock.

use chrono::{FixedOffset, Local, Offset, Utc};
use serde::Serialize;

use crate::models::{BucketSlot, RawBucketStat};

const MINUTES_PER_DAY: i32 = 24 * 60;
const SECONDS_PER_DAY: i32 = 24 * 60 * 60;

const WEEKDAYS_FROM_SUNDAY: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MISSING_HOUR_LABEL: &str = "--:00 AM";
const MISSING_LABEL: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    Hour,
    Day,
    Month,
}

/// Which weekday a display row starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekConvention {
    MondayZero,
    #[default]
    SundayZero,
}

impl WeekConvention {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" | "monday-zero" => Some(Self::MondayZero),
            "sunday" | "sun" | "sunday-zero" => Some(Self::SundayZero),
            _ => None,
        }
    }
}

/// Viewer's clock as seen by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    pub offset: FixedOffset,
    pub week: WeekConvention,
}

impl Observer {
    pub fn utc() -> Self {
        Self {
            offset: utc_offset(),
            week: WeekConvention::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSlot {
    pub label: String,
    pub sort_key: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedBucket {
    pub label: String,
    /// `None` for buckets without a usable index; these sort last.
    pub sort_key: Option<u8>,
    pub play_count: u64,
}

/// The current local offset, including DST, from the system clock.
pub fn observer_offset() -> FixedOffset {
    Local::now().offset().fix()
}

pub fn utc_offset() -> FixedOffset {
    Utc.fix()
}

pub fn normalize_hour(utc_hour: u8, offset: FixedOffset) -> NormalizedSlot {
    let offset_minutes = offset.local_minus_utc() / 60;
    let local = (i32::from(utc_hour % 24) * 60 + offset_minutes).rem_euclid(MINUTES_PER_DAY);
    let hour = local / 60;
    let minute = local % 60;

    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    let meridiem = if hour < 12 { "AM" } else { "PM" };

    NormalizedSlot {
        label: format!("{hour12}:{minute:02} {meridiem}"),
        sort_key: hour as u8,
    }
}

/// `utc_weekday` uses the server numbering, Monday = 0 .. Sunday = 6.
pub fn normalize_day(
    utc_weekday: u8,
    convention: WeekConvention,
    offset: FixedOffset,
) -> NormalizedSlot {
    let shift = offset.local_minus_utc().div_euclid(SECONDS_PER_DAY);
    let from_sunday = (i32::from(utc_weekday % 7) + 1 + shift).rem_euclid(7);
    let sort_key = match convention {
        WeekConvention::SundayZero => from_sunday,
        WeekConvention::MondayZero => (from_sunday + 6) % 7,
    };

    NormalizedSlot {
        label: WEEKDAYS_FROM_SUNDAY[from_sunday as usize].to_string(),
        sort_key: sort_key as u8,
    }
}

pub fn normalize_month(month: u8) -> NormalizedSlot {
    let label = usize::from(month)
        .checked_sub(1)
        .and_then(|idx| MONTHS.get(idx))
        .copied()
        .unwrap_or(MISSING_LABEL);

    NormalizedSlot {
        label: label.to_string(),
        sort_key: month,
    }
}

fn localize(bucket: &RawBucketStat, kind: BucketKind, observer: &Observer) -> LocalizedBucket {
    let slot = match (kind, bucket.slot) {
        (BucketKind::Hour, BucketSlot::Hour(hour)) => Some(normalize_hour(hour, observer.offset)),
        (BucketKind::Day, BucketSlot::Day(day)) => {
            Some(normalize_day(day, observer.week, observer.offset))
        }
        (BucketKind::Month, BucketSlot::Month(month)) => Some(normalize_month(month)),
        _ => None,
    };

    match slot {
        Some(slot) => LocalizedBucket {
            label: slot.label,
            sort_key: Some(slot.sort_key),
            play_count: bucket.play_count,
        },
        None => LocalizedBucket {
            label: missing_label(kind).to_string(),
            sort_key: None,
            play_count: bucket.play_count,
        },
    }
}

fn missing_label(kind: BucketKind) -> &'static str {
    match kind {
        BucketKind::Hour => MISSING_HOUR_LABEL,
        BucketKind::Day | BucketKind::Month => MISSING_LABEL,
    }
}

/// Localizes and stable-sorts buckets by their local position.
pub fn sort_buckets(
    buckets: &[RawBucketStat],
    kind: BucketKind,
    observer: &Observer,
) -> Vec<LocalizedBucket> {
    let mut localized: Vec<LocalizedBucket> = buckets
        .iter()
        .map(|bucket| localize(bucket, kind, observer))
        .collect();
    localized.sort_by_key(|bucket| (bucket.sort_key.is_none(), bucket.sort_key));
    localized
}
