use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub validated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub title: String,
    pub artist_id: i64,
    #[serde(default)]
    pub mbid: Option<String>,
    #[serde(default)]
    pub cover_art_url: Option<String>,
    #[serde(default)]
    pub validated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: Artist,
    pub album: Album,
    #[serde(default)]
    pub mbid: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub validated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "like", alias = "LIKE")]
    Like,
    #[serde(rename = "dislike", alias = "DISLIKE")]
    Dislike,
    #[serde(rename = "ban", alias = "BAN")]
    Ban,
    #[serde(rename = "tired", alias = "TIRED")]
    Tired,
    #[serde(rename = "unrated", alias = "UNRATED")]
    Unrated,
    #[serde(rename = "unknown", other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Play {
    pub id: i64,
    pub track: Track,
    pub station: Station,
    pub rating: Rating,
    pub played_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_plays: u64,
    #[serde(default)]
    pub unique_tracks: u64,
    #[serde(default)]
    pub unique_artists: u64,
    #[serde(default)]
    pub total_time_seconds: u64,
    #[serde(default)]
    pub first_play: Option<String>,
    #[serde(default)]
    pub last_play: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopItem {
    pub id: i64,
    pub name: String,
    pub play_count: u64,
    #[serde(default)]
    pub last_played: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingStat {
    pub rating: String,
    pub play_count: u64,
}

/// Which histogram cell a [`RawBucketStat`] counts, in server (UTC) numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSlot {
    /// 0..=23
    Hour(u8),
    /// Monday = 0 ..= Sunday = 6
    Day(u8),
    /// 1..=12
    Month(u8),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireTimeStat")]
pub struct RawBucketStat {
    pub slot: BucketSlot,
    pub play_count: u64,
}

#[derive(Debug, Deserialize)]
struct WireTimeStat {
    #[serde(default)]
    hour: Option<i64>,
    #[serde(default)]
    day: Option<i64>,
    #[serde(default)]
    month: Option<i64>,
    play_count: u64,
}

impl TryFrom<WireTimeStat> for RawBucketStat {
    type Error = String;

    fn try_from(wire: WireTimeStat) -> Result<Self, Self::Error> {
        fn ranged(
            field: &str,
            value: i64,
            range: std::ops::RangeInclusive<i64>,
        ) -> Result<u8, String> {
            if range.contains(&value) {
                Ok(value as u8)
            } else {
                Err(format!("{field} {value} out of range {range:?}"))
            }
        }

        let slot = match (wire.hour, wire.day, wire.month) {
            (Some(hour), None, None) => BucketSlot::Hour(ranged("hour", hour, 0..=23)?),
            (None, Some(day), None) => BucketSlot::Day(ranged("day", day, 0..=6)?),
            (None, None, Some(month)) => BucketSlot::Month(ranged("month", month, 1..=12)?),
            (None, None, None) => BucketSlot::Missing,
            _ => return Err("bucket has more than one of hour/day/month".to_string()),
        };

        Ok(Self {
            slot,
            play_count: wire.play_count,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    pub overall: OverallStats,
    #[serde(default)]
    pub top_tracks: Vec<TopItem>,
    #[serde(default)]
    pub top_artists: Vec<TopItem>,
    #[serde(default)]
    pub top_albums: Vec<TopItem>,
    #[serde(default)]
    pub top_stations: Vec<TopItem>,
    #[serde(default)]
    pub plays_by_hour: Vec<RawBucketStat>,
    #[serde(default)]
    pub plays_by_day: Vec<RawBucketStat>,
    #[serde(default)]
    pub plays_by_month: Vec<RawBucketStat>,
    #[serde(default)]
    pub rating_distribution: Vec<RatingStat>,
}

impl Stats {
    pub fn is_empty(&self) -> bool {
        self.overall.total_plays == 0
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub api_key: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    /// Set by the page's own refresh while a fetch is pending.
    #[serde(default)]
    pub poll: bool,
    /// Minutes east of UTC, reported by the browser.
    pub tz: Option<i32>,
    pub week: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsBucketsResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_plays: Option<u64>,
    pub hours: Vec<crate::buckets::LocalizedBucket>,
    pub days: Vec<crate::buckets::LocalizedBucket>,
    pub months: Vec<crate::buckets::LocalizedBucket>,
}
