//! Types for the Graph-style calendar API boundary.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Free/busy status of a remote event as reported by the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ShowAs {
    Free,
    Tentative,
    Busy,
    /// Out of office.
    Oof,
    WorkingElsewhere,
    Unknown,
}

/// A timestamp with an attached timezone name, as the API represents
/// event start/end times: `{"dateTime": "...", "timeZone": "UTC"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    #[serde(rename = "timeZone")]
    pub time_zone: String,
}

impl RemoteDateTime {
    /// Resolve this wire timestamp to a UTC instant.
    ///
    /// The API emits fractional seconds of varying width, so both fractional
    /// and whole-second forms are accepted. An unrecognized timezone name or
    /// unparseable timestamp yields `None`; callers fall back to defaults.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S"))
            .ok()?;

        if self.time_zone.eq_ignore_ascii_case("utc") {
            return Some(naive.and_utc());
        }

        let tz: Tz = self.time_zone.parse().ok()?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Email address with an optional display name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// A participant wrapper used for organizers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "emailAddress")]
    pub email_address: EmailAddress,
}

/// Attendee response state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseStatus {
    #[serde(default)]
    pub response: Option<String>,
}

/// An event attendee with response status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(rename = "emailAddress")]
    pub email_address: EmailAddress,
    #[serde(default)]
    pub status: Option<ResponseStatus>,
}

/// Event body content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBody {
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Event location; only the display name is carried into the local store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Tombstone marker attached by the delta feed to deleted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedMarker {
    #[serde(default)]
    pub reason: Option<String>,
}

/// A calendar event as returned by the remote API.
///
/// Delta feeds may return bare tombstones carrying only `id` and `removed`,
/// so everything beyond the identifier is optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// Stable, unique remote identifier.
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub start: Option<RemoteDateTime>,
    #[serde(default)]
    pub end: Option<RemoteDateTime>,
    #[serde(rename = "isAllDay", default)]
    pub is_all_day: bool,
    #[serde(rename = "showAs", default)]
    pub show_as: Option<ShowAs>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub organizer: Option<Recipient>,
    #[serde(default)]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(rename = "lastModifiedDateTime", default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Set by delta feeds when the event was deleted upstream.
    #[serde(rename = "@removed", default)]
    pub removed: Option<RemovedMarker>,
}

impl RemoteEvent {
    /// Whether this record only signals an upstream deletion.
    pub fn is_tombstone(&self) -> bool {
        self.removed.is_some()
    }

    /// Whether this record carries enough content to be stored locally:
    /// a subject, or a start/end pair.
    pub fn has_content(&self) -> bool {
        self.subject.is_some() || (self.start.is_some() && self.end.is_some())
    }
}

/// One page of a paginated event response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventPage {
    #[serde(default)]
    pub value: Vec<RemoteEvent>,
    /// Link to the next page; absent on the terminal page.
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
    /// Delta continuation link; present only on the terminal page of a
    /// delta-capable endpoint.
    #[serde(rename = "@odata.deltaLink", default)]
    pub delta_link: Option<String>,
}

/// Query parameters for a date-bounded calendar view fetch.
#[derive(Debug, Clone)]
pub struct CalendarViewQuery {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub page_size: usize,
}

impl CalendarViewQuery {
    pub fn new(start_utc: DateTime<Utc>, end_utc: DateTime<Utc>) -> Self {
        Self {
            start_utc,
            end_utc,
            page_size: 50,
        }
    }
}

/// Error types for remote calendar API operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
