//! Delta token handling.
//!
//! The delta endpoint's terminal page carries a continuation link holding an
//! opaque token; presenting that token on a later run returns only the
//! events changed or removed since. The token is extracted here and
//! persisted by the strategies once pagination is exhausted.

use chrono::{DateTime, Utc};

use crate::remote::{EventPage, RemoteEvent};

/// Extract the opaque continuation token from a terminal page.
///
/// Returns `None` when the page carries no delta link, which means the walk
/// was not delta-terminal; callers only invoke this once pagination is
/// exhausted.
pub fn extract_token(page: &EventPage) -> Option<String> {
    let link = page.delta_link.as_deref()?;
    let url = reqwest::Url::parse(link).ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "$deltatoken" || key == "token")
        .map(|(_, value)| value.into_owned())
}

/// The modification time of the first event in the batch carrying one.
///
/// Purely informational metadata: pages arrive newest-changed first, so the
/// first timestamp is the latest the remote reported. The API, not this
/// value, stays authoritative for what changed.
pub fn latest_modified(events: &[RemoteEvent]) -> Option<DateTime<Utc>> {
    events.iter().find_map(|event| event.last_modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_token_from_delta_link() {
        let page = EventPage {
            delta_link: Some(
                "https://graph.example.com/v1.0/me/calendarView/delta?$deltatoken=opaque%3D%3D123"
                    .into(),
            ),
            ..EventPage::default()
        };
        assert_eq!(extract_token(&page).as_deref(), Some("opaque==123"));
    }

    #[test]
    fn absent_without_delta_link() {
        let page = EventPage {
            next_link: Some("https://graph.example.com/page2".into()),
            ..EventPage::default()
        };
        assert_eq!(extract_token(&page), None);

        let unparseable = EventPage {
            delta_link: Some("not a url".into()),
            ..EventPage::default()
        };
        assert_eq!(extract_token(&unparseable), None);
    }

    #[test]
    fn latest_modified_takes_first_timestamp() {
        let events: Vec<RemoteEvent> = serde_json::from_value(serde_json::json!([
            { "id": "a" },
            { "id": "b", "lastModifiedDateTime": "2024-02-01T10:00:00Z" },
            { "id": "c", "lastModifiedDateTime": "2024-01-01T10:00:00Z" }
        ]))
        .unwrap();

        assert_eq!(
            latest_modified(&events),
            Some("2024-02-01T10:00:00Z".parse().unwrap())
        );
        assert_eq!(latest_modified(&[]), None);
    }
}
