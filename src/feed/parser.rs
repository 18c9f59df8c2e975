use std::fmt;

use chrono::{DateTime, Utc};

use crate::feed::document::{Element, FeedDocument};

/// Which input feed an episode came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedSource {
    /// The feed downloaded from the previous hosting platform.
    Legacy,
    /// The locally generated feed that now publishes new episodes.
    Current,
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Legacy => f.write_str("legacy"),
            FeedSource::Current => f.write_str("current"),
        }
    }
}

/// One `<item>` of a feed, with the fields the merge needs pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// `<guid>` text exactly as written; empty when the item has none.
    pub guid: String,
    /// Parsed `<pubDate>`. `None` when missing or not RFC 2822.
    pub published: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub source: FeedSource,
    /// The whole original `<item>` element.
    pub item: Element,
}

impl Episode {
    pub fn from_item(item: &Element, source: FeedSource) -> Self {
        Self {
            guid: item.child("guid").map(Element::text).unwrap_or_default(),
            published: item.child_text("pubDate").as_deref().and_then(parse_pub_date),
            title: item.child_text("title"),
            source,
            item: item.clone(),
        }
    }

    pub fn has_guid(&self) -> bool {
        !self.guid.is_empty()
    }
}

/// Extracts every `<item>` in the document, in document order.
pub fn extract_episodes(doc: &FeedDocument, source: FeedSource) -> Vec<Episode> {
    let mut items = Vec::new();
    doc.root.descendants_named("item", &mut items);
    items
        .into_iter()
        .map(|item| Episode::from_item(item, source))
        .collect()
}

/// Parses an RFC 2822 `pubDate` ("Mon, 22 Dec 2025 12:45:50 +0000").
///
/// A weekday name that disagrees with the date is ignored.
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let parsed = DateTime::parse_from_rfc2822(value).or_else(|e| match value.split_once(',') {
        Some((weekday, rest)) if weekday.chars().all(|c| c.is_ascii_alphabetic()) => {
            DateTime::parse_from_rfc2822(rest.trim())
        }
        _ => Err(e),
    });
    match parsed {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = %value, error = %e, "Unparsable pubDate, sorting as oldest");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Show</title>
    <item><guid> ep-1 </guid><title>First</title><pubDate>Mon, 22 Dec 2025 12:45:50 +0000</pubDate></item>
    <item><title>No guid</title><pubDate>not a date</pubDate></item>
    <item><guid></guid></item>
</channel></rss>"#;

    #[test]
    fn test_extract_episodes_in_order() {
        let doc = FeedDocument::parse(FEED).unwrap();
        let episodes = extract_episodes(&doc, FeedSource::Current);
        assert_eq!(episodes.len(), 3);

        assert_eq!(episodes[0].guid, " ep-1 ");
        assert_eq!(episodes[0].title.as_deref(), Some("First"));
        assert_eq!(
            episodes[0].published,
            Some(Utc.with_ymd_and_hms(2025, 12, 22, 12, 45, 50).unwrap())
        );
        assert_eq!(episodes[0].source, FeedSource::Current);
        assert_eq!(episodes[0].item.name, "item");

        assert!(!episodes[1].has_guid());
        assert_eq!(episodes[1].published, None);
        assert!(!episodes[2].has_guid());
    }

    #[test]
    fn test_empty_channel_yields_nothing() {
        let doc = FeedDocument::parse(r#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert!(extract_episodes(&doc, FeedSource::Legacy).is_empty());
    }

    #[test]
    fn test_parse_pub_date_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(parse_pub_date("Tue, 02 Jan 2024 10:00:00 GMT"), Some(expected));
        assert_eq!(parse_pub_date("Tue, 02 Jan 2024 11:00:00 +0100"), Some(expected));
        assert_eq!(parse_pub_date(" 02 Jan 2024 10:00:00 +0000 "), Some(expected));
        assert_eq!(parse_pub_date("2024-01-02T10:00:00Z"), None);
        assert_eq!(parse_pub_date(""), None);
    }

    #[test]
    fn test_parse_pub_date_ignores_wrong_weekday() {
        // 2 Jan 2024 was a Tuesday
        let expected = Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap());
        assert_eq!(parse_pub_date("Mon, 02 Jan 2024 10:00:00 +0000"), expected);
        assert_eq!(parse_pub_date("Sun, 02 Jan 2024 10:00:00 GMT"), expected);
        assert_eq!(parse_pub_date("Mon, 32 Jan 2024 10:00:00 GMT"), None);
    }

    #[test]
    fn test_guid_kept_verbatim() {
        let doc = FeedDocument::parse(
            r#"<rss><channel>
    <item><guid> </guid></item>
    <item><guid>x</guid></item>
    <item><guid> x </guid></item>
    <item><guid><![CDATA[y]]></guid></item>
</channel></rss>"#,
        )
        .unwrap();
        let guids: Vec<_> = extract_episodes(&doc, FeedSource::Legacy)
            .into_iter()
            .map(|e| e.guid)
            .collect();
        assert_eq!(guids, vec![" ", "x", " x ", "y"]);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(FeedSource::Legacy.to_string(), "legacy");
        assert_eq!(FeedSource::Current.to_string(), "current");
    }
}
