//! Channel-level metadata rewrite for podcast directory compliance.
//!
//! Applied once per run to the output channel, after its items have been
//! removed and before the merged items are appended:
//!
//! - `description` is always overwritten with the canonical text
//! - `lastBuildDate` is always set to the run time
//! - the `atom:link rel="self"` href is pointed at the merged feed URL,
//!   inserted right after `lastBuildDate` when missing
//! - `itunes:author` is added with a default only when absent
//! - `itunes:category`, `itunes:explicit` and `itunes:image` are only checked
//!
//! Apart from the timestamp, applying the policy twice gives the same channel.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::document::{Element, FeedDocument, Node};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// RFC 2822 layout used for `lastBuildDate`, always in GMT.
const LAST_BUILD_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// iTunes channel fields that must exist but are never auto-filled.
const CHECKED_ITUNES_FIELDS: [&str; 3] = ["category", "explicit", "image"];

#[derive(Debug, Error)]
#[error("Feed has no <channel> element")]
pub struct MissingChannel;

/// Fixed values written into the output channel.
#[derive(Debug, Clone)]
pub struct ChannelPolicy {
    pub description: String,
    pub self_link_url: String,
    pub default_author: String,
}

/// What the policy changed or found missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataNotice {
    DescriptionSet,
    LastBuildDateSet(String),
    SelfLinkUpdated { previous: Option<String>, href: String },
    SelfLinkInserted(String),
    AuthorInserted(String),
    /// A checked field (qualified name) is absent; left as is.
    MissingField(String),
}

impl MetadataNotice {
    pub fn is_warning(&self) -> bool {
        matches!(self, MetadataNotice::MissingField(_))
    }
}

impl fmt::Display for MetadataNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataNotice::DescriptionSet => write!(f, "Podcast description updated"),
            MetadataNotice::LastBuildDateSet(date) => write!(f, "lastBuildDate set to {date}"),
            MetadataNotice::SelfLinkUpdated { previous, href } => write!(
                f,
                "Self link updated: {} -> {href}",
                previous.as_deref().unwrap_or("(none)")
            ),
            MetadataNotice::SelfLinkInserted(href) => write!(f, "Self link added: {href}"),
            MetadataNotice::AuthorInserted(author) => write!(f, "Author added: {author}"),
            MetadataNotice::MissingField(name) => {
                write!(f, "{name} is missing from the channel (not fixed automatically)")
            }
        }
    }
}

/// Formats `now` the way `lastBuildDate` is written.
pub fn format_build_date(now: DateTime<Utc>) -> String {
    now.format(LAST_BUILD_DATE_FORMAT).to_string()
}

/// Applies `policy` to the document's channel.
///
/// Namespace declarations for inserted `atom:` / `itunes:` elements are added
/// to the root when it lacks them; an existing prefix bound to the namespace
/// URI is reused.
pub fn apply_channel_policy(
    doc: &mut FeedDocument,
    policy: &ChannelPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<MetadataNotice>, MissingChannel> {
    let atom = doc.root.namespace_prefix(ATOM_NS).map(str::to_owned);
    let itunes = doc.root.namespace_prefix(ITUNES_NS).map(str::to_owned);
    let atom_prefix = atom.clone().unwrap_or_else(|| "atom".to_string());
    let itunes_prefix = itunes.clone().unwrap_or_else(|| "itunes".to_string());

    let channel = doc.channel_mut().ok_or(MissingChannel)?;
    let mut notices = Vec::new();
    let mut inserted_atom = false;
    let mut inserted_itunes = false;

    // description
    match channel.child_mut("description") {
        Some(description) => description.set_text(policy.description.as_str()),
        None => {
            let at = channel.child_position("title").map_or(0, |i| i + 1);
            insert_element(
                channel,
                at,
                Element::with_text("description", policy.description.as_str()),
            );
        }
    }
    notices.push(MetadataNotice::DescriptionSet);

    // lastBuildDate
    let build_date = format_build_date(now);
    match channel.child_mut("lastBuildDate") {
        Some(last_build) => last_build.set_text(build_date.as_str()),
        None => {
            let at = channel
                .child_position("description")
                .map_or(channel.children.len(), |i| i + 1);
            insert_element(
                channel,
                at,
                Element::with_text("lastBuildDate", build_date.as_str()),
            );
        }
    }
    notices.push(MetadataNotice::LastBuildDateSet(build_date));

    // atom:link rel="self"
    let link_name = format!("{atom_prefix}:link");
    let self_link = channel.children.iter_mut().find_map(|node| match node {
        Node::Element(e) if e.name == link_name && e.attr("rel") == Some("self") => Some(e),
        _ => None,
    });
    match self_link {
        Some(link) => {
            let previous = link.attr("href").map(str::to_owned);
            link.set_attr("href", &policy.self_link_url);
            tracing::debug!(previous = ?previous, href = %policy.self_link_url, "Updated self link");
            notices.push(MetadataNotice::SelfLinkUpdated {
                previous,
                href: policy.self_link_url.clone(),
            });
        }
        None => {
            let at = channel
                .child_position("lastBuildDate")
                .map_or(channel.children.len(), |i| i + 1);
            let link = Element::new(link_name.as_str())
                .with_attr("href", &policy.self_link_url)
                .with_attr("rel", "self")
                .with_attr("type", "application/rss+xml");
            insert_element(channel, at, link);
            inserted_atom = true;
            notices.push(MetadataNotice::SelfLinkInserted(policy.self_link_url.clone()));
        }
    }

    for field in CHECKED_ITUNES_FIELDS {
        let name = format!("{itunes_prefix}:{field}");
        if channel.child(&name).is_none() {
            tracing::warn!(field = %name, "Channel field missing");
            notices.push(MetadataNotice::MissingField(name));
        }
    }

    let author_name = format!("{itunes_prefix}:author");
    if channel.child(&author_name).is_none() {
        channel.children.push(Node::Element(Element::with_text(
            author_name,
            policy.default_author.as_str(),
        )));
        inserted_itunes = true;
        notices.push(MetadataNotice::AuthorInserted(policy.default_author.clone()));
    }

    if inserted_atom && atom.is_none() {
        doc.root.set_attr(&format!("xmlns:{atom_prefix}"), ATOM_NS);
    }
    if inserted_itunes && itunes.is_none() {
        doc.root.set_attr(&format!("xmlns:{itunes_prefix}"), ITUNES_NS);
    }

    Ok(notices)
}

fn insert_element(parent: &mut Element, at: usize, element: Element) {
    let at = at.min(parent.children.len());
    parent.children.insert(at, Node::Element(element));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const FULL_CHANNEL: &str = r#"<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>Show</title>
    <description>Old description</description>
    <lastBuildDate>Mon, 01 Jan 2024 00:00:00 GMT</lastBuildDate>
    <atom:link href="https://old.example.com/rss" rel="self" type="application/rss+xml"/>
    <atom:link href="https://hub.example.com" rel="hub"/>
    <itunes:author>Someone Else</itunes:author>
    <itunes:category text="Technology"/>
    <itunes:explicit>false</itunes:explicit>
    <itunes:image href="https://example.com/art.jpg"/>
</channel>
</rss>"#;

    const BARE_CHANNEL: &str = r#"<rss version="2.0"><channel><title>Show</title></channel></rss>"#;

    fn policy() -> ChannelPolicy {
        ChannelPolicy {
            description: "Canonical description".to_string(),
            self_link_url: "https://new.example.com/merged.rss".to_string(),
            default_author: "Default Author".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 22, 12, 45, 50).unwrap()
    }

    fn element_names(doc: &FeedDocument) -> Vec<String> {
        doc.channel()
            .unwrap()
            .elements()
            .map(|e| e.name.clone())
            .collect()
    }

    #[test]
    fn test_format_build_date() {
        assert_eq!(format_build_date(now()), "Mon, 22 Dec 2025 12:45:50 GMT");
    }

    #[test]
    fn test_full_channel_updates_in_place() {
        let mut doc = FeedDocument::parse(FULL_CHANNEL).unwrap();
        let before = element_names(&doc);

        let notices = apply_channel_policy(&mut doc, &policy(), now()).unwrap();

        // No element added or moved
        assert_eq!(element_names(&doc), before);

        let channel = doc.channel().unwrap();
        assert_eq!(
            channel.child_text("description").as_deref(),
            Some("Canonical description")
        );
        assert_eq!(
            channel.child_text("lastBuildDate").as_deref(),
            Some("Mon, 22 Dec 2025 12:45:50 GMT")
        );

        let links: Vec<_> = channel.elements().filter(|e| e.name == "atom:link").collect();
        assert_eq!(links[0].attr("href"), Some("https://new.example.com/merged.rss"));
        assert_eq!(links[1].attr("href"), Some("https://hub.example.com"));

        // Existing author is never overwritten
        assert_eq!(
            channel.child_text("itunes:author").as_deref(),
            Some("Someone Else")
        );

        assert_eq!(
            notices,
            vec![
                MetadataNotice::DescriptionSet,
                MetadataNotice::LastBuildDateSet("Mon, 22 Dec 2025 12:45:50 GMT".to_string()),
                MetadataNotice::SelfLinkUpdated {
                    previous: Some("https://old.example.com/rss".to_string()),
                    href: "https://new.example.com/merged.rss".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_bare_channel_gets_missing_fields() {
        let mut doc = FeedDocument::parse(BARE_CHANNEL).unwrap();
        let notices = apply_channel_policy(&mut doc, &policy(), now()).unwrap();

        assert_eq!(
            element_names(&doc),
            vec![
                "title",
                "description",
                "lastBuildDate",
                "atom:link",
                "itunes:author"
            ]
        );
        assert_eq!(doc.root.attr("xmlns:atom"), Some(ATOM_NS));
        assert_eq!(doc.root.attr("xmlns:itunes"), Some(ITUNES_NS));

        let link = doc.channel().unwrap().child("atom:link").unwrap();
        assert_eq!(link.attr("rel"), Some("self"));
        assert_eq!(link.attr("type"), Some("application/rss+xml"));

        let warnings: Vec<_> = notices.iter().filter(|n| n.is_warning()).collect();
        assert_eq!(warnings.len(), 3);
        assert!(notices.contains(&MetadataNotice::MissingField("itunes:category".to_string())));
        assert!(notices.contains(&MetadataNotice::AuthorInserted("Default Author".to_string())));
        assert!(notices.contains(&MetadataNotice::SelfLinkInserted(
            "https://new.example.com/merged.rss".to_string()
        )));
    }

    #[test]
    fn test_self_link_inserted_after_last_build_date() {
        let xml = r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <title>Show</title>
            <lastBuildDate>old</lastBuildDate>
            <language>fr</language>
            <description>Old</description>
        </channel></rss>"#;
        let mut doc = FeedDocument::parse(xml).unwrap();
        apply_channel_policy(&mut doc, &policy(), now()).unwrap();

        assert_eq!(
            element_names(&doc),
            vec![
                "title",
                "lastBuildDate",
                "atom:link",
                "language",
                "description",
                "itunes:author"
            ]
        );
    }

    #[test]
    fn test_existing_prefixes_reused() {
        let xml = r#"<rss xmlns:a="http://www.w3.org/2005/Atom" xmlns:it="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
            <a:link href="https://old" rel="self"/>
            <it:author>Kept</it:author>
        </channel></rss>"#;
        let mut doc = FeedDocument::parse(xml).unwrap();
        let notices = apply_channel_policy(&mut doc, &policy(), now()).unwrap();

        let channel = doc.channel().unwrap();
        assert_eq!(
            channel.child("a:link").unwrap().attr("href"),
            Some("https://new.example.com/merged.rss")
        );
        assert_eq!(channel.child_text("it:author").as_deref(), Some("Kept"));
        assert!(doc.root.attr("xmlns:atom").is_none());
        assert!(notices.contains(&MetadataNotice::MissingField("it:explicit".to_string())));
    }

    #[test]
    fn test_policy_is_idempotent_apart_from_timestamp() {
        let mut once = FeedDocument::parse(BARE_CHANNEL).unwrap();
        apply_channel_policy(&mut once, &policy(), now()).unwrap();

        let mut twice = once.clone();
        apply_channel_policy(&mut twice, &policy(), now()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_channel() {
        let mut doc = FeedDocument::parse("<rss version=\"2.0\"></rss>").unwrap();
        assert!(apply_channel_policy(&mut doc, &policy(), now()).is_err());
    }
}
