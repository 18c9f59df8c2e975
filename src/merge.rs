//! Merge, deduplicate and order episodes, and build the output document.
//!
//! Everything here is pure: inputs are parsed documents and episode lists,
//! outputs are new values. Fetching, file I/O and reporting live in
//! [`crate::merger`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::feed::{
    apply_channel_policy, ChannelPolicy, Episode, FeedDocument, MetadataNotice, MissingChannel,
    Node,
};

/// Merges the current and legacy episode lists.
///
/// Current episodes are taken first, then legacy ones; an episode whose GUID
/// has already been taken is skipped, so the current feed wins duplicates.
/// Episodes without a GUID are dropped. The result is stable-sorted by
/// publication date, newest first, with undated episodes last; equal dates
/// keep the current-then-legacy order.
pub fn merge_episodes(current: Vec<Episode>, legacy: Vec<Episode>) -> Vec<Episode> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(current.len() + legacy.len());

    for episode in current.into_iter().chain(legacy) {
        if !episode.has_guid() {
            tracing::debug!(source = %episode.source, title = ?episode.title, "Dropping episode without guid");
            continue;
        }
        if seen.insert(episode.guid.clone()) {
            merged.push(episode);
        } else {
            tracing::trace!(guid = %episode.guid, source = %episode.source, "Duplicate guid skipped");
        }
    }

    // `None` orders before every `Some`, so undated episodes end up last.
    merged.sort_by(|a, b| b.published.cmp(&a.published));
    merged
}

/// Builds the merged feed on top of the legacy document.
///
/// The root element, its namespace declarations and every non-item channel
/// child are taken from `template` in their original order. The channel
/// policy is applied to that structure, then the episodes' `<item>` elements
/// are appended in the given order.
pub fn build_merged_document(
    template: &FeedDocument,
    episodes: &[Episode],
    policy: &ChannelPolicy,
    now: DateTime<Utc>,
) -> Result<(FeedDocument, Vec<MetadataNotice>), MissingChannel> {
    let mut output = template.clone();

    let channel = output.channel_mut().ok_or(MissingChannel)?;
    channel
        .children
        .retain(|node| !matches!(node, Node::Element(e) if e.name == "item"));

    let notices = apply_channel_policy(&mut output, policy, now)?;

    let channel = output.channel_mut().ok_or(MissingChannel)?;
    channel.children.extend(
        episodes
            .iter()
            .map(|episode| Node::Element(episode.item.clone())),
    );

    Ok((output, notices))
}
