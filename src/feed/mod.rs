//! Feed handling: XML tree, episode extraction, channel metadata, fetch and write.
//!
//! - [`document`] - owned XML tree read and written with `quick-xml`
//! - [`parser`] - [`Episode`] extraction from a parsed feed
//! - [`channel`] - the channel metadata rewrite policy
//! - [`fetcher`] - single-shot HTTP download of the legacy feed
//! - [`writer`] - output serialization and the indentation pass

pub mod channel;
pub mod document;
pub mod fetcher;
pub mod parser;
pub mod writer;

pub use channel::{apply_channel_policy, ChannelPolicy, MetadataNotice, MissingChannel};
pub use document::{DocumentError, Element, FeedDocument, Node};
pub use fetcher::{fetch_feed, FetchError};
pub use parser::{extract_episodes, parse_pub_date, Episode, FeedSource};
pub use writer::{prettify_file, write_document, FormatError, WriteError};
