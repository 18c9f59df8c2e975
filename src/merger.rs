use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::config::Config;
use crate::feed::{
    extract_episodes, fetch_feed, prettify_file, write_document, DocumentError, Episode,
    FeedDocument, FeedSource, FetchError, WriteError,
};
use crate::merge::{build_merged_document, merge_episodes};
use crate::report::{Phase, ReportEvent, Reporter};

/// Errors that abort a merge run.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The legacy feed could not be downloaded.
    #[error("Legacy feed download failed: {0}")]
    Fetch(#[from] FetchError),

    /// An input feed file does not exist.
    #[error("The {feed} feed file was not found: {}", .path.display())]
    MissingFeed { feed: FeedSource, path: PathBuf },

    /// An input feed file is not well-formed XML.
    #[error("Failed to parse the {feed} feed '{}': {error}", .path.display())]
    Parse {
        feed: FeedSource,
        path: PathBuf,
        #[source]
        error: DocumentError,
    },

    /// The feed lacks the `<channel>` element the output is built from.
    #[error("The {0} feed has no <channel> element")]
    MissingChannel(FeedSource),

    /// The merged feed could not be written.
    #[error("Failed to write merged feed '{}': {error}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        error: WriteError,
    },

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Episodes in the merged feed.
    pub total: usize,
    /// Merged episodes taken from the current feed.
    pub from_current: usize,
    /// Merged episodes taken from the legacy feed.
    pub from_legacy: usize,
    /// Items found in the current feed.
    pub current_items: usize,
    /// Items found in the legacy feed.
    pub legacy_items: usize,
    pub output_path: PathBuf,
    /// Whether the indentation pass succeeded.
    pub formatted: bool,
}

/// Runs the fetch → parse → merge → write pipeline for one configuration.
pub struct FeedMerger {
    config: Config,
    client: reqwest::Client,
}

impl FeedMerger {
    pub fn new(config: Config) -> Result<Self, MergeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("podmerge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MergeError::Client)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every phase in order, stopping at the first failure.
    ///
    /// Each failure is reported as [`ReportEvent::PhaseFailed`] before being
    /// returned. A failed indentation pass is only a warning: the unformatted
    /// output stays in place and the run still succeeds.
    pub async fn run(&self, reporter: &mut dyn Reporter) -> Result<MergeSummary, MergeError> {
        let config = &self.config;

        if config.skip_fetch {
            tracing::info!(path = %config.legacy_path.display(), "Skipping legacy feed download");
        } else {
            reporter.report(ReportEvent::PhaseStarted(Phase::Fetch));
            let bytes = fetch_feed(
                &self.client,
                &config.legacy_feed_url,
                config.fetch_timeout(),
                &config.legacy_path,
            )
            .await
            .map_err(|e| fail(reporter, Phase::Fetch, e.into()))?;
            reporter.report(ReportEvent::PhaseFinished {
                phase: Phase::Fetch,
                detail: format!(
                    "{bytes} bytes saved to {}",
                    config.legacy_path.display()
                ),
            });
        }

        reporter.report(ReportEvent::PhaseStarted(Phase::ParseLegacy));
        let legacy_doc = load_feed(&config.legacy_path, FeedSource::Legacy)
            .map_err(|e| fail(reporter, Phase::ParseLegacy, e))?;
        if legacy_doc.channel().is_none() {
            return Err(fail(
                reporter,
                Phase::ParseLegacy,
                MergeError::MissingChannel(FeedSource::Legacy),
            ));
        }
        let legacy = extract_episodes(&legacy_doc, FeedSource::Legacy);
        reporter.report(ReportEvent::PhaseFinished {
            phase: Phase::ParseLegacy,
            detail: format!("{} legacy episodes found", legacy.len()),
        });

        reporter.report(ReportEvent::PhaseStarted(Phase::ParseCurrent));
        let current_doc = load_feed(&config.current_path, FeedSource::Current)
            .map_err(|e| fail(reporter, Phase::ParseCurrent, e))?;
        let current = extract_episodes(&current_doc, FeedSource::Current);
        reporter.report(ReportEvent::PhaseFinished {
            phase: Phase::ParseCurrent,
            detail: format!("{} current episodes found", current.len()),
        });

        reporter.report(ReportEvent::PhaseStarted(Phase::Merge));
        let (legacy_items, current_items) = (legacy.len(), current.len());
        let merged = merge_episodes(current, legacy);
        let (output, notices) =
            build_merged_document(&legacy_doc, &merged, &config.channel_policy(), Utc::now())
                .map_err(|_| {
                    fail(
                        reporter,
                        Phase::Merge,
                        MergeError::MissingChannel(FeedSource::Legacy),
                    )
                })?;
        for notice in notices {
            reporter.report(ReportEvent::Metadata(notice));
        }
        list_episodes(reporter, &merged);
        let from_current = merged
            .iter()
            .filter(|e| e.source == FeedSource::Current)
            .count();
        reporter.report(ReportEvent::PhaseFinished {
            phase: Phase::Merge,
            detail: format!("{} episodes after deduplication", merged.len()),
        });

        reporter.report(ReportEvent::PhaseStarted(Phase::Write));
        write_document(&output, &config.output_path).map_err(|error| {
            fail(
                reporter,
                Phase::Write,
                MergeError::Write {
                    path: config.output_path.clone(),
                    error,
                },
            )
        })?;
        let formatted = match prettify_file(&config.output_path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %config.output_path.display(), error = %e, "Formatting pass failed, keeping unformatted output");
                reporter.report(ReportEvent::Warning(format!("XML formatting failed: {e}")));
                false
            }
        };
        reporter.report(ReportEvent::PhaseFinished {
            phase: Phase::Write,
            detail: format!("merged feed written to {}", config.output_path.display()),
        });

        let summary = MergeSummary {
            total: merged.len(),
            from_current,
            from_legacy: merged.len() - from_current,
            current_items,
            legacy_items,
            output_path: config.output_path.clone(),
            formatted,
        };
        tracing::info!(
            total = summary.total,
            from_current = summary.from_current,
            from_legacy = summary.from_legacy,
            "Merge complete"
        );
        reporter.report(ReportEvent::Finished(summary.clone()));
        Ok(summary)
    }
}

/// Reads and parses one input feed.
fn load_feed(path: &Path, feed: FeedSource) -> Result<FeedDocument, MergeError> {
    if !path.exists() {
        return Err(MergeError::MissingFeed {
            feed,
            path: path.to_path_buf(),
        });
    }
    FeedDocument::from_file(path).map_err(|error| MergeError::Parse {
        feed,
        path: path.to_path_buf(),
        error,
    })
}

fn list_episodes(reporter: &mut dyn Reporter, episodes: &[Episode]) {
    for (i, episode) in episodes.iter().enumerate() {
        reporter.report(ReportEvent::EpisodeListed {
            position: i + 1,
            source: episode.source,
            title: episode.title.clone(),
        });
    }
}

/// Reports and logs a phase failure, handing the error back for `?`.
fn fail(reporter: &mut dyn Reporter, phase: Phase, error: MergeError) -> MergeError {
    tracing::error!(phase = ?phase, error = %error, "Merge run aborted");
    reporter.report(ReportEvent::PhaseFailed {
        phase,
        error: error.to_string(),
    });
    error
}
