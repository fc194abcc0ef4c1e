//! Batch download loop: provider → CSV file → progress line, one ticker at a time.
//!
//! Tickers are processed strictly in order; a fetch and its write finish
//! before the next ticker starts. Each ticker ends in a [`TickerOutcome`].
//! After a failure the [`FailurePolicy`] decides whether the remaining
//! tickers still run (`Continue`) or are marked `Skipped` (`Abort`, the
//! default). Files already written are left in place either way.

use crate::models::{DateRange, Ticker};
use crate::provider::{MarketDataSource, ProviderError};
use crate::storage::{CsvStore, StorageError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed ticker.
    #[default]
    Abort,
    /// Record the failure and move on.
    Continue,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Any ticker that did not end up on disk fails the run.
#[derive(Debug, Error, PartialEq)]
#[error("{failed} of {total} tickers failed ({skipped} skipped)")]
pub struct RunFailed {
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

#[derive(Debug)]
pub enum TickerOutcome {
    Downloaded { path: PathBuf, rows: usize },
    Failed(DownloadError),
    Skipped,
}

#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<(Ticker, TickerOutcome)>,
}

impl RunReport {
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Downloaded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TickerOutcome::Skipped))
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                TickerOutcome::Downloaded { rows, .. } => *rows,
                _ => 0,
            })
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    pub fn ensure_success(&self) -> Result<(), RunFailed> {
        if self.is_success() {
            return Ok(());
        }
        Err(RunFailed {
            failed: self.failed(),
            skipped: self.skipped(),
            total: self.outcomes.len(),
        })
    }

    fn count(&self, pred: impl Fn(&TickerOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

pub struct Pipeline<S> {
    source: S,
    store: CsvStore,
    policy: FailurePolicy,
}

impl<S: MarketDataSource> Pipeline<S> {
    pub fn new(source: S, store: CsvStore, policy: FailurePolicy) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    /// Download every ticker in order, writing one `Downloaded {TICKER} data.`
    /// line to `progress` per saved file.
    ///
    /// Only a failure to write a progress line is returned as `Err`; ticker
    /// failures are reported in the [`RunReport`].
    pub async fn run<W: Write>(
        &self,
        tickers: &[Ticker],
        range: DateRange,
        progress: &mut W,
    ) -> std::io::Result<RunReport> {
        info!("Downloading {} tickers for {}", tickers.len(), range);

        let mut outcomes = Vec::with_capacity(tickers.len());
        let mut aborted = false;

        for ticker in tickers {
            if aborted {
                outcomes.push((ticker.clone(), TickerOutcome::Skipped));
                continue;
            }

            let outcome = match self.download_one(ticker, range).await {
                Ok((path, rows)) => {
                    writeln!(progress, "Downloaded {} data.", ticker)?;
                    info!("{}: {} rows -> {:?}", ticker, rows, path);
                    TickerOutcome::Downloaded { path, rows }
                }
                Err(e) => {
                    error!("{}: {}", ticker, e);
                    if self.policy == FailurePolicy::Abort {
                        aborted = true;
                    }
                    TickerOutcome::Failed(e)
                }
            };

            outcomes.push((ticker.clone(), outcome));
        }

        let report = RunReport { outcomes };
        if aborted {
            warn!("Aborted after first failure; {} tickers skipped", report.skipped());
        }
        Ok(report)
    }

    async fn download_one(
        &self,
        ticker: &Ticker,
        range: DateRange,
    ) -> Result<(PathBuf, usize), DownloadError> {
        let series = self.source.fetch_history(ticker, range).await?;
        if series.is_empty() {
            warn!("{}: provider returned no rows for {}", ticker, range);
        }
        let path = self.store.write_series(&series)?;
        Ok((path, series.len()))
    }
}
