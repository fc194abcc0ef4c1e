use crate::models::{PriceBar, PriceSeries};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const HEADER: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not create output dir {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// ── CSV store ─────────────────────────────────────────────────────────────────

/// Writes one `<TICKER>_stock_data.csv` per series into `dir`.
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, series: &PriceSeries) -> PathBuf {
        self.dir.join(series.ticker.output_file_name())
    }

    /// Truncate-and-write the series. The header is always present, so an
    /// empty series still produces a file.
    pub fn write_series(&self, series: &PriceSeries) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(series);
        write_csv(&path, &series.bars).map_err(|source| StorageError::Csv {
            path: path.clone(),
            source,
        })?;

        debug!("{}: wrote {} rows to {:?}", series.ticker, series.len(), path);
        Ok(path)
    }
}

fn write_csv(path: &Path, bars: &[PriceBar]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(HEADER)?;

    for bar in bars {
        wtr.write_record([
            bar.date.to_string(),
            opt(bar.open),
            opt(bar.high),
            opt(bar.low),
            opt(bar.close),
            opt(bar.adj_close),
            opt(bar.volume),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Missing values become empty fields.
fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}
