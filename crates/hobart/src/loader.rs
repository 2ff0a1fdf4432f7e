//! Incremental factor return loader.
//!
//! A run walks the yearly windows of one timeframe in order. Within a window
//! every config is scored against the history of its `(timeframe, source
//! table)`, and its return rows are persisted together with its advanced
//! watermark in one transaction. Windows starting before the smallest stored
//! watermark are skipped, so a restarted run resumes where the last commit
//! left off.

use crate::error::Result;
use crate::settings::LoaderSettings;
use chrono::NaiveDate;
use hobart_data::{
    ConfigRow, DateRange, FactorConfig, FactorReturnRow, ObservationSource, ReturnsTarget,
    Timeframe,
};
use hobart_portfolio::{HistoryCache, generate_intervals, run_config, validate_config};
use tracing::{debug, info, warn};

/// Outcome of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowReport {
    /// Window processed
    pub window: DateRange,
    /// Configs whose rows were persisted
    pub configs_persisted: usize,
    /// Configs skipped for lack of observations
    pub configs_skipped: usize,
    /// Return rows written
    pub records: usize,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Per-window outcomes, in processing order
    pub windows: Vec<WindowReport>,
    /// Observation fetches made
    pub fetches: usize,
}

impl RunReport {
    /// Total return rows written.
    pub fn records(&self) -> usize {
        self.windows.iter().map(|w| w.records).sum()
    }
}

/// Loader for one timeframe.
#[derive(Debug)]
pub struct Loader<S, T> {
    source: S,
    target: T,
    timeframe: Timeframe,
    settings: LoaderSettings,
    configs: Vec<FactorConfig>,
    cache: HistoryCache,
}

impl<S: ObservationSource, T: ReturnsTarget> Loader<S, T> {
    /// Load and validate the configs of `timeframe`.
    ///
    /// Configs are ordered by source table so those sharing a history are
    /// processed back to back. A config naming a factor its source table
    /// does not carry is an error.
    pub fn new(source: S, target: T, timeframe: Timeframe, settings: LoaderSettings) -> Result<Self> {
        settings.validate()?;

        let mut configs: Vec<FactorConfig> = settings
            .retry
            .run("fetch_configs", || source.fetch_configs())?
            .into_iter()
            .filter(|c| c.timeframe == timeframe)
            .collect();
        for config in &configs {
            validate_config(config, &settings.portfolio)?;
        }
        configs.sort_by(|a, b| {
            (a.source_table, &a.factor).cmp(&(b.source_table, &b.factor))
        });

        if configs.is_empty() {
            warn!(%timeframe, "no factor loader configs for timeframe");
        } else {
            info!(%timeframe, configs = configs.len(), "loaded factor loader configs");
        }

        Ok(Self {
            source,
            target,
            timeframe,
            settings,
            configs,
            cache: HistoryCache::new(),
        })
    }

    /// Timeframe being loaded.
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Configs in processing order.
    pub fn configs(&self) -> &[FactorConfig] {
        &self.configs
    }

    /// Observation fetches made so far.
    pub const fn fetches(&self) -> usize {
        self.cache.fetches()
    }

    /// Consume the loader, returning its collaborators.
    pub fn into_parts(self) -> (S, T) {
        (self.source, self.target)
    }

    /// Smallest watermark across the timeframe's configs.
    pub fn watermark(&self) -> Result<Option<NaiveDate>> {
        let target = &self.target;
        let timeframe = self.timeframe;
        self.settings
            .retry
            .run("fetch_last_date_persisted", || {
                target.fetch_last_date_persisted(timeframe)
            })
    }

    /// Windows still to process, given the stored watermark.
    pub fn pending_windows(&self) -> Result<Vec<DateRange>> {
        let windows = generate_intervals(&self.settings.years);
        let watermark = self.watermark()?;

        let pending: Vec<DateRange> = match watermark {
            Some(last) => windows.into_iter().filter(|w| w.start >= last).collect(),
            None => windows,
        };
        info!(
            timeframe = %self.timeframe,
            watermark = ?watermark,
            windows = pending.len(),
            "resolved pending windows"
        );
        Ok(pending)
    }

    /// Score and persist every config for one window.
    pub fn run_window(&mut self, window: DateRange) -> Result<WindowReport> {
        let mut report = WindowReport {
            window,
            configs_persisted: 0,
            configs_skipped: 0,
            records: 0,
        };
        let total = self.configs.len();

        for i in 0..total {
            let config = &self.configs[i];
            let source = &self.source;
            let retry = self.settings.retry;

            let history = self.cache.get_or_build(window, config, |key, range| {
                retry.run("get_records", || {
                    source.get_records(key.timeframe, key.source_table, range)
                })
            })?;

            let Some(last_date) = history.last_date() else {
                info!(factor = %config.factor, %window, "No records left to process for this config");
                report.configs_skipped += 1;
                continue;
            };

            let records = run_config(history, config, &self.settings.portfolio);
            let rows: Vec<FactorReturnRow> = records.iter().map(FactorReturnRow::from).collect();
            let config_row = ConfigRow::from(&FactorConfig {
                last_date_persisted: Some(last_date),
                ..config.clone()
            });

            let target = &mut self.target;
            retry.run("persist", || target.persist(&config_row, &rows))?;
            debug!(
                factor = %config.factor,
                %window,
                records = rows.len(),
                %last_date,
                "persisted factor returns"
            );

            let config = &mut self.configs[i];
            config.last_date_persisted = config.last_date_persisted.max(Some(last_date));
            report.configs_persisted += 1;
            report.records += rows.len();
            info!("Processed {}/{} configs", i + 1, total);
        }

        self.cache.finish_window();
        Ok(report)
    }

    /// Process every pending window.
    pub fn run(&mut self) -> Result<RunReport> {
        let windows = self.pending_windows()?;
        let mut report = RunReport::default();

        for (i, window) in windows.iter().enumerate() {
            report.windows.push(self.run_window(*window)?);
            info!("Persisted {}/{} date ranges", i + 1, windows.len());
        }

        report.fetches = self.cache.fetches();
        info!(
            timeframe = %self.timeframe,
            windows = report.windows.len(),
            records = report.records(),
            fetches = report.fetches,
            "loader run complete"
        );
        Ok(report)
    }
}
