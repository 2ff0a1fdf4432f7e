//! Observation history per date.
//!
//! A [`History`] groups the observations of one table variant by observation
//! date within a window. Configs sharing `(timeframe, source table)` read the
//! same history, so [`HistoryCache`] keeps the last one built and only fetches
//! again when that key or the window changes.

use chrono::NaiveDate;
use hobart_data::{
    DataError, DateRange, FactorConfig, RawRow, SecurityObservation, SourceTable, Timeframe,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Key under which a history can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    /// Timeframe of the observation table
    pub timeframe: Timeframe,
    /// Observation table variant
    pub source_table: SourceTable,
}

impl From<&FactorConfig> for HistoryKey {
    fn from(config: &FactorConfig) -> Self {
        Self {
            timeframe: config.timeframe,
            source_table: config.source_table,
        }
    }
}

/// Observations grouped by date, ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    entries: BTreeMap<NaiveDate, Vec<SecurityObservation>>,
    carried: Option<NaiveDate>,
}

impl History {
    /// Group observations by their date.
    pub fn from_observations(observations: impl IntoIterator<Item = SecurityObservation>) -> Self {
        let mut entries: BTreeMap<NaiveDate, Vec<SecurityObservation>> = BTreeMap::new();
        for obs in observations {
            entries.entry(obs.datadate()).or_default().push(obs);
        }
        Self {
            entries,
            carried: None,
        }
    }

    /// Translate raw rows of `table` and group them by date.
    pub fn from_rows(table: SourceTable, rows: &[RawRow]) -> Result<Self, DataError> {
        let observations = rows
            .iter()
            .map(|row| SecurityObservation::from_row(table, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_observations(observations))
    }

    /// Whether the history holds no dates.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    /// Observations of one date.
    pub fn get(&self, date: NaiveDate) -> Option<&[SecurityObservation]> {
        self.entries.get(&date).map(Vec::as_slice)
    }

    /// `(date, observations)` pairs in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[SecurityObservation])> + '_ {
        self.entries.iter().map(|(d, obs)| (*d, obs.as_slice()))
    }

    /// Latest date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.entries.keys().next_back().copied()
    }

    /// Date seeded from the previous window, if any.
    pub const fn carried_date(&self) -> Option<NaiveDate> {
        self.carried
    }

    /// Latest date and its observations.
    fn last_entry(&self) -> Option<(NaiveDate, Vec<SecurityObservation>)> {
        self.entries
            .iter()
            .next_back()
            .map(|(d, obs)| (*d, obs.clone()))
    }

    /// Prepend an entry from an earlier window.
    ///
    /// Ignored unless `date` precedes every date already held.
    fn seed(&mut self, date: NaiveDate, observations: Vec<SecurityObservation>) {
        if self.entries.keys().next().is_some_and(|first| date < *first) {
            self.entries.insert(date, observations);
            self.carried = Some(date);
        }
    }
}

/// Cache of the most recently built history.
///
/// The history is rebuilt only when the `(timeframe, source table)` key or
/// the window changes. When a history is replaced, its latest date is kept
/// so the next window for the same key can pair it with its first date.
#[derive(Debug, Default)]
pub struct HistoryCache {
    current: Option<(HistoryKey, DateRange, History)>,
    carried: HashMap<HistoryKey, (NaiveDate, Vec<SecurityObservation>)>,
    fetches: usize,
}

impl HistoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fetches performed so far.
    pub const fn fetches(&self) -> usize {
        self.fetches
    }

    /// Return the history for `config` within `range`, fetching only on a miss.
    ///
    /// `fetch` receives the key and window and returns raw rows; translation
    /// failures are returned as errors.
    pub fn get_or_build<E, F>(
        &mut self,
        range: DateRange,
        config: &FactorConfig,
        fetch: F,
    ) -> Result<&History, E>
    where
        E: From<DataError>,
        F: FnOnce(HistoryKey, DateRange) -> Result<Vec<RawRow>, E>,
    {
        let key = HistoryKey::from(config);

        let entry = match self.current.take() {
            Some(entry) if entry.0 == key && entry.1 == range => entry,
            previous => {
                self.stash(previous);

                let rows = fetch(key, range)?;
                self.fetches += 1;
                let mut history = History::from_rows(key.source_table, &rows)?;
                if !history.is_empty() {
                    if let Some((date, observations)) = self.carried.get(&key) {
                        history.seed(*date, observations.clone());
                    }
                }
                debug!(
                    timeframe = %key.timeframe,
                    source_table = %key.source_table,
                    %range,
                    dates = history.len(),
                    "built history"
                );
                (key, range, history)
            }
        };

        let (_, _, history) = self.current.insert(entry);
        Ok(history)
    }

    /// Drop the current history, keeping only its latest date.
    pub fn finish_window(&mut self) {
        let current = self.current.take();
        self.stash(current);
    }

    /// Keep the latest entry of a replaced history.
    ///
    /// An empty history clears the key, so only the window just finished can
    /// seed the next one.
    fn stash(&mut self, entry: Option<(HistoryKey, DateRange, History)>) {
        let Some((key, _, history)) = entry else {
            return;
        };
        match history.last_entry() {
            Some(last) => {
                self.carried.insert(key, last);
            }
            None => {
                self.carried.remove(&key);
            }
        }
    }
}
