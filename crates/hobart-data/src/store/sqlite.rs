//! SQLite store for configs, observations and factor returns.

use crate::error::{DataError, Result};
use crate::model::{FactorConfig, RawRow, SecurityObservation, SourceTable, Timeframe};
use crate::store::{ConfigRow, DateRange, FactorReturnRow, ObservationSource, ReturnsTarget};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, params, params_from_iter};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

const UPSERT_CONFIG: &str = "INSERT INTO factor_loader_config
        (factor, timeframe, last_date_persisted, source_table)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (factor, timeframe) DO UPDATE SET
        last_date_persisted = CASE
            WHEN factor_loader_config.last_date_persisted IS NULL
                THEN excluded.last_date_persisted
            WHEN excluded.last_date_persisted IS NULL
                THEN factor_loader_config.last_date_persisted
            ELSE MAX(factor_loader_config.last_date_persisted, excluded.last_date_persisted)
        END";

const SEED_CONFIG: &str = "INSERT INTO factor_loader_config
        (factor, timeframe, last_date_persisted, source_table)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (factor, timeframe) DO UPDATE SET
        source_table = excluded.source_table";

const UPSERT_RETURNS: &str = "INSERT INTO factor_returns
        (datadate, factor, timeframe, mkt_cap_class, top,
         long_rtn, short_rtn, rtn, consistent, gvkeys)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
     ON CONFLICT (datadate, factor, timeframe, mkt_cap_class, top) DO UPDATE SET
        long_rtn = excluded.long_rtn,
        short_rtn = excluded.short_rtn,
        rtn = excluded.rtn,
        consistent = excluded.consistent,
        gvkeys = excluded.gvkeys";

/// SQLite implementation of both store collaborators.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Bound how long a statement waits on a locked database.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.conn.busy_timeout(timeout)?;
        Ok(self)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS factor_loader_config (
                factor TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                last_date_persisted TEXT,
                source_table TEXT NOT NULL,
                PRIMARY KEY (factor, timeframe)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS factor_returns (
                datadate TEXT NOT NULL,
                factor TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                mkt_cap_class TEXT NOT NULL,
                top INTEGER NOT NULL,
                long_rtn REAL,
                short_rtn REAL,
                rtn REAL,
                consistent INTEGER NOT NULL,
                gvkeys TEXT,
                PRIMARY KEY (datadate, factor, timeframe, mkt_cap_class, top)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_factor_returns_factor
             ON factor_returns(factor, timeframe)",
            [],
        )?;

        for table in [SourceTable::Base, SourceTable::Metrics] {
            let columns = SecurityObservation::fields(table)
                .iter()
                .map(|c| format!("{c} REAL"))
                .collect::<Vec<_>>()
                .join(",\n                ");
            self.conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {name} (
                timeframe TEXT NOT NULL,
                datadate TEXT NOT NULL,
                gvkey INTEGER NOT NULL,
                {columns},
                PRIMARY KEY (timeframe, datadate, gvkey)
            )",
                    name = table.table_name()
                ),
                [],
            )?;
        }

        Ok(())
    }

    /// All stored configs.
    pub fn configs(&self) -> Result<Vec<FactorConfig>> {
        let mut stmt = self.conn.prepare(
            "SELECT factor, timeframe, last_date_persisted, source_table
             FROM factor_loader_config
             ORDER BY timeframe, source_table, factor",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ConfigRow {
                factor: row.get(0)?,
                timeframe: row.get(1)?,
                last_date_persisted: row
                    .get::<_, Option<String>>(2)?
                    .map(|d| parse_date(2, &d))
                    .transpose()?,
                source_table: row.get(3)?,
            })
        })?;

        let mut configs = Vec::new();
        for row in rows {
            configs.push(FactorConfig::try_from(row?)?);
        }
        Ok(configs)
    }

    /// Insert configs without touching existing watermarks.
    pub fn seed_configs(&self, rows: &[ConfigRow]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        for row in rows {
            tx.execute(
                SEED_CONFIG,
                params![
                    row.factor,
                    row.timeframe,
                    row.last_date_persisted.map(|d| d.to_string()),
                    row.source_table
                ],
            )?;
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// Store observations for a timeframe, replacing existing rows.
    pub fn put_observations(
        &self,
        timeframe: Timeframe,
        observations: &[SecurityObservation],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for table in [SourceTable::Base, SourceTable::Metrics] {
            let fields = SecurityObservation::fields(table);
            let placeholders = (1..=fields.len() + 3)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT OR REPLACE INTO {} (timeframe, datadate, gvkey, {}) VALUES ({})",
                table.table_name(),
                fields.join(", "),
                placeholders
            );
            let mut stmt = tx.prepare(&sql)?;

            for obs in observations.iter().filter(|o| o.source_table() == table) {
                let mut values: Vec<rusqlite::types::Value> = vec![
                    timeframe.to_db_str().to_string().into(),
                    obs.datadate().to_string().into(),
                    obs.gvkey().into(),
                ];
                values.extend(fields.iter().map(|f| obs.factor_value(f).into()));
                stmt.execute(params_from_iter(values))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Persisted factor returns for a timeframe, optionally for one factor.
    pub fn factor_returns(
        &self,
        timeframe: Timeframe,
        factor: Option<&str>,
    ) -> Result<Vec<FactorReturnRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT datadate, factor, timeframe, mkt_cap_class, top,
                    long_rtn, short_rtn, rtn, consistent, gvkeys
             FROM factor_returns
             WHERE timeframe = ?1 AND (?2 IS NULL OR factor = ?2)
             ORDER BY datadate, factor, mkt_cap_class, top",
        )?;

        let factor = factor.map(str::to_ascii_uppercase);
        let rows = stmt.query_map(params![timeframe.to_db_str(), factor], |row| {
            Ok(FactorReturnRow {
                datadate: parse_date(0, &row.get::<_, String>(0)?)?,
                factor: row.get(1)?,
                timeframe: row.get(2)?,
                mkt_cap_class: row.get(3)?,
                top: row.get(4)?,
                long_rtn: row.get(5)?,
                short_rtn: row.get(6)?,
                rtn: row.get(7)?,
                consistent: row.get(8)?,
                gvkeys: row.get(9)?,
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            configs: count("factor_loader_config")?,
            factor_returns: count("factor_returns")?,
            base_rows: count(SourceTable::Base.table_name())?,
            metrics_rows: count(SourceTable::Metrics.table_name())?,
        })
    }
}

impl ObservationSource for SqliteStore {
    fn fetch_configs(&self) -> Result<Vec<FactorConfig>> {
        self.configs()
    }

    fn get_records(
        &self,
        timeframe: Timeframe,
        source_table: SourceTable,
        range: DateRange,
    ) -> Result<Vec<RawRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT * FROM {} WHERE timeframe = ?1 AND datadate >= ?2 AND datadate <= ?3
             ORDER BY datadate, gvkey",
            source_table.table_name()
        ))?;

        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let date_idx = column_index(&columns, source_table, "datadate")?;
        let gvkey_idx = column_index(&columns, source_table, "gvkey")?;

        let rows = stmt.query_map(
            params![
                timeframe.to_db_str(),
                range.start.to_string(),
                range.end.to_string()
            ],
            |row| {
                let mut raw = RawRow::new(
                    parse_date(date_idx, &row.get::<_, String>(date_idx)?)?,
                    row.get(gvkey_idx)?,
                );
                for (idx, name) in columns.iter().enumerate() {
                    if idx == date_idx || idx == gvkey_idx || name == "timeframe" {
                        continue;
                    }
                    raw.values.insert(name.clone(), row.get::<_, Option<f64>>(idx)?);
                }
                Ok(raw)
            },
        )?;

        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(
            table = source_table.table_name(),
            %timeframe,
            %range,
            rows = records.len(),
            "fetched observation rows"
        );
        Ok(records)
    }
}

impl ReturnsTarget for SqliteStore {
    fn fetch_last_date_persisted(&self, timeframe: Timeframe) -> Result<Option<NaiveDate>> {
        // A config that has never been persisted holds the watermark at "none".
        let last: Option<String> = self.conn.query_row(
            "SELECT CASE WHEN COUNT(*) > 0 AND COUNT(*) = COUNT(last_date_persisted)
                         THEN MIN(last_date_persisted) END
             FROM factor_loader_config
             WHERE timeframe = ?1",
            params![timeframe.to_db_str()],
            |row| row.get(0),
        )?;

        last.map(|d| {
            NaiveDate::parse_from_str(&d, DATE_FORMAT)
                .map_err(|e| DataError::Parse(format!("Invalid watermark {d}: {e}")))
        })
        .transpose()
    }

    fn persist(&mut self, config: &ConfigRow, returns: &[FactorReturnRow]) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            UPSERT_CONFIG,
            params![
                config.factor,
                config.timeframe,
                config.last_date_persisted.map(|d| d.to_string()),
                config.source_table
            ],
        )?;

        {
            let mut stmt = tx.prepare(UPSERT_RETURNS)?;
            for r in returns {
                stmt.execute(params![
                    r.datadate.to_string(),
                    r.factor,
                    r.timeframe,
                    r.mkt_cap_class,
                    r.top,
                    r.long_rtn,
                    r.short_rtn,
                    r.rtn,
                    r.consistent,
                    r.gvkeys,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of config rows
    pub configs: usize,
    /// Number of persisted factor return rows
    pub factor_returns: usize,
    /// Number of base observation rows
    pub base_rows: usize,
    /// Number of metrics observation rows
    pub metrics_rows: usize,
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn column_index(columns: &[String], table: SourceTable, name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| DataError::Schema {
            table: table.table_name().to_string(),
            column: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseData, MetricsData};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config_row(factor: &str, last: Option<NaiveDate>) -> ConfigRow {
        ConfigRow {
            factor: factor.to_string(),
            timeframe: "WEEKLY".to_string(),
            last_date_persisted: last,
            source_table: "BASE".to_string(),
        }
    }

    fn return_row(datadate: NaiveDate, long_rtn: f64) -> FactorReturnRow {
        FactorReturnRow {
            datadate,
            factor: "BAR".to_string(),
            timeframe: "WEEKLY".to_string(),
            mkt_cap_class: "SMALL".to_string(),
            top: 20,
            long_rtn: Some(long_rtn),
            short_rtn: Some(-0.01),
            rtn: Some((long_rtn - 0.01) / 2.0),
            consistent: true,
            gvkeys: Some(r#"{"LONG":[1],"SHORT":[2]}"#.to_string()),
        }
    }

    #[test]
    fn test_store_initialization() {
        let store = SqliteStore::in_memory();
        assert!(store.is_ok());
        let stats = store.unwrap().stats().unwrap();
        assert_eq!(stats.configs, 0);
        assert_eq!(stats.factor_returns, 0);
    }

    #[test]
    fn test_seed_and_read_configs() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .seed_configs(&[config_row("BAR", None), config_row("UTILIZATION_PCT", None)])
            .unwrap();

        let configs = store.fetch_configs().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].factor, "bar");
        assert_eq!(configs[0].timeframe, Timeframe::Weekly);
        assert_eq!(configs[0].source_table, SourceTable::Base);
    }

    #[test]
    fn test_seeding_keeps_watermark() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.seed_configs(&[config_row("BAR", None)]).unwrap();
        store
            .persist(&config_row("BAR", Some(date(2015, 12, 31))), &[])
            .unwrap();
        store.seed_configs(&[config_row("BAR", None)]).unwrap();

        let configs = store.configs().unwrap();
        assert_eq!(configs[0].last_date_persisted, Some(date(2015, 12, 31)));
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .persist(&config_row("BAR", Some(date(2016, 12, 30))), &[])
            .unwrap();
        store
            .persist(&config_row("BAR", Some(date(2015, 12, 31))), &[])
            .unwrap();

        assert_eq!(
            store.fetch_last_date_persisted(Timeframe::Weekly).unwrap(),
            Some(date(2016, 12, 30))
        );
    }

    #[test]
    fn test_last_date_persisted_is_minimum() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .persist(&config_row("BAR", Some(date(2016, 12, 30))), &[])
            .unwrap();
        store
            .persist(&config_row("UTILIZATION_PCT", Some(date(2015, 12, 31))), &[])
            .unwrap();

        assert_eq!(
            store.fetch_last_date_persisted(Timeframe::Weekly).unwrap(),
            Some(date(2015, 12, 31))
        );
        assert_eq!(store.fetch_last_date_persisted(Timeframe::Daily).unwrap(), None);
    }

    #[test]
    fn test_unpersisted_config_clears_watermark() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .persist(&config_row("BAR", Some(date(2016, 12, 30))), &[])
            .unwrap();
        store.seed_configs(&[config_row("SHORT_RATIO", None)]).unwrap();

        assert_eq!(store.fetch_last_date_persisted(Timeframe::Weekly).unwrap(), None);
    }

    #[test]
    fn test_returns_upsert_overwrites() {
        let mut store = SqliteStore::in_memory().unwrap();
        let d = date(2020, 1, 10);
        let config = config_row("BAR", Some(d));

        store.persist(&config, &[return_row(d, 0.05)]).unwrap();
        store.persist(&config, &[return_row(d, 0.07)]).unwrap();

        let rows = store.factor_returns(Timeframe::Weekly, Some("bar")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].long_rtn, Some(0.07));
        assert!(rows[0].consistent);
        assert_eq!(rows[0].gvkeys.as_deref(), Some(r#"{"LONG":[1],"SHORT":[2]}"#));
    }

    #[test]
    fn test_failed_returns_upsert_rolls_back_config() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .persist(&config_row("BAR", Some(date(2015, 12, 31))), &[])
            .unwrap();
        store.seed_configs(&[config_row("UTILIZATION_PCT", None)]).unwrap();
        store.conn.execute_batch("DROP TABLE factor_returns").unwrap();

        let d = date(2016, 12, 30);
        let result = store.persist(&config_row("BAR", Some(d)), &[return_row(d, 0.05)]);
        assert!(matches!(result, Err(DataError::Database(_))));
        let result = store.persist(&config_row("UTILIZATION_PCT", Some(d)), &[return_row(d, 0.05)]);
        assert!(result.is_err());

        let configs = store.configs().unwrap();
        let watermark = |factor: &str| {
            configs
                .iter()
                .find(|c| c.factor == factor)
                .and_then(|c| c.last_date_persisted)
        };
        assert_eq!(configs.len(), 2);
        assert_eq!(watermark("bar"), Some(date(2015, 12, 31)));
        assert_eq!(watermark("utilization_pct"), None);
        assert_eq!(store.fetch_last_date_persisted(Timeframe::Weekly).unwrap(), None);
    }

    #[test]
    fn test_observation_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let d = date(2020, 1, 3);
        let base = SecurityObservation::Base(BaseData {
            datadate: d,
            gvkey: 7,
            bar: Some(2.0),
            market_cap: Some(600.0),
            winsorized_5_rtn: Some(0.01),
            ..Default::default()
        });
        let metrics = SecurityObservation::Metrics(MetricsData {
            datadate: d,
            gvkey: 7,
            short_ratio: Some(1.5),
            ..Default::default()
        });
        store
            .put_observations(Timeframe::Weekly, &[base.clone(), metrics])
            .unwrap();

        let range = DateRange::new(date(2020, 1, 1), date(2020, 1, 31)).unwrap();
        let rows = store
            .get_records(Timeframe::Weekly, SourceTable::Base, range)
            .unwrap();
        assert_eq!(rows.len(), 1);
        let obs = SecurityObservation::from_row(SourceTable::Base, &rows[0]).unwrap();
        assert_eq!(obs, base);

        let rows = store
            .get_records(Timeframe::Daily, SourceTable::Base, range)
            .unwrap();
        assert!(rows.is_empty());

        let stats = store.stats().unwrap();
        assert_eq!(stats.base_rows, 1);
        assert_eq!(stats.metrics_rows, 1);
    }

    #[test]
    fn test_date_range_validation() {
        assert!(DateRange::new(date(2020, 2, 1), date(2020, 1, 1)).is_err());
        let range = DateRange::new(date(2020, 1, 1), date(2020, 1, 1)).unwrap();
        assert_eq!(range.to_string(), "[2020-01-01, 2020-01-01]");
    }
}
