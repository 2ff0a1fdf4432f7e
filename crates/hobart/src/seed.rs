//! Seeding of loader configs.

use hobart_data::{ConfigRow, FactorConfig, SourceTable, SqliteStore, Timeframe};
use hobart_portfolio::available_factors;
use tracing::info;

/// Config rows for every registered factor in every timeframe.
///
/// With `benchmark` set, one benchmark config per timeframe is added, read
/// from the base table.
pub fn seed_rows(benchmark: Option<&str>) -> Vec<ConfigRow> {
    let factors = available_factors()
        .into_iter()
        .map(|f| (f.name.to_string(), f.source_table))
        .chain(benchmark.map(|b| (b.to_string(), SourceTable::Base)));

    factors
        .flat_map(|(factor, source_table)| {
            Timeframe::ALL.map(|timeframe| {
                ConfigRow::from(&FactorConfig::new(&factor, timeframe, source_table, None))
            })
        })
        .collect()
}

/// Insert the seed rows; existing watermarks are kept.
pub fn seed_configs(store: &SqliteStore, benchmark: Option<&str>) -> hobart_data::Result<usize> {
    let rows = seed_rows(benchmark);
    let n = store.seed_configs(&rows)?;
    info!(configs = n, "seeded factor loader configs");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hobart_data::{ObservationSource, ReturnsTarget};

    #[test]
    fn test_seed_rows() {
        let rows = seed_rows(None);
        assert_eq!(rows.len(), 30);
        assert!(rows.iter().all(|r| r.last_date_persisted.is_none()));

        let bar_delta = rows
            .iter()
            .find(|r| r.factor == "BAR_DELTA" && r.timeframe == "DAILY")
            .unwrap();
        assert_eq!(bar_delta.source_table, "METRICS");
    }

    #[test]
    fn test_seed_with_benchmark() {
        let rows = seed_rows(Some("benchmark"));
        assert_eq!(rows.len(), 33);
        assert!(rows.iter().any(|r| r.factor == "BENCHMARK" && r.source_table == "BASE"));
    }

    #[test]
    fn test_reseeding_keeps_watermarks() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed_configs(&store, None).unwrap();

        let mut row = ConfigRow::from(&FactorConfig::new(
            "bar",
            Timeframe::Weekly,
            SourceTable::Base,
            None,
        ));
        row.last_date_persisted = NaiveDate::from_ymd_opt(2015, 12, 25);
        store.persist(&row, &[]).unwrap();

        seed_configs(&store, None).unwrap();
        let configs = store.fetch_configs().unwrap();
        assert_eq!(configs.len(), 30);
        let bar = configs
            .iter()
            .find(|c| c.factor == "bar" && c.timeframe == Timeframe::Weekly)
            .unwrap();
        assert_eq!(bar.last_date_persisted, NaiveDate::from_ymd_opt(2015, 12, 25));
    }
}
