// src/analysis/mod.rs

//! Read-only grouped aggregations over the partitioned table.

use arrow::{
    array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::{
    config::{ColumnNames, PipelineConfig},
    error::{PipelineError, Result, Stage},
    etl::open_warehouse,
    process::convert::{to_canonical_timestamps, ConvertError},
    store::{ColumnIndex, Warehouse},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCount {
    pub month: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictCount {
    pub district: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattalionResponse {
    pub battalion: String,
    /// Mean of arrival − alarm, in seconds; None when no row had both times.
    pub avg_response_secs: Option<f64>,
    /// Rows that contributed to the mean.
    pub measured: usize,
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::DerivationError {
            stage: Stage::Query,
            derived: name.to_string(),
            reason: format!("column `{}` is absent from the partitioned table", name),
        })
}

fn keys(arr: &ArrayRef) -> Result<StringArray> {
    let text = cast(arr, &DataType::Utf8).map_err(Stage::Query.compute())?;
    Ok(text
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .unwrap_or_else(|| StringArray::new_null(arr.len())))
}

fn read_partitioned(warehouse: &Warehouse, config: &PipelineConfig) -> Result<RecordBatch> {
    warehouse
        .read_table(&config.partitioned_table)
        .map_err(|e| PipelineError::storage(Stage::Query, &config.partitioned_table, e))
}

/// Incidents per month, oldest first.
#[instrument(level = "info", skip_all)]
pub fn incident_trends(config: &PipelineConfig) -> Result<Vec<MonthCount>> {
    let warehouse = open_warehouse(config, Stage::Query)?;
    let batch = read_partitioned(&warehouse, config)?;
    month_counts(&batch, &config.columns.incident_month)
}

pub fn month_counts(batch: &RecordBatch, month_column: &str) -> Result<Vec<MonthCount>> {
    let months = column(batch, month_column)?;
    let months = months
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| PipelineError::DerivationError {
            stage: Stage::Query,
            derived: month_column.to_string(),
            reason: format!("expected a timestamp column, found {}", months.data_type()),
        })?;

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for micros in months.iter().flatten() {
        *counts.entry(micros).or_default() += 1;
    }
    Ok(counts
        .into_iter()
        .filter_map(|(micros, count)| {
            DateTime::from_timestamp_micros(micros).map(|dt| MonthCount {
                month: dt.date_naive(),
                count,
            })
        })
        .collect())
}

/// Incidents per district, busiest first, at most `report_limit` rows.
///
/// Served from the district index when it still describes the table, else by
/// scanning; both give the same answer.
#[instrument(level = "info", skip_all)]
pub fn neighborhood_counts(config: &PipelineConfig) -> Result<Vec<DistrictCount>> {
    let warehouse = open_warehouse(config, Stage::Query)?;
    let storage_err = |e| PipelineError::storage(Stage::Query, &config.partitioned_table, e);

    let index = warehouse
        .read_index(&config.partitioned_table, &config.district_index)
        .map_err(storage_err)?;
    if let Some(index) = index {
        let rows = warehouse
            .row_count(&config.partitioned_table)
            .map_err(storage_err)?;
        if index.row_count == rows && index.column == config.columns.district {
            debug!(index = %index.name, "district counts from index");
            return Ok(district_counts_from_index(&index, config.report_limit));
        }
        debug!(index = %index.name, "index is stale, scanning");
    }

    let batch = read_partitioned(&warehouse, config)?;
    district_counts(&batch, &config.columns.district, config.report_limit)
}

pub fn district_counts(batch: &RecordBatch, district_column: &str, limit: usize) -> Result<Vec<DistrictCount>> {
    let districts = keys(column(batch, district_column)?)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in districts.iter().flatten() {
        *counts.entry(d).or_default() += 1;
    }
    Ok(rank_districts(
        counts.into_iter().map(|(d, n)| (d.to_string(), n)),
        limit,
    ))
}

pub fn district_counts_from_index(index: &ColumnIndex, limit: usize) -> Vec<DistrictCount> {
    rank_districts(
        index.key_counts().map(|(d, n)| (d.to_string(), n)),
        limit,
    )
}

fn rank_districts(counts: impl Iterator<Item = (String, usize)>, limit: usize) -> Vec<DistrictCount> {
    let mut ranked: Vec<DistrictCount> = counts
        .map(|(district, count)| DistrictCount { district, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.district.cmp(&b.district)));
    ranked.truncate(limit);
    ranked
}

/// Mean response time per battalion, fastest first, at most `report_limit` rows.
#[instrument(level = "info", skip_all)]
pub fn response_times(config: &PipelineConfig) -> Result<Vec<BattalionResponse>> {
    let warehouse = open_warehouse(config, Stage::Query)?;
    let batch = read_partitioned(&warehouse, config)?;
    battalion_response_times(&batch, &config.columns, config.report_limit)
}

fn timestamps(batch: &RecordBatch, name: &str) -> Result<TimestampMicrosecondArray> {
    let canonical = to_canonical_timestamps(column(batch, name)?).map_err(|e| match e {
        ConvertError::Unparseable { row, value } => PipelineError::ParseError {
            stage: Stage::Query,
            column: name.to_string(),
            row,
            value,
        },
        ConvertError::Arrow(source) => Stage::Query.compute()(source),
    })?;
    Ok(canonical
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .cloned()
        .unwrap_or_else(|| TimestampMicrosecondArray::new_null(canonical.len())))
}

pub fn battalion_response_times(
    batch: &RecordBatch,
    columns: &ColumnNames,
    limit: usize,
) -> Result<Vec<BattalionResponse>> {
    let battalions = keys(column(batch, &columns.battalion)?)?;
    let alarm = timestamps(batch, &columns.alarm_time)?;
    let arrival = timestamps(batch, &columns.arrival_time)?;

    // battalion → (sum of seconds, measured rows)
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for row in 0..batch.num_rows() {
        if battalions.is_null(row) {
            continue;
        }
        let entry = acc.entry(battalions.value(row)).or_insert((0.0, 0));
        if alarm.is_valid(row) && arrival.is_valid(row) {
            entry.0 += (arrival.value(row) - alarm.value(row)) as f64 / 1_000_000.0;
            entry.1 += 1;
        }
    }

    let mut ranked: Vec<BattalionResponse> = acc
        .into_iter()
        .map(|(battalion, (sum, measured))| BattalionResponse {
            battalion: battalion.to_string(),
            avg_response_secs: (measured > 0).then(|| sum / measured as f64),
            measured,
        })
        .collect();
    ranked.sort_by(|a, b| match (a.avg_response_secs, b.avg_response_secs) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.battalion.cmp(&b.battalion)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.battalion.cmp(&b.battalion),
    });
    ranked.truncate(limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::{self, IndexStatus};
    use crate::process::convert::canonical_timestamp_type;
    use crate::process::date_parser::parse_timestamp_micros;
    use crate::process::tests::{init_test_logging, write_csv};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn micros(s: &str) -> Option<i64> {
        parse_timestamp_micros(s)
    }

    #[test]
    fn months_are_counted_in_ascending_order() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "incident_month",
            canonical_timestamp_type(),
            true,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(TimestampMicrosecondArray::from(vec![
                micros("2024-02-01"),
                micros("2023-12-01"),
                micros("2024-02-01"),
                None,
            ]))],
        )?;
        let counts = month_counts(&batch, "incident_month")?;
        assert_eq!(
            counts,
            vec![
                MonthCount {
                    month: NaiveDate::from_ymd_opt(2023, 12, 1).expect("date"),
                    count: 1
                },
                MonthCount {
                    month: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
                    count: 2
                },
            ]
        );
        Ok(())
    }

    fn district_batch(counts: &[(&str, usize)]) -> anyhow::Result<RecordBatch> {
        let mut values = Vec::new();
        for (d, n) in counts {
            values.extend(std::iter::repeat(Some(*d)).take(*n));
        }
        values.push(None);
        let schema = Arc::new(Schema::new(vec![Field::new(
            "neighborhood_district",
            DataType::Utf8,
            true,
        )]));
        Ok(RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(values))],
        )?)
    }

    #[test]
    fn busiest_district_ranks_first() -> anyhow::Result<()> {
        let batch = district_batch(&[("Tenderloin", 3), ("Mission", 7)])?;
        let ranked = district_counts(&batch, "neighborhood_district", 10)?;
        assert_eq!(
            ranked,
            vec![
                DistrictCount {
                    district: "Mission".into(),
                    count: 7
                },
                DistrictCount {
                    district: "Tenderloin".into(),
                    count: 3
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn index_and_scan_agree_and_respect_the_limit() -> anyhow::Result<()> {
        let batch = district_batch(&[("A", 2), ("B", 5), ("C", 2), ("D", 1)])?;
        let index = ColumnIndex::build("idx", "t", "neighborhood_district", &batch)?;
        let scanned = district_counts(&batch, "neighborhood_district", 3)?;
        assert_eq!(scanned, district_counts_from_index(&index, 3));
        let names: Vec<&str> = scanned.iter().map(|d| d.district.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        Ok(())
    }

    #[test]
    fn district_counts_do_not_depend_on_the_index() -> anyhow::Result<()> {
        init_test_logging();
        let mut content = String::from(
            "Incident Number,Incident Date,Battalion,Alarm DtTm,Arrival DtTm,neighborhood_district\n",
        );
        for (i, d) in ["Mission", "Mission", "Marina", "Mission", "Bayview", "Marina"]
            .iter()
            .enumerate()
        {
            content.push_str(&format!(
                "{i},2019/01/0{day},B01,2019/01/01 10:00:00,2019/01/01 10:03:00,{d}\n",
                day = i + 1
            ));
        }
        let csv = write_csv(&content)?;
        let dir = tempdir()?;
        let config = PipelineConfig {
            source_path: csv.path().to_path_buf(),
            warehouse_path: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        etl::extract_data(&config)?;
        etl::transform_data(&config)?;
        assert_eq!(etl::load_data(&config)?.index, IndexStatus::Built { keys: 3 });

        let indexed = neighborhood_counts(&config)?;
        let ranked: Vec<(&str, usize)> = indexed
            .iter()
            .map(|d| (d.district.as_str(), d.count))
            .collect();
        assert_eq!(ranked, vec![("Mission", 3), ("Marina", 2), ("Bayview", 1)]);

        let warehouse = Warehouse::open(&config.warehouse_path)?;
        assert!(warehouse.drop_index(&config.partitioned_table, &config.district_index)?);
        assert_eq!(neighborhood_counts(&config)?, indexed);

        let stale = ColumnIndex {
            name: config.district_index.clone(),
            table: config.partitioned_table.clone(),
            column: config.columns.district.clone(),
            row_count: 2,
            entries: BTreeMap::from([("Nowhere".to_string(), vec![0, 1])]),
        };
        warehouse.create_index(&stale)?;
        assert_eq!(neighborhood_counts(&config)?, indexed);
        Ok(())
    }

    #[test]
    fn response_time_is_mean_seconds_per_battalion() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Battalion", DataType::Utf8, true),
            Field::new("Alarm DtTm", DataType::Utf8, true),
            Field::new("Arrival DtTm", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    Some("B02"),
                    Some("B02"),
                    Some("B01"),
                    Some("B03"),
                    None,
                ])),
                Arc::new(StringArray::from(vec![
                    Some("2018/06/05 10:00:00"),
                    Some("2018/06/05 11:00:00"),
                    Some("2018/06/05 10:00:00"),
                    Some("2018/06/05 10:00:00"),
                    Some("2018/06/05 10:00:00"),
                ])),
                Arc::new(StringArray::from(vec![
                    Some("2018/06/05 10:05:00"),
                    Some("2018/06/05 11:03:00"),
                    Some("2018/06/05 10:02:00"),
                    None,
                    Some("2018/06/05 10:01:00"),
                ])),
            ],
        )?;

        let ranked = battalion_response_times(&batch, &ColumnNames::default(), 10)?;
        let summary: Vec<(&str, Option<f64>, usize)> = ranked
            .iter()
            .map(|r| (r.battalion.as_str(), r.avg_response_secs, r.measured))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("B01", Some(120.0), 1),
                ("B02", Some(240.0), 2),
                ("B03", None, 0),
            ]
        );
        Ok(())
    }
}
