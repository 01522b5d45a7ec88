use anyhow::{Context, Result};
use arrow::array::Array;
use fire_etl::{store::Warehouse, PipelineConfig};
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{env, fs::File, process::exit};

fn main() {
    // Optional argument: table name. Without one, list the warehouse tables.
    let config = match PipelineConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(1);
        }
    };
    if let Err(e) = inspect(&config, env::args().nth(1).as_deref()) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn inspect(config: &PipelineConfig, table: Option<&str>) -> Result<()> {
    let warehouse = Warehouse::open(&config.warehouse_path)?;

    let Some(table) = table else {
        println!("=== Warehouse: {} ===", warehouse.root().display());
        for name in warehouse.list_tables()? {
            println!("- {:<32} {:>10} rows", name, warehouse.row_count(&name)?);
        }
        return Ok(());
    };

    if !warehouse.table_exists(table) {
        anyhow::bail!("table `{}` not found in {}", table, warehouse.root().display());
    }

    // 1) File-level metadata
    let path = warehouse.root().join(format!("{}.parquet", table));
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let reader = SerializedFileReader::new(file)?;
    let parquet_meta = reader.metadata();
    let file_meta = parquet_meta.file_metadata();

    println!("=== Table: {} ===", table);
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", parquet_meta.num_row_groups());
    println!("File-size on disk:    {} bytes", std::fs::metadata(&path)?.len());
    println!();

    // 2) Columns, with the Arrow types the pipeline sees
    println!("=== Columns ===");
    let batch = warehouse.read_table(table)?;
    for field in batch.schema().fields() {
        println!(
            "- {:<30} | {:<32} | nulls: {}",
            field.name(),
            field.data_type().to_string(),
            batch
                .column_by_name(field.name())
                .and_then(|c| c.logical_nulls())
                .map(|n| n.null_count())
                .unwrap_or(0)
        );
    }
    println!();

    // 3) District index, for the partitioned table
    if table == config.partitioned_table {
        match warehouse.read_index(table, &config.district_index)? {
            Some(index) => println!(
                "Index {} on {}: {} keys over {} rows",
                index.name,
                index.column,
                index.len(),
                index.row_count
            ),
            None => println!("Index {}: <none>", config.district_index),
        }
    }
    Ok(())
}
