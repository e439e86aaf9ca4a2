// src/utils/table.rs: Per-stage CSV tables keyed by sample id

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::config::defs::{PipelineError, TableSchema, SAMPLE_ID};


/// Rows of a stage CSV keyed by `SAMPLE_ID`. Cell values are kept as written;
/// empty cells are `None`. An empty table means the stage did not execute.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<String, Vec<Option<String>>>,
}

impl StageTable {
    /// Table with the schema's header but no rows.
    pub fn empty(schema: &TableSchema) -> Self {
        let columns = schema
            .columns
            .iter()
            .filter(|c| **c != schema.sample_id_col)
            .map(|c| c.to_string())
            .collect();
        StageTable {
            name: schema.name.to_string(),
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Parses CSV content, checks its header against `schema` and keys rows by
    /// the schema's sample id column.
    pub fn from_reader<R: Read>(reader: R, schema: &TableSchema) -> Result<Self, PipelineError> {
        let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
        let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.to_string()).collect();
        check_csv_columns(&headers, schema.columns, schema.name)?;

        let id_idx = headers
            .iter()
            .position(|h| h == schema.sample_id_col)
            .ok_or_else(|| PipelineError::SchemaMismatch {
                table: schema.name.to_string(),
                missing: vec![schema.sample_id_col.to_string()],
                unexpected: Vec::new(),
            })?;

        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut rows = BTreeMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let sample_id = record.get(id_idx).unwrap_or_default().to_string();
            let values: Vec<Option<String>> = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != id_idx)
                .map(|(_, v)| if v.is_empty() { None } else { Some(v.to_string()) })
                .collect();
            if rows.insert(sample_id.clone(), values).is_some() {
                return Err(PipelineError::DuplicateSample {
                    table: schema.name.to_string(),
                    sample: sample_id,
                });
            }
        }

        Ok(StageTable {
            name: schema.name.to_string(),
            columns,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Attribute columns, `SAMPLE_ID` excluded.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, sample_id: &str) -> bool {
        self.rows.contains_key(sample_id)
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn row(&self, sample_id: &str) -> Option<&[Option<String>]> {
        self.rows.get(sample_id).map(|v| v.as_slice())
    }

    /// Value of `column` for `sample_id`. `None` when the sample, the column or
    /// the cell is missing.
    pub fn value(&self, sample_id: &str, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(sample_id)?.get(idx)?.as_deref()
    }
}


/// Compares the header found in a CSV with the expected one. Order is ignored.
///
/// # Arguments
///
/// * `found` - Column names read from the file.
/// * `expected` - Column names the file must have.
/// * `table` - Table name for the error message.
///
/// # Returns
/// Ok if both sets are equal, SchemaMismatch naming missing and unexpected columns otherwise.
pub fn check_csv_columns(found: &[String], expected: &[&str], table: &str) -> Result<(), PipelineError> {
    let found_set: BTreeSet<&str> = found.iter().map(|c| c.as_str()).collect();
    let expected_set: BTreeSet<&str> = expected.iter().copied().collect();

    if found_set == expected_set && found_set.len() == found.len() {
        return Ok(());
    }

    let missing: Vec<String> = expected_set.difference(&found_set).map(|c| c.to_string()).collect();
    let mut unexpected: Vec<String> = found_set.difference(&expected_set).map(|c| c.to_string()).collect();
    // repeated header names
    let mut seen = BTreeSet::new();
    for col in found {
        if !seen.insert(col.as_str()) {
            unexpected.push(col.clone());
        }
    }

    Err(PipelineError::SchemaMismatch {
        table: table.to_string(),
        missing,
        unexpected,
    })
}


/// Loads a stage CSV. Without a path, returns a table with the expected header
/// and no rows, meaning the stage did not execute.
///
/// # Arguments
///
/// * `path` - Optional path to the stage CSV.
/// * `schema` - Expected header and sample id column.
///
/// # Returns
/// StageTable keyed by SAMPLE_ID.
pub async fn load_stage_table(path: Option<&Path>, schema: &TableSchema) -> Result<StageTable, PipelineError> {
    match path {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            let table = StageTable::from_reader(bytes.as_slice(), schema)?;
            debug!("Loaded {} rows from {} table {}", table.len(), schema.name, path.display());
            Ok(table)
        }
        None => {
            debug!("No {} table given, stage treated as not executed", schema.name);
            Ok(StageTable::empty(schema))
        }
    }
}


/// Reads the sample ids of the analysis run from the metadata CSV.
/// Only the `SAMPLE_ID` column is required; other columns are ignored.
///
/// # Returns
/// Sample ids sorted ascending.
pub fn read_sample_ids<R: Read>(reader: R) -> Result<Vec<String>, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
    let id_idx = csv_reader
        .headers()?
        .iter()
        .position(|h| h == SAMPLE_ID)
        .ok_or_else(|| PipelineError::SchemaMismatch {
            table: "metadata".to_string(),
            missing: vec![SAMPLE_ID.to_string()],
            unexpected: Vec::new(),
        })?;

    let mut sample_ids = BTreeSet::new();
    for record in csv_reader.records() {
        let record = record?;
        let sample_id = record.get(id_idx).unwrap_or_default().to_string();
        if !sample_ids.insert(sample_id.clone()) {
            return Err(PipelineError::DuplicateSample {
                table: "metadata".to_string(),
                sample: sample_id,
            });
        }
    }
    Ok(sample_ids.into_iter().collect())
}

pub async fn load_sample_ids(path: &Path) -> Result<Vec<String>, PipelineError> {
    let bytes = tokio::fs::read(path).await?;
    read_sample_ids(bytes.as_slice())
}
