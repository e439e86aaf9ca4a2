// src/pipelines/results.rs: Merged per-sample results table

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};

use crate::config::defs::{
    PipelineError, Stage, COLUMNS_TO_REMOVE_FROM_RESULTS_FILE, COLUMNS_TO_RENAME_IN_RESULTS_FILE, SAMPLE_ID, STATUS,
    STATUS_COMPLETED, STATUS_FAILED,
};
use crate::pipelines::cascade::{SampleSet, StageTables};


/// Column transforms applied to the merged table, checked once against the
/// declared stage schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSchema {
    renames: Vec<(String, String)>,
    drops: Vec<String>,
}

impl ReportSchema {
    pub fn new() -> Result<Self, PipelineError> {
        Self::with_transforms(
            COLUMNS_TO_RENAME_IN_RESULTS_FILE.clone(),
            COLUMNS_TO_REMOVE_FROM_RESULTS_FILE.iter().map(|c| c.to_string()).collect(),
        )
    }

    /// # Arguments
    ///
    /// * `renames` - (source, target) pairs; every source must be a stage column.
    /// * `drops` - Columns removed after renaming.
    pub fn with_transforms(renames: Vec<(String, String)>, drops: Vec<String>) -> Result<Self, PipelineError> {
        let declared: BTreeSet<&str> = Stage::ALL
            .iter()
            .flat_map(|stage| {
                let schema = stage.schema();
                schema.columns.iter().copied().filter(move |c| *c != schema.sample_id_col)
            })
            .collect();

        let mut sources = BTreeSet::new();
        for (source, _) in &renames {
            if !declared.contains(source.as_str()) {
                return Err(PipelineError::InvalidConfig(format!("rename source '{}' is not a stage column", source)));
            }
            if !sources.insert(source.as_str()) {
                return Err(PipelineError::InvalidConfig(format!("column '{}' is renamed twice", source)));
            }
        }

        // a target may reuse a declared name only if that column is itself renamed
        let mut targets = BTreeSet::new();
        for (_, target) in &renames {
            if !targets.insert(target.as_str()) || (declared.contains(target.as_str()) && !sources.contains(target.as_str())) {
                return Err(PipelineError::InvalidConfig(format!("rename target '{}' collides with another column", target)));
            }
        }

        for col in &drops {
            if !targets.contains(col.as_str()) && !declared.contains(col.as_str()) {
                return Err(PipelineError::InvalidConfig(format!("dropped column '{}' is never produced", col)));
            }
        }

        Ok(ReportSchema { renames, drops })
    }
}


/// Header plus rows, sample id included as a regular column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultsTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell of the row whose `key_column` equals `key`.
    #[cfg(test)]
    pub fn value(&self, key_column: &str, key: &str, column: &str) -> Option<&str> {
        let key_idx = self.index_of(key_column)?;
        let idx = self.index_of(column)?;
        self.rows
            .iter()
            .find(|row| row[key_idx].as_deref() == Some(key))
            .and_then(|row| row[idx].as_deref())
    }

    /// Outer join on sample id of a status table with every stage table, in
    /// pipeline order. Rows are sorted by sample id; unmatched cells are null.
    ///
    /// # Arguments
    ///
    /// * `population` - All samples of the analysis run.
    /// * `tables` - The stage tables.
    /// * `failed_samples` - Samples whose status is Failed.
    ///
    /// # Returns
    /// ResultsTable with SAMPLE_ID, STATUS, then every stage column.
    pub fn merge(population: &[String], tables: &StageTables, failed_samples: &SampleSet) -> Result<Self, PipelineError> {
        let mut columns = vec![SAMPLE_ID.to_string(), STATUS.to_string()];
        for table in tables.in_order() {
            for col in table.columns() {
                if columns.contains(col) {
                    return Err(PipelineError::ColumnOperation {
                        operation: format!("merge {} table on", table.name()),
                        column: col.clone(),
                    });
                }
                columns.push(col.clone());
            }
        }

        let in_population: SampleSet = population.iter().cloned().collect();
        let mut sample_ids = in_population.clone();
        for table in tables.in_order() {
            for id in table.sample_ids() {
                if sample_ids.insert(id.clone()) {
                    warn!("Sample {} in {} table is not part of the analysis run", id, table.name());
                }
            }
        }

        let rows = sample_ids
            .iter()
            .map(|id| {
                let status = if !in_population.contains(id) {
                    None
                } else if failed_samples.contains(id) {
                    Some(STATUS_FAILED.to_string())
                } else {
                    Some(STATUS_COMPLETED.to_string())
                };
                let mut row = vec![Some(id.clone()), status];
                for table in tables.in_order() {
                    match table.row(id) {
                        Some(values) => row.extend(values.iter().cloned()),
                        None => row.extend(std::iter::repeat_n(None, table.columns().len())),
                    }
                }
                row
            })
            .collect();

        Ok(ResultsTable { columns, rows })
    }

    /// Renames are resolved against the current header in one pass, so chains
    /// such as `a -> b, b -> c` rename two distinct columns.
    pub fn rename_columns(&mut self, renames: &[(String, String)]) -> Result<(), PipelineError> {
        let indices = renames
            .iter()
            .map(|(source, _)| {
                self.index_of(source).ok_or_else(|| PipelineError::ColumnOperation {
                    operation: "rename".to_string(),
                    column: source.clone(),
                })
            })
            .collect::<Result<Vec<usize>, PipelineError>>()?;
        for (idx, (_, target)) in indices.into_iter().zip(renames) {
            self.columns[idx] = target.clone();
        }
        Ok(())
    }

    pub fn drop_columns(&mut self, drops: &[String]) -> Result<(), PipelineError> {
        for col in drops {
            let idx = self.index_of(col).ok_or_else(|| PipelineError::ColumnOperation {
                operation: "drop".to_string(),
                column: col.clone(),
            })?;
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        Ok(())
    }

    pub fn uppercase_headers(&mut self) {
        for col in &mut self.columns {
            *col = col.to_uppercase();
        }
    }

    /// Moves `column` to the front; the other columns keep their order.
    pub fn move_to_front(&mut self, column: &str) -> Result<(), PipelineError> {
        let idx = self.index_of(column).ok_or_else(|| PipelineError::ColumnOperation {
            operation: "move".to_string(),
            column: column.to_string(),
        })?;
        let col = self.columns.remove(idx);
        self.columns.insert(0, col);
        for row in &mut self.rows {
            let value = row.remove(idx);
            row.insert(0, value);
        }
        Ok(())
    }

    /// CSV with header, no index column, nulls as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PipelineError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}


/// Builds the report: merge, rename, drop file columns, upper case headers and
/// sample id first.
pub fn generate_results_table(
    population: &[String],
    tables: &StageTables,
    failed_samples: &SampleSet,
    schema: &ReportSchema,
) -> Result<ResultsTable, PipelineError> {
    let mut table = ResultsTable::merge(population, tables, failed_samples)?;
    table.rename_columns(&schema.renames)?;
    table.drop_columns(&schema.drops)?;
    table.uppercase_headers();
    table.move_to_front(SAMPLE_ID)?;
    debug!("Results table: {} rows, columns {:?}", table.len(), table.columns());
    Ok(table)
}

pub async fn write_results_csv(table: &ResultsTable, path: &Path) -> Result<(), PipelineError> {
    let mut buffer = Vec::new();
    table.write_csv(&mut buffer)?;
    tokio::fs::write(path, buffer).await?;
    Ok(())
}
