// src/utils/convert.rs: CSV to JSON conversion of written reports

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::config::defs::PipelineError;


/// Types a CSV cell: empty is null, true/false are booleans, numbers are
/// numbers, everything else stays a string.
pub fn cell_to_json(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(num) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(num);
    }
    Value::String(cell.to_string())
}

/// Converts CSV content to a JSON object keyed by the `key` column. Each entry
/// holds the other columns in header order.
///
/// # Arguments
///
/// * `reader` - CSV content with header.
/// * `key` - Column whose values key the JSON object.
///
/// # Returns
/// JSON object {key_value: {column: value}}
pub fn csv_to_json_value<R: Read>(reader: R, key: &str) -> Result<Value, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let key_idx = headers
        .iter()
        .position(|h| h == key)
        .ok_or_else(|| PipelineError::ColumnOperation {
            operation: "key JSON by".to_string(),
            column: key.to_string(),
        })?;

    let mut output = Map::new();
    for record in csv_reader.records() {
        let record = record?;
        let mut entry = Map::new();
        for (idx, (header, cell)) in headers.iter().zip(record.iter()).enumerate() {
            if idx != key_idx {
                entry.insert(header.to_string(), cell_to_json(cell));
            }
        }
        output.insert(record.get(key_idx).unwrap_or_default().to_string(), Value::Object(entry));
    }
    Ok(Value::Object(output))
}

pub async fn csv_to_json(csv_file: &Path, json_file: &Path, key: &str) -> Result<(), PipelineError> {
    let bytes = tokio::fs::read(csv_file).await?;
    let value = csv_to_json_value(bytes.as_slice(), key)?;
    write_json(&value, json_file).await
}

pub async fn write_json<T: Serialize>(data: &T, json_file: &Path) -> Result<(), PipelineError> {
    let content = serde_json::to_string_pretty(data)?;
    tokio::fs::write(json_file, content).await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_typing() {
        assert_eq!(cell_to_json(""), Value::Null);
        assert_eq!(cell_to_json("True"), json!(true));
        assert_eq!(cell_to_json("false"), json!(false));
        assert_eq!(cell_to_json("100"), json!(100));
        assert_eq!(cell_to_json("98.5"), json!(98.5));
        assert_eq!(cell_to_json("B.1.1.7"), json!("B.1.1.7"));
    }

    #[test]
    fn test_csv_to_json_keyed_by_sample() {
        let csv = "SAMPLE_ID,STATUS,NCOV_QC_PASS\nA,Completed,True\nB,Failed,\n";
        let value = csv_to_json_value(csv.as_bytes(), "SAMPLE_ID").unwrap();
        assert_eq!(
            value,
            json!({
                "A": {"STATUS": "Completed", "NCOV_QC_PASS": true},
                "B": {"STATUS": "Failed", "NCOV_QC_PASS": null},
            })
        );
        let columns: Vec<&String> = value["A"].as_object().unwrap().keys().collect();
        assert_eq!(columns, vec!["STATUS", "NCOV_QC_PASS"], "Header order should be kept");
    }

    #[test]
    fn test_csv_to_json_missing_key() {
        let result = csv_to_json_value("STATUS\nCompleted\n".as_bytes(), "SAMPLE_ID");
        assert!(matches!(result, Err(PipelineError::ColumnOperation { .. })));
    }
}
