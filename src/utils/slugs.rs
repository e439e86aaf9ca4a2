// src/utils/slugs.rs: Result file naming

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};


/// A sample result file: `<sample_id><suffix>` tagged with its type and, for
/// paired reads, the read number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileType {
    pub suffix: &'static str,
    pub file_type: &'static str,
    pub read: Option<u8>,
}

impl FileType {
    pub const fn new(suffix: &'static str, file_type: &'static str) -> Self {
        FileType { suffix, file_type, read: None }
    }

    pub const fn read(suffix: &'static str, file_type: &'static str, read: u8) -> Self {
        FileType { suffix, file_type, read: Some(read) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub file: String,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub read: Option<u8>,
}

/// {sample_id: [result files]}
pub type ResultFiles = BTreeMap<String, Vec<ResultFile>>;


/// Joins path segments with '/', for local paths and object store URIs alike.
pub fn join_path(base: &str, segments: &[&str]) -> String {
    let mut path = base.trim_end_matches('/').to_string();
    for segment in segments {
        path.push('/');
        path.push_str(segment.trim_matches('/'));
    }
    path
}

/// Builds the result file entries of a sample under `output_path/inner_dirs`.
///
/// # Arguments
///
/// * `output_path` - Base output directory or URI of the analysis run.
/// * `inner_dirs` - Sub directories, in order.
/// * `filetypes` - Files to build.
/// * `sample_id` - The sample.
///
/// # Returns
/// One ResultFile per FileType.
pub fn get_file_with_type(
    output_path: &str,
    inner_dirs: &[&str],
    filetypes: &[FileType],
    sample_id: &str,
) -> Vec<ResultFile> {
    let dir = join_path(output_path, inner_dirs);
    filetypes
        .iter()
        .map(|ft| {
            let file_name = format!("{}{}", sample_id, ft.suffix);
            ResultFile {
                file: join_path(&dir, &[file_name.as_str()]),
                file_type: ft.file_type.to_string(),
                read: ft.read,
            }
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("s3://bucket/run/", &["ncov2019-artic", "output_bam"]), "s3://bucket/run/ncov2019-artic/output_bam");
        assert_eq!(join_path("/data/run", &[]), "/data/run");
    }

    #[test]
    fn test_get_file_with_type() {
        let files = get_file_with_type(
            "s3://bucket/run",
            &["fastqc"],
            &[FileType::read("_1_fastqc.zip", "fastqc-qc", 1), FileType::new(".txt", "txt-cleaned-sequence-count")],
            "S1",
        );
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file, "s3://bucket/run/fastqc/S1_1_fastqc.zip");
        assert_eq!(files[0].read, Some(1));
        assert_eq!(files[1].file_type, "txt-cleaned-sequence-count");

        let json = serde_json::to_value(&files[1]).unwrap();
        assert_eq!(json, serde_json::json!({"file": "s3://bucket/run/fastqc/S1.txt", "type": "txt-cleaned-sequence-count"}));
    }
}
