use std::path::Path;

use serde_json::Value;

use crate::error::{CovError, Result};
use crate::file::FileCoverage;
use crate::map::CoverageMap;

/// Parse one raw coverage document: either a `{ path: FileCoverage }` map
/// (`coverage-final.json`) or a single FileCoverage object.
pub fn parse_document(content: &[u8]) -> Result<CoverageMap> {
    let value: Value = serde_json::from_slice(content)?;
    let is_single_file = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("path") && obj.contains_key("statementMap"));
    if is_single_file {
        let fc: FileCoverage = serde_json::from_value(value)?;
        return Ok(CoverageMap::from_iter([fc]));
    }
    let json = serde_json::to_string(&value)?;
    CoverageMap::from_json(&json)
}

/// Read a raw coverage snapshot from disk.
pub fn read_file(file_path: &Path) -> Result<CoverageMap> {
    let content = std::fs::read(file_path)?;
    parse_document(&content).map_err(|e| {
        CovError::InvalidInput(format!("{}: {e}", file_path.display()))
    })
}

/// Read every snapshot and merge them into one map.
pub fn ingest<P: AsRef<Path>>(files: &[P]) -> Result<CoverageMap> {
    let mut map = CoverageMap::new();
    for file in files {
        let file = file.as_ref();
        let snapshot = read_file(file)?;
        tracing::debug!("{}: {} files", file.display(), snapshot.len());
        map.merge(&snapshot)
            .map_err(|e| CovError::InvalidInput(format!("{}: {e}", file.display())))?;
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: &str = r#"{
        "path": "/src/a.js",
        "statementMap": {"0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 9}}},
        "fnMap": {}, "branchMap": {},
        "s": {"0": 2}, "f": {}, "b": {}
    }"#;

    #[test]
    fn test_parse_single_file_document() {
        let map = parse_document(SINGLE.as_bytes()).unwrap();
        assert_eq!(map.files(), vec!["/src/a.js"]);
    }

    #[test]
    fn test_parse_map_document() {
        let doc = format!(r#"{{"/src/a.js": {SINGLE}}}"#);
        let map = parse_document(doc.as_bytes()).unwrap();
        assert_eq!(map.file_coverage_for("/src/a.js").unwrap().s[&0], 2);
    }

    #[test]
    fn test_ingest_merges_and_names_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.json");
        let second = dir.path().join("two.json");
        std::fs::write(&first, SINGLE).unwrap();
        std::fs::write(&second, SINGLE).unwrap();

        let map = ingest(&[&first, &second]).unwrap();
        assert_eq!(map.file_coverage_for("/src/a.js").unwrap().s[&0], 4);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ nope").unwrap();
        let err = ingest(&[&first, &bad]).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
