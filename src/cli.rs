//! Command handler functions for the jscov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ingest;
use crate::instrument::{Instrument, InstrumentOptions, Instrumenter};
use crate::remap::MapStore;
use crate::report::{format_line_ranges, TextSummary};
use crate::tree::{Summarizer, SummarizerKind};

fn write_output(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn cmd_instrument(
    file: &Path,
    output: Option<&Path>,
    coverage_out: Option<&Path>,
    opts: InstrumentOptions,
) -> Result<String> {
    let code =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file.to_string_lossy();
    let mut instrumenter = Instrumenter::new(opts)?;
    let code = std::str::from_utf8(&code)
        .with_context(|| format!("{} is not valid UTF-8", file.display()))?;
    let result = instrumenter.instrument_sync(code, &filename, None)?;

    let mut out = String::new();
    match output {
        Some(path) => {
            write_output(path, &result.code)?;
            writeln!(out, "Instrumented {} → {}", file.display(), path.display())?;
        }
        None => out.push_str(&result.code),
    }
    if let Some(path) = coverage_out {
        let json = serde_json::to_string_pretty(&result.coverage)?;
        write_output(path, &json)?;
        if output.is_some() {
            writeln!(out, "Coverage skeleton written to {}", path.display())?;
        }
    }
    if let (Some(url), Some(_)) = (&result.source_mapping_url, output) {
        writeln!(out, "Source map: {url}")?;
    }
    Ok(out)
}

pub fn cmd_merge(files: &[PathBuf], output: &Path) -> Result<String> {
    let map = ingest::ingest(files)?;
    write_output(output, &serde_json::to_string(&map)?)?;
    Ok(format!(
        "Merged {} snapshots ({} files) into {}\n",
        files.len(),
        map.len(),
        output.display()
    ))
}

pub fn cmd_summary(files: &[PathBuf], kind: SummarizerKind) -> Result<String> {
    let map = ingest::ingest(files)?;
    let tree = Summarizer::new(&map).tree(kind);
    let mut report = TextSummary::new();
    tree.visit(&mut report);
    Ok(report.into_output())
}

pub fn cmd_uncovered(files: &[PathBuf], source_file: &str) -> Result<String> {
    let map = ingest::ingest(files)?;
    let fc = map.file_coverage_for(source_file)?;
    let uncovered = fc.uncovered_lines();

    if uncovered.is_empty() {
        return Ok(format!(
            "All instrumentable lines are covered in '{source_file}'\n"
        ));
    }

    let instrumentable: Vec<u32> = fc.line_coverage().into_keys().collect();
    let mut out = String::new();
    writeln!(out, "Uncovered lines in '{source_file}':")?;
    writeln!(out, "  {}", format_line_ranges(&uncovered, &instrumentable))?;
    writeln!(out, "  ({} lines)", uncovered.len())?;
    Ok(out)
}

/// Remap onto original sources. A `<file>.map` next to a generated file is
/// used when present, otherwise the file's embedded `inputSourceMap`.
pub fn cmd_remap(files: &[PathBuf], output: &Path) -> Result<String> {
    let map = ingest::ingest(files)?;
    let mut store = MapStore::new();
    for path in map.files() {
        let sibling = PathBuf::from(format!("{path}.map"));
        if sibling.is_file() {
            if let Some(name) = sibling.file_name().and_then(|n| n.to_str()) {
                store.register_url(path, name);
            }
        }
    }

    let remapped = store.transform_coverage(&map);
    write_output(output, &serde_json::to_string(&remapped)?)?;
    Ok(format!(
        "Remapped {} files onto {} sources into {}\n",
        map.len(),
        remapped.len(),
        output.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{"/src/a.js": {
        "path": "/src/a.js",
        "statementMap": {
            "0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 9}},
            "1": {"start": {"line": 2, "column": 0}, "end": {"line": 2, "column": 9}},
            "2": {"start": {"line": 3, "column": 0}, "end": {"line": 3, "column": 9}}
        },
        "fnMap": {}, "branchMap": {},
        "s": {"0": 1, "1": 0, "2": 0}, "f": {}, "b": {}
    }}"#;

    fn seed(dir: &Path) -> PathBuf {
        let path = dir.join("coverage-final.json");
        std::fs::write(&path, RAW).unwrap();
        path
    }

    #[test]
    fn test_cmd_summary() {
        let dir = tempfile::tempdir().unwrap();
        let raw = seed(dir.path());

        let out = cmd_summary(&[raw], SummarizerKind::Flat).unwrap();

        assert!(out.contains("All files"));
        assert!(out.contains("a.js"));
        assert!(out.contains("33.33"));
    }

    #[test]
    fn test_cmd_uncovered() {
        let dir = tempfile::tempdir().unwrap();
        let raw = seed(dir.path());

        let out = cmd_uncovered(&[raw.clone()], "/src/a.js").unwrap();
        assert!(out.contains("Uncovered lines in '/src/a.js':"));
        assert!(out.contains("2-3"));
        assert!(out.contains("2 lines"));

        assert!(cmd_uncovered(&[raw], "/src/missing.js").is_err());
    }

    #[test]
    fn test_cmd_merge_sums_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let raw = seed(dir.path());
        let merged = dir.path().join("merged.json");

        let out = cmd_merge(&[raw.clone(), raw], &merged).unwrap();
        assert!(out.contains("Merged 2 snapshots (1 files)"));

        let map = crate::map::CoverageMap::from_json(&std::fs::read_to_string(&merged).unwrap())
            .unwrap();
        assert_eq!(map.file_coverage_for("/src/a.js").unwrap().s[&0], 2);
    }

    #[test]
    fn test_cmd_instrument_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("app.js");
        std::fs::write(&src, "var a = 1;\n").unwrap();
        let out_js = dir.path().join("app.instrumented.js");
        let out_cov = dir.path().join("app.coverage.json");

        let out = cmd_instrument(
            &src,
            Some(&out_js),
            Some(&out_cov),
            InstrumentOptions::default(),
        )
        .unwrap();
        assert!(out.contains("Instrumented"));
        assert!(std::fs::read_to_string(&out_js)
            .unwrap()
            .contains("_coverageSchema"));
        let fc = crate::file::FileCoverage::from_json(&std::fs::read_to_string(&out_cov).unwrap())
            .unwrap();
        assert_eq!(fc.s.len(), 1);
    }

    #[test]
    fn test_cmd_remap_without_maps_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let raw = seed(dir.path());
        let remapped = dir.path().join("remapped.json");

        let out = cmd_remap(&[raw], &remapped).unwrap();
        assert!(out.contains("Remapped 1 files onto 1 sources"));
    }
}
