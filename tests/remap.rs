mod common;

use base64::Engine as _;
use jscov::instrument::{CoverageRegistry, Instrument, InstrumentOptions, Instrumenter};
use jscov::map::CoverageMap;
use jscov::remap::MapStore;
use pretty_assertions::assert_eq;
use serde_json::json;

const GENERATED: &str = "a();\nb();\n";

/// Generated line 1 comes from app.ts line 1, generated line 2 from line 3.
fn source_map() -> serde_json::Value {
    json!({
        "version": 3,
        "file": "app.js",
        "sources": ["app.ts"],
        "names": [],
        "mappings": "AAAA;AAEA",
    })
}

/// Run the generated file once with only its first statement executed.
fn run(code: &str, input_source_map: Option<&serde_json::Value>) -> (CoverageMap, Option<String>) {
    let out = Instrumenter::new(InstrumentOptions::default())
        .unwrap()
        .instrument_sync(code, "/src/app.js", input_source_map)
        .unwrap();
    let mut registry = CoverageRegistry::new();
    registry.register_output(&out);
    registry.hit_statement("/src/app.js", 0).unwrap();
    (registry.to_coverage_map(), out.source_mapping_url)
}

fn assert_remapped(remapped: &CoverageMap) {
    assert_eq!(remapped.files(), vec!["/src/app.ts"]);
    let fc = remapped.file_coverage_for("/src/app.ts").unwrap();
    let lines: Vec<(u32, u64)> = fc.line_coverage().into_iter().collect();
    assert_eq!(lines, vec![(1, 1), (3, 0)]);
    assert_eq!(fc.uncovered_lines(), vec![3]);
}

#[test]
fn remap_through_input_source_map() {
    let map = source_map();
    let (coverage, _) = run(GENERATED, Some(&map));

    let remapped = MapStore::new().transform_coverage(&coverage);
    assert_remapped(&remapped);
}

#[test]
fn remap_through_inline_data_url() {
    let encoded = base64::engine::general_purpose::STANDARD.encode(source_map().to_string());
    let code = format!("{GENERATED}//# sourceMappingURL=data:application/json;base64,{encoded}\n");
    let (coverage, url) = run(&code, None);

    let mut store = MapStore::new();
    store.register_url("/src/app.js", &url.unwrap());
    assert_remapped(&store.transform_coverage(&coverage));
}

#[test]
fn remap_through_map_file_and_cli() {
    let dir = tempfile::tempdir().unwrap();
    let generated = dir.path().join("app.js");
    let generated = generated.to_string_lossy().into_owned();
    std::fs::write(format!("{generated}.map"), source_map().to_string()).unwrap();

    let out = common::instrument(GENERATED, &generated);
    let mut registry = CoverageRegistry::new();
    registry.register_output(&out);
    registry.hit_statement(&generated, 0).unwrap();
    let raw = dir.path().join("coverage-final.json");
    std::fs::write(&raw, registry.to_json().unwrap()).unwrap();

    let remapped_path = dir.path().join("remapped.json");
    let summary = jscov::cli::cmd_remap(&[raw], &remapped_path).unwrap();
    assert!(summary.contains("Remapped 1 files onto 1 sources"));

    let remapped =
        CoverageMap::from_json(&std::fs::read_to_string(&remapped_path).unwrap()).unwrap();
    let expected = dir.path().join("app.ts");
    let fc = remapped
        .file_coverage_for(&expected.to_string_lossy())
        .unwrap();
    assert_eq!(fc.s.values().copied().collect::<Vec<_>>(), vec![1, 0]);
}

#[test]
fn files_without_maps_are_untouched() {
    let (coverage, _) = run(GENERATED, None);
    let remapped = MapStore::new().transform_coverage(&coverage);
    assert_eq!(remapped, coverage);
}
