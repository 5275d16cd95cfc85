//! Rewrites coverage recorded against generated files onto the original
//! sources their source maps point at.

use indexmap::IndexMap;

use crate::file::FileCoverage;
use crate::map::CoverageMap;

use super::consumer::SourceMapConsumer;
use super::mapped::MappedCoverage;
use super::mapping::get_mapping;

/// Key that treats `a/b.ts` and `a\b.ts` as the same file.
fn unique_key(path: &str) -> String {
    path.replace('\\', "/")
}

#[derive(Default)]
struct MappedFiles {
    files: IndexMap<String, MappedCoverage>,
}

impl MappedFiles {
    fn get(&mut self, path: &str) -> &mut MappedCoverage {
        self.files
            .entry(unique_key(path))
            .or_insert_with(|| MappedCoverage::new(path))
    }

    /// Pass `fc` through untouched, or fold it into coverage already
    /// mapped onto the same path.
    fn pass_through(&mut self, fc: &FileCoverage) {
        let key = unique_key(fc.path());
        let Some(mapped) = self.files.get_mut(&key) else {
            self.files
                .insert(key, MappedCoverage::from_file_coverage(fc.clone()));
            return;
        };
        for (id, loc) in &fc.statement_map {
            mapped.add_statement(*loc, fc.s.get(id).copied().unwrap_or(0));
        }
        for (id, meta) in &fc.fn_map {
            let hits = fc.f.get(id).copied().unwrap_or(0);
            mapped.add_function(&meta.name, meta.decl, meta.loc, hits);
        }
        for (id, meta) in &fc.branch_map {
            let loc = meta.loc.or_else(|| meta.locations.first().copied());
            let (Some(loc), Some(hits)) = (loc, fc.b.get(id)) else {
                continue;
            };
            mapped.add_branch(meta.kind, loc, meta.locations.clone(), hits);
        }
    }
}

/// Remap every entry of `fc` through `map`. Returns how many entries
/// found a home in an original source.
fn process_file<C: SourceMapConsumer + ?Sized>(
    fc: &FileCoverage,
    map: &C,
    out: &mut MappedFiles,
) -> usize {
    let mut changes = 0;
    let generated_file = fc.path();

    for (id, loc) in &fc.statement_map {
        let Some(mapping) = get_mapping(map, loc, generated_file) else {
            continue;
        };
        let hits = fc.s.get(id).copied().unwrap_or(0);
        out.get(&mapping.source).add_statement(mapping.loc, hits);
        changes += 1;
    }

    for (id, meta) in &fc.fn_map {
        let decl = get_mapping(map, &meta.decl, generated_file);
        let span = get_mapping(map, &meta.loc, generated_file);
        let (Some(decl), Some(span)) = (decl, span) else {
            continue;
        };
        if decl.source != span.source {
            continue;
        }
        let hits = fc.f.get(id).copied().unwrap_or(0);
        out.get(&decl.source)
            .add_function(&meta.name, decl.loc, span.loc, hits);
        changes += 1;
    }

    for (id, meta) in &fc.branch_map {
        let Some(hits) = fc.b.get(id) else {
            continue;
        };
        // Every outcome has to map, and into one source.
        let outcomes: Option<Vec<_>> = meta
            .locations
            .iter()
            .map(|loc| get_mapping(map, loc, generated_file))
            .collect();
        let Some(outcomes) = outcomes.filter(|o| !o.is_empty()) else {
            continue;
        };
        let source = outcomes[0].source.clone();
        if outcomes.iter().any(|o| o.source != source) {
            continue;
        }
        let loc = meta
            .loc
            .and_then(|loc| get_mapping(map, &loc, generated_file))
            .filter(|m| m.source == source)
            .map_or(outcomes[0].loc, |m| m.loc);
        let locations = outcomes.into_iter().map(|o| o.loc).collect();
        out.get(&source).add_branch(meta.kind, loc, locations, hits);
        changes += 1;
    }

    changes
}

/// Remap `coverage` using the source map `finder` returns for each file.
/// Files without a map are carried over as they are.
pub fn transform<C, F>(coverage: &CoverageMap, mut finder: F) -> CoverageMap
where
    C: SourceMapConsumer,
    F: FnMut(&FileCoverage) -> Option<C>,
{
    let mut out = MappedFiles::default();
    for fc in coverage.iter() {
        match finder(fc) {
            Some(map) => {
                if process_file(fc, &map, &mut out) == 0 {
                    tracing::debug!("{}: nothing could be mapped", fc.path());
                }
            }
            None => out.pass_through(fc),
        }
    }
    out.files
        .into_values()
        .map(MappedCoverage::into_file_coverage)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::BranchType;
    use crate::location::{Location, Position};
    use crate::remap::consumer::SourceMapIndex;

    fn loc(sl: u32, sc: i64, el: u32, ec: i64) -> Location {
        Location::new(Position::new(sl, sc), Position::new(el, ec))
    }

    // gen 1:0 -> a.ts 1:0, gen 1:4 -> a.ts 1:6, gen 1:8 -> a.ts 1:12,
    // gen 1:12 -> b.ts 1:0
    fn source_map() -> SourceMapIndex {
        SourceMapIndex::from_value(&serde_json::json!({
            "version": 3,
            "sources": ["a.ts", "b.ts"],
            "names": [],
            "mappings": "AAAA,IAAM,IAAM,ICAZ",
        }))
        .unwrap()
    }

    fn generated() -> FileCoverage {
        let mut fc = FileCoverage::new("/out/bundle.js");
        fc.statement_map.insert(0, loc(1, 0, 1, 4));
        fc.statement_map.insert(1, loc(1, 4, 1, 8));
        fc.statement_map.insert(2, loc(5, 0, 5, 3));
        fc.s.insert(0, 2);
        fc.s.insert(1, 0);
        fc.s.insert(2, 9);
        fc
    }

    #[test]
    fn test_statements_move_to_original_source() {
        let out = transform(&CoverageMap::from_iter([generated()]), |_| Some(source_map()));
        assert_eq!(out.files(), vec!["/out/a.ts"]);
        let fc = out.file_coverage_for("/out/a.ts").unwrap();
        assert_eq!(fc.statement_map[&0], loc(1, 0, 1, 6));
        assert_eq!(fc.statement_map[&1], loc(1, 6, 1, 12));
        assert_eq!(fc.s[&0], 2);
        // Line 5 has no mappings.
        assert_eq!(fc.s.len(), 2);
    }

    #[test]
    fn test_branch_across_sources_is_dropped() {
        let mut fc = FileCoverage::new("/out/bundle.js");
        fc.branch_map.insert(
            0,
            crate::file::BranchMapping {
                loc: None,
                kind: BranchType::If,
                locations: vec![loc(1, 0, 1, 4), loc(1, 12, 1, 14)],
                line: None,
            },
        );
        fc.b.insert(0, vec![1, 1]);
        fc.branch_map.insert(
            1,
            crate::file::BranchMapping {
                loc: None,
                kind: BranchType::BinaryExpr,
                locations: vec![loc(1, 0, 1, 4), loc(1, 4, 1, 8)],
                line: None,
            },
        );
        fc.b.insert(1, vec![3, 0]);

        let out = transform(&CoverageMap::from_iter([fc]), |_| Some(source_map()));
        let a = out.file_coverage_for("/out/a.ts").unwrap();
        assert_eq!(a.b.len(), 1);
        assert_eq!(a.b[&0], vec![3, 0]);
        assert_eq!(a.branch_map[&0].kind, BranchType::BinaryExpr);
        assert_eq!(a.branch_map[&0].loc, Some(loc(1, 0, 1, 6)));
    }

    #[test]
    fn test_files_without_map_pass_through() {
        let plain = FileCoverage::new("/src/plain.js");
        let out = transform(
            &CoverageMap::from_iter([generated(), plain.clone()]),
            |fc: &FileCoverage| (fc.path() == "/out/bundle.js").then(source_map),
        );
        assert_eq!(out.files(), vec!["/out/a.ts", "/src/plain.js"]);
        assert_eq!(out.file_coverage_for("/src/plain.js").unwrap(), &plain);
    }

    #[test]
    fn test_unique_key_ignores_separator_style() {
        assert_eq!(unique_key("a/b\\c.ts"), "a/b/c.ts");
        assert_ne!(unique_key("/src/a_b.js"), unique_key("/src/a/b.js"));
    }

    #[test]
    fn test_underscores_do_not_collide_with_directories() {
        let mut flat = FileCoverage::new("/src/a_b.js");
        flat.statement_map.insert(0, loc(1, 0, 1, 4));
        flat.s.insert(0, 1);
        let mut nested = FileCoverage::new("/src/a/b.js");
        nested.statement_map.insert(0, loc(1, 0, 1, 4));
        nested.s.insert(0, 5);

        let out = transform(
            &CoverageMap::from_iter([flat.clone(), nested.clone()]),
            |_: &FileCoverage| None::<SourceMapIndex>,
        );
        assert_eq!(out.files(), vec!["/src/a_b.js", "/src/a/b.js"]);
        assert_eq!(out.file_coverage_for("/src/a_b.js").unwrap(), &flat);
        assert_eq!(out.file_coverage_for("/src/a/b.js").unwrap(), &nested);
    }
}
