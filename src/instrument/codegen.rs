//! Generated text: counter expressions, the per-file registration block,
//! and reading that block back out of already-instrumented code.

use std::sync::LazyLock;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tree_sitter::Node;

use crate::error::Result;
use crate::file::FileCoverage;

use super::options::InstrumentOptions;

/// Marker embedded in every registration block. Input that already
/// carries it is returned as is.
pub static COVERAGE_SCHEMA: LazyLock<String> = LazyLock::new(|| {
    sha256_hex(
        format!(
            "{}@{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION_MAJOR")
        )
        .as_bytes(),
    )
});

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Per-file accessor function name, stable for a given path.
pub fn coverage_function_name(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    // First 48 bits of the digest.
    let n = digest
        .iter()
        .take(6)
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    format!("cov_{}", to_base36(n))
}

/// Counter expressions for one file.
#[derive(Debug, Clone)]
pub struct Counters {
    func: String,
}

impl Counters {
    pub fn new(func: String) -> Self {
        Self { func }
    }

    pub fn statement(&self, id: u32) -> String {
        format!("{}().s[{id}]++", self.func)
    }

    pub fn function(&self, id: u32) -> String {
        format!("{}().f[{id}]++", self.func)
    }

    pub fn branch(&self, id: u32, outcome: usize) -> String {
        format!("{}().b[{id}][{outcome}]++", self.func)
    }
}

/// The object literal stored in the registration block: the coverage
/// skeleton plus `_coverageSchema` and `hash`. Returns it with the hash.
pub fn coverage_data(coverage: &FileCoverage) -> Result<(Value, String)> {
    let mut data = match serde_json::to_value(coverage)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.insert(
        "_coverageSchema".to_string(),
        Value::String(COVERAGE_SCHEMA.clone()),
    );
    let hash = sha256_hex(serde_json::to_string(&data)?.as_bytes());
    data.insert("hash".to_string(), Value::String(hash.clone()));
    Ok((Value::Object(data), hash))
}

/// The block placed at the top of an instrumented file. It registers the
/// file's coverage object under `opts.coverage_variable` on first use,
/// replacing an entry whose hash differs, and then rebinds the accessor
/// function to return that object directly.
pub fn registration_block(
    func: &str,
    path: &str,
    hash: &str,
    data: &Value,
    opts: &InstrumentOptions,
) -> Result<String> {
    let global = if opts.coverage_global_scope_func {
        format!(
            "new Function({})()",
            serde_json::to_string(&format!("return {}", opts.coverage_global_scope))?
        )
    } else {
        opts.coverage_global_scope.clone()
    };
    let data = if opts.compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };

    let body = [
        format!("var path = {};", serde_json::to_string(path)?),
        format!("var hash = {};", serde_json::to_string(hash)?),
        format!("var global = {global};"),
        format!(
            "var gcv = {};",
            serde_json::to_string(&opts.coverage_variable)?
        ),
        format!("var coverageData = {data};"),
        "var coverage = global[gcv] || (global[gcv] = {});".to_string(),
        "if (!coverage[path] || coverage[path].hash !== hash) {".to_string(),
        "coverage[path] = coverageData;".to_string(),
        "}".to_string(),
        "var actualCoverage = coverage[path];".to_string(),
        format!("{func} = function () {{ return actualCoverage; }};"),
        "return actualCoverage;".to_string(),
    ];

    Ok(if opts.compact {
        format!("function {func}() {{{}}}{func}();", body.join(""))
    } else {
        let indented: Vec<String> = body.iter().map(|line| format!("  {line}")).collect();
        format!(
            "function {func}() {{\n{}\n}}\n{func}();\n",
            indented.join("\n")
        )
    })
}

/// Coverage embedded by a previous run, with its hash.
#[derive(Debug, Clone)]
pub struct EmbeddedCoverage {
    pub coverage: FileCoverage,
    pub hash: String,
}

/// Look for a top-level registration block carrying our schema marker and
/// deserialize its `coverageData` literal.
pub fn read_embedded_coverage(root: Node<'_>, src: &str) -> Option<EmbeddedCoverage> {
    let mut cursor = root.walk();
    let functions: Vec<Node> = root
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "function_declaration")
        .collect();
    functions
        .into_iter()
        .find_map(|func| embedded_in_function(func, src))
}

fn embedded_in_function(func: Node<'_>, src: &str) -> Option<EmbeddedCoverage> {
    let body = func.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let declarations: Vec<Node> = body
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "variable_declaration")
        .collect();
    for decl in declarations {
        let mut inner = decl.walk();
        for declarator in decl.named_children(&mut inner) {
            let name = declarator.child_by_field_name("name");
            let value = declarator.child_by_field_name("value");
            let (Some(name), Some(value)) = (name, value) else {
                continue;
            };
            if &src[name.byte_range()] != "coverageData" || value.kind() != "object" {
                continue;
            }
            let data: Value = serde_json::from_str(&src[value.byte_range()]).ok()?;
            if data.get("_coverageSchema").and_then(Value::as_str) != Some(COVERAGE_SCHEMA.as_str())
            {
                return None;
            }
            let hash = data.get("hash").and_then(Value::as_str)?.to_string();
            let coverage: FileCoverage = serde_json::from_value(data).ok()?;
            return Some(EmbeddedCoverage { coverage, hash });
        }
    }
    None
}
