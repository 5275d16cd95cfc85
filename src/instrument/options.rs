use serde::{Deserialize, Serialize};

/// Instrumenter configuration.
///
/// Keys are camelCase so an existing `.nycrc`-style fragment deserializes
/// directly; every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentOptions {
    /// Name of the global object coverage is registered under.
    pub coverage_variable: String,
    /// Emit the registration block on a single line so source lines keep
    /// their numbers.
    pub compact: bool,
    /// Accept a top-level `return` (the loader wraps the file in a function).
    pub auto_wrap: bool,
    /// Parse with the module goal. When off, top-level `import`/`export`
    /// statements are rejected.
    pub es_modules: bool,
    /// Expression that evaluates to the global object.
    pub coverage_global_scope: String,
    /// Evaluate `coverage_global_scope` through `new Function` instead of
    /// inline, for code that runs in strict mode.
    pub coverage_global_scope_func: bool,
    /// Class method names treated as if hinted with `istanbul ignore next`.
    pub ignore_class_methods: Vec<String>,
    /// Capture (and strip) `sourceMappingURL` comments.
    pub record_source_map_url: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            coverage_variable: "__coverage__".to_string(),
            compact: true,
            auto_wrap: false,
            es_modules: false,
            coverage_global_scope: "this".to_string(),
            coverage_global_scope_func: true,
            ignore_class_methods: Vec::new(),
            record_source_map_url: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let opts: InstrumentOptions =
            serde_json::from_str(r#"{ "esModules": true, "ignoreClassMethods": ["render"] }"#)
                .unwrap();
        assert!(opts.es_modules);
        assert_eq!(opts.ignore_class_methods, vec!["render"]);
        assert_eq!(opts.coverage_variable, "__coverage__");
        assert!(opts.compact);
        assert!(opts.coverage_global_scope_func);
    }
}
