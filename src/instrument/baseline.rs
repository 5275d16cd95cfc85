use serde_json::Value;

use crate::error::Result;
use crate::map::CoverageMap;

use super::{Instrument, InstrumentOutput};

/// Wraps an instrumenter and keeps a zero-hit copy of every file it
/// instruments, so files that are loaded but never run still show up in
/// reports. The copies carry the `all` marker and give way to real data
/// on merge.
#[derive(Debug)]
pub struct BaselineCollector<I> {
    inner: I,
    baseline: CoverageMap,
}

impl<I: Instrument> BaselineCollector<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            baseline: CoverageMap::new(),
        }
    }

    pub fn baseline(&self) -> &CoverageMap {
        &self.baseline
    }

    pub fn into_baseline(self) -> CoverageMap {
        self.baseline
    }
}

impl<I: Instrument> Instrument for BaselineCollector<I> {
    fn instrument_sync(
        &mut self,
        code: &str,
        filename: &str,
        input_source_map: Option<&Value>,
    ) -> Result<InstrumentOutput> {
        let output = self.inner.instrument_sync(code, filename, input_source_map)?;
        let mut baseline = output.coverage.clone();
        baseline.reset_hits();
        baseline.all = true;
        self.baseline.add_file_coverage(baseline)?;
        Ok(output)
    }
}
