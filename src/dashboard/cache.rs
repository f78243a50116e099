use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use tracing::debug;

use crate::processor::columnar_processor::ColumnarProcessor;
use crate::processor::{ParseSummary, ProcessorError};

/// What a loaded dataset was read from. A change in any part forces a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self, ProcessorError> {
        let path = fs::canonicalize(path)?;
        let meta = fs::metadata(&path)?;
        Ok(Self {
            path,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct Loaded {
    fingerprint: Fingerprint,
    processor: Rc<ColumnarProcessor>,
    summary: ParseSummary,
}

/// Keeps the last loaded dataset so repeated interactions skip the CSV parse.
#[derive(Debug, Default)]
pub struct DatasetCache {
    loaded: Option<Loaded>,
    loads: usize,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dataset at `path`, loading it only if it is not cached or
    /// the file changed since. The flag is `true` when a load happened.
    pub fn get_or_load(
        &mut self,
        path: &Path,
    ) -> Result<(Rc<ColumnarProcessor>, bool), ProcessorError> {
        let fingerprint = Fingerprint::of(path)?;

        if let Some(loaded) = &self.loaded {
            if loaded.fingerprint == fingerprint {
                debug!(path = %path.display(), "dataset cache hit");
                return Ok((loaded.processor.clone(), false));
            }
        }

        debug!(path = %path.display(), "dataset cache miss");
        let mut processor = ColumnarProcessor::new();
        let summary = processor.load_csv(path)?;

        let processor = Rc::new(processor);
        self.loads += 1;
        self.loaded = Some(Loaded {
            fingerprint,
            processor: processor.clone(),
            summary,
        });
        Ok((processor, true))
    }

    /// Parse summary of the cached dataset.
    pub fn summary(&self) -> Option<&ParseSummary> {
        self.loaded.as_ref().map(|l| &l.summary)
    }

    /// How many times a CSV was actually parsed.
    pub fn loads(&self) -> usize {
        self.loads
    }
}
