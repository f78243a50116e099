use lru::LruCache;

use crate::processor::columnar_processor::ColumnarProcessor;
use crate::processor::pivot::{PivotSpec, PivotTable, pivot};
use crate::processor::{AggregateOp, ProcessorError};
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use tracing::debug;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// LRU cache of computed pivot tables, keyed by the full field selection.
///
/// A cache belongs to one loaded dataset; call [`QueryCache::clear`] when the
/// data is reloaded.
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<PivotSpec, PivotTable>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: RefCell::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn get(&self, key: &PivotSpec) -> Option<PivotTable> {
        self.cache.borrow_mut().get(key).cloned()
    }

    pub fn put(&self, key: PivotSpec, value: PivotTable) {
        self.cache.borrow_mut().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one pivot query
///
/// # Examples
///
/// ```rust,no_run
/// # use std::rc::Rc;
/// # use pivot_dashboard::{AggregateOp, ColumnarProcessor};
/// let mut processor = ColumnarProcessor::new();
/// processor.load_csv("sales.csv".as_ref()).unwrap();
/// let processor = Rc::new(processor);
///
/// let table = processor
///     .query()
///     .rows(["region"])
///     .columns(["category"])
///     .values(["sales"])
///     .aggfunc(AggregateOp::Sum)
///     .execute()
///     .unwrap();
/// println!("{table}");
/// ```
#[derive(Debug, Clone)]
pub struct PivotQueryBuilder {
    processor: Rc<ColumnarProcessor>,
    cache: Option<Rc<QueryCache>>,
    spec: PivotSpec,
}

impl PivotQueryBuilder {
    pub fn new(processor: Rc<ColumnarProcessor>, cache: Option<Rc<QueryCache>>) -> Self {
        Self {
            processor,
            cache,
            spec: PivotSpec {
                rows: Vec::new(),
                columns: Vec::new(),
                values: Vec::new(),
                aggfunc: AggregateOp::default(),
            },
        }
    }

    /// Add row fields
    pub fn rows<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.rows.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add column fields
    pub fn columns<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.columns.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add value fields, aggregated in the given order
    pub fn values<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.values.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn aggfunc(mut self, op: AggregateOp) -> Self {
        self.spec.aggfunc = op;
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn spec(&self) -> &PivotSpec {
        &self.spec
    }

    /// Execute the pivot, consulting the cache first when one is attached
    pub fn execute(self) -> Result<PivotTable, ProcessorError> {
        match &self.cache {
            Some(lru) => {
                if let Some(table) = lru.get(&self.spec) {
                    debug!(spec = ?self.spec, "pivot cache hit");
                    return Ok(table);
                }
                let table = pivot(&self.processor, &self.spec)?;
                lru.put(self.spec.clone(), table.clone());
                Ok(table)
            }
            None => pivot(&self.processor, &self.spec),
        }
    }
}

impl ColumnarProcessor {
    pub fn query(self: &Rc<Self>) -> PivotQueryBuilder {
        PivotQueryBuilder::new(self.clone(), None)
    }

    pub fn query_with_cache(self: &Rc<Self>, cache: &Rc<QueryCache>) -> PivotQueryBuilder {
        PivotQueryBuilder::new(self.clone(), Some(cache.clone()))
    }
}
