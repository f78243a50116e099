use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use std::{borrow::Cow, collections::HashMap, collections::HashSet, fs::File, path::Path};
use tracing::{debug, info, warn};

use crate::{
    helpers::{
        accumulator::{FloatAccumulator, IntAccumulator},
        fields::{classify, is_null, split_fields, trim_line},
    },
    processor::{
        AggregateOp, AggregateResult, ParseError, ParseSummary, ProcessorError, Value,
        column::{Column, ColumnType},
    },
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Per-chunk output of the parse pass, merged into the final columns in chunk order.
#[derive(Debug)]
struct BatchResult {
    int64_batches: Vec<Vec<Option<i64>>>,
    float64_batches: Vec<Vec<Option<f64>>>,
    str_batches: Vec<(Vec<Option<u32>>, Vec<String>)>,
    row_count: usize,
    errors: Vec<ParseError>,
}

/// Per-chunk output of the schema pass.
#[derive(Debug)]
struct ChunkScan {
    line_count: usize,
    types: Vec<Option<ColumnType>>,
}

/// Main processor for columnar CSV data
///
/// # Examples
///
/// ```rust,no_run
/// # use pivot_dashboard::{ColumnarProcessor, AggregateOp};
/// let mut processor = ColumnarProcessor::new();
/// processor.load_csv("sales.csv".as_ref()).unwrap();
/// let total = processor.aggregate("sales", AggregateOp::Sum).unwrap();
/// println!("Sum: {:?}", total);
/// ```
#[derive(Debug)]
pub struct ColumnarProcessor {
    columns: Vec<Column>,
    row_count: usize,
    headers: Vec<String>,
}

impl ColumnarProcessor {
    /// Create an empty processor
    pub fn new() -> Self {
        ColumnarProcessor {
            columns: Vec::new(),
            row_count: 0,
            headers: Vec::new(),
        }
    }

    /// Loads a CSV file through a memory map.
    ///
    /// Column types are inferred over every row (Int, Float, Str); empty
    /// fields are nulls. Lines whose field count differs from the header
    /// are skipped and reported in the returned [`ParseSummary`].
    ///
    /// # Errors
    /// Returns a [`ProcessorError`] if:
    /// - File cannot be opened or mapped
    /// - File or header is empty
    /// - Header contains the same column twice
    pub fn load_csv(&mut self, path: &Path) -> Result<ParseSummary, ProcessorError> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(ProcessorError::EmptyFile(path.display().to_string()));
        }
        let mmap = unsafe { Mmap::map(&file)? };

        let summary = self.load_bytes(&mmap[..]).map_err(|e| match e {
            ProcessorError::EmptyFile(_) => ProcessorError::EmptyFile(path.display().to_string()),
            other => other,
        })?;

        info!(
            path = %path.display(),
            rows = summary.rows_processed,
            columns = self.headers.len(),
            skipped = summary.errors.len(),
            "loaded csv"
        );
        Ok(summary)
    }

    /// Loads CSV content already held in memory.
    pub fn load_bytes(&mut self, buf: &[u8]) -> Result<ParseSummary, ProcessorError> {
        let buf = buf.strip_prefix(UTF8_BOM).unwrap_or(buf);

        // Parse header
        let header_end = memchr(b'\n', buf).unwrap_or(buf.len());
        let header_line = trim_line(&buf[..header_end]);
        if header_line.iter().all(u8::is_ascii_whitespace) {
            return Err(ProcessorError::EmptyFile("<buffer>".into()));
        }
        let headers = Self::parse_header(header_line)?;

        let data_start = (header_end + 1).min(buf.len());
        let data = &buf[data_start..];

        // Find chunk boundaries (split by newlines)
        let num_threads = rayon::current_num_threads();
        let chunks = Self::find_chunk_boundaries(data, num_threads);
        debug!(chunks = chunks.len(), bytes = data.len(), "split csv into chunks");

        // First pass: infer the schema over all rows
        let scans: Vec<ChunkScan> = chunks
            .par_iter()
            .map(|(start, end)| Self::scan_chunk(&data[*start..*end], headers.len()))
            .collect();

        let schema: Vec<ColumnType> = (0..headers.len())
            .map(|col_idx| {
                scans
                    .iter()
                    .filter_map(|scan| scan.types[col_idx])
                    .reduce(ColumnType::widen)
                    // all-null columns behave as float columns
                    .unwrap_or(ColumnType::Float64)
            })
            .collect();

        // Line number of the first line of each chunk (the header is line 1)
        let first_lines: Vec<usize> = scans
            .iter()
            .scan(2, |next, scan| {
                let first = *next;
                *next += scan.line_count;
                Some(first)
            })
            .collect();

        // Second pass: parse chunks in parallel
        let batch_results: Vec<BatchResult> = chunks
            .par_iter()
            .enumerate()
            .map(|(chunk_idx, (start, end))| {
                Self::parse_chunk(&data[*start..*end], &schema, first_lines[chunk_idx])
            })
            .collect();

        // Merge batch results into chunked columns
        let mut columns: Vec<Column> = schema.iter().copied().map(Column::for_type).collect();

        let mut total_rows = 0;
        let mut all_errors = Vec::new();

        for mut batch in batch_results {
            total_rows += batch.row_count;
            all_errors.extend(batch.errors);

            for (col_idx, column) in columns.iter_mut().enumerate() {
                match column.column_type() {
                    ColumnType::Int64 => column
                        .push_chunk_int64(std::mem::take(&mut batch.int64_batches[col_idx])),
                    ColumnType::Float64 => column
                        .push_chunk_float64(std::mem::take(&mut batch.float64_batches[col_idx])),
                    ColumnType::Str => {
                        let (codes, dictionary) = std::mem::take(&mut batch.str_batches[col_idx]);
                        column.push_chunk_str(codes, dictionary);
                    }
                }
            }
        }

        for column in &mut columns {
            column.flatten_in_place();
        }

        for err in &all_errors {
            warn!(row = err.row, "skipped csv line: {}", err.message);
        }

        self.columns = columns;
        self.headers = headers;
        self.row_count = total_rows;

        Ok(ParseSummary {
            rows_processed: total_rows,
            errors: all_errors,
        })
    }

    fn parse_header(header_line: &[u8]) -> Result<Vec<String>, ProcessorError> {
        let mut fields = Vec::new();
        split_fields(header_line, &mut fields);

        let headers: Vec<String> = fields
            .iter()
            .map(|s| String::from_utf8_lossy(s).trim().to_string())
            .collect();

        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(ProcessorError::DuplicateColumn(header.clone()));
            }
        }
        Ok(headers)
    }

    fn find_chunk_boundaries(data: &[u8], num_chunks: usize) -> Vec<(usize, usize)> {
        if data.is_empty() {
            return vec![];
        }

        let num_chunks = num_chunks.max(1);
        let chunk_size = data.len() / num_chunks;
        let mut boundaries = Vec::with_capacity(num_chunks);
        let mut start = 0;

        for i in 0..num_chunks - 1 {
            let mut end = ((i + 1) * chunk_size).max(start);

            // Find next newline
            match memchr(b'\n', &data[end..]) {
                Some(offset) => end += offset + 1, // Include the newline
                None => end = data.len(),
            }

            if start < end {
                boundaries.push((start, end));
            }
            start = end;
        }

        // Last chunk gets everything remaining
        if start < data.len() {
            boundaries.push((start, data.len()));
        }

        boundaries
    }

    /// Calls `f` for every line of `chunk`; a final newline does not start a new line.
    fn for_each_line<'a>(chunk: &'a [u8], mut f: impl FnMut(&'a [u8])) {
        let body = chunk.strip_suffix(b"\n").unwrap_or(chunk);
        let mut start = 0;
        for newline_pos in memchr_iter(b'\n', body) {
            f(&body[start..newline_pos]);
            start = newline_pos + 1;
        }
        f(&body[start..]);
    }

    fn scan_chunk(chunk: &[u8], num_cols: usize) -> ChunkScan {
        let mut types: Vec<Option<ColumnType>> = vec![None; num_cols];
        let mut line_count = 0;
        let mut fields = Vec::with_capacity(num_cols);

        Self::for_each_line(chunk, |line| {
            line_count += 1;
            let line = trim_line(line);
            if line.is_empty() {
                return;
            }

            split_fields(line, &mut fields);
            if fields.len() != num_cols {
                return;
            }

            for (slot, field) in types.iter_mut().zip(&fields) {
                if *slot == Some(ColumnType::Str) {
                    continue;
                }
                if let Some(field_type) = classify(field) {
                    *slot = Some(slot.map_or(field_type, |t| t.widen(field_type)));
                }
            }
        });

        ChunkScan { line_count, types }
    }

    fn parse_chunk(chunk: &[u8], schema: &[ColumnType], first_line: usize) -> BatchResult {
        let num_cols = schema.len();
        let estimated_rows = memchr_iter(b'\n', chunk).count() + 1;

        // Pre-allocate column batches
        let mut int64_cols: Vec<Vec<Option<i64>>> = schema
            .iter()
            .map(|t| match t {
                ColumnType::Int64 => Vec::with_capacity(estimated_rows),
                _ => Vec::new(),
            })
            .collect();

        let mut float64_cols: Vec<Vec<Option<f64>>> = schema
            .iter()
            .map(|t| match t {
                ColumnType::Float64 => Vec::with_capacity(estimated_rows),
                _ => Vec::new(),
            })
            .collect();

        let mut str_cols: Vec<(Vec<Option<u32>>, Vec<String>)> = schema
            .iter()
            .map(|t| match t {
                ColumnType::Str => (Vec::with_capacity(estimated_rows), Vec::new()),
                _ => (Vec::new(), Vec::new()),
            })
            .collect();
        let mut str_lookup: Vec<HashMap<String, u32>> = vec![HashMap::new(); num_cols];

        let mut errors = Vec::new();
        let mut row_count = 0;
        let mut line_no = first_line;
        let mut fields: Vec<Cow<'_, [u8]>> = Vec::with_capacity(num_cols);

        Self::for_each_line(chunk, |line| {
            let current_line = line_no;
            line_no += 1;

            let line = trim_line(line);
            if line.is_empty() {
                return;
            }

            split_fields(line, &mut fields);
            if fields.len() != num_cols {
                errors.push(ParseError {
                    row: current_line,
                    message: format!("Expected {} fields, got {}", num_cols, fields.len()),
                });
                return;
            }

            // Parse each field according to schema
            for (col_idx, field) in fields.iter().enumerate() {
                let field: &[u8] = field;
                match schema[col_idx] {
                    ColumnType::Int64 => int64_cols[col_idx].push(if is_null(field) {
                        None
                    } else {
                        atoi_simd::parse::<i64>(field).ok()
                    }),
                    ColumnType::Float64 => float64_cols[col_idx].push(if is_null(field) {
                        None
                    } else {
                        fast_float::parse::<f64, _>(field).ok().filter(|v| !v.is_nan())
                    }),
                    ColumnType::Str => {
                        let (codes, dictionary) = &mut str_cols[col_idx];
                        if is_null(field) {
                            codes.push(None);
                            continue;
                        }
                        let text = String::from_utf8_lossy(field);
                        let lookup = &mut str_lookup[col_idx];
                        let code = match lookup.get(&*text) {
                            Some(&code) => code,
                            None => {
                                let code = dictionary.len() as u32;
                                dictionary.push(text.to_string());
                                lookup.insert(text.into_owned(), code);
                                code
                            }
                        };
                        codes.push(Some(code));
                    }
                }
            }

            row_count += 1;
        });

        BatchResult {
            int64_batches: int64_cols,
            float64_batches: float64_cols,
            str_batches: str_cols,
            row_count,
            errors,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(Column::column_type).collect()
    }

    /// Position of `col_name` in the header.
    pub fn column_index(&self, col_name: &str) -> Result<usize, ProcessorError> {
        self.headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, ProcessorError> {
        let col_pos = self.column_index(col_name)?;

        let col = self
            .columns
            .get(col_pos)
            .ok_or_else(|| ProcessorError::MissingColumn(col_name.to_string()))?;

        Ok(col)
    }

    pub fn value_at(&self, row: usize, col: usize) -> Value {
        self.columns
            .get(col)
            .map_or(Value::Null, |column| column.get(row))
    }

    /// The first `n` records, one `Vec<Value>` per record.
    pub fn head(&self, n: usize) -> Vec<Vec<Value>> {
        (0..n.min(self.row_count))
            .map(|row| self.columns.iter().map(|col| col.get(row)).collect())
            .collect()
    }

    /// Aggregates a whole column, skipping nulls.
    ///
    /// Returns `Ok(None)` when the column has no non-null value (except for
    /// [`AggregateOp::Count`], which yields zero).
    ///
    /// # Example
    /// ```rust,no_run
    /// # use pivot_dashboard::{ColumnarProcessor, AggregateOp};
    /// # let processor = ColumnarProcessor::new();
    /// let result = processor.aggregate("sales", AggregateOp::Mean).unwrap();
    /// ```
    pub fn aggregate(
        &self,
        column: &str,
        op: AggregateOp,
    ) -> Result<Option<AggregateResult>, ProcessorError> {
        let col = self.get_col(column)?;
        Self::accumulate(column, col, op, None)
    }

    /// Aggregates the given records of a column, skipping nulls.
    pub fn aggregate_rows(
        &self,
        column: &str,
        op: AggregateOp,
        rows: &[usize],
    ) -> Result<Option<AggregateResult>, ProcessorError> {
        let col = self.get_col(column)?;
        Self::accumulate(column, col, op, Some(rows))
    }

    fn accumulate(
        name: &str,
        col: &Column,
        op: AggregateOp,
        rows: Option<&[usize]>,
    ) -> Result<Option<AggregateResult>, ProcessorError> {
        match col {
            Column::Int64(_) => {
                let mut acc = IntAccumulator::new();
                match rows {
                    Some(rows) => rows
                        .iter()
                        .filter_map(|&i| col.get_i64(i))
                        .for_each(|v| acc.push(v)),
                    None => col.iter_i64().flatten().for_each(|v| acc.push(v)),
                }
                acc.finish(op, name)
            }

            Column::Float64(_) => {
                let mut acc = FloatAccumulator::new();
                match rows {
                    Some(rows) => rows
                        .iter()
                        .filter_map(|&i| col.get_f64(i))
                        .for_each(|v| acc.push(v)),
                    None => col.iter_f64().flatten().for_each(|v| acc.push(v)),
                }
                Ok(acc.finish(op))
            }

            Column::Str { .. } if op.requires_numeric() => Err(ProcessorError::NonNumericColumn {
                column: name.to_string(),
                op,
            }),

            Column::Str { .. } => {
                let count = match rows {
                    Some(rows) => rows.iter().filter(|&&i| col.is_valid(i)).count(),
                    None => col.iter_str().flatten().count(),
                };
                Ok(Some(AggregateResult::Int(count as i64)))
            }
        }
    }
}

impl Default for ColumnarProcessor {
    fn default() -> Self {
        Self::new()
    }
}
