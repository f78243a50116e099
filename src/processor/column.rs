use std::collections::HashMap;

use crate::processor::{Value, float_key_bits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
}

impl ColumnType {
    /// Widens `self` so that a field of type `other` still fits.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::Str, _) | (_, ColumnType::Str) => ColumnType::Str,
            (ColumnType::Float64, _) | (_, ColumnType::Float64) => ColumnType::Float64,
            _ => ColumnType::Int64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Str => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnType::Str)
    }
}

/// Chunked, nullable column storage.
///
/// String columns are dictionary encoded: each row holds an index into
/// `dictionary`, so grouping never has to compare whole strings.
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<Option<i64>>>),
    Float64(Vec<Vec<Option<f64>>>),
    Str {
        chunks: Vec<Vec<Option<u32>>>,
        dictionary: Vec<String>,
    },
}

impl Column {
    pub fn new_int64() -> Self {
        Column::Int64(Vec::new())
    }

    pub fn new_float64() -> Self {
        Column::Float64(Vec::new())
    }

    pub fn new_str() -> Self {
        Column::Str {
            chunks: Vec::new(),
            dictionary: Vec::new(),
        }
    }

    pub fn for_type(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Int64 => Column::new_int64(),
            ColumnType::Float64 => Column::new_float64(),
            ColumnType::Str => Column::new_str(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str { .. } => ColumnType::Str,
        }
    }

    pub fn push_chunk_int64(&mut self, chunk: Vec<Option<i64>>) {
        match self {
            Column::Int64(chunks) => chunks.push(chunk),
            _ => panic!("Type mismatch"),
        }
    }

    pub fn push_chunk_float64(&mut self, chunk: Vec<Option<f64>>) {
        match self {
            Column::Float64(chunks) => chunks.push(chunk),
            _ => panic!("Type mismatch"),
        }
    }

    /// Appends a chunk of strings encoded against `local_dictionary`,
    /// re-encoding the codes against the column's own dictionary.
    pub fn push_chunk_str(&mut self, chunk: Vec<Option<u32>>, local_dictionary: Vec<String>) {
        let Column::Str { chunks, dictionary } = self else {
            panic!("Type mismatch")
        };

        let base = dictionary.len();
        let mut new_entries = Vec::new();
        let remap: Vec<u32> = {
            let existing: HashMap<&str, u32> = dictionary
                .iter()
                .enumerate()
                .map(|(code, s)| (s.as_str(), code as u32))
                .collect();
            local_dictionary
                .into_iter()
                .map(|s| match existing.get(s.as_str()) {
                    Some(&code) => code,
                    None => {
                        new_entries.push(s);
                        (base + new_entries.len() - 1) as u32
                    }
                })
                .collect()
        };
        dictionary.extend(new_entries);

        chunks.push(
            chunk
                .into_iter()
                .map(|code| code.map(|c| remap[c as usize]))
                .collect(),
        );
    }

    pub fn iter_i64(&self) -> impl Iterator<Item = Option<i64>> + '_ {
        if let Column::Int64(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_f64(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        if let Column::Float64(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_str(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        if let Column::Str { chunks, dictionary } = self {
            chunks.iter().flat_map(move |chunk| {
                chunk
                    .iter()
                    .map(move |code| code.map(|c| dictionary[c as usize].as_str()))
            })
        } else {
            panic!("Wrong type")
        }
    }

    /// Random access to a single row.
    pub fn get(&self, idx: usize) -> Value {
        match self {
            Column::Int64(chunks) => locate(chunks, idx)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Int),
            Column::Float64(chunks) => locate(chunks, idx)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Float),
            Column::Str { chunks, dictionary } => locate(chunks, idx)
                .copied()
                .flatten()
                .map_or(Value::Null, |c| Value::Str(dictionary[c as usize].clone())),
        }
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).copied().flatten(),
            _ => panic!("Wrong type"),
        }
    }

    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Column::Float64(chunks) => locate(chunks, idx).copied().flatten(),
            _ => panic!("Wrong type"),
        }
    }

    pub fn is_valid(&self, idx: usize) -> bool {
        match self {
            Column::Int64(chunks) => matches!(locate(chunks, idx), Some(Some(_))),
            Column::Float64(chunks) => matches!(locate(chunks, idx), Some(Some(_))),
            Column::Str { chunks, .. } => matches!(locate(chunks, idx), Some(Some(_))),
        }
    }

    /// Hashable code of a row's value: the raw bits for numbers (`-0.0`
    /// folded into `0.0`), the dictionary index for strings. `None` for nulls.
    pub fn key_code(&self, idx: usize) -> Option<u64> {
        match self {
            Column::Int64(chunks) => locate(chunks, idx).copied().flatten().map(|v| v as u64),
            Column::Float64(chunks) => locate(chunks, idx).copied().flatten().map(float_key_bits),
            Column::Str { chunks, .. } => locate(chunks, idx).copied().flatten().map(u64::from),
        }
    }

    /// Inverse of [`Column::key_code`].
    pub fn value_for_code(&self, code: u64) -> Value {
        match self {
            Column::Int64(_) => Value::Int(code as i64),
            Column::Float64(_) => Value::Float(f64::from_bits(code)),
            Column::Str { dictionary, .. } => dictionary
                .get(code as usize)
                .map_or(Value::Null, |s| Value::Str(s.clone())),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().flatten().filter(|v| v.is_none()).count(),
            Column::Float64(chunks) => chunks.iter().flatten().filter(|v| v.is_none()).count(),
            Column::Str { chunks, .. } => chunks.iter().flatten().filter(|v| v.is_none()).count(),
        }
    }

    pub fn flatten_in_place(&mut self) {
        match self {
            Column::Int64(chunks) => flatten_chunks(chunks),
            Column::Float64(chunks) => flatten_chunks(chunks),
            Column::Str { chunks, .. } => flatten_chunks(chunks),
        }
    }
}

fn locate<T>(chunks: &[Vec<T>], idx: usize) -> Option<&T> {
    let mut remaining = idx;
    for chunk in chunks {
        if remaining < chunk.len() {
            return chunk.get(remaining);
        }
        remaining -= chunk.len();
    }
    None
}

fn flatten_chunks<T>(chunks: &mut Vec<Vec<T>>) {
    if chunks.len() <= 1 {
        return; // Already flat
    }

    // Reuse the first chunk's allocation as the base
    let mut owned_chunks = std::mem::take(chunks);
    let mut flattened = owned_chunks.remove(0);

    let total: usize = owned_chunks.iter().map(|c| c.len()).sum();
    flattened.reserve(total);

    for chunk in owned_chunks {
        flattened.extend(chunk);
    }

    chunks.push(flattened);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_zero_shares_key_with_zero() {
        let mut col = Column::new_float64();
        col.push_chunk_float64(vec![Some(-0.0), Some(0.0), Some(1.5)]);
        assert_eq!(col.key_code(0), col.key_code(1));
        assert_ne!(col.key_code(1), col.key_code(2));
        assert_eq!(col.value_for_code(col.key_code(0).unwrap()).to_string(), "0.0");
    }

    #[test]
    fn test_widen() {
        assert_eq!(ColumnType::Int64.widen(ColumnType::Int64), ColumnType::Int64);
        assert_eq!(ColumnType::Int64.widen(ColumnType::Float64), ColumnType::Float64);
        assert_eq!(ColumnType::Float64.widen(ColumnType::Str), ColumnType::Str);
    }

    #[test]
    fn test_str_chunks_share_dictionary() {
        let mut col = Column::new_str();
        col.push_chunk_str(vec![Some(0), Some(1), None], vec!["EU".into(), "US".into()]);
        col.push_chunk_str(vec![Some(0), Some(1)], vec!["US".into(), "ASIA".into()]);
        col.flatten_in_place();

        let values: Vec<Option<&str>> = col.iter_str().collect();
        assert_eq!(
            values,
            vec![Some("EU"), Some("US"), None, Some("US"), Some("ASIA")]
        );
        if let Column::Str { chunks, dictionary } = &col {
            assert_eq!(chunks.len(), 1);
            assert_eq!(dictionary.len(), 3);
        }
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn test_get_across_chunks() {
        let mut col = Column::new_int64();
        col.push_chunk_int64(vec![Some(1), Some(2)]);
        col.push_chunk_int64(vec![None, Some(4)]);
        assert_eq!(col.get(1), Value::Int(2));
        assert_eq!(col.get(2), Value::Null);
        assert_eq!(col.get(3), Value::Int(4));
        assert_eq!(col.get(9), Value::Null);
    }
}
