use ahash::AHashMap;
use polars::prelude::*;

/// Hashable identity of a single cell.
///
/// Numeric cells compare as `f64` bit patterns so that `Int32(500)` and
/// `Float64(500.0)` land on the same key. Negative zero is folded into zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Number(u64),
    Boolean(bool),
    Text(String),
}

impl CellKey {
    fn from_f64(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        CellKey::Number(value.to_bits())
    }
}

/// Columns whose values are averaged by the summarizer.
#[inline]
pub fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric()
}

/// Columns that may take part in row-wise frame combination.
pub fn is_tabular(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric()
        || dtype.is_bool()
        || dtype.is_string()
        || dtype.is_categorical()
        || dtype.is_enum()
        || dtype.is_null()
}

pub fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str().to_string())
        .collect()
}

pub fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn to_index(indices: &[IdxSize]) -> IdxCa {
    IdxCa::from_vec(PlSmallStr::from_static("row"), indices.to_vec())
}

/// Gathers the given rows of every column, in the given order.
pub fn take_rows(frame: &DataFrame, indices: &[IdxSize]) -> PolarsResult<DataFrame> {
    frame.take(&to_index(indices))
}

/// Extracts a column as nullable `f64` values, casting integers.
pub fn float_values(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Hash keys for every cell of a column.
pub fn cell_keys(column: &Column) -> PolarsResult<Vec<CellKey>> {
    let dtype = column.dtype();
    if is_numeric(dtype) {
        return Ok(float_values(column)?
            .into_iter()
            .map(|value| value.map_or(CellKey::Null, CellKey::from_f64))
            .collect());
    }
    if dtype.is_bool() {
        return Ok(column
            .bool()?
            .into_iter()
            .map(|value| value.map_or(CellKey::Null, CellKey::Boolean))
            .collect());
    }
    let casted = column.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|value| value.map_or(CellKey::Null, |text| CellKey::Text(text.to_string())))
        .collect())
}

/// Composite keys of the named columns, one per row.
pub fn row_keys(frame: &DataFrame, names: &[String]) -> PolarsResult<Vec<Vec<CellKey>>> {
    let mut keys = vec![Vec::with_capacity(names.len()); frame.height()];
    for name in names {
        let column = frame.column(name)?;
        for (row, key) in cell_keys(column)?.into_iter().enumerate() {
            keys[row].push(key);
        }
    }
    Ok(keys)
}

/// Partitions row indices by the values of `names`, groups in order of first
/// appearance. Without key columns every row belongs to a single group.
pub fn group_rows(frame: &DataFrame, names: &[String]) -> PolarsResult<Vec<Vec<IdxSize>>> {
    let height = frame.height();
    if height == 0 {
        return Ok(Vec::new());
    }
    if names.is_empty() {
        return Ok(vec![(0..height as IdxSize).collect()]);
    }
    let keys = row_keys(frame, names)?;
    let mut slots: AHashMap<Vec<CellKey>, usize> = AHashMap::new();
    let mut groups: Vec<Vec<IdxSize>> = Vec::new();
    for (row, key) in keys.into_iter().enumerate() {
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row as IdxSize);
    }
    Ok(groups)
}

/// Row of the most frequent non-null value among `rows`. Ties go to the value
/// seen first; a group of nulls yields its first row.
pub fn mode_row(keys: &[CellKey], rows: &[IdxSize]) -> Option<IdxSize> {
    let mut counts: AHashMap<&CellKey, (usize, IdxSize)> = AHashMap::new();
    let mut order: Vec<&CellKey> = Vec::new();
    for &row in rows {
        let key = &keys[row as usize];
        if *key == CellKey::Null {
            continue;
        }
        counts
            .entry(key)
            .and_modify(|entry| entry.0 += 1)
            .or_insert_with(|| {
                order.push(key);
                (1, row)
            });
    }
    let mut best: Option<(usize, IdxSize)> = None;
    for key in order {
        let (count, first_row) = counts[key];
        if best.is_none_or(|(best_count, _)| count > best_count) {
            best = Some((count, first_row));
        }
    }
    best.map(|(_, row)| row).or_else(|| rows.first().copied())
}
