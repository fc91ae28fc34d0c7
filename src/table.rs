//! Table assembly: concatenates flattened rows into one column-oriented [`Dataset`].
//!
//! Columns are the union of all keys seen, in first-seen order. A row lacking a
//! column gets a null cell. After alignment every column goes through
//! [`coerce_column`], which turns it into integers if every present value parses.

use tracing::debug;

use crate::preprocess::FlatRow;

/// Cells of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValues {
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at `row` rendered as text; `None` for a null cell.
    pub fn text_at(&self, row: usize) -> Option<String> {
        match self {
            ColumnValues::Int(v) => v.get(row).copied().flatten().map(|n| n.to_string()),
            ColumnValues::Text(v) => v.get(row).cloned().flatten(),
        }
    }

    /// Re-applies integer coercion. Integer columns are returned unchanged.
    pub fn coerce(self) -> ColumnValues {
        match self {
            ColumnValues::Int(_) => self,
            ColumnValues::Text(values) => coerce_column(values),
        }
    }
}

/// Best-effort integer typing of a text column.
///
/// Returns [`ColumnValues::Int`] when at least one cell is present and every present
/// cell parses as `i64` (surrounding whitespace ignored). Otherwise the column is
/// returned as text, untouched. Nulls are kept in either case.
pub fn coerce_column(values: Vec<Option<String>>) -> ColumnValues {
    let mut parsed = Vec::with_capacity(values.len());
    let mut seen_value = false;
    for cell in &values {
        match cell {
            None => parsed.push(None),
            Some(text) => match text.trim().parse::<i64>() {
                Ok(n) => {
                    seen_value = true;
                    parsed.push(Some(n));
                }
                Err(_) => return ColumnValues::Text(values),
            },
        }
    }
    if seen_value {
        ColumnValues::Int(parsed)
    } else {
        ColumnValues::Text(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// The assembled table. All columns have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Builds a dataset from ready-made columns.
    ///
    /// Returns `None` if the columns differ in length or a name repeats.
    pub fn from_columns(columns: Vec<Column>) -> Option<Self> {
        let rows = columns.first().map_or(0, |c| c.values.len());
        if columns.iter().any(|c| c.values.len() != rows) {
            return None;
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return None;
            }
        }
        Some(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    /// Runs [`ColumnValues::coerce`] over every column.
    pub fn coerce(self) -> Dataset {
        Dataset {
            columns: self
                .columns
                .into_iter()
                .map(|c| Column {
                    name: c.name,
                    values: c.values.coerce(),
                })
                .collect(),
            rows: self.rows,
        }
    }
}

/// Accumulates flattened rows in arrival order and aligns them into columns.
#[derive(Debug, Default)]
pub struct TableAssembler {
    names: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
    rows: usize,
}

impl TableAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one payload's rows after everything pushed so far.
    pub fn push_rows<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = FlatRow>,
    {
        for row in rows {
            self.push_row(&row);
        }
    }

    pub fn push_row(&mut self, row: &FlatRow) {
        for (key, value) in row.iter() {
            let index = match self.names.iter().position(|n| n == key) {
                Some(i) => i,
                None => {
                    self.names.push(key.to_string());
                    // earlier rows never had this column
                    self.cells.push(vec![None; self.rows]);
                    self.names.len() - 1
                }
            };
            self.cells[index].push(Some(value.to_string()));
        }
        self.rows += 1;
        for column in &mut self.cells {
            if column.len() < self.rows {
                column.push(None);
            }
        }
    }

    /// Finishes assembly, typing each column with [`coerce_column`].
    pub fn finish(self) -> Dataset {
        let columns: Vec<Column> = self
            .names
            .into_iter()
            .zip(self.cells)
            .map(|(name, cells)| Column {
                name,
                values: coerce_column(cells),
            })
            .collect();
        debug!(
            rows = self.rows,
            columns = columns.len(),
            "Assembled dataset"
        );
        Dataset {
            columns,
            rows: self.rows,
        }
    }
}

/// Concatenates per-payload row batches into one dataset.
pub fn assemble<B>(batches: B) -> Dataset
where
    B: IntoIterator,
    B::Item: IntoIterator<Item = FlatRow>,
{
    let mut assembler = TableAssembler::new();
    for batch in batches {
        assembler.push_rows(batch);
    }
    assembler.finish()
}
