//! Writing the assembled dataset to disk.
//!
//! Both persisters write into a temporary file inside the destination directory and
//! rename it over the final name once it is complete, so a reader sees either the
//! previous file or the full new one.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, Int64Array, RecordBatch, RecordBatchOptions, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::OutputFormat;
use crate::contract::Persister;
use crate::error::PersistenceError;
use crate::table::{Column, ColumnValues, Dataset};

/// Fails unless `dir` exists and is a directory.
pub fn ensure_destination(dir: &Path) -> Result<(), PersistenceError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistenceError::NotADirectory {
            path: dir.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PersistenceError::MissingDirectory {
                path: dir.to_path_buf(),
            })
        }
        Err(source) => Err(PersistenceError::Io {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Creates the staging file next to the target so the final rename stays on one filesystem.
fn staging_file(dir: &Path) -> Result<NamedTempFile, PersistenceError> {
    ensure_destination(dir)?;
    NamedTempFile::new_in(dir).map_err(|source| PersistenceError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn commit(staged: NamedTempFile, target: &Path) -> Result<PathBuf, PersistenceError> {
    staged.persist(target).map_err(|e| PersistenceError::Io {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    info!(path = %target.display(), "Dataset written");
    Ok(target.to_path_buf())
}

/// Converts the dataset into a single Arrow record batch.
///
/// Integer columns map to nullable `Int64`, text columns to nullable `Utf8`.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch, PersistenceError> {
    let mut fields = Vec::with_capacity(dataset.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.columns().len());
    for column in dataset.columns() {
        match &column.values {
            ColumnValues::Int(values) => {
                fields.push(Field::new(column.name.as_str(), DataType::Int64, true));
                arrays.push(Arc::new(Int64Array::from(values.clone())));
            }
            ColumnValues::Text(values) => {
                fields.push(Field::new(column.name.as_str(), DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(values.clone())));
            }
        }
    }
    let options = RecordBatchOptions::new().with_row_count(Some(dataset.row_count()));
    let batch = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?;
    Ok(batch)
}

/// Writes `plaza_traffic.parquet`. A dataset without columns is refused with
/// [`PersistenceError::NoColumns`] and nothing is written.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParquetPersister;

impl Persister for ParquetPersister {
    fn file_name(&self) -> String {
        OutputFormat::Parquet.file_name()
    }

    fn persist(&self, dataset: &Dataset, dir: &Path) -> Result<PathBuf, PersistenceError> {
        let target = dir.join(self.file_name());
        // a zero-column schema writes a file the reader cannot open
        if dataset.columns().is_empty() {
            return Err(PersistenceError::NoColumns { path: target });
        }
        let parquet_err = |source| PersistenceError::Parquet {
            path: target.clone(),
            source,
        };

        let batch = to_record_batch(dataset)?;
        let staged = staging_file(dir)?;
        let file = staged.reopen().map_err(|source| PersistenceError::Io {
            path: staged.path().to_path_buf(),
            source,
        })?;

        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).map_err(parquet_err)?;
        writer.write(&batch).map_err(parquet_err)?;
        writer.close().map_err(parquet_err)?;
        debug!(
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "Parquet file staged"
        );

        commit(staged, &target)
    }
}

/// Writes `plaza_traffic.csv`: a header row, then one line per row, nulls as empty fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvPersister;

impl Persister for CsvPersister {
    fn file_name(&self) -> String {
        OutputFormat::Csv.file_name()
    }

    fn persist(&self, dataset: &Dataset, dir: &Path) -> Result<PathBuf, PersistenceError> {
        let target = dir.join(self.file_name());
        let csv_err = |source| PersistenceError::Csv {
            path: target.clone(),
            source,
        };

        let mut staged = staging_file(dir)?;
        {
            let mut writer = csv::Writer::from_writer(staged.as_file_mut());
            writer
                .write_record(dataset.column_names())
                .map_err(csv_err)?;
            for row in 0..dataset.row_count() {
                let record = dataset
                    .columns()
                    .iter()
                    .map(|c| c.values.text_at(row).unwrap_or_default());
                writer.write_record(record).map_err(csv_err)?;
            }
            writer.flush().map_err(|source| PersistenceError::Io {
                path: target.clone(),
                source,
            })?;
        }
        staged.as_file_mut().flush().map_err(|source| PersistenceError::Io {
            path: target.clone(),
            source,
        })?;

        commit(staged, &target)
    }
}

/// Persister for the chosen output format.
pub fn persister_for(format: OutputFormat) -> Box<dyn Persister> {
    match format {
        OutputFormat::Parquet => Box::new(ParquetPersister),
        OutputFormat::Csv => Box::new(CsvPersister),
    }
}

/// Reads a Parquet file written by [`ParquetPersister`] back into a dataset.
pub fn read_parquet(path: &Path) -> Result<Dataset, PersistenceError> {
    let parquet_err = |source| PersistenceError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(parquet_err)?;

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|field| -> Result<Column, PersistenceError> {
            let values = match field.data_type() {
                DataType::Int64 => Ok(ColumnValues::Int(Vec::new())),
                DataType::Utf8 => Ok(ColumnValues::Text(Vec::new())),
                other => Err(PersistenceError::UnsupportedColumn {
                    column: field.name().clone(),
                    data_type: other.to_string(),
                }),
            }?;
            Ok(Column {
                name: field.name().clone(),
                values,
            })
        })
        .collect::<Result<_, _>>()?;

    for batch in reader {
        let batch = batch?;
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            append_array(column, array.as_ref())?;
        }
    }

    Dataset::from_columns(columns).ok_or_else(|| PersistenceError::UnsupportedColumn {
        column: String::from("*"),
        data_type: String::from("ragged or duplicate columns"),
    })
}

fn append_array(column: &mut Column, array: &dyn Array) -> Result<(), PersistenceError> {
    let Column { name, values } = column;
    let mismatch = || PersistenceError::UnsupportedColumn {
        column: name.clone(),
        data_type: array.data_type().to_string(),
    };
    match values {
        ColumnValues::Int(values) => {
            let ints = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(mismatch)?;
            values.extend(ints.iter());
        }
        ColumnValues::Text(values) => {
            let strings = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(mismatch)?;
            values.extend(strings.iter().map(|s| s.map(str::to_string)));
        }
    }
    Ok(())
}
