//! Column-oriented sample table
//!
//! A [`SeriesTable`] holds a timestamp column and one named column per
//! channel, all of the same length. Tables from consecutive files are
//! stacked with [`SeriesTable::concat`].

use crate::error::{PlaybackError, Result};
use crate::types::SampleValue;
use chrono::NaiveDateTime;

/// A named column of samples
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name (the channel's display name)
    pub name: String,
    /// One value per row
    pub values: Vec<SampleValue>,
}

/// Timestamped channel columns of equal length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesTable {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl SeriesTable {
    /// Create a table with a time column and no channel columns
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Row timestamps
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// All channel columns in insertion order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Add a column, replacing an existing one of the same name
    ///
    /// Fails with [`PlaybackError::DataStacking`] when the column length does
    /// not match the table.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<SampleValue>) -> Result<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(PlaybackError::DataStacking(format!(
                "column {} has {} values but the table has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// Add an all-null column unless one with this name exists
    pub fn ensure_column(&mut self, name: &str) {
        if self.column(name).is_none() {
            self.columns.push(Column {
                name: name.to_string(),
                values: vec![SampleValue::Null; self.len()],
            });
        }
    }

    /// Values of one row, in column order
    pub fn row(&self, index: usize) -> Option<Vec<&SampleValue>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Consume the table into its columns
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    fn check_shape(&self) -> Result<()> {
        for column in &self.columns {
            if column.values.len() != self.len() {
                return Err(PlaybackError::DataStacking(format!(
                    "column {} has {} values but the table has {} rows",
                    column.name,
                    column.values.len(),
                    self.len()
                )));
            }
        }
        Ok(())
    }

    /// Stack tables end-to-end
    ///
    /// The result has the union of all column names (in order of first
    /// appearance); a table lacking a column contributes nulls for its rows.
    pub fn concat(tables: Vec<SeriesTable>) -> Result<SeriesTable> {
        if tables.is_empty() {
            return Err(PlaybackError::DataStacking(
                "no tables to concatenate".to_string(),
            ));
        }

        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            table.check_shape()?;
            for column in &table.columns {
                if !names.contains(&column.name) {
                    names.push(column.name.clone());
                }
            }
        }

        let rows: usize = tables.iter().map(SeriesTable::len).sum();
        let mut timestamps = Vec::with_capacity(rows);
        let mut merged: Vec<Column> = names
            .iter()
            .map(|name| Column {
                name: name.clone(),
                values: Vec::with_capacity(rows),
            })
            .collect();

        for (i, mut table) in tables.into_iter().enumerate() {
            for column in merged.iter_mut() {
                match table.columns.iter().position(|c| c.name == column.name) {
                    Some(pos) => {
                        let source = table.columns.swap_remove(pos);
                        column.values.extend(source.values);
                    }
                    None => {
                        tracing::warn!("{} was missing in table {}", column.name, i);
                        column
                            .values
                            .extend(std::iter::repeat(SampleValue::Null).take(table.len()));
                    }
                }
            }
            timestamps.extend(table.timestamps);
        }

        Ok(SeriesTable {
            timestamps,
            columns: merged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: usize) -> Vec<NaiveDateTime> {
        vec![NaiveDateTime::default(); n]
    }

    #[test]
    fn test_insert_checks_length() {
        let mut table = SeriesTable::new(ts(3));
        assert!(table.insert_column("x", vec![1.0.into(); 3]).is_ok());
        let err = table.insert_column("y", vec![1.0.into(); 2]).unwrap_err();
        assert!(matches!(err, PlaybackError::DataStacking(_)));
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut table = SeriesTable::new(ts(1));
        table.insert_column("x", vec![1.0.into()]).unwrap();
        table.insert_column("x", vec![2.0.into()]).unwrap();
        assert_eq!(table.column_names(), vec!["x"]);
        assert_eq!(table.row(0).unwrap(), vec![&SampleValue::Number(2.0)]);
    }

    #[test]
    fn test_concat_fills_missing_columns() {
        let mut a = SeriesTable::new(ts(2));
        a.insert_column("x", vec![1.0.into(), 2.0.into()]).unwrap();
        a.insert_column("y", vec!["a".into(), "b".into()]).unwrap();

        let mut b = SeriesTable::new(ts(1));
        b.insert_column("z", vec![9.0.into()]).unwrap();
        b.insert_column("x", vec![3.0.into()]).unwrap();

        let merged = SeriesTable::concat(vec![a, b]).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.column_names(), vec!["x", "y", "z"]);
        assert_eq!(
            merged.column("x").unwrap().values,
            vec![1.0.into(), 2.0.into(), 3.0.into()]
        );
        assert!(merged.column("y").unwrap().values[2].is_null());
        assert!(merged.column("z").unwrap().values[..2].iter().all(SampleValue::is_null));
    }

    #[test]
    fn test_concat_nothing_fails() {
        assert!(matches!(
            SeriesTable::concat(Vec::new()),
            Err(PlaybackError::DataStacking(_))
        ));
    }
}
