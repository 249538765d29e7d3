//! Declarative table construction.
//!
//! SNMP tables are addressed column-major: the cell for row `r` of column `c`
//! lives at `base.c.r`, with the column arc before the row arc. The builder
//! computes that interleaving itself; callers declare column syntaxes once and
//! then append plain row values.
//!
//! ```
//! use minsnmp::oid;
//! use minsnmp::registry::Access;
//! use minsnmp::table::TableBuilder;
//! use minsnmp::value::{Value, ValueKind};
//!
//! let entries = TableBuilder::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1))
//!     .column(ValueKind::Integer, Access::ReadOnly)
//!     .column(ValueKind::OctetString, Access::ReadOnly)
//!     .row_value(Value::Integer(1))
//!     .row_value(Value::from("loopback"))
//!     .row_value(Value::Integer(2))
//!     .row_value(Value::from("eth0"))
//!     .build()
//!     .unwrap();
//! assert_eq!(entries.len(), 4);
//! ```

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::registry::{Access, MoEntry};
use crate::value::{Value, ValueKind};

/// One declared column: the value kind later row values must carry, plus an
/// access mode.
#[derive(Debug, Clone, Copy)]
struct ColumnSpec {
    syntax: ValueKind,
    access: Access,
}

/// Builder producing the registry entries of one table.
///
/// Row values are appended in row-major, column-minor order: all cells of
/// row 1, then all cells of row 2, and so on. Validation happens at
/// [`build`](TableBuilder::build) and is all-or-nothing; a failed build
/// produces no entries.
#[derive(Debug)]
pub struct TableBuilder {
    base: Oid,
    columns: Vec<ColumnSpec>,
    values: Vec<Value>,
    index_column: Option<usize>,
}

impl TableBuilder {
    /// Start a table rooted at `base` (the entry OID, e.g. `ifEntry`).
    pub fn new(base: Oid) -> Self {
        Self {
            base,
            columns: Vec::new(),
            values: Vec::new(),
            index_column: None,
        }
    }

    /// Declare the next column.
    pub fn column(mut self, syntax: ValueKind, access: Access) -> Self {
        self.columns.push(ColumnSpec { syntax, access });
        self
    }

    /// Append one cell value.
    pub fn row_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Take each row's index from the given 1-based Integer column instead of
    /// the row counter.
    ///
    /// The named column must be declared with [`ValueKind::Integer`] and its
    /// values must be non-negative. A column number outside the declared
    /// range fails `build()` with [`Error::ColumnCountMismatch`].
    pub fn index_column(mut self, column: usize) -> Self {
        self.index_column = Some(column);
        self
    }

    /// Validate and produce one entry per cell.
    ///
    /// Cell OIDs are `base . (column + 1) . row_index` where `row_index` is
    /// the 1-based row number unless an index column was chosen. Fails with
    /// [`Error::ColumnCountMismatch`] when the appended values are not a
    /// whole number of rows and with [`Error::TypeMismatch`] on the first
    /// cell whose kind disagrees with its column declaration.
    pub fn build(self) -> Result<Vec<MoEntry>> {
        let columns = self.columns.len();
        if columns == 0 || self.values.len() % columns != 0 {
            return Err(Error::ColumnCountMismatch {
                values: self.values.len(),
                columns,
            });
        }

        let index_column = match self.index_column {
            Some(col) => {
                let idx = col.checked_sub(1).filter(|i| *i < columns).ok_or(
                    Error::ColumnCountMismatch {
                        values: col,
                        columns,
                    },
                )?;
                if self.columns[idx].syntax != ValueKind::Integer {
                    return Err(Error::TypeMismatch {
                        row: 0,
                        column: col,
                        expected: ValueKind::Integer,
                        actual: self.columns[idx].syntax,
                    });
                }
                Some(idx)
            }
            None => None,
        };

        let rows = self.values.len() / columns;
        let mut entries = Vec::with_capacity(self.values.len());

        for (row, cells) in self.values.chunks_exact(columns).enumerate() {
            for (col, (cell, spec)) in cells.iter().zip(&self.columns).enumerate() {
                if cell.kind() != spec.syntax {
                    return Err(Error::TypeMismatch {
                        row: row + 1,
                        column: col + 1,
                        expected: spec.syntax,
                        actual: cell.kind(),
                    });
                }
            }

            let row_index = match index_column {
                Some(idx) => match cells[idx] {
                    Value::Integer(v) if v >= 0 => v as u32,
                    _ => {
                        return Err(Error::TypeMismatch {
                            row: row + 1,
                            column: idx + 1,
                            expected: ValueKind::Integer,
                            actual: cells[idx].kind(),
                        });
                    }
                },
                None => (row + 1) as u32,
            };

            for (col, (cell, spec)) in cells.iter().zip(&self.columns).enumerate() {
                let oid = self.base.child((col + 1) as u32).child(row_index);
                entries.push(MoEntry::table_cell(oid, spec.access, cell.clone()));
            }
        }

        debug_assert_eq!(entries.len(), rows * columns);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn two_by_three() -> TableBuilder {
        TableBuilder::new(oid!(1, 3, 6, 1, 99, 1))
            .column(ValueKind::Integer, Access::ReadOnly)
            .column(ValueKind::OctetString, Access::ReadOnly)
            .column(ValueKind::Gauge32, Access::ReadOnly)
            .row_value(Value::Integer(1))
            .row_value(Value::from("a"))
            .row_value(Value::Gauge32(10))
            .row_value(Value::Integer(2))
            .row_value(Value::from("b"))
            .row_value(Value::Gauge32(20))
    }

    #[test]
    fn test_build_yields_rows_times_columns_entries() {
        let entries = two_by_three().build().unwrap();
        assert_eq!(entries.len(), 6);
    }

    #[test]
    fn test_column_major_addressing() {
        let entries = two_by_three().build().unwrap();
        let base = oid!(1, 3, 6, 1, 99, 1);

        // Row r, column c lands at base.(c+1).(r+1).
        for (i, entry) in entries.iter().enumerate() {
            let row = (i / 3) as u32 + 1;
            let col = (i % 3) as u32 + 1;
            assert_eq!(entry.oid(), &base.child(col).child(row));
        }
    }

    #[test]
    fn test_cell_values_by_position() {
        let entries = two_by_three().build().unwrap();
        let base = oid!(1, 3, 6, 1, 99, 1);

        let lookup = |col: u32, row: u32| {
            entries
                .iter()
                .find(|e| e.oid() == &base.child(col).child(row))
                .map(|e| e.fetch())
        };
        assert_eq!(lookup(2, 1), Some(Value::from("a")));
        assert_eq!(lookup(2, 2), Some(Value::from("b")));
        assert_eq!(lookup(3, 2), Some(Value::Gauge32(20)));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = TableBuilder::new(oid!(1, 3))
            .column(ValueKind::Integer, Access::ReadOnly)
            .column(ValueKind::Integer, Access::ReadOnly)
            .row_value(Value::Integer(1))
            .row_value(Value::Integer(2))
            .row_value(Value::Integer(3))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnCountMismatch {
                values: 3,
                columns: 2
            }
        ));
    }

    #[test]
    fn test_no_columns_rejected() {
        let err = TableBuilder::new(oid!(1, 3)).build().unwrap_err();
        assert!(matches!(err, Error::ColumnCountMismatch { columns: 0, .. }));
    }

    #[test]
    fn test_type_mismatch_names_the_cell() {
        let err = TableBuilder::new(oid!(1, 3))
            .column(ValueKind::Integer, Access::ReadOnly)
            .column(ValueKind::OctetString, Access::ReadOnly)
            .row_value(Value::Integer(1))
            .row_value(Value::from("ok"))
            .row_value(Value::Integer(2))
            .row_value(Value::Gauge32(7)) // wrong: declared OctetString
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                row: 2,
                column: 2,
                expected: ValueKind::OctetString,
                actual: ValueKind::Gauge32,
            }
        ));
    }

    #[test]
    fn test_explicit_index_column() {
        let entries = TableBuilder::new(oid!(1, 3, 6, 1, 99, 1))
            .column(ValueKind::Integer, Access::ReadOnly)
            .column(ValueKind::OctetString, Access::ReadOnly)
            .index_column(1)
            .row_value(Value::Integer(10))
            .row_value(Value::from("ten"))
            .row_value(Value::Integer(20))
            .row_value(Value::from("twenty"))
            .build()
            .unwrap();

        let base = oid!(1, 3, 6, 1, 99, 1);
        assert!(entries.iter().any(|e| e.oid() == &base.child(2).child(10)));
        assert!(entries.iter().any(|e| e.oid() == &base.child(2).child(20)));
        // No entry at the positional row indexes.
        assert!(!entries.iter().any(|e| e.oid() == &base.child(2).child(1)));
    }

    #[test]
    fn test_index_column_must_be_integer() {
        let err = TableBuilder::new(oid!(1, 3))
            .column(ValueKind::OctetString, Access::ReadOnly)
            .index_column(1)
            .row_value(Value::from("x"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: ValueKind::Integer,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_build_produces_nothing() {
        // A build that fails returns Err and never a partial entry set;
        // callers registering via register_all keep atomicity end to end.
        let result = TableBuilder::new(oid!(1, 3))
            .column(ValueKind::Integer, Access::ReadOnly)
            .row_value(Value::from("wrong"))
            .build();
        assert!(result.is_err());
    }
}
