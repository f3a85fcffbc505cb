//! Connection gateway for resource group statements.
//!
//! The [`Backend`] trait is the only I/O boundary of this crate: it runs a
//! statement, or runs a query and yields text rows. Implementations:
//! - [`mysql::MysqlBackend`] over the MySQL wire protocol
//! - a scripted in-memory double for tests

pub mod mysql;

#[cfg(test)]
pub(crate) mod scripted;

use crate::error::DriverError;

/// One row of query output, with every value as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRow {
    /// Column names, if the cursor reports them
    pub columns: Vec<String>,
    /// Values in column order; `None` for SQL NULL
    pub values: Vec<Option<String>>,
}

impl TextRow {
    /// A row without column names.
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self {
            columns: Vec::new(),
            values,
        }
    }

    /// A row with column names.
    pub fn with_columns(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Trimmed value at `index`, or `None` if missing, NULL or blank.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values
            .get(index)?
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A row cursor. Dropping it releases the underlying result set.
pub type Rows<'a> = Box<dyn Iterator<Item = Result<TextRow, DriverError>> + 'a>;

/// Backend trait for executing resource group statements.
///
/// Failures are returned as-is; this layer never retries.
pub trait Backend: Send {
    /// Run a statement that returns no rows.
    fn execute(&mut self, statement: &str) -> Result<(), DriverError>;

    /// Run a query and return a cursor over its rows.
    fn query(&mut self, statement: &str) -> Result<Rows<'_>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_row_get() {
        let row = TextRow::new(vec![
            Some(" rg1 ".to_string()),
            None,
            Some("   ".to_string()),
        ]);
        assert_eq!(row.get(0), Some("rg1"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), None);
        assert_eq!(row.get(3), None);
    }
}
