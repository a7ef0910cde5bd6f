//! Declarative query construction for the analytical source.

use crate::DomainError;
use std::fmt;

/// Table in the analytical source, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: Option<String>,
    table: String,
}

impl TableRef {
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidIdentifier`] for an empty name.
    pub fn new(schema: Option<&str>, table: &str) -> Result<Self, DomainError> {
        if table.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier("table name is empty".into()));
        }
        let schema = match schema.map(str::trim) {
            Some("") => {
                return Err(DomainError::InvalidIdentifier("schema name is empty".into()));
            }
            other => other.map(str::to_owned),
        };
        Ok(Self {
            schema,
            table: table.trim().to_owned(),
        })
    }

    /// Quoted schema identifier, ready to splice into SQL
    #[must_use]
    pub fn schema_ident(&self) -> Option<String> {
        self.schema.as_deref().map(quote_ident)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.", quote_ident(schema))?;
        }
        f.write_str(&quote_ident(&self.table))
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `SELECT <cols|*> FROM <table> [WHERE ...]` builder
#[derive(Debug, Clone)]
pub struct SourceQuery {
    columns: Vec<String>,
    table: TableRef,
    filter: Option<(String, Vec<String>)>,
}

impl SourceQuery {
    /// Every column of `table`, no filter
    #[must_use]
    pub fn select_all(table: TableRef) -> Self {
        Self {
            columns: Vec::new(),
            table,
            filter: None,
        }
    }

    /// Named columns; an empty list selects `*`
    #[must_use]
    pub fn select<I, S>(table: TableRef, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            table,
            filter: None,
        }
    }

    /// Restrict `column` to `values`. An empty column or no values leaves
    /// the query unfiltered.
    #[must_use]
    pub fn filter<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.filter = if column.is_empty() || values.is_empty() {
            None
        } else {
            Some((column.to_owned(), values))
        };
        self
    }

    fn where_clause(&self) -> Option<String> {
        let (column, values) = self.filter.as_ref()?;
        let clause = match values.as_slice() {
            [single] => format!("WHERE {column}={}", quote_literal(single)),
            many => {
                let list: Vec<String> = many.iter().map(|v| quote_literal(v)).collect();
                format!("WHERE {column} IN({})", list.join(","))
            }
        };
        Some(clause)
    }
}

impl fmt::Display for SourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = if self.columns.is_empty() {
            "*".to_owned()
        } else {
            self.columns.join(",")
        };
        write!(f, "SELECT {columns} FROM {}", self.table)?;
        if let Some(clause) = self.where_clause() {
            write!(f, " {clause}")?;
        }
        Ok(())
    }
}
