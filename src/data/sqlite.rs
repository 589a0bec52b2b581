//! SQLite dataset interface.

use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};

use super::{Backend, DataError, DataResult, DataSetInterface};
use crate::sql::{SqlValue, Statement};

/// A dataset stored in one SQLite database file.
///
/// The database must already exist; its tables are the classes of the
/// model. Dropping the interface rolls back an open transaction and closes
/// the connection.
#[derive(Debug)]
pub struct SqliteInterface {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteInterface {
    /// Open an existing database file for reading and writing.
    pub fn open(path: &Path) -> DataResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!(path = %path.display(), "opened SQLite dataset");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Some(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> DataResult<Self> {
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Some(Connection::open_in_memory()?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run raw SQL without parameters, e.g. to create a schema.
    pub fn execute_batch(&mut self, sql: &str) -> DataResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> DataResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DataError::Closed(self.path.display().to_string()))
    }

    fn execute_raw(&self, sql: &str) -> DataResult<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|source| DataError::Execution {
                statement: sql.to_string(),
                source,
            })
    }
}

fn execution_error(statement: &Statement) -> impl FnOnce(rusqlite::Error) -> DataError + '_ {
    move |source| DataError::Execution {
        statement: statement.to_string(),
        source,
    }
}

impl DataSetInterface for SqliteInterface {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn describe(&self) -> String {
        format!("SQLite dataset {}", self.path.display())
    }

    fn execute_query(&self, statement: &Statement) -> DataResult<Vec<Vec<SqlValue>>> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "query");
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&statement.sql)
            .map_err(execution_error(statement))?;
        let width = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(statement.params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(SqlValue::from))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(execution_error(statement))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(execution_error(statement))
    }

    fn execute_update(&mut self, statement: &Statement) -> DataResult<usize> {
        tracing::trace!(sql = %statement.sql, params = ?statement.params, "update");
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(&statement.sql)
            .map_err(execution_error(statement))?;
        stmt.execute(params_from_iter(statement.params.iter()))
            .map_err(execution_error(statement))
    }

    fn begin(&mut self) -> DataResult<()> {
        self.execute_raw("BEGIN DEFERRED")
    }

    fn commit(&mut self) -> DataResult<()> {
        self.execute_raw("COMMIT")
    }

    fn rollback(&mut self) -> DataResult<()> {
        self.execute_raw("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| !conn.is_autocommit())
    }

    fn close(mut self: Box<Self>) -> DataResult<()> {
        if self.in_transaction() {
            self.rollback()?;
        }
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| DataError::Sqlite(err))?;
            tracing::debug!(path = %self.path.display(), "closed SQLite dataset");
        }
        Ok(())
    }
}

impl Drop for SqliteInterface {
    fn drop(&mut self) {
        if self.in_transaction() {
            tracing::warn!(path = %self.path.display(), "rolling back open transaction on drop");
            if let Err(err) = self.rollback() {
                tracing::warn!(error = %err, "rollback on drop failed");
            }
        }
    }
}

// =============================================================================
// Value conversion
// =============================================================================

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}
