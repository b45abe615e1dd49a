//! Table and column listing via `sqlite_master` and `pragma_table_info`.

use rusqlite::{Connection, OpenFlags};
use schemascope_core::{Column, StructuralEntity, Table};

use crate::error::SqliteSourceError;

/// Catalog queries the adapter needs. Enables mock injection for testing.
pub trait SchemaCatalog {
    fn table_names(&self) -> Result<Vec<String>, SqliteSourceError>;
    fn columns(&self, table: &str) -> Result<Vec<Column>, SqliteSourceError>;
}

impl SchemaCatalog for Connection {
    fn table_names(&self) -> Result<Vec<String>, SqliteSourceError> {
        let mut stmt = self.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>, SqliteSourceError> {
        // pragma_table_info yields rows in cid order, i.e. declaration order.
        let mut stmt = self.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(Column {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

/// Open an existing database file without creating it.
pub fn open_read_only(path: &str) -> Result<Connection, SqliteSourceError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| SqliteSourceError::Open {
        path: path.to_string(),
        source,
    })
}

/// List every table with its columns, in catalog order.
///
/// Failing to list tables fails the whole source. A table whose columns
/// cannot be read is skipped with a warning; its siblings are still returned.
pub fn introspect<C: SchemaCatalog + ?Sized>(
    catalog: &C,
) -> Result<Vec<StructuralEntity>, SqliteSourceError> {
    let mut entities = Vec::new();
    for name in catalog.table_names()? {
        match catalog.columns(&name) {
            Ok(columns) => entities.push(StructuralEntity::Table(Table { name, columns })),
            Err(e) => {
                tracing::warn!(table = %name, error = %e, "skipping table: column listing failed");
            }
        }
    }
    Ok(entities)
}
