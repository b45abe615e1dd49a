//! Table and column listing via `information_schema`.

use std::time::Duration;

use async_trait::async_trait;
use schemascope_core::{Column, StructuralEntity, Table};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::PostgresSourceError;

/// Introspection issues one query at a time, two connections are plenty.
const MAX_CONNECTIONS: u32 = 2;

// information_schema columns are domain types (sql_identifier,
// character_data); cast to text so they decode as String.
const LIST_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE'";

const LIST_COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

pub async fn connect(
    url: &str,
    acquire_timeout: Duration,
) -> Result<PgPool, PostgresSourceError> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(PostgresSourceError::Connect)
}

/// Catalog queries the adapter needs. Enables mock injection for testing.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Base tables of `schema`, in catalog order.
    async fn table_names(&self, schema: &str) -> Result<Vec<String>, PostgresSourceError>;
    /// Columns of one table in ordinal order.
    async fn columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<Column>, PostgresSourceError>;
}

#[async_trait]
impl TableCatalog for PgPool {
    async fn table_names(&self, schema: &str) -> Result<Vec<String>, PostgresSourceError> {
        let rows: Vec<(String,)> = sqlx::query_as(LIST_TABLES_SQL)
            .bind(schema)
            .fetch_all(self)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<Column>, PostgresSourceError> {
        let rows: Vec<(String, String)> = sqlx::query_as(LIST_COLUMNS_SQL)
            .bind(schema)
            .bind(table)
            .fetch_all(self)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type)| Column { name, data_type })
            .collect())
    }
}

/// List the base tables of `schema` with their columns in ordinal order.
///
/// Failing to list tables fails the source. A table whose column query fails
/// is skipped with a warning; its siblings are still returned.
pub async fn introspect<C: TableCatalog + ?Sized>(
    catalog: &C,
    schema: &str,
) -> Result<Vec<StructuralEntity>, PostgresSourceError> {
    let tables = catalog.table_names(schema).await?;
    let mut entities = Vec::with_capacity(tables.len());
    for name in tables {
        match catalog.columns(schema, &name).await {
            Ok(columns) => entities.push(StructuralEntity::Table(Table { name, columns })),
            Err(e) => {
                tracing::warn!(
                    schema,
                    table = %name,
                    error = %e,
                    "skipping table: column listing failed"
                );
            }
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tables in catalog order, each with `(column, type)` pairs.
    struct FakeCatalog {
        tables: Vec<(&'static str, Vec<(&'static str, &'static str)>)>,
        broken: Option<&'static str>,
        listing_fails: bool,
    }

    impl FakeCatalog {
        fn new(tables: Vec<(&'static str, Vec<(&'static str, &'static str)>)>) -> Self {
            Self {
                tables,
                broken: None,
                listing_fails: false,
            }
        }
    }

    #[async_trait]
    impl TableCatalog for FakeCatalog {
        async fn table_names(&self, schema: &str) -> Result<Vec<String>, PostgresSourceError> {
            assert_eq!(schema, "public");
            if self.listing_fails {
                return Err(PostgresSourceError::Query(sqlx::Error::PoolTimedOut));
            }
            Ok(self.tables.iter().map(|(t, _)| t.to_string()).collect())
        }

        async fn columns(
            &self,
            _schema: &str,
            table: &str,
        ) -> Result<Vec<Column>, PostgresSourceError> {
            if self.broken == Some(table) {
                return Err(PostgresSourceError::Query(sqlx::Error::RowNotFound));
            }
            let (_, cols) = self
                .tables
                .iter()
                .find(|(t, _)| *t == table)
                .ok_or(PostgresSourceError::Query(sqlx::Error::RowNotFound))?;
            Ok(cols
                .iter()
                .map(|(name, data_type)| Column {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                })
                .collect())
        }
    }

    fn table(entity: &StructuralEntity) -> &Table {
        match entity {
            StructuralEntity::Table(t) => t,
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tables_and_columns_keep_catalog_order() {
        let catalog = FakeCatalog::new(vec![
            ("orders", vec![("id", "integer"), ("total", "numeric")]),
            ("customers", vec![("name", "text")]),
        ]);
        let entities = introspect(&catalog, "public").await.expect("introspect");
        let names: Vec<&str> = entities.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["orders", "customers"]);

        let cols: Vec<(&str, &str)> = table(&entities[0])
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.data_type.as_str()))
            .collect();
        assert_eq!(cols, vec![("id", "integer"), ("total", "numeric")]);
    }

    #[tokio::test]
    async fn failing_table_is_omitted_siblings_kept() {
        let mut catalog = FakeCatalog::new(vec![
            ("a", vec![("id", "integer")]),
            ("broken", vec![("id", "integer")]),
            ("c", vec![("id", "integer")]),
        ]);
        catalog.broken = Some("broken");
        let entities = introspect(&catalog, "public").await.expect("introspect");
        let names: Vec<&str> = entities.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn table_listing_failure_fails_source() {
        let mut catalog = FakeCatalog::new(vec![("a", vec![])]);
        catalog.listing_fails = true;
        assert!(introspect(&catalog, "public").await.is_err());
    }

    #[tokio::test]
    async fn table_without_columns_is_kept() {
        let catalog = FakeCatalog::new(vec![("empty", vec![])]);
        let entities = introspect(&catalog, "public").await.expect("introspect");
        assert_eq!(entities.len(), 1);
        assert!(table(&entities[0]).columns.is_empty());
    }
}
