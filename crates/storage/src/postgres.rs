//! PostgreSQL-backed catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use cube_common::{BoundingBox, Product, TimeSpan};

use crate::catalog::{Catalog, DatasetQuery, DatasetRecord};
use crate::error::{StorageError, StorageResult};

/// Database connection pool and catalog operations.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog connection from database URL.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::unavailable(format!("Connection failed: {}", e)))?;

        info!("Connected to catalog database");
        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::unavailable(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Hide a dataset from searches without deleting it.
    pub async fn archive_dataset(&self, id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE datasets SET archived = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn search(&self, query: &DatasetQuery) -> StorageResult<Vec<DatasetRecord>> {
        let (start, end) = match &query.time_range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };
        let bbox = query.bbox;

        let rows = sqlx::query_as::<_, DatasetRow>(
            "SELECT id, product, time_begin, time_end, \
             bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, metadata \
             FROM datasets \
             WHERE archived = FALSE AND product = $1 \
             AND ($2::timestamptz IS NULL OR time_end IS NULL OR time_end >= $2) \
             AND ($3::timestamptz IS NULL OR time_begin IS NULL OR time_begin <= $3) \
             AND ($4::float8 IS NULL OR bbox_min_x IS NULL OR \
                  (bbox_max_x >= $4 AND bbox_max_y >= $5 AND bbox_min_x <= $6 AND bbox_min_y <= $7)) \
             ORDER BY time_begin ASC NULLS FIRST, id ASC",
        )
        .bind(&query.product)
        .bind(start)
        .bind(end)
        .bind(bbox.map(|b| b.min_x))
        .bind(bbox.map(|b| b.min_y))
        .bind(bbox.map(|b| b.max_x))
        .bind(bbox.map(|b| b.max_y))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::unavailable(format!("Query failed: {}", e)))?;

        debug!(product = %query.product, count = rows.len(), "Catalog search");
        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_product(&self, name: &str) -> StorageResult<Product> {
        let row: Option<(Json<Product>,)> =
            sqlx::query_as("SELECT definition FROM products WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(Json(product),)| product)
            .ok_or_else(|| StorageError::ProductNotFound(name.to_string()))
    }

    async fn list_products(&self) -> StorageResult<Vec<Product>> {
        let rows: Vec<(Json<Product>,)> =
            sqlx::query_as("SELECT definition FROM products ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(Json(product),)| product).collect())
    }

    async fn add_product(&self, product: &Product) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (name, definition)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET definition = EXCLUDED.definition
            "#,
        )
        .bind(&product.name)
        .bind(Json(product))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_dataset(&self, record: &DatasetRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO datasets (
                id, product, time_begin, time_end,
                bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y,
                metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                product = EXCLUDED.product,
                time_begin = EXCLUDED.time_begin,
                time_end = EXCLUDED.time_end,
                bbox_min_x = EXCLUDED.bbox_min_x,
                bbox_min_y = EXCLUDED.bbox_min_y,
                bbox_max_x = EXCLUDED.bbox_max_x,
                bbox_max_y = EXCLUDED.bbox_max_y,
                metadata = EXCLUDED.metadata,
                archived = FALSE
            "#,
        )
        .bind(record.id)
        .bind(&record.product)
        .bind(record.time.map(|t| t.begin))
        .bind(record.time.map(|t| t.end))
        .bind(record.bbox.map(|b| b.min_x))
        .bind(record.bbox.map(|b| b.min_y))
        .bind(record.bbox.map(|b| b.max_x))
        .bind(record.bbox.map(|b| b.max_y))
        .bind(Json(&record.metadata))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Internal row type for database queries.
#[derive(FromRow)]
struct DatasetRow {
    id: Uuid,
    product: String,
    time_begin: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    bbox_min_x: Option<f64>,
    bbox_min_y: Option<f64>,
    bbox_max_x: Option<f64>,
    bbox_max_y: Option<f64>,
    metadata: Json<serde_json::Value>,
}

impl From<DatasetRow> for DatasetRecord {
    fn from(row: DatasetRow) -> Self {
        let time = match (row.time_begin, row.time_end) {
            (Some(begin), Some(end)) => Some(TimeSpan::new(begin, end)),
            (Some(at), None) | (None, Some(at)) => Some(TimeSpan::instant(at)),
            (None, None) => None,
        };
        let bbox = match (row.bbox_min_x, row.bbox_min_y, row.bbox_max_x, row.bbox_max_y) {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => {
                Some(BoundingBox::new(min_x, min_y, max_x, max_y))
            }
            _ => None,
        };

        DatasetRecord {
            id: row.id,
            product: row.product,
            time,
            bbox,
            metadata: row.metadata.0,
        }
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    name VARCHAR(200) PRIMARY KEY,
    definition JSONB NOT NULL,
    added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS datasets (
    id UUID PRIMARY KEY,
    product VARCHAR(200) NOT NULL REFERENCES products(name),
    time_begin TIMESTAMPTZ,
    time_end TIMESTAMPTZ,
    bbox_min_x DOUBLE PRECISION,
    bbox_min_y DOUBLE PRECISION,
    bbox_max_x DOUBLE PRECISION,
    bbox_max_y DOUBLE PRECISION,
    metadata JSONB NOT NULL,
    indexed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    archived BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_datasets_product_time ON datasets(product, time_begin, time_end);
CREATE INDEX IF NOT EXISTS idx_datasets_bbox ON datasets(bbox_min_x, bbox_max_x, bbox_min_y, bbox_max_y);
CREATE INDEX IF NOT EXISTS idx_datasets_archived ON datasets(archived)
"#;
