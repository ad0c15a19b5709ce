//! Postgres document store
//!
//! One row per property: `doc` holds the [`PropertyDocument`] as JSONB and
//! every upsert replaces it wholesale. Search filters run against the JSON
//! fields so the read model needs no extra columns.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
    types::Json,
    Postgres, QueryBuilder,
};
use tracing::{debug, info};

use crate::error::Result;
use crate::readmodel::document::{DocumentRecord, PropertyDocument};
use crate::readmodel::store::{DocumentSink, DocumentStore, SearchFilters, SearchPage, MAX_PAGE_SIZE};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS property_documents (\
    property_id TEXT PRIMARY KEY, \
    doc JSONB NOT NULL, \
    updated_at TIMESTAMPTZ NOT NULL)";

const CREATE_CITY_INDEX: &str = "CREATE INDEX IF NOT EXISTS property_documents_city_idx \
    ON property_documents (lower(doc->'neighborhood'->>'city'))";

const UPSERT: &str = "INSERT INTO property_documents (property_id, doc, updated_at) \
    VALUES ($1, $2, $3) \
    ON CONFLICT (property_id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = EXCLUDED.updated_at";

const SELECT_ONE: &str =
    "SELECT property_id, doc, updated_at FROM property_documents WHERE property_id = $1";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    property_id: String,
    doc: Json<PropertyDocument>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for DocumentRecord {
    fn from(row: DocumentRow) -> Self {
        Self {
            property_id: row.property_id,
            doc: row.doc.0,
            updated_at: row.updated_at,
        }
    }
}

// == Postgres Document Store ==
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    database: String,
}

impl PgDocumentStore {
    /// Connects to `database` on the server named by `url` and creates the
    /// table when missing.
    pub async fn connect(url: &str, database: &str, max_connections: u32) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?.database(database);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        let store = Self::new(pool, database);
        store.ensure_schema().await?;
        info!(database = database, "Connected to document store");
        Ok(store)
    }

    pub fn new(pool: PgPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_CITY_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    /// Full stored record, including `updated_at`.
    pub async fn record(&self, property_id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query_as::<_, DocumentRow>(SELECT_ONE)
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(DocumentRecord::from))
    }
}

#[async_trait]
impl DocumentSink for PgDocumentStore {
    async fn upsert_property_document(&self, property_id: &str, doc: &PropertyDocument) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(property_id)
            .bind(Json(doc))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        debug!(database = %self.database, property_id = property_id, "Upserted property document");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_property_document(&self, property_id: &str) -> Result<Option<PropertyDocument>> {
        Ok(self.record(property_id).await?.map(|record| record.doc))
    }

    async fn search_property_documents(
        &self,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let total: i64 = count_query(filters)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        let rows = page_query(filters, page, page_size)
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(SearchPage {
            results: rows.into_iter().map(|row| row.doc.0).collect(),
            page,
            page_size,
            total: usize::try_from(total).unwrap_or_default(),
        })
    }
}

// == Query Building ==
fn count_query(filters: &SearchFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM property_documents");
    push_filters(&mut qb, filters);
    qb
}

fn page_query(filters: &SearchFilters, page: usize, page_size: usize) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT property_id, doc, updated_at FROM property_documents");
    push_filters(&mut qb, filters);
    // Newest first, id as tie-breaker for stable paging
    qb.push(" ORDER BY updated_at DESC, property_id ASC LIMIT ");
    qb.push_bind(page_size as i64);
    qb.push(" OFFSET ");
    qb.push_bind(((page - 1) * page_size) as i64);
    qb
}

fn push_filters(qb: &mut QueryBuilder<'static, Postgres>, filters: &SearchFilters) {
    qb.push(" WHERE TRUE");

    if let Some(zone) = filters.zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
        qb.push(" AND lower(doc->'neighborhood'->>'city') = lower(");
        qb.push_bind(zone.to_string());
        qb.push(")");
    }
    if let Some(min) = filters.min_price {
        qb.push(" AND (doc->>'price')::double precision >= ");
        qb.push_bind(min);
    }
    if let Some(max) = filters.max_price {
        qb.push(" AND (doc->>'price')::double precision <= ");
        qb.push_bind(max);
    }
    if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (doc->>'title' ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR COALESCE(doc->>'description', '') ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

/// Escapes `LIKE` wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
