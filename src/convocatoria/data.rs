use super::{Convocatoria, FIELDS};
use crate::{CrawlerError, Storage, Table};
use futures::TryStreamExt;
use itertools::Itertools;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::Path;

pub struct ConvocatoriaTable {
    name: String,
    pool: SqlitePool,
    dedup: bool,
}

impl ConvocatoriaTable {
    fn insert_query(&self) -> String {
        let columns = FIELDS.iter().map(|f| f.column).join(", ");
        let placeholders = FIELDS.iter().map(|_| "?").join(", ");
        if !self.dedup {
            return format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.name, columns, placeholders
            );
        }

        // Works on stores that already hold duplicates, unlike a unique index.
        format!(
            "INSERT INTO {0} ({1}) SELECT {2}
             WHERE NOT EXISTS (
                SELECT 1 FROM {0}
                WHERE IFNULL(link, '') = IFNULL(?, '')
                  AND IFNULL(name, '') = IFNULL(?, '')
                  AND IFNULL(open_date, '') = IFNULL(?, '')
             )",
            self.name, columns, placeholders
        )
    }
}

#[async_trait::async_trait]
impl Table for ConvocatoriaTable {
    type Record = Convocatoria;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !self.is_created().await? {
            let query = format!(
                "CREATE TABLE {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    {}
                 )",
                &self.name,
                FIELDS
                    .iter()
                    .map(|f| format!("{} TEXT", f.column))
                    .join(",\n                    "),
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }

        Ok(())
    }

    async fn insert_all(&self, records: &[Convocatoria]) -> Result<u64, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let query = self.insert_query();
        let mut inserted = 0;
        let mut tx = self.get_pool().begin().await?;
        for record in records {
            let mut q = sqlx::query(&query);
            for value in record.values() {
                q = q.bind(value);
            }
            if self.dedup {
                q = q
                    .bind(record.link.as_deref())
                    .bind(record.name.as_deref())
                    .bind(record.open_date.as_deref());
            }
            inserted += q.execute(&mut tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

pub struct ConvocatoriaData {
    pub path: String,
    pub convocatorias: ConvocatoriaTable,
}

impl ConvocatoriaData {
    /// Opens the store, creating the database file if needed.
    pub async fn new<P: AsRef<Path>>(
        path: P,
        dedup: bool,
    ) -> Result<ConvocatoriaData, CrawlerError> {
        Self::open(path, dedup, true).await
    }

    /// Opens an existing database file only.
    pub async fn open_existing<P: AsRef<Path>>(
        path: P,
    ) -> Result<ConvocatoriaData, CrawlerError> {
        Self::open(path, false, false).await
    }

    async fn open<P: AsRef<Path>>(
        path: P,
        dedup: bool,
        create_if_missing: bool,
    ) -> Result<ConvocatoriaData, CrawlerError> {
        let path = path.as_ref();
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create_if_missing);
        let pool = SqlitePool::connect_with(opt).await?;

        Ok(ConvocatoriaData {
            path: path.display().to_string(),
            convocatorias: ConvocatoriaTable {
                name: "convocatorias".to_string(),
                pool,
                dedup,
            },
        })
    }

    /// Every stored row with its id, oldest first.
    pub async fn all(&self) -> Result<Vec<(i64, Convocatoria)>, CrawlerError> {
        let table = &self.convocatorias;
        let query = format!(
            "SELECT id, {} FROM {} ORDER BY id",
            FIELDS.iter().map(|f| f.column).join(", "),
            table.get_name()
        );

        let mut stored = vec![];
        let mut rows = sqlx::query(&query).fetch(table.get_pool());
        while let Some(row) = rows.try_next().await? {
            let text = |column: &str| row.try_get::<Option<String>, _>(column);
            let record = Convocatoria {
                name: text("name")?,
                open_date: text("open_date")?,
                close_date: text("close_date")?,
                language: text("language")?,
                issuing_country: text("issuing_country")?,
                link: text("link")?,
                project_type: text("project_type")?,
                eligibility: text("eligibility")?,
                benefits: text("benefits")?,
            };
            stored.push((row.try_get("id")?, record));
        }

        Ok(stored)
    }
}

#[async_trait::async_trait]
impl Storage for ConvocatoriaData {
    async fn ensure_schema(&self) -> Result<(), CrawlerError> {
        let table = &self.convocatorias;
        if table.is_created().await? {
            tracing::debug!("Use table {}", table.get_name());
        } else {
            tracing::debug!("Create table {}", table.get_name());
        }
        Ok(table.create().await?)
    }

    async fn insert_batch(&self, records: &[Convocatoria]) -> Result<u64, CrawlerError> {
        Ok(self.convocatorias.insert_all(records).await?)
    }

    async fn count(&self) -> Result<u32, CrawlerError> {
        Ok(self.convocatorias.count().await?)
    }
}
