use crate::utils;
use sqlx::{Row, SqlitePool};

#[async_trait::async_trait]
pub trait Table {
    type Record: Sync;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;

    /// Appends `records` in order. Either every record is stored or none is.
    async fn insert_all(&self, records: &[Self::Record]) -> Result<u64, sqlx::Error>;

    async fn is_created(&self) -> Result<bool, sqlx::Error> {
        utils::is_table_exists(self.get_pool(), self.get_name()).await
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}
