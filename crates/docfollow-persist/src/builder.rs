use crate::dbs::mongo::MongoPersistenceClient;
use crate::error::{PersistError, Result};

pub struct PersistClientBuilder {
    mongodb_uri: Option<String>,
    database: Option<String>,
    ensure_indexes: bool,
}

impl PersistClientBuilder {
    pub fn new() -> Self {
        Self {
            mongodb_uri: None,
            database: None,
            ensure_indexes: true,
        }
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    pub fn ensure_indexes(mut self, enabled: bool) -> Self {
        self.ensure_indexes = enabled;
        self
    }

    pub async fn build(self) -> Result<MongoPersistenceClient> {
        let mongodb_uri = self
            .mongodb_uri
            .ok_or_else(|| PersistError::Internal("mongodb_uri is required".to_string()))?;
        let database = self
            .database
            .ok_or_else(|| PersistError::Internal("database is required".to_string()))?;

        let client = MongoPersistenceClient::connect(&mongodb_uri, &database).await?;
        if self.ensure_indexes {
            client.ensure_indexes().await?;
        }
        Ok(client)
    }
}

impl Default for PersistClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
