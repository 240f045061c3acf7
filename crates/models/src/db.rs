use std::path::Path;

use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::debug;

use crate::errors::ModelError;

/// Open (creating if missing) the sqlite database file at `path`.
///
/// The path is handed to sqlx as a filename, never through a URL, so `%`
/// and `?` in it are taken literally. A single pooled connection keeps every
/// statement strictly serialized, which is all the write ordering the table
/// driver relies on.
pub async fn connect_sqlite(path: &Path, sqlx_logging: bool) -> Result<DatabaseConnection, ModelError> {
    let mut opts = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    if !sqlx_logging {
        opts = opts.disable_statement_logging();
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect_with(opts)
        .await
        .map_err(|e| ModelError::Db(e.to_string()))?;
    debug!(path = %path.display(), "sqlite pool connected");
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

pub async fn connect_url(url: &str, sqlx_logging: bool) -> Result<DatabaseConnection, ModelError> {
    let mut opts = ConnectOptions::new(url.to_owned());
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(sqlx_logging);
    let db = Database::connect(opts).await?;
    debug!(url, "database connected");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_path_is_taken_literally() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("models_db_{}", uuid::Uuid::new_v4()));
        let dir = root.join("d%41").join("q?x");
        tokio::fs::create_dir_all(&dir).await?;
        let file = dir.join("channels.db");

        let db = connect_sqlite(&file, false).await?;
        crate::channel_config::ensure_table(&db).await?;
        db.close().await?;

        assert!(tokio::fs::metadata(&file).await?.is_file());
        assert!(tokio::fs::metadata(root.join("dA")).await.is_err());

        let _ = tokio::fs::remove_dir_all(root).await;
        Ok(())
    }
}
