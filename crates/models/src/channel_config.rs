//! `channel_configs` table: one row per store key, value kept as a JSON string.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{ColumnDef, Expr, LikeExpr, OnConflict, Table};
use sea_orm::{ConnectionTrait, PaginatorTrait, QueryOrder, Set};
use tracing::debug;

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channel_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    #[sea_orm(column_type = "Text")]
    pub value: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

const LIKE_ESCAPE: char = '\\';

/// Create the table if it does not exist yet.
pub async fn ensure_table(db: &DatabaseConnection) -> Result<(), ModelError> {
    let stmt = Table::create()
        .table(Entity)
        .if_not_exists()
        .col(ColumnDef::new(Column::Key).text().not_null().primary_key())
        .col(ColumnDef::new(Column::Value).text().not_null())
        .col(
            ColumnDef::new(Column::CreatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(
            ColumnDef::new(Column::UpdatedAt)
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    let backend = db.get_database_backend();
    db.execute(backend.build(&stmt)).await?;
    debug!(table = "channel_configs", "table ensured");
    Ok(())
}

pub async fn find_value(db: &DatabaseConnection, key: &str) -> Result<Option<String>, ModelError> {
    let row = Entity::find_by_id(key.to_owned()).one(db).await?;
    Ok(row.map(|m| m.value))
}

/// Insert, or on key conflict replace the value and bump `updated_at`.
/// `created_at` keeps the time of the first insert.
pub async fn upsert(db: &DatabaseConnection, key: &str, value: String) -> Result<(), ModelError> {
    let now = Utc::now();
    let am = ActiveModel {
        key: Set(key.to_owned()),
        value: Set(value),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Entity::insert(am)
        .on_conflict(
            OnConflict::column(Column::Key)
                .update_columns([Column::Value, Column::UpdatedAt])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    debug!(key, "row upserted");
    Ok(())
}

/// Delete by key; returns whether a row was removed.
pub async fn delete(db: &DatabaseConnection, key: &str) -> Result<bool, ModelError> {
    let res = Entity::delete_by_id(key.to_owned()).exec(db).await?;
    Ok(res.rows_affected > 0)
}

/// Rows whose key starts with `prefix`, ordered by key.
///
/// `LIKE` narrows the scan; sqlite compares ASCII case-insensitively there,
/// so rows are re-checked with an exact prefix match.
pub async fn list_prefix(db: &DatabaseConnection, prefix: &str) -> Result<Vec<Model>, ModelError> {
    let mut query = Entity::find();
    if !prefix.is_empty() {
        let pattern = format!("{}%", escape_like(prefix));
        query = query.filter(Expr::col(Column::Key).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)));
    }
    let mut rows = query.order_by_asc(Column::Key).all(db).await?;
    rows.retain(|m| m.key.starts_with(prefix));
    Ok(rows)
}

pub async fn count(db: &DatabaseConnection) -> Result<u64, ModelError> {
    Ok(Entity::find().count(db).await?)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}
