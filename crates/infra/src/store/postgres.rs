//! Postgres-backed document store.
//!
//! Items, areas and tags live in one table each; checkout history is an
//! append-only child table ordered by a sequence column.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `DuplicateKey` (constraint name) |
//! | Database (check violation) | `23514` | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |
//!
//! ## Atomic stock movements
//!
//! A movement is a single `UPDATE ... WHERE available + $delta BETWEEN 0 AND
//! quantity` (evaluated in NUMERIC), followed by the history insert in the
//! same transaction. A concurrent movement on the same row waits on the row
//! lock and then re-evaluates the predicate against the committed value. When
//! the update matches nothing, the row is locked and the movement is projected
//! against it, so rejections report the same error as the in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_core::{AreaId, DomainError, ItemId, Reference, TagId, UserId};
use stockroom_inventory::{
    Area, AreaFilter, CheckoutEntry, Direction, Item, ItemFilter, ItemPatch, StockMovement, Tag,
    TagFilter,
};

use super::{InventoryStore, StoreError};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const ITEM_COLUMNS: &str =
    "item_id, public_id, name, quantity, available, area_id, tags, meta, date_added";
const AREA_COLUMNS: &str = "area_id, public_id, name, parent_id, children";

/// Postgres-backed inventory store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and apply pending migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;

        info!("connected to postgres and applied migrations");
        Ok(Self { pool })
    }

    async fn load_history(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<CheckoutEntry>>, StoreError> {
        let mut history: HashMap<Uuid, Vec<CheckoutEntry>> = HashMap::new();
        if ids.is_empty() {
            return Ok(history);
        }

        let rows = sqlx::query(
            r#"
            SELECT item_id, user_ref, direction, quantity, occurred_at
            FROM checkout_history
            WHERE item_id = ANY($1)
            ORDER BY seq ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_history", e))?;

        for row in rows {
            let item_id: Uuid = row.try_get("item_id").map_err(|e| map_sqlx_error("load_history", e))?;
            let entry = history_entry_from_row(&row)?;
            history.entry(item_id).or_default().push(entry);
        }
        Ok(history)
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Item>, StoreError> {
        let mut items = rows
            .iter()
            .map(item_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = items.iter().map(|i| *i.item_id.as_uuid()).collect();
        let mut history = self.load_history(&ids).await?;
        for item in &mut items {
            item.checkout_history = history.remove(item.item_id.as_uuid()).unwrap_or_default();
        }
        Ok(items)
    }

    async fn require_item(&self, id: ItemId) -> Result<Item, StoreError> {
        self.get_item(id).await?.ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, item), fields(item_id = %item.item_id, public_id = item.public_id), err)]
    async fn insert_item(&self, item: Item) -> Result<Item, StoreError> {
        let tags: Vec<Uuid> = item.tags.iter().map(|t| *t.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO items (item_id, public_id, name, quantity, available, area_id, tags, meta, date_added)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.item_id.as_uuid())
        .bind(item.public_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.available)
        .bind(item.area.map(Uuid::from))
        .bind(&tags)
        .bind(Json(&item.meta))
        .bind(item.date_added)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self), err)]
    async fn find_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM items WHERE TRUE"));
        if let Some(id) = filter.item {
            qb.push(" AND item_id = ").push_bind(*id.as_uuid());
        }
        if !filter.tags_all.is_empty() {
            let tags: Vec<Uuid> = filter.tags_all.iter().map(|t| *t.as_uuid()).collect();
            qb.push(" AND tags @> ").push_bind(tags);
        }
        if let Some(area) = filter.area {
            qb.push(" AND area_id = ").push_bind(*area.as_uuid());
        }
        match filter.orphaned {
            Some(true) => {
                qb.push(" AND area_id IS NULL");
            }
            Some(false) => {
                qb.push(" AND area_id IS NOT NULL");
            }
            None => {}
        }
        if let Some(name) = &filter.name {
            qb.push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(name)))
                .push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY public_id ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_items", e))?;

        let items = self.hydrate(rows).await?;
        Ok(items)
    }

    async fn item_id_by_public(&self, public_id: i64) -> Result<Option<ItemId>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT item_id FROM items WHERE public_id = $1")
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("item_id_by_public", e))?;
        Ok(id.map(ItemId::from_uuid))
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock: concurrent patches and movements on this item serialize here.
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE item_id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_item", e))?;

        let Some(row) = row else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        };

        let mut item = item_from_row(&row)?;
        if let Err(e) = patch.apply(&mut item) {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e.into());
        }

        let tags: Vec<Uuid> = item.tags.iter().map(|t| *t.as_uuid()).collect();
        sqlx::query(
            r#"
            UPDATE items
            SET name = $2, quantity = $3, available = $4, area_id = $5, tags = $6, meta = $7
            WHERE item_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.available)
        .bind(item.area.map(Uuid::from))
        .bind(&tags)
        .bind(Json(&item.meta))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.require_item(id).await
    }

    #[instrument(
        skip(self, movement),
        fields(item_id = %id, direction = %movement.direction(), quantity = movement.quantity()),
        err
    )]
    async fn apply_movement(
        &self,
        id: ItemId,
        movement: &StockMovement,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let delta = movement.delta();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // NUMERIC keeps the predicate from overflowing BIGINT on huge deltas.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE items
            SET available = available + $2
            WHERE item_id = $1 AND available::numeric + $2::numeric BETWEEN 0 AND quantity
            RETURNING available
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("apply_movement", e))?;

        if updated.is_none() {
            // Either the item is missing or the predicate failed. Decide on the
            // locked row, which may have moved since the update missed.
            let current = sqlx::query(
                "SELECT available, quantity FROM items WHERE item_id = $1 FOR UPDATE",
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;

            let Some(current) = current else {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::NotFound);
            };
            let available: i64 = current
                .try_get("available")
                .map_err(|e| map_sqlx_error("apply_movement", e))?;
            let quantity: i64 = current
                .try_get("quantity")
                .map_err(|e| map_sqlx_error("apply_movement", e))?;

            let projected = match movement.project(available, quantity) {
                Ok(projected) => projected,
                Err(e) => {
                    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                    return Err(e.into());
                }
            };

            sqlx::query("UPDATE items SET available = $2 WHERE item_id = $1")
                .bind(id.as_uuid())
                .bind(projected)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("apply_movement", e))?;
        }

        sqlx::query(
            r#"
            INSERT INTO checkout_history (item_id, user_ref, direction, quantity, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(Json(movement.user()))
        .bind(movement.direction().as_str())
        .bind(movement.quantity())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_history", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        self.require_item(id).await
    }

    #[instrument(skip(self), fields(area_id = %area), err)]
    async fn orphan_items_in_area(&self, area: AreaId) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE items SET area_id = NULL WHERE area_id = $1")
            .bind(area.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("orphan_items_in_area", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tag_id = %tag), err)]
    async fn detach_tag(&self, tag: TagId) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE items SET tags = array_remove(tags, $1) WHERE $1 = ANY(tags)")
            .bind(tag.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("detach_tag", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, area), fields(area_id = %area.area_id, public_id = area.public_id), err)]
    async fn insert_area(&self, area: Area) -> Result<Area, StoreError> {
        let children: Vec<Uuid> = area.children.iter().map(|c| *c.as_uuid()).collect();
        sqlx::query(
            r#"
            INSERT INTO areas (area_id, public_id, name, parent_id, children)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(area.area_id.as_uuid())
        .bind(area.public_id)
        .bind(&area.name)
        .bind(area.parent.map(Uuid::from))
        .bind(&children)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_area", e))?;
        Ok(area)
    }

    async fn find_areas(&self, filter: &AreaFilter) -> Result<Vec<Area>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {AREA_COLUMNS} FROM areas WHERE TRUE"));
        if let Some(id) = filter.area {
            qb.push(" AND area_id = ").push_bind(*id.as_uuid());
        }
        if let Some(parent) = filter.parent {
            qb.push(" AND parent_id = ").push_bind(*parent.as_uuid());
        }
        if filter.top_level {
            qb.push(" AND parent_id IS NULL");
        }
        if filter.bottom_level {
            qb.push(" AND cardinality(children) = 0");
        }
        qb.push(" ORDER BY public_id ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_areas", e))?;
        rows.iter().map(area_from_row).collect()
    }

    async fn area_id_by_public(&self, public_id: i64) -> Result<Option<AreaId>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT area_id FROM areas WHERE public_id = $1")
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("area_id_by_public", e))?;
        Ok(id.map(AreaId::from_uuid))
    }

    #[instrument(skip(self), fields(parent = %parent, child = %child), err)]
    async fn add_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE areas
            SET children = CASE WHEN $2 = ANY(children) THEN children ELSE array_append(children, $2) END
            WHERE area_id = $1
            "#,
        )
        .bind(parent.as_uuid())
        .bind(child.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_child", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(parent = %parent, child = %child), err)]
    async fn remove_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE areas SET children = array_remove(children, $2) WHERE area_id = $1")
            .bind(parent.as_uuid())
            .bind(child.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_child", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(area_id = %id), err)]
    async fn update_area(
        &self,
        id: AreaId,
        name: Option<String>,
        parent: Option<Option<AreaId>>,
    ) -> Result<Area, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE areas
            SET name = COALESCE($2, name),
                parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END
            WHERE area_id = $1
            RETURNING {AREA_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(name)
        .bind(parent.is_some())
        .bind(parent.flatten().map(Uuid::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_area", e))?;

        match row {
            Some(row) => area_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), fields(area_id = %id), err)]
    async fn delete_area(&self, id: AreaId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM areas WHERE area_id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_area", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, tag), fields(tag = %tag.name), err)]
    async fn insert_tag(&self, tag: Tag) -> Result<Tag, StoreError> {
        sqlx::query("INSERT INTO tags (tag_id, name) VALUES ($1, $2)")
            .bind(tag.tag_id.as_uuid())
            .bind(&tag.name)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_tag", e))?;
        Ok(tag)
    }

    async fn find_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT tag_id, name FROM tags WHERE TRUE");
        if let Some(id) = filter.tag {
            qb.push(" AND tag_id = ").push_bind(*id.as_uuid());
        }
        if let Some(name) = &filter.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        qb.push(" ORDER BY name ASC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tags", e))?;

        rows.iter()
            .map(|row| {
                Ok(Tag {
                    tag_id: TagId::from_uuid(row.try_get("tag_id").map_err(|e| map_sqlx_error("find_tags", e))?),
                    name: row.try_get("name").map_err(|e| map_sqlx_error("find_tags", e))?,
                })
            })
            .collect()
    }

    async fn tag_id_by_name(&self, name: &str) -> Result<Option<TagId>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT tag_id FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("tag_id_by_name", e))?;
        Ok(id.map(TagId::from_uuid))
    }

    #[instrument(skip(self), fields(tag_id = %id), err)]
    async fn delete_tag(&self, id: TagId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tags WHERE tag_id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_tag", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("postgres pool closed");
    }
}

// SQLx row mapping

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let decode = |e| map_sqlx_error("decode_item", e);
    let tags: Vec<Uuid> = row.try_get("tags").map_err(decode)?;
    let Json(meta): Json<Map<String, JsonValue>> = row.try_get("meta").map_err(decode)?;
    let area: Option<Uuid> = row.try_get("area_id").map_err(decode)?;
    Ok(Item {
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        public_id: row.try_get("public_id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        quantity: row.try_get("quantity").map_err(decode)?,
        available: row.try_get("available").map_err(decode)?,
        area: area.map(AreaId::from_uuid),
        tags: tags.into_iter().map(TagId::from_uuid).collect(),
        meta,
        checkout_history: Vec::new(),
        date_added: row.try_get("date_added").map_err(decode)?,
    })
}

fn area_from_row(row: &PgRow) -> Result<Area, StoreError> {
    let decode = |e| map_sqlx_error("decode_area", e);
    let parent: Option<Uuid> = row.try_get("parent_id").map_err(decode)?;
    let children: Vec<Uuid> = row.try_get("children").map_err(decode)?;
    Ok(Area {
        area_id: AreaId::from_uuid(row.try_get("area_id").map_err(decode)?),
        public_id: row.try_get("public_id").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        parent: parent.map(AreaId::from_uuid),
        children: children.into_iter().map(AreaId::from_uuid).collect(),
    })
}

fn history_entry_from_row(row: &PgRow) -> Result<CheckoutEntry, StoreError> {
    let decode = |e| map_sqlx_error("decode_history", e);
    let Json(user): Json<Reference<UserId>> = row.try_get("user_ref").map_err(decode)?;
    let direction: String = row.try_get("direction").map_err(decode)?;
    let checking: Direction = direction
        .parse()
        .map_err(|e: DomainError| StoreError::Backend(e.to_string()))?;
    Ok(CheckoutEntry {
        user,
        time: row.try_get("occurred_at").map_err(decode)?,
        checking,
        quantity: row.try_get("quantity").map_err(decode)?,
    })
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let field = match db_err.constraint() {
                    Some(c) if c.contains("public_id") => "id".to_string(),
                    Some(c) if c.contains("name") => "name".to_string(),
                    Some(c) => c.to_string(),
                    None => "unknown".to_string(),
                };
                StoreError::DuplicateKey(field)
            } else {
                StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }
}
