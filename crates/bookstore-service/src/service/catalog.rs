//! 目录查询与缓存

use std::future::Future;
use std::time::Duration;

use bookstore_shared::cache::{Cache, CacheKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::{BookDto, BundleDto};
use crate::error::{ApiError, Result};
use crate::models::{Book, Bundle, ItemType, PurchaseStatus};

pub const BOOK_COLUMNS: &str = "id, title, author, description, cover_url, file_key, \
     price_cents, currency, published, created_at, updated_at";

const CATALOG_TTL: Duration = Duration::from_secs(60);

pub const BUNDLE_COLUMNS: &str =
    "id, title, description, cover_url, price_cents, currency, published, created_at, updated_at";

/// 可购买商品的价格与名称
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ItemSummary {
    pub title: String,
    pub price_cents: i64,
    pub currency: String,
}

pub async fn find_book(pool: &PgPool, id: Uuid, published_only: bool) -> Result<Book> {
    let sql = format!(
        "SELECT {} FROM books WHERE id = $1 AND (published OR NOT $2)",
        BOOK_COLUMNS
    );
    sqlx::query_as::<_, Book>(&sql)
        .bind(id)
        .bind(published_only)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::BookNotFound(id))
}

pub async fn find_bundle(pool: &PgPool, id: Uuid, published_only: bool) -> Result<Bundle> {
    let sql = format!(
        "SELECT {} FROM bundles WHERE id = $1 AND (published OR NOT $2)",
        BUNDLE_COLUMNS
    );
    sqlx::query_as::<_, Bundle>(&sql)
        .bind(id)
        .bind(published_only)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::BundleNotFound(id))
}

/// 套装成员图书；公开接口只返回已上架的
pub async fn bundle_books(pool: &PgPool, bundle_id: Uuid, published_only: bool) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT b.id, b.title, b.author, b.description, b.cover_url, b.file_key,
               b.price_cents, b.currency, b.published, b.created_at, b.updated_at
        FROM bundle_books bb
        JOIN books b ON b.id = bb.book_id
        WHERE bb.bundle_id = $1 AND (b.published OR NOT $2)
        ORDER BY b.title
        "#,
    )
    .bind(bundle_id)
    .bind(published_only)
    .fetch_all(pool)
    .await?;
    Ok(books)
}

/// 组装套装响应
pub async fn bundle_dto(pool: &PgPool, bundle: Bundle, public: bool) -> Result<BundleDto> {
    let books = bundle_books(pool, bundle.id, public).await?;
    let books = books
        .into_iter()
        .map(if public { BookDto::public } else { BookDto::admin })
        .collect();
    Ok(BundleDto::new(bundle, books))
}

/// 下单时读取已上架商品的价格快照
pub async fn published_item(pool: &PgPool, item_type: ItemType, item_id: Uuid) -> Result<ItemSummary> {
    let sql = match item_type {
        ItemType::Book => {
            "SELECT title, price_cents, currency FROM books WHERE id = $1 AND published"
        }
        ItemType::Bundle => {
            "SELECT title, price_cents, currency FROM bundles WHERE id = $1 AND published"
        }
    };

    sqlx::query_as::<_, ItemSummary>(sql)
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .ok_or(match item_type {
            ItemType::Book => ApiError::BookNotFound(item_id),
            ItemType::Bundle => ApiError::BundleNotFound(item_id),
        })
}

/// 商品名称（不论是否上架），用于通知与收据
pub async fn item_title(pool: &PgPool, item_type: ItemType, item_id: Uuid) -> Result<Option<String>> {
    let sql = match item_type {
        ItemType::Book => "SELECT title FROM books WHERE id = $1",
        ItemType::Bundle => "SELECT title FROM bundles WHERE id = $1",
    };
    let title = sqlx::query_scalar::<_, String>(sql)
        .bind(item_id)
        .fetch_optional(pool)
        .await?;
    Ok(title)
}

/// 校验图书全部存在
/// 是否仍有未结申请或订单引用该商品
pub async fn item_in_use(pool: &PgPool, item_type: ItemType, item_id: Uuid) -> Result<bool> {
    let in_use = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
                   SELECT 1 FROM purchase_requests
                   WHERE item_type = $1 AND item_id = $2 AND status = ANY($3::text[])
               )
            OR EXISTS(SELECT 1 FROM purchases WHERE item_type = $1 AND item_id = $2)
        "#,
    )
    .bind(item_type)
    .bind(item_id)
    .bind(PurchaseStatus::open_names())
    .fetch_one(pool)
    .await?;
    Ok(in_use)
}

pub async fn ensure_books_exist(conn: &mut PgConnection, book_ids: &[Uuid]) -> Result<()> {
    let mut unique = book_ids.to_vec();
    unique.sort();
    unique.dedup();

    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE id = ANY($1)")
        .bind(&unique)
        .fetch_one(conn)
        .await?;

    if found != unique.len() as i64 {
        return Err(ApiError::Validation(format!(
            "部分图书不存在（{}/{}）",
            found,
            unique.len()
        )));
    }
    Ok(())
}

/// 整体替换套装成员
pub async fn replace_bundle_books(
    conn: &mut PgConnection,
    bundle_id: Uuid,
    book_ids: &[Uuid],
) -> Result<()> {
    ensure_books_exist(&mut *conn, book_ids).await?;

    sqlx::query("DELETE FROM bundle_books WHERE bundle_id = $1")
        .bind(bundle_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO bundle_books (bundle_id, book_id)
        SELECT $1, book_id FROM UNNEST($2::uuid[]) AS t(book_id)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(bundle_id)
    .bind(book_ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// 先读缓存，未命中时执行 `load` 并回写；Redis 故障时退化为直接查库
pub async fn read_through<T, Fut>(cache: &Cache, key: &str, load: Fut) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    Fut: Future<Output = Result<T>>,
{
    match cache.get::<T>(key).await {
        Ok(Some(value)) => return Ok(value),
        Ok(None) => {}
        Err(e) => warn!(key, error = %e, "Catalog cache read failed"),
    }

    let value = load.await?;
    if let Err(e) = cache.set(key, &value, CATALOG_TTL).await {
        warn!(key, error = %e, "Catalog cache write failed");
    }
    Ok(value)
}

/// 后台写操作后清理目录缓存；失败只告警
pub async fn invalidate_cache(cache: &Cache) {
    match cache.delete_pattern(CacheKey::CATALOG_PATTERN).await {
        Ok(count) => debug!(count, "Catalog cache invalidated"),
        Err(e) => warn!(error = %e, "Failed to invalidate catalog cache"),
    }
}
