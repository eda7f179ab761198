//! 书架与访问权限

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::dto::{BookDto, LibraryItemDto};
use crate::error::Result;
use crate::models::{Book, ItemType};

#[derive(sqlx::FromRow)]
struct LibraryRow {
    #[sqlx(flatten)]
    book: Book,
    granted_at: DateTime<Utc>,
}

/// 商品对应的图书：单本即自身，套装为其全部成员
pub async fn book_ids_for_item(
    conn: &mut PgConnection,
    item_type: ItemType,
    item_id: Uuid,
) -> Result<Vec<Uuid>> {
    match item_type {
        ItemType::Book => Ok(vec![item_id]),
        ItemType::Bundle => {
            let ids = sqlx::query_scalar::<_, Uuid>(
                "SELECT book_id FROM bundle_books WHERE bundle_id = $1 ORDER BY book_id",
            )
            .bind(item_id)
            .fetch_all(conn)
            .await?;
            Ok(ids)
        }
    }
}

/// 将图书加入书架，已拥有的跳过；返回新增数量
pub async fn grant_books(
    conn: &mut PgConnection,
    user_id: Uuid,
    book_ids: &[Uuid],
    purchase_id: Option<Uuid>,
) -> Result<u64> {
    if book_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO user_library (user_id, book_id, purchase_id)
        SELECT $1, book_id, $3 FROM UNNEST($2::uuid[]) AS t(book_id)
        ON CONFLICT (user_id, book_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(book_ids)
    .bind(purchase_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn has_access(pool: &PgPool, user_id: Uuid, book_id: Uuid) -> Result<bool> {
    let owned = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM user_library WHERE user_id = $1 AND book_id = $2)",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_one(pool)
    .await?;
    Ok(owned)
}

/// 用户是否已拥有商品；套装要求拥有全部成员
pub async fn user_owns_item(
    pool: &PgPool,
    user_id: Uuid,
    item_type: ItemType,
    item_id: Uuid,
) -> Result<bool> {
    match item_type {
        ItemType::Book => has_access(pool, user_id, item_id).await,
        ItemType::Bundle => {
            let owned = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(SELECT 1 FROM bundle_books WHERE bundle_id = $2)
                   AND NOT EXISTS(
                       SELECT 1 FROM bundle_books bb
                       LEFT JOIN user_library ul
                              ON ul.book_id = bb.book_id AND ul.user_id = $1
                       WHERE bb.bundle_id = $2 AND ul.book_id IS NULL
                   )
                "#,
            )
            .bind(user_id)
            .bind(item_id)
            .fetch_one(pool)
            .await?;
            Ok(owned)
        }
    }
}

/// 用户书架，最近获得的在前
pub async fn list(pool: &PgPool, user_id: Uuid) -> Result<Vec<LibraryItemDto>> {
    let rows = sqlx::query_as::<_, LibraryRow>(
        r#"
        SELECT b.id, b.title, b.author, b.description, b.cover_url, b.file_key,
               b.price_cents, b.currency, b.published, b.created_at, b.updated_at,
               ul.granted_at
        FROM user_library ul
        JOIN books b ON b.id = ul.book_id
        WHERE ul.user_id = $1
        ORDER BY ul.granted_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| LibraryItemDto {
            book: BookDto::public(row.book),
            granted_at: row.granted_at,
        })
        .collect())
}

/// 书名列表（Telegram /library 使用）
pub async fn titles(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<String>> {
    let titles = sqlx::query_scalar::<_, String>(
        r#"
        SELECT b.title FROM user_library ul
        JOIN books b ON b.id = ul.book_id
        WHERE ul.user_id = $1
        ORDER BY ul.granted_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(titles)
}
