//! 图书 API 处理器
//!
//! 公开接口只返回已上架图书并走 Redis 缓存；后台接口可见全部图书。

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bookstore_shared::cache::CacheKey;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    ApiResponse, BookDto, BookListQuery, CreateBookRequest, DeletedResponse, PageResponse,
    UpdateBookRequest,
};
use crate::error::{ApiError, Result};
use crate::models::{Book, ItemType};
use crate::service::catalog::{self, BOOK_COLUMNS};
use crate::state::AppState;
use crate::storage::validate_key;

const DEFAULT_CURRENCY: &str = "ETB";

/// 按标题/作者模糊搜索并分页
async fn query_books(
    pool: &PgPool,
    query: &BookListQuery,
    published_only: bool,
) -> Result<PageResponse<Book>> {
    let params = query.pagination();
    let pattern = query.search_pattern();

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM books
        WHERE (published OR NOT $1)
          AND ($2::text IS NULL OR title ILIKE $2 ESCAPE '\' OR author ILIKE $2 ESCAPE '\')
        "#,
    )
    .bind(published_only)
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        r#"
        SELECT {} FROM books
        WHERE (published OR NOT $1)
          AND ($2::text IS NULL OR title ILIKE $2 ESCAPE '\' OR author ILIKE $2 ESCAPE '\')
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        BOOK_COLUMNS
    );
    let items = sqlx::query_as::<_, Book>(&sql)
        .bind(published_only)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

    Ok(PageResponse::new(items, total, params.page(), params.limit()))
}

fn map_page(page: PageResponse<Book>, map: fn(Book) -> BookDto) -> PageResponse<BookDto> {
    PageResponse {
        items: page.items.into_iter().map(map).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
    }
}

/// 已上架图书列表
///
/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookListQuery>,
) -> Result<Json<ApiResponse<PageResponse<BookDto>>>> {
    let params = query.pagination();
    let key = CacheKey::book_list(query.search_term(), params.page(), params.limit());

    let page = catalog::read_through(&state.cache, &key, async {
        let page = query_books(&state.pool, &query, true).await?;
        Ok::<_, ApiError>(map_page(page, BookDto::public))
    })
    .await?;

    Ok(Json(ApiResponse::success(page)))
}

/// 图书详情（仅已上架）
///
/// GET /api/books/{id}
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookDto>>> {
    let key = CacheKey::book_detail(&id.to_string());
    let book = catalog::read_through(&state.cache, &key, async {
        let book = catalog::find_book(&state.pool, id, true).await?;
        Ok::<_, ApiError>(BookDto::public(book))
    })
    .await?;

    Ok(Json(ApiResponse::success(book)))
}

/// 后台图书列表（含未上架）
///
/// GET /api/admin/books
pub async fn admin_list_books(
    State(state): State<AppState>,
    Query(query): Query<BookListQuery>,
) -> Result<Json<ApiResponse<PageResponse<BookDto>>>> {
    let page = query_books(&state.pool, &query, false).await?;
    Ok(Json(ApiResponse::success(map_page(page, BookDto::admin))))
}

/// GET /api/admin/books/{id}
pub async fn admin_get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookDto>>> {
    let book = catalog::find_book(&state.pool, id, false).await?;
    Ok(Json(ApiResponse::success(BookDto::admin(book))))
}

/// 创建图书
///
/// POST /api/admin/books
pub async fn create_book(
    State(state): State<AppState>,
    Json(req): Json<CreateBookRequest>,
) -> Result<Json<ApiResponse<BookDto>>> {
    req.validate()?;
    validate_key(&req.file_key)?;

    let sql = format!(
        r#"
        INSERT INTO books
            (id, title, author, description, cover_url, file_key, price_cents, currency, published)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        BOOK_COLUMNS
    );
    let book = sqlx::query_as::<_, Book>(&sql)
        .bind(Uuid::new_v4())
        .bind(&req.title)
        .bind(&req.author)
        .bind(&req.description)
        .bind(&req.cover_url)
        .bind(&req.file_key)
        .bind(req.price_cents)
        .bind(req.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))
        .bind(req.published.unwrap_or(false))
        .fetch_one(&state.pool)
        .await?;

    catalog::invalidate_cache(&state.cache).await;
    info!(book_id = %book.id, title = %book.title, "Book created");

    Ok(Json(ApiResponse::success(BookDto::admin(book))))
}

/// 更新图书，未提供的字段保持不变
///
/// PUT /api/admin/books/{id}
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<ApiResponse<BookDto>>> {
    req.validate()?;
    if let Some(key) = req.file_key.as_deref() {
        validate_key(key)?;
    }

    let sql = format!(
        r#"
        UPDATE books SET
            title = COALESCE($2, title),
            author = COALESCE($3, author),
            description = COALESCE($4, description),
            cover_url = COALESCE($5, cover_url),
            file_key = COALESCE($6, file_key),
            price_cents = COALESCE($7, price_cents),
            currency = COALESCE($8, currency),
            published = COALESCE($9, published),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        BOOK_COLUMNS
    );
    let book = sqlx::query_as::<_, Book>(&sql)
        .bind(id)
        .bind(&req.title)
        .bind(&req.author)
        .bind(&req.description)
        .bind(&req.cover_url)
        .bind(&req.file_key)
        .bind(req.price_cents)
        .bind(&req.currency)
        .bind(req.published)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::BookNotFound(id))?;

    catalog::invalidate_cache(&state.cache).await;
    info!(book_id = %id, "Book updated");

    Ok(Json(ApiResponse::success(BookDto::admin(book))))
}

/// 切换上架状态
///
/// PATCH /api/admin/books/{id}/publish
pub async fn toggle_publish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookDto>>> {
    let sql = format!(
        "UPDATE books SET published = NOT published, updated_at = NOW() WHERE id = $1 RETURNING {}",
        BOOK_COLUMNS
    );
    let book = sqlx::query_as::<_, Book>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::BookNotFound(id))?;

    catalog::invalidate_cache(&state.cache).await;
    info!(book_id = %id, published = book.published, "Book publish state toggled");

    Ok(Json(ApiResponse::success(BookDto::admin(book))))
}

/// 删除图书
///
/// DELETE /api/admin/books/{id}
///
/// 已进入用户书架或仍属于某个套装的图书不能删除。
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>> {
    let owned: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_library WHERE book_id = $1)")
            .bind(id)
            .fetch_one(&state.pool)
            .await?;
    if owned {
        return Err(ApiError::Conflict("该图书已在用户书架中，无法删除".to_string()));
    }
    if catalog::item_in_use(&state.pool, ItemType::Book, id).await? {
        return Err(ApiError::Conflict(
            "该图书仍有未结申请或订单，无法删除".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::Conflict("该图书仍属于套装，请先调整套装成员".to_string())
            }
            _ => ApiError::Database(e),
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::BookNotFound(id));
    }

    catalog::invalidate_cache(&state.cache).await;
    info!(book_id = %id, "Book deleted");

    Ok(Json(ApiResponse::success(DeletedResponse::success())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(title: &str) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: title.into(),
            author: "Author".into(),
            description: None,
            cover_url: None,
            file_key: "books/a.pdf".into(),
            price_cents: 1000,
            currency: "ETB".into(),
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_map_page_hides_file_key_for_public() {
        let page = PageResponse::new(vec![book("A"), book("B")], 12, 2, 2);
        let mapped = map_page(page, BookDto::public);

        assert_eq!(mapped.items.len(), 2);
        assert_eq!(mapped.total, 12);
        assert_eq!(mapped.total_pages, 6);
        assert!(mapped.items.iter().all(|b| b.file_key.is_none()));
    }

    #[test]
    fn test_map_page_admin_keeps_file_key() {
        let page = PageResponse::new(vec![book("A")], 1, 1, 20);
        let mapped = map_page(page, BookDto::admin);
        assert_eq!(mapped.items[0].file_key.as_deref(), Some("books/a.pdf"));
    }
}
