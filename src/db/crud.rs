use futures::stream::BoxStream;
use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::model::{EmbeddingRow, PhotoRow};

/// 插入照片记录
pub async fn insert_photo<'c, E>(executor: E, row: &PhotoRow) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO photo (id, filename, url, tags, upload_date, create_date, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.filename)
    .bind(&row.url)
    .bind(&row.tags)
    .bind(row.upload_date)
    .bind(row.create_date)
    .bind(&row.embedding)
    .execute(executor)
    .await?;

    Ok(())
}

/// 按 ID 查询照片
pub async fn get_photo(executor: &SqlitePool, id: &str) -> Result<Option<PhotoRow>> {
    sqlx::query_as::<_, PhotoRow>(
        r#"
        SELECT id, filename, url, tags, upload_date, create_date, embedding
        FROM photo WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 惰性枚举所有带嵌入的行
///
/// 按 rowid 即插入顺序返回，这个顺序是检索平分时的裁决依据；
/// 嵌入为空的行不是检索候选，在这里就被过滤掉
pub fn scan_embeddings(executor: &SqlitePool) -> BoxStream<'_, Result<EmbeddingRow>> {
    sqlx::query_as::<_, EmbeddingRow>(
        r#"
        SELECT id, embedding FROM photo
        WHERE embedding IS NOT NULL
        ORDER BY rowid ASC
        "#,
    )
    .fetch(executor)
}

/// 查询照片总数
pub async fn count_photos(executor: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM photo")
        .fetch_one(executor)
        .await?;
    Ok(count)
}
