use std::path::Path;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use super::model::{PhotoRecord, PhotoRow};
use super::{Database, crud, init_db};
use crate::store::{RecordStore, ScanRow, StoreError};
use crate::vector::EmbeddingVector;

/// SQLite 记录存储
///
/// 没有原生向量查询能力，检索走全量扫描路径；
/// 枚举顺序为 rowid 即插入顺序
pub struct SqliteRecordStore {
    pool: Database,
}

impl SqliteRecordStore {
    /// 打开（必要时创建）数据库
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let pool = init_db(path).await?;
        Ok(Self { pool })
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        Ok(crud::count_photos(&self.pool).await?)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, record: &PhotoRecord) -> Result<(), StoreError> {
        let row = PhotoRow::from_record(record);
        crud::insert_photo(&self.pool, &row).await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<PhotoRecord>, StoreError> {
        match crud::get_photo(&self.pool, id).await? {
            Some(row) => Ok(Some(row.into_record()?)),
            None => Ok(None),
        }
    }

    fn scan_embeddings(&self) -> BoxStream<'_, Result<ScanRow, StoreError>> {
        crud::scan_embeddings(&self.pool)
            .map(|row| {
                let row = row?;
                let embedding = EmbeddingVector::from_blob(&row.embedding).map_err(|e| {
                    StoreError::Corrupt { id: row.id.clone(), reason: e.to_string() }
                })?;
                Ok(ScanRow { id: row.id, embedding })
            })
            .boxed()
    }
}
