use chrono::{DateTime, Utc};

use crate::store::StoreError;
use crate::vector::EmbeddingVector;

/// 照片记录，id 是 blob 存储与元数据存储之间的关联键
///
/// 一张成功摄取的照片对应且仅对应一条记录；记录创建后不再修改，
/// 重复摄取会生成新 id 的新记录
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    /// 摄取时生成的 UUID，与文件名无关
    pub id: String,
    pub filename: String,
    pub url: String,
    pub tags: Vec<String>,
    pub upload_date: DateTime<Utc>,
    /// 源文件创建时间，部分来源无法读取
    pub create_date: Option<DateTime<Utc>>,
    pub embedding: EmbeddingVector,
}

/// photo 表的一整行
#[derive(Debug, sqlx::FromRow)]
pub struct PhotoRow {
    pub id: String,
    pub filename: String,
    pub url: String,
    /// JSON 字符串数组
    pub tags: String,
    pub upload_date: DateTime<Utc>,
    pub create_date: Option<DateTime<Utc>>,
    pub embedding: Option<Vec<u8>>,
}

/// 扫描查询只取的两列
#[derive(Debug, sqlx::FromRow)]
pub struct EmbeddingRow {
    pub id: String,
    pub embedding: Vec<u8>,
}

impl PhotoRow {
    pub fn from_record(record: &PhotoRecord) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            url: record.url.clone(),
            tags: serde_json::to_string(&record.tags).expect("标签序列化失败"),
            upload_date: record.upload_date,
            create_date: record.create_date,
            embedding: Some(record.embedding.to_blob()),
        }
    }

    pub fn into_record(self) -> Result<PhotoRecord, StoreError> {
        let tags = serde_json::from_str(&self.tags)
            .map_err(|e| StoreError::Corrupt { id: self.id.clone(), reason: e.to_string() })?;
        let blob = self.embedding.ok_or_else(|| StoreError::Corrupt {
            id: self.id.clone(),
            reason: "嵌入缺失".to_string(),
        })?;
        let embedding = EmbeddingVector::from_blob(&blob)
            .map_err(|e| StoreError::Corrupt { id: self.id.clone(), reason: e.to_string() })?;
        Ok(PhotoRecord {
            id: self.id,
            filename: self.filename,
            url: self.url,
            tags,
            upload_date: self.upload_date,
            create_date: self.create_date,
            embedding,
        })
    }
}
