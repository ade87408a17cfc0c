use std::sync::RwLock;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use crate::db::PhotoRecord;
use crate::vector::EmbeddingVector;

/// 存储层错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    /// 持久化的记录无法解码
    #[error("记录损坏 ({id}): {reason}")]
    Corrupt { id: String, reason: String },
}

/// 扫描返回的一行：照片 ID 与其嵌入向量
#[derive(Debug, Clone)]
pub struct ScanRow {
    pub id: String,
    pub embedding: EmbeddingVector,
}

/// 原生最近邻查询的命中结果
///
/// distance 使用存储自身的度量，越小越近，与扫描路径的余弦分数不可混用
#[derive(Debug, Clone)]
pub struct NearestHit {
    pub id: String,
    pub distance: f32,
}

/// 存储端的向量距离查询能力
#[async_trait]
pub trait NearestQuery: Send + Sync {
    /// 返回与查询向量距离最小的一条记录，空库返回 None
    async fn nearest(&self, query: &EmbeddingVector) -> Result<Option<NearestHit>, StoreError>;
}

/// 照片元数据存储
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 原子写入一条新记录，不存在更新语义
    async fn create(&self, record: &PhotoRecord) -> Result<(), StoreError>;

    /// 按 ID 读取完整记录
    async fn fetch(&self, id: &str) -> Result<Option<PhotoRecord>, StoreError>;

    /// 惰性枚举所有带嵌入的行
    ///
    /// 枚举顺序是平分时的裁决依据，同一存储实例必须保持稳定；
    /// 扫描期间并发写入的行可能被看到也可能看不到
    fn scan_embeddings(&self) -> BoxStream<'_, Result<ScanRow, StoreError>>;

    /// 原生向量查询能力，在存储构造时即固定
    fn nearest(&self) -> Option<&dyn NearestQuery> {
        None
    }
}

/// 内存记录存储，按插入顺序枚举
///
/// 自带精确的余弦距离查询（distance = 1 - cosine），在测试中
/// 同时充当原生查询路径和扫描路径的对照实现
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<PhotoRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &PhotoRecord) -> Result<(), StoreError> {
        self.records.write().expect("记录锁中毒").push(record.clone());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<PhotoRecord>, StoreError> {
        let records = self.records.read().expect("记录锁中毒");
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn scan_embeddings(&self) -> BoxStream<'_, Result<ScanRow, StoreError>> {
        let rows: Vec<_> = self
            .records
            .read()
            .expect("记录锁中毒")
            .iter()
            .map(|r| ScanRow { id: r.id.clone(), embedding: r.embedding.clone() })
            .collect();
        stream::iter(rows).map(Ok).boxed()
    }

    fn nearest(&self) -> Option<&dyn NearestQuery> {
        Some(self)
    }
}

#[async_trait]
impl NearestQuery for MemoryRecordStore {
    async fn nearest(&self, query: &EmbeddingVector) -> Result<Option<NearestHit>, StoreError> {
        let records = self.records.read().expect("记录锁中毒");
        let mut best: Option<NearestHit> = None;
        for record in records.iter() {
            // 无法比较的行由存储自身校验规则剔除
            let Ok(similarity) = query.cosine_similarity(&record.embedding) else {
                continue;
            };
            let distance = 1. - similarity;
            match &best {
                Some(b) if distance >= b.distance => {}
                _ => best = Some(NearestHit { id: record.id.clone(), distance }),
            }
        }
        Ok(best)
    }
}
