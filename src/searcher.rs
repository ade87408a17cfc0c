use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use log::{debug, warn};
use serde::Serialize;

use crate::store::{NearestQuery, RecordStore, StoreError};
use crate::vector::{EmbeddingVector, SimilarityError};

/// 产生匹配结果的检索方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// 存储端的原生距离查询
    NativeDistance,
    /// 客户端全量扫描 + 余弦相似度
    CosineScan,
}

/// 单条最佳匹配
///
/// score 越大越相似；不同 method 的分数刻度不同，不可互相比较。
/// 原生路径的 score 是存储距离取负，扫描路径是余弦相似度 [-1, 1]
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub id: String,
    pub score: f32,
    pub method: MatchMethod,
}

/// 相似度检索引擎
///
/// 策略由存储能力决定，在构造时固定：有原生向量查询就直接下推，
/// 否则退回全量扫描
pub struct Searcher {
    store: Arc<dyn RecordStore>,
    force_scan: bool,
}

impl Searcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, force_scan: false }
    }

    /// 忽略存储的原生查询能力，强制走扫描路径
    pub fn force_scan(mut self, force: bool) -> Self {
        self.force_scan = force;
        self
    }

    /// 返回与查询向量最相似的一条记录
    ///
    /// 空库返回 None，这是合法的"无匹配"结果而不是错误
    pub async fn find_best_match(
        &self,
        query: &EmbeddingVector,
    ) -> Result<Option<MatchResult>, StoreError> {
        if !self.force_scan
            && let Some(native) = self.store.nearest()
        {
            let start = Instant::now();
            let hit = native.nearest(query).await?;
            debug!("原生查询耗时: {:.2}ms", start.elapsed().as_secs_f64() * 1000.);
            return Ok(hit.map(|hit| MatchResult {
                id: hit.id,
                score: -hit.distance,
                method: MatchMethod::NativeDistance,
            }));
        }

        self.scan_best_match(query).await
    }

    /// 扫描路径：逐行计算余弦相似度并维护最大值
    ///
    /// 维度不符或零范数的行记一条告警后跳过，不中断整次查询；
    /// 平分时按存储的枚举顺序取先出现者，结果可复现
    async fn scan_best_match(
        &self,
        query: &EmbeddingVector,
    ) -> Result<Option<MatchResult>, StoreError> {
        let start = Instant::now();
        let mut rows = self.store.scan_embeddings();
        let mut best: Option<MatchResult> = None;
        let mut scanned = 0usize;
        let mut skipped = 0usize;

        while let Some(row) = rows.next().await {
            let row = row?;
            scanned += 1;
            let score = match query.cosine_similarity(&row.embedding) {
                Ok(score) => score,
                Err(e @ SimilarityError::DimensionMismatch { .. }) => {
                    warn!("跳过记录 {}: {}", row.id, e);
                    skipped += 1;
                    continue;
                }
                Err(SimilarityError::ZeroNorm) => {
                    warn!("跳过记录 {}: 零范数嵌入", row.id);
                    skipped += 1;
                    continue;
                }
            };
            match &best {
                // 严格大于才替换，先出现者赢下平分
                Some(b) if score <= b.score => {}
                _ => best = Some(MatchResult { id: row.id, score, method: MatchMethod::CosineScan }),
            }
        }

        debug!(
            "扫描 {} 行（跳过 {}），耗时 {:.2}s",
            scanned,
            skipped,
            start.elapsed().as_secs_f32()
        );
        Ok(best)
    }
}
