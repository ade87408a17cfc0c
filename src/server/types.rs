use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::searcher::{MatchMethod, MatchResult};

/// 检索请求
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    /// 查询文本
    pub text: String,
}

/// 检索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 检索耗时，单位为毫秒
    pub time: u128,
    /// 最佳匹配，空库时为 null
    pub result: Option<MatchItem>,
}

/// 单条匹配，格式为 `(分数, 照片 ID)` 加产生方法
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchItem {
    pub id: String,
    /// 分数越大越相似，刻度取决于 method
    pub score: f32,
    pub method: String,
    /// 照片文件名，记录已被外部删除时为 null
    pub filename: Option<String>,
    pub url: Option<String>,
}

impl MatchItem {
    pub fn new(result: MatchResult, filename: Option<String>, url: Option<String>) -> Self {
        let method = match result.method {
            MatchMethod::NativeDistance => "native_distance",
            MatchMethod::CosineScan => "cosine_scan",
        };
        Self { id: result.id, score: result.score, method: method.to_string(), filename, url }
    }
}
