use std::sync::Arc;

use crate::embed::Embedder;
use crate::searcher::Searcher;
use crate::store::RecordStore;

/// 应用状态
pub struct AppState {
    /// 相似度检索引擎
    pub searcher: Searcher,
    /// 记录存储，用于补全匹配结果的元数据
    pub store: Arc<dyn RecordStore>,
    /// 嵌入模型客户端
    pub embedder: Arc<dyn Embedder>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        searcher: Searcher,
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Arc<Self> {
        Arc::new(AppState { searcher, store, embedder })
    }
}
