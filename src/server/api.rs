use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use log::info;

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::embed::Embedder;
use crate::metrics;
use crate::searcher::MatchMethod;
use crate::store::RecordStore;

/// 按文本检索最相似的一张照片
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    info!("正在检索: {}", request.text);

    let query = state.embedder.embed_text(&request.text).await?;
    let result = state.searcher.find_best_match(&query).await?;

    let method = match result.as_ref().map(|r| r.method) {
        Some(MatchMethod::NativeDistance) => "native_distance",
        _ => "cosine_scan",
    };
    metrics::observe_search(
        method,
        start.elapsed().as_secs_f32(),
        result.as_ref().map(|r| r.score),
    );

    let item = match result {
        Some(result) => {
            let record = state.store.fetch(&result.id).await?;
            Some(MatchItem::new(
                result,
                record.as_ref().map(|r| r.filename.clone()),
                record.map(|r| r.url),
            ))
        }
        None => None,
    };

    Ok(Json(SearchResponse { time: start.elapsed().as_millis(), result: item }))
}
