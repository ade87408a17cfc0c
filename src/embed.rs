use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::vector::EmbeddingVector;

/// 嵌入模型错误
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("嵌入服务请求失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("嵌入服务响应异常: {0}")]
    Response(String),
    /// 部署固定维度与服务返回不符
    #[error("嵌入维度不符: 期望 {expected}, 实际 {got}")]
    Dimension { expected: usize, got: usize },
    #[error("读取图片失败 {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// 嵌入模型：把图片或文本映射到同一比较空间的向量
///
/// 实现必须是无状态推理，同一实例可以被多个调用方只读共享
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector, EmbedError>;
    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector, EmbedError>;
}

/// CLIP 风格推理服务的 HTTP 客户端
///
/// 协议：`POST {base}/embed/image` 提交图片字节，
/// `POST {base}/embed/text` 提交 `{"text": ...}`，
/// 响应均为 `{"embedding": [f32, ...]}`
pub struct HttpEmbedder {
    base_url: String,
    dim: Option<usize>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// 创建客户端，超时作用于每次请求
    ///
    /// dim 为部署固定的嵌入维度，None 表示不校验
    pub fn new(base_url: &str, dim: Option<usize>, timeout: Duration) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), dim, client })
    }

    async fn parse(&self, response: reqwest::Response) -> Result<EmbeddingVector, EmbedError> {
        if !response.status().is_success() {
            return Err(EmbedError::Response(format!("HTTP {}", response.status())));
        }
        let body: EmbedResponse = response.json().await?;
        if body.embedding.is_empty() {
            return Err(EmbedError::Response("嵌入为空".to_string()));
        }
        if let Some(expected) = self.dim
            && body.embedding.len() != expected
        {
            return Err(EmbedError::Dimension { expected, got: body.embedding.len() });
        }
        Ok(EmbeddingVector::new(body.embedding))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector, EmbedError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| EmbedError::Io { path: path.to_path_buf(), source })?;
        let response = self
            .client
            .post(format!("{}/embed/image", self.base_url))
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        self.parse(response).await
    }

    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let response = self
            .client
            .post(format!("{}/embed/text", self.base_url))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        self.parse(response).await
    }
}
