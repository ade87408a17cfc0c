use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 相似度计算错误
#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    /// 参与比较的向量必须维度一致
    #[error("向量维度不一致: {expected} != {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// 零向量没有方向，余弦相似度无定义
    #[error("零范数向量的余弦相似度无定义")]
    ZeroNorm,
}

/// 向量 BLOB 长度非法
#[derive(Debug, Error, PartialEq)]
#[error("向量 BLOB 长度 {0} 不是 4 的倍数")]
pub struct BlobLengthError(pub usize);

/// 固定维度的实数向量，嵌入空间中的比较单元
///
/// 由嵌入模型生成后不再修改；图片空间与文本空间的维度必须一致，
/// 跨模态比较才有意义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// 计算与另一向量的余弦相似度，范围 [-1, 1]
    ///
    /// 维度不一致或任一向量范数为零时返回错误，绝不折算成分数
    pub fn cosine_similarity(&self, other: &Self) -> Result<f32, SimilarityError> {
        if self.dim() != other.dim() {
            return Err(SimilarityError::DimensionMismatch {
                expected: self.dim(),
                got: other.dim(),
            });
        }

        let mut dot = 0f64;
        let mut norm_a = 0f64;
        let mut norm_b = 0f64;
        for (a, b) in self.0.iter().zip(&other.0) {
            dot += f64::from(*a) * f64::from(*b);
            norm_a += f64::from(*a) * f64::from(*a);
            norm_b += f64::from(*b) * f64::from(*b);
        }

        if norm_a == 0. || norm_b == 0. {
            return Err(SimilarityError::ZeroNorm);
        }

        Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
    }

    /// 编码为 f32 字节串，用于 BLOB 存储
    pub fn to_blob(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.0).to_vec()
    }

    /// 从 BLOB 解码
    pub fn from_blob(bytes: &[u8]) -> Result<Self, BlobLengthError> {
        if bytes.len() % 4 != 0 {
            return Err(BlobLengthError(bytes.len()));
        }
        Ok(Self(bytemuck::pod_collect_to_vec(bytes)))
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
