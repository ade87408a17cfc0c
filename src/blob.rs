use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::store::StoreError;

/// 照片原始字节的对象存储
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 写入对象并返回可引用的 URL
    ///
    /// 返回时写入必须已经落盘，元数据记录只能引用已存在的对象
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError>;
}

/// 本地目录实现，URL 前缀可配置
pub struct DirBlobStore {
    root: PathBuf,
    base_url: String,
}

impl DirBlobStore {
    /// 打开（必要时创建）blob 目录
    ///
    /// base_url 为 None 时退化为 file:// 根路径
    pub fn new(root: impl AsRef<Path>, base_url: Option<String>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let base_url = match base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("file://{}", root.canonicalize()?.display()),
        };
        Ok(Self { root, base_url })
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.root.join(key);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        // URL 在落盘确认之后才能交出去
        file.sync_all().await?;
        debug!("写入 blob: {} ({} 字节)", path.display(), bytes.len());
        Ok(format!("{}/{}", self.base_url, key))
    }
}
