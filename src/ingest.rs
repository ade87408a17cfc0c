use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::db::PhotoRecord;
use crate::embed::{EmbedError, Embedder};
use crate::resize;
use crate::store::{RecordStore, StoreError};

/// 单张照片的摄取错误，只影响这一张，不影响整批
#[derive(Debug, Error)]
pub enum IngestError {
    /// 源图片不可读或损坏
    #[error("解码失败 {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("嵌入生成失败 {path}: {source}")]
    Embed { path: PathBuf, source: EmbedError },
    /// blob 上传或记录写入失败
    #[error("存储失败 {path}: {source}")]
    Store { path: PathBuf, source: StoreError },
    #[error("读取源文件失败 {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// 摄取选项
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// 嵌入前的缩放比例，(0, 1]
    pub resize_factor: f32,
    /// 附加到每条记录的标签
    pub tags: Vec<String>,
    /// 缩放工作副本的存放目录，None 为系统临时目录
    pub scratch_dir: Option<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { resize_factor: 0.5, tags: vec![], scratch_dir: None }
    }
}

/// 摄取协调器：对每张照片执行 上传 → 缩放 → 嵌入 → 写记录
///
/// 不同照片的摄取互相独立，各自持有自己的临时文件、ID 和记录，
/// 可以安全并行调用
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        options: IngestOptions,
    ) -> Self {
        Self { embedder, blobs, records, options }
    }

    /// 摄取一张照片，返回新建的记录
    ///
    /// blob 上传成功之后的任何失败都会留下孤儿对象，交给外部清理；
    /// 孤儿不被任何记录引用，不影响检索正确性。
    /// 没有去重：同一文件再次摄取会得到新 ID 的新记录
    pub async fn ingest(&self, path: &Path) -> Result<PhotoRecord, IngestError> {
        let upload_date = Utc::now();
        let create_date = file_creation_date(path);
        let id = Uuid::new_v4().to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IngestError::Io { path: path.to_path_buf(), source })?;
        // 记录只能引用已存在的 blob，上传必须先于写记录完成
        let url = self
            .blobs
            .put(&blob_key(&id, path), &bytes)
            .await
            .map_err(|source| IngestError::Store { path: path.to_path_buf(), source })?;

        let embedding = {
            // 有作用域的工作副本，任何退出路径都会删除
            let mut builder = tempfile::Builder::new();
            builder.prefix("photosearch-").suffix(".png");
            let tmp = match &self.options.scratch_dir {
                Some(dir) => builder.tempfile_in(dir),
                None => builder.tempfile(),
            }
            .map_err(|source| IngestError::Io { path: path.to_path_buf(), source })?;

            resize::resize_image(path, tmp.path(), self.options.resize_factor)
                .map_err(|e| IngestError::Decode { path: path.to_path_buf(), reason: e.to_string() })?;

            self.embedder
                .embed_image(tmp.path())
                .await
                .map_err(|source| IngestError::Embed { path: path.to_path_buf(), source })?
        };
        debug!("嵌入维度: {}", embedding.dim());

        let record = PhotoRecord {
            id,
            filename: file_name(path),
            url,
            tags: self.options.tags.clone(),
            upload_date,
            create_date,
            embedding,
        };
        self.records
            .create(&record)
            .await
            .map_err(|source| IngestError::Store { path: path.to_path_buf(), source })?;

        Ok(record)
    }
}

/// blob 键：ID 加上源文件的小写扩展名
fn blob_key(id: &str, path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "jpg".to_string());
    format!("{id}.{ext}")
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

/// 读取源文件创建时间，尽力而为
///
/// 文件系统没有出生时间就退回修改时间，都读不到返回 None
fn file_creation_date(path: &Path) -> Option<DateTime<Utc>> {
    let meta = std::fs::metadata(path).ok()?;
    let time = meta.created().or_else(|_| meta.modified()).ok()?;
    Some(DateTime::from(time))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::TryStreamExt;

    use super::*;
    use crate::blob::DirBlobStore;
    use crate::store::MemoryRecordStore;
    use crate::vector::EmbeddingVector;

    /// 固定向量的嵌入器
    ///
    /// 缩放副本里已经看不到源文件名，用内容约定触发失败：
    /// 1x1 的工作副本代表"坏"照片，模拟模型推理出错
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_image(&self, path: &Path) -> Result<EmbeddingVector, EmbedError> {
            if image::open(path).is_ok_and(|img| img.width() == 1) {
                return Err(EmbedError::Response("模型拒绝".to_string()));
            }
            Ok(EmbeddingVector::new(vec![1., 0., 0.]))
        }

        async fn embed_text(&self, _text: &str) -> Result<EmbeddingVector, EmbedError> {
            Ok(EmbeddingVector::new(vec![1., 0., 0.]))
        }
    }

    struct Fixture {
        _dirs: (tempfile::TempDir, tempfile::TempDir, tempfile::TempDir),
        scratch: PathBuf,
        blob_root: PathBuf,
        photos: PathBuf,
        ingestor: Ingestor,
        records: Arc<MemoryRecordStore>,
    }

    fn fixture() -> Fixture {
        let photos = tempfile::tempdir().unwrap();
        let blobs = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let records = Arc::new(MemoryRecordStore::new());
        let ingestor = Ingestor::new(
            Arc::new(FakeEmbedder),
            Arc::new(DirBlobStore::new(blobs.path(), None).unwrap()),
            records.clone(),
            IngestOptions {
                resize_factor: 0.5,
                tags: vec!["test".to_string()],
                scratch_dir: Some(scratch.path().to_path_buf()),
            },
        );

        Fixture {
            scratch: scratch.path().to_path_buf(),
            blob_root: blobs.path().to_path_buf(),
            photos: photos.path().to_path_buf(),
            records,
            ingestor,
            _dirs: (photos, blobs, scratch),
        }
    }

    fn write_photo(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(width, width, image::Rgb([120, 80, 40]))
            .save(&path)
            .unwrap();
        path
    }

    fn dir_entry_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_ingest_success() {
        let fx = fixture();
        let path = write_photo(&fx.photos, "sunset.png", 8);

        let record = fx.ingestor.ingest(&path).await.unwrap();

        // url 引用自己的 id，blob 确实存在
        assert!(record.url.contains(&record.id));
        assert_eq!(record.filename, "sunset.png");
        assert_eq!(record.tags, ["test"]);
        assert!(record.create_date.is_some());
        assert!(fx.blob_root.join(format!("{}.png", record.id)).is_file());

        // 重新读取的记录有固定维度的嵌入
        let fetched = fx.records.fetch(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.embedding.dim(), 3);

        // 工作副本已删除
        assert_eq!(dir_entry_count(&fx.scratch), 0);
    }

    #[tokio::test]
    async fn test_ingest_no_dedup() {
        let fx = fixture();
        let path = write_photo(&fx.photos, "sunset.png", 8);

        let first = fx.ingestor.ingest(&path).await.unwrap();
        let second = fx.ingestor.ingest(&path).await.unwrap();

        assert_ne!(first.id, second.id);
        let rows: Vec<_> = fx.records.scan_embeddings().try_collect().await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_embed_failure_leaves_orphan_and_no_record() {
        let fx = fixture();
        let good1 = write_photo(&fx.photos, "one.png", 8);
        // 2x2 缩放 0.5 后是 1x1，触发 FakeEmbedder 的失败约定
        let bad = write_photo(&fx.photos, "bad.png", 2);
        let good2 = write_photo(&fx.photos, "two.png", 8);

        fx.ingestor.ingest(&good1).await.unwrap();
        let err = fx.ingestor.ingest(&bad).await.unwrap_err();
        assert!(matches!(err, IngestError::Embed { .. }));
        fx.ingestor.ingest(&good2).await.unwrap();

        // N-1 条记录；失败照片的 blob 成为孤儿，但绝不被记录引用
        let rows: Vec<_> = fx.records.scan_embeddings().try_collect().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(dir_entry_count(&fx.blob_root), 3);

        // 失败路径的工作副本同样被删除
        assert_eq!(dir_entry_count(&fx.scratch), 0);
    }

    #[tokio::test]
    async fn test_corrupt_source_aborts_after_upload() {
        let fx = fixture();
        let bad = fx.photos.join("broken.png");
        std::fs::write(&bad, b"not a png").unwrap();

        let err = fx.ingestor.ingest(&bad).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));

        // 解码在上传之后失败，blob 留作孤儿，记录没有写入
        assert_eq!(dir_entry_count(&fx.blob_root), 1);
        let rows: Vec<_> = fx.records.scan_embeddings().try_collect().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(dir_entry_count(&fx.scratch), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_io_error() {
        let fx = fixture();
        let err = fx.ingestor.ingest(&fx.photos.join("nope.png")).await.unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
        assert_eq!(dir_entry_count(&fx.blob_root), 0);
    }
}
