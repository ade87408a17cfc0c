use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use indicatif::ProgressBar;
use log::{info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::blob::DirBlobStore;
use crate::cli::SubCommandExtend;
use crate::config::{BlobOptions, EmbedOptions, Opts};
use crate::db::SqliteRecordStore;
use crate::ingest::{IngestOptions, Ingestor};
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub blob: BlobOptions,
    /// 照片所在目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
    /// 附加到每条记录的标签，逗号分隔
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// 嵌入前的缩放比例，(0, 1]
    #[arg(long, value_name = "FACTOR", default_value_t = 0.5, value_parser = parse_resize_factor)]
    pub resize_factor: f32,
    /// 并行摄取的照片数量，不同照片的摄取互相独立
    #[arg(short = 'j', long, default_value_t = 1)]
    pub jobs: usize,
    /// 任一照片失败时以非零状态退出，默认容忍部分失败
    #[arg(long)]
    pub strict: bool,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.data_dir.ensure()?;

        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf).expect("failed to build regex");

        let embedder = Arc::new(self.embed.build()?);
        let blob_dir = self.blob.blob_dir.clone().unwrap_or_else(|| opts.data_dir.blobs());
        let blobs = Arc::new(DirBlobStore::new(blob_dir, self.blob.blob_base_url.clone())?);
        let records = Arc::new(SqliteRecordStore::open(opts.data_dir.database()).await?);
        let ingestor = Arc::new(Ingestor::new(
            embedder,
            blobs,
            records,
            IngestOptions {
                resize_factor: self.resize_factor,
                tags: self.tags.clone(),
                scratch_dir: None,
            },
        ));

        info!("开始扫描目录: {}", self.path.display());
        let entries = WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                entry.ok().and_then(|entry| {
                    let path = entry.path();
                    if path.is_file()
                        && let Some(ext) = path.extension()
                        && re_suf.is_match(&ext.to_string_lossy())
                    {
                        return Some(path.to_path_buf());
                    }
                    None
                })
            })
            .collect::<Vec<_>>();
        info!("扫描完成，共 {} 张照片", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());

        let results = futures::stream::iter(entries)
            .map(|entry| {
                let ingestor = ingestor.clone();
                let pb = pb.clone();
                async move {
                    let result = ingestor.ingest(&entry).await;
                    match &result {
                        Ok(record) => pb.set_message(format!("{} -> {}", entry.display(), record.id)),
                        Err(e) => pb.println(format!("[ERR] {}: {}", entry.display(), e)),
                    }
                    pb.inc(1);
                    result.is_ok()
                }
            })
            .buffer_unordered(self.jobs.max(1))
            .collect::<Vec<_>>()
            .await;

        pb.finish_with_message("摄取完成");

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            warn!("{} 张照片摄取失败", failed);
            if self.strict {
                anyhow::bail!("{} 张照片摄取失败", failed);
            }
        }

        Ok(())
    }
}

fn parse_resize_factor(s: &str) -> Result<f32, String> {
    let factor: f32 = s.parse().map_err(|_| format!("无效的缩放比例: {s}"))?;
    if factor > 0. && factor <= 1. {
        Ok(factor)
    } else {
        Err(format!("缩放比例必须在 (0, 1] 内: {s}"))
    }
}
