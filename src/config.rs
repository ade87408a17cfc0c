use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::embed::{EmbedError, HttpEmbedder};

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "photosearch").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

/// 嵌入服务选项
#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// 嵌入服务地址
    #[arg(long, value_name = "URL", env = "PHOTOSEARCH_EMBEDDER_URL", default_value = "http://127.0.0.1:9010")]
    pub embedder_url: String,
    /// 部署固定的嵌入维度，0 表示不校验
    #[arg(long, value_name = "DIM", default_value_t = 0)]
    pub embed_dim: usize,
    /// 嵌入请求超时，单位秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub embed_timeout: u64,
}

impl EmbedOptions {
    /// 构造 HTTP 嵌入客户端
    pub fn build(&self) -> Result<HttpEmbedder, EmbedError> {
        let dim = (self.embed_dim > 0).then_some(self.embed_dim);
        HttpEmbedder::new(&self.embedder_url, dim, Duration::from_secs(self.embed_timeout))
    }
}

/// blob 存储选项
#[derive(Parser, Debug, Clone)]
pub struct BlobOptions {
    /// blob 存储目录，默认在数据目录下
    #[arg(long, value_name = "DIR")]
    pub blob_dir: Option<PathBuf>,
    /// blob URL 前缀，默认为 file:// 本地路径
    #[arg(long, value_name = "URL")]
    pub blob_base_url: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "photosearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// photosearch 数据目录
    #[arg(short = 'c', long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 摄取目录中的照片
    Add(AddCommand),
    /// 按文本查询最相似的照片
    Search(SearchCommand),
    /// 启动 HTTP 检索服务
    Server(ServerCommand),
}

/// 数据目录
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("photosearch.db")
    }

    /// 返回默认的 blob 目录
    pub fn blobs(&self) -> PathBuf {
        self.path.join("blobs")
    }

    /// 确保数据目录存在
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
