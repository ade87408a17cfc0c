use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::debug;
use serde::Serialize;

use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::db::SqliteRecordStore;
use crate::embed::Embedder;
use crate::searcher::{MatchMethod, MatchResult, Searcher};
use crate::store::RecordStore;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    /// 查询文本
    pub query: String,
    /// 强制使用全量扫描路径，忽略存储的原生查询能力
    #[arg(long)]
    pub scan: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

/// 检索输出，附带可读的元数据
#[derive(Debug, Serialize)]
struct SearchOutput {
    id: String,
    score: f32,
    method: MatchMethod,
    filename: Option<String>,
    url: Option<String>,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        opts.data_dir.ensure()?;

        let embedder = self.embed.build()?;
        let query = embedder.embed_text(&self.query).await?;
        debug!("查询向量维度: {}", query.dim());

        let store = Arc::new(SqliteRecordStore::open(opts.data_dir.database()).await?);
        let searcher = Searcher::new(store.clone()).force_scan(self.scan);

        let result = searcher.find_best_match(&query).await?;
        let output = match result {
            Some(MatchResult { id, score, method }) => {
                let record = store.fetch(&id).await?;
                Some(SearchOutput {
                    id,
                    score,
                    method,
                    filename: record.as_ref().map(|r| r.filename.clone()),
                    url: record.map(|r| r.url),
                })
            }
            None => None,
        };

        print_result(&output, self)
    }
}

fn print_result(result: &Option<SearchOutput>, opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => match result {
            Some(output) => println!(
                "{:.4}\t{}\t{}\t{}",
                output.score,
                output.id,
                output.filename.as_deref().unwrap_or("-"),
                output.url.as_deref().unwrap_or("-"),
            ),
            None => println!("无匹配结果"),
        },
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
