use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use assert_cmd::prelude::*;
use axum::Json;
use axum::body::Bytes;
use predicates::prelude::*;
use rstest::*;
use serde_json::{Value, json};

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 按颜色词返回基向量
async fn embed_text(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default();
    let embedding = match text {
        t if t.contains("red") => vec![1., 0., 0.],
        t if t.contains("green") => vec![0., 1., 0.],
        t if t.contains("blue") => vec![0., 0., 1.],
        _ => vec![0.577, 0.577, 0.577],
    };
    Json(json!({ "embedding": embedding }))
}

/// 以平均颜色作为图片嵌入，纯色图片与同色文本查询方向一致
async fn embed_image(body: Bytes) -> Json<Value> {
    let img = image::load_from_memory(&body).unwrap().to_rgb8();
    let mut sum = [0f64; 3];
    for pixel in img.pixels() {
        for (acc, channel) in sum.iter_mut().zip(pixel.0) {
            *acc += channel as f64;
        }
    }
    let count = (img.width() * img.height()) as f64;
    let embedding: Vec<f64> = sum.iter().map(|s| s / count / 255.).collect();
    Json(json!({ "embedding": embedding }))
}

/// 在后台线程启动一个打桩的嵌入服务，返回 base url
fn spawn_stub_embedder() -> String {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let app = axum::Router::new()
                .route("/embed/text", axum::routing::post(embed_text))
                .route("/embed/image", axum::routing::post(embed_image));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn write_photo(path: &Path, color: [u8; 3]) {
    image::RgbImage::from_pixel(64, 48, image::Rgb(color)).save(path).unwrap();
}

#[test]
fn add_and_search() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);
    write_photo(&photos.join("blue.png"), [0, 0, 255]);

    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();

    cargo_run!("photosearch", "-c", data_dir.path(), "search", "red", "--embedder-url", &url)
        .success()
        .stdout(predicate::str::contains("red.png"));
    cargo_run!("photosearch", "-c", data_dir.path(), "search", "blue", "--embedder-url", &url)
        .success()
        .stdout(predicate::str::contains("blue.png"));

    Ok(())
}

#[rstest]
#[case::table("table")]
#[case::json("json")]
fn search_output_format(#[case] format: &str) -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);

    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();

    cargo_run!(
        "photosearch",
        "-c",
        data_dir.path(),
        "search",
        "red",
        "--embedder-url",
        &url,
        "--output-format",
        format
    )
    .success()
    .stdout(predicate::str::contains("red.png"));

    Ok(())
}

#[test]
fn search_with_forced_scan() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);
    write_photo(&photos.join("blue.png"), [0, 0, 255]);

    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();

    cargo_run!(
        "photosearch",
        "-c",
        data_dir.path(),
        "search",
        "blue",
        "--scan",
        "--embedder-url",
        &url
    )
    .success()
    .stdout(predicate::str::contains("blue.png"));

    Ok(())
}

#[test]
fn search_empty_corpus_is_no_match() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;

    cargo_run!("photosearch", "-c", data_dir.path(), "search", "red", "--embedder-url", &url)
        .success()
        .stdout(predicate::str::contains("无匹配结果"));

    Ok(())
}

#[test]
fn add_tolerates_corrupt_photo() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);
    fs::write(photos.join("broken.jpg"), b"not really a jpeg")?;

    // 默认容忍部分失败，坏照片跳过，好照片照常可检索
    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();

    cargo_run!("photosearch", "-c", data_dir.path(), "search", "red", "--embedder-url", &url)
        .success()
        .stdout(predicate::str::contains("red.png"));

    Ok(())
}

#[test]
fn add_strict_fails_on_corrupt_photo() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);
    fs::write(photos.join("broken.jpg"), b"not really a jpeg")?;

    cargo_run!(
        "photosearch",
        "-c",
        data_dir.path(),
        "add",
        &photos,
        "--strict",
        "--embedder-url",
        &url
    )
    .failure();

    Ok(())
}

#[test]
fn reingest_creates_new_records() -> Result<()> {
    let url = spawn_stub_embedder();
    let data_dir = assert_fs::TempDir::new()?;
    let photos = data_dir.path().join("photos");
    fs::create_dir(&photos)?;
    write_photo(&photos.join("red.png"), [255, 0, 0]);

    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();
    cargo_run!("photosearch", "-c", data_dir.path(), "add", &photos, "--embedder-url", &url)
        .success();

    // 没有去重：blob 目录里有两份对象
    let blobs = fs::read_dir(data_dir.path().join("blobs"))?.count();
    assert_eq!(blobs, 2);

    Ok(())
}
