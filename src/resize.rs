use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use thiserror::Error;

/// 缩放错误，上报给调用方，不做重试
#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("无效的缩放比例 {0}，必须在 (0, 1] 内")]
    Factor(f32),
    #[error("解码图片失败 {path}: {source}")]
    Decode { path: PathBuf, source: image::ImageError },
    #[error("写出图片失败 {path}: {source}")]
    Encode { path: PathBuf, source: image::ImageError },
}

/// 生成按比例缩小的工作副本，宽高各乘以 factor，Lanczos 重采样
///
/// 目的是在嵌入前压低模型输入尺寸，输出格式由 dst 扩展名决定
pub fn resize_image(src: &Path, dst: &Path, factor: f32) -> Result<(), ResizeError> {
    if !(factor > 0. && factor <= 1.) {
        return Err(ResizeError::Factor(factor));
    }

    let img = image::open(src)
        .map_err(|source| ResizeError::Decode { path: src.to_path_buf(), source })?;
    let width = ((img.width() as f32 * factor) as u32).max(1);
    let height = ((img.height() as f32 * factor) as u32).max(1);

    img.resize_exact(width, height, FilterType::Lanczos3)
        .save(dst)
        .map_err(|source| ResizeError::Encode { path: dst.to_path_buf(), source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(path: &Path, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_resize_halves_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        let dst = dir.path().join("dst.png");
        write_test_image(&src, 64, 48);

        resize_image(&src, &dst, 0.5).unwrap();

        let resized = image::open(&dst).unwrap();
        assert_eq!((resized.width(), resized.height()), (32, 24));
    }

    #[test]
    fn test_resize_never_below_one_pixel() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        let dst = dir.path().join("dst.png");
        write_test_image(&src, 4, 4);

        resize_image(&src, &dst, 0.01).unwrap();

        let resized = image::open(&dst).unwrap();
        assert_eq!((resized.width(), resized.height()), (1, 1));
    }

    #[test]
    fn test_invalid_factor() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        write_test_image(&src, 4, 4);

        for factor in [0., -0.5, 1.5] {
            let result = resize_image(&src, &dir.path().join("dst.png"), factor);
            assert!(matches!(result, Err(ResizeError::Factor(_))));
        }
    }

    #[test]
    fn test_unreadable_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("not-an-image.png");
        std::fs::write(&src, b"definitely not a png").unwrap();

        let result = resize_image(&src, &dir.path().join("dst.png"), 0.5);
        assert!(matches!(result, Err(ResizeError::Decode { .. })));
    }
}
