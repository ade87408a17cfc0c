use indicatif::ProgressStyle;

/// 统一的进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("{wide_bar} {pos}/{len} {msg}").expect("进度条模板非法")
}
