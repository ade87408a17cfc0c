use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "ps_search_count",
        "count of similarity searches",
        &["method"]
    )
    .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_duration",
        "duration of the per-query search in seconds",
        &["method"]
    )
    .unwrap()
});

static METRIC_SEARCH_BEST_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_best_score",
        "best score of the per-query search",
        &["method"],
        (-10..=10).map(|x| x as f64 / 10.).collect()
    )
    .unwrap()
});

/// 记录一次检索
///
/// 不同方法的分数刻度不同，靠 method 标签分开
pub fn observe_search(method: &str, duration: f32, best_score: Option<f32>) {
    METRIC_SEARCH_COUNT.with_label_values(&[method]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[method]).observe(duration as f64);
    if let Some(score) = best_score {
        METRIC_SEARCH_BEST_SCORE.with_label_values(&[method]).observe(score as f64);
    }
}
