use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("image2text_requests_total", "Total number of extraction requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("image2text_rate_limited_total", "Requests rejected by the call quota").unwrap();
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "image2text_errors_total",
        "Failed extractions by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref INFERENCE_LATENCY: Histogram = register_histogram!(
        "image2text_inference_latency_seconds",
        "Inference API latency in seconds",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0]
    )
    .unwrap();
    pub static ref QUOTA_REMAINING: Gauge =
        register_gauge!("image2text_quota_remaining", "Inference calls left in the current window").unwrap();
}
