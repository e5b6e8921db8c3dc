use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("gate_requests_total", "Total requests seen by the gate").unwrap();
    pub static ref DECISIONS: IntCounterVec = register_int_counter_vec!(
        "gate_decisions_total",
        "Admission decisions by outcome",
        &["decision"]
    )
    .unwrap();
    pub static ref BLOCKS_TOTAL: IntCounter =
        register_int_counter!("gate_blocks_total", "Keys put in the block set").unwrap();
    pub static ref TRACKED_CREDENTIALS: IntGauge = register_int_gauge!(
        "gate_tracked_credentials",
        "Credentials with per-key state in memory"
    )
    .unwrap();
    pub static ref EVALUATE_LATENCY: Histogram = register_histogram!(
        "gate_evaluate_latency_seconds",
        "Admission check latency in seconds"
    )
    .unwrap();
}

pub fn set_tracked(count: usize) {
    TRACKED_CREDENTIALS.set(i64::try_from(count).unwrap_or(i64::MAX));
}
