use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Attempt lifecycle
    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "drill_attempts_total",
        "Total number of exercise attempts by lifecycle status",
        &["status"]
    )
    .unwrap();

    pub static ref ATTEMPTS_ACTIVE: IntGauge = register_int_gauge!(
        "drill_attempts_active",
        "Number of attempts started but not yet completed"
    )
    .unwrap();

    pub static ref ACTIONS_CHOSEN_TOTAL: IntCounterVec = register_int_counter_vec!(
        "drill_actions_chosen_total",
        "Total number of actions chosen",
        &["correct"]
    )
    .unwrap();

    pub static ref TRANSITIONS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "drill_transitions_rejected_total",
        "Total number of operations refused by the attempt state machine",
        &["reason"]
    )
    .unwrap();

    pub static ref REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "drill_reports_total",
        "Total number of reports assembled",
        &["tier"]
    )
    .unwrap();

    // Catalog
    pub static ref CATALOG_DEFINITIONS_LOADED: IntGauge = register_int_gauge!(
        "drill_catalog_definitions_loaded",
        "Number of definitions currently in the catalog"
    )
    .unwrap();

    pub static ref CATALOG_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        "drill_catalog_rejections_total",
        "Total number of definitions refused during catalog loads"
    )
    .unwrap();

    // Notifications
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "drill_notifications_total",
        "Total number of push notifications by outcome",
        &["event", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Record an operation refused by the state machine
pub fn record_rejection(reason: &str) {
    TRANSITIONS_REJECTED_TOTAL
        .with_label_values(&[reason])
        .inc();
}
