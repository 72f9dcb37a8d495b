use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref FRAMES_READ: IntCounter =
        register_int_counter!("plate_frames_read_total", "Frames decoded from the video").unwrap();
    pub static ref FRAMES_SAMPLED: IntCounter = register_int_counter!(
        "plate_frames_sampled_total",
        "Frames sent through detection"
    )
    .unwrap();
    pub static ref REGIONS_DETECTED: IntCounter = register_int_counter!(
        "plate_regions_detected_total",
        "Detections that passed the region filter"
    )
    .unwrap();
    pub static ref OCR_READS: IntCounter =
        register_int_counter!("plate_ocr_reads_total", "Regions that produced OCR text").unwrap();
    pub static ref PLATES_ACCEPTED: IntCounter = register_int_counter!(
        "plate_plates_accepted_total",
        "Valid, non-duplicate plates"
    )
    .unwrap();
    pub static ref HTTP_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "plate_http_requests_total",
        "HTTP requests by route",
        &["route"]
    )
    .unwrap();
    pub static ref SCANS_RUN: IntCounter =
        register_int_counter!("plate_scans_total", "Scanner runs started by the service").unwrap();
    pub static ref SCANS_FAILED: IntCounter =
        register_int_counter!("plate_scans_failed_total", "Scanner runs that failed").unwrap();
    pub static ref COMPARISONS: IntCounter =
        register_int_counter!("plate_comparisons_total", "Video comparisons written").unwrap();
}

/// Text exposition of the default registry.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "cannot encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
