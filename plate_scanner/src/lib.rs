pub mod pipeline;
pub mod plate_detection;
