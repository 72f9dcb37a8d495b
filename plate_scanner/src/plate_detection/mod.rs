pub mod dnn_ocr;
pub mod object_detector;
pub mod plate_collector;
pub mod video_reader;

use std::path::PathBuf;

use opencv::core::Rect;
use opencv::prelude::Mat;

/// OCR output for one detected region.
#[derive(Clone, Debug)]
pub struct PlateRead {
    /// Normalized text, not yet validated.
    pub text: String,
    pub region: Rect,
    /// Colour crop of the region.
    pub crop: Mat,
}

impl PlateRead {
    fn new(text: String, region: Rect, crop: Mat) -> Self {
        Self { text, region, crop }
    }
}

/// A plate that passed validation and dedup.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedPlate {
    pub plate: String,
    /// Saved crop, if writing it succeeded.
    pub crop_path: Option<PathBuf>,
}
