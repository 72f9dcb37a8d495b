use opencv::core::Rect;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::core::Vector;

use opencv::core::CV_32F;
use opencv::dnn;
use opencv::dnn::blob_from_image;
use opencv::dnn::nms_boxes;

use opencv::dnn::Net;
use opencv::dnn::DNN_BACKEND_CUDA;
use opencv::dnn::DNN_BACKEND_OPENCV;

use opencv::dnn::DNN_TARGET_CPU;
use opencv::dnn::DNN_TARGET_CUDA;

use opencv::prelude::Mat;

use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;

use opencv::prelude::NetTrait;
use opencv::prelude::NetTraitConst;
use plate_common::config::ScanConfig;
use plate_common::metrics;
use plate_common::Error;
use rusted_pipe::channels::read_channel::InputGenerator;
use rusted_pipe::channels::typed_read_channel::ReadChannel1;
use rusted_pipe::channels::typed_write_channel::WriteChannel1;
use rusted_pipe::graph::processor::Processor;
use rusted_pipe::graph::processor::ProcessorWriter;
use rusted_pipe::RustedPipeError;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Rect,
    pub confidence: f32,
}

/// Decodes a YOLOv8 head laid out as `[1, 4 + classes, anchors]`.
///
/// Box coordinates are in network input pixels and get scaled back to the frame
/// with `x_factor` / `y_factor`. The confidence is the best class score.
pub fn decode_yolov8(
    output: &[f32],
    num_classes: usize,
    score_threshold: f32,
    x_factor: f32,
    y_factor: f32,
) -> Vec<Detection> {
    let attributes = 4 + num_classes;
    if output.is_empty() || output.len() % attributes != 0 {
        warn!(
            len = output.len(),
            attributes, "detector output does not match the class count"
        );
        return Vec::new();
    }
    let anchors = output.len() / attributes;
    let at = |attribute: usize, anchor: usize| output[attribute * anchors + anchor];

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let confidence = (4..attributes)
            .map(|attribute| at(attribute, anchor))
            .fold(f32::MIN, f32::max);
        if confidence < score_threshold {
            continue;
        }

        let cx = at(0, anchor);
        let cy = at(1, anchor);
        let w = at(2, anchor);
        let h = at(3, anchor);
        let left = (cx - 0.5 * w) * x_factor;
        let top = (cy - 0.5 * h) * y_factor;
        detections.push(Detection {
            bbox: Rect::new(
                left.round() as i32,
                top.round() as i32,
                (w * x_factor).round() as i32,
                (h * y_factor).round() as i32,
            ),
            confidence,
        });
    }
    detections
}

/// Non-maximum suppression: of boxes overlapping by more than
/// `nms_threshold` IoU only the most confident survives. Survivors come back
/// in descending confidence.
pub fn suppress_overlaps(
    candidates: Vec<Detection>,
    score_threshold: f32,
    nms_threshold: f32,
) -> opencv::Result<Vec<Detection>> {
    let boxes: Vector<Rect> = candidates.iter().map(|d| d.bbox).collect();
    let confidences: Vector<f32> = candidates.iter().map(|d| d.confidence).collect();

    let mut indices = Vector::<i32>::default();
    nms_boxes(
        &boxes,
        &confidences,
        score_threshold,
        nms_threshold,
        &mut indices,
        1.0,
        0,
    )?;

    Ok(indices
        .iter()
        .filter_map(|i| candidates.get(i as usize).copied())
        .collect())
}

/// Keeps detections that are confident and large enough to hold a readable
/// plate, clamped to the frame.
#[derive(Debug, Clone, Copy)]
pub struct RegionFilter {
    pub min_confidence: f32,
    pub min_width: i32,
    pub min_height: i32,
}

impl RegionFilter {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            min_width: config.min_width,
            min_height: config.min_height,
        }
    }

    pub fn apply(&self, detection: &Detection, frame: Size) -> Option<Rect> {
        if detection.confidence < self.min_confidence {
            return None;
        }
        let bbox = detection.bbox;
        let x1 = bbox.x.max(0);
        let y1 = bbox.y.max(0);
        let x2 = (bbox.x + bbox.width).min(frame.width);
        let y2 = (bbox.y + bbox.height).min(frame.height);
        let (width, height) = (x2 - x1, y2 - y1);

        if width <= 0 || height <= 0 || width < self.min_width || height < self.min_height {
            return None;
        }
        Some(Rect::new(x1, y1, width, height))
    }
}

pub struct ObjectDetector {
    classifier: Net,
    input_size: i32,
    num_classes: usize,
    score_threshold: f32,
    nms_threshold: f32,
    filter: RegionFilter,
}

impl ObjectDetector {
    pub fn from_config(config: &ScanConfig) -> plate_common::Result<Self> {
        let model = config.model_path.to_str().ok_or_else(|| {
            Error::Detection(format!("non UTF-8 model path {}", config.model_path.display()))
        })?;
        let mut classifier = dnn::read_net_from_onnx(model)
            .map_err(|e| Error::Detection(format!("cannot load {model}: {e}")))?;

        let (backend, target) = if config.use_gpu {
            (DNN_BACKEND_CUDA, DNN_TARGET_CUDA)
        } else {
            (DNN_BACKEND_OPENCV, DNN_TARGET_CPU)
        };
        classifier
            .set_preferable_backend(backend)
            .map_err(|e| Error::Detection(e.to_string()))?;
        classifier
            .set_preferable_target(target)
            .map_err(|e| Error::Detection(e.to_string()))?;

        Ok(ObjectDetector {
            classifier,
            input_size: config.input_size,
            num_classes: config.num_classes,
            score_threshold: config.score_threshold,
            nms_threshold: config.nms_threshold,
            filter: RegionFilter::from_config(config),
        })
    }

    fn detect(&mut self, image: &Mat) -> opencv::Result<Vec<Detection>> {
        let mut blob = blob_from_image(
            &image,
            1.0 / 255.0,
            Size::new(self.input_size, self.input_size),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;

        self.classifier
            .set_input(&mut blob, "", 1.0, Scalar::default())?;

        let output_names = self.classifier.get_unconnected_out_layers_names()?;
        let mut output_values = Vector::<Mat>::default();
        self.classifier.forward(&mut output_values, &output_names)?;

        let x_factor = image.cols() as f32 / self.input_size as f32;
        let y_factor = image.rows() as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for data in &output_values {
            candidates.extend(decode_yolov8(
                data.data_typed::<f32>()?,
                self.num_classes,
                self.score_threshold,
                x_factor,
                y_factor,
            ));
        }
        suppress_overlaps(candidates, self.score_threshold, self.nms_threshold)
    }
}

unsafe impl Send for ObjectDetector {}
unsafe impl Sync for ObjectDetector {}

impl Processor for ObjectDetector {
    type OUTPUT = WriteChannel1<Vector<Rect>>;
    type INPUT = ReadChannel1<Mat>;
    fn handle(
        &mut self,
        input: <Self::INPUT as InputGenerator>::INPUT,
        mut output: ProcessorWriter<Self::OUTPUT>,
    ) -> Result<(), RustedPipeError> {
        let Some(image_packet) = input.c1() else {
            warn!("object detection woke up without a frame");
            return Ok(());
        };

        let image = &image_packet.data;
        let frame_size = Size::new(image.cols(), image.rows());

        // A (possibly empty) region list goes out for every frame so that the
        // OCR node never waits on a missing timestamp.
        let regions: Vector<Rect> = match self.detect(image) {
            Ok(detections) => detections
                .iter()
                .filter_map(|detection| self.filter.apply(detection, frame_size))
                .collect(),
            Err(e) => {
                error!(error = %e, "detection failed");
                Vector::new()
            }
        };
        metrics::REGIONS_DETECTED.inc_by(regions.len() as u64);
        debug!(
            ts = %image_packet.version.timestamp_ns,
            regions = regions.len(),
            "object detection"
        );

        if let Err(e) = output.writer.c1().write(regions, &image_packet.version) {
            error!(error = ?e, "cannot forward regions");
        }
        Ok(())
    }
}
