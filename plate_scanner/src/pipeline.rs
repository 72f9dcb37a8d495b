//! Wires the scan graph and runs it over one video file.
//!
//! ```text
//! video_input ──frames──► object_detector ──regions──► plate_ocr ──reads──► plate_collector
//!      └──────────────────────frames─────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use crossbeam::channel::{bounded, unbounded};
use plate_common::{Config, Error};
use rusted_pipe::{
    buffers::synchronizers::timestamp::TimestampSynchronizer,
    graph::{
        build::{link, Graph},
        metrics::Metrics,
        processor::{Node, SourceNode, TerminalNode},
    },
};
use tracing::info;

use crate::plate_detection::dnn_ocr::DnnOcrReader;
use crate::plate_detection::object_detector::ObjectDetector;
use crate::plate_detection::plate_collector::PlateCollector;
use crate::plate_detection::video_reader::{EndOfVideo, VideoReader};
use crate::plate_detection::CapturedPlate;

/// Frames may pile up behind the detector; nothing is dropped.
const QUEUE_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Accepted plates in the order they were first seen.
    pub plates: Vec<String>,
    pub crops: Vec<PathBuf>,
    pub frames_read: u64,
}

impl ScanReport {
    fn new(captured: Vec<CapturedPlate>, frames_read: u64) -> Self {
        let crops = captured
            .iter()
            .filter_map(|plate| plate.crop_path.clone())
            .collect();
        Self {
            plates: captured.into_iter().map(|plate| plate.plate).collect(),
            crops,
            frames_read,
        }
    }
}

fn link_error<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> Error + '_ {
    move |e| Error::Video(format!("cannot link {what}: {e:?}"))
}

fn build_graph(
    reader: VideoReader,
    detector: ObjectDetector,
    ocr: DnnOcrReader,
    collector: PlateCollector,
) -> plate_common::Result<Graph> {
    // Node that reads and samples frames from the input file
    let mut video_input_node =
        SourceNode::create_common("video_input".to_string(), Box::new(reader));

    let timestamp_synch = TimestampSynchronizer::default();

    // Node that finds candidate plate regions
    let mut detector_node = Node::create_common(
        "object_detector".to_string(),
        Box::new(detector),
        true,
        QUEUE_SIZE,
        QUEUE_SIZE,
        Box::new(timestamp_synch.clone()),
        true,
    );

    // Node that reads the text inside each region, matched to its frame by timestamp
    let mut ocr_node = Node::create_common(
        "plate_ocr".to_string(),
        Box::new(ocr),
        true,
        QUEUE_SIZE,
        QUEUE_SIZE,
        Box::new(timestamp_synch.clone()),
        true,
    );

    // Node that validates, dedups and stores plates
    let collector_node = TerminalNode::create_common(
        "plate_collector".to_string(),
        Box::new(collector),
        true,
        QUEUE_SIZE,
        QUEUE_SIZE,
        Box::new(timestamp_synch),
        true,
    );

    // Frame -> Detector
    link(
        video_input_node.write_channel.writer.c1(),
        detector_node
            .read_channel
            .channels
            .write()
            .map_err(link_error("detector input"))?
            .c1(),
    )
    .map_err(link_error("frames to detector"))?;

    // Frame -> OCR
    link(
        video_input_node.write_channel.writer.c1(),
        ocr_node
            .read_channel
            .channels
            .write()
            .map_err(link_error("ocr input"))?
            .c1(),
    )
    .map_err(link_error("frames to ocr"))?;

    // Detector -> OCR
    link(
        detector_node.write_channel.writer.c1(),
        ocr_node
            .read_channel
            .channels
            .write()
            .map_err(link_error("ocr input"))?
            .c2(),
    )
    .map_err(link_error("regions to ocr"))?;

    // OCR -> Collector
    link(
        ocr_node.write_channel.writer.c1(),
        collector_node
            .read_channel
            .channels
            .write()
            .map_err(link_error("collector input"))?
            .c1(),
    )
    .map_err(link_error("reads to collector"))?;

    let mut graph = Graph::new(Metrics::no_metrics());

    // Consumers first so nothing written by the source is missed
    graph.start_terminal_node(collector_node);
    graph.start_node(ocr_node);
    graph.start_node(detector_node);
    graph.start_source_node(video_input_node);

    Ok(graph)
}

/// Runs the whole pipeline over `video` and blocks until every sampled frame
/// has been through it.
pub fn scan_video(config: &Config, video: &Path) -> plate_common::Result<ScanReport> {
    let (done_s, done_r) = bounded::<EndOfVideo>(1);
    let (plates_s, plates_r) = unbounded::<CapturedPlate>();

    let reader = VideoReader::open(video, config.scan.effective_interval(), done_s)?;
    let detector = ObjectDetector::from_config(&config.scan)?;
    let ocr = DnnOcrReader::from_config(&config.scan)?;
    let collector = PlateCollector::new(&config.scan, &config.paths.violations_dir, plates_s)?;

    let graph = build_graph(reader, detector, ocr, collector)?;
    info!(video = %video.display(), "scan started");

    let end = done_r
        .recv()
        .map_err(|_| Error::Video("video reader stopped without reaching the end".to_string()))?;
    // Drain what is still queued in the nodes before shutting down.
    graph.stop(true, None);

    let report = ScanReport::new(plates_r.try_iter().collect(), end.frames_read);
    info!(
        frames = report.frames_read,
        plates = report.plates.len(),
        "scan finished"
    );
    Ok(report)
}

/// Dumps the pipeline counters once a scan has finished.
pub fn log_counters() {
    info!("pipeline counters\n{}", plate_common::metrics::gather_text());
}
