use std::path::Path;

use crossbeam::channel::Sender;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::VideoCaptureTrait;
use opencv::prelude::VideoCaptureTraitConst;
use opencv::videoio::VideoCapture;
use opencv::videoio::CAP_ANY;
use opencv::videoio::CAP_PROP_FPS;
use opencv::videoio::CAP_PROP_FRAME_COUNT;
use plate_common::metrics;
use plate_common::Error;
use rusted_pipe::channels::typed_write_channel::WriteChannel1;
use rusted_pipe::graph::processor::ProcessorWriter;
use rusted_pipe::graph::processor::SourceProcessor;
use rusted_pipe::DataVersion;
use rusted_pipe::RustedPipeError;
use tracing::{debug, error, info, warn};

/// Picks every `interval`-th frame, starting with the first one.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: u64,
    next_index: u64,
}

impl FrameSampler {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: u64::from(interval.max(1)),
            next_index: 0,
        }
    }

    /// Advances past one frame and tells whether it should be processed.
    pub fn advance(&mut self) -> bool {
        let sampled = self.next_index % self.interval == 0;
        self.next_index += 1;
        sampled
    }

    pub fn frames_seen(&self) -> u64 {
        self.next_index
    }
}

/// Sent once the video runs out of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfVideo {
    pub frames_read: u64,
}

pub struct VideoReader {
    capture: VideoCapture,
    sampler: FrameSampler,
    done: Option<Sender<EndOfVideo>>,
}

impl VideoReader {
    pub fn open(
        path: &Path,
        frame_interval: u32,
        done: Sender<EndOfVideo>,
    ) -> plate_common::Result<Self> {
        let location = path
            .to_str()
            .ok_or_else(|| Error::Video(format!("non UTF-8 path {}", path.display())))?;
        let capture = VideoCapture::from_file(location, CAP_ANY)
            .map_err(|e| Error::Video(format!("{location}: {e}")))?;
        let opened = capture
            .is_opened()
            .map_err(|e| Error::Video(format!("{location}: {e}")))?;
        if !opened {
            return Err(Error::Video(format!("could not open video file {location}")));
        }

        let fps = capture.get(CAP_PROP_FPS).unwrap_or_default();
        let frames = capture.get(CAP_PROP_FRAME_COUNT).unwrap_or_default();
        info!(video = location, fps, frames, frame_interval, "opened video");

        Ok(Self {
            capture,
            sampler: FrameSampler::new(frame_interval),
            done: Some(done),
        })
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let frames_read = self.sampler.frames_seen();
            info!(frames_read, "end of video");
            if done.send(EndOfVideo { frames_read }).is_err() {
                warn!("nobody is waiting for the end of the video");
            }
        }
    }
}

impl SourceProcessor for VideoReader {
    type OUTPUT = WriteChannel1<Mat>;
    fn handle(&mut self, mut output: ProcessorWriter<Self::OUTPUT>) -> Result<(), RustedPipeError> {
        loop {
            let mut frame = Mat::default();
            let grabbed = match self.capture.read(&mut frame) {
                Ok(grabbed) => grabbed,
                Err(e) => {
                    warn!(error = %e, "frame decode failed, treating as end of video");
                    false
                }
            };

            if !grabbed || frame.empty() {
                self.finish();
                return Err(RustedPipeError::EndOfStream());
            }

            metrics::FRAMES_READ.inc();
            if !self.sampler.advance() {
                continue;
            }
            metrics::FRAMES_SAMPLED.inc();

            let frame_ts = DataVersion::from_now();
            debug!(
                frame = self.sampler.frames_seen() - 1,
                ts = %frame_ts.timestamp_ns,
                "sampled frame"
            );
            if let Err(e) = output.writer.c1().write(frame, &frame_ts) {
                error!(error = ?e, "cannot forward frame");
            }
            return Ok(());
        }
    }
}

unsafe impl Send for VideoReader {}
unsafe impl Sync for VideoReader {}
