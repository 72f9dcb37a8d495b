use std::fs;
use std::path::{Path, PathBuf};

use crossbeam::channel::Sender;
use opencv::core::Vector;
use opencv::imgcodecs::imwrite;
use opencv::prelude::Mat;
use plate_common::config::ScanConfig;
use plate_common::metrics;
use plate_common::plate_format::PlateFormat;
use plate_common::plate_registry::PlateRegistry;
use plate_common::Error;
use rusted_pipe::channels::read_channel::InputGenerator;
use rusted_pipe::channels::typed_read_channel::ReadChannel1;
use rusted_pipe::graph::processor::TerminalProcessor;
use rusted_pipe::RustedPipeError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CapturedPlate, PlateRead};

/// `MH12AB1234_3f9a1c.jpg`
pub fn crop_file_name(plate: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{plate}_{}.jpg", &suffix[..6])
}

/// End of the pipeline: validates, dedups and keeps the crop of every new plate.
pub struct PlateCollector {
    format: PlateFormat,
    registry: PlateRegistry,
    crops_dir: PathBuf,
    accepted: Sender<CapturedPlate>,
}

impl PlateCollector {
    pub fn new(
        config: &ScanConfig,
        crops_dir: &Path,
        accepted: Sender<CapturedPlate>,
    ) -> plate_common::Result<Self> {
        fs::create_dir_all(crops_dir)?;
        Ok(Self {
            format: PlateFormat::new(config.state_codes.iter().cloned()),
            registry: PlateRegistry::new(config.similarity_threshold),
            crops_dir: crops_dir.to_path_buf(),
            accepted,
        })
    }

    /// True for a valid plate that was not seen before in this video.
    pub fn accept(&mut self, text: &str) -> bool {
        if !self.format.is_valid(text) {
            debug!(text, "rejected plate format");
            return false;
        }
        if !self.registry.offer(text) {
            debug!(text, "duplicate plate");
            return false;
        }
        true
    }

    fn save_crop(&self, plate: &str, crop: &Mat) -> plate_common::Result<PathBuf> {
        let path = self.crops_dir.join(crop_file_name(plate));
        let location = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("non UTF-8 path {}", path.display())))?;
        let written =
            imwrite(location, crop, &Vector::new()).map_err(|e| Error::Video(e.to_string()))?;
        if !written {
            return Err(Error::Video(format!("encoder refused {location}")));
        }
        Ok(path)
    }

    pub fn collect(&mut self, read: PlateRead) -> Option<CapturedPlate> {
        if !self.accept(&read.text) {
            return None;
        }

        let crop_path = match self.save_crop(&read.text, &read.crop) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(plate = %read.text, error = %e, "cannot save plate crop");
                None
            }
        };
        metrics::PLATES_ACCEPTED.inc();
        info!(plate = %read.text, region = ?read.region, "new plate");

        let captured = CapturedPlate {
            plate: read.text,
            crop_path,
        };
        if self.accepted.send(captured.clone()).is_err() {
            warn!(plate = %captured.plate, "scan runner is gone, plate not reported");
        }
        Some(captured)
    }
}

impl TerminalProcessor for PlateCollector {
    type INPUT = ReadChannel1<Vec<PlateRead>>;
    fn handle(
        &mut self,
        mut input: <Self::INPUT as InputGenerator>::INPUT,
    ) -> Result<(), RustedPipeError> {
        if let Some(reads) = input.c1_owned() {
            for read in reads.data {
                self.collect(read);
            }
        }
        Ok(())
    }
}
