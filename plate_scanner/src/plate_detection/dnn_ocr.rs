use super::PlateRead;

use leptess::tesseract;
use leptess::tesseract::TessApi;
use opencv::core::Rect;

use opencv::core::Vector;

use opencv::imgproc::cvt_color;
use opencv::imgproc::threshold;

use opencv::imgproc::COLOR_BGR2GRAY;
use opencv::imgproc::THRESH_BINARY;
use opencv::imgproc::THRESH_OTSU;

use opencv::prelude::Mat;

use opencv::prelude::MatTraitConst;

use opencv::prelude::MatTraitConstManual;
use plate_common::config::ScanConfig;
use plate_common::metrics;
use plate_common::plate_format;
use plate_common::Error;
use rusted_pipe::channels::typed_read_channel::ReadChannel2;
use rusted_pipe::channels::typed_write_channel::WriteChannel1;
use rusted_pipe::graph::processor::Processor;
use rusted_pipe::graph::processor::ProcessorWriter;
use rusted_pipe::packet::typed::ReadChannel2PacketSet;
use rusted_pipe::RustedPipeError;
use std::ffi::CString;
use tesseract_plumbing::TessBaseApi;
use tracing::{debug, error, warn};

const PLATE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Treat the image as a single text line.
const PAGE_SEG_SINGLE_LINE: &str = "7";

fn set_variable(api: &mut TessBaseApi, name: &str, value: &str) -> plate_common::Result<()> {
    let name_c = CString::new(name).map_err(|e| Error::Ocr(e.to_string()))?;
    let value_c = CString::new(value).map_err(|e| Error::Ocr(e.to_string()))?;
    api.set_variable(&name_c, &value_c)
        .map_err(|e| Error::Ocr(format!("cannot set {name}: {e:?}")))
}

/// Reads plate text out of detected regions with Tesseract.
pub struct DnnOcrReader {
    ocr: TessApi,
}

impl DnnOcrReader {
    pub fn from_config(config: &ScanConfig) -> plate_common::Result<Self> {
        let data_path = config.tessdata_dir.to_str().ok_or_else(|| {
            Error::Ocr(format!("non UTF-8 tessdata path {}", config.tessdata_dir.display()))
        })?;
        let mut api = tesseract::TessApi::new(Some(data_path), &config.ocr_language)
            .map_err(|e| Error::Ocr(format!("cannot start tesseract: {e:?}")))?;

        set_variable(&mut api.raw, "tessedit_char_whitelist", PLATE_ALPHABET)?;
        set_variable(&mut api.raw, "tessedit_pageseg_mode", PAGE_SEG_SINGLE_LINE)?;

        Ok(Self { ocr: api })
    }

    fn recognize(&mut self, grey: &Mat) -> plate_common::Result<String> {
        let cols = grey.cols();
        let rows = grey.rows();
        let bytes = grey.data_bytes().map_err(|e| Error::Ocr(e.to_string()))?;
        self.ocr
            .raw
            .set_image(bytes, cols, rows, 1, cols)
            .map_err(|e| Error::Ocr(format!("{e:?}")))?;
        let text = self
            .ocr
            .get_utf8_text()
            .map_err(|e| Error::Ocr(e.to_string()))?;
        Ok(plate_format::normalize(&[text]))
    }

    /// Plain grayscale first; an Otsu-binarized pass when that reads nothing.
    fn read_plate(&mut self, crop: &Mat) -> plate_common::Result<String> {
        let mut grey = Mat::default();
        cvt_color(crop, &mut grey, COLOR_BGR2GRAY, 0).map_err(|e| Error::Ocr(e.to_string()))?;

        let text = self.recognize(&grey)?;
        if !text.is_empty() {
            return Ok(text);
        }

        let mut binary = Mat::default();
        threshold(&grey, &mut binary, 0.0, 255.0, THRESH_BINARY | THRESH_OTSU)
            .map_err(|e| Error::Ocr(e.to_string()))?;
        self.recognize(&binary)
    }

    fn read_region(&mut self, image: &Mat, rect: Rect) -> plate_common::Result<Option<PlateRead>> {
        // Copy so the crop is contiguous and outlives the frame.
        let crop = image
            .apply_1(rect)
            .and_then(|roi| roi.try_clone())
            .map_err(|e| Error::Ocr(e.to_string()))?;

        let text = self.read_plate(&crop)?;
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(PlateRead::new(text, rect, crop)))
    }
}

unsafe impl Send for DnnOcrReader {}
unsafe impl Sync for DnnOcrReader {}

impl Processor for DnnOcrReader {
    type INPUT = ReadChannel2<Mat, Vector<Rect>>;
    type OUTPUT = WriteChannel1<Vec<PlateRead>>;
    fn handle(
        &mut self,
        mut input: ReadChannel2PacketSet<Mat, Vector<Rect>>,
        mut output: ProcessorWriter<Self::OUTPUT>,
    ) -> Result<(), RustedPipeError> {
        let (Some(image_packet), Some(regions)) = (input.c1_owned(), input.c2_owned()) else {
            warn!("OCR woke up without a frame and its regions");
            return Ok(());
        };
        let image = &image_packet.data;

        let mut reads: Vec<PlateRead> = vec![];
        for rect in regions.data {
            match self.read_region(image, rect) {
                Ok(Some(read)) => {
                    debug!(text = %read.text, ?rect, "OCR");
                    reads.push(read);
                }
                Ok(None) => debug!(?rect, "OCR found no text"),
                Err(e) => error!(error = %e, ?rect, "OCR failed"),
            }
        }
        metrics::OCR_READS.inc_by(reads.len() as u64);

        if let Err(e) = output.writer.c1().write(reads, &image_packet.version) {
            error!(error = ?e, "cannot forward OCR reads");
        }

        Ok(())
    }
}
