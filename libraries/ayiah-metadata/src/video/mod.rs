//! Video container strategies (movie and tv)
//!
//! Only headers are read: box/element/chunk walkers seek over media payload.

mod avi;
mod matroska;
mod mp4;

use crate::classifier::ContainerFormat;
use crate::error::{MetadataError, Result};
use crate::extractor::ExtractionOutcome;
use ayiah_core::types::MetadataRecord;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Longest text value we are willing to read from a header
const MAX_TEXT_LEN: u64 = 64 * 1024;

pub(crate) fn extract(path: &Path, format: ContainerFormat) -> Result<ExtractionOutcome> {
    let video = match format {
        ContainerFormat::Mp4 => mp4::read(&mut open(path)?)?,
        ContainerFormat::Matroska => matroska::read(&mut open(path)?)?,
        ContainerFormat::Avi => avi::read(&mut open(path)?)?,
        ContainerFormat::OtherVideo => return Ok(ExtractionOutcome::NoMetadata),
        other => return Err(MetadataError::UnsupportedFormat(format!("{other} is not a video container"))),
    };

    Ok(ExtractionOutcome::from_record(MetadataRecord::Video(video)))
}

/// Reader plus total length; every walker needs both
pub(crate) struct Source<R> {
    reader: R,
    len: u64,
}

fn open(path: &Path) -> Result<Source<BufReader<File>>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok(Source {
        reader: BufReader::new(file),
        len,
    })
}

impl<R: Read + Seek> Source<R> {
    #[cfg(test)]
    pub(crate) fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, len })
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn read_at(&mut self, pos: u64, len: u64) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(pos))?;
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a text value of `len` bytes at `pos`, `None` if it is oversized or blank
    pub(crate) fn text_at(&mut self, pos: u64, len: u64) -> Result<Option<String>> {
        if len > MAX_TEXT_LEN {
            return Ok(None);
        }
        let bytes = self.read_at(pos, len)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(crate::text::clean(text.trim_end_matches('\0')))
    }
}

/// Whole minutes, rounded; `None` for zero or nonsensical durations
pub(crate) fn minutes(seconds: f64) -> Option<i32> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let minutes = (seconds / 60.0).round();
    (minutes >= 1.0 && minutes < f64::from(i32::MAX)).then_some(minutes as i32)
}
