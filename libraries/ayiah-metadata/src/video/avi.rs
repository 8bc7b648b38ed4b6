//! RIFF AVI
//!
//! `hdrl/avih` gives the frame count and interval; an `INFO` list, when
//! present, carries the tags. The `movi` list is skipped.

use super::{minutes, Source};
use crate::error::{MetadataError, Result};
use crate::text::split_list;
use ayiah_core::types::VideoMetadata;
use std::io::{Read, Seek};

const FORMAT: &str = "AVI";

#[derive(Debug, Clone, Copy)]
struct Chunk {
    id: [u8; 4],
    start: u64,
    end: u64,
}

pub(super) fn read<R: Read + Seek>(src: &mut Source<R>) -> Result<VideoMetadata> {
    if src.len() < 12 {
        return Err(MetadataError::malformed(FORMAT, "file too short"));
    }
    let header = src.read_at(0, 12)?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"AVI " {
        return Err(MetadataError::malformed(FORMAT, "not a RIFF AVI file"));
    }
    let riff_size = u64::from(u32::from_le_bytes([header[4], header[5], header[6], header[7]]));
    let riff_end = (8 + riff_size).min(src.len());

    let mut video = VideoMetadata::default();
    let mut saw_header = false;

    for chunk in chunks(src, 12, riff_end, true)? {
        if &chunk.id != b"LIST" || chunk.end - chunk.start < 4 {
            continue;
        }
        let list_type = src.read_at(chunk.start, 4)?;
        match &list_type[..] {
            b"hdrl" => {
                saw_header = true;
                for sub in chunks(src, chunk.start + 4, chunk.end, false)? {
                    if &sub.id == b"avih" {
                        video.runtime = read_main_header(src, sub)?;
                    }
                }
            }
            b"INFO" => {
                for sub in chunks(src, chunk.start + 4, chunk.end, false)? {
                    read_info_entry(src, sub, &mut video)?;
                }
            }
            _ => {}
        }
    }

    if !saw_header {
        return Err(MetadataError::malformed(FORMAT, "missing hdrl list"));
    }
    Ok(video)
}

/// Chunks in `[start, end)`, each padded to an even length
fn chunks<R: Read + Seek>(src: &mut Source<R>, start: u64, end: u64, lenient: bool) -> Result<Vec<Chunk>> {
    let mut found = Vec::new();
    let mut pos = start;

    while pos + 8 <= end {
        let header = src.read_at(pos, 8)?;
        let id = [header[0], header[1], header[2], header[3]];
        let size = u64::from(u32::from_le_bytes([header[4], header[5], header[6], header[7]]));
        let data_end = pos + 8 + size;

        if data_end > end {
            if lenient {
                break;
            }
            return Err(MetadataError::malformed(
                FORMAT,
                format!("{} chunk overruns its list", String::from_utf8_lossy(&id)),
            ));
        }

        found.push(Chunk {
            id,
            start: pos + 8,
            end: data_end,
        });
        pos = data_end + (size & 1);
    }

    Ok(found)
}

fn read_main_header<R: Read + Seek>(src: &mut Source<R>, avih: Chunk) -> Result<Option<i32>> {
    if avih.end - avih.start < 20 {
        return Err(MetadataError::malformed(FORMAT, "short avih"));
    }
    let b = src.read_at(avih.start, 20)?;
    let micros_per_frame = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    let total_frames = u32::from_le_bytes([b[16], b[17], b[18], b[19]]);

    Ok(minutes(
        f64::from(total_frames) * f64::from(micros_per_frame) / 1_000_000.0,
    ))
}

fn read_info_entry<R: Read + Seek>(src: &mut Source<R>, entry: Chunk, video: &mut VideoMetadata) -> Result<()> {
    let Some(text) = src.text_at(entry.start, entry.end - entry.start)? else {
        return Ok(());
    };

    match &entry.id {
        b"INAM" => video.title = Some(text),
        b"IGNR" => video.genres.extend(split_list(&text)),
        b"ICRD" => video.release_date = Some(text),
        b"ICMT" => video.overview = Some(text),
        _ => {}
    }
    Ok(())
}
