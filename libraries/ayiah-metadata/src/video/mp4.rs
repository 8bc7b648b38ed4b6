//! ISO base media (MP4 / M4V / MOV)
//!
//! Walks the box tree down to `moov/mvhd` and `moov/udta/meta/ilst`;
//! `mdat` is never read.

use super::{minutes, Source};
use crate::error::{MetadataError, Result};
use crate::text::split_list;
use ayiah_core::types::VideoMetadata;
use std::io::{Read, Seek};

const FORMAT: &str = "MP4";

const MOOV: [u8; 4] = *b"moov";
const MVHD: [u8; 4] = *b"mvhd";
const UDTA: [u8; 4] = *b"udta";
const META: [u8; 4] = *b"meta";
const ILST: [u8; 4] = *b"ilst";
const DATA: [u8; 4] = *b"data";
const HDLR: [u8; 4] = *b"hdlr";

const TITLE: [u8; 4] = *b"\xA9nam";
const DAY: [u8; 4] = *b"\xA9day";
const GENRE: [u8; 4] = *b"\xA9gen";
const DESC: [u8; 4] = *b"desc";
const LONG_DESC: [u8; 4] = *b"ldes";
const COVER: [u8; 4] = *b"covr";

#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: [u8; 4],
    /// First byte after the header
    start: u64,
    end: u64,
}

impl Atom {
    fn body_len(&self) -> u64 {
        self.end - self.start
    }
}

pub(super) fn read<R: Read + Seek>(src: &mut Source<R>) -> Result<VideoMetadata> {
    let len = src.len();
    let top = atoms(src, 0, len, true)?;
    if top.is_empty() {
        return Err(MetadataError::malformed(FORMAT, "no boxes"));
    }

    let moov = find(&top, MOOV).ok_or_else(|| MetadataError::malformed(FORMAT, "no moov box"))?;
    let moov_children = atoms(src, moov.start, moov.end, false)?;

    let mut video = VideoMetadata::default();

    if let Some(mvhd) = find(&moov_children, MVHD) {
        video.runtime = read_runtime(src, mvhd)?;
    }

    if let Some(udta) = find(&moov_children, UDTA) {
        let udta_children = atoms(src, udta.start, udta.end, false)?;
        if let Some(meta) = find(&udta_children, META) {
            let meta_children = meta_children(src, meta)?;
            if let Some(ilst) = find(&meta_children, ILST) {
                read_ilst(src, ilst, &mut video)?;
            }
        }
    }

    Ok(video)
}

fn find(atoms: &[Atom], kind: [u8; 4]) -> Option<Atom> {
    atoms.iter().copied().find(|a| a.kind == kind)
}

/// Boxes laid end to end in `[start, end)`
///
/// At the top level a box running past the end of the file is clamped,
/// since a truncated `mdat` still leaves a readable `moov` in front of it;
/// a truncated `moov`, or an overrun anywhere below, is malformed.
fn atoms<R: Read + Seek>(src: &mut Source<R>, start: u64, end: u64, top_level: bool) -> Result<Vec<Atom>> {
    let mut found = Vec::new();
    let mut pos = start;

    while pos + 8 <= end {
        let header = src.read_at(pos, 8)?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let kind = [header[4], header[5], header[6], header[7]];

        let (header_len, size) = match size32 {
            0 => (8, end - pos),
            1 => {
                if pos + 16 > end {
                    return Err(MetadataError::malformed(FORMAT, "truncated large box header"));
                }
                let large = src.read_at(pos + 8, 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&large);
                (16, u64::from_be_bytes(raw))
            }
            n => (8, u64::from(n)),
        };

        if size < header_len {
            return Err(MetadataError::malformed(FORMAT, "box smaller than its header"));
        }

        let box_end = pos.saturating_add(size);
        if box_end > end {
            if top_level && kind != MOOV {
                found.push(Atom {
                    kind,
                    start: pos + header_len,
                    end,
                });
                break;
            }
            return Err(MetadataError::malformed(
                FORMAT,
                format!("{} box overruns its parent", String::from_utf8_lossy(&kind)),
            ));
        }

        found.push(Atom {
            kind,
            start: pos + header_len,
            end: box_end,
        });
        pos = box_end;
    }

    Ok(found)
}

fn read_runtime<R: Read + Seek>(src: &mut Source<R>, mvhd: Atom) -> Result<Option<i32>> {
    if mvhd.body_len() < 20 {
        return Err(MetadataError::malformed(FORMAT, "short mvhd"));
    }
    let version = src.read_at(mvhd.start, 1)?[0];

    let (timescale, duration) = if version == 1 {
        if mvhd.body_len() < 32 {
            return Err(MetadataError::malformed(FORMAT, "short mvhd"));
        }
        let b = src.read_at(mvhd.start + 20, 12)?;
        let timescale = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&b[4..12]);
        (timescale, u64::from_be_bytes(raw))
    } else {
        let b = src.read_at(mvhd.start + 12, 8)?;
        let timescale = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let duration = u32::from_be_bytes([b[4], b[5], b[6], b[7]]);
        if duration == u32::MAX {
            return Ok(None);
        }
        (timescale, u64::from(duration))
    };

    if timescale == 0 {
        return Ok(None);
    }
    Ok(minutes(duration as f64 / f64::from(timescale)))
}

/// `meta` is a full box in ISO files but a plain container in QuickTime
fn meta_children<R: Read + Seek>(src: &mut Source<R>, meta: Atom) -> Result<Vec<Atom>> {
    if meta.body_len() >= 8 {
        let peek = src.read_at(meta.start, 8)?;
        if peek[4..8] == HDLR {
            return atoms(src, meta.start, meta.end, false);
        }
    }
    if meta.body_len() < 4 {
        return Ok(Vec::new());
    }
    atoms(src, meta.start + 4, meta.end, false)
}

fn read_ilst<R: Read + Seek>(src: &mut Source<R>, ilst: Atom, video: &mut VideoMetadata) -> Result<()> {
    for item in atoms(src, ilst.start, ilst.end, false)? {
        let Some(data) = find(&atoms(src, item.start, item.end, false)?, DATA) else {
            continue;
        };
        // type indicator + locale precede the value
        if data.body_len() < 8 {
            continue;
        }

        if item.kind == COVER {
            video.poster_path = Some("embedded:covr".to_string());
            continue;
        }

        let Some(text) = src.text_at(data.start + 8, data.body_len() - 8)? else {
            continue;
        };

        match item.kind {
            TITLE => video.title = Some(text),
            DAY => video.release_date = Some(text),
            GENRE => video.genres.extend(split_list(&text)),
            LONG_DESC => video.overview = Some(text),
            DESC => {
                video.overview.get_or_insert(text);
            }
            _ => {}
        }
    }
    Ok(())
}
