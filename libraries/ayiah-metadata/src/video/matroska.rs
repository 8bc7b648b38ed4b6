//! Matroska / WebM
//!
//! Reads the EBML header, then `Info`, `Tags` and `Attachments` from the
//! segment, following `SeekHead` to elements stored after the clusters.
//! Cluster payloads are never read.

use super::{minutes, Source};
use crate::error::{MetadataError, Result};
use crate::text::{clean, split_list};
use ayiah_core::types::VideoMetadata;
use std::collections::HashSet;
use std::io::{Read, Seek};

const FORMAT: &str = "Matroska";

const EBML: u32 = 0x1A45_DFA3;
const DOC_TYPE: u32 = 0x4282;
const SEGMENT: u32 = 0x1853_8067;

const SEEK_HEAD: u32 = 0x114D_9B74;
const SEEK: u32 = 0x4DBB;
const SEEK_ID: u32 = 0x53AB;
const SEEK_POSITION: u32 = 0x53AC;

const INFO: u32 = 0x1549_A966;
const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
const DURATION: u32 = 0x4489;
const TITLE: u32 = 0x7BA9;

const TAGS: u32 = 0x1254_C367;
const TAG: u32 = 0x7373;
const SIMPLE_TAG: u32 = 0x67C8;
const TAG_NAME: u32 = 0x45A3;
const TAG_STRING: u32 = 0x4487;

const ATTACHMENTS: u32 = 0x1941_A469;
const ATTACHED_FILE: u32 = 0x61A7;
const FILE_NAME: u32 = 0x466E;

const CLUSTER: u32 = 0x1F43_B675;

const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy)]
struct Element {
    id: u32,
    /// Offset of the first data byte
    start: u64,
    /// `None` for unknown-size elements (live streams, some segments)
    end: Option<u64>,
}

impl Element {
    fn data_len(&self) -> u64 {
        self.end.map_or(0, |end| end - self.start)
    }
}

pub(super) fn read<R: Read + Seek>(src: &mut Source<R>) -> Result<VideoMetadata> {
    let file_len = src.len();

    let header = element_at(src, 0, file_len)?;
    if header.id != EBML {
        return Err(MetadataError::malformed(FORMAT, "missing EBML header"));
    }
    let header_end = header
        .end
        .ok_or_else(|| MetadataError::malformed(FORMAT, "EBML header of unknown size"))?;

    let doc_type = match children(src, header.start, header_end, false)?
        .into_iter()
        .find(|e| e.id == DOC_TYPE)
    {
        Some(e) => string(src, e)?.unwrap_or_default(),
        None => "matroska".to_string(),
    };
    if doc_type != "matroska" && doc_type != "webm" {
        return Err(MetadataError::malformed(FORMAT, format!("unsupported DocType {doc_type:?}")));
    }

    let segment = children(src, header_end, file_len, true)?
        .into_iter()
        .find(|e| e.id == SEGMENT)
        .ok_or_else(|| MetadataError::malformed(FORMAT, "no Segment"))?;
    // Truncated files still carry their headers; clamp to what is on disk
    let segment_end = segment.end.map_or(file_len, |end| end.min(file_len));

    let mut sections = Vec::new();
    let mut seen = HashSet::new();
    for child in children(src, segment.start, segment_end, true)? {
        match child.id {
            INFO | TAGS | ATTACHMENTS => {
                if seen.insert(child.start) {
                    sections.push(child);
                }
            }
            SEEK_HEAD => {
                for position in seek_positions(src, child)? {
                    let Some(pos) = segment.start.checked_add(position).filter(|&p| p < segment_end) else {
                        continue;
                    };
                    let Ok(target) = element_at(src, pos, segment_end) else {
                        continue;
                    };
                    if matches!(target.id, INFO | TAGS | ATTACHMENTS) && seen.insert(target.start) {
                        sections.push(target);
                    }
                }
            }
            CLUSTER => break,
            _ => {}
        }
    }

    let mut video = VideoMetadata::default();
    let mut info_title = None;

    for section in sections {
        let Some(end) = section.end.filter(|&end| end <= segment_end) else {
            continue;
        };
        match section.id {
            INFO => info_title = read_info(src, section.start, end, &mut video)?,
            TAGS => read_tags(src, section.start, end, &mut video)?,
            ATTACHMENTS => read_attachments(src, section.start, end, &mut video)?,
            _ => {}
        }
    }

    if video.title.is_none() {
        video.title = info_title;
    }

    Ok(video)
}

/// Element header at `pos`; its data must fit before `limit` unless unknown-sized
fn element_at<R: Read + Seek>(src: &mut Source<R>, pos: u64, limit: u64) -> Result<Element> {
    let available = (limit.saturating_sub(pos)).min(12);
    if available < 2 {
        return Err(MetadataError::malformed(FORMAT, "truncated element header"));
    }
    let bytes = src.read_at(pos, available)?;

    let (id, id_len) = read_id(&bytes)?;
    let (size, size_len) = read_size(&bytes[id_len..])?;
    let start = pos + (id_len + size_len) as u64;

    Ok(Element {
        id,
        start,
        end: size.map(|size| start.saturating_add(size)),
    })
}

fn read_id(bytes: &[u8]) -> Result<(u32, usize)> {
    let first = bytes[0];
    if first == 0 {
        return Err(MetadataError::malformed(FORMAT, "invalid element id"));
    }
    let len = first.leading_zeros() as usize + 1;
    if len > 4 || len > bytes.len() {
        return Err(MetadataError::malformed(FORMAT, "invalid element id"));
    }
    let id = bytes[..len].iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    Ok((id, len))
}

/// Data size vint; `None` when all value bits are set (unknown size)
fn read_size(bytes: &[u8]) -> Result<(Option<u64>, usize)> {
    let Some(&first) = bytes.first() else {
        return Err(MetadataError::malformed(FORMAT, "truncated element size"));
    };
    if first == 0 {
        return Err(MetadataError::malformed(FORMAT, "invalid element size"));
    }
    let len = first.leading_zeros() as usize + 1;
    if len > bytes.len() {
        return Err(MetadataError::malformed(FORMAT, "truncated element size"));
    }

    let mut value = u64::from(first) & (0xFF_u64 >> len);
    for b in &bytes[1..len] {
        value = (value << 8) | u64::from(*b);
    }

    let unknown = (1u64 << (7 * len)) - 1;
    Ok((if value == unknown { None } else { Some(value) }, len))
}

/// Children of a master element laid out in `[start, end)`
///
/// `lenient` stops at the first child that runs past `end` or has an
/// unknown size instead of failing; used for the top level and the segment,
/// where truncated tails and live-muxed clusters are expected.
fn children<R: Read + Seek>(src: &mut Source<R>, start: u64, end: u64, lenient: bool) -> Result<Vec<Element>> {
    let mut found = Vec::new();
    let mut pos = start;

    while pos < end {
        let element = match element_at(src, pos, end) {
            Ok(element) => element,
            Err(_) if lenient => break,
            Err(err) => return Err(err),
        };

        match element.end {
            Some(child_end) if child_end <= end => {
                found.push(element);
                pos = child_end;
            }
            _ if lenient => {
                found.push(element);
                break;
            }
            _ => {
                return Err(MetadataError::malformed(
                    FORMAT,
                    format!("element {:#X} overruns its parent", element.id),
                ))
            }
        }
    }

    Ok(found)
}

fn string<R: Read + Seek>(src: &mut Source<R>, element: Element) -> Result<Option<String>> {
    src.text_at(element.start, element.data_len())
}

fn uint<R: Read + Seek>(src: &mut Source<R>, element: Element) -> Result<Option<u64>> {
    let len = element.data_len();
    if len == 0 || len > 8 {
        return Ok(None);
    }
    let bytes = src.read_at(element.start, len)?;
    Ok(Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))))
}

fn float<R: Read + Seek>(src: &mut Source<R>, element: Element) -> Result<Option<f64>> {
    let bytes = match element.data_len() {
        4 | 8 => src.read_at(element.start, element.data_len())?,
        _ => return Ok(None),
    };
    Ok(Some(if bytes.len() == 4 {
        f64::from(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    } else {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        f64::from_be_bytes(raw)
    }))
}

/// Segment-relative positions of the sections we care about
fn seek_positions<R: Read + Seek>(src: &mut Source<R>, seek_head: Element) -> Result<Vec<u64>> {
    let Some(end) = seek_head.end else {
        return Ok(Vec::new());
    };

    let mut positions = Vec::new();
    for seek in children(src, seek_head.start, end, false)? {
        let Some(seek_end) = seek.end.filter(|_| seek.id == SEEK) else {
            continue;
        };

        let mut target = None;
        let mut position = None;
        for field in children(src, seek.start, seek_end, false)? {
            match field.id {
                SEEK_ID => target = uint(src, field)?,
                SEEK_POSITION => position = uint(src, field)?,
                _ => {}
            }
        }

        if let (Some(id), Some(position)) = (target, position) {
            if matches!(u32::try_from(id), Ok(INFO | TAGS | ATTACHMENTS)) {
                positions.push(position);
            }
        }
    }
    Ok(positions)
}

/// Fills runtime and returns the segment title
fn read_info<R: Read + Seek>(
    src: &mut Source<R>,
    start: u64,
    end: u64,
    video: &mut VideoMetadata,
) -> Result<Option<String>> {
    let mut scale = DEFAULT_TIMESTAMP_SCALE;
    let mut duration = None;
    let mut title = None;

    for field in children(src, start, end, false)? {
        match field.id {
            TIMESTAMP_SCALE => scale = uint(src, field)?.filter(|&s| s > 0).unwrap_or(scale),
            DURATION => duration = float(src, field)?,
            TITLE => title = string(src, field)?,
            _ => {}
        }
    }

    if let Some(ticks) = duration {
        video.runtime = minutes(ticks * scale as f64 / 1e9);
    }
    Ok(title)
}

fn read_tags<R: Read + Seek>(src: &mut Source<R>, start: u64, end: u64, video: &mut VideoMetadata) -> Result<()> {
    for tag in children(src, start, end, false)? {
        let Some(tag_end) = tag.end.filter(|_| tag.id == TAG) else {
            continue;
        };

        for simple in children(src, tag.start, tag_end, false)? {
            let Some(simple_end) = simple.end.filter(|_| simple.id == SIMPLE_TAG) else {
                continue;
            };

            let mut name = None;
            let mut value = None;
            for field in children(src, simple.start, simple_end, false)? {
                match field.id {
                    TAG_NAME => name = string(src, field)?,
                    TAG_STRING => value = string(src, field)?,
                    _ => {}
                }
            }

            if let (Some(name), Some(value)) = (name, value) {
                apply_tag(video, &name, value);
            }
        }
    }
    Ok(())
}

fn apply_tag(video: &mut VideoMetadata, name: &str, value: String) {
    match name.to_ascii_uppercase().as_str() {
        "TITLE" => video.title = Some(value),
        "GENRE" => video.genres.extend(split_list(&value)),
        "DATE_RELEASED" => video.release_date = Some(value),
        "SUMMARY" | "DESCRIPTION" | "SYNOPSIS" => {
            video.overview.get_or_insert(value);
        }
        "IMDB" => video.imdb_id = clean(&value),
        "TMDB" => video.tmdb_id = trailing_number(&value),
        "TVDB" => video.tvdb_id = trailing_number(&value),
        "LAW_RATING" => video.content_rating = Some(value),
        _ => {}
    }
}

/// `movie/603` and `603` both give 603
fn trailing_number(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn read_attachments<R: Read + Seek>(
    src: &mut Source<R>,
    start: u64,
    end: u64,
    video: &mut VideoMetadata,
) -> Result<()> {
    for file in children(src, start, end, false)? {
        let Some(file_end) = file.end.filter(|_| file.id == ATTACHED_FILE) else {
            continue;
        };

        for field in children(src, file.start, file_end, false)? {
            if field.id != FILE_NAME {
                continue;
            }
            if let Some(name) = string(src, field)? {
                if name.to_ascii_lowercase().starts_with("cover") && video.poster_path.is_none() {
                    video.poster_path = Some(format!("attachment:{name}"));
                }
            }
        }
    }
    Ok(())
}
