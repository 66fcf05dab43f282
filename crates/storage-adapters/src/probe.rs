//! Best-effort dimension probing for flash and video containers.
//!
//! Each probe reads only container headers and returns `None` when the
//! layout is not understood. Images are handled by `image` directly.

use std::io::{Read, Seek, SeekFrom};

const MAX_DEPTH: usize = 8;

/// Frame size of an uncompressed (`FWS`) SWF file, from its header RECT.
pub(crate) fn swf_dimensions(header: &[u8]) -> Option<(u32, u32)> {
    if header.get(0..3)? != b"FWS" {
        // CWS/ZWS bodies are compressed
        return None;
    }
    let mut bits = BitReader::new(header.get(8..)?);
    let nbits = bits.read(5)?;
    let x_min = bits.read_signed(nbits)?;
    let x_max = bits.read_signed(nbits)?;
    let y_min = bits.read_signed(nbits)?;
    let y_max = bits.read_signed(nbits)?;

    // twips
    let width = (x_max - x_min) / 20;
    let height = (y_max - y_min) / 20;
    positive(width, height)
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read(&mut self, count: u32) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let byte = *self.data.get(self.pos / 8)?;
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | u32::from(bit);
            self.pos += 1;
        }
        Some(value)
    }

    fn read_signed(&mut self, count: u32) -> Option<i64> {
        let raw = i64::from(self.read(count)?);
        if count > 0 && raw & (1 << (count - 1)) != 0 {
            Some(raw - (1 << count))
        } else {
            Some(raw)
        }
    }
}

/// Width and height of the first visual track of an ISO-BMFF file
/// (MP4, 3GP), read from its `tkhd` box.
pub(crate) fn mp4_dimensions<R: Read + Seek>(reader: &mut R) -> Option<(u32, u32)> {
    let end = reader.seek(SeekFrom::End(0)).ok()?;
    find_track_header(reader, 0, end, 0)
}

fn find_track_header<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    depth: usize,
) -> Option<(u32, u32)> {
    if depth > MAX_DEPTH {
        return None;
    }
    let mut pos = start;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos)).ok()?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header).ok()?;

        let mut size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let mut header_len = 8;
        if size == 1 {
            let mut large = [0u8; 8];
            reader.read_exact(&mut large).ok()?;
            size = u64::from_be_bytes(large);
            header_len = 16;
        } else if size == 0 {
            size = end - pos;
        }
        if size < header_len {
            return None;
        }
        let box_end = pos.checked_add(size).filter(|&box_end| box_end <= end)?;

        match &header[4..8] {
            b"moov" | b"trak" => {
                let inner = find_track_header(reader, pos + header_len, box_end, depth + 1);
                if let Some(found) = inner {
                    return Some(found);
                }
            }
            b"tkhd" => {
                // audio tracks carry a zero size
                if let Some((width, height)) = read_track_header(reader) {
                    if width > 0 && height > 0 {
                        return Some((width, height));
                    }
                }
            }
            _ => {}
        }
        pos = box_end;
    }
    None
}

fn read_track_header<R: Read>(reader: &mut R) -> Option<(u32, u32)> {
    let mut version = [0u8; 4];
    reader.read_exact(&mut version).ok()?;
    // times, track id and duration, then reserved/layer/group/volume/matrix
    let skip = if version[0] == 1 { 32 } else { 20 } + 52;
    let mut skipped = vec![0u8; skip];
    reader.read_exact(&mut skipped).ok()?;

    let mut size = [0u8; 8];
    reader.read_exact(&mut size).ok()?;
    // 16.16 fixed point
    let width = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) >> 16;
    let height = u32::from_be_bytes([size[4], size[5], size[6], size[7]]) >> 16;
    Some((width, height))
}

const EBML_SEGMENT: u64 = 0x1853_8067;
const EBML_TRACKS: u64 = 0x1654_AE6B;
const EBML_TRACK_ENTRY: u64 = 0xAE;
const EBML_VIDEO: u64 = 0xE0;
const EBML_PIXEL_WIDTH: u64 = 0xB0;
const EBML_PIXEL_HEIGHT: u64 = 0xBA;

/// Pixel size of the first video track of a Matroska/WebM file.
///
/// `data` is a prefix of the file; `Tracks` precedes the clusters, so a
/// few hundred kilobytes are enough in practice.
pub(crate) fn ebml_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    walk_ebml(data, 0, data.len(), 0)
}

fn walk_ebml(data: &[u8], start: usize, end: usize, depth: usize) -> Option<(u32, u32)> {
    if depth > MAX_DEPTH {
        return None;
    }
    let mut pos = start;
    while pos < end {
        let (id, id_len) = read_vint(data, pos, true)?;
        let (size, size_len) = read_vint(data, pos + id_len, false)?;
        let body = pos + id_len + size_len;
        let unknown_size = size == (1u64 << (7 * size_len)) - 1;
        let body_end = if unknown_size {
            end
        } else {
            body.saturating_add(usize::try_from(size).ok()?).min(end)
        };

        match id {
            EBML_SEGMENT | EBML_TRACKS | EBML_TRACK_ENTRY => {
                if let Some(found) = walk_ebml(data, body, body_end, depth + 1) {
                    return Some(found);
                }
            }
            EBML_VIDEO => {
                if let Some(found) = read_video_settings(data, body, body_end) {
                    return Some(found);
                }
            }
            _ => {}
        }
        if unknown_size {
            return None;
        }
        pos = body_end;
    }
    None
}

fn read_video_settings(data: &[u8], start: usize, end: usize) -> Option<(u32, u32)> {
    let mut width = None;
    let mut height = None;
    let mut pos = start;
    while pos < end {
        let (id, id_len) = read_vint(data, pos, true)?;
        let (size, size_len) = read_vint(data, pos + id_len, false)?;
        let body = pos + id_len + size_len;
        let body_end = body.checked_add(usize::try_from(size).ok()?)?;
        let value = data
            .get(body..body_end)?
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

        match id {
            EBML_PIXEL_WIDTH => width = u32::try_from(value).ok(),
            EBML_PIXEL_HEIGHT => height = u32::try_from(value).ok(),
            _ => {}
        }
        pos = body_end;
    }
    positive(i64::from(width?), i64::from(height?))
}

/// Reads an EBML variable-length integer. Element ids keep their length
/// marker, sizes do not.
fn read_vint(data: &[u8], pos: usize, keep_marker: bool) -> Option<(u64, usize)> {
    let first = *data.get(pos)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return None;
    }
    let bytes = data.get(pos..pos + len)?;
    let mut value = if keep_marker {
        u64::from(first)
    } else {
        u64::from(first) & ((1u64 << (8 - len)) - 1)
    };
    for byte in &bytes[1..] {
        value = (value << 8) | u64::from(*byte);
    }
    Some((value, len))
}

/// Width and height from the `onMetaData` script tag of an FLV file.
pub(crate) fn flv_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let width = amf_number(data, b"width")?;
    let height = amf_number(data, b"height")?;
    positive(width as i64, height as i64)
}

// AMF0 object key (u16 length + bytes) followed by a number marker.
fn amf_number(data: &[u8], key: &[u8]) -> Option<f64> {
    let key_len = u16::try_from(key.len()).ok()?.to_be_bytes();
    let pattern = [&key_len[..], key, &[0u8]].concat();
    let found = data.windows(pattern.len()).position(|window| window == pattern)?;
    let start = found + pattern.len();
    let bytes: [u8; 8] = data.get(start..start + 8)?.try_into().ok()?;
    let value = f64::from_be_bytes(bytes);
    value.is_finite().then_some(value)
}

/// Picture size from an Ogg Theora identification header.
pub(crate) fn theora_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    const MARKER: &[u8] = b"\x80theora";
    let found = data.windows(MARKER.len()).position(|window| window == MARKER)?;
    // version (3 bytes), frame width/height in macroblocks (2 + 2 bytes)
    let picture = found + MARKER.len() + 7;
    let fields = data.get(picture..picture + 6)?;
    let width = u32::from_be_bytes([0, fields[0], fields[1], fields[2]]);
    let height = u32::from_be_bytes([0, fields[3], fields[4], fields[5]]);
    positive(i64::from(width), i64::from(height))
}

pub(crate) fn is_theora(data: &[u8]) -> bool {
    data.windows(7).any(|window| window == b"\x80theora")
}

fn positive(width: i64, height: i64) -> Option<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
    }
}
