use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{Array3, ArrayViewMut2};

use crate::error::{DeinterlaceError, Result};
use crate::frame::{ColorMode, FrameStack, SourceInfo};

pub const SER_HEADER_SIZE: usize = 178;
pub const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER file header (178 bytes).
#[derive(Clone, Debug, PartialEq)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Header for a mono stack of the given shape and sample width.
    pub fn mono(frames: usize, height: usize, width: usize, pixel_depth: u32) -> Self {
        Self {
            color_id: 0,
            little_endian: true,
            width: width as u32,
            height: height as u32,
            pixel_depth,
            frame_count: frames as u32,
            observer: String::new(),
            instrument: String::new(),
            telescope: String::new(),
            date_time: 0,
            date_time_utc: 0,
        }
    }

    /// Bytes per pixel plane (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_pixel_plane(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Number of planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            100 | 101 => 3,
            _ => 1,
        }
    }

    /// Total bytes per frame.
    pub fn frame_byte_size(&self) -> Result<usize> {
        let bytes_per_pixel = self.bytes_per_pixel_plane() * self.planes_per_pixel();
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
            .ok_or(DeinterlaceError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
    }

    pub fn color_mode(&self) -> ColorMode {
        match self.color_id {
            0 => ColorMode::Mono,
            8 => ColorMode::BayerRGGB,
            9 => ColorMode::BayerGRBG,
            10 => ColorMode::BayerGBRG,
            11 => ColorMode::BayerBGGR,
            100 => ColorMode::RGB,
            101 => ColorMode::BGR,
            _ => ColorMode::Mono,
        }
    }
}

/// Memory-mapped SER file reader.
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and lives as long as the reader; the
        // file is not expected to be modified while it is open.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(DeinterlaceError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(DeinterlaceError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;

        let expected_data_size = header
            .frame_byte_size()?
            .checked_mul(header.frame_count as usize)
            .and_then(|data| data.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| DeinterlaceError::InvalidSer("Frame data size overflows".into()))?;
        if mmap.len() < expected_data_size {
            return Err(DeinterlaceError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(DeinterlaceError::InvalidSer(format!(
                "Frame index {index} out of range (total: {count})"
            )));
        }
        let size = self.header.frame_byte_size()?;
        let offset = SER_HEADER_SIZE + index * size;
        Ok(&self.mmap[offset..offset + size])
    }

    /// Decode every frame into a stack in the file's native sample width.
    ///
    /// Only mono streams are accepted: colour and Bayer data interleave
    /// channels across rows, which would be mistaken for scan lines.
    pub fn read_stack(&self) -> Result<FrameStack> {
        let mode = self.header.color_mode();
        if mode != ColorMode::Mono || self.header.planes_per_pixel() != 1 {
            return Err(DeinterlaceError::UnsupportedPixelFormat(format!(
                "{mode:?} SER streams cannot be deinterlaced"
            )));
        }

        let shape = (
            self.frame_count(),
            self.header.height as usize,
            self.header.width as usize,
        );
        if self.header.bytes_per_pixel_plane() == 1 {
            let mut data = Array3::<u8>::zeros(shape);
            for (i, mut frame) in data.outer_iter_mut().enumerate() {
                let raw = self.frame_raw(i)?;
                for (dst, &src) in frame.iter_mut().zip(raw) {
                    *dst = src;
                }
            }
            Ok(FrameStack::U8(data))
        } else {
            let mut data = Array3::<u16>::zeros(shape);
            for (i, frame) in data.outer_iter_mut().enumerate() {
                decode_u16_plane(self.frame_raw(i)?, frame, self.header.little_endian);
            }
            Ok(FrameStack::U16(data))
        }
    }

    /// Per-frame timestamps from the optional trailer, if the file carries one.
    pub fn timestamps(&self) -> Option<Vec<u64>> {
        let trailer_offset =
            SER_HEADER_SIZE + self.header.frame_byte_size().ok()? * self.frame_count();
        let trailer_end = trailer_offset + self.frame_count() * 8;
        if self.frame_count() == 0 || trailer_end > self.mmap.len() {
            return None;
        }
        self.mmap[trailer_offset..trailer_end]
            .chunks_exact(8)
            .map(|bytes| bytes.try_into().ok().map(u64::from_le_bytes))
            .collect()
    }

    /// Build SourceInfo from the header.
    pub fn source_info(&self, path: &Path) -> SourceInfo {
        SourceInfo {
            filename: path.to_path_buf(),
            total_frames: self.frame_count(),
            width: self.header.width,
            height: self.header.height,
            bit_depth: self.header.pixel_depth as u8,
            color_mode: self.header.color_mode(),
            observer: non_empty(&self.header.observer),
            instrument: non_empty(&self.header.instrument),
        }
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()? as u32;
    let height = cursor.read_i32::<LittleEndian>()? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>()? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>()? as u32;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width == 0 || height == 0 {
        return Err(DeinterlaceError::InvalidDimensions { width, height });
    }
    if pixel_depth == 0 || pixel_depth > 16 {
        return Err(DeinterlaceError::UnsupportedPixelFormat(format!(
            "{pixel_depth}-bit samples"
        )));
    }

    // A LittleEndian field of 0 nominally means big-endian, but most capture
    // software writes 0 for little-endian data. Only 1 is treated as big-endian.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn decode_u16_plane(raw: &[u8], mut frame: ArrayViewMut2<'_, u16>, little_endian: bool) {
    for (dst, pair) in frame.iter_mut().zip(raw.chunks_exact(2)) {
        let pair = [pair[0], pair[1]];
        *dst = if little_endian {
            u16::from_le_bytes(pair)
        } else {
            u16::from_be_bytes(pair)
        };
    }
}
