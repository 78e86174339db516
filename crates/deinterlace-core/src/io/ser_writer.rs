use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{DeinterlaceError, Result};
use crate::frame::FrameStack;
use crate::io::ser::{SerHeader, SER_HEADER_SIZE, SER_MAGIC};

/// Writes a valid SER file at the raw byte level.
pub struct SerWriter {
    writer: BufWriter<File>,
    header: SerHeader,
    frames_written: u32,
}

impl SerWriter {
    /// Create a new SER file and write the header.
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        Ok(Self {
            writer,
            header: header.clone(),
            frames_written: 0,
        })
    }

    /// Write a single raw frame (bytes must match the header's frame_byte_size).
    pub fn write_raw_frame(&mut self, data: &[u8]) -> Result<()> {
        let expected = self.header.frame_byte_size()?;
        if data.len() != expected {
            return Err(DeinterlaceError::InvalidSer(format!(
                "Frame of {} bytes does not match header frame size {expected}",
                data.len()
            )));
        }
        self.writer.write_all(data)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Write every frame of `stack`, little-endian for 16-bit samples.
    pub fn write_stack(&mut self, stack: &FrameStack) -> Result<()> {
        match stack {
            FrameStack::U8(data) => {
                for frame in data.outer_iter() {
                    let bytes: Vec<u8> = frame.iter().copied().collect();
                    self.write_raw_frame(&bytes)?;
                }
            }
            FrameStack::U16(data) => {
                for frame in data.outer_iter() {
                    let bytes: Vec<u8> = frame.iter().flat_map(|v| v.to_le_bytes()).collect();
                    self.write_raw_frame(&bytes)?;
                }
            }
        }
        Ok(())
    }

    /// Write the optional timestamp trailer (one u64 per frame, little-endian).
    pub fn write_timestamps(&mut self, timestamps: &[u64]) -> Result<()> {
        for &ts in timestamps {
            self.writer.write_all(&ts.to_le_bytes())?;
        }
        Ok(())
    }

    /// Flush and finalize the file.
    pub fn finalize(mut self) -> Result<()> {
        if self.frames_written != self.header.frame_count {
            return Err(DeinterlaceError::InvalidSer(format!(
                "Header announces {} frames but {} were written",
                self.header.frame_count, self.frames_written
            )));
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Write `stack` as a complete SER file.
///
/// Descriptive fields (observer, instrument, telescope, dates) are taken from
/// `template` when given; geometry and sample width always follow the stack.
pub fn write_ser(
    path: &Path,
    stack: &FrameStack,
    template: Option<&SerHeader>,
    timestamps: Option<&[u64]>,
) -> Result<()> {
    let (frames, height, width) = stack.dim();
    let pixel_depth = match (stack, template) {
        (FrameStack::U16(_), Some(t)) if t.pixel_depth > 8 => t.pixel_depth,
        _ => stack.sample_bits() as u32,
    };
    let mut header = SerHeader::mono(frames, height, width, pixel_depth);
    if let Some(t) = template {
        header.observer = t.observer.clone();
        header.instrument = t.instrument.clone();
        header.telescope = t.telescope.clone();
        header.date_time = t.date_time;
        header.date_time_utc = t.date_time_utc;
    }

    let mut writer = SerWriter::create(path, &header)?;
    writer.write_stack(stack)?;
    if let Some(ts) = timestamps {
        writer.write_timestamps(ts)?;
    }
    writer.finalize()
}

fn write_header(w: &mut impl Write, header: &SerHeader) -> Result<()> {
    // Magic (14 bytes)
    w.write_all(SER_MAGIC)?;
    // LuID (4 bytes)
    w.write_all(&0i32.to_le_bytes())?;
    // ColorID (4 bytes)
    w.write_all(&header.color_id.to_le_bytes())?;
    // LittleEndian flag: 0 = little-endian
    let le_flag: i32 = if header.little_endian { 0 } else { 1 };
    w.write_all(&le_flag.to_le_bytes())?;
    w.write_all(&(header.width as i32).to_le_bytes())?;
    w.write_all(&(header.height as i32).to_le_bytes())?;
    w.write_all(&(header.pixel_depth as i32).to_le_bytes())?;
    w.write_all(&(header.frame_count as i32).to_le_bytes())?;
    // Observer, Instrument, Telescope (40 bytes each)
    write_fixed_string(w, &header.observer, 40)?;
    write_fixed_string(w, &header.instrument, 40)?;
    write_fixed_string(w, &header.telescope, 40)?;
    w.write_all(&header.date_time.to_le_bytes())?;
    w.write_all(&header.date_time_utc.to_le_bytes())?;

    debug_assert_eq!(
        14 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 40 + 40 + 40 + 8 + 8,
        SER_HEADER_SIZE
    );
    Ok(())
}

fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let to_write = bytes.len().min(len);
    w.write_all(&bytes[..to_write])?;
    w.write_all(&vec![0u8; len - to_write])?;
    Ok(())
}
