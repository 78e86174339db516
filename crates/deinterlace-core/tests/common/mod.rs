#![allow(dead_code)]

use deinterlace_core::io::ser::SER_HEADER_SIZE;
use ndarray::{Array2, Array3};

/// Small deterministic generator so tests never depend on a RNG crate.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    /// Uniform sample in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// `rows` independent rows of random texture in [lo, hi).
pub fn textured_rows(rows: usize, width: usize, lo: f64, hi: f64, seed: u64) -> Array2<f64> {
    let mut rng = Lcg::new(seed);
    Array2::from_shape_fn((rows, width), |_| lo + (hi - lo) * rng.next_f64())
}

/// Circularly shift a row right by `shift` columns (negative shifts left).
pub fn roll(row: &[f64], shift: i32) -> Vec<f64> {
    let w = row.len() as i64;
    (0..w)
        .map(|c| row[((c - shift as i64).rem_euclid(w)) as usize])
        .collect()
}

/// Interlaced stack: even row `2r` is texture row `r`, odd row `2r + 1` is the
/// same texture rolled right by `shift`. Frame `f` is scaled by `f + 1` so that
/// frames differ and the per-pixel spread keeps the texture.
pub fn interlaced_stack(frames: usize, rows: usize, width: usize, shift: i32, seed: u64) -> Array3<f64> {
    let texture = textured_rows(rows.div_ceil(2), width, 10.0, 200.0, seed);
    let mut stack = Array3::<f64>::zeros((frames, rows, width));
    for f in 0..frames {
        let gain = (f + 1) as f64;
        for r in 0..rows {
            let base = texture.row(r / 2).to_vec();
            let line = if r % 2 == 1 { roll(&base, shift) } else { base };
            for (c, v) in line.into_iter().enumerate() {
                stack[[f, r, c]] = v * gain;
            }
        }
    }
    stack
}

pub fn interlaced_stack_u16(frames: usize, rows: usize, width: usize, shift: i32, seed: u64) -> Array3<u16> {
    interlaced_stack(frames, rows, width, shift, seed).mapv(|v| v.round() as u16)
}

/// Stack of `frames` frames whose even rows carry one bright column and odd
/// rows carry the same column displaced to `odd_column`.
pub fn bright_column_stack(
    frames: usize,
    rows: usize,
    width: usize,
    even_column: usize,
    odd_column: usize,
) -> Array3<u16> {
    let mut stack = Array3::<u16>::zeros((frames, rows, width));
    for f in 0..frames {
        for r in 0..rows {
            let col = if r % 2 == 0 { even_column } else { odd_column };
            stack[[f, r, col]] = 1000;
        }
    }
    stack
}

/// Build a SER file header with configurable bit depth, colour mode and
/// endianness flag.
///
/// `color_id`: 0=MONO, 8..=11 Bayer, 100=RGB, 101=BGR.
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
    big_endian: bool,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&color_id.to_le_bytes());
    let le_flag: i32 = if big_endian { 1 } else { 0 };
    buf.extend_from_slice(&le_flag.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer
    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    // Instrument
    buf.extend_from_slice(&[0u8; 40]);
    // Telescope
    let mut telescope = [0u8; 40];
    telescope[..10].copy_from_slice(b"Resonant-2");
    buf.extend_from_slice(&telescope);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&42u64.to_le_bytes());
    buf.extend_from_slice(&43u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Complete mono 8-bit SER file.
pub fn build_ser_u8(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 8, frames.len(), 0, false);
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Complete mono 16-bit SER file, encoded with the requested byte order.
pub fn build_ser_u16(width: u32, height: u32, bit_depth: u32, frames: &[Vec<u16>], big_endian: bool) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, bit_depth, frames.len(), 0, big_endian);
    for frame in frames {
        for &v in frame {
            let bytes = if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
            buf.extend_from_slice(&bytes);
        }
    }
    buf
}
