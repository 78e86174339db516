mod common;

use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

use deinterlace_core::compute::cpu::CpuBackend;
use deinterlace_core::config::DeinterlaceConfig;
use deinterlace_core::error::DeinterlaceError;
use deinterlace_core::frame::{ColorMode, FrameStack};
use deinterlace_core::io::ser::{SerHeader, SerReader};
use deinterlace_core::io::ser_writer::{write_ser, SerWriter};
use deinterlace_core::progress::NoOpReporter;
use ndarray::Array3;

use common::{build_ser_header_full, build_ser_u16, build_ser_u8, interlaced_stack_u16};

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut tmpfile = NamedTempFile::new().unwrap();
    tmpfile.write_all(bytes).unwrap();
    tmpfile.flush().unwrap();
    tmpfile
}

#[test]
fn test_parse_8bit_mono() {
    let frames = vec![(0u8..12).collect::<Vec<_>>(), (100u8..112).collect()];
    let tmpfile = write_temp(&build_ser_u8(4, 3, &frames));

    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert_eq!(reader.frame_count(), 2);
    assert_eq!(reader.header.width, 4);
    assert_eq!(reader.header.height, 3);
    assert_eq!(reader.header.pixel_depth, 8);
    assert_eq!(reader.header.color_mode(), ColorMode::Mono);
    assert_eq!(reader.header.observer, "Test");
    assert_eq!(reader.header.telescope, "Resonant-2");

    match reader.read_stack().unwrap() {
        FrameStack::U8(data) => {
            assert_eq!(data.dim(), (2, 3, 4));
            assert_eq!(data[[0, 0, 0]], 0);
            assert_eq!(data[[0, 2, 3]], 11);
            assert_eq!(data[[1, 1, 0]], 104);
        }
        FrameStack::U16(_) => panic!("expected 8-bit stack"),
    }
}

#[test]
fn test_source_info_from_header() {
    let tmpfile = write_temp(&build_ser_u8(4, 2, &vec![vec![0u8; 8]; 3]));
    let reader = SerReader::open(tmpfile.path()).unwrap();
    let info = reader.source_info(tmpfile.path());

    assert_eq!(info.filename, tmpfile.path());
    assert_eq!(info.total_frames, 3);
    assert_eq!((info.width, info.height), (4, 2));
    assert_eq!(info.bit_depth, 8);
    assert_eq!(info.color_mode, ColorMode::Mono);
    assert_eq!(info.observer.as_deref(), Some("Test"));
    assert_eq!(info.instrument, None);
}

#[test]
fn test_parse_16bit_little_endian() {
    let frame: Vec<u16> = (0..6).map(|v| v * 1000 + 7).collect();
    let tmpfile = write_temp(&build_ser_u16(3, 2, 12, &[frame], false));

    let reader = SerReader::open(tmpfile.path()).unwrap();
    match reader.read_stack().unwrap() {
        FrameStack::U16(data) => {
            assert_eq!(data[[0, 0, 0]], 7);
            assert_eq!(data[[0, 1, 2]], 5007);
        }
        FrameStack::U8(_) => panic!("expected 16-bit stack"),
    }
}

#[test]
fn test_parse_16bit_big_endian() {
    let frame: Vec<u16> = vec![0x0102, 0xA0B0, 0x00FF, 0xFF00];
    let tmpfile = write_temp(&build_ser_u16(2, 2, 16, &[frame.clone()], true));

    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert!(!reader.header.little_endian);
    let FrameStack::U16(data) = reader.read_stack().unwrap() else {
        panic!("expected 16-bit stack");
    };
    let decoded: Vec<u16> = data.iter().copied().collect();
    assert_eq!(decoded, frame);
}

#[test]
fn test_colour_stream_rejected() {
    let mut bytes = build_ser_header_full(2, 2, 8, 1, 100, false);
    bytes.extend_from_slice(&[0u8; 12]);
    let tmpfile = write_temp(&bytes);

    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert_eq!(reader.header.color_mode(), ColorMode::RGB);
    assert!(matches!(
        reader.read_stack(),
        Err(DeinterlaceError::UnsupportedPixelFormat(_))
    ));
}

#[test]
fn test_bayer_stream_rejected() {
    let mut bytes = build_ser_header_full(2, 2, 8, 1, 8, false);
    bytes.extend_from_slice(&[0u8; 4]);
    let tmpfile = write_temp(&bytes);

    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert!(matches!(
        reader.read_stack(),
        Err(DeinterlaceError::UnsupportedPixelFormat(_))
    ));
}

#[test]
fn test_truncated_file_rejected() {
    let mut bytes = build_ser_u8(4, 4, &[vec![0u8; 16], vec![0u8; 16]]);
    bytes.truncate(bytes.len() - 5);
    let tmpfile = write_temp(&bytes);
    assert!(matches!(
        SerReader::open(tmpfile.path()),
        Err(DeinterlaceError::InvalidSer(_))
    ));
}

#[test]
fn test_bad_magic_rejected() {
    let mut bytes = build_ser_u8(2, 2, &[vec![0u8; 4]]);
    bytes[0] = b'X';
    let tmpfile = write_temp(&bytes);
    assert!(matches!(
        SerReader::open(tmpfile.path()),
        Err(DeinterlaceError::InvalidSer(_))
    ));
}

#[test]
fn test_zero_width_rejected() {
    let bytes = build_ser_header_full(0, 4, 8, 0, 0, false);
    let tmpfile = write_temp(&bytes);
    assert!(matches!(
        SerReader::open(tmpfile.path()),
        Err(DeinterlaceError::InvalidDimensions { width: 0, height: 4 })
    ));
}

#[test]
fn test_frame_index_out_of_range() {
    let tmpfile = write_temp(&build_ser_u8(2, 2, &[vec![1u8; 4]]));
    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert!(reader.frame_raw(0).is_ok());
    assert!(reader.frame_raw(1).is_err());
}

#[test]
fn test_timestamps_trailer() {
    let mut bytes = build_ser_u8(2, 2, &[vec![0u8; 4], vec![1u8; 4]]);
    for ts in [638_000_000_000_000_000u64, 638_000_000_000_100_000] {
        bytes.extend_from_slice(&ts.to_le_bytes());
    }
    let tmpfile = write_temp(&bytes);

    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert_eq!(
        reader.timestamps(),
        Some(vec![638_000_000_000_000_000, 638_000_000_000_100_000])
    );
}

#[test]
fn test_no_trailer_means_no_timestamps() {
    let tmpfile = write_temp(&build_ser_u8(2, 2, &[vec![0u8; 4]]));
    let reader = SerReader::open(tmpfile.path()).unwrap();
    assert_eq!(reader.timestamps(), None);
}

#[test]
fn test_write_ser_keeps_metadata_and_timestamps() {
    let source = write_temp(&build_ser_u16(4, 2, 12, &[vec![1, 2, 3, 4, 5, 6, 7, 8]], false));
    let reader = SerReader::open(source.path()).unwrap();
    let stack = reader.read_stack().unwrap();

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.ser");
    write_ser(&out, &stack, Some(&reader.header), Some(&[99u64][..])).unwrap();

    let written = SerReader::open(&out).unwrap();
    assert_eq!(written.header.pixel_depth, 12);
    assert_eq!(written.header.telescope, "Resonant-2");
    assert_eq!(written.header.date_time, 42);
    assert_eq!(written.header.date_time_utc, 43);
    assert_eq!(written.timestamps(), Some(vec![99]));
    assert_eq!(written.read_stack().unwrap(), stack);
}

#[test]
fn test_writer_rejects_wrong_frame_size() {
    let dir = TempDir::new().unwrap();
    let header = SerHeader::mono(1, 2, 2, 8);
    let mut writer = SerWriter::create(&dir.path().join("bad.ser"), &header).unwrap();
    assert!(writer.write_raw_frame(&[0u8; 3]).is_err());
}

#[test]
fn test_writer_rejects_missing_frames() {
    let dir = TempDir::new().unwrap();
    let header = SerHeader::mono(2, 2, 2, 8);
    let mut writer = SerWriter::create(&dir.path().join("short.ser"), &header).unwrap();
    writer.write_raw_frame(&[0u8; 4]).unwrap();
    assert!(matches!(writer.finalize(), Err(DeinterlaceError::InvalidSer(_))));
}

#[test]
fn test_deinterlace_ser_file() {
    let stack = interlaced_stack_u16(3, 16, 64, 4, 33);
    let frames: Vec<Vec<u16>> = stack
        .outer_iter()
        .map(|frame| frame.iter().copied().collect())
        .collect();
    let source = write_temp(&build_ser_u16(64, 16, 16, &frames, false));

    let reader = SerReader::open(source.path()).unwrap();
    let mut stack = reader.read_stack().unwrap();
    let offsets = stack
        .deinterlace(&DeinterlaceConfig::default(), &CpuBackend, &NoOpReporter)
        .unwrap();
    assert_eq!(offsets[0].offset, -4);

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("corrected.ser");
    write_ser(&out, &stack, Some(&reader.header), None).unwrap();

    let corrected = SerReader::open(&out).unwrap().read_stack().unwrap();
    let FrameStack::U16(data) = corrected else {
        panic!("expected 16-bit stack");
    };
    let expected: Array3<u16> = match stack {
        FrameStack::U16(d) => d,
        FrameStack::U8(_) => unreachable!(),
    };
    assert_eq!(data, expected);
}
