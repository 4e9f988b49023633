//! Sensor frame reader.
//!
//! The sensor streams 10-byte frames continuously. A read may start in the
//! middle of one, so the reader scans for the `AA C0` header before taking
//! the rest of the frame.

use std::io::Read;
use std::time::Duration;

use airq_types::{FRAME_COMMAND, FRAME_HEADER, FRAME_LEN, ParticulateSample};
use tracing::debug;

use crate::error::{Result, SamplerError};

/// Bytes to scan for a header before giving up (several whole frames).
pub const MAX_RESYNC_BYTES: usize = 4 * FRAME_LEN;

/// Read one raw frame, resynchronising on the header.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<[u8; FRAME_LEN]> {
    let mut byte = [0u8; 1];
    let mut previous = None;
    let mut scanned = 0usize;

    loop {
        reader.read_exact(&mut byte)?;
        scanned += 1;
        if previous == Some(FRAME_HEADER) && byte[0] == FRAME_COMMAND {
            break;
        }
        if scanned >= MAX_RESYNC_BYTES {
            return Err(SamplerError::NoFrame(scanned));
        }
        previous = Some(byte[0]);
    }

    let discarded = scanned - 2;
    if discarded > 0 {
        debug!(discarded, "Resynchronised on frame header");
    }

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = FRAME_HEADER;
    frame[1] = FRAME_COMMAND;
    reader.read_exact(&mut frame[2..])?;
    Ok(frame)
}

/// Read and decode one measurement.
pub fn read_sample<R: Read>(reader: &mut R) -> Result<ParticulateSample> {
    let frame = read_frame(reader)?;
    Ok(ParticulateSample::from_frame(&frame)?)
}

/// Open the serial port, take one measurement and close the port.
pub fn sample_port(port: &str, baud_rate: u32, timeout: Duration) -> Result<ParticulateSample> {
    let mut serial = serialport::new(port, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|e| SamplerError::OpenPort {
            port: port.to_string(),
            source: e,
        })?;

    debug!("Reading frame from {}", port);
    read_sample(&mut serial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use airq_types::ParseError;

    /// PM2.5 8.5, PM10 15.0.
    const FRAME: [u8; FRAME_LEN] = [0xAA, 0xC0, 0x55, 0x00, 0x96, 0x00, 0x01, 0x02, 0xEE, 0xAB];

    #[test]
    fn test_read_aligned_frame() {
        let sample = read_sample(&mut Cursor::new(FRAME)).unwrap();
        assert_eq!(sample.pm25(), 8.5);
        assert_eq!(sample.pm10(), 15.0);
    }

    #[test]
    fn test_resync_after_partial_frame() {
        // Tail of a previous frame, including a stray header byte.
        let mut stream = vec![0x96, 0x00, 0xAA, 0xEE, 0xAB];
        stream.extend_from_slice(&FRAME);

        let frame = read_frame(&mut Cursor::new(stream)).unwrap();
        assert_eq!(frame, FRAME);
    }

    #[test]
    fn test_consecutive_frames() {
        let mut stream = FRAME.to_vec();
        stream.extend_from_slice(&FRAME);
        let mut cursor = Cursor::new(stream);

        read_frame(&mut cursor).unwrap();
        read_frame(&mut cursor).unwrap();
        assert!(matches!(read_frame(&mut cursor), Err(SamplerError::Read(_))));
    }

    #[test]
    fn test_no_header_gives_up() {
        let noise = vec![0x00; MAX_RESYNC_BYTES * 2];
        assert!(matches!(
            read_frame(&mut Cursor::new(noise)),
            Err(SamplerError::NoFrame(n)) if n == MAX_RESYNC_BYTES
        ));
    }

    #[test]
    fn test_truncated_frame_is_read_error() {
        let err = read_frame(&mut Cursor::new(&FRAME[..6])).unwrap_err();
        let SamplerError::Read(io) = err else {
            panic!("expected read error, got {err:?}");
        };
        assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_bad_checksum_is_frame_error() {
        let mut frame = FRAME;
        frame[8] = 0x00;
        assert!(matches!(
            read_sample(&mut Cursor::new(frame)),
            Err(SamplerError::Frame(ParseError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_missing_port() {
        let result = sample_port("/dev/airq-no-such-port", 9600, Duration::from_millis(10));
        assert!(matches!(result, Err(SamplerError::OpenPort { .. })));
    }
}
