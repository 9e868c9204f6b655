//! zlib compression for large payload columns

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{self, Read, Write};

/// Default compression level
pub const DEFAULT_LEVEL: u32 = 3;

/// Compress `data` at `level` (0 = stored, 9 = best)
pub fn compress(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate a zlib stream
///
/// Input that ends before the stream does is reported as `UnexpectedEof`.
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;

    // Bytes left behind the stream end mean the column holds more than one value
    if decoder.total_in() != data.len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "trailing bytes after zlib stream",
        ));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_at_every_level() {
        let data = b"version: \"1\"\nsteps:\n  - name: test\n    image: golang\n".repeat(20);

        for level in 0..=9 {
            let compressed = compress(&data, level).unwrap();
            assert_eq!(decompress(&compressed).unwrap(), data, "level {level}");
        }
    }

    #[test]
    fn test_round_trip_of_highly_compressible_payload() {
        let data = b"steps:\n  - name: test\n    image: golang\n".repeat(1_000);

        let compressed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(compressed.len() * 10 < data.len());
        assert!(data.len() > (4 * compressed.len()).max(4096));

        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() {
        let data = vec![b'a'; 4096];
        let compressed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(compressed.len() < data.len() / 10);
    }

    #[test]
    fn test_decodes_streams_from_other_encoders() {
        // "foo" as written by a sync-flushing zlib writer at level 3
        let stream = [
            120, 94, 74, 203, 207, 7, 4, 0, 0, 255, 255, 2, 130, 1, 69,
        ];
        assert_eq!(decompress(&stream).unwrap(), b"foo");
    }

    #[test]
    fn test_corrupt_input_is_an_error() {
        assert!(decompress(b"definitely not zlib").is_err());

        let mut truncated = compress(b"some pipeline data", DEFAULT_LEVEL).unwrap();
        truncated.truncate(truncated.len() / 2);
        assert!(decompress(&truncated).is_err());
    }

    #[test]
    fn test_truncated_large_payload_is_an_error() {
        let data = b"stages:\n  build:\n    steps: [make]\n".repeat(2_000);
        let mut truncated = compress(&data, DEFAULT_LEVEL).unwrap();
        truncated.truncate(truncated.len() - 6);

        assert!(decompress(&truncated).is_err());
    }

    #[test]
    fn test_trailing_garbage_is_an_error() {
        let mut stream = compress(b"foo", DEFAULT_LEVEL).unwrap();
        stream.extend_from_slice(b"junk");

        assert!(decompress(&stream).is_err());
    }
}
