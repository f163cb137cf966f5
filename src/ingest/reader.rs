//! Size-bounded request body reader
//!
//! Reads at most `max_size + 1` decoded bytes into a pooled buffer,
//! decompressing gzip bodies on the fly. Reading one byte past the
//! limit is how truncation is detected: if the buffer ends up longer
//! than `max_size` the request is rejected before any parse work, and
//! worst-case memory use stays bounded regardless of the declared or
//! actual body size.

use flate2::read::GzDecoder;
use std::io::Read;

use crate::error::IngestError;

/// Read a request body into `buf`, enforcing the decoded size bound
///
/// `gzip` reflects the request's `Content-Encoding`. Transport or
/// decompression failures surface as [`IngestError::Read`]; a decoded
/// length above `max_size` as [`IngestError::TooLarge`].
pub fn read_body<R: Read>(
    buf: &mut Vec<u8>,
    src: R,
    gzip: bool,
    max_size: usize,
) -> Result<(), IngestError> {
    buf.clear();
    let limit = max_size as u64 + 1;

    let n = if gzip {
        let mut decoder = GzDecoder::new(src).take(limit);
        decoder.read_to_end(buf).map_err(IngestError::Read)?
    } else {
        let mut limited = src.take(limit);
        limited.read_to_end(buf).map_err(IngestError::Read)?
    };

    if n > max_size {
        return Err(IngestError::TooLarge { max_size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_read_plain_body() {
        let mut buf = Vec::new();
        read_body(&mut buf, &b"hello"[..], false, 1024).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn test_read_body_at_exact_limit_is_accepted() {
        let mut buf = Vec::new();
        read_body(&mut buf, &b"12345"[..], false, 5).unwrap();
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_read_body_over_limit_is_rejected() {
        let mut buf = Vec::new();
        let err = read_body(&mut buf, &b"123456"[..], false, 5).unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { max_size: 5 }));
    }

    #[test]
    fn test_read_gzip_body() {
        let compressed = gzip_bytes(b"hello gzip");
        let mut buf = Vec::new();
        read_body(&mut buf, &compressed[..], true, 1024).unwrap();
        assert_eq!(buf, b"hello gzip");
    }

    #[test]
    fn test_gzip_bomb_is_rejected_by_decoded_size() {
        // Small on the wire, large decoded
        let compressed = gzip_bytes(&vec![0u8; 64 * 1024]);
        assert!(compressed.len() < 1024);

        let mut buf = Vec::new();
        let err = read_body(&mut buf, &compressed[..], true, 1024).unwrap_err();
        assert!(matches!(err, IngestError::TooLarge { .. }));
        // Decoded no more than one byte past the bound
        assert!(buf.len() <= 1025);
    }

    #[test]
    fn test_corrupt_gzip_is_a_read_error() {
        let mut buf = Vec::new();
        let err = read_body(&mut buf, &b"not gzip at all"[..], true, 1024).unwrap_err();
        assert!(matches!(err, IngestError::Read(_)));
    }

    #[test]
    fn test_read_body_clears_previous_contents() {
        let mut buf = b"stale".to_vec();
        read_body(&mut buf, &b"fresh"[..], false, 1024).unwrap();
        assert_eq!(buf, b"fresh");
    }
}
