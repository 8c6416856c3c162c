//! Compresses metadata blobs over `compress_threshold_bytes` before write.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Returns `(bytes_to_write, was_compressed)`. Blobs at or under
/// `threshold` are written verbatim; zlib compression rarely helps on
/// tiny payloads and the flag would be noise.
pub fn compress_if_over_threshold(blob: &[u8], threshold: usize) -> anyhow::Result<(Vec<u8>, bool)> {
    if blob.len() <= threshold {
        return Ok((blob.to_vec(), false));
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(blob)?;
    Ok((encoder.finish()?, true))
}

/// Ratio of compressed to original size, for the "compression ratio"
/// metric. 1.0 when nothing was compressed.
pub fn compression_ratio(original_len: usize, compressed_len: usize, was_compressed: bool) -> f64 {
    if !was_compressed || original_len == 0 {
        return 1.0;
    }
    compressed_len as f64 / original_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_blob_passes_through_uncompressed() {
        let blob = vec![1u8; 100];
        let (out, compressed) = compress_if_over_threshold(&blob, 1024).unwrap();
        assert!(!compressed);
        assert_eq!(out, blob);
    }

    #[test]
    fn large_repetitive_blob_compresses_smaller() {
        let blob = vec![0u8; 4096];
        let (out, compressed) = compress_if_over_threshold(&blob, 1024).unwrap();
        assert!(compressed);
        assert!(out.len() < blob.len());
    }

    #[test]
    fn ratio_is_one_when_uncompressed() {
        assert_eq!(compression_ratio(500, 500, false), 1.0);
    }

    #[test]
    fn ratio_reflects_shrinkage() {
        assert_eq!(compression_ratio(1000, 250, true), 0.25);
    }
}
