//! Decoder for the service's flat binary grid artifacts.
//!
//! Layout (all little-endian):
//!
//! ```text
//! offset  size  field
//! 0       4     magic "GRD1"
//! 4       4     width  (u32)
//! 8       4     height (u32)
//! 12      32    bounds west, south, east, north (4 x f64)
//! 44      4     nodata sentinel (f32)
//! 48      4*w*h samples, row-major, rows top-to-bottom (f32)
//! ```
//!
//! Decoding fails fast on any structural problem: a malformed artifact
//! is a contract violation, never something to retry.

use groundwatch_core::raster::{GeoBounds, RasterGrid};

/// Magic bytes identifying a grid artifact.
const MAGIC: &[u8; 4] = b"GRD1";

/// Fixed header size in bytes.
const HEADER_LEN: usize = 48;

/// Upper bound on accepted pixel counts (256 MiB of samples). Grids
/// larger than this indicate corrupt dimensions, not real products.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Errors from artifact decoding.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Fewer bytes than a full header.
    #[error("Artifact too short: {actual} bytes, need at least {HEADER_LEN}")]
    TooShort { actual: usize },

    /// The magic bytes did not match.
    #[error("Bad artifact magic: expected \"GRD1\", got {actual:?}")]
    BadMagic { actual: [u8; 4] },

    /// Zero or absurd dimensions.
    #[error("Corrupt grid dimensions: {width}x{height}")]
    CorruptDimensions { width: u32, height: u32 },

    /// The buffer does not hold `width * height` samples.
    #[error("Truncated sample buffer: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Decode a grid artifact into the sampler's [`RasterGrid`] shape.
pub fn decode_grid(bytes: &[u8]) -> Result<RasterGrid, ArtifactError> {
    if bytes.len() < HEADER_LEN {
        return Err(ArtifactError::TooShort {
            actual: bytes.len(),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if &magic != MAGIC {
        return Err(ArtifactError::BadMagic { actual: magic });
    }

    let width = read_u32(bytes, 4);
    let height = read_u32(bytes, 8);
    let pixels = u64::from(width) * u64::from(height);
    if width == 0 || height == 0 || pixels > MAX_PIXELS {
        return Err(ArtifactError::CorruptDimensions { width, height });
    }

    let bounds = GeoBounds {
        west: read_f64(bytes, 12),
        south: read_f64(bytes, 20),
        east: read_f64(bytes, 28),
        north: read_f64(bytes, 36),
    };
    let nodata = read_f32(bytes, 44);

    let expected = HEADER_LEN + pixels as usize * 4;
    if bytes.len() < expected {
        return Err(ArtifactError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let values = bytes[HEADER_LEN..expected]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(RasterGrid {
        width: width as usize,
        height: height as usize,
        bounds,
        nodata,
        values,
    })
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(buf)
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

#[cfg(test)]
pub(crate) mod test_support {
    use groundwatch_core::raster::RasterGrid;

    /// Encode a grid in the artifact wire format (tests only; the
    /// service side owns production encoding).
    pub fn encode_grid(grid: &RasterGrid) -> Vec<u8> {
        let mut out = Vec::with_capacity(48 + grid.values.len() * 4);
        out.extend_from_slice(b"GRD1");
        out.extend_from_slice(&(grid.width as u32).to_le_bytes());
        out.extend_from_slice(&(grid.height as u32).to_le_bytes());
        out.extend_from_slice(&grid.bounds.west.to_le_bytes());
        out.extend_from_slice(&grid.bounds.south.to_le_bytes());
        out.extend_from_slice(&grid.bounds.east.to_le_bytes());
        out.extend_from_slice(&grid.bounds.north.to_le_bytes());
        out.extend_from_slice(&grid.nodata.to_le_bytes());
        for v in &grid.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::encode_grid;
    use super::*;
    use assert_matches::assert_matches;

    fn sample_grid() -> RasterGrid {
        RasterGrid {
            width: 3,
            height: 2,
            bounds: GeoBounds {
                west: 4.0,
                south: 44.0,
                east: 5.0,
                north: 45.0,
            },
            nodata: -9999.0,
            values: vec![-0.0165, -0.0154, -0.0164, -0.0173, -0.0196, 0.0],
        }
    }

    #[test]
    fn decodes_what_the_service_encodes() {
        let grid = sample_grid();
        let decoded = decode_grid(&encode_grid(&grid)).unwrap();
        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.bounds, grid.bounds);
        assert_eq!(decoded.nodata, -9999.0);
        assert_eq!(decoded.values, grid.values);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_matches!(
            decode_grid(&[0u8; 10]),
            Err(ArtifactError::TooShort { actual: 10 })
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_grid(&sample_grid());
        bytes[0] = b'X';
        assert_matches!(decode_grid(&bytes), Err(ArtifactError::BadMagic { .. }));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut bytes = encode_grid(&sample_grid());
        bytes[4..8].copy_from_slice(&0u32.to_le_bytes());
        assert_matches!(
            decode_grid(&bytes),
            Err(ArtifactError::CorruptDimensions { width: 0, .. })
        );
    }

    #[test]
    fn rejects_absurd_dimensions() {
        let mut bytes = encode_grid(&sample_grid());
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_matches!(
            decode_grid(&bytes),
            Err(ArtifactError::CorruptDimensions { .. })
        );
    }

    #[test]
    fn rejects_truncated_samples() {
        let mut bytes = encode_grid(&sample_grid());
        bytes.truncate(bytes.len() - 4);
        assert_matches!(decode_grid(&bytes), Err(ArtifactError::Truncated { .. }));
    }
}
