use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

/// Default size above which stored payloads are zstd-compressed.
pub const DEFAULT_THRESHOLD: usize = 1024;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressKind {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl CompressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressKind::None => "NONE",
            CompressKind::Gzip => "GZIP",
            CompressKind::Zstd => "ZSTD",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "GZIP" => CompressKind::Gzip,
            "ZSTD" => CompressKind::Zstd,
            _ => CompressKind::None,
        }
    }

    /// Map a `Content-Encoding` header value. Only gzip and zstd are produced.
    pub fn from_content_encoding(value: &str) -> Result<Self, CompressError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(CompressKind::Gzip),
            "zstd" => Ok(CompressKind::Zstd),
            _ => Err(CompressError::Unsupported(value.trim().to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("unsupported encoding: {0}")]
    Unsupported(String),
    #[error("compression i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload json: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn compress(kind: CompressKind, data: &[u8]) -> Result<Vec<u8>, CompressError> {
    match kind {
        CompressKind::None => Ok(data.to_vec()),
        CompressKind::Gzip => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(data)?;
            Ok(enc.finish()?)
        }
        CompressKind::Zstd => Ok(zstd::encode_all(data, ZSTD_LEVEL)?),
    }
}

pub fn decompress(kind: CompressKind, data: &[u8]) -> Result<Vec<u8>, CompressError> {
    match kind {
        CompressKind::None => Ok(data.to_vec()),
        CompressKind::Gzip => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
        CompressKind::Zstd => Ok(zstd::decode_all(data)?),
    }
}

/// Zstd-compress `data` when it is larger than `threshold` and the result is
/// strictly shorter; otherwise return it unchanged.
pub fn compress_if_smaller(
    data: Vec<u8>,
    threshold: usize,
) -> Result<(Vec<u8>, CompressKind), CompressError> {
    if data.len() <= threshold {
        return Ok((data, CompressKind::None));
    }
    let packed = compress(CompressKind::Zstd, &data)?;
    if packed.len() < data.len() {
        Ok((packed, CompressKind::Zstd))
    } else {
        Ok((data, CompressKind::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payloads_stay_raw() {
        let (out, kind) = compress_if_smaller(b"tiny".to_vec(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(kind, CompressKind::None);
        assert_eq!(out, b"tiny");
    }

    #[test]
    fn large_repetitive_payload_is_zstd() {
        let data = "abcdefgh".repeat(1000).into_bytes();
        let (out, kind) = compress_if_smaller(data.clone(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(kind, CompressKind::Zstd);
        assert!(out.len() < data.len());
        assert_eq!(decompress(kind, &out).unwrap(), data);
    }

    #[test]
    fn incompressible_payload_stays_raw() {
        let noise = noise_bytes(4096);
        let (out, kind) = compress_if_smaller(noise.clone(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(kind, CompressKind::None);
        assert_eq!(out, noise);
    }

    #[test]
    fn gzip_round_trip() {
        let packed = compress(CompressKind::Gzip, b"hello hello hello").unwrap();
        assert_eq!(decompress(CompressKind::Gzip, &packed).unwrap(), b"hello hello hello");
    }

    #[test]
    fn content_encoding_mapping() {
        assert_eq!(CompressKind::from_content_encoding("GZIP").unwrap(), CompressKind::Gzip);
        assert_eq!(CompressKind::from_content_encoding(" zstd ").unwrap(), CompressKind::Zstd);
        for bad in ["identity", "deflate", "br"] {
            assert!(matches!(
                CompressKind::from_content_encoding(bad),
                Err(CompressError::Unsupported(_))
            ));
        }
    }

    fn noise_bytes(n: usize) -> Vec<u8> {
        let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
        (0..n)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                (x >> 24) as u8
            })
            .collect()
    }
}
