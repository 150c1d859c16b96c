//! Content-addressed blob storage for artifact bytes.
//!
//! Each blob lives at `<cache_dir>/blobs/<hash>.blob` and starts with a
//! header holding magic bytes, the format version, the payload length and a
//! checksum. Blobs that fail any of these checks read as missing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use bundle_common::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Subdirectory of the cache directory holding blobs.
const BLOB_SUBDIR: &str = "blobs";

/// File extension of blob files.
const BLOB_EXT: &str = "blob";

/// Magic bytes identifying a blob file.
const BLOB_MAGIC: [u8; 4] = *b"BNDL";

/// Current blob format version. Increment on breaking changes to the header
/// or payload layout.
const BLOB_FORMAT_VERSION: u32 = 1;

/// Header prepended to every blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Magic bytes: must be `b"BNDL"`.
    pub magic: [u8; 4],
    /// Blob format version.
    pub format_version: u32,
    /// Payload length in bytes.
    pub len: u64,
    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// Content-addressed store for artifact bytes.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Creates a blob store inside the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(BLOB_SUBDIR),
        }
    }

    /// Returns the file path of the blob with the given hash.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!("{hash}.{BLOB_EXT}"))
    }

    /// Writes `data` and returns its content hash, which is the blob's key.
    ///
    /// Identical payloads map to the same file, so writing the same bytes
    /// twice leaves a single blob.
    pub async fn write(&self, data: &[u8]) -> Result<ContentHash, CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let hash = ContentHash::from_bytes(data);
        let header = BlobHeader {
            magic: BLOB_MAGIC,
            format_version: BLOB_FORMAT_VERSION,
            len: data.len() as u64,
            checksum: hash,
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(CacheError::serialization)?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.blob_path(&hash);
        tokio::fs::write(&path, &output)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        debug!(blob = %hash, bytes = data.len(), "wrote blob");
        Ok(hash)
    }

    /// Reads a blob, returning `None` if it is missing or fails validation.
    pub async fn read(&self, hash: &ContentHash) -> Option<Vec<u8>> {
        match self.read_checked(hash).await {
            Ok(data) => Some(data),
            Err(CacheError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                None
            }
            Err(e) => {
                warn!(blob = %hash, error = %e, "discarding unreadable blob");
                None
            }
        }
    }

    /// Reads a blob and reports exactly why it could not be used.
    pub async fn read_checked(&self, hash: &ContentHash) -> Result<Vec<u8>, CacheError> {
        let path = self.blob_path(hash);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        if raw.len() < 4 {
            return Err(CacheError::InvalidHeader {
                path,
                reason: "truncated header length".to_string(),
            });
        }
        let header_len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if raw.len() < 4 + header_len {
            return Err(CacheError::InvalidHeader {
                path,
                reason: "truncated header".to_string(),
            });
        }

        let (header, _): (BlobHeader, usize) = bincode::serde::decode_from_slice(
            &raw[4..4 + header_len],
            bincode::config::standard(),
        )
        .map_err(|e| CacheError::InvalidHeader {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        if header.magic != BLOB_MAGIC {
            return Err(CacheError::InvalidHeader {
                path,
                reason: "missing magic bytes".to_string(),
            });
        }
        if header.format_version != BLOB_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: BLOB_FORMAT_VERSION,
                actual: header.format_version,
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if payload.len() as u64 != header.len || actual != header.checksum || actual != *hash {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: hash.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(payload.to_vec())
    }

    /// Removes every blob whose hash is not in `live`. Returns the number of
    /// files removed. Files that are not blobs are left alone.
    pub async fn gc(&self, live: &HashSet<ContentHash>) -> Result<usize, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(&self.dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str());
            let is_live = stem
                .and_then(ContentHash::from_hex)
                .is_some_and(|h| live.contains(&h));
            if !is_live {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| CacheError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
