//! Point-in-time snapshot codec: JSON, optional AES-256-GCM seal, gzip.
//!
//! Byte order on disk is `gzip(seal(json))` when encryption is enabled —
//! the encrypted payload is what gets compressed, not the other way around.
//! Restoring reverses that: un-gzip first, then decrypt what comes out.
//! This ordering is required for compatibility with snapshot files already
//! on disk from earlier deployments of this format.
//!
//! The AES key is `hex(MD5(passphrase))`, the 32-character hex string used
//! literally as 32 key bytes. MD5 is not being relied on for anything
//! cryptographic here — it is only how existing snapshot files derive their
//! key, and this derivation must stay bit-exact for cross-compatibility.

use std::io::{Read, Write};
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::LruCache;
use crate::entry::Node;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Errors surfaced by the snapshot codec.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Underlying file I/O failure.
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode failure.
    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// AES-GCM seal failed.
    #[error("failed to encrypt snapshot")]
    EncryptionFailed,

    /// AES-GCM open failed — wrong passphrase or corrupted data.
    #[error("failed to decrypt snapshot: authentication error or corrupted data")]
    DecryptionFailed,

    /// The encrypted payload was shorter than one nonce.
    #[error("encrypted snapshot payload is too short to contain a nonce")]
    Truncated,
}

/// The serializable view of cache state a snapshot carries. Recency-list
/// pointers are deliberately excluded — they're reconstructed on restore by
/// reinserting every entry at MRU in iteration order.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotData {
    capacity: usize,
    count: usize,
    entries: Vec<Node>,
}

/// Write a point-in-time snapshot of `cache` to `path`.
pub fn create(
    cache: &LruCache,
    path: &Path,
    encryption_enabled: bool,
    passphrase: &str,
) -> Result<(), SnapshotError> {
    let entries = cache.snapshot_entries();
    let data = SnapshotData {
        capacity: cache.capacity(),
        count: entries.len(),
        entries,
    };
    let json = serde_json::to_vec_pretty(&data)?;

    let payload = if encryption_enabled {
        seal(&json, passphrase)?
    } else {
        json
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&payload)?;
    let compressed = encoder.finish()?;

    let tmp_path = path.with_extension("gz.tmp");
    std::fs::write(&tmp_path, &compressed)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a snapshot at `path` and rebuild a fresh cache from it. The restored
/// recency ordering is not guaranteed to match the ordering at snapshot
/// time, since entries are reinserted in (unspecified) index iteration
/// order — this is accepted per spec.
pub fn restore(
    path: &Path,
    encryption_enabled: bool,
    passphrase: &str,
) -> Result<LruCache, SnapshotError> {
    let compressed = std::fs::read(path)?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut payload = Vec::new();
    decoder.read_to_end(&mut payload)?;

    let json = if encryption_enabled {
        open(&payload, passphrase)?
    } else {
        payload
    };

    let data: SnapshotData = serde_json::from_slice(&json)?;
    let cache = LruCache::from_nodes(data.capacity, data.entries)
        .map_err(|_| SnapshotError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "zero capacity in snapshot")))?;
    Ok(cache)
}

fn derive_key(passphrase: &str) -> [u8; KEY_SIZE] {
    let digest = md5::compute(passphrase.as_bytes());
    let hex_digest = hex::encode(digest.0);
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(hex_digest.as_bytes());
    key
}

fn seal(plaintext: &[u8], passphrase: &str) -> Result<Vec<u8>, SnapshotError> {
    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SnapshotError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SnapshotError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(sealed: &[u8], passphrase: &str) -> Result<Vec<u8>, SnapshotError> {
    if sealed.len() < NONCE_SIZE {
        return Err(SnapshotError::Truncated);
    }
    let key = derive_key(passphrase);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SnapshotError::EncryptionFailed)?;

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SnapshotError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_round_trip_s6() {
        let cache = LruCache::new(65536).unwrap();
        cache.put("Italy", "Rome", -1);
        cache.put("England", "London", 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.gz");
        create(&cache, &path, false, "").unwrap();

        let restored = restore(&path, false, "").unwrap();
        assert_eq!(restored.capacity(), 65536);
        assert_eq!(restored.count(), 2);
        assert_eq!(restored.get("England").gobj.value.unwrap(), "London");
    }

    #[test]
    fn encrypted_round_trip_s6() {
        let cache = LruCache::new(65536).unwrap();
        cache.put("Italy", "Rome", -1);
        cache.put("England", "London", -1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.gz");
        create(&cache, &path, true, "SUPPLY_PASSPHRASE").unwrap();

        let restored = restore(&path, true, "SUPPLY_PASSPHRASE").unwrap();
        assert_eq!(restored.count(), 2);
        assert_eq!(restored.get("England").gobj.value.unwrap(), "London");
    }

    #[test]
    fn wrong_passphrase_fails_authentication() {
        let cache = LruCache::new(16).unwrap();
        cache.put("k", "v", -1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.gz");
        create(&cache, &path, true, "right").unwrap();

        let result = restore(&path, true, "wrong");
        assert!(matches!(result, Err(SnapshotError::DecryptionFailed)));
    }

    #[test]
    fn key_derivation_is_32_ascii_bytes_of_hex_md5() {
        let key = derive_key("SUPPLY_ME");
        assert_eq!(key.len(), 32);
        assert!(key.iter().all(|b| b.is_ascii_hexdigit()));
    }
}
