#![forbid(unsafe_code)]

//! Byte-blob persistence.
//!
//! The module's save data is an opaque byte sequence keyed by a string. The
//! backend is string-valued web storage, so blobs are hex-encoded on the way
//! in. On wasm32 this uses `localStorage`; elsewhere an in-memory map stands
//! in so the full lifecycle runs under native tests.
//!
//! A missing or undecodable value is "no prior state", never an error: the
//! module always receives a blob, possibly empty.

use std::fmt;
use tracing::warn;

/// Byte-blob store keyed by string identifiers.
#[derive(Debug, Default)]
pub struct BlobStore {
    #[cfg(not(target_arch = "wasm32"))]
    memory: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl BlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the blob for `key`.
    ///
    /// Absent keys and values that fail to decode both yield an empty blob.
    pub async fn load(&self, key: &str) -> Vec<u8> {
        match self.read_raw(key) {
            Ok(Some(raw)) => match decode_hex(&raw) {
                Some(bytes) => bytes,
                None => {
                    warn!(key, "persisted blob is not valid hex, treating as absent");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(key, error = %err, "storage backend unavailable on load");
                Vec::new()
            }
        }
    }

    /// Persist `bytes` under `key`.
    pub async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_raw(key, &encode_hex(bytes))
    }

    /// Remove any blob stored under `key`.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_raw(key)
    }

    #[cfg(target_arch = "wasm32")]
    fn backend(&self) -> Result<web_sys::Storage, StorageError> {
        let window = web_sys::window().ok_or(StorageError::Unavailable)?;
        window
            .local_storage()
            .map_err(|_| StorageError::Unavailable)?
            .ok_or(StorageError::Unavailable)
    }

    #[cfg(target_arch = "wasm32")]
    fn read_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend()?
            .get_item(key)
            .map_err(|_| StorageError::Backend)
    }

    #[cfg(target_arch = "wasm32")]
    fn write_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend()?
            .set_item(key, value)
            .map_err(|_| StorageError::Backend)
    }

    #[cfg(target_arch = "wasm32")]
    fn remove_raw(&self, key: &str) -> Result<(), StorageError> {
        self.backend()?
            .remove_item(key)
            .map_err(|_| StorageError::Backend)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn read_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.memory.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(map.get(key).cloned())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn write_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.memory.lock().map_err(|_| StorageError::Unavailable)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn remove_raw(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.memory.lock().map_err(|_| StorageError::Unavailable)?;
        map.remove(key);
        Ok(())
    }
}

/// Storage backend failures. Loads absorb these (empty blob); stores report
/// them so the driver can log the lost save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No usable backend (storage disabled or denied by the browser).
    Unavailable,
    /// The backend rejected the operation (e.g. quota exceeded).
    Backend,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage backend unavailable"),
            Self::Backend => write!(f, "storage backend rejected the operation"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Hex-encode bytes for the string-valued backend.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Decode a hex string. `None` on odd length or non-hex characters.
#[must_use]
pub fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = hex_digit(pair[0])?;
        let lo = hex_digit(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        // The adapter's futures never actually suspend off-wasm; poll once.
        use std::task::{Context, Poll, Waker};

        let mut context = Context::from_waker(Waker::noop());
        let mut future = std::pin::pin!(future);
        match future.as_mut().poll(&mut context) {
            Poll::Ready(value) => value,
            Poll::Pending => unreachable!("storage futures resolve synchronously"),
        }
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = [0u8, 1, 0x7f, 0x80, 0xff];
        let encoded = encode_hex(&bytes);
        assert_eq!(encoded, "00017f80ff");
        assert_eq!(decode_hex(&encoded), Some(bytes.to_vec()));
        assert_eq!(decode_hex(""), Some(Vec::new()));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn absent_key_loads_empty() {
        let store = BlobStore::new();
        assert!(block_on(store.load("missing")).is_empty());
    }

    #[test]
    fn store_then_load_roundtrips() {
        let store = BlobStore::new();
        let blob = vec![1u8, 2, 3, 250];
        block_on(store.store("save", &blob)).expect("store");
        assert_eq!(block_on(store.load("save")), blob);
    }

    #[test]
    fn corrupt_value_loads_empty() {
        let store = BlobStore::new();
        store
            .write_raw("save", "not hex at all")
            .expect("raw write");
        assert!(block_on(store.load("save")).is_empty());
    }

    #[test]
    fn remove_clears_the_blob() {
        let store = BlobStore::new();
        block_on(store.store("save", &[9, 9])).expect("store");
        block_on(store.remove("save")).expect("remove");
        assert!(block_on(store.load("save")).is_empty());
    }
}
