use super::Error;
use bytes::Bytes;
use resource::Digest;
use std::collections::HashMap;
use std::sync::RwLock;

/// Backend persists canonical packed resources, keyed by digest.
/// Implementations are safe for concurrent readers and writers, and
/// commit is idempotent: storing an already-present digest is a no-op.
pub trait Backend: Send + Sync {
    fn commit(&self, digest: &Digest, packed: &[u8]) -> Result<(), Error>;
    fn has(&self, digest: &Digest) -> Result<bool, Error>;
    /// None signals "not locally available".
    fn get(&self, digest: &Digest) -> Result<Option<Bytes>, Error>;
}

/// MemBackend holds packed resources in process memory.
#[derive(Default)]
pub struct MemBackend(RwLock<HashMap<Digest, Bytes>>);

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemBackend {
    fn commit(&self, digest: &Digest, packed: &[u8]) -> Result<(), Error> {
        self.0
            .write()
            .unwrap()
            .entry(*digest)
            .or_insert_with(|| Bytes::copy_from_slice(packed));
        Ok(())
    }

    fn has(&self, digest: &Digest) -> Result<bool, Error> {
        Ok(self.0.read().unwrap().contains_key(digest))
    }

    fn get(&self, digest: &Digest) -> Result<Option<Bytes>, Error> {
        Ok(self.0.read().unwrap().get(digest).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mem_backend_basics() {
        let backend = MemBackend::new();
        let digest = Digest::of_packed(b"fixture");

        assert!(!backend.has(&digest).unwrap());
        assert_eq!(backend.get(&digest).unwrap(), None);

        backend.commit(&digest, b"fixture").unwrap();
        assert!(backend.has(&digest).unwrap());
        assert_eq!(backend.get(&digest).unwrap().unwrap(), &b"fixture"[..]);

        // Re-commit of a present digest is a no-op.
        backend.commit(&digest, b"fixture").unwrap();
        assert_eq!(backend.get(&digest).unwrap().unwrap(), &b"fixture"[..]);
    }
}
