use super::{Backend, Error};
use bytes::Bytes;
use resource::Digest;
use std::path::{Path, PathBuf};

// File header: 4-byte magic plus u16 big-endian format version.
const MAGIC: [u8; 4] = *b"ENCT";
const VERSION: u16 = 1;

/// FsBackend persists one file per digest under prefix directories:
/// root/<first 2 hex chars>/<remaining 62 hex chars>. The directory IS
/// the index; there are no auxiliary files. Writes land in a sibling
/// `.tmp.<pid>` file and are renamed into place, so concurrent readers
/// never observe a partial resource and concurrent writers of the same
/// digest settle on identical content.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(Error::io(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl Backend for FsBackend {
    fn commit(&self, digest: &Digest, packed: &[u8]) -> Result<(), Error> {
        let path = self.path_of(digest);
        if path.exists() {
            return Ok(());
        }
        let dir = path.parent().unwrap();
        std::fs::create_dir_all(dir).map_err(Error::io(dir))?;

        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        let mut contents = Vec::with_capacity(6 + packed.len());
        contents.extend_from_slice(&MAGIC);
        contents.extend_from_slice(&VERSION.to_be_bytes());
        contents.extend_from_slice(packed);

        std::fs::write(&tmp, &contents).map_err(Error::io(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(Error::io(&path))?;
        tracing::debug!(%digest, path = %path.display(), "persisted resource");
        Ok(())
    }

    fn has(&self, digest: &Digest) -> Result<bool, Error> {
        Ok(self.path_of(digest).exists())
    }

    fn get(&self, digest: &Digest) -> Result<Option<Bytes>, Error> {
        let path = self.path_of(digest);
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::io(&path)(err)),
        };
        if contents.len() < 6
            || contents[..4] != MAGIC
            || contents[4..6] != VERSION.to_be_bytes()
        {
            return Err(Error::BadHeader { path });
        }
        Ok(Some(Bytes::from(contents).slice(6..)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fs_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();

        let digest = Digest::of_packed(b"fixture");
        assert!(!backend.has(&digest).unwrap());
        assert_eq!(backend.get(&digest).unwrap(), None);

        backend.commit(&digest, b"fixture").unwrap();
        backend.commit(&digest, b"fixture").unwrap(); // Idempotent.
        assert!(backend.has(&digest).unwrap());
        assert_eq!(backend.get(&digest).unwrap().unwrap(), &b"fixture"[..]);

        // Layout is a 2-hex-char prefix directory.
        let hex = digest.to_hex();
        assert!(dir.path().join(&hex[..2]).join(&hex[2..]).is_file());

        // No temporary files are left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(&hex[..2]))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_fs_backend_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path()).unwrap();

        let digest = Digest::of_packed(b"fixture");
        let hex = digest.to_hex();
        std::fs::create_dir_all(dir.path().join(&hex[..2])).unwrap();
        std::fs::write(dir.path().join(&hex[..2]).join(&hex[2..]), b"junk!!").unwrap();

        assert!(matches!(
            backend.get(&digest),
            Err(Error::BadHeader { .. })
        ));
    }
}
