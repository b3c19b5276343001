use resource::Digest;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource {0} is not available in the store")]
    NotFound(Digest),
    #[error("no store is active in this context")]
    NoActiveStore,
    #[error("storage I/O failed at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} is not a packed resource file")]
    BadHeader { path: PathBuf },
    #[error(transparent)]
    Resource(#[from] resource::Error),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<std::path::Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }
}
