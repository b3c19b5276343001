// A Store persists packed resources by their content digest, and mints
// the Refs through which committed resources are addressed. Backends are
// keyed blob stores; the Store layers packing, hashing, and the registry
// over one.

mod backend;
pub use backend::{Backend, MemBackend};

mod fs;
pub use fs::FsBackend;

mod store;
pub use store::{Store, StoreGuard};

mod error;
pub use error::Error;
