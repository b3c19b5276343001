use super::{Digest, TypeId};

/// Ref denotes an immutable resource in a store: its content digest, plus
/// the resource's TypeId when known. Equality and hashing are by digest
/// alone, since the packed encoding a digest names is self-describing and
/// the canonical packed form of a Ref is just its digest. Cloning a Ref is
/// a deep copy, because its identity is entirely content-derived.
#[derive(Debug, Clone)]
pub struct Ref {
    digest: Digest,
    type_id: Option<TypeId>,
}

impl Ref {
    pub fn new(digest: Digest, type_id: TypeId) -> Self {
        Self {
            digest,
            type_id: Some(type_id),
        }
    }

    /// A Ref recovered from packed form, where only the digest is encoded.
    pub fn from_digest(digest: Digest) -> Self {
        Self {
            digest,
            type_id: None,
        }
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn type_id(&self) -> Option<&TypeId> {
        self.type_id.as_ref()
    }

    /// Rebind this Ref to a new digest. Store::modify calls this after
    /// committing the mutated resource; copies of the Ref taken earlier
    /// keep resolving to the original digest.
    pub fn rebind(&mut self, digest: Digest) {
        self.digest = digest;
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}
impl Eq for Ref {}

impl std::hash::Hash for Ref {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl PartialOrd for Ref {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Ref {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.digest.cmp(&other.digest)
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.digest.fmt(f)
    }
}
