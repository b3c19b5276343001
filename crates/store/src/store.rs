use super::{Backend, Error, MemBackend};
use resource::{pack, unpack, Digest, Record, Ref, Resource};
use std::cell::RefCell;
use std::sync::Arc;

/// Store owns a Backend and layers packing, hashing, and unpacking over
/// it. Stores are cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

thread_local! {
    // The ambient current-store stack for this thread. Nested Store::enter
    // scopes push and pop it.
    static AMBIENT: RefCell<Vec<Store>> = const { RefCell::new(Vec::new()) };
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A Store over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(MemBackend::new())
    }

    /// Pack, hash, and persist a Record, returning its Ref.
    pub fn commit(&self, record: &Record) -> Result<Ref, Error> {
        let packed = pack(record)?;
        let digest = Digest::of_packed(&packed);
        self.backend.commit(&digest, &packed)?;
        tracing::debug!(%digest, type_id = %record.type_id(), "committed resource");
        Ok(Ref::new(digest, record.type_id().clone()))
    }

    /// Commit a typed Resource.
    pub fn commit_resource<T: Resource>(&self, resource: &T) -> Result<Ref, Error> {
        self.commit(&Record::of(resource))
    }

    pub fn has(&self, reference: &Ref) -> Result<bool, Error> {
        self.backend.has(reference.digest())
    }

    /// Retrieve and unpack the Record a Ref denotes.
    pub fn checkout_record(&self, reference: &Ref) -> Result<Record, Error> {
        let packed = self
            .backend
            .get(reference.digest())?
            .ok_or_else(|| Error::NotFound(*reference.digest()))?;
        Ok(unpack(&packed)?)
    }

    /// Retrieve a Ref's resource as its typed form.
    pub fn checkout<T: Resource>(&self, reference: &Ref) -> Result<T, Error> {
        Ok(self.checkout_record(reference)?.decode()?)
    }

    /// Copy-on-write update: check out the referenced resource, hand a
    /// mutable clone to |mutate|, commit the result, and rebind |reference|
    /// to the new digest. The previous digest remains retrievable, so Ref
    /// copies taken before the modify still resolve to the old resource.
    /// On error the reference is left unchanged and nothing is committed.
    pub fn modify<T: Resource, F>(&self, reference: &mut Ref, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut T) -> Result<(), Error>,
    {
        let mut resource: T = self.checkout(reference)?;
        mutate(&mut resource)?;
        let next = self.commit_resource(&resource)?;
        reference.rebind(*next.digest());
        Ok(())
    }

    /// Push this Store onto the ambient current-store stack of this
    /// thread. The returned guard pops it when dropped; scopes nest.
    pub fn enter(&self) -> StoreGuard {
        AMBIENT.with(|stack| stack.borrow_mut().push(self.clone()));
        StoreGuard { _not_send: std::marker::PhantomData }
    }

    /// The innermost ambient Store of this thread.
    pub fn current() -> Result<Store, Error> {
        AMBIENT.with(|stack| stack.borrow().last().cloned().ok_or(Error::NoActiveStore))
    }
}

/// StoreGuard pops its Store from the ambient stack on drop.
pub struct StoreGuard {
    // Ambient scopes are per-thread; the guard must drop where it was made.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        AMBIENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
