use super::model::ensure_builtins;
use super::{Error, Invocation, Response};
use resource::Ref;
use store::Store;

impl Invocation {
    /// Produce a new Invocation with the last |n| leaf calls removed,
    /// working depth-first from the right, and every ancestor of a
    /// removal (the root always included) marked incomplete. A call
    /// with no children is a leaf; a parent emptied by removals becomes
    /// a leaf for subsequent removals, though the root itself is never
    /// removed. rewind(0) clears only the root's response, which is how
    /// a completed run is re-opened for replay.
    pub fn rewind(&self, store: &Store, n: usize) -> Result<Invocation, Error> {
        ensure_builtins()?;

        let mut remaining = n;
        let children = strip(store, self.response(store)?.children, &mut remaining)?;

        let response = store.commit_resource(&Response {
            output: None,
            raised: None,
            raised_here: false,
            children,
        })?;
        let next = Invocation {
            request: self.request.clone(),
            response,
        };
        store.commit_resource(&next)?;
        Ok(next)
    }
}

// Remove rightmost leaves from |children| until |remaining| is exhausted
// or the list empties. A partially-stripped subtree is recommitted as
// incomplete; untouched siblings keep their recorded digests.
fn strip(store: &Store, children: Vec<Ref>, remaining: &mut usize) -> Result<Vec<Ref>, Error> {
    let mut children = children;
    while *remaining > 0 {
        let Some(last_ref) = children.last().cloned() else {
            break;
        };
        let last: Invocation = store.checkout(&last_ref)?;
        let response: Response = store.checkout(&last.response)?;

        if response.children.is_empty() {
            children.pop();
            *remaining -= 1;
            continue;
        }

        let stripped = strip(store, response.children, remaining)?;
        if stripped.is_empty() && *remaining > 0 {
            // The subtree was consumed entirely, and it is now a leaf
            // in its own right.
            children.pop();
            *remaining -= 1;
            continue;
        }

        let response = store.commit_resource(&Response {
            output: None,
            raised: None,
            raised_here: false,
            children: stripped,
        })?;
        let rewritten = store.commit_resource(&Invocation {
            request: last.request.clone(),
            response,
        })?;
        *children.last_mut().unwrap() = rewritten;
    }
    Ok(children)
}
