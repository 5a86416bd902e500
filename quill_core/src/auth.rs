//! Owner-or-admin authorization.

use crate::models::{Comment, Id, Post, User};
use crate::{Error, Result};

/// A record with a single authoring user.
pub trait Owned {
    /// Id of the authoring user.
    fn author_id(&self) -> Id;
}

impl Owned for Post {
    fn author_id(&self) -> Id {
        self.author_id
    }
}

impl Owned for Comment {
    fn author_id(&self) -> Id {
        self.author_id
    }
}

/// Whether `actor` may edit or delete `resource`: they wrote it or they
/// are an admin.
pub fn can_modify(actor: &User, resource: &impl Owned) -> bool {
    actor.is_admin || actor.id == resource.author_id()
}

/// Like [`can_modify`] but failing with [`Error::NotAuthorized`].
pub fn ensure_can_modify(actor: &User, resource: &impl Owned) -> Result<()> {
    if can_modify(actor, resource) {
        Ok(())
    } else {
        log::debug!("user {} refused access to resource of {}", actor.id, resource.author_id());
        Err(Error::NotAuthorized)
    }
}
