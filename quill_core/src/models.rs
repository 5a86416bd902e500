//! Records stored by the blog.
//!
//! Every record is keyed by an integer [`Id`] assigned by the store on
//! insert. The `New*` structs carry the fields a caller supplies before
//! that id exists.
#![allow(missing_docs)]

use chrono::naive::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Primary key type shared by every record.
pub type Id = i64;

/// A registered account.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, see [`crate::password`].
    pub password_hash: String,
    pub bio: Option<String>,
    pub joined_at: NaiveDateTime,
    pub last_login: NaiveDateTime,
    pub is_admin: bool,
}

/// Fields of a [`User`] before it is stored.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub joined_at: NaiveDateTime,
    pub is_admin: bool,
}

/// A blog post.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub author_id: Id,
    pub category_id: Option<Id>,
    /// Ids of the attached [`Tag`]s, in ascending order.
    pub tags: Vec<Id>,
    pub published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Fields of a [`Post`] before it is stored.
#[derive(Clone, Debug)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub slug: String,
    pub author_id: Id,
    pub category_id: Option<Id>,
    pub tags: Vec<Id>,
    pub published: bool,
    pub created_at: NaiveDateTime,
}

/// A named grouping of posts. Each post belongs to at most one.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
}

/// A label attached to any number of posts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
}

/// A comment on a post, optionally replying to another comment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Comment {
    pub id: Id,
    pub body: String,
    pub author_id: Id,
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub approved: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Fields of a [`Comment`] before it is stored.
#[derive(Clone, Debug)]
pub struct NewComment {
    pub body: String,
    pub author_id: Id,
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub created_at: NaiveDateTime,
}

/// Current time truncated to microseconds, the precision both backends keep.
pub fn now() -> NaiveDateTime {
    use chrono::{DurationRound, TimeDelta, Utc};
    let now = Utc::now().naive_utc();
    now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now)
}
