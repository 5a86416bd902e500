//! Types, traits, and methods for interacting with a blog store.
//!
//! The different ways of referring to a store handle may present
//! some initial confusion.
//! * `ConnectionMethods` is a trait containing every read and write the blog performs. Most
//!   functions in [actions][crate::actions] accept any implementation of it.
//! * `BackendConnection` is a trait representing a direct connection to a store backend. It is a
//!   superset of `ConnectionMethods` which also identifies the backend.
//! * `Connection` is a convenience struct containing a boxed `BackendConnection`. It cannot do
//!   anything other than what a `BackendConnection` can do, but allows using a single concrete type
//!   that is not tied to a particular backend. It is returned by the `connect` method.
//!
//! Two backends are available. [`sqlite`] keeps a relational schema
//! managed by [migrations][crate::migrations] and lets the database
//! enforce uniqueness and cascades. [`docstore`] keeps serde documents in
//! memory (optionally mirrored to a JSON file) and cascades by hand.

use std::borrow::Cow;
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Category, Comment, Id, NewComment, NewPost, NewUser, Post, Tag, User};
use crate::query::{CommentFilter, PostFilter};
use crate::{Error, Result};

mod macros;

pub mod docstore;
#[cfg(feature = "sqlite")]
mod helper;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "r2d2")]
pub mod r2;
#[cfg(feature = "r2d2")]
pub use r2::ConnectionManager;

// Macros are always exported at the root of the crate
use crate::connection_method_wrapper;

/// Methods available on a store connection.
///
/// Lookups return `Ok(None)` for a missing record. Updates and deletes of a
/// missing record return [`Error::NoSuchObject`]. Deleting a user, post or
/// comment also deletes everything that depends on it.
pub trait ConnectionMethods {
    /// Run raw SQL. Only meaningful for relational backends.
    fn execute(&self, sql: &str) -> Result<()>;
    /// Whether the backing schema contains `table`.
    fn has_table(&self, table: &str) -> Result<bool>;
    /// Names of the schema migrations recorded as applied, in application order.
    fn applied_migrations(&self) -> Result<Vec<String>>;
    /// Record or forget that the migration `name` has been applied.
    fn set_migration_applied(&self, name: &str, applied: bool) -> Result<()>;

    /// Store a new user.
    fn insert_user(&self, user: &NewUser) -> Result<User>;
    /// Find a user by id.
    fn get_user(&self, id: Id) -> Result<Option<User>>;
    /// Find a user by exact email address.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Find a user by exact username.
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Overwrite every field of an existing user.
    fn update_user(&self, user: &User) -> Result<()>;
    /// Delete a user along with their posts and comments.
    fn delete_user(&self, id: Id) -> Result<()>;
    /// All users, ordered by id.
    fn users(&self) -> Result<Vec<User>>;

    /// Store a new category.
    fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category>;
    /// Find a category by id.
    fn get_category(&self, id: Id) -> Result<Option<Category>>;
    /// Find a category by exact name.
    fn find_category(&self, name: &str) -> Result<Option<Category>>;
    /// All categories, ordered by name.
    fn categories(&self) -> Result<Vec<Category>>;

    /// Store a new tag.
    fn insert_tag(&self, name: &str) -> Result<Tag>;
    /// Find a tag by id.
    fn get_tag(&self, id: Id) -> Result<Option<Tag>>;
    /// Find a tag by exact name.
    fn find_tag(&self, name: &str) -> Result<Option<Tag>>;
    /// All tags, ordered by name.
    fn tags(&self) -> Result<Vec<Tag>>;

    /// Store a new post and its tag links.
    fn insert_post(&self, post: &NewPost) -> Result<Post>;
    /// Find a post by id.
    fn get_post(&self, id: Id) -> Result<Option<Post>>;
    /// Find a post by slug.
    fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    /// Overwrite every field of an existing post, including its tags.
    fn update_post(&self, post: &Post) -> Result<()>;
    /// Delete a post along with its comments.
    fn delete_post(&self, id: Id) -> Result<()>;
    /// Posts matching `filter`, most recent first, skipping `offset` and
    /// returning at most `limit`.
    fn query_posts(
        &self,
        filter: &PostFilter,
        limit: Option<u32>,
        offset: Option<u64>,
    ) -> Result<Vec<Post>>;
    /// Number of posts matching `filter`.
    fn count_posts(&self, filter: &PostFilter) -> Result<u64>;

    /// Store a new comment.
    fn insert_comment(&self, comment: &NewComment) -> Result<Comment>;
    /// Find a comment by id.
    fn get_comment(&self, id: Id) -> Result<Option<Comment>>;
    /// Comments matching `filter`, oldest first.
    fn query_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>>;
    /// Delete a comment along with its replies.
    fn delete_comment(&self, id: Id) -> Result<()>;
}

/// Store connection.
pub trait BackendConnection: ConnectionMethods + Debug + Send + 'static {
    /// Retrieve the backend of this connection
    fn backend(&self) -> Box<dyn Backend>;
    /// Name of the backend of this connection.
    fn backend_name(&self) -> &'static str;
    /// Tests if the connection has been closed. Backends which do not
    /// support this check should return false.
    fn is_closed(&self) -> bool;
}

/// Store connection. May be a connection to any type of backend
/// as it is a boxed abstraction over a specific connection.
#[derive(Debug)]
pub struct Connection {
    conn: Box<dyn BackendConnection>,
}
impl Connection {
    /// Box a backend-specific connection.
    pub fn new(conn: impl BackendConnection) -> Self {
        Connection {
            conn: Box::new(conn),
        }
    }
    // For use with connection_method_wrapper macro
    #[allow(clippy::unnecessary_wraps)]
    fn wrapped_connection_methods(&self) -> Result<&dyn BackendConnection> {
        Ok(self.conn.as_ref())
    }
}
impl BackendConnection for Connection {
    fn backend(&self) -> Box<dyn Backend> {
        self.conn.backend()
    }
    fn backend_name(&self) -> &'static str {
        self.conn.backend_name()
    }
    fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }
}
connection_method_wrapper!(Connection);

/// Connection specification. Contains the name of a store backend
/// and the backend-specific connection string. See [connect][crate::db::connect]
/// to make a [Connection][crate::db::Connection] from a `ConnectionSpec`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConnectionSpec {
    /// Name of the backend, see [get_backend].
    pub backend_name: String,
    /// Backend-specific connection string.
    pub conn_str: String,
}
impl ConnectionSpec {
    /// Create a spec from its parts.
    pub fn new(backend_name: impl Into<String>, conn_str: impl Into<String>) -> Self {
        ConnectionSpec {
            backend_name: backend_name.into(),
            conn_str: conn_str.into(),
        }
    }
    /// Save the connection spec to the filesystem for later use.
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = conn_complete_if_dir(path);
        let mut f = fs::File::create(path)?;
        f.write_all(serde_json::to_string(self)?.as_bytes())
            .map_err(|e| e.into())
    }
    /// Load a previously saved connection spec
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = conn_complete_if_dir(path.as_ref());
        serde_json::from_reader(fs::File::open(path)?).map_err(|e| e.into())
    }
    /// The backend named by this spec.
    pub fn get_backend(&self) -> Result<Box<dyn Backend>> {
        match get_backend(&self.backend_name) {
            Some(backend) => Ok(backend),
            None => Err(crate::Error::UnknownBackend(self.backend_name.clone())),
        }
    }
    /// Render the spec as a URL accepted by [`ConnectionSpec::from_str`].
    pub fn to_url(&self) -> String {
        if self.conn_str == ":memory:" {
            format!("{}::memory:", self.backend_name)
        } else {
            format!("{}://{}", self.backend_name, self.conn_str)
        }
    }
}

impl FromStr for ConnectionSpec {
    type Err = Error;

    /// Parse `<backend>://<conn_str>` or `<backend>::memory:`.
    fn from_str(url: &str) -> Result<Self> {
        let (backend_name, conn_str) = if let Some(backend) = url.strip_suffix("::memory:") {
            (backend, ":memory:")
        } else if let Some((backend, rest)) = url.split_once("://") {
            (backend, rest)
        } else {
            return Err(Error::UnknownConnectString(url.to_string()));
        };
        if conn_str.is_empty() {
            return Err(Error::UnknownConnectString(url.to_string()));
        }
        if !BACKEND_NAMES.contains(&backend_name) {
            return Err(Error::UnknownBackend(backend_name.to_string()));
        }
        Ok(ConnectionSpec::new(backend_name, conn_str))
    }
}

impl TryFrom<String> for ConnectionSpec {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

fn conn_complete_if_dir(path: &Path) -> Cow<Path> {
    if path.is_dir() {
        Cow::from(path.join("connection.json"))
    } else {
        Cow::from(path)
    }
}

/// Store backend. A boxed implementation can be returned by name via [get_backend][crate::db::get_backend].
pub trait Backend {
    /// Name used in [`ConnectionSpec::backend_name`].
    fn name(&self) -> &'static str;
    /// Open a connection.
    fn connect(&self, conn_str: &str) -> Result<Connection>;
}

impl Backend for Box<dyn Backend> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }
    fn connect(&self, conn_str: &str) -> Result<Connection> {
        self.as_ref().connect(conn_str)
    }
}

const BACKEND_NAMES: &[&str] = &[
    #[cfg(feature = "sqlite")]
    sqlite::BACKEND_NAME,
    docstore::BACKEND_NAME,
];

/// Find a backend by name.
pub fn get_backend(name: &str) -> Option<Box<dyn Backend>> {
    match name {
        #[cfg(feature = "sqlite")]
        sqlite::BACKEND_NAME => Some(Box::new(sqlite::SQLiteBackend::new())),
        docstore::BACKEND_NAME => Some(Box::new(docstore::DocStoreBackend::new())),
        _ => None,
    }
}

/// Connect to a store. For non-boxed connections, see individual
/// [Backend][crate::db::Backend] implementations.
pub fn connect(spec: &ConnectionSpec) -> Result<Connection> {
    get_backend(&spec.backend_name)
        .ok_or_else(|| Error::UnknownBackend(spec.backend_name.clone()))?
        .connect(&spec.conn_str)
}
