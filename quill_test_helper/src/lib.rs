//! Test helpers to set up store connections and seed blog data.
//! Macros depend on [`quill_core`], `env_logger` and [`log`].
#![deny(missing_docs)]

use chrono::TimeDelta;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use quill_core::db::docstore::{self, DocStoreBackend};
use quill_core::db::sqlite::{self, SQLiteBackend};
use quill_core::db::{get_backend, Backend, ConnectionMethods, ConnectionSpec};
use quill_core::models::{now, Category, Id, NewPost, NewUser, Post, Tag, User};
use quill_core::password::hash_password;
use tempfile::TempDir;
use uuid::Uuid;

// Re-export as they are used by the macros.
pub use paste;
pub use quill_core::db::{BackendConnection, Connection};

/// Password given to every fixture user.
pub const PASSWORD: &str = "password123";

/// Trait for running a test.
pub trait BackendTestInstance {
    /// Run a test with a fresh connection, migrated if `migrate` is set.
    fn run_test(test: impl FnOnce(Connection), migrate: bool);
}

/// Instance of a SQLite test.
#[derive(Default)]
pub struct SQLiteTestInstance {}
impl BackendTestInstance for SQLiteTestInstance {
    fn run_test(test: impl FnOnce(Connection), migrate: bool) {
        common_setup();
        log::info!("connecting to sqlite memory database..");
        let conn = SQLiteBackend::new()
            .connect(":memory:")
            .expect("Could not connect sqlite backend");
        if migrate {
            setup_db(&conn);
        }
        log::info!("running sqlite test");
        test(conn);
    }
}

/// Instance of a document store test.
#[derive(Default)]
pub struct DocStoreTestInstance {}
impl BackendTestInstance for DocStoreTestInstance {
    fn run_test(test: impl FnOnce(Connection), migrate: bool) {
        common_setup();
        log::info!("connecting to private document store..");
        let conn = DocStoreBackend::new()
            .connect(":memory:")
            .expect("Could not connect docstore backend");
        if migrate {
            setup_db(&conn);
        }
        log::info!("running docstore test");
        test(conn);
    }
}

/// Populate the schema.
pub fn setup_db(conn: &Connection) {
    let applied = quill_core::migrations::migrate(conn).unwrap();
    log::info!("applied {applied} migrations");
}

/// Create an unmigrated sqlite [`Connection`].
pub fn sqlite_connection() -> Connection {
    let backend = get_backend(sqlite::BACKEND_NAME).unwrap();
    backend.connect(":memory:").unwrap()
}

/// Create an in-memory sqlite [`ConnectionSpec`]. Every connection opened
/// from it is a separate database.
pub fn sqlite_connspec() -> ConnectionSpec {
    ConnectionSpec::new(sqlite::BACKEND_NAME, ":memory:")
}

/// Create a file-backed sqlite [`ConnectionSpec`] in a temporary directory,
/// so that several connections share one database. The directory is
/// removed when the returned [`TempDir`] drops.
pub fn sqlite_file_connspec() -> (ConnectionSpec, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quill.db");
    let spec = ConnectionSpec::new(sqlite::BACKEND_NAME, path.to_str().unwrap());
    (spec, dir)
}

/// Create a [`ConnectionSpec`] for a document store no other test uses.
pub fn docstore_connspec() -> ConnectionSpec {
    let name = format!("quill_test_{}", Uuid::new_v4().simple());
    ConnectionSpec::new(docstore::BACKEND_NAME, name)
}

fn common_setup() {
    env_logger::try_init().ok();
}

/// Wrap `$fname` in a `#[test]` with a `Connection` to `$backend`.
#[macro_export]
macro_rules! maketest {
    ($fname:ident, $backend:ident, $migrate:expr) => {
        $crate::paste::item! {
            #[test]
            pub fn [<$fname _ $backend>]() {
                use $crate::BackendTestInstance;
                match stringify!($backend) {
                    "sqlite" => $crate::SQLiteTestInstance::run_test($fname, $migrate),
                    "docstore" => $crate::DocStoreTestInstance::run_test($fname, $migrate),
                    _ => panic!("Unknown backend {}", stringify!($backend)),
                };
            }
        }
    };
}

/// Create a migrated sqlite and document store `#[test]` that each invoke
/// `$fname` with a `Connection`.
#[macro_export]
macro_rules! testall {
    ($fname:ident) => {
        $crate::maketest!($fname, sqlite, true);
        $crate::maketest!($fname, docstore, true);
    };
}

/// Create a migrated sqlite `#[test]` only, for behaviour the document
/// store does not share.
#[macro_export]
macro_rules! testsqlite {
    ($fname:ident) => {
        $crate::maketest!($fname, sqlite, true);
    };
}

/// Store a user called `username` with password [`PASSWORD`].
pub fn create_user(conn: &impl ConnectionMethods, username: &str, is_admin: bool) -> User {
    conn.insert_user(&NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: hash_password(PASSWORD).unwrap(),
        bio: None,
        joined_at: now(),
        is_admin,
    })
    .unwrap()
}

/// Store a post by `author` with a generated body. `minutes_ago` sets its
/// creation time so tests can control listing order.
pub fn create_post(
    conn: &impl ConnectionMethods,
    author: &User,
    title: &str,
    category: Option<&Category>,
    tags: &[&Tag],
    minutes_ago: u64,
) -> Post {
    let created_at = now() - TimeDelta::minutes(minutes_ago as i64);
    let body: String = Paragraph(2..4).fake();
    conn.insert_post(&NewPost {
        title: title.to_string(),
        body,
        slug: quill_core::slug::slugify(title, created_at),
        author_id: author.id,
        category_id: category.map(|c| c.id),
        tags: tags.iter().map(|t| t.id).collect(),
        published: true,
        created_at,
    })
    .unwrap()
}

/// A small blog: two writers, an admin, two categories, three tags and
/// seven published posts plus one draft.
pub struct Fixture {
    /// Writes about Rust.
    pub alice: User,
    /// Writes about cooking.
    pub bob: User,
    /// Administrator with no posts.
    pub admin: User,
    /// Category of alice's posts.
    pub rust: Category,
    /// Category of bob's posts.
    pub cooking: Category,
    /// Tag on every post.
    pub general: Tag,
    /// Tag on alice's posts.
    pub ownership: Tag,
    /// Tag on no post.
    pub unused: Tag,
    /// Every post, newest first.
    pub posts: Vec<Post>,
    /// Alice's unpublished post. Not in `posts`.
    pub draft: Post,
}

impl Fixture {
    /// Ids of the published posts, newest first.
    pub fn post_ids(&self) -> Vec<Id> {
        self.posts.iter().map(|p| p.id).collect()
    }
}

/// Seed the store with a [`Fixture`].
pub fn seed_blog(conn: &impl ConnectionMethods) -> Fixture {
    let alice = create_user(conn, "alice", false);
    let bob = create_user(conn, "bob", false);
    let admin = create_user(conn, "admin", true);
    let rust = conn
        .insert_category("Rust", Some("Systems programming"))
        .unwrap();
    let cooking = conn.insert_category("Cooking", None).unwrap();
    let general = conn.insert_tag("general").unwrap();
    let ownership = conn.insert_tag("ownership").unwrap();
    let unused = conn.insert_tag("unused").unwrap();

    let mut posts = Vec::new();
    for i in 0..4u64 {
        let title = format!("Borrowing part {}", i + 1);
        posts.push(create_post(
            conn,
            &alice,
            &title,
            Some(&rust),
            &[&general, &ownership],
            100 - i * 10,
        ));
    }
    for i in 0..3u64 {
        let title: String = Sentence(2..4).fake();
        posts.push(create_post(
            conn,
            &bob,
            &format!("{title} {i}"),
            Some(&cooking),
            &[&general],
            95 - i * 10,
        ));
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut draft = create_post(conn, &alice, "Unfinished thoughts", Some(&rust), &[], 1);
    draft.published = false;
    conn.update_post(&draft).unwrap();

    Fixture {
        alice,
        bob,
        admin,
        rust,
        cooking,
        general,
        ownership,
        unused,
        posts,
        draft,
    }
}
