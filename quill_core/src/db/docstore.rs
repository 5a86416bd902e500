//! In-process document store backend.
//!
//! Records are kept as serde documents in ordered maps behind a single
//! [`RwLock`]. Posts embed their tag ids. Category and tag names are
//! unique. Nothing enforces uniqueness of usernames, emails or slugs, and
//! deletes cascade by walking the collections.
//!
//! Connection strings:
//! * `:memory:` opens a private, empty store.
//! * any other name opens the store registered under that name in this
//!   process, creating it on first use. Every connection to the same name
//!   shares one store.
//! * a name ending in `.json` is additionally loaded from that file on
//!   first use and written back after every mutation. The in-memory store
//!   stays authoritative: a failed write is logged and the mutation still
//!   succeeds, so the file lags behind until the next write goes through.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, RwLock};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::{Backend, BackendConnection, Connection, ConnectionMethods};
use crate::models::{Category, Comment, Id, NewComment, NewPost, NewUser, Post, Tag, User};
use crate::query::{sort_comments, sort_posts, CommentFilter, PostFilter};
use crate::{Error, Result};

/// The name of the document store backend.
pub const BACKEND_NAME: &str = "docstore";

const MEMORY: &str = ":memory:";

const COLLECTIONS: &[&str] = &["users", "categories", "tags", "posts", "comments"];

type Shared = Arc<RwLock<Documents>>;

static STORES: LazyLock<Mutex<HashMap<String, Shared>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Default, Deserialize, Serialize)]
struct Documents {
    last_id: Id,
    users: BTreeMap<Id, User>,
    categories: BTreeMap<Id, Category>,
    tags: BTreeMap<Id, Tag>,
    posts: BTreeMap<Id, Post>,
    comments: BTreeMap<Id, Comment>,
    migrations: Vec<String>,
}
impl Documents {
    fn next_id(&mut self) -> Id {
        self.last_id += 1;
        self.last_id
    }

    fn remove_post(&mut self, id: Id) {
        self.posts.remove(&id);
        self.comments.retain(|_, c| c.post_id != id);
    }

    fn remove_comment(&mut self, id: Id) {
        self.comments.remove(&id);
        let replies: Vec<Id> = self
            .comments
            .values()
            .filter(|c| c.parent_id == Some(id))
            .map(|c| c.id)
            .collect();
        for reply in replies {
            self.remove_comment(reply);
        }
    }

    fn check_post_refs(&self, author_id: Id, category_id: Option<Id>, tags: &[Id]) -> Result<()> {
        let category_ok = category_id.map_or(true, |c| self.categories.contains_key(&c));
        if !self.users.contains_key(&author_id)
            || !category_ok
            || tags.iter().any(|t| !self.tags.contains_key(t))
        {
            return Err(Error::NoSuchObject);
        }
        Ok(())
    }
}

fn save(path: &Path, docs: &Documents) -> Result<()> {
    fs::write(path, serde_json::to_vec(docs)?)?;
    Ok(())
}

fn normalized_tags(tags: &[Id]) -> Vec<Id> {
    let mut tags = tags.to_vec();
    tags.sort_unstable();
    tags.dedup();
    tags
}

/// Document store [`Backend`] implementation.
#[derive(Debug, Default, Clone)]
pub struct DocStoreBackend;
impl DocStoreBackend {
    /// Create the backend.
    pub fn new() -> DocStoreBackend {
        DocStoreBackend {}
    }
}
impl DocStoreBackend {
    fn connect(&self, name: &str) -> Result<DocStoreConnection> {
        let file = name.ends_with(".json").then(|| PathBuf::from(name));
        if name == MEMORY {
            return Ok(DocStoreConnection {
                docs: Arc::new(RwLock::new(Documents::default())),
                file,
            });
        }
        let mut stores = STORES.lock().map_err(|_| Error::PoisonedConnection)?;
        let docs = match stores.get(name) {
            Some(docs) => docs.clone(),
            None => {
                let documents = match &file {
                    Some(path) if path.exists() => {
                        debug!("loading document store from {}", path.display());
                        serde_json::from_reader(fs::File::open(path)?)?
                    }
                    _ => Documents::default(),
                };
                let docs = Arc::new(RwLock::new(documents));
                stores.insert(name.to_string(), docs.clone());
                docs
            }
        };
        Ok(DocStoreConnection { docs, file })
    }
}

impl Backend for DocStoreBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn connect(&self, name: &str) -> Result<Connection> {
        Ok(Connection::new(self.connect(name)?))
    }
}

/// Connection to a document store.
#[derive(Debug)]
pub struct DocStoreConnection {
    docs: Shared,
    file: Option<PathBuf>,
}
impl DocStoreConnection {
    fn read<T>(&self, f: impl FnOnce(&Documents) -> T) -> Result<T> {
        let docs = self.docs.read().map_err(|_| Error::PoisonedConnection)?;
        Ok(f(&docs))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Documents) -> Result<T>) -> Result<T> {
        let mut docs = self.docs.write().map_err(|_| Error::PoisonedConnection)?;
        let out = f(&mut docs)?;
        if let Some(path) = &self.file {
            if let Err(e) = save(path, &docs) {
                error!("could not save document store to {}: {e}", path.display());
            }
        }
        Ok(out)
    }
}

impl BackendConnection for DocStoreConnection {
    fn backend(&self) -> Box<dyn Backend> {
        Box::new(DocStoreBackend {})
    }
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
    fn is_closed(&self) -> bool {
        false
    }
}

impl ConnectionMethods for DocStoreConnection {
    fn execute(&self, _sql: &str) -> Result<()> {
        Err(Error::Unsupported("execute", BACKEND_NAME))
    }

    fn has_table(&self, table: &str) -> Result<bool> {
        Ok(COLLECTIONS.contains(&table))
    }

    fn applied_migrations(&self) -> Result<Vec<String>> {
        self.read(|d| d.migrations.clone())
    }

    fn set_migration_applied(&self, name: &str, applied: bool) -> Result<()> {
        self.write(|d| {
            d.migrations.retain(|m| m != name);
            if applied {
                d.migrations.push(name.to_string());
            }
            Ok(())
        })
    }

    fn insert_user(&self, user: &NewUser) -> Result<User> {
        debug!("insert user {}", user.username);
        self.write(|d| {
            let user = User {
                id: d.next_id(),
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                bio: user.bio.clone(),
                joined_at: user.joined_at,
                last_login: user.joined_at,
                is_admin: user.is_admin,
            };
            d.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    fn get_user(&self, id: Id) -> Result<Option<User>> {
        self.read(|d| d.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|d| d.users.values().find(|u| u.email == email).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.read(|d| d.users.values().find(|u| u.username == username).cloned())
    }

    fn update_user(&self, user: &User) -> Result<()> {
        debug!("update user {}", user.id);
        self.write(|d| match d.users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(Error::NoSuchObject),
        })
    }

    fn delete_user(&self, id: Id) -> Result<()> {
        debug!("delete user {id}");
        self.write(|d| {
            d.users.remove(&id).ok_or(Error::NoSuchObject)?;
            let posts: Vec<Id> = d
                .posts
                .values()
                .filter(|p| p.author_id == id)
                .map(|p| p.id)
                .collect();
            for post in posts {
                d.remove_post(post);
            }
            let comments: Vec<Id> = d
                .comments
                .values()
                .filter(|c| c.author_id == id)
                .map(|c| c.id)
                .collect();
            for comment in comments {
                d.remove_comment(comment);
            }
            Ok(())
        })
    }

    fn users(&self) -> Result<Vec<User>> {
        self.read(|d| d.users.values().cloned().collect())
    }

    fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        debug!("insert category {name}");
        self.write(|d| {
            if d.categories.values().any(|c| c.name == name) {
                return Err(Error::UniqueViolation(format!("category {name}")));
            }
            let category = Category {
                id: d.next_id(),
                name: name.to_string(),
                description: description.map(str::to_string),
            };
            d.categories.insert(category.id, category.clone());
            Ok(category)
        })
    }

    fn get_category(&self, id: Id) -> Result<Option<Category>> {
        self.read(|d| d.categories.get(&id).cloned())
    }

    fn find_category(&self, name: &str) -> Result<Option<Category>> {
        self.read(|d| d.categories.values().find(|c| c.name == name).cloned())
    }

    fn categories(&self) -> Result<Vec<Category>> {
        self.read(|d| {
            let mut categories: Vec<Category> = d.categories.values().cloned().collect();
            categories.sort_by(|a, b| a.name.cmp(&b.name));
            categories
        })
    }

    fn insert_tag(&self, name: &str) -> Result<Tag> {
        debug!("insert tag {name}");
        self.write(|d| {
            if d.tags.values().any(|t| t.name == name) {
                return Err(Error::UniqueViolation(format!("tag {name}")));
            }
            let tag = Tag {
                id: d.next_id(),
                name: name.to_string(),
            };
            d.tags.insert(tag.id, tag.clone());
            Ok(tag)
        })
    }

    fn get_tag(&self, id: Id) -> Result<Option<Tag>> {
        self.read(|d| d.tags.get(&id).cloned())
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        self.read(|d| d.tags.values().find(|t| t.name == name).cloned())
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        self.read(|d| {
            let mut tags: Vec<Tag> = d.tags.values().cloned().collect();
            tags.sort_by(|a, b| a.name.cmp(&b.name));
            tags
        })
    }

    fn insert_post(&self, post: &NewPost) -> Result<Post> {
        debug!("insert post {}", post.slug);
        self.write(|d| {
            d.check_post_refs(post.author_id, post.category_id, &post.tags)?;
            let post = Post {
                id: d.next_id(),
                title: post.title.clone(),
                body: post.body.clone(),
                slug: post.slug.clone(),
                author_id: post.author_id,
                category_id: post.category_id,
                tags: normalized_tags(&post.tags),
                published: post.published,
                created_at: post.created_at,
                updated_at: post.created_at,
            };
            d.posts.insert(post.id, post.clone());
            Ok(post)
        })
    }

    fn get_post(&self, id: Id) -> Result<Option<Post>> {
        self.read(|d| d.posts.get(&id).cloned())
    }

    fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.read(|d| d.posts.values().find(|p| p.slug == slug).cloned())
    }

    fn update_post(&self, post: &Post) -> Result<()> {
        debug!("update post {}", post.id);
        self.write(|d| {
            if !d.posts.contains_key(&post.id) {
                return Err(Error::NoSuchObject);
            }
            d.check_post_refs(post.author_id, post.category_id, &post.tags)?;
            let mut stored = post.clone();
            stored.tags = normalized_tags(&post.tags);
            d.posts.insert(post.id, stored);
            Ok(())
        })
    }

    fn delete_post(&self, id: Id) -> Result<()> {
        debug!("delete post {id}");
        self.write(|d| {
            if !d.posts.contains_key(&id) {
                return Err(Error::NoSuchObject);
            }
            d.remove_post(id);
            Ok(())
        })
    }

    fn query_posts(
        &self,
        filter: &PostFilter,
        limit: Option<u32>,
        offset: Option<u64>,
    ) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> =
            self.read(|d| d.posts.values().filter(|p| filter.matches(p)).cloned().collect())?;
        sort_posts(&mut posts);
        let offset = usize::try_from(offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        self.read(|d| d.posts.values().filter(|p| filter.matches(p)).count() as u64)
    }

    fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        debug!("insert comment on post {}", comment.post_id);
        self.write(|d| {
            let parent_ok = comment
                .parent_id
                .map_or(true, |p| d.comments.contains_key(&p));
            if !d.users.contains_key(&comment.author_id)
                || !d.posts.contains_key(&comment.post_id)
                || !parent_ok
            {
                return Err(Error::NoSuchObject);
            }
            let comment = Comment {
                id: d.next_id(),
                body: comment.body.clone(),
                author_id: comment.author_id,
                post_id: comment.post_id,
                parent_id: comment.parent_id,
                approved: true,
                created_at: comment.created_at,
                updated_at: comment.created_at,
            };
            d.comments.insert(comment.id, comment.clone());
            Ok(comment)
        })
    }

    fn get_comment(&self, id: Id) -> Result<Option<Comment>> {
        self.read(|d| d.comments.get(&id).cloned())
    }

    fn query_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self.read(|d| {
            d.comments
                .values()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect()
        })?;
        sort_comments(&mut comments);
        Ok(comments)
    }

    fn delete_comment(&self, id: Id) -> Result<()> {
        debug!("delete comment {id}");
        self.write(|d| {
            if !d.comments.contains_key(&id) {
                return Err(Error::NoSuchObject);
            }
            d.remove_comment(id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "x".to_string(),
            bio: None,
            joined_at: now(),
            is_admin: false,
        }
    }

    #[test]
    fn memory_stores_are_private() {
        let backend = DocStoreBackend::new();
        let a = backend.connect(MEMORY).unwrap();
        let b = backend.connect(MEMORY).unwrap();
        a.insert_user(&new_user("alice")).unwrap();
        assert!(b.users().unwrap().is_empty());
    }

    #[test]
    fn named_stores_are_shared() {
        let backend = DocStoreBackend::new();
        let a = backend.connect("docstore-shared-test").unwrap();
        let b = backend.connect("docstore-shared-test").unwrap();
        let alice = a.insert_user(&new_user("alice")).unwrap();
        assert_eq!(b.get_user(alice.id).unwrap(), Some(alice));
    }

    #[test]
    fn json_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.json");
        let name = path.to_str().unwrap().to_string();
        let conn = DocStoreBackend::new().connect(&name).unwrap();
        conn.insert_user(&new_user("alice")).unwrap();

        let saved: Documents =
            serde_json::from_reader(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(saved.users.len(), 1);
        assert_eq!(saved.last_id, 1);
    }

    #[test]
    fn failed_save_keeps_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let path = missing.join("blog.json");
        let conn = DocStoreBackend::new()
            .connect(path.to_str().unwrap())
            .unwrap();
        let alice = conn.insert_user(&new_user("alice")).unwrap();
        assert!(!path.exists());
        assert_eq!(conn.get_user(alice.id).unwrap(), Some(alice));

        fs::create_dir(&missing).unwrap();
        conn.insert_user(&new_user("bob")).unwrap();
        let saved: Documents =
            serde_json::from_reader(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(saved.users.len(), 2);
    }

    #[test]
    fn execute_unsupported() {
        let conn = DocStoreBackend::new().connect(MEMORY).unwrap();
        assert!(matches!(
            conn.execute("SELECT 1"),
            Err(Error::Unsupported("execute", BACKEND_NAME))
        ));
    }
}
