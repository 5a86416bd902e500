//! Display-ready values for the templates.
//!
//! Templates never look anything up themselves. Handlers load records
//! inside a blocking store call, resolve ids to names with [`Names`] and
//! hand the templates these flat view structs.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use quill_core::actions::Thread;
use quill_core::auth::can_modify;
use quill_core::db::ConnectionMethods;
use quill_core::models::{Category, Comment, Id, Post, Tag, User};
use quill_core::page::{Page, PageWindow};
use tower_sessions::Session;

use crate::error::AppError;
use crate::session::{take_flashes, Flash};

const EXCERPT_CHARS: usize = 200;
const DATE_FORMAT: &str = "%B %d, %Y";

/// What every page needs: who is signed in and the pending flashes.
#[derive(Clone, Debug, Default)]
pub struct BaseContext {
    pub user: Option<User>,
    pub flashes: Vec<Flash>,
}

impl BaseContext {
    /// Build the context, consuming the session's flash messages.
    pub async fn load(session: &Session, user: Option<User>) -> Result<Self, AppError> {
        Ok(BaseContext {
            user,
            flashes: take_flashes(session).await?,
        })
    }

    /// Whether the signed-in user is an administrator.
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_admin)
    }
}

/// An id and its display name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Named {
    pub id: Id,
    pub name: String,
}

/// Id to name lookups for rendering posts and comments.
#[derive(Debug, Default)]
pub struct Names {
    users: HashMap<Id, String>,
    categories: HashMap<Id, Category>,
    tags: HashMap<Id, Tag>,
}

impl Names {
    /// Load every category and tag, and the given users.
    pub fn load<C>(conn: &C, users: impl IntoIterator<Item = Id>) -> quill_core::Result<Self>
    where
        C: ConnectionMethods + ?Sized,
    {
        let mut names = Names {
            users: HashMap::new(),
            categories: conn.categories()?.into_iter().map(|c| (c.id, c)).collect(),
            tags: conn.tags()?.into_iter().map(|t| (t.id, t)).collect(),
        };
        for id in users {
            if names.users.contains_key(&id) {
                continue;
            }
            if let Some(user) = conn.get_user(id)? {
                names.users.insert(id, user.username);
            }
        }
        Ok(names)
    }

    fn user(&self, id: Id) -> String {
        self.users
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "[deleted]".to_string())
    }

    fn category(&self, id: Option<Id>) -> Option<Named> {
        let category = self.categories.get(&id?)?;
        Some(Named {
            id: category.id,
            name: category.name.clone(),
        })
    }

    fn tags(&self, ids: &[Id]) -> Vec<Named> {
        ids.iter()
            .filter_map(|id| self.tags.get(id))
            .map(|t| Named {
                id: t.id,
                name: t.name.clone(),
            })
            .collect()
    }
}

/// A post as listings and the post page show it.
#[derive(Clone, Debug)]
pub struct PostView {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub excerpt: String,
    pub author: String,
    pub category: Option<Named>,
    pub tags: Vec<Named>,
    pub published: bool,
    pub created: String,
    /// Set when the post was edited after it was created.
    pub updated: Option<String>,
    pub can_modify: bool,
}

impl PostView {
    pub fn new(post: &Post, names: &Names, viewer: Option<&User>) -> Self {
        PostView {
            title: post.title.clone(),
            slug: post.slug.clone(),
            body: post.body.clone(),
            excerpt: excerpt(&post.body),
            author: names.user(post.author_id),
            category: names.category(post.category_id),
            tags: names.tags(&post.tags),
            published: post.published,
            created: format_date(post.created_at),
            updated: (post.updated_at > post.created_at).then(|| format_date(post.updated_at)),
            can_modify: viewer.is_some_and(|v| can_modify(v, post)),
        }
    }
}

/// A comment under a post.
#[derive(Clone, Debug)]
pub struct CommentView {
    pub id: Id,
    pub body: String,
    pub author: String,
    pub created: String,
    pub can_delete: bool,
}

impl CommentView {
    pub fn new(comment: &Comment, names: &Names, viewer: Option<&User>) -> Self {
        CommentView {
            id: comment.id,
            body: comment.body.clone(),
            author: names.user(comment.author_id),
            created: format_date(comment.created_at),
            can_delete: viewer.is_some_and(|v| can_modify(v, comment)),
        }
    }
}

/// A top-level comment and its replies.
#[derive(Clone, Debug)]
pub struct ThreadView {
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

impl ThreadView {
    pub fn new(thread: &Thread, names: &Names, viewer: Option<&User>) -> Self {
        ThreadView {
            comment: CommentView::new(&thread.comment, names, viewer),
            replies: thread
                .replies
                .iter()
                .map(|r| CommentView::new(r, names, viewer))
                .collect(),
        }
    }
}

/// One entry in the page number strip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageLink {
    pub number: u32,
    pub url: String,
    pub current: bool,
    /// An ellipsis standing for skipped pages.
    pub gap: bool,
}

/// Navigation links for a paginated listing.
#[derive(Clone, Debug, Default)]
pub struct Pager {
    pub links: Vec<PageLink>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl Pager {
    /// Links to the pages of `page`, each carrying `params` so filters
    /// survive paging.
    pub fn new<T>(page: &Page<T>, path: &str, params: &[(&str, String)]) -> Result<Self, AppError> {
        let url = |n: u32| -> Result<String, AppError> {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("page", n.to_string()));
            Ok(format!("{path}?{}", serde_urlencoded::to_string(&query)?))
        };
        let mut links = Vec::new();
        for entry in page.iter_pages(PageWindow::default()) {
            links.push(match entry {
                Some(n) => PageLink {
                    number: n,
                    url: url(n)?,
                    current: n == page.page,
                    gap: false,
                },
                None => PageLink {
                    number: 0,
                    url: String::new(),
                    current: false,
                    gap: true,
                },
            });
        }
        Ok(Pager {
            links,
            prev: page.prev_num().map(url).transpose()?,
            next: page.next_num().map(url).transpose()?,
        })
    }

    /// Whether there is more than one page to move between.
    pub fn is_needed(&self) -> bool {
        self.links.len() > 1
    }
}

/// The start of `body`, cut at a character boundary.
pub fn excerpt(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

fn format_date(at: NaiveDateTime) -> String {
    at.format(DATE_FORMAT).to_string()
}
