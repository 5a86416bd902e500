//! Blog operations.
//!
//! Each action validates its input, checks authorization where a record
//! belongs to someone, and then performs the store mutations. Actions work
//! on any [`ConnectionMethods`], so they run unchanged against either
//! backend and against pooled connections.

use serde::Serialize;

use crate::auth::ensure_can_modify;
use crate::db::ConnectionMethods;
use crate::forms::{
    CategoryForm, CommentForm, DeleteAccountForm, EditProfileForm, LoginForm, PostForm,
    RegisterForm, TagForm,
};
use crate::models::{now, Category, Comment, Id, NewComment, NewPost, NewUser, Post, Tag, User};
use crate::page::{paginate, Page, PageRequest};
use crate::password::{hash_password, verify_password};
use crate::query::{CommentFilter, PostFilter};
use crate::slug::slugify;
use crate::validate::FormErrors;
use crate::{Error, Result};

/// Number of posts in the "recent posts" sidebar.
pub const RECENT_POSTS: u32 = 5;

/// Create an account from a registration form.
pub fn register<C>(conn: &C, form: &RegisterForm) -> Result<User>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate(conn)?;
    let bio = form.bio.trim();
    let user = conn.insert_user(&NewUser {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password_hash: hash_password(&form.password)?,
        bio: (!bio.is_empty()).then(|| bio.to_string()),
        joined_at: now(),
        is_admin: false,
    })?;
    log::info!("registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Check a login form's credentials, recording the login time on success.
pub fn authenticate<C>(conn: &C, form: &LoginForm) -> Result<User>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate()?;
    let Some(mut user) = conn.find_user_by_email(form.email.trim())? else {
        return Err(Error::InvalidCredentials);
    };
    if !verify_password(&user.password_hash, &form.password) {
        return Err(Error::InvalidCredentials);
    }
    user.last_login = now();
    conn.update_user(&user)?;
    log::info!("user {} logged in", user.id);
    Ok(user)
}

/// Apply a profile form to `user`.
pub fn update_profile<C>(conn: &C, user: &User, form: &EditProfileForm) -> Result<User>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate(conn, user)?;
    let bio = form.bio.trim();
    let updated = User {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        bio: (!bio.is_empty()).then(|| bio.to_string()),
        ..user.clone()
    };
    conn.update_user(&updated)?;
    Ok(updated)
}

/// Delete `user` and everything they wrote, after confirming their password.
pub fn delete_account<C>(conn: &C, user: &User, form: &DeleteAccountForm) -> Result<()>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate()?;
    if !verify_password(&user.password_hash, &form.password) {
        let mut errors = FormErrors::new();
        errors.add("password", "Incorrect password.");
        return Err(Error::Validation(errors));
    }
    conn.delete_user(user.id)?;
    log::info!("deleted user {} ({})", user.username, user.id);
    Ok(())
}

/// Grant or revoke the admin flag of the user called `username`.
pub fn set_admin<C>(conn: &C, username: &str, is_admin: bool) -> Result<User>
where
    C: ConnectionMethods + ?Sized,
{
    let mut user = conn
        .find_user_by_username(username)?
        .ok_or(Error::NoSuchObject)?;
    user.is_admin = is_admin;
    conn.update_user(&user)?;
    Ok(user)
}

/// Look up a post by slug. Drafts are only visible to those who may
/// modify them.
pub fn get_post<C>(conn: &C, slug: &str, viewer: Option<&User>) -> Result<Post>
where
    C: ConnectionMethods + ?Sized,
{
    let post = conn.find_post_by_slug(slug)?.ok_or(Error::NoSuchObject)?;
    let visible =
        post.published || viewer.is_some_and(|v| crate::auth::can_modify(v, &post));
    if visible {
        Ok(post)
    } else {
        Err(Error::NoSuchObject)
    }
}

/// Publish a new post by `author`.
pub fn create_post<C>(conn: &C, author: &User, form: &PostForm) -> Result<Post>
where
    C: ConnectionMethods + ?Sized,
{
    let valid = form.validate(conn)?;
    let created_at = now();
    let new = NewPost {
        slug: slugify(&valid.title, created_at),
        title: valid.title,
        body: valid.body,
        author_id: author.id,
        category_id: Some(valid.category_id),
        tags: valid.tags,
        published: valid.published,
        created_at,
    };
    match conn.insert_post(&new) {
        Ok(post) => {
            log::info!("user {} created post {}", author.id, post.slug);
            Ok(post)
        }
        Err(Error::UniqueViolation(detail)) => {
            log::debug!("slug collision for {}: {detail}", new.slug);
            let mut errors = FormErrors::new();
            errors.add(
                "title",
                "A post with this title was just created. Please try again.",
            );
            Err(Error::Validation(errors))
        }
        Err(e) => Err(e),
    }
}

/// Apply a post form to the post at `slug`. The slug itself is kept.
pub fn update_post<C>(conn: &C, actor: &User, slug: &str, form: &PostForm) -> Result<Post>
where
    C: ConnectionMethods + ?Sized,
{
    let post = conn.find_post_by_slug(slug)?.ok_or(Error::NoSuchObject)?;
    ensure_can_modify(actor, &post)?;
    let valid = form.validate(conn)?;
    let mut tags = valid.tags;
    tags.sort_unstable();
    let updated = Post {
        title: valid.title,
        body: valid.body,
        category_id: Some(valid.category_id),
        tags,
        published: valid.published,
        updated_at: now(),
        ..post
    };
    conn.update_post(&updated)?;
    Ok(updated)
}

/// Delete the post at `slug` and its comments.
pub fn delete_post<C>(conn: &C, actor: &User, slug: &str) -> Result<()>
where
    C: ConnectionMethods + ?Sized,
{
    let post = conn.find_post_by_slug(slug)?.ok_or(Error::NoSuchObject)?;
    ensure_can_modify(actor, &post)?;
    conn.delete_post(post.id)?;
    log::info!("user {} deleted post {}", actor.id, post.slug);
    Ok(())
}

/// Comment on `post`. A reply to a reply is attached to the top-level
/// comment of that thread, so threads stay one level deep.
pub fn add_comment<C>(conn: &C, author: &User, post: &Post, form: &CommentForm) -> Result<Comment>
where
    C: ConnectionMethods + ?Sized,
{
    let mut parent_id = form.validate(conn, post)?;
    if let Some(parent) = parent_id {
        if let Some(root) = conn.get_comment(parent)?.and_then(|c| c.parent_id) {
            parent_id = Some(root);
        }
    }
    conn.insert_comment(&NewComment {
        body: form.content.clone(),
        author_id: author.id,
        post_id: post.id,
        parent_id,
        created_at: now(),
    })
}

/// Delete a comment and its replies. Returns the post it was on.
pub fn delete_comment<C>(conn: &C, actor: &User, id: Id) -> Result<Post>
where
    C: ConnectionMethods + ?Sized,
{
    let comment = conn.get_comment(id)?.ok_or(Error::NoSuchObject)?;
    ensure_can_modify(actor, &comment)?;
    let post = conn.get_post(comment.post_id)?.ok_or(Error::NoSuchObject)?;
    conn.delete_comment(id)?;
    Ok(post)
}

/// Create a category.
pub fn add_category<C>(conn: &C, form: &CategoryForm) -> Result<Category>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate(conn)?;
    let description = form.description.trim();
    insert_category(
        conn,
        form.name.trim(),
        (!description.is_empty()).then_some(description),
    )
}

/// Create a tag.
pub fn add_tag<C>(conn: &C, form: &TagForm) -> Result<Tag>
where
    C: ConnectionMethods + ?Sized,
{
    form.validate(conn)?;
    insert_tag(conn, form.name.trim())
}

// The form check can race with another insert of the same name, so the
// store's uniqueness failure is reported like the form's.
fn insert_category<C>(conn: &C, name: &str, description: Option<&str>) -> Result<Category>
where
    C: ConnectionMethods + ?Sized,
{
    conn.insert_category(name, description)
        .map_err(|e| name_taken(e, "Category already exists."))
}

fn insert_tag<C>(conn: &C, name: &str) -> Result<Tag>
where
    C: ConnectionMethods + ?Sized,
{
    conn.insert_tag(name)
        .map_err(|e| name_taken(e, "Tag already exists."))
}

fn name_taken(err: Error, message: &str) -> Error {
    match err {
        Error::UniqueViolation(detail) => {
            log::debug!("name collision: {detail}");
            let mut errors = FormErrors::new();
            errors.add("name", message);
            Error::Validation(errors)
        }
        e => e,
    }
}

/// One page of posts matching `filter`, most recent first.
pub fn list_posts<C>(conn: &C, filter: &PostFilter, request: PageRequest) -> Result<Page<Post>>
where
    C: ConnectionMethods + ?Sized,
{
    paginate(conn, filter, request)
}

/// The latest published posts.
pub fn recent_posts<C>(conn: &C, count: u32) -> Result<Vec<Post>>
where
    C: ConnectionMethods + ?Sized,
{
    conn.query_posts(&PostFilter::published(), Some(count), None)
}

/// A top-level comment with its replies.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Thread {
    /// The top-level comment.
    pub comment: Comment,
    /// Replies, oldest first.
    pub replies: Vec<Comment>,
}

/// The comments on a post grouped into threads, newest thread first.
pub fn comment_threads<C>(conn: &C, post_id: Id) -> Result<Vec<Thread>>
where
    C: ConnectionMethods + ?Sized,
{
    let comments = conn.query_comments(&CommentFilter::for_post(post_id))?;
    let (roots, replies): (Vec<Comment>, Vec<Comment>) =
        comments.into_iter().partition(|c| c.parent_id.is_none());
    let mut threads: Vec<Thread> = roots
        .into_iter()
        .rev()
        .map(|comment| Thread {
            comment,
            replies: Vec::new(),
        })
        .collect();
    for reply in replies {
        if let Some(thread) = threads
            .iter_mut()
            .find(|t| Some(t.comment.id) == reply.parent_id)
        {
            thread.replies.push(reply);
        }
    }
    Ok(threads)
}

/// Everything a user has written.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Dashboard {
    /// Posts, published or not, newest first.
    pub posts: Vec<Post>,
    /// Comments, newest first.
    pub comments: Vec<Comment>,
}

/// Gather `user`'s posts and comments.
pub fn dashboard<C>(conn: &C, user: &User) -> Result<Dashboard>
where
    C: ConnectionMethods + ?Sized,
{
    let posts = conn.query_posts(&PostFilter::new().with_author(user.id), None, None)?;
    let mut comments = conn.query_comments(&CommentFilter::by_author(user.id))?;
    comments.reverse();
    Ok(Dashboard { posts, comments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, ConnectionSpec};
    use crate::migrations;

    fn connections() -> Vec<db::Connection> {
        let mut conns = vec![db::connect(&ConnectionSpec::new("docstore", ":memory:")).unwrap()];
        #[cfg(feature = "sqlite")]
        conns.push(db::connect(&ConnectionSpec::new("sqlite", ":memory:")).unwrap());
        for conn in &conns {
            migrations::migrate(conn).unwrap();
        }
        conns
    }

    fn name_error(result: Result<impl std::fmt::Debug>) -> String {
        match result {
            Err(Error::Validation(errors)) => errors.get("name").unwrap().to_string(),
            other => panic!("expected a name error, got {other:?}"),
        }
    }

    #[test]
    fn name_inserted_after_validation_is_a_form_error() {
        for conn in connections() {
            // Another request created the names between the form check and
            // the insert.
            conn.insert_category("Art", None).unwrap();
            conn.insert_tag("async").unwrap();

            assert_eq!(
                name_error(insert_category(&conn, "Art", Some("again"))),
                "Category already exists."
            );
            assert_eq!(name_error(insert_tag(&conn, "async")), "Tag already exists.");
            assert_eq!(conn.categories().unwrap().len(), 1);
            assert_eq!(conn.tags().unwrap().len(), 1);
        }
    }

    #[test]
    fn other_store_errors_pass_through() {
        assert!(matches!(
            name_taken(Error::NoSuchObject, "Tag already exists."),
            Error::NoSuchObject
        ));
    }
}
