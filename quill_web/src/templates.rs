//! Askama templates for the Quill web interface

use askama::Template;
use quill_core::forms::{CommentForm, EditProfileForm, LoginForm, PostForm, RegisterForm};
use quill_core::models::{Category, Id, Tag};
use quill_core::FormErrors;

use crate::views::{BaseContext, Pager, PostView, ThreadView};

/// Sidebar shown next to listings
#[derive(Debug, Default)]
pub struct Sidebar {
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub recent: Vec<RecentPost>,
}

/// Link in the recent posts list
#[derive(Debug)]
pub struct RecentPost {
    pub title: String,
    pub slug: String,
}

/// A selectable category or tag on the post form
#[derive(Debug)]
pub struct Choice {
    pub id: Id,
    pub name: String,
    pub selected: bool,
}

/// A comment listed on the dashboard
#[derive(Debug)]
pub struct DashboardComment {
    pub excerpt: String,
    pub post_title: String,
    pub post_slug: String,
    pub created: String,
}

/// Post listing, also used for category, tag and search results
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub posts: Vec<PostView>,
    pub pager: Pager,
    pub search: String,
    pub sidebar: Sidebar,
}

/// A single post with its comments
#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub post: PostView,
    pub threads: Vec<ThreadView>,
    pub comment_count: usize,
    pub form: CommentForm,
    pub errors: FormErrors,
}

/// New and edit post form
#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub action: String,
    pub is_edit: bool,
    pub form: PostForm,
    pub errors: FormErrors,
    pub categories: Vec<Choice>,
    pub tags: Vec<Choice>,
}

/// Sign-in page
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub action: String,
    pub form: LoginForm,
    pub errors: FormErrors,
}

/// Registration page
#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub form: RegisterForm,
    pub errors: FormErrors,
}

/// Profile editing page, including account deletion
#[derive(Template)]
#[template(path = "edit_profile.html")]
pub struct EditProfileTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub form: EditProfileForm,
    pub errors: FormErrors,
}

/// The signed-in user's posts and comments
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: BaseContext,
    pub title: String,
    pub posts: Vec<PostView>,
    pub comments: Vec<DashboardComment>,
}

/// 403, 404 and 500 pages
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub ctx: BaseContext,
    pub title: &'static str,
    pub code: u16,
    pub message: &'static str,
}
