//! Listings, posts, comments and the dashboard.

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use quill_core::actions::{self, RECENT_POSTS};
use quill_core::auth::ensure_can_modify;
use quill_core::db::ConnectionMethods;
use quill_core::forms::{CommentForm, PostForm};
use quill_core::{Error, FormErrors, Id, PageRequest, PostFilter, User};
use serde::Deserialize;
use tower_sessions::Session;

use super::{parse_id, render};
use crate::error::AppError;
use crate::session::{flash, AuthUser, CurrentUser};
use crate::state::AppState;
use crate::templates::{
    Choice, DashboardComment, DashboardTemplate, IndexTemplate, PostFormTemplate, PostTemplate,
    RecentPost, Sidebar,
};
use crate::views::{excerpt, BaseContext, Names, Pager, PostView, ThreadView};

/// Query parameters accepted by listings. Values that do not parse are
/// ignored rather than rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListingQuery {
    pub page: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub q: Option<String>,
}

impl ListingQuery {
    fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
    }

    fn id(raw: &Option<String>) -> Option<Id> {
        raw.as_deref().and_then(|v| v.trim().parse().ok())
    }

    fn search(&self) -> Option<String> {
        let q = self.q.as_deref()?.trim();
        (!q.is_empty()).then(|| q.to_string())
    }
}

/// One listing page to render.
struct Listing {
    title: String,
    path: String,
    params: Vec<(&'static str, String)>,
    search: String,
    filter: PostFilter,
    page: u32,
}

fn load_sidebar<C>(conn: &C) -> quill_core::Result<Sidebar>
where
    C: ConnectionMethods + ?Sized,
{
    Ok(Sidebar {
        categories: conn.categories()?,
        tags: conn.tags()?,
        recent: actions::recent_posts(conn, RECENT_POSTS)?
            .into_iter()
            .map(|p| RecentPost {
                title: p.title,
                slug: p.slug,
            })
            .collect(),
    })
}

async fn listing(
    state: &AppState,
    session: &Session,
    user: Option<User>,
    listing: Listing,
) -> Result<Html<String>, AppError> {
    let request = PageRequest::new(listing.page, state.config().posts_per_page);
    let filter = listing.filter;
    let (page, names, sidebar) = state
        .with_conn(move |conn| {
            let page = actions::list_posts(conn, &filter, request)?;
            let names = Names::load(conn, page.items.iter().map(|p| p.author_id))?;
            Ok((page, names, load_sidebar(conn)?))
        })
        .await?;
    let pager = Pager::new(&page, &listing.path, &listing.params)?;
    let posts = page
        .items
        .iter()
        .map(|p| PostView::new(p, &names, user.as_ref()))
        .collect();
    render(IndexTemplate {
        ctx: BaseContext::load(session, user).await?,
        title: listing.title,
        posts,
        pager,
        search: listing.search,
        sidebar,
    })
}

pub async fn index(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListingQuery>,
) -> Result<Html<String>, AppError> {
    let mut filter = PostFilter::published();
    let mut params = Vec::new();
    if let Some(category) = ListingQuery::id(&query.category) {
        filter = filter.with_category(category);
        params.push(("category", category.to_string()));
    }
    if let Some(tag) = ListingQuery::id(&query.tag) {
        filter = filter.with_tag(tag);
        params.push(("tag", tag.to_string()));
    }
    let search = query.search();
    let title = match &search {
        Some(q) => {
            filter = filter.with_search(q.as_str());
            params.push(("q", q.clone()));
            format!("Search results for \"{q}\"")
        }
        None => "Home".to_string(),
    };
    let listing_page = Listing {
        title,
        path: "/".to_string(),
        params,
        search: search.unwrap_or_default(),
        filter,
        page: query.page(),
    };
    listing(&state, &session, user, listing_page).await
}

pub async fn category_posts(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(raw): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<Html<String>, AppError> {
    let id = parse_id(&raw)?;
    let category = state
        .with_conn(move |conn| conn.get_category(id))
        .await?
        .ok_or(AppError::NotFound)?;
    let listing_page = Listing {
        title: format!("Category: {}", category.name),
        path: format!("/category/{id}"),
        params: Vec::new(),
        search: String::new(),
        filter: PostFilter::published().with_category(id),
        page: query.page(),
    };
    listing(&state, &session, user, listing_page).await
}

pub async fn tag_posts(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(raw): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<Html<String>, AppError> {
    let id = parse_id(&raw)?;
    let tag = state
        .with_conn(move |conn| conn.get_tag(id))
        .await?
        .ok_or(AppError::NotFound)?;
    let listing_page = Listing {
        title: format!("Tag: {}", tag.name),
        path: format!("/tag/{id}"),
        params: Vec::new(),
        search: String::new(),
        filter: PostFilter::published().with_tag(id),
        page: query.page(),
    };
    listing(&state, &session, user, listing_page).await
}

async fn post_page(
    state: &AppState,
    session: &Session,
    user: Option<User>,
    slug: String,
    form: CommentForm,
    errors: FormErrors,
) -> Result<Html<String>, AppError> {
    let viewer = user.clone();
    let (post, threads, names) = state
        .with_conn(move |conn| {
            let post = actions::get_post(conn, &slug, viewer.as_ref())?;
            let threads = actions::comment_threads(conn, post.id)?;
            let authors = threads
                .iter()
                .flat_map(|t| std::iter::once(&t.comment).chain(&t.replies))
                .map(|c| c.author_id)
                .chain(std::iter::once(post.author_id))
                .collect::<Vec<_>>();
            let names = Names::load(conn, authors)?;
            Ok((post, threads, names))
        })
        .await?;
    let viewer = user.as_ref();
    let comment_count = threads.iter().map(|t| 1 + t.replies.len()).sum();
    let template = PostTemplate {
        title: post.title.clone(),
        post: PostView::new(&post, &names, viewer),
        threads: threads
            .iter()
            .map(|t| ThreadView::new(t, &names, viewer))
            .collect(),
        comment_count,
        form,
        errors,
        ctx: BaseContext::load(session, user).await?,
    };
    render(template)
}

pub async fn view_post(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    post_page(
        &state,
        &session,
        user,
        slug,
        CommentForm::default(),
        FormErrors::new(),
    )
    .await
}

pub async fn add_comment(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let (author, target, submitted) = (user.clone(), slug.clone(), form.clone());
    let result = state
        .with_conn(move |conn| {
            let post = actions::get_post(conn, &target, Some(&author))?;
            actions::add_comment(conn, &author, &post, &submitted)
        })
        .await;
    match result {
        Ok(_) => {
            flash(&session, "success", "Your comment has been posted!").await?;
            Ok(Redirect::to(&format!("/post/{slug}")).into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => {
            Ok(post_page(&state, &session, Some(user), slug, form, errors)
                .await?
                .into_response())
        }
        Err(e) => Err(e),
    }
}

async fn post_form_page(
    state: &AppState,
    session: &Session,
    user: User,
    page: PostFormPage,
    form: PostForm,
    errors: FormErrors,
) -> Result<Html<String>, AppError> {
    let (categories, tags) = state
        .with_conn(|conn| Ok((conn.categories()?, conn.tags()?)))
        .await?;
    let selected_category = form.category();
    let categories = categories
        .into_iter()
        .map(|c| Choice {
            selected: Some(c.id) == selected_category,
            id: c.id,
            name: c.name,
        })
        .collect();
    let tags = tags
        .into_iter()
        .map(|t| Choice {
            selected: form.tags.contains(&t.id),
            id: t.id,
            name: t.name,
        })
        .collect();
    render(PostFormTemplate {
        ctx: BaseContext::load(session, Some(user)).await?,
        title: page.title.to_string(),
        is_edit: page.is_edit,
        action: page.action,
        form,
        errors,
        categories,
        tags,
    })
}

/// Which post form is being shown.
struct PostFormPage {
    title: &'static str,
    action: String,
    is_edit: bool,
}

impl PostFormPage {
    fn new_post() -> Self {
        PostFormPage {
            title: "New Post",
            action: "/post/new".to_string(),
            is_edit: false,
        }
    }

    fn edit(slug: &str) -> Self {
        PostFormPage {
            title: "Edit Post",
            action: format!("/post/{slug}/edit"),
            is_edit: true,
        }
    }
}

pub async fn new_post_page(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
) -> Result<Html<String>, AppError> {
    post_form_page(
        &state,
        &session,
        user,
        PostFormPage::new_post(),
        PostForm::default(),
        FormErrors::new(),
    )
    .await
}

pub async fn new_post(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let form = PostForm::from_pairs(&pairs);
    let (author, submitted) = (user.clone(), form.clone());
    match state
        .with_conn(move |conn| actions::create_post(conn, &author, &submitted))
        .await
    {
        Ok(post) => {
            flash(&session, "success", "Your post has been created!").await?;
            Ok(Redirect::to(&format!("/post/{}", post.slug)).into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => Ok(post_form_page(
            &state,
            &session,
            user,
            PostFormPage::new_post(),
            form,
            errors,
        )
        .await?
        .into_response()),
        Err(e) => Err(e),
    }
}

pub async fn edit_post_page(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let (actor, target) = (user.clone(), slug.clone());
    let post = state
        .with_conn(move |conn| {
            let post = actions::get_post(conn, &target, Some(&actor))?;
            ensure_can_modify(&actor, &post)?;
            Ok(post)
        })
        .await?;
    post_form_page(
        &state,
        &session,
        user,
        PostFormPage::edit(&slug),
        PostForm::from_post(&post),
        FormErrors::new(),
    )
    .await
}

pub async fn edit_post(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let form = PostForm::from_pairs(&pairs);
    let (actor, target, submitted) = (user.clone(), slug.clone(), form.clone());
    match state
        .with_conn(move |conn| actions::update_post(conn, &actor, &target, &submitted))
        .await
    {
        Ok(post) => {
            flash(&session, "success", "Your post has been updated!").await?;
            Ok(Redirect::to(&format!("/post/{}", post.slug)).into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => Ok(post_form_page(
            &state,
            &session,
            user,
            PostFormPage::edit(&slug),
            form,
            errors,
        )
        .await?
        .into_response()),
        Err(e) => Err(e),
    }
}

pub async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    state
        .with_conn(move |conn| actions::delete_post(conn, &user, &slug))
        .await?;
    flash(&session, "success", "Your post has been deleted!").await?;
    Ok(Redirect::to("/").into_response())
}

pub async fn delete_comment(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Path(raw): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&raw)?;
    let post = state
        .with_conn(move |conn| actions::delete_comment(conn, &user, id))
        .await?;
    flash(&session, "success", "Comment deleted successfully!").await?;
    Ok(Redirect::to(&format!("/post/{}", post.slug)).into_response())
}

pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
) -> Result<Html<String>, AppError> {
    let owner = user.clone();
    let (dashboard, names, commented) = state
        .with_conn(move |conn| {
            let dashboard = actions::dashboard(conn, &owner)?;
            let names = Names::load(conn, [owner.id])?;
            let mut commented = Vec::with_capacity(dashboard.comments.len());
            for comment in &dashboard.comments {
                commented.push(conn.get_post(comment.post_id)?);
            }
            Ok((dashboard, names, commented))
        })
        .await?;
    let posts = dashboard
        .posts
        .iter()
        .map(|p| PostView::new(p, &names, Some(&user)))
        .collect();
    let comments = dashboard
        .comments
        .iter()
        .zip(commented)
        .filter_map(|(comment, post)| {
            let post = post?;
            Some(DashboardComment {
                excerpt: excerpt(&comment.body),
                post_title: post.title,
                post_slug: post.slug,
                created: comment.created_at.format("%B %d, %Y").to_string(),
            })
        })
        .collect();
    render(DashboardTemplate {
        ctx: BaseContext::load(&session, Some(user)).await?,
        title: "Dashboard".to_string(),
        posts,
        comments,
    })
}
