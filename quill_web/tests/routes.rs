use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use quill_core::db::{ConnectionManager, ConnectionMethods};
use quill_core::Post;
use quill_test_helper::{docstore_connspec, seed_blog, Fixture, PASSWORD};
use quill_web::state::build_pool;
use quill_web::{app, AppState, Config, SESSION_COOKIE};
use r2d2::Pool;
use tower::ServiceExt;

/// A browser talking to a freshly seeded app: it remembers the session
/// cookie between requests.
struct Client {
    router: Router,
    pool: Pool<ConnectionManager>,
    fixture: Fixture,
    cookie: Option<String>,
}

impl Client {
    fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok();
        let pool = build_pool(docstore_connspec()).unwrap();
        let fixture = seed_blog(&pool.get().unwrap());
        let state = AppState::new(pool.clone(), Config::default());
        Client {
            router: app(state).unwrap(),
            pool,
            fixture,
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, form: Option<&[(&str, &str)]>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match form {
            Some(pairs) => {
                builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(serde_urlencoded::to_string(pairs).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap();
            if let Some(rest) = pair.strip_prefix(&format!("{SESSION_COOKIE}=")) {
                self.cookie = (!rest.is_empty()).then(|| pair.to_string());
            }
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> Response {
        self.send(Method::POST, uri, Some(form)).await
    }

    async fn login(&mut self, username: &str) {
        let email = format!("{username}@example.com");
        let response = self
            .post("/login", &[("email", email.as_str()), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect")
        .to_str()
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Whether a listing shows `post` as one of its entries.
fn lists(body: &str, post: &Post) -> bool {
    body.contains(&format!("<h2><a href=\"/post/{}\">", post.slug))
}

#[tokio::test]
async fn index_pages_published_posts() {
    let mut client = Client::new();
    let posts = client.fixture.posts.clone();
    let response = client.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    for post in &posts[..5] {
        assert!(lists(&body, post), "missing {}", post.title);
    }
    assert!(!lists(&body, &posts[5]));
    assert!(!lists(&body, &client.fixture.draft));
    assert!(body.contains("href=\"/?page=2\""));

    let body = text(client.get("/?page=2").await).await;
    assert!(lists(&body, &posts[5]));
    assert!(lists(&body, &posts[6]));
    assert!(!lists(&body, &posts[0]));

    let body = text(client.get("/?page=9").await).await;
    assert!(body.contains("No posts found."));
}

#[tokio::test]
async fn largest_page_number_renders_empty_listing() {
    let mut client = Client::new();
    let response = client.get("/?page=4294967295").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("No posts found."));
    assert!(body.contains("href=\"/?page=2\""));
    assert!(!body.contains("page=4294967296"));

    let category = client.fixture.rust.id;
    let response = client
        .get(&format!("/category/{category}?page=4294967295"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_filters_and_search() {
    let mut client = Client::new();
    let alice_posts: Vec<Post> = client
        .fixture
        .posts
        .iter()
        .filter(|p| p.author_id == client.fixture.alice.id)
        .cloned()
        .collect();

    let body = text(client.get("/?q=borrowing+PART+2").await).await;
    assert!(body.contains("Search results for"));
    let shown: Vec<&Post> = alice_posts.iter().filter(|p| lists(&body, p)).collect();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Borrowing part 2");

    let uri = format!("/?tag={}", client.fixture.ownership.id);
    let body = text(client.get(&uri).await).await;
    assert!(alice_posts[..4].iter().all(|p| lists(&body, p)));

    let uri = format!("/?category={}&page=abc", client.fixture.cooking.id);
    let response = client.get(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(alice_posts.iter().all(|p| !lists(&body, p)));
}

#[tokio::test]
async fn category_and_tag_pages() {
    let mut client = Client::new();
    let uri = format!("/category/{}", client.fixture.cooking.id);
    let body = text(client.get(&uri).await).await;
    assert!(body.contains("Category: Cooking"));
    let bobs = client
        .fixture
        .posts
        .iter()
        .filter(|p| p.author_id == client.fixture.bob.id);
    for post in bobs {
        assert!(lists(&body, post));
    }

    let uri = format!("/tag/{}", client.fixture.unused.id);
    let body = text(client.get(&uri).await).await;
    assert!(body.contains("Tag: unused"));
    assert!(body.contains("No posts found."));

    for missing in ["/category/9999", "/category/abc", "/tag/9999"] {
        let response = client.get(missing).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{missing}");
        assert!(text(response).await.contains("Page Not Found"));
    }
}

#[tokio::test]
async fn drafts_only_visible_to_author() {
    let mut client = Client::new();
    let uri = format!("/post/{}", client.fixture.draft.slug);
    assert_eq!(client.get(&uri).await.status(), StatusCode::NOT_FOUND);

    client.login("bob").await;
    assert_eq!(client.get(&uri).await.status(), StatusCode::NOT_FOUND);

    let mut client_alice = Client {
        cookie: None,
        ..client
    };
    client_alice.login("alice").await;
    let response = client_alice.get(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Draft"));
}

#[tokio::test]
async fn login_and_logout() {
    let mut client = Client::new();
    let response = client
        .post(
            "/login?next=/dashboard",
            &[("email", "alice@example.com"), ("password", "wrong-password")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Fdashboard");
    let body = text(client.get("/login").await).await;
    assert!(body.contains("Invalid email or password"));

    let response = client
        .post(
            "/login?next=/dashboard",
            &[("email", "alice@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(location(&response), "/dashboard");
    let body = text(client.get("/dashboard").await).await;
    assert!(body.contains("You have been logged in successfully!"));
    assert!(body.contains("Borrowing part 1"));
    assert!(body.contains("Unfinished thoughts"));

    // Signed-in users are sent away from the login page.
    let response = client.get("/login").await;
    assert_eq!(location(&response), "/");

    let response = client.get("/logout").await;
    assert_eq!(location(&response), "/");
    let body = text(client.get("/").await).await;
    assert!(body.contains("You have been logged out."));
    assert_eq!(
        location(&client.get("/dashboard").await),
        "/login?next=%2Fdashboard"
    );
}

#[tokio::test]
async fn login_ignores_offsite_next() {
    let mut client = Client::new();
    let response = client
        .post(
            "/login?next=https://evil.example/",
            &[("email", "bob@example.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn login_form_errors_rerender() {
    let mut client = Client::new();
    let response = client
        .post("/login", &[("email", "not-an-email"), ("password", "x")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("Invalid email address."));
}

#[tokio::test]
async fn register_then_login() {
    let mut client = Client::new();
    let form = [
        ("username", "carol"),
        ("email", "carol@example.com"),
        ("password", "secret-pass"),
        ("confirm_password", "secret-pass"),
        ("bio", ""),
    ];
    let response = client.post("/register", &form).await;
    assert_eq!(location(&response), "/login");
    let body = text(client.get("/login").await).await;
    assert!(body.contains("Your account has been created! You can now login."));

    let response = client.post("/register", &form).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("Username is already taken. Please choose a different one."));
    assert!(body.contains("Email is already registered. Please use a different one."));

    client.login("carol").await;
    let carol = client
        .pool
        .get()
        .unwrap()
        .find_user_by_username("carol")
        .unwrap()
        .unwrap();
    assert_eq!(carol.email, "carol@example.com");
}

#[tokio::test]
async fn login_required_pages_redirect() {
    let mut client = Client::new();
    for uri in ["/post/new", "/dashboard", "/profile", "/edit-profile"] {
        let response = client.get(uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert!(location(&response).starts_with("/login?next="), "{uri}");
    }
    let body = text(client.get("/login").await).await;
    assert!(body.contains("Please log in to access this page."));
}

#[tokio::test]
async fn create_and_edit_post() {
    let mut client = Client::new();
    client.login("alice").await;
    let rust = client.fixture.rust.id.to_string();
    let general = client.fixture.general.id.to_string();
    let ownership = client.fixture.ownership.id.to_string();

    let response = client
        .post(
            "/post/new",
            &[
                ("title", "Fresh post"),
                ("content", "Enough words to pass validation."),
                ("category_id", rust.as_str()),
                ("tags", general.as_str()),
                ("tags", ownership.as_str()),
                ("published", "y"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response).to_string();
    assert!(target.starts_with("/post/fresh-post-"));

    let body = text(client.get(&target).await).await;
    assert!(body.contains("Your post has been created!"));
    assert!(body.contains("Fresh post"));
    assert!(body.contains("ownership"));

    let slug = target.trim_start_matches("/post/").to_string();
    let edit = format!("{target}/edit");
    let body = text(client.get(&edit).await).await;
    assert!(body.contains("Update Post"));
    assert!(body.contains("value=\"Fresh post\""));

    let response = client
        .post(
            &edit,
            &[
                ("title", "Fresh post, revised"),
                ("content", "Enough words to pass validation."),
                ("category_id", rust.as_str()),
            ],
        )
        .await;
    assert_eq!(location(&response), target);
    let post = client
        .pool
        .get()
        .unwrap()
        .find_post_by_slug(&slug)
        .unwrap()
        .unwrap();
    assert_eq!(post.title, "Fresh post, revised");
    assert!(post.tags.is_empty());
    assert!(!post.published);
}

#[tokio::test]
async fn invalid_post_rerenders_form() {
    let mut client = Client::new();
    client.login("alice").await;
    let response = client
        .post(
            "/post/new",
            &[("title", "Hi"), ("content", "short"), ("category_id", "")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = text(response).await;
    assert!(body.contains("Title must be between 3 and 120 characters"));
    assert!(body.contains("Content must be at least 10 characters"));
    assert!(body.contains("Please select a category"));
}

#[tokio::test]
async fn only_author_or_admin_may_modify() {
    let mut client = Client::new();
    let post = client.fixture.posts[0].clone();
    assert_eq!(post.author_id, client.fixture.alice.id);
    client.login("bob").await;

    let response = client.get(&format!("/post/{}/edit", post.slug)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(text(response)
        .await
        .contains("You do not have permission to access this resource"));
    let response = client
        .post(&format!("/post/{}/delete", post.slug), &[])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    client.cookie = None;
    client.login("admin").await;
    let response = client
        .post(&format!("/post/{}/delete", post.slug), &[])
        .await;
    assert_eq!(location(&response), "/");
    assert_eq!(
        client.get(&format!("/post/{}", post.slug)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn comments_and_replies() {
    let mut client = Client::new();
    let post = client.fixture.posts[0].clone();
    let uri = format!("/post/{}", post.slug);

    let response = client.post(&uri, &[("content", "Anonymous hello")]).await;
    assert!(location(&response).starts_with("/login?next="));

    client.login("bob").await;
    let response = client.post(&uri, &[("content", "Great read")]).await;
    assert_eq!(location(&response), uri);
    let body = text(client.get(&uri).await).await;
    assert!(body.contains("Your comment has been posted!"));
    assert!(body.contains("Great read"));

    let conn = client.pool.get().unwrap();
    let comment = conn
        .query_comments(&quill_core::CommentFilter::for_post(post.id))
        .unwrap()
        .remove(0);
    drop(conn);
    let parent = comment.id.to_string();
    client
        .post(&uri, &[("content", "Agreed"), ("parent_id", parent.as_str())])
        .await;
    let body = text(client.get(&uri).await).await;
    assert!(body.contains("Comments (2)"));

    let response = client.post(&uri, &[("content", "x")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response)
        .await
        .contains("Comment must be between 2 and 1000 characters"));
}

#[tokio::test]
async fn deleting_comments() {
    let mut client = Client::new();
    let post = client.fixture.posts[0].clone();
    let uri = format!("/post/{}", post.slug);
    client.login("bob").await;
    client.post(&uri, &[("content", "Bob was here")]).await;
    let comment = client
        .pool
        .get()
        .unwrap()
        .query_comments(&quill_core::CommentFilter::for_post(post.id))
        .unwrap()
        .remove(0);
    let delete = format!("/comment/{}/delete", comment.id);

    // The post's author may not remove someone else's comment.
    client.cookie = None;
    client.login("alice").await;
    assert_eq!(
        client.post(&delete, &[]).await.status(),
        StatusCode::FORBIDDEN
    );

    client.cookie = None;
    client.login("bob").await;
    let response = client.post(&delete, &[]).await;
    assert_eq!(location(&response), uri);
    let body = text(client.get(&uri).await).await;
    assert!(body.contains("Comment deleted successfully!"));
    assert!(!body.contains("Bob was here"));

    assert_eq!(
        client.post("/comment/9999/delete", &[]).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn json_taxonomy_endpoints() {
    let mut client = Client::new();
    let response = client.post("/tag/add", &[("name", "async")]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    client.login("alice").await;
    let response = client.post("/category/add", &[("name", "Art")]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["name"], "Art");
    assert!(json["id"].is_i64());

    let response = client.post("/category/add", &[("name", "Rust")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["errors"]["name"], "Category already exists.");

    let response = client.post("/tag/add", &[("name", "async")]).await;
    let json: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json["success"], true);
    let tag = client.pool.get().unwrap().find_tag("async").unwrap().unwrap();
    assert_eq!(json["id"], tag.id);
}

#[tokio::test]
async fn profile_update_and_account_deletion() {
    let mut client = Client::new();
    client.login("bob").await;
    let response = client
        .post(
            "/edit-profile",
            &[
                ("username", "alice"),
                ("email", "bob@example.com"),
                ("bio", ""),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("Username is already taken"));

    let response = client
        .post(
            "/edit-profile",
            &[
                ("username", "robert"),
                ("email", "bob@example.com"),
                ("bio", "Cooks things."),
            ],
        )
        .await;
    assert_eq!(location(&response), "/profile");

    let response = client
        .post("/delete-account", &[("password", "not-my-password")])
        .await;
    assert_eq!(location(&response), "/edit-profile");
    let body = text(client.get("/edit-profile").await).await;
    assert!(body.contains("Incorrect password."));

    let response = client
        .post("/delete-account", &[("password", PASSWORD)])
        .await;
    assert_eq!(location(&response), "/");
    let conn = client.pool.get().unwrap();
    assert!(conn.find_user_by_username("robert").unwrap().is_none());
    assert!(conn.get_post(client.fixture.posts[1].id).unwrap().is_none());
}

#[tokio::test]
async fn error_pages_and_headers() {
    let mut client = Client::new();
    let response = client.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
        "DENY"
    );
    assert_eq!(
        response
            .headers()
            .get(header::X_CONTENT_TYPE_OPTIONS)
            .unwrap(),
        "nosniff"
    );
    let body = text(response).await;
    assert!(body.contains("Page Not Found"));

    let response = client.get("/post/no-such-post-1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get("/static/js/main.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains("reply-form-"));
}
