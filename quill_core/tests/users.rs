use pretty_assertions::assert_eq;
use quill_core::actions;
use quill_core::db::{Connection, ConnectionMethods};
use quill_core::forms::{DeleteAccountForm, EditProfileForm, LoginForm, RegisterForm};
use quill_core::models::{now, NewUser};
use quill_core::{CommentFilter, Error, PostFilter};
use quill_test_helper::*;

fn register_form(username: &str, email: &str) -> RegisterForm {
    RegisterForm {
        username: username.to_string(),
        email: email.to_string(),
        password: "s3cret-pass".to_string(),
        confirm_password: "s3cret-pass".to_string(),
        bio: String::new(),
    }
}

fn login(email: &str, password: &str) -> LoginForm {
    LoginForm {
        email: email.to_string(),
        password: password.to_string(),
        remember_me: None,
    }
}

fn register_then_login(conn: Connection) {
    let user = actions::register(&conn, &register_form("carol", "carol@example.com")).unwrap();
    assert!(!user.is_admin);
    assert_eq!(user.bio, None);
    assert_ne!(user.password_hash, "s3cret-pass");

    let logged_in = actions::authenticate(&conn, &login("carol@example.com", "s3cret-pass")).unwrap();
    assert_eq!(logged_in.id, user.id);
    assert!(logged_in.last_login >= user.joined_at);
    let stored = conn.get_user(user.id).unwrap().unwrap();
    assert_eq!(stored.last_login, logged_in.last_login);
}
testall!(register_then_login);

fn wrong_password_rejected(conn: Connection) {
    actions::register(&conn, &register_form("carol", "carol@example.com")).unwrap();
    assert!(matches!(
        actions::authenticate(&conn, &login("carol@example.com", "not-the-password")),
        Err(Error::InvalidCredentials)
    ));
    assert!(matches!(
        actions::authenticate(&conn, &login("nobody@example.com", "s3cret-pass")),
        Err(Error::InvalidCredentials)
    ));
}
testall!(wrong_password_rejected);

fn duplicate_username_rejected(conn: Connection) {
    actions::register(&conn, &register_form("carol", "carol@example.com")).unwrap();
    let Err(Error::Validation(errors)) =
        actions::register(&conn, &register_form("carol", "other@example.com"))
    else {
        panic!("expected a validation failure");
    };
    assert_eq!(
        errors.get("username"),
        Some("Username is already taken. Please choose a different one.")
    );
    assert!(!errors.contains("email"));
    assert_eq!(conn.users().unwrap().len(), 1);
}
testall!(duplicate_username_rejected);

fn duplicate_email_rejected(conn: Connection) {
    actions::register(&conn, &register_form("carol", "carol@example.com")).unwrap();
    let Err(Error::Validation(errors)) =
        actions::register(&conn, &register_form("dave", "carol@example.com"))
    else {
        panic!("expected a validation failure");
    };
    assert_eq!(
        errors.get("email"),
        Some("Email is already registered. Please use a different one.")
    );
}
testall!(duplicate_email_rejected);

fn mismatched_confirmation(conn: Connection) {
    let mut form = register_form("carol", "carol@example.com");
    form.confirm_password = "something-else".to_string();
    let Err(Error::Validation(errors)) = actions::register(&conn, &form) else {
        panic!("expected a validation failure");
    };
    assert_eq!(errors.get("confirm_password"), Some("Passwords must match"));
}
testall!(mismatched_confirmation);

fn profile_update(conn: Connection) {
    let fixture = seed_blog(&conn);
    let form = EditProfileForm {
        username: "alicia".to_string(),
        email: "alice@example.com".to_string(),
        bio: "Writes about lifetimes.".to_string(),
    };
    let updated = actions::update_profile(&conn, &fixture.alice, &form).unwrap();
    assert_eq!(updated.username, "alicia");
    assert_eq!(
        conn.get_user(fixture.alice.id).unwrap().unwrap().bio.as_deref(),
        Some("Writes about lifetimes.")
    );

    let taken = EditProfileForm {
        username: "bob".to_string(),
        ..form
    };
    let Err(Error::Validation(errors)) = actions::update_profile(&conn, &updated, &taken) else {
        panic!("expected a validation failure");
    };
    assert!(errors.contains("username"));
}
testall!(profile_update);

fn delete_account_cascades(conn: Connection) {
    let fixture = seed_blog(&conn);
    let bobs_post = fixture
        .posts
        .iter()
        .find(|p| p.author_id == fixture.bob.id)
        .unwrap();
    let alices_post = &fixture.posts[0];
    let comment = actions::add_comment(
        &conn,
        &fixture.alice,
        bobs_post,
        &quill_core::forms::CommentForm {
            content: "Lovely recipe".to_string(),
            parent_id: String::new(),
        },
    )
    .unwrap();
    let bobs_reply_on_alices_post = actions::add_comment(
        &conn,
        &fixture.bob,
        alices_post,
        &quill_core::forms::CommentForm {
            content: "Thanks for this".to_string(),
            parent_id: String::new(),
        },
    )
    .unwrap();

    let form = DeleteAccountForm {
        password: PASSWORD.to_string(),
    };
    actions::delete_account(&conn, &fixture.alice, &form).unwrap();

    assert_eq!(conn.get_user(fixture.alice.id).unwrap(), None);
    let remaining = conn
        .count_posts(&PostFilter::new().with_author(fixture.alice.id))
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(conn.get_post(fixture.draft.id).unwrap(), None);
    assert_eq!(conn.get_comment(comment.id).unwrap(), None);
    assert_eq!(conn.get_comment(bobs_reply_on_alices_post.id).unwrap(), None);
    assert!(conn
        .query_comments(&CommentFilter::by_author(fixture.alice.id))
        .unwrap()
        .is_empty());
    assert_eq!(conn.count_posts(&PostFilter::new()).unwrap(), 3);
}
testall!(delete_account_cascades);

fn delete_account_needs_password(conn: Connection) {
    let fixture = seed_blog(&conn);
    let form = DeleteAccountForm {
        password: "wrong-password".to_string(),
    };
    let Err(Error::Validation(errors)) = actions::delete_account(&conn, &fixture.bob, &form) else {
        panic!("expected a validation failure");
    };
    assert_eq!(errors.get("password"), Some("Incorrect password."));
    assert!(conn.get_user(fixture.bob.id).unwrap().is_some());
}
testall!(delete_account_needs_password);

fn grant_admin(conn: Connection) {
    let fixture = seed_blog(&conn);
    let bob = actions::set_admin(&conn, "bob", true).unwrap();
    assert!(bob.is_admin);
    assert!(conn.get_user(fixture.bob.id).unwrap().unwrap().is_admin);
    assert!(matches!(
        actions::set_admin(&conn, "nobody", true),
        Err(Error::NoSuchObject)
    ));
}
testall!(grant_admin);

fn missing_user_update_fails(conn: Connection) {
    let mut user = create_user(&conn, "carol", false);
    conn.delete_user(user.id).unwrap();
    user.bio = Some("gone".to_string());
    assert!(matches!(conn.update_user(&user), Err(Error::NoSuchObject)));
    assert!(matches!(conn.delete_user(user.id), Err(Error::NoSuchObject)));
}
testall!(missing_user_update_fails);

fn unique_username_enforced_by_schema(conn: Connection) {
    create_user(&conn, "carol", false);
    let duplicate = NewUser {
        username: "carol".to_string(),
        email: "second@example.com".to_string(),
        password_hash: "x".to_string(),
        bio: None,
        joined_at: now(),
        is_admin: false,
    };
    assert!(matches!(
        conn.insert_user(&duplicate),
        Err(Error::UniqueViolation(_))
    ));
}
testsqlite!(unique_username_enforced_by_schema);
