//! Registration, sign-in and account management.

use axum::extract::{Form, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use quill_core::forms::{DeleteAccountForm, EditProfileForm, LoginForm, RegisterForm};
use quill_core::{actions, Error, FormErrors};
use serde::Deserialize;
use tower_sessions::Session;

use super::render;
use crate::error::AppError;
use crate::session::{flash, log_in, log_out, login_url, safe_next, AuthUser, CurrentUser};
use crate::state::AppState;
use crate::templates::{EditProfileTemplate, LoginTemplate, RegisterTemplate};
use crate::views::BaseContext;

/// `?next=` on the login page.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

impl NextQuery {
    fn action(&self) -> Result<String, AppError> {
        match &self.next {
            Some(next) => login_url(next),
            None => Ok("/login".to_string()),
        }
    }
}

async fn login_form(
    session: &Session,
    query: &NextQuery,
    form: LoginForm,
    errors: FormErrors,
) -> Result<Response, AppError> {
    let template = LoginTemplate {
        ctx: BaseContext::load(session, None).await?,
        title: "Sign In".to_string(),
        action: query.action()?,
        form: LoginForm {
            password: String::new(),
            ..form
        },
        errors,
    };
    Ok(render(template)?.into_response())
}

pub async fn login_page(
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    login_form(&session, &query, LoginForm::default(), FormErrors::new()).await
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let attempt = form.clone();
    match state
        .with_conn(move |conn| actions::authenticate(conn, &attempt))
        .await
    {
        Ok(user) => {
            log_in(&session, &user, form.remember()).await?;
            flash(&session, "success", "You have been logged in successfully!").await?;
            Ok(Redirect::to(safe_next(query.next.as_deref())).into_response())
        }
        Err(AppError::Core(Error::InvalidCredentials)) => {
            flash(&session, "danger", "Invalid email or password").await?;
            Ok(Redirect::to(&query.action()?).into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => {
            login_form(&session, &query, form, errors).await
        }
        Err(e) => Err(e),
    }
}

async fn register_form(
    session: &Session,
    form: RegisterForm,
    errors: FormErrors,
) -> Result<Response, AppError> {
    let template = RegisterTemplate {
        ctx: BaseContext::load(session, None).await?,
        title: "Register".to_string(),
        form: RegisterForm {
            password: String::new(),
            confirm_password: String::new(),
            ..form
        },
        errors,
    };
    Ok(render(template)?.into_response())
}

pub async fn register_page(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    register_form(&session, RegisterForm::default(), FormErrors::new()).await
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let submitted = form.clone();
    match state
        .with_conn(move |conn| actions::register(conn, &submitted))
        .await
    {
        Ok(_) => {
            flash(
                &session,
                "success",
                "Your account has been created! You can now login.",
            )
            .await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => {
            register_form(&session, form, errors).await
        }
        // Lost a race with a concurrent registration of the same name.
        Err(AppError::Core(Error::UniqueViolation(_))) => {
            flash(
                &session,
                "danger",
                "Username or email already exists. Please choose a different one.",
            )
            .await?;
            Ok(Redirect::to("/register").into_response())
        }
        Err(e) => Err(e),
    }
}

pub async fn logout(session: Session, AuthUser(user): AuthUser) -> Result<Response, AppError> {
    log_out(&session).await?;
    log::info!("user {} signed out", user.username);
    flash(&session, "info", "You have been logged out.").await?;
    Ok(Redirect::to("/").into_response())
}

async fn profile_form(
    session: &Session,
    user: quill_core::User,
    form: EditProfileForm,
    errors: FormErrors,
) -> Result<Response, AppError> {
    let template = EditProfileTemplate {
        ctx: BaseContext::load(session, Some(user)).await?,
        title: "Edit Profile".to_string(),
        form,
        errors,
    };
    Ok(render(template)?.into_response())
}

pub async fn edit_profile_page(
    session: Session,
    AuthUser(user): AuthUser,
) -> Result<Response, AppError> {
    let form = EditProfileForm::from_user(&user);
    profile_form(&session, user, form, FormErrors::new()).await
}

pub async fn edit_profile(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, AppError> {
    let (current, submitted) = (user.clone(), form.clone());
    match state
        .with_conn(move |conn| actions::update_profile(conn, &current, &submitted))
        .await
    {
        Ok(_) => {
            flash(&session, "success", "Your profile has been updated!").await?;
            Ok(Redirect::to("/profile").into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => {
            profile_form(&session, user, form, errors).await
        }
        Err(e) => Err(e),
    }
}

pub async fn delete_account(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Form(form): Form<DeleteAccountForm>,
) -> Result<Response, AppError> {
    let username = user.username.clone();
    match state
        .with_conn(move |conn| actions::delete_account(conn, &user, &form))
        .await
    {
        Ok(()) => {
            log_out(&session).await?;
            log::info!("user {username} deleted their account");
            flash(&session, "info", "Your account has been deleted.").await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Core(Error::Validation(errors))) => {
            let message = errors.get("password").unwrap_or("Incorrect password.");
            flash(&session, "danger", message).await?;
            Ok(Redirect::to("/edit-profile").into_response())
        }
        Err(e) => Err(e),
    }
}
