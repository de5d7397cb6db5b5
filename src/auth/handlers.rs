use crate::auth::dispatch::dispatch;
use crate::auth::middleware::{clear_identity, current_user, AUTH_TIMESTAMP_KEY, USER_ID_KEY};
use crate::error::AppError;
use crate::handlers::page::{PageContext, SelectOption};
use crate::middleware::csrf::{csrf_token_for_form, validate_csrf_form_field};
use crate::middleware::flash::{flash, FlashLevel};
use crate::models::{Role, User};
use crate::services::{
    auth_service::{AuthServiceError, LoginRequest},
    password_reset_service::PasswordResetError,
    user_service::{CreateUserRequest, UserServiceError},
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

const INVALID_TOKEN_MESSAGE: &str = "Invalid security token. Please refresh the page and try again.";

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    page: PageContext,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
struct RegisterTemplate {
    page: PageContext,
    csrf_token: String,
    error: Option<String>,
    username: String,
    email: String,
    phone: String,
    roles: Vec<SelectOption>,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_request.html")]
struct ResetRequestTemplate {
    page: PageContext,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset.html")]
struct ResetTemplate {
    page: PageContext,
    csrf_token: String,
    token: String,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    remember_me: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    username: String,
    email: String,
    password: String,
    password_confirm: String,
    role: String,
    phone: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetRequestForm {
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetForm {
    password: String,
    password_confirm: String,
    csrf_token: String,
}

/// Redirect a signed-in user to the home page of their role.
pub fn redirect_home(user: &User) -> Response {
    match dispatch(user) {
        Ok(path) => Redirect::to(path).into_response(),
        Err(e) => {
            tracing::warn!(user_id = user.id, "Cannot dispatch user: {}", e);
            AppError::NotFound.into_response()
        }
    }
}

fn registrable_roles(current: Option<&str>) -> Vec<SelectOption> {
    SelectOption::list(
        [Role::Student, Role::Tutor].map(|r| (r.as_str(), r.label())),
        current,
    )
}

pub async fn login_page(State(state): State<AppState>, session: Session) -> Response {
    if let Some(user) = current_user(&state, &session).await {
        return redirect_home(&user);
    }

    LoginTemplate {
        page: PageContext::new(&session, None).await,
        csrf_token: csrf_token_for_form(&session).await,
    }
    .into_response()
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Redirect::to("/login").into_response();
    }

    let request = LoginRequest {
        email: form.email,
        password: form.password,
    };

    let user = match state.auth_service.authenticate(request).await {
        Ok(user) => user,
        Err(AuthServiceError::InvalidCredentials) | Err(AuthServiceError::UserNotFound) => {
            flash(&session, FlashLevel::Danger, "Invalid email or password").await;
            return Redirect::to("/login").into_response();
        }
        Err(AuthServiceError::RepositoryError(e)) => {
            tracing::error!("Login failed: {}", e);
            flash(&session, FlashLevel::Danger, "An error occurred. Please try again.").await;
            return Redirect::to("/login").into_response();
        }
    };

    // New identity, new session id
    if let Err(e) = session.cycle_id().await {
        return AppError::from(e).into_response();
    }
    if let Err(e) = session.insert(USER_ID_KEY, user.id).await {
        return AppError::from(e).into_response();
    }
    if let Err(e) = session
        .insert(AUTH_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
        .await
    {
        return AppError::from(e).into_response();
    }

    session.set_expiry(Some(
        state.config.session.login_expiry(form.remember_me.is_some()),
    ));

    tracing::info!(user_id = user.id, "User logged in");
    flash(&session, FlashLevel::Success, "Successfully logged in.").await;
    redirect_home(&user)
}

pub async fn register_page(State(state): State<AppState>, session: Session) -> Response {
    if let Some(user) = current_user(&state, &session).await {
        return redirect_home(&user);
    }

    RegisterTemplate {
        page: PageContext::new(&session, None).await,
        csrf_token: csrf_token_for_form(&session).await,
        error: None,
        username: String::new(),
        email: String::new(),
        phone: String::new(),
        roles: registrable_roles(None),
    }
    .into_response()
}

async fn register_error(session: &Session, form: &RegisterForm, msg: &str) -> Response {
    RegisterTemplate {
        page: PageContext::new(session, None).await,
        csrf_token: csrf_token_for_form(session).await,
        error: Some(msg.to_string()),
        username: form.username.clone(),
        email: form.email.clone(),
        phone: form.phone.clone(),
        roles: registrable_roles(Some(form.role.as_str())),
    }
    .into_response()
}

pub async fn register_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Some(user) = current_user(&state, &session).await {
        return redirect_home(&user);
    }

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return register_error(&session, &form, INVALID_TOKEN_MESSAGE).await;
    }

    let role = match form.role.parse::<Role>() {
        Ok(role) if role.has_profile() => role,
        _ => return register_error(&session, &form, "Please register as a student or a tutor").await,
    };

    if form.phone.trim().is_empty() {
        return register_error(&session, &form, "Phone number is required").await;
    }

    let request = CreateUserRequest {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
        password_confirm: Some(form.password_confirm.clone()),
        role,
        phone: Some(form.phone.clone()),
    };

    match state.user_service.create_user(request).await {
        Ok(_) => {
            flash(
                &session,
                FlashLevel::Success,
                "Your account was created. You can now Login!",
            )
            .await;
            Redirect::to("/login").into_response()
        }
        Err(err) => {
            let error_msg = match err {
                UserServiceError::InvalidEmail => "Please enter a valid email address",
                UserServiceError::InvalidUsername => {
                    "Username must be 3-64 letters, digits, '.', '-' or '_'"
                }
                UserServiceError::InvalidPhone => "Please enter a valid phone number",
                UserServiceError::WeakPassword => "Password must be at least 8 characters",
                UserServiceError::PasswordMismatch => "Passwords do not match",
                UserServiceError::UsernameTaken => {
                    "That username is taken. Please choose a different one."
                }
                UserServiceError::EmailTaken => {
                    "That email is already registered. Please choose a different one."
                }
                _ => "Registration failed. Please try again.",
            };
            register_error(&session, &form, error_msg).await
        }
    }
}

pub async fn logout_handler(session: Session) -> Response {
    clear_identity(&session).await;
    if let Err(e) = session.cycle_id().await {
        tracing::warn!("Failed to cycle session id on logout: {}", e);
    }
    flash(
        &session,
        FlashLevel::Success,
        "You are now logged out. Log in to continue!",
    )
    .await;
    Redirect::to("/login").into_response()
}

pub async fn password_reset_page(session: Session) -> Response {
    ResetRequestTemplate {
        page: PageContext::new(&session, None).await,
        csrf_token: csrf_token_for_form(&session).await,
    }
    .into_response()
}

pub async fn password_reset_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ResetRequestForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Redirect::to("/password-reset").into_response();
    }

    // Same answer whether or not the account exists
    if let Err(e) = state
        .password_reset_service
        .request_reset(form.email.trim())
        .await
    {
        tracing::error!("Password reset request failed: {}", e);
    }

    flash(
        &session,
        FlashLevel::Info,
        "If an account exists for that email, a password reset link has been sent.",
    )
    .await;
    Redirect::to("/login").into_response()
}

async fn reject_token(session: &Session, err: PasswordResetError) -> Response {
    let msg = match err {
        PasswordResetError::TokenExpired => "That reset link has expired. Please request a new one.",
        PasswordResetError::TokenAlreadyUsed => "That reset link was already used.",
        PasswordResetError::TokenNotFound => "That reset link is invalid.",
        other => {
            tracing::error!("Password reset failed: {}", other);
            "Could not reset your password. Please try again."
        }
    };
    flash(session, FlashLevel::Danger, msg).await;
    Redirect::to("/password-reset").into_response()
}

pub async fn reset_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    if let Err(e) = state.password_reset_service.validate_token(&token).await {
        return reject_token(&session, e).await;
    }

    ResetTemplate {
        page: PageContext::new(&session, None).await,
        csrf_token: csrf_token_for_form(&session).await,
        token,
        error: None,
    }
    .into_response()
}

pub async fn reset_handler(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetForm>,
) -> Response {
    let render_error = |msg: &'static str| {
        let session = session.clone();
        let token = token.clone();
        async move {
            ResetTemplate {
                page: PageContext::new(&session, None).await,
                csrf_token: csrf_token_for_form(&session).await,
                token,
                error: Some(msg.to_string()),
            }
            .into_response()
        }
    };

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return render_error(INVALID_TOKEN_MESSAGE).await;
    }

    match state
        .password_reset_service
        .reset_password(&token, &form.password, &form.password_confirm)
        .await
    {
        Ok(_) => {
            flash(
                &session,
                FlashLevel::Success,
                "Your password has been updated. You can now log in.",
            )
            .await;
            Redirect::to("/login").into_response()
        }
        Err(PasswordResetError::UserServiceError(UserServiceError::WeakPassword)) => {
            render_error("Password must be at least 8 characters").await
        }
        Err(PasswordResetError::UserServiceError(UserServiceError::PasswordMismatch)) => {
            render_error("Passwords do not match").await
        }
        Err(e) => reject_token(&session, e).await,
    }
}
