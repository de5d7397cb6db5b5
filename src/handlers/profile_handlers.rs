//! Student and tutor pages. The same handlers serve `/student/...` and
//! `/tutor/...`; the router tags each tree with the role it belongs to.

use crate::auth::dispatch::{home_path, profile_page_access, profile_path, PageAccess};
use crate::auth::middleware::{CurrentUser, AUTH_TIMESTAMP_KEY};
use crate::error::AppError;
use crate::handlers::extract::IdPath;
use crate::handlers::page::{PageContext, SelectOption};
use crate::middleware::csrf::{csrf_token_for_form, validate_csrf_form_field};
use crate::middleware::flash::{flash, FlashLevel};
use crate::models::{
    profile::set_profile_pic, Course, CourseLevel, Location, LocationForm, MyCourseForm,
    Mycourse, PersonalInfoForm, Profile, Role, Student, Tutor, User, COST_RANGES, STATES,
    TRAVEL_DISTANCES,
};
use crate::services::user_service::{ChangePasswordRequest, UserServiceError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Bytes,
    extract::{Form, Multipart, State},
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use serde::Deserialize;
use std::collections::HashMap;
use tower_sessions::Session;

const INVALID_TOKEN_MESSAGE: &str = "Invalid security token. Please refresh the page and try again.";

/// Sidebar shared by every profile page.
pub struct ProfileShell {
    pub base: String,
    pub role_label: String,
    pub username: String,
    pub display_name: String,
    pub picture: String,
    pub active: &'static str,
}

pub struct GuardianSummary {
    pub name: String,
    pub address: String,
    pub phone: String,
}

pub struct ProfileSummary {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
    pub description: String,
    pub guardian: Option<GuardianSummary>,
}

impl ProfileSummary {
    fn from_profile(profile: Option<&Profile>) -> Self {
        let form = PersonalInfoForm::from_profile(profile);
        let ward = if form.ward_no.is_empty() {
            String::new()
        } else {
            format!("Ward {}", form.ward_no)
        };
        let address = [
            ward,
            form.municipality.clone(),
            form.district.clone(),
            form.state.clone(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        let guardian = match profile {
            Some(Profile::Student(_)) => Some(GuardianSummary {
                name: form.guardian_name.clone(),
                address: form.guardian_address.clone(),
                phone: form.guardian_phone.clone(),
            }),
            _ => None,
        };

        Self {
            full_name: form.full_name,
            phone: form.phone,
            address,
            date_of_birth: form.date_of_birth,
            description: form.description,
            guardian,
        }
    }
}

pub struct LocationView {
    pub travel_distance: String,
    pub latitude: String,
    pub longitude: String,
    pub place: String,
}

impl LocationView {
    fn from_location(location: &Location) -> Self {
        Self {
            travel_distance: location.travel_distance.clone().unwrap_or_default(),
            latitude: location.latitude.map(|v| v.to_string()).unwrap_or_default(),
            longitude: location.longitude.map(|v| v.to_string()).unwrap_or_default(),
            place: location.place_details.clone().unwrap_or_default(),
        }
    }

    fn from_form(form: &LocationForm) -> Self {
        Self {
            travel_distance: form.travel_distance.clone(),
            latitude: form.latitude.clone(),
            longitude: form.longitude.clone(),
            place: form.place.clone(),
        }
    }
}

pub struct MyCourseRow {
    pub id: i64,
    pub course_title: String,
    pub level: String,
    pub time: String,
    pub cost: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile/home.html")]
struct ProfileHomeTemplate {
    page: PageContext,
    shell: ProfileShell,
    email: String,
    member_since: String,
    summary: ProfileSummary,
    location: LocationView,
    course_count: i64,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile/mylocation.html")]
struct LocationTemplate {
    page: PageContext,
    shell: ProfileShell,
    csrf_token: String,
    error: Option<String>,
    distances: Vec<SelectOption>,
    location: LocationView,
    google_api_key: String,
    opencage_api_key: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile/personal_info.html")]
struct PersonalInfoTemplate {
    page: PageContext,
    shell: ProfileShell,
    csrf_token: String,
    error: Option<String>,
    form: PersonalInfoForm,
    states: Vec<SelectOption>,
    is_student: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile/account_info.html")]
struct AccountInfoTemplate {
    page: PageContext,
    shell: ProfileShell,
    csrf_token: String,
    email: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile/my_courses.html")]
struct MyCoursesTemplate {
    page: PageContext,
    shell: ProfileShell,
    csrf_token: String,
    error: Option<String>,
    entries: Vec<MyCourseRow>,
    courses: Vec<SelectOption>,
    costs: Vec<SelectOption>,
    time: String,
}

#[derive(Deserialize)]
pub struct AccountInfoForm {
    old_password: String,
    new_password: String,
    new_password_confirm: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnlyForm {
    csrf_token: String,
}

/// Resolve page access, turning anything but a grant into its response.
fn check_access(user: &User, page_role: Role, section: &str) -> Result<Role, Response> {
    match profile_page_access(user, page_role, section) {
        PageAccess::Granted(role) => Ok(role),
        PageAccess::Redirect(to) => Err(Redirect::to(&to).into_response()),
        PageAccess::Forbidden => Err(AppError::Forbidden.into_response()),
        PageAccess::NotFound => Err(AppError::NotFound.into_response()),
    }
}

async fn load_shell(
    state: &AppState,
    user: &User,
    role: Role,
    active: &'static str,
) -> Result<(ProfileShell, Option<Profile>), AppError> {
    let profile = Profile::load(&state.pool, user.id, role).await?;
    let shell = ProfileShell {
        base: format!("/{}", role.as_str()),
        role_label: role.label().to_string(),
        username: user.username.clone(),
        display_name: profile
            .as_ref()
            .and_then(|p| p.full_name())
            .unwrap_or(&user.username)
            .to_string(),
        picture: state.pictures.resolve_profile(role, profile.as_ref()),
        active,
    };
    Ok((shell, profile))
}

macro_rules! granted {
    ($user:expr, $page_role:expr, $section:expr) => {
        match check_access(&$user, $page_role, $section) {
            Ok(role) => role,
            Err(response) => return Ok(response),
        }
    };
}

pub async fn profile_home(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "home");
    let (shell, profile) = load_shell(&state, &user, role, "home").await?;

    let location = Location::get_by_user(&state.pool, user.id)
        .await?
        .unwrap_or_default();
    let course_count = Mycourse::count_for_user(&state.pool, user.id).await?;

    Ok(ProfileHomeTemplate {
        page: PageContext::new(&session, Some(&user)).await,
        shell,
        email: user.email.clone(),
        member_since: user
            .created_at
            .as_deref()
            .and_then(|ts| ts.get(..10))
            .unwrap_or("")
            .to_string(),
        summary: ProfileSummary::from_profile(profile.as_ref()),
        location: LocationView::from_location(&location),
        course_count,
    }
    .into_response())
}

async fn render_location(
    state: &AppState,
    session: &Session,
    user: &User,
    role: Role,
    location: LocationView,
    error: Option<String>,
) -> Result<Response, AppError> {
    let (shell, _) = load_shell(state, user, role, "mylocation").await?;
    Ok(LocationTemplate {
        page: PageContext::new(session, Some(user)).await,
        shell,
        csrf_token: csrf_token_for_form(session).await,
        error,
        distances: SelectOption::plain(&TRAVEL_DISTANCES, Some(location.travel_distance.as_str())),
        location,
        google_api_key: state.config.google_map_api_key.clone().unwrap_or_default(),
        opencage_api_key: state
            .config
            .opencage_geocode_api_key
            .clone()
            .unwrap_or_default(),
    }
    .into_response())
}

pub async fn location_page(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "mylocation");
    let location = Location::get_by_user(&state.pool, user.id)
        .await?
        .unwrap_or_default();
    render_location(
        &state,
        &session,
        &user,
        role,
        LocationView::from_location(&location),
        None,
    )
    .await
}

pub async fn location_update(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<LocationForm>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "mylocation");

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Ok(Redirect::to(&profile_path(role, "mylocation")).into_response());
    }

    let update = match form.validate() {
        Ok(update) => update,
        Err(e) => {
            return render_location(
                &state,
                &session,
                &user,
                role,
                LocationView::from_form(&form),
                Some(e.to_string()),
            )
            .await
        }
    };

    Location::upsert(&state.pool, user.id, &update).await?;
    tracing::info!(user_id = user.id, "Location updated");

    flash(&session, FlashLevel::Success, "Your location has been updated.").await;
    Ok(Redirect::to(&profile_path(role, "mylocation")).into_response())
}

async fn render_personal_info(
    state: &AppState,
    session: &Session,
    user: &User,
    role: Role,
    form: Option<PersonalInfoForm>,
    error: Option<String>,
) -> Result<Response, AppError> {
    let (shell, profile) = load_shell(state, user, role, "personal-info").await?;
    let form = form.unwrap_or_else(|| PersonalInfoForm::from_profile(profile.as_ref()));

    Ok(PersonalInfoTemplate {
        page: PageContext::new(session, Some(user)).await,
        shell,
        csrf_token: csrf_token_for_form(session).await,
        error,
        states: SelectOption::plain(&STATES, Some(form.state.as_str())),
        form,
        is_student: role == Role::Student,
    }
    .into_response())
}

pub async fn personal_info_page(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "personal-info");
    render_personal_info(&state, &session, &user, role, None, None).await
}

/// Multipart submission: text fields plus an optional `profile_pic` file.
pub async fn personal_info_update(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "personal-info");

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();
        if name == "profile_pic" {
            let filename = field.file_name().map(str::to_string).unwrap_or_default();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            if !filename.is_empty() && !data.is_empty() {
                upload = Some((filename, data));
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            fields.insert(name, text);
        }
    }

    let csrf_token = fields.get("csrf_token").map(String::as_str).unwrap_or("");
    if validate_csrf_form_field(&session, csrf_token).await.is_err() {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Ok(Redirect::to(&profile_path(role, "personal-info")).into_response());
    }

    let form = PersonalInfoForm::from_fields(&fields);
    let today = chrono::Utc::now().date_naive();
    let (details, guardian) = match form.validate(role, today) {
        Ok(valid) => valid,
        Err(e) => {
            return render_personal_info(&state, &session, &user, role, Some(form), Some(e.to_string()))
                .await
        }
    };

    if let Some((filename, data)) = upload {
        let previous = Profile::load(&state.pool, user.id, role)
            .await?
            .and_then(|p| p.profile_pic().map(str::to_string));

        let store = state.pictures.clone();
        let saved = tokio::task::spawn_blocking(move || store.save_thumbnail(&filename, &data))
            .await
            .map_err(|e| AppError::Internal(format!("thumbnail task failed: {}", e)))?;

        match saved {
            Ok(new_name) => {
                set_profile_pic(&state.pool, role, user.id, Some(&new_name)).await?;
                if let Some(old) = previous {
                    if let Err(e) = state.pictures.delete(&old) {
                        tracing::warn!(user_id = user.id, "Could not remove old picture {}: {}", old, e);
                    }
                }
            }
            Err(e) => {
                return render_personal_info(
                    &state,
                    &session,
                    &user,
                    role,
                    Some(form),
                    Some(e.to_string()),
                )
                .await
            }
        }
    }

    match role {
        Role::Student => Student::upsert_details(&state.pool, user.id, &details, &guardian).await?,
        Role::Tutor => Tutor::upsert_details(&state.pool, user.id, &details).await?,
        Role::Admin => return Err(AppError::Forbidden),
    }
    tracing::info!(user_id = user.id, "Personal information updated");

    flash(
        &session,
        FlashLevel::Success,
        "Your personal information has been updated.",
    )
    .await;
    Ok(Redirect::to(&profile_path(role, "personal-info")).into_response())
}

pub async fn account_info_page(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "account-info");
    let (shell, _) = load_shell(&state, &user, role, "account-info").await?;

    Ok(AccountInfoTemplate {
        page: PageContext::new(&session, Some(&user)).await,
        shell,
        csrf_token: csrf_token_for_form(&session).await,
        email: user.email.clone(),
    }
    .into_response())
}

pub async fn account_info_update(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<AccountInfoForm>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "account-info");
    let back = profile_path(role, "account-info");

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Ok(Redirect::to(&back).into_response());
    }

    let request = ChangePasswordRequest {
        user_id: user.id,
        old_password: form.old_password,
        new_password: form.new_password,
        new_password_confirm: form.new_password_confirm,
    };

    let message = match state.user_service.change_password(request).await {
        Ok(()) => {
            session
                .insert(AUTH_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
                .await?;
            tracing::info!(user_id = user.id, "Password changed");
            flash(&session, FlashLevel::Success, "Successfully changed password!").await;
            return Ok(Redirect::to(home_path(role)).into_response());
        }
        Err(UserServiceError::WrongPassword) => "Wrong password!",
        Err(UserServiceError::WeakPassword) => "Password must be at least 8 characters",
        Err(UserServiceError::PasswordMismatch) => "Passwords do not match",
        Err(e) => {
            tracing::error!(user_id = user.id, "Password change failed: {}", e);
            "Failed to update password"
        }
    };

    flash(&session, FlashLevel::Danger, message).await;
    Ok(Redirect::to(&back).into_response())
}

async fn render_my_courses(
    state: &AppState,
    session: &Session,
    user: &User,
    role: Role,
    submitted: Option<&MyCourseForm>,
    error: Option<String>,
) -> Result<Response, AppError> {
    let (shell, _) = load_shell(state, user, role, "my-courses").await?;

    let entries = Mycourse::list_for_user(&state.pool, user.id)
        .await?
        .into_iter()
        .map(|entry| MyCourseRow {
            id: entry.id,
            level: CourseLevel::parse(&entry.course_level)
                .map(|level| level.label().to_string())
                .unwrap_or(entry.course_level),
            course_title: entry.course_title,
            time: entry.time,
            cost: entry.cost,
        })
        .collect();

    let catalog = Course::list_all(&state.pool).await?;
    let selected_course = submitted.map(|f| f.course_id.as_str());
    let courses = catalog
        .iter()
        .map(|course| {
            let value = course.id.to_string();
            SelectOption {
                selected: selected_course == Some(value.as_str()),
                label: format!("{} ({})", course.course_title, course.level_label()),
                value,
            }
        })
        .collect();

    Ok(MyCoursesTemplate {
        page: PageContext::new(session, Some(user)).await,
        shell,
        csrf_token: csrf_token_for_form(session).await,
        error,
        entries,
        courses,
        costs: SelectOption::plain(&COST_RANGES, submitted.map(|f| f.cost.as_str())),
        time: submitted.map(|f| f.time.clone()).unwrap_or_default(),
    }
    .into_response())
}

pub async fn my_courses_page(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "my-courses");
    render_my_courses(&state, &session, &user, role, None, None).await
}

pub async fn my_courses_add(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<MyCourseForm>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "my-courses");

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Ok(Redirect::to(&profile_path(role, "my-courses")).into_response());
    }

    let enrollment = match form.validate() {
        Ok(enrollment) => enrollment,
        Err(e) => {
            return render_my_courses(&state, &session, &user, role, Some(&form), Some(e.to_string()))
                .await
        }
    };

    if Course::get_by_id(&state.pool, enrollment.course_id)
        .await?
        .is_none()
    {
        return render_my_courses(
            &state,
            &session,
            &user,
            role,
            Some(&form),
            Some("Please choose a course".to_string()),
        )
        .await;
    }

    let id = Mycourse::create(&state.pool, user.id, &enrollment).await?;
    tracing::info!(user_id = user.id, mycourse_id = id, "Course added");

    flash(&session, FlashLevel::Success, "Course added.").await;
    Ok(Redirect::to(&profile_path(role, "my-courses")).into_response())
}

pub async fn my_courses_delete(
    State(state): State<AppState>,
    session: Session,
    Extension(page_role): Extension<Role>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    IdPath(id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    let role = granted!(user, page_role, "my-courses");

    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        flash(&session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
        return Ok(Redirect::to(&profile_path(role, "my-courses")).into_response());
    }

    if !Mycourse::delete_owned(&state.pool, id, user.id).await? {
        return Err(AppError::NotFound);
    }

    flash(&session, FlashLevel::Success, "Course removed.").await;
    Ok(Redirect::to(&profile_path(role, "my-courses")).into_response())
}
