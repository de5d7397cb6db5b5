//! Admin back office. One explicit set of handlers per entity; the router
//! wraps the whole tree in `require_admin`.

use crate::auth::middleware::CurrentUser;
use crate::error::AppError;
use crate::handlers::course_handlers::CourseRow;
use crate::handlers::extract::IdPath;
use crate::handlers::page::{PageContext, SelectOption};
use crate::handlers::not_found_handler;
use crate::middleware::csrf::{csrf_token_for_form, validate_csrf_form_field};
use crate::middleware::flash::{flash, FlashLevel};
use crate::models::{Course, CourseForm, CourseLevel, Location, Profile, Role, Student, Tutor, User};
use crate::repositories::UserFilter;
use crate::services::{PictureError, PictureFile, UserServiceError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use sqlx::{FromRow, SqlitePool};
use tower_sessions::Session;

const INVALID_TOKEN_MESSAGE: &str = "Invalid security token. Please refresh the page and try again.";
const USERS_PER_PAGE: i64 = 50;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_index))
        .route("/users", get(list_users))
        .route("/users/{id}/delete", post(delete_user))
        .route("/students", get(list_students))
        .route("/students/{id}/delete", post(delete_student))
        .route("/tutors", get(list_tutors))
        .route("/tutors/{id}/delete", post(delete_tutor))
        .route("/locations", get(list_locations))
        .route("/locations/{id}/delete", post(delete_location))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/new", get(new_course_page))
        .route("/courses/{id}/edit", get(edit_course_page))
        .route("/courses/{id}", post(update_course))
        .route("/courses/{id}/delete", post(delete_course))
        .route("/pictures", get(list_pictures).post(upload_picture))
        .route("/pictures/{name}/delete", post(delete_picture))
        .fallback(not_found_handler)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct EntityCounts {
    pub users: i64,
    pub students: i64,
    pub tutors: i64,
    pub locations: i64,
    pub courses: i64,
    pub mycourses: i64,
}

impl EntityCounts {
    pub async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EntityCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM students) AS students,
                (SELECT COUNT(*) FROM tutors) AS tutors,
                (SELECT COUNT(*) FROM locations) AS locations,
                (SELECT COUNT(*) FROM courses) AS courses,
                (SELECT COUNT(*) FROM mycourses) AS mycourses
            "#,
        )
        .fetch_one(pool)
        .await
    }
}

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at.unwrap_or_default(),
        }
    }
}

pub struct StudentRow {
    pub user_id: i64,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub guardian_name: String,
    pub guardian_phone: String,
}

pub struct TutorRow {
    pub user_id: i64,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub description: String,
}

pub struct LocationRow {
    pub user_id: i64,
    pub travel_distance: String,
    pub coordinates: String,
    pub place: String,
}

fn short_address(state: &Option<String>, district: &Option<String>) -> String {
    [district.as_deref(), state.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/index.html")]
struct AdminIndexTemplate {
    page: PageContext,
    counts: EntityCounts,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
struct UsersTemplate {
    page: PageContext,
    csrf_token: String,
    users: Vec<UserRow>,
    search: String,
    roles: Vec<SelectOption>,
    page_number: i64,
    has_next: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/students.html")]
struct StudentsTemplate {
    page: PageContext,
    csrf_token: String,
    students: Vec<StudentRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/tutors.html")]
struct TutorsTemplate {
    page: PageContext,
    csrf_token: String,
    tutors: Vec<TutorRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/locations.html")]
struct LocationsTemplate {
    page: PageContext,
    csrf_token: String,
    locations: Vec<LocationRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/courses.html")]
struct CoursesTemplate {
    page: PageContext,
    csrf_token: String,
    courses: Vec<CourseRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/course_form.html")]
struct CourseFormTemplate {
    page: PageContext,
    csrf_token: String,
    heading: String,
    action: String,
    error: Option<String>,
    title: String,
    description: String,
    levels: Vec<SelectOption>,
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/pictures.html")]
struct PicturesTemplate {
    page: PageContext,
    csrf_token: String,
    pictures: Vec<PictureFile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    search: Option<String>,
    role: Option<String>,
    page: Option<i64>,
}

#[derive(Deserialize)]
pub struct CsrfOnlyForm {
    csrf_token: String,
}

/// Validate the form token, flashing and redirecting to `back` on failure.
async fn check_token(session: &Session, token: &str, back: &str) -> Option<Response> {
    match validate_csrf_form_field(session, token).await {
        Ok(()) => None,
        Err(_) => {
            flash(session, FlashLevel::Danger, INVALID_TOKEN_MESSAGE).await;
            Some(Redirect::to(back).into_response())
        }
    }
}

pub async fn admin_index(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let counts = EntityCounts::load(&state.pool).await?;

    Ok(AdminIndexTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        counts,
    }
    .into_response())
}

pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Query(query): Query<UserQuery>,
) -> Result<Response, AppError> {
    let role = query
        .role
        .as_deref()
        .filter(|r| !r.is_empty())
        .and_then(|r| r.parse::<Role>().ok());
    let page_number = query.page.unwrap_or(0).max(0);
    let search = query.search.unwrap_or_default();

    let filter = UserFilter {
        search: Some(search.clone()),
        role,
        // One extra row tells whether a next page exists
        limit: Some(USERS_PER_PAGE + 1),
        offset: Some(page_number.saturating_mul(USERS_PER_PAGE)),
    };

    let mut users = state
        .user_service
        .list_users(&filter)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let has_next = users.len() as i64 > USERS_PER_PAGE;
    users.truncate(USERS_PER_PAGE as usize);

    Ok(UsersTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        users: users.into_iter().map(UserRow::from).collect(),
        search,
        roles: SelectOption::list(
            Role::ALL.map(|r| (r.as_str(), r.label())),
            role.map(|r| r.as_str()),
        ),
        page_number,
        has_next,
    }
    .into_response())
}

pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    IdPath(id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/users").await {
        return Ok(rejected);
    }

    if id == admin.id {
        flash(&session, FlashLevel::Danger, "You cannot delete your own account.").await;
        return Ok(Redirect::to("/admin/users").into_response());
    }

    let picture = match state.user_service.find_user_by_id(id).await {
        Ok(Some(user)) => match user.role() {
            Ok(role) if role.has_profile() => Profile::load(&state.pool, id, role)
                .await?
                .and_then(|p| p.profile_pic().map(str::to_string)),
            _ => None,
        },
        Ok(None) => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    match state.user_service.delete_user(id).await {
        Ok(()) => {}
        Err(UserServiceError::UserNotFound) => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Internal(e.to_string())),
    }

    if let Some(name) = picture {
        if let Err(e) = state.pictures.delete(&name) {
            tracing::warn!(user_id = id, "Could not remove picture {}: {}", name, e);
        }
    }

    tracing::info!(admin_id = admin.id, user_id = id, "Admin deleted user");
    flash(&session, FlashLevel::Success, "User deleted.").await;
    Ok(Redirect::to("/admin/users").into_response())
}

pub async fn list_students(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let students = Student::list_all(&state.pool)
        .await?
        .into_iter()
        .map(|s| StudentRow {
            user_id: s.user_id,
            address: short_address(&s.state, &s.district),
            full_name: s.full_name.unwrap_or_default(),
            phone: s.phone.unwrap_or_default(),
            guardian_name: s.guardian_name.unwrap_or_default(),
            guardian_phone: s.guardian_phone.unwrap_or_default(),
        })
        .collect();

    Ok(StudentsTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        students,
    }
    .into_response())
}

pub async fn delete_student(
    State(state): State<AppState>,
    session: Session,
    IdPath(user_id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/students").await {
        return Ok(rejected);
    }

    if !Student::delete(&state.pool, user_id).await? {
        return Err(AppError::NotFound);
    }

    flash(&session, FlashLevel::Success, "Student record deleted.").await;
    Ok(Redirect::to("/admin/students").into_response())
}

pub async fn list_tutors(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let tutors = Tutor::list_all(&state.pool)
        .await?
        .into_iter()
        .map(|t| TutorRow {
            user_id: t.user_id,
            address: short_address(&t.state, &t.district),
            full_name: t.full_name.unwrap_or_default(),
            phone: t.phone.unwrap_or_default(),
            description: t.description.unwrap_or_default(),
        })
        .collect();

    Ok(TutorsTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        tutors,
    }
    .into_response())
}

pub async fn delete_tutor(
    State(state): State<AppState>,
    session: Session,
    IdPath(user_id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/tutors").await {
        return Ok(rejected);
    }

    if !Tutor::delete(&state.pool, user_id).await? {
        return Err(AppError::NotFound);
    }

    flash(&session, FlashLevel::Success, "Tutor record deleted.").await;
    Ok(Redirect::to("/admin/tutors").into_response())
}

pub async fn list_locations(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let locations = Location::list_all(&state.pool)
        .await?
        .into_iter()
        .map(|l| LocationRow {
            user_id: l.user_id,
            coordinates: match (l.latitude, l.longitude) {
                (Some(lat), Some(lng)) => format!("{:.5}, {:.5}", lat, lng),
                _ => String::new(),
            },
            travel_distance: l.travel_distance.unwrap_or_default(),
            place: l.place_details.unwrap_or_default(),
        })
        .collect();

    Ok(LocationsTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        locations,
    }
    .into_response())
}

pub async fn delete_location(
    State(state): State<AppState>,
    session: Session,
    IdPath(user_id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/locations").await {
        return Ok(rejected);
    }

    if !Location::delete(&state.pool, user_id).await? {
        return Err(AppError::NotFound);
    }

    flash(&session, FlashLevel::Success, "Location deleted.").await;
    Ok(Redirect::to("/admin/locations").into_response())
}

pub async fn list_courses(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let courses = Course::list_all(&state.pool).await?;

    Ok(CoursesTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        courses: courses.iter().map(CourseRow::from).collect(),
    }
    .into_response())
}

struct CourseFormView {
    heading: &'static str,
    action: String,
    title: String,
    level: String,
    description: String,
}

async fn render_course_form(
    session: &Session,
    admin: &User,
    view: CourseFormView,
    error: Option<String>,
) -> Response {
    CourseFormTemplate {
        page: PageContext::new(session, Some(admin)).await,
        csrf_token: csrf_token_for_form(session).await,
        heading: view.heading.to_string(),
        action: view.action,
        error,
        title: view.title,
        description: view.description,
        levels: SelectOption::list(
            CourseLevel::ALL.map(|l| (l.as_str(), l.label())),
            Some(view.level.as_str()),
        ),
    }
    .into_response()
}

pub async fn new_course_page(
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Response {
    let view = CourseFormView {
        heading: "New course",
        action: "/admin/courses".to_string(),
        title: String::new(),
        level: String::new(),
        description: String::new(),
    };
    render_course_form(&session, &admin, view, None).await
}

pub async fn create_course(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Form(form): Form<CourseForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/courses/new").await {
        return Ok(rejected);
    }

    let input = match form.validate() {
        Ok(input) => input,
        Err(e) => {
            let view = CourseFormView {
                heading: "New course",
                action: "/admin/courses".to_string(),
                title: form.course_title,
                level: form.course_level,
                description: form.course_description,
            };
            return Ok(render_course_form(&session, &admin, view, Some(e.to_string())).await);
        }
    };

    let id = Course::create(&state.pool, &input).await?;
    tracing::info!(admin_id = admin.id, course_id = id, "Course created");

    flash(&session, FlashLevel::Success, "Course created.").await;
    Ok(Redirect::to("/admin/courses").into_response())
}

pub async fn edit_course_page(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    IdPath(id): IdPath,
) -> Result<Response, AppError> {
    let course = Course::get_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let view = CourseFormView {
        heading: "Edit course",
        action: format!("/admin/courses/{}", id),
        description: course.description_or_empty().to_string(),
        title: course.course_title,
        level: course.course_level,
    };
    Ok(render_course_form(&session, &admin, view, None).await)
}

pub async fn update_course(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    IdPath(id): IdPath,
    Form(form): Form<CourseForm>,
) -> Result<Response, AppError> {
    let back = format!("/admin/courses/{}/edit", id);
    if let Some(rejected) = check_token(&session, &form.csrf_token, &back).await {
        return Ok(rejected);
    }

    let input = match form.validate() {
        Ok(input) => input,
        Err(e) => {
            let view = CourseFormView {
                heading: "Edit course",
                action: format!("/admin/courses/{}", id),
                title: form.course_title,
                level: form.course_level,
                description: form.course_description,
            };
            return Ok(render_course_form(&session, &admin, view, Some(e.to_string())).await);
        }
    };

    if !Course::update(&state.pool, id, &input).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(admin_id = admin.id, course_id = id, "Course updated");

    flash(&session, FlashLevel::Success, "Course updated.").await;
    Ok(Redirect::to("/admin/courses").into_response())
}

pub async fn delete_course(
    State(state): State<AppState>,
    session: Session,
    IdPath(id): IdPath,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/courses").await {
        return Ok(rejected);
    }

    if !Course::delete(&state.pool, id).await? {
        return Err(AppError::NotFound);
    }

    flash(&session, FlashLevel::Success, "Course deleted.").await;
    Ok(Redirect::to("/admin/courses").into_response())
}

pub async fn list_pictures(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let pictures = state
        .pictures
        .list()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(PicturesTemplate {
        page: PageContext::new(&session, Some(&admin)).await,
        csrf_token: csrf_token_for_form(&session).await,
        pictures,
    }
    .into_response())
}

pub async fn upload_picture(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut csrf_token = String::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        match field.name() {
            Some("csrf_token") => {
                csrf_token = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
            }
            Some("file") => {
                let filename = field.file_name().map(str::to_string).unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                upload = Some((filename, data));
            }
            _ => {}
        }
    }

    if let Some(rejected) = check_token(&session, &csrf_token, "/admin/pictures").await {
        return Ok(rejected);
    }

    let Some((filename, data)) = upload.filter(|(name, data)| !name.is_empty() && !data.is_empty())
    else {
        flash(&session, FlashLevel::Danger, "Please choose a file to upload.").await;
        return Ok(Redirect::to("/admin/pictures").into_response());
    };

    match state.pictures.store_file(&filename, &data) {
        Ok(name) => {
            tracing::info!("Admin uploaded picture {}", name);
            flash(&session, FlashLevel::Success, format!("Uploaded {}.", name)).await;
        }
        Err(e) => {
            flash(&session, FlashLevel::Danger, e.to_string()).await;
        }
    }

    Ok(Redirect::to("/admin/pictures").into_response())
}

pub async fn delete_picture(
    State(state): State<AppState>,
    session: Session,
    Path(name): Path<String>,
    Form(form): Form<CsrfOnlyForm>,
) -> Result<Response, AppError> {
    if let Some(rejected) = check_token(&session, &form.csrf_token, "/admin/pictures").await {
        return Ok(rejected);
    }

    match state.pictures.delete(&name) {
        Ok(()) => {
            tracing::info!("Admin deleted picture {}", name);
            flash(&session, FlashLevel::Success, format!("Deleted {}.", name)).await;
        }
        Err(PictureError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound);
        }
        Err(e) => {
            flash(&session, FlashLevel::Danger, e.to_string()).await;
        }
    }

    Ok(Redirect::to("/admin/pictures").into_response())
}
