use crate::auth::middleware::{current_user, CurrentUser};
use crate::error::AppError;
use crate::handlers::extract::IdPath;
use crate::handlers::page::PageContext;
use crate::models::{Course, Profile, Role};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension,
};
use tower_sessions::Session;

pub struct CourseRow {
    pub id: i64,
    pub title: String,
    pub level: String,
    pub description: String,
}

impl From<&Course> for CourseRow {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.course_title.clone(),
            level: course.level_label().to_string(),
            description: course.description_or_empty().to_string(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "courses.html")]
struct CoursesTemplate {
    page: PageContext,
    picture: String,
    courses: Vec<CourseRow>,
}

#[derive(Template, WebTemplate)]
#[template(path = "course.html")]
struct CourseTemplate {
    page: PageContext,
    course: CourseRow,
}

/// Catalog listing. Sits behind the login gate.
pub async fn list_courses(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    // Admins and unknown roles get the generic picture
    let role = user.role().unwrap_or(Role::Student);
    let profile = match user.role() {
        Ok(role) if role.has_profile() => Profile::load(&state.pool, user.id, role).await?,
        _ => None,
    };
    let picture = state.pictures.resolve_profile(role, profile.as_ref());

    let courses = Course::list_all(&state.pool).await?;

    Ok(CoursesTemplate {
        page: PageContext::new(&session, Some(&user)).await,
        picture,
        courses: courses.iter().map(CourseRow::from).collect(),
    }
    .into_response())
}

pub async fn course_detail(
    State(state): State<AppState>,
    session: Session,
    IdPath(id): IdPath,
) -> Result<Response, AppError> {
    let course = Course::get_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let user = current_user(&state, &session).await;
    Ok(CourseTemplate {
        page: PageContext::new(&session, user.as_ref()).await,
        course: CourseRow::from(&course),
    }
    .into_response())
}
