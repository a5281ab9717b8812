use axum::{
    Router,
    extract::{Json, Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use utoipa::{OpenApi, ToSchema};

use crate::api::{SESSION_USER_KEY, session_user};
use crate::enrollment::{
    self, Enrollment, EnrollmentDetail, EnrollmentOverview, LessonProgress,
};
use crate::error::Result;
use crate::user::{self, NewUser, Profile, UserInfo};

#[derive(OpenApi)]
#[openapi(paths(
    create_user,
    login,
    logout,
    user_info,
    get_profile,
    update_profile,
    enroll,
    list_enrollments,
    enrollment_detail,
    record_watch,
    set_watched_duration,
    complete_lesson,
    complete_course,
    rate_course,
    deactivate_enrollment,
))]
pub struct UserApiDoc;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub course_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WatchRequest {
    pub lesson_id: i64,
    pub minutes: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompleteLessonRequest {
    pub lesson_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    pub rating: Option<i64>,
    pub review: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub bio: Option<String>,
    pub website: Option<String>,
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/create_user",
    method(post),
    request_body = NewUser,
    responses(
        (status = 200, description = "User created", body = i64),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn create_user(
    State(db): State<SqlitePool>,
    Json(req): Json<NewUser>,
) -> Result<Json<i64>> {
    Ok(Json(user::create_user(&db, req).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/login",
    method(post),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<&'static str> {
    let id = user::login(&db, req.email, req.password).await?;
    session.insert(SESSION_USER_KEY, id).await?;
    Ok("Login successful")
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/logout",
    method(post),
    responses((status = 200, description = "Logout successful"))
)]
pub async fn logout(session: Session) -> Result<&'static str> {
    session.flush().await?;
    Ok("Logout successful")
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/user_info",
    method(get),
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn user_info(State(db): State<SqlitePool>, session: Session) -> Result<Json<UserInfo>> {
    let user_id = session_user(&session).await?;
    Ok(Json(user::get_user_info(&db, user_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/profile",
    method(get),
    responses(
        (status = 200, description = "Current user's profile", body = Profile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_profile(State(db): State<SqlitePool>, session: Session) -> Result<Json<Profile>> {
    let user_id = session_user(&session).await?;
    Ok(Json(user::get_profile(&db, user_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/profile",
    method(post),
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_profile(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<Profile>> {
    let user_id = session_user(&session).await?;
    Ok(Json(
        user::update_profile(&db, user_id, req.bio, req.website).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enroll",
    method(post),
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrollment created", body = Enrollment),
        (status = 400, description = "Course is not published"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn enroll(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<EnrollRequest>,
) -> Result<Json<Enrollment>> {
    let user_id = session_user(&session).await?;
    Ok(Json(enrollment::enroll(&db, user_id, req.course_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments",
    method(get),
    responses(
        (status = 200, description = "Enrollments with aggregates", body = Vec<EnrollmentOverview>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_enrollments(
    State(db): State<SqlitePool>,
    session: Session,
) -> Result<Json<Vec<EnrollmentOverview>>> {
    let user_id = session_user(&session).await?;
    Ok(Json(enrollment::list_user_enrollments(&db, user_id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}",
    method(get),
    params(("id" = i64, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Per-lesson progress and next lesson", body = EnrollmentDetail),
        (status = 403, description = "Enrollment belongs to another user"),
        (status = 404, description = "Enrollment not found")
    )
)]
pub async fn enrollment_detail(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Json<EnrollmentDetail>> {
    let user_id = session_user(&session).await?;
    Ok(Json(enrollment::enrollment_detail(&db, user_id, id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/watch",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = WatchRequest,
    responses(
        (status = 200, description = "Updated progress", body = LessonProgress),
        (status = 400, description = "Negative minutes"),
        (status = 404, description = "Enrollment or lesson not found")
    )
)]
pub async fn record_watch(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<WatchRequest>,
) -> Result<Json<LessonProgress>> {
    let user_id = session_user(&session).await?;
    Ok(Json(
        enrollment::record_watch(&db, user_id, id, req.lesson_id, req.minutes).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/watched_duration",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = WatchRequest,
    responses(
        (status = 200, description = "Updated progress", body = LessonProgress),
        (status = 400, description = "Duration out of range")
    )
)]
pub async fn set_watched_duration(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<WatchRequest>,
) -> Result<Json<LessonProgress>> {
    let user_id = session_user(&session).await?;
    Ok(Json(
        enrollment::set_watched_duration(&db, user_id, id, req.lesson_id, req.minutes).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/complete_lesson",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = CompleteLessonRequest,
    responses(
        (status = 200, description = "Lesson marked complete", body = LessonProgress),
        (status = 404, description = "Enrollment or lesson not found")
    )
)]
pub async fn complete_lesson(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<CompleteLessonRequest>,
) -> Result<Json<LessonProgress>> {
    let user_id = session_user(&session).await?;
    Ok(Json(
        enrollment::complete_lesson(&db, user_id, id, req.lesson_id).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/complete",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Course marked complete", body = Enrollment),
        (status = 400, description = "Lessons remain incomplete")
    )
)]
pub async fn complete_course(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Json<Enrollment>> {
    let user_id = session_user(&session).await?;
    Ok(Json(enrollment::complete_course(&db, user_id, id).await?))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/rate",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    request_body = RateRequest,
    responses(
        (status = 200, description = "Rating and review stored", body = Enrollment),
        (status = 400, description = "Rating out of range or review without completed lesson")
    )
)]
pub async fn rate_course(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<RateRequest>,
) -> Result<Json<Enrollment>> {
    let user_id = session_user(&session).await?;
    Ok(Json(
        enrollment::rate_course(&db, user_id, id, req.rating, req.review).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/user",
    path = "/enrollments/{id}/deactivate",
    method(post),
    params(("id" = i64, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment deactivated"),
        (status = 403, description = "Enrollment belongs to another user")
    )
)]
pub async fn deactivate_enrollment(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<&'static str> {
    let user_id = session_user(&session).await?;
    enrollment::deactivate(&db, user_id, id).await?;
    Ok("Enrollment deactivated")
}

pub fn get_user_router() -> Router<SqlitePool> {
    Router::new()
        .route("/create_user", post(create_user))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user_info", get(user_info))
        .route("/profile", get(get_profile).post(update_profile))
        .route("/enroll", post(enroll))
        .route("/enrollments", get(list_enrollments))
        .route("/enrollments/{id}", get(enrollment_detail))
        .route("/enrollments/{id}/watch", post(record_watch))
        .route("/enrollments/{id}/watched_duration", post(set_watched_duration))
        .route("/enrollments/{id}/complete_lesson", post(complete_lesson))
        .route("/enrollments/{id}/complete", post(complete_course))
        .route("/enrollments/{id}/rate", post(rate_course))
        .route("/enrollments/{id}/deactivate", post(deactivate_enrollment))
}
