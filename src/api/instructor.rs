use axum::{
    Router,
    extract::{Json, Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use utoipa::{OpenApi, ToSchema};

use crate::api::session_instructor;
use crate::catalog::course::{
    self, Category, Course, CourseUpdate, NewCourse,
};
use crate::catalog::lesson::{self, Lesson, LessonUpdate, NewLesson, NewVideo, Video};
use crate::enrollment::{self, EnrollmentOverview};
use crate::error::Result;

#[derive(OpenApi)]
#[openapi(paths(
    create_category,
    create_course,
    list_courses,
    update_course,
    publish_course,
    register_video,
    create_lesson,
    update_lesson,
    course_enrollments,
))]
pub struct InstructorApiDoc;

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    pub is_published: bool,
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/categories",
    method(post),
    request_body = NewCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = Category),
        (status = 403, description = "Instructor account required"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn create_category(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewCategoryRequest>,
) -> Result<Json<Category>> {
    session_instructor(&db, &session).await?;
    Ok(Json(
        course::create_category(&db, req.name, req.description).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses",
    method(post),
    request_body = NewCourse,
    responses(
        (status = 200, description = "Course created as a draft", body = Course),
        (status = 403, description = "Instructor account required"),
        (status = 409, description = "Course title already taken")
    )
)]
pub async fn create_course(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewCourse>,
) -> Result<Json<Course>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(course::create_course(&db, instructor_id, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses",
    method(get),
    responses(
        (status = 200, description = "Courses owned by the instructor", body = Vec<Course>),
        (status = 403, description = "Instructor account required")
    )
)]
pub async fn list_courses(
    State(db): State<SqlitePool>,
    session: Session,
) -> Result<Json<Vec<Course>>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(course::list_by_instructor(&db, instructor_id).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses/{id}",
    method(post),
    params(("id" = i64, Path, description = "Course id")),
    request_body = CourseUpdate,
    responses(
        (status = 200, description = "Updated course", body = Course),
        (status = 403, description = "Course belongs to another instructor")
    )
)]
pub async fn update_course(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<CourseUpdate>,
) -> Result<Json<Course>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(course::update_course(&db, id, instructor_id, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses/{id}/publish",
    method(post),
    params(("id" = i64, Path, description = "Course id")),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Course visibility updated", body = Course),
        (status = 403, description = "Course belongs to another instructor")
    )
)]
pub async fn publish_course(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<Course>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(
        course::set_published(&db, id, instructor_id, req.is_published).await?,
    ))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/videos",
    method(post),
    request_body = NewVideo,
    responses(
        (status = 200, description = "Video metadata registered", body = Video),
        (status = 400, description = "Invalid metadata"),
        (status = 403, description = "Instructor account required")
    )
)]
pub async fn register_video(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewVideo>,
) -> Result<Json<Video>> {
    session_instructor(&db, &session).await?;
    Ok(Json(lesson::register_video(&db, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/lessons",
    method(post),
    request_body = NewLesson,
    responses(
        (status = 200, description = "Lesson added to the course", body = Lesson),
        (status = 400, description = "Invalid order or unprocessed video"),
        (status = 409, description = "Order taken or video already attached")
    )
)]
pub async fn create_lesson(
    State(db): State<SqlitePool>,
    session: Session,
    Json(req): Json<NewLesson>,
) -> Result<Json<Lesson>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(lesson::create_lesson(&db, instructor_id, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/lessons/{id}",
    method(post),
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = LessonUpdate,
    responses(
        (status = 200, description = "Updated lesson", body = Lesson),
        (status = 409, description = "Order taken in this course")
    )
)]
pub async fn update_lesson(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
    Json(req): Json<LessonUpdate>,
) -> Result<Json<Lesson>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(lesson::update_lesson(&db, id, instructor_id, req).await?))
}

#[utoipa::path(
    context_path = "/api/instructor",
    path = "/courses/{id}/enrollments",
    method(get),
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Active enrollments with aggregates", body = Vec<EnrollmentOverview>),
        (status = 403, description = "Course belongs to another instructor")
    )
)]
pub async fn course_enrollments(
    State(db): State<SqlitePool>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Json<Vec<EnrollmentOverview>>> {
    let instructor_id = session_instructor(&db, &session).await?;
    Ok(Json(
        enrollment::list_course_enrollments(&db, instructor_id, id).await?,
    ))
}

pub fn get_instructor_router() -> Router<SqlitePool> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", post(update_course))
        .route("/courses/{id}/publish", post(publish_course))
        .route("/courses/{id}/enrollments", get(course_enrollments))
        .route("/videos", post(register_video))
        .route("/lessons", post(create_lesson))
        .route("/lessons/{id}", post(update_lesson))
}
