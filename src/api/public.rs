use axum::{
    Router,
    extract::{Json, Path, Query, State},
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use utoipa::{OpenApi, ToSchema};

use crate::catalog::course::{
    Category, Course, CourseFilter, enrolled_count, get_course, list_categories, list_published,
};
use crate::catalog::lesson::{Lesson, list_lessons};
use crate::error::{Error, Result};

#[derive(OpenApi)]
#[openapi(paths(health, get_categories, get_courses, get_course_detail))]
pub struct PublicApiDoc;

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseDetail {
    pub course: Course,
    pub lessons: Vec<Lesson>,
    pub enrolled_count: i64,
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/health",
    method(get),
    responses((status = 200, description = "API is running"))
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/categories",
    method(get),
    responses((status = 200, description = "Active categories", body = Vec<Category>))
)]
pub async fn get_categories(State(db): State<SqlitePool>) -> Result<Json<Vec<Category>>> {
    Ok(Json(list_categories(&db).await?))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses",
    method(get),
    responses((status = 200, description = "Published courses", body = Vec<Course>))
)]
pub async fn get_courses(
    State(db): State<SqlitePool>,
    Query(filter): Query<CourseFilter>,
) -> Result<Json<Vec<Course>>> {
    Ok(Json(list_published(&db, filter).await?))
}

#[utoipa::path(
    context_path = "/api/public",
    path = "/courses/{id}",
    method(get),
    params(("id" = i64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with its ordered lessons", body = CourseDetail),
        (status = 404, description = "Course not found or not published")
    )
)]
pub async fn get_course_detail(
    State(db): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>> {
    let course = get_course(&db, id).await?;
    if !course.is_published {
        return Err(Error::NotFound("course"));
    }
    let lessons = list_lessons(&db, id).await?;
    let enrolled_count = enrolled_count(&db, id).await?;
    Ok(Json(CourseDetail {
        course,
        lessons,
        enrolled_count,
    }))
}

pub fn get_public_router() -> Router<SqlitePool> {
    Router::new()
        .route("/health", get(health))
        .route("/categories", get(get_categories))
        .route("/courses", get(get_courses))
        .route("/courses/{id}", get(get_course_detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::course::{Difficulty, NewCourse, create_course, set_published};
    use crate::user::{NewUser, create_user};
    use sqlx::sqlite::SqliteConnectOptions;

    async fn test_db() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        crate::MIGRATOR.run(&pool).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn course_detail_hides_unpublished() {
        let (_dir, db) = test_db().await;
        let instructor = create_user(
            &db,
            NewUser {
                username: "ana".to_string(),
                email: "ana@example.com".to_string(),
                password: "password123".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                is_instructor: true,
                phone: None,
            },
        )
        .await
        .unwrap();
        let course = create_course(
            &db,
            instructor,
            NewCourse {
                title: "Rust Basics".to_string(),
                description: String::new(),
                category_id: None,
                price_cents: 0,
                difficulty: Difficulty::Beginner,
                what_you_will_learn: String::new(),
                requirements: String::new(),
            },
        )
        .await
        .unwrap();

        let err = get_course_detail(State(db.clone()), Path(course.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        set_published(&db, course.id, instructor, true).await.unwrap();
        let detail = get_course_detail(State(db), Path(course.id))
            .await
            .unwrap();
        assert_eq!(detail.0.course.id, course.id);
        assert_eq!(detail.0.enrolled_count, 0);
    }
}
