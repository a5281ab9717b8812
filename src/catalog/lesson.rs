use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::catalog::course::get_owned_course;
use crate::error::{Error, Result, is_unique_violation};
use crate::utils::now_utc;

/// Raw media metadata. The actual file and its encoding pipeline live
/// outside this service; the encoder reports duration and sets
/// `is_processed` once, before any lesson may reference the video.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Video {
    pub id: i64,
    pub title: String,
    /// Duration in minutes, as reported by the encoder.
    pub duration: i64,
    /// File size in bytes.
    pub file_size: i64,
    pub is_processed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub video_id: i64,
    pub title: String,
    pub description: String,
    /// Position within the course, starting at 1, unique per course.
    #[sqlx(rename = "lesson_order")]
    pub order: i64,
    pub is_free_preview: bool,
    /// Duration in minutes, denormalized from the video.
    pub duration: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewVideo {
    pub title: String,
    pub duration: i64,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub is_processed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewLesson {
    pub course_id: i64,
    pub video_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: i64,
    #[serde(default)]
    pub is_free_preview: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub is_free_preview: Option<bool>,
}

pub async fn register_video(db: &SqlitePool, new: NewVideo) -> Result<Video> {
    if new.title.trim().is_empty() {
        return Err(Error::validation("video title must not be empty"));
    }
    if new.duration < 0 {
        return Err(Error::validation("video duration must not be negative"));
    }
    if new.file_size < 0 {
        return Err(Error::validation("video file size must not be negative"));
    }
    let now = now_utc();
    let id = sqlx::query(
        "INSERT INTO video (title, duration, file_size, is_processed, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.title)
    .bind(new.duration)
    .bind(new.file_size)
    .bind(new.is_processed)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?
    .last_insert_rowid();
    get_video(db, id).await
}

pub async fn get_video(db: &SqlitePool, id: i64) -> Result<Video> {
    sqlx::query_as::<_, Video>("SELECT * FROM video WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("video"))
}

pub async fn create_lesson(db: &SqlitePool, instructor_id: i64, new: NewLesson) -> Result<Lesson> {
    get_owned_course(db, new.course_id, instructor_id).await?;
    if new.title.trim().is_empty() {
        return Err(Error::validation("lesson title must not be empty"));
    }
    if new.order < 1 {
        return Err(Error::validation("lesson order must be at least 1"));
    }
    let video = get_video(db, new.video_id).await?;
    if !video.is_processed {
        return Err(Error::validation("video has not finished processing"));
    }
    let now = now_utc();
    let id = sqlx::query(
        "INSERT INTO lesson (course_id, video_id, title, description, lesson_order, \
         is_free_preview, duration, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.course_id)
    .bind(new.video_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.order)
    .bind(new.is_free_preview)
    .bind(video.duration)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(format!(
                "lesson order {} is already taken in this course, or the video is already attached",
                new.order
            ))
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    info!("added lesson {}-{} to course {}", id, new.title, new.course_id);
    get_lesson(db, id).await
}

pub async fn update_lesson(
    db: &SqlitePool,
    id: i64,
    instructor_id: i64,
    update: LessonUpdate,
) -> Result<Lesson> {
    let lesson = get_lesson(db, id).await?;
    get_owned_course(db, lesson.course_id, instructor_id).await?;
    if let Some(order) = update.order
        && order < 1
    {
        return Err(Error::validation("lesson order must be at least 1"));
    }
    sqlx::query(
        "UPDATE lesson SET title = ?, description = ?, lesson_order = ?, is_free_preview = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(update.title.unwrap_or(lesson.title))
    .bind(update.description.unwrap_or(lesson.description))
    .bind(update.order.unwrap_or(lesson.order))
    .bind(update.is_free_preview.unwrap_or(lesson.is_free_preview))
    .bind(now_utc())
    .bind(id)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("lesson order is already taken in this course")
        } else {
            e.into()
        }
    })?;
    get_lesson(db, id).await
}

pub async fn get_lesson(db: &SqlitePool, id: i64) -> Result<Lesson> {
    sqlx::query_as::<_, Lesson>("SELECT * FROM lesson WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("lesson"))
}

/// All lessons of a course, ordered by their position.
pub async fn list_lessons(db: &SqlitePool, course_id: i64) -> Result<Vec<Lesson>> {
    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT * FROM lesson WHERE course_id = ? ORDER BY lesson_order",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;
    Ok(lessons)
}
