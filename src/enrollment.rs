pub mod progress;

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::catalog::course::{get_course, get_owned_course};
use crate::catalog::lesson::{Lesson, list_lessons};
use crate::error::{Error, Result, is_unique_violation};
use crate::utils::now_utc;
use self::progress::{LessonStatus, ProgressSnapshot, lesson_progress_percentage, lesson_status};

/// A user's participation in a course. Never hard-deleted; leaving a course
/// flips `is_active` off so history and ratings survive.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
    pub is_active: bool,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub certificate_issued: bool,
    /// 1-5 stars, unset until the student rates the course.
    pub rating: Option<i64>,
    pub review: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Per-lesson watch state under one enrollment, created lazily on the first
/// watch event for that lesson.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LessonProgress {
    pub id: i64,
    pub enrollment_id: i64,
    pub lesson_id: i64,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Minutes watched, never above the lesson duration.
    pub watched_duration: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_watched_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One row of "my courses": the enrollment plus its derived aggregates.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentOverview {
    pub enrollment: Enrollment,
    pub course_title: String,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    pub completion_percentage: f64,
    pub total_watched_minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LessonProgressView {
    pub lesson: Lesson,
    pub status: LessonStatus,
    pub watched_duration: i64,
    pub progress_percentage: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_watched_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub course_title: String,
    pub completion_percentage: f64,
    pub total_watched_minutes: i64,
    pub lessons: Vec<LessonProgressView>,
    pub next_lesson: Option<Lesson>,
}

fn assert_owner(enrollment: &Enrollment, user_id: i64) -> Result<()> {
    if enrollment.user_id != user_id {
        return Err(Error::Forbidden("enrollment belongs to another user"));
    }
    Ok(())
}

fn assert_active(enrollment: &Enrollment) -> Result<()> {
    if !enrollment.is_active {
        return Err(Error::validation("enrollment is deactivated"));
    }
    Ok(())
}

pub async fn enroll(db: &SqlitePool, user_id: i64, course_id: i64) -> Result<Enrollment> {
    let course = get_course(db, course_id).await?;
    if !course.is_published {
        return Err(Error::validation("course is not published"));
    }
    if let Some(existing) = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollment WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(db)
    .await?
    {
        if existing.is_active {
            return Err(Error::conflict("already enrolled in this course"));
        }
        // a previously abandoned enrollment comes back with its progress
        sqlx::query("UPDATE enrollment SET is_active = 1, updated_at = ? WHERE id = ?")
            .bind(now_utc())
            .bind(existing.id)
            .execute(db)
            .await?;
        return get_enrollment(db, existing.id).await;
    }
    let now = now_utc();
    let id = sqlx::query(
        "INSERT INTO enrollment (user_id, course_id, enrolled_at, is_active, completed, \
         certificate_issued, review, created_at, updated_at) VALUES (?, ?, ?, 1, 0, 0, '', ?, ?)",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("already enrolled in this course")
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    info!("user {} enrolled in course {}", user_id, course_id);
    get_enrollment(db, id).await
}

pub async fn get_enrollment(db: &SqlitePool, id: i64) -> Result<Enrollment> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollment WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("enrollment"))
}

/// Load the full aggregation snapshot for one enrollment: the enrollment
/// row, the course's lessons, and every progress row under it.
pub async fn load_snapshot(db: &SqlitePool, enrollment_id: i64) -> Result<ProgressSnapshot> {
    let enrollment = get_enrollment(db, enrollment_id).await?;
    let lessons = list_lessons(db, enrollment.course_id).await?;
    let rows = sqlx::query_as::<_, LessonProgress>(
        "SELECT * FROM lesson_progress WHERE enrollment_id = ?",
    )
    .bind(enrollment_id)
    .fetch_all(db)
    .await?;
    Ok(ProgressSnapshot::new(enrollment, lessons, rows))
}

pub async fn list_user_enrollments(db: &SqlitePool, user_id: i64) -> Result<Vec<EnrollmentOverview>> {
    let enrollments = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollment WHERE user_id = ? ORDER BY enrolled_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    let mut overviews = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let course = get_course(db, enrollment.course_id).await?;
        let snapshot = load_snapshot(db, enrollment.id).await?;
        overviews.push(EnrollmentOverview {
            course_title: course.title,
            total_lessons: snapshot.lessons.len() as i64,
            completed_lessons: snapshot.completed_lessons(),
            completion_percentage: snapshot.completion_percentage(),
            total_watched_minutes: snapshot.total_watched_minutes(),
            enrollment: snapshot.enrollment,
        });
    }
    Ok(overviews)
}

pub async fn enrollment_detail(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
) -> Result<EnrollmentDetail> {
    let snapshot = load_snapshot(db, enrollment_id).await?;
    assert_owner(&snapshot.enrollment, user_id)?;
    let course = get_course(db, snapshot.enrollment.course_id).await?;
    let lessons = snapshot
        .lessons
        .iter()
        .map(|lesson| {
            let (status, watched, percentage, last_watched_at) =
                match snapshot.progress_for(lesson.id) {
                    Some(p) => (
                        lesson_status(p),
                        p.watched_duration,
                        lesson_progress_percentage(p, lesson),
                        p.last_watched_at,
                    ),
                    None => (LessonStatus::NotStarted, 0, 0.0, None),
                };
            LessonProgressView {
                lesson: lesson.clone(),
                status,
                watched_duration: watched,
                progress_percentage: percentage,
                last_watched_at,
            }
        })
        .collect();
    Ok(EnrollmentDetail {
        course_title: course.title,
        completion_percentage: snapshot.completion_percentage(),
        total_watched_minutes: snapshot.total_watched_minutes(),
        next_lesson: snapshot.next_incomplete_lesson().cloned(),
        lessons,
        enrollment: snapshot.enrollment,
    })
}

/// Load (or lazily create) the progress row for one lesson of an owned,
/// active enrollment, inside the caller's transaction.
async fn progress_row_for_update(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    enrollment_id: i64,
    lesson_id: i64,
) -> Result<(LessonProgress, Lesson)> {
    let enrollment = sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollment WHERE id = ?")
        .bind(enrollment_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(Error::NotFound("enrollment"))?;
    assert_owner(&enrollment, user_id)?;
    assert_active(&enrollment)?;
    let lesson = sqlx::query_as::<_, Lesson>(
        "SELECT * FROM lesson WHERE id = ? AND course_id = ?",
    )
    .bind(lesson_id)
    .bind(enrollment.course_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(Error::NotFound("lesson"))?;
    let existing = sqlx::query_as::<_, LessonProgress>(
        "SELECT * FROM lesson_progress WHERE enrollment_id = ? AND lesson_id = ?",
    )
    .bind(enrollment_id)
    .bind(lesson_id)
    .fetch_optional(&mut **tx)
    .await?;
    let row = match existing {
        Some(row) => row,
        None => {
            let now = now_utc();
            let id = sqlx::query(
                "INSERT INTO lesson_progress (enrollment_id, lesson_id, completed, \
                 watched_duration, created_at, updated_at) VALUES (?, ?, 0, 0, ?, ?)",
            )
            .bind(enrollment_id)
            .bind(lesson_id)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?
            .last_insert_rowid();
            sqlx::query_as::<_, LessonProgress>("SELECT * FROM lesson_progress WHERE id = ?")
                .bind(id)
                .fetch_one(&mut **tx)
                .await?
        }
    };
    Ok((row, lesson))
}

async fn persist_progress(
    tx: &mut Transaction<'_, Sqlite>,
    row: &LessonProgress,
) -> Result<()> {
    sqlx::query(
        "UPDATE lesson_progress SET completed = ?, completed_at = ?, watched_duration = ?, \
         last_watched_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(row.completed)
    .bind(row.completed_at)
    .bind(row.watched_duration)
    .bind(row.last_watched_at)
    .bind(now_utc())
    .bind(row.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Add watched minutes to one lesson. Concurrent calls on the same row
/// serialize on the store's write transaction; last writer wins.
pub async fn record_watch(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
    lesson_id: i64,
    minutes: i64,
) -> Result<LessonProgress> {
    let mut tx = db.begin().await?;
    let (mut row, lesson) =
        progress_row_for_update(&mut tx, user_id, enrollment_id, lesson_id).await?;
    progress::record_watch(&mut row, &lesson, minutes)?;
    persist_progress(&mut tx, &row).await?;
    tx.commit().await?;
    Ok(row)
}

/// Overwrite the watched duration with an absolute player position.
pub async fn set_watched_duration(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
    lesson_id: i64,
    minutes: i64,
) -> Result<LessonProgress> {
    let mut tx = db.begin().await?;
    let (mut row, lesson) =
        progress_row_for_update(&mut tx, user_id, enrollment_id, lesson_id).await?;
    progress::set_watched_duration(&mut row, &lesson, minutes)?;
    persist_progress(&mut tx, &row).await?;
    tx.commit().await?;
    Ok(row)
}

pub async fn complete_lesson(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
    lesson_id: i64,
) -> Result<LessonProgress> {
    let mut tx = db.begin().await?;
    let (mut row, lesson) =
        progress_row_for_update(&mut tx, user_id, enrollment_id, lesson_id).await?;
    progress::mark_lesson_complete(&mut row, &lesson);
    persist_progress(&mut tx, &row).await?;
    tx.commit().await?;
    info!(
        "user {} completed lesson {} of enrollment {}",
        user_id, lesson_id, enrollment_id
    );
    Ok(row)
}

/// Mark the whole course done. Callers invoke this explicitly after the
/// last lesson; nothing cascades from `complete_lesson`.
pub async fn complete_course(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
) -> Result<Enrollment> {
    let snapshot = load_snapshot(db, enrollment_id).await?;
    assert_owner(&snapshot.enrollment, user_id)?;
    assert_active(&snapshot.enrollment)?;
    if snapshot.enrollment.completed {
        return Ok(snapshot.enrollment);
    }
    if !snapshot.all_lessons_completed() {
        return Err(Error::validation("course still has incomplete lessons"));
    }
    let mut enrollment = snapshot.enrollment;
    progress::mark_enrollment_complete(&mut enrollment);
    sqlx::query(
        "UPDATE enrollment SET completed = 1, completed_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(enrollment.completed_at)
    .bind(now_utc())
    .bind(enrollment.id)
    .execute(db)
    .await?;
    info!("user {} completed course enrollment {}", user_id, enrollment_id);
    Ok(enrollment)
}

/// Attach a rating and/or review. Ratings are 1-5; a review needs at least
/// one completed lesson behind it.
pub async fn rate_course(
    db: &SqlitePool,
    user_id: i64,
    enrollment_id: i64,
    rating: Option<i64>,
    review: Option<String>,
) -> Result<Enrollment> {
    if rating.is_none() && review.is_none() {
        return Err(Error::validation("provide a rating or a review"));
    }
    if let Some(rating) = rating
        && !(1..=5).contains(&rating)
    {
        return Err(Error::validation("rating must be between 1 and 5"));
    }
    let snapshot = load_snapshot(db, enrollment_id).await?;
    assert_owner(&snapshot.enrollment, user_id)?;
    assert_active(&snapshot.enrollment)?;
    if let Some(review) = &review
        && !review.trim().is_empty()
        && snapshot.completed_lessons() == 0
    {
        return Err(Error::validation(
            "complete at least one lesson before reviewing",
        ));
    }
    sqlx::query("UPDATE enrollment SET rating = ?, review = ?, updated_at = ? WHERE id = ?")
        .bind(rating.or(snapshot.enrollment.rating))
        .bind(review.unwrap_or(snapshot.enrollment.review))
        .bind(now_utc())
        .bind(enrollment_id)
        .execute(db)
        .await?;
    get_enrollment(db, enrollment_id).await
}

/// Soft-deactivate; the row and its progress stay around.
pub async fn deactivate(db: &SqlitePool, user_id: i64, enrollment_id: i64) -> Result<()> {
    let enrollment = get_enrollment(db, enrollment_id).await?;
    assert_owner(&enrollment, user_id)?;
    sqlx::query("UPDATE enrollment SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(now_utc())
        .bind(enrollment_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Enrollments of one owned course, for the instructor dashboard.
pub async fn list_course_enrollments(
    db: &SqlitePool,
    instructor_id: i64,
    course_id: i64,
) -> Result<Vec<EnrollmentOverview>> {
    let course = get_owned_course(db, course_id, instructor_id).await?;
    let enrollments = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollment WHERE course_id = ? AND is_active = 1 ORDER BY enrolled_at DESC",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;
    let mut overviews = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let snapshot = load_snapshot(db, enrollment.id).await?;
        overviews.push(EnrollmentOverview {
            course_title: course.title.clone(),
            total_lessons: snapshot.lessons.len() as i64,
            completed_lessons: snapshot.completed_lessons(),
            completion_percentage: snapshot.completion_percentage(),
            total_watched_minutes: snapshot.total_watched_minutes(),
            enrollment: snapshot.enrollment,
        });
    }
    Ok(overviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::course::{Difficulty, NewCourse, create_course, set_published};
    use crate::catalog::lesson::{NewLesson, NewVideo, create_lesson, register_video};
    use crate::enrollment::progress::LessonStatus;
    use crate::user::{NewUser, create_user, get_profile};
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

    fn new_user(username: &str, email: &str, is_instructor: bool) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_instructor,
            phone: None,
        }
    }

    fn new_course(title: &str) -> NewCourse {
        NewCourse {
            title: title.to_string(),
            description: String::new(),
            category_id: None,
            price_cents: 0,
            difficulty: Difficulty::Beginner,
            what_you_will_learn: String::new(),
            requirements: String::new(),
        }
    }

    /// A published course with three lessons of 10, 20 and 30 minutes,
    /// an instructor and a student.
    async fn seed(db: &SqlitePool) -> (i64, i64, i64, Vec<i64>) {
        let instructor = create_user(db, new_user("ana", "ana@example.com", true))
            .await
            .unwrap();
        let student = create_user(db, new_user("bob", "bob@example.com", false))
            .await
            .unwrap();
        let course = create_course(db, instructor, new_course("Rust Basics"))
            .await
            .unwrap();
        let mut lesson_ids = Vec::new();
        for (i, duration) in [10i64, 20, 30].into_iter().enumerate() {
            let order = (i + 1) as i64;
            let video = register_video(
                db,
                NewVideo {
                    title: format!("video {order}"),
                    duration,
                    file_size: 0,
                    is_processed: true,
                },
            )
            .await
            .unwrap();
            let lesson = create_lesson(
                db,
                instructor,
                NewLesson {
                    course_id: course.id,
                    video_id: video.id,
                    title: format!("Lesson {order}"),
                    description: String::new(),
                    order,
                    is_free_preview: false,
                },
            )
            .await
            .unwrap();
            lesson_ids.push(lesson.id);
        }
        set_published(db, course.id, instructor, true).await.unwrap();
        (student, instructor, course.id, lesson_ids)
    }

    #[tokio::test]
    async fn user_and_profile_created_together() {
        let (_dir, db) = test_db().await;
        let id = create_user(&db, new_user("ana", "ana@example.com", false))
            .await
            .unwrap();
        let profile = get_profile(&db, id).await.unwrap();
        assert_eq!(profile.user_id, id);
        let err = create_user(&db, new_user("ana2", "ana@example.com", false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn enroll_rejects_unpublished_and_duplicates() {
        let (_dir, db) = test_db().await;
        let (student, instructor, course_id, _) = seed(&db).await;
        let draft = create_course(&db, instructor, new_course("Draft Course"))
            .await
            .unwrap();
        assert!(matches!(
            enroll(&db, student, draft.id).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            enroll(&db, student, 9999).await.unwrap_err(),
            Error::NotFound(_)
        ));
        enroll(&db, student, course_id).await.unwrap();
        assert!(matches!(
            enroll(&db, student, course_id).await.unwrap_err(),
            Error::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn watch_and_complete_aggregate() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();

        complete_lesson(&db, student, e.id, lessons[0]).await.unwrap();
        record_watch(&db, student, e.id, lessons[1], 5).await.unwrap();

        let detail = enrollment_detail(&db, student, e.id).await.unwrap();
        assert_eq!(detail.completion_percentage, 33.33);
        assert_eq!(detail.total_watched_minutes, 15);
        assert_eq!(detail.next_lesson.unwrap().id, lessons[1]);
        assert_eq!(detail.lessons[0].status, LessonStatus::Completed);
        assert_eq!(detail.lessons[1].status, LessonStatus::InProgress);
        assert_eq!(detail.lessons[2].status, LessonStatus::NotStarted);

        let overviews = list_user_enrollments(&db, student).await.unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].completed_lessons, 1);
        assert_eq!(overviews[0].total_lessons, 3);
        assert_eq!(overviews[0].completion_percentage, 33.33);
    }

    #[tokio::test]
    async fn watch_clamps_but_direct_write_rejects() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();

        // lesson 2 is 20 minutes long
        let row = record_watch(&db, student, e.id, lessons[1], 25).await.unwrap();
        assert_eq!(row.watched_duration, 20);
        assert!(matches!(
            set_watched_duration(&db, student, e.id, lessons[1], 25)
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            record_watch(&db, student, e.id, lessons[1], -1)
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
        // the failed mutations left the row unchanged
        let snapshot = load_snapshot(&db, e.id).await.unwrap();
        assert_eq!(snapshot.progress_for(lessons[1]).unwrap().watched_duration, 20);
    }

    #[tokio::test]
    async fn progress_belongs_to_its_owner() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let intruder = create_user(&db, new_user("eve", "eve@example.com", false))
            .await
            .unwrap();
        let e = enroll(&db, student, course_id).await.unwrap();
        assert!(matches!(
            record_watch(&db, intruder, e.id, lessons[0], 5)
                .await
                .unwrap_err(),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            rate_course(&db, intruder, e.id, Some(5), None)
                .await
                .unwrap_err(),
            Error::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn course_completion_is_explicit() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();

        for lesson_id in &lessons {
            complete_lesson(&db, student, e.id, *lesson_id).await.unwrap();
        }
        // completing every lesson does not cascade into the enrollment
        let enrollment = get_enrollment(&db, e.id).await.unwrap();
        assert!(!enrollment.completed);

        let completed = complete_course(&db, student, e.id).await.unwrap();
        assert!(completed.completed);
        assert!(completed.completed_at.is_some());
        // second call is a no-op
        let again = complete_course(&db, student, e.id).await.unwrap();
        assert_eq!(again.completed_at, completed.completed_at);
    }

    #[tokio::test]
    async fn course_completion_requires_all_lessons() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();
        complete_lesson(&db, student, e.id, lessons[0]).await.unwrap();
        assert!(matches!(
            complete_course(&db, student, e.id).await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn rating_and_review_rules() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();

        assert!(matches!(
            rate_course(&db, student, e.id, Some(6), None).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            rate_course(&db, student, e.id, Some(0), None).await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            rate_course(&db, student, e.id, None, Some("great".to_string()))
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));
        // rating alone is fine before any lesson is done
        let rated = rate_course(&db, student, e.id, Some(5), None).await.unwrap();
        assert_eq!(rated.rating, Some(5));

        complete_lesson(&db, student, e.id, lessons[0]).await.unwrap();
        let reviewed = rate_course(&db, student, e.id, None, Some("great".to_string()))
            .await
            .unwrap();
        assert_eq!(reviewed.review, "great");
        assert_eq!(reviewed.rating, Some(5));
    }

    #[tokio::test]
    async fn deactivate_and_reenroll_keeps_progress() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();
        record_watch(&db, student, e.id, lessons[0], 5).await.unwrap();

        deactivate(&db, student, e.id).await.unwrap();
        assert!(matches!(
            record_watch(&db, student, e.id, lessons[0], 5)
                .await
                .unwrap_err(),
            Error::Validation(_)
        ));

        let revived = enroll(&db, student, course_id).await.unwrap();
        assert_eq!(revived.id, e.id);
        assert!(revived.is_active);
        let snapshot = load_snapshot(&db, e.id).await.unwrap();
        assert_eq!(snapshot.total_watched_minutes(), 5);
    }

    #[tokio::test]
    async fn progress_rows_are_created_lazily() {
        let (_dir, db) = test_db().await;
        let (student, _, course_id, lessons) = seed(&db).await;
        let e = enroll(&db, student, course_id).await.unwrap();

        let snapshot = load_snapshot(&db, e.id).await.unwrap();
        assert!(snapshot.progress.is_empty());

        record_watch(&db, student, e.id, lessons[2], 1).await.unwrap();
        let snapshot = load_snapshot(&db, e.id).await.unwrap();
        assert_eq!(snapshot.progress.len(), 1);
        assert_eq!(snapshot.progress[0].lesson_id, lessons[2]);
    }

    #[tokio::test]
    async fn lesson_must_belong_to_the_course() {
        let (_dir, db) = test_db().await;
        let (student, instructor, course_id, _) = seed(&db).await;
        let other = create_course(&db, instructor, new_course("Other Course"))
            .await
            .unwrap();
        let video = register_video(
            &db,
            NewVideo {
                title: "stray".to_string(),
                duration: 10,
                file_size: 0,
                is_processed: true,
            },
        )
        .await
        .unwrap();
        let stray = create_lesson(
            &db,
            instructor,
            NewLesson {
                course_id: other.id,
                video_id: video.id,
                title: "Stray".to_string(),
                description: String::new(),
                order: 1,
                is_free_preview: false,
            },
        )
        .await
        .unwrap();
        let e = enroll(&db, student, course_id).await.unwrap();
        assert!(matches!(
            record_watch(&db, student, e.id, stray.id, 5).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
