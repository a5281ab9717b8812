use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{Error, Result, is_unique_violation};
use crate::utils::{now_utc, slugify};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub instructor_id: i64,
    pub category_id: Option<i64>,
    /// Price in cents; 0 means free.
    pub price_cents: i64,
    pub difficulty: Difficulty,
    pub is_published: bool,
    pub what_you_will_learn: String,
    pub requirements: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub price_cents: i64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub what_you_will_learn: String,
    #[serde(default)]
    pub requirements: String,
}

/// Fields left out keep their stored value. Updates are replace-only:
/// `category_id` cannot be cleared back to none, only moved to another
/// category.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CourseUpdate {
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub price_cents: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub what_you_will_learn: Option<String>,
    pub requirements: Option<String>,
}

/// Filters for the public course listing.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CourseFilter {
    pub category_id: Option<i64>,
    pub difficulty: Option<Difficulty>,
}

pub async fn create_category(
    db: &SqlitePool,
    name: String,
    description: String,
) -> Result<Category> {
    if name.trim().is_empty() {
        return Err(Error::validation("category name must not be empty"));
    }
    let now = now_utc();
    let slug = slugify(&name);
    let id = sqlx::query(
        "INSERT INTO category (name, slug, description, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, 1, ?, ?)",
    )
    .bind(&name)
    .bind(&slug)
    .bind(&description)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(format!("category {name:?} already exists"))
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    get_category(db, id).await
}

pub async fn get_category(db: &SqlitePool, id: i64) -> Result<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM category WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("category"))
}

pub async fn list_categories(db: &SqlitePool) -> Result<Vec<Category>> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT * FROM category WHERE is_active = 1 ORDER BY name")
            .fetch_all(db)
            .await?;
    Ok(categories)
}

pub async fn create_course(
    db: &SqlitePool,
    instructor_id: i64,
    new: NewCourse,
) -> Result<Course> {
    if new.title.trim().is_empty() {
        return Err(Error::validation("course title must not be empty"));
    }
    if new.price_cents < 0 {
        return Err(Error::validation("price must not be negative"));
    }
    if let Some(category_id) = new.category_id {
        get_category(db, category_id).await?;
    }
    let now = now_utc();
    let slug = slugify(&new.title);
    let id = sqlx::query(
        "INSERT INTO course (title, slug, description, instructor_id, category_id, price_cents, \
         difficulty, is_published, what_you_will_learn, requirements, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
    )
    .bind(&new.title)
    .bind(&slug)
    .bind(&new.description)
    .bind(instructor_id)
    .bind(new.category_id)
    .bind(new.price_cents)
    .bind(new.difficulty)
    .bind(&new.what_you_will_learn)
    .bind(&new.requirements)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict(format!("course {:?} already exists", new.title))
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    info!("instructor {} created course {}-{}", instructor_id, id, new.title);
    get_course(db, id).await
}

pub async fn get_course(db: &SqlitePool, id: i64) -> Result<Course> {
    sqlx::query_as::<_, Course>("SELECT * FROM course WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("course"))
}

/// Fetch a course and check it is owned by `instructor_id`.
pub async fn get_owned_course(db: &SqlitePool, id: i64, instructor_id: i64) -> Result<Course> {
    let course = get_course(db, id).await?;
    if course.instructor_id != instructor_id {
        return Err(Error::Forbidden("course belongs to another instructor"));
    }
    Ok(course)
}

pub async fn update_course(
    db: &SqlitePool,
    id: i64,
    instructor_id: i64,
    update: CourseUpdate,
) -> Result<Course> {
    let course = get_owned_course(db, id, instructor_id).await?;
    if let Some(price) = update.price_cents
        && price < 0
    {
        return Err(Error::validation("price must not be negative"));
    }
    if let Some(category_id) = update.category_id {
        get_category(db, category_id).await?;
    }
    let now = now_utc();
    sqlx::query(
        "UPDATE course SET description = ?, category_id = ?, price_cents = ?, difficulty = ?, \
         what_you_will_learn = ?, requirements = ?, updated_at = ? WHERE id = ?",
    )
    .bind(update.description.unwrap_or(course.description))
    .bind(update.category_id.or(course.category_id))
    .bind(update.price_cents.unwrap_or(course.price_cents))
    .bind(update.difficulty.unwrap_or(course.difficulty))
    .bind(update.what_you_will_learn.unwrap_or(course.what_you_will_learn))
    .bind(update.requirements.unwrap_or(course.requirements))
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    get_course(db, id).await
}

pub async fn set_published(
    db: &SqlitePool,
    id: i64,
    instructor_id: i64,
    is_published: bool,
) -> Result<Course> {
    get_owned_course(db, id, instructor_id).await?;
    sqlx::query("UPDATE course SET is_published = ?, updated_at = ? WHERE id = ?")
        .bind(is_published)
        .bind(now_utc())
        .bind(id)
        .execute(db)
        .await?;
    get_course(db, id).await
}

pub async fn list_published(db: &SqlitePool, filter: CourseFilter) -> Result<Vec<Course>> {
    let mut sql =
        String::from("SELECT * FROM course WHERE is_published = 1");
    if filter.category_id.is_some() {
        sql.push_str(" AND category_id = ?");
    }
    if filter.difficulty.is_some() {
        sql.push_str(" AND difficulty = ?");
    }
    sql.push_str(" ORDER BY created_at DESC");
    let mut query = sqlx::query_as::<_, Course>(&sql);
    if let Some(category_id) = filter.category_id {
        query = query.bind(category_id);
    }
    if let Some(difficulty) = filter.difficulty {
        query = query.bind(difficulty);
    }
    Ok(query.fetch_all(db).await?)
}

pub async fn list_by_instructor(db: &SqlitePool, instructor_id: i64) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT * FROM course WHERE instructor_id = ? ORDER BY created_at DESC",
    )
    .bind(instructor_id)
    .fetch_all(db)
    .await?;
    Ok(courses)
}

/// Number of active enrollments, shown on course detail pages.
pub async fn enrolled_count(db: &SqlitePool, course_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollment WHERE course_id = ? AND is_active = 1",
    )
    .bind(course_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}
