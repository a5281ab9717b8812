use argon2::{
    Argon2, PasswordVerifier,
    password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{Error, Result, is_unique_violation};
use crate::utils::now_utc;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_instructor: bool,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Profile {
    pub user_id: i64,
    pub bio: String,
    pub website: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_instructor: bool,
    pub phone: Option<String>,
}

/// Create a user together with its profile in one transaction. The profile
/// always exists for a created user; there is no deferred hook that fills
/// it in later.
pub async fn create_user(db: &SqlitePool, new: NewUser) -> Result<i64> {
    if new.username.trim().is_empty() {
        return Err(Error::validation("username must not be empty"));
    }
    if !new.email.contains('@') {
        return Err(Error::validation("email address is invalid"));
    }
    if new.password.len() < 8 {
        return Err(Error::validation("password must be at least 8 characters"));
    }
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(new.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    let now = now_utc();
    let mut tx = db.begin().await?;
    let user_id = sqlx::query(
        "INSERT INTO user (username, email, password, first_name, last_name, is_instructor, \
         phone, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.username)
    .bind(&new.email)
    .bind(&password_hash)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(new.is_instructor)
    .bind(&new.phone)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("a user with that username or email already exists")
        } else {
            e.into()
        }
    })?
    .last_insert_rowid();
    sqlx::query("INSERT INTO profile (user_id, bio, created_at, updated_at) VALUES (?, '', ?, ?)")
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!("created user {}-{}", user_id, new.username);
    Ok(user_id)
}

pub async fn login(db: &SqlitePool, email: String, password: String) -> Result<i64> {
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM user WHERE email = ?")
            .bind(&email)
            .fetch_optional(db)
            .await?;
    let Some((id, hash)) = row else {
        return Err(Error::validation("invalid email or password"));
    };
    let parsed_hash = PasswordHash::new(&hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(Error::validation("invalid email or password"));
    }
    Ok(id)
}

pub async fn get_user_info(db: &SqlitePool, id: i64) -> Result<UserInfo> {
    sqlx::query_as::<_, UserInfo>(
        "SELECT id, username, email, first_name, last_name, is_instructor, phone \
         FROM user WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::NotFound("user"))
}

pub async fn get_profile(db: &SqlitePool, user_id: i64) -> Result<Profile> {
    sqlx::query_as::<_, Profile>("SELECT user_id, bio, website FROM profile WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(Error::NotFound("profile"))
}

/// Replace-only update: a missing field keeps the stored value, so a
/// `website` once set cannot be cleared here.
pub async fn update_profile(
    db: &SqlitePool,
    user_id: i64,
    bio: Option<String>,
    website: Option<String>,
) -> Result<Profile> {
    let profile = get_profile(db, user_id).await?;
    sqlx::query("UPDATE profile SET bio = ?, website = ?, updated_at = ? WHERE user_id = ?")
        .bind(bio.unwrap_or(profile.bio))
        .bind(website.or(profile.website))
        .bind(now_utc())
        .bind(user_id)
        .execute(db)
        .await?;
    get_profile(db, user_id).await
}

pub async fn is_instructor(db: &SqlitePool, user_id: i64) -> Result<bool> {
    let flag: Option<bool> = sqlx::query_scalar("SELECT is_instructor FROM user WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    flag.ok_or(Error::NotFound("user"))
}
