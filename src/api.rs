pub mod instructor;
pub mod public;
pub mod user;

use sqlx::SqlitePool;
use tower_sessions::Session;
use utoipa::OpenApi;

use crate::error::{Error, Result};

pub(crate) const SESSION_USER_KEY: &str = "user_id";

/// Id of the logged-in user, or 401.
pub async fn session_user(session: &Session) -> Result<i64> {
    session
        .get::<i64>(SESSION_USER_KEY)
        .await?
        .ok_or(Error::Unauthorized)
}

/// Id of the logged-in user, who must be an instructor.
pub async fn session_instructor(db: &SqlitePool, session: &Session) -> Result<i64> {
    let user_id = session_user(session).await?;
    if !crate::user::is_instructor(db, user_id).await? {
        return Err(Error::Forbidden("instructor account required"));
    }
    Ok(user_id)
}

/// Combined spec of every scope, for the export binary.
pub fn openapi_json() -> anyhow::Result<String> {
    let mut doc = public::PublicApiDoc::openapi();
    doc.merge(user::UserApiDoc::openapi());
    doc.merge(instructor::InstructorApiDoc::openapi());
    Ok(doc.to_pretty_json()?)
}
