use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;

/// What the pages show about the logged-in user.
#[derive(sqlx::FromRow, Debug)]
pub struct CurrentUser {
    pub nome: String,
}

impl CurrentUser {
    pub async fn fetch(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, AppError> {
        sqlx::query_as::<_, CurrentUser>(
            "SELECT nome FROM utenti WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch current user", e))
    }
}

#[derive(sqlx::FromRow, Debug)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password: String,
}

pub struct NewUser {
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub password_hash: String,
    pub data_nascita: Option<NaiveDate>,
    pub sesso: Option<String>,
}
