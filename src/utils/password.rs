use actix_web::rt::task::spawn_blocking;
use bcrypt::{hash, verify};
use lazy_static::lazy_static;

use crate::errors::AppError;

pub const BCRYPT_COST: u32 = 10;

lazy_static! {
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DUMMY_HASH: String = hash("fittracker-unknown-account", BCRYPT_COST).unwrap_or_default();
}

pub async fn hash_password(password: String) -> Result<String, AppError> {
    spawn_blocking(move || hash(&password, BCRYPT_COST))
        .await
        .map_err(|_| AppError::InternalServerError("Hashing failed".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    spawn_blocking(move || verify(password.as_str(), &stored_hash))
        .await
        .map_err(|_| AppError::InternalServerError("Password verification error".to_string()))?
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub async fn verify_against_dummy(password: String) {
    let _ = verify_password(password, DUMMY_HASH.clone()).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn stored_hash_verifies_submitted_password() {
        let stored = hash_password("correct horse".to_string()).await.unwrap();
        assert_ne!(stored, "correct horse");
        assert!(verify_password("correct horse".to_string(), stored.clone()).await.unwrap());
        assert!(!verify_password("wrong horse".to_string(), stored).await.unwrap());
    }

    #[actix_web::test]
    async fn corrupt_hash_is_an_internal_error() {
        let result = verify_password("whatever".to_string(), "not-a-hash".to_string()).await;
        assert!(matches!(result, Err(AppError::InternalServerError(_))));
    }
}
