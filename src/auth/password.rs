use crate::error::AppError;
use bcrypt::hash;

const BCRYPT_COST: u32 = 12;

/// Hashes a password for the `users.password_hash` column.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}
