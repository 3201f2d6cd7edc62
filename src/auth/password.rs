//! bcrypt hashing, run on the blocking pool so the executor stays free.

use tokio::sync::OnceCell;

use crate::error::AppError;

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Hash of a throwaway password at `cost`, built once per process. Verifying
/// against it costs the same as verifying a real account's hash.
async fn dummy_hash(cost: u32) -> Result<&'static str, AppError> {
    DUMMY_HASH
        .get_or_try_init(|| hash_password("not-an-account".to_string(), cost))
        .await
        .map(String::as_str)
}

/// Burns one bcrypt verification for a login whose email matched no account,
/// so unknown and known emails take the same time to reject. Always `false`.
pub async fn verify_unknown_account(password: String, cost: u32) -> Result<bool, AppError> {
    let hash = dummy_hash(cost).await?.to_string();
    verify_password(password, hash).await?;
    Ok(false)
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {e}")))?;

    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash could not be parsed");
            Ok(false)
        }
    }
}
