//! Convenience result type alias for Nestly.

use crate::error::AppError;

/// A specialized `Result` type for Nestly operations.
///
/// Every crate returns `AppResult<T>` instead of spelling out
/// `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
