//! Where the GitHub token lives between runs.

use crate::errors::AppError;

pub mod keyring;

pub trait AuthProvider {
    fn get_token(&self) -> Result<String, AppError>;
    fn set_token(&self, token: &str) -> Result<(), AppError>;
}
