use thiserror::Error;

use crate::models::ItemId;

#[derive(Debug, Error)]
pub enum GroceryError {
    /// The remote collection could not be reached, or rejected the request
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The item is not present (locally, or in the remote collection)
    #[error("Item not found: {0}")]
    NotFound(ItemId),
}

pub type GroceryResult<T> = Result<T, GroceryError>;

impl From<mongodb::error::Error> for GroceryError {
    fn from(err: mongodb::error::Error) -> Self {
        GroceryError::Connection(err.to_string())
    }
}

impl From<validator::ValidationErrors> for GroceryError {
    fn from(err: validator::ValidationErrors) -> Self {
        GroceryError::Validation(err.to_string())
    }
}
