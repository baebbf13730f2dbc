//! Book model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub genre: Option<String>,
    /// Physical copies owned by the library
    pub total_copies: i32,
    /// Copies not currently on loan
    pub available_copies: i32,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "This field may not be blank."))]
    pub title: String,
    pub author_id: i32,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 or 13 characters."))]
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub available_copies: Option<i32>,
}

/// Update book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "This field may not be blank."))]
    pub title: Option<String>,
    pub author_id: Option<i32>,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 or 13 characters."))]
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub available_copies: Option<i32>,
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// One page of books
#[derive(Debug, Serialize, ToSchema)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Rows skipped before `page`; saturates rather than overflowing
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(per_page.max(0))
}

/// Reject inventories where more copies are available than owned
pub fn check_inventory(available_copies: i32, total_copies: i32) -> AppResult<()> {
    if available_copies > total_copies {
        return Err(AppError::field(
            "available_copies",
            "Available copies cannot exceed total copies.",
        ));
    }
    Ok(())
}

impl Book {
    /// Apply a partial update in place
    pub fn apply(&mut self, data: &UpdateBook) {
        if let Some(ref v) = data.title {
            self.title = v.clone();
        }
        if let Some(v) = data.author_id {
            self.author_id = v;
        }
        if data.isbn.is_some() {
            self.isbn = data.isbn.clone();
        }
        if data.published_date.is_some() {
            self.published_date = data.published_date;
        }
        if data.genre.is_some() {
            self.genre = data.genre.clone();
        }
        if let Some(v) = data.total_copies {
            self.total_copies = v;
        }
        if let Some(v) = data.available_copies {
            self.available_copies = v;
        }
    }
}
