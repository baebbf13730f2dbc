//! Author model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Author record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub biography: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Create author request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAuthor {
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub last_name: String,
    pub biography: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Update author request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAuthor {
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub last_name: Option<String>,
    pub biography: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, data: &UpdateAuthor) {
        if let Some(ref v) = data.first_name {
            self.first_name = v.clone();
        }
        if let Some(ref v) = data.last_name {
            self.last_name = v.clone();
        }
        if data.biography.is_some() {
            self.biography = data.biography.clone();
        }
        if data.birth_date.is_some() {
            self.birth_date = data.birth_date;
        }
    }
}
