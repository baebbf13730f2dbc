//! Member (borrower) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub membership_date: NaiveDate,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    /// Defaults to today
    pub membership_date: Option<NaiveDate>,
}

/// Update member request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "This field may not be blank."))]
    pub last_name: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    pub membership_date: Option<NaiveDate>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, data: &UpdateMember) {
        if let Some(ref v) = data.first_name {
            self.first_name = v.clone();
        }
        if let Some(ref v) = data.last_name {
            self.last_name = v.clone();
        }
        if let Some(ref v) = data.email {
            self.email = v.clone();
        }
        if data.phone.is_some() {
            self.phone = data.phone.clone();
        }
        if let Some(v) = data.membership_date {
            self.membership_date = v;
        }
    }
}
