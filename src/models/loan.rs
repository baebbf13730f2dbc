//! Loan model and related types

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Longest single due-date extension accepted, in days
pub const MAX_EXTENSION_DAYS: i64 = 3650;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub is_returned: bool,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        !self.is_returned
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.due_date < today
    }
}

/// A loan about to be recorded; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl NewLoan {
    /// Loan starting `today`, due `duration_days` later
    pub fn starting(book_id: i32, member_id: i32, today: NaiveDate, duration_days: u32) -> Self {
        let due_date = today
            .checked_add_days(Days::new(u64::from(duration_days)))
            .unwrap_or(NaiveDate::MAX);

        Self {
            book_id,
            member_id,
            loan_date: today,
            due_date,
        }
    }
}

/// Predicate over loans; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanFilter {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub is_returned: Option<bool>,
}

impl LoanFilter {
    /// Active loans of one member
    pub fn active_for_member(member_id: i32) -> Self {
        Self {
            member_id: Some(member_id),
            is_returned: Some(false),
            ..Default::default()
        }
    }

    /// The active loan of a book held by a member
    pub fn active_for(book_id: i32, member_id: i32) -> Self {
        Self {
            book_id: Some(book_id),
            member_id: Some(member_id),
            is_returned: Some(false),
        }
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        self.book_id.map_or(true, |id| loan.book_id == id)
            && self.member_id.map_or(true, |id| loan.member_id == id)
            && self.is_returned.map_or(true, |r| loan.is_returned == r)
    }
}

/// Create loan request (`POST /loans`)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub book_id: i32,
    pub member_id: i32,
}

/// Update loan request; only the due date is editable
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateLoan {
    pub due_date: Option<NaiveDate>,
}

/// Validated due-date extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct ExtendDueDate {
    #[validate(range(min = 0, max = MAX_EXTENSION_DAYS))]
    pub loan_number: i64,
}

impl ExtendDueDate {
    /// Read the `loan_number` field of a raw request body.
    ///
    /// Accepts JSON integers and integer strings; anything else is a field error.
    pub fn from_json(body: &Value) -> AppResult<Self> {
        let raw = body
            .get("loan_number")
            .filter(|v| !v.is_null())
            .ok_or_else(|| AppError::field("loan_number", "This field is required."))?;

        let loan_number = match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| AppError::field("loan_number", "A valid integer is required."))?;

        let extension = Self { loan_number };
        extension.validate()?;
        Ok(extension)
    }

    pub fn days(&self) -> u64 {
        self.loan_number as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn field_messages(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(mut fields) => fields.remove("loan_number").unwrap_or_default(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_loan_due_date() {
        let loan = NewLoan::starting(1, 2, date(2024, 2, 20), 14);
        assert_eq!(loan.loan_date, date(2024, 2, 20));
        assert_eq!(loan.due_date, date(2024, 3, 5));
    }

    #[test]
    fn test_filter_matches() {
        let loan = Loan {
            id: 1,
            book_id: 3,
            member_id: 4,
            loan_date: date(2024, 1, 1),
            due_date: date(2024, 1, 15),
            return_date: None,
            is_returned: false,
        };
        assert!(LoanFilter::default().matches(&loan));
        assert!(LoanFilter::active_for(3, 4).matches(&loan));
        assert!(LoanFilter::active_for_member(4).matches(&loan));
        assert!(!LoanFilter::active_for(3, 5).matches(&loan));

        let returned = Loan { is_returned: true, ..loan };
        assert!(!LoanFilter::active_for(3, 4).matches(&returned));
    }

    #[test]
    fn test_overdue() {
        let loan = Loan {
            id: 1,
            book_id: 1,
            member_id: 1,
            loan_date: date(2024, 1, 1),
            due_date: date(2024, 1, 15),
            return_date: None,
            is_returned: false,
        };
        assert!(!loan.is_overdue(date(2024, 1, 15)));
        assert!(loan.is_overdue(date(2024, 1, 16)));
    }

    #[test]
    fn test_extension_accepts_integers() {
        let ext = ExtendDueDate::from_json(&json!({ "loan_number": 7 })).unwrap();
        assert_eq!(ext.days(), 7);

        let ext = ExtendDueDate::from_json(&json!({ "loan_number": "3" })).unwrap();
        assert_eq!(ext.days(), 3);

        let ext = ExtendDueDate::from_json(&json!({ "loan_number": 0 })).unwrap();
        assert_eq!(ext.days(), 0);
    }

    #[test]
    fn test_extension_rejects_bad_input() {
        let msgs = field_messages(ExtendDueDate::from_json(&json!({})).unwrap_err());
        assert_eq!(msgs, vec!["This field is required."]);

        let msgs = field_messages(ExtendDueDate::from_json(&json!({ "loan_number": "abc" })).unwrap_err());
        assert_eq!(msgs, vec!["A valid integer is required."]);

        let msgs = field_messages(ExtendDueDate::from_json(&json!({ "loan_number": 2.5 })).unwrap_err());
        assert_eq!(msgs, vec!["A valid integer is required."]);

        let msgs = field_messages(ExtendDueDate::from_json(&json!({ "loan_number": -1 })).unwrap_err());
        assert_eq!(msgs, vec!["Ensure this value is between 0 and 3650."]);

        let msgs = field_messages(
            ExtendDueDate::from_json(&json!({ "loan_number": MAX_EXTENSION_DAYS + 1 })).unwrap_err(),
        );
        assert_eq!(msgs, vec![format!("Ensure this value is between 0 and {}.", MAX_EXTENSION_DAYS)]);
    }
}
