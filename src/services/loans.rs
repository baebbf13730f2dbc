//! Loan lifecycle service

use chrono::{NaiveDate, Utc};
use validator::Validate;

use super::notifications::NotificationDispatcher;
use crate::{
    error::{AppError, AppResult, LoanError},
    models::loan::{ExtendDueDate, Loan, LoanFilter, NewLoan, UpdateLoan},
    repository::Repository,
};

/// Stateless orchestrator for loan, return and due-date extension
#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    notifications: NotificationDispatcher,
    loan_duration_days: u32,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Replace a store `NotFound` with the domain error for the missing record
fn missing(err: AppError, replacement: LoanError) -> AppError {
    match err {
        AppError::NotFound(_) => replacement.into(),
        other => other,
    }
}

impl LoansService {
    pub fn new(
        repository: Repository,
        notifications: NotificationDispatcher,
        loan_duration_days: u32,
    ) -> Self {
        Self {
            repository,
            notifications,
            loan_duration_days,
        }
    }

    /// Lend a copy of a book to a member
    pub async fn create_loan(&self, book_id: i32, member_id: i32) -> AppResult<Loan> {
        let book = self
            .repository
            .books
            .get_by_id(book_id)
            .await
            .map_err(|e| missing(e, LoanError::BookNotFound(book_id)))?;

        if book.available_copies < 1 {
            return Err(LoanError::NoAvailableCopies.into());
        }

        self.repository
            .members
            .get_by_id(member_id)
            .await
            .map_err(|e| missing(e, LoanError::MemberNotFound(member_id)))?;

        let new_loan = NewLoan::starting(book_id, member_id, today(), self.loan_duration_days);
        let (loan, book) = self.repository.loans.record_checkout(&new_loan).await?;

        tracing::info!(
            loan_id = loan.id,
            book_id,
            member_id,
            available_copies = book.available_copies,
            "Book loaned"
        );

        self.notifications.dispatch(loan.id);

        Ok(loan)
    }

    /// Close the member's active loan of a book
    pub async fn return_loan(&self, book_id: i32, member_id: i32) -> AppResult<Loan> {
        let active = self
            .repository
            .loans
            .find(&LoanFilter::active_for(book_id, member_id))
            .await?
            .into_iter()
            .next()
            .ok_or(LoanError::ActiveLoanNotFound)?;

        let returned_on = today();
        let overdue = active.is_overdue(returned_on);
        let (loan, book) = self.repository.loans.record_return(active.id, returned_on).await?;

        if book.available_copies > book.total_copies {
            tracing::warn!(
                book_id,
                available_copies = book.available_copies,
                total_copies = book.total_copies,
                "Available copies exceed total copies after return"
            );
        }

        tracing::info!(loan_id = loan.id, book_id, member_id, overdue, "Book returned");

        Ok(loan)
    }

    /// Push an active loan's due date back by `extension_days`
    pub async fn extend_due_date(&self, loan_id: i32, extension_days: i64) -> AppResult<Loan> {
        let extension = ExtendDueDate {
            loan_number: extension_days,
        };
        extension.validate()?;

        let loan = self
            .repository
            .loans
            .extend_due_date(loan_id, extension.days())
            .await
            .map_err(|e| missing(e, LoanError::LoanNotFound(loan_id)))?;

        tracing::info!(loan_id, due_date = %loan.due_date, "Loan due date extended");

        Ok(loan)
    }

    /// Active loans of a member
    pub async fn member_loans(&self, member_id: i32) -> AppResult<Vec<Loan>> {
        self.repository
            .members
            .get_by_id(member_id)
            .await
            .map_err(|e| missing(e, LoanError::MemberNotFound(member_id)))?;

        self.repository
            .loans
            .find(&LoanFilter::active_for_member(member_id))
            .await
    }

    pub async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        self.repository.loans.find(filter).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    /// Edit an active loan's due date directly
    pub async fn update(&self, id: i32, data: &UpdateLoan) -> AppResult<Loan> {
        let loan = self.repository.loans.get_by_id(id).await?;

        let Some(due_date) = data.due_date else {
            return Ok(loan);
        };
        if due_date < loan.loan_date {
            return Err(AppError::field(
                "due_date",
                "Due date cannot be earlier than the loan date.",
            ));
        }

        self.repository.loans.set_due_date(id, due_date).await
    }

    /// Delete a closed loan; active loans have to be returned first
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let loan = self.repository.loans.get_by_id(id).await?;
        if loan.is_active() {
            return Err(LoanError::LoanStillActive.into());
        }
        self.repository.loans.delete(id).await
    }
}
