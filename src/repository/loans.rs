//! Loans repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::LoanStore;
use crate::{
    error::{AppError, AppResult, LoanError},
    models::{
        book::Book,
        loan::{Loan, LoanFilter, NewLoan},
    },
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Error for a guarded loan update that matched no row
    async fn inactive_or_missing(&self, id: i32) -> AppError {
        let found = sqlx::query_scalar::<_, bool>("SELECT is_returned FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        match found {
            Ok(Some(_)) => LoanError::LoanAlreadyReturned.into(),
            Ok(None) => AppError::NotFound(format!("Loan with id {} not found", id)),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    async fn find(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM loans WHERE TRUE");

        if let Some(book_id) = filter.book_id {
            builder.push(" AND book_id = ").push_bind(book_id);
        }
        if let Some(member_id) = filter.member_id {
            builder.push(" AND member_id = ").push_bind(member_id);
        }
        if let Some(is_returned) = filter.is_returned {
            builder.push(" AND is_returned = ").push_bind(is_returned);
        }
        builder.push(" ORDER BY due_date, id");

        let loans = builder
            .build_query_as::<Loan>()
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn extend_due_date(&self, id: i32, days: u64) -> AppResult<Loan> {
        let days = i32::try_from(days)
            .map_err(|_| AppError::field("loan_number", "Due date would be out of range."))?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET due_date = due_date + $2
            WHERE id = $1 AND is_returned = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(days)
        .fetch_optional(&self.pool)
        .await?;

        match loan {
            Some(loan) => Ok(loan),
            None => Err(self.inactive_or_missing(id).await),
        }
    }

    async fn set_due_date(&self, id: i32, due_date: NaiveDate) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET due_date = $2
            WHERE id = $1 AND is_returned = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(due_date)
        .fetch_optional(&self.pool)
        .await?;

        match loan {
            Some(loan) => Ok(loan),
            None => Err(self.inactive_or_missing(id).await),
        }
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    async fn record_checkout(&self, loan: &NewLoan) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;

        // Guarded decrement: a concurrent checkout that took the last copy
        // leaves zero rows to update.
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies >= 1
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanError::NoAvailableCopies)?;

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, member_id, loan_date, due_date, is_returned)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.member_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((created, book))
    }

    async fn record_return(&self, loan_id: i32, return_date: NaiveDate) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET is_returned = TRUE, return_date = $2
            WHERE id = $1 AND is_returned = FALSE
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(return_date)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanError::ActiveLoanNotFound)?;

        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET available_copies = available_copies + 1 WHERE id = $1 RETURNING *",
        )
        .bind(loan.book_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((loan, book))
    }
}
