//! Entity Store: persistence for authors, books, members and loans.
//!
//! Each entity has a store trait; `Repository` bundles one implementation of
//! each. PostgreSQL is the production backend, `memory` keeps everything in
//! process.

pub mod authors;
pub mod books;
pub mod loans;
pub mod members;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::{Book, CreateBook, UpdateBook},
        loan::{Loan, LoanFilter, NewLoan},
        member::{CreateMember, Member, UpdateMember},
    },
};

#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Author>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Author>;
    async fn create(&self, data: &CreateAuthor) -> AppResult<Author>;
    async fn update(&self, id: i32, data: &UpdateAuthor) -> AppResult<Author>;
    /// Deletes the author's books (and their loans) as well.
    ///
    /// Refused with `LoanStillActive` while any of those books is on loan.
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// One page of books ordered by id, with the total count
    async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<Book>, i64)>;
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;
    async fn create(&self, data: &CreateBook) -> AppResult<Book>;
    async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book>;
    /// Refused with `LoanStillActive` while a copy is on loan
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Member>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Member>;
    async fn create(&self, data: &CreateMember) -> AppResult<Member>;
    async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<Member>;
    /// Deletes the member's closed loans too; refused with `LoanStillActive`
    /// while the member still holds a book
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Loans matching the filter, ordered by due date then id
    async fn find(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;
    async fn get_by_id(&self, id: i32) -> AppResult<Loan>;
    /// Push an active loan's due date back by `days`.
    ///
    /// Fails with `LoanAlreadyReturned` when the loan is closed by the time
    /// the write lands, `NotFound` when it does not exist.
    async fn extend_due_date(&self, id: i32, days: u64) -> AppResult<Loan>;
    /// Set an active loan's due date; fails like `extend_due_date`
    async fn set_due_date(&self, id: i32, due_date: NaiveDate) -> AppResult<Loan>;
    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Insert the loan and take one copy of its book, atomically.
    ///
    /// Fails with `NoAvailableCopies` without writing anything when the book
    /// has no copy left at commit time.
    async fn record_checkout(&self, loan: &NewLoan) -> AppResult<(Loan, Book)>;

    /// Close an active loan and put its copy back, atomically.
    ///
    /// Fails with `ActiveLoanNotFound` when the loan is missing or closed.
    async fn record_return(&self, loan_id: i32, return_date: NaiveDate) -> AppResult<(Loan, Book)>;
}

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    pub authors: Arc<dyn AuthorStore>,
    pub books: Arc<dyn BookStore>,
    pub members: Arc<dyn MemberStore>,
    pub loans: Arc<dyn LoanStore>,
    pool: Option<Pool<Postgres>>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: Arc::new(authors::AuthorsRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            members: Arc::new(members::MembersRepository::new(pool.clone())),
            loans: Arc::new(loans::LoansRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repository backed by an empty in-process store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            authors: store.clone(),
            books: store.clone(),
            members: store.clone(),
            loans: store,
            pool: None,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Turn a unique-constraint violation into a `Conflict`
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message()),
        _ => AppError::Database(err),
    }
}
