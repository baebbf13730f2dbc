//! In-process store.
//!
//! All tables sit behind one lock, so the two-record loan writes are atomic
//! exactly like their SQL transaction counterparts.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{AuthorStore, BookStore, LoanStore, MemberStore};
use crate::{
    error::{AppError, AppResult, LoanError},
    models::{
        author::{Author, CreateAuthor, UpdateAuthor},
        book::{page_offset, Book, CreateBook, UpdateBook},
        loan::{Loan, LoanFilter, NewLoan},
        member::{CreateMember, Member, UpdateMember},
    },
};

#[derive(Default)]
struct Tables {
    authors: BTreeMap<i32, Author>,
    books: BTreeMap<i32, Book>,
    members: BTreeMap<i32, Member>,
    loans: BTreeMap<i32, Loan>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.members
            .values()
            .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id) != except)
    }

    fn active_loan_mut(&mut self, id: i32) -> AppResult<&mut Loan> {
        match self.loans.get_mut(&id) {
            Some(loan) if loan.is_active() => Ok(loan),
            Some(_) => Err(LoanError::LoanAlreadyReturned.into()),
            None => Err(AppError::NotFound(format!("Loan with id {} not found", id))),
        }
    }

    fn any_active(&self, held: impl Fn(&Loan) -> bool) -> bool {
        self.loans.values().any(|l| l.is_active() && held(l))
    }

    fn drop_book(&mut self, id: i32) {
        self.books.remove(&id);
        self.loans.retain(|_, l| l.book_id != id);
    }
}

/// Memory-backed implementation of every store trait
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Author>> {
        let tables = self.tables.read().await;
        let mut authors: Vec<Author> = tables.authors.values().cloned().collect();
        authors.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(authors)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        self.tables
            .read()
            .await
            .authors
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    async fn create(&self, data: &CreateAuthor) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        let author = Author {
            id: tables.next_id(),
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            biography: data.biography.clone(),
            birth_date: data.birth_date,
        };
        tables.authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn update(&self, id: i32, data: &UpdateAuthor) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        let author = tables
            .authors
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))?;
        author.apply(data);
        Ok(author.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.authors.contains_key(&id) {
            return Err(AppError::NotFound(format!("Author with id {} not found", id)));
        }
        let books: Vec<i32> = tables
            .books
            .values()
            .filter(|b| b.author_id == id)
            .map(|b| b.id)
            .collect();
        if tables.any_active(|l| books.contains(&l.book_id)) {
            return Err(LoanError::LoanStillActive.into());
        }
        tables.authors.remove(&id);
        for book_id in books {
            tables.drop_book(book_id);
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self, page: i64, per_page: i64) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.read().await;
        let total = tables.books.len() as i64;
        let skip = usize::try_from(page_offset(page, per_page)).unwrap_or(usize::MAX);
        let books = tables
            .books
            .values()
            .skip(skip)
            .take(per_page.max(0) as usize)
            .cloned()
            .collect();
        Ok((books, total))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.tables.read().await.book(id).cloned()
    }

    async fn create(&self, data: &CreateBook) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        let book = Book {
            id: tables.next_id(),
            title: data.title.clone(),
            author_id: data.author_id,
            isbn: data.isbn.clone(),
            published_date: data.published_date,
            genre: data.genre.clone(),
            total_copies: data.total_copies,
            available_copies: data.available_copies.unwrap_or(data.total_copies),
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        let book = tables
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        book.apply(data);
        Ok(book.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.book(id)?;
        if tables.any_active(|l| l.book_id == id) {
            return Err(LoanError::LoanStillActive.into());
        }
        tables.drop_book(id);
        Ok(())
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Member>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Member> = tables.members.values().cloned().collect();
        members.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(members)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        self.tables
            .read()
            .await
            .members
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    async fn create(&self, data: &CreateMember) -> AppResult<Member> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&data.email, None) {
            return Err(AppError::Conflict(format!(
                "Member with email {} already exists",
                data.email
            )));
        }
        let member = Member {
            id: tables.next_id(),
            first_name: data.first_name.clone(),
            last_name: data.last_name.clone(),
            email: data.email.clone(),
            phone: data.phone.clone(),
            membership_date: data
                .membership_date
                .unwrap_or_else(|| Utc::now().date_naive()),
        };
        tables.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<Member> {
        let mut tables = self.tables.write().await;
        if let Some(ref email) = data.email {
            if tables.email_taken(email, Some(id)) {
                return Err(AppError::Conflict(
                    "A member with this email already exists".to_string(),
                ));
            }
        }
        let member = tables
            .members
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;
        member.apply(data);
        Ok(member.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.members.contains_key(&id) {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        if tables.any_active(|l| l.member_id == id) {
            return Err(LoanError::LoanStillActive.into());
        }
        tables.members.remove(&id);
        tables.loans.retain(|_, l| l.member_id != id);
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn find(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let tables = self.tables.read().await;
        let mut loans: Vec<Loan> = tables
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        loans.sort_by_key(|l| (l.due_date, l.id));
        Ok(loans)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.tables
            .read()
            .await
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn extend_due_date(&self, id: i32, days: u64) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;
        let loan = tables.active_loan_mut(id)?;
        loan.due_date = loan
            .due_date
            .checked_add_days(Days::new(days))
            .ok_or_else(|| AppError::field("loan_number", "Due date would be out of range."))?;
        Ok(loan.clone())
    }

    async fn set_due_date(&self, id: i32, due_date: NaiveDate) -> AppResult<Loan> {
        let mut tables = self.tables.write().await;
        let loan = tables.active_loan_mut(id)?;
        loan.due_date = due_date;
        Ok(loan.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.loans.remove(&id).is_none() {
            return Err(AppError::NotFound(format!("Loan with id {} not found", id)));
        }
        Ok(())
    }

    async fn record_checkout(&self, loan: &NewLoan) -> AppResult<(Loan, Book)> {
        let mut tables = self.tables.write().await;

        let book = match tables.books.get_mut(&loan.book_id) {
            Some(book) if book.available_copies >= 1 => {
                book.available_copies -= 1;
                book.clone()
            }
            _ => return Err(LoanError::NoAvailableCopies.into()),
        };

        let created = Loan {
            id: tables.next_id(),
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            is_returned: false,
        };
        tables.loans.insert(created.id, created.clone());

        Ok((created, book))
    }

    async fn record_return(&self, loan_id: i32, return_date: NaiveDate) -> AppResult<(Loan, Book)> {
        let mut tables = self.tables.write().await;

        let book_id = match tables.loans.get(&loan_id) {
            Some(loan) if loan.is_active() => loan.book_id,
            _ => return Err(LoanError::ActiveLoanNotFound.into()),
        };
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or_else(|| AppError::Internal(format!("Loan {} references missing book {}", loan_id, book_id)))?;
        book.available_copies += 1;
        let book = book.clone();

        let loan = tables
            .loans
            .get_mut(&loan_id)
            .ok_or(LoanError::ActiveLoanNotFound)?;
        loan.is_returned = true;
        loan.return_date = Some(return_date);

        Ok((loan.clone(), book))
    }
}
