//! Book endpoints, including the loan and return actions

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookPage, BookQuery, CreateBook, UpdateBook},
        loan::Loan,
    },
    AppState,
};

use super::{Envelope, Json, Query};

/// Body of the loan and return actions
#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberAction {
    /// Borrowing member
    pub member_id: Option<i32>,
}

impl MemberAction {
    fn member_id(&self) -> AppResult<i32> {
        self.member_id
            .ok_or_else(|| AppError::field("member_id", "This field is required."))
    }
}

/// List books, one page at a time
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = BookPage)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let page = state.services.catalog.list_books(&query).await?;
    Ok(Json(page))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(data): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(&data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update_book(id, &data).await?;
    Ok(Json(book))
}

/// Delete book and its loans
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lend a copy of the book to a member
#[utoipa::path(
    post,
    path = "/books/{id}/loan",
    tag = "loans",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = MemberAction,
    responses(
        (status = 201, description = "`{status: \"Book loaned successfully.\", data: Loan}`"),
        (status = 400, description = "No available copies, or member does not exist", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_book(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Json(body): Json<MemberAction>,
) -> AppResult<(StatusCode, Json<Envelope<Loan>>)> {
    let member_id = body.member_id()?;
    let loan = state.services.loans.create_loan(book_id, member_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(loan).with_status("Book loaned successfully.")),
    ))
}

/// Return the member's copy of the book
#[utoipa::path(
    post,
    path = "/books/{id}/return_book",
    tag = "loans",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = MemberAction,
    responses(
        (status = 200, description = "`{status: \"Book returned successfully.\", data: Loan}`"),
        (status = 400, description = "Active loan does not exist", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Path(book_id): Path<i32>,
    Json(body): Json<MemberAction>,
) -> AppResult<Json<Envelope<Loan>>> {
    let member_id = body.member_id()?;
    let loan = state.services.loans.return_loan(book_id, member_id).await?;

    Ok(Json(
        Envelope::data(loan).with_status("Book returned successfully."),
    ))
}
