//! Loan endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, ExtendDueDate, Loan, LoanFilter, UpdateLoan},
    AppState,
};

use super::{Envelope, Json, Query};

/// Documented shape of the extension body; parsed leniently by `ExtendDueDate::from_json`
#[derive(ToSchema)]
pub struct ExtendDueDateRequest {
    /// Days to add, at most `MAX_EXTENSION_DAYS`
    pub loan_number: i64,
}

/// List loans, optionally filtered
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanFilter),
    responses(
        (status = 200, description = "Matching loans", body = Vec<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    Query(filter): Query<LoanFilter>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list(&filter).await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_by_id(id).await?;
    Ok(Json(loan))
}

/// Create a loan; same rules as the book loan action
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "No available copies, or book or member does not exist", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state
        .services
        .loans
        .create_loan(request.book_id, request.member_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Update a loan's due date
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = Loan),
        (status = 400, description = "Invalid due date"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn update_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(data): Json<UpdateLoan>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.update(id, &data).await?;
    Ok(Json(loan))
}

/// Delete a returned loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 400, description = "Loan is still active"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.loans.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Extend the due date by `loan_number` days
#[utoipa::path(
    post,
    path = "/loans/{id}/extend_due_date",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = ExtendDueDateRequest,
    responses(
        (status = 200, description = "`{data: Loan, status: \"Due date extended successfully.\"}`"),
        (status = 400, description = "Invalid extension, or loan does not exist", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_due_date(
    State(state): State<AppState>,
    Path(loan_id): Path<i32>,
    Json(body): Json<Value>,
) -> AppResult<Json<Envelope<Loan>>> {
    let extension = ExtendDueDate::from_json(&body)?;
    let loan = state
        .services
        .loans
        .extend_due_date(loan_id, extension.loan_number)
        .await?;

    Ok(Json(
        Envelope::data(loan).with_status("Due date extended successfully."),
    ))
}
