//! Data models for the library server

pub mod author;
pub mod book;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use author::Author;
pub use book::Book;
pub use loan::{Loan, LoanFilter, NewLoan};
pub use member::Member;
