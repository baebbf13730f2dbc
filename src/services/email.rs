//! Email delivery of loan notifications

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use super::notifications::LoanNotifier;
use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{Book, Loan, Member},
    repository::Repository,
};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
    repository: Repository,
}

impl EmailService {
    pub fn new(config: EmailConfig, repository: Repository) -> Self {
        Self { config, repository }
    }

    fn loan_message(member: &Member, book: &Book, loan: &Loan) -> (String, String) {
        let subject = format!("You borrowed \"{}\"", book.title);
        let body = format!(
            r#"
Hello {name},

You borrowed "{title}" on {loan_date}.
Please return it by {due_date}.

Thank you for using the library.
"#,
            name = member.full_name(),
            title = book.title,
            loan_date = loan.loan_date.format("%Y-%m-%d"),
            due_date = loan.due_date.format("%Y-%m-%d"),
        );
        (subject, body)
    }

    /// Generic email sending function
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><pre>{}</pre></body></html>"#,
                                body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) = (
            &self.config.smtp_username,
            &self.config.smtp_password,
        ) {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        let mailer = mailer_builder.build();

        // SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl LoanNotifier for EmailService {
    async fn notify(&self, loan_id: i32) -> AppResult<()> {
        let loan = self.repository.loans.get_by_id(loan_id).await?;
        let book = self.repository.books.get_by_id(loan.book_id).await?;
        let member = self.repository.members.get_by_id(loan.member_id).await?;

        let (subject, body) = Self::loan_message(&member, &book, &loan);
        self.send_email(&member.email, &subject, &body).await?;

        tracing::info!(loan_id, to = %member.email, "Loan notification emailed");
        Ok(())
    }
}
