//! Customer email delivery for order updates.
//!
//! Uses SMTP via lettre with Askama HTML and plain-text templates. Email is
//! optional: without SMTP settings the admin runs with in-app notifications
//! only.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Template fields shared by the HTML and text order status emails.
#[derive(Debug, Clone)]
pub struct OrderStatusEmail<'a> {
    pub store_name: &'a str,
    pub customer_name: &'a str,
    pub order_number: &'a str,
    pub status_label: &'a str,
    pub note: Option<&'a str>,
    pub courier: &'a str,
    pub awb_no: Option<&'a str>,
    pub tracking_url: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    store_name: &'a str,
    customer_name: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    note: Option<&'a str>,
    courier: &'a str,
    awb_no: Option<&'a str>,
    tracking_url: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    store_name: &'a str,
    customer_name: &'a str,
    order_number: &'a str,
    status_label: &'a str,
    note: Option<&'a str>,
    courier: &'a str,
    awb_no: Option<&'a str>,
    tracking_url: Option<&'a str>,
}

impl<'a> From<&OrderStatusEmail<'a>> for OrderStatusHtml<'a> {
    fn from(e: &OrderStatusEmail<'a>) -> Self {
        Self {
            store_name: e.store_name,
            customer_name: e.customer_name,
            order_number: e.order_number,
            status_label: e.status_label,
            note: e.note,
            courier: e.courier,
            awb_no: e.awb_no,
            tracking_url: e.tracking_url,
        }
    }
}

impl<'a> From<&OrderStatusEmail<'a>> for OrderStatusText<'a> {
    fn from(e: &OrderStatusEmail<'a>) -> Self {
        Self {
            store_name: e.store_name,
            customer_name: e.customer_name,
            order_number: e.order_number,
            status_label: e.status_label,
            note: e.note,
            courier: e.courier,
            awb_no: e.awb_no,
            tracking_url: e.tracking_url,
        }
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Tell a customer their order changed status.
    ///
    /// # Errors
    ///
    /// Returns error if a template fails to render or delivery fails.
    pub async fn send_order_status(
        &self,
        to: &str,
        email: &OrderStatusEmail<'_>,
    ) -> Result<(), EmailError> {
        let html = OrderStatusHtml::from(email).render()?;
        let text = OrderStatusText::from(email).render()?;
        let subject = format!(
            "{}: order {} is {}",
            email.store_name,
            email.order_number,
            email.status_label.to_lowercase()
        );

        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "Email sent");
        Ok(())
    }
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shipped<'a>() -> OrderStatusEmail<'a> {
        OrderStatusEmail {
            store_name: "Kedai",
            customer_name: "Aminah",
            order_number: "KD-20250304-ABC123",
            status_label: "Shipped",
            note: None,
            courier: "Pos Laju",
            awb_no: Some("ER123MY"),
            tracking_url: Some("https://track.example/ER123MY"),
        }
    }

    #[test]
    fn test_text_includes_tracking() {
        let text = OrderStatusText::from(&shipped()).render().unwrap();
        assert!(text.contains("KD-20250304-ABC123 is now Shipped"));
        assert!(text.contains("Tracking number: ER123MY"));
        assert!(text.contains("https://track.example/ER123MY"));
    }

    #[test]
    fn test_html_escapes_note() {
        let mut email = shipped();
        email.note = Some("<b>fragile</b>");
        let html = OrderStatusHtml::from(&email).render().unwrap();
        assert!(html.contains("&lt;b&gt;fragile"));
        assert!(!html.contains("<b>fragile"));
    }

    #[test]
    fn test_text_without_shipment() {
        let mut email = shipped();
        email.awb_no = None;
        email.tracking_url = None;
        let text = OrderStatusText::from(&email).render().unwrap();
        assert!(!text.contains("Tracking number"));
    }
}
