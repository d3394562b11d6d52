use askama::Template;
use formgate_intake::Notification;
use formgate_shared::form::{ContactRequest, FormSubmission, QuoteRequest};

// Rendered in the header lines of the quote email.
const QUOTE_HEADER_FIELDS: [&str; 2] = ["equipmentType", "name"];

#[derive(Template)]
#[template(path = "contact.txt")]
pub struct ContactTemplate<'a> {
    pub submission_id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

#[derive(Template)]
#[template(path = "quote.txt")]
pub struct QuoteTemplate<'a> {
    pub quote_id: String,
    pub equipment_type: &'a str,
    pub name: &'a str,
    pub fields: Vec<(&'a str, String)>,
}

/// Subject line and plain-text body of a notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub body: String,
}

pub fn render(message: &Notification) -> Result<Email, askama::Error> {
    match &message.submission {
        FormSubmission::Contact(contact) => render_contact(message, contact),
        FormSubmission::Quote(quote) => render_quote(message, quote),
    }
}

fn render_contact(
    message: &Notification,
    contact: &ContactRequest,
) -> Result<Email, askama::Error> {
    let body = ContactTemplate {
        submission_id: message.submission_id.as_str(),
        name: &contact.name,
        email: &contact.email,
        phone: &contact.phone,
        subject: &contact.subject,
        message: &contact.message,
    }
    .render()?;

    Ok(Email {
        subject: format!("Contact: {}", contact.subject),
        body,
    })
}

fn render_quote(message: &Notification, quote: &QuoteRequest) -> Result<Email, askama::Error> {
    let quote_id = message.submission_id.quote_id();
    let equipment_type = quote.text("equipmentType").unwrap_or("unspecified");
    let fields = quote
        .fields
        .iter()
        .filter(|(key, _)| !QUOTE_HEADER_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();

    let body = QuoteTemplate {
        quote_id: quote_id.clone(),
        equipment_type,
        name: quote.text("name").unwrap_or_default(),
        fields,
    }
    .render()?;

    Ok(Email {
        subject: format!("Quote request {quote_id}: {equipment_type}"),
        body,
    })
}
