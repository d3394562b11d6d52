use std::{collections::BTreeMap, fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantArray};
use validator::Validate;

pub const MAX_NAME_LEN: u64 = 100;
pub const MAX_SUBJECT_LEN: u64 = 200;
pub const MAX_TEXT_LEN: u64 = 5000;

static PHONE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ().\-]+$").expect("valid phone pattern"));

/// Digits, spaces and `+ - . ( )`, with at least three digits.
pub fn is_plausible_phone(value: &str) -> bool {
    PHONE_CHARS.is_match(value.trim()) && value.chars().filter(char::is_ascii_digit).count() >= 3
}

fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    if is_plausible_phone(phone) {
        return Ok(());
    }

    Err(validator::ValidationError::new("phone"))
}

#[derive(
    EnumString,
    Display,
    VariantArray,
    AsRefStr,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Contact,
    Quote,
}

#[derive(Validate, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    #[validate(length(max = MAX_NAME_LEN))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(max = MAX_SUBJECT_LEN))]
    pub subject: String,
    #[validate(length(max = MAX_TEXT_LEN))]
    pub message: String,
}

impl ContactRequest {
    /// Required fields in the order they are checked.
    pub const FIELDS: [&'static str; 5] = ["name", "email", "phone", "subject", "message"];
}

/// Scalar value accepted in a quote request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuoteValue {
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
}

impl QuoteValue {
    /// `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Self::Flag(*flag)),
            serde_json::Value::Number(number) => Some(Self::Number(number.clone())),
            serde_json::Value::String(text) => Some(Self::Text(text.to_owned())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for QuoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => write!(f, "{}", if *flag { "yes" } else { "no" }),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub fields: BTreeMap<String, QuoteValue>,
}

impl QuoteRequest {
    pub fn get(&self, key: &str) -> Option<&QuoteValue> {
        self.fields.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(QuoteValue::as_text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormSubmission {
    Contact(ContactRequest),
    Quote(QuoteRequest),
}

impl FormSubmission {
    pub fn form_type(&self) -> FormType {
        match self {
            Self::Contact(_) => FormType::Contact,
            Self::Quote(_) => FormType::Quote,
        }
    }

    /// Stable byte encoding used for content hashing. Struct fields serialize
    /// in declaration order and quote fields are kept sorted.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn sender_name(&self) -> Option<&str> {
        match self {
            Self::Contact(contact) => Some(&contact.name),
            Self::Quote(quote) => quote.text("name"),
        }
    }

    pub fn sender_email(&self) -> Option<&str> {
        match self {
            Self::Contact(contact) => Some(&contact.email),
            Self::Quote(quote) => quote.text("email"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("malformed field `{0}`")]
    MalformedField(String),
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field) | Self::MalformedField(field) => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_shapes() {
        assert!(is_plausible_phone("555"));
        assert!(is_plausible_phone("+1 (555) 010-2030"));
        assert!(!is_plausible_phone("55"));
        assert!(!is_plausible_phone("call me"));
        assert!(!is_plausible_phone("555-CALL"));
    }

    #[test]
    fn form_type_round_trips_through_strum() {
        assert_eq!(FormType::Quote.to_string(), "quote");
        assert_eq!("contact".parse::<FormType>().ok(), Some(FormType::Contact));
    }

    #[test]
    fn canonical_bytes_ignore_insertion_order() {
        let mut first = QuoteRequest::default();
        first
            .fields
            .insert("name".to_owned(), QuoteValue::Text("A".to_owned()));
        first.fields.insert("urgent".to_owned(), QuoteValue::Flag(true));

        let mut second = QuoteRequest::default();
        second.fields.insert("urgent".to_owned(), QuoteValue::Flag(true));
        second
            .fields
            .insert("name".to_owned(), QuoteValue::Text("A".to_owned()));

        assert_eq!(
            FormSubmission::Quote(first).canonical_bytes().unwrap(),
            FormSubmission::Quote(second).canonical_bytes().unwrap()
        );
    }
}
