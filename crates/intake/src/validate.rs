use std::collections::BTreeMap;

use formgate_shared::form::{
    ContactRequest, FormSubmission, FormType, MAX_TEXT_LEN, QuoteRequest, QuoteValue,
    ValidationError, is_plausible_phone,
};
use serde_json::{Map, Value};
use validator::{Validate, ValidateEmail};

/// Untyped key/value body of a form post.
pub type RawPayload = Map<String, Value>;

pub const DEFAULT_QUOTE_FIELDS: [&str; 4] = ["equipmentType", "name", "email", "phone"];

/// Fields a quote request must carry.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteSchema {
    required: Vec<String>,
}

impl QuoteSchema {
    pub fn new(required: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

impl Default for QuoteSchema {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_FIELDS)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Validator {
    quote: QuoteSchema,
}

impl Validator {
    pub fn new(quote: QuoteSchema) -> Self {
        Self { quote }
    }

    pub fn validate(
        &self,
        raw: &RawPayload,
        form_type: FormType,
    ) -> Result<FormSubmission, ValidationError> {
        match form_type {
            FormType::Contact => validate_contact(raw).map(FormSubmission::Contact),
            FormType::Quote => self.validate_quote(raw).map(FormSubmission::Quote),
        }
    }

    fn validate_quote(&self, raw: &RawPayload) -> Result<QuoteRequest, ValidationError> {
        for field in self.quote.required() {
            if is_blank(raw.get(field)) {
                return Err(ValidationError::MissingField(field.to_owned()));
            }
        }

        let mut fields = BTreeMap::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }

            let Some(value) = QuoteValue::from_json(value) else {
                return Err(ValidationError::MalformedField(key.to_owned()));
            };

            let too_long = value
                .as_text()
                .is_some_and(|text| text.chars().count() as u64 > MAX_TEXT_LEN);
            if too_long {
                return Err(ValidationError::MalformedField(key.to_owned()));
            }

            fields.insert(key.to_owned(), value);
        }

        if let Some(email) = fields.get("email") {
            let valid = email.as_text().is_some_and(|text| text.validate_email());
            if !valid {
                return Err(ValidationError::MalformedField("email".to_owned()));
            }
        }

        if let Some(phone) = fields.get("phone") {
            let valid = match phone {
                QuoteValue::Flag(_) => false,
                other => is_plausible_phone(&other.to_string()),
            };
            if !valid {
                return Err(ValidationError::MalformedField("phone".to_owned()));
            }
        }

        Ok(QuoteRequest { fields })
    }
}

/// Validates with the default quote schema.
pub fn validate(raw: &RawPayload, form_type: FormType) -> Result<FormSubmission, ValidationError> {
    Validator::default().validate(raw, form_type)
}

fn validate_contact(raw: &RawPayload) -> Result<ContactRequest, ValidationError> {
    for field in ContactRequest::FIELDS {
        if is_blank(raw.get(field)) {
            return Err(ValidationError::MissingField(field.to_owned()));
        }
    }

    let contact = ContactRequest {
        name: text_field(raw, "name")?,
        email: text_field(raw, "email")?,
        phone: text_field(raw, "phone")?,
        subject: text_field(raw, "subject")?,
        message: text_field(raw, "message")?,
    };

    if let Err(errors) = contact.validate() {
        let field_errors = errors.field_errors();
        let field = ContactRequest::FIELDS
            .into_iter()
            .find(|field| field_errors.contains_key(*field))
            .map(ToOwned::to_owned)
            .or_else(|| field_errors.keys().next().map(|key| key.to_string()))
            .unwrap_or_default();

        return Err(ValidationError::MalformedField(field));
    }

    Ok(contact)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

fn text_field(raw: &RawPayload, field: &str) -> Result<String, ValidationError> {
    match raw.get(field) {
        Some(Value::String(text)) => Ok(text.to_owned()),
        _ => Err(ValidationError::MalformedField(field.to_owned())),
    }
}
