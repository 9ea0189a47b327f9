use super::domain::{LeadSubmission, LeadUpdate};

const MIN_FULL_NAME_CHARS: usize = 3;
const MIN_PHONE_DIGITS: usize = 8;

/// Field-level problems reported inline on the originating form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeadValidationError {
    #[error("full name must have at least 3 characters")]
    FullNameTooShort,
    #[error("email '{0}' is not a valid address")]
    InvalidEmail(String),
    #[error("phone '{0}' must contain at least 8 digits")]
    InvalidPhone(String),
}

impl LeadValidationError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            LeadValidationError::FullNameTooShort => "fullName",
            LeadValidationError::InvalidEmail(_) => "email",
            LeadValidationError::InvalidPhone(_) => "phone",
        }
    }
}

/// Contact fields after trimming and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContactFields {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) phone: Option<String>,
    pub(crate) property_id: Option<String>,
    pub(crate) message: Option<String>,
}

pub(crate) fn contact_from_submission(
    submission: &LeadSubmission,
) -> Result<ContactFields, LeadValidationError> {
    Ok(ContactFields {
        full_name: full_name(&submission.full_name)?,
        email: email(&submission.email)?,
        phone: phone(submission.phone.as_deref())?,
        property_id: optional_text(submission.property_id.as_deref()),
        message: optional_text(submission.message.as_deref()),
    })
}

/// Apply an edit on top of existing contact fields. An empty optional string clears the field.
pub(crate) fn apply_update(
    current: ContactFields,
    update: &LeadUpdate,
) -> Result<ContactFields, LeadValidationError> {
    Ok(ContactFields {
        full_name: match update.full_name.as_deref() {
            Some(value) => full_name(value)?,
            None => current.full_name,
        },
        email: match update.email.as_deref() {
            Some(value) => email(value)?,
            None => current.email,
        },
        phone: match update.phone.as_deref() {
            Some(value) => phone(Some(value))?,
            None => current.phone,
        },
        property_id: match update.property_id.as_deref() {
            Some(value) => optional_text(Some(value)),
            None => current.property_id,
        },
        message: match update.message.as_deref() {
            Some(value) => optional_text(Some(value)),
            None => current.message,
        },
    })
}

fn full_name(value: &str) -> Result<String, LeadValidationError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < MIN_FULL_NAME_CHARS {
        return Err(LeadValidationError::FullNameTooShort);
    }
    Ok(trimmed.to_string())
}

fn email(value: &str) -> Result<String, LeadValidationError> {
    let trimmed = value.trim();
    if is_well_formed_email(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(LeadValidationError::InvalidEmail(trimmed.to_string()))
    }
}

fn phone(value: Option<&str>) -> Result<Option<String>, LeadValidationError> {
    let Some(trimmed) = optional_text(value) else {
        return Ok(None);
    };

    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-' | ' ' | '.'));

    if digits < MIN_PHONE_DIGITS || !allowed {
        return Err(LeadValidationError::InvalidPhone(trimmed));
    }
    Ok(Some(trimmed))
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `local@domain.tld` with no whitespace, a single `@`, and non-empty dot-separated labels.
pub(crate) fn is_well_formed_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}
