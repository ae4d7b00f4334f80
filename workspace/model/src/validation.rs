//! Validation rules for user records.
//!
//! Every rule is a pure function that inspects values and returns the
//! violations it found. Nothing here touches the database or the clock:
//! callers pass `today` in, and decide what to do with the violations.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex_lite::Regex;
use validator::{ValidateEmail, ValidationErrors};

use crate::entities::user;

/// Reference alphabet for the national ID check letter.
pub const DNI_LETTERS: &str = "TRWAGMYFPDXBNJZSQVHLCKE";

/// Users younger than this cannot register.
pub const MINIMUM_AGE_YEARS: u32 = 18;

pub const DNI_FORMAT_MESSAGE: &str = "El DNI introducido no tiene el formato correcto (entre 1 y 8 números seguidos de una letra, sin guiones y sin dejar ningún espacio en blanco)";
pub const DNI_CHECKSUM_MESSAGE: &str = "La letra no coincide con el número del DNI. Comprueba que has escrito bien tanto el número como la letra";
pub const UNDERAGE_MESSAGE: &str = "Debes tener al menos 18 años para registrarte en el sitio";
pub const NOT_BLANK_MESSAGE: &str = "This value should not be blank.";
pub const INVALID_EMAIL_MESSAGE: &str = "This value is not a valid email address.";
pub const INVALID_VALUE_MESSAGE: &str = "This value is not valid.";
pub const ALREADY_USED_MESSAGE: &str = "This value is already used.";

static DNI_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d{1,8}[a-z]$").expect("valid DNI pattern"));

static CARD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{11,19}$").expect("valid card number pattern"));

/// A single rule violation, attached to the property path it concerns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
    pub code: String,
}

impl Violation {
    pub fn new(path: &str, message: &str, code: &str) -> Self {
        Self {
            path: path.to_string(),
            message: message.to_string(),
            code: code.to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Computes the check letter for the numeric part of a national ID.
///
/// `X`, `Y` and `Z` are read as `0`, `1` and `2` before taking the modulus.
/// Returns `None` when the input is empty or has other non-digit characters.
pub fn dni_check_letter(number: &str) -> Option<char> {
    if number.is_empty() {
        return None;
    }

    let digits: String = number
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'X' => '0',
            'Y' => '1',
            'Z' => '2',
            other => other,
        })
        .collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let value: u64 = digits.parse().ok()?;
    let index = (value % DNI_LETTERS.len() as u64) as usize;
    DNI_LETTERS.chars().nth(index)
}

/// Checks a national ID, format first and then the check letter.
///
/// A malformed value yields only the format violation.
pub fn validate_dni(dni: &str) -> Vec<Violation> {
    if !DNI_SHAPE.is_match(dni) {
        return vec![Violation::new("dni", DNI_FORMAT_MESSAGE, "DNI_FORMAT")];
    }

    let (number, letter) = dni.split_at(dni.len() - 1);
    let supplied = letter.chars().next().map(|c| c.to_ascii_uppercase());

    match dni_check_letter(number) {
        Some(expected) if supplied == Some(expected) => Vec::new(),
        _ => vec![Violation::new("dni", DNI_CHECKSUM_MESSAGE, "DNI_CHECKSUM")],
    }
}

/// True when someone born on `birth_date` is at least 18 on `today`.
///
/// The 18th birthday itself counts. Someone born on 29 February reaches
/// the age on 1 March when the 18th anniversary falls in a common year.
pub fn is_adult(birth_date: NaiveDate, today: NaiveDate) -> bool {
    match today.checked_sub_months(Months::new(MINIMUM_AGE_YEARS * 12)) {
        Some(limit) => birth_date <= limit,
        None => false,
    }
}

/// Accepts 11 to 19 ASCII digits and nothing else. No checksum is applied.
pub fn is_valid_card_number(card_number: &str) -> bool {
    CARD_NUMBER.is_match(card_number)
}

fn require_not_blank(violations: &mut Vec<Violation>, path: &str, value: &str) {
    if value.trim().is_empty() {
        violations.push(Violation::new(path, NOT_BLANK_MESSAGE, "NOT_BLANK"));
    }
}

/// Field values of a user record to check. `None` skips the field.
#[derive(Clone, Debug, Default)]
pub struct UserFields<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub email: Option<&'a str>,
    pub dni: Option<&'a str>,
    pub card_number: Option<&'a str>,
    pub birth_date: Option<NaiveDate>,
}

/// Runs every entity-level rule against a user record.
pub fn validate_user(user: &user::Model, today: NaiveDate) -> Vec<Violation> {
    validate_user_fields(
        &UserFields {
            first_name: Some(&user.first_name),
            last_name: Some(&user.last_name),
            address: Some(&user.address),
            email: Some(&user.email),
            dni: Some(&user.dni),
            card_number: Some(&user.card_number),
            birth_date: Some(user.birth_date),
        },
        today,
    )
}

/// Runs the entity-level rules of the fields that are present.
pub fn validate_user_fields(fields: &UserFields<'_>, today: NaiveDate) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (path, value) in [
        ("first_name", fields.first_name),
        ("last_name", fields.last_name),
        ("address", fields.address),
    ] {
        if let Some(value) = value {
            require_not_blank(&mut violations, path, value);
        }
    }

    if let Some(email) = fields.email {
        if !email.validate_email() {
            violations.push(Violation::new("email", INVALID_EMAIL_MESSAGE, "INVALID_EMAIL"));
        }
    }

    if let Some(dni) = fields.dni {
        violations.extend(validate_dni(dni));
    }

    if let Some(card_number) = fields.card_number {
        if !is_valid_card_number(card_number) {
            violations.push(Violation::new(
                "card_number",
                INVALID_VALUE_MESSAGE,
                "INVALID_CARD_NUMBER",
            ));
        }
    }

    if let Some(birth_date) = fields.birth_date {
        if !is_adult(birth_date, today) {
            violations.push(Violation::new("birth_date", UNDERAGE_MESSAGE, "UNDERAGE"));
        }
    }

    violations
}

/// Flattens `validator` errors into violations, sorted by path.
pub fn violations_from_errors(errors: &ValidationErrors) -> Vec<Violation> {
    let mut violations: Vec<Violation> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            let path = field.to_string();
            field_errors.iter().map(move |error| Violation {
                path: path.clone(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string()),
                code: error.code.to_string(),
            })
        })
        .collect();

    violations.sort_by(|a, b| a.path.cmp(&b.path));
    violations
}
