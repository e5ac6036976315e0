// 📐 Shape Layer - Registration input validation
//
// Checks the SHAPE of a registration request. An empty error list means
// "well-formed", not "acceptable to persist": uniqueness is checked later
// against the repository.
//
// Every rule runs independently so a caller gets the full correction list
// in one round trip.

use crate::entities::{CompanyType, TransferStatus};
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 100;

// ============================================================================
// FIELD ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ============================================================================
// REGISTRATION INPUT
// ============================================================================

/// Raw registration request as the adapter received it.
///
/// Every field is optional so "absent" can be told apart from "malformed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCompanyCommand {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    #[serde(rename = "type")]
    pub company_type: Option<String>,
    pub email: Option<String>,
}

impl RegisterCompanyCommand {
    pub fn new(name: &str, tax_id: &str, company_type: &str, email: Option<&str>) -> Self {
        RegisterCompanyCommand {
            name: Some(name.to_string()),
            tax_id: Some(tax_id.to_string()),
            company_type: Some(company_type.to_string()),
            email: email.map(str::to_string),
        }
    }

    /// Email with surrounding whitespace removed; blank counts as absent
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

fn tax_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{2}-[0-9]{8}-[0-9]$").expect("static tax id pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"))
}

/// `DD-DDDDDDDD-D`, ASCII digits only
pub fn is_valid_tax_id(tax_id: &str) -> bool {
    tax_id_pattern().is_match(tax_id)
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

// ============================================================================
// RULES
// ============================================================================

pub fn validate_name(name: Option<&str>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match name {
        None => errors.push(FieldError::new("name", "Name must be at least 3 characters")),
        Some(raw) => {
            if raw.trim().chars().count() < NAME_MIN_LEN {
                errors.push(FieldError::new("name", "Name must be at least 3 characters"));
            }
            if raw.chars().count() > NAME_MAX_LEN {
                errors.push(FieldError::new("name", "Name must not exceed 100 characters"));
            }
        }
    }

    errors
}

pub fn validate_tax_id(tax_id: Option<&str>) -> Option<FieldError> {
    match tax_id {
        None => Some(FieldError::new("taxId", "Tax ID is required")),
        Some(value) if value.is_empty() => Some(FieldError::new("taxId", "Tax ID is required")),
        Some(value) if !is_valid_tax_id(value) => Some(FieldError::new(
            "taxId",
            "Invalid tax ID format (expected: XX-XXXXXXXX-X)",
        )),
        Some(_) => None,
    }
}

/// Email is optional: absent or blank passes
pub fn validate_email(email: Option<&str>) -> Option<FieldError> {
    match email.map(str::trim) {
        None | Some("") => None,
        Some(value) if !is_valid_email(value) => {
            Some(FieldError::new("email", "Invalid email format"))
        }
        Some(_) => None,
    }
}

pub fn validate_type(company_type: Option<&str>) -> Option<FieldError> {
    match company_type.and_then(CompanyType::parse) {
        Some(_) => None,
        None => Some(FieldError::new("type", "Type must be SME or CORPORATE")),
    }
}

/// Validate a registration request. Never fails; collects every violation.
pub fn validate_registration(input: &RegisterCompanyCommand) -> Vec<FieldError> {
    let mut errors = validate_name(input.name.as_deref());
    errors.extend(validate_tax_id(input.tax_id.as_deref()));
    errors.extend(validate_email(input.email.as_deref()));
    errors.extend(validate_type(input.company_type.as_deref()));
    errors
}

// ============================================================================
// TRANSFER INPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTransferCommand {
    pub company_id: String,
    pub amount: Decimal,
    pub currency: String,
    /// Defaults to "now" when absent
    pub date: Option<DateTime<Utc>>,
    pub status: TransferStatus,
    pub description: Option<String>,
}

fn currency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{3}$").expect("static currency pattern"))
}

pub fn validate_transfer(input: &RecordTransferCommand) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if input.company_id.trim().is_empty() {
        errors.push(FieldError::new("companyId", "Company ID is required"));
    }
    if input.amount < Decimal::ZERO {
        errors.push(FieldError::new("amount", "Amount must not be negative"));
    }
    if !currency_pattern().is_match(&input.currency) {
        errors.push(FieldError::new("currency", "Currency must be a 3-letter ISO code"));
    }

    errors
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn valid_command() -> RegisterCompanyCommand {
        RegisterCompanyCommand::new(
            "Tech Solutions Inc",
            "30-12345678-9",
            "SME",
            Some("info@techsolutions.com"),
        )
    }

    #[test]
    fn test_valid_command_has_no_errors() {
        assert!(validate_registration(&valid_command()).is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let cmd = RegisterCompanyCommand::new("AB", "invalid", "INVALID", None);
        let errors = validate_registration(&cmd);

        assert_eq!(errors.len(), 3);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "taxId", "type"]);
        assert_eq!(errors[0].message, "Name must be at least 3 characters");
        assert_eq!(errors[1].message, "Invalid tax ID format (expected: XX-XXXXXXXX-X)");
        assert_eq!(errors[2].message, "Type must be SME or CORPORATE");
    }

    #[test]
    fn test_absent_fields() {
        let errors = validate_registration(&RegisterCompanyCommand::default());

        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.message == "Tax ID is required"));
        // Email stays optional
        assert!(!errors.iter().any(|e| e.field == "email"));
    }

    #[test]
    fn test_name_is_trimmed_for_min_length() {
        let mut cmd = valid_command();
        cmd.name = Some("  AB   ".to_string());
        assert_eq!(validate_registration(&cmd)[0].field, "name");

        cmd.name = Some("  ABC  ".to_string());
        assert!(validate_registration(&cmd).is_empty());
    }

    #[test]
    fn test_name_max_length_uses_raw_value() {
        let mut cmd = valid_command();
        cmd.name = Some("x".repeat(100));
        assert!(validate_registration(&cmd).is_empty());

        cmd.name = Some("x".repeat(101));
        let errors = validate_registration(&cmd);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Name must not exceed 100 characters");
    }

    #[rstest]
    #[case("info@company.com", true)]
    #[case("a@b.co", true)]
    #[case("no-at-sign.com", false)]
    #[case("two@@signs.com", false)]
    #[case("user@nodot", false)]
    #[case("white space@x.com", false)]
    fn test_email_shape(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(validate_email(Some(email)).is_none(), ok);
    }

    #[test]
    fn test_blank_email_is_absent() {
        assert!(validate_email(Some("   ")).is_none());

        let mut cmd = valid_command();
        cmd.email = Some("  ".to_string());
        assert_eq!(cmd.normalized_email(), None);

        cmd.email = Some("  Info@Company.com ".to_string());
        assert_eq!(cmd.normalized_email(), Some("Info@Company.com".to_string()));
    }

    #[rstest]
    #[case("SME", true)]
    #[case("CORPORATE", true)]
    #[case("sme", false)]
    #[case("PYME", false)]
    #[case("", false)]
    fn test_type_membership(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(validate_type(Some(value)).is_none(), ok);
    }

    #[rstest]
    #[case("30-12345678-9", true)]
    #[case("00-00000000-0", true)]
    #[case("3-12345678-9", false)]
    #[case("30-1234567-9", false)]
    #[case("30-12345678-90", false)]
    #[case("30 12345678 9", false)]
    #[case(" 30-12345678-9", false)]
    #[case("٣٠-12345678-9", false)]
    fn test_tax_id_cases(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(is_valid_tax_id(value), ok);
    }

    #[test]
    fn test_transfer_rules() {
        let mut cmd = RecordTransferCommand {
            company_id: "c1".to_string(),
            amount: Decimal::new(1500, 2),
            currency: "USD".to_string(),
            date: None,
            status: TransferStatus::Completed,
            description: None,
        };
        assert!(validate_transfer(&cmd).is_empty());

        cmd.amount = Decimal::ZERO;
        assert!(validate_transfer(&cmd).is_empty());

        cmd.company_id = " ".to_string();
        cmd.amount = Decimal::new(-1, 0);
        cmd.currency = "usd".to_string();
        let fields: Vec<String> = validate_transfer(&cmd).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["companyId", "amount", "currency"]);
    }

    proptest! {
        #[test]
        fn prop_matching_tax_ids_are_accepted(tax_id in "[0-9]{2}-[0-9]{8}-[0-9]") {
            prop_assert!(validate_tax_id(Some(&tax_id)).is_none());
        }

        #[test]
        fn prop_non_matching_tax_ids_are_rejected(tax_id in "\\PC{0,16}") {
            let shaped = tax_id.len() == 13
                && tax_id.chars().enumerate().all(|(i, c)| match i {
                    2 | 11 => c == '-',
                    _ => c.is_ascii_digit(),
                });
            prop_assume!(!shaped);
            prop_assert!(validate_tax_id(Some(&tax_id)).is_some());
        }
    }
}
