//! Rule sets for the forms the application accepts.

use std::sync::LazyLock;

use super::{FieldRules, Input};
use crate::store::AccountKey;

pub const USERNAME: &str = "username";
pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const PASSWORD_CONFIRMATION: &str = "passwordConfirmation";
pub const TITLE: &str = "title";
pub const CONTENT: &str = "content";
pub const PUBLISHED: &str = "published";

/// Fields that are never echoed back to a form.
const SENSITIVE: [&str; 2] = [PASSWORD, PASSWORD_CONFIRMATION];

/// Compiled rule sets, built on first use and shared afterwards.
struct RuleSets {
    signup: Vec<FieldRules>,
    login: Vec<FieldRules>,
    article: Vec<FieldRules>,
}

static RULE_SETS: LazyLock<Result<RuleSets, regex::Error>> = LazyLock::new(RuleSets::build);

impl RuleSets {
    fn build() -> Result<Self, regex::Error> {
        Ok(Self {
            signup: vec![
                FieldRules::new(USERNAME)
                    .trim()
                    .required("Username cannot be blank."),
                FieldRules::new(EMAIL)
                    .required("Email cannot be blank.")
                    .email("Email format is invalid.")?
                    .unique(AccountKey::Email, "Email is already in use."),
                FieldRules::new(PASSWORD)
                    .min_length(6, "Password must be at least 6 characters.")
                    .matches(
                        PASSWORD_CONFIRMATION,
                        "Password confirmation does not match password.",
                    ),
            ],
            login: vec![
                FieldRules::new(USERNAME)
                    .trim()
                    .required("Username cannot be blank."),
                FieldRules::new(PASSWORD).required("Password cannot be blank."),
            ],
            article: vec![
                FieldRules::new(TITLE)
                    .trim()
                    .required("Title is required.")
                    .max_length(200, "Title should not exceed 200 characters.")
                    .pattern(
                        r#"^[\w'",.!?\- ]+$"#,
                        r#"Title should only contain letters, numbers, spaces, and '",.!?- characters."#,
                    )?,
                FieldRules::new(CONTENT)
                    .trim()
                    .escape()
                    .min_length(3, "Article content must be at least 3 characters.")
                    .max_length(5000, "Article content should not exceed 5000 characters."),
            ],
        })
    }
}

fn rule_sets() -> Result<&'static RuleSets, regex::Error> {
    RULE_SETS.as_ref().map_err(Clone::clone)
}

/// Compile every rule set now, so a bad pattern stops startup instead of the
/// first request.
///
/// # Errors
///
/// Returns the regex error of the first pattern that fails to compile.
pub fn preload() -> Result<(), regex::Error> {
    rule_sets().map(|_| ())
}

/// # Errors
///
/// Returns an error if the rule sets failed to compile.
pub fn signup() -> Result<&'static [FieldRules], regex::Error> {
    Ok(&rule_sets()?.signup)
}

/// # Errors
///
/// Returns an error if the rule sets failed to compile.
pub fn login() -> Result<&'static [FieldRules], regex::Error> {
    Ok(&rule_sets()?.login)
}

/// # Errors
///
/// Returns an error if the rule sets failed to compile.
pub fn article() -> Result<&'static [FieldRules], regex::Error> {
    Ok(&rule_sets()?.article)
}

/// Copy of the raw input that is safe to send back with a rejected form.
#[must_use]
pub fn redact(input: &Input) -> Input {
    input
        .iter()
        .filter(|(field, _)| !SENSITIVE.contains(&field.as_str()))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}
