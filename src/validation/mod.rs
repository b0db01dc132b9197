//! Declarative form validation.
//!
//! A form is an ordered list of [`FieldRules`]; each field carries an ordered
//! list of [`Rule`] descriptors. [`validate`] walks every field (it never stops
//! at the first bad field) and within a field stops at the first failing rule.
//! Sanitizer rules (`Trim`, `Escape`, `Email`) rewrite the value seen by later
//! rules, and the accepted outcome carries those rewritten values. Length and
//! pattern rules look at the trimmed value without rewriting it.
//!
//! Cross-field rules (`MatchesField`) run after every field's own rules, and the
//! uniqueness rule is the only one that suspends on I/O.

pub mod forms;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Anchored: the whole trimmed value has to be an address.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

use crate::store::{AccountKey, StoreError};

/// Raw form submission: field name to raw string value.
pub type Input = HashMap<String, String>;

/// Answers "is this normalized value already in use?" for uniqueness rules.
#[async_trait]
pub trait UniqueLookup: Send + Sync {
    async fn is_taken(&self, key: AccountKey, value: &str) -> Result<bool, StoreError>;
}

#[derive(Clone, Debug)]
pub enum Rule {
    /// Strip surrounding whitespace.
    Trim,
    /// Encode HTML-significant characters.
    Escape,
    Required {
        message: &'static str,
    },
    MinLength {
        min: usize,
        message: &'static str,
    },
    MaxLength {
        max: usize,
        message: &'static str,
    },
    /// `regex` must be anchored; the whole trimmed value has to match.
    Pattern {
        regex: Regex,
        message: &'static str,
    },
    /// Syntax check, then lowercase + trim on success.
    Email {
        regex: Regex,
        message: &'static str,
    },
    Unique {
        key: AccountKey,
        message: &'static str,
    },
    MatchesField {
        other: &'static str,
        message: &'static str,
    },
}

/// Rules for one field, applied in declaration order.
#[derive(Clone, Debug)]
pub struct FieldRules {
    pub field: &'static str,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    #[must_use]
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn trim(mut self) -> Self {
        self.rules.push(Rule::Trim);
        self
    }

    #[must_use]
    pub fn escape(mut self) -> Self {
        self.rules.push(Rule::Escape);
        self
    }

    #[must_use]
    pub fn required(mut self, message: &'static str) -> Self {
        self.rules.push(Rule::Required { message });
        self
    }

    #[must_use]
    pub fn min_length(mut self, min: usize, message: &'static str) -> Self {
        self.rules.push(Rule::MinLength { min, message });
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize, message: &'static str) -> Self {
        self.rules.push(Rule::MaxLength { max, message });
        self
    }

    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn pattern(mut self, pattern: &str, message: &'static str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        self.rules.push(Rule::Pattern { regex, message });
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if the address pattern fails to compile.
    pub fn email(mut self, message: &'static str) -> Result<Self, regex::Error> {
        let regex = Regex::new(EMAIL_PATTERN)?;
        self.rules.push(Rule::Email { regex, message });
        Ok(self)
    }

    #[must_use]
    pub fn unique(mut self, key: AccountKey, message: &'static str) -> Self {
        self.rules.push(Rule::Unique { key, message });
        self
    }

    #[must_use]
    pub fn matches(mut self, other: &'static str, message: &'static str) -> Self {
        self.rules.push(Rule::MatchesField { other, message });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Sanitized values of the declared fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Values(BTreeMap<String, String>);

impl Values {
    /// Sanitized value of `field`, or `""` when the field was not declared.
    #[must_use]
    pub fn get(&self, field: &str) -> &str {
        self.0.get(field).map_or("", String::as_str)
    }

    /// Move a value out, leaving nothing behind.
    pub fn take(&mut self, field: &str) -> String {
        self.0.remove(field).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Values),
    Rejected(Vec<FieldError>),
}

impl Outcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

struct FieldState {
    field: &'static str,
    value: String,
    errors: Vec<&'static str>,
}

/// Check `input` against `rules`.
///
/// Absent fields are treated as empty strings. Errors come back in field
/// declaration order, then rule order within the field.
///
/// # Errors
///
/// Returns the lookup's error when a uniqueness query fails; that is a storage
/// fault, not a rejected submission.
pub async fn validate<L>(
    rules: &[FieldRules],
    input: &Input,
    lookup: &L,
) -> Result<Outcome, StoreError>
where
    L: UniqueLookup + ?Sized,
{
    let mut states = Vec::with_capacity(rules.len());

    for field_rules in rules {
        let mut state = FieldState {
            field: field_rules.field,
            value: input.get(field_rules.field).cloned().unwrap_or_default(),
            errors: Vec::new(),
        };
        for rule in &field_rules.rules {
            if let Some(message) = apply(rule, &mut state.value, lookup).await? {
                state.errors.push(message);
                break;
            }
        }
        states.push(state);
    }

    let mismatches = cross_field_errors(rules, &states, input);
    for (field, message) in mismatches {
        if let Some(state) = states.iter_mut().find(|state| state.field == field) {
            state.errors.push(message);
        }
    }

    let errors: Vec<FieldError> = states
        .iter()
        .flat_map(|state| {
            state.errors.iter().map(|message| FieldError {
                field: state.field.to_string(),
                message: (*message).to_string(),
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(Outcome::Accepted(Values(
            states
                .into_iter()
                .map(|state| (state.field.to_string(), state.value))
                .collect(),
        )))
    } else {
        Ok(Outcome::Rejected(errors))
    }
}

/// Apply a single own-field rule. `Some(message)` means the rule failed.
async fn apply<L>(
    rule: &Rule,
    value: &mut String,
    lookup: &L,
) -> Result<Option<&'static str>, StoreError>
where
    L: UniqueLookup + ?Sized,
{
    let failed = match rule {
        Rule::Trim => {
            *value = value.trim().to_string();
            None
        }
        Rule::Escape => {
            *value = escape_html(value);
            None
        }
        Rule::Required { message } => value.trim().is_empty().then_some(*message),
        Rule::MinLength { min, message } => {
            (value.trim().chars().count() < *min).then_some(*message)
        }
        Rule::MaxLength { max, message } => {
            (value.trim().chars().count() > *max).then_some(*message)
        }
        Rule::Pattern { regex, message } => (!regex.is_match(value.trim())).then_some(*message),
        Rule::Email { regex, message } => {
            if regex.is_match(value.trim()) {
                *value = normalize_email(value);
                None
            } else {
                Some(*message)
            }
        }
        Rule::Unique { key, message } => {
            if lookup.is_taken(*key, value).await? {
                Some(*message)
            } else {
                None
            }
        }
        // Evaluated once all fields have been sanitized.
        Rule::MatchesField { .. } => None,
    };
    Ok(failed)
}

fn cross_field_errors(
    rules: &[FieldRules],
    states: &[FieldState],
    input: &Input,
) -> Vec<(&'static str, &'static str)> {
    let mut mismatches = Vec::new();
    for field_rules in rules {
        let Some(own) = states.iter().find(|state| state.field == field_rules.field) else {
            continue;
        };
        for rule in &field_rules.rules {
            let Rule::MatchesField { other, message } = rule else {
                continue;
            };
            let other_value = match states.iter().find(|state| state.field == *other) {
                // A rejected counterpart already has its own error.
                Some(state) if !state.errors.is_empty() => continue,
                Some(state) => state.value.as_str(),
                None => input.get(*other).map_or("", String::as_str),
            };
            if own.value != other_value {
                mismatches.push((field_rules.field, *message));
            }
        }
    }
    mismatches
}

/// Normalize an email for lookup/uniqueness checks. Inner whitespace is left
/// alone; the email rule rejects it before normalizing.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Encode the characters that could open markup when the value is rendered.
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

/// Coerce a checkbox value once validation has passed.
///
/// `None` means the box was not part of the submission.
#[must_use]
pub fn checkbox(value: Option<&str>) -> Option<bool> {
    value.map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1"))
}
