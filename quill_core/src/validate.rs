//! Declarative field validation.
//!
//! A [`Validator`] is fed each field of a form together with the [`Rule`]s
//! that apply to it. Rules run in order and the first failing rule wins,
//! so every field reports at most one message while several fields may
//! fail at once. [`Rule::required`] failing stops the remaining rules for
//! that field.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex")
});

#[derive(Clone, Debug, Eq, PartialEq)]
enum Check {
    Required,
    Length { min: usize, max: Option<usize> },
    Email,
    EqualTo(&'static str),
}

/// A single constraint on a field value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rule {
    check: Check,
    message: Option<&'static str>,
}
impl Rule {
    /// The value must contain something other than whitespace.
    pub const fn required() -> Self {
        Rule::new(Check::Required)
    }
    /// The value must be between `min` and `max` characters, inclusive.
    pub const fn length(min: usize, max: usize) -> Self {
        Rule::new(Check::Length {
            min,
            max: Some(max),
        })
    }
    /// The value must be at least `min` characters.
    pub const fn min_length(min: usize) -> Self {
        Rule::new(Check::Length { min, max: None })
    }
    /// The value must be at most `max` characters.
    pub const fn max_length(max: usize) -> Self {
        Rule::length(0, max)
    }
    /// The value must look like an email address.
    pub const fn email() -> Self {
        Rule::new(Check::Email)
    }
    /// The value must equal the value of another field fed earlier.
    pub const fn equal_to(field: &'static str) -> Self {
        Rule::new(Check::EqualTo(field))
    }
    /// Replace the default failure message.
    pub const fn message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    const fn new(check: Check) -> Self {
        Rule {
            check,
            message: None,
        }
    }

    fn default_message(&self) -> String {
        match &self.check {
            Check::Required => "This field is required.".to_string(),
            Check::Length { min, max: Some(max) } if *min == 0 => {
                format!("Field cannot be longer than {max} characters.")
            }
            Check::Length { min, max: Some(max) } => {
                format!("Field must be between {min} and {max} characters long.")
            }
            Check::Length { min, max: None } => {
                format!("Field must be at least {min} characters long.")
            }
            Check::Email => "Invalid email address.".to_string(),
            Check::EqualTo(other) => format!("Field must be equal to {other}."),
        }
    }
}

/// Validation messages keyed by field name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, String>);
impl FormErrors {
    /// No errors.
    pub fn new() -> Self {
        FormErrors::default()
    }
    /// Record `message` for `field` unless the field already has one.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }
    /// The message recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
    /// Whether `field` has a message.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
    /// Whether no field failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Number of failing fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Iterate over `(field, message)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
    /// `Ok(())` if empty, otherwise [`crate::Error::Validation`].
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(self))
        }
    }
}
impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Collects [`FormErrors`] for one form submission.
#[derive(Debug, Default)]
pub struct Validator<'a> {
    values: BTreeMap<&'static str, &'a str>,
    errors: FormErrors,
}
impl<'a> Validator<'a> {
    /// Start validating a submission.
    pub fn new() -> Self {
        Validator::default()
    }

    /// Check `value` against `rules`, recording the first failure.
    pub fn field(&mut self, name: &'static str, value: &'a str, rules: &[Rule]) -> &mut Self {
        self.values.insert(name, value);
        for rule in rules {
            if let Some(message) = self.failure(value, rule) {
                self.errors.add(name, message);
                break;
            }
        }
        self
    }

    /// Record `message` for `name` when `ok` is false. Fields that already
    /// failed keep their first message.
    pub fn check(&mut self, name: &'static str, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.add(name, message);
        }
        self
    }

    /// Whether `name` has passed every rule so far.
    pub fn is_valid(&self, name: &str) -> bool {
        !self.errors.contains(name)
    }

    /// The errors collected so far.
    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Finish, returning [`crate::Error::Validation`] if anything failed.
    pub fn finish(self) -> crate::Result<()> {
        self.errors.into_result()
    }

    fn failure(&self, value: &str, rule: &Rule) -> Option<String> {
        let ok = match &rule.check {
            Check::Required => !value.trim().is_empty(),
            Check::Length { min, max } => {
                let len = value.chars().count();
                len >= *min && max.map_or(true, |max| len <= max)
            }
            Check::Email => EMAIL.is_match(value.trim()),
            Check::EqualTo(other) => self.values.get(other).is_some_and(|v| *v == value),
        };
        if ok {
            None
        } else {
            Some(
                rule.message
                    .map(str::to_string)
                    .unwrap_or_else(|| rule.default_message()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_failing_rule_wins() {
        let mut v = Validator::new();
        v.field("username", "", &[Rule::required(), Rule::length(3, 64)]);
        assert_eq!(v.errors().get("username"), Some("This field is required."));
    }

    #[test]
    fn several_fields_fail_together() {
        let mut v = Validator::new();
        v.field("username", "ab", &[Rule::required(), Rule::length(3, 64)])
            .field("email", "not-an-email", &[Rule::required(), Rule::email()])
            .field("bio", "", &[Rule::max_length(500)]);
        let errors = v.errors().clone();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("username"),
            Some("Field must be between 3 and 64 characters long.")
        );
        assert_eq!(errors.get("email"), Some("Invalid email address."));
        assert!(!errors.contains("bio"));
    }

    #[test]
    fn custom_message() {
        let mut v = Validator::new();
        v.field(
            "password",
            "short",
            &[Rule::length(6, 50).message("Password must be at least 6 characters")],
        );
        assert_eq!(
            v.errors().get("password"),
            Some("Password must be at least 6 characters")
        );
    }

    #[test]
    fn equal_to_compares_earlier_field() {
        let mut v = Validator::new();
        v.field("password", "hunter22", &[Rule::required()])
            .field("confirm", "hunter23", &[Rule::equal_to("password")]);
        assert!(!v.is_valid("confirm"));

        let mut v = Validator::new();
        v.field("password", "hunter22", &[Rule::required()])
            .field("confirm", "hunter22", &[Rule::equal_to("password")]);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let mut v = Validator::new();
        v.field("name", "ééé", &[Rule::length(1, 3)]);
        assert!(v.is_valid("name"));
    }

    #[test]
    fn email_shapes() {
        for good in ["a@b.co", "first.last@example.org"] {
            assert!(EMAIL.is_match(good), "{good}");
        }
        for bad in ["a@b", "@b.co", "a b@c.de", "a@@b.co"] {
            assert!(!EMAIL.is_match(bad), "{bad}");
        }
    }

    #[test]
    fn check_keeps_first_message() {
        let mut v = Validator::new();
        v.field("email", "", &[Rule::required()]);
        v.check("email", false, "Email is already registered.");
        assert_eq!(v.errors().get("email"), Some("This field is required."));
    }

    #[test]
    fn display_lists_fields() {
        let mut errors = FormErrors::new();
        errors.add("b", "two");
        errors.add("a", "one");
        assert_eq!(errors.to_string(), "a: one; b: two");
    }
}
