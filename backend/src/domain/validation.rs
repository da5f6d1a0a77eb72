//! Request validation capability injected into domain services.
//!
//! Services call a [`RequestValidator`] before touching storage so tests can
//! swap the rules without global state.

use serde_json::json;
use zeroize::Zeroizing;

use super::{Error, Version};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const CONTENT_MIN: usize = 10;
pub const CONTENT_MAX: usize = 1000;
pub const TAGS_MAX: usize = 5;
pub const USERNAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const PASSWORD_MIN: usize = 3;
pub const PASSWORD_MAX: usize = 72;

/// A single failed field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

impl From<FieldViolation> for Error {
    fn from(violation: FieldViolation) -> Self {
        Self::invalid_request(violation.message).with_details(json!({
            "field": violation.field,
            "code": violation.code,
        }))
    }
}

/// Account registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: Zeroizing<String>,
}

/// Input for creating a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPostRequest {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial update of a post; absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Client precondition checked against the locked row.
    pub expected_version: Option<Version>,
}

impl PostPatch {
    /// Whether the patch changes no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }
}

/// Field rules applied to inbound requests.
#[cfg_attr(test, mockall::automock)]
pub trait RequestValidator: Send + Sync {
    fn validate_registration(&self, request: &RegistrationRequest) -> Result<(), FieldViolation>;
    fn validate_new_post(&self, request: &NewPostRequest) -> Result<(), FieldViolation>;
    fn validate_patch(&self, patch: &PostPatch) -> Result<(), FieldViolation>;
}

/// Production rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestValidator;

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn bounded(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), FieldViolation> {
    let len = char_len(value.trim());
    if len == 0 {
        return Err(FieldViolation::new(field, "required", format!("{field} is required")));
    }
    if len < min {
        return Err(FieldViolation::new(
            field,
            "too_short",
            format!("{field} must be at least {min} characters"),
        ));
    }
    if char_len(value) > max {
        return Err(FieldViolation::new(
            field,
            "too_long",
            format!("{field} must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn at_most(field: &'static str, value: &str, max: usize) -> Result<(), FieldViolation> {
    if char_len(value) > max {
        return Err(FieldViolation::new(
            field,
            "too_long",
            format!("{field} must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn tag_count(tags: &[String], min: usize) -> Result<(), FieldViolation> {
    if tags.len() < min {
        return Err(FieldViolation::new(
            "tags",
            "required",
            format!("tags must contain at least {min} entry"),
        ));
    }
    if tags.len() > TAGS_MAX {
        return Err(FieldViolation::new(
            "tags",
            "too_many",
            format!("tags must contain at most {TAGS_MAX} entries"),
        ));
    }
    if tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(FieldViolation::new("tags", "blank_tag", "tags must not be blank"));
    }
    Ok(())
}

fn email_shape(email: &str) -> Result<(), FieldViolation> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    });
    if valid && !email.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(FieldViolation::new("email", "invalid_email", "email must be a valid address"))
    }
}

impl RequestValidator for DefaultRequestValidator {
    fn validate_registration(&self, request: &RegistrationRequest) -> Result<(), FieldViolation> {
        bounded("username", &request.username, 1, USERNAME_MAX)?;
        bounded("email", &request.email, 1, EMAIL_MAX)?;
        email_shape(request.email.trim())?;
        if request.password.is_empty() {
            return Err(FieldViolation::new("password", "required", "password is required"));
        }
        let len = char_len(&request.password);
        if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
            return Err(FieldViolation::new(
                "password",
                "length",
                format!("password must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"),
            ));
        }
        Ok(())
    }

    fn validate_new_post(&self, request: &NewPostRequest) -> Result<(), FieldViolation> {
        bounded("title", &request.title, TITLE_MIN, TITLE_MAX)?;
        bounded("content", &request.content, CONTENT_MIN, CONTENT_MAX)?;
        tag_count(&request.tags, 1)
    }

    fn validate_patch(&self, patch: &PostPatch) -> Result<(), FieldViolation> {
        if patch.is_empty() {
            return Err(FieldViolation::new(
                "body",
                "empty_patch",
                "at least one of title, content, or tags is required",
            ));
        }
        if let Some(title) = &patch.title {
            at_most("title", title, TITLE_MAX)?;
        }
        if let Some(content) = &patch.content {
            at_most("content", content, CONTENT_MAX)?;
        }
        if let Some(tags) = &patch.tags {
            tag_count(tags, 0)?;
        }
        if patch
            .expected_version
            .is_some_and(|version| version < Version::INITIAL)
        {
            return Err(FieldViolation::new(
                "expectedVersion",
                "out_of_range",
                "expectedVersion must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn registration() -> RegistrationRequest {
        RegistrationRequest {
            username: "alice".to_owned(),
            email: "alice@x.com".to_owned(),
            password: Zeroizing::new("hunter22".to_owned()),
        }
    }

    #[fixture]
    fn new_post() -> NewPostRequest {
        NewPostRequest {
            title: "Hello".to_owned(),
            content: "A body that is long enough".to_owned(),
            tags: vec!["intro".to_owned()],
        }
    }

    #[rstest]
    fn accepts_valid_registration(registration: RegistrationRequest) {
        assert!(DefaultRequestValidator.validate_registration(&registration).is_ok());
    }

    #[rstest]
    #[case("alice", "username", "required", "   ")]
    #[case("email", "email", "invalid_email", "alice-at-x.com")]
    #[case("email", "email", "invalid_email", "alice@localhost")]
    #[case("password", "password", "length", "ab")]
    fn rejects_bad_registration_fields(
        mut registration: RegistrationRequest,
        #[case] target: &str,
        #[case] field: &str,
        #[case] code: &str,
        #[case] value: &str,
    ) {
        match target {
            "email" => registration.email = value.to_owned(),
            "password" => registration.password = Zeroizing::new(value.to_owned()),
            _ => registration.username = value.to_owned(),
        }
        let violation = DefaultRequestValidator
            .validate_registration(&registration)
            .expect_err("rule violated");
        assert_eq!(violation.field, field);
        assert_eq!(violation.code, code);
    }

    #[rstest]
    fn accepts_valid_new_post(new_post: NewPostRequest) {
        assert!(DefaultRequestValidator.validate_new_post(&new_post).is_ok());
    }

    #[rstest]
    fn rejects_short_title(mut new_post: NewPostRequest) {
        new_post.title = "Hi".to_owned();
        let violation = DefaultRequestValidator
            .validate_new_post(&new_post)
            .expect_err("title too short");
        assert_eq!((violation.field, violation.code), ("title", "too_short"));
    }

    #[rstest]
    fn rejects_too_many_tags(mut new_post: NewPostRequest) {
        new_post.tags = (0..6).map(|i| format!("t{i}")).collect();
        let violation = DefaultRequestValidator
            .validate_new_post(&new_post)
            .expect_err("too many tags");
        assert_eq!(violation.code, "too_many");
    }

    #[rstest]
    fn rejects_empty_patch() {
        let violation = DefaultRequestValidator
            .validate_patch(&PostPatch::default())
            .expect_err("empty patch");
        assert_eq!(violation.code, "empty_patch");
    }

    #[rstest]
    fn patch_allows_clearing_tags() {
        let patch = PostPatch {
            tags: Some(vec![]),
            ..PostPatch::default()
        };
        assert!(DefaultRequestValidator.validate_patch(&patch).is_ok());
    }

    #[rstest]
    fn patch_rejects_overlong_content() {
        let patch = PostPatch {
            content: Some("x".repeat(CONTENT_MAX + 1)),
            ..PostPatch::default()
        };
        let violation = DefaultRequestValidator
            .validate_patch(&patch)
            .expect_err("content too long");
        assert_eq!((violation.field, violation.code), ("content", "too_long"));
    }

    #[rstest]
    fn violation_maps_to_invalid_request() {
        let error: Error = FieldViolation::new("title", "too_long", "title too long").into();
        assert_eq!(error.code(), crate::domain::ErrorCode::InvalidRequest);
        assert_eq!(error.detail_code(), Some("too_long"));
    }
}
