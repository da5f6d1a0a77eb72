//! Built-in mail templates.
//!
//! Templates use `{{name}}` placeholders. Substituted values are HTML-escaped;
//! a placeholder with no matching variable renders empty.

use std::collections::BTreeMap;

use crate::domain::ports::{INVITATION_TEMPLATE, MailError, MailMessage};

const INVITATION_SUBJECT: &str = "Finish registration with Social";
const INVITATION_BODY: &str = "<p>Hi {{username}},</p>\
<p>Thanks for signing up. Confirm your account by visiting \
<a href=\"{{activation_url}}\">{{activation_url}}</a>.</p>\
<p>If you did not sign up you can ignore this message.</p>";

/// Subject and HTML body ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMail {
    pub subject: String,
    pub html: String,
}

/// Render `message` with its registered template.
///
/// # Errors
///
/// Returns [`MailError::UnknownTemplate`] when the template name is not
/// registered.
pub fn render(message: &MailMessage) -> Result<RenderedMail, MailError> {
    let (subject, body) = match message.template.as_str() {
        INVITATION_TEMPLATE => (INVITATION_SUBJECT, INVITATION_BODY),
        other => return Err(MailError::unknown_template(other)),
    };
    Ok(RenderedMail {
        subject: substitute(subject, &message.variables),
        html: substitute(body, &message.variables),
    })
}

fn substitute(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        if let Some(value) = variables.get(after[..end].trim()) {
            out.push_str(&escape_html(value));
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
