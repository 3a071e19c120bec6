//! Minimal HTML for browser callers: the login landing page and error pages.

use axum::{extract::Query, http::StatusCode, response::Html};
use serde::Deserialize;
use serde_json::Value;

use opsdesk_core::serde::empty_string_as_none;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | OpsDesk</title>
</head>
<body>
<main>
<h1>{title}</h1>
{content}
</main>
</body>
</html>"#,
        title = escape(title),
        content = content
    )
}

/// Renders field errors (`{"field": ["message", ...]}`) as a list.
fn error_list(errors: &Value) -> String {
    let Value::Object(fields) = errors else {
        return String::new();
    };
    let items: String = fields
        .iter()
        .flat_map(|(field, messages)| {
            messages
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(move |message| {
                    format!(
                        "<li><strong>{}</strong>: {}</li>\n",
                        escape(field),
                        escape(message)
                    )
                })
        })
        .collect();
    format!("<ul class=\"errors\">\n{}</ul>", items)
}

pub fn error_page(status: StatusCode, message: &str, errors: Option<&Value>) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    let mut content = format!("<p>{}</p>", escape(message));
    if let Some(errors) = errors {
        content.push('\n');
        content.push_str(&error_list(errors));
    }
    Html(layout(title, &content))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub error: Option<String>,
}

/// Landing page browser callers are redirected to when they need a session.
pub async fn login_page(Query(params): Query<LoginPageParams>) -> Html<String> {
    let notice = params
        .error
        .map(|error| format!("<p class=\"error\">{}</p>\n", escape(&error)))
        .unwrap_or_default();
    let form = r#"<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button>
</form>"#;
    Html(layout("Sign in", &format!("{}{}", notice, form)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_error_page_lists_field_errors() {
        let Html(page) = error_page(
            StatusCode::UNPROCESSABLE_ENTITY,
            "The given data was invalid.",
            Some(&json!({"phone": ["Active customers must have either phone or email contact information."]})),
        );
        assert!(page.contains("<title>Unprocessable Entity | OpsDesk</title>"));
        assert!(page.contains("<strong>phone</strong>"));
    }

    #[tokio::test]
    async fn test_login_page_shows_escaped_error() {
        let Html(page) = login_page(Query(LoginPageParams {
            error: Some("<b>inactive</b>".to_string()),
        }))
        .await;
        assert!(page.contains("&lt;b&gt;inactive&lt;/b&gt;"));
        assert!(page.contains("action=\"/login\""));
    }
}
