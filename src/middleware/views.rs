use std::fmt::Write;

use super::traits::Views;
use crate::authz::Effect;
use crate::gate::{Granted, LinkSent};

/// Minimal built-in pages.
#[derive(Debug, Clone)]
pub struct HtmlViews {
    title: String,
}

impl Default for HtmlViews {
    fn default() -> Self {
        Self {
            title: "linkgate".into(),
        }
    }
}

impl HtmlViews {
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn page(&self, body: &str) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n<html>\n",
                "<head><meta charset=\"utf-8\"><title>{}</title></head>\n",
                "<body>\n{}</body>\n</html>\n",
            ),
            escape_html(&self.title),
            body
        )
    }
}

impl Views for HtmlViews {
    fn landing(&self, error: Option<&str>) -> String {
        let mut body = String::new();
        if let Some(error) = error {
            let _ = writeln!(body, "<p class=\"error\">{}</p>", escape_html(error));
        }
        body.push_str(concat!(
            "<form method=\"post\" action=\"/login_or_create_user\">\n",
            "<label>Email <input type=\"email\" name=\"email\" required></label>\n",
            "<label>Role <input type=\"text\" name=\"role\" value=\"user\" required></label>\n",
            "<button type=\"submit\">Send magic link</button>\n",
            "</form>\n",
        ));
        self.page(&body)
    }

    fn link_sent(&self, _sent: &LinkSent) -> String {
        self.page("<p>Check your email for a login link.</p>\n")
    }

    fn resource(&self, granted: &Granted) -> String {
        let mut body = String::new();
        let _ = writeln!(
            body,
            "<h1>Welcome {}</h1>",
            escape_html(granted.user.user_id.as_str())
        );

        body.push_str("<table>\n");
        body.push_str("<tr><th>Kind</th><th>Resource</th><th>Action</th><th>Effect</th></tr>\n");
        for (kind, resource_id, action) in granted.query.pairs() {
            let effect = match granted.decision.effect(kind, resource_id, action) {
                Some(Effect::Allow) => "allow",
                Some(Effect::Deny) => "deny",
                Some(Effect::Unspecified) | None => "unspecified",
            };
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{effect}</td></tr>",
                escape_html(kind),
                escape_html(resource_id),
                escape_html(action)
            );
        }
        body.push_str("</table>\n");

        let query = serde_json::to_string_pretty(&granted.query).unwrap_or_default();
        let decision = serde_json::to_string_pretty(&granted.decision).unwrap_or_default();
        let _ = writeln!(body, "<h2>Query</h2>\n<pre>{}</pre>", escape_html(&query));
        let _ = writeln!(body, "<h2>Decision</h2>\n<pre>{}</pre>", escape_html(&decision));
        body.push_str("<p><a href=\"/logout\">Log out</a></p>\n");
        self.page(&body)
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
