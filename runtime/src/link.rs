//! Outbound links produced while rendering.

use crate::transport::Token;
use waystack_core::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    /// Follow as a plain hyperlink.
    Get,
    /// Submit as a form carrying the token in a hidden field.
    Post,
}

/// A token paired with the parameter name it travels under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    token_key: String,
    token: Token,
}

impl Link {
    pub(crate) fn new(token_key: &str, token: Token) -> Self {
        Self {
            token_key: token_key.to_string(),
            token,
        }
    }

    pub fn method(&self) -> LinkMethod {
        match self.token {
            Token::Post(_) => LinkMethod::Post,
            Token::Get(_) | Token::Stored(_) => LinkMethod::Get,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.token.backend()
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// `(name, value)` pairs to submit.
    pub fn params(&self) -> [(&str, &str); 1] {
        [(self.token_key.as_str(), self.token.as_str())]
    }

    pub fn query_string(&self) -> String {
        // Tokens are base64url or hex; encoding cannot fail on plain string pairs.
        serde_urlencoded::to_string(self.params().as_slice()).unwrap_or_default()
    }

    /// `base?key=token`, appending with `&` if `base` already has a query.
    pub fn href(&self, base: &str) -> String {
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}{}", self.query_string())
    }

    /// Hidden `<input>` elements for embedding the token in a form.
    pub fn hidden_inputs(&self) -> String {
        self.params()
            .iter()
            .map(|(name, value)| {
                format!(
                    r#"<input type="hidden" name="{}" value="{}">"#,
                    escape_html(name),
                    escape_html(value)
                )
            })
            .collect()
    }
}

/// Escapes text for use in HTML attribute values and element content.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_href_and_method() {
        let link = Link::new("wst", Token::Get("abc-_123".into()));
        assert_eq!(link.method(), LinkMethod::Get);
        assert_eq!(link.href("/app"), "/app?wst=abc-_123");
        assert_eq!(link.href("/app?x=1"), "/app?x=1&wst=abc-_123");
    }

    #[test]
    fn test_hidden_inputs_escape() {
        let link = Link::new("w\"st", Token::Post("t<1>".into()));
        assert_eq!(link.method(), LinkMethod::Post);
        assert_eq!(
            link.hidden_inputs(),
            r#"<input type="hidden" name="w&quot;st" value="t&lt;1&gt;">"#
        );
    }

    #[test]
    fn test_stored_tokens_travel_by_get() {
        let link = Link::new("wst", Token::Stored("ab".repeat(16)));
        assert_eq!(link.method(), LinkMethod::Get);
        assert_eq!(link.backend(), BackendKind::Database);
    }
}
