//! Pulling a token, form fields, and a session id out of an HTTP request.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::request::Parts;
use waystack_core::{Context, Value};
use waystack_runtime::Inbound;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decodes `a=1&b=2` pairs. Malformed input yields no pairs.
pub fn parse_pairs(raw: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(raw).unwrap_or_default()
}

pub fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with(FORM_CONTENT_TYPE))
}

/// Value of cookie `name` from the `Cookie` headers.
pub fn read_cookie(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Builds an [`Inbound`] from the query string and an optional form body.
///
/// Form values win over query values; the token parameter itself is never
/// merged into the context.
pub fn inbound(parts: &Parts, form: Option<&Bytes>, token_key: &str, session: String) -> Inbound {
    let mut pairs = parts.uri.query().map(parse_pairs).unwrap_or_default();
    if let Some(body) = form {
        pairs.extend(parse_pairs(&String::from_utf8_lossy(body)));
    }

    let mut token = None;
    let mut fields = Context::new();
    for (key, value) in pairs {
        if key == token_key {
            token = Some(value);
        } else {
            fields.insert(key, Value::Str(value));
        }
    }

    Inbound {
        token: token.filter(|t| !t.is_empty()),
        fields,
        session: Some(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn parts(builder: http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_token_from_query_and_form_fields() {
        let parts = parts(
            Request::post("/?wst=abc&x=1")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8"),
        );
        assert!(is_form(&parts));

        let body = Bytes::from_static(b"x=2&name=John+Q.+Public");
        let inbound = inbound(&parts, Some(&body), "wst", "s1".into());

        assert_eq!(inbound.token.as_deref(), Some("abc"));
        assert_eq!(inbound.fields.get_str("x"), Some("2"));
        assert_eq!(inbound.fields.get_str("name"), Some("John Q. Public"));
        assert!(!inbound.fields.contains_key("wst"));
        assert_eq!(inbound.session.as_deref(), Some("s1"));
    }

    #[test]
    fn test_form_token_overrides_query_token() {
        let parts = parts(Request::post("/?wst=from-query"));
        let body = Bytes::from_static(b"wst=from-form");
        let inbound = inbound(&parts, Some(&body), "wst", "s".into());
        assert_eq!(inbound.token.as_deref(), Some("from-form"));
    }

    #[test]
    fn test_empty_token_is_fresh_visit() {
        let parts = parts(Request::get("/?wst="));
        assert_eq!(inbound(&parts, None, "wst", "s".into()).token, None);
    }

    #[test]
    fn test_read_cookie() {
        let parts = parts(
            Request::get("/")
                .header(COOKIE, "theme=dark; wsid=0123abcd")
                .header(COOKIE, "other=1"),
        );
        assert_eq!(read_cookie(&parts, "wsid").as_deref(), Some("0123abcd"));
        assert_eq!(read_cookie(&parts, "missing"), None);
    }
}
