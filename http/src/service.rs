//! # NavService - Tower Service Adapter
//!
//! Adapts one [`Navigator`] to Tower's `Service` trait. Every request runs the
//! full navigation cycle and maps its outcome to a response:
//!
//! | Outcome                          | Status |
//! |----------------------------------|--------|
//! | page rendered (incl. reset)      | 200    |
//! | `NotFound` (purged database id)  | 410    |
//! | programming, store, config error | 500    |
//!
//! In dev mode the 500 page shows the message of programming errors; store and
//! config messages stay in the logs.

use crate::request;
use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE, HeaderValue, SET_COOKIE};
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::Instrument;
use waystack_core::{Mode, NavError};
use waystack_runtime::Navigator;
use waystack_runtime::link::escape_html;

pub type HttpResponse = Response<Full<Bytes>>;

/// Request-handling knobs shared by [`NavService`] and the ingress builder.
#[derive(Debug, Clone)]
pub struct IngressSettings {
    /// Path the application is served under.
    pub mount: String,
    pub session_cookie: String,
    /// Adds `Secure` to the session cookie.
    pub secure_cookie: bool,
    pub max_body_bytes: usize,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            mount: "/".to_string(),
            session_cookie: "wsid".to_string(),
            secure_cookie: false,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Serves a navigator over HTTP. Views receive the request head as `&Parts`.
pub struct NavService<Out> {
    navigator: Arc<Navigator<Parts, Out>>,
    settings: Arc<IngressSettings>,
}

impl<Out> Clone for NavService<Out> {
    fn clone(&self) -> Self {
        Self {
            navigator: self.navigator.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<Out> NavService<Out>
where
    Out: Into<Bytes> + Send + 'static,
{
    pub fn new(navigator: Arc<Navigator<Parts, Out>>, settings: IngressSettings) -> Self {
        Self {
            navigator,
            settings: Arc::new(settings),
        }
    }

    /// Runs one request to completion. Never fails; errors become responses.
    pub async fn respond<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!(
            "http_request",
            waystack.http.method = %parts.method,
            waystack.http.path = %parts.uri.path(),
            waystack.http.request_id = %request_id
        );

        async move {
            if parts.uri.path() != self.settings.mount {
                return text(StatusCode::NOT_FOUND, "Not Found");
            }
            if parts.method != Method::GET && parts.method != Method::POST {
                let mut res = text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                res.headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET, POST"));
                return res;
            }

            let form = if parts.method == Method::POST && request::is_form(&parts) {
                match Limited::new(body, self.settings.max_body_bytes).collect().await {
                    Ok(collected) => Some(collected.to_bytes()),
                    Err(e) => {
                        tracing::warn!(error = %e, "rejected request body");
                        return text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
                    }
                }
            } else {
                None
            };

            let existing = request::read_cookie(&parts, &self.settings.session_cookie);
            let issued = existing.is_none();
            let session = existing.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

            let inbound = request::inbound(
                &parts,
                form.as_ref(),
                &self.navigator.config().token_key,
                session.clone(),
            );

            let mut res = match self.navigator.handle(inbound, &parts).await {
                Ok(page) => {
                    let mut res = html(StatusCode::OK, page.output.into());
                    res.headers_mut().insert(
                        "x-waystack-origin",
                        HeaderValue::from_static(page.origin.label()),
                    );
                    res
                }
                Err(e) => self.error_response(&e),
            };

            if issued {
                self.set_session_cookie(&mut res, &session);
            }
            res
        }
        .instrument(span)
        .await
    }

    fn error_response(&self, error: &NavError) -> HttpResponse {
        if let NavError::NotFound(_) = error {
            tracing::info!(error = %error, "expired link");
            let body = format!(
                "<!doctype html><title>Link expired</title>\
                 <p>This link has expired.</p><p><a href=\"{}\">Start over</a></p>",
                escape_html(&self.settings.mount)
            );
            return html(StatusCode::GONE, body.into());
        }

        tracing::error!(error = %error, kind = error.kind(), "navigation failed");
        let detail = match self.navigator.config().mode {
            Mode::Dev if error.is_programming_error() => {
                format!("<pre>{}</pre>", escape_html(&error.to_string()))
            }
            _ => String::new(),
        };
        let body = format!(
            "<!doctype html><title>Error</title><p>Something went wrong.</p>{detail}"
        );
        html(StatusCode::INTERNAL_SERVER_ERROR, body.into())
    }

    fn set_session_cookie(&self, res: &mut HttpResponse, session: &str) {
        let secure = if self.settings.secure_cookie {
            "; Secure"
        } else {
            ""
        };
        let cookie = format!(
            "{}={session}; Path={}; HttpOnly; SameSite=Lax{secure}",
            self.settings.session_cookie, self.settings.mount
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                res.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "session cookie is not a valid header value"),
        }
    }
}

fn html(status: StatusCode, body: Bytes) -> HttpResponse {
    let mut res = Response::new(Full::new(body));
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    res
}

fn text(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut res = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

impl<B, Out> Service<Request<B>> for NavService<Out>
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    Out: Into<Bytes> + Send + 'static,
{
    type Response = HttpResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.respond(req).await) })
    }
}
