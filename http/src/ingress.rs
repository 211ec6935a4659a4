//! # Ingress Module - HTTP Entry Point
//!
//! `Waystack::http(navigator)` wires a [`Navigator`] to a hyper server.
//!
//! ## API Surface
//!
//! - `bind(addr)`: listen address
//! - `mount(path)`: path the application answers on
//! - `session_cookie(name)` / `secure_cookie(bool)`: session identity
//! - `run()`: serve until the listener fails
//! - `into_raw_service()`: escape hatch to a Tower service

use crate::service::{IngressSettings, NavService};
use bytes::Bytes;
use http::Request;
use http::request::Parts;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use waystack_runtime::Navigator;

/// The Waystack entry point.
pub struct Waystack;

impl Waystack {
    /// Create an HTTP ingress builder around a navigator.
    pub fn http<Out>(navigator: Navigator<Parts, Out>) -> NavIngress<Out>
    where
        Out: Into<Bytes> + Send + 'static,
    {
        NavIngress::new(navigator)
    }
}

/// HTTP ingress builder for one navigator.
pub struct NavIngress<Out> {
    addr: Option<String>,
    settings: IngressSettings,
    navigator: Arc<Navigator<Parts, Out>>,
}

impl<Out> NavIngress<Out>
where
    Out: Into<Bytes> + Send + 'static,
{
    pub fn new(navigator: Navigator<Parts, Out>) -> Self {
        Self {
            addr: None,
            settings: IngressSettings::default(),
            navigator: Arc::new(navigator),
        }
    }

    /// Set the bind address for the server.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn mount(mut self, path: impl Into<String>) -> Self {
        self.settings.mount = path.into();
        self
    }

    pub fn session_cookie(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie = name.into();
        self
    }

    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.settings.secure_cookie = secure;
        self
    }

    /// Largest accepted form body.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.settings.max_body_bytes = limit;
        self
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr_str = self.addr.as_deref().unwrap_or("127.0.0.1:3000");
        let addr: SocketAddr = addr_str.parse()?;
        let backend = self.navigator.transport().kind().as_str();
        let service = NavService::new(self.navigator, self.settings);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            backend,
            "Waystack HTTP ingress listening on http://{}",
            addr
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let service = service.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let service = service.clone();
                    async move { Ok::<_, std::convert::Infallible>(service.respond(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection: {:?}", err);
                }
            });
        }
    }

    /// Convert to a Tower service for integration with existing Tower stacks.
    pub fn into_raw_service(self) -> NavService<Out> {
        NavService::new(self.navigator, self.settings)
    }
}

