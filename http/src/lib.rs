//! HTTP adapter for Waystack: hyper 1.x ingress plus a Tower service.
//!
//! Views and actions registered on a navigator served here receive the
//! request head (`http::request::Parts`) as their request type.

pub mod ingress;
pub mod request;
pub mod service;

pub use ingress::{NavIngress, Waystack};
pub use service::{HttpResponse, IngressSettings, NavService};

pub mod prelude {
    pub use crate::ingress::{NavIngress, Waystack};
    pub use crate::service::{IngressSettings, NavService};
    pub use http::request::Parts;
}
