//! Waystack facade crate.
//!
//! Re-exports the core, runtime, http, and db crates behind a single entry point.
//! `Waystack::http()` is an ingress builder around a [`Navigator`], not a web framework.

pub use waystack_core as core;
#[cfg(feature = "db")]
pub use waystack_db as db;
#[cfg(feature = "http")]
pub use waystack_http as http;
pub use waystack_runtime as runtime;

pub use waystack_core::{Context, NavConfig, NavError, NavResult, Value};
#[cfg(feature = "http")]
pub use waystack_http::{NavIngress, NavService, Waystack};
pub use waystack_runtime::{Inbound, Keys, Navigator, Page, Registry};

pub mod prelude {
    pub use waystack_core::prelude::*;
    #[cfg(feature = "db")]
    pub use waystack_db::prelude::*;
    #[cfg(feature = "http")]
    pub use waystack_http::prelude::*;
    pub use waystack_runtime::prelude::*;
}
