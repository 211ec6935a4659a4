pub mod engine;
pub mod governor;
pub mod link;
pub mod registry;
pub mod store;
pub mod transport;

pub mod prelude {
    pub use crate::engine::{
        ActionContext, Inbound, Keys, Navigator, NavigatorBuilder, Page, PageOrigin, RenderContext,
    };
    pub use crate::link::{Link, LinkMethod};
    pub use crate::registry::Registry;
    pub use crate::store::{BlobStore, MemoryBlobStore};
}

pub use engine::{
    ActionContext, Dispatched, Inbound, Keys, Navigator, NavigatorBuilder, Page, PageOrigin,
    RenderContext, Rendered,
};
pub use governor::{Governed, SizeGovernor};
pub use link::{Link, LinkMethod};
pub use registry::{Catalog, Registry};
pub use store::{BlobStore, MemoryBlobStore};
pub use transport::{StagedWrite, Token, Transport};
