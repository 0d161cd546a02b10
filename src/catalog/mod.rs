//! Catalog enumeration and serialization.
//!
//! * [`lister`] — paginated record discovery from the catalog endpoint.
//! * [`writer`] — CSV / JSON / URL-list generation files per run.

pub mod lister;
pub mod writer;

pub use lister::CatalogLister;
pub use writer::{CatalogFiles, CatalogWriter};
