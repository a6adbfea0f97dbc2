pub mod cache;
pub mod display;
pub mod lookup;
pub mod types;

pub use cache::CachedLookup;
pub use display::VideoCard;
pub use lookup::{CatalogLookup, MetadataLookup};
pub use types::VideoMetadata;
