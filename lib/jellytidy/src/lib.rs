pub mod error;
pub mod executor;
pub mod grouping;
pub mod jellyfin;
pub mod junk;
pub mod memory;
pub mod planner;
pub mod playlist;
pub mod services;
pub mod similarity;
pub mod snapshot;
pub mod spotify;
pub mod ssh;
pub mod traits;

pub use error::{CatalogError, Result};
pub use executor::MergeExecutor;
pub use jellyfin::{JellyfinClient, JellyfinClientBuilder};
pub use memory::MemoryCatalog;
pub use planner::PlanOptions;
pub use playlist::PlaylistGenerator;
pub use services::{Services, ServicesBuilder};
pub use snapshot::CatalogSnapshot;
pub use spotify::SpotifyClient;
pub use ssh::PlaylistFileCleaner;
pub use traits::{CatalogApi, DiscoveryApi, PlaylistApi};
