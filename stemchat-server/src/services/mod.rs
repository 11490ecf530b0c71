//! Collaborators of the session engine and the HTTP surface

pub mod file_store;
pub mod lookup;
pub mod separation;

pub use file_store::{FileStore, StoreError, BUNDLE_NAME};
pub use lookup::{ArtistCredit, LookupError, SongLookup, SongMatch, VocaDbClient};
pub use separation::{CommandRunner, JobOutcome, SeparationRunner};
