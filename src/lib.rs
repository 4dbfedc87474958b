//! depot - permission-aware artifact storage.
//!
//! Directories hold artifacts. Each directory carries an owner, a public
//! flag, a time-to-live and a byte quota. Reads are filtered by who is
//! asking, uploads are bounded by the quota, expired artifacts are swept
//! by [`retention`] and single files can be handed out through
//! [`shares`].
//!
//! The [`Depot`] facade ties the pieces together; [`http`] exposes it over
//! axum and the `depot` binary wraps it in a CLI.
//!
//! ```no_run
//! use depot::{Depot, Identity};
//! use depot::model::NewDirectory;
//!
//! let depot = Depot::memory();
//! depot.create_directory(NewDirectory {
//!     path: "/pub".into(),
//!     is_public: true,
//!     ..Default::default()
//! })?;
//! let listing = depot.resolve("pub/", &Identity::Anonymous)?;
//! # Ok::<(), depot::Error>(())
//! ```

pub mod access;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod listing;
pub mod logging;
pub mod model;
pub mod paths;
pub mod quota;
pub mod retention;
pub mod service;
pub mod shares;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use identity::Identity;
pub use listing::{FileRef, Listing, ListingFormat, Resolved};
pub use retention::CleanReport;
pub use service::{Depot, DirectoryDefaults, DirectoryEntry, FileInfo, Upload};
