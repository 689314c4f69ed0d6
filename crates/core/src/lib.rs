//! qx-core: Core library for the qixnat XNAT client
//!
//! This crate provides the core functionality for the qx CLI, including:
//! - XNAT path parsing and canonical form
//! - Upload hierarchy inference
//! - Wildcard path resolution
//! - The [`Xnat`] facade for listing, transfer and deletion
//! - Configuration and profile management
//!
//! This crate is independent of the XNAT REST client; the facade works over
//! any [`Repository`] implementation.

pub mod config;
pub mod error;
pub mod facade;
pub mod hierarchy;
pub mod path;
pub mod profile;
pub mod resolver;
pub mod schema;
pub mod traits;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigManager};
pub use error::{Error, Result};
pub use facade::{
    DownloadOptions, DownloadedFile, Layout, Transfer, UploadOptions, UploadedFile, Xnat,
};
pub use hierarchy::{
    infer_format, infer_upload_chain, HierarchyChain, InferOptions, SuffixMode, UploadTarget,
};
pub use path::{
    parse_location, parse_path, tokenize, Location, Matcher, PathSegment, Tokenized, XnatPath,
};
pub use profile::{Profile, ProfileManager, RetryConfig, TimeoutConfig, DEFAULT_PROFILE};
pub use resolver::Resolver;
pub use schema::{EntityType, Modality};
pub use traits::{Attributes, RemoteObject, Repository, ResolvedSet};
