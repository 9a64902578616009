//! Build manifests.
//!
//! A manifest is a JSON document in which every binary field is stored as a
//! decimal-triplet string (see [`triplet`]). Decoding turns it into a
//! [`Manifest`]: a map from file name to the ordered chunk parts that
//! reconstruct the file.
//!
//! The [`ManifestResolver`] locates manifests either through the
//! authenticated asset catalog or directly by id/URL on the CDN, and memoizes
//! what it fetched.

mod catalog;
mod model;
mod resolver;
pub mod triplet;
mod wire;

use thiserror::Error;

use crate::auth::AuthError;
use crate::transport::TransportError;

pub use catalog::{CatalogElement, ManifestDescriptor, QueryParam};
pub use model::{ChunkRef, FileChunkPart, FileManifest, Manifest, CHUNKS_DIR};
pub use resolver::ManifestResolver;
pub use triplet::{decode_i32, decode_triplets, encode_triplets, TripletError, TripletOrder};
pub use wire::decode_manifest;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors raised while resolving or decoding manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The asset catalog response was not usable.
    #[error("failed to parse asset catalog: {0}")]
    CatalogParse(String),

    /// The manifest document was not usable.
    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    /// A file part references a chunk that is not in the chunk list.
    #[error("file {file} references unknown chunk {guid}")]
    MissingChunk { file: String, guid: String },

    /// The manifest could not be fetched.
    #[error("manifest request failed: {0}")]
    Transport(#[from] TransportError),

    /// The catalog request could not be authenticated.
    #[error("catalog authentication failed: {0}")]
    Auth(#[from] AuthError),
}
