//! Decoded manifest model.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Directory under the download base holding chunk objects.
pub const CHUNKS_DIR: &str = "ChunksV3";

/// A content-addressed chunk on the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    pub guid: String,
    /// Upper-case hex of the chunk hash.
    pub hash: String,
    /// Two-digit storage bucket.
    pub data_group: String,
}

impl ChunkRef {
    /// Chunk object URL below `chunk_base` (which already ends in `ChunksV3`).
    ///
    /// Format: `{chunk_base}/{data_group}/{hash}_{guid}.chunk`
    pub fn url(&self, chunk_base: &str) -> String {
        format!(
            "{}/{}/{}_{}.chunk",
            chunk_base.trim_end_matches('/'),
            self.data_group,
            self.hash,
            self.guid
        )
    }
}

/// A byte range of one chunk's decompressed payload contributing to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunkPart {
    pub chunk: Arc<ChunkRef>,
    /// Start of the range within the decompressed payload.
    pub offset: i32,
    /// Number of payload bytes this part contributes.
    pub size: i32,
}

impl FileChunkPart {
    pub fn len(&self) -> u64 {
        self.size as u64
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// One file of a build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileManifest {
    /// Parts in file byte order.
    pub parts: Vec<FileChunkPart>,
    /// Hex of the file hash, when the manifest carries one.
    pub file_hash: Option<String>,
    pub install_tags: Vec<String>,
}

impl FileManifest {
    /// Reconstructed file length: the sum of part sizes.
    pub fn len(&self) -> u64 {
        self.parts.iter().map(FileChunkPart::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub manifest_file_version: Option<String>,
    pub app_name: Option<String>,
    pub build_version: Option<String>,
    pub launch_exe: Option<String>,
    /// Files by name, sorted.
    pub files: BTreeMap<String, FileManifest>,
}

impl Manifest {
    pub fn file(&self, name: &str) -> Option<&FileManifest> {
        self.files.get(name)
    }

    /// Parts of a file, in byte order.
    pub fn parts(&self, name: &str) -> Option<&[FileChunkPart]> {
        self.files.get(name).map(|f| f.parts.as_slice())
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Total size of the named files. Unknown names count as zero.
    pub fn total_size<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> u64 {
        names
            .into_iter()
            .filter_map(|name| self.files.get(name))
            .map(FileManifest::len)
            .sum()
    }
}
