//! Manifest JSON wire format and its decoding into [`Manifest`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::model::{ChunkRef, FileChunkPart, FileManifest, Manifest};
use super::triplet::{decode_i32, decode_triplets, to_hex_upper, TripletOrder};
use super::{ManifestError, ManifestResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebManifest {
    #[serde(default)]
    manifest_file_version: Option<String>,
    #[serde(default)]
    app_name_string: Option<String>,
    #[serde(default)]
    build_version_string: Option<String>,
    #[serde(default)]
    launch_exe_string: Option<String>,
    #[serde(default)]
    file_manifest_list: Vec<WebFileManifest>,
    #[serde(default)]
    chunk_hash_list: BTreeMap<String, String>,
    #[serde(default)]
    data_group_list: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebFileManifest {
    filename: String,
    #[serde(default)]
    file_hash: Option<String>,
    #[serde(default)]
    file_chunk_parts: Vec<WebFileChunkPart>,
    #[serde(default)]
    install_tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebFileChunkPart {
    guid: String,
    offset: String,
    size: String,
}

/// Decode a raw manifest document.
///
/// Chunk hashes are decoded with their bytes reversed; part offsets and
/// sizes are forward little-endian `i32`s. Any malformed field fails the
/// whole manifest.
pub fn decode_manifest(raw: &[u8]) -> ManifestResult<Manifest> {
    let web: WebManifest =
        serde_json::from_slice(raw).map_err(|e| ManifestError::ManifestParse(e.to_string()))?;

    let mut chunks = HashMap::with_capacity(web.chunk_hash_list.len());
    for (guid, hash) in &web.chunk_hash_list {
        let chunk = decode_chunk(guid, hash, &web.data_group_list)?;
        chunks.insert(guid.clone(), Arc::new(chunk));
    }

    let mut files = BTreeMap::new();
    for file in web.file_manifest_list {
        let parts = file
            .file_chunk_parts
            .iter()
            .map(|part| decode_part(&file.filename, part, &chunks))
            .collect::<ManifestResult<Vec<_>>>()?;

        let file_hash = match file.file_hash.as_deref() {
            Some(hash) => Some(to_hex_upper(&decode_triplets(hash, TripletOrder::Forward).map_err(
                |e| ManifestError::ManifestParse(format!("file {} hash: {}", file.filename, e)),
            )?)),
            None => None,
        };

        files.insert(
            file.filename,
            FileManifest {
                parts,
                file_hash,
                install_tags: file.install_tags,
            },
        );
    }

    debug!(
        files = files.len(),
        chunks = chunks.len(),
        build = ?web.build_version_string,
        "Decoded manifest"
    );

    Ok(Manifest {
        manifest_file_version: web.manifest_file_version,
        app_name: web.app_name_string,
        build_version: web.build_version_string,
        launch_exe: web.launch_exe_string,
        files,
    })
}

fn decode_chunk(
    guid: &str,
    hash: &str,
    data_groups: &HashMap<String, String>,
) -> ManifestResult<ChunkRef> {
    let group = data_groups
        .get(guid)
        .ok_or_else(|| ManifestError::ManifestParse(format!("chunk {} has no data group", guid)))?;
    let group: u32 = group.trim().parse().map_err(|_| {
        ManifestError::ManifestParse(format!("chunk {} data group {:?} is not a number", guid, group))
    })?;

    let hash = decode_triplets(hash, TripletOrder::Reversed)
        .map_err(|e| ManifestError::ManifestParse(format!("chunk {} hash: {}", guid, e)))?;

    Ok(ChunkRef {
        guid: guid.to_string(),
        hash: to_hex_upper(&hash),
        data_group: format!("{:02}", group),
    })
}

fn decode_part(
    filename: &str,
    part: &WebFileChunkPart,
    chunks: &HashMap<String, Arc<ChunkRef>>,
) -> ManifestResult<FileChunkPart> {
    let chunk = chunks
        .get(&part.guid)
        .cloned()
        .ok_or_else(|| ManifestError::MissingChunk {
            file: filename.to_string(),
            guid: part.guid.clone(),
        })?;

    Ok(FileChunkPart {
        chunk,
        offset: decode_field(filename, "offset", &part.offset)?,
        size: decode_field(filename, "size", &part.size)?,
    })
}

fn decode_field(filename: &str, field: &str, text: &str) -> ManifestResult<i32> {
    let parse_error =
        |reason: String| ManifestError::ManifestParse(format!("file {} part {}: {}", filename, field, reason));

    match decode_i32(text).map_err(|e| parse_error(e.to_string()))? {
        Some(value) if value >= 0 => Ok(value),
        Some(value) => Err(parse_error(format!("negative value {}", value))),
        None => Err(parse_error("fewer than 4 bytes".to_string())),
    }
}
