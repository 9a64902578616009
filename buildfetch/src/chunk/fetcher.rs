//! Chunk download and window extraction.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::codec::{decode_window, CodecError};
use super::{ChunkError, ChunkResult};
use crate::manifest::FileChunkPart;
use crate::transport::{Request, Transport};

/// Fetches chunk objects and decodes file part windows from them.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct ChunkFetcher {
    transport: Arc<dyn Transport>,
    chunk_base: String,
}

impl ChunkFetcher {
    /// Create a fetcher resolving chunk URLs below `chunk_base`
    /// (`<download base>/ChunksV3`).
    pub fn new(transport: Arc<dyn Transport>, chunk_base: impl Into<String>) -> Self {
        Self {
            transport,
            chunk_base: chunk_base.into(),
        }
    }

    pub fn chunk_base(&self) -> &str {
        &self.chunk_base
    }

    /// URL of the chunk object backing `part`.
    pub fn url(&self, part: &FileChunkPart) -> String {
        part.chunk.url(&self.chunk_base)
    }

    /// Download the chunk object for `part` and return the part's bytes.
    pub async fn fetch_part(&self, part: &FileChunkPart) -> ChunkResult<Bytes> {
        let url = self.url(part);
        let guid = part.chunk.guid.clone();

        let (offset, size) = match (u64::try_from(part.offset), usize::try_from(part.size)) {
            (Ok(offset), Ok(size)) => (offset, size),
            _ => {
                return Err(ChunkError::Corrupt {
                    guid,
                    source: CodecError::NegativeWindow {
                        offset: part.offset,
                        size: part.size,
                    },
                })
            }
        };

        let response = self.transport.send(Request::get(&url)).await?;
        if !response.is_success() {
            return Err(ChunkError::Status {
                url,
                status: response.status,
            });
        }

        let object = response.body;
        let object_len = object.len();
        let window = tokio::task::spawn_blocking(move || decode_window(&object, offset, size))
            .await
            .map_err(|e| ChunkError::Task(e.to_string()))?
            .map_err(|source| ChunkError::Corrupt {
                guid: guid.clone(),
                source,
            })?;

        debug!(
            guid = %guid,
            object_bytes = object_len,
            offset,
            size,
            "Decoded chunk part"
        );
        Ok(Bytes::from(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::codec::test_objects::chunk_object;
    use crate::manifest::ChunkRef;
    use crate::transport::mock::MockTransport;

    const CHUNK_BASE: &str = "http://cdn.test/CloudDir/ChunksV3";

    fn part(offset: i32, size: i32) -> FileChunkPart {
        FileChunkPart {
            chunk: Arc::new(ChunkRef {
                guid: "G1".to_string(),
                hash: "ABCDEF".to_string(),
                data_group: "04".to_string(),
            }),
            offset,
            size,
        }
    }

    fn fetcher(mock: &Arc<MockTransport>) -> ChunkFetcher {
        let transport: Arc<dyn Transport> = mock.clone();
        ChunkFetcher::new(transport, CHUNK_BASE)
    }

    #[tokio::test]
    async fn test_fetch_part_window() {
        let mock = Arc::new(MockTransport::new());
        let url = "http://cdn.test/CloudDir/ChunksV3/04/ABCDEF_G1.chunk";
        mock.route(url, 200, chunk_object(b"0123456789", true));

        let bytes = fetcher(&mock).fetch_part(&part(3, 4)).await.unwrap();
        assert_eq!(&bytes[..], b"3456");
        assert_eq!(mock.calls_to(url), 1);
    }

    #[tokio::test]
    async fn test_fetch_part_status_error() {
        let mock = Arc::new(MockTransport::new());
        let err = fetcher(&mock).fetch_part(&part(0, 1)).await.unwrap_err();
        assert!(matches!(err, ChunkError::Status { status: 404, .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fetch_part_corrupt() {
        let mock = Arc::new(MockTransport::new());
        mock.route(
            "http://cdn.test/CloudDir/ChunksV3/04/ABCDEF_G1.chunk",
            200,
            vec![0u8; 10],
        );
        let err = fetcher(&mock).fetch_part(&part(0, 1)).await.unwrap_err();
        assert!(matches!(err, ChunkError::Corrupt { ref guid, .. } if guid == "G1"));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_negative_window_is_rejected_without_fetching() {
        let mock = Arc::new(MockTransport::new());
        let err = fetcher(&mock).fetch_part(&part(-1, 4)).await.unwrap_err();
        assert!(matches!(
            err,
            ChunkError::Corrupt {
                source: CodecError::NegativeWindow { .. },
                ..
            }
        ));
        assert!(mock.requests().is_empty());
    }
}
