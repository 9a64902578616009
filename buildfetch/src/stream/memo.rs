//! Memo strategies for fetched part payloads.

use bytes::Bytes;

/// Memoized part payloads.
#[derive(Debug)]
pub(super) enum ChunkMemo {
    /// Only the most recently fetched part.
    LastFetched(Option<(usize, Bytes)>),
    /// Every fetched part, by index.
    All(Vec<Option<Bytes>>),
}

impl ChunkMemo {
    pub(super) fn last_fetched() -> Self {
        ChunkMemo::LastFetched(None)
    }

    pub(super) fn all(parts: usize) -> Self {
        ChunkMemo::All(vec![None; parts])
    }

    pub(super) fn get(&self, index: usize) -> Option<Bytes> {
        match self {
            ChunkMemo::LastFetched(Some((last, payload))) if *last == index => {
                Some(payload.clone())
            }
            ChunkMemo::LastFetched(_) => None,
            ChunkMemo::All(slots) => slots.get(index).cloned().flatten(),
        }
    }

    pub(super) fn store(&mut self, index: usize, payload: Bytes) {
        match self {
            ChunkMemo::LastFetched(slot) => *slot = Some((index, payload)),
            ChunkMemo::All(slots) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(payload);
                }
            }
        }
    }

    pub(super) fn clear(&mut self) {
        match self {
            ChunkMemo::LastFetched(slot) => *slot = None,
            ChunkMemo::All(slots) => slots.iter_mut().for_each(|slot| *slot = None),
        }
    }

    #[cfg(test)]
    pub(super) fn cached(&self) -> usize {
        match self {
            ChunkMemo::LastFetched(slot) => usize::from(slot.is_some()),
            ChunkMemo::All(slots) => slots.iter().filter(|s| s.is_some()).count(),
        }
    }
}
