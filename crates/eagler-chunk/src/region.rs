//! Section handle cache.
//!
//! Maps section positions to renderable [`SectionHandle`]s, created lazily.
//! Also records per-section whether translucent geometry must be re-sorted
//! when the camera moves.

use rustc_hash::FxHashMap;

use crate::position::SectionPos;

/// A renderable section known to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionHandle {
    /// Stable id, unique for the lifetime of the cache.
    pub id: u64,
    /// Section this handle renders.
    pub pos: SectionPos,
    /// Whether transparency-dependent layers need re-sorting on camera moves.
    pub needs_resort: bool,
}

/// Lookup facade from [`SectionPos`] to [`SectionHandle`].
#[derive(Debug, Default)]
pub struct RenderRegionCache {
    handles: FxHashMap<SectionPos, SectionHandle>,
    next_id: u64,
    released: bool,
}

impl RenderRegionCache {
    /// Creates an empty, open cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `pos`, created on first use. `None` once released.
    pub fn get(&mut self, pos: SectionPos) -> Option<SectionHandle> {
        if self.released {
            return None;
        }
        let next_id = &mut self.next_id;
        let handle = self.handles.entry(pos).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            SectionHandle {
                id,
                pos,
                needs_resort: false,
            }
        });
        Some(*handle)
    }

    /// Marks `pos` as having no transparency-dependent geometry.
    pub fn mark_clean(&mut self, pos: SectionPos) {
        if let Some(handle) = self.handles.get_mut(&pos) {
            handle.needs_resort = false;
        }
    }

    /// Marks `pos` as holding geometry that must be re-sorted on camera moves.
    pub fn mark_needs_resort(&mut self, pos: SectionPos) {
        if let Some(handle) = self.handles.get_mut(&pos) {
            handle.needs_resort = true;
        }
    }

    /// Whether `pos` holds geometry that must be re-sorted.
    pub fn needs_resort(&self, pos: SectionPos) -> bool {
        self.handles.get(&pos).is_some_and(|h| h.needs_resort)
    }

    /// Positions whose handles need re-sorting.
    pub fn resort_candidates(&self) -> impl Iterator<Item = SectionPos> + '_ {
        self.handles
            .values()
            .filter(|h| h.needs_resort)
            .map(|h| h.pos)
    }

    /// Drops every cached handle. The cache stays open.
    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Drops every cached handle and closes the cache. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.handles.clear();
        self.released = true;
        tracing::debug!("Render region cache released");
    }

    /// Reopens a released cache. Ids keep counting from where they stopped.
    pub fn reopen(&mut self) {
        self.released = false;
    }

    /// Whether [`release`](Self::release) has been called since the last reopen.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handles are cached.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
