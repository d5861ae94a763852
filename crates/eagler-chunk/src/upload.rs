//! Layer buffer uploads.
//!
//! [`UploadSink`] is the boundary the scheduler writes finished geometry to.
//! [`LayerBufferStore`] is an in-memory implementation that keeps one buffer
//! per `(section, layer)` and rounds allocations up to common size classes,
//! so re-uploading a slightly larger mesh usually fits in place.

use rustc_hash::FxHashMap;

use crate::error::UploadError;
use crate::layer::RenderLayer;
use crate::position::SectionPos;

/// Number of size classes.
const NUM_SIZE_CLASSES: usize = 6;

/// Size class thresholds in bytes: 4 KB, 8 KB, 16 KB, 32 KB, 64 KB, 128 KB.
const SIZE_CLASSES: [u64; NUM_SIZE_CLASSES] = [4096, 8192, 16384, 32768, 65536, 131072];

/// Destination for built layer geometry.
pub trait UploadSink {
    /// Replaces the buffer of `layer` in section `pos` with `bytes`.
    fn upload(&mut self, pos: SectionPos, layer: RenderLayer, bytes: &[u8])
    -> Result<(), UploadError>;

    /// Frees the buffer of `layer` in section `pos`, if any.
    fn release(&mut self, pos: SectionPos, layer: RenderLayer);

    /// Frees every buffer and refuses further uploads.
    fn release_all(&mut self);
}

/// One uploaded layer buffer.
#[derive(Debug)]
struct LayerBuffer {
    data: Vec<u8>,
    allocation: u64,
}

/// In-memory layer buffers with size-class allocation and a byte budget.
#[derive(Debug)]
pub struct LayerBufferStore {
    buffers: FxHashMap<(SectionPos, RenderLayer), LayerBuffer>,
    max_bytes: u64,
    allocated: u64,
    upload_count: u64,
    released: bool,
}

impl LayerBufferStore {
    /// Creates an empty store that may allocate up to `max_bytes`.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            buffers: FxHashMap::default(),
            max_bytes,
            allocated: 0,
            upload_count: 0,
            released: false,
        }
    }

    /// Bytes reserved for a payload of `len` bytes.
    ///
    /// Payloads up to the largest size class are rounded up to the smallest
    /// class that holds them; larger payloads get an exact allocation.
    pub fn allocation_size(len: u64) -> u64 {
        SIZE_CLASSES
            .iter()
            .copied()
            .find(|&class| class >= len)
            .unwrap_or(len)
    }

    /// Contents of the buffer for `layer` in `pos`.
    pub fn buffer(&self, pos: SectionPos, layer: RenderLayer) -> Option<&[u8]> {
        self.buffers.get(&(pos, layer)).map(|b| b.data.as_slice())
    }

    /// Whether any layer of `pos` has a buffer.
    pub fn has_section(&self, pos: SectionPos) -> bool {
        RenderLayer::ALL
            .iter()
            .any(|&layer| self.buffers.contains_key(&(pos, layer)))
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live buffers in `layer`.
    pub fn layer_buffer_count(&self, layer: RenderLayer) -> usize {
        self.buffers.keys().filter(|(_, l)| *l == layer).count()
    }

    /// Bytes currently reserved across all buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    /// Byte budget.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Successful uploads since creation.
    pub fn upload_count(&self) -> u64 {
        self.upload_count
    }

    /// Whether [`release_all`](UploadSink::release_all) has been called.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl UploadSink for LayerBufferStore {
    fn upload(
        &mut self,
        pos: SectionPos,
        layer: RenderLayer,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        if self.released {
            return Err(UploadError::Released);
        }

        let key = (pos, layer);
        let len = bytes.len() as u64;
        let current = self.buffers.get(&key).map_or(0, |b| b.allocation);

        let allocation = if len <= current {
            current
        } else {
            Self::allocation_size(len)
        };

        let available = self.max_bytes.saturating_sub(self.allocated - current);
        if allocation > available {
            return Err(UploadError::OverBudget {
                section: pos,
                layer,
                requested: allocation,
                available,
            });
        }

        self.allocated = self.allocated - current + allocation;
        self.upload_count += 1;
        let buffer = self.buffers.entry(key).or_insert_with(|| LayerBuffer {
            data: Vec::new(),
            allocation: 0,
        });
        buffer.data.clear();
        buffer.data.extend_from_slice(bytes);
        buffer.allocation = allocation;
        Ok(())
    }

    fn release(&mut self, pos: SectionPos, layer: RenderLayer) {
        if let Some(buffer) = self.buffers.remove(&(pos, layer)) {
            self.allocated = self.allocated.saturating_sub(buffer.allocation);
        }
    }

    fn release_all(&mut self) {
        self.buffers.clear();
        self.allocated = 0;
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SectionPos {
        SectionPos::new(0, 0, 0)
    }

    #[test]
    fn test_allocation_rounds_to_size_class() {
        assert_eq!(LayerBufferStore::allocation_size(1), 4096);
        assert_eq!(LayerBufferStore::allocation_size(4096), 4096);
        assert_eq!(LayerBufferStore::allocation_size(4097), 8192);
        assert_eq!(LayerBufferStore::allocation_size(200_000), 200_000);
    }

    #[test]
    fn test_upload_stores_bytes() {
        let mut store = LayerBufferStore::new(1 << 20);
        store.upload(pos(), RenderLayer::Opaque, &[1, 2, 3]).unwrap();
        assert_eq!(store.buffer(pos(), RenderLayer::Opaque), Some(&[1, 2, 3][..]));
        assert_eq!(store.allocated_bytes(), 4096);
        assert_eq!(store.upload_count(), 1);
        assert!(store.has_section(pos()));
    }

    #[test]
    fn test_reupload_reuses_allocation() {
        let mut store = LayerBufferStore::new(1 << 20);
        store.upload(pos(), RenderLayer::Opaque, &[0; 6000]).unwrap();
        assert_eq!(store.allocated_bytes(), 8192);
        store.upload(pos(), RenderLayer::Opaque, &[0; 100]).unwrap();
        assert_eq!(store.allocated_bytes(), 8192);
        assert_eq!(store.buffer(pos(), RenderLayer::Opaque).unwrap().len(), 100);
    }

    #[test]
    fn test_over_budget_is_rejected() {
        let mut store = LayerBufferStore::new(8192);
        store.upload(pos(), RenderLayer::Opaque, &[0; 10]).unwrap();
        store.upload(pos(), RenderLayer::Translucent, &[0; 10]).unwrap();
        let err = store
            .upload(pos(), RenderLayer::WaterMask, &[0; 10])
            .unwrap_err();
        assert!(matches!(err, UploadError::OverBudget { available: 0, .. }));
        assert_eq!(store.buffer_count(), 2);
    }

    #[test]
    fn test_release_frees_bytes() {
        let mut store = LayerBufferStore::new(1 << 20);
        store.upload(pos(), RenderLayer::WaterMask, &[0; 10]).unwrap();
        store.release(pos(), RenderLayer::WaterMask);
        store.release(pos(), RenderLayer::WaterMask);
        assert_eq!(store.allocated_bytes(), 0);
        assert!(!store.has_section(pos()));
    }

    #[test]
    fn test_release_all_refuses_uploads() {
        let mut store = LayerBufferStore::new(1 << 20);
        store.upload(pos(), RenderLayer::Opaque, &[0; 10]).unwrap();
        store.release_all();
        assert_eq!(store.buffer_count(), 0);
        assert_eq!(
            store.upload(pos(), RenderLayer::Opaque, &[0; 10]),
            Err(UploadError::Released)
        );
    }
}
