use std::sync::Arc;

use tracing::debug;

use crate::video::{FrameBuffer, FrameShape};

/// Recycled output buffers for the current frame shape
///
/// Effects write into a buffer taken from here instead of a fresh
/// allocation. Cached outputs return to the pool once evicted, provided no
/// sink still holds them.
#[derive(Debug)]
pub struct ScratchPool {
    shape: Option<FrameShape>,
    free: Vec<FrameBuffer>,
    max_free: usize,
    allocations: u64,
}

impl ScratchPool {
    pub fn new(max_free: usize) -> Self {
        Self {
            shape: None,
            free: Vec::new(),
            max_free,
            allocations: 0,
        }
    }

    /// A buffer shaped like `input` and holding a copy of its pixels
    pub fn take(&mut self, input: &FrameBuffer) -> FrameBuffer {
        if self.shape != Some(input.shape()) {
            if let Some(previous) = self.shape {
                debug!("Frame shape changed from {} to {}; dropping scratch pool", previous, input.shape());
            }
            self.free.clear();
            self.shape = Some(input.shape());
        }

        if let Some(mut buffer) = self.free.pop() {
            if buffer.copy_from(input) {
                return buffer;
            }
        }
        self.allocations += 1;
        input.clone()
    }

    /// Return a buffer to the pool
    pub fn give_back(&mut self, buffer: FrameBuffer) {
        if Some(buffer.shape()) == self.shape && self.free.len() < self.max_free {
            self.free.push(buffer);
        }
    }

    /// Return a shared buffer if this was the last reference to it
    pub fn recycle(&mut self, output: Arc<FrameBuffer>) {
        if let Ok(buffer) = Arc::try_unwrap(output) {
            self.give_back(buffer);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Buffers allocated because the pool was empty
    pub fn allocations(&self) -> u64 {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::PixelLayout;

    #[test]
    fn test_buffers_are_reused_and_refilled() {
        let mut pool = ScratchPool::new(4);
        let a = FrameBuffer::new_filled(8, 8, PixelLayout::Rgb8, [10, 10, 10]).with_sequence(1);
        let b = FrameBuffer::new_filled(8, 8, PixelLayout::Rgb8, [90, 90, 90]).with_sequence(2);

        let first = pool.take(&a);
        pool.give_back(first);
        let second = pool.take(&b);

        assert_eq!(pool.allocations(), 1);
        assert!(second.same_pixels(&b));
        assert_eq!(second.sequence(), 2);
    }

    #[test]
    fn test_shape_change_drops_pool() {
        let mut pool = ScratchPool::new(4);
        let small = FrameBuffer::new_filled(4, 4, PixelLayout::Rgb8, [0, 0, 0]);
        let large = FrameBuffer::new_filled(8, 8, PixelLayout::Rgb8, [0, 0, 0]);

        let buffer = pool.take(&small);
        pool.give_back(buffer);
        assert_eq!(pool.available(), 1);

        let buffer = pool.take(&large);
        assert_eq!(pool.available(), 0);
        assert_eq!(buffer.shape(), large.shape());

        // Stale shapes are not accepted back
        pool.give_back(FrameBuffer::new_filled(4, 4, PixelLayout::Rgb8, [0, 0, 0]));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_shared_outputs_are_not_recycled() {
        let mut pool = ScratchPool::new(4);
        let frame = FrameBuffer::new_filled(4, 4, PixelLayout::Rgb8, [0, 0, 0]);
        let _ = pool.take(&frame);

        let shared = Arc::new(frame.clone());
        let held_by_sink = Arc::clone(&shared);
        pool.recycle(shared);
        assert_eq!(pool.available(), 0);

        pool.recycle(held_by_sink);
        assert_eq!(pool.available(), 1);
    }
}
