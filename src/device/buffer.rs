//! Grow-only device buffers.

use crate::error::BroadPhaseError;

/// A growable array with a logical length distinct from its capacity.
///
/// Storage only ever grows: [`DeviceBuffer::ensure_capacity`] and
/// [`DeviceBuffer::resize`] reuse existing storage when it is large enough,
/// and shrinking the logical length never releases memory. Repeated runs with
/// a varying element count therefore keep the historical maximum allocated.
#[derive(Debug, Clone)]
pub struct DeviceBuffer<T> {
    label: &'static str,
    /// Initialized storage; `storage.len()` is the capacity.
    storage: Vec<T>,
    len: usize,
}

impl<T> Default for DeviceBuffer<T> {
    fn default() -> Self {
        Self::labeled("buffer")
    }
}

impl<T> DeviceBuffer<T> {
    /// An empty buffer named `label` in allocation errors.
    pub const fn labeled(label: &'static str) -> Self {
        Self {
            label,
            storage: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the buffer can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Set the logical length to 0. Storage is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Logical contents.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.storage[..self.len]
    }

    /// Logical contents, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.storage[..self.len]
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }
}

impl<T: Copy + Default> DeviceBuffer<T> {
    /// Grow storage to at least `n` elements. Never shrinks.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<(), BroadPhaseError> {
        let cap = self.storage.len();
        if n <= cap {
            return Ok(());
        }
        self.storage
            .try_reserve_exact(n - cap)
            .map_err(|_| BroadPhaseError::Capacity {
                requested: n,
                what: self.label,
            })?;
        self.storage.resize(n, T::default());
        Ok(())
    }

    /// Set the logical length to `n`, growing storage when needed.
    ///
    /// Elements that become visible keep whatever the storage held; callers
    /// overwrite or [`fill`](DeviceBuffer::fill) them.
    pub fn resize(&mut self, n: usize) -> Result<(), BroadPhaseError> {
        self.ensure_capacity(n)?;
        self.len = n;
        Ok(())
    }

    /// Overwrite every logical element with `value`.
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Replace the contents with `data`.
    pub fn upload(&mut self, data: &[T]) -> Result<(), BroadPhaseError> {
        self.resize(data.len())?;
        self.as_mut_slice().copy_from_slice(data);
        Ok(())
    }

    /// Copy the logical contents to a host vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_is_grow_only() {
        let mut buf = DeviceBuffer::<u32>::labeled("test");
        buf.resize(100).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.capacity(), 100);

        buf.resize(10).unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.capacity(), 100, "capacity must not shrink");

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 100);
    }

    #[test]
    fn test_fill_touches_logical_range_only() {
        let mut buf = DeviceBuffer::<u32>::labeled("test");
        buf.resize(8).unwrap();
        buf.fill(7);
        buf.resize(4).unwrap();
        buf.fill(1);
        buf.resize(8).unwrap();
        assert_eq!(buf.as_slice(), &[1, 1, 1, 1, 7, 7, 7, 7]);
    }

    #[test]
    fn test_upload_and_download() {
        let mut buf = DeviceBuffer::labeled("test");
        buf.upload(&[3i32, 1, 2]).unwrap();
        assert_eq!(buf.to_vec(), vec![3, 1, 2]);
        assert_eq!(buf.get(1), Some(&1));
        assert_eq!(buf.get(3), None);
    }

    #[test]
    fn test_huge_allocation_reports_capacity_error() {
        let mut buf = DeviceBuffer::<u64>::labeled("huge");
        let err = buf.ensure_capacity(usize::MAX / 2).unwrap_err();
        assert_eq!(
            err,
            BroadPhaseError::Capacity {
                requested: usize::MAX / 2,
                what: "huge"
            }
        );
        assert_eq!(buf.capacity(), 0);
    }
}
