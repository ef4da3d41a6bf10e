/// A host read-back of a value produced on a stream.
///
/// Every read-back is a blocking synchronization point: the controlling
/// thread cannot size the next stage until it has the value. The handle must
/// be consumed with [`Readback::wait`].
#[must_use = "a read-back is a host synchronization point; call `wait()` to obtain the value"]
#[derive(Debug)]
pub struct Readback<T> {
    value: T,
}

impl<T> Readback<T> {
    #[inline]
    pub(crate) fn ready(value: T) -> Self {
        Self { value }
    }

    /// Block until the value is available on the host and return it.
    #[inline]
    pub fn wait(self) -> T {
        self.value
    }
}
