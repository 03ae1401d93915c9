//! Pull-producers for chunked writes.

/// A pull-producer of byte chunks.
///
/// Each call to [`next_chunk`](Self::next_chunk) returns the next chunk
/// or `None` once the producer is exhausted. Producers are consumed from
/// the event loop thread one chunk per tick, so implementations should
/// return promptly; a slow producer stalls only its own operation, but it
/// stalls that operation for everyone.
pub trait ChunkProducer: Send {
    /// Returns the next chunk, or `None` at end of stream.
    fn next_chunk(&mut self) -> Option<Vec<u8>>;
}

impl ChunkProducer for Box<dyn ChunkProducer> {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        (**self).next_chunk()
    }
}

/// A producer backed by an iterator of byte chunks.
#[derive(Debug)]
pub struct IterProducer<I> {
    iter: I,
}

impl<I, B> ChunkProducer for IterProducer<I>
where
    I: Iterator<Item = B> + Send,
    B: Into<Vec<u8>>,
{
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.iter.next().map(Into::into)
    }
}

/// Wraps an iterator of byte chunks as a [`ChunkProducer`].
pub fn producer_from_iter<I, B>(iter: I) -> IterProducer<I::IntoIter>
where
    I: IntoIterator<Item = B>,
    I::IntoIter: Send,
    B: Into<Vec<u8>>,
{
    IterProducer {
        iter: iter.into_iter(),
    }
}

/// A producer backed by a closure.
pub struct FnProducer<F> {
    pull: F,
}

impl<F> ChunkProducer for FnProducer<F>
where
    F: FnMut() -> Option<Vec<u8>> + Send,
{
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        (self.pull)()
    }
}

/// Wraps a pull closure as a [`ChunkProducer`].
pub fn producer_from_fn<F>(pull: F) -> FnProducer<F>
where
    F: FnMut() -> Option<Vec<u8>> + Send,
{
    FnProducer { pull }
}

/// Yields a single chunk, then end of stream.
#[derive(Debug)]
pub(crate) struct OnceProducer {
    chunk: Option<Vec<u8>>,
}

impl OnceProducer {
    pub(crate) fn new(chunk: Vec<u8>) -> Self {
        Self { chunk: Some(chunk) }
    }
}

impl ChunkProducer for OnceProducer {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        self.chunk.take()
    }
}

/// The data argument accepted by streaming writes: either a complete byte
/// string delivered as a single chunk, or a pull-producer.
pub enum WriteSource {
    /// A complete byte string, written as one chunk.
    Bytes(Vec<u8>),
    /// A pull-producer consumed chunk by chunk.
    Producer(Box<dyn ChunkProducer>),
}

impl WriteSource {
    /// Converts the source into a producer, normalizing the byte form
    /// into a one-shot producer.
    pub(crate) fn into_producer(self) -> Box<dyn ChunkProducer> {
        match self {
            Self::Bytes(b) => Box::new(OnceProducer::new(b)),
            Self::Producer(p) => p,
        }
    }
}

impl std::fmt::Debug for WriteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Producer(_) => f.debug_tuple("Producer").finish(),
        }
    }
}

impl From<Vec<u8>> for WriteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for WriteSource {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for WriteSource {
    fn from(s: String) -> Self {
        Self::Bytes(s.into_bytes())
    }
}

impl From<&str> for WriteSource {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}

impl From<Box<dyn ChunkProducer>> for WriteSource {
    fn from(producer: Box<dyn ChunkProducer>) -> Self {
        Self::Producer(producer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn iter_producer_yields_all_chunks_in_order() {
        init_test("iter_producer_yields_all_chunks_in_order");
        let mut p = producer_from_iter(vec![b"ab".to_vec(), b"cd".to_vec()]);
        crate::assert_with_log!(
            p.next_chunk() == Some(b"ab".to_vec()),
            "first chunk",
            "ab",
            "?"
        );
        crate::assert_with_log!(
            p.next_chunk() == Some(b"cd".to_vec()),
            "second chunk",
            "cd",
            "?"
        );
        crate::assert_with_log!(p.next_chunk().is_none(), "exhausted", true, p.next_chunk().is_none());
        crate::test_complete!("iter_producer_yields_all_chunks_in_order");
    }

    #[test]
    fn fn_producer_pulls_until_none() {
        init_test("fn_producer_pulls_until_none");
        let mut n = 0;
        let mut p = producer_from_fn(move || {
            n += 1;
            if n <= 3 {
                Some(vec![n as u8])
            } else {
                None
            }
        });
        let mut collected = Vec::new();
        while let Some(c) = p.next_chunk() {
            collected.extend(c);
        }
        crate::assert_with_log!(collected == vec![1, 2, 3], "pulled all", vec![1, 2, 3], collected);
        crate::test_complete!("fn_producer_pulls_until_none");
    }

    #[test]
    fn write_source_bytes_become_single_chunk() {
        init_test("write_source_bytes_become_single_chunk");
        let src = WriteSource::from("hello");
        let mut p = src.into_producer();
        crate::assert_with_log!(
            p.next_chunk() == Some(b"hello".to_vec()),
            "single chunk",
            "hello",
            "?"
        );
        let done = p.next_chunk().is_none();
        crate::assert_with_log!(done, "then end of stream", true, done);
        crate::test_complete!("write_source_bytes_become_single_chunk");
    }
}
