//! Auto-buffering producer adapter.

use super::ChunkProducer;

/// Coalesces small upstream yields into chunks of at least a target size.
///
/// Wraps a [`ChunkProducer`] and concatenates its yields until the
/// accumulated length reaches the configured threshold, then yields the
/// accumulated buffer. Any residual shorter than the threshold is yielded
/// when the upstream ends. With a threshold of zero the adapter passes
/// chunks through untouched.
pub struct Coalescer<P> {
    inner: P,
    target: usize,
    buf: Vec<u8>,
    exhausted: bool,
}

impl<P: ChunkProducer> Coalescer<P> {
    /// Wraps `inner`, coalescing yields to at least `target` bytes.
    pub fn new(inner: P, target: usize) -> Self {
        Self {
            inner,
            target,
            buf: Vec::new(),
            exhausted: false,
        }
    }
}

impl<P: ChunkProducer> ChunkProducer for Coalescer<P> {
    fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.exhausted {
            return None;
        }
        if self.target == 0 {
            let chunk = self.inner.next_chunk();
            if chunk.is_none() {
                self.exhausted = true;
            }
            return chunk;
        }
        loop {
            match self.inner.next_chunk() {
                Some(chunk) => {
                    self.buf.extend_from_slice(&chunk);
                    if self.buf.len() >= self.target {
                        return Some(std::mem::take(&mut self.buf));
                    }
                }
                None => {
                    self.exhausted = true;
                    if self.buf.is_empty() {
                        return None;
                    }
                    return Some(std::mem::take(&mut self.buf));
                }
            }
        }
    }
}
