//! Ring buffer shared between a codec stage and its upstream/downstream
//! neighbor, per spec.md 5 ("Shared resources"). Only the producer advances
//! `head`; only the consumer advances `tail`. A fixed one-slot gap between
//! `head` and `tail` distinguishes full from empty without a separate count.
//!
//! This in-process version targets the single-threaded cooperative
//! scheduling mode (spec.md 5's deployment mode 1, used by the batch CLI
//! tool); the multi-threaded hardware-ring mode adds a spinlock around
//! `head`/`tail` updates only, which a caller bridging to real hardware
//! would wrap this type in (see `DESIGN.md`).

pub struct RingBuffer {
    buffer: Vec<u8>,
    head: usize, // next write position
    tail: usize, // next read position
}

impl RingBuffer {
    /// `size` is the buffer's raw slot count; one slot is always held back
    /// to keep the full/empty states distinguishable, so usable capacity is
    /// `size - 1`.
    pub fn new(size: usize) -> Self {
        assert!(size >= 2);
        Self { buffer: vec![0u8; size], head: 0, tail: 0 }
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn bytes_available(&self) -> usize {
        (self.head + self.size() - self.tail) % self.size()
    }

    pub fn space_available(&self) -> usize {
        self.size() - 1 - self.bytes_available()
    }

    /// Appends as many bytes from `data` as fit; returns the count written.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.space_available());
        for &b in &data[..n] {
            self.buffer[self.head] = b;
            self.head = (self.head + 1) % self.size();
        }
        n
    }

    /// Copies as many bytes as available into `out`; returns the count read.
    pub fn pop(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.bytes_available());
        for slot in out.iter_mut().take(n) {
            *slot = self.buffer[self.tail];
            self.tail = (self.tail + 1) % self.size();
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_space_sum_to_usable_capacity() {
        let mut ring = RingBuffer::new(16);
        for n in [0usize, 3, 10, 15, 7] {
            let data = vec![0xAAu8; n];
            ring.push(&data);
            assert_eq!(ring.bytes_available() + ring.space_available(), 15);
            let mut sink = vec![0u8; ring.bytes_available()];
            ring.pop(&mut sink);
        }
    }

    #[test]
    fn push_stops_at_capacity_and_pop_returns_fifo_order() {
        let mut ring = RingBuffer::new(8);
        let written = ring.push(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(written, 7); // usable capacity is size-1
        let mut out = vec![0u8; 7];
        let read = ring.pop(&mut out);
        assert_eq!(read, 7);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn wraps_around_the_underlying_buffer() {
        let mut ring = RingBuffer::new(4);
        ring.push(&[1, 2, 3]);
        let mut out = [0u8; 2];
        ring.pop(&mut out);
        assert_eq!(out, [1, 2]);
        ring.push(&[4, 5]);
        let mut rest = vec![0u8; ring.bytes_available()];
        ring.pop(&mut rest);
        assert_eq!(rest, vec![3, 4, 5]);
    }
}
