//! Transfer descriptors and completion events.
//!
//! A [`Transfer`] borrows the caller's buffer for as long as it is active and
//! is consumed by [`Transfer::finish`], which is the only way to produce a
//! [`Completion`]. A transfer therefore reaches exactly one terminal status.

use crate::hal::serial::UartError;

/// Number of completion events the driver can hold before they are delivered.
///
/// Each active transfer reserves one slot when it starts.
pub const COMPLETION_SLOTS: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Terminal status of a transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    /// Overflow, line fault, replacement or cancellation.
    Error,
    /// Ended by an external timer.
    Timeout,
}

/// A finished transfer, handing the buffer back to its owner.
#[derive(Debug)]
pub struct Completion<'a> {
    pub direction: Direction,
    pub status: TransferStatus,
    /// Bytes stored (read) or taken from the buffer (write).
    pub transferred: usize,
    pub buffer: &'a mut [u8],
}

impl Completion<'_> {
    /// The part of the buffer the transfer got through.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.transferred]
    }

    pub fn is_ok(&self) -> bool {
        self.status == TransferStatus::Ok
    }
}

/// A refused `read`/`write`. The buffer is returned untouched.
#[derive(Debug)]
pub struct Rejected<'a> {
    pub error: UartError,
    pub buffer: &'a mut [u8],
}

/// One in-flight transfer.
#[derive(Debug)]
pub(crate) struct Transfer<'a> {
    buffer: &'a mut [u8],
    size: usize,
    transferred: usize,
}

impl<'a> Transfer<'a> {
    /// `size` must be non-zero and fit in `buffer`; the driver checks.
    pub(crate) fn new(buffer: &'a mut [u8], size: usize) -> Self {
        debug_assert!(size > 0 && size <= buffer.len());
        Self {
            buffer,
            size,
            transferred: 0,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn transferred(&self) -> usize {
        self.transferred
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.transferred == self.size
    }

    /// Store one received byte. Returns `false` when the buffer is full.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.is_complete() {
            return false;
        }
        self.buffer[self.transferred] = byte;
        self.transferred += 1;
        true
    }

    /// Take the next byte to transmit.
    pub(crate) fn pull(&mut self) -> Option<u8> {
        if self.is_complete() {
            return None;
        }
        let byte = self.buffer[self.transferred];
        self.transferred += 1;
        Some(byte)
    }

    pub(crate) fn finish(self, direction: Direction, status: TransferStatus) -> Completion<'a> {
        Completion {
            direction,
            status,
            transferred: self.transferred,
            buffer: self.buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_at_size() {
        let mut buf = [0u8; 4];
        let mut rx = Transfer::new(&mut buf, 2);
        assert!(rx.push(1));
        assert!(!rx.is_complete());
        assert!(rx.push(2));
        assert!(rx.is_complete());
        assert!(!rx.push(3));
        assert_eq!(rx.transferred(), 2);

        let done = rx.finish(Direction::Read, TransferStatus::Ok);
        assert_eq!(done.data(), &[1, 2]);
        assert_eq!(done.buffer, &[1, 2, 0, 0]);
        assert!(done.is_ok());
    }

    #[test]
    fn pull_walks_the_buffer() {
        let mut buf = [7u8, 8, 9];
        let mut tx = Transfer::new(&mut buf, 3);
        assert_eq!(tx.pull(), Some(7));
        assert_eq!(tx.pull(), Some(8));
        assert_eq!(tx.pull(), Some(9));
        assert_eq!(tx.pull(), None);
        assert_eq!(tx.size(), 3);
        assert!(tx.is_complete());
    }

    #[test]
    fn finish_keeps_partial_progress() {
        let mut buf = [0u8; 8];
        let mut rx = Transfer::new(&mut buf, 8);
        rx.push(0xAA);
        let done = rx.finish(Direction::Read, TransferStatus::Error);
        assert_eq!(done.transferred, 1);
        assert_eq!(done.data(), &[0xAA]);
        assert!(!done.is_ok());
    }
}
