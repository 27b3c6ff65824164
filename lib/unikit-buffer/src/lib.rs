//! Capacity and growth-factor policy shared by every UTFx sequence body.
//!
//! [`Buffer<T>`] is a flat, growable store of storage units (bytes for UTF-8, `u16` for
//! UTF-16) with an explicit, queryable capacity distinct from its payload length, and a
//! [`Growth`] policy controlling how [`Buffer::grow_to`] picks a new capacity.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

/// How a [`Buffer`] chooses a new capacity when it must grow.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Growth {
    /// The buffer never grows; [`Buffer::grow_to`] fails once capacity is insufficient.
    Fixed,
    /// The buffer grows by a fixed step each time it must grow.
    Linear(usize),
    /// The buffer doubles its capacity (from a floor of 1) until it fits the request.
    Exponential,
}

/// A capacity change that the buffer's [`Growth`] policy or payload refused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrowthError {
    /// The requested capacity is smaller than the current payload; data would be lost.
    WouldLoseData,
    /// The current [`Growth`] policy forbids reaching the requested capacity.
    Forbidden,
}

impl fmt::Display for GrowthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldLoseData => f.write_str("resize would truncate existing payload"),
            Self::Forbidden => f.write_str("growth policy forbids reaching the requested capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GrowthError {}

/// A growable store of storage units with an explicit capacity and growth policy.
#[derive(Clone, Debug)]
pub struct Buffer<T> {
    data: Vec<T>,
    capacity: usize,
    growth: Growth,
}

impl<T: Clone> Buffer<T> {
    /// Creates an empty buffer with zero capacity and the given growth policy.
    #[must_use]
    pub const fn new(growth: Growth) -> Self {
        Self { data: Vec::new(), capacity: 0, growth }
    }

    /// Creates an empty buffer with at least `capacity` storage units reserved up front.
    #[must_use]
    pub fn with_capacity(capacity: usize, growth: Growth) -> Self {
        let mut data = Vec::new();
        data.reserve_exact(capacity);
        Self { data, capacity, growth }
    }

    /// Adopts an already-populated `Vec<T>` as the buffer's payload, with capacity equal to
    /// `data.len()`. Used by sequence bodies that adopt an owned, pre-validated buffer.
    #[must_use]
    pub fn from_vec(data: Vec<T>, growth: Growth) -> Self {
        let capacity = data.len();
        Self { data, capacity, growth }
    }

    /// Consumes the buffer, returning its payload as a plain `Vec<T>` and leaving nothing
    /// behind.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// The buffer's capacity in storage units.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of storage units currently holding payload.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no payload.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The buffer's current growth policy.
    #[inline]
    #[must_use]
    pub const fn growth(&self) -> Growth {
        self.growth
    }

    /// A read-only view of the payload.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// A mutable view of the payload. Does not change length or capacity.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Resizes capacity to exactly `new_cap`.
    ///
    /// A no-op when `new_cap` already equals the current capacity. Fails with
    /// [`GrowthError::WouldLoseData`] when `new_cap` is smaller than the current payload
    /// length; existing contents are always preserved on success.
    pub fn resize(&mut self, new_cap: usize) -> Result<(), GrowthError> {
        if new_cap == self.capacity {
            return Ok(());
        }
        if new_cap < self.data.len() {
            return Err(GrowthError::WouldLoseData);
        }
        let additional = new_cap.saturating_sub(self.data.capacity());
        self.data.reserve_exact(additional);
        self.capacity = new_cap;
        Ok(())
    }

    /// Ensures capacity is at least `min_cap`, choosing the smallest capacity permitted by
    /// the growth policy that satisfies it. A no-op when already satisfied.
    pub fn grow_to(&mut self, min_cap: usize) -> Result<(), GrowthError> {
        if self.capacity >= min_cap {
            return Ok(());
        }
        let target = match self.growth {
            Growth::Fixed => return Err(GrowthError::Forbidden),
            Growth::Linear(step) => {
                if step == 0 {
                    return Err(GrowthError::Forbidden);
                }
                let mut cap = self.capacity;
                while cap < min_cap {
                    cap = cap.saturating_add(step);
                }
                cap
            }
            Growth::Exponential => {
                let mut cap = self.capacity.max(1);
                while cap < min_cap {
                    cap = cap.saturating_mul(2);
                }
                cap
            }
        };
        self.resize(target)
    }

    /// Switches the growth policy.
    ///
    /// Moving to [`Growth::Linear`] or [`Growth::Exponential`] always succeeds. Moving to
    /// [`Growth::Fixed`] only succeeds when capacity is already settled at the payload length
    /// (`capacity() == len()`): freezing a buffer that still carries growth-reserved slack
    /// would permanently strand that slack behind a policy that can never grow into or shed
    /// it. Fails with [`GrowthError::Forbidden`] otherwise.
    pub fn set_growth(&mut self, new_growth: Growth) -> Result<(), GrowthError> {
        if matches!(new_growth, Growth::Fixed) && self.capacity != self.data.len() {
            return Err(GrowthError::Forbidden);
        }
        self.growth = new_growth;
        Ok(())
    }

    /// Appends `items` to the payload, growing capacity first if necessary.
    pub fn extend_from_slice(&mut self, items: &[T]) -> Result<(), GrowthError> {
        let needed = self.data.len() + items.len();
        if needed > self.capacity {
            self.grow_to(needed)?;
        }
        self.data.extend_from_slice(items);
        Ok(())
    }

    /// Shortens the payload to `new_len`, dropping any trailing units. Capacity is unchanged.
    pub fn truncate(&mut self, new_len: usize) {
        self.data.truncate(new_len);
    }

    /// Empties the payload. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T: Clone> Default for Buffer<T> {
    /// An empty, exponentially-growing buffer — this workspace's default policy for
    /// freshly constructed sequence bodies.
    fn default() -> Self {
        Self::new(Growth::Exponential)
    }
}

#[cfg(test)]
mod tests {
    use super::{Buffer, Growth, GrowthError};

    #[test]
    fn resize_is_noop_when_equal() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(8, Growth::Fixed);
        assert_eq!(buf.resize(8), Ok(()));
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn resize_rejects_data_loss() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(8, Growth::Fixed);
        buf.extend_from_slice(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.resize(2), Err(GrowthError::WouldLoseData));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn fixed_growth_forbids_grow_to() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(2, Growth::Fixed);
        assert_eq!(buf.grow_to(4), Err(GrowthError::Forbidden));
    }

    #[test]
    fn linear_growth_steps() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(0, Growth::Linear(4));
        buf.grow_to(5).unwrap();
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn exponential_growth_doubles() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(1, Growth::Exponential);
        buf.grow_to(5).unwrap();
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn extend_grows_exponentially_by_default() {
        let mut buf: Buffer<u8> = Buffer::default();
        buf.extend_from_slice(b"hello").unwrap();
        assert_eq!(buf.as_slice(), b"hello");
        assert!(buf.capacity() >= 5);
    }

    #[test]
    fn set_growth_to_fixed_preserves_capacity() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(8, Growth::Exponential);
        buf.extend_from_slice(&[0; 8]).unwrap();
        buf.set_growth(Growth::Fixed).unwrap();
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.grow_to(16), Err(GrowthError::Forbidden));
    }

    #[test]
    fn set_growth_to_fixed_rejects_unsettled_capacity() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(8, Growth::Exponential);
        buf.extend_from_slice(&[0; 4]).unwrap();
        assert_eq!(buf.set_growth(Growth::Fixed), Err(GrowthError::Forbidden));
        assert_eq!(buf.growth(), Growth::Exponential);
    }

    #[test]
    fn set_growth_to_linear_or_exponential_always_succeeds_with_slack() {
        let mut buf: Buffer<u8> = Buffer::with_capacity(8, Growth::Exponential);
        buf.extend_from_slice(&[0; 4]).unwrap();
        assert_eq!(buf.set_growth(Growth::Linear(2)), Ok(()));
        assert_eq!(buf.set_growth(Growth::Exponential), Ok(()));
    }
}
