//! A bounded vector backed by a single up-front allocation.

/// Fixed-capacity storage with a fill cursor.
///
/// The backing slice is allocated once and never reallocated; [`clear`]
/// only rewinds the cursor. Pushing past capacity is refused and hands the
/// value back instead of growing.
///
/// [`clear`]: Self::clear
#[derive(Debug, Clone)]
pub struct FixedVec<T> {
    items: Box<[T]>,
    len: usize,
}

impl<T: Copy + Default> FixedVec<T> {
    /// Allocate storage for `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: vec![T::default(); capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Append `value`, or return it if the vector is full.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` when there is no room left.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        match self.items.get_mut(self.len) {
            Some(slot) => {
                *slot = value;
                self.len += 1;
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Append `count` default values. Returns how many actually fit.
    pub fn push_default(&mut self, count: usize) -> usize {
        let fitted = count.min(self.remaining());
        self.items[self.len..self.len + fitted].fill(T::default());
        self.len += fitted;
        fitted
    }
}

impl<T> FixedVec<T> {
    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Slots still available.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.len
    }

    /// Whether every slot is filled.
    pub fn is_full(&self) -> bool {
        self.len == self.items.len()
    }

    /// The most recently pushed item.
    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// Mutable access to the most recently pushed item.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items[..self.len].last_mut()
    }

    /// The filled prefix.
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    /// Rewind the cursor. Storage is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Drop everything past the first `len` items.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Remove and return the most recently pushed item.
    pub fn pop(&mut self) -> Option<T>
    where
        T: Copy,
    {
        let value = *self.last()?;
        self.len -= 1;
        Some(value)
    }
}
