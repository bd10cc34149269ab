//! Byte+offset output column for vectorized string reads.
//!
//! The engine's real column containers are external collaborators; this is
//! the minimal interface type the cache appends into. Element `i` occupies
//! `bytes[offset(i - 1)..offset(i)]`, with `offset(-1) == 0`.

/// Append-only string column: one flat byte buffer plus end offsets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringColumn {
    bytes: Vec<u8>,
    offsets: Vec<usize>,
}

impl StringColumn {
    /// Creates an empty column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if the column holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Appends one element.
    #[inline]
    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
        self.offsets.push(self.bytes.len());
    }

    /// Returns element `index` as raw bytes.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let end = *self.offsets.get(index)?;
        let start = if index == 0 {
            0
        } else {
            self.offsets[index - 1]
        };
        Some(&self.bytes[start..end])
    }

    /// Reserves room for `additional_bytes` payload bytes and
    /// `additional_elements` offsets.
    pub fn reserve(&mut self, additional_bytes: usize, additional_elements: usize) {
        self.bytes.reserve(additional_bytes);
        self.offsets.reserve(additional_elements);
    }

    /// Truncates back to `len` elements without releasing reserved capacity.
    ///
    /// Used to discard a partially filled optimistic pass before the
    /// pessimistic rescan refills the column.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.offsets.len() {
            return;
        }
        let byte_len = if len == 0 { 0 } else { self.offsets[len - 1] };
        self.offsets.truncate(len);
        self.bytes.truncate(byte_len);
    }

    /// Flat payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// End offset of each element.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Iterates elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        (0..self.len()).map(move |i| self.get(i).unwrap())
    }
}
