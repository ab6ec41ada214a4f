/// Fragmentation of an outbound file into notification-sized views
///
/// Nothing here copies: every fragment is a sub-slice of the caller's
/// buffer, and the offset only advances once the transport has taken the
/// bytes.

/// Next fragment of `buffer[..total_length]` starting at `offset`.
///
/// Returns the view `[offset, min(offset + cap, total_length))` and the
/// offset that follows it. The view is empty only when `offset` has already
/// reached `total_length` or `cap` is zero.
pub fn next_fragment(buffer: &[u8], total_length: usize, offset: usize, cap: usize) -> (&[u8], usize) {
    let total_length = total_length.min(buffer.len());
    let start = offset.min(total_length);
    let end = start.saturating_add(cap).min(total_length);
    (&buffer[start..end], end)
}

/// Number of fragments needed for `total_length` bytes at `cap` bytes each
pub fn fragment_count(total_length: usize, cap: usize) -> usize {
    if cap == 0 {
        return 0;
    }
    (total_length + cap - 1) / cap
}

/// Lazy sequence of fragments over a buffer
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    data: &'a [u8],
    offset: usize,
    cap: usize,
}

/// Split `data` into fragments of at most `cap` bytes
pub fn fragments(data: &[u8], cap: usize) -> Fragments<'_> {
    Fragments {
        data,
        offset: 0,
        cap,
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.cap == 0 || self.offset >= self.data.len() {
            return None;
        }
        let (fragment, next) = next_fragment(self.data, self.data.len(), self.offset, self.cap);
        self.offset = next;
        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = fragment_count(self.data.len() - self.offset.min(self.data.len()), self.cap);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fragments<'_> {}

/// Consumption cursor over one outbound buffer
#[derive(Debug, Clone)]
pub struct Fragmenter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Fragmenter<'a> {
    /// Track consumption of `data`; its length is the transfer's total length
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Pick up a cursor over `data` that has already delivered `offset` bytes
    pub fn resume(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset: offset.min(data.len()),
        }
    }

    /// Fragment that would be sent next, without consuming it
    pub fn peek(&self, cap: usize) -> &'a [u8] {
        next_fragment(self.data, self.data.len(), self.offset, cap).0
    }

    /// Mark `len` more bytes as delivered
    pub fn advance(&mut self, len: usize) {
        self.offset = self.offset.saturating_add(len).min(self.data.len());
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_length(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.data.len()
    }
}
