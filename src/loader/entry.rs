/// Location of one unit payload inside a context's arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitEntry {
    /// Byte offset into the arena
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Primary unit name of the owning bundle
    pub bundle: String,
    pub inner: bool,
}

impl UnitEntry {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.length
    }
}
