//! Validation of names read from untrusted archives.

mod path;

#[cfg(test)]
mod path_tests;

pub use path::{EntryNameError, EntrySanitizer};
