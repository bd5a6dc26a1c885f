//! Value types describing compiled recognizer output.
//!
//! A [`CompiledBundleSet`] is an arena of [`CompiledUnit`]s indexed by [`UnitId`].
//! Bundles reference units by id, which keeps the persisted form flat.

mod bundle;
mod classify;
mod error;
mod unit;

#[cfg(test)]
mod tests;

pub use bundle::{CompiledBundle, CompiledBundleSet, UnitId};
pub use classify::{InnerUnitClassifier, PrefixClassifier};
pub use error::BundleError;
pub use unit::{CompiledUnit, GeneratedUnit, UnitOrigin};
