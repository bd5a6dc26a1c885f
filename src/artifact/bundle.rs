use super::{BundleError, CompiledUnit, GeneratedUnit, InnerUnitClassifier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Index of a [`CompiledUnit`] inside a [`CompiledBundleSet`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A source unit together with the ids of everything compiled from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBundle {
    source: GeneratedUnit,
    primary: UnitId,
    inner: Vec<UnitId>,
}

impl CompiledBundle {
    pub fn source(&self) -> &GeneratedUnit {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn primary(&self) -> UnitId {
        self.primary
    }

    pub fn inner_units(&self) -> &[UnitId] {
        &self.inner
    }

    /// Primary id followed by inner ids in insertion order
    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        std::iter::once(self.primary).chain(self.inner.iter().copied())
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.primary == id || self.inner.contains(&id)
    }
}

/// Arena of compiled units grouped into bundles, keyed by source unit name.
///
/// Every unit belongs to exactly one bundle and unit names are unique across
/// the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBundleSet {
    units: Vec<CompiledUnit>,
    bundles: BTreeMap<String, CompiledBundle>,
}

impl CompiledBundleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a bundle for `source` with its primary artifact
    pub fn insert_bundle(
        &mut self,
        source: GeneratedUnit,
        payload: Vec<u8>,
    ) -> Result<UnitId, BundleError> {
        if self.bundles.contains_key(&source.name) {
            return Err(BundleError::DuplicateBundle(source.name));
        }
        let id = self.push_unit(CompiledUnit::new(source.name.clone(), payload, false))?;
        self.bundles.insert(
            source.name.clone(),
            CompiledBundle {
                source,
                primary: id,
                inner: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Attach an inner artifact to an existing bundle
    pub fn add_inner(
        &mut self,
        bundle: &str,
        name: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<UnitId, BundleError> {
        if !self.bundles.contains_key(bundle) {
            return Err(BundleError::UnknownBundle(bundle.to_string()));
        }
        let id = self.push_unit(CompiledUnit::new(name, payload, true))?;
        if let Some(entry) = self.bundles.get_mut(bundle) {
            entry.inner.push(id);
        }
        Ok(id)
    }

    fn push_unit(&mut self, unit: CompiledUnit) -> Result<UnitId, BundleError> {
        if self.units.iter().any(|existing| existing.name == unit.name) {
            return Err(BundleError::DuplicateUnit(unit.name));
        }
        let id = UnitId(self.units.len() as u32);
        self.units.push(unit);
        Ok(id)
    }

    /// Rebuild a set from a flat arena and bundle table, checking ownership
    pub fn from_parts(
        units: Vec<CompiledUnit>,
        bundles: Vec<(GeneratedUnit, UnitId, Vec<UnitId>)>,
    ) -> Result<Self, BundleError> {
        let mut owner: Vec<Option<String>> = vec![None; units.len()];
        let mut names = HashSet::new();
        for unit in &units {
            if !names.insert(unit.name.as_str()) {
                return Err(BundleError::DuplicateUnit(unit.name.clone()));
            }
        }

        let mut table = BTreeMap::new();
        for (source, primary, inner) in bundles {
            if table.contains_key(&source.name) {
                return Err(BundleError::DuplicateBundle(source.name));
            }
            for id in std::iter::once(primary).chain(inner.iter().copied()) {
                let slot = owner
                    .get_mut(id.index())
                    .ok_or(BundleError::UnknownUnit(id.0))?;
                if slot.is_some() {
                    return Err(BundleError::SharedUnit(units[id.index()].name.clone()));
                }
                *slot = Some(source.name.clone());
            }

            let head = &units[primary.index()];
            if head.inner || head.name != source.name {
                return Err(BundleError::Misclassified {
                    unit: head.name.clone(),
                    reason: format!("not the primary unit of {}", source.name),
                });
            }
            if let Some(id) = inner.iter().find(|id| !units[id.index()].inner) {
                return Err(BundleError::Misclassified {
                    unit: units[id.index()].name.clone(),
                    reason: "listed as inner but flagged primary".to_string(),
                });
            }

            table.insert(
                source.name.clone(),
                CompiledBundle {
                    source,
                    primary,
                    inner,
                },
            );
        }

        if let Some(index) = owner.iter().position(Option::is_none) {
            return Err(BundleError::OrphanUnit(units[index].name.clone()));
        }

        Ok(Self {
            units,
            bundles: table,
        })
    }

    pub fn unit(&self, id: UnitId) -> Option<&CompiledUnit> {
        self.units.get(id.index())
    }

    /// All units in arena order
    pub fn units(&self) -> &[CompiledUnit] {
        &self.units
    }

    pub fn unit_by_name(&self, name: &str) -> Option<(UnitId, &CompiledUnit)> {
        self.units
            .iter()
            .enumerate()
            .find(|(_, unit)| unit.name == name)
            .map(|(index, unit)| (UnitId(index as u32), unit))
    }

    pub fn bundle(&self, name: &str) -> Option<&CompiledBundle> {
        self.bundles.get(name)
    }

    /// Bundles ordered by source unit name
    pub fn bundles(&self) -> impl Iterator<Item = &CompiledBundle> {
        self.bundles.values()
    }

    /// Bundle owning the given unit
    pub fn bundle_of(&self, id: UnitId) -> Option<&CompiledBundle> {
        self.bundles.values().find(|bundle| bundle.contains(id))
    }

    /// Number of bundles (one per submitted source unit)
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Total payload size across the arena
    pub fn total_size(&self) -> usize {
        self.units.iter().map(CompiledUnit::size).sum()
    }

    /// Check every bundle against `classifier`: the primary carries the bundle
    /// name and each inner unit is claimed by its bundle and by no bundle with
    /// a longer name
    pub fn verify_classification(&self, classifier: &dyn InnerUnitClassifier) -> Result<(), BundleError> {
        for bundle in self.bundles.values() {
            for id in bundle.unit_ids() {
                let unit = self.unit(id).ok_or(BundleError::UnknownUnit(id.0))?;
                let misclassified = |reason: String| BundleError::Misclassified {
                    unit: unit.name.clone(),
                    reason,
                };
                if id == bundle.primary {
                    if unit.inner || unit.name != bundle.name() {
                        return Err(misclassified(format!("not the primary unit of {}", bundle.name())));
                    }
                    continue;
                }
                if !unit.inner || !classifier.is_inner(bundle.name(), &unit.name) {
                    return Err(misclassified(format!("not an inner unit of {}", bundle.name())));
                }
                let longer = self.bundles.values().find(|other| {
                    other.name().len() > bundle.name().len() && classifier.is_inner(other.name(), &unit.name)
                });
                if let Some(other) = longer {
                    return Err(misclassified(format!("belongs to {}", other.name())));
                }
            }
        }
        Ok(())
    }
}
