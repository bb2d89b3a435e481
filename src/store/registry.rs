use super::error::RegistryError;
use super::types::*;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// The shared parameter store for one pipeline run.
///
/// Entries are kept in write order. Base inputs are written once through
/// [`Registry::seed`] and never change; module outputs go through
/// [`Registry::set`] or, for a whole module at once, [`Registry::commit`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    params: IndexMap<ParamPath, Parameter>,
    next_seq: u64,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.params.len() }
    pub fn is_empty(&self) -> bool { self.params.is_empty() }

    /// Writes a base input. Base inputs have no producer.
    pub fn seed(&mut self, path: ParamPath, entry: ParamEntry) -> Result<(), RegistryError> {
        self.set(path, entry, None)
    }

    /// Writes `path` on behalf of `produced_by`.
    ///
    /// Re-writing an identical entry from the same module is a no-op. Any
    /// other write to an existing path fails: a different writer yields
    /// `DuplicateWrite`, the same module with a different entry yields
    /// `ConflictingRewrite`.
    pub fn set(&mut self, path: ParamPath, entry: ParamEntry, produced_by: Option<&str>) -> Result<(), RegistryError> {
        if self.check_write(&path, &entry, produced_by)? {
            self.insert(path, entry, produced_by);
        }
        Ok(())
    }

    /// Commits a module's complete output set, or nothing at all.
    pub fn commit(&mut self, module: &str, outputs: Vec<(ParamPath, ParamEntry)>) -> Result<usize, RegistryError> {
        let mut fresh = Vec::with_capacity(outputs.len());
        for (path, entry) in outputs {
            if self.check_write(&path, &entry, Some(module))? {
                fresh.push((path, entry));
            }
        }
        let written = fresh.len();
        for (path, entry) in fresh {
            self.insert(path, entry, Some(module));
        }
        Ok(written)
    }

    /// Replaces an existing parameter, including its category.
    ///
    /// This is the only way to change provenance after the fact. Returns the
    /// previous parameter.
    pub fn overwrite(&mut self, path: &ParamPath, entry: ParamEntry, produced_by: Option<&str>) -> Result<Parameter, RegistryError> {
        if !self.params.contains_key(path) {
            return Err(RegistryError::UnknownParameter { path: path.clone() });
        }
        require_unit(path, &entry)?;
        let seq = self.bump();
        let slot = self
            .params
            .get_mut(path)
            .ok_or_else(|| RegistryError::UnknownParameter { path: path.clone() })?;
        tracing::warn!(
            path = %path,
            from = %slot.category,
            to = %entry.category,
            "explicit overwrite of registry parameter"
        );
        let previous = slot.clone();
        *slot = Parameter {
            path: path.clone(),
            value: entry.value,
            unit: entry.unit,
            category: entry.category,
            source: entry.source,
            produced_by: produced_by.map(str::to_string),
            written_at: seq,
        };
        Ok(previous)
    }

    pub fn get(&self, path: &ParamPath) -> Result<&Parameter, RegistryError> {
        self.params.get(path).ok_or_else(|| RegistryError::UnknownParameter { path: path.clone() })
    }

    pub fn contains(&self, path: &ParamPath) -> bool { self.params.contains_key(path) }

    pub fn provenance(&self, path: &ParamPath) -> Result<Provenance, RegistryError> {
        self.get(path).map(Parameter::provenance)
    }

    /// Iterates parameters in write order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    /// An immutable copy of the current state, keyed by path.
    pub fn all(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            params: self.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Groups every path by provenance category.
    pub fn audit(&self) -> BTreeMap<Category, Vec<ParamPath>> {
        let mut groups: BTreeMap<Category, Vec<ParamPath>> = BTreeMap::new();
        for param in self.params.values() {
            groups.entry(param.category).or_default().push(param.path.clone());
        }
        for paths in groups.values_mut() {
            paths.sort();
        }
        groups
    }

    /// Returns `Ok(true)` if the write must be applied, `Ok(false)` for an idempotent repeat.
    fn check_write(&self, path: &ParamPath, entry: &ParamEntry, produced_by: Option<&str>) -> Result<bool, RegistryError> {
        require_unit(path, entry)?;
        let Some(existing) = self.params.get(path) else {
            return Ok(true);
        };
        match (existing.produced_by.as_deref(), produced_by) {
            (Some(prev), Some(next)) if prev == next => {
                let same = existing.value == entry.value
                    && existing.unit == entry.unit
                    && existing.category == entry.category
                    && existing.source == entry.source;
                if same {
                    Ok(false)
                } else {
                    Err(RegistryError::ConflictingRewrite { path: path.clone(), module: next.to_string() })
                }
            }
            _ => Err(RegistryError::DuplicateWrite {
                path: path.clone(),
                existing: existing.produced_by.clone(),
                attempted: produced_by.map(str::to_string),
            }),
        }
    }

    fn insert(&mut self, path: ParamPath, entry: ParamEntry, produced_by: Option<&str>) {
        let seq = self.bump();
        self.params.insert(
            path.clone(),
            Parameter {
                path,
                value: entry.value,
                unit: entry.unit,
                category: entry.category,
                source: entry.source,
                produced_by: produced_by.map(str::to_string),
                written_at: seq,
            },
        );
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Read-only view of the registry at the moment it was taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    params: BTreeMap<ParamPath, Parameter>,
}

impl RegistrySnapshot {
    pub fn get(&self, path: &ParamPath) -> Option<&Parameter> { self.params.get(path) }
    pub fn contains(&self, path: &ParamPath) -> bool { self.params.contains_key(path) }
    pub fn len(&self) -> usize { self.params.len() }
    pub fn is_empty(&self) -> bool { self.params.is_empty() }

    /// Iterates parameters in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }
}

fn require_unit(path: &ParamPath, entry: &ParamEntry) -> Result<(), RegistryError> {
    if entry.unit.is_missing() {
        return Err(RegistryError::MissingUnit { path: path.clone() });
    }
    Ok(())
}
