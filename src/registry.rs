//! Handle registry: maps opaque names to backend-produced objects.
//!
//! Owned exclusively by the worker; callers only ever see [`HandleName`]s.
//! Storage is a generation-counted slot arena behind a name table, so a
//! reference that outlives its object is detected as stale instead of
//! silently resolving to whatever reused the slot.

use std::collections::HashMap;
use std::fmt;

use crate::backend::BackendObject;
use crate::error::RegistryError;
use crate::protocol::HandleName;

/// Generation-checked reference into the registry's slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleRef {
    index: u32,
    generation: u32,
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct Entry {
    name: HandleName,
    object: Box<dyn BackendObject>,
}

/// Worker-side table of stored backend objects.
///
/// Created once with the worker and never torn down; individual objects can
/// be removed. Generated names follow a deterministic `o0`, `o1`, …
/// sequence whose counter never reuses a number.
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, HandleRef>,
    next_auto: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            names: HashMap::new(),
            next_auto: 0,
        }
    }

    /// Stores an object under an explicit or generated name and returns the
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if an explicit name is
    /// already in use. Generated names cannot collide.
    pub fn insert(
        &mut self,
        name: Option<String>,
        object: Box<dyn BackendObject>,
    ) -> Result<HandleName, RegistryError> {
        let name = match name {
            Some(name) => {
                if self.names.contains_key(&name) {
                    return Err(RegistryError::DuplicateName(name));
                }
                name
            }
            None => self.generate_name(),
        };

        let handle = HandleName::new(name.clone());
        let entry = Entry {
            name: handle.clone(),
            object,
        };

        let reference = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                HandleRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .expect("registry exceeds u32::MAX live objects");
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                HandleRef {
                    index,
                    generation: 0,
                }
            }
        };

        self.names.insert(name, reference);
        Ok(handle)
    }

    /// Resolves a name to a generation-checked reference.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownHandle`] if the name is not present.
    pub fn resolve(&self, name: &HandleName) -> Result<HandleRef, RegistryError> {
        self.names
            .get(name.as_str())
            .copied()
            .ok_or_else(|| RegistryError::UnknownHandle(name.to_string()))
    }

    /// Looks up an object by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownHandle`] if the name is not present.
    pub fn get_mut(&mut self, name: &HandleName) -> Result<&mut dyn BackendObject, RegistryError> {
        let reference = self.resolve(name)?;
        self.get_by_ref(reference)
    }

    /// Looks up an object by reference, checking the generation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StaleHandle`] if the slot has been freed or
    /// reused since the reference was taken.
    pub fn get_by_ref(
        &mut self,
        reference: HandleRef,
    ) -> Result<&mut dyn BackendObject, RegistryError> {
        let slot = self
            .slots
            .get_mut(reference.index as usize)
            .ok_or_else(|| RegistryError::StaleHandle(reference.to_string()))?;
        if slot.generation != reference.generation {
            return Err(RegistryError::StaleHandle(reference.to_string()));
        }
        match &mut slot.entry {
            Some(entry) => Ok(entry.object.as_mut()),
            None => Err(RegistryError::StaleHandle(reference.to_string())),
        }
    }

    /// Removes an object, freeing its slot for reuse under a new generation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownHandle`] if the name is not present.
    pub fn remove(&mut self, name: &HandleName) -> Result<Box<dyn BackendObject>, RegistryError> {
        let reference = self.resolve(name)?;
        let slot = &mut self.slots[reference.index as usize];
        let entry = slot
            .entry
            .take()
            .ok_or_else(|| RegistryError::StaleHandle(reference.to_string()))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(reference.index);
        self.names.remove(entry.name.as_str());
        Ok(entry.object)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn generate_name(&mut self) -> String {
        // The counter only moves forward, even past removals, so generated
        // names are distinct and monotonically increasing.
        loop {
            let name = format!("o{}", self.next_auto);
            self.next_auto += 1;
            if !self.names.contains_key(&name) {
                return name;
            }
        }
    }
}
