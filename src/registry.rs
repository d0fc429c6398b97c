//! Registry of documented entities.
//!
//! The registry is populated once by graph ingestion, then treated as
//! read-only for the rest of the run: a single writer, then any number of
//! readers. It owns the entity and module arenas and the lookup tables
//! keyed by qualified name, reference id, and analysis handle. There is no
//! ambient/static state; callers receive the registry by reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::graph::{Entity, EntityId, Module, ModuleId, TypeHandle};

/// Errors raised while populating the registry.
///
/// All of these are fatal: downstream paths and links would be ambiguous,
/// so generation aborts before any path is computed.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("duplicate registration of {name:?} with a different identity")]
    DuplicateEntity { name: String },
    #[error("duplicate module registration for {id:?}")]
    DuplicateModule { id: String },
}

/// All documented entities for one generation run.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    modules: Vec<Module>,
    /// Qualified name to registered global (and module-exported) types.
    types: HashMap<String, EntityId>,
    /// Registration order of `types`, for deterministic iteration.
    type_order: Vec<EntityId>,
    /// Qualified extern name to the entity for that type.
    externs: HashMap<String, EntityId>,
    /// Internal module id (the name used when the module was merged into
    /// the global scope) to the module.
    modules_by_id: HashMap<String, ModuleId>,
    /// Reference id (what other code passes to `require`) to the module.
    modules_by_ref: HashMap<String, ModuleId>,
    /// Analysis handle to every entity registered under it, in
    /// registration order. The first entry is the canonical one.
    by_handle: HashMap<TypeHandle, Vec<EntityId>>,
    /// Hoisted module-local binding name to its declaring module and the
    /// simple name it is exported under.
    internal_vars: HashMap<String, (ModuleId, String)>,
    /// Source path to the fileoverview text for that source.
    file_overviews: HashMap<PathBuf, String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_entity(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        if let Some(handle) = entity.handle {
            self.by_handle.entry(handle).or_default().push(id);
        }
        self.entities.push(entity);
        id
    }

    /// Register a property entity. Properties are reachable through their
    /// owner's child lists, not through the global name tables.
    pub fn add_property(&mut self, entity: Entity) -> EntityId {
        self.push_entity(entity)
    }

    /// Register a global or module-exported type.
    ///
    /// Re-registering the same qualified name is allowed only when both
    /// entities carry the same analysis handle (an alias); anything else
    /// is a fatal duplicate.
    pub fn add_type(&mut self, entity: Entity) -> Result<EntityId, RegistryError> {
        if let Some(&existing) = self.types.get(&entity.name) {
            let prior = &self.entities[existing.0 as usize];
            if prior.handle.is_none() || prior.handle != entity.handle {
                return Err(RegistryError::DuplicateEntity { name: entity.name });
            }
            let id = self.push_entity(entity);
            self.type_order.push(id);
            return Ok(id);
        }
        let name = entity.name.clone();
        let id = self.push_entity(entity);
        self.types.insert(name, id);
        self.type_order.push(id);
        Ok(id)
    }

    /// Register an environment-provided (extern) type. Externs shadow
    /// same-named application types during resolution.
    pub fn add_extern(&mut self, entity: Entity) -> Result<EntityId, RegistryError> {
        if self.externs.contains_key(&entity.name) {
            return Err(RegistryError::DuplicateEntity { name: entity.name });
        }
        let name = entity.name.clone();
        let id = self.push_entity(entity);
        self.externs.insert(name, id);
        Ok(id)
    }

    /// The id the next `add_module` call will assign. Ingestion uses this
    /// to wire the exports entity to its module before registering it.
    pub fn next_module_id(&self) -> ModuleId {
        ModuleId(self.modules.len() as u32)
    }

    /// Register a module under both its internal id and its reference id.
    pub fn add_module(&mut self, module: Module) -> Result<ModuleId, RegistryError> {
        if self.modules_by_id.contains_key(&module.id) {
            return Err(RegistryError::DuplicateModule { id: module.id });
        }
        let id = ModuleId(self.modules.len() as u32);
        self.modules_by_id.insert(module.id.clone(), id);
        self.modules_by_ref.insert(module.reference_id.clone(), id);
        for var in &module.internal_vars {
            self.internal_vars
                .insert(var.name.clone(), (id, var.exported_as.clone()));
        }
        self.modules.push(module);
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0 as usize]
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0 as usize]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    /// All registered types, in registration order. Aliases registered
    /// under an already-known qualified name are included; use
    /// [`EntityRegistry::is_canonical`] to tell them apart.
    pub fn types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.type_order.iter().copied()
    }

    /// All registered modules, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(|i| ModuleId(i as u32))
    }

    pub fn type_by_name(&self, name: &str) -> Option<EntityId> {
        self.types.get(name).copied()
    }

    pub fn extern_by_name(&self, name: &str) -> Option<EntityId> {
        self.externs.get(name).copied()
    }

    pub fn module_by_id(&self, id: &str) -> Option<ModuleId> {
        self.modules_by_id.get(id).copied()
    }

    pub fn module_by_reference(&self, reference: &str) -> Option<ModuleId> {
        self.modules_by_ref.get(reference).copied()
    }

    /// Look up the exported property of `module` with the given simple
    /// name.
    pub fn exported_property(&self, module: ModuleId, simple_name: &str) -> Option<EntityId> {
        self.module(module)
            .exported
            .iter()
            .copied()
            .find(|&id| self.entity(id).simple_name() == simple_name)
    }

    /// The module declaring a hoisted binding with this name, and the
    /// simple name the binding is exported under.
    pub fn internal_var(&self, name: &str) -> Option<(ModuleId, &str)> {
        self.internal_vars
            .get(name)
            .map(|(m, exported_as)| (*m, exported_as.as_str()))
    }

    /// Whether `name` or one of its dotted-name ancestors names an extern.
    pub fn is_extern(&self, name: &str) -> bool {
        let mut name = name;
        loop {
            if self.externs.contains_key(name) {
                return true;
            }
            match name.rfind('.') {
                Some(i) => name = &name[..i],
                None => return false,
            }
        }
    }

    /// Whether `name` matches a registered type, module, or a property
    /// reachable from one. `<module-id>.exports` refers to the module's
    /// export object and counts as known.
    pub fn is_known_name(&self, name: &str) -> bool {
        if self.types.contains_key(name)
            || self.modules_by_id.contains_key(name)
            || self.is_extern(name)
        {
            return true;
        }

        if let Some(stripped) = name.strip_suffix(".exports") {
            return self.modules_by_id.contains_key(stripped);
        }

        self.modules.iter().any(|module| {
            module
                .exported
                .iter()
                .any(|&id| self.entity(id).name == name)
        })
    }

    /// Whether the entity or its nearest registered ancestor is known.
    /// Decides whether a reference renders as a link or as plain text.
    pub fn is_documented(&self, id: EntityId) -> bool {
        let mut name = self.entity(id).name.as_str();
        loop {
            if self.is_known_name(name) {
                return true;
            }
            match name.rfind('.') {
                Some(i) => name = &name[..i],
                None => return false,
            }
        }
    }

    /// The canonical (first-registered) entity for an analysis handle.
    pub fn entity_for_handle(&self, handle: TypeHandle) -> Option<EntityId> {
        self.by_handle.get(&handle).and_then(|v| v.first().copied())
    }

    /// Every entity registered under an analysis handle, in registration
    /// order.
    pub fn entities_for_handle(&self, handle: TypeHandle) -> &[EntityId] {
        self.by_handle
            .get(&handle)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` is the first entity registered under its handle.
    pub fn is_canonical(&self, id: EntityId) -> bool {
        match self.entity(id).handle {
            Some(handle) => self.entity_for_handle(handle) == Some(id),
            None => true,
        }
    }

    pub fn add_file_overview<P: AsRef<Path>>(&mut self, path: P, overview: &str) {
        self.file_overviews
            .insert(path.as_ref().to_path_buf(), overview.to_string());
    }

    pub fn file_overview<P: AsRef<Path>>(&self, path: P) -> Option<&str> {
        self.file_overviews.get(path.as_ref()).map(String::as_str)
    }
}
