//! Navigation/search index construction.
//!
//! The index is the last artifact of a run: one JSON document with an
//! ordered `modules` list and an ordered `types` list, consumed by the
//! client-side search box. Entries accumulate through restricted builder
//! handles so nested records can only be attached where they belong;
//! structural misuse is a fatal invariant violation, not a warning.

use serde::Serialize;
use thiserror::Error;

use crate::graph::{EntityId, ModuleId};
use crate::layout::LayoutPlanner;
use crate::link::{LinkError, LinkFactory};
use crate::registry::EntityRegistry;

/// Errors raised while building the index. Fatal.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("nested types are only recorded for module entries: {name}")]
    NestedOutsideModule { name: String },
    #[error("type {type_name:?} does not belong to module {module_id:?}")]
    ModuleMismatch { module_id: String, type_name: String },
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// One `{name, href}` index entry. Type entries carry the namespace and
/// interface flags; module entries collect nested type entries and flat
/// member-name lists.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub name: String,
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<IndexEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statics: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

impl IndexEntry {
    fn new(name: String, href: String) -> Self {
        Self {
            name,
            href,
            namespace: None,
            interface: None,
            types: Vec::new(),
            statics: Vec::new(),
            members: Vec::new(),
        }
    }
}

/// The finished index document.
#[derive(Debug, Default, Serialize)]
pub struct NavigationIndex {
    pub modules: Vec<IndexEntry>,
    pub types: Vec<IndexEntry>,
}

impl NavigationIndex {
    /// Serialize as one JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Module(usize),
    Type(usize),
    Nested { module_slot: usize, slot: usize },
}

/// Handle to an entry accepting nested records. Returned by the
/// registration calls; the only way to extend an entry after the fact.
#[derive(Debug, Clone, Copy)]
pub struct IndexRef {
    place: Place,
    module: Option<ModuleId>,
}

/// Incrementally builds the navigation index over a finished layout.
pub struct TypeIndex<'a, 'r> {
    registry: &'r EntityRegistry,
    layout: &'a LayoutPlanner<'r>,
    links: LinkFactory<'a, 'r>,
    index: NavigationIndex,
}

impl<'a, 'r> TypeIndex<'a, 'r> {
    pub fn new(layout: &'a LayoutPlanner<'r>) -> Self {
        Self {
            registry: layout.registry(),
            layout,
            links: LinkFactory::new(layout),
            index: NavigationIndex::default(),
        }
    }

    /// Record a module. The returned handle accepts the module's nested
    /// types and member names.
    pub fn add_module(&mut self, id: ModuleId) -> IndexRef {
        let href = root_href(self.layout.path_for_module(id));
        let entry = IndexEntry::new(self.layout.module_display_name(id).to_string(), href);
        self.index.modules.push(entry);
        IndexRef {
            place: Place::Module(self.index.modules.len() - 1),
            module: Some(id),
        }
    }

    /// Record a top-level type.
    pub fn add_type(&mut self, id: EntityId) -> Result<IndexRef, IndexError> {
        let (entry, siblings) = self.type_entry(id)?;
        self.index.types.push(entry);
        let slot = self.index.types.len() - 1;
        self.index.types.extend(siblings);
        Ok(IndexRef {
            place: Place::Type(slot),
            module: None,
        })
    }

    /// Record a type under a module entry. Only legal for module handles
    /// and for types belonging to that module.
    pub fn add_nested_type(&mut self, at: &IndexRef, id: EntityId) -> Result<IndexRef, IndexError> {
        let module_slot = match at.place {
            Place::Module(slot) => slot,
            _ => {
                return Err(IndexError::NestedOutsideModule {
                    name: self.registry.entity(id).name.clone(),
                })
            }
        };
        let module = at.module.expect("module handle without module id");
        if self.registry.entity(id).module != Some(module) {
            return Err(IndexError::ModuleMismatch {
                module_id: self.registry.module(module).id.clone(),
                type_name: self.registry.entity(id).name.clone(),
            });
        }

        let (entry, siblings) = self.type_entry(id)?;
        let types = &mut self.index.modules[module_slot].types;
        types.push(entry);
        let slot = types.len() - 1;
        types.extend(siblings);
        Ok(IndexRef {
            place: Place::Nested { module_slot, slot },
            module: None,
        })
    }

    pub fn add_static_property(&mut self, at: &IndexRef, name: &str) {
        self.entry_mut(at).statics.push(name.to_string());
    }

    pub fn add_instance_property(&mut self, at: &IndexRef, name: &str) {
        self.entry_mut(at).members.push(name.to_string());
    }

    pub fn into_index(self) -> NavigationIndex {
        self.index
    }

    fn entry_mut(&mut self, at: &IndexRef) -> &mut IndexEntry {
        match at.place {
            Place::Module(slot) => &mut self.index.modules[slot],
            Place::Type(slot) => &mut self.index.types[slot],
            Place::Nested { module_slot, slot } => {
                &mut self.index.modules[module_slot].types[slot]
            }
        }
    }

    /// Entry for a type, plus sibling entries for its typedef aliases
    /// when the type is not the canonical representative of its handle.
    fn type_entry(&self, id: EntityId) -> Result<(IndexEntry, Vec<IndexEntry>), IndexError> {
        let link = self.links.link_from_root(id)?;
        let entity = self.registry.entity(id);
        let mut entry = IndexEntry::new(link.text, link.href);
        entry.namespace = Some(entity.is_namespace());
        entry.interface = Some(entity.is_interface());

        let mut siblings = Vec::new();
        if !self.registry.is_canonical(id) {
            let mut typedefs: Vec<EntityId> = entity
                .nested
                .iter()
                .copied()
                .filter(|&n| self.registry.entity(n).is_typedef())
                .collect();
            typedefs.sort_by(|a, b| {
                self.registry
                    .entity(*a)
                    .name
                    .cmp(&self.registry.entity(*b).name)
            });
            for typedef in typedefs {
                let link = self.links.link_from_root(typedef)?;
                siblings.push(IndexEntry::new(link.text, link.href));
            }
        }
        Ok((entry, siblings))
    }
}

fn root_href(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk the whole registry and build the finished index: modules with
/// their exported types and member names, then global types. Member
/// names keep declaration order; the top-level lists are sorted for a
/// stable artifact.
pub fn build_navigation(
    registry: &EntityRegistry,
    layout: &LayoutPlanner<'_>,
) -> Result<NavigationIndex, IndexError> {
    let mut index = TypeIndex::new(layout);

    let mut module_ids: Vec<ModuleId> = registry.modules().collect();
    module_ids.sort_by(|a, b| {
        layout
            .module_display_name(*a)
            .cmp(layout.module_display_name(*b))
    });
    for module_id in module_ids {
        let handle = index.add_module(module_id);
        for &exported in &registry.module(module_id).exported {
            let entity = registry.entity(exported);
            if entity.kind.is_type() {
                let nested = index.add_nested_type(&handle, exported)?;
                record_members(registry, &mut index, &nested, exported);
            } else if !entity.is_typedef() {
                index.add_static_property(&handle, entity.simple_name());
            }
        }
    }

    let mut type_ids: Vec<EntityId> = registry
        .types()
        .filter(|&id| registry.entity(id).module.is_none())
        .collect();
    type_ids.sort_by(|a, b| registry.entity(*a).name.cmp(&registry.entity(*b).name));
    for id in type_ids {
        let handle = index.add_type(id)?;
        record_members(registry, &mut index, &handle, id);
    }

    Ok(index.into_index())
}

fn record_members(
    registry: &EntityRegistry,
    index: &mut TypeIndex<'_, '_>,
    at: &IndexRef,
    of: EntityId,
) {
    for &child in &registry.entity(of).statics {
        index.add_static_property(at, registry.entity(child).simple_name());
    }
    for &child in &registry.entity(of).members {
        index.add_instance_property(at, registry.entity(child).simple_name());
    }
}
