//! Entity graph model produced by the analysis front end.
//!
//! The front end parses JavaScript, resolves module structure, and hands
//! docweave a finalized graph of typed entities: global types, CommonJS and
//! namespace modules, and their properties. This module defines the shapes
//! those entities take once registered. Entities are immutable after
//! registration; everything derived from them (paths, links) is computed
//! later and cached per run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Index of an entity in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

/// Index of a module in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) u32);

/// Opaque type handle assigned by the analysis engine.
///
/// Two entities carrying the same handle are aliases for one underlying
/// type; the first one registered is the canonical representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeHandle(pub u64);

/// Kind of documented entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Class,
    Interface,
    Enum,
    /// A value acting purely as a container of other entities.
    Namespace,
    /// A named type alias with no independent storage.
    Typedef,
    /// A member of a type or of a module's export surface.
    Property,
    /// The object representing a module's public surface.
    ModuleExports,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::Enum => "enum",
            EntityKind::Namespace => "namespace",
            EntityKind::Typedef => "typedef",
            EntityKind::Property => "property",
            EntityKind::ModuleExports => "moduleexports",
        }
    }

    /// Whether this kind gets its own documentation page.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            EntityKind::Class | EntityKind::Interface | EntityKind::Enum | EntityKind::Namespace
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source position of a declaration (1-indexed line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub file: PathBuf,
    pub line: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A documented entity.
///
/// Children are held as ordered id lists; the ids point back into the
/// registry arena that owns all entities for the run.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Fully qualified dotted name (`a.b.C`). For entities exported by a
    /// module this is `<module-id>.<simpleName>`.
    pub name: String,
    pub kind: EntityKind,
    /// Analysis-engine handle, when the front end supplied one.
    pub handle: Option<TypeHandle>,
    /// Documentation comment payload. Opaque to the engine beyond the
    /// reference strings embedded in it.
    pub doc: String,
    pub position: Option<SourcePosition>,
    /// The module this entity belongs to, if any.
    pub module: Option<ModuleId>,
    /// Owning entity; `None` for top-level types and module exports.
    pub owner: Option<EntityId>,
    /// Static properties, in declaration order.
    pub statics: Vec<EntityId>,
    /// Instance (prototype) properties, in declaration order.
    pub members: Vec<EntityId>,
    /// Nested types, in declaration order.
    pub nested: Vec<EntityId>,
}

impl Entity {
    /// The segment after the last `.` of the qualified name.
    pub fn simple_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(i) => &self.name[i + 1..],
            None => &self.name,
        }
    }

    pub fn is_module_exports(&self) -> bool {
        self.kind == EntityKind::ModuleExports
    }

    pub fn is_namespace(&self) -> bool {
        self.kind == EntityKind::Namespace
    }

    pub fn is_interface(&self) -> bool {
        self.kind == EntityKind::Interface
    }

    pub fn is_typedef(&self) -> bool {
        self.kind == EntityKind::Typedef
    }
}

/// How a module is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// CommonJS-style module backed by a file on disk.
    File { path: PathBuf },
    /// Module identified by a dotted name, not tied 1:1 to a file.
    Namespace { name: String },
}

/// A module-local binding the analysis engine hoisted into its synthetic
/// global scope. References to the hoisted name must resolve to the
/// exported identity, not the raw global binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalVar {
    /// Name of the binding in the synthetic global scope.
    pub name: String,
    /// Simple name the declaring module exports it under.
    pub exported_as: String,
}

/// A documented module.
#[derive(Debug, Clone)]
pub struct Module {
    pub kind: ModuleKind,
    /// Internal identifier: the name the analysis engine gave the module
    /// when merging it into the global scope (e.g. `foo.bar.baz` for
    /// `foo/bar/baz.js`). Storage and collision resolution key off this.
    pub id: String,
    /// Identifier other code uses to `require`/reference the module.
    pub reference_id: String,
    /// The entity representing the module's public surface.
    pub exports: EntityId,
    /// Exported properties and types, in declaration order. Simple names
    /// are unique within this list.
    pub exported: Vec<EntityId>,
    /// Hoisted module-local bindings.
    pub internal_vars: Vec<InternalVar>,
}

impl Module {
    pub fn is_file_module(&self) -> bool {
        matches!(self.kind, ModuleKind::File { .. })
    }

    /// The backing file path, for file modules.
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            ModuleKind::File { path } => Some(path),
            ModuleKind::Namespace { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, kind: EntityKind) -> Entity {
        Entity {
            name: name.to_string(),
            kind,
            handle: None,
            doc: String::new(),
            position: None,
            module: None,
            owner: None,
            statics: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
        }
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(entity("foo.bar.Baz", EntityKind::Class).simple_name(), "Baz");
        assert_eq!(entity("Baz", EntityKind::Class).simple_name(), "Baz");
    }

    #[test]
    fn test_kind_predicates() {
        assert!(EntityKind::Namespace.is_type());
        assert!(EntityKind::Interface.is_type());
        assert!(!EntityKind::Typedef.is_type());
        assert!(!EntityKind::Property.is_type());
        assert!(entity("m", EntityKind::ModuleExports).is_module_exports());
    }

    #[test]
    fn test_module_path() {
        let m = Module {
            kind: ModuleKind::File {
                path: PathBuf::from("/in/foo/bar.js"),
            },
            id: "foo.bar".to_string(),
            reference_id: "foo/bar".to_string(),
            exports: EntityId(0),
            exported: Vec::new(),
            internal_vars: Vec::new(),
        };
        assert!(m.is_file_module());
        assert_eq!(m.path(), Some(Path::new("/in/foo/bar.js")));
    }
}
