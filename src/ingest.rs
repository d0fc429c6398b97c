//! Ingestion of the entity-graph dump produced by the analysis front end.
//!
//! The front end finishes its analysis, serializes the entity graph to
//! one JSON document, and hands it over. Ingestion walks that document
//! bottom-up (children before owners), registers everything, and wires
//! owner links. After `populate` returns the registry is complete and
//! read-only.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::{
    Entity, EntityId, EntityKind, InternalVar, Module, ModuleId, ModuleKind, SourcePosition,
    TypeHandle,
};
use crate::registry::{EntityRegistry, RegistryError};

/// The serialized entity graph.
#[derive(Debug, Deserialize)]
pub struct GraphDump {
    /// Environment-provided types (DOM, Node builtins, ...).
    #[serde(default)]
    pub externs: Vec<TypeDump>,
    /// Global application types.
    #[serde(default)]
    pub types: Vec<TypeDump>,
    #[serde(default)]
    pub modules: Vec<ModuleDump>,
    #[serde(default)]
    pub file_overviews: Vec<FileOverviewDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDump {
    /// Qualified name for top-level entries, simple name for nested ones.
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub handle: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: Option<SourceDump>,
    #[serde(default)]
    pub statics: Vec<PropertyDump>,
    #[serde(default)]
    pub members: Vec<PropertyDump>,
    #[serde(default)]
    pub nested: Vec<TypeDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDump {
    /// Simple name, unique among siblings.
    pub name: String,
    #[serde(default)]
    pub handle: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: Option<SourceDump>,
    /// Nested properties, for deep member chains.
    #[serde(default)]
    pub properties: Vec<PropertyDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceDump {
    pub file: PathBuf,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Deserialize)]
pub struct ModuleDump {
    /// Internal id the analysis engine assigned when merging the module
    /// into the global scope (e.g. `foo.bar` for `foo/bar.js`).
    pub id: String,
    /// Backing file, for CommonJS modules.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Dotted name, for namespace modules. Defaults to the internal id.
    #[serde(default)]
    pub name: Option<String>,
    /// The id other code passes to `require`. Defaults to the internal id.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub handle: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exports: Vec<ExportDump>,
    #[serde(default)]
    pub internal_vars: Vec<InternalVarDump>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportDump {
    /// Simple name on the module's export surface.
    pub name: String,
    #[serde(default = "property_kind")]
    pub kind: EntityKind,
    #[serde(default)]
    pub handle: Option<u64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: Option<SourceDump>,
    #[serde(default)]
    pub statics: Vec<PropertyDump>,
    #[serde(default)]
    pub members: Vec<PropertyDump>,
    #[serde(default)]
    pub nested: Vec<TypeDump>,
}

fn property_kind() -> EntityKind {
    EntityKind::Property
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternalVarDump {
    pub name: String,
    pub exported_as: String,
}

#[derive(Debug, Deserialize)]
pub struct FileOverviewDump {
    pub path: PathBuf,
    #[serde(default)]
    pub overview: String,
}

impl GraphDump {
    /// Parse a graph dump from a JSON file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let dump: GraphDump = serde_json::from_str(&content)?;
        Ok(dump)
    }
}

/// Populate a registry from a parsed dump: externs, then global types,
/// then modules, then file overviews.
pub fn populate(registry: &mut EntityRegistry, dump: &GraphDump) -> Result<(), RegistryError> {
    for extern_dump in &dump.externs {
        register_type(registry, extern_dump, &extern_dump.name, None, true)?;
    }
    for type_dump in &dump.types {
        register_type(registry, type_dump, &type_dump.name, None, false)?;
    }
    for module_dump in &dump.modules {
        register_module(registry, module_dump)?;
    }
    for overview in &dump.file_overviews {
        registry.add_file_overview(&overview.path, &overview.overview);
    }
    Ok(())
}

/// Load a graph dump and build a fully populated registry from it.
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<EntityRegistry> {
    let dump = GraphDump::parse_file(path)?;
    let mut registry = EntityRegistry::new();
    populate(&mut registry, &dump)?;
    Ok(registry)
}

fn position(source: &Option<SourceDump>) -> Option<SourcePosition> {
    source.as_ref().map(|s| SourcePosition {
        file: s.file.clone(),
        line: s.line,
    })
}

/// Register one type and its children, bottom-up. `qualified` is the
/// full dotted name the entity registers under.
fn register_type(
    registry: &mut EntityRegistry,
    dump: &TypeDump,
    qualified: &str,
    module: Option<ModuleId>,
    is_extern: bool,
) -> Result<EntityId, RegistryError> {
    let statics = register_properties(registry, &dump.statics, qualified, module, false);
    let members = register_properties(registry, &dump.members, qualified, module, true);

    let mut nested = Vec::new();
    for child in &dump.nested {
        let child_name = format!("{}.{}", qualified, child.name);
        nested.push(register_type(registry, child, &child_name, module, is_extern)?);
    }

    let entity = Entity {
        name: qualified.to_string(),
        kind: dump.kind,
        handle: dump.handle.map(TypeHandle),
        doc: dump.description.clone(),
        position: position(&dump.source),
        module,
        owner: None,
        statics: statics.clone(),
        members: members.clone(),
        nested: nested.clone(),
    };

    let id = if !dump.kind.is_type() {
        registry.add_property(entity)
    } else if is_extern {
        registry.add_extern(entity)?
    } else {
        registry.add_type(entity)?
    };

    for child in statics.into_iter().chain(members).chain(nested) {
        registry.entity_mut(child).owner = Some(id);
    }
    Ok(id)
}

fn register_properties(
    registry: &mut EntityRegistry,
    dumps: &[PropertyDump],
    owner_name: &str,
    module: Option<ModuleId>,
    instance: bool,
) -> Vec<EntityId> {
    dumps
        .iter()
        .map(|dump| {
            let qualified = if instance {
                format!("{}.prototype.{}", owner_name, dump.name)
            } else {
                format!("{}.{}", owner_name, dump.name)
            };
            register_property(registry, dump, &qualified, module)
        })
        .collect()
}

fn register_property(
    registry: &mut EntityRegistry,
    dump: &PropertyDump,
    qualified: &str,
    module: Option<ModuleId>,
) -> EntityId {
    let children: Vec<EntityId> = dump
        .properties
        .iter()
        .map(|child| {
            let child_name = format!("{}.{}", qualified, child.name);
            register_property(registry, child, &child_name, module)
        })
        .collect();

    let id = registry.add_property(Entity {
        name: qualified.to_string(),
        kind: EntityKind::Property,
        handle: dump.handle.map(TypeHandle),
        doc: dump.description.clone(),
        position: position(&dump.source),
        module,
        owner: None,
        statics: children.clone(),
        members: Vec::new(),
        nested: Vec::new(),
    });
    for child in children {
        registry.entity_mut(child).owner = Some(id);
    }
    id
}

fn register_module(
    registry: &mut EntityRegistry,
    dump: &ModuleDump,
) -> Result<ModuleId, RegistryError> {
    let module_id = registry.next_module_id();

    let exports_id = registry.add_property(Entity {
        name: dump.id.clone(),
        kind: EntityKind::ModuleExports,
        handle: dump.handle.map(TypeHandle),
        doc: dump.description.clone(),
        position: dump.path.as_ref().map(|p| SourcePosition {
            file: p.clone(),
            line: 1,
        }),
        module: Some(module_id),
        owner: None,
        statics: Vec::new(),
        members: Vec::new(),
        nested: Vec::new(),
    });

    let mut exported = Vec::new();
    for export in &dump.exports {
        let qualified = format!("{}.{}", dump.id, export.name);
        let id = register_type(
            registry,
            &export.as_type(),
            &qualified,
            Some(module_id),
            false,
        )?;
        registry.entity_mut(id).owner = Some(exports_id);
        exported.push(id);
    }

    let kind = match &dump.path {
        Some(path) => ModuleKind::File { path: path.clone() },
        None => ModuleKind::Namespace {
            name: dump.name.clone().unwrap_or_else(|| dump.id.clone()),
        },
    };

    registry.add_module(Module {
        kind,
        id: dump.id.clone(),
        reference_id: dump.reference.clone().unwrap_or_else(|| dump.id.clone()),
        exports: exports_id,
        exported,
        internal_vars: dump
            .internal_vars
            .iter()
            .map(|v| InternalVar {
                name: v.name.clone(),
                exported_as: v.exported_as.clone(),
            })
            .collect(),
    })?;

    Ok(module_id)
}

impl ExportDump {
    fn as_type(&self) -> TypeDump {
        TypeDump {
            name: self.name.clone(),
            kind: self.kind,
            handle: self.handle,
            description: self.description.clone(),
            source: self.source.clone(),
            statics: self.statics.clone(),
            members: self.members.clone(),
            nested: self.nested.clone(),
        }
    }
}
