//! Output layout planning: canonical paths and display names.
//!
//! Every entity, module, and rendered source file gets exactly one
//! output path, computed once per run against the full registry. Global
//! types render at the output root as `<dotted-name>.html`; modules and
//! the types they export render under `module/`; sources render under
//! `source/`. Path computation is a pure function of the registry and
//! configuration, so the full table is warmed in parallel and merged
//! deterministically, and any residual collision between two distinct
//! entities aborts the run.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{Config, SlugScheme};
use crate::graph::{EntityId, EntityKind, ModuleId, ModuleKind};
use crate::registry::EntityRegistry;

/// Errors raised while planning the output layout. Fatal: colliding
/// paths would silently overwrite one another's output.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("output path collision on {path:?} between {first:?} and {second:?}")]
    PathCollision {
        path: PathBuf,
        first: String,
        second: String,
    },
}

/// Computes output paths and display names for every registered entity.
///
/// Paths are relative to the output root; joining them onto the root is
/// the writer's job.
#[derive(Debug)]
pub struct LayoutPlanner<'r> {
    registry: &'r EntityRegistry,
    src_prefix: PathBuf,
    /// Per-entity page paths. Entities without a page of their own
    /// (properties, typedefs) resolve through their owner chain.
    entity_paths: HashMap<EntityId, PathBuf>,
    module_paths: Vec<PathBuf>,
    module_slugs: Vec<String>,
    module_displays: Vec<String>,
    /// Read-through cache for rendered-source paths. Pure function of
    /// its input, so redundant computation under races is harmless.
    source_cache: RwLock<HashMap<PathBuf, PathBuf>>,
}

impl<'r> LayoutPlanner<'r> {
    /// Compute the full path table. Fails on any path collision left
    /// after slug disambiguation.
    pub fn plan(registry: &'r EntityRegistry, config: &Config) -> Result<Self, LayoutError> {
        let module_slugs = compute_slugs(registry, config);
        let module_paths: Vec<PathBuf> = module_slugs
            .iter()
            .map(|slug| Path::new("module").join(format!("{}.html", slug)))
            .collect();
        let module_displays = compute_displays(registry, config);

        // Page paths for registered types, warmed in parallel; the merge
        // below stays sequential so collision detection is deterministic.
        let type_ids: Vec<EntityId> = registry.types().collect();
        let computed: Vec<(EntityId, PathBuf)> = type_ids
            .par_iter()
            .map(|&id| (id, type_page(registry, &module_slugs, id)))
            .collect();

        let mut entity_paths = HashMap::new();
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();

        for module_id in registry.modules() {
            let module = registry.module(module_id);
            let path = &module_paths[module_id.0 as usize];
            if let Some(first) = claimed.insert(path.clone(), module.id.clone()) {
                return Err(LayoutError::PathCollision {
                    path: path.clone(),
                    first,
                    second: module.id.clone(),
                });
            }
            entity_paths.insert(module.exports, path.clone());
        }

        for (id, path) in computed {
            let name = registry.entity(id).name.clone();
            match claimed.get(&path) {
                // Aliases registered under the same qualified name share
                // one page; only distinct entities collide.
                Some(first) if *first != name => {
                    return Err(LayoutError::PathCollision {
                        path,
                        first: first.clone(),
                        second: name,
                    });
                }
                Some(_) => {}
                None => {
                    claimed.insert(path.clone(), name);
                }
            }
            entity_paths.insert(id, path);
        }

        Ok(Self {
            registry,
            src_prefix: config.source_prefix.clone(),
            entity_paths,
            module_paths,
            module_slugs,
            module_displays,
            source_cache: RwLock::new(HashMap::new()),
        })
    }

    /// The output path of the entity's page, walking up the owner chain
    /// for entities that render onto their owner's page.
    pub fn path_for(&self, id: EntityId) -> Option<PathBuf> {
        let mut current = id;
        loop {
            if let Some(path) = self.entity_paths.get(&current) {
                return Some(path.clone());
            }
            current = self.registry.entity(current).owner?;
        }
    }

    /// Whether the entity renders to a page of its own, as opposed to a
    /// fragment of its owner's page.
    pub fn has_own_page(&self, id: EntityId) -> bool {
        self.entity_paths.contains_key(&id)
    }

    pub fn path_for_module(&self, id: ModuleId) -> &Path {
        &self.module_paths[id.0 as usize]
    }

    pub fn module_slug(&self, id: ModuleId) -> &str {
        &self.module_slugs[id.0 as usize]
    }

    /// The output path a source file renders to:
    /// `source/<path relative to the source prefix>.src.html`.
    pub fn path_for_source(&self, file: &Path) -> PathBuf {
        if let Some(path) = self.source_cache.read().unwrap().get(file) {
            return path.clone();
        }

        let rel = file.strip_prefix(&self.src_prefix).unwrap_or(file);
        let mut path = PathBuf::from("source");
        for component in rel.components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        let name = match path.file_name() {
            Some(name) => format!("{}.src.html", name.to_string_lossy()),
            None => "index.src.html".to_string(),
        };
        path.set_file_name(name);

        self.source_cache
            .write()
            .unwrap()
            .insert(file.to_path_buf(), path.clone());
        path
    }

    /// Human-readable label for an entity, module-aware: module exports
    /// display as the module, exported types as their name relative to
    /// the module, properties as their simple name, and global types as
    /// their qualified name.
    pub fn display_name(&self, id: EntityId) -> String {
        let entity = self.registry.entity(id);

        if entity.is_module_exports() {
            if let Some(module) = entity.module {
                return self.module_display_name(module).to_string();
            }
        }

        if let Some(module) = entity.module {
            if entity.kind.is_type() || entity.is_typedef() {
                let prefix = format!("{}.", self.registry.module(module).id);
                if let Some(rel) = entity.name.strip_prefix(&prefix) {
                    return rel.to_string();
                }
                return entity.simple_name().to_string();
            }
        }

        match entity.kind {
            EntityKind::Property => entity.simple_name().to_string(),
            _ => entity.name.clone(),
        }
    }

    pub fn module_display_name(&self, id: ModuleId) -> &str {
        &self.module_displays[id.0 as usize]
    }

    /// The registry this layout was planned against.
    pub fn registry(&self) -> &'r EntityRegistry {
        self.registry
    }
}

/// Slug for a file-module path: the path relative to the module prefix,
/// separators replaced by `_`, the `.js` suffix dropped.
fn file_slug(rel: &Path, elide_index: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    if let Some(last) = parts.last_mut() {
        if last.ends_with(".js") {
            let stem = last.len() - ".js".len();
            last.truncate(stem);
        }
    }
    if elide_index && parts.last().map(String::as_str) == Some("index") && parts.len() > 1 {
        parts.pop();
    }
    parts.join("_")
}

fn module_rel<'a>(path: &'a Path, config: &Config) -> &'a Path {
    path.strip_prefix(&config.module_prefix).unwrap_or(path)
}

fn is_index(path: &Path) -> bool {
    path.file_name().map(|n| n == "index.js").unwrap_or(false)
}

fn compute_slugs(registry: &EntityRegistry, config: &Config) -> Vec<String> {
    let modules: Vec<_> = registry.modules().map(|id| registry.module(id)).collect();

    // Under the elide-index scheme, index modules may only take their
    // directory's slug when no sibling module already owns it.
    let mut taken: Vec<String> = Vec::new();
    if config.module_slugs == SlugScheme::ElideIndex {
        for module in &modules {
            match &module.kind {
                ModuleKind::File { path } if !is_index(path) => {
                    taken.push(file_slug(module_rel(path, config), false));
                }
                ModuleKind::Namespace { name } => taken.push(name.clone()),
                ModuleKind::File { .. } => {}
            }
        }
    }

    modules
        .iter()
        .map(|module| match &module.kind {
            ModuleKind::Namespace { name } => name.clone(),
            ModuleKind::File { path } => {
                let rel = module_rel(path, config);
                match config.module_slugs {
                    SlugScheme::Full => file_slug(rel, false),
                    SlugScheme::ElideIndex => {
                        if is_index(path) {
                            let elided = file_slug(rel, true);
                            if taken.iter().any(|slug| *slug == elided) {
                                file_slug(rel, false)
                            } else {
                                elided
                            }
                        } else {
                            file_slug(rel, false)
                        }
                    }
                }
            }
        })
        .collect()
}

fn compute_displays(registry: &EntityRegistry, config: &Config) -> Vec<String> {
    let modules: Vec<_> = registry.modules().map(|id| registry.module(id)).collect();

    // Display name before clash handling: an index module reads as its
    // directory, any other file module as its path without extension.
    let plain: Vec<String> = modules
        .iter()
        .map(|module| match &module.kind {
            ModuleKind::Namespace { name } => name.clone(),
            ModuleKind::File { path } => {
                let rel = module_rel(path, config);
                let shown = if is_index(path) {
                    rel.parent().unwrap_or(Path::new("")).to_path_buf()
                } else {
                    let mut buf = rel.to_path_buf();
                    if let Some(name) = rel.file_name() {
                        let name = name.to_string_lossy();
                        if let Some(stem) = name.strip_suffix(".js") {
                            buf.set_file_name(stem.to_string());
                        }
                    }
                    buf
                };
                shown
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            }
        })
        .collect();

    // When an index module and a sibling file module would display the
    // same, the index module alone gains a trailing separator.
    plain
        .iter()
        .enumerate()
        .map(|(i, display)| {
            let clashes = match &modules[i].kind {
                ModuleKind::File { path } if is_index(path) => plain
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && other == display),
                _ => false,
            };
            if clashes {
                format!("{}/", display)
            } else {
                display.clone()
            }
        })
        .collect()
}

/// Page path for a registered type: exported types live under their
/// module's slug, global types at the output root.
fn type_page(registry: &EntityRegistry, slugs: &[String], id: EntityId) -> PathBuf {
    let entity = registry.entity(id);
    match entity.module {
        Some(module_id) => {
            let module = registry.module(module_id);
            let prefix = format!("{}.", module.id);
            let rel = entity
                .name
                .strip_prefix(&prefix)
                .unwrap_or_else(|| entity.simple_name());
            Path::new("module").join(format!(
                "{}_exports_{}.html",
                slugs[module_id.0 as usize],
                rel
            ))
        }
        None => PathBuf::from(format!("{}.html", entity.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, EntityKind, Module, TypeHandle};

    fn config() -> Config {
        Config {
            output: PathBuf::from("/out"),
            source_prefix: PathBuf::from("/input/src"),
            module_prefix: PathBuf::from("/input/module"),
            ..Default::default()
        }
    }

    fn entity(name: &str, kind: EntityKind, handle: u64) -> Entity {
        Entity {
            name: name.to_string(),
            kind,
            handle: Some(TypeHandle(handle)),
            doc: String::new(),
            position: None,
            module: None,
            owner: None,
            statics: Vec::new(),
            members: Vec::new(),
            nested: Vec::new(),
        }
    }

    fn add_file_module(registry: &mut EntityRegistry, rel: &str, handle: u64) -> ModuleId {
        let id = rel.trim_end_matches(".js").replace('/', ".");
        let mid = registry.next_module_id();
        let mut exports = entity(&id, EntityKind::ModuleExports, handle);
        exports.module = Some(mid);
        let exports_id = registry.add_property(exports);
        registry
            .add_module(Module {
                kind: ModuleKind::File {
                    path: PathBuf::from("/input/module").join(rel),
                },
                id,
                reference_id: rel.trim_end_matches(".js").to_string(),
                exports: exports_id,
                exported: Vec::new(),
                internal_vars: Vec::new(),
            })
            .unwrap()
    }

    fn add_exported_type(
        registry: &mut EntityRegistry,
        module: ModuleId,
        simple: &str,
        handle: u64,
    ) -> EntityId {
        let name = format!("{}.{}", registry.module(module).id, simple);
        let mut ty = entity(&name, EntityKind::Class, handle);
        ty.module = Some(module);
        ty.owner = Some(registry.module(module).exports);
        registry.add_type(ty).unwrap()
    }

    #[test]
    fn test_source_file_path() {
        let registry = EntityRegistry::new();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(
            planner.path_for_source(Path::new("/input/src/foo/bar/baz.js")),
            PathBuf::from("source/foo/bar/baz.js.src.html")
        );
    }

    #[test]
    fn test_global_type_path() {
        let mut registry = EntityRegistry::new();
        let id = registry
            .add_type(entity("foo.bar.Baz", EntityKind::Class, 1))
            .unwrap();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(
            planner.path_for(id),
            Some(PathBuf::from("foo.bar.Baz.html"))
        );
    }

    #[test]
    fn test_module_paths() {
        let mut registry = EntityRegistry::new();
        let index = add_file_module(&mut registry, "foo/bar/index.js", 1);
        let plain = add_file_module(&mut registry, "foo/bar/baz.js", 2);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(
            planner.path_for_module(index),
            Path::new("module/foo_bar_index.html")
        );
        assert_eq!(
            planner.path_for_module(plain),
            Path::new("module/foo_bar_baz.html")
        );
    }

    #[test]
    fn test_module_exported_type_path() {
        let mut registry = EntityRegistry::new();
        let module = add_file_module(&mut registry, "foo/bar.js", 1);
        let clazz = add_exported_type(&mut registry, module, "Clazz", 2);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(
            planner.path_for(clazz),
            Some(PathBuf::from("module/foo_bar_exports_Clazz.html"))
        );
    }

    #[test]
    fn test_exported_type_path_from_index_module() {
        let mut registry = EntityRegistry::new();
        let module = add_file_module(&mut registry, "foo/bar/index.js", 1);
        let clazz = add_exported_type(&mut registry, module, "Clazz", 2);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(
            planner.path_for(clazz),
            Some(PathBuf::from("module/foo_bar_index_exports_Clazz.html"))
        );
    }

    #[test]
    fn test_index_module_display_name() {
        let mut registry = EntityRegistry::new();
        let module = add_file_module(&mut registry, "foo/index.js", 1);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(planner.module_display_name(module), "foo");
    }

    #[test]
    fn test_plain_module_display_name() {
        let mut registry = EntityRegistry::new();
        let module = add_file_module(&mut registry, "foo/bar/baz.js", 1);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(planner.module_display_name(module), "foo/bar/baz");
    }

    #[test]
    fn test_index_display_clash_gets_trailing_separator() {
        let mut registry = EntityRegistry::new();
        let file = add_file_module(&mut registry, "foo/bar.js", 1);
        let index = add_file_module(&mut registry, "foo/bar/index.js", 2);
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(planner.module_display_name(file), "foo/bar");
        assert_eq!(planner.module_display_name(index), "foo/bar/");
        assert_ne!(
            planner.path_for_module(file),
            planner.path_for_module(index)
        );
    }

    #[test]
    fn test_namespace_module_display_and_path() {
        let mut registry = EntityRegistry::new();
        let mid = registry.next_module_id();
        let mut exports = entity("foo.bar.baz", EntityKind::ModuleExports, 1);
        exports.module = Some(mid);
        let exports_id = registry.add_property(exports);
        let module = registry
            .add_module(Module {
                kind: ModuleKind::Namespace {
                    name: "foo.bar.baz".to_string(),
                },
                id: "foo.bar.baz".to_string(),
                reference_id: "foo.bar.baz".to_string(),
                exports: exports_id,
                exported: Vec::new(),
                internal_vars: Vec::new(),
            })
            .unwrap();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(planner.module_display_name(module), "foo.bar.baz");
        assert_eq!(
            planner.path_for_module(module),
            Path::new("module/foo.bar.baz.html")
        );
    }

    #[test]
    fn test_elide_index_scheme() {
        let mut registry = EntityRegistry::new();
        let lone = add_file_module(&mut registry, "quux/index.js", 1);
        let file = add_file_module(&mut registry, "foo/bar.js", 2);
        let clashing = add_file_module(&mut registry, "foo/bar/index.js", 3);
        let config = Config {
            module_slugs: SlugScheme::ElideIndex,
            ..config()
        };
        let planner = LayoutPlanner::plan(&registry, &config).unwrap();
        // Unchallenged index modules take the directory slug.
        assert_eq!(planner.module_slug(lone), "quux");
        // A clash with a sibling pushes the index module to its full slug.
        assert_eq!(planner.module_slug(file), "foo_bar");
        assert_eq!(planner.module_slug(clashing), "foo_bar_index");
    }

    #[test]
    fn test_residual_slug_collision_is_fatal() {
        let mut registry = EntityRegistry::new();
        // `foo_bar.js` and `foo/bar.js` both slug to `foo_bar`.
        add_file_module(&mut registry, "foo_bar.js", 1);
        add_file_module(&mut registry, "foo/bar.js", 2);
        let err = LayoutPlanner::plan(&registry, &config()).unwrap_err();
        assert!(matches!(err, LayoutError::PathCollision { .. }));
    }

    #[test]
    fn test_duplicate_type_name_does_not_collide_with_itself() {
        let mut registry = EntityRegistry::new();
        registry
            .add_type(entity("foo.Bar", EntityKind::Class, 1))
            .unwrap();
        registry
            .add_type(entity("foo.Bar", EntityKind::Class, 1))
            .unwrap();
        assert!(LayoutPlanner::plan(&registry, &config()).is_ok());
    }

    #[test]
    fn test_path_for_is_stable() {
        let mut registry = EntityRegistry::new();
        let id = registry
            .add_type(entity("foo.Bar", EntityKind::Class, 1))
            .unwrap();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert_eq!(planner.path_for(id), planner.path_for(id));
        let source = Path::new("/input/src/a.js");
        assert_eq!(
            planner.path_for_source(source),
            planner.path_for_source(source)
        );
    }

    #[test]
    fn test_property_resolves_to_owner_page() {
        let mut registry = EntityRegistry::new();
        let prop = registry.add_property(entity("foo.Bar.baz", EntityKind::Property, 2));
        let mut bar = entity("foo.Bar", EntityKind::Class, 1);
        bar.statics = vec![prop];
        let bar_id = registry.add_type(bar).unwrap();
        registry.entity_mut(prop).owner = Some(bar_id);

        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        assert!(!planner.has_own_page(prop));
        assert_eq!(planner.path_for(prop), Some(PathBuf::from("foo.Bar.html")));
    }
}
