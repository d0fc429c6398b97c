//! Relative link computation between generated artifacts.
//!
//! Links are always relative to the directory containing the page they
//! appear on, never absolute URLs, so the generated tree can be served
//! from any root. Link text is the target's display name. Failing to
//! locate a target's path is a hard error: a page with broken navigation
//! silently corrupts the output, so generation aborts instead.

use std::path::{Component, Path};

use serde::Serialize;
use thiserror::Error;

use crate::graph::EntityId;
use crate::layout::LayoutPlanner;

/// Errors raised while building links. Fatal.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("no output path for {name:?}; cannot build link")]
    Unresolved { name: String },
}

/// A rendered cross-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Builds relative links between located artifacts.
pub struct LinkFactory<'a, 'r> {
    layout: &'a LayoutPlanner<'r>,
}

impl<'a, 'r> LinkFactory<'a, 'r> {
    pub fn new(layout: &'a LayoutPlanner<'r>) -> Self {
        Self { layout }
    }

    fn located(&self, id: EntityId, registry_name: &str) -> Result<std::path::PathBuf, LinkError> {
        match self.layout.path_for(id) {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(LinkError::Unresolved {
                name: registry_name.to_string(),
            }),
        }
    }

    /// Link from the page of `from` to `to`.
    ///
    /// Targets without a page of their own (properties, typedefs) link to
    /// their owner's page with a fragment naming the member.
    pub fn link_to(&self, from: EntityId, to: EntityId) -> Result<Link, LinkError> {
        let from_path = self.located(from, &self.display(from))?;
        let to_path = self.located(to, &self.display(to))?;

        let from_dir = from_path.parent().unwrap_or(Path::new(""));
        let mut href = relativize(from_dir, &to_path);
        if !self.layout.has_own_page(to) {
            href.push('#');
            href.push_str(self.fragment(to));
        }

        Ok(Link {
            text: self.display(to),
            href,
        })
    }

    /// Link from the page of `from` to a rendered source line.
    pub fn link_to_source(
        &self,
        from: EntityId,
        file: &Path,
        line: u32,
    ) -> Result<Link, LinkError> {
        let from_path = self.located(from, &self.display(from))?;
        let to_path = self.layout.path_for_source(file);

        let from_dir = from_path.parent().unwrap_or(Path::new(""));
        let href = format!("{}#l{}", relativize(from_dir, &to_path), line);

        Ok(Link {
            text: file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string()),
            href,
        })
    }

    /// Link addressed from the output root, as used by the navigation
    /// index.
    pub fn link_from_root(&self, to: EntityId) -> Result<Link, LinkError> {
        let to_path = self.located(to, &self.display(to))?;
        let mut href = path_string(&to_path);
        if !self.layout.has_own_page(to) {
            href.push('#');
            href.push_str(self.fragment(to));
        }
        Ok(Link {
            text: self.display(to),
            href,
        })
    }

    fn display(&self, id: EntityId) -> String {
        self.layout.display_name(id)
    }

    fn fragment(&self, id: EntityId) -> &str {
        self.layout.registry().entity(id).simple_name()
    }
}

/// Relative path from `from_dir` to `to`, both relative to one common
/// output root.
fn relativize(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let mut common = 0;
    while common < from.len()
        && common + 1 < to_parts.len()
        && from[common] == to_parts[common]
    {
        common += 1;
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to_parts[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

fn path_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::graph::{Entity, EntityKind, Module, ModuleKind, TypeHandle};
    use crate::registry::EntityRegistry;
    use std::path::PathBuf;

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

    fn fixture() -> (EntityRegistry, EntityId, EntityId) {
        let mut registry = EntityRegistry::new();

        let global = registry
            .add_type(entity("Baz", EntityKind::Class, 1))
            .unwrap();

        let mid = registry.next_module_id();
        let mut exports = entity("foo.bar.baz", EntityKind::ModuleExports, 2);
        exports.module = Some(mid);
        let exports_id = registry.add_property(exports);
        let mut one = entity("foo.bar.baz.One", EntityKind::Class, 3);
        one.module = Some(mid);
        one.owner = Some(exports_id);
        let one_id = registry.add_type(one).unwrap();
        let mut two = entity("foo.bar.baz.Two", EntityKind::Class, 4);
        two.module = Some(mid);
        two.owner = Some(exports_id);
        let two_id = registry.add_type(two).unwrap();
        registry
            .add_module(Module {
                kind: ModuleKind::File {
                    path: PathBuf::from("/input/module/foo/bar/baz.js"),
                },
                id: "foo.bar.baz".to_string(),
                reference_id: "foo/bar/baz".to_string(),
                exports: exports_id,
                exported: vec![one_id, two_id],
                internal_vars: Vec::new(),
            })
            .unwrap();

        (registry, global, one_id)
    }

    #[test]
    fn test_link_between_sibling_exported_types() {
        let (registry, _, one) = fixture();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);

        let two = registry.type_by_name("foo.bar.baz.Two").unwrap();
        let link = links.link_to(one, two).unwrap();
        assert_eq!(link.href, "foo_bar_baz_exports_Two.html");
        assert_eq!(link.text, "Two");

        let back = links.link_to(two, one).unwrap();
        assert_eq!(back.href, "foo_bar_baz_exports_One.html");
    }

    #[test]
    fn test_link_from_module_type_to_global_type() {
        let (registry, global, one) = fixture();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);

        let link = links.link_to(one, global).unwrap();
        assert_eq!(link.href, "../Baz.html");
        assert_eq!(link.text, "Baz");

        let down = links.link_to(global, one).unwrap();
        assert_eq!(down.href, "module/foo_bar_baz_exports_One.html");
    }

    #[test]
    fn test_source_link_from_global_type() {
        let (registry, global, one) = fixture();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);

        let source = Path::new("/input/src/foo/bar/baz.js");
        let link = links.link_to_source(global, source, 42).unwrap();
        assert_eq!(link.href, "source/foo/bar/baz.js.src.html#l42");

        let from_module = links.link_to_source(one, source, 7).unwrap();
        assert_eq!(from_module.href, "../source/foo/bar/baz.js.src.html#l7");
    }

    #[test]
    fn test_property_link_carries_fragment() {
        let mut registry = EntityRegistry::new();
        let prop = registry.add_property(entity("foo.Bar.baz", EntityKind::Property, 2));
        let mut bar = entity("foo.Bar", EntityKind::Class, 1);
        bar.statics = vec![prop];
        let bar_id = registry.add_type(bar).unwrap();
        registry.entity_mut(prop).owner = Some(bar_id);

        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);

        let link = links.link_to(bar_id, prop).unwrap();
        assert_eq!(link.href, "foo.Bar.html#baz");
        assert_eq!(link.text, "baz");
    }

    #[test]
    fn test_round_trip_resolves_to_target_path() {
        let (registry, global, one) = fixture();
        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);

        // Resolving the href against the origin's directory lands exactly
        // on the target's path.
        let link = links.link_to(one, global).unwrap();
        let origin_dir = planner.path_for(one).unwrap();
        let origin_dir = origin_dir.parent().unwrap();
        let mut resolved = origin_dir.to_path_buf();
        for part in link.href.split('/') {
            if part == ".." {
                resolved.pop();
            } else {
                resolved.push(part);
            }
        }
        assert_eq!(resolved, planner.path_for(global).unwrap());
    }

    #[test]
    fn test_unlocated_entity_is_an_error() {
        let mut registry = EntityRegistry::new();
        let orphan = registry.add_property(entity("floating", EntityKind::Property, 1));
        let anchor = registry
            .add_type(entity("Anchor", EntityKind::Class, 2))
            .unwrap();

        let planner = LayoutPlanner::plan(&registry, &config()).unwrap();
        let links = LinkFactory::new(&planner);
        assert!(matches!(
            links.link_to(anchor, orphan),
            Err(LinkError::Unresolved { .. })
        ));
    }
}
