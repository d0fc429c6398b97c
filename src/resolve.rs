//! Qualified-name reference resolution.
//!
//! Documentation comments refer to entities through three overlapping
//! notations: global dotted names (`a.b.C.d`), instance members
//! (`Foo#bar`, `Foo.prototype.bar`), and module exports (quoted require
//! paths like `"some/module".SomeClass`, plus the literal `exports`
//! member). A reference is normalized once into a closed grammar, then
//! resolved right-to-left: peel simple names off the end until a base
//! entity matches, then descend back down through the property chains.
//! Module scope shadows the global namespace at every level, and failure
//! is always non-fatal: callers render unresolved references as plain
//! text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::graph::{EntityId, ModuleId};
use crate::registry::EntityRegistry;

/// Maximum qualified-name segments walked before resolution gives up.
/// Malformed input fails closed as unresolved instead of looping.
const MAX_SEGMENTS: usize = 64;

lazy_static! {
    /// Quoted module-path prefix: `"some/module"` or `"some/module".Rest`.
    static ref MODULE_REF: Regex = Regex::new(r#"^"([^"]+)"(?:\.(.+))?$"#).unwrap();
}

/// A reference string normalized into one of the closed addressing forms.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    /// Dotted name, resolved through the scope chain and then the global
    /// namespace.
    Name(String),
    /// `"module/path".Rest`, resolved through the named module's export
    /// surface.
    ModuleScoped { module: String, rest: Option<String> },
}

/// Normalize a raw reference: recognize the quoted-module form, rewrite
/// `#` to `.prototype.`, and strip one trailing `.prototype` and any
/// trailing `.`.
fn normalize(reference: &str) -> Reference {
    if let Some(caps) = MODULE_REF.captures(reference) {
        return Reference::ModuleScoped {
            module: caps[1].to_string(),
            rest: caps.get(2).map(|m| normalize_name(m.as_str())),
        };
    }
    Reference::Name(normalize_name(reference))
}

fn normalize_name(name: &str) -> String {
    let mut name = name.replace('#', ".prototype.");
    if name.ends_with(".prototype") {
        let stripped = name.len() - ".prototype".len();
        name.truncate(stripped);
    }
    if name.ends_with('.') {
        name.pop();
    }
    name
}

fn trim_prototype(name: &str) -> &str {
    name.strip_suffix(".prototype").unwrap_or(name)
}

/// Resolves documentation references against a populated registry.
pub struct Resolver<'r> {
    registry: &'r EntityRegistry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r EntityRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `reference`, optionally scoped to a module whose exports
    /// shadow the global namespace.
    ///
    /// Returns `None` when nothing matches. An unresolvable reference is
    /// not an error.
    pub fn resolve(&self, reference: &str, scope: Option<ModuleId>) -> Option<EntityId> {
        match normalize(reference) {
            Reference::Name(name) => self.resolve_name(&name, scope),
            Reference::ModuleScoped { module, rest } => {
                let module = self
                    .registry
                    .module_by_reference(&module)
                    .or_else(|| self.registry.module_by_id(&module))?;
                match rest {
                    None => Some(self.registry.module(module).exports),
                    Some(rest) => self.resolve_name(&rest, Some(module)),
                }
            }
        }
    }

    fn resolve_name(&self, name: &str, scope: Option<ModuleId>) -> Option<EntityId> {
        if name.is_empty() {
            return None;
        }

        // Walk the strictly decreasing chain of parent prefixes until one
        // matches, remembering the peeled simple names.
        let mut pending: Vec<&str> = Vec::new();
        let mut cut = name.len();
        let mut peeled = false;
        let base = loop {
            let current = &name[..cut];
            // Each parent level sheds one trailing `.prototype` before
            // matching, the same way the entry normalization did.
            let probe = if peeled { trim_prototype(current) } else { current };
            if let Some(id) = self.lookup(probe, scope) {
                break id;
            }
            if pending.len() >= MAX_SEGMENTS {
                return None;
            }
            let dot = current.rfind('.')?;
            let simple = &current[dot + 1..];
            if dot == 0 || simple.is_empty() {
                return None;
            }
            pending.push(simple);
            cut = dot;
            peeled = true;
        };

        // Descend back down. The un-normalized parent prefix decides which
        // child list to search at each step.
        let mut found = base;
        while let Some(simple) = pending.pop() {
            let parent_raw = &name[..cut];
            found = self.descend(found, parent_raw, simple)?;
            cut += 1 + simple.len();
        }
        Some(found)
    }

    /// One scope-chain lookup: module-local names first, then hoisted
    /// internal variables, then externs, global types, and modules.
    fn lookup(&self, name: &str, scope: Option<ModuleId>) -> Option<EntityId> {
        if let Some(scope) = scope {
            if let Some(id) = self.registry.exported_property(scope, name) {
                return Some(id);
            }
            // A module-local binding promoted to the synthetic global
            // scope resolves through the module that declared it, to its
            // exported identity rather than the raw binding.
            if let Some((module, exported_as)) = self.registry.internal_var(name) {
                if let Some(id) = self.registry.exported_property(module, exported_as) {
                    return Some(id);
                }
            }
        }

        if let Some(id) = self.registry.extern_by_name(name) {
            return Some(id);
        }
        if let Some(id) = self.registry.type_by_name(name) {
            return Some(id);
        }
        if let Some(module) = self.registry.module_by_id(name) {
            return Some(self.registry.module(module).exports);
        }
        None
    }

    fn descend(&self, parent: EntityId, parent_raw: &str, simple: &str) -> Option<EntityId> {
        let entity = self.registry.entity(parent);

        if parent_raw.ends_with(".prototype") {
            return self.find_by_simple(&entity.members, simple);
        }

        if entity.is_module_exports() {
            // `exports` names the module's export object itself.
            if simple == "exports" {
                return Some(parent);
            }
            let module = entity.module?;
            return self.registry.exported_property(module, simple);
        }

        self.find_by_simple(&entity.statics, simple)
    }

    fn find_by_simple(&self, children: &[EntityId], simple: &str) -> Option<EntityId> {
        children
            .iter()
            .copied()
            .find(|&id| self.registry.entity(id).simple_name() == simple)
    }
}
