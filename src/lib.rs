//! `buildeval` turns MSBuild-style project documents into an evaluated, queryable model.
//!
//! The public surface is small:
//!
//! - [`Project`] owns a root [`Document`], an [`EvaluationContext`] and the most recent
//!   [`EvaluatedSnapshot`]. It tracks dirtiness and re-evaluates on demand.
//! - [`expand`] / [`evaluate_condition`] / [`resolve_glob`] expose the expression language and
//!   the glob resolver for callers that evaluate fragments on their own.
//! - [`DocumentLoader`] is the seam to the parser; [`XmlLoader`] and [`MemoryLoader`] ship with
//!   the crate.
//!
//! ```
//! use buildeval::{EvaluationContext, MemoryLoader, Project, parse_document};
//! use std::sync::Arc;
//!
//! let xml = r#"<Project>
//!   <PropertyGroup>
//!     <Config Condition="'$(Config)' == ''">Debug</Config>
//!   </PropertyGroup>
//! </Project>"#;
//! let doc = parse_document("/work/app.proj", xml).unwrap();
//! let ctx = EvaluationContext::default().with_global_property("Config", "Release");
//! let mut project = Project::new(doc, ctx).with_loader(Arc::new(MemoryLoader::new()));
//! let snapshot = project.evaluate().unwrap();
//! assert_eq!(snapshot.property_value("config"), "Release");
//! ```

#[macro_use]
mod macros;
mod api;
mod document;
mod engine;
mod error;
mod xml;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use api::{EvaluationContext, ImplicitImport, ImportPosition, LoadSettings, Project};
pub use document::{
    ChooseElement, Document, ImportElement, ImportGroupElement, ItemDefinitionElement, ItemDefinitionGroupElement,
    ItemElement, ItemGroupElement, MetadataElement, Node, PropertyElement, PropertyGroupElement, TargetElement,
    TaskElement, WhenElement,
};
pub use engine::{
    EvaluationMetrics, GlobMatch, MetadataSource, PassMetrics, Scope, evaluate_condition, expand, resolve_glob,
};
pub use error::{EvaluationError, ExpressionError, GlobError, ImportError, LoadError};
pub use xml::{DocumentLoader, MemoryLoader, XmlLoader, parse_document, write_document};

// --- Names -------------------------------------------------------------------

/// Ordered map keyed by case-insensitive names.
///
/// Property names, item types, metadata names and target names all compare
/// ASCII-case-insensitively. The first spelling inserted for a key is kept;
/// replacing a value keeps the entry's position.
#[derive(Clone)]
pub struct NameMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for NameMap<V> {
    fn default() -> Self {
        NameMap { entries: Vec::new(), index: HashMap::new() }
    }
}

impl<V: fmt::Debug> fmt::Debug for NameMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl<V> NameMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.index.get(&Self::key(name)).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        match self.index.get(&Self::key(name)) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(&Self::key(name))
    }

    /// Insert or replace; returns the previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        let key = Self::key(&name);
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        let i = self.index.remove(&Self::key(name))?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for NameMap<V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = NameMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

// --- Locations ----------------------------------------------------------------

/// Position of an element in its source document (1-based; 0 for synthesized elements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Arc<Path>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: Arc<Path>, line: u32, column: u32) -> Self {
        Location { file, line, column }
    }

    /// Location for elements created through the API rather than read from text.
    pub fn synthetic(file: Arc<Path>) -> Self {
        Location { file, line: 0, column: 0 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}({},{})", self.file.display(), self.line, self.column)
        }
    }
}

// --- Evaluated model ---------------------------------------------------------

/// Where a property value came from. Global and reserved values cannot be
/// overridden by document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyOrigin {
    Environment,
    Reserved,
    Global,
    Document,
}

impl PropertyOrigin {
    pub fn is_overridable(self) -> bool {
        matches!(self, PropertyOrigin::Environment | PropertyOrigin::Document)
    }
}

/// A property with its final value and the values it shadowed.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub unevaluated_value: String,
    pub evaluated_value: String,
    pub origin: PropertyOrigin,
    /// Element that defined this value; `None` for environment, reserved and global values.
    pub defining_element: Option<Location>,
    pub(crate) predecessor: Option<Arc<Property>>,
}

impl Property {
    /// The value this one replaced, if any.
    pub fn predecessor(&self) -> Option<&Property> {
        self.predecessor.as_deref()
    }

    /// This property followed by every value it shadowed, newest first.
    pub fn history(&self) -> impl Iterator<Item = &Property> {
        std::iter::successors(Some(self), |p| p.predecessor())
    }
}

/// Default metadata for every item of a type created after the definition.
#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub item_type: String,
    pub metadata: NameMap<String>,
}

/// An evaluated item. `metadata` holds custom metadata only; well-known
/// metadata (`Filename`, `FullPath`, ...) is computed by [`Item::metadata_value`].
#[derive(Debug, Clone)]
pub struct Item {
    pub item_type: String,
    pub unevaluated_include: String,
    pub evaluated_include: String,
    pub metadata: NameMap<String>,
    /// Directory portion matched by wildcards, with a trailing separator.
    pub recursive_dir: String,
    pub source: Location,
    pub(crate) base_dir: Arc<Path>,
}

impl Item {
    /// Custom metadata first, then well-known metadata, else empty.
    pub fn metadata_value(&self, name: &str) -> String {
        MetadataSource::metadata(self, name).unwrap_or_default()
    }

    pub fn full_path(&self) -> PathBuf {
        engine::normalize_path(&self.base_dir.join(&self.evaluated_include))
    }
}

/// One import site and the document it resolved to. Duplicates are kept.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub importing_element: Location,
    /// The `Project` attribute as written.
    pub project: String,
    pub imported: Arc<Document>,
    pub is_implicit: bool,
}

/// Unevaluated task declaration inside a target.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub name: String,
    pub condition: Option<String>,
    pub parameters: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub name: String,
    pub condition: Option<String>,
    /// False when the condition evaluated false. Inactive targets stay resolvable by name.
    pub is_active: bool,
    pub depends_on: Vec<String>,
    pub before_targets: Vec<String>,
    pub after_targets: Vec<String>,
    pub inputs: Option<String>,
    pub outputs: Option<String>,
    pub returns: Option<String>,
    pub tasks: Vec<TaskDescriptor>,
    pub location: Location,
}

/// Immutable result of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluatedSnapshot {
    pub version: u64,
    pub tools_version: String,
    pub directory: Arc<Path>,
    pub properties: NameMap<Property>,
    pub items: Vec<Item>,
    pub item_definitions: NameMap<ItemDefinition>,
    pub imports: Vec<ResolvedImport>,
    pub targets: NameMap<TargetDescriptor>,
    pub default_targets: Vec<String>,
    pub initial_targets: Vec<String>,
    /// Values each property was compared against in `'$(A)|$(B)' == 'x|y'` style conditions.
    pub conditioned_properties: NameMap<Vec<String>>,
    pub metrics: EvaluationMetrics,
}

impl EvaluatedSnapshot {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Evaluated value, or empty when the property is undefined.
    pub fn property_value(&self, name: &str) -> &str {
        self.properties.get(name).map(|p| p.evaluated_value.as_str()).unwrap_or("")
    }

    pub fn items<'a: 's, 's>(&'a self, item_type: &'s str) -> impl Iterator<Item = &'a Item> + 's {
        self.items.iter().filter(move |i| i.item_type.eq_ignore_ascii_case(item_type))
    }

    pub fn items_by_evaluated_include<'a>(&'a self, include: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |i| i.evaluated_include.eq_ignore_ascii_case(include))
    }

    /// Distinct item types in first-seen order.
    pub fn item_types(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .filter(|i| seen.insert(i.item_type.to_ascii_lowercase()))
            .map(|i| i.item_type.as_str())
            .collect()
    }

    /// One entry per imported document (first import site wins).
    pub fn imports(&self) -> Vec<&ResolvedImport> {
        let mut seen = std::collections::HashSet::new();
        self.imports.iter().filter(|i| seen.insert(i.imported.path.clone())).collect()
    }

    pub fn imports_including_duplicates(&self) -> &[ResolvedImport] {
        &self.imports
    }

    pub fn target(&self, name: &str) -> Option<&TargetDescriptor> {
        self.targets.get(name)
    }

    /// Expand `text` against the final properties and items.
    pub fn expand_string(&self, text: &str) -> Result<String, ExpressionError> {
        let scope = Scope::new(&self.properties, &self.directory).with_items(&self.items);
        expand(text, &scope)
    }
}
