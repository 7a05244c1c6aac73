use crate::document::{Document, ItemElement, ItemGroupElement, MetadataElement, Node, PropertyElement, PropertyGroupElement};
use crate::engine::{self, is_identifier, normalize_path};
use crate::{
    DocumentLoader, EvaluatedSnapshot, EvaluationError, ExpressionError, Item, LoadError, Location, NameMap, Property,
    XmlLoader, write_document,
};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Where an implicit import is spliced relative to the root document's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPosition {
    Before,
    After,
}

/// An import the caller adds around the root document (SDK-style props/targets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitImport {
    /// Import path, relative to the root document's directory.
    pub project: String,
    pub position: ImportPosition,
}

/// Inputs to an evaluation that do not come from the document tree.
///
/// Global properties outrank anything a document declares; environment
/// properties are the weakest layer.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub global_properties: NameMap<String>,
    /// Value of `$(MSBuildToolsVersion)`.
    pub tools_version: String,
    pub environment: NameMap<String>,
    pub implicit_imports: Vec<ImplicitImport>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self {
            global_properties: NameMap::new(),
            tools_version: "Current".to_string(),
            environment: NameMap::new(),
            implicit_imports: Vec::new(),
        }
    }
}

impl EvaluationContext {
    pub fn with_global_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.global_properties.insert(name, value.into());
        self
    }

    pub fn with_tools_version(mut self, version: impl Into<String>) -> Self {
        self.tools_version = version.into();
        self
    }

    pub fn with_environment_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name, value.into());
        self
    }

    /// Import the process environment. Variables whose names are not valid
    /// property names (or are not UTF-8) are skipped.
    pub fn with_process_environment(mut self) -> Self {
        for (name, value) in std::env::vars_os() {
            let (Some(name), Some(value)) = (name.to_str(), value.to_str()) else { continue };
            if is_identifier(name) {
                self.environment.insert(name, value.to_string());
            }
        }
        self
    }

    pub fn with_implicit_import(mut self, project: impl Into<String>, position: ImportPosition) -> Self {
        self.implicit_imports.push(ImplicitImport { project: project.into(), position });
        self
    }
}

bitflags::bitflags! {
    /// Tolerances for import failures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LoadSettings: u8 {
        /// A literal import path that does not exist is skipped.
        const IGNORE_MISSING_IMPORTS = 1 << 0;
        /// An import that fails to load or parse is skipped.
        const IGNORE_INVALID_IMPORTS = 1 << 1;
    }
}

/// A project: root document, evaluation inputs and the latest snapshot.
///
/// Mutations edit the root document copy-on-write and mark the project
/// dirty; [`Project::reevaluate_if_necessary`] brings the snapshot up to date.
/// A failed evaluation leaves the previous snapshot in place.
pub struct Project {
    document: Arc<Document>,
    context: EvaluationContext,
    loader: Arc<dyn DocumentLoader>,
    settings: LoadSettings,
    snapshot: Option<Arc<EvaluatedSnapshot>>,
    evaluation_counter: u64,
    dirty: bool,
    disable_mark_dirty: bool,
    skip_evaluation: bool,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("path", &self.document.path)
            .field("evaluation_counter", &self.evaluation_counter)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Wrap an already-parsed document. Imports load from disk unless [`Project::with_loader`] is used.
    pub fn new(document: Document, context: EvaluationContext) -> Self {
        Project {
            document: Arc::new(document),
            context,
            loader: Arc::new(XmlLoader),
            settings: LoadSettings::empty(),
            snapshot: None,
            evaluation_counter: 0,
            dirty: true,
            disable_mark_dirty: false,
            skip_evaluation: false,
        }
    }

    /// Read and parse a project file. Relative paths resolve against the current directory.
    pub fn load(path: impl AsRef<Path>, context: EvaluationContext) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
            cwd.join(path)
        };
        let document = XmlLoader.load(&normalize_path(&absolute))?;
        Ok(Project::new(document, context))
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self.mark_dirty();
        self
    }

    pub fn with_settings(mut self, settings: LoadSettings) -> Self {
        self.settings = settings;
        self.mark_dirty();
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn settings(&self) -> LoadSettings {
        self.settings
    }

    // --- Evaluation ---------------------------------------------------------

    /// Run a full evaluation and publish the result.
    pub fn evaluate(&mut self) -> Result<Arc<EvaluatedSnapshot>, EvaluationError> {
        let version = self.evaluation_counter + 1;
        match engine::evaluate(&self.document, &self.context, self.loader.as_ref(), self.settings, version) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.evaluation_counter = version;
                self.snapshot = Some(snapshot.clone());
                self.dirty = false;
                Ok(snapshot)
            }
            Err(err) => {
                tracing::warn!(project = %self.document.path.display(), error = %err, "evaluation failed");
                self.dirty = true;
                Err(err)
            }
        }
    }

    /// Evaluate when dirty or never evaluated, unless evaluation is skipped.
    pub fn reevaluate_if_necessary(&mut self) -> Result<(), EvaluationError> {
        if self.skip_evaluation || (!self.dirty && self.snapshot.is_some()) {
            return Ok(());
        }
        self.evaluate().map(|_| ())
    }

    pub fn mark_dirty(&mut self) {
        if !self.disable_mark_dirty {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of successful evaluations; the current snapshot's version.
    pub fn evaluation_counter(&self) -> u64 {
        self.evaluation_counter
    }

    pub fn set_disable_mark_dirty(&mut self, disable: bool) {
        self.disable_mark_dirty = disable;
    }

    pub fn set_skip_evaluation(&mut self, skip: bool) {
        self.skip_evaluation = skip;
    }

    // --- Queries ------------------------------------------------------------

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Option<&Arc<EvaluatedSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.snapshot.as_deref()?.property(name)
    }

    /// Evaluated value, or empty when undefined or not yet evaluated.
    pub fn property_value(&self, name: &str) -> &str {
        self.snapshot.as_deref().map(|s| s.property_value(name)).unwrap_or("")
    }

    pub fn items<'a>(&'a self, item_type: &str) -> Vec<&'a Item> {
        self.snapshot.as_deref().map(|s| s.items(item_type).collect()).unwrap_or_default()
    }

    /// Expand `text` against the latest snapshot (an empty model before the first evaluation).
    pub fn expand_string(&self, text: &str) -> Result<String, ExpressionError> {
        match self.snapshot.as_deref() {
            Some(snapshot) => snapshot.expand_string(text),
            None => {
                let empty = NameMap::new();
                engine::expand(text, &engine::Scope::new(&empty, self.document.directory()))
            }
        }
    }

    /// Item elements of `item_type` straight from the root document, conditions ignored.
    pub fn items_ignoring_condition(&self, item_type: &str) -> Vec<&ItemElement> {
        self.document.item_elements().into_iter().filter(|e| e.item_type.eq_ignore_ascii_case(item_type)).collect()
    }

    // --- Mutation -----------------------------------------------------------

    fn synthetic(&self) -> Location {
        Location::synthetic(self.document.path.clone())
    }

    /// Set a property in the root document: the last unconditioned declaration
    /// is updated in place, otherwise one is appended.
    pub fn set_property(&mut self, name: &str, value: &str) {
        let location = self.synthetic();
        let doc = Arc::make_mut(&mut self.document);
        let existing = doc
            .nodes
            .iter_mut()
            .filter_map(|n| match n {
                Node::PropertyGroup(g) if g.condition.is_none() => Some(g),
                _ => None,
            })
            .flat_map(|g| g.properties.iter_mut())
            .filter(|p| p.condition.is_none() && p.name.eq_ignore_ascii_case(name))
            .last();
        match existing {
            Some(p) => p.value = value.to_string(),
            None => {
                let element = PropertyElement {
                    name: name.to_string(),
                    value: value.to_string(),
                    condition: None,
                    location: location.clone(),
                };
                let group = doc.nodes.iter_mut().find_map(|n| match n {
                    Node::PropertyGroup(g) if g.condition.is_none() => Some(g),
                    _ => None,
                });
                match group {
                    Some(g) => g.properties.push(element),
                    None => doc.nodes.push(Node::PropertyGroup(PropertyGroupElement {
                        condition: None,
                        properties: vec![element],
                        location,
                    })),
                }
            }
        }
        self.mark_dirty();
    }

    /// Remove every declaration of `name` from the root document's property groups.
    pub fn remove_property(&mut self, name: &str) -> bool {
        let found = self.document.nodes.iter().any(|n| {
            matches!(n, Node::PropertyGroup(g) if g.properties.iter().any(|p| p.name.eq_ignore_ascii_case(name)))
        });
        if !found {
            return false;
        }
        for node in &mut Arc::make_mut(&mut self.document).nodes {
            if let Node::PropertyGroup(g) = node {
                g.properties.retain(|p| !p.name.eq_ignore_ascii_case(name));
            }
        }
        self.mark_dirty();
        true
    }

    /// Returns whether the value changed.
    pub fn set_global_property(&mut self, name: &str, value: &str) -> bool {
        if self.context.global_properties.get(name).is_some_and(|v| v == value) {
            return false;
        }
        self.context.global_properties.insert(name, value.to_string());
        self.mark_dirty();
        true
    }

    pub fn remove_global_property(&mut self, name: &str) -> bool {
        if self.context.global_properties.remove(name).is_none() {
            return false;
        }
        self.mark_dirty();
        true
    }

    /// Append an item element, next to existing unconditioned elements of the same type when possible.
    pub fn add_item(&mut self, item_type: &str, include: &str, metadata: &[(&str, &str)]) {
        let location = self.synthetic();
        let element = ItemElement {
            item_type: item_type.to_string(),
            include: Some(include.to_string()),
            exclude: None,
            remove: None,
            update: None,
            condition: None,
            metadata: metadata
                .iter()
                .map(|(name, value)| MetadataElement {
                    name: name.to_string(),
                    value: value.to_string(),
                    condition: None,
                    location: location.clone(),
                })
                .collect(),
            location: location.clone(),
        };
        let doc = Arc::make_mut(&mut self.document);
        let group = doc.nodes.iter_mut().find_map(|n| match n {
            Node::ItemGroup(g) if g.condition.is_none() && g.items.iter().any(|i| i.item_type.eq_ignore_ascii_case(item_type)) => Some(g),
            _ => None,
        });
        match group {
            Some(g) => g.items.push(element),
            None => doc.nodes.push(Node::ItemGroup(ItemGroupElement { condition: None, items: vec![element], location })),
        }
        self.mark_dirty();
    }

    /// Remove item elements whose type and unevaluated include match exactly (type case-insensitive).
    pub fn remove_item(&mut self, item_type: &str, include: &str) -> bool {
        let matches = |i: &ItemElement| i.item_type.eq_ignore_ascii_case(item_type) && i.include.as_deref() == Some(include);
        if !self.document.item_elements().into_iter().any(matches) {
            return false;
        }
        for node in &mut Arc::make_mut(&mut self.document).nodes {
            if let Node::ItemGroup(g) = node {
                g.items.retain(|i| !matches(i));
            }
        }
        self.mark_dirty();
        true
    }

    /// Write the root document as XML.
    pub fn save(&self, out: &mut impl io::Write) -> io::Result<()> {
        write_document(&self.document, out)
    }
}
