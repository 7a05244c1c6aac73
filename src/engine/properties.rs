//! Property pass.
//!
//! Walks the root document depth-first in textual order, expanding each
//! property against the mapping accumulated so far and splicing imported
//! documents in at their import site. The walk also flattens the tree into the
//! evaluation order every later pass follows.

use super::condition::{evaluate_condition, record_conditioned_properties};
use super::expand::{Scope, expand};
use super::imports::ImportResolver;
use super::normalize_path;
use crate::api::{EvaluationContext, ImportPosition};
use crate::document::{ChooseElement, Document, ImportElement, Node, PropertyElement, PropertyGroupElement};
use crate::{EvaluationError, ExpressionError, Location, NameMap, Property, PropertyOrigin, ResolvedImport};
use std::path::Path;
use std::sync::Arc;

/// A top-level node of some document, in evaluation order.
#[derive(Debug, Clone)]
pub(crate) struct LogicalNode {
    pub document: Arc<Document>,
    pub index: usize,
    /// Branch taken by each `Choose` at or under this node, in walk order.
    /// Later passes replay these instead of re-testing `When` conditions.
    pub choices: Vec<Branch>,
}

impl LogicalNode {
    pub(crate) fn node(&self) -> &Node {
        &self.document.nodes[self.index]
    }
}

/// `Some(i)` for the i-th `When`, `None` for `Otherwise` (or nothing).
pub(crate) type Branch = Option<usize>;

/// Nodes of the branch `choice` names.
pub(crate) fn branch_nodes(choose: &ChooseElement, choice: Branch) -> &[Node] {
    match choice {
        Some(i) => choose.whens.get(i).map(|w| w.nodes.as_slice()).unwrap_or_default(),
        None => choose.otherwise.as_deref().unwrap_or_default(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct PropertyPassOutput {
    pub properties: NameMap<Property>,
    pub imports: Vec<ResolvedImport>,
    /// Every non-import top-level node, imports spliced in place (repeated for duplicate imports).
    pub logical: Vec<LogicalNode>,
    /// Documents in the order they were entered, root first.
    pub documents: Vec<Arc<Document>>,
    pub conditioned: NameMap<Vec<String>>,
}

struct PropertyPass<'r, 'l> {
    resolver: &'r mut ImportResolver<'l>,
    out: PropertyPassOutput,
}

fn seed(properties: &mut NameMap<Property>, name: &str, value: &str, origin: PropertyOrigin) {
    let predecessor = properties.get(name).cloned().map(Arc::new);
    let property = Property {
        name: name.to_string(),
        unevaluated_value: value.to_string(),
        evaluated_value: value.to_string(),
        origin,
        defining_element: None,
        predecessor,
    };
    properties.insert(name, property);
}

fn file_part(path: &Path, f: impl Fn(&Path) -> Option<&std::ffi::OsStr>) -> String {
    f(path).map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Environment, then reserved, then global values; each layer shadows the one before.
pub(crate) fn seed_properties(root: &Document, context: &EvaluationContext) -> NameMap<Property> {
    let mut properties = NameMap::new();
    for (name, value) in context.environment.iter() {
        seed(&mut properties, name, value, PropertyOrigin::Environment);
    }

    let full = normalize_path(&root.path);
    let extension = full.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    let reserved = [
        ("MSBuildProjectFullPath", full.to_string_lossy().into_owned()),
        ("MSBuildProjectDirectory", file_part(&full, |p| p.parent().map(Path::as_os_str))),
        ("MSBuildProjectFile", file_part(&full, Path::file_name)),
        ("MSBuildProjectName", file_part(&full, Path::file_stem)),
        ("MSBuildProjectExtension", extension),
        ("MSBuildToolsVersion", context.tools_version.clone()),
    ];
    for (name, value) in &reserved {
        seed(&mut properties, name, value, PropertyOrigin::Reserved);
    }

    for (name, value) in context.global_properties.iter() {
        seed(&mut properties, name, value, PropertyOrigin::Global);
    }
    properties
}

impl PropertyPass<'_, '_> {
    fn scope<'a>(&'a self, doc: &'a Document) -> Scope<'a> {
        Scope::new(&self.out.properties, doc.directory()).with_this_file(&doc.path)
    }

    fn condition(&mut self, condition: Option<&str>, doc: &Document) -> Result<bool, ExpressionError> {
        let Some(condition) = condition else { return Ok(true) };
        record_conditioned_properties(condition, &mut self.out.conditioned);
        evaluate_condition(condition, &self.scope(doc))
    }

    fn walk(&mut self, doc: &Arc<Document>) -> Result<(), EvaluationError> {
        for (index, node) in doc.nodes.iter().enumerate() {
            match node {
                Node::Import(element) => self.import(element, doc)?,
                Node::ImportGroup(group) => {
                    let active = self
                        .condition(group.condition.as_deref(), doc)
                        .map_err(EvaluationError::expression(&group.location))?;
                    if active {
                        for element in &group.imports {
                            self.import(element, doc)?;
                        }
                    }
                }
                Node::Choose(choose) => {
                    let mut choices = Vec::new();
                    self.choose(choose, doc, &mut choices)?;
                    self.out.logical.push(LogicalNode { document: doc.clone(), index, choices });
                }
                other => {
                    self.out.logical.push(LogicalNode { document: doc.clone(), index, choices: Vec::new() });
                    if let Node::PropertyGroup(group) = other {
                        self.property_group(group, doc)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn property_group(&mut self, group: &PropertyGroupElement, doc: &Document) -> Result<(), EvaluationError> {
        if !self.condition(group.condition.as_deref(), doc).map_err(EvaluationError::expression(&group.location))? {
            return Ok(());
        }
        for element in &group.properties {
            self.property(element, doc)?;
        }
        Ok(())
    }

    fn property(&mut self, element: &PropertyElement, doc: &Document) -> Result<(), EvaluationError> {
        let location = &element.location;
        if !self.condition(element.condition.as_deref(), doc).map_err(EvaluationError::expression(location))? {
            return Ok(());
        }
        let value = expand(&element.value, &self.scope(doc)).map_err(EvaluationError::expression(location))?;

        let previous = self.out.properties.get(&element.name);
        if let Some(existing) = previous.filter(|p| !p.origin.is_overridable()) {
            tracing::debug!(name = %element.name, origin = ?existing.origin, at = %location, "property not overridable; ignored");
            return Ok(());
        }
        let property = Property {
            name: element.name.clone(),
            unevaluated_value: element.value.clone(),
            evaluated_value: value,
            origin: PropertyOrigin::Document,
            defining_element: Some(location.clone()),
            predecessor: previous.cloned().map(Arc::new),
        };
        self.out.properties.insert(element.name.clone(), property);
        Ok(())
    }

    /// Properties inside the chosen branch; items are left for the item pass.
    /// The branch is picked against the properties accumulated so far and
    /// recorded in `choices`, nested `Choose`s after their parent.
    fn choose(&mut self, choose: &ChooseElement, doc: &Document, choices: &mut Vec<Branch>) -> Result<(), EvaluationError> {
        let mut choice = None;
        for (i, when) in choose.whens.iter().enumerate() {
            if self.condition(Some(when.condition.as_str()), doc).map_err(EvaluationError::expression(&when.location))? {
                choice = Some(i);
                break;
            }
        }
        choices.push(choice);
        for node in branch_nodes(choose, choice) {
            match node {
                Node::PropertyGroup(group) => self.property_group(group, doc)?,
                Node::Choose(nested) => self.choose(nested, doc, choices)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn import(&mut self, element: &ImportElement, doc: &Arc<Document>) -> Result<(), EvaluationError> {
        if let Some(condition) = &element.condition {
            record_conditioned_properties(condition, &mut self.out.conditioned);
        }
        let scope = Scope::new(&self.out.properties, doc.directory()).with_this_file(&doc.path);
        let resolved = self.resolver.resolve(element, doc, &scope)?;
        self.splice(resolved)
    }

    fn splice(&mut self, resolved: Vec<ResolvedImport>) -> Result<(), EvaluationError> {
        for import in resolved {
            let imported = import.imported.clone();
            self.out.imports.push(import);
            self.out.documents.push(imported.clone());
            self.resolver.enter(&imported);
            self.walk(&imported)?;
            self.resolver.leave();
        }
        Ok(())
    }

    fn implicit(&mut self, root: &Arc<Document>, context: &EvaluationContext, position: ImportPosition) -> Result<(), EvaluationError> {
        for implicit in context.implicit_imports.iter().filter(|i| i.position == position) {
            let element = ImportElement {
                project: implicit.project.clone(),
                condition: None,
                location: Location::synthetic(root.path.clone()),
            };
            let scope = Scope::new(&self.out.properties, root.directory()).with_this_file(&root.path);
            let mut resolved = self.resolver.resolve(&element, root, &scope)?;
            for import in &mut resolved {
                import.is_implicit = true;
            }
            self.splice(resolved)?;
        }
        Ok(())
    }
}

pub(crate) fn evaluate_properties(
    root: &Arc<Document>,
    context: &EvaluationContext,
    resolver: &mut ImportResolver<'_>,
) -> Result<PropertyPassOutput, EvaluationError> {
    let out = PropertyPassOutput {
        properties: seed_properties(root, context),
        documents: vec![root.clone()],
        ..PropertyPassOutput::default()
    };
    let mut pass = PropertyPass { resolver, out };
    pass.implicit(root, context, ImportPosition::Before)?;
    pass.walk(root)?;
    pass.implicit(root, context, ImportPosition::After)?;
    Ok(pass.out)
}
