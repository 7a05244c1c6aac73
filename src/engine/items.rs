//! Item pass.
//!
//! Runs over the evaluation order produced by the property pass, with the
//! final property mapping. Item definitions merge as they are met; item
//! elements include, remove or update items in place. Conditions and
//! `@(Type)` references see the items produced so far.
//!
//! Wildcards in `Include`, `Exclude` and `Remove` resolve against the project
//! directory, wherever the element was declared.

use super::condition::evaluate_condition;
use super::expand::{Scope, expand};
use super::expression::{self, Fragment, split_top_level};
use super::glob::{path_key, resolve_glob};
use super::properties::{Branch, LogicalNode, branch_nodes};
use crate::document::{ChooseElement, Document, ItemDefinitionGroupElement, ItemElement, ItemGroupElement, Node};
use crate::{EvaluationError, Item, ItemDefinition, NameMap, Property};
use std::collections::HashSet;
use std::path::Path;
use std::slice::Iter;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct ItemPassOutput {
    pub items: Vec<Item>,
    pub definitions: NameMap<ItemDefinition>,
    pub glob_expansions: usize,
}

struct ItemPass<'p> {
    properties: &'p NameMap<Property>,
    project_dir: Arc<Path>,
    out: ItemPassOutput,
}

/// An include match before metadata is attached.
struct Candidate {
    include: String,
    recursive_dir: String,
    copied: Option<NameMap<String>>,
}

/// `Some(type)` when `part` is exactly `@(Type)`.
fn bare_item_reference(part: &str) -> Result<Option<String>, crate::ExpressionError> {
    if !part.starts_with("@(") {
        return Ok(None);
    }
    match expression::parse(part)?.as_slice() {
        [Fragment::ItemList(list)] if list.transform.is_none() && list.separator.is_none() => {
            Ok(Some(list.item_type.clone()))
        }
        _ => Ok(None),
    }
}

impl ItemPass<'_> {
    fn scope<'a>(&'a self, doc: &'a Document) -> Scope<'a> {
        Scope::new(self.properties, doc.directory()).with_items(&self.out.items).with_this_file(&doc.path)
    }

    fn condition(&self, condition: Option<&str>, scope: &Scope<'_>) -> Result<bool, crate::ExpressionError> {
        match condition {
            Some(c) => evaluate_condition(c, scope),
            None => Ok(true),
        }
    }

    fn node(&mut self, node: &Node, doc: &Document, choices: &mut Iter<'_, Branch>) -> Result<(), EvaluationError> {
        match node {
            Node::ItemGroup(group) => self.item_group(group, doc),
            Node::ItemDefinitionGroup(group) => self.definition_group(group, doc),
            Node::Choose(choose) => self.choose(choose, doc, choices),
            _ => Ok(()),
        }
    }

    /// Replay the branch the property pass took; `When` conditions are not re-tested.
    fn choose(&mut self, choose: &ChooseElement, doc: &Document, choices: &mut Iter<'_, Branch>) -> Result<(), EvaluationError> {
        let choice = choices.next().copied().flatten();
        for node in branch_nodes(choose, choice) {
            if matches!(node, Node::ItemGroup(_) | Node::Choose(_)) {
                self.node(node, doc, choices)?;
            }
        }
        Ok(())
    }

    fn definition_group(&mut self, group: &ItemDefinitionGroupElement, doc: &Document) -> Result<(), EvaluationError> {
        let active = self
            .condition(group.condition.as_deref(), &self.scope(doc))
            .map_err(EvaluationError::expression(&group.location))?;
        if !active {
            return Ok(());
        }
        for element in &group.definitions {
            let active = self
                .condition(element.condition.as_deref(), &self.scope(doc))
                .map_err(EvaluationError::expression(&element.location))?;
            if !active {
                continue;
            }
            let mut definition = self.out.definitions.get(&element.item_type).cloned().unwrap_or_else(|| ItemDefinition {
                item_type: element.item_type.clone(),
                metadata: NameMap::new(),
            });
            for m in &element.metadata {
                let value = {
                    let scope = self.scope(doc).with_metadata(&definition);
                    let on = self.condition(m.condition.as_deref(), &scope).map_err(EvaluationError::expression(&m.location))?;
                    if !on {
                        continue;
                    }
                    expand(&m.value, &scope).map_err(EvaluationError::expression(&m.location))?
                };
                definition.metadata.insert(m.name.clone(), value);
            }
            self.out.definitions.insert(element.item_type.clone(), definition);
        }
        Ok(())
    }

    fn item_group(&mut self, group: &ItemGroupElement, doc: &Document) -> Result<(), EvaluationError> {
        let active = self
            .condition(group.condition.as_deref(), &self.scope(doc))
            .map_err(EvaluationError::expression(&group.location))?;
        if !active {
            return Ok(());
        }
        for element in &group.items {
            let active = self
                .condition(element.condition.as_deref(), &self.scope(doc))
                .map_err(EvaluationError::expression(&element.location))?;
            if !active {
                continue;
            }
            if let Some(include) = &element.include {
                self.include(element, include, doc)?;
            } else if let Some(remove) = &element.remove {
                let keys = self.match_keys(element, remove, doc)?;
                let before = self.out.items.len();
                self.out.items.retain(|i| {
                    !(i.item_type.eq_ignore_ascii_case(&element.item_type) && keys.contains(&path_key(&i.evaluated_include)))
                });
                tracing::trace!(item_type = %element.item_type, removed = before - self.out.items.len(), "items removed");
            } else if let Some(update) = &element.update {
                self.update(element, update, doc)?;
            }
        }
        Ok(())
    }

    /// Expand and resolve an `Exclude`/`Remove`/`Update` list to comparison keys.
    fn match_keys(&mut self, element: &ItemElement, pattern: &str, doc: &Document) -> Result<HashSet<String>, EvaluationError> {
        let location = &element.location;
        let expanded = expand(pattern, &self.scope(doc)).map_err(EvaluationError::expression(location))?;
        if expanded.contains(['*', '?']) {
            self.out.glob_expansions += 1;
        }
        let matches = resolve_glob(&expanded, &self.project_dir).map_err(EvaluationError::glob(location))?;
        Ok(matches.iter().map(|m| path_key(&m.path)).collect())
    }

    /// Element metadata, in declaration order; each value sees the item's metadata so far.
    fn apply_metadata(&self, element: &ItemElement, item: &mut Item, doc: &Document) -> Result<(), EvaluationError> {
        for m in &element.metadata {
            let value = {
                let scope = self.scope(doc).with_metadata(&*item);
                let on = self.condition(m.condition.as_deref(), &scope).map_err(EvaluationError::expression(&m.location))?;
                if !on {
                    continue;
                }
                expand(&m.value, &scope).map_err(EvaluationError::expression(&m.location))?
            };
            item.metadata.insert(m.name.clone(), value);
        }
        Ok(())
    }

    fn include(&mut self, element: &ItemElement, include: &str, doc: &Document) -> Result<(), EvaluationError> {
        let location = &element.location;
        let mut candidates = Vec::new();
        for part in split_top_level(include, b';').into_iter().map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(source_type) = bare_item_reference(part).map_err(EvaluationError::expression(location))? {
                let scope = self.scope(doc);
                candidates.extend(scope.items_of(&source_type).map(|src| Candidate {
                    include: src.evaluated_include.clone(),
                    recursive_dir: src.recursive_dir.clone(),
                    copied: Some(src.metadata.clone()),
                }));
                continue;
            }
            let expanded = expand(part, &self.scope(doc)).map_err(EvaluationError::expression(location))?;
            if expanded.contains(['*', '?']) {
                self.out.glob_expansions += 1;
            }
            let matches = resolve_glob(&expanded, &self.project_dir).map_err(EvaluationError::glob(location))?;
            candidates.extend(matches.into_iter().map(|m| Candidate {
                include: m.path,
                recursive_dir: m.recursive_dir,
                copied: None,
            }));
        }

        if let Some(exclude) = &element.exclude {
            let keys = self.match_keys(element, exclude, doc)?;
            candidates.retain(|c| !keys.contains(&path_key(&c.include)));
        }

        let mut created = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut metadata = NameMap::new();
            if let Some(definition) = self.out.definitions.get(&element.item_type) {
                for (name, value) in definition.metadata.iter() {
                    metadata.insert(name, value.clone());
                }
            }
            for (name, value) in candidate.copied.iter().flat_map(NameMap::iter) {
                metadata.insert(name, value.clone());
            }
            let mut item = Item {
                item_type: element.item_type.clone(),
                unevaluated_include: include.to_string(),
                evaluated_include: candidate.include,
                metadata,
                recursive_dir: candidate.recursive_dir,
                source: location.clone(),
                base_dir: self.project_dir.clone(),
            };
            self.apply_metadata(element, &mut item, doc)?;
            created.push(item);
        }
        tracing::trace!(item_type = %element.item_type, count = created.len(), "items included");
        self.out.items.extend(created);
        Ok(())
    }

    fn update(&mut self, element: &ItemElement, update: &str, doc: &Document) -> Result<(), EvaluationError> {
        let keys = self.match_keys(element, update, doc)?;
        for index in 0..self.out.items.len() {
            let existing = &self.out.items[index];
            if !existing.item_type.eq_ignore_ascii_case(&element.item_type)
                || !keys.contains(&path_key(&existing.evaluated_include))
            {
                continue;
            }
            let mut item = existing.clone();
            self.apply_metadata(element, &mut item, doc)?;
            self.out.items[index] = item;
        }
        Ok(())
    }
}

pub(crate) fn evaluate_items(
    logical: &[LogicalNode],
    properties: &NameMap<Property>,
    project_dir: &Path,
) -> Result<ItemPassOutput, EvaluationError> {
    let mut pass = ItemPass { properties, project_dir: Arc::from(project_dir), out: ItemPassOutput::default() };
    for entry in logical {
        pass.node(entry.node(), &entry.document, &mut entry.choices.iter())?;
    }
    Ok(pass.out)
}
