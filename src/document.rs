//! Unevaluated project documents.
//!
//! A [`Document`] is the typed form of one project file: an ordered list of
//! top-level [`Node`]s, each carrying its raw attribute text and an optional
//! condition. Nothing here is expanded; the engine reads these trees and never
//! mutates them. The coordinator edits its root document copy-on-write.

use crate::Location;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Document {
    pub path: Arc<Path>,
    pub nodes: Vec<Node>,
    pub default_targets: Option<String>,
    pub initial_targets: Option<String>,
    pub tools_version: Option<String>,
}

impl Document {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Document {
            path: Arc::from(path.as_ref()),
            nodes: Vec::new(),
            default_targets: None,
            initial_targets: None,
            tools_version: None,
        }
    }

    /// Directory containing the document; relative imports resolve against it.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn location(&self) -> Location {
        Location::synthetic(self.path.clone())
    }

    /// Every item element in document order, conditions ignored (including `Choose` branches).
    pub fn item_elements(&self) -> Vec<&ItemElement> {
        fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a ItemElement>) {
            for node in nodes {
                match node {
                    Node::ItemGroup(group) => out.extend(group.items.iter()),
                    Node::Choose(choose) => {
                        for when in &choose.whens {
                            collect(&when.nodes, out);
                        }
                        if let Some(otherwise) = &choose.otherwise {
                            collect(otherwise, out);
                        }
                    }
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    PropertyGroup(PropertyGroupElement),
    ItemGroup(ItemGroupElement),
    ItemDefinitionGroup(ItemDefinitionGroupElement),
    Import(ImportElement),
    ImportGroup(ImportGroupElement),
    Target(TargetElement),
    Choose(ChooseElement),
}

impl Node {
    pub fn location(&self) -> &Location {
        match self {
            Node::PropertyGroup(e) => &e.location,
            Node::ItemGroup(e) => &e.location,
            Node::ItemDefinitionGroup(e) => &e.location,
            Node::Import(e) => &e.location,
            Node::ImportGroup(e) => &e.location,
            Node::Target(e) => &e.location,
            Node::Choose(e) => &e.location,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Node::PropertyGroup(_) => "PropertyGroup",
            Node::ItemGroup(_) => "ItemGroup",
            Node::ItemDefinitionGroup(_) => "ItemDefinitionGroup",
            Node::Import(_) => "Import",
            Node::ImportGroup(_) => "ImportGroup",
            Node::Target(_) => "Target",
            Node::Choose(_) => "Choose",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyGroupElement {
    pub condition: Option<String>,
    pub properties: Vec<PropertyElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct PropertyElement {
    pub name: String,
    pub value: String,
    pub condition: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ItemGroupElement {
    pub condition: Option<String>,
    pub items: Vec<ItemElement>,
    pub location: Location,
}

/// An item declaration. Exactly one of `include`, `remove` or `update` is set.
#[derive(Debug, Clone)]
pub struct ItemElement {
    pub item_type: String,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub remove: Option<String>,
    pub update: Option<String>,
    pub condition: Option<String>,
    pub metadata: Vec<MetadataElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct MetadataElement {
    pub name: String,
    pub value: String,
    pub condition: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ItemDefinitionGroupElement {
    pub condition: Option<String>,
    pub definitions: Vec<ItemDefinitionElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ItemDefinitionElement {
    pub item_type: String,
    pub condition: Option<String>,
    pub metadata: Vec<MetadataElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ImportElement {
    pub project: String,
    pub condition: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ImportGroupElement {
    pub condition: Option<String>,
    pub imports: Vec<ImportElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct TargetElement {
    pub name: String,
    pub condition: Option<String>,
    pub depends_on_targets: Option<String>,
    pub before_targets: Option<String>,
    pub after_targets: Option<String>,
    pub inputs: Option<String>,
    pub outputs: Option<String>,
    pub returns: Option<String>,
    pub tasks: Vec<TaskElement>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct TaskElement {
    pub name: String,
    pub condition: Option<String>,
    pub parameters: Vec<(String, String)>,
    pub location: Location,
}

/// `Choose`: the first `When` whose condition holds is taken, else `Otherwise`.
#[derive(Debug, Clone)]
pub struct ChooseElement {
    pub whens: Vec<WhenElement>,
    pub otherwise: Option<Vec<Node>>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct WhenElement {
    pub condition: String,
    pub nodes: Vec<Node>,
    pub location: Location,
}
