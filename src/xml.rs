//! Reading and writing project documents.
//!
//! The engine only sees typed [`Document`] trees. This module is the thin
//! bridge to text: `parse_document` maps an XML project file onto the tree
//! with `roxmltree`, `write_document` renders a tree back out, and the
//! [`DocumentLoader`] trait lets the import resolver fetch documents by path
//! without knowing where they come from.
//!
//! ```text
//! <Project>                      Document
//!   <PropertyGroup>        ──▶     Node::PropertyGroup
//!     <Out>bin</Out>                 PropertyElement { name: "Out", value: "bin" }
//!   <ItemGroup>            ──▶     Node::ItemGroup
//!     <Compile Include=..>           ItemElement { metadata from children + extra attributes }
//!   <Import Project=../>   ──▶     Node::Import
//! ```

use crate::document::{
    ChooseElement, Document, ImportElement, ImportGroupElement, ItemDefinitionElement, ItemDefinitionGroupElement,
    ItemElement, ItemGroupElement, MetadataElement, Node, PropertyElement, PropertyGroupElement, TargetElement,
    TaskElement, WhenElement,
};
use crate::engine::normalize_path;
use crate::{LoadError, Location};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of project documents for the import resolver.
pub trait DocumentLoader: Send + Sync {
    /// Whether a document exists at `path` (already normalized and absolute).
    fn exists(&self, path: &Path) -> bool;

    fn load(&self, path: &Path) -> Result<Document, LoadError>;
}

/// Loads documents from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlLoader;

impl DocumentLoader for XmlLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<Document, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
        parse_document(path, &text)
    }
}

/// In-memory documents keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: HashMap<PathBuf, Document>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: Document) {
        self.documents.insert(normalize_path(&document.path), document);
    }

    pub fn insert_xml(&mut self, path: impl AsRef<Path>, text: &str) -> Result<(), LoadError> {
        let document = parse_document(path, text)?;
        self.insert(document);
        Ok(())
    }

    pub fn with_xml(mut self, path: impl AsRef<Path>, text: &str) -> Result<Self, LoadError> {
        self.insert_xml(path, text)?;
        Ok(self)
    }
}

impl DocumentLoader for MemoryLoader {
    fn exists(&self, path: &Path) -> bool {
        self.documents.contains_key(&normalize_path(path))
    }

    fn load(&self, path: &Path) -> Result<Document, LoadError> {
        self.documents.get(&normalize_path(path)).cloned().ok_or_else(|| LoadError::NotFound { path: path.to_path_buf() })
    }
}

// --- Parsing -----------------------------------------------------------------

const ITEM_RESERVED_ATTRIBUTES: &[&str] = &[
    "Include",
    "Exclude",
    "Remove",
    "Update",
    "Condition",
    "Label",
    "KeepMetadata",
    "RemoveMetadata",
    "KeepDuplicates",
    "MatchOnMetadata",
    "MatchOnMetadataOptions",
];

/// Parse project XML into a [`Document`] for `path`.
pub fn parse_document(path: impl AsRef<Path>, text: &str) -> Result<Document, LoadError> {
    let path = path.as_ref();
    let xml = roxmltree::Document::parse(text).map_err(|source| LoadError::Xml { path: path.to_path_buf(), source })?;
    let reader = Reader { file: Arc::from(path), xml: &xml };
    reader.document()
}

struct Reader<'a, 'input> {
    file: Arc<Path>,
    xml: &'a roxmltree::Document<'input>,
}

type XmlNode<'a, 'input> = roxmltree::Node<'a, 'input>;

impl<'a, 'input> Reader<'a, 'input> {
    fn location(&self, node: XmlNode) -> Location {
        let pos = self.xml.text_pos_at(node.range().start);
        Location::new(self.file.clone(), pos.row, pos.col)
    }

    fn structure(&self, node: XmlNode, reason: impl Into<String>) -> LoadError {
        LoadError::Structure { location: self.location(node), reason: reason.into() }
    }

    fn document(&self) -> Result<Document, LoadError> {
        let root = self.xml.root_element();
        if root.tag_name().name() != "Project" {
            return Err(self.structure(root, format!("root element must be <Project>, found <{}>", root.tag_name().name())));
        }
        if let Some(sdk) = root.attribute("Sdk") {
            tracing::warn!(file = %self.file.display(), sdk, "SDK references are not resolved; ignoring");
        }

        let mut document = Document::new(&*self.file);
        document.default_targets = root.attribute("DefaultTargets").map(String::from);
        document.initial_targets = root.attribute("InitialTargets").map(String::from);
        document.tools_version = root.attribute("ToolsVersion").map(String::from);
        document.nodes = self.nodes(root, true)?;
        Ok(document)
    }

    /// Children of `<Project>` (top level) or of `<When>`/`<Otherwise>`.
    fn nodes(&self, parent: XmlNode, top_level: bool) -> Result<Vec<Node>, LoadError> {
        let mut nodes = Vec::new();
        for child in parent.children().filter(|n| n.is_element()) {
            let node = match child.tag_name().name() {
                "PropertyGroup" => Node::PropertyGroup(self.property_group(child)?),
                "ItemGroup" => Node::ItemGroup(self.item_group(child)?),
                "Choose" => Node::Choose(self.choose(child)?),
                "ItemDefinitionGroup" if top_level => Node::ItemDefinitionGroup(self.item_definition_group(child)?),
                "Import" if top_level => Node::Import(self.import(child)?),
                "ImportGroup" if top_level => Node::ImportGroup(self.import_group(child)?),
                "Target" if top_level => Node::Target(self.target(child)?),
                "ProjectExtensions" | "UsingTask" | "Sdk" if top_level => {
                    tracing::debug!(file = %self.file.display(), tag = child.tag_name().name(), "skipping element");
                    continue;
                }
                other => return Err(self.structure(child, format!("unexpected element <{other}>"))),
            };
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn condition(node: XmlNode) -> Option<String> {
        node.attribute("Condition").map(String::from)
    }

    fn text(node: XmlNode) -> String {
        node.descendants().filter(|n| n.is_text()).filter_map(|n| n.text()).collect::<String>().trim().to_string()
    }

    fn property_group(&self, node: XmlNode) -> Result<PropertyGroupElement, LoadError> {
        let properties = node
            .children()
            .filter(|n| n.is_element())
            .map(|child| PropertyElement {
                name: child.tag_name().name().to_string(),
                value: Self::text(child),
                condition: Self::condition(child),
                location: self.location(child),
            })
            .collect();
        Ok(PropertyGroupElement { condition: Self::condition(node), properties, location: self.location(node) })
    }

    fn metadata(&self, node: XmlNode) -> Vec<MetadataElement> {
        let location = self.location(node);
        let mut metadata: Vec<MetadataElement> = node
            .attributes()
            .filter(|a| !ITEM_RESERVED_ATTRIBUTES.contains(&a.name()))
            .map(|a| MetadataElement {
                name: a.name().to_string(),
                value: a.value().to_string(),
                condition: None,
                location: location.clone(),
            })
            .collect();
        metadata.extend(node.children().filter(|n| n.is_element()).map(|child| MetadataElement {
            name: child.tag_name().name().to_string(),
            value: Self::text(child),
            condition: Self::condition(child),
            location: self.location(child),
        }));
        metadata
    }

    fn item_group(&self, node: XmlNode) -> Result<ItemGroupElement, LoadError> {
        let mut items = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            let item = ItemElement {
                item_type: child.tag_name().name().to_string(),
                include: child.attribute("Include").map(String::from),
                exclude: child.attribute("Exclude").map(String::from),
                remove: child.attribute("Remove").map(String::from),
                update: child.attribute("Update").map(String::from),
                condition: Self::condition(child),
                metadata: self.metadata(child),
                location: self.location(child),
            };
            let operations = [&item.include, &item.remove, &item.update].iter().filter(|o| o.is_some()).count();
            if operations != 1 {
                return Err(self.structure(
                    child,
                    format!("item <{}> needs exactly one of Include, Remove or Update", item.item_type),
                ));
            }
            if item.exclude.is_some() && item.include.is_none() {
                return Err(self.structure(child, "Exclude is only valid together with Include"));
            }
            items.push(item);
        }
        Ok(ItemGroupElement { condition: Self::condition(node), items, location: self.location(node) })
    }

    fn item_definition_group(&self, node: XmlNode) -> Result<ItemDefinitionGroupElement, LoadError> {
        let definitions = node
            .children()
            .filter(|n| n.is_element())
            .map(|child| ItemDefinitionElement {
                item_type: child.tag_name().name().to_string(),
                condition: Self::condition(child),
                metadata: self.metadata(child),
                location: self.location(child),
            })
            .collect();
        Ok(ItemDefinitionGroupElement { condition: Self::condition(node), definitions, location: self.location(node) })
    }

    fn import(&self, node: XmlNode) -> Result<ImportElement, LoadError> {
        let project = node.attribute("Project").ok_or_else(|| self.structure(node, "<Import> requires a Project attribute"))?;
        Ok(ImportElement { project: project.to_string(), condition: Self::condition(node), location: self.location(node) })
    }

    fn import_group(&self, node: XmlNode) -> Result<ImportGroupElement, LoadError> {
        let mut imports = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if child.tag_name().name() != "Import" {
                return Err(self.structure(child, "<ImportGroup> may only contain <Import>"));
            }
            imports.push(self.import(child)?);
        }
        Ok(ImportGroupElement { condition: Self::condition(node), imports, location: self.location(node) })
    }

    fn target(&self, node: XmlNode) -> Result<TargetElement, LoadError> {
        let name = node.attribute("Name").ok_or_else(|| self.structure(node, "<Target> requires a Name attribute"))?;
        let tasks = node
            .children()
            .filter(|n| n.is_element())
            .map(|child| TaskElement {
                name: child.tag_name().name().to_string(),
                condition: Self::condition(child),
                parameters: child
                    .attributes()
                    .filter(|a| a.name() != "Condition")
                    .map(|a| (a.name().to_string(), a.value().to_string()))
                    .collect(),
                location: self.location(child),
            })
            .collect();
        Ok(TargetElement {
            name: name.to_string(),
            condition: Self::condition(node),
            depends_on_targets: node.attribute("DependsOnTargets").map(String::from),
            before_targets: node.attribute("BeforeTargets").map(String::from),
            after_targets: node.attribute("AfterTargets").map(String::from),
            inputs: node.attribute("Inputs").map(String::from),
            outputs: node.attribute("Outputs").map(String::from),
            returns: node.attribute("Returns").map(String::from),
            tasks,
            location: self.location(node),
        })
    }

    fn choose(&self, node: XmlNode) -> Result<ChooseElement, LoadError> {
        let mut whens = Vec::new();
        let mut otherwise = None;
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "When" if otherwise.is_none() => {
                    let condition = child
                        .attribute("Condition")
                        .ok_or_else(|| self.structure(child, "<When> requires a Condition attribute"))?;
                    whens.push(WhenElement {
                        condition: condition.to_string(),
                        nodes: self.nodes(child, false)?,
                        location: self.location(child),
                    });
                }
                "Otherwise" if otherwise.is_none() => otherwise = Some(self.nodes(child, false)?),
                other => return Err(self.structure(child, format!("unexpected <{other}> inside <Choose>"))),
            }
        }
        if whens.is_empty() {
            return Err(self.structure(node, "<Choose> requires at least one <When>"));
        }
        Ok(ChooseElement { whens, otherwise, location: self.location(node) })
    }
}

// --- Writing -----------------------------------------------------------------

/// Render `document` as project XML.
pub fn write_document(document: &Document, out: &mut impl Write) -> io::Result<()> {
    write!(out, "<Project")?;
    write_attr(out, "DefaultTargets", document.default_targets.as_deref())?;
    write_attr(out, "InitialTargets", document.initial_targets.as_deref())?;
    write_attr(out, "ToolsVersion", document.tools_version.as_deref())?;
    writeln!(out, ">")?;
    write_nodes(out, &document.nodes, 1)?;
    writeln!(out, "</Project>")
}

fn write_nodes(out: &mut impl Write, nodes: &[Node], depth: usize) -> io::Result<()> {
    let pad = "  ".repeat(depth);
    for node in nodes {
        match node {
            Node::PropertyGroup(group) => {
                open(out, &pad, "PropertyGroup", &[("Condition", group.condition.as_deref())])?;
                for p in &group.properties {
                    write!(out, "{pad}  <{}", p.name)?;
                    write_attr(out, "Condition", p.condition.as_deref())?;
                    writeln!(out, ">{}</{}>", escape(&p.value), p.name)?;
                }
                writeln!(out, "{pad}</PropertyGroup>")?;
            }
            Node::ItemGroup(group) => {
                open(out, &pad, "ItemGroup", &[("Condition", group.condition.as_deref())])?;
                for item in &group.items {
                    write!(out, "{pad}  <{}", item.item_type)?;
                    write_attr(out, "Include", item.include.as_deref())?;
                    write_attr(out, "Exclude", item.exclude.as_deref())?;
                    write_attr(out, "Remove", item.remove.as_deref())?;
                    write_attr(out, "Update", item.update.as_deref())?;
                    write_attr(out, "Condition", item.condition.as_deref())?;
                    write_metadata(out, &pad, &item.item_type, &item.metadata)?;
                }
                writeln!(out, "{pad}</ItemGroup>")?;
            }
            Node::ItemDefinitionGroup(group) => {
                open(out, &pad, "ItemDefinitionGroup", &[("Condition", group.condition.as_deref())])?;
                for def in &group.definitions {
                    write!(out, "{pad}  <{}", def.item_type)?;
                    write_attr(out, "Condition", def.condition.as_deref())?;
                    write_metadata(out, &pad, &def.item_type, &def.metadata)?;
                }
                writeln!(out, "{pad}</ItemDefinitionGroup>")?;
            }
            Node::Import(import) => write_import(out, &pad, import)?,
            Node::ImportGroup(group) => {
                open(out, &pad, "ImportGroup", &[("Condition", group.condition.as_deref())])?;
                for import in &group.imports {
                    write_import(out, &format!("{pad}  "), import)?;
                }
                writeln!(out, "{pad}</ImportGroup>")?;
            }
            Node::Target(target) => {
                open(
                    out,
                    &pad,
                    "Target",
                    &[
                        ("Name", Some(target.name.as_str())),
                        ("Condition", target.condition.as_deref()),
                        ("DependsOnTargets", target.depends_on_targets.as_deref()),
                        ("BeforeTargets", target.before_targets.as_deref()),
                        ("AfterTargets", target.after_targets.as_deref()),
                        ("Inputs", target.inputs.as_deref()),
                        ("Outputs", target.outputs.as_deref()),
                        ("Returns", target.returns.as_deref()),
                    ],
                )?;
                for task in &target.tasks {
                    write!(out, "{pad}  <{}", task.name)?;
                    write_attr(out, "Condition", task.condition.as_deref())?;
                    for (name, value) in &task.parameters {
                        write_attr(out, name, Some(value))?;
                    }
                    writeln!(out, " />")?;
                }
                writeln!(out, "{pad}</Target>")?;
            }
            Node::Choose(choose) => {
                writeln!(out, "{pad}<Choose>")?;
                for when in &choose.whens {
                    open(out, &format!("{pad}  "), "When", &[("Condition", Some(when.condition.as_str()))])?;
                    write_nodes(out, &when.nodes, depth + 2)?;
                    writeln!(out, "{pad}  </When>")?;
                }
                if let Some(otherwise) = &choose.otherwise {
                    writeln!(out, "{pad}  <Otherwise>")?;
                    write_nodes(out, otherwise, depth + 2)?;
                    writeln!(out, "{pad}  </Otherwise>")?;
                }
                writeln!(out, "{pad}</Choose>")?;
            }
        }
    }
    Ok(())
}

fn open(out: &mut impl Write, pad: &str, tag: &str, attrs: &[(&str, Option<&str>)]) -> io::Result<()> {
    write!(out, "{pad}<{tag}")?;
    for (name, value) in attrs {
        write_attr(out, name, *value)?;
    }
    writeln!(out, ">")
}

fn write_import(out: &mut impl Write, pad: &str, import: &ImportElement) -> io::Result<()> {
    write!(out, "{pad}<Import")?;
    write_attr(out, "Project", Some(&import.project))?;
    write_attr(out, "Condition", import.condition.as_deref())?;
    writeln!(out, " />")
}

fn write_metadata(out: &mut impl Write, pad: &str, tag: &str, metadata: &[MetadataElement]) -> io::Result<()> {
    if metadata.is_empty() {
        return writeln!(out, " />");
    }
    writeln!(out, ">")?;
    for m in metadata {
        write!(out, "{pad}    <{}", m.name)?;
        write_attr(out, "Condition", m.condition.as_deref())?;
        writeln!(out, ">{}</{}>", escape(&m.value), m.name)?;
    }
    writeln!(out, "{pad}  </{tag}>")
}

fn write_attr(out: &mut impl Write, name: &str, value: Option<&str>) -> io::Result<()> {
    match value {
        Some(value) => write!(out, " {name}=\"{}\"", escape(value)),
        None => Ok(()),
    }
}

fn escape(text: &str) -> String {
    let mut s = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            c => s.push(c),
        }
    }
    s
}
