//! Expansion of `$()`, `@()` and `%()` references.
//!
//! A [`Scope`] is everything an expression can see: the property mapping as
//! accumulated so far, the items evaluated so far, and (while evaluating item
//! metadata or a transform) the item currently being processed.
//!
//! Unknown properties expand to `""`, unknown item types to an empty list.
//! `%()` outside an item context is left as written.

use super::expression::{self, Fragment, ItemListRef, MetadataRef, PropertyBase, PropertyRef};
use super::functions::{Value, call_method, call_static};
use crate::{ExpressionError, Item, ItemDefinition, NameMap, Property};
use chrono::{DateTime, Local};
use std::path::Path;

/// Nesting bound for function arguments, transforms and nested references.
pub(crate) const MAX_EXPANSION_DEPTH: usize = 32;

/// Metadata visible through `%(Name)`.
pub trait MetadataSource {
    fn item_type(&self) -> &str;
    fn metadata(&self, name: &str) -> Option<String>;
}

impl MetadataSource for Item {
    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn metadata(&self, name: &str) -> Option<String> {
        self.metadata.get(name).cloned().or_else(|| well_known_metadata(self, name))
    }
}

impl MetadataSource for ItemDefinition {
    fn item_type(&self) -> &str {
        &self.item_type
    }

    fn metadata(&self, name: &str) -> Option<String> {
        self.metadata.get(name).cloned()
    }
}

fn with_slash(mut s: String) -> String {
    if !s.is_empty() && !s.ends_with('/') && !s.ends_with('\\') {
        s.push(std::path::MAIN_SEPARATOR);
    }
    s
}

fn lossy(p: Option<&std::ffi::OsStr>) -> String {
    p.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

fn well_known_metadata(item: &Item, name: &str) -> Option<String> {
    let include = item.evaluated_include.as_str();
    let value = match name.to_ascii_lowercase().as_str() {
        "identity" => include.to_string(),
        "fullpath" => item.full_path().to_string_lossy().into_owned(),
        "rootdir" => {
            let full = item.full_path();
            let root: std::path::PathBuf = full
                .components()
                .take_while(|c| matches!(c, std::path::Component::Prefix(_) | std::path::Component::RootDir))
                .collect();
            root.to_string_lossy().into_owned()
        }
        "filename" => lossy(Path::new(include).file_stem()),
        "extension" => Path::new(include).extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default(),
        "relativedir" => match include.rfind(['/', '\\']) {
            Some(i) => include[..=i].to_string(),
            None => String::new(),
        },
        "directory" => {
            let full = item.full_path();
            let dir: std::path::PathBuf = full
                .parent()
                .map(|p| p.components().filter(|c| !matches!(c, std::path::Component::Prefix(_) | std::path::Component::RootDir)).collect())
                .unwrap_or_default();
            with_slash(dir.to_string_lossy().into_owned())
        }
        "recursivedir" => item.recursive_dir.clone(),
        "definingprojectfullpath" => item.source.file.to_string_lossy().into_owned(),
        "definingprojectdirectory" => with_slash(lossy(item.source.file.parent().map(Path::as_os_str))),
        "definingprojectname" => lossy(item.source.file.file_stem()),
        "definingprojectextension" => {
            item.source.file.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default()
        }
        "modifiedtime" => std::fs::metadata(item.full_path())
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S%.7f").to_string())
            .unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

/// Evaluation environment for expressions.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub(crate) properties: &'a NameMap<Property>,
    pub(crate) items: &'a [Item],
    pub(crate) metadata: Option<&'a dyn MetadataSource>,
    pub(crate) this_file: Option<&'a Path>,
    pub(crate) base_dir: &'a Path,
}

impl<'a> Scope<'a> {
    /// Properties only; relative paths (`Exists`, `File::Exists`) resolve against `base_dir`.
    pub fn new(properties: &'a NameMap<Property>, base_dir: &'a Path) -> Self {
        Scope { properties, items: &[], metadata: None, this_file: None, base_dir }
    }

    pub fn with_items(self, items: &'a [Item]) -> Self {
        Scope { items, ..self }
    }

    pub fn with_metadata(self, source: &'a dyn MetadataSource) -> Self {
        Scope { metadata: Some(source), ..self }
    }

    /// Document whose content is being evaluated; drives `$(MSBuildThisFile*)`.
    pub fn with_this_file(self, path: &'a Path) -> Self {
        Scope { this_file: Some(path), ..self }
    }

    pub(crate) fn property(&self, name: &str) -> Option<String> {
        if let Some(file) = self.this_file {
            let value = match name.to_ascii_lowercase().as_str() {
                "msbuildthisfile" => Some(lossy(file.file_name())),
                "msbuildthisfilename" => Some(lossy(file.file_stem())),
                "msbuildthisfileextension" => {
                    Some(file.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default())
                }
                "msbuildthisfilefullpath" => Some(file.to_string_lossy().into_owned()),
                "msbuildthisfiledirectory" => Some(with_slash(lossy(file.parent().map(Path::as_os_str)))),
                _ => None,
            };
            if value.is_some() {
                return value;
            }
        }
        self.properties.get(name).map(|p| p.evaluated_value.clone())
    }

    pub(crate) fn items_of<'s>(&'s self, item_type: &'s str) -> impl Iterator<Item = &'a Item> + 's {
        self.items.iter().filter(move |i| i.item_type.eq_ignore_ascii_case(item_type))
    }
}

/// Expand every reference in `text`.
pub fn expand(text: &str, scope: &Scope<'_>) -> Result<String, ExpressionError> {
    expand_at(text, scope, 0)
}

pub(crate) fn expand_at(text: &str, scope: &Scope<'_>, depth: usize) -> Result<String, ExpressionError> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(ExpressionError::RecursionLimit { expression: text.to_string() });
    }
    if expression::is_literal(text) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    for fragment in expression::parse(text)? {
        match fragment {
            Fragment::Literal(s) => out.push_str(&s),
            Fragment::Property(p) => out.push_str(&expand_property(&p, scope, depth)?),
            Fragment::ItemList(list) => {
                let values = expand_item_list(&list, scope, depth)?;
                out.push_str(&values.join(list.separator.as_deref().unwrap_or(";")));
            }
            Fragment::Metadata(m) => match scope.metadata {
                Some(source) => out.push_str(&metadata_value(source, &m)),
                None => match &m.item_type {
                    Some(t) => out.push_str(&format!("%({t}.{})", m.name)),
                    None => out.push_str(&format!("%({})", m.name)),
                },
            },
        }
    }
    Ok(out)
}

fn metadata_value(source: &dyn MetadataSource, m: &MetadataRef) -> String {
    match &m.item_type {
        Some(t) if !t.eq_ignore_ascii_case(source.item_type()) => String::new(),
        _ => source.metadata(&m.name).unwrap_or_default(),
    }
}

fn expand_args(
    args: Option<&[String]>,
    scope: &Scope<'_>,
    depth: usize,
) -> Result<Option<Vec<String>>, ExpressionError> {
    args.map(|list| {
        list.iter().map(|a| expand_at(expression::unquote(a).unwrap_or(a), scope, depth + 1)).collect::<Result<Vec<_>, _>>()
    })
    .transpose()
}

fn expand_property(p: &PropertyRef, scope: &Scope<'_>, depth: usize) -> Result<String, ExpressionError> {
    let mut value = match &p.base {
        PropertyBase::Name(name) => Value::Str(scope.property(name).unwrap_or_default()),
        PropertyBase::Static { type_name, member } => {
            let args = expand_args(member.args.as_deref(), scope, depth)?;
            call_static(type_name, &member.name, args.as_deref(), scope.base_dir)?
        }
    };
    for call in &p.calls {
        let args = expand_args(call.args.as_deref(), scope, depth)?;
        value = call_method(value, &call.name, args.as_deref())?;
    }
    Ok(value.render())
}

/// One string per item of the referenced type: its identity, or the transform applied to it.
pub(crate) fn expand_item_list(
    list: &ItemListRef,
    scope: &Scope<'_>,
    depth: usize,
) -> Result<Vec<String>, ExpressionError> {
    let items = scope.items_of(&list.item_type);
    match &list.transform {
        None => Ok(items.map(|i| i.evaluated_include.clone()).collect()),
        Some(pattern) => items
            .map(|item| expand_at(pattern, &scope.with_metadata(item), depth + 1))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, PropertyOrigin};
    use std::sync::Arc;

    fn props(pairs: &[(&str, &str)]) -> NameMap<Property> {
        pairs
            .iter()
            .map(|(n, v)| {
                let p = Property {
                    name: n.to_string(),
                    unevaluated_value: v.to_string(),
                    evaluated_value: v.to_string(),
                    origin: PropertyOrigin::Document,
                    defining_element: None,
                    predecessor: None,
                };
                (n.to_string(), p)
            })
            .collect()
    }

    fn item(item_type: &str, include: &str, meta: &[(&str, &str)]) -> Item {
        Item {
            item_type: item_type.to_string(),
            unevaluated_include: include.to_string(),
            evaluated_include: include.to_string(),
            metadata: meta.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            recursive_dir: String::new(),
            source: Location::new(Arc::from(Path::new("/work/app.proj")), 3, 5),
            base_dir: Arc::from(Path::new("/work")),
        }
    }

    #[test]
    fn expands_properties_case_insensitively() {
        let p = props(&[("Config", "Debug"), ("Out", "bin/$(Config)")]);
        let scope = Scope::new(&p, Path::new("/work"));
        assert_eq!(expand("obj/$(config)/$(Missing)x", &scope).unwrap(), "obj/Debug/x");
        // Stored values are already evaluated; they are not re-expanded.
        assert_eq!(expand("$(Out)", &scope).unwrap(), "bin/$(Config)");
    }

    #[test]
    fn applies_method_chains_and_static_functions() {
        let p = props(&[("Name", "  MyApp ")]);
        let scope = Scope::new(&p, Path::new("/work"));
        assert_eq!(expand("$(Name.Trim().ToLower())", &scope).unwrap(), "myapp");
        assert_eq!(expand("$(Name.Trim().Length)", &scope).unwrap(), "5");
        assert_eq!(expand("$([MSBuild]::Add($(Name.Trim().Length), 1))", &scope).unwrap(), "6");
        assert_eq!(expand("$([System.IO.Path]::GetExtension('a/b.cs'))", &scope).unwrap(), ".cs");
    }

    #[test]
    fn item_lists_and_transforms() {
        let p = props(&[]);
        let items = vec![
            item("Compile", "src/a.rs", &[("Kind", "lib")]),
            item("Other", "x", &[]),
            item("compile", "src/b.rs", &[]),
        ];
        let scope = Scope::new(&p, Path::new("/work")).with_items(&items);
        assert_eq!(expand("@(Compile)", &scope).unwrap(), "src/a.rs;src/b.rs");
        assert_eq!(expand("@(Compile->'%(Filename).o', ' ')", &scope).unwrap(), "a.o b.o");
        assert_eq!(expand("@(Compile->'%(Kind)')", &scope).unwrap(), "lib;");
        assert_eq!(expand("[@(Nothing)]", &scope).unwrap(), "[]");
    }

    #[test]
    fn metadata_outside_item_context_is_kept() {
        let p = props(&[]);
        let scope = Scope::new(&p, Path::new("/work"));
        assert_eq!(expand("%(Filename)", &scope).unwrap(), "%(Filename)");
    }

    #[test]
    fn well_known_metadata_values() {
        let mut i = item("Compile", "src/sub/main.rs", &[]);
        i.recursive_dir = "sub/".to_string();
        assert_eq!(i.metadata_value("Filename"), "main");
        assert_eq!(i.metadata_value("Extension"), ".rs");
        assert_eq!(i.metadata_value("RelativeDir"), "src/sub/");
        assert_eq!(i.metadata_value("RecursiveDir"), "sub/");
        assert_eq!(i.metadata_value("FullPath"), "/work/src/sub/main.rs");
        assert_eq!(i.metadata_value("DefiningProjectName"), "app");
        assert_eq!(i.metadata_value("Identity"), "src/sub/main.rs");
        assert_eq!(i.metadata_value("NoSuchThing"), "");
    }

    #[test]
    fn qualified_metadata_matches_item_type() {
        let p = props(&[]);
        let i = item("Compile", "a.rs", &[("Link", "L")]);
        let scope = Scope::new(&p, Path::new("/work")).with_metadata(&i);
        assert_eq!(expand("%(Compile.Link)|%(None.Link)", &scope).unwrap(), "L|");
    }

    #[test]
    fn this_file_properties_follow_the_current_document() {
        let p = props(&[]);
        let scope = Scope::new(&p, Path::new("/work")).with_this_file(Path::new("/work/build/common.props"));
        assert_eq!(expand("$(MSBuildThisFile)|$(MSBuildThisFileName)", &scope).unwrap(), "common.props|common");
        assert_eq!(expand("$(MSBuildThisFileDirectory)", &scope).unwrap(), "/work/build/");
    }

    #[test]
    fn deep_nesting_hits_the_recursion_limit() {
        let p = props(&[]);
        let scope = Scope::new(&p, Path::new("/work"));
        let depth = MAX_EXPANSION_DEPTH + 2;
        let text = format!("{}x{}", "$([System.String]::Copy(".repeat(depth), "))".repeat(depth));
        assert!(matches!(expand(&text, &scope), Err(ExpressionError::RecursionLimit { .. })));

        let shallow = format!("{}x{}", "$([System.String]::Copy(".repeat(3), "))".repeat(3));
        assert_eq!(expand(&shallow, &scope).unwrap(), "x");
    }
}
