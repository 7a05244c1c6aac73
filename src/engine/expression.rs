//! Expression syntax.
//!
//! Text is split left-to-right into non-overlapping fragments:
//!
//! ```text
//! "obj/$(Configuration.ToLower())/@(Compile->'%(Filename)', ' ')%(Link)"
//!  ────┬──────────────────────── ┬ ───────────────────────────── ───┬───
//!  Literal  Property{Configuration, [ToLower()]}  ItemList{Compile, transform, sep}  Metadata{Link}
//! ```
//!
//! Static functions live inside `$()`: `$([System.IO.Path]::Combine('a', 'b'))`.
//! Parsing never expands anything; `expand.rs` walks the fragments.
//!
//! Openers must be balanced. Quotes (`'`, `"`, `` ` ``) inside a reference
//! suspend paren counting, so `$(X.Replace(')', '('))` is one fragment.

use crate::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fragment {
    Literal(String),
    Property(PropertyRef),
    ItemList(ItemListRef),
    Metadata(MetadataRef),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropertyRef {
    pub base: PropertyBase,
    pub calls: Vec<Call>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropertyBase {
    Name(String),
    Static { type_name: String, member: Call },
}

/// A member access. `args` is `None` for property-style access (`.Length`).
/// Arguments are kept raw (quotes included); they are expanded at call time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub name: String,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemListRef {
    pub item_type: String,
    pub transform: Option<String>,
    pub separator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MetadataRef {
    pub item_type: Option<String>,
    pub name: String,
}

/// True when `text` contains no reference syntax at all (fast path).
pub(crate) fn is_literal(text: &str) -> bool {
    !(text.contains("$(") || text.contains("@(") || text.contains("%("))
}

pub(crate) fn parse(text: &str) -> Result<Vec<Fragment>, ExpressionError> {
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let opener = match (bytes[i], bytes.get(i + 1)) {
            (b'$', Some(b'(')) => "$(",
            (b'@', Some(b'(')) => "@(",
            (b'%', Some(b'(')) => "%(",
            _ => {
                // Advance by a whole char to keep multi-byte text intact.
                let ch = text[i..].chars().next().unwrap_or_default();
                literal.push(ch);
                i += ch.len_utf8().max(1);
                continue;
            }
        };

        let close = find_close(text, i + 2).ok_or_else(|| ExpressionError::Unbalanced {
            opener,
            position: i,
            expression: text.to_string(),
        })?;
        let body = &text[i + 2..close];

        if !literal.is_empty() {
            fragments.push(Fragment::Literal(std::mem::take(&mut literal)));
        }
        let fragment = match opener {
            "$(" => Fragment::Property(parse_property(body, text)?),
            "@(" => Fragment::ItemList(parse_item_list(body, text)?),
            _ => Fragment::Metadata(parse_metadata(body, text)?),
        };
        fragments.push(fragment);
        i = close + 1;
    }

    if !literal.is_empty() {
        fragments.push(Fragment::Literal(literal));
    }
    Ok(fragments)
}

/// Index of the `)` closing a group whose body starts at `start`.
pub(crate) fn find_close(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' if depth == 0 => return Some(i),
                b')' => depth -= 1,
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Split on `sep` at paren depth zero, outside quotes.
pub(crate) fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if b == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

fn malformed(expression: &str, reason: impl Into<String>) -> ExpressionError {
    ExpressionError::Malformed { expression: expression.to_string(), reason: reason.into() }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    regex!(r"^[A-Za-z_][A-Za-z0-9_\-]*$").is_match(name)
}

/// Leading identifier of `s` and the remainder. A `-` that starts `->` ends the identifier.
fn take_identifier(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        let b = bytes[end];
        let arrow = b == b'-' && bytes.get(end + 1) == Some(&b'>');
        if arrow || !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            break;
        }
        end += 1;
    }
    (&s[..end], &s[end..])
}

/// Parse `Name(args)` or `Name` at the start of `s`; returns the call and the remainder.
fn take_call<'a>(s: &'a str, whole: &str) -> Result<(Call, &'a str), ExpressionError> {
    let (name, rest) = take_identifier(s);
    if name.is_empty() {
        return Err(malformed(whole, format!("expected a member name at \"{s}\"")));
    }
    if let Some(after_paren) = rest.strip_prefix('(') {
        let close = find_close(after_paren, 0).ok_or_else(|| ExpressionError::Unbalanced {
            opener: "(",
            position: whole.len() - s.len(),
            expression: whole.to_string(),
        })?;
        let inner = &after_paren[..close];
        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            split_top_level(inner, b',').into_iter().map(|a| a.trim().to_string()).collect()
        };
        Ok((Call { name: name.to_string(), args: Some(args) }, &after_paren[close + 1..]))
    } else {
        Ok((Call { name: name.to_string(), args: None }, rest))
    }
}

fn take_call_chain(mut rest: &str, whole: &str) -> Result<Vec<Call>, ExpressionError> {
    let mut calls = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(calls);
        }
        let Some(after_dot) = rest.strip_prefix('.') else {
            return Err(malformed(whole, format!("unexpected \"{rest}\"")));
        };
        let (call, remainder) = take_call(after_dot.trim_start(), whole)?;
        calls.push(call);
        rest = remainder;
    }
}

fn parse_property(body: &str, whole: &str) -> Result<PropertyRef, ExpressionError> {
    let body = body.trim();
    if let Some(after_bracket) = body.strip_prefix('[') {
        let end = after_bracket.find(']').ok_or_else(|| malformed(whole, "missing ']' after type name"))?;
        let type_name = after_bracket[..end].trim();
        if type_name.is_empty() {
            return Err(malformed(whole, "empty type name"));
        }
        let rest = after_bracket[end + 1..]
            .trim_start()
            .strip_prefix("::")
            .ok_or_else(|| malformed(whole, "expected '::' after type name"))?;
        let (member, rest) = take_call(rest.trim_start(), whole)?;
        let calls = take_call_chain(rest, whole)?;
        return Ok(PropertyRef { base: PropertyBase::Static { type_name: type_name.to_string(), member }, calls });
    }

    let (name, rest) = take_identifier(body);
    if name.is_empty() || !is_identifier(name) {
        return Err(malformed(whole, format!("invalid property name in \"$({body})\"")));
    }
    let calls = take_call_chain(rest, whole)?;
    Ok(PropertyRef { base: PropertyBase::Name(name.to_string()), calls })
}

/// Strip one level of matching quotes.
pub(crate) fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    let first = s.chars().next()?;
    if matches!(first, '\'' | '"' | '`') && s.len() >= 2 && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn parse_item_list(body: &str, whole: &str) -> Result<ItemListRef, ExpressionError> {
    let body = body.trim();
    let (item_type, rest) = take_identifier(body);
    if item_type.is_empty() || !is_identifier(item_type) {
        return Err(malformed(whole, format!("invalid item type in \"@({body})\"")));
    }

    let mut rest = rest.trim_start();
    let mut transform = None;
    if let Some(after_arrow) = rest.strip_prefix("->") {
        let parts = split_top_level(after_arrow, b',');
        let pattern = parts[0].trim();
        match unquote(pattern) {
            Some(p) => transform = Some(p.to_string()),
            None => {
                let (name, _) = take_identifier(pattern);
                return Err(if !name.is_empty() && pattern[name.len()..].trim_start().starts_with('(') {
                    ExpressionError::UnknownFunction { name: format!("->{name}") }
                } else {
                    malformed(whole, "item transform must be a quoted pattern")
                });
            }
        }
        rest = &after_arrow[parts[0].len()..];
    }

    let mut separator = None;
    if let Some(after_comma) = rest.trim_start().strip_prefix(',') {
        let sep = unquote(after_comma).ok_or_else(|| malformed(whole, "item separator must be quoted"))?;
        separator = Some(sep.to_string());
    } else if !rest.trim().is_empty() {
        return Err(malformed(whole, format!("unexpected \"{}\" in item list", rest.trim())));
    }

    Ok(ItemListRef { item_type: item_type.to_string(), transform, separator })
}

fn parse_metadata(body: &str, whole: &str) -> Result<MetadataRef, ExpressionError> {
    let body = body.trim();
    let (item_type, name) = match body.split_once('.') {
        Some((t, n)) => (Some(t.trim()), n.trim()),
        None => (None, body),
    };
    if !is_identifier(name) || item_type.is_some_and(|t| !is_identifier(t)) {
        return Err(malformed(whole, format!("invalid metadata reference \"%({body})\"")));
    }
    Ok(MetadataRef { item_type: item_type.map(String::from), name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str) -> Fragment {
        Fragment::Property(PropertyRef { base: PropertyBase::Name(name.to_string()), calls: vec![] })
    }

    #[test]
    fn splits_literals_and_references_left_to_right() {
        let frags = parse("a$(X)b%(M)c").unwrap();
        assert_eq!(
            frags,
            vec![
                Fragment::Literal("a".into()),
                prop("X"),
                Fragment::Literal("b".into()),
                Fragment::Metadata(MetadataRef { item_type: None, name: "M".into() }),
                Fragment::Literal("c".into()),
            ]
        );
    }

    #[test]
    fn parses_method_chains_with_quoted_parens() {
        let frags = parse("$(X.Replace(')', '(').ToUpper())").unwrap();
        let Fragment::Property(p) = &frags[0] else { panic!("expected property") };
        assert_eq!(p.calls.len(), 2);
        assert_eq!(p.calls[0].name, "Replace");
        assert_eq!(p.calls[0].args.as_deref(), Some(&["')'".to_string(), "'('".to_string()][..]));
        assert_eq!(p.calls[1].args, Some(vec![]));
    }

    #[test]
    fn parses_static_function_calls() {
        let frags = parse("$([System.IO.Path]::Combine('a', $(B)))").unwrap();
        let Fragment::Property(PropertyRef { base: PropertyBase::Static { type_name, member }, .. }) = &frags[0] else {
            panic!("expected static call")
        };
        assert_eq!(type_name, "System.IO.Path");
        assert_eq!(member.name, "Combine");
        assert_eq!(member.args.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn parses_item_transforms_and_separators() {
        let frags = parse("@(Compile->'%(Filename).o', ' ')").unwrap();
        assert_eq!(
            frags,
            vec![Fragment::ItemList(ItemListRef {
                item_type: "Compile".into(),
                transform: Some("%(Filename).o".into()),
                separator: Some(" ".into()),
            })]
        );
        let frags = parse("@(Compile, ',')").unwrap();
        let Fragment::ItemList(list) = &frags[0] else { panic!("expected item list") };
        assert_eq!(list.separator.as_deref(), Some(","));
        assert!(list.transform.is_none());
    }

    #[test]
    fn unbalanced_openers_are_errors() {
        assert!(matches!(parse("$(X"), Err(ExpressionError::Unbalanced { opener: "$(", position: 0, .. })));
        assert!(matches!(parse("ok @(Y"), Err(ExpressionError::Unbalanced { opener: "@(", position: 3, .. })));
        assert!(matches!(parse("%(M"), Err(ExpressionError::Unbalanced { opener: "%(", .. })));
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(matches!(parse("$(1abc)"), Err(ExpressionError::Malformed { .. })));
        assert!(matches!(parse("$(X Y)"), Err(ExpressionError::Malformed { .. })));
        assert!(matches!(parse("@(X->Distinct())"), Err(ExpressionError::UnknownFunction { .. })));
    }

    #[test]
    fn keeps_non_ascii_literals_intact() {
        assert_eq!(parse("héllo $ ü").unwrap(), vec![Fragment::Literal("héllo $ ü".into())]);
    }

    #[test]
    fn split_top_level_respects_parens_and_quotes() {
        assert_eq!(split_top_level("a;@(X, ';');'b;c'", b';'), vec!["a", "@(X, ';')", "'b;c'"]);
    }
}
