//! Property functions.
//!
//! Two families are supported:
//!
//! - **Instance** functions on a property value: `$(Name.Trim().ToUpper())`.
//! - **Static** functions on a well-known type: `$([System.IO.Path]::Combine($(A), 'b'))`.
//!
//! Values flow through a chain as [`Value`]s and are rendered to text only at
//! the end, so `$([System.DateTime]::Now.ToString('yyyy'))` formats a date and
//! `$([MSBuild]::Add(1, 2))` renders `3`, not `3.0`.
//!
//! Arguments arrive already expanded and unquoted. Anything not listed here
//! is an [`ExpressionError::UnknownFunction`].

use crate::ExpressionError;
use crate::engine::normalize_path;
use chrono::{Local, NaiveDateTime, Utc};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Value {
    pub(crate) fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(v) => format_number(*v),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Whole numbers print without a decimal point.
pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 { format!("{}", v as i64) } else { format!("{}", v) }
}

/// Decimal or `0x` hexadecimal.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    if regex!(r"^[+-]?(?:\d+\.?\d*|\.\d+)$").is_match(s) { s.parse().ok() } else { None }
}

fn invalid(name: &str, reason: impl Into<String>) -> ExpressionError {
    ExpressionError::InvalidArguments { name: name.to_string(), reason: reason.into() }
}

fn unknown(name: impl Into<String>) -> ExpressionError {
    ExpressionError::UnknownFunction { name: name.into() }
}

/// Check the argument count; `None` (property-style access) counts as zero.
fn arity<'a>(
    name: &str,
    args: Option<&'a [String]>,
    min: usize,
    max: usize,
) -> Result<&'a [String], ExpressionError> {
    let args = args.unwrap_or(&[]);
    if args.len() < min || args.len() > max {
        let expected = if min == max { format!("{min}") } else { format!("{min}..={max}") };
        return Err(invalid(name, format!("expected {expected} argument(s), got {}", args.len())));
    }
    Ok(args)
}

fn number(name: &str, arg: &str) -> Result<f64, ExpressionError> {
    parse_number(arg).ok_or_else(|| invalid(name, format!("\"{arg}\" is not a number")))
}

fn index(name: &str, arg: &str) -> Result<usize, ExpressionError> {
    arg.trim().parse::<usize>().map_err(|_| invalid(name, format!("\"{arg}\" is not a valid index")))
}

fn char_index(haystack: &str, byte_index: Option<usize>) -> f64 {
    match byte_index {
        Some(b) => haystack[..b].chars().count() as f64,
        None => -1.0,
    }
}

// --- Instance functions ------------------------------------------------------

pub(crate) fn call_method(value: Value, name: &str, args: Option<&[String]>) -> Result<Value, ExpressionError> {
    if let Value::Date(date) = &value {
        return date_method(*date, name, args);
    }

    let s = value.render();
    let chars: Vec<char> = s.chars().collect();
    let result = match name.to_ascii_lowercase().as_str() {
        "length" => {
            arity(name, args, 0, 0)?;
            Value::Num(chars.len() as f64)
        }
        "tostring" => {
            arity(name, args, 0, 0)?;
            Value::Str(s)
        }
        "trim" | "trimstart" | "trimend" => {
            let args = arity(name, args, 0, 1)?;
            let set: Vec<char> = args.first().map(|a| a.chars().collect()).unwrap_or_default();
            let pred = |c: char| if set.is_empty() { c.is_whitespace() } else { set.contains(&c) };
            Value::Str(match name.to_ascii_lowercase().as_str() {
                "trimstart" => s.trim_start_matches(pred).to_string(),
                "trimend" => s.trim_end_matches(pred).to_string(),
                _ => s.trim_matches(pred).to_string(),
            })
        }
        "toupper" | "toupperinvariant" => {
            arity(name, args, 0, 0)?;
            Value::Str(s.to_uppercase())
        }
        "tolower" | "tolowerinvariant" => {
            arity(name, args, 0, 0)?;
            Value::Str(s.to_lowercase())
        }
        "replace" => {
            let args = arity(name, args, 2, 2)?;
            if args[0].is_empty() {
                return Err(invalid(name, "the search string is empty"));
            }
            Value::Str(s.replace(&args[0], &args[1]))
        }
        "substring" => {
            let args = arity(name, args, 1, 2)?;
            let start = index(name, &args[0])?;
            let len = match args.get(1) {
                Some(a) => index(name, a)?,
                None => chars.len().saturating_sub(start),
            };
            let Some(end) = start.checked_add(len).filter(|&end| end <= chars.len()) else {
                return Err(invalid(name, format!("range {start}+{len} is outside a string of length {}", chars.len())));
            };
            Value::Str(chars[start..end].iter().collect())
        }
        "remove" => {
            let args = arity(name, args, 1, 2)?;
            let start = index(name, &args[0])?;
            let count = match args.get(1) {
                Some(a) => index(name, a)?,
                None => chars.len().saturating_sub(start),
            };
            let Some(end) = start.checked_add(count).filter(|&end| end <= chars.len()) else {
                return Err(invalid(name, format!("range {start}+{count} is outside a string of length {}", chars.len())));
            };
            Value::Str(chars[..start].iter().chain(&chars[end..]).collect())
        }
        "contains" => Value::Bool(s.contains(arity(name, args, 1, 1)?[0].as_str())),
        "startswith" => Value::Bool(s.starts_with(arity(name, args, 1, 1)?[0].as_str())),
        "endswith" => Value::Bool(s.ends_with(arity(name, args, 1, 1)?[0].as_str())),
        "equals" => Value::Bool(s == arity(name, args, 1, 1)?[0]),
        "indexof" => Value::Num(char_index(&s, s.find(arity(name, args, 1, 1)?[0].as_str()))),
        "lastindexof" => Value::Num(char_index(&s, s.rfind(arity(name, args, 1, 1)?[0].as_str()))),
        "padleft" | "padright" => {
            let args = arity(name, args, 1, 2)?;
            let width = index(name, &args[0])?;
            let fill = args.get(1).and_then(|a| a.chars().next()).unwrap_or(' ');
            let pad: String = std::iter::repeat_n(fill, width.saturating_sub(chars.len())).collect();
            Value::Str(if name.eq_ignore_ascii_case("padleft") { pad + &s } else { s + &pad })
        }
        _ => return Err(unknown(name)),
    };
    Ok(result)
}

fn date_method(date: NaiveDateTime, name: &str, args: Option<&[String]>) -> Result<Value, ExpressionError> {
    use chrono::{Datelike, Timelike};
    let value = match name.to_ascii_lowercase().as_str() {
        "tostring" => {
            let args = arity(name, args, 0, 1)?;
            match args.first() {
                Some(fmt) => Value::Str(date.format(&dotnet_date_format(fmt)).to_string()),
                None => Value::Date(date),
            }
        }
        "year" => Value::Num(date.year() as f64),
        "month" => Value::Num(date.month() as f64),
        "day" => Value::Num(date.day() as f64),
        "hour" => Value::Num(date.hour() as f64),
        "minute" => Value::Num(date.minute() as f64),
        "second" => Value::Num(date.second() as f64),
        _ => return Err(unknown(format!("DateTime.{name}"))),
    };
    Ok(value)
}

/// Translate a .NET custom date format (`yyyy-MM-dd HH:mm`) to a chrono format string.
pub(crate) fn dotnet_date_format(fmt: &str) -> String {
    let mut out = String::with_capacity(fmt.len() * 2);
    for m in regex!(r"(?s)yyyy|yy|MM|dd|HH|hh|mm|ss|fff|tt|.").find_iter(fmt) {
        out.push_str(match m.as_str() {
            "yyyy" => "%Y",
            "yy" => "%y",
            "MM" => "%m",
            "dd" => "%d",
            "HH" => "%H",
            "hh" => "%I",
            "mm" => "%M",
            "ss" => "%S",
            "fff" => "%3f",
            "tt" => "%p",
            "%" => "%%",
            other => other,
        });
    }
    out
}

// --- Static functions --------------------------------------------------------

pub(crate) fn call_static(
    type_name: &str,
    member: &str,
    args: Option<&[String]>,
    base_dir: &Path,
) -> Result<Value, ExpressionError> {
    let type_key = type_name.trim().to_ascii_lowercase();
    let member_key = member.to_ascii_lowercase();
    let qualified = format!("[{type_name}]::{member}");
    let resolve = |p: &str| normalize_path(&base_dir.join(p.trim()));

    let value = match (type_key.as_str(), member_key.as_str()) {
        ("system.io.path", "combine") => {
            let args = arity(&qualified, args, 1, usize::MAX)?;
            let mut path = std::path::PathBuf::new();
            for part in args {
                path.push(part);
            }
            Value::Str(path.to_string_lossy().into_owned())
        }
        ("system.io.path", "getfilename") => {
            let p = &arity(&qualified, args, 1, 1)?[0];
            Value::Str(Path::new(p).file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default())
        }
        ("system.io.path", "getfilenamewithoutextension") => {
            let p = &arity(&qualified, args, 1, 1)?[0];
            Value::Str(Path::new(p).file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default())
        }
        ("system.io.path", "getextension") => {
            let p = &arity(&qualified, args, 1, 1)?[0];
            Value::Str(Path::new(p).extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default())
        }
        ("system.io.path", "getdirectoryname") => {
            let p = &arity(&qualified, args, 1, 1)?[0];
            Value::Str(Path::new(p).parent().map(|d| d.to_string_lossy().into_owned()).unwrap_or_default())
        }
        ("system.io.file", "exists") => Value::Bool(resolve(&arity(&qualified, args, 1, 1)?[0]).is_file()),
        ("system.io.directory", "exists") => Value::Bool(resolve(&arity(&qualified, args, 1, 1)?[0]).is_dir()),
        ("system.string", "isnullorempty") => Value::Bool(arity(&qualified, args, 1, 1)?[0].is_empty()),
        ("system.string", "isnullorwhitespace") => Value::Bool(arity(&qualified, args, 1, 1)?[0].trim().is_empty()),
        ("system.string", "concat") => Value::Str(arity(&qualified, args, 0, usize::MAX)?.concat()),
        ("system.string", "copy") => Value::Str(arity(&qualified, args, 1, 1)?[0].clone()),
        ("system.math", "max" | "min") => {
            let args = arity(&qualified, args, 2, 2)?;
            let (a, b) = (number(&qualified, &args[0])?, number(&qualified, &args[1])?);
            Value::Num(if member_key == "max" { a.max(b) } else { a.min(b) })
        }
        ("system.math", "abs") => Value::Num(number(&qualified, &arity(&qualified, args, 1, 1)?[0])?.abs()),
        ("system.datetime", "now") => {
            arity(&qualified, args, 0, 0)?;
            Value::Date(Local::now().naive_local())
        }
        ("system.datetime", "utcnow") => {
            arity(&qualified, args, 0, 0)?;
            Value::Date(Utc::now().naive_utc())
        }
        ("msbuild", "add" | "subtract" | "multiply" | "divide" | "modulo") => {
            let args = arity(&qualified, args, 2, 2)?;
            let (a, b) = (number(&qualified, &args[0])?, number(&qualified, &args[1])?);
            if b == 0.0 && matches!(member_key.as_str(), "divide" | "modulo") {
                return Err(invalid(&qualified, "division by zero"));
            }
            Value::Num(match member_key.as_str() {
                "add" => a + b,
                "subtract" => a - b,
                "multiply" => a * b,
                "divide" => a / b,
                _ => a % b,
            })
        }
        ("msbuild", "valueordefault") => {
            let args = arity(&qualified, args, 2, 2)?;
            Value::Str(if args[0].is_empty() { args[1].clone() } else { args[0].clone() })
        }
        ("msbuild", "ensuretrailingslash") => {
            let p = &arity(&qualified, args, 1, 1)?[0];
            Value::Str(with_trailing_slash(p))
        }
        ("msbuild", "normalizepath" | "normalizedirectory") => {
            let args = arity(&qualified, args, 1, usize::MAX)?;
            let mut path = base_dir.to_path_buf();
            for part in args {
                path.push(part);
            }
            let normalized = normalize_path(&path).to_string_lossy().into_owned();
            Value::Str(if member_key == "normalizedirectory" { with_trailing_slash(&normalized) } else { normalized })
        }
        ("msbuild", "escape") => Value::Str(escape(&arity(&qualified, args, 1, 1)?[0])),
        ("msbuild", "unescape") => Value::Str(unescape(&arity(&qualified, args, 1, 1)?[0])),
        _ => return Err(unknown(qualified)),
    };
    Ok(value)
}

fn with_trailing_slash(p: &str) -> String {
    if p.is_empty() || p.ends_with('/') || p.ends_with('\\') { p.to_string() } else { format!("{p}/") }
}

const ESCAPED_CHARS: &[char] = &['%', '*', '?', '@', '$', '(', ')', ';', '\''];

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ESCAPED_CHARS.contains(&c) {
            out.push_str(&format!("%{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `%XX` sequences as bytes, so escaped multi-byte UTF-8 comes back whole.
pub(crate) fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let decoded = match (bytes[i], bytes.get(i + 1..i + 3)) {
            (b'%', Some(hex)) => std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()),
            _ => None,
        };
        match decoded {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(parse_number("0x1F"), Some(31.0));
        assert_eq!(parse_number(" .5 "), Some(0.5));
        assert_eq!(parse_number("1.2.3"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn string_methods() {
        assert_eq!(call_method(s("  ab "), "Trim", Some(&[])).unwrap(), s("ab"));
        assert_eq!(call_method(s("xxabx"), "TrimStart", Some(&args(&["x"]))).unwrap(), s("abx"));
        assert_eq!(call_method(s("abc"), "Length", None).unwrap(), Value::Num(3.0));
        assert_eq!(call_method(s("a.b.c"), "Replace", Some(&args(&[".", "/"]))).unwrap(), s("a/b/c"));
        assert_eq!(call_method(s("hello"), "Substring", Some(&args(&["1", "3"]))).unwrap(), s("ell"));
        assert_eq!(call_method(s("hello"), "Remove", Some(&args(&["2"]))).unwrap(), s("he"));
        assert_eq!(call_method(s("hello"), "IndexOf", Some(&args(&["l"]))).unwrap(), Value::Num(2.0));
        assert_eq!(call_method(s("hello"), "LastIndexOf", Some(&args(&["z"]))).unwrap(), Value::Num(-1.0));
        assert_eq!(call_method(s("7"), "PadLeft", Some(&args(&["3", "0"]))).unwrap(), s("007"));
        assert_eq!(call_method(s("Debug"), "StartsWith", Some(&args(&["De"]))).unwrap().render(), "True");
    }

    #[test]
    fn method_errors_are_reported() {
        assert!(matches!(call_method(s("x"), "Frobnicate", Some(&[])), Err(ExpressionError::UnknownFunction { .. })));
        assert!(matches!(
            call_method(s("abc"), "Substring", Some(&args(&["2", "5"]))),
            Err(ExpressionError::InvalidArguments { .. })
        ));
        assert!(matches!(call_method(s("abc"), "Replace", Some(&args(&["a"]))), Err(ExpressionError::InvalidArguments { .. })));
    }

    #[test]
    fn static_functions() {
        let base = Path::new("/proj");
        assert_eq!(call_static("MSBuild", "Add", Some(&args(&["1", "2"])), base).unwrap().render(), "3");
        assert_eq!(call_static("msbuild", "Divide", Some(&args(&["7", "2"])), base).unwrap().render(), "3.5");
        assert!(call_static("MSBuild", "Divide", Some(&args(&["1", "0"])), base).is_err());
        assert_eq!(call_static("System.IO.Path", "GetExtension", Some(&args(&["a/b.cs"])), base).unwrap(), s(".cs"));
        assert_eq!(
            call_static("System.IO.Path", "GetFileNameWithoutExtension", Some(&args(&["a/b.cs"])), base).unwrap(),
            s("b")
        );
        assert_eq!(call_static("System.IO.Path", "Combine", Some(&args(&["a", "b"])), base).unwrap(), s("a/b"));
        assert_eq!(
            call_static("MSBuild", "NormalizeDirectory", Some(&args(&["src", "..", "obj"])), base).unwrap(),
            s("/proj/obj/")
        );
        assert_eq!(call_static("System.String", "IsNullOrEmpty", Some(&args(&[""])), base).unwrap().render(), "True");
        assert_eq!(call_static("MSBuild", "ValueOrDefault", Some(&args(&["", "d"])), base).unwrap(), s("d"));
        assert!(matches!(
            call_static("System.Net.Dns", "GetHostName", Some(&[]), base),
            Err(ExpressionError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn date_format_translation() {
        assert_eq!(dotnet_date_format("yyyy-MM-dd HH:mm:ss"), "%Y-%m-%d %H:%M:%S");
        assert_eq!(dotnet_date_format("100%"), "100%%");
        let date = chrono::NaiveDate::from_ymd_opt(2013, 2, 12).unwrap().and_hms_opt(4, 30, 0).unwrap();
        assert_eq!(date_method(date, "ToString", Some(&args(&["yyyyMMdd"]))).unwrap(), s("20130212"));
        assert_eq!(date_method(date, "Year", None).unwrap(), Value::Num(2013.0));
    }

    #[test]
    fn escape_round_trips_special_characters() {
        assert_eq!(escape("a;b$(c)"), "a%3bb%24%28c%29");
        assert_eq!(unescape("a%3Bb%2a"), "a;b*");
        assert_eq!(unescape("caf%C3%A9 100%"), "café 100%");
        assert_eq!(unescape("%zz%4"), "%zz%4");
    }

    #[test]
    fn out_of_range_slices_are_errors() {
        let huge = usize::MAX.to_string();
        for method in ["Substring", "Remove"] {
            assert!(matches!(
                call_method(s("hello"), method, Some(&args(&["1", huge.as_str()]))),
                Err(ExpressionError::InvalidArguments { .. })
            ));
            assert!(matches!(
                call_method(s("hello"), method, Some(&args(&["3", "3"]))),
                Err(ExpressionError::InvalidArguments { .. })
            ));
        }
        assert_eq!(call_method(s("hello"), "Substring", Some(&args(&["5"]))).unwrap(), s(""));
    }
}
