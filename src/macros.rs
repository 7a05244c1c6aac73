/// Lazily compiled, process-wide regex for a literal pattern.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("literal regex is valid"));
        &*RE
    }};
}

/// Build a [`NameMap`](crate::NameMap) of strings from `name => value` pairs.
///
/// ```
/// let globals = buildeval::name_map! { "Configuration" => "Release", "Platform" => "x64" };
/// assert_eq!(globals.get("configuration").map(String::as_str), Some("Release"));
/// ```
#[macro_export]
macro_rules! name_map {
    () => { $crate::NameMap::<String>::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::NameMap::<String>::new();
        $( map.insert($name, ::std::string::String::from($value)); )+
        map
    }};
}

/// Log why a condition evaluates false, then return `Ok(false)`.
macro_rules! semantic_false {
    ($($arg:tt)*) => {{
        tracing::debug!($($arg)*);
        return Ok(false);
    }};
}
