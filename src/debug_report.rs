use buildeval::{EvaluatedSnapshot, EvaluationError, PropertyOrigin};
use std::path::Path;

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const MAX_ITEMS_PER_TYPE: usize = 10;

pub fn print_snapshot(project: &Path, snapshot: &EvaluatedSnapshot, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Evaluated: {}", project.display()), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Properties ━━━", ansi::GRAY));
    print_properties(snapshot, &palette);

    println!("\n{}", palette.paint("━━━ Items ━━━", ansi::GRAY));
    print_items(snapshot, &palette);

    println!("\n{}", palette.paint("━━━ Imports ━━━", ansi::GRAY));
    print_imports(snapshot, &palette);

    println!("\n{}", palette.paint("━━━ Targets ━━━", ansi::GRAY));
    print_targets(snapshot, &palette);

    let m = &snapshot.metrics;
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Properties: {}  │  Items: {}  │  Targets: {}",
        palette.paint(format!("{:?}", m.total), ansi::GREEN),
        palette.paint(format!("{:?}", m.properties.duration), ansi::CYAN),
        palette.paint(format!("{:?}", m.items.duration), ansi::CYAN),
        palette.dim(format!("{:?}", m.targets.duration)),
    );
    println!(
        "  {}",
        palette.dim(format!(
            "documents loaded: {}  imports: {}  glob walks: {}",
            m.documents_loaded, m.imports, m.glob_expansions
        ))
    );
    println!();
}

pub fn print_failure(project: &Path, err: &EvaluationError, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("\n{}", palette.bold(palette.paint(format!("✗  Evaluation failed: {}", project.display()), ansi::RED)));
    eprintln!("  {} {}", palette.dim("at"), palette.paint(err.location().to_string(), ansi::YELLOW));
    eprintln!("  {err}");
    eprintln!("\n{}", palette.dim("  Tip: Set BUILDEVAL_LOG=buildeval=debug to trace each pass"));
}

fn print_properties(snapshot: &EvaluatedSnapshot, palette: &ansi::Palette) {
    // Environment properties are noisy; only show the ones a document touched.
    let shown = snapshot
        .properties
        .values()
        .filter(|p| p.origin != PropertyOrigin::Environment || p.predecessor().is_some())
        .collect::<Vec<_>>();
    if shown.is_empty() {
        println!("{}", palette.dim("  No properties"));
        return;
    }
    for property in shown {
        let origin = match property.origin {
            PropertyOrigin::Environment => palette.dim("env"),
            PropertyOrigin::Reserved => palette.dim("reserved"),
            PropertyOrigin::Global => palette.paint("global", ansi::YELLOW),
            PropertyOrigin::Document => palette.dim("doc"),
        };
        println!(
            "  {} {} {} {}",
            palette.paint(&property.name, ansi::BLUE),
            palette.dim("="),
            palette.bold(palette.paint(&property.evaluated_value, ansi::GREEN)),
            origin,
        );
        let shadowed = property.history().skip(1).count();
        if shadowed > 0 {
            println!("      {}", palette.dim(format!("shadows {shadowed} earlier value(s)")));
        }
    }
}

fn print_items(snapshot: &EvaluatedSnapshot, palette: &ansi::Palette) {
    let types = snapshot.item_types();
    if types.is_empty() {
        println!("{}", palette.dim("  No items"));
        return;
    }
    for item_type in types {
        let items = snapshot.items(item_type).collect::<Vec<_>>();
        println!("  {} {}", palette.paint(item_type, ansi::BLUE), palette.dim(format!("({})", items.len())));
        for item in items.iter().take(MAX_ITEMS_PER_TYPE) {
            let metadata = item.metadata.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
            if metadata.is_empty() {
                println!("    {}", palette.paint(&item.evaluated_include, ansi::GREEN));
            } else {
                println!("    {} {}", palette.paint(&item.evaluated_include, ansi::GREEN), palette.dim(metadata));
            }
        }
        if items.len() > MAX_ITEMS_PER_TYPE {
            println!("    {}", palette.dim(format!("... +{} more", items.len() - MAX_ITEMS_PER_TYPE)));
        }
    }
}

fn print_imports(snapshot: &EvaluatedSnapshot, palette: &ansi::Palette) {
    let imports = snapshot.imports_including_duplicates();
    if imports.is_empty() {
        println!("{}", palette.dim("  No imports"));
        return;
    }
    for import in imports {
        let implicit = if import.is_implicit { palette.paint(" implicit", ansi::YELLOW) } else { String::new() };
        println!(
            "  {} {} {}{}",
            palette.paint(import.imported.path.display().to_string(), ansi::GREEN),
            palette.dim("│ from"),
            palette.paint(import.importing_element.to_string(), ansi::CYAN),
            implicit,
        );
    }
}

fn print_targets(snapshot: &EvaluatedSnapshot, palette: &ansi::Palette) {
    if snapshot.targets.is_empty() {
        println!("{}", palette.dim("  No targets"));
        return;
    }
    println!(
        "  {} {}  {} {}",
        palette.dim("default:"),
        palette.paint(snapshot.default_targets.join(";"), ansi::YELLOW),
        palette.dim("initial:"),
        palette.paint(snapshot.initial_targets.join(";"), ansi::YELLOW),
    );
    for target in snapshot.targets.values() {
        let name = if target.is_active {
            palette.bold(palette.paint(&target.name, ansi::GREEN))
        } else {
            palette.dim(format!("{} (inactive)", target.name))
        };
        let depends = if target.depends_on.is_empty() {
            String::new()
        } else {
            format!(" {} {}", palette.dim("│ depends on"), palette.paint(target.depends_on.join(";"), ansi::BLUE))
        };
        println!("  {}{} {}", name, depends, palette.dim(format!("│ {} task(s)", target.tasks.len())));
    }
}
