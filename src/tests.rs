//! End-to-end evaluation scenarios.

use crate::{
    EvaluatedSnapshot, EvaluationContext, EvaluationError, ImportError, ImportPosition, LoadSettings, MemoryLoader,
    Project, PropertyOrigin, parse_document,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const ROOT: &str = "/work/app.proj";

/// Project over in-memory documents; the first entry is the root.
fn project_with(context: EvaluationContext, files: &[(&str, &str)]) -> Project {
    let mut loader = MemoryLoader::new();
    for (path, xml) in files {
        loader.insert_xml(path, xml).unwrap();
    }
    let root = parse_document(files[0].0, files[0].1).unwrap();
    Project::new(root, context).with_loader(Arc::new(loader))
}

fn project(files: &[(&str, &str)]) -> Project {
    project_with(EvaluationContext::default(), files)
}

fn evaluate(xml: &str) -> Arc<EvaluatedSnapshot> {
    project(&[(ROOT, xml)]).evaluate().unwrap()
}

fn includes<'a>(snapshot: &'a EvaluatedSnapshot, item_type: &'a str) -> Vec<&'a str> {
    snapshot.items(item_type).map(|i| i.evaluated_include.as_str()).collect()
}

fn write(dir: &Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

// --- Properties --------------------------------------------------------------

#[test]
fn global_overrides_outrank_document_values() {
    let xml = r#"<Project>
      <PropertyGroup>
        <Config Condition="'$(Config)' == ''">Debug</Config>
        <Out>bin/$(Config)</Out>
      </PropertyGroup>
    </Project>"#;

    // (global Config, expected Config, expected Out)
    let cases = [(None, "Debug", "bin/Debug"), (Some("Release"), "Release", "bin/Release")];
    for (global, config, out) in cases {
        let mut ctx = EvaluationContext::default();
        if let Some(value) = global {
            ctx = ctx.with_global_property("Config", value);
        }
        let snapshot = project_with(ctx, &[(ROOT, xml)]).evaluate().unwrap();
        assert_eq!(snapshot.property_value("config"), config);
        assert_eq!(snapshot.property_value("OUT"), out);
    }
}

#[test]
fn unconditional_document_value_cannot_replace_a_global() {
    let ctx = EvaluationContext::default().with_global_property("Config", "Release");
    let snapshot = project_with(ctx, &[(ROOT, "<Project><PropertyGroup><Config>Debug</Config></PropertyGroup></Project>")])
        .evaluate()
        .unwrap();
    let config = snapshot.property("Config").unwrap();
    assert_eq!(config.evaluated_value, "Release");
    assert_eq!(config.origin, PropertyOrigin::Global);
}

#[test]
fn last_document_value_wins_and_history_is_kept() {
    let snapshot = evaluate(
        r#"<Project>
          <PropertyGroup><A>1</A></PropertyGroup>
          <PropertyGroup Condition="false"><A>ignored</A></PropertyGroup>
          <PropertyGroup><A>$(A)2</A><A Condition="'$(A)' == 'nope'">3</A></PropertyGroup>
        </Project>"#,
    );
    let a = snapshot.property("a").unwrap();
    assert_eq!(a.evaluated_value, "12");
    assert_eq!(a.unevaluated_value, "$(A)2");
    let history: Vec<&str> = a.history().map(|p| p.evaluated_value.as_str()).collect();
    assert_eq!(history, vec!["12", "1"]);
    assert_eq!(snapshot.property_value("Undefined"), "");
}

#[test]
fn environment_is_the_weakest_layer() {
    let ctx = EvaluationContext::default()
        .with_environment_property("Home", "/home/u")
        .with_environment_property("Tools", "/env/tools");
    let snapshot = project_with(ctx, &[(ROOT, "<Project><PropertyGroup><Tools>/doc/tools</Tools></PropertyGroup></Project>")])
        .evaluate()
        .unwrap();
    assert_eq!(snapshot.property_value("Home"), "/home/u");
    assert_eq!(snapshot.property("Home").unwrap().origin, PropertyOrigin::Environment);
    assert_eq!(snapshot.property_value("Tools"), "/doc/tools");
}

#[test]
fn reserved_properties_describe_the_project() {
    let snapshot = evaluate(
        r#"<Project><PropertyGroup><MSBuildProjectName>hijack</MSBuildProjectName><N>$(MSBuildProjectName)</N></PropertyGroup></Project>"#,
    );
    assert_eq!(snapshot.property_value("MSBuildProjectName"), "app");
    assert_eq!(snapshot.property_value("N"), "app");
    assert_eq!(snapshot.property_value("MSBuildProjectExtension"), ".proj");
    assert_eq!(snapshot.property_value("MSBuildProjectDirectory"), "/work");
    assert_eq!(snapshot.property_value("MSBuildToolsVersion"), "Current");
}

#[test]
fn choose_takes_the_first_true_branch() {
    let snapshot = evaluate(
        r#"<Project>
          <PropertyGroup><Os>linux</Os></PropertyGroup>
          <Choose>
            <When Condition="'$(Os)' == 'windows'"><PropertyGroup><Ext>.exe</Ext></PropertyGroup></When>
            <When Condition="'$(Os)' == 'LINUX'">
              <PropertyGroup><Ext></Ext><Flavor>elf</Flavor></PropertyGroup>
              <ItemGroup><Lib Include="libc.so"/></ItemGroup>
            </When>
            <Otherwise><PropertyGroup><Flavor>other</Flavor></PropertyGroup></Otherwise>
          </Choose>
        </Project>"#,
    );
    assert_eq!(snapshot.property_value("Flavor"), "elf");
    assert_eq!(snapshot.property_value("Ext"), "");
    assert_eq!(includes(&snapshot, "Lib"), vec!["libc.so"]);
}

#[test]
fn items_follow_the_branch_chosen_for_properties() {
    let snapshot = evaluate(
        r#"<Project>
          <Choose>
            <When Condition="'$(Picked)' == ''">
              <PropertyGroup><Picked>when</Picked></PropertyGroup>
              <ItemGroup><Branch Include="when"/></ItemGroup>
              <Choose>
                <When Condition="'$(Picked)' == 'when'">
                  <PropertyGroup><Inner>first</Inner></PropertyGroup>
                  <ItemGroup><Branch Include="inner-first"/></ItemGroup>
                </When>
                <Otherwise><ItemGroup><Branch Include="inner-other"/></ItemGroup></Otherwise>
              </Choose>
            </When>
            <Otherwise><ItemGroup><Branch Include="otherwise"/></ItemGroup></Otherwise>
          </Choose>
        </Project>"#,
    );
    assert_eq!(snapshot.property_value("Picked"), "when");
    assert_eq!(snapshot.property_value("Inner"), "first");
    assert_eq!(includes(&snapshot, "Branch"), vec!["when", "inner-first"]);
}

#[test]
fn conditioned_properties_are_collected() {
    let snapshot = evaluate(
        r#"<Project>
          <PropertyGroup Condition="'$(Configuration)|$(Platform)' == 'Debug|AnyCPU'"/>
          <PropertyGroup Condition="'$(Configuration)|$(Platform)' == 'Release|AnyCPU'"/>
        </Project>"#,
    );
    let configs = snapshot.conditioned_properties.get("configuration").unwrap();
    assert_eq!(configs, &vec!["Debug".to_string(), "Release".to_string()]);
}

// --- Imports -----------------------------------------------------------------

#[test]
fn duplicate_imports_are_recorded_and_reapplied() {
    let mut p = project(&[
        (
            ROOT,
            r#"<Project>
              <Import Project="common.props"/>
              <Import Project="$(MSBuildProjectDirectory)/common.props"/>
              <PropertyGroup><After>$(Counter)</After></PropertyGroup>
            </Project>"#,
        ),
        ("/work/common.props", "<Project><PropertyGroup><Counter>$(Counter)x</Counter></PropertyGroup></Project>"),
    ]);
    let snapshot = p.evaluate().unwrap();
    assert_eq!(snapshot.imports_including_duplicates().len(), 2);
    assert_eq!(snapshot.imports().len(), 1);
    assert_eq!(snapshot.property_value("Counter"), "xx");
    assert_eq!(snapshot.property_value("After"), "xx");
    assert_eq!(snapshot.metrics.imports, 2);
    assert_eq!(snapshot.metrics.documents_loaded, 1);
}

#[test]
fn imported_documents_see_and_set_properties_in_order() {
    let snapshot = project(&[
        (
            ROOT,
            r#"<Project>
              <PropertyGroup><Before>b</Before></PropertyGroup>
              <Import Project="build/inner.props" Condition="'$(Before)' == 'b'"/>
              <Import Project="build/skipped.props" Condition="'$(Before)' != 'b'"/>
              <PropertyGroup><Seen>$(Inner)</Seen></PropertyGroup>
            </Project>"#,
        ),
        (
            "/work/build/inner.props",
            "<Project><PropertyGroup><Inner>$(Before)-$(MSBuildThisFileName)</Inner></PropertyGroup></Project>",
        ),
    ])
    .evaluate()
    .unwrap();
    assert_eq!(snapshot.property_value("Seen"), "b-inner");
    assert_eq!(snapshot.imports().len(), 1);
}

#[test]
fn import_cycles_are_errors() {
    let err = project(&[
        (ROOT, r#"<Project><Import Project="a.props"/></Project>"#),
        ("/work/a.props", r#"<Project><Import Project="b.props"/></Project>"#),
        ("/work/b.props", r#"<Project><Import Project="app.proj"/></Project>"#),
    ])
    .evaluate()
    .unwrap_err();
    let EvaluationError::Import { source: ImportError::Cycle { chain }, location } = err else {
        panic!("expected an import cycle")
    };
    assert_eq!(chain.len(), 4);
    assert_eq!(chain.first(), chain.last());
    assert!(location.file.ends_with("b.props"));
}

#[test]
fn missing_and_invalid_imports_follow_load_settings() {
    let files = [
        (ROOT, r#"<Project><Import Project="missing.props"/><PropertyGroup><Done>yes</Done></PropertyGroup></Project>"#),
    ];
    let err = project(&files).evaluate().unwrap_err();
    assert!(matches!(err, EvaluationError::Import { source: ImportError::NotFound { .. }, .. }));

    let snapshot = project(&files).with_settings(LoadSettings::IGNORE_MISSING_IMPORTS).evaluate().unwrap();
    assert_eq!(snapshot.property_value("Done"), "yes");

    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app.proj", r#"<Project><Import Project="bad.props"/><PropertyGroup><Done>yes</Done></PropertyGroup></Project>"#);
    write(dir.path(), "bad.props", "<Project><Oops");
    let path = dir.path().join("app.proj");
    let err = Project::load(&path, EvaluationContext::default()).unwrap().evaluate().unwrap_err();
    assert!(matches!(err, EvaluationError::Import { source: ImportError::Invalid { .. }, .. }));
    let snapshot = Project::load(&path, EvaluationContext::default())
        .unwrap()
        .with_settings(LoadSettings::IGNORE_INVALID_IMPORTS)
        .evaluate()
        .unwrap();
    assert_eq!(snapshot.property_value("Done"), "yes");
}

#[test]
fn implicit_imports_wrap_the_root_document() {
    let ctx = EvaluationContext::default()
        .with_implicit_import("sdk/Sdk.props", ImportPosition::Before)
        .with_implicit_import("sdk/Sdk.targets", ImportPosition::After);
    let snapshot = project_with(
        ctx,
        &[
            (ROOT, "<Project><PropertyGroup><Out>$(Base)/out</Out></PropertyGroup></Project>"),
            ("/work/sdk/Sdk.props", "<Project><PropertyGroup><Base>obj</Base></PropertyGroup></Project>"),
            ("/work/sdk/Sdk.targets", "<Project><PropertyGroup><Final>$(Out)</Final></PropertyGroup></Project>"),
        ],
    )
    .evaluate()
    .unwrap();
    assert_eq!(snapshot.property_value("Final"), "obj/out");
    assert!(snapshot.imports().iter().all(|i| i.is_implicit));
}

#[test]
fn wildcard_imports_load_every_match_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app.proj", r#"<Project><Import Project="props/*.props"/></Project>"#);
    write(dir.path(), "props/b.props", "<Project><PropertyGroup><Order>$(Order)b</Order></PropertyGroup></Project>");
    write(dir.path(), "props/a.props", "<Project><PropertyGroup><Order>$(Order)a</Order></PropertyGroup></Project>");
    let snapshot = Project::load(dir.path().join("app.proj"), EvaluationContext::default()).unwrap().evaluate().unwrap();
    assert_eq!(snapshot.property_value("Order"), "ab");
}

// --- Items -------------------------------------------------------------------

#[test]
fn globbed_items_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/b.rs", "");
    write(dir.path(), "src/a.rs", "");
    write(dir.path(), "src/notes.txt", "");
    write(dir.path(), "app.proj", r#"<Project><ItemGroup><Compile Include="src/*.rs"/></ItemGroup></Project>"#);
    let snapshot = Project::load(dir.path().join("app.proj"), EvaluationContext::default()).unwrap().evaluate().unwrap();
    assert_eq!(includes(&snapshot, "Compile"), vec!["src/a.rs", "src/b.rs"]);
    assert_eq!(snapshot.metrics.glob_expansions, 1);
}

#[test]
fn exclude_and_recursive_dir() {
    let dir = tempfile::tempdir().unwrap();
    for f in ["src/main.rs", "src/gen/x.rs", "src/gen/y.rs", "src/util/z.rs"] {
        write(dir.path(), f, "");
    }
    write(
        dir.path(),
        "app.proj",
        r#"<Project><ItemGroup>
          <Compile Include="src/**/*.rs" Exclude="src/gen/y.rs;src/util/*.rs">
            <Out>obj/%(RecursiveDir)%(Filename).o</Out>
          </Compile>
        </ItemGroup></Project>"#,
    );
    let snapshot = Project::load(dir.path().join("app.proj"), EvaluationContext::default()).unwrap().evaluate().unwrap();
    assert_eq!(includes(&snapshot, "Compile"), vec!["src/gen/x.rs", "src/main.rs"]);
    let outs: Vec<String> = snapshot.items("Compile").map(|i| i.metadata_value("Out")).collect();
    assert_eq!(outs, vec!["obj/gen/x.o".to_string(), "obj/main.o".to_string()]);
}

#[test]
fn item_definitions_provide_default_metadata() {
    let snapshot = evaluate(
        r#"<Project>
          <ItemDefinitionGroup>
            <Compile><Opt>O2</Opt><Warn>all</Warn></Compile>
          </ItemDefinitionGroup>
          <ItemDefinitionGroup>
            <Compile><Warn>none</Warn></Compile>
          </ItemDefinitionGroup>
          <ItemGroup>
            <Compile Include="a.c"/>
            <Compile Include="b.c" Opt="O0"/>
            <Compile Include="c.c"><Label>%(Filename)-%(Opt)</Label></Compile>
          </ItemGroup>
        </Project>"#,
    );
    let rows: Vec<(String, String, String)> = snapshot
        .items("Compile")
        .map(|i| (i.metadata_value("Opt"), i.metadata_value("Warn"), i.metadata_value("Label")))
        .collect();
    let expected = vec![
        ("O2".to_string(), "none".to_string(), String::new()),
        ("O0".to_string(), "none".to_string(), String::new()),
        ("O2".to_string(), "none".to_string(), "c-O2".to_string()),
    ];
    assert_eq!(rows, expected);
    assert_eq!(snapshot.item_definitions.get("compile").unwrap().metadata.len(), 2);
}

#[test]
fn remove_keeps_survivor_order() {
    let snapshot = evaluate(
        r#"<Project>
          <ItemGroup>
            <Compile Include="a.rs;b.rs"/>
            <None Include="b.rs"/>
            <Compile Include="c.rs"/>
          </ItemGroup>
          <ItemGroup><Compile Remove="b.rs"/></ItemGroup>
        </Project>"#,
    );
    let all: Vec<(&str, &str)> = snapshot.items.iter().map(|i| (i.item_type.as_str(), i.evaluated_include.as_str())).collect();
    assert_eq!(all, vec![("Compile", "a.rs"), ("None", "b.rs"), ("Compile", "c.rs")]);
    assert_eq!(snapshot.item_types(), vec!["Compile", "None"]);
}

#[test]
fn item_references_copy_update_and_remove() {
    let snapshot = evaluate(
        r#"<Project>
          <ItemGroup>
            <Source Include="a.cs;b.cs;c.cs" Kind="code"/>
            <Compile Include="@(Source)" Exclude="b.cs"/>
            <Compile Update="c.cs" Kind="generated"/>
            <Skip Include="a.cs"/>
            <Source Remove="@(Skip)"/>
          </ItemGroup>
        </Project>"#,
    );
    assert_eq!(includes(&snapshot, "Compile"), vec!["a.cs", "c.cs"]);
    let kinds: Vec<String> = snapshot.items("Compile").map(|i| i.metadata_value("Kind")).collect();
    assert_eq!(kinds, vec!["code".to_string(), "generated".to_string()]);
    assert_eq!(includes(&snapshot, "Source"), vec!["b.cs", "c.cs"]);
}

#[test]
fn conditions_and_transforms_see_earlier_items() {
    let snapshot = evaluate(
        r#"<Project>
          <ItemGroup>
            <Compile Include="x.rs;y.rs"/>
            <Objects Include="@(Compile->'%(Filename).o')" Condition="'@(Compile)' != ''"/>
            <Never Include="n" Condition="'@(Missing)' != ''"/>
          </ItemGroup>
        </Project>"#,
    );
    assert_eq!(includes(&snapshot, "Objects"), vec!["x.o", "y.o"]);
    assert!(includes(&snapshot, "Never").is_empty());
    assert_eq!(snapshot.expand_string("@(Objects, ' ')").unwrap(), "x.o y.o");
}

#[test]
fn items_reference_properties_declared_later() {
    let snapshot = evaluate(
        r#"<Project>
          <ItemGroup><Out Include="$(Dir)/app"/></ItemGroup>
          <PropertyGroup><Dir>bin</Dir></PropertyGroup>
        </Project>"#,
    );
    assert_eq!(includes(&snapshot, "Out"), vec!["bin/app"]);
}

#[test]
fn evaluation_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    for f in ["z.txt", "m/b.txt", "m/a.txt", "a.txt"] {
        write(dir.path(), f, "");
    }
    write(dir.path(), "app.proj", r#"<Project><ItemGroup><Doc Include="**/*.txt"/></ItemGroup></Project>"#);
    let mut p = Project::load(dir.path().join("app.proj"), EvaluationContext::default()).unwrap();
    let first: Vec<String> = p.evaluate().unwrap().items.iter().map(|i| i.evaluated_include.clone()).collect();
    let second: Vec<String> = p.evaluate().unwrap().items.iter().map(|i| i.evaluated_include.clone()).collect();
    assert_eq!(first, vec!["a.txt", "m/a.txt", "m/b.txt", "z.txt"]);
    assert_eq!(first, second);
}

// --- Targets -----------------------------------------------------------------

#[test]
fn inactive_targets_remain_resolvable() {
    let snapshot = evaluate(
        r#"<Project DefaultTargets="Build">
          <Target Name="Pack" Condition="'$(CanPack)' == 'true'"/>
          <Target Name="Build" DependsOnTargets="Restore; Pack;" AfterTargets="Compile">
            <Exec Command="make" Condition="true"/>
          </Target>
        </Project>"#,
    );
    let pack = snapshot.target("pack").unwrap();
    assert!(!pack.is_active);
    let build = snapshot.target("BUILD").unwrap();
    assert!(build.is_active);
    assert_eq!(build.depends_on, vec!["Restore", "Pack"]);
    assert_eq!(build.after_targets, vec!["Compile"]);
    assert_eq!(build.tasks[0].name, "Exec");
    assert_eq!(build.tasks[0].parameters, vec![("Command".to_string(), "make".to_string())]);
    assert!(build.depends_on.iter().all(|d| snapshot.target(d).is_some() || d == "Restore"));
    assert_eq!(snapshot.default_targets, vec!["Build"]);
}

#[test]
fn redefined_targets_replace_earlier_ones() {
    let snapshot = project(&[
        (
            ROOT,
            r#"<Project InitialTargets="Check">
              <Target Name="Build" DependsOnTargets="A"/>
              <Import Project="override.targets"/>
            </Project>"#,
        ),
        (
            "/work/override.targets",
            r#"<Project InitialTargets="Check;Warm"><Target Name="build" DependsOnTargets="B"/></Project>"#,
        ),
    ])
    .evaluate()
    .unwrap();
    assert_eq!(snapshot.targets.len(), 1);
    let build = snapshot.target("Build").unwrap();
    assert_eq!(build.depends_on, vec!["B"]);
    assert!(build.location.file.ends_with("override.targets"));
    assert_eq!(snapshot.initial_targets, vec!["Check", "Warm"]);
    assert_eq!(snapshot.default_targets, vec!["Build"]);
}

// --- Coordinator ---------------------------------------------------------------

#[test]
fn reevaluation_follows_the_dirty_flag() {
    let mut p = project(&[(ROOT, "<Project><PropertyGroup><A>1</A></PropertyGroup></Project>")]);
    assert!(p.is_dirty());
    p.reevaluate_if_necessary().unwrap();
    assert_eq!(p.evaluation_counter(), 1);

    p.reevaluate_if_necessary().unwrap();
    assert_eq!(p.evaluation_counter(), 1);

    p.set_property("A", "2");
    p.set_skip_evaluation(true);
    p.reevaluate_if_necessary().unwrap();
    assert_eq!(p.evaluation_counter(), 1);
    assert_eq!(p.property_value("A"), "1");

    p.set_skip_evaluation(false);
    p.reevaluate_if_necessary().unwrap();
    assert_eq!(p.evaluation_counter(), 2);
    assert_eq!(p.property_value("A"), "2");
    assert_eq!(p.snapshot().unwrap().version, 2);
}

#[test]
fn failed_evaluation_keeps_the_previous_snapshot() {
    let mut p = project(&[(ROOT, "<Project><PropertyGroup><A>1</A></PropertyGroup></Project>")]);
    let before = p.evaluate().unwrap();

    p.add_item("Compile", "$(Broken", &[]);
    let err = p.evaluate().unwrap_err();
    assert!(matches!(err, EvaluationError::Expression { .. }));
    assert!(p.is_dirty());
    assert_eq!(p.evaluation_counter(), 1);
    assert!(Arc::ptr_eq(p.snapshot().unwrap(), &before));

    assert!(p.remove_item("Compile", "$(Broken"));
    p.reevaluate_if_necessary().unwrap();
    assert_eq!(p.evaluation_counter(), 2);
    assert_eq!(before.version, 1);
}

#[test]
fn items_ignoring_condition_reads_the_raw_document() {
    let p = project(&[(
        ROOT,
        r#"<Project>
          <ItemGroup Condition="false"><Compile Include="a.rs"/></ItemGroup>
          <Choose><When Condition="false"><ItemGroup><Compile Include="b.rs"/></ItemGroup></When></Choose>
        </Project>"#,
    )]);
    let raw: Vec<&str> = p.items_ignoring_condition("compile").iter().filter_map(|e| e.include.as_deref()).collect();
    assert_eq!(raw, vec!["a.rs", "b.rs"]);
    assert!(p.snapshot().is_none());
    assert!(p.items("Compile").is_empty());
}

#[test]
fn saved_documents_evaluate_the_same() {
    let xml = r#"<Project DefaultTargets="Build">
      <PropertyGroup Condition="'$(A)' == ''"><A>x &amp; y</A></PropertyGroup>
      <ItemGroup><Compile Include="a.rs" Link="l"><Opt>1</Opt></Compile></ItemGroup>
      <Target Name="Build"><Message Text="$(A)"/></Target>
    </Project>"#;
    let mut original = project(&[(ROOT, xml)]);
    let first = original.evaluate().unwrap();

    let mut saved = Vec::new();
    original.save(&mut saved).unwrap();
    let text = String::from_utf8(saved).unwrap();
    let mut reloaded = project(&[(ROOT, &text)]);
    let second = reloaded.evaluate().unwrap();

    assert_eq!(second.property_value("A"), "x & y");
    assert_eq!(first.property_value("A"), second.property_value("A"));
    assert_eq!(second.items("Compile").next().unwrap().metadata_value("Link"), "l");
    assert_eq!(second.items("Compile").next().unwrap().metadata_value("Opt"), "1");
    assert_eq!(second.default_targets, first.default_targets);
}
