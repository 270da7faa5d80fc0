//! End-to-end generator runs over on-disk fixtures

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use overlay_gen::diff::{apply_strict, ApplyOptions};
use overlay_gen::{
    generate, GenerateError, GenerationReport, Generator, GeneratorConfig, GeneratorSettings,
    PatchDocument, RenderError, VirtualPath,
};

const FOO: &str = "\
namespace Game.Items
{
    public class Foo
    {
        public int Value()
        {
            return 1;
        }
    }
}
";

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            root: TempDir::new().expect("Should create temp dir"),
        };
        ws.write("Mods/__core__/Items/Foo.cs", FOO);
        fs::create_dir_all(ws.project().join("UserCode")).unwrap();
        ws
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn project(&self) -> PathBuf {
        self.path("Project")
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("Should read output")
    }

    fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            mods_dir: Some(self.path("Mods")),
            output_dir: Some("out".into()),
            ..Default::default()
        }
    }

    fn run(&self, settings: GeneratorSettings) -> Result<GenerationReport, GenerateError> {
        let config = GeneratorConfig::validate(&self.project(), settings)?;
        Generator::new(config)?.run()
    }
}

fn vp(s: &str) -> VirtualPath {
    VirtualPath::new(s).unwrap()
}

#[test]
fn test_override_with_patch() {
    let ws = Workspace::new();
    ws.write(
        "Project/UserCode/Items/Foo.override.cs.hbs",
        r#"{{cs_replace_node (load_core_source "Items/Foo.cs") (cs_find_node_with_text (load_core_source "Items/Foo.cs") "statement" "return 1") "return 42;"}}"#,
    );

    let report = ws
        .run(GeneratorSettings {
            write_diffs: Some(true),
            ..ws.settings()
        })
        .expect("Should generate");
    assert_eq!(report.generated, vec![vp("Items/Foo.override.cs")]);
    assert_eq!(report.patches, vec![vp("Items/Foo.cs.patch")]);

    let generated = ws.read("Project/out/Items/Foo.override.cs");
    assert_eq!(generated, FOO.replace("return 1;", "return 42;"));

    let patch = PatchDocument::parse(&ws.read("Project/out/Items/Foo.cs.patch")).expect("Should parse patch");
    assert_eq!(patch.base_path, "__core__/Items/Foo.cs");
    assert_eq!(patch.patched_path, "UserCode/Items/Foo.override.cs");
    assert_eq!(patch.hunks.len(), 1);
    assert_eq!(patch.hunks[0].removed_lines(), vec!["            return 1;"]);
    assert_eq!(patch.hunks[0].added_lines(), vec!["            return 42;"]);

    let reapplied = apply_strict(FOO, &patch.hunks, &ApplyOptions::default()).expect("Should apply");
    assert_eq!(reapplied, generated);
}

#[test]
fn test_template_set_precedence() {
    let ws = Workspace::new();
    ws.write("Project/Templates/header.hbs", "// project header\n");
    ws.write("Shared/header.hbs", "// shared header\n");
    ws.write("Shared/footer.hbs", "// shared footer\n");
    ws.write(
        "Project/UserCode/Gen/A.cs.hbs",
        "{{include \"header\"}}{{include \"@Shared/header\"}}{{include \"footer\"}}class A { }\n",
    );

    ws.run(GeneratorSettings {
        shared_templates_dir: Some("../Shared".into()),
        ..ws.settings()
    })
    .expect("Should generate");

    assert_eq!(
        ws.read("Project/out/Gen/A.cs"),
        "// project header\n// shared header\n// shared footer\nclass A { }\n"
    );
}

#[test]
fn test_control_templates_assets_and_copy() {
    let ws = Workspace::new();
    ws.write(
        "Project/UserCode/__setup.hbs",
        "{{write_file \"class B { }\" \"Gen/B.cs\"}}{{write_override_file (cs_replace_method (load_core_source \"Items/Foo.cs\") \"Value\" \"public int Value() { return 7; }\") \"Items/Foo.cs\"}}ignored text",
    );
    ws.write("Project/UserCode/Icons/Icon.unity3d", "binary");
    ws.write("Project/UserCode/notes.txt", "skipped");

    let report = ws
        .run(GeneratorSettings {
            copy_to_mods: Some(true),
            ..ws.settings()
        })
        .expect("Should generate");

    assert_eq!(
        report.generated,
        vec![vp("Gen/B.cs"), vp("Icons/Icon.unity3d"), vp("Items/Foo.override.cs")]
    );
    assert_eq!(report.controls, 1);
    assert_eq!(report.copied, 3);
    assert!(report.patches.is_empty());

    assert_eq!(ws.read("Project/out/Gen/B.cs"), "class B { }");
    assert_eq!(ws.read("Project/out/Icons/Icon.unity3d"), "binary");
    assert!(ws
        .read("Project/out/Items/Foo.override.cs")
        .contains("        public int Value() { return 7; }\n    }"));
    assert!(!ws.path("Project/out/__setup").exists());
    assert!(!ws.path("Project/out/notes.txt").exists());

    assert_eq!(ws.read("Mods/UserCode/Gen/B.cs"), "class B { }");
    assert_eq!(ws.read("Mods/UserCode/Icons/Icon.unity3d"), "binary");
}

#[test]
fn test_first_error_stops_the_run() {
    let ws = Workspace::new();
    ws.write(
        "Project/UserCode/Gen/A.cs.hbs",
        "{{cs_get_class (load_core_source \"Items/Foo.cs\") \"Missing\"}}",
    );
    ws.write("Project/UserCode/Gen/B.cs.hbs", "class B { }");

    match ws.run(ws.settings()) {
        Err(GenerateError::Render { path, source }) => {
            assert_eq!(path, vp("Gen/A.cs"));
            assert!(matches!(source, RenderError::Structure(_)), "{source}");
        }
        other => panic!("Expected a render error, got {other:?}"),
    }
    assert!(!ws.path("Project/out/Gen/B.cs").exists());
}

#[test]
fn test_output_collision() {
    let ws = Workspace::new();
    ws.write("Project/UserCode/Gen/A.cs.hbs", "class A { }");
    ws.write("Project/UserCode/__setup.hbs", "{{write_file \"again\" \"Gen/A.cs\"}}");

    match ws.run(ws.settings()) {
        Err(GenerateError::OutputCollision {
            path,
            first,
            second,
        }) => {
            assert_eq!(path, vp("Gen/A.cs"));
            assert_eq!(first, vp("Gen/A.cs"));
            assert_eq!(second, vp("__setup"));
        }
        other => panic!("Expected OutputCollision, got {other:?}"),
    }
}

#[test]
fn test_configuration_errors_abort_before_generation() {
    let ws = Workspace::new();
    ws.write("Project/UserCode/Gen/A.cs.hbs", "class A { }");
    let err = ws
        .run(GeneratorSettings {
            mods_dir: Some(ws.path("Elsewhere")),
            ..ws.settings()
        })
        .unwrap_err();
    assert!(matches!(err, GenerateError::Config(_)), "{err}");
    assert!(!ws.path("Project/out/Gen/A.cs").exists());
}

#[test]
fn test_generate_reads_project_config() {
    let ws = Workspace::new();
    ws.write(
        "Project/overlay-gen.toml",
        &format!(
            "[generator]\nmods_dir = {:?}\noutput_dir = \"build\"\nwrite_diffs = true\n",
            ws.path("Mods").display().to_string()
        ),
    );
    ws.write("Project/UserCode/Items/Foo.override.cs.hbs", "{{load_core_source \"Items/Foo.cs\"}}");

    let report = generate(&ws.project(), GeneratorSettings::default()).expect("Should generate");
    assert_eq!(report.patches, vec![vp("Items/Foo.cs.patch")]);
    assert_eq!(ws.read("Project/build/Items/Foo.override.cs"), FOO);

    let patch = PatchDocument::parse(&ws.read("Project/build/Items/Foo.cs.patch")).expect("Should parse patch");
    assert!(patch.hunks.is_empty());
}

#[test]
fn test_data_files() {
    let ws = Workspace::new();
    ws.write("Project/Data/items.toml", "[[item]]\nname = \"Axe\"\n\n[[item]]\nname = \"Pick\"\n");
    ws.write(
        "Project/UserCode/Gen/Items.cs.hbs",
        "{{#with (load_data \"items.toml\")}}{{#each item}}class {{name}} { }\n{{/each}}{{/with}}",
    );

    ws.run(ws.settings()).expect("Should generate");
    assert_eq!(ws.read("Project/out/Gen/Items.cs"), "class Axe { }\nclass Pick { }\n");
}

#[test]
fn test_yaml_data_files() {
    let ws = Workspace::new();
    ws.write("Project/Data/items.yml", "item:\n  - name: Axe\n  - name: Pick\n");
    ws.write(
        "Project/UserCode/Gen/Items.cs.hbs",
        "{{#with (load_data \"items.yml\")}}{{#each item}}class {{name}} { }\n{{/each}}{{/with}}",
    );

    ws.run(ws.settings()).expect("Should generate");
    assert_eq!(ws.read("Project/out/Gen/Items.cs"), "class Axe { }\nclass Pick { }\n");
}
