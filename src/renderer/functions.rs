//! Helpers available to templates

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::nodes::{describe, source_text, TemplateNode};
use super::regex::{build_regex, first_match_groups, replace_capture, GroupReplacements};
use super::{Environment, OutputRequest, RenderError};
use crate::diff::{apply_strict, ApplyOptions, PatchDocument};
use crate::generator::{override_path, BASE_MOUNT, DATA_DIR};
use crate::structure::{
    self, deepest, filter_regex, filter_text, find_all, find_by_kind_and_name,
    find_unique_by_kind_and_name, resolve_anchor, shallowest, DeclKind, NodeFilter, NodePredicate,
    Replacement,
};
use crate::syntax::{parse, SyntaxNode, SyntaxTree};
use crate::vfs::VirtualPath;

/// One template helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Include,
    RegexReplace,
    RegexMatch,
    ReplaceCapture,
    GetClass,
    GetMethod,
    GetField,
    GetProperty,
    ReplaceClass,
    ReplaceMethod,
    ReplaceField,
    ReplaceProperty,
    InsertMember,
    FindNodes,
    FilterKind,
    FilterText,
    FilterRegex,
    Shallowest,
    Deepest,
    Ancestors,
    FindNodeWithText,
    ReplaceNode,
    Text,
    Kind,
    LoadData,
    LoadCoreSource,
    ListCoreFiles,
    WriteFile,
    WriteOverrideFile,
    ApplyPatch,
    Log,
    Inspect,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::Include,
        Capability::RegexReplace,
        Capability::RegexMatch,
        Capability::ReplaceCapture,
        Capability::GetClass,
        Capability::GetMethod,
        Capability::GetField,
        Capability::GetProperty,
        Capability::ReplaceClass,
        Capability::ReplaceMethod,
        Capability::ReplaceField,
        Capability::ReplaceProperty,
        Capability::InsertMember,
        Capability::FindNodes,
        Capability::FilterKind,
        Capability::FilterText,
        Capability::FilterRegex,
        Capability::Shallowest,
        Capability::Deepest,
        Capability::Ancestors,
        Capability::FindNodeWithText,
        Capability::ReplaceNode,
        Capability::Text,
        Capability::Kind,
        Capability::LoadData,
        Capability::LoadCoreSource,
        Capability::ListCoreFiles,
        Capability::WriteFile,
        Capability::WriteOverrideFile,
        Capability::ApplyPatch,
        Capability::Log,
        Capability::Inspect,
    ];

    /// Helper name as used in templates.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Include => "include",
            Capability::RegexReplace => "regex_replace",
            Capability::RegexMatch => "regex_match",
            Capability::ReplaceCapture => "replace_capture",
            Capability::GetClass => "cs_get_class",
            Capability::GetMethod => "cs_get_method",
            Capability::GetField => "cs_get_field",
            Capability::GetProperty => "cs_get_property",
            Capability::ReplaceClass => "cs_replace_class",
            Capability::ReplaceMethod => "cs_replace_method",
            Capability::ReplaceField => "cs_replace_field",
            Capability::ReplaceProperty => "cs_replace_property",
            Capability::InsertMember => "cs_insert_member",
            Capability::FindNodes => "cs_find_nodes",
            Capability::FilterKind => "cs_filter_kind",
            Capability::FilterText => "cs_filter_text",
            Capability::FilterRegex => "cs_filter_regex",
            Capability::Shallowest => "cs_shallowest",
            Capability::Deepest => "cs_deepest",
            Capability::Ancestors => "cs_ancestors",
            Capability::FindNodeWithText => "cs_find_node_with_text",
            Capability::ReplaceNode => "cs_replace_node",
            Capability::Text => "cs_text",
            Capability::Kind => "cs_kind",
            Capability::LoadData => "load_data",
            Capability::LoadCoreSource => "load_core_source",
            Capability::ListCoreFiles => "list_core_files",
            Capability::WriteFile => "write_file",
            Capability::WriteOverrideFile => "write_override_file",
            Capability::ApplyPatch => "apply_patch",
            Capability::Log => "log",
            Capability::Inspect => "inspect",
        }
    }

    /// Run the helper.
    ///
    /// `Include` yields the source of the named template; rendering it in
    /// place is up to the renderer.
    pub fn invoke(self, call: &Call, env: &Environment<'_>) -> Result<Value, RenderError> {
        let args = Args {
            helper: self.name(),
            call,
        };
        match self {
            Capability::Include => {
                let (_, source) = env.resolver().load(args.str(0)?)?;
                Ok(Value::String(source))
            }
            Capability::RegexReplace => {
                let regex = args.regex(1, args.opt_str(3)?)?;
                Ok(regex.replace_all(args.str(0)?, args.str(2)?).into_owned().into())
            }
            Capability::RegexMatch => {
                let regex = args.regex(1, args.opt_str(2)?)?;
                Ok(json!(first_match_groups(&regex, args.str(0)?)))
            }
            Capability::ReplaceCapture => {
                let regex = args.regex(1, args.opt_str(3)?)?;
                let replacements = args.group_replacements(2)?;
                Ok(replace_capture(&regex, args.str(0)?, &replacements)?.into())
            }
            Capability::GetClass => get_declaration(&args, DeclKind::Class),
            Capability::GetMethod => get_declaration(&args, DeclKind::Method),
            Capability::GetField => get_declaration(&args, DeclKind::Field),
            Capability::GetProperty => get_declaration(&args, DeclKind::Property),
            Capability::ReplaceClass => replace_declaration(&args, DeclKind::Class),
            Capability::ReplaceMethod => replace_declaration(&args, DeclKind::Method),
            Capability::ReplaceField => replace_declaration(&args, DeclKind::Field),
            Capability::ReplaceProperty => replace_declaration(&args, DeclKind::Property),
            Capability::InsertMember => {
                let tree = args.tree(0)?;
                let class = find_unique_by_kind_and_name(&tree.root(), DeclKind::Class, args.str(1)?)?;
                let edited = structure::insert(&tree, &class, args.content(2)?)?;
                Ok(edited.to_string().into())
            }
            Capability::FindNodes => {
                let tree = args.tree(0)?;
                let predicate = NodePredicate::new().with_filter(args.filter(1)?);
                Ok(node_list(&find_all(&tree.root(), &predicate)))
            }
            Capability::FilterKind => {
                let filter = args.filter(1)?;
                let nodes: Vec<TemplateNode> = args
                    .nodes(0)?
                    .into_iter()
                    .filter(|node| filter.matches(node.anchor.kind))
                    .collect();
                Ok(TemplateNode::list_to_value(&nodes))
            }
            Capability::FilterText => Ok(TemplateNode::list_to_value(&filter_text(
                &args.nodes(0)?,
                args.str(1)?,
            ))),
            Capability::FilterRegex => {
                let regex = args.regex(1, None)?;
                Ok(TemplateNode::list_to_value(&filter_regex(&args.nodes(0)?, &regex)))
            }
            Capability::Shallowest => Ok(shallowest(&args.nodes(0)?)?.to_value()),
            Capability::Deepest => Ok(deepest(&args.nodes(0)?)?.to_value()),
            Capability::Ancestors => {
                let tree = args.tree(0)?;
                let node = resolve_anchor(&tree, &args.node(1)?.anchor)?;
                Ok(node_list(&node.ancestors_and_self()[1..]))
            }
            Capability::FindNodeWithText => {
                let tree = args.tree(0)?;
                let predicate = NodePredicate::new()
                    .with_filter(args.filter(1)?)
                    .with_text(args.str(2)?);
                let found = deepest(&find_all(&tree.root(), &predicate))?;
                Ok(TemplateNode::from(&found).to_value())
            }
            Capability::ReplaceNode => {
                let tree = args.tree(0)?;
                let target = resolve_anchor(&tree, &args.node(1)?.anchor)?;
                let edited = structure::replace(&tree, &target, args.content(2)?)?;
                Ok(edited.to_string().into())
            }
            Capability::Text => Ok(args.node(0)?.anchor.text.into()),
            Capability::Kind => Ok(args.node(0)?.anchor.kind.name().into()),
            Capability::LoadData => load_data(&args, env),
            Capability::LoadCoreSource => {
                let path = VirtualPath::new(BASE_MOUNT)?.join(args.str(0)?)?;
                Ok(env.vfs().read_to_string(&path)?.into())
            }
            Capability::ListCoreFiles => list_core_files(&args, env),
            Capability::WriteFile => {
                env.request_write(OutputRequest {
                    path: VirtualPath::new(args.str(1)?)?,
                    contents: args.str(0)?.to_string(),
                });
                Ok(Value::Null)
            }
            Capability::WriteOverrideFile => {
                let source = VirtualPath::new(args.str(1)?)?;
                env.request_write(OutputRequest {
                    path: override_path(&source)?,
                    contents: args.str(0)?.to_string(),
                });
                Ok(Value::Null)
            }
            Capability::ApplyPatch => {
                let document = PatchDocument::parse(args.str(1)?)?;
                let options = ApplyOptions {
                    max_offset: env.max_patch_offset(),
                };
                Ok(apply_strict(args.str(0)?, &document.hunks, &options)?.into())
            }
            Capability::Log => {
                let message = match args.value(0)? {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                tracing::info!(template = %env.template_path(), "{message}");
                for value in call.args.iter().skip(1) {
                    tracing::info!(template = %env.template_path(), "{}", pretty(value));
                }
                Ok(Value::Null)
            }
            Capability::Inspect => Ok(pretty(args.value(0)?).into()),
        }
    }
}

/// Arguments of a helper call: positional values plus `key=value` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    pub args: Vec<Value>,
    pub hash: Map<String, Value>,
}

impl Call {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            hash: Map::new(),
        }
    }
}

struct Args<'a> {
    helper: &'static str,
    call: &'a Call,
}

impl<'a> Args<'a> {
    fn error(&self, message: impl Into<String>) -> RenderError {
        RenderError::Argument {
            helper: self.helper,
            message: message.into(),
        }
    }

    fn value(&self, index: usize) -> Result<&'a Value, RenderError> {
        self.call
            .args
            .get(index)
            .ok_or_else(|| self.error(format!("missing argument {}", index + 1)))
    }

    fn str(&self, index: usize) -> Result<&'a str, RenderError> {
        match self.value(index)? {
            Value::String(text) => Ok(text.as_str()),
            other => Err(self.error(format!(
                "argument {} must be a string, got {}",
                index + 1,
                describe(other)
            ))),
        }
    }

    fn opt_str(&self, index: usize) -> Result<Option<&'a str>, RenderError> {
        match self.call.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.str(index).map(Some),
        }
    }

    fn source(&self, index: usize) -> Result<std::borrow::Cow<'a, str>, RenderError> {
        source_text(self.value(index)?).map_err(|message| self.error(message))
    }

    /// Parse the source argument at `index`.
    fn tree(&self, index: usize) -> Result<SyntaxTree, RenderError> {
        let source = self.source(index)?;
        parse(&source).map_err(|err| {
            tracing::debug!("{}", err.format(&source, self.helper));
            err.into()
        })
    }

    fn node(&self, index: usize) -> Result<TemplateNode, RenderError> {
        TemplateNode::from_value(self.value(index)?).map_err(|message| self.error(message))
    }

    fn nodes(&self, index: usize) -> Result<Vec<TemplateNode>, RenderError> {
        TemplateNode::list_from_value(self.value(index)?).map_err(|message| self.error(message))
    }

    fn filter(&self, index: usize) -> Result<NodeFilter, RenderError> {
        Ok(self.str(index)?.parse::<NodeFilter>()?)
    }

    fn regex(&self, index: usize, options: Option<&str>) -> Result<Regex, RenderError> {
        let pattern = self.str(index)?;
        build_regex(pattern, options).map_err(|source| RenderError::Regex {
            pattern: pattern.to_string(),
            source,
        })
    }

    /// Replacement content: text, or a node whose full text is used.
    fn content(&self, index: usize) -> Result<Replacement, RenderError> {
        match self.value(index)? {
            Value::String(text) => Ok(Replacement::Text(text.clone())),
            Value::Object(_) => Ok(Replacement::Text(self.node(index)?.anchor.text)),
            other => Err(self.error(format!(
                "replacement must be text or a node, got {}",
                describe(other)
            ))),
        }
    }

    /// An array for groups 1..n, an object keyed by group name or number,
    /// or the call's `key=value` pairs when the argument is left out.
    fn group_replacements(&self, index: usize) -> Result<GroupReplacements, RenderError> {
        let text = |value: &Value| match value {
            Value::String(text) => Ok(text.clone()),
            other => Err(self.error(format!(
                "capture replacements must be strings, got {}",
                describe(other)
            ))),
        };
        let named = |map: &Map<String, Value>| {
            map.iter()
                .map(|(key, value)| -> Result<(String, String), RenderError> {
                    Ok((key.clone(), text(value)?))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(GroupReplacements::Named)
        };

        match self.call.args.get(index) {
            Some(Value::Array(items)) => items
                .iter()
                .map(text)
                .collect::<Result<Vec<_>, _>>()
                .map(GroupReplacements::Positional),
            Some(Value::Object(map)) => named(map),
            None if !self.call.hash.is_empty() => named(&self.call.hash),
            Some(other) => Err(self.error(format!(
                "capture replacements must be an array or an object, got {}",
                describe(other)
            ))),
            None => Err(self.error("missing capture replacements")),
        }
    }
}

fn node_list(nodes: &[SyntaxNode]) -> Value {
    Value::Array(
        nodes
            .iter()
            .map(|node| TemplateNode::from(node).to_value())
            .collect(),
    )
}

fn pretty(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn get_declaration(args: &Args<'_>, kind: DeclKind) -> Result<Value, RenderError> {
    let tree = args.tree(0)?;
    let found = find_by_kind_and_name(&tree.root(), kind, args.str(1)?)?;
    Ok(TemplateNode::from(&found).to_value())
}

fn replace_declaration(args: &Args<'_>, kind: DeclKind) -> Result<Value, RenderError> {
    let tree = args.tree(0)?;
    let target = find_unique_by_kind_and_name(&tree.root(), kind, args.str(1)?)?;
    let edited = structure::replace(&tree, &target, args.content(2)?)?;
    Ok(edited.to_string().into())
}

fn load_data(args: &Args<'_>, env: &Environment<'_>) -> Result<Value, RenderError> {
    let path = VirtualPath::new(DATA_DIR)?.join(args.str(0)?)?;
    let text = env.vfs().read_to_string(&path)?;
    let extension = path
        .file_name()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension.to_ascii_lowercase());

    let parsed = match extension.as_deref() {
        Some("toml") => toml::from_str::<Value>(&text).map_err(|e| e.to_string()),
        Some("json") => serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()),
        Some("yaml" | "yml") => serde_yaml::from_str::<Value>(&text).map_err(|e| e.to_string()),
        _ => Err("expected a .toml, .json, .yaml or .yml file".to_string()),
    };
    parsed.map_err(|message| RenderError::Data { path, message })
}

fn list_core_files(args: &Args<'_>, env: &Environment<'_>) -> Result<Value, RenderError> {
    let base = VirtualPath::new(BASE_MOUNT)?;
    let query = base.join(args.str(0)?)?;

    let mut files = Vec::new();
    for entry in env.vfs().enumerate(&query) {
        let entry = entry?;
        let relative = entry
            .virtual_path
            .strip_prefix(&base)
            .unwrap_or_else(|| entry.virtual_path.clone());
        files.push(json!({
            "path": relative.as_str(),
            "name": relative.file_name().unwrap_or_default(),
            "directory": relative.parent().map(|p| p.to_string()).unwrap_or_default(),
        }));
    }
    Ok(Value::Array(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PROJECT_MOUNT;
    use crate::template::{ScanRules, TemplateResolver, TemplateSet};
    use crate::vfs::Vfs;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const FOO: &str = "\
namespace Game
{
    public class Foo
    {
        public int Value() { return 1; }

        public int Other() { return 2; }
    }
}
";

    struct Fixture {
        _dirs: (TempDir, TempDir),
        vfs: Vfs,
        resolver: TemplateResolver,
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> Fixture {
        let core = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write(core.path(), "Items/Foo.cs", FOO);
        write(core.path(), "Items/Bar.cs", "class Bar { }\n");
        write(project.path(), "Data/items.toml", "names = [\"a\", \"b\"]\n");
        write(project.path(), "Data/items.json", "{\"count\": 2}");
        write(project.path(), "Data/items.yaml", "items:\n  - name: Axe\n    damage: 3\n  - name: Pick\n");
        write(project.path(), "Data/notes.txt", "plain");
        write(project.path(), "Templates/header.hbs", "// header\n");

        let mut vfs = Vfs::new();
        vfs.mount(BASE_MOUNT, core.path(), true).unwrap();
        vfs.mount(PROJECT_MOUNT, project.path(), true).unwrap();
        let templates = TemplateSet::scan(
            project.path().join("Templates"),
            Some("Project"),
            &ScanRules::default(),
        )
        .unwrap();
        Fixture {
            _dirs: (core, project),
            vfs,
            resolver: TemplateResolver::new(vec![templates]),
        }
    }

    fn call(f: &Fixture, capability: Capability, args: Vec<Value>) -> Result<Value, RenderError> {
        let env = Environment::new(&f.resolver, &f.vfs, VirtualPath::new("Test.cs").unwrap());
        capability.invoke(&Call::new(args), &env)
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = Capability::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Capability::ALL.len());
    }

    #[test]
    fn test_get_and_replace_method() {
        let f = fixture();
        let method = call(&f, Capability::GetMethod, vec![json!(FOO), json!("Other")]).unwrap();
        assert_eq!(method["kind"], "MethodDeclaration");
        assert_eq!(method["name"], "Other");

        let replaced = call(
            &f,
            Capability::ReplaceMethod,
            vec![
                json!(FOO),
                json!("Other"),
                json!("public int Other() { return 3; }"),
            ],
        )
        .unwrap();
        assert_eq!(
            replaced.as_str().unwrap(),
            FOO.replace("return 2;", "return 3;")
        );
    }

    #[test]
    fn test_replace_node_from_earlier_search() {
        let f = fixture();
        let node = call(
            &f,
            Capability::FindNodeWithText,
            vec![json!(FOO), json!("statement"), json!("return 1")],
        )
        .unwrap();
        assert_eq!(node["kind"], "ReturnStatement");

        let replaced = call(
            &f,
            Capability::ReplaceNode,
            vec![json!(FOO), node, json!("return 42;")],
        )
        .unwrap();
        assert_eq!(
            replaced.as_str().unwrap(),
            FOO.replace("return 1;", "return 42;")
        );
    }

    #[test]
    fn test_node_list_helpers() {
        let f = fixture();
        let methods = call(&f, Capability::FindNodes, vec![json!(FOO), json!("method")]).unwrap();
        assert_eq!(methods.as_array().unwrap().len(), 2);

        let other = call(&f, Capability::FilterText, vec![methods.clone(), json!("Other")]).unwrap();
        assert_eq!(other.as_array().unwrap().len(), 1);

        let by_regex =
            call(&f, Capability::FilterRegex, vec![methods.clone(), json!(r"return \d")]).unwrap();
        assert_eq!(by_regex.as_array().unwrap().len(), 2);

        let blocks = call(&f, Capability::FindNodes, vec![json!(FOO), json!("Block")]).unwrap();
        let class = call(&f, Capability::GetClass, vec![json!(FOO), json!("Foo")]).unwrap();
        let mut nested = blocks.as_array().unwrap().clone();
        nested.push(class);
        let outer = call(&f, Capability::Shallowest, vec![Value::Array(nested)]).unwrap();
        assert_eq!(
            call(&f, Capability::Kind, vec![outer]).unwrap(),
            json!("ClassDeclaration")
        );

        let only_blocks = call(&f, Capability::FilterKind, vec![blocks, json!("Block")]).unwrap();
        assert_eq!(only_blocks.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_disjoint_selection_is_an_error() {
        let f = fixture();
        let methods = call(&f, Capability::FindNodes, vec![json!(FOO), json!("method")]).unwrap();
        assert!(matches!(
            call(&f, Capability::Deepest, vec![methods]),
            Err(RenderError::Structure(
                structure::StructureError::DisjointNodeSet { .. }
            ))
        ));
    }

    #[test]
    fn test_ancestors_of_found_node() {
        let f = fixture();
        let node = call(
            &f,
            Capability::FindNodeWithText,
            vec![json!(FOO), json!("statement"), json!("return 2")],
        )
        .unwrap();
        let ancestors = call(&f, Capability::Ancestors, vec![json!(FOO), node]).unwrap();
        let ancestors = ancestors.as_array().unwrap();
        let kinds: Vec<&str> = ancestors.iter().map(|n| n["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds.first(), Some(&"Block"));
        assert_eq!(kinds.last(), Some(&"CompilationUnit"));
        assert!(!kinds.contains(&"ReturnStatement"));

        let method = ancestors
            .iter()
            .find(|n| n["kind"] == "MethodDeclaration")
            .unwrap();
        assert_eq!(method["name"], "Other");
        assert!(kinds.contains(&"ClassDeclaration"));
        assert!(kinds.contains(&"NamespaceDeclaration"));
    }

    #[test]
    fn test_insert_member() {
        let f = fixture();
        let inserted = call(
            &f,
            Capability::InsertMember,
            vec![json!(FOO), json!("Foo"), json!("public int Third() { return 3; }")],
        )
        .unwrap();
        assert!(inserted
            .as_str()
            .unwrap()
            .contains("        public int Other() { return 2; }\n\n        public int Third() { return 3; }\n    }"));
    }

    #[test]
    fn test_regex_helpers() {
        let f = fixture();
        assert_eq!(
            call(
                &f,
                Capability::RegexReplace,
                vec![json!("Hello World"), json!("world"), json!("There"), json!("i")]
            )
            .unwrap(),
            json!("Hello There")
        );
        assert_eq!(
            call(
                &f,
                Capability::ReplaceCapture,
                vec![json!("Weight = 10;"), json!(r"= (\d+)"), json!(["20"])]
            )
            .unwrap(),
            json!("Weight = 20;")
        );

        let env = Environment::new(&f.resolver, &f.vfs, VirtualPath::root());
        let mut hash = Map::new();
        hash.insert("n".into(), json!("5"));
        let by_hash = Capability::ReplaceCapture
            .invoke(
                &Call {
                    args: vec![json!("x = 1"), json!(r"= (?P<n>\d)")],
                    hash,
                },
                &env,
            )
            .unwrap();
        assert_eq!(by_hash, json!("x = 5"));

        assert!(matches!(
            call(&f, Capability::RegexMatch, vec![json!("x"), json!("(")]),
            Err(RenderError::Regex { .. })
        ));
    }

    #[test]
    fn test_io_helpers() {
        let f = fixture();
        assert_eq!(
            call(&f, Capability::LoadCoreSource, vec![json!("Items/Bar.cs")]).unwrap(),
            json!("class Bar { }\n")
        );
        assert_eq!(
            call(&f, Capability::ListCoreFiles, vec![json!("Items")]).unwrap(),
            json!([
                {"path": "Items/Bar.cs", "name": "Bar.cs", "directory": "Items"},
                {"path": "Items/Foo.cs", "name": "Foo.cs", "directory": "Items"},
            ])
        );
        assert_eq!(
            call(&f, Capability::LoadData, vec![json!("items.toml")]).unwrap(),
            json!({"names": ["a", "b"]})
        );
        assert_eq!(
            call(&f, Capability::LoadData, vec![json!("items.json")]).unwrap()["count"],
            json!(2)
        );
        assert_eq!(
            call(&f, Capability::LoadData, vec![json!("items.yaml")]).unwrap(),
            json!({"items": [{"name": "Axe", "damage": 3}, {"name": "Pick"}]})
        );
        assert!(matches!(
            call(&f, Capability::LoadData, vec![json!("notes.txt")]),
            Err(RenderError::Data { .. })
        ));
        assert_eq!(
            call(&f, Capability::Include, vec![json!("header")]).unwrap(),
            json!("// header\n")
        );
    }

    #[test]
    fn test_writes_are_buffered() {
        let f = fixture();
        let env = Environment::new(&f.resolver, &f.vfs, VirtualPath::root());
        Capability::WriteFile
            .invoke(&Call::new(vec![json!("a"), json!("Gen/A.cs")]), &env)
            .unwrap();
        Capability::WriteOverrideFile
            .invoke(&Call::new(vec![json!("b"), json!("Items/Foo.cs")]), &env)
            .unwrap();
        let writes = env.take_writes();
        let paths: Vec<&str> = writes.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["Gen/A.cs", "Items/Foo.override.cs"]);
        assert!(env.take_writes().is_empty());
    }

    #[test]
    fn test_apply_patch_helper() {
        let f = fixture();
        let patched = FOO.replace("return 2;", "return 5;");
        let patch = PatchDocument::new("a", "b", crate::diff::diff(FOO, &patched)).to_string();
        assert_eq!(
            call(&f, Capability::ApplyPatch, vec![json!(FOO), json!(patch)]).unwrap(),
            json!(patched)
        );

        let unrelated = "nothing\nin\ncommon\n";
        assert!(matches!(
            call(&f, Capability::ApplyPatch, vec![json!(unrelated), json!(patch)]),
            Err(RenderError::Patch(_))
        ));
    }

    #[test]
    fn test_argument_errors() {
        let f = fixture();
        match call(&f, Capability::GetClass, vec![json!(FOO)]) {
            Err(RenderError::Argument { helper, message }) => {
                assert_eq!(helper, "cs_get_class");
                assert_eq!(message, "missing argument 2");
            }
            other => panic!("Expected Argument error, got {other:?}"),
        }
        assert!(matches!(
            call(&f, Capability::GetClass, vec![json!(FOO), json!(1)]),
            Err(RenderError::Argument { .. })
        ));
    }
}
