//! Handlebars implementation of [`TemplateRenderer`]

use handlebars::{
    no_escape, Context, Handlebars, Helper, HelperDef, RenderContext,
    RenderError as HandlebarsError, RenderErrorReason, ScopedJson,
};
use serde_json::Value;

use super::functions::{Call, Capability};
use super::{Environment, RenderError, TemplateRenderer};

/// Renders handlebars templates in strict mode without HTML escaping.
///
/// A fresh registry is built per render so every helper can reach that
/// render's [`Environment`].
#[derive(Debug, Clone)]
pub struct HandlebarsRenderer {
    capabilities: Vec<Capability>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self {
            capabilities: Capability::ALL.to_vec(),
        }
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only register the given helpers.
    pub fn with_capabilities(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
        }
    }

    fn registry<'env>(&self, env: &'env Environment<'env>) -> Handlebars<'env> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(no_escape);
        for &capability in &self.capabilities {
            registry.register_helper(capability.name(), Box::new(CapabilityHelper { capability, env }));
        }
        registry
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, source: &str, name: &str, env: &Environment<'_>) -> Result<String, RenderError> {
        let mut registry = self.registry(env);
        registry
            .register_template_string(name, source)
            .map_err(|e| RenderError::Template {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        registry.render(name, env.variables()).map_err(|e| {
            env.take_failure().unwrap_or_else(|| RenderError::Template {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
    }
}

struct CapabilityHelper<'env> {
    capability: Capability,
    env: &'env Environment<'env>,
}

impl CapabilityHelper<'_> {
    fn include<'reg>(
        &self,
        source: &str,
        registry: &Handlebars<'reg>,
        ctx: &Context,
    ) -> Result<Value, RenderError> {
        registry
            .render_template_with_context(source, ctx)
            .map(Value::String)
            .map_err(|e| RenderError::Template {
                name: format!("{} (included)", self.env.template_path()),
                message: e.to_string(),
            })
    }
}

impl HelperDef for CapabilityHelper<'_> {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, HandlebarsError> {
        let call = Call {
            args: h.params().iter().map(|p| p.value().clone()).collect(),
            hash: h
                .hash()
                .iter()
                .map(|(key, value)| (key.to_string(), value.value().clone()))
                .collect(),
        };

        let result = self
            .capability
            .invoke(&call, self.env)
            .and_then(|value| match (self.capability, value) {
                (Capability::Include, Value::String(source)) => self.include(&source, r, ctx),
                (_, value) => Ok(value),
            });

        match result {
            Ok(value) => Ok(ScopedJson::Derived(value)),
            Err(error) => {
                let message = format!("{}: {error}", self.capability.name());
                self.env.record_failure(error);
                Err(RenderErrorReason::Other(message).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ScanRules, TemplateResolver, TemplateSet};
    use crate::vfs::{Vfs, VirtualPath};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn resolver_with(templates: &[(&str, &str)]) -> (TempDir, TemplateResolver) {
        let dir = TempDir::new().unwrap();
        for (name, source) in templates {
            fs::write(dir.path().join(name), source).unwrap();
        }
        let set = TemplateSet::scan(dir.path(), Some("Project"), &ScanRules::default()).unwrap();
        (dir, TemplateResolver::new(vec![set]))
    }

    fn render(source: &str, resolver: &TemplateResolver, variables: Value) -> Result<String, RenderError> {
        let vfs = Vfs::new();
        let env = Environment::new(resolver, &vfs, VirtualPath::new("Out.cs").unwrap())
            .with_variables(variables);
        HandlebarsRenderer::new().render(source, "Out.cs", &env)
    }

    #[test]
    fn test_no_html_escaping() {
        let (_dir, resolver) = resolver_with(&[]);
        let out = render("{{value}}", &resolver, json!({"value": "List<int> a = b && c;"})).unwrap();
        assert_eq!(out, "List<int> a = b && c;");
    }

    #[test]
    fn test_strict_mode_rejects_missing_variables() {
        let (_dir, resolver) = resolver_with(&[]);
        assert!(matches!(
            render("{{missing}}", &resolver, json!({})),
            Err(RenderError::Template { .. })
        ));
    }

    #[test]
    fn test_include_renders_in_current_context() {
        let (_dir, resolver) = resolver_with(&[("header.hbs", "// {{title}}\n")]);
        let out = render(
            "{{include \"header\"}}class {{title}} { }",
            &resolver,
            json!({"title": "Foo"}),
        )
        .unwrap();
        assert_eq!(out, "// Foo\nclass Foo { }");
    }

    #[test]
    fn test_helper_error_is_kept() {
        let (_dir, resolver) = resolver_with(&[]);
        match render("{{cs_get_class \"class A { }\" \"B\"}}", &resolver, json!({})) {
            Err(RenderError::Structure(err)) => {
                assert!(err.to_string().contains("'B'"), "{err}")
            }
            other => panic!("Expected a structure error, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_helpers() {
        let (_dir, resolver) = resolver_with(&[]);
        let out = render(
            "{{cs_text (cs_get_method src \"Run\")}}",
            &resolver,
            json!({"src": "class A\n{\n    void Run() { }\n}\n"}),
        )
        .unwrap();
        assert_eq!(out, "    void Run() { }\n");
    }
}
