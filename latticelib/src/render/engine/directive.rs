use directive_parser::{Call, Expr, Node};
use eyre::{eyre, WrapErr};
use serde_json::Value;

use crate::render::{Block, Locals, RenderContext, RenderOptions, TemplateEngine};
use crate::Result;

/// Engine for the directive syntax:
///
/// - `{{ title }}`, `{{ page.meta.title }}`: locals, then `data.*` and `config.*`
/// - `{{ yield }}`: the wrapped content
/// - `{{ render("nav", key = "value") }}`: partial with locals
/// - `{% render("card") %} ... {% end %}`: partial whose `yield` is the body
/// - `{{ current_engine() }}`, `{{ log("message") }}`
/// - `{% wrap_layout("name") %} ... {% end %}`
#[derive(Debug, Default)]
pub struct DirectiveEngine;

impl DirectiveEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for DirectiveEngine {
    fn render<'a>(
        &self,
        source: &str,
        ctx: &mut RenderContext<'a>,
        locals: &Locals,
        block: Option<&mut Block<'_, 'a>>,
    ) -> Result<()> {
        let nodes = directive_parser::parse(source).wrap_err("failed parsing template")?;
        eval(&nodes, ctx, locals, block)
    }
}

fn eval<'a>(
    nodes: &[Node<'_>],
    ctx: &mut RenderContext<'a>,
    locals: &Locals,
    mut block: Option<&mut Block<'_, 'a>>,
) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => ctx.emit(text),
            Node::Expr(Expr::Yield) => {
                if let Some(block) = block.as_deref_mut() {
                    let content = block(ctx)?;
                    ctx.emit(&content);
                }
            }
            Node::Expr(Expr::Lookup(path)) => {
                let value = lookup(ctx, locals, path)?;
                ctx.emit(&display_value(&value));
            }
            Node::Expr(Expr::Call(call)) => call_function(call, ctx)?,
            Node::Block { call, body } => {
                call_block(call, body, ctx, locals, block.as_deref_mut())?;
            }
        }
    }
    Ok(())
}

fn lookup(ctx: &RenderContext<'_>, locals: &Locals, path: &[&str]) -> Result<Value> {
    let found = match path.split_first() {
        Some((&"data", rest)) if locals.get("data").is_none() => ctx.data().lookup(rest),
        Some((&"config", rest)) if locals.get("config").is_none() => ctx.config().lookup(rest),
        _ => locals.lookup(path),
    };
    found
        .cloned()
        .ok_or_else(|| eyre!("undefined value '{}'", path.join(".")))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn partial_name<'c>(call: &'c Call<'_>) -> Result<&'c str> {
    call.str_arg(0)
        .ok_or_else(|| eyre!("`render` requires a partial name"))
}

fn keyword_locals(call: &Call<'_>) -> Locals {
    call.keywords()
        .iter()
        .map(|(key, value)| (*key, value.clone()))
        .collect()
}

fn call_function(call: &Call<'_>, ctx: &mut RenderContext<'_>) -> Result<()> {
    match call.name() {
        "render" => {
            let options = RenderOptions::new().with_locals(keyword_locals(call));
            let output = ctx.render(partial_name(call)?, options, None)?;
            ctx.emit(&output);
        }
        "current_engine" => {
            let engine = ctx
                .current_engine()
                .map(|engine| engine.to_string())
                .unwrap_or_default();
            ctx.emit(&engine);
        }
        "log" => {
            let message = call
                .str_arg(0)
                .ok_or_else(|| eyre!("`log` requires a message"))?;
            ctx.logger().info(message);
        }
        other => return Err(eyre!("unknown function '{}'", other)),
    }
    Ok(())
}

fn call_block<'a>(
    call: &Call<'_>,
    body: &[Node<'_>],
    ctx: &mut RenderContext<'a>,
    locals: &Locals,
    mut block: Option<&mut Block<'_, 'a>>,
) -> Result<()> {
    match call.name() {
        "wrap_layout" => {
            let layout = call
                .str_arg(0)
                .ok_or_else(|| eyre!("`wrap_layout` requires a layout name"))?;
            let mut producer = |ctx: &mut RenderContext<'a>| -> Result<String> {
                eval(body, ctx, locals, block.as_deref_mut())?;
                Ok(String::new())
            };
            let producer: &mut Block<'_, 'a> = &mut producer;
            ctx.wrap_layout(layout, Some(producer))
        }
        "render" => {
            let reference = partial_name(call)?;
            let mut producer = |ctx: &mut RenderContext<'a>| -> Result<String> {
                eval(body, ctx, locals, block.as_deref_mut())?;
                Ok(String::new())
            };
            let producer: &mut Block<'_, 'a> = &mut producer;
            let options = RenderOptions::new().with_locals(keyword_locals(call));
            let output = ctx.render(reference, options, Some(producer))?;
            ctx.emit(&output);
            Ok(())
        }
        other => Err(eyre!("unknown block '{}'", other)),
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;
    use crate::core::{Mode, Site};
    use crate::render::RenderError;
    use crate::test::rel;
    use serde_json::json;
    use temptree::temptree;

    fn render_str(site: &Site, source: &str, locals: &Locals) -> Result<String> {
        let mut ctx = RenderContext::new(site, None, Locals::new(), RenderOptions::new());
        let mut run = |ctx: &mut RenderContext<'_>| -> Result<String> {
            DirectiveEngine::new().render(source, ctx, locals, None)?;
            Ok(String::new())
        };
        ctx.capture(&mut run)
    }

    fn empty_site(tree: &tempfile::TempDir) -> Site {
        Site::load(tree.path(), Mode::Build).unwrap()
    }

    #[test]
    fn renders_text_and_lookups() {
        let tree = temptree! { source: {} };
        let site = empty_site(&tree);
        let locals = Locals::new().with("page", json!({"title": "Home"})).with("count", 3);

        let out = render_str(&site, "<h1>{{ page.title }}</h1>{{ count }}", &locals).unwrap();
        assert_eq!(out, "<h1>Home</h1>3");
    }

    #[test]
    fn looks_up_data_and_config() {
        let tree = temptree! {
            "site.toml": "[meta]\nname = \"Lattice\"",
            source: {},
            data: { "nav.toml": "first = \"home\"" },
        };
        let site = empty_site(&tree);

        let out = render_str(&site, "{{ config.name }}/{{ data.nav.first }}", &Locals::new()).unwrap();
        assert_eq!(out, "Lattice/home");
    }

    #[test]
    fn undefined_value_fails() {
        let tree = temptree! { source: {} };
        let site = empty_site(&tree);
        assert!(render_str(&site, "{{ missing }}", &Locals::new()).is_err());
    }

    #[test]
    fn yield_without_block_is_empty() {
        let tree = temptree! { source: {} };
        let site = empty_site(&tree);
        let out = render_str(&site, "[{{ yield }}]", &Locals::new()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn unknown_function_fails() {
        let tree = temptree! { source: {} };
        let site = empty_site(&tree);
        assert!(render_str(&site, "{{ nope() }}", &Locals::new()).is_err());
    }

    #[test]
    fn render_passes_keyword_locals() {
        let tree = temptree! {
            source: {
                "_greeting.tpl": "hello {{ name }}",
            },
        };
        let site = empty_site(&tree);
        let out = render_str(&site, r#"{{ render("greeting", name = "sam") }}!"#, &Locals::new()).unwrap();
        assert_eq!(out, "hello sam!");
    }

    #[test]
    fn render_block_becomes_partial_yield() {
        let tree = temptree! {
            source: {
                "_card.tpl": "<div class=\"{{ kind }}\">{{ yield }}</div>",
            },
        };
        let site = empty_site(&tree);
        let locals = Locals::new().with("who", "sam");
        let out = render_str(
            &site,
            r#"{% render("card", kind = "note") %}hi {{ who }}{% end %}"#,
            &locals,
        )
        .unwrap();
        assert_eq!(out, "<div class=\"note\">hi sam</div>");
    }

    #[test]
    fn missing_partial_surfaces_render_error() {
        let tree = temptree! { source: {} };
        let site = empty_site(&tree);
        let err = render_str(&site, r#"{{ render("missing") }}"#, &Locals::new()).unwrap_err();
        assert!(RenderError::find(&err).map_or(false, RenderError::is_not_found));
    }
}
