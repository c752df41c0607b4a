use pulldown_cmark::{html, Options, Parser};

use crate::render::{Block, Locals, RenderContext, TemplateEngine};
use crate::Result;

/// CommonMark to HTML. Locals and blocks are not used.
#[derive(Debug, Default)]
pub struct MarkdownEngine;

impl MarkdownEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for MarkdownEngine {
    fn render<'a>(
        &self,
        source: &str,
        ctx: &mut RenderContext<'a>,
        _locals: &Locals,
        _block: Option<&mut Block<'_, 'a>>,
    ) -> Result<()> {
        let parser = Parser::new_ext(source, Options::all());
        let mut output = String::new();
        html::push_html(&mut output, parser);
        ctx.emit(&output);
        Ok(())
    }
}
