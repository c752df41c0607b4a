use eyre::WrapErr;
use parking_lot::Mutex;
use tera::Tera;

use crate::render::{Block, Locals, RenderContext, TemplateEngine};
use crate::Result;

/// One-off Tera renders. Locals become the Tera context and the wrapped
/// content is bound to `yield`.
#[derive(Debug, Default)]
pub struct TeraEngine {
    renderer: Mutex<Tera>,
}

impl TeraEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateEngine for TeraEngine {
    fn render<'a>(
        &self,
        source: &str,
        ctx: &mut RenderContext<'a>,
        locals: &Locals,
        block: Option<&mut Block<'_, 'a>>,
    ) -> Result<()> {
        let mut context = tera::Context::from_serialize(locals)
            .wrap_err("failed converting locals into a tera context")?;
        let content = match block {
            Some(block) => ctx.capture(block)?,
            None => String::new(),
        };
        context.insert("yield", &content);

        let output = {
            let mut renderer = self.renderer.lock();
            renderer
                .render_str(source, &context)
                .wrap_err("failed rendering tera template")?
        };
        ctx.emit(&output);
        Ok(())
    }
}
