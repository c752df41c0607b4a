use derivative::Derivative;
use eyre::WrapErr;
use tracing::{debug, instrument, trace};

use crate::core::config::LayoutSetting;
use crate::core::frontmatter::{split_document, FrontMatter};
use crate::core::site::{Extensions, Logger, Site};
use crate::core::{DataStore, Resource, SiteConfig, Sitemap, SourceFile};
use crate::render::{EngineId, FindOptions, Locals, RenderError, RenderOptions, Resolution};
use crate::{AbsPath, Result};

/// Content producer handed to engines and layouts. Whatever it emits into the
/// active buffer comes first, followed by the string it returns.
pub type Block<'b, 'a> = dyn FnMut(&mut RenderContext<'a>) -> Result<String> + 'b;

/// One in-flight render: its output buffer, the active engine and the locals
/// and options the render was started with.
#[derive(Debug, Clone, Default)]
struct Frame {
    buffer: String,
    engine: Option<EngineId>,
    locals: Locals,
    options: RenderOptions,
}

/// Per-page render state.
///
/// Output goes to the buffer of the innermost frame. Frames are only pushed
/// and popped by [`RenderContext::with_frame`] and
/// [`RenderContext::with_scoped_frame`], so every helper leaves the active
/// buffer, engine and locals as it found them, whether it succeeds or not.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RenderContext<'a> {
    #[derivative(Debug = "ignore")]
    site: &'a Site,
    current_path: Option<String>,
    base: Frame,
    stack: Vec<Frame>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        site: &'a Site,
        current_path: Option<&str>,
        locals: Locals,
        options: RenderOptions,
    ) -> Self {
        Self {
            site,
            current_path: current_path.map(ToOwned::to_owned),
            base: Frame {
                locals,
                options,
                ..Frame::default()
            },
            stack: vec![],
        }
    }

    pub fn for_resource(site: &'a Site, resource: &Resource) -> Self {
        Self::new(
            site,
            Some(resource.destination_path()),
            Locals::new(),
            RenderOptions::new(),
        )
    }

    pub fn site(&self) -> &'a Site {
        self.site
    }

    pub fn config(&self) -> &'a SiteConfig {
        self.site.config()
    }

    pub fn logger(&self) -> &'a Logger {
        self.site.logger()
    }

    pub fn sitemap(&self) -> &'a Sitemap {
        self.site.sitemap()
    }

    pub fn is_server_mode(&self) -> bool {
        self.site.is_server_mode()
    }

    pub fn is_build_mode(&self) -> bool {
        self.site.is_build_mode()
    }

    pub fn data(&self) -> &'a DataStore {
        self.site.data()
    }

    pub fn extensions(&self) -> &'a Extensions {
        self.site.extensions()
    }

    pub fn source_dir(&self) -> &'a AbsPath {
        self.site.source_dir()
    }

    /// Locals of the innermost render.
    pub fn locals(&self) -> &Locals {
        &self.frame().locals
    }

    /// Options of the innermost render.
    pub fn options(&self) -> &RenderOptions {
        &self.frame().options
    }

    /// Destination path of the page being rendered.
    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    pub fn current_resource(&self) -> Option<&'a Resource> {
        let path = self.current_path.as_deref()?;
        self.site.sitemap().find_resource_by_destination_path(path)
    }

    pub fn current_engine(&self) -> Option<&EngineId> {
        self.frame().engine.as_ref()
    }

    /// Number of frames pushed on top of the base frame.
    pub fn frame_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn buffer(&self) -> &str {
        &self.frame().buffer
    }

    pub fn emit(&mut self, text: &str) {
        self.frame_mut().buffer.push_str(text);
    }

    /// Swaps in an empty buffer and returns the previous one. Pair with
    /// [`RenderContext::restore_buffer`].
    pub fn save_buffer(&mut self) -> String {
        std::mem::take(&mut self.frame_mut().buffer)
    }

    /// Reinstates `previous` and returns what was written since the save.
    pub fn restore_buffer(&mut self, previous: String) -> String {
        std::mem::replace(&mut self.frame_mut().buffer, previous)
    }

    fn frame(&self) -> &Frame {
        self.stack.last().unwrap_or(&self.base)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(frame) => frame,
            None => &mut self.base,
        }
    }

    #[cfg(test)]
    fn set_engine(&mut self, engine: Option<EngineId>) -> Option<EngineId> {
        std::mem::replace(&mut self.frame_mut().engine, engine)
    }

    /// Runs `f` inside a fresh frame that keeps the enclosing locals and
    /// options.
    fn with_frame<T, F>(&mut self, engine: Option<EngineId>, f: F) -> (String, Result<T>)
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let locals = self.frame().locals.clone();
        let options = self.frame().options.clone();
        self.with_scoped_frame(engine, locals, options, f)
    }

    /// Runs `f` inside a fresh frame and returns the frame's buffer alongside
    /// the result. The frame is popped on every exit path.
    fn with_scoped_frame<T, F>(
        &mut self,
        engine: Option<EngineId>,
        locals: Locals,
        options: RenderOptions,
        f: F,
    ) -> (String, Result<T>)
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.stack.push(Frame {
            buffer: String::new(),
            engine,
            locals,
            options,
        });
        let depth = self.stack.len();
        let result = f(self);
        debug_assert_eq!(self.stack.len(), depth, "unbalanced render frames");
        self.stack.truncate(depth);
        let frame = self.stack.pop().unwrap_or_default();
        (frame.buffer, result)
    }

    /// Runs `block` into a fresh buffer and returns what it produced.
    pub fn capture(&mut self, block: &mut Block<'_, 'a>) -> Result<String> {
        let previous = self.save_buffer();
        let result = block(self);
        let captured = self.restore_buffer(previous);
        result.map(|returned| captured + &returned)
    }

    /// Renders `file` through each of its trailing engine extensions, right to
    /// left. Front matter locals are overridden by `locals`.
    #[instrument(skip(self, locals, options, block), fields(file = %file))]
    pub fn render_file(
        &mut self,
        file: &SourceFile,
        locals: &Locals,
        options: &RenderOptions,
        block: Option<&mut Block<'_, 'a>>,
    ) -> Result<String> {
        self.render_source(file, locals, options, block)
            .map(|(_, output)| output)
    }

    fn render_source(
        &mut self,
        file: &SourceFile,
        locals: &Locals,
        options: &RenderOptions,
        mut block: Option<&mut Block<'_, 'a>>,
    ) -> Result<(FrontMatter, String)> {
        if !file.exists() {
            return Err(RenderError::not_found(
                file.to_string(),
                vec![file.relative_path().to_slash_string()],
            )
            .into());
        }
        let raw = file.read().map_err(|source| RenderError::Read {
            path: file.to_string(),
            source,
        })?;
        let (front_matter, body) = split_document(&raw)
            .wrap_err_with(|| format!("invalid front matter in '{}'", file))?;
        let locals = front_matter.locals.merged(locals);

        let engines = self.site().engines();
        let passes = file
            .extensions()
            .into_iter()
            .rev()
            .take_while(|ext| engines.has_engine_for(ext))
            .map(EngineId::from)
            .collect::<Vec<_>>();

        let mut content = body.to_owned();
        for engine_id in passes {
            let engine = match engines.get(engine_id.as_str()) {
                Some(engine) => engine,
                None => continue,
            };
            trace!(engine = %engine_id, "running engine pass");
            let (output, result) = self.with_scoped_frame(
                Some(engine_id.clone()),
                locals.clone(),
                options.clone(),
                |ctx| engine.render(&content, ctx, &locals, block.as_deref_mut()),
            );
            result.map_err(|report| engine_error(file, &engine_id, report))?;
            content = output;
        }
        Ok((front_matter, content))
    }

    /// Renders the layout `layout_name` around whatever `body` produces and
    /// appends the result to the active buffer. The layout sees the locals and
    /// options of the render that asked for it.
    #[instrument(skip(self, body))]
    pub fn wrap_layout(
        &mut self,
        layout_name: &str,
        body: Option<&mut Block<'_, 'a>>,
    ) -> Result<()> {
        let layout = match self
            .site
            .resolver()
            .locate_layout(layout_name, self.current_engine())
        {
            Resolution::Found { file, .. } => file,
            Resolution::NotFound { tried } => {
                return Err(RenderError::not_found(layout_name, tried).into())
            }
        };
        let locals = self.locals().clone();
        let options = self.options().clone();
        self.wrap_located_layout(&layout, &locals, &options, body)
    }

    fn wrap_located_layout(
        &mut self,
        layout: &SourceFile,
        locals: &Locals,
        options: &RenderOptions,
        body: Option<&mut Block<'_, 'a>>,
    ) -> Result<()> {
        debug!(layout = %layout, "wrapping in layout");
        let engine = self.site.engines().engine_for_path(layout.relative_path());
        let (wrapped, result) = self.with_frame(engine, |ctx| {
            let content = match body {
                Some(body) => ctx.capture(body)?,
                None => String::new(),
            };
            let mut yield_content =
                |_: &mut RenderContext<'a>| -> Result<String> { Ok(content.clone()) };
            let yield_content: &mut Block<'_, 'a> = &mut yield_content;
            let rendered = ctx.render_file(layout, locals, options, Some(yield_content))?;
            ctx.emit(&rendered);
            Ok(())
        });
        result?;
        self.emit(&wrapped);
        Ok(())
    }

    /// Renders the partial or static file `reference` points to and returns
    /// its output. Nothing is written to the active buffer.
    #[instrument(skip(self, options, block))]
    pub fn render(
        &mut self,
        reference: &str,
        options: RenderOptions,
        block: Option<&mut Block<'_, 'a>>,
    ) -> Result<String> {
        let site = self.site;
        let hint = FindOptions {
            preferred_engine: options.preferred_engine.clone(),
            try_static: options.try_static,
        };
        let resolution =
            site.resolver()
                .resolve_partial(reference, self.current_path.as_deref(), &hint);

        let (file, is_template) = match resolution {
            Resolution::Found { file, is_template } => (file, is_template),
            Resolution::NotFound { tried } => {
                return Err(RenderError::not_found(reference, tried).into());
            }
        };

        if site
            .sitemap()
            .find_resource_by_source_path(file.relative_path())
            .is_none()
        {
            debug!(reference, file = %file, "partial is excluded from the sitemap, rendering nothing");
            return Ok(String::new());
        }

        if !is_template || site.engines().engine_for_path(file.relative_path()).is_none() {
            trace!(file = %file, "rendering static file verbatim");
            return file
                .read()
                .map_err(|source| {
                    RenderError::Read {
                        path: file.to_string(),
                        source,
                    }
                    .into()
                });
        }

        let (locals, options) = options.split_locals();
        self.render_file(&file, &locals, &options, block)
    }

    /// Renders a sitemap resource as a complete page, wrapped in its layout.
    #[instrument(skip(self, resource), fields(page = %resource.destination_path()))]
    pub fn render_resource(&mut self, resource: &Resource) -> Result<String> {
        let site = self.site;
        let file = resource.source_file();
        if !resource.is_template() {
            return file.read().map_err(|source| {
                RenderError::Read {
                    path: file.to_string(),
                    source,
                }
                .into()
            });
        }

        let locals = self.locals().clone();
        let options = self.options().clone();
        let (front_matter, content) = self.render_source(file, &locals, &options, None)?;

        let page_engine = site.engines().engine_for_path(file.relative_path());
        let (layout_name, required) = match front_matter.layout.as_ref().or(options.layout.as_ref()) {
            Some(LayoutSetting::Named(name)) => (name.as_str(), true),
            Some(LayoutSetting::Toggle(false)) => return Ok(content),
            Some(LayoutSetting::Toggle(true)) | None => match site.config().default_layout() {
                Some(name) => (name, false),
                None => return Ok(content),
            },
        };
        let layout = match site.resolver().locate_layout(layout_name, page_engine.as_ref()) {
            Resolution::Found { file, .. } => file,
            Resolution::NotFound { tried } if required => {
                return Err(RenderError::not_found(layout_name, tried).into())
            }
            Resolution::NotFound { .. } => {
                debug!(layout = layout_name, "default layout not found, skipping");
                return Ok(content);
            }
        };

        let locals = front_matter.locals.merged(&locals);
        let mut page_content = |_: &mut RenderContext<'a>| -> Result<String> { Ok(content.clone()) };
        let page_content: &mut Block<'_, 'a> = &mut page_content;
        let (output, result) = self.with_frame(page_engine, |ctx| {
            ctx.wrap_located_layout(&layout, &locals, &options, Some(page_content))
        });
        result.map(|_| output)
    }
}

fn engine_error(file: &SourceFile, engine: &EngineId, report: eyre::Report) -> eyre::Report {
    if RenderError::find(&report).is_some() {
        return report;
    }
    RenderError::Engine {
        path: file.to_string(),
        engine: engine.clone(),
        detail: format!("{:#}", report),
    }
    .into()
}
