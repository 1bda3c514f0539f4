//! Compiling and rendering views.
//!
//! The [`Engine`] owns the view folder, host compiler, activator factory
//! and compiled view cache, and runs the build pipeline: parse each
//! template named by a [`Descriptor`], rewrite the node trees, lower them
//! to chunks, resolve included partials, check declarations, generate the
//! render routine source and hand it to the host compiler. The finished
//! view is cached until any constituent template changes.

use crate::{
    activate::{DefaultViewActivator, ViewActivatorFactory},
    cache::{CompiledView, Descriptor, ViewCache},
    chunk::{Chunk, ChunkBuilder, Declarations},
    compiler::{DirectCompiler, GeneratedView, HostCompiler, View},
    context::RenderContext,
    folder::{Signature, ViewFolder},
    generate::generate,
    log::{Error, COMPILE_FAILURE, MISSING_TEMPLATE},
    markup::MarkupGrammar,
    render::ViewProgram,
    rewrite,
};
use std::{collections::HashSet, fmt::Write, sync::Arc};

/// Included templates may nest up to this many levels.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Compiles descriptors into cached views and renders them.
///
/// # Examples
///
/// ```
/// use cinder::{Descriptor, Engine, MemoryFolder, RenderContext};
///
/// let folder = MemoryFolder::new().with("home", "hello, ${name}!");
/// let engine = Engine::new(folder);
///
/// let descriptor = Descriptor::new().add_template("home");
/// let context = RenderContext::new().with_must("name", "taylor");
///
/// assert_eq!(engine.render(&descriptor, &context).unwrap(), "hello, taylor!");
/// ```
pub struct Engine {
    folder: Box<dyn ViewFolder>,
    compiler: Box<dyn HostCompiler>,
    activator: Box<dyn ViewActivatorFactory>,
    cache: ViewCache,
    /// Element names bound to engine extensions by the rewrite passes.
    extensions: HashSet<String>,
}

impl Engine {
    /// Create a new Engine over the given view folder, with the default
    /// host compiler and activator.
    pub fn new<F>(folder: F) -> Self
    where
        F: ViewFolder + 'static,
    {
        Self {
            folder: Box::new(folder),
            compiler: Box::new(DirectCompiler),
            activator: Box::new(DefaultViewActivator),
            cache: ViewCache::new(),
            extensions: HashSet::new(),
        }
    }

    /// Set the host compiler.
    ///
    /// Returns the Engine, so additional methods may be chained.
    pub fn with_compiler<C>(mut self, compiler: C) -> Self
    where
        C: HostCompiler + 'static,
    {
        self.compiler = Box::new(compiler);
        self
    }

    /// Set the activator factory.
    ///
    /// Returns the Engine, so additional methods may be chained.
    pub fn with_activator<A>(mut self, activator: A) -> Self
    where
        A: ViewActivatorFactory + 'static,
    {
        self.activator = Box::new(activator);
        self
    }

    /// Register an extension element name.
    ///
    /// Elements with this name are bound by the rewrite passes and render
    /// their body.
    pub fn add_extension<S>(&mut self, name: S)
    where
        S: Into<String>,
    {
        self.extensions.insert(name.into());
    }

    /// Register an extension element name.
    ///
    /// Returns the Engine, so additional methods may be chained.
    pub fn with_extension<S>(mut self, name: S) -> Self
    where
        S: Into<String>,
    {
        self.add_extension(name);
        self
    }

    /// Drop every cached view, so the next lookup rebuilds.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Return the compiled view for the descriptor, building it when it is
    /// absent from the cache or any dependency has changed.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when any constituent template is missing, fails
    /// to parse or rewrite, declares conflicting names, or is rejected by
    /// the host compiler. A failed build caches nothing.
    pub fn compile(&self, descriptor: &Descriptor) -> Result<Arc<CompiledView>, Error> {
        self.cache.lookup(
            descriptor,
            |view| {
                view.dependencies
                    .iter()
                    .all(|(name, signature)| !self.folder.is_stale(name, *signature))
            },
            || self.build(descriptor),
        )
    }

    /// Compile the descriptor and activate a view instance.
    ///
    /// # Errors
    ///
    /// Propagates any compilation error.
    pub fn create_instance(&self, descriptor: &Descriptor) -> Result<ViewInstance, Error> {
        let compiled = self.compile(descriptor)?;
        let view = compiled.activator.activate();
        Ok(ViewInstance { compiled, view })
    }

    /// Release a view instance back to its activator.
    pub fn release_instance(&self, instance: ViewInstance) {
        instance.compiled.activator.release(instance.view);
    }

    /// Compile the descriptor, render it against the given context and
    /// return the output.
    ///
    /// # Errors
    ///
    /// Propagates any compilation or rendering error.
    pub fn render(&self, descriptor: &Descriptor, context: &RenderContext) -> Result<String, Error> {
        let mut instance = self.create_instance(descriptor)?;
        let mut output = String::new();
        let result = instance.render(context, &mut output);
        self.release_instance(instance);
        result?;

        Ok(output)
    }

    fn build(&self, descriptor: &Descriptor) -> Result<Arc<CompiledView>, Error> {
        if descriptor.templates.is_empty() {
            return Err(Error::build(MISSING_TEMPLATE).help("the descriptor names no templates"));
        }

        let mut dependencies = vec![];
        let mut levels = vec![];
        for name in &descriptor.templates {
            levels.push(self.load_template(name, 0, &mut dependencies)?);
        }

        let declarations = Declarations::collect(levels.iter().map(|level| level.as_slice()))?;
        let source = generate(&levels, &declarations);
        let generated = GeneratedView {
            source,
            namespaces: declarations.namespaces.clone(),
            assemblies: declarations.assemblies.clone(),
            program: ViewProgram {
                levels,
                declarations,
            },
        };

        let unit = self.compiler.compile(&generated)?;
        let activator = self.activator.register(&unit);
        Ok(Arc::new(CompiledView {
            unit,
            activator,
            dependencies,
            source: generated.source,
        }))
    }

    /// Parse, rewrite and lower one template, resolving any partials it
    /// includes and recording every loaded template's signature.
    fn load_template(
        &self,
        name: &str,
        depth: usize,
        dependencies: &mut Vec<(String, Signature)>,
    ) -> Result<Vec<Chunk>, Error> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Error::build(COMPILE_FAILURE)
                .help(format!(
                    "including `{name}` exceeds {MAX_INCLUDE_DEPTH} levels of template nesting, \
                     check for a circular include"
                ))
                .template(name));
        }

        let entry = self.folder.get_text(name)?;
        dependencies.push((name.to_string(), entry.signature));

        let source = entry.text.as_str();
        let nodes = MarkupGrammar::new()
            .parse(source)
            .map_err(|error| error.template(name))?;
        let nodes =
            rewrite::apply(source, nodes, &self.extensions).map_err(|error| error.template(name))?;
        let mut chunks = ChunkBuilder::new(source)
            .build(&nodes)
            .map_err(|error| error.template(name))?;
        self.resolve_partials(&mut chunks, depth, dependencies)?;

        Ok(chunks)
    }

    fn resolve_partials(
        &self,
        chunks: &mut [Chunk],
        depth: usize,
        dependencies: &mut Vec<(String, Signature)>,
    ) -> Result<(), Error> {
        for chunk in chunks {
            match chunk {
                Chunk::RenderPartial(render_partial) => {
                    self.resolve_partials(&mut render_partial.body, depth, dependencies)?;
                    let name = render_partial.name.clone();
                    render_partial.contents = self.load_template(&name, depth + 1, dependencies)?;
                }
                Chunk::Scope(scope) => self.resolve_partials(&mut scope.body, depth, dependencies)?,
                Chunk::ForEach(for_each) => {
                    self.resolve_partials(&mut for_each.body, depth, dependencies)?
                }
                Chunk::Conditional(conditional) => {
                    self.resolve_partials(&mut conditional.body, depth, dependencies)?
                }
                Chunk::Content(content) => {
                    self.resolve_partials(&mut content.body, depth, dependencies)?
                }
                Chunk::ContentSet(content_set) => {
                    self.resolve_partials(&mut content_set.body, depth, dependencies)?
                }
                Chunk::UseContent(use_content) => {
                    self.resolve_partials(&mut use_content.default, depth, dependencies)?
                }
                Chunk::Macro(r#macro) => {
                    self.resolve_partials(&mut r#macro.body, depth, dependencies)?
                }
                Chunk::Extension(extension) => {
                    self.resolve_partials(&mut extension.body, depth, dependencies)?
                }
                Chunk::SendLiteral(_)
                | Chunk::SendExpression(_)
                | Chunk::CodeStatement(_)
                | Chunk::LocalVariable(_)
                | Chunk::RenderSection(_)
                | Chunk::Global(_)
                | Chunk::ViewData(_)
                | Chunk::UseNamespace(_)
                | Chunk::UseAssembly(_) => {}
            }
        }

        Ok(())
    }
}

/// An activated view, paired with the compiled view it came from so
/// release routes back to the matching activator.
pub struct ViewInstance {
    compiled: Arc<CompiledView>,
    view: Box<dyn View>,
}

impl ViewInstance {
    /// Render the view against the given context, writing to the output
    /// sink.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an expression fails to evaluate or the
    /// sink rejects a write.
    pub fn render(&mut self, context: &RenderContext, output: &mut dyn Write) -> Result<(), Error> {
        self.view.render(context, output)
    }

    /// Render the view against the given context and return the output.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when rendering fails.
    pub fn render_to_string(&mut self, context: &RenderContext) -> Result<String, Error> {
        let mut output = String::new();
        self.render(context, &mut output)?;

        Ok(output)
    }

    /// Return the generated source of the compiled view.
    pub fn source(&self) -> &str {
        &self.compiled.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        folder::MemoryFolder,
        log::{CONFLICTING_DECLARATION, INVALID_SYNTAX, UNBALANCED_ELEMENT},
    };

    fn engine_with(templates: &[(&str, &str)]) -> Engine {
        let folder = MemoryFolder::new();
        for (name, text) in templates {
            folder.set(*name, *text);
        }
        Engine::new(folder)
    }

    fn home() -> Descriptor {
        Descriptor::new().add_template("home")
    }

    #[test]
    fn test_render_for_each() {
        let engine = engine_with(&[("home", "<for each=\"item in [1,2,3]\">${item}</for>")]);

        let output = engine.render(&home(), &RenderContext::new()).unwrap();
        assert_eq!(output, "123");
    }

    #[test]
    fn test_render_conditional_chain() {
        let engine = engine_with(&[("home", "<if test='x gt 5'>A</if><else>B</else>")]);

        let context = RenderContext::new().with_must("x", 6);
        assert_eq!(engine.render(&home(), &context).unwrap(), "A");

        let context = RenderContext::new().with_must("x", 3);
        assert_eq!(engine.render(&home(), &context).unwrap(), "B");
    }

    #[test]
    fn test_layout_composition() {
        let engine = engine_with(&[
            ("home", "<p>inner</p>"),
            ("layout", "<html><use content='view'/></html>"),
        ]);
        let descriptor = Descriptor::new().add_template("home").add_template("layout");

        let output = engine.render(&descriptor, &RenderContext::new()).unwrap();
        assert_eq!(output, "<html><p>inner</p></html>");
    }

    #[test]
    fn test_partial_inclusion_with_section() {
        let engine = engine_with(&[
            ("home", "<use file='box'>caller body</use>"),
            ("box", "[<render/>]"),
        ]);

        let output = engine.render(&home(), &RenderContext::new()).unwrap();
        assert_eq!(output, "[caller body]");
    }

    #[test]
    fn test_partial_sees_caller_data() {
        let engine = engine_with(&[
            ("home", "<use file='badge'/>"),
            ("badge", "(${name})"),
        ]);

        let context = RenderContext::new().with_must("name", "sam");
        assert_eq!(engine.render(&home(), &context).unwrap(), "(sam)");
    }

    #[test]
    fn test_conflicting_declarations_across_templates() {
        let engine = engine_with(&[
            ("home", "<viewdata Name='int'/>body<use file='footer'/>"),
            ("footer", "<viewdata Name='string'/>foot"),
        ]);

        let error = engine.compile(&home()).unwrap_err();
        assert_eq!(error.get_reason(), CONFLICTING_DECLARATION);
        assert!(error.get_help().unwrap().contains("`Name`"));
    }

    #[test]
    fn test_cache_identity_until_stale() {
        let folder = Arc::new(MemoryFolder::new().with("home", "one"));
        let engine = Engine::new(Arc::clone(&folder));

        let first = engine.compile(&home()).unwrap();
        let second = engine.compile(&home()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        folder.set("home", "two");
        let third = engine.compile(&home()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(engine.render(&home(), &RenderContext::new()).unwrap(), "two");
    }

    #[test]
    fn test_stale_partial_rebuilds_caller() {
        let folder = Arc::new(
            MemoryFolder::new()
                .with("home", "<use file='badge'/>")
                .with("badge", "old"),
        );
        let engine = Engine::new(Arc::clone(&folder));

        assert_eq!(engine.render(&home(), &RenderContext::new()).unwrap(), "old");

        folder.set("badge", "new");
        assert_eq!(engine.render(&home(), &RenderContext::new()).unwrap(), "new");
    }

    #[test]
    fn test_missing_template() {
        let engine = engine_with(&[]);

        let error = engine.compile(&home()).unwrap_err();
        assert_eq!(error.get_reason(), crate::log::MISSING_TEMPLATE);
    }

    #[test]
    fn test_empty_descriptor() {
        let engine = engine_with(&[("home", "x")]);

        assert!(engine.compile(&Descriptor::new()).is_err());
    }

    #[test]
    fn test_grammar_error_names_template() {
        let engine = engine_with(&[("broken", "oops < here")]);
        let descriptor = Descriptor::new().add_template("broken");

        let error = engine.compile(&descriptor).unwrap_err();
        assert_eq!(error.get_reason(), INVALID_SYNTAX);
        assert_eq!(error.get_name(), Some("broken"));
    }

    #[test]
    fn test_rewrite_error_names_template() {
        let engine = engine_with(&[("broken", "<if test='a'>unclosed")]);
        let descriptor = Descriptor::new().add_template("broken");

        let error = engine.compile(&descriptor).unwrap_err();
        assert_eq!(error.get_reason(), UNBALANCED_ELEMENT);
        assert_eq!(error.get_name(), Some("broken"));
    }

    #[test]
    fn test_failed_build_is_retried() {
        let folder = Arc::new(MemoryFolder::new().with("home", "oops < here"));
        let engine = Engine::new(Arc::clone(&folder));

        assert!(engine.compile(&home()).is_err());

        folder.set("home", "fixed");
        assert_eq!(engine.render(&home(), &RenderContext::new()).unwrap(), "fixed");
    }

    #[test]
    fn test_circular_include() {
        let engine = engine_with(&[("loop", "<use file='loop'/>")]);
        let descriptor = Descriptor::new().add_template("loop");

        let error = engine.compile(&descriptor).unwrap_err();
        assert_eq!(error.get_reason(), COMPILE_FAILURE);
    }

    #[test]
    fn test_extension_renders_body() {
        let engine =
            engine_with(&[("home", "<widget kind='nav'>inner</widget>")]).with_extension("widget");

        let output = engine.render(&home(), &RenderContext::new()).unwrap();
        assert_eq!(output, "inner");
    }

    #[test]
    fn test_create_and_release_instance() {
        let engine = engine_with(&[("home", "hi")]);

        let mut instance = engine.create_instance(&home()).unwrap();
        assert_eq!(
            instance.render_to_string(&RenderContext::new()).unwrap(),
            "hi"
        );
        assert!(instance.source().contains("output.write(\"hi\");"));
        engine.release_instance(instance);
    }

    #[test]
    fn test_clear_cache_forces_rebuild() {
        let engine = engine_with(&[("home", "x")]);

        let first = engine.compile(&home()).unwrap();
        engine.clear_cache();
        let second = engine.compile(&home()).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }
}
