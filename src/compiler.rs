use crate::{
    context::RenderContext,
    log::{Error, COMPILE_FAILURE},
    render::{Renderer, ViewProgram},
};
use std::fmt::Write;
use std::sync::Arc;

/// Everything the host compiler receives for one view: the generated
/// render routine source, the references it needs, and the chunk program
/// the source was generated from.
#[derive(Debug, Clone)]
pub struct GeneratedView {
    pub source: String,
    pub namespaces: Vec<String>,
    pub assemblies: Vec<String>,
    pub program: ViewProgram,
}

/// A renderable view instance.
pub trait View: Send {
    /// Render the view against the given context, writing to the output
    /// sink.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an expression fails to evaluate or the
    /// sink rejects a write.
    fn render(&mut self, context: &RenderContext, output: &mut dyn Write) -> Result<(), Error>;
}

/// A loadable unit able to construct view instances.
pub trait RenderUnit: Send + Sync + std::fmt::Debug {
    fn instantiate(&self) -> Box<dyn View>;
}

/// Turns a generated view into a loadable render unit.
///
/// Treated as a black box by the compilation pipeline: it accepts
/// generated source plus references and returns an instantiable unit, or
/// fails with a structured compile error.
pub trait HostCompiler: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`Error`] with reason [`COMPILE_FAILURE`] when the
    /// generated view is rejected.
    fn compile(&self, view: &GeneratedView) -> Result<Arc<dyn RenderUnit>, Error>;
}

/// The default host compiler.
///
/// Loads the chunk program into a unit that executes it directly through
/// [`Renderer`], standing in for a facility that compiles the generated
/// source into native code.
#[derive(Debug, Default)]
pub struct DirectCompiler;

impl HostCompiler for DirectCompiler {
    fn compile(&self, view: &GeneratedView) -> Result<Arc<dyn RenderUnit>, Error> {
        if view.source.is_empty() {
            return Err(Error::build(COMPILE_FAILURE)
                .help("the generated view carries no render routine source"));
        }

        Ok(Arc::new(DirectUnit {
            program: Arc::new(view.program.clone()),
        }))
    }
}

#[derive(Debug)]
struct DirectUnit {
    program: Arc<ViewProgram>,
}

impl RenderUnit for DirectUnit {
    fn instantiate(&self) -> Box<dyn View> {
        Box::new(DirectView {
            program: Arc::clone(&self.program),
        })
    }
}

struct DirectView {
    program: Arc<ViewProgram>,
}

impl View for DirectView {
    fn render(&mut self, context: &RenderContext, output: &mut dyn Write) -> Result<(), Error> {
        Renderer::new(&self.program, context).render(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_compile_and_render() {
        use crate::chunk::{Chunk, Declarations, SendLiteral};

        let program = ViewProgram {
            levels: vec![vec![Chunk::SendLiteral(SendLiteral {
                text: "hello".into(),
            })]],
            declarations: Declarations::default(),
        };
        let view = GeneratedView {
            source: "fn render(context, output)\n{\n}\n".into(),
            namespaces: vec![],
            assemblies: vec![],
            program,
        };

        let unit = DirectCompiler.compile(&view).unwrap();
        let mut instance = unit.instantiate();
        let mut output = String::new();
        instance
            .render(&RenderContext::new(), &mut output)
            .unwrap();

        assert_eq!(output, "hello");
    }

    #[test]
    fn test_rejects_empty_source() {
        let view = GeneratedView {
            source: String::new(),
            namespaces: vec![],
            assemblies: vec![],
            program: ViewProgram::default(),
        };

        let error = DirectCompiler.compile(&view).unwrap_err();
        assert_eq!(error.get_reason(), COMPILE_FAILURE);
    }
}
