//! Cinder - a markup template compiler with cached, recompilable views.
//!
//! Templates are markup interleaved with embedded expressions and control
//! attributes. An [`Engine`] compiles the templates named by a
//! [`Descriptor`] into a cached render unit, and rebuilds it when any
//! constituent template changes.
//!
//! ```
//! use cinder::{Descriptor, Engine, MemoryFolder, RenderContext};
//!
//! let folder = MemoryFolder::new()
//!     .with("home", "<for each=\"item in [1,2,3]\">${item}</for>");
//! let engine = Engine::new(folder);
//!
//! let descriptor = Descriptor::new().add_template("home");
//! let output = engine.render(&descriptor, &RenderContext::new()).unwrap();
//!
//! assert_eq!(output, "123");
//! ```

mod activate;
mod cache;
pub mod chunk;
mod compiler;
mod context;
mod engine;
mod folder;
pub mod generate;
pub mod log;
pub mod markup;
pub mod parse;
mod pipe;
mod region;
pub mod render;
pub mod rewrite;

pub use activate::{DefaultViewActivator, ViewActivator, ViewActivatorFactory};
pub use cache::{CompiledView, Descriptor, ViewCache};
pub use chunk::{Chunk, ChunkBuilder, Declarations};
pub use compiler::{DirectCompiler, GeneratedView, HostCompiler, RenderUnit, View};
pub use context::RenderContext;
pub use engine::{Engine, ViewInstance};
pub use folder::{MemoryFolder, Signature, SourceEntry, ViewFolder};
pub use markup::{MarkupGrammar, Node};
pub use pipe::Pipe;
pub use region::Region;
pub use render::{Renderer, ViewProgram};
