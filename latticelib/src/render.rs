pub mod context;
pub mod engine;
pub mod error;
pub mod finder;
pub mod options;
pub mod resolver;

pub use context::{Block, RenderContext};
pub use engine::{EngineId, Engines, TemplateEngine};
pub use error::RenderError;
pub use finder::{FileLookup, FindOptions, SourceFinder};
pub use options::{Locals, RenderOptions};
pub use resolver::{Candidate, Resolution, Resolver};
