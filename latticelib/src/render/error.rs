use thiserror::Error;

use crate::render::EngineId;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not locate template '{name}' (tried: {})", .candidates.join(", "))]
    TemplateNotFound {
        name: String,
        candidates: Vec<String>,
    },

    #[error("failed rendering '{path}' with engine '{engine}': {detail}")]
    Engine {
        path: String,
        engine: EngineId,
        detail: String,
    },

    #[error("failed reading '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn not_found<S: Into<String>>(name: S, candidates: Vec<String>) -> Self {
        Self::TemplateNotFound {
            name: name.into(),
            candidates,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TemplateNotFound { .. })
    }

    /// Returns the `RenderError` carried by `report`, if any.
    pub fn find(report: &eyre::Report) -> Option<&RenderError> {
        report.downcast_ref::<RenderError>()
    }
}
