use std::path::PathBuf;

use crate::compile::CompileError;
use crate::layout::LayoutError;
use crate::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(
        "template file not found: {}. Check the path or omit -t to use the built-in template",
        .path.display()
    )]
    TemplateNotFound { path: PathBuf },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
