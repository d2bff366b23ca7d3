#[cfg(feature = "cli")]
pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::{Args, run};
pub use config::{Config, LayoutConfig, RenderConfig, load_config};
pub use error::{Error, Result};
pub use ir::{Element, Group, Link, Spec};
pub use layout::{Layout, compute_layout};
pub use parser::{InputFormat, parse_spec};
pub use render::render_tikz;
pub use theme::Theme;
