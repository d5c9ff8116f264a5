//! Terminal emulation: screen state plus VT sequence parser.

pub mod parser;
pub mod state;

pub use parser::{Response, VtParser};
pub use state::{Screen, ScreenSnapshot};
