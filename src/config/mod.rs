//! Runtime configuration: the options database and typed option views.

pub mod options;
pub use options::{KspOptions, OptionsDb, PcOptions};
