//! CLI command handling

pub mod context;
pub mod deliver;
pub mod listen;
pub mod open;
pub mod output;

pub use context::*;
pub use deliver::*;
pub use listen::*;
pub use open::*;
pub use output::*;
