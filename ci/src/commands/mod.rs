// Compile commands
mod compile;
mod compile_check;

pub use compile::*;
pub use compile_check::*;

// Documentation commands
mod doc_test;

pub use doc_test::*;

// Lint commands
mod clippy;
mod format;

pub use clippy::*;
pub use format::*;

// Test commands
mod miri;
mod test;

pub use miri::*;
pub use test::*;

// Loom test suite commands
mod loom;
mod loom_check;
mod loom_clippy;

pub use loom::*;
pub use loom_check::*;
pub use loom_clippy::*;
pub use loom_test::*;
