pub mod compiler;
pub mod process;
pub mod result;
pub mod runner;
pub mod testgen;

pub use compiler::*;
pub use process::*;
pub use result::*;
pub use runner::*;
pub use testgen::*;
