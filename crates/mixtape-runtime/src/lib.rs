//! Mixtape runtime: the parser and stack-based evaluator.
//!
//! This crate turns source text into a program (`parser`), runs it against
//! a value stack and environment (`vm`, `env`), and dispatches words by
//! `(type, name)` through a `Registry` (`dispatch`) populated from the
//! standard word library (`words`). It knows nothing about audio hardware
//! or file formats beyond what `mixtape-core` already exposes; a host
//! (`mixtape-cli` or otherwise) owns the `Vm`, feeds it programs, and reads
//! the resulting `Tape`s back off the stack.

pub mod dispatch;
pub mod env;
pub mod parser;
pub mod vm;
pub mod words;

pub use dispatch::Registry;
pub use env::{EnvFrame, EnvStack};
pub use parser::parse;
pub use vm::Vm;
pub use words::register_all;
