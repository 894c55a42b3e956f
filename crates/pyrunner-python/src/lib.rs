//! Embedded RustPython evaluation engine.
//!
//! Provides:
//! - `PythonEngine` - `pyrunner_core::Engine` implementation
//! - `print` / `input` replacements bound to a session
//! - Scoped capture of the interpreter's raw standard streams

pub mod capture;
pub mod engine;
pub mod primitives;

pub use engine::PythonEngine;
