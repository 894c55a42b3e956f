//! Scoped redirection of the interpreter's `sys.stdout` / `sys.stderr`.

use pyrunner_core::CapturedStreams;
use rustpython_vm::{PyResult, VirtualMachine, compiler::Mode, scope::Scope};

const INSTALL: &str = "\
import sys, _io
_saved = (sys.stdout, sys.stderr, sys.__stdout__, sys.__stderr__)
_out = _io.StringIO()
_err = _io.StringIO()
sys.stdout = sys.__stdout__ = _out
sys.stderr = sys.__stderr__ = _err
";

const RESTORE: &str = "\
import sys
sys.stdout, sys.stderr, sys.__stdout__, sys.__stderr__ = _saved
";

/// Redirects the interpreter's standard streams into in-memory buffers
/// until finished or dropped.
///
/// Restoration happens on every exit path, including unwinding.
pub struct StreamCapture<'vm> {
    vm: &'vm VirtualMachine,
    scope: Scope,
    restored: bool,
}

impl<'vm> StreamCapture<'vm> {
    /// Start capturing.
    ///
    /// # Errors
    /// Returns the Python exception if the streams cannot be replaced.
    pub fn install(vm: &'vm VirtualMachine) -> PyResult<Self> {
        let scope = vm.new_scope_with_builtins();
        run_source(vm, &scope, INSTALL, Mode::Exec)?;
        Ok(Self {
            vm,
            scope,
            restored: false,
        })
    }

    /// Stop capturing and return everything written so far.
    #[must_use]
    pub fn finish(mut self) -> CapturedStreams {
        let stdout = self.read("_out.getvalue()");
        let stderr = self.read("_err.getvalue()");
        self.restore();
        CapturedStreams::new(stdout, stderr)
    }

    fn read(&self, expr: &str) -> String {
        run_source(self.vm, &self.scope, expr, Mode::Eval)
            .and_then(|value| Ok(value.str(self.vm)?.as_str().to_owned()))
            .unwrap_or_else(|_| {
                tracing::warn!(expr, "failed to read captured stream");
                String::new()
            })
    }

    fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if run_source(self.vm, &self.scope, RESTORE, Mode::Exec).is_err() {
            tracing::warn!("failed to restore interpreter streams");
        }
    }
}

impl Drop for StreamCapture<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

fn run_source(vm: &VirtualMachine, scope: &Scope, source: &str, mode: Mode) -> PyResult {
    let code = vm
        .compile(source, mode, "<capture>".to_owned())
        .map_err(|e| vm.new_runtime_error(e.to_string()))?;
    vm.run_code_obj(code, scope.clone())
}
