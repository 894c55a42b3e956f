//! RustPython-backed evaluation engine.

use pyrunner_core::{
    Bindings, CapturedStreams, Engine, Execution, Fault, Frame, config::DEFAULT_SOURCE_NAME,
};
use rustpython_vm::{Interpreter, VirtualMachine, builtins::PyBaseExceptionRef, compiler::Mode};

use crate::{capture::StreamCapture, primitives};

/// Runs Python source in a fresh embedded interpreter per execution.
///
/// The interpreter carries the native standard library modules (`math`,
/// `json` accelerators, `random`, ...). It is not a sandbox.
#[derive(Debug, Clone)]
pub struct PythonEngine {
    source_name: String,
}

impl Default for PythonEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }

    /// Name reported for the submitted code in tracebacks.
    #[must_use]
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = source_name.into();
        self
    }

    fn run(&self, vm: &VirtualMachine, code: &str, bindings: &Bindings) -> Execution {
        let scope = vm.new_scope_with_builtins();
        if let Err(exc) = primitives::install(vm, &scope, bindings) {
            return Execution::faulted(CapturedStreams::default(), fault_from_exception(vm, &exc));
        }
        let capture = match StreamCapture::install(vm) {
            Ok(capture) => capture,
            Err(exc) => {
                return Execution::faulted(CapturedStreams::default(), fault_from_exception(vm, &exc));
            }
        };

        let outcome = vm
            .compile(code, Mode::Exec, self.source_name.clone())
            .map_err(|e| {
                let row = u32::try_from(e.python_location().0).ok().filter(|&row| row > 0);
                self.syntax_fault(vm, &vm.new_syntax_error(&e, Some(code)), row)
            })
            .and_then(|code_obj| {
                vm.run_code_obj(code_obj, scope)
                    .map(drop)
                    .map_err(|exc| fault_from_exception(vm, &exc))
            })
            .or_else(|fault| if is_clean_exit(&fault) { Ok(()) } else { Err(fault) });

        Execution {
            captured: capture.finish(),
            outcome,
        }
    }

    /// The interpreter renders compile errors with a `File` line; fall back to
    /// the submission and error row if it did not.
    fn syntax_fault(&self, vm: &VirtualMachine, exc: &PyBaseExceptionRef, row: Option<u32>) -> Fault {
        let fault = fault_from_exception(vm, exc);
        if fault.frames.is_empty() {
            fault.with_frame(Frame::new(self.source_name.as_str(), row, ""))
        } else {
            fault
        }
    }
}

impl Engine for PythonEngine {
    fn name(&self) -> &str {
        "rustpython"
    }

    fn execute(&self, code: &str, bindings: &Bindings) -> Execution {
        let interpreter = Interpreter::with_init(Default::default(), |vm| {
            vm.add_native_modules(rustpython_stdlib::get_module_inits());
        });
        interpreter.enter(|vm| self.run(vm, code, bindings))
    }
}

fn fault_from_exception(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> Fault {
    let mut text = String::new();
    match vm.write_exception(&mut text, exc) {
        Ok(()) => Fault::parse_traceback(&text),
        Err(_) => Fault::new("Exception", "<exception could not be formatted>"),
    }
}

/// `sys.exit()` and `sys.exit(0)` end the run normally.
fn is_clean_exit(fault: &Fault) -> bool {
    fault.kind == "SystemExit" && matches!(fault.message.as_str(), "" | "0" | "None")
}
