//! `print` and `input` replacements routed through session bindings.

use pyrunner_core::{Bindings, PrintOptions};
use rustpython_vm::{
    AsObject, PyObjectRef, PyResult, VirtualMachine, function::FuncArgs, scope::Scope,
};

/// Install the primitives into `scope` and into this interpreter's builtins
/// module, so `import builtins` cannot reach the originals either.
///
/// # Errors
/// Returns the Python exception if a binding cannot be set.
pub fn install(vm: &VirtualMachine, scope: &Scope, bindings: &Bindings) -> PyResult<()> {
    let output = bindings.output.clone();
    let print: PyObjectRef = vm
        .new_function("print", move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<()> {
            let (values, options) = print_args(args, vm)?;
            output
                .print(values.as_slice(), &options)
                .map_err(|e| vm.new_os_error(e.to_string()))
        })
        .into();

    let broker = bindings.input.clone();
    let input: PyObjectRef = vm
        .new_function("input", move |args: FuncArgs, vm: &VirtualMachine| -> PyResult<String> {
            let prompt = input_prompt(args, vm)?;
            broker
                .request_input(&prompt)
                .map_err(|e| vm.new_os_error(e.to_string()))
        })
        .into();

    scope.globals.set_item("print", print.clone(), vm)?;
    scope.globals.set_item("input", input.clone(), vm)?;
    let builtins = vm.builtins.as_object();
    builtins.set_attr("print", print, vm)?;
    builtins.set_attr("input", input, vm)?;
    Ok(())
}

fn print_args(args: FuncArgs, vm: &VirtualMachine) -> PyResult<(Vec<String>, PrintOptions)> {
    let mut options = PrintOptions::default();
    for (name, value) in &args.kwargs {
        match name.as_str() {
            "sep" => {
                if let Some(sep) = optional_str(value, vm)? {
                    options.separator = sep;
                }
            }
            "end" => {
                if let Some(end) = optional_str(value, vm)? {
                    options.terminator = end;
                }
            }
            // Accepted for compatibility; output always goes to the parent.
            "file" | "flush" => {}
            other => {
                return Err(vm.new_type_error(format!(
                    "'{other}' is an invalid keyword argument for print()"
                )));
            }
        }
    }

    let values = args
        .args
        .iter()
        .map(|obj| to_string(obj, vm))
        .collect::<PyResult<Vec<_>>>()?;
    Ok((values, options))
}

fn input_prompt(args: FuncArgs, vm: &VirtualMachine) -> PyResult<String> {
    if !args.kwargs.is_empty() {
        return Err(vm.new_type_error("input() takes no keyword arguments".to_string()));
    }
    match args.args.as_slice() {
        [] => Ok(String::new()),
        [prompt] => to_string(prompt, vm),
        more => Err(vm.new_type_error(format!(
            "input expected at most 1 argument, got {}",
            more.len()
        ))),
    }
}

fn to_string(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult<String> {
    Ok(obj.str(vm)?.as_str().to_owned())
}

fn optional_str(obj: &PyObjectRef, vm: &VirtualMachine) -> PyResult<Option<String>> {
    if vm.is_none(obj) {
        Ok(None)
    } else {
        to_string(obj, vm).map(Some)
    }
}
