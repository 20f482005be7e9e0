//! Installs host-method trampolines into a type's class structure.
use crate::{
    class_struct::ClassStruct,
    error::BindingError,
    trampoline::TrampolineFactory,
    tracer::Tracer,
    types::ObjectInfo,
};
use std::collections::BTreeSet;

/// The host method a virtual function dispatches to: its name in ASCII
/// uppercase, non-ASCII characters left as they are.
pub fn host_method_name(vfunc: &str) -> String {
    vfunc.to_ascii_uppercase()
}

/// Points every virtual function slot of `class` at a trampoline bound to the
/// host method named after the vfunc.
///
/// Slots are located through the class struct field whose name equals the
/// vfunc's name, and no slot is patched twice in one pass. The pass stops at
/// the first failure; slots patched before it stay patched and later ones are
/// left untouched. Returns the number of slots patched.
pub fn install_virtual_functions(
    info: &ObjectInfo,
    class: &mut ClassStruct,
    factory: &dyn TrampolineFactory,
    tracer: &Tracer,
) -> Result<usize, BindingError> {
    let struct_info = info
        .class_struct()
        .ok_or_else(|| BindingError::MissingClassStruct(info.name().to_string()))?;

    let n = info.n_vfuncs();
    let mut patched = BTreeSet::new();
    for i in 0..n {
        let Some(vfunc_info) = info.vfunc(i) else {
            unreachable!("vfunc index {i} out of range for {info:?}")
        };
        let vfunc_name = vfunc_info.name();

        let field_info = struct_info
            .find_field(vfunc_name)
            .ok_or_else(|| BindingError::MissingField {
                type_name: info.name().to_string(),
                vfunc: vfunc_name.to_string(),
            })?;
        let field_offset = field_info.offset();
        if !patched.insert(field_offset) {
            return Err(BindingError::SlotAlreadyPatched {
                vfunc: vfunc_name.to_string(),
                offset: field_offset,
            });
        }

        let field_type_info = field_info.field_type();
        let signature = field_type_info
            .as_callback()
            .ok_or_else(|| BindingError::NotACallback {
                type_name: info.name().to_string(),
                vfunc: vfunc_name.to_string(),
                actual: field_type_info.type_tag().to_string(),
            })?;

        let method_name = host_method_name(vfunc_name);
        let trampoline = factory
            .create(signature, &method_name)
            .map_err(|source| BindingError::Trampoline {
                vfunc: vfunc_name.to_string(),
                source,
            })?;

        let previous = class
            .install(field_offset, trampoline)
            .map_err(|source| BindingError::Slot {
                vfunc: vfunc_name.to_string(),
                source,
            })?;
        tracer.trace_install(
            vfunc_name,
            &method_name,
            field_offset,
            vfunc_info.reported_offset(),
            class.as_ptr(),
        );
        if previous.is_some() {
            vt_info!(
                tracer,
                "replaced earlier trampoline for {} in {}",
                vfunc_name,
                struct_info.name()
            );
        }
    }

    Ok(n)
}

/// [`install_virtual_functions`] for class-init hooks, where a metadata
/// mismatch cannot be recovered from: panics with the offending vfunc's name.
pub fn install_virtual_functions_or_abort(
    info: &ObjectInfo,
    class: &mut ClassStruct,
    factory: &dyn TrampolineFactory,
    tracer: &Tracer,
) -> usize {
    match install_virtual_functions(info, class, factory, tracer) {
        Ok(n) => n,
        Err(e) => {
            vt_error!(tracer, "class init of {} failed: {}", info.name(), e);
            tracer.flush();
            panic!("class init of {} failed: {}", info.name(), e)
        }
    }
}
