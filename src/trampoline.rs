//! Natively callable entry points that forward into host methods.
use crate::{
    error::TrampolineError,
    host::HostRuntime,
    tracer::Tracer,
    types::{CallbackSignature, Scalar},
    value::HostValue,
};
use libffi::{
    low::{ffi_arg, ffi_cif},
    middle::*,
};
use std::{
    ffi::c_void,
    panic::{catch_unwind, AssertUnwindSafe},
    ptr::NonNull,
    rc::Rc,
};

pub trait NativeCallable {
    fn entry_point(&self) -> NonNull<c_void>;
    fn method_name(&self) -> &str;
    fn signature(&self) -> &CallbackSignature;
}

pub trait TrampolineFactory {
    fn create(
        &self,
        signature: &CallbackSignature,
        method: &str,
    ) -> Result<Box<dyn NativeCallable>, TrampolineError>;
}

fn scalar_to_ffi(s: Scalar) -> Type {
    match s {
        Scalar::Void => Type::void(),
        Scalar::Bool => Type::i32(),
        Scalar::I8 => Type::i8(),
        Scalar::U8 => Type::u8(),
        Scalar::I16 => Type::i16(),
        Scalar::U16 => Type::u16(),
        Scalar::I32 => Type::i32(),
        Scalar::U32 => Type::u32(),
        Scalar::I64 => Type::i64(),
        Scalar::U64 => Type::u64(),
        Scalar::F32 => Type::f32(),
        Scalar::F64 => Type::f64(),
        Scalar::Pointer | Scalar::Utf8 => Type::pointer(),
    }
}

/// The libffi call interface native callers use for `signature`.
pub fn cif_for(signature: &CallbackSignature) -> Cif {
    Cif::new(
        signature.args.iter().map(|s| scalar_to_ffi(*s)),
        scalar_to_ffi(signature.returns),
    )
}

fn check_signature(signature: &CallbackSignature) -> Result<(), TrampolineError> {
    if let Some((index, scalar)) = signature
        .args
        .iter()
        .enumerate()
        .find(|(_, s)| **s == Scalar::Void)
    {
        return Err(TrampolineError::UnsupportedArgument {
            index,
            scalar: *scalar,
        });
    }
    // an owned host string has nowhere to live once handed to native code
    if signature.returns == Scalar::Utf8 {
        return Err(TrampolineError::UnsupportedReturn(Scalar::Utf8));
    }
    Ok(())
}

struct Binding {
    method: String,
    signature: CallbackSignature,
    runtime: Rc<dyn HostRuntime>,
    tracer: Rc<Tracer>,
}

unsafe extern "C" fn dispatch(
    _cif: &ffi_cif,
    result: &mut c_void,
    args: *const *const c_void,
    binding: &Binding,
) {
    let result = result as *mut c_void;
    let returns = binding.signature.returns;

    let values: Vec<HostValue> = binding
        .signature
        .args
        .iter()
        .enumerate()
        .map(|(i, s)| HostValue::read(*s, *args.add(i)))
        .collect();
    binding.tracer.trace_dispatch(&binding.method, &values);

    // unwinding into native frames is not an option
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        binding.runtime.invoke_method(&binding.method, &values)
    }));

    let failure = match outcome {
        Ok(Ok(v)) => match v.write(returns, result) {
            Ok(()) => return,
            Err(e) => e.to_string(),
        },
        Ok(Err(e)) => e.to_string(),
        Err(_) => "host method panicked".to_string(),
    };
    binding.tracer.trace_dispatch_failure(&binding.method, &failure);
    HostValue::write_zeroed(returns, result);
}

/// A libffi closure bound to one host method.
pub struct FfiTrampoline {
    // declared first so it is freed before the binding it points at
    _closure: Closure<'static>,
    binding: Box<Binding>,
    entry: NonNull<c_void>,
}

impl NativeCallable for FfiTrampoline {
    fn entry_point(&self) -> NonNull<c_void> {
        self.entry
    }

    fn method_name(&self) -> &str {
        &self.binding.method
    }

    fn signature(&self) -> &CallbackSignature {
        &self.binding.signature
    }
}

pub struct FfiTrampolineFactory {
    runtime: Rc<dyn HostRuntime>,
    tracer: Rc<Tracer>,
}

impl FfiTrampolineFactory {
    pub fn new(runtime: Rc<dyn HostRuntime>, tracer: Rc<Tracer>) -> Self {
        Self { runtime, tracer }
    }
}

impl TrampolineFactory for FfiTrampolineFactory {
    fn create(
        &self,
        signature: &CallbackSignature,
        method: &str,
    ) -> Result<Box<dyn NativeCallable>, TrampolineError> {
        check_signature(signature)?;

        let cif = cif_for(signature);
        let binding = Box::new(Binding {
            method: method.to_string(),
            signature: signature.clone(),
            runtime: self.runtime.clone(),
            tracer: self.tracer.clone(),
        });

        // SAFETY: the heap allocation behind `binding` never moves and is dropped
        // only after `closure`, see the field order of `FfiTrampoline`.
        let userdata: &'static Binding = unsafe { &*(binding.as_ref() as *const Binding) };
        let closure = Closure::new(cif, dispatch, userdata);

        let entry = NonNull::new(*closure.code_ptr() as *mut c_void)
            .ok_or(TrampolineError::NullEntryPoint)?;

        Ok(Box::new(FfiTrampoline {
            _closure: closure,
            binding,
            entry,
        }))
    }
}

/// Calls `trampoline` through the native ABI with every argument zeroed and
/// returns the raw bits of the result (`0` for `void`).
///
/// # Safety
/// The host method bound to `trampoline` must accept null pointers and zero
/// values for all of its arguments.
pub unsafe fn call_with_zeroed_args(trampoline: &dyn NativeCallable) -> u64 {
    let signature = trampoline.signature();
    let cif = cif_for(signature);
    let zero = 0u64;
    let args: Vec<Arg> = signature.args.iter().map(|_| Arg::new(&zero)).collect();
    let target = CodePtr::from_ptr(trampoline.entry_point().as_ptr() as *const c_void);

    match signature.returns {
        Scalar::Void => {
            let _: c_void = cif.call(target, &args);
            0
        }
        Scalar::F32 => cif.call::<f32>(target, &args).to_bits() as u64,
        Scalar::F64 => cif.call::<f64>(target, &args).to_bits(),
        // integer returns come back widened to a full ffi_arg
        _ => cif.call::<ffi_arg>(target, &args) as u64,
    }
}
