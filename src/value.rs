use crate::{
    error::DispatchError,
    types::{HasLayout, Scalar},
};
use libffi::low::ffi_arg;
use std::{
    ffi::{c_char, c_void, CStr},
    mem::size_of,
};

/// A dynamically typed value as seen by the host language.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Void,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    NativeInt(isize),
    Float64(f64),
    Pointer(*mut c_void),
    /// `None` for a null string pointer.
    String(Option<String>),
}

impl HostValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            HostValue::Void => "void",
            HostValue::Bool(_) => "bool",
            HostValue::Int32(_) => "i32",
            HostValue::Int64(_) => "i64",
            HostValue::NativeInt(_) => "nint",
            HostValue::Float64(_) => "f64",
            HostValue::Pointer(_) => "ptr",
            HostValue::String(_) => "string",
        }
    }

    fn mismatch(&self, expected: Scalar) -> DispatchError {
        DispatchError::TypeMismatch {
            expected: expected.to_string(),
            actual: self.type_tag().to_string(),
        }
    }

    fn as_i64(&self, expected: Scalar) -> Result<i64, DispatchError> {
        match *self {
            HostValue::Bool(b) => Ok(b as i64),
            HostValue::Int32(i) => Ok(i as i64),
            HostValue::Int64(i) => Ok(i),
            HostValue::NativeInt(i) => Ok(i as i64),
            _ => Err(self.mismatch(expected)),
        }
    }

    fn as_f64(&self, expected: Scalar) -> Result<f64, DispatchError> {
        match *self {
            HostValue::Float64(f) => Ok(f),
            HostValue::Int32(i) => Ok(i as f64),
            HostValue::Int64(i) => Ok(i as f64),
            _ => Err(self.mismatch(expected)),
        }
    }

    /// Reads one native argument.
    ///
    /// # Safety
    /// `ptr` must point to a live value of the native type described by `scalar`.
    pub unsafe fn read(scalar: Scalar, ptr: *const c_void) -> HostValue {
        macro_rules! read_as {
            ($t:ty) => {
                (ptr as *const $t).read()
            };
        }

        match scalar {
            Scalar::Void => HostValue::Void,
            Scalar::Bool => HostValue::Bool(read_as!(i32) != 0),
            Scalar::I8 => HostValue::Int32(read_as!(i8) as i32),
            Scalar::U8 => HostValue::Int32(read_as!(u8) as i32),
            Scalar::I16 => HostValue::Int32(read_as!(i16) as i32),
            Scalar::U16 => HostValue::Int32(read_as!(u16) as i32),
            Scalar::I32 => HostValue::Int32(read_as!(i32)),
            Scalar::U32 => HostValue::Int64(read_as!(u32) as i64),
            Scalar::I64 => HostValue::Int64(read_as!(i64)),
            Scalar::U64 => HostValue::Int64(read_as!(u64) as i64),
            Scalar::F32 => HostValue::Float64(read_as!(f32) as f64),
            Scalar::F64 => HostValue::Float64(read_as!(f64)),
            Scalar::Pointer => HostValue::Pointer(read_as!(*mut c_void)),
            Scalar::Utf8 => {
                let s = read_as!(*const c_char);
                if s.is_null() {
                    HostValue::String(None)
                } else {
                    HostValue::String(Some(CStr::from_ptr(s).to_string_lossy().into_owned()))
                }
            }
        }
    }

    /// Writes this value into a closure's return slot as `scalar`. Integral
    /// results are widened to a full `ffi_arg`, as libffi expects.
    ///
    /// # Safety
    /// `result` must be a libffi return buffer for a function returning `scalar`.
    pub unsafe fn write(&self, scalar: Scalar, result: *mut c_void) -> Result<(), DispatchError> {
        match scalar {
            Scalar::Void => Ok(()),
            s if s.is_integral() => {
                let v = self.as_i64(s)?;
                let widened = match s {
                    Scalar::Bool => (v != 0) as ffi_arg,
                    Scalar::I8 => v as i8 as ffi_arg,
                    Scalar::U8 => v as u8 as ffi_arg,
                    Scalar::I16 => v as i16 as ffi_arg,
                    Scalar::U16 => v as u16 as ffi_arg,
                    Scalar::I32 => v as i32 as ffi_arg,
                    Scalar::U32 => v as u32 as ffi_arg,
                    _ => {
                        (result as *mut i64).write(v);
                        return Ok(());
                    }
                };
                (result as *mut ffi_arg).write(widened);
                Ok(())
            }
            Scalar::F32 => {
                (result as *mut f32).write(self.as_f64(scalar)? as f32);
                Ok(())
            }
            Scalar::F64 => {
                (result as *mut f64).write(self.as_f64(scalar)?);
                Ok(())
            }
            Scalar::Pointer => {
                let p = match *self {
                    HostValue::Pointer(p) => p,
                    HostValue::NativeInt(i) => i as *mut c_void,
                    _ => return Err(self.mismatch(scalar)),
                };
                (result as *mut *mut c_void).write(p);
                Ok(())
            }
            _ => Err(self.mismatch(scalar)),
        }
    }

    /// Zero-fills a return slot after a failed dispatch.
    ///
    /// # Safety
    /// Same contract as [`HostValue::write`].
    pub unsafe fn write_zeroed(scalar: Scalar, result: *mut c_void) {
        if scalar != Scalar::Void {
            let len = scalar.size().max(size_of::<ffi_arg>());
            std::ptr::write_bytes(result as *mut u8, 0, len);
        }
    }
}
