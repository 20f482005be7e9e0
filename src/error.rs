use crate::types::Scalar;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("type '{0}' has no class struct metadata")]
    MissingClassStruct(String),

    #[error("type '{type_name}' has no class struct field for virtual function '{vfunc}'")]
    MissingField { type_name: String, vfunc: String },

    #[error(
        "class struct field '{vfunc}' of type '{type_name}' is not a callback (found {actual})"
    )]
    NotACallback {
        type_name: String,
        vfunc: String,
        actual: String,
    },

    #[error("failed to patch slot for virtual function '{vfunc}': {source}")]
    Slot {
        vfunc: String,
        #[source]
        source: SlotError,
    },

    #[error("slot at offset {offset} was already patched in this pass, now by '{vfunc}'")]
    SlotAlreadyPatched { vfunc: String, offset: usize },

    #[error("failed to create trampoline for virtual function '{vfunc}': {source}")]
    Trampoline {
        vfunc: String,
        #[source]
        source: TrampolineError,
    },
}

impl BindingError {
    /// The virtual function the pass stopped at, if the failure is tied to one.
    pub fn vfunc(&self) -> Option<&str> {
        match self {
            BindingError::MissingClassStruct(_) => None,
            BindingError::MissingField { vfunc, .. }
            | BindingError::NotACallback { vfunc, .. }
            | BindingError::Slot { vfunc, .. }
            | BindingError::SlotAlreadyPatched { vfunc, .. }
            | BindingError::Trampoline { vfunc, .. } => Some(vfunc),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlotError {
    #[error("slot at offset {offset} overruns class structure of {size} bytes")]
    OutOfBounds { offset: usize, size: usize },
    #[error("slot at offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: usize, align: usize },
    #[error("class structure base {0:#x} is not pointer-aligned")]
    MisalignedBase(usize),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrampolineError {
    #[error("argument {index} has unsupported type {scalar}")]
    UnsupportedArgument { index: usize, scalar: Scalar },
    #[error("return type {0} cannot be marshalled back to native code")]
    UnsupportedReturn(Scalar),
    #[error("closure allocation produced a null entry point")]
    NullEntryPoint,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("host method not found: {0}")]
    MethodNotFound(String),
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("host method {method} failed: {message}")]
    Failed { method: String, message: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid format: {0}")]
    Parse(String),
    #[error("type '{0}' is defined more than once")]
    DuplicateType(String),
    #[error("type '{type_name}' lists virtual function '{vfunc}' more than once")]
    DuplicateVFunc { type_name: String, vfunc: String },
    #[error("class struct '{struct_name}' has more than one field named '{field}'")]
    DuplicateField { struct_name: String, field: String },
}
