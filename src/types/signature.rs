use enum_dispatch::enum_dispatch;
use serde::Deserialize;
use std::{
    fmt::{Display, Formatter},
    mem::{align_of, size_of},
};

#[enum_dispatch]
pub trait HasLayout {
    fn size(&self) -> usize;
    fn align(&self) -> usize;
}

/// The declared type of a class struct field.
#[enum_dispatch(HasLayout)]
#[derive(Clone, Debug, PartialEq)]
pub enum TypeInfo {
    Scalar,
    CallbackSignature,
}
impl TypeInfo {
    pub fn as_callback(&self) -> Option<&CallbackSignature> {
        match self {
            TypeInfo::CallbackSignature(c) => Some(c),
            TypeInfo::Scalar(_) => None,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            TypeInfo::Scalar(s) => s.type_tag(),
            TypeInfo::CallbackSignature(_) => "callback",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    #[default]
    Void,
    /// C `int`-sized boolean.
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    #[serde(alias = "ptr")]
    Pointer,
    /// NUL-terminated UTF-8 string pointer.
    Utf8,
}
impl Scalar {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Scalar::Void => "void",
            Scalar::Bool => "bool",
            Scalar::I8 => "i8",
            Scalar::U8 => "u8",
            Scalar::I16 => "i16",
            Scalar::U16 => "u16",
            Scalar::I32 => "i32",
            Scalar::U32 => "u32",
            Scalar::I64 => "i64",
            Scalar::U64 => "u64",
            Scalar::F32 => "f32",
            Scalar::F64 => "f64",
            Scalar::Pointer => "ptr",
            Scalar::Utf8 => "utf8",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Scalar::Bool
                | Scalar::I8
                | Scalar::U8
                | Scalar::I16
                | Scalar::U16
                | Scalar::I32
                | Scalar::U32
                | Scalar::I64
                | Scalar::U64
        )
    }
}
impl HasLayout for Scalar {
    fn size(&self) -> usize {
        match self {
            Scalar::Void => 0,
            Scalar::Bool => size_of::<i32>(),
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::I64 | Scalar::U64 | Scalar::F64 => 8,
            Scalar::Pointer | Scalar::Utf8 => size_of::<usize>(),
        }
    }

    fn align(&self) -> usize {
        match self {
            Scalar::Void => 1,
            Scalar::Bool => align_of::<i32>(),
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => align_of::<i16>(),
            Scalar::I32 | Scalar::U32 => align_of::<i32>(),
            Scalar::F32 => align_of::<f32>(),
            Scalar::I64 | Scalar::U64 => align_of::<i64>(),
            Scalar::F64 => align_of::<f64>(),
            Scalar::Pointer | Scalar::Utf8 => align_of::<usize>(),
        }
    }
}
impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_tag())
    }
}

/// A function-pointer field: the native signature a trampoline must present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallbackSignature {
    pub args: Vec<Scalar>,
    pub returns: Scalar,
}
impl CallbackSignature {
    pub fn new(args: impl IntoIterator<Item = Scalar>, returns: Scalar) -> Self {
        Self {
            args: args.into_iter().collect(),
            returns,
        }
    }
}
impl HasLayout for CallbackSignature {
    fn size(&self) -> usize {
        size_of::<usize>()
    }

    fn align(&self) -> usize {
        align_of::<usize>()
    }
}
impl Display for CallbackSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (*)(", self.returns)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ")")
    }
}
