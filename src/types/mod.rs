//! Introspection metadata for native object types.
//!
//! Descriptors are handed out as `Rc`s; a query result is released by dropping it,
//! so nothing obtained while walking a type outlives the walk unless the caller
//! keeps it.
use crate::layout::StructLayout;
use std::{
    fmt::{Debug, Formatter},
    rc::Rc,
};

pub mod repository;
pub mod signature;

pub use signature::{CallbackSignature, HasLayout, Scalar, TypeInfo};

/// An object type and its overridable behaviour.
pub struct ObjectInfo {
    name: String,
    vfuncs: Vec<Rc<VFuncInfo>>,
    class_struct: Option<Rc<StructInfo>>,
}

impl Debug for ObjectInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} vfuncs)", self.name, self.vfuncs.len())
    }
}

impl ObjectInfo {
    pub fn new(
        name: impl Into<String>,
        vfuncs: impl IntoIterator<Item = VFuncInfo>,
        class_struct: Option<StructInfo>,
    ) -> Self {
        Self {
            name: name.into(),
            vfuncs: vfuncs.into_iter().map(Rc::new).collect(),
            class_struct: class_struct.map(Rc::new),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_vfuncs(&self) -> usize {
        self.vfuncs.len()
    }

    pub fn vfunc(&self, index: usize) -> Option<Rc<VFuncInfo>> {
        self.vfuncs.get(index).cloned()
    }

    pub fn class_struct(&self) -> Option<Rc<StructInfo>> {
        self.class_struct.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VFuncInfo {
    name: String,
    offset: Option<usize>,
}

impl VFuncInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: None,
        }
    }

    /// Records the slot offset the metadata itself claims for this vfunc.
    pub fn with_reported_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Not authoritative: slots are located through the class struct field of the
    /// same name, this value is only reported in traces.
    pub fn reported_offset(&self) -> Option<usize> {
        self.offset
    }
}

/// Layout of a type's class structure.
#[derive(Debug, PartialEq)]
pub struct StructInfo {
    name: String,
    fields: Vec<Rc<FieldInfo>>,
    size: usize,
    align: usize,
}

impl StructInfo {
    pub fn new(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = FieldInfo>,
        size: usize,
        align: usize,
    ) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Rc::new).collect(),
            size,
            align,
        }
    }

    pub fn from_layout(name: impl Into<String>, layout: StructLayout) -> Self {
        let size = layout.total_size;
        let align = layout.align;
        Self::new(
            name,
            layout
                .fields
                .into_iter()
                .map(|f| FieldInfo::new(f.name, f.position, f.layout)),
            size,
            align,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<Rc<FieldInfo>> {
        self.fields.get(index).cloned()
    }

    /// Exact, case-sensitive name match.
    pub fn find_field(&self, name: &str) -> Option<Rc<FieldInfo>> {
        self.fields.iter().find(|f| f.name == name).cloned()
    }
}

#[derive(Debug, PartialEq)]
pub struct FieldInfo {
    name: String,
    offset: usize,
    field_type: Rc<TypeInfo>,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, offset: usize, field_type: TypeInfo) -> Self {
        Self {
            name: name.into(),
            offset,
            field_type: Rc::new(field_type),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn field_type(&self) -> Rc<TypeInfo> {
        self.field_type.clone()
    }
}
