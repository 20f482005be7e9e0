use crate::types::{HasLayout, TypeInfo};
use std::ops::Range;

fn align_up(value: usize, align: usize) -> usize {
    let misalignment = value % align;
    if misalignment == 0 {
        value
    } else {
        value + align - misalignment
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub position: usize,
    pub layout: TypeInfo,
}
impl FieldLayout {
    pub fn as_range(&self) -> Range<usize> {
        self.position..self.position + self.layout.size()
    }
}

/// C-compatible placement of a class struct's fields, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct StructLayout {
    pub fields: Vec<FieldLayout>,
    pub total_size: usize,
    pub align: usize,
}
impl HasLayout for StructLayout {
    fn size(&self) -> usize {
        self.total_size
    }

    fn align(&self) -> usize {
        self.align
    }
}
impl StructLayout {
    /// Lays fields out sequentially. A `packing` of 0 means natural alignment,
    /// otherwise each field's alignment is capped at `packing`.
    pub fn sequential<S: Into<String>>(
        fields: impl IntoIterator<Item = (S, TypeInfo)>,
        packing: usize,
    ) -> Self {
        let mut offset = 0;
        let mut struct_align = 1;
        let mut mapping = vec![];

        for (name, layout) in fields {
            let mut align = layout.align();
            if packing != 0 {
                align = align.min(packing);
            }
            struct_align = struct_align.max(align);

            let position = align_up(offset, align);
            offset = position + layout.size();
            mapping.push(FieldLayout {
                name: name.into(),
                position,
                layout,
            });
        }

        Self {
            fields: mapping,
            total_size: align_up(offset, struct_align),
            align: struct_align,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}
