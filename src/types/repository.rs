use super::{CallbackSignature, FieldInfo, ObjectInfo, Scalar, StructInfo, TypeInfo, VFuncInfo};
use crate::{error::RepositoryError, layout::StructLayout};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    rc::Rc,
};

#[derive(Deserialize)]
struct RepositoryDef {
    types: Vec<ObjectDef>,
}

#[derive(Deserialize)]
struct ObjectDef {
    name: String,
    #[serde(default)]
    class_struct: Option<StructDef>,
    #[serde(default)]
    vfuncs: Vec<VFuncDef>,
}

#[derive(Deserialize)]
struct StructDef {
    name: String,
    #[serde(default)]
    packing: usize,
    fields: Vec<FieldDef>,
}

#[derive(Deserialize)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    field_type: SignatureDef,
}

#[derive(Deserialize)]
struct VFuncDef {
    name: String,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignatureDef {
    Scalar(Scalar),
    Callback {
        #[serde(default)]
        args: Vec<Scalar>,
        #[serde(default)]
        returns: Scalar,
    },
}

impl From<SignatureDef> for TypeInfo {
    fn from(value: SignatureDef) -> Self {
        match value {
            SignatureDef::Scalar(s) => s.into(),
            SignatureDef::Callback { args, returns } => CallbackSignature { args, returns }.into(),
        }
    }
}

/// Returns the first name that occurs more than once.
fn first_duplicate<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = BTreeSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

impl TryFrom<ObjectDef> for ObjectInfo {
    type Error = RepositoryError;

    fn try_from(def: ObjectDef) -> Result<Self, Self::Error> {
        if let Some(vfunc) = first_duplicate(def.vfuncs.iter().map(|v| v.name.as_str())) {
            return Err(RepositoryError::DuplicateVFunc {
                type_name: def.name.clone(),
                vfunc: vfunc.to_string(),
            });
        }
        if let Some(s) = &def.class_struct {
            if let Some(field) = first_duplicate(s.fields.iter().map(|f| f.name.as_str())) {
                return Err(RepositoryError::DuplicateField {
                    struct_name: s.name.clone(),
                    field: field.to_string(),
                });
            }
        }

        let class_struct = def.class_struct.map(|s| {
            let layout = StructLayout::sequential(
                s.fields
                    .into_iter()
                    .map(|f| (f.name, TypeInfo::from(f.field_type))),
                s.packing,
            );
            StructInfo::from_layout(s.name, layout)
        });
        let vfuncs = def.vfuncs.into_iter().map(|v| match v.offset {
            Some(o) => VFuncInfo::new(v.name).with_reported_offset(o),
            None => VFuncInfo::new(v.name),
        });
        Ok(ObjectInfo::new(def.name, vfuncs, class_struct))
    }
}

/// Metadata provider: object types by name.
#[derive(Debug, Default)]
pub struct Repository {
    types: BTreeMap<String, Rc<ObjectInfo>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON description. Field offsets are computed from the declared
    /// field order, not read from the file.
    pub fn from_json(source: &str) -> Result<Self, RepositoryError> {
        let def: RepositoryDef =
            serde_json::from_str(source).map_err(|e| RepositoryError::Parse(e.to_string()))?;

        let mut repository = Self::new();
        for t in def.types {
            repository.insert(t.try_into()?)?;
        }
        Ok(repository)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let source = std::fs::read_to_string(&path).map_err(|e| {
            RepositoryError::Io(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&source)
    }

    pub fn insert(&mut self, info: ObjectInfo) -> Result<Rc<ObjectInfo>, RepositoryError> {
        if self.types.contains_key(info.name()) {
            return Err(RepositoryError::DuplicateType(info.name().to_string()));
        }
        let info = Rc::new(info);
        self.types.insert(info.name().to_string(), info.clone());
        Ok(info)
    }

    pub fn find(&self, name: &str) -> Option<Rc<ObjectInfo>> {
        self.types.get(name).cloned()
    }

    pub fn types(&self) -> impl Iterator<Item = &Rc<ObjectInfo>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
