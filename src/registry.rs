use crate::{
    class_struct::ClassStruct,
    error::BindingError,
    trampoline::TrampolineFactory,
    tracer::Tracer,
    types::ObjectInfo,
    vtable::install_virtual_functions,
};
use std::{collections::HashMap, rc::Rc};

/// Owns the class structure of every initialized type, and through it the
/// trampolines installed there.
pub struct TypeRegistry {
    factory: Box<dyn TrampolineFactory>,
    tracer: Rc<Tracer>,
    classes: HashMap<String, ClassStruct>,
}

impl TypeRegistry {
    pub fn new(factory: Box<dyn TrampolineFactory>, tracer: Rc<Tracer>) -> Self {
        Self {
            factory,
            tracer,
            classes: HashMap::new(),
        }
    }

    /// Allocates the type's class structure (or reuses the one from an earlier
    /// pass) and installs its virtual functions.
    ///
    /// A class structure whose size no longer matches the type's class struct
    /// metadata is replaced by a fresh one, dropping its trampolines.
    ///
    /// A failed pass leaves the partially patched class structure registered, so
    /// that `teardown` still releases what was installed.
    pub fn class_init(&mut self, info: &ObjectInfo) -> Result<&ClassStruct, BindingError> {
        let struct_info = info
            .class_struct()
            .ok_or_else(|| BindingError::MissingClassStruct(info.name().to_string()))?;

        let size = struct_info.size();
        drop(struct_info);

        let class = self
            .classes
            .entry(info.name().to_string())
            .or_insert_with(|| ClassStruct::new(size));
        if class.size() != size {
            vt_info!(
                self.tracer,
                "class_init {}: class struct resized from {} to {} bytes",
                info.name(),
                class.size(),
                size
            );
            *class = ClassStruct::new(size);
        }

        let n = install_virtual_functions(info, class, self.factory.as_ref(), &self.tracer)?;
        vt_info!(self.tracer, "class_init {}: {} vfuncs installed", info.name(), n);
        Ok(class)
    }

    pub fn class_struct(&self, name: &str) -> Option<&ClassStruct> {
        self.classes.get(name)
    }

    /// Drops the type's class structure and every trampoline installed into it.
    pub fn teardown(&mut self, name: &str) -> bool {
        let removed = self.classes.remove(name);
        if let Some(class) = &removed {
            vt_debug!(
                self.tracer,
                "teardown {}: releasing {} trampolines",
                name,
                class.n_installed()
            );
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
