use crate::{error::DispatchError, value::HostValue};
use std::collections::HashMap;

/// The host-language side of a trampoline: invoke a method by name.
pub trait HostRuntime {
    fn invoke_method(&self, method: &str, args: &[HostValue]) -> Result<HostValue, DispatchError>;
}

type HostMethod = Box<dyn Fn(&[HostValue]) -> Result<HostValue, DispatchError>>;

/// A host runtime backed by a table of Rust closures.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, HostMethod>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define<F>(&mut self, name: impl Into<String>, method: F) -> &mut Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, DispatchError> + 'static,
    {
        self.methods.insert(name.into(), Box::new(method));
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, DispatchError> + 'static,
    {
        self.define(name, method);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }
}

impl HostRuntime for MethodTable {
    fn invoke_method(&self, method: &str, args: &[HostValue]) -> Result<HostValue, DispatchError> {
        match self.methods.get(method) {
            Some(m) => m(args),
            None => Err(DispatchError::MethodNotFound(method.to_string())),
        }
    }
}
