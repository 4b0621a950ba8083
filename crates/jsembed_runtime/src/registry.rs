use crate::error::ModuleError;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// A Rust function callable from script through a native module.
///
/// Arguments and the return value cross the boundary as JSON values.
pub type NativeFunction = Rc<dyn Fn(&CallContext<'_>, Vec<Value>) -> Result<Value, ModuleError>>;

/// Private data attached to a native module at registration time
pub type PrivateData = Rc<dyn Any>;

/// Information available to a native function while it runs
pub struct CallContext<'a> {
    module: &'a str,
    function: &'a str,
    private: Option<&'a PrivateData>,
}

impl CallContext<'_> {
    pub fn module_name(&self) -> &str {
        self.module
    }

    pub fn function_name(&self) -> &str {
        self.function
    }

    /// The module's private data, if it was registered with data of type `T`
    pub fn private<T: 'static>(&self) -> Option<&T> {
        self.private.and_then(|data| (**data).downcast_ref::<T>())
    }
}

/// A native module: named functions plus constant exports
pub struct NativeModule {
    name: String,
    functions: BTreeMap<String, NativeFunction>,
    exports: Map<String, Value>,
    private: Option<PrivateData>,
}

impl NativeModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn exports(&self) -> &Map<String, Value> {
        &self.exports
    }

    pub fn has_private_data(&self) -> bool {
        self.private.is_some()
    }

    /// Call one of this module's functions
    ///
    /// # Errors
    ///
    /// Returns `FunctionNotFound` if the module has no such function, or
    /// whatever error the function itself reports
    pub fn call(&self, function: &str, args: Vec<Value>) -> Result<Value, ModuleError> {
        let native = self
            .functions
            .get(function)
            .ok_or_else(|| ModuleError::FunctionNotFound {
                module: self.name.clone(),
                function: function.to_string(),
            })?;
        let ctx = CallContext {
            module: &self.name,
            function,
            private: self.private.as_ref(),
        };
        (**native)(&ctx, args)
    }

    pub fn describe(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            name: self.name.clone(),
            functions: self.functions.keys().cloned().collect(),
            exports: self.exports.clone(),
        }
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("exports", &self.exports)
            .field("private", &self.private.is_some())
            .finish()
    }
}

/// Builder handed to a module's initializer callback
pub struct ModuleBuilder {
    module: NativeModule,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>, private: Option<PrivateData>) -> Self {
        Self {
            module: NativeModule {
                name: name.into(),
                functions: BTreeMap::new(),
                exports: Map::new(),
                private,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.module.name
    }

    /// Private data the module was registered with
    pub fn private<T: 'static>(&self) -> Option<&T> {
        self.module
            .private
            .as_ref()
            .and_then(|data| (**data).downcast_ref::<T>())
    }

    /// Adds a function to the module, replacing any function with the same name
    pub fn function<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&CallContext<'_>, Vec<Value>) -> Result<Value, ModuleError> + 'static,
    {
        self.insert_function(name, Rc::new(function))
    }

    pub fn insert_function(&mut self, name: impl Into<String>, function: NativeFunction) -> &mut Self {
        self.module.functions.insert(name.into(), function);
        self
    }

    /// Adds a constant export, visible in script as a plain property
    pub fn export(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.module.exports.insert(name.into(), value);
        self
    }

    pub fn build(self) -> NativeModule {
        self.module
    }
}

/// What script sees of a module when it asks for `process.binding(name)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub functions: Vec<String>,
    pub exports: Map<String, Value>,
}

/// Name-keyed table of native modules.
///
/// Cloning shares the table: the host keeps one handle and the engine's op
/// state keeps another.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Rc<RefCell<HashMap<String, Rc<NativeModule>>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. A module already registered under the same name is
    /// replaced and returned.
    pub fn register(&self, module: NativeModule) -> Option<Rc<NativeModule>> {
        let name = module.name.clone();
        let previous = self
            .modules
            .borrow_mut()
            .insert(name.clone(), Rc::new(module));

        if previous.is_some() {
            warn!("Native module \"{name}\" was already registered, replacing it");
        } else {
            debug!("Registered native module \"{name}\"");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Rc<NativeModule>> {
        self.modules.borrow().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.modules.borrow().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.modules.borrow_mut().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.modules.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.modules.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.borrow().is_empty()
    }

    /// Registered module names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn describe(&self, name: &str) -> Option<ModuleDescriptor> {
        self.get(name).map(|module| module.describe())
    }

    /// Calls `function` on the module registered as `module`
    ///
    /// The table is not borrowed while the function runs, so a native
    /// function may itself register or look up modules.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown module and otherwise whatever
    /// [`NativeModule::call`] returns
    pub fn call(&self, module: &str, function: &str, args: Vec<Value>) -> Result<Value, ModuleError> {
        let native = self
            .get(module)
            .ok_or_else(|| ModuleError::NotFound(module.to_string()))?;
        native.call(function, args)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
