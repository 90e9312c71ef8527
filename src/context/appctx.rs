//! Application context and the data-management object that carries it to solver objects.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::KError;
use crate::fem::form::FormParameters;
use crate::fem::space::FunctionSpace;

/// Key under which form-compiler parameters are looked up.
pub const FORM_COMPILER_PARAMETERS: &str = "form_compiler_parameters";

/// User data attached to a solve and visible to every preconditioner plugin.
#[derive(Clone, Default)]
pub struct AppCtx {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl AppCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), Arc::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, key: &str, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entry `key` as a `T`; `Ok(None)` when absent, an error when stored with another type.
    pub fn get<T: Any>(&self, key: &str) -> Result<Option<&T>, KError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(v) => (**v).downcast_ref::<T>().map(Some).ok_or_else(|| KError::AppCtxType(key.to_string())),
        }
    }

    /// Form-compiler parameters, empty when none were given.
    pub fn form_compiler_parameters(&self) -> Result<FormParameters, KError> {
        Ok(self.get::<FormParameters>(FORM_COMPILER_PARAMETERS)?.cloned().unwrap_or_default())
    }
}

impl fmt::Debug for AppCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("AppCtx").field("keys", &keys).finish()
    }
}

/// Data-management object: the function space of the problem plus its application context.
#[derive(Debug, Clone)]
pub struct Dm {
    space: Arc<FunctionSpace>,
    appctx: Arc<AppCtx>,
}

impl Dm {
    pub fn new(space: &Arc<FunctionSpace>) -> Self {
        Self { space: Arc::clone(space), appctx: Arc::new(AppCtx::new()) }
    }

    pub fn with_appctx(mut self, appctx: AppCtx) -> Self {
        self.appctx = Arc::new(appctx);
        self
    }

    pub fn space(&self) -> &Arc<FunctionSpace> {
        &self.space
    }

    pub fn appctx(&self) -> &AppCtx {
        &self.appctx
    }
}

/// Function space attached to `dm`.
pub fn get_function_space(dm: &Dm) -> &Arc<FunctionSpace> {
    dm.space()
}
