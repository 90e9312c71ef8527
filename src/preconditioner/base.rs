//! Base contract for user-defined ("python") preconditioners.
//!
//! A [`Pc`] of type `python` owns one [`PcPlugin`]. It calls
//! [`initialize`](PcPlugin::initialize) on the first set-up and
//! [`update`](PcPlugin::update) on every later one, and forwards apply calls to it.
//! Plugins can also be picked by name through `-<prefix>pc_python_type`, from a
//! process-wide registry.

use std::any::Any;
use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;
use parking_lot::RwLock;

use crate::context::appctx::AppCtx;
use crate::context::pc_context::Pc;
use crate::context::viewer::Viewer;
use crate::error::KError;
use crate::preconditioner::assembled::AssembledPc;

/// Access to the concrete plugin behind a `dyn PcPlugin`.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub trait PcPlugin: AsAny + Send {
    /// Name shown by `view`.
    fn name(&self) -> &str;

    /// Build internal state from the PC's operators, DM and options.
    fn initialize(&mut self, pc: &Pc) -> Result<(), KError>;

    /// Refresh internal state after the operators changed.
    fn update(&mut self, pc: &Pc) -> Result<(), KError>;

    fn apply(&self, pc: &Pc, x: &[f64], y: &mut [f64]) -> Result<(), KError>;

    fn apply_transpose(&self, _pc: &Pc, _x: &[f64], _y: &mut [f64]) -> Result<(), KError> {
        Err(KError::Unsupported("transpose application"))
    }

    fn view(&self, pc: &Pc, viewer: &mut Viewer) {
        view_base(self.name(), pc, viewer);
    }
}

/// Description every plugin prints before its own details.
pub fn view_base(name: &str, _pc: &Pc, viewer: &mut Viewer) {
    viewer.printf_ascii(&format!("custom preconditioner {name}"));
}

/// Application context attached to the PC's DM.
pub fn get_appctx(pc: &Pc) -> Result<&AppCtx, KError> {
    pc.dm().map(|dm| dm.appctx()).ok_or(KError::MissingDm)
}

pub type PluginFactory = fn() -> Box<dyn PcPlugin>;

fn assembled_pc() -> Box<dyn PcPlugin> {
    Box::new(AssembledPc::default())
}

fn registry() -> &'static RwLock<HashMap<String, PluginFactory>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, PluginFactory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut plugins: HashMap<String, PluginFactory> = HashMap::new();
        plugins.insert("AssembledPC".to_string(), assembled_pc);
        RwLock::new(plugins)
    })
}

/// Make `factory` available as `-pc_python_type <name>`, replacing any previous entry.
pub fn register_python_pc(name: &str, factory: PluginFactory) {
    debug!("registering python PC {name:?}");
    registry().write().insert(name.to_string(), factory);
}

pub fn create_python_pc(name: &str) -> Result<Box<dyn PcPlugin>, KError> {
    let factory = registry()
        .read()
        .get(name)
        .copied()
        .ok_or_else(|| KError::UnknownType { kind: "python PC", name: name.to_string() })?;
    Ok(factory())
}
