//! Geometry engine binding.
//!
//! STEP parsing and tessellation are done by an external engine (on the web,
//! the `occt-import-js` WASM runtime). This module only defines what the
//! engine produces ([`ConversionResult`]) and how it is started: an
//! [`EngineBinding`] creates the engine at most once, and every caller that
//! arrives before initialisation has finished awaits the same shared future.
//! A failed initialisation is remembered; there is no retry until the process
//! restarts.

use std::{cell::OnceCell, rc::Rc};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::{EngineInitError, LoadResult};

#[cfg(target_arch = "wasm32")]
pub mod occt;

/// Versioned location of the engine's WASM runtime module.
pub const ENGINE_WASM_URL: &str =
    "https://cdn.jsdelivr.net/npm/occt-import-js@0.0.23/dist/occt-import-js.wasm";

/// Triangle indices as delivered by the engine. Consumers always read them as `u32`.
#[derive(Clone, Debug, PartialEq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            Indices::U16(v) => v.iter().map(|&i| u32::from(i)).collect(),
            Indices::U32(v) => v.clone(),
        }
    }
}

impl Default for Indices {
    fn default() -> Self {
        Indices::U32(Vec::new())
    }
}

/// Engine output for one solid or shell.
///
/// `positions` and `normals` are flat `xyz` arrays. A record without positions
/// means the conversion result is corrupt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshRecord {
    pub name: Option<String>,
    pub positions: Option<Vec<f32>>,
    pub normals: Option<Vec<f32>>,
    pub indices: Indices,
    /// Normalised RGB.
    pub color: Option<[f32; 3]>,
}

/// All meshes of one converted file, in engine order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversionResult {
    pub meshes: Vec<MeshRecord>,
}

/// A ready-to-use conversion engine.
pub trait GeometryEngine {
    /// Converts the raw contents of a STEP file. Performs no caching.
    fn read_step_file(&self, bytes: &[u8]) -> LoadResult<ConversionResult>;
}

/// Starts a conversion engine, e.g. by downloading and instantiating its runtime.
pub trait EngineLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn GeometryEngine>, EngineInitError>>;
}

pub type EngineFuture = Shared<LocalBoxFuture<'static, Result<Rc<dyn GeometryEngine>, EngineInitError>>>;

/// Lazily initialised, process-wide handle to a conversion engine.
pub struct EngineBinding {
    loader: Box<dyn EngineLoader>,
    init: OnceCell<EngineFuture>,
}

impl EngineBinding {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            init: OnceCell::new(),
        }
    }

    /// Returns the engine, starting it on the first call.
    pub async fn ensure_engine(&self) -> Result<Rc<dyn GeometryEngine>, EngineInitError> {
        self.start().await
    }

    /// Kicks off initialisation without waiting for it. Every call returns a
    /// handle to the same shared future.
    pub fn start(&self) -> EngineFuture {
        self.init
            .get_or_init(|| {
                log::info!("Initialising geometry engine");
                let load = self.loader.load();
                async move {
                    let engine = load.await;
                    match &engine {
                        Ok(_) => log::info!("Geometry engine ready"),
                        Err(e) => log::error!("{}", e),
                    }
                    engine
                }
                .boxed_local()
                .shared()
            })
            .clone()
    }

    /// `true` once initialisation has been started, whether or not it finished.
    pub fn is_started(&self) -> bool {
        self.init.get().is_some()
    }

    /// Converts `bytes` once the engine is ready.
    pub async fn convert(&self, bytes: &[u8]) -> LoadResult<ConversionResult> {
        let engine = self.ensure_engine().await?;
        let result = engine.read_step_file(bytes)?;
        log::info!("Engine produced {} meshes", result.meshes.len());
        Ok(result)
    }
}
