//! Browser binding to the `occt-import-js` runtime.
//!
//! The hosting page loads the `occt-import-js` script, which installs a global
//! `occtimportjs` factory. The factory instantiates the OpenCascade WASM
//! module from [`ENGINE_WASM_URL`] and resolves to an object whose
//! `ReadStepFile(bytes, params)` returns `{ success, meshes: [...] }`.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Float32Array, Function, Object, Reflect, Uint32Array, Uint8Array};
use wasm_bindgen::{JsCast, JsValue, prelude::*};
use wasm_bindgen_futures::JsFuture;

use crate::{
    engine::{
        ConversionResult, ENGINE_WASM_URL, EngineBinding, EngineLoader, GeometryEngine, Indices,
        MeshRecord,
    },
    error::{EngineInitError, LoadError, LoadResult},
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_name = occtimportjs)]
    fn occt_import_js(settings: &JsValue) -> Result<js_sys::Promise, JsValue>;
}

thread_local! {
    static OCCT: Rc<EngineBinding> = Rc::new(EngineBinding::new(OcctLoader::default()));
}

/// The page-wide `occt-import-js` binding.
pub fn occt_binding() -> Rc<EngineBinding> {
    OCCT.with(Rc::clone)
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

#[derive(Clone, Debug)]
pub struct OcctLoader {
    pub wasm_url: String,
}

impl Default for OcctLoader {
    fn default() -> Self {
        Self {
            wasm_url: ENGINE_WASM_URL.to_string(),
        }
    }
}

impl EngineLoader for OcctLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn GeometryEngine>, EngineInitError>> {
        let wasm_url = self.wasm_url.clone();
        async move {
            let init_err = |e: JsValue| EngineInitError(js_message(&e));

            let settings = Object::new();
            let locate_file = Closure::<dyn Fn() -> JsValue>::new(move || JsValue::from_str(&wasm_url));
            Reflect::set(
                &settings,
                &JsValue::from_str("locateFile"),
                &locate_file.into_js_value(),
            )
            .map_err(init_err)?;

            let promise = occt_import_js(&settings).map_err(init_err)?;
            let instance = JsFuture::from(promise).await.map_err(init_err)?;
            let read_step_file: Function = Reflect::get(&instance, &JsValue::from_str("ReadStepFile"))
                .map_err(init_err)?
                .dyn_into()
                .map_err(init_err)?;

            Ok(Rc::new(OcctEngine {
                instance,
                read_step_file,
            }) as Rc<dyn GeometryEngine>)
        }
        .boxed_local()
    }
}

struct OcctEngine {
    instance: JsValue,
    read_step_file: Function,
}

impl GeometryEngine for OcctEngine {
    fn read_step_file(&self, bytes: &[u8]) -> LoadResult<ConversionResult> {
        let input = Uint8Array::from(bytes);
        let result = self
            .read_step_file
            .call2(&self.instance, &input, &JsValue::NULL)
            .map_err(|e| LoadError::Conversion(js_message(&e)))?;

        let success = get(&result, "success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !success {
            return Err(LoadError::Conversion(
                "engine could not import the STEP file".into(),
            ));
        }

        let meshes: Array = get(&result, "meshes")
            .ok_or_else(|| LoadError::Conversion("result has no meshes".into()))?
            .dyn_into()
            .map_err(|e| LoadError::Conversion(js_message(&e)))?;

        let meshes = meshes
            .iter()
            .enumerate()
            .map(|(idx, mesh)| to_mesh_record(idx, &mesh))
            .collect::<LoadResult<Vec<_>>>()?;
        Ok(ConversionResult { meshes })
    }
}

fn attribute(mesh: &JsValue, name: &str) -> Option<Vec<f32>> {
    let attributes = get(mesh, "attributes")?;
    let array = get(&get(&attributes, name)?, "array")?;
    Some(Float32Array::new(&array).to_vec())
}

fn to_mesh_record(idx: usize, mesh: &JsValue) -> LoadResult<MeshRecord> {
    let indices = get(mesh, "index")
        .and_then(|index| get(&index, "array"))
        .map(|array| Uint32Array::new(&array).to_vec())
        .ok_or_else(|| LoadError::CorruptMesh {
            mesh: idx,
            reason: "no index array".into(),
        })?;

    let color = get(mesh, "color")
        .and_then(|c| c.dyn_into::<Array>().ok())
        .filter(|c| c.length() >= 3)
        .map(|c| {
            let channel = |i: u32| c.get(i).as_f64().unwrap_or(0.0) as f32;
            [channel(0), channel(1), channel(2)]
        });

    Ok(MeshRecord {
        name: get(mesh, "name").and_then(|n| n.as_string()),
        positions: attribute(mesh, "position"),
        normals: attribute(mesh, "normal"),
        indices: Indices::U32(indices),
        color,
    })
}
