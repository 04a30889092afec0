#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use futures::{
    channel::oneshot,
    future::{FutureExt, LocalBoxFuture},
};
use step_ngin::{
    LoadError, LoadResult, StepLoader,
    engine::{
        ConversionResult, EngineBinding, EngineLoader, GeometryEngine, Indices, MeshRecord,
    },
    error::EngineInitError,
    resources::fetch::{BinaryFetcher, ByteBuffer},
};

const HEADER: &str = "ISO-10303-21;";

/// A tiny stand-in for a STEP file: one axis-aligned box per `BOX` line.
pub fn step_bytes(boxes: &[([f32; 3], f32)]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for (center, size) in boxes {
        text.push_str(&format!(
            "\nBOX {} {} {} {}",
            center[0], center[1], center[2], size
        ));
    }
    text.into_bytes()
}

fn box_record(idx: usize, center: [f32; 3], size: f32) -> MeshRecord {
    let h = size / 2.0;
    let [x, y, z] = center;
    let mut positions = Vec::with_capacity(24);
    for corner in 0..8 {
        positions.push(if corner & 1 == 0 { x - h } else { x + h });
        positions.push(if corner & 2 == 0 { y - h } else { y + h });
        positions.push(if corner & 4 == 0 { z - h } else { z + h });
    }
    MeshRecord {
        name: Some(format!("box_{}", idx)),
        positions: Some(positions),
        normals: None,
        indices: Indices::U16(vec![
            0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5, 0, 4, 5, 0, 5, 1, 2, 3, 7, 2, 7, 6, 0, 2, 6, 0, 6,
            4, 1, 5, 7, 1, 7, 3,
        ]),
        color: (idx % 2 == 1).then_some([0.2, 0.4, 0.8]),
    }
}

/// Parses what [`step_bytes`] writes and counts its conversions.
pub struct FakeEngine {
    conversions: Rc<Cell<usize>>,
}

impl GeometryEngine for FakeEngine {
    fn read_step_file(&self, bytes: &[u8]) -> LoadResult<ConversionResult> {
        self.conversions.set(self.conversions.get() + 1);
        let text = std::str::from_utf8(bytes)
            .map_err(|_| LoadError::Conversion("not a text file".into()))?;
        let mut lines = text.lines();
        if lines.next() != Some(HEADER) {
            return Err(LoadError::Conversion("missing ISO-10303-21 header".into()));
        }
        let mut meshes = Vec::new();
        for line in lines {
            let values = line
                .strip_prefix("BOX ")
                .ok_or_else(|| LoadError::Conversion(format!("unexpected entity {line}")))?
                .split_whitespace()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LoadError::Conversion(e.to_string()))?;
            let [x, y, z, size] = values[..] else {
                return Err(LoadError::Conversion(format!("bad box {line}")));
            };
            meshes.push(box_record(meshes.len(), [x, y, z], size));
        }
        Ok(ConversionResult { meshes })
    }
}

#[derive(Default)]
pub struct EngineStats {
    pub inits: Cell<usize>,
    pub conversions: Rc<Cell<usize>>,
}

struct FakeEngineLoader {
    stats: Rc<EngineStats>,
    fail: bool,
}

impl EngineLoader for FakeEngineLoader {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<dyn GeometryEngine>, EngineInitError>> {
        self.stats.inits.set(self.stats.inits.get() + 1);
        let result = if self.fail {
            Err(EngineInitError("runtime module failed to compile".into()))
        } else {
            Ok(Rc::new(FakeEngine {
                conversions: self.stats.conversions.clone(),
            }) as Rc<dyn GeometryEngine>)
        };
        async move { result }.boxed_local()
    }
}

pub fn fake_engine(fail: bool) -> (Rc<EngineBinding>, Rc<EngineStats>) {
    let stats = Rc::new(EngineStats::default());
    let binding = EngineBinding::new(FakeEngineLoader {
        stats: stats.clone(),
        fail,
    });
    (Rc::new(binding), stats)
}

#[derive(Default)]
struct FetcherState {
    files: RefCell<HashMap<String, ByteBuffer>>,
    gates: RefCell<HashMap<String, VecDeque<oneshot::Receiver<()>>>>,
    calls: RefCell<Vec<String>>,
    completed: Cell<usize>,
}

/// In-memory [`BinaryFetcher`]. Unknown URLs answer 404. A URL can be held so
/// that its next fetch waits until the returned sender fires (or is dropped).
#[derive(Clone, Default)]
pub struct FakeFetcher {
    state: Rc<FetcherState>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) -> &Self {
        self.state
            .files
            .borrow_mut()
            .insert(url.to_string(), bytes.into());
        self
    }

    pub fn hold(&self, url: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state
            .gates
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.state.calls.borrow().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.state.calls.borrow().iter().filter(|u| *u == url).count()
    }

    /// Fetches that ran to completion rather than being dropped.
    pub fn completed(&self) -> usize {
        self.state.completed.get()
    }
}

impl BinaryFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, LoadResult<ByteBuffer>> {
        self.state.calls.borrow_mut().push(url.to_string());
        let gate = self
            .state
            .gates
            .borrow_mut()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.state.completed.set(self.state.completed.get() + 1);
            match self.state.files.borrow().get(url) {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(LoadError::Fetch {
                    status: 404,
                    status_text: "Not Found".into(),
                }),
            }
        }
        .boxed_local()
    }
}

pub struct Harness {
    pub loader: Rc<StepLoader>,
    pub fetcher: FakeFetcher,
    pub binding: Rc<EngineBinding>,
    pub engine: Rc<EngineStats>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(false)
    }

    pub fn with_engine(fail: bool) -> Self {
        let (binding, engine) = fake_engine(fail);
        let fetcher = FakeFetcher::new();
        let loader = Rc::new(StepLoader::new(binding.clone(), fetcher.clone()));
        Self {
            loader,
            fetcher,
            binding,
            engine,
        }
    }
}
