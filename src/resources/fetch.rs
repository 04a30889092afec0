//! Turning a source reference into raw file bytes.

use std::{any::Any, ops::Deref, sync::Arc};

use bytes::Bytes;
use futures::future::{FutureExt, LocalBoxFuture};

use crate::{
    cancel::CancelToken,
    error::{LoadError, LoadResult},
};

/// Immutable file contents. Cloning shares the underlying bytes, and owned
/// buffers are wrapped without copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteBuffer(Bytes);

impl ByteBuffer {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for ByteBuffer {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Arc<[u8]>> for ByteBuffer {
    fn from(bytes: Arc<[u8]>) -> Self {
        Self(Bytes::from_owner(bytes))
    }
}

/// Copies; prefer the owned conversions.
impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

/// A typed vector viewed as its raw bytes.
struct PodBytes<T>(Vec<T>);

impl<T: bytemuck::Pod> AsRef<[u8]> for PodBytes<T> {
    fn as_ref(&self) -> &[u8] {
        bytemuck::cast_slice(&self.0)
    }
}

fn take<T: 'static>(
    value: Box<dyn Any>,
    convert: impl FnOnce(T) -> LoadResult<SourceReference>,
) -> Result<LoadResult<SourceReference>, Box<dyn Any>> {
    value.downcast::<T>().map(|value| convert(*value))
}

/// Where a STEP file comes from: a URL, or bytes some collaborator already holds.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceReference {
    Url(String),
    Binary(ByteBuffer),
}

impl SourceReference {
    /// A URL reference. Blank strings are rejected.
    pub fn url(url: impl Into<String>) -> LoadResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LoadError::InvalidInput("an empty URL".into()));
        }
        Ok(SourceReference::Url(url))
    }

    /// Reinterprets a typed array (`u16`, `f32`, ...) as its raw bytes. The
    /// vector's allocation is kept as is.
    pub fn from_typed<T: bytemuck::Pod + Send>(data: Vec<T>) -> Self {
        SourceReference::Binary(ByteBuffer(Bytes::from_owner(PodBytes(data))))
    }

    /// Classifies a dynamically typed value handed over by a host UI.
    ///
    /// Accepts strings (URLs), byte vectors and buffers, and typed numeric
    /// vectors. Anything else is [`LoadError::InvalidInput`].
    pub fn from_any(value: Box<dyn Any>) -> LoadResult<Self> {
        take(value, |url: String| Self::url(url))
            .or_else(|value| take(value, |url: &'static str| Self::url(url)))
            .or_else(|value| take(value, |bytes: ByteBuffer| Ok(Self::Binary(bytes))))
            .or_else(|value| take(value, |bytes: Vec<u8>| Ok(Self::from(bytes))))
            .or_else(|value| take(value, |bytes: Bytes| Ok(Self::Binary(bytes.into()))))
            .or_else(|value| take(value, |bytes: Arc<[u8]>| Ok(Self::Binary(bytes.into()))))
            .or_else(|value| take(value, |view: Vec<u16>| Ok(Self::from_typed(view))))
            .or_else(|value| take(value, |view: Vec<u32>| Ok(Self::from_typed(view))))
            .or_else(|value| take(value, |view: Vec<f32>| Ok(Self::from_typed(view))))
            .or_else(|value| take(value, |view: Vec<f64>| Ok(Self::from_typed(view))))
            .unwrap_or_else(|_| Err(LoadError::InvalidInput("an unsupported value".into())))
    }

    /// Classifies a value coming from JavaScript: a string, an `ArrayBuffer`
    /// or any `ArrayBuffer` view.
    #[cfg(target_arch = "wasm32")]
    pub fn from_js(value: &wasm_bindgen::JsValue) -> LoadResult<Self> {
        use wasm_bindgen::JsCast;

        if let Some(url) = value.as_string() {
            return Self::url(url);
        }
        if let Some(buffer) = value.dyn_ref::<js_sys::ArrayBuffer>() {
            return Ok(SourceReference::Binary(
                js_sys::Uint8Array::new(buffer).to_vec().into(),
            ));
        }
        if js_sys::ArrayBuffer::is_view(value) {
            let field = |key: &str| {
                js_sys::Reflect::get(value, &wasm_bindgen::JsValue::from_str(key)).ok()
            };
            let buffer = field("buffer");
            let offset = field("byteOffset").and_then(|v| v.as_f64());
            let length = field("byteLength").and_then(|v| v.as_f64());
            if let (Some(buffer), Some(offset), Some(length)) = (buffer, offset, length) {
                let view = js_sys::Uint8Array::new_with_byte_offset_and_length(
                    &buffer,
                    offset as u32,
                    length as u32,
                );
                return Ok(SourceReference::Binary(view.to_vec().into()));
            }
        }
        Err(LoadError::InvalidInput(format!("{:?}", value)))
    }

    /// Only URL sources are cacheable.
    pub fn cache_key(&self) -> Option<&str> {
        match self {
            SourceReference::Url(url) => Some(url),
            SourceReference::Binary(_) => None,
        }
    }
}

impl From<Vec<u8>> for SourceReference {
    fn from(bytes: Vec<u8>) -> Self {
        SourceReference::Binary(bytes.into())
    }
}

impl From<ByteBuffer> for SourceReference {
    fn from(bytes: ByteBuffer) -> Self {
        SourceReference::Binary(bytes)
    }
}

/// Network retrieval of whole files.
pub trait BinaryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, LoadResult<ByteBuffer>>;
}

/// [`BinaryFetcher`] backed by `reqwest`. Dropping the returned future aborts
/// the request.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Relative paths are resolved against the page origin, the way the browser's
/// own `fetch` would.
#[cfg(target_arch = "wasm32")]
fn format_url(url: &str) -> LoadResult<reqwest::Url> {
    if let Ok(url) = reqwest::Url::parse(url) {
        return Ok(url);
    }
    let origin = web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .ok_or_else(|| LoadError::InvalidInput(format!("relative URL {url} outside a page")))?;
    reqwest::Url::parse(&format!("{}/", origin))
        .and_then(|base| base.join(url))
        .map_err(|e| LoadError::InvalidInput(format!("{url}: {e}")))
}

#[cfg(not(target_arch = "wasm32"))]
fn format_url(url: &str) -> LoadResult<reqwest::Url> {
    reqwest::Url::parse(url).map_err(|e| LoadError::InvalidInput(format!("{url}: {e}")))
}

impl BinaryFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, LoadResult<ByteBuffer>> {
        async move {
            let url = format_url(url)?;
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                log::warn!("GET {} answered {}", url, status);
                return Err(LoadError::Fetch {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or_default().to_string(),
                });
            }
            let bytes = response.bytes().await?;
            log::debug!("Fetched {} bytes from {}", bytes.len(), url);
            Ok(ByteBuffer::from(bytes))
        }
        .boxed_local()
    }
}

/// Produces the bytes behind `source`. URL sources go through `fetcher` and
/// are abandoned as soon as `token` is cancelled.
pub async fn fetch_binary(
    source: &SourceReference,
    fetcher: &dyn BinaryFetcher,
    token: &CancelToken,
) -> LoadResult<ByteBuffer> {
    match source {
        SourceReference::Url(url) => {
            let bytes = token.run_until_cancelled(fetcher.fetch(url)).await??;
            token.check()?;
            Ok(bytes)
        }
        SourceReference::Binary(bytes) => Ok(bytes.clone()),
    }
}
