mod camera;
mod geolocation;
mod http;
mod kv;

pub use self::camera::{
    Camera, CameraError, CameraFacing, CameraOperation, CameraOutput, CameraResult, RawFrame,
    StreamConfig, StreamId,
};
pub use self::geolocation::{
    GeoError, GeoPosition, GeoResult, Geolocation, GeolocationOperation, PositionOptions,
};
pub use self::http::{
    Http, HttpError, HttpMethod, HttpOperation, HttpRequestData, HttpResponseData, HttpResult,
    MultipartForm, ValidatedUrl,
};
pub use self::kv::{Kv, KeyValue, KvError, KvOperation, KvOutput, KvResult, WELCOME_SEEN_KEY};

// We use Crux's built-in Render capability directly because it provides
// all necessary functionality for triggering view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

pub type AppHttp = Http<Event>;
pub type AppKv = KeyValue<Event>;
pub type AppRender = Render<Event>;
pub type AppCamera = Camera<Event>;
pub type AppGeolocation = Geolocation<Event>;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Storage error: {0}")]
    Kv(#[from] KvError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Location error: {0}")]
    Geolocation(#[from] GeoError),
}

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub camera: Camera<Event>,
    pub geolocation: Geolocation<Event>,
    pub kv: Kv<Event>,
}
