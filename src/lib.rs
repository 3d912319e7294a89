// lib.rs — perspective viewing of equirectangular 360° panoramas

pub mod benchmark;
pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod i18n;
pub mod loader;
pub mod panorama;
pub mod projector;
pub mod timing;

pub use buffer::{OutputBuffer, SourceImage};
pub use config::{Command, ViewConfig, ViewerConfig};
pub use controller::{DragState, EventResponse, InputEvent, ViewKey, ViewportController};
pub use error::{Result, ViewerError};
pub use panorama::{Algorithm, ViewDelta, ViewportParameters};
pub use projector::{render, Projection, Projector};
