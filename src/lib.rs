//! Submit an image to a vision annotation API and overlay the detected regions.
//!
//! The pipeline is: [`source`] validates an image and later encodes it for the wire,
//! [`orchestrator`] posts it through a [`client::Transport`], [`response`]
//! interprets the reply for the selected [`mode::Mode`], and [`overlay`]
//! draws bounding polygons mapped into display space by [`geometry`].

pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mode;
pub mod orchestrator;
pub mod overlay;
pub mod response;
pub mod source;

pub use client::{HttpTransport, Session, Transport, VisionPayload};
pub use config::AppConfig;
pub use error::{Result, VisionError};
pub use geometry::{map_vertex, map_vertices, DisplayGeometry, DisplayPoint, Vertex};
pub use mode::Mode;
pub use orchestrator::{JobTracker, Orchestrator, PreparedRequest, RequestOutcome, Status, UiState};
pub use overlay::{render, Overlay, OverlaySurface};
pub use response::{interpret, interpret_and_render, Interpretation, LabelDetails};
pub use source::{ImageSource, WireImage};
