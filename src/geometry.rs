//! Mapping annotation vertices from natural image pixels into display space.
//!
//! The displayed box of the image may not keep the image's aspect ratio, so
//! the x and y axes are scaled by independent ratios.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

/// A vertex in natural-image pixel coordinates, as returned by the API.
///
/// The API omits coordinates equal to zero, hence the defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A vertex after mapping, in whole display pixels relative to the image's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayPoint {
    pub x: i32,
    pub y: i32,
}

/// Natural and currently displayed dimensions of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayGeometry {
    pub natural_width: f32,
    pub natural_height: f32,
    pub displayed_width: f32,
    pub displayed_height: f32,
}

impl DisplayGeometry {
    pub fn new(
        natural_width: f32,
        natural_height: f32,
        displayed_width: f32,
        displayed_height: f32,
    ) -> Self {
        Self {
            natural_width,
            natural_height,
            displayed_width,
            displayed_height,
        }
    }

    fn usable(v: f32) -> bool {
        v.is_finite() && v > 0.0
    }

    /// Fails with `DegenerateGeometry` unless all four dimensions are positive.
    pub fn validate(&self) -> Result<()> {
        if Self::usable(self.natural_width)
            && Self::usable(self.natural_height)
            && Self::usable(self.displayed_width)
            && Self::usable(self.displayed_height)
        {
            Ok(())
        } else {
            Err(VisionError::DegenerateGeometry {
                natural_width: self.natural_width,
                natural_height: self.natural_height,
                displayed_width: self.displayed_width,
                displayed_height: self.displayed_height,
            })
        }
    }

}

pub fn map_vertex(vertex: Vertex, geometry: &DisplayGeometry) -> Result<DisplayPoint> {
    geometry.validate()?;
    Ok(scale(vertex, geometry))
}

/// Maps a whole vertex list; the geometry is checked once up front.
pub fn map_vertices(vertices: &[Vertex], geometry: &DisplayGeometry) -> Result<Vec<DisplayPoint>> {
    geometry.validate()?;
    Ok(vertices.iter().map(|v| scale(*v, geometry)).collect())
}

/// Size at which an image is shown inside an available area.
///
/// With `stretch` the image fills the area and the axes scale independently;
/// otherwise it is fitted while keeping its aspect ratio.
pub fn fit_display_size(natural: (f32, f32), available: (f32, f32), stretch: bool) -> (f32, f32) {
    if stretch {
        return available;
    }
    let (w, h) = natural;
    if w <= 0.0 || h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (available.0 / w).min(available.1 / h).max(0.0);
    (w * scale, h * scale)
}

/// `round(natural * displayed / image)` per axis. Multiplying before dividing
/// keeps exact halves exact so they round away from zero.
fn scale(vertex: Vertex, g: &DisplayGeometry) -> DisplayPoint {
    let axis = |v: f32, displayed: f32, natural: f32| {
        (f64::from(v) * f64::from(displayed) / f64::from(natural)).round() as i32
    };
    DisplayPoint {
        x: axis(vertex.x, g.displayed_width, g.natural_width),
        y: axis(vertex.y, g.displayed_height, g.natural_height),
    }
}
