//! Polygon overlay drawn on top of the displayed image.

use std::fmt::Write as _;

use crate::error::Result;
use crate::geometry::{map_vertices, DisplayGeometry, DisplayPoint, Vertex};

/// Where rendered polygons end up. The app paints them with egui; tests read them back.
pub trait OverlaySurface {
    fn clear_overlay(&mut self);
    fn add_polygon(&mut self, points: Vec<DisplayPoint>);
}

/// Ordered collection of closed polygons in display space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
    polygons: Vec<Vec<DisplayPoint>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn polygons(&self) -> &[Vec<DisplayPoint>] {
        &self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// `x,y` pairs separated by spaces, as used by an SVG `points` attribute.
    pub fn points_attribute(&self, index: usize) -> Option<String> {
        self.polygons.get(index).map(|poly| points_attribute(poly))
    }

    /// Standalone SVG document of the overlay at the given display size.
    pub fn to_svg(&self, width: f32, height: f32) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = width.round() as i32,
            h = height.round() as i32,
        );
        for poly in &self.polygons {
            let _ = writeln!(
                svg,
                "  <polygon points=\"{}\" fill=\"none\" stroke=\"red\" stroke-width=\"2\"/>",
                points_attribute(poly)
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl OverlaySurface for Overlay {
    fn clear_overlay(&mut self) {
        self.polygons.clear();
    }

    fn add_polygon(&mut self, points: Vec<DisplayPoint>) {
        self.polygons.push(points);
    }
}

fn points_attribute(points: &[DisplayPoint]) -> String {
    let mut out = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{},{}", p.x, p.y);
    }
    out
}

/// Clears the surface and draws one closed polygon per vertex list, in input order.
///
/// On degenerate geometry the surface is left empty and the error returned.
pub fn render<S, B>(boxes: &[B], geometry: &DisplayGeometry, surface: &mut S) -> Result<()>
where
    S: OverlaySurface + ?Sized,
    B: AsRef<[Vertex]>,
{
    surface.clear_overlay();
    geometry.validate()?;
    for vertices in boxes {
        surface.add_polygon(map_vertices(vertices.as_ref(), geometry)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;

    fn square(x: f32, y: f32, size: f32) -> Vec<Vertex> {
        vec![
            Vertex::new(x, y),
            Vertex::new(x + size, y),
            Vertex::new(x + size, y + size),
            Vertex::new(x, y + size),
        ]
    }

    fn identity() -> DisplayGeometry {
        DisplayGeometry::new(100.0, 100.0, 100.0, 100.0)
    }

    #[test]
    fn test_empty_boxes_give_empty_overlay() {
        let mut overlay = Overlay::new();
        let boxes: Vec<Vec<Vertex>> = Vec::new();
        render(&boxes, &identity(), &mut overlay).unwrap();
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_second_render_replaces_first() {
        let mut overlay = Overlay::new();
        let three = [
            square(0.0, 0.0, 5.0),
            square(10.0, 10.0, 5.0),
            square(20.0, 20.0, 5.0),
        ];
        render(&three, &identity(), &mut overlay).unwrap();
        assert_eq!(overlay.len(), 3);

        render(&[square(1.0, 1.0, 2.0)], &identity(), &mut overlay).unwrap();
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_repeated_render_is_idempotent() {
        let boxes = vec![square(3.0, 4.0, 10.0), square(50.0, 60.0, 7.0)];
        let g = DisplayGeometry::new(200.0, 100.0, 640.0, 480.0);
        let mut overlay = Overlay::new();
        render(&boxes, &g, &mut overlay).unwrap();
        let first = overlay.clone();
        render(&boxes, &g, &mut overlay).unwrap();
        assert_eq!(first, overlay);
    }

    #[test]
    fn test_order_matches_input() {
        let mut overlay = Overlay::new();
        render(&[square(50.0, 50.0, 1.0), square(0.0, 0.0, 1.0)], &identity(), &mut overlay).unwrap();
        assert_eq!(overlay.polygons()[0][0], DisplayPoint { x: 50, y: 50 });
        assert_eq!(overlay.polygons()[1][0], DisplayPoint { x: 0, y: 0 });
    }

    #[test]
    fn test_degenerate_geometry_clears_and_draws_nothing() {
        let mut overlay = Overlay::new();
        render(&[square(0.0, 0.0, 5.0)], &identity(), &mut overlay).unwrap();
        assert_eq!(overlay.len(), 1);

        let err = render(&[square(0.0, 0.0, 5.0)], &DisplayGeometry::default(), &mut overlay).unwrap_err();
        assert!(matches!(err, VisionError::DegenerateGeometry { .. }));
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_non_convex_polygon_is_drawn_as_given() {
        let bow_tie = vec![
            Vertex::new(0.0, 0.0),
            Vertex::new(10.0, 10.0),
            Vertex::new(10.0, 0.0),
            Vertex::new(0.0, 10.0),
        ];
        let mut overlay = Overlay::new();
        render(&[bow_tie], &identity(), &mut overlay).unwrap();
        assert_eq!(overlay.points_attribute(0).as_deref(), Some("0,0 10,10 10,0 0,10"));
    }

    #[test]
    fn test_svg_contains_one_polygon_per_shape() {
        let mut overlay = Overlay::new();
        render(&[square(0.0, 0.0, 5.0), square(10.0, 10.0, 5.0)], &identity(), &mut overlay).unwrap();
        let svg = overlay.to_svg(100.0, 100.0);
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert!(svg.contains("points=\"10,10 15,10 15,15 10,15\""));
        assert!(svg.starts_with("<svg"));
    }
}
