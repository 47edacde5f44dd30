//! Interpreting replies from the vision endpoint.
//!
//! Label replies expose the first label's fields for the detail panel. Text
//! and face replies feed every bounding polygon to the overlay renderer.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};
use crate::geometry::{DisplayGeometry, Vertex};
use crate::mode::Mode;
use crate::overlay::{render, OverlaySurface};

/// Shown instead of the JSON dump when the reply has no entries.
pub const NO_FEATURES_DETECTED: &str = "No Features Detected";

// ── Reply model ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub topicality: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// A detected text block or face. Only its outline is used.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
}

impl AsRef<[Vertex]> for Region {
    fn as_ref(&self) -> &[Vertex] {
        &self.bounding_poly.vertices
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    pub text_annotations: Vec<Region>,
    #[serde(default)]
    pub face_annotations: Vec<Region>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisionReply {
    pub responses: Vec<AnnotateImageResponse>,
}

// ── Interpretation ──────────────────────────────────────────────────────────

/// The four label fields shown in the detail panel.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelDetails {
    pub description: String,
    pub mid: String,
    pub score: f64,
    pub topicality: f64,
}

impl From<&LabelAnnotation> for LabelDetails {
    fn from(label: &LabelAnnotation) -> Self {
        Self {
            description: label.description.clone(),
            mid: label.mid.clone(),
            score: label.score,
            topicality: label.topicality,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interpretation {
    pub mode: Mode,
    /// Pretty-printed reply, or [`NO_FEATURES_DETECTED`].
    pub json_text: String,
    pub label: Option<LabelDetails>,
    /// Regions of every entry, concatenated in entry order.
    pub regions: Vec<Region>,
}

impl Interpretation {
    /// Redraws this reply's polygons for the current geometry.
    pub fn draw<S: OverlaySurface + ?Sized>(
        &self,
        geometry: &DisplayGeometry,
        surface: &mut S,
    ) -> Result<()> {
        render(&self.regions, geometry, surface)
    }

    pub fn features_detected(&self) -> bool {
        self.json_text != NO_FEATURES_DETECTED
    }
}

/// Parses a reply body for the given mode.
///
/// In label mode an empty label list is reported as `NoAnnotationsFound`;
/// the caller still has the JSON text through [`format_reply_text`].
pub fn interpret(mode: Mode, body: &str) -> Result<Interpretation> {
    let raw: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| VisionError::malformed(format!("reply is not JSON: {e}")))?;
    if raw.get("responses").is_none() {
        return Err(VisionError::malformed("missing `responses` field"));
    }
    let json_text = reply_text(&raw)?;
    let reply: VisionReply = serde_json::from_value(raw)
        .map_err(|e| VisionError::malformed(format!("unexpected reply structure: {e}")))?;

    let mut interpretation = Interpretation {
        mode,
        json_text,
        label: None,
        regions: Vec::new(),
    };

    match mode {
        Mode::Labels => {
            let label = reply
                .responses
                .first()
                .and_then(|r| r.label_annotations.first())
                .ok_or_else(|| VisionError::no_annotations("labels"))?;
            interpretation.label = Some(label.into());
        }
        Mode::TextDetection => {
            for entry in reply.responses {
                interpretation.regions.extend(entry.text_annotations);
            }
        }
        Mode::FaceDetection => {
            for entry in reply.responses {
                interpretation.regions.extend(entry.face_annotations);
            }
        }
    }
    log::debug!(
        "Interpreted {} reply: {} region(s)",
        mode,
        interpretation.regions.len()
    );
    Ok(interpretation)
}

/// Parses and immediately draws a reply onto the surface.
pub fn interpret_and_render<S: OverlaySurface + ?Sized>(
    mode: Mode,
    body: &str,
    geometry: &DisplayGeometry,
    surface: &mut S,
) -> Result<Interpretation> {
    let interpretation = interpret(mode, body)?;
    interpretation.draw(geometry, surface)?;
    Ok(interpretation)
}

/// Text for the output panel: pretty JSON, or the placeholder for an empty reply.
pub fn format_reply_text(body: &str) -> Result<String> {
    let raw: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| VisionError::malformed(format!("reply is not JSON: {e}")))?;
    reply_text(&raw)
}

fn reply_text(raw: &serde_json::Value) -> Result<String> {
    let empty = match raw.get("responses") {
        Some(serde_json::Value::Array(a)) => a.is_empty(),
        Some(serde_json::Value::Object(o)) => o.is_empty(),
        Some(_) => false,
        None => return Err(VisionError::malformed("missing `responses` field")),
    };
    if empty {
        Ok(NO_FEATURES_DETECTED.to_owned())
    } else {
        Ok(serde_json::to_string_pretty(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Overlay;

    const CAT: &str = r#"{"responses":[{"labelAnnotations":[
        {"description":"Cat","mid":"m1","score":0.9,"topicality":0.5},
        {"description":"Pet","mid":"m2","score":0.8,"topicality":0.4}]}]}"#;

    const TEXT: &str = r#"{"responses":[
        {"textAnnotations":[
            {"description":"HELLO","boundingPoly":{"vertices":[{"x":10,"y":10},{"x":90,"y":10},{"x":90,"y":30},{"x":10,"y":30}]}},
            {"description":"WORLD","boundingPoly":{"vertices":[{"y":40},{"x":50,"y":40},{"x":50,"y":60},{"y":60}]}}
        ]},
        {"textAnnotations":[]}
    ]}"#;

    #[test]
    fn test_empty_responses_use_placeholder() {
        let interp = interpret(Mode::TextDetection, r#"{"responses":[]}"#).unwrap();
        assert_eq!(interp.json_text, "No Features Detected");
        assert!(!interp.features_detected());
        assert!(interp.regions.is_empty());
    }

    #[test]
    fn test_label_fields_extracted_exactly() {
        let interp = interpret(Mode::Labels, CAT).unwrap();
        let label = interp.label.unwrap();
        assert_eq!(label.description, "Cat");
        assert_eq!(label.mid, "m1");
        assert_eq!(label.score, 0.9);
        assert_eq!(label.topicality, 0.5);
        assert!(interp.regions.is_empty());
    }

    #[test]
    fn test_label_mode_without_labels() {
        let err = interpret(Mode::Labels, r#"{"responses":[{}]}"#).unwrap_err();
        assert!(matches!(err, VisionError::NoAnnotationsFound { .. }));

        let err = interpret(Mode::Labels, r#"{"responses":[]}"#).unwrap_err();
        assert!(matches!(err, VisionError::NoAnnotationsFound { .. }));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = interpret(Mode::Labels, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_missing_responses_is_malformed() {
        let err = interpret(Mode::FaceDetection, r#"{"error":"quota"}"#).unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_text_regions_drawn_from_all_entries() {
        let g = DisplayGeometry::new(100.0, 100.0, 200.0, 50.0);
        let mut overlay = Overlay::new();
        let interp = interpret_and_render(Mode::TextDetection, TEXT, &g, &mut overlay).unwrap();
        assert_eq!(interp.regions.len(), 2);
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay.points_attribute(0).as_deref(), Some("20,5 180,5 180,15 20,15"));
        assert_eq!(overlay.points_attribute(1).as_deref(), Some("0,20 100,20 100,30 0,30"));
        assert!(interp.json_text.contains("\"HELLO\""));
    }

    #[test]
    fn test_face_mode_ignores_text_annotations() {
        let mut overlay = Overlay::new();
        let g = DisplayGeometry::new(100.0, 100.0, 100.0, 100.0);
        interpret_and_render(Mode::FaceDetection, TEXT, &g, &mut overlay).unwrap();
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_face_regions() {
        let body = r#"{"responses":[{"faceAnnotations":[
            {"boundingPoly":{"vertices":[{"x":1,"y":2},{"x":3,"y":2},{"x":3,"y":4},{"x":1,"y":4}]},"joyLikelihood":"VERY_LIKELY"}
        ]}]}"#;
        let interp = interpret(Mode::FaceDetection, body).unwrap();
        assert_eq!(interp.regions.len(), 1);
        assert_eq!(interp.regions[0].bounding_poly.vertices[3], Vertex::new(1.0, 4.0));
    }

    #[test]
    fn test_json_text_is_pretty_printed() {
        let text = format_reply_text(CAT).unwrap();
        assert!(text.contains("\n  \"responses\""));
    }
}
