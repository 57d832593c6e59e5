//! Vision annotation model and wire mapping.
//!
//! Request/response shapes for the external vision-annotation service. The
//! annotation itself is consumed read-only by the scorer; parsing here is
//! tolerant of absent sections but strict about the envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AnalysisError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceGeometry {
    pub roll_deg: f64,
    pub pan_deg: f64,
    pub tilt_deg: f64,
    pub detection_confidence: f64,
    pub landmark_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominantColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub pixel_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectLabel {
    pub name: String,
    pub confidence: f64,
}

/// Structured description of one image as returned by the vision service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionAnnotation {
    pub face_geometry: Option<FaceGeometry>,
    pub dominant_colors: Vec<DominantColor>,
    pub object_labels: Vec<ObjectLabel>,
}

/// Labels that indicate a person (or worn clothing) is present in the frame.
const HUMANOID_LABELS: &[&str] = &[
    "person", "man", "woman", "human", "people", "clothing", "apparel", "fashion", "dress",
    "outerwear", "outfit",
];

impl VisionAnnotation {
    pub fn has_face(&self) -> bool {
        self.face_geometry.is_some()
    }

    pub fn has_humanoid_subject(&self) -> bool {
        self.object_labels.iter().any(|label| {
            let name = label.name.to_lowercase();
            HUMANOID_LABELS.iter().any(|candidate| name.contains(candidate))
        })
    }
}

/// Annotation request payload: base64 image content plus the feature set we
/// consume (face geometry, palette, labels).
pub fn build_annotate_request(image: &[u8]) -> Value {
    json!({
        "requests": [{
            "image": { "content": BASE64.encode(image) },
            "features": [
                { "type": "FACE_DETECTION", "maxResults": 1 },
                { "type": "IMAGE_PROPERTIES" },
                { "type": "LABEL_DETECTION", "maxResults": 10 }
            ]
        }]
    })
}

/// Decode the annotation response body. Missing faces, colors or labels are
/// legitimate (the orchestrator decides whether that is a validation error);
/// a missing envelope is a parse error.
pub fn parse_annotate_response(body: &str) -> Result<VisionAnnotation, AnalysisError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AnalysisError::parse(format!("vision response is not valid JSON: {}", e), body))?;

    let response = value
        .pointer("/responses/0")
        .ok_or_else(|| AnalysisError::parse("vision response missing `responses[0]`", body))?;

    let face_geometry = response
        .pointer("/faceAnnotations/0")
        .map(|face| FaceGeometry {
            roll_deg: num(face, "rollAngle"),
            pan_deg: num(face, "panAngle"),
            tilt_deg: num(face, "tiltAngle"),
            detection_confidence: num(face, "detectionConfidence"),
            landmark_confidence: num(face, "landmarkingConfidence"),
        });

    let dominant_colors = response
        .pointer("/imagePropertiesAnnotation/dominantColors/colors")
        .and_then(Value::as_array)
        .map(|colors| {
            colors
                .iter()
                .map(|c| DominantColor {
                    r: c.pointer("/color/red").and_then(Value::as_f64).unwrap_or(0.0),
                    g: c.pointer("/color/green").and_then(Value::as_f64).unwrap_or(0.0),
                    b: c.pointer("/color/blue").and_then(Value::as_f64).unwrap_or(0.0),
                    pixel_fraction: num(c, "pixelFraction"),
                })
                .collect()
        })
        .unwrap_or_default();

    let object_labels = response
        .get("labelAnnotations")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| {
                    label.get("description").and_then(Value::as_str).map(|name| ObjectLabel {
                        name: name.to_string(),
                        confidence: num(label, "score"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(VisionAnnotation {
        face_geometry,
        dominant_colors,
        object_labels,
    })
}

fn num(value: &Value, field: &str) -> f64 {
    value.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}
