//! Annotation scoring.
//!
//! Pure numeric transforms from raw visual annotations (face geometry,
//! dominant colors, detected labels) into domain scores. No I/O here; the
//! engine decides when these run and raises validation errors before they do.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::annotation::{DominantColor, FaceGeometry, ObjectLabel};

/// Weights for the overall face score. Product-tuned values; overridable
/// through `TuningConfig` rather than hard-coded at call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub symmetry: f64,
    pub brightness: f64,
    pub jawline: f64,
    pub hydration: f64,
    pub confidence: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            symmetry: 0.25,
            brightness: 0.25,
            jawline: 0.2,
            hydration: 0.2,
            confidence: 0.1,
        }
    }
}

/// Whether a result came from the live upstream path or the synthesized
/// offline fallback. Fallbacks are never silently passed off as live results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultSource {
    Live,
    Fallback,
}

/// Final score set returned to callers. Every numeric field is an integer
/// clamped to [1, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub overall: i32,
    pub brightness: i32,
    pub symmetry: Option<i32>,
    pub jawline: Option<i32>,
    pub hydration: Option<i32>,
    pub color_harmony: Option<i32>,
    pub occasion_fit: Option<i32>,
    pub tips: Vec<String>,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Copy)]
pub struct FaceScores {
    pub overall: i32,
    pub brightness: i32,
    pub symmetry: i32,
    pub jawline: i32,
    pub hydration: i32,
}

/// Round and clamp into the valid score range.
pub fn clamp_score(value: f64) -> i32 {
    value.round().clamp(1.0, 100.0) as i32
}

/// Pixel-fraction-weighted Rec. 709 luminance over the palette, normalized
/// to [1, 100]. An empty or zero-weight palette scores neutral.
pub fn brightness_score(colors: &[DominantColor]) -> i32 {
    let total: f64 = colors.iter().map(|c| c.pixel_fraction).sum();
    if colors.is_empty() || total <= 0.0 {
        return 50;
    }
    let weighted: f64 = colors
        .iter()
        .map(|c| (0.2126 * c.r + 0.7152 * c.g + 0.0722 * c.b) * c.pixel_fraction)
        .sum();
    let luminance = weighted / total;
    clamp_score(luminance / 255.0 * 100.0)
}

/// 100 minus twice the combined head tilt, capped at 30 degrees of tilt.
pub fn symmetry_score(geometry: &FaceGeometry) -> i32 {
    let tilt = geometry.roll_deg.abs() + geometry.pan_deg.abs() + geometry.tilt_deg.abs();
    clamp_score(100.0 - tilt.min(30.0) * 2.0)
}

pub fn jawline_score(geometry: &FaceGeometry) -> i32 {
    clamp_score(geometry.landmark_confidence * 100.0)
}

pub fn hydration_score(brightness: i32, symmetry: i32, geometry: &FaceGeometry) -> i32 {
    clamp_score(
        0.6 * f64::from(brightness)
            + 0.2 * f64::from(symmetry)
            + 0.2 * geometry.detection_confidence * 100.0,
    )
}

pub fn score_face(
    geometry: &FaceGeometry,
    colors: &[DominantColor],
    weights: &ScoreWeights,
) -> FaceScores {
    let brightness = brightness_score(colors);
    let symmetry = symmetry_score(geometry);
    let jawline = jawline_score(geometry);
    let hydration = hydration_score(brightness, symmetry, geometry);
    let overall = clamp_score(
        weights.symmetry * f64::from(symmetry)
            + weights.brightness * f64::from(brightness)
            + weights.jawline * f64::from(jawline)
            + weights.hydration * f64::from(hydration)
            + weights.confidence * geometry.detection_confidence * 100.0,
    );
    FaceScores {
        overall,
        brightness,
        symmetry,
        jawline,
        hydration,
    }
}

/// Mean pairwise circular hue distance across the top-5 palette colors,
/// mapped into a [50, 95] harmony band. Fewer than two usable colors score
/// a neutral 70.
pub fn color_harmony_score(colors: &[DominantColor]) -> i32 {
    let mut top: Vec<&DominantColor> = colors.iter().collect();
    top.sort_by(|a, b| {
        b.pixel_fraction
            .partial_cmp(&a.pixel_fraction)
            .unwrap_or(Ordering::Equal)
    });
    top.truncate(5);

    let hues: Vec<f64> = top.iter().map(|c| rgb_to_hsv(c.r, c.g, c.b).0).collect();
    if hues.len() < 2 {
        return 70;
    }

    let mut sum = 0.0;
    let mut pairs = 0u32;
    for i in 0..hues.len() {
        for j in (i + 1)..hues.len() {
            let d = (hues[i] - hues[j]).abs();
            sum += d.min(360.0 - d);
            pairs += 1;
        }
    }
    let mean_distance = sum / f64::from(pairs);
    let score = 70.0 + ((180.0 - mean_distance).abs() / 6.0).min(30.0);
    score.clamp(50.0, 95.0).round() as i32
}

/// RGB (0..255) to HSV; hue in degrees [0, 360), saturation and value in [0, 1].
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let r = (r / 255.0).clamp(0.0, 1.0);
    let g = (g / 255.0).clamp(0.0, 1.0);
    let b = (b / 255.0).clamp(0.0, 1.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

/// Keyword match between the caller's event category and detected labels.
/// Formal categories start from a lower base and reward tailored garments
/// more, so a blazer moves the needle where it should.
pub fn occasion_fit_score(event_category: &str, labels: &[ObjectLabel]) -> i32 {
    let category = event_category.to_lowercase();
    let (keywords, base, bonus): (&[&str], f64, f64) =
        if category.contains("formal") || category.contains("business") || category.contains("interview") {
            (&["blazer", "jacket", "suit", "tie", "shirt"], 52.0, 14.0)
        } else if category.contains("wedding") {
            (&["suit", "dress", "gown", "tie", "blazer"], 54.0, 13.0)
        } else if category.contains("party") || category.contains("date") {
            (&["dress", "skirt", "heels", "jacket", "top"], 58.0, 11.0)
        } else if category.contains("sport") || category.contains("workout") || category.contains("gym") {
            (&["sportswear", "shorts", "sneaker", "activewear", "t-shirt"], 58.0, 11.0)
        } else {
            // casual or unrecognized category
            (&["clothing", "shirt", "jeans", "dress", "jacket"], 60.0, 9.0)
        };

    let mut score = base;
    for label in labels {
        let name = label.name.to_lowercase();
        if keywords.iter().any(|kw| name.contains(kw)) {
            score += bonus * label.confidence.clamp(0.0, 1.0);
        }
    }
    clamp_score(score.min(98.0))
}

/// Deterministic coaching tips keyed off the score bands. Same scores, same
/// tips, so cached and recomputed results stay indistinguishable.
pub fn face_tips(scores: &FaceScores) -> Vec<String> {
    let mut tips = Vec::new();
    if scores.brightness < 55 {
        tips.push("Retake in brighter, even lighting to show skin tone accurately.".to_string());
    }
    if scores.symmetry < 80 {
        tips.push("Face the camera straight on and keep your chin level.".to_string());
    }
    if scores.hydration < 60 {
        tips.push("A hydrating moisturizer before photos reduces dull patches.".to_string());
    }
    if tips.is_empty() {
        tips.push("Strong capture. Keep the same lighting setup for consistent tracking.".to_string());
    }
    tips
}

pub fn outfit_tips(harmony: i32, occasion: i32) -> Vec<String> {
    let mut tips = Vec::new();
    if harmony < 65 {
        tips.push("Palette clashes a little; anchor the look around two main colors.".to_string());
    }
    if occasion < 65 {
        tips.push("Add one piece that signals the occasion, like a structured jacket.".to_string());
    }
    if tips.is_empty() {
        tips.push("Cohesive look. Accessories in a matching accent color would elevate it.".to_string());
    }
    tips
}
