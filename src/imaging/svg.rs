//! SVG measurement.
//!
//! SVG is vector data: there is no pixel grid to resample, so the re-encoder
//! passes it through and this module reports the intrinsic size declared on
//! the root `<svg>` element. `width`/`height` win when they are absolute
//! lengths; otherwise the `viewBox` size is used.

use super::backend::{BackendError, Dimensions};

/// Parse an absolute length (`"120"`, `"120.5px"`). Percentages and relative
/// units yield `None`.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite() && *n > 0.0)
}

fn parse_view_box(value: &str) -> Option<(f64, f64)> {
    let parts = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<f64>, _>>()
        .ok()?;
    match parts.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
        _ => None,
    }
}

/// Intrinsic dimensions of an SVG document.
pub fn identify_svg(bytes: &[u8]) -> Result<Dimensions, BackendError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| BackendError::ProcessingFailed(format!("SVG is not UTF-8: {e}")))?;
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to parse SVG: {e}")))?;
    let root = doc.root_element();
    if !root.has_tag_name("svg") {
        return Err(BackendError::ProcessingFailed(format!(
            "Root element is <{}>, not <svg>",
            root.tag_name().name()
        )));
    }

    let view_box = root.attribute("viewBox").and_then(parse_view_box);
    let width = root.attribute("width").and_then(parse_length);
    let height = root.attribute("height").and_then(parse_length);

    let (w, h) = match (width, height, view_box) {
        (Some(w), Some(h), _) => (w, h),
        // One side given: derive the other from the viewBox aspect
        (Some(w), None, Some((vw, vh))) => (w, w * vh / vw),
        (None, Some(h), Some((vw, vh))) => (h * vw / vh, h),
        (None, None, Some((vw, vh))) => (vw, vh),
        _ => {
            return Err(BackendError::ProcessingFailed(
                "SVG declares neither absolute size nor viewBox".into(),
            ));
        }
    };

    Ok(Dimensions {
        width: (w.round() as u32).max(1),
        height: (h.round() as u32).max(1),
    })
}
