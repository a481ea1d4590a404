//! Percent-positioned fields as submitted by the editor
//!
//! A field's rectangle is stored as fractions of its page's width and
//! height with a top-left origin, so it stays valid at any render scale.

use crate::error::SignError;
use serde::{Deserialize, Serialize};

/// Smallest width/height a field is clamped to (fraction of the page)
pub const MIN_EXTENT_PERCENT: f64 = 0.01;

/// Font size as a fraction of field height when none is given
pub const DEFAULT_FONT_RATIO: f64 = 0.6;

/// Floor for rendered text size, in page units
pub const MIN_FONT_SIZE: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    /// 1-based page number
    pub page: i64,
    pub x_percent: f64,
    pub y_percent: f64,
    pub width_percent: f64,
    pub height_percent: f64,
    /// Fraction of page height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_percent: Option<f64>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Signature {
        #[serde(
            rename = "signatureUrl",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        signature_url: Option<String>,
    },
    Radio {
        #[serde(default)]
        checked: bool,
    },
    /// Any tag this build does not know; rendered as nothing
    #[serde(other)]
    Unknown,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Date { .. } => "date",
            FieldKind::Signature { .. } => "signature",
            FieldKind::Radio { .. } => "radio",
            FieldKind::Unknown => "unknown",
        }
    }
}

impl Field {
    /// Copy with x/y pulled into [0, 1] and width/height into [0.01, 1].
    /// NaN coordinates collapse to the lower bound.
    pub fn clamped(&self) -> Field {
        Field {
            x_percent: clamp_or_min(self.x_percent, 0.0, 1.0),
            y_percent: clamp_or_min(self.y_percent, 0.0, 1.0),
            width_percent: clamp_or_min(self.width_percent, MIN_EXTENT_PERCENT, 1.0),
            height_percent: clamp_or_min(self.height_percent, MIN_EXTENT_PERCENT, 1.0),
            ..self.clone()
        }
    }

    /// Zero-based page index, if it falls inside a document of `page_count` pages
    pub fn page_index(&self, page_count: usize) -> Option<usize> {
        let index = self.page.checked_sub(1)?;
        usize::try_from(index).ok().filter(|i| *i < page_count)
    }

    /// The image reference of a signature field, ignoring blank strings
    pub fn signature_url(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Signature { signature_url } => signature_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty()),
            _ => None,
        }
    }

    /// `fontSizePercent` when it names a usable size; zero, negative and
    /// non-finite values count as absent
    pub fn font_size_ratio(&self) -> Option<f64> {
        self.font_size_percent
            .filter(|pct| pct.is_finite() && *pct > 0.0)
    }
}

fn clamp_or_min(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Text size for a field on a page of height `page_height`, in page units.
///
/// Derived on demand from `fontSizePercent` (or the field height when that
/// is absent) so there is only ever one stored size.
pub fn effective_font_size(field: &Field, field_height: f64, page_height: f64) -> f64 {
    let size = match field.font_size_ratio() {
        Some(pct) => pct * page_height,
        None => field_height * DEFAULT_FONT_RATIO,
    };
    size.max(MIN_FONT_SIZE)
}

/// Business-rule gate run by the caller before any document bytes are read.
///
/// Rejects a text field with no visible value, and a field set that has a
/// signature field while no field carries a signature image.
pub fn validate_submission(fields: &[Field]) -> Result<(), SignError> {
    if let Some(field) = fields.iter().find(|f| match &f.kind {
        FieldKind::Text { value } => value.as_deref().map_or(true, |v| v.trim().is_empty()),
        _ => false,
    }) {
        return Err(SignError::ValidationError(format!(
            "Text field {} is empty; fill in all text fields before signing",
            field.id
        )));
    }

    let has_signature_field = fields
        .iter()
        .any(|f| matches!(f.kind, FieldKind::Signature { .. }));
    let has_signature_image = fields.iter().any(|f| f.signature_url().is_some());
    if has_signature_field && !has_signature_image {
        return Err(SignError::ValidationError(
            "Upload a signature before signing".to_string(),
        ));
    }

    Ok(())
}

/// Parse raw field JSON, keeping each element's position in the error
pub fn parse_fields(raw: &[serde_json::Value]) -> Result<Vec<Field>, SignError> {
    raw.iter()
        .enumerate()
        .map(|(i, value)| {
            Field::deserialize(value).map_err(|e| {
                SignError::ValidationError(format!("Field #{} is malformed: {}", i + 1, e))
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    pub(crate) fn field(kind: FieldKind) -> Field {
        Field {
            id: "f1".to_string(),
            page: 1,
            x_percent: 0.1,
            y_percent: 0.1,
            width_percent: 0.2,
            height_percent: 0.08,
            font_size_percent: None,
            kind,
        }
    }

    pub(crate) fn text(value: &str) -> Field {
        field(FieldKind::Text {
            value: Some(value.to_string()),
        })
    }

    pub(crate) fn signature(url: Option<&str>) -> Field {
        field(FieldKind::Signature {
            signature_url: url.map(str::to_string),
        })
    }

    #[test]
    fn test_deserializes_editor_payload() {
        let raw = json!({
            "id": "2b1f",
            "type": "radio",
            "page": 2,
            "xPercent": 0.5,
            "yPercent": 0.25,
            "widthPercent": 0.05,
            "heightPercent": 0.03,
            "value": "",
            "checked": true,
            "signatureUrl": ""
        });
        let f: Field = serde_json::from_value(raw).unwrap();
        assert_eq!(f.page, 2);
        assert_eq!(f.kind, FieldKind::Radio { checked: true });
        assert_eq!(f.font_size_percent, None);
    }

    #[test]
    fn test_unknown_type_is_inert_variant() {
        let raw = json!({
            "id": "x", "type": "checkbox", "page": 1,
            "xPercent": 0, "yPercent": 0, "widthPercent": 0.1, "heightPercent": 0.1
        });
        let f: Field = serde_json::from_value(raw).unwrap();
        assert_eq!(f.kind, FieldKind::Unknown);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let mut f = signature(Some("https://cdn.example/sig.png"));
        f.font_size_percent = Some(0.02);
        let value = serde_json::to_value(&f).unwrap();
        assert_eq!(value["type"], "signature");
        assert_eq!(value["signatureUrl"], "https://cdn.example/sig.png");
        assert_eq!(value["xPercent"], 0.1);
        assert_eq!(value["fontSizePercent"], 0.02);
    }

    #[test]
    fn test_clamp_pulls_into_range() {
        let mut f = text("a");
        f.x_percent = -0.2;
        f.y_percent = 1.4;
        f.width_percent = 0.0;
        f.height_percent = 3.0;
        let c = f.clamped();
        assert_eq!(
            (c.x_percent, c.y_percent, c.width_percent, c.height_percent),
            (0.0, 1.0, 0.01, 1.0)
        );
    }

    #[test]
    fn test_page_index_bounds() {
        let mut f = text("a");
        assert_eq!(f.page_index(3), Some(0));
        f.page = 3;
        assert_eq!(f.page_index(3), Some(2));
        f.page = 4;
        assert_eq!(f.page_index(3), None);
        f.page = 0;
        assert_eq!(f.page_index(3), None);
        f.page = -2;
        assert_eq!(f.page_index(3), None);
    }

    #[test]
    fn test_effective_font_size() {
        let mut f = text("a");
        // 0.6 * 63.36
        assert!((effective_font_size(&f, 63.36, 792.0) - 38.016).abs() < 1e-9);
        // Floor at 8
        assert_eq!(effective_font_size(&f, 5.0, 792.0), 8.0);
        f.font_size_percent = Some(0.02);
        assert!((effective_font_size(&f, 63.36, 792.0) - 15.84).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_font_size_percent_falls_back_to_field_height() {
        let mut f = text("a");
        for pct in [0.0, -0.02, f64::NAN, f64::INFINITY] {
            f.font_size_percent = Some(pct);
            assert_eq!(f.font_size_ratio(), None);
            assert!((effective_font_size(&f, 63.36, 792.0) - 38.016).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_text_blocks_submission() {
        let err = validate_submission(&[text("ok"), text("   ")]).unwrap_err();
        assert!(matches!(err, SignError::ValidationError(_)));

        let missing = field(FieldKind::Text { value: None });
        assert!(validate_submission(&[missing]).is_err());
    }

    #[test]
    fn test_signature_without_image_blocks_submission() {
        let err = validate_submission(&[signature(None), signature(Some("  "))]).unwrap_err();
        assert!(matches!(err, SignError::ValidationError(_)));
    }

    #[test]
    fn test_one_signature_image_satisfies_the_set() {
        let fields = [signature(None), signature(Some("data:image/png;base64,AA=="))];
        assert!(validate_submission(&fields).is_ok());
    }

    #[test]
    fn test_empty_date_and_radio_are_fine() {
        let fields = [
            field(FieldKind::Date { value: None }),
            field(FieldKind::Radio { checked: false }),
        ];
        assert!(validate_submission(&fields).is_ok());
    }

    #[test]
    fn test_parse_fields_reports_position() {
        let raw = vec![
            serde_json::to_value(text("a")).unwrap(),
            json!({ "id": "broken", "type": "text" }),
        ];
        let err = parse_fields(&raw).unwrap_err();
        assert!(err.to_string().contains("Field #2"));
    }
}
