//! Bake fields into page content streams
//!
//! Every field becomes its own `q … Q` content stream appended after the
//! page's existing content, so later fields paint over earlier ones and no
//! field can leak graphics state into another.

use crate::coords::{to_page_rect, PageRect};
use crate::document::SigningDocument;
use crate::error::{SignError, SkipReason};
use crate::field::{effective_font_size, Field, FieldKind};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use serde::Serialize;
use sigmatte_core::RasterImage;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tracing::{debug, warn};

/// Format for date fields that carry no value
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Radio diameter as a fraction of the shorter rect side
const RADIO_RATIO: f64 = 0.6;

/// Checked dot radius relative to the outline radius
const RADIO_DOT_RATIO: f64 = 0.6;

/// Control point offset for a quarter circle drawn as one cubic Bézier
const KAPPA: f64 = 0.552_284_75;

const FONT_RESOURCE: &str = "SgnHelv";
const IMAGE_RESOURCE: &str = "SgnIm";

/// Per-call inputs that are not part of a field
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Text drawn for date fields without a value
    pub today: String,
}

impl RenderContext {
    pub fn now() -> Self {
        Self {
            today: chrono::Local::now().format(DATE_FORMAT).to_string(),
        }
    }
}

/// Decoded signature images keyed by the URL they were fetched from.
/// A failed fetch is kept as its error text.
pub type SignatureImages = HashMap<String, Result<RasterImage, String>>;

/// What happened to one submitted field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOutcome {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl FieldOutcome {
    pub fn rendered(id: &str) -> Self {
        Self {
            id: id.to_string(),
            skipped: None,
        }
    }

    pub fn skipped(id: &str, reason: SkipReason) -> Self {
        Self {
            id: id.to_string(),
            skipped: Some(reason),
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Draw every field in order. Fields that cannot be drawn are reported as
/// skipped and never abort the pass.
pub fn render_fields(
    doc: &mut SigningDocument,
    fields: &[Field],
    images: &SignatureImages,
    ctx: &RenderContext,
) -> Vec<FieldOutcome> {
    let mut renderer = FieldRenderer::new(doc, ctx);
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| match renderer.render(index, field, images) {
            Ok(()) => FieldOutcome::rendered(&field.id),
            Err(reason) => {
                warn!(field = %field.id, kind = field.kind.name(), %reason, "Skipping field");
                FieldOutcome::skipped(&field.id, reason)
            }
        })
        .collect()
}

pub struct FieldRenderer<'a> {
    doc: &'a mut SigningDocument,
    ctx: &'a RenderContext,
    font_id: Option<ObjectId>,
    /// Pages whose original content has been wrapped in q/Q
    isolated: HashSet<ObjectId>,
    /// Font resource name registered on each page
    page_fonts: HashMap<ObjectId, String>,
}

impl<'a> FieldRenderer<'a> {
    pub fn new(doc: &'a mut SigningDocument, ctx: &'a RenderContext) -> Self {
        Self {
            doc,
            ctx,
            font_id: None,
            isolated: HashSet::new(),
            page_fonts: HashMap::new(),
        }
    }

    /// Draw one field; `index` is its position in the submission and keeps
    /// resource names stable across runs
    pub fn render(
        &mut self,
        index: usize,
        field: &Field,
        images: &SignatureImages,
    ) -> Result<(), SkipReason> {
        let field = field.clamped();
        let page_id = field
            .page_index(self.doc.page_count())
            .and_then(|i| self.doc.page_id(i))
            .ok_or(SkipReason::InvalidPage(field.page))?;

        let [origin_x, origin_y, page_width, page_height] = self.doc.media_box(page_id);
        let rect = to_page_rect(&field, page_width, page_height).translate(origin_x, origin_y);
        debug!(field = %field.id, ?rect, "Resolved field rectangle");

        let operations = match &field.kind {
            FieldKind::Text { value } => {
                let text = value.as_deref().unwrap_or("");
                self.text_operations(page_id, &field, rect, page_height, text)
            }
            FieldKind::Date { value } => {
                let text = value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .unwrap_or(&self.ctx.today)
                    .to_string();
                self.text_operations(page_id, &field, rect, page_height, &text)
            }
            FieldKind::Signature { .. } => {
                let url = field.signature_url().ok_or(SkipReason::MissingSignature)?;
                let image = match images.get(url) {
                    Some(Ok(image)) => image,
                    Some(Err(e)) => return Err(SkipReason::SignatureUnavailable(e.clone())),
                    None => {
                        return Err(SkipReason::SignatureUnavailable(
                            "image was not fetched".to_string(),
                        ))
                    }
                };
                self.image_operations(page_id, index, rect, image)
            }
            FieldKind::Radio { checked } => {
                Ok(radio_operations(&field, rect, page_height, *checked))
            }
            FieldKind::Unknown => return Err(SkipReason::UnknownType),
        }
        .map_err(draw_failed)?;

        self.paint(page_id, operations).map_err(draw_failed)
    }

    fn paint(&mut self, page_id: ObjectId, operations: Vec<Operation>) -> Result<(), SignError> {
        if self.isolated.insert(page_id) {
            self.doc.isolate_contents(page_id)?;
        }

        let mut wrapped = Vec::with_capacity(operations.len() + 2);
        wrapped.push(Operation::new("q", vec![]));
        wrapped.extend(operations);
        wrapped.push(Operation::new("Q", vec![]));

        let bytes = Content {
            operations: wrapped,
        }
        .encode()
        .map_err(|e| SignError::SerializationError(e.to_string()))?;
        self.doc.append_contents(page_id, bytes)
    }

    fn text_operations(
        &mut self,
        page_id: ObjectId,
        field: &Field,
        rect: PageRect,
        page_height: f64,
        text: &str,
    ) -> Result<Vec<Operation>, SignError> {
        let font = self.font_on_page(page_id)?;
        let font_size = effective_font_size(field, rect.height, page_height);
        let baseline = rect.y + rect.height / 2.0 - font_size / 3.0;

        Ok(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.into_bytes()), real(font_size)]),
            Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
            Operation::new("Td", vec![real(rect.x), real(baseline)]),
            Operation::new(
                "Tj",
                vec![Object::String(win_ansi_bytes(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ])
    }

    fn image_operations(
        &mut self,
        page_id: ObjectId,
        index: usize,
        rect: PageRect,
        image: &RasterImage,
    ) -> Result<Vec<Operation>, SignError> {
        if image.is_empty() {
            return Err(SignError::ValidationError(
                "signature image has no pixels".to_string(),
            ));
        }

        let image_id = embed_image(self.doc, image)?;
        let mut resources = self.doc.resources(page_id)?;
        let xobjects = sub_dict(&mut resources, b"XObject")?;
        let name = free_name(xobjects, &format!("{}{}", IMAGE_RESOURCE, index));
        xobjects.set(name.clone(), image_id);
        self.doc.set_resources(page_id, resources)?;

        let (draw_w, draw_h, draw_x, draw_y) =
            fit_centered(rect, f64::from(image.width()), f64::from(image.height()));

        Ok(vec![
            Operation::new(
                "cm",
                vec![
                    real(draw_w),
                    real(0.0),
                    real(0.0),
                    real(draw_h),
                    real(draw_x),
                    real(draw_y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
        ])
    }

    /// Register Helvetica on the page once and return its resource name
    fn font_on_page(&mut self, page_id: ObjectId) -> Result<String, SignError> {
        if let Some(name) = self.page_fonts.get(&page_id) {
            return Ok(name.clone());
        }

        let font_id = match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        };

        let mut resources = self.doc.resources(page_id)?;
        let fonts = sub_dict(&mut resources, b"Font")?;
        let name = free_name(fonts, FONT_RESOURCE);
        fonts.set(name.clone(), font_id);
        self.doc.set_resources(page_id, resources)?;

        self.page_fonts.insert(page_id, name.clone());
        Ok(name)
    }
}

fn draw_failed(e: SignError) -> SkipReason {
    SkipReason::DrawFailed(e.to_string())
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Aspect-fit `(img_w, img_h)` inside `rect`, centered.
/// Returns `(width, height, x, y)` of the drawn image.
pub fn fit_centered(rect: PageRect, img_w: f64, img_h: f64) -> (f64, f64, f64, f64) {
    let scale = (rect.width / img_w).min(rect.height / img_h);
    let draw_w = img_w * scale;
    let draw_h = img_h * scale;
    (
        draw_w,
        draw_h,
        rect.x + (rect.width - draw_w) / 2.0,
        rect.y + (rect.height - draw_h) / 2.0,
    )
}

/// Map text to single-byte WinAnsi codes, `?` for anything outside Latin-1
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn radio_operations(field: &Field, rect: PageRect, page_height: f64, checked: bool) -> Vec<Operation> {
    let diameter = match field.font_size_ratio() {
        Some(pct) => pct * page_height,
        None => rect.width.min(rect.height) * RADIO_RATIO,
    };
    let radius = diameter / 2.0;
    let (cx, cy) = rect.center();

    let mut ops = vec![
        Operation::new("w", vec![real(1.0)]),
        Operation::new("RG", vec![real(0.0), real(0.0), real(0.0)]),
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
    ];
    ops.extend(circle_path(cx, cy, radius));
    ops.push(Operation::new("B", vec![]));

    if checked {
        ops.push(Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]));
        ops.extend(circle_path(cx, cy, radius * RADIO_DOT_RATIO));
        ops.push(Operation::new("f", vec![]));
    }
    ops
}

/// Closed circle path from four cubic Bézier quarter arcs
fn circle_path(cx: f64, cy: f64, r: f64) -> Vec<Operation> {
    let k = r * KAPPA;
    let curve = |pts: [f64; 6]| Operation::new("c", pts.iter().map(|v| real(*v)).collect());

    vec![
        Operation::new("m", vec![real(cx + r), real(cy)]),
        curve([cx + r, cy + k, cx + k, cy + r, cx, cy + r]),
        curve([cx - k, cy + r, cx - r, cy + k, cx - r, cy]),
        curve([cx - r, cy - k, cx - k, cy - r, cx, cy - r]),
        curve([cx + k, cy - r, cx + r, cy - k, cx + r, cy]),
        Operation::new("h", vec![]),
    ]
}

/// Add an RGB image XObject with a DeviceGray soft mask carrying alpha
fn embed_image(doc: &mut SigningDocument, image: &RasterImage) -> Result<ObjectId, SignError> {
    let rgba = image.as_rgba();
    let pixel_count = rgba.pixels().len();
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let width = i64::from(image.width());
    let height = i64::from(image.height());

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));

    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => smask_id,
        },
        deflate(&rgb)?,
    )))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SignError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| SignError::SerializationError(e.to_string()))
}

/// Mutable handle to a resource sub-dictionary, created if missing.
/// `SigningDocument::resources` has already inlined any references.
fn sub_dict<'d>(resources: &'d mut Dictionary, key: &[u8]) -> Result<&'d mut Dictionary, SignError> {
    if !resources.has(key) {
        resources.set(key.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    match resources.get_mut(key) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(SignError::ParseError(format!(
            "Resource entry {} is not a dictionary",
            String::from_utf8_lossy(key)
        ))),
    }
}

/// `base`, or `base_2`, `base_3`… if the page already uses that name
fn free_name(dict: &Dictionary, base: &str) -> String {
    if !dict.has(base.as_bytes()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !dict.has(candidate.as_bytes()))
        .unwrap_or_else(|| base.to_string())
}
