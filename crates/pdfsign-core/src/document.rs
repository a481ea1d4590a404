//! Loaded PDF with the page lookups the signer needs

use crate::error::SignError;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// US Letter, used when no MediaBox is found anywhere up the page tree
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent chains deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 32;

/// Wrapper around lopdf::Document keyed by zero-based page index
pub struct SigningDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl SigningDocument {
    /// Load a PDF from raw bytes
    pub fn load(bytes: &[u8]) -> Result<Self, SignError> {
        let doc = Document::load_mem(bytes).map_err(|e| SignError::ParseError(e.to_string()))?;
        // get_pages is keyed by 1-based page number, already in order
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page object for a zero-based index
    pub fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    /// Page MediaBox as [x, y, width, height], inherited from ancestors if needed
    pub fn media_box(&self, page_id: ObjectId) -> [f64; 4] {
        self.inherited(page_id, b"MediaBox")
            .and_then(|obj| self.parse_rect(obj))
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// Owned copy of the page's effective Resources, with the Font and
    /// XObject sub-dictionaries resolved inline so they can be extended
    pub fn resources(&self, page_id: ObjectId) -> Result<Dictionary, SignError> {
        let mut resources = match self.inherited(page_id, b"Resources") {
            Some(obj) => self.resolve_dict(obj)?.clone(),
            None => Dictionary::new(),
        };

        for key in [&b"Font"[..], &b"XObject"[..]] {
            if let Ok(obj) = resources.get(key) {
                let inline = self.resolve_dict(obj)?.clone();
                resources.set(key.to_vec(), Object::Dictionary(inline));
            }
        }

        Ok(resources)
    }

    /// Store Resources directly on the page, shadowing any inherited copy
    pub fn set_resources(&mut self, page_id: ObjectId, resources: Dictionary) -> Result<(), SignError> {
        self.page_dict_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Bracket the page's existing content in q/Q so anything appended
    /// later starts from the default graphics state
    pub fn isolate_contents(&mut self, page_id: ObjectId) -> Result<(), SignError> {
        let current = match self.page_dict(page_id)?.get(b"Contents") {
            Ok(obj) => obj.clone(),
            Err(_) => return Ok(()),
        };

        let mut streams = match current {
            Object::Array(items) => items,
            Object::Reference(id) => match self.doc.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            _ => {
                return Err(SignError::ParseError(
                    "Page contents is neither a stream nor an array".to_string(),
                ))
            }
        };

        let save = self
            .doc
            .add_object(lopdf::Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore = self
            .doc
            .add_object(lopdf::Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        streams.insert(0, Object::Reference(save));
        streams.push(Object::Reference(restore));

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(streams));
        Ok(())
    }

    /// Append a content stream that paints after everything already on the page
    pub fn append_contents(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), SignError> {
        self.doc
            .add_page_contents(page_id, content)
            .map_err(|e| SignError::ParseError(e.to_string()))
    }

    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Serialize the document
    pub fn save(&mut self) -> Result<Vec<u8>, SignError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| SignError::SerializationError(e.to_string()))?;
        Ok(buffer)
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary, SignError> {
        self.doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| SignError::ParseError(format!("Page {:?}: {}", page_id, e)))
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, SignError> {
        self.doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| SignError::ParseError(format!("Page {:?}: {}", page_id, e)))
    }

    /// Look up an inheritable page attribute, walking Parent links
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.doc.get_object(current?).and_then(Object::as_dict).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Result<&'a Dictionary, SignError> {
        let resolved = match obj {
            Object::Reference(id) => self
                .doc
                .get_object(*id)
                .map_err(|e| SignError::ParseError(e.to_string()))?,
            other => other,
        };
        resolved
            .as_dict()
            .map_err(|_| SignError::ParseError("Expected a dictionary".to_string()))
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Option<[f64; 4]> {
        let arr = match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_array().ok()?,
            other => other.as_array().ok()?,
        };
        if arr.len() != 4 {
            return None;
        }

        let mut values = [0.0f64; 4];
        for (slot, obj) in values.iter_mut().zip(arr) {
            *slot = self.extract_number(obj)?;
        }

        let [llx, lly, urx, ury] = values;
        let (width, height) = ((urx - llx).abs(), (ury - lly).abs());
        if width == 0.0 || height == 0.0 {
            return None;
        }
        Some([llx.min(urx), lly.min(ury), width, height])
    }

    fn extract_number(&self, obj: &Object) -> Option<f64> {
        match obj {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(f64::from(*r)),
            Object::Reference(id) => self.extract_number(self.doc.get_object(*id).ok()?),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// Build a PDF with one page per `(width, height)` entry, each carrying
    /// a small content stream
    pub(crate) fn create_test_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let kids: Vec<Object> = sizes
            .iter()
            .map(|(w, h)| {
                let content = Stream::new(
                    Dictionary::new(),
                    b"BT /F1 12 Tf 72 72 Td (Original) Tj ET".to_vec(),
                );
                let content_id = doc.add_object(content);
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), (*w).into(), (*h).into()],
                    "Contents" => content_id,
                });
                Object::Reference(page_id)
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_load_counts_pages() {
        let pdf = create_test_pdf(&[(612, 792), (842, 595)]);
        let doc = SigningDocument::load(&pdf).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(doc.page_id(1).is_some());
        assert!(doc.page_id(2).is_none());
    }

    #[test]
    fn test_html_is_not_a_pdf() {
        let html = b"<!DOCTYPE html><html><body>Not a PDF</body></html>";
        assert!(matches!(
            SigningDocument::load(html),
            Err(SignError::ParseError(_))
        ));
    }

    #[test]
    fn test_media_box_per_page() {
        let pdf = create_test_pdf(&[(612, 792), (842, 595)]);
        let doc = SigningDocument::load(&pdf).unwrap();
        let second = doc.page_id(1).unwrap();
        assert_eq!(doc.media_box(second), [0.0, 0.0, 842.0, 595.0]);
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => 1,
                "Kids" => vec![Object::Reference(page_id)],
                "MediaBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let loaded = SigningDocument::load(&bytes).unwrap();
        let page = loaded.page_id(0).unwrap();
        assert_eq!(loaded.media_box(page), [10.0, 20.0, 300.0, 400.0]);
    }

    #[test]
    fn test_resources_copy_inherited_fonts() {
        let pdf = create_test_pdf(&[(612, 792)]);
        let doc = SigningDocument::load(&pdf).unwrap();
        let page = doc.page_id(0).unwrap();
        let resources = doc.resources(page).unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
    }

    #[test]
    fn test_isolate_contents_brackets_original() {
        let pdf = create_test_pdf(&[(612, 792)]);
        let mut doc = SigningDocument::load(&pdf).unwrap();
        let page = doc.page_id(0).unwrap();
        doc.isolate_contents(page).unwrap();

        let contents = doc
            .page_dict(page)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(contents.len(), 3);
    }

    #[test]
    fn test_save_round_trips() {
        let pdf = create_test_pdf(&[(612, 792)]);
        let mut doc = SigningDocument::load(&pdf).unwrap();
        let saved = doc.save().unwrap();
        assert!(saved.starts_with(b"%PDF-"));
        assert_eq!(SigningDocument::load(&saved).unwrap().page_count(), 1);
    }
}
