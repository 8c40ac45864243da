//! PDF content extraction: page text plus described images.

use std::path::Path;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::decode::{decode_pdf_image, DecodedImage};
use docsage_core::{ContentUnit, Error, ImageDescriber, Result};

/// Page tree depth cap when looking up inherited resources.
const MAX_PARENT_DEPTH: usize = 32;

/// Nesting cap for Form XObjects; also stops self-referencing forms.
const MAX_FORM_DEPTH: usize = 8;

/// Extraction options.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Drop image units whose description request failed instead of
    /// indexing the error text.
    pub skip_failed_descriptions: bool,
}

/// Turns a PDF into content units: one text unit per non-blank page and one
/// description unit per qualifying image.
pub struct PdfExtractor {
    describer: Arc<dyn ImageDescriber>,
    options: IngestOptions,
}

impl PdfExtractor {
    pub fn new(describer: Arc<dyn ImageDescriber>) -> Self {
        Self::with_options(describer, IngestOptions::default())
    }

    pub fn with_options(describer: Arc<dyn ImageDescriber>, options: IngestOptions) -> Self {
        Self { describer, options }
    }

    /// Extract a PDF from disk. `source` metadata is the path as given.
    pub async fn extract(&self, path: &Path) -> Result<Vec<ContentUnit>> {
        if !path.is_file() {
            return Err(Error::DocumentOpen(format!("{}: no such file", path.display())));
        }
        let source = path.display().to_string();
        let pages = Document::load(path)
            .map(|doc| read_pages(&doc, &source))
            .map_err(|e| Error::DocumentOpen(format!("{}: {}", source, e)))?;
        self.describe_pages(pages, &source).await
    }

    /// Extract an uploaded PDF held in memory.
    pub async fn extract_bytes(&self, bytes: &[u8], source: &str) -> Result<Vec<ContentUnit>> {
        let pages = Document::load_mem(bytes)
            .map(|doc| read_pages(&doc, source))
            .map_err(|e| Error::DocumentOpen(format!("{}: {}", source, e)))?;
        self.describe_pages(pages, source).await
    }

    async fn describe_pages(&self, pages: Vec<PageContent>, source: &str) -> Result<Vec<ContentUnit>> {
        let mut units = Vec::new();

        for page in pages {
            if let Some(text) = page.text {
                units.push(ContentUnit::text(source, page.number, text));
            }
            for (image_index, image) in page.images {
                if let Some(unit) = self.describe(&image, source, page.number, image_index).await {
                    units.push(unit);
                }
            }
        }

        info!("Extracted {} content units from {}", units.len(), source);
        Ok(units)
    }

    async fn describe(
        &self,
        image: &DecodedImage,
        source: &str,
        page: u32,
        image_index: usize,
    ) -> Option<ContentUnit> {
        match self.describer.describe_image(&image.bytes, image.mime_type).await {
            Ok(description) => {
                info!("Processed image {} on page {}", image_index, page);
                Some(ContentUnit::image_description(source, page, image_index, &description))
            }
            Err(e) => {
                warn!("Describing image {} on page {} failed: {}", image_index, page, e);
                if self.options.skip_failed_descriptions {
                    return None;
                }
                let mut unit = ContentUnit::image_description(
                    source,
                    page,
                    image_index,
                    &format!("Error analyzing image: {}", e),
                );
                unit.metadata.insert("description_failed".into(), true.into());
                Some(unit)
            }
        }
    }
}

/// Text and qualifying images of one page, read before any model call.
struct PageContent {
    number: u32,
    text: Option<String>,
    /// `(image_index, image)`; the index counts every image XObject.
    images: Vec<(usize, DecodedImage)>,
}

fn read_pages(doc: &Document, source: &str) -> Vec<PageContent> {
    doc.get_pages()
        .into_iter()
        .map(|(number, page_id)| {
            let text = match doc.extract_text(&[number]) {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => {
                    debug!("Page {} of {} has no text", number, source);
                    None
                }
                Err(e) => {
                    warn!("Text extraction failed on page {} of {}: {}", number, source, e);
                    None
                }
            };

            let images = page_images(doc, page_id)
                .into_iter()
                .enumerate()
                .filter_map(|(index, stream)| match decode_pdf_image(stream) {
                    Ok(image) if image.meets_minimum_size() => Some((index, image)),
                    Ok(image) => {
                        debug!(
                            "Skipping {}x{} image {} on page {}",
                            image.width, image.height, index, number
                        );
                        None
                    }
                    Err(e) => {
                        warn!("Skipping image {} on page {} of {}: {}", index, number, source, e);
                        None
                    }
                })
                .collect();

            PageContent { number, text, images }
        })
        .collect()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// The page's resource dictionary, walking up the page tree when the page
/// itself declares none.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok();
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Image XObjects of a page in resource order, including images drawn
/// through Form XObjects.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<&Stream> {
    let mut images = Vec::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_images(doc, resources, 0, &mut images);
    }
    images
}

fn collect_images<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    depth: usize,
    out: &mut Vec<&'a Stream>,
) {
    if depth > MAX_FORM_DEPTH {
        return;
    }
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
    else {
        return;
    };

    for (_, obj) in xobjects.iter() {
        let Ok(stream) = resolve(doc, obj).as_stream() else {
            continue;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => out.push(stream),
            Ok(b"Form") => {
                if let Some(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|res| resolve(doc, res).as_dict().ok())
                {
                    collect_images(doc, form_resources, depth + 1, out);
                }
            }
            _ => {}
        }
    }
}
