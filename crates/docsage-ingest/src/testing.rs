//! Test fixtures: in-memory PDFs and a scripted describer.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::decode::paeth;
use docsage_core::{Error, ImageDescriber, Result};

/// Pixel samples shared by the RGB fixtures.
pub fn rgb_pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| [(i % 256) as u8, (i / width % 256) as u8, 200])
        .collect()
}

fn rgb_image_dict(width: u32, height: u32) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    }
}

/// Unfiltered 8-bit RGB image XObject.
pub fn raw_image_stream(width: u32, height: u32) -> Stream {
    Stream::new(rgb_image_dict(width, height), rgb_pixels(width, height))
}

/// FlateDecode RGB image XObject, optionally PNG-predicted (Predictor 15)
/// with every row filter type in rotation.
pub fn flate_image_stream(width: u32, height: u32, predictor: bool) -> Stream {
    let pixels = rgb_pixels(width, height);
    let mut dict = rgb_image_dict(width, height);
    dict.set("Filter", "FlateDecode");

    let payload = if predictor {
        dict.set(
            "DecodeParms",
            dictionary! {
                "Predictor" => 15,
                "Colors" => 3,
                "BitsPerComponent" => 8,
                "Columns" => width as i64,
            },
        );
        png_filter_rows(&pixels, 3, width as usize * 3)
    } else {
        pixels
    };

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload).unwrap();
    Stream::new(dict, encoder.finish().unwrap())
}

fn png_filter_rows(pixels: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let zero = vec![0u8; row_len];
    let mut out = Vec::with_capacity(pixels.len() + pixels.len() / row_len);
    for (r, row) in pixels.chunks_exact(row_len).enumerate() {
        let prev = if r == 0 { &zero[..] } else { &pixels[(r - 1) * row_len..r * row_len] };
        let filter = (r % 5) as u8;
        out.push(filter);
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match filter {
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            out.push(row[i].wrapping_sub(predicted));
        }
    }
    out
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 90]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .unwrap();
    out
}

#[derive(Default)]
pub struct TestPage {
    pub text: Option<&'static str>,
    pub images: Vec<Stream>,
}

/// Build a PDF. With `inherit_resources`, XObjects are declared on the page
/// tree root instead of each page (only sensible for a single page).
pub fn build_pdf_with(pages: &[TestPage], inherit_resources: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    let mut shared_resources = None;
    for page in pages {
        let mut operations = Vec::new();
        if let Some(text) = page.text {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ]);
        }

        let mut xobjects = Dictionary::new();
        for (i, img) in page.images.iter().enumerate() {
            let img_id = doc.add_object(img.clone());
            xobjects.set(format!("Im{}", i), img_id);
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![200.into(), 0.into(), 0.into(), 200.into(), 72.into(), 300.into()],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(format!("Im{}", i).into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        };

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if inherit_resources {
            shared_resources = Some(resources);
        } else {
            page_dict.set("Resources", resources);
        }
        kids.push(doc.add_object(page_dict).into());
    }

    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    if let Some(resources) = shared_resources {
        pages_dict.set("Resources", resources);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn build_pdf(pages: &[TestPage]) -> Vec<u8> {
    build_pdf_with(pages, false)
}

/// One page drawing `direct` images itself and `in_form` images through a
/// Form XObject `Fm0` declared after them.
pub fn build_pdf_with_form(direct: Vec<Stream>, in_form: Vec<Stream>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let draw = |name: String| {
        vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![200.into(), 0.into(), 0.into(), 200.into(), 72.into(), 300.into()],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]
    };

    let mut form_xobjects = Dictionary::new();
    let mut form_ops = Vec::new();
    for (i, img) in in_form.into_iter().enumerate() {
        form_xobjects.set(format!("Im{}", i), doc.add_object(img));
        form_ops.extend(draw(format!("Im{}", i)));
    }
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Resources" => dictionary! { "XObject" => form_xobjects },
        },
        Content { operations: form_ops }.encode().unwrap(),
    ));

    let mut xobjects = Dictionary::new();
    let mut operations = Vec::new();
    for (i, img) in direct.into_iter().enumerate() {
        xobjects.set(format!("Im{}", i), doc.add_object(img));
        operations.extend(draw(format!("Im{}", i)));
    }
    xobjects.set("Fm0", form_id);
    operations.push(Operation::new("Do", vec!["Fm0".into()]));

    let content_id = doc.add_object(Stream::new(dictionary! {}, Content { operations }.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => xobjects },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Returns "<mime> #<n>" for each call, or fails every call.
#[derive(Default)]
pub struct ScriptedDescriber {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl ScriptedDescriber {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageDescriber for ScriptedDescriber {
    async fn describe_image(&self, image: &[u8], mime_type: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!image.is_empty());
        if self.fail {
            return Err(Error::HostedModel("vision model returned 500".into()));
        }
        Ok(format!("{} #{}", mime_type, n))
    }
}
