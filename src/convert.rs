//! Image normalisation and PDF assembly.

use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;

use crate::error::{MangaError, Result};

/// One page normalised to baseline JPEG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ConvertedImage {
    /// Encoded size, the unit batches are measured in
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub trait ImageConverter: Send + Sync {
    fn convert_image(&self, bytes: &[u8]) -> Result<ConvertedImage>;

    /// One page per image, in order, each sized to the image's pixel dimensions
    fn images_to_pdf(&self, images: &[ConvertedImage], title: &str) -> Result<Vec<u8>>;
}

/// Decodes with `image`, re-encodes as RGB JPEG and writes PDFs with `lopdf`
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegPdfConverter;

impl JpegPdfConverter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageConverter for JpegPdfConverter {
    fn convert_image(&self, bytes: &[u8]) -> Result<ConvertedImage> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb).write_to(&mut out, ImageFormat::Jpeg)?;
        Ok(ConvertedImage {
            bytes: out.into_inner(),
            width,
            height,
        })
    }

    fn images_to_pdf(&self, images: &[ConvertedImage], title: &str) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(MangaError::Conversion("cannot build a PDF without pages".into()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(images.len());

        for img in images {
            let width = i64::from(img.width);
            let height = i64::from(img.height);
            let xobject = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                img.bytes.clone(),
            )
            .with_compression(false);
            let image_id = doc.add_object(xobject);

            // scale the unit square to the full page
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![width.into(), 0_i64.into(), 0_i64.into(), height.into(), 0_i64.into(), 0_i64.into()],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0_i64.into(), 0_i64.into(), width.into(), height.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! {
                        "Im0" => image_id,
                    },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal("rust_manga_reader"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| MangaError::Conversion(format!("writing PDF: {}", e)))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_convert_image_to_jpeg_keeps_dimensions() {
        let converted = JpegPdfConverter::new().convert_image(&png(12, 7)).unwrap();
        assert_eq!((converted.width, converted.height), (12, 7));
        assert_eq!(&converted.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(converted.len(), converted.bytes.len());
    }

    #[test]
    fn test_convert_rejects_garbage() {
        let err = JpegPdfConverter::new().convert_image(b"<html>blocked</html>").unwrap_err();
        assert!(matches!(err, MangaError::Conversion(_)));
    }

    #[test]
    fn test_pdf_has_one_page_per_image() {
        let converter = JpegPdfConverter::new();
        let pages = vec![
            converter.convert_image(&png(10, 20)).unwrap(),
            converter.convert_image(&png(30, 15)).unwrap(),
        ];
        let pdf = converter.images_to_pdf(&pages, "Chapter 1").unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        let page_ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(page_ids.len(), 2);
        let first = doc.get_dictionary(page_ids[0]).unwrap();
        let media_box = first.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 10);
        assert_eq!(media_box[3].as_i64().unwrap(), 20);
    }

    #[test]
    fn test_pdf_needs_pages() {
        assert!(JpegPdfConverter::new().images_to_pdf(&[], "empty").is_err());
    }
}
