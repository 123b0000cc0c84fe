//! PDF document access built on pdfium.
//!
//! Wraps a pdfium document and exposes the two operations the rest of the
//! app needs: page metrics and page rasterization at a fixed scale.

use bevy::prelude::*;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

/// Where a document's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(String),
}

impl DocumentSource {
    /// Interpret a locator string: http(s) locators are URLs, everything
    /// else is treated as a filesystem path.
    pub fn parse(locator: &str) -> Self {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            DocumentSource::Url(locator.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(locator))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DocumentSource::Path(path) => path.to_string_lossy().into_owned(),
            DocumentSource::Url(url) => url.clone(),
        }
    }
}

/// A page request outside `[1, page_count]`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("page {page} is out of range (document has {page_count} pages)")]
pub struct PageRangeError {
    pub page: u16,
    pub page_count: u16,
}

/// Errors raised while fetching, parsing or rasterizing a document
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not bind the pdfium library: {0}")]
    Init(String),

    #[error("failed to fetch {locator}: {message}")]
    Fetch { locator: String, message: String },

    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("failed to rasterize page {page}: {message}")]
    Rasterize { page: u16, message: String },

    #[error(transparent)]
    PageRange(#[from] PageRangeError),
}

/// Check a 1-based page number against the document's page count
pub fn validate_page(page: u16, page_count: u16) -> Result<(), PageRangeError> {
    if page == 0 || page > page_count {
        return Err(PageRangeError { page, page_count });
    }
    Ok(())
}

/// Fetch the raw bytes of a document from disk or over HTTP
pub fn fetch_bytes(source: &DocumentSource) -> Result<Vec<u8>, LoadError> {
    match source {
        DocumentSource::Path(path) => std::fs::read(path).map_err(|e| LoadError::Fetch {
            locator: path.to_string_lossy().into_owned(),
            message: e.to_string(),
        }),
        DocumentSource::Url(url) => {
            let response = ureq::get(url).call().map_err(|e| LoadError::Fetch {
                locator: url.clone(),
                message: e.to_string(),
            })?;

            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| LoadError::Fetch {
                    locator: url.clone(),
                    message: e.to_string(),
                })?;
            Ok(bytes)
        }
    }
}

/// The parsed document, kept alive for the whole session.
///
/// Parsing is idempotent per process: once loaded, the same handle serves
/// every page rasterization until a different document is opened.
#[derive(Resource)]
pub struct LoadedDocument {
    document: PdfDocument<'static>,
    page_count: u16,
}

// SAFETY: the `sync` feature serializes every pdfium FFI call behind a
// mutex, and the document is only touched from Bevy systems.
unsafe impl Send for LoadedDocument {}
unsafe impl Sync for LoadedDocument {}

impl LoadedDocument {
    /// Initialize the pdfium library.
    ///
    /// Search order:
    /// 1. Executable's directory (for app bundles)
    /// 2. Current working directory
    /// 3. System library paths
    fn init_pdfium() -> Result<Pdfium, LoadError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        if let Some(ref dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        Ok(Pdfium::new(
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|e| LoadError::Init(e.to_string()))?,
        ))
    }

    /// Parse a document from fetched bytes.
    ///
    /// The bytes and the pdfium binding are leaked so the document handle
    /// can live in a resource for the rest of the process.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoadError> {
        let pdfium = Box::leak(Box::new(Self::init_pdfium()?));
        let bytes_static: &'static [u8] = Box::leak(bytes.into_boxed_slice());

        let document = pdfium
            .load_pdf_from_byte_slice(bytes_static, None)
            .map_err(|e| LoadError::Parse(e.to_string()))?;

        let page_count = document.pages().len();
        Ok(Self {
            document,
            page_count,
        })
    }

    pub fn page_count(&self) -> u16 {
        self.page_count
    }

    fn get_page(&self, page_number: u16) -> Result<PdfPage<'_>, LoadError> {
        validate_page(page_number, self.page_count)?;
        self.document
            .pages()
            .get(page_number - 1)
            .map_err(|e| LoadError::Rasterize {
                page: page_number,
                message: e.to_string(),
            })
    }

    /// Page dimensions in PDF points (1-based page number)
    pub fn page_size(&self, page_number: u16) -> Result<Vec2, LoadError> {
        let page = self.get_page(page_number)?;
        Ok(Vec2::new(page.width().value, page.height().value))
    }

    /// Rasterize a page to RGBA at `scale` times its point size.
    ///
    /// Page numbers are 1-based and validated even though the navigation
    /// buttons are already range-limited.
    pub fn rasterize(&self, page_number: u16, scale: f32) -> Result<RgbaImage, LoadError> {
        let page = self.get_page(page_number)?;

        let width = (page.width().value * scale).round().max(1.0) as i32;
        let height = (page.height().value * scale).round().max(1.0) as i32;

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| LoadError::Rasterize {
                page: page_number,
                message: e.to_string(),
            })?;

        let (w, h) = (bitmap.width() as u32, bitmap.height() as u32);
        let pixels = bitmap.as_rgba_bytes().to_vec();

        RgbaImage::from_raw(w, h, pixels).ok_or_else(|| LoadError::Rasterize {
            page: page_number,
            message: "bitmap size mismatch".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse_urls() {
        assert_eq!(
            DocumentSource::parse("https://example.com/a.pdf"),
            DocumentSource::Url("https://example.com/a.pdf".to_string())
        );
        assert_eq!(
            DocumentSource::parse("http://example.com/a.pdf"),
            DocumentSource::Url("http://example.com/a.pdf".to_string())
        );
    }

    #[test]
    fn test_source_parse_paths() {
        assert_eq!(
            DocumentSource::parse("/home/user/doc.pdf"),
            DocumentSource::Path(PathBuf::from("/home/user/doc.pdf"))
        );
        assert_eq!(
            DocumentSource::parse("relative/doc.pdf"),
            DocumentSource::Path(PathBuf::from("relative/doc.pdf"))
        );
    }

    #[test]
    fn test_validate_page_bounds() {
        assert!(validate_page(1, 3).is_ok());
        assert!(validate_page(3, 3).is_ok());
        assert!(validate_page(0, 3).is_err());
        assert!(validate_page(4, 3).is_err());
    }

    #[test]
    fn test_page_range_error_display() {
        let err = PageRangeError {
            page: 9,
            page_count: 4,
        };
        assert_eq!(
            err.to_string(),
            "page 9 is out of range (document has 4 pages)"
        );
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::Fetch {
            locator: "https://example.com/a.pdf".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch https://example.com/a.pdf: connection refused"
        );
    }
}
