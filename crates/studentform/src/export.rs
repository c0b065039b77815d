//! PDF export planning.
//!
//! A form is rendered to a single tall image by a [`PdfRasterizer`], scaled
//! to the width of an A4 page and sliced into as many pages as its height
//! needs. This module names the file and plans the pages; turning the plan
//! into PDF bytes is left to the rasterizer.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::FormConfig;
use crate::error::{Error, Result};
use crate::fields::{FieldId, FieldSet, FormKind};

/// A4 page width in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
/// A4 page height in millimetres.
pub const A4_HEIGHT_MM: f64 = 297.0;

const DEFAULT_NAME: &str = "Student";

/// Keep only ASCII letters and digits.
#[must_use]
pub fn sanitize(part: &str) -> String {
    part.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// File name for an exported form:
/// `<Org>_<FormLabel>_<Name>_<AdmissionNumber>_<Date>.pdf`.
///
/// Every part is sanitized. An empty name becomes `Student` and an empty
/// admission number is left out.
#[must_use]
pub fn pdf_file_name(form: &FormConfig, kind: FormKind, fields: &FieldSet, date: NaiveDate) -> String {
    let label = match kind {
        FormKind::Student => &form.student_form_label,
        FormKind::Media => &form.media_form_label,
    };
    let name = match sanitize(fields.text(FieldId::FullName)) {
        n if n.is_empty() => DEFAULT_NAME.to_string(),
        n => n,
    };
    let id = sanitize(fields.text(FieldId::AdmissionNumber));

    let mut parts = vec![sanitize(&form.organization), sanitize(label), name];
    if !id.is_empty() {
        parts.push(id);
    }
    parts.push(date.format("%Y-%m-%d").to_string());
    format!("{}.pdf", parts.join("_"))
}

/// One page of the plan: the full image is drawn at `y_offset_mm` so the
/// page shows its slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PagePlacement {
    /// Zero-based page index.
    pub index: usize,
    /// Vertical offset of the image on this page, zero or negative.
    pub y_offset_mm: f64,
}

/// How a rendered image maps onto A4 pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    /// Scaled image width.
    pub image_width_mm: f64,
    /// Scaled image height.
    pub image_height_mm: f64,
    /// One entry per page.
    pub pages: Vec<PagePlacement>,
}

impl PagePlan {
    /// Plan pages for an image of `width_px` by `height_px`.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn for_image(width_px: u32, height_px: u32) -> Result<Self> {
        if width_px == 0 || height_px == 0 {
            return Err(Error::internal(format!(
                "cannot plan pages for a {width_px}x{height_px} image"
            )));
        }

        let image_height_mm = f64::from(height_px) * A4_WIDTH_MM / f64::from(width_px);
        let count = page_count(image_height_mm);
        let pages = (0..count)
            .map(|index| PagePlacement {
                index,
                y_offset_mm: -(index as f64) * A4_HEIGHT_MM,
            })
            .collect();

        Ok(Self {
            image_width_mm: A4_WIDTH_MM,
            image_height_mm,
            pages,
        })
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn page_count(height_mm: f64) -> usize {
    ((height_mm / A4_HEIGHT_MM).ceil() as usize).max(1)
}

/// A rendered form image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedForm {
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
    /// Encoded image bytes.
    pub image: Vec<u8>,
}

/// Renders forms and writes planned pages out as a PDF.
pub trait PdfRasterizer {
    /// Render one form with the given values.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, kind: FormKind, fields: &FieldSet) -> Result<RenderedForm>;

    /// Write `rendered` to `file_name` following `plan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the PDF cannot be written.
    fn write(&mut self, file_name: &str, rendered: &RenderedForm, plan: &PagePlan) -> Result<()>;
}

/// Outcome of an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfExport {
    /// Name of the written file.
    pub file_name: String,
    /// Page layout used.
    pub plan: PagePlan,
}

/// Render, plan and write one form.
///
/// # Errors
///
/// Returns an error if rendering, planning or writing fails.
pub fn export_form(
    rasterizer: &mut dyn PdfRasterizer,
    form: &FormConfig,
    kind: FormKind,
    fields: &FieldSet,
    date: NaiveDate,
) -> Result<PdfExport> {
    let rendered = rasterizer.render(kind, fields)?;
    let plan = PagePlan::for_image(rendered.width_px, rendered.height_px)?;
    let file_name = pdf_file_name(form, kind, fields, date);
    rasterizer.write(&file_name, &rendered, &plan)?;
    debug!(file = %file_name, pages = plan.page_count(), "Exported form");
    Ok(PdfExport { file_name, plan })
}
