// PDF report of the counter collection.
// Pure aggregation in `ReportSummary`, layout in `render_pdf`, file handling in `export_report`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde::Serialize;
use thiserror::Error;

use crate::counters::Counter;
use crate::storage::file::write_atomic;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("there are no counters to export")]
    Empty,
    #[error("an export is already in progress")]
    InProgress,
    #[error("failed to render report: {0}")]
    Render(String),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub sum: i64,
    /// Two decimals, or "0" for an empty collection.
    pub average: String,
    pub max: i64,
    pub min: i64,
}

impl ReportSummary {
    pub fn from_counters(counters: &[Counter]) -> Self {
        let total = counters.len();
        let sum = counters
            .iter()
            .fold(0_i64, |acc, c| acc.saturating_add(c.count));

        if total == 0 {
            return Self {
                total,
                sum,
                average: "0".to_string(),
                max: 0,
                min: 0,
            };
        }

        Self {
            total,
            sum,
            average: format!("{:.2}", sum as f64 / total as f64),
            max: counters.iter().map(|c| c.count).max().unwrap_or(0),
            min: counters.iter().map(|c| c.count).min().unwrap_or(0),
        }
    }
}

/// `{title}-counters-{YYYY-MM-DD}.pdf`, with characters that are not legal in
/// file names replaced by `_`.
pub fn report_file_name(title: &str, date: NaiveDate) -> String {
    let safe: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let safe = if safe.is_empty() { "report".to_string() } else { safe };
    format!("{}-counters-{}.pdf", safe, date.format("%Y-%m-%d"))
}

// A4, millimetres from the bottom-left corner.
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.6;
const TOP: f32 = PAGE_HEIGHT - 20.0;
const LINE_HEIGHT: f32 = 9.0;
const SUMMARY_HEIGHT: f32 = 50.0;
const FOOTER_Y: f32 = 10.6;
const COUNT_X: f32 = PAGE_WIDTH - MARGIN - 25.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

struct Layout<'a> {
    doc: &'a PdfDocumentReference,
    fonts: &'a Fonts,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
    footer: String,
}

impl<'a> Layout<'a> {
    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.fonts.bold } else { &self.fonts.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    /// Starts a new page unless `height` still fits above the footer.
    fn reserve(&mut self, height: f32) {
        if self.y - height > FOOTER_Y + 10.0 {
            return;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Page {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
        self.draw_footer();
    }

    fn draw_footer(&self) {
        self.layer
            .use_text(self.footer.as_str(), 8.0, Mm(MARGIN), Mm(FOOTER_Y), &self.fonts.regular);
    }
}

fn render_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Render(e.to_string())
}

/// Renders the report into PDF bytes.
pub fn render_pdf(
    counters: &[Counter],
    title: &str,
    generated_at: &DateTime<Local>,
) -> Result<Vec<u8>, ReportError> {
    let (doc, _) = compose(counters, title, generated_at)?;
    doc.save_to_bytes().map_err(render_err)
}

/// Lays the report out page by page. Returns the document and its page count.
fn compose(
    counters: &[Counter],
    title: &str,
    generated_at: &DateTime<Local>,
) -> Result<(PdfDocumentReference, usize), ReportError> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?,
    };

    let mut layout = Layout {
        doc: &doc,
        fonts: &fonts,
        layer: doc.get_page(page).get_layer(layer),
        y: TOP,
        pages: 1,
        footer: format!("Exported from Counter X - {}", generated_at.year()),
    };
    layout.draw_footer();

    // Header
    layout.text(title, 24.0, MARGIN, true);
    layout.y -= 10.0;
    layout.text("Counter report", 12.0, MARGIN, false);
    layout.y -= 6.0;
    let generated = format!("Generated on {}", generated_at.format("%B %-d, %Y %H:%M"));
    layout.text(&generated, 10.0, MARGIN, false);
    layout.y -= 16.0;

    for counter in counters {
        layout.reserve(LINE_HEIGHT);
        layout.text(&counter.name, 14.0, MARGIN, true);
        layout.text(&counter.count.to_string(), 16.0, COUNT_X, true);
        layout.y -= LINE_HEIGHT;
    }

    let summary = ReportSummary::from_counters(counters);
    layout.y -= 6.0;
    layout.reserve(SUMMARY_HEIGHT);
    layout.text("Summary", 16.0, MARGIN, true);
    layout.y -= 9.0;

    let rows = [
        ("Total counters:", summary.total.to_string()),
        ("Total sum:", summary.sum.to_string()),
        ("Average:", summary.average.clone()),
        ("Maximum value:", summary.max.to_string()),
        ("Minimum value:", summary.min.to_string()),
    ];
    for (label, value) in rows {
        layout.text(label, 12.0, MARGIN, false);
        layout.text(&value, 12.0, COUNT_X, true);
        layout.y -= 7.0;
    }

    let pages = layout.pages;
    drop(layout);
    Ok((doc, pages))
}

/// Renders the report and writes it into `dir`. Returns the written path.
pub fn export_report(
    dir: &Path,
    counters: &[Counter],
    title: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, ReportError> {
    if counters.is_empty() {
        return Err(ReportError::Empty);
    }

    let bytes = render_pdf(counters, title, &now)?;
    let file_name = report_file_name(title, now.with_timezone(&Utc).date_naive());
    let path = dir.join(file_name);
    write_atomic(&path, &bytes)?;

    log::info!(
        "[Report] Exported {} counter(s) to {}",
        counters.len(),
        path.display()
    );
    Ok(path)
}

/// Lets one export run at a time. Clones share the same flag.
#[derive(Clone, Default)]
pub struct ExportGuard {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of an export; releases the guard on drop.
pub struct ExportTicket {
    busy: Arc<AtomicBool>,
}

impl ExportGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Result<ExportTicket, ReportError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReportError::InProgress)?;
        Ok(ExportTicket {
            busy: self.busy.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for ExportTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use tempfile::tempdir;

    fn counter(id: &str, count: i64) -> Counter {
        Counter {
            id: id.to_string(),
            name: format!("Counter {}", id),
            count,
        }
    }

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_summary_of_two_counters() {
        let summary = ReportSummary::from_counters(&[counter("a", 3), counter("b", 5)]);
        assert_eq!(
            summary,
            ReportSummary {
                total: 2,
                sum: 8,
                average: "4.00".to_string(),
                max: 5,
                min: 3,
            }
        );
    }

    #[test]
    fn test_summary_of_empty_collection() {
        let summary = ReportSummary::from_counters(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.sum, 0);
        assert_eq!(summary.average, "0");
        assert_eq!(summary.max, 0);
        assert_eq!(summary.min, 0);
    }

    #[test]
    fn test_summary_with_negatives() {
        let summary =
            ReportSummary::from_counters(&[counter("a", -4), counter("b", 1), counter("c", 0)]);
        assert_eq!(summary.sum, -3);
        assert_eq!(summary.average, "-1.00");
        assert_eq!(summary.max, 1);
        assert_eq!(summary.min, -4);
    }

    #[test]
    fn test_summary_average_rounds_to_two_places() {
        let summary =
            ReportSummary::from_counters(&[counter("a", 1), counter("b", 1), counter("c", 2)]);
        assert_eq!(summary.average, "1.33");
    }

    #[rstest]
    #[case("Counter X", "Counter X-counters-2024-03-09.pdf")]
    #[case("  Gym  ", "Gym-counters-2024-03-09.pdf")]
    #[case("a/b\\c:d", "a_b_c_d-counters-2024-03-09.pdf")]
    #[case("", "report-counters-2024-03-09.pdf")]
    fn test_report_file_name(#[case] title: &str, #[case] expected: &str) {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(report_file_name(title, date), expected);
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_pdf(&[counter("a", 3), counter("b", 5)], "Tally", &at_noon()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_spills_onto_more_pages() {
        let counters: Vec<Counter> = (0..80).map(|i| counter(&i.to_string(), i)).collect();

        let (_, short) = compose(&counters[..2], "Tally", &at_noon()).unwrap();
        assert_eq!(short, 1);

        // 24 rows under the header, 28 on each following page, then the summary
        let (_, long) = compose(&counters, "Tally", &at_noon()).unwrap();
        assert_eq!(long, 4);
        assert!(render_pdf(&counters, "Tally", &at_noon()).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempdir().unwrap();
        let path = export_report(dir.path(), &[counter("a", 1)], "Tally", at_noon()).unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Tally-counters-"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn test_export_refuses_empty_collection() {
        let dir = tempdir().unwrap();
        let result = export_report(dir.path(), &[], "Tally", at_noon());
        assert!(matches!(result, Err(ReportError::Empty)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_guard_allows_one_at_a_time() {
        let guard = ExportGuard::new();
        let ticket = guard.try_begin().unwrap();
        assert!(guard.is_busy());
        assert!(matches!(guard.clone().try_begin(), Err(ReportError::InProgress)));

        drop(ticket);
        assert!(!guard.is_busy());
        assert!(guard.try_begin().is_ok());
    }
}
