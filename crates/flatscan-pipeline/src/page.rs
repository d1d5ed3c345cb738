//! Per-page lifecycle and the capture session.
//!
//! ```text
//! Pending ──process──▶ Processing ──▶ Done         (detected corners, rectified)
//!                                  ├─▶ NeedsReview  (default corners, rectified)
//!                                  └─▶ Failed       (pass-through)
//! NeedsReview | Done | Failed | Adjusted ──adjust──▶ Adjusted | Failed
//! NeedsReview | Adjusted ──confirm──▶ Done
//! ```
//!
//! `Processing` is only observable while [`Page::process`] runs. Every
//! other transition returns [`ScanError::InvalidTransition`].

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corners::{CornerOrigin, CornerSet};
use crate::types::{Fallback, ScanConfig, ScanError, ScanOutcome};

/// Where a page is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageStatus {
    /// Captured, not yet scanned.
    Pending,
    /// Scan in progress.
    Processing,
    /// Rectified with default corners; the user should check them.
    NeedsReview,
    /// Rectified with user-supplied corners.
    Adjusted,
    /// Rectification was refused; the output is the original image.
    Failed,
    /// Accepted.
    Done,
}

/// One captured page.
#[derive(Debug, Clone)]
pub struct Page {
    source: RgbaImage,
    corners: Option<CornerSet>,
    output: Option<RgbaImage>,
    fallbacks: Vec<Fallback>,
    status: PageStatus,
}

impl Page {
    /// A freshly captured page.
    #[must_use]
    pub const fn new(source: RgbaImage) -> Self {
        Self {
            source,
            corners: None,
            output: None,
            fallbacks: Vec::new(),
            status: PageStatus::Pending,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> PageStatus {
        self.status
    }

    /// The captured image.
    #[must_use]
    pub const fn source(&self) -> &RgbaImage {
        &self.source
    }

    /// Corners used by the latest scan, if any.
    #[must_use]
    pub const fn corners(&self) -> Option<&CornerSet> {
        self.corners.as_ref()
    }

    /// Output of the latest scan: the enhanced page, or the original on
    /// pass-through.
    #[must_use]
    pub const fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }

    /// Degradations reported by the latest scan.
    #[must_use]
    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }

    /// Run automatic detection and rectification.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidTransition`] unless the page is
    /// [`PageStatus::Pending`].
    pub fn process(&mut self, config: &ScanConfig) -> Result<PageStatus, ScanError> {
        self.require(&[PageStatus::Pending], "process")?;
        self.status = PageStatus::Processing;

        let outcome = crate::scan(&self.source, config);
        let status = if !outcome.rectified {
            PageStatus::Failed
        } else if outcome.corners.origin() == CornerOrigin::Fallback {
            PageStatus::NeedsReview
        } else {
            PageStatus::Done
        };
        self.apply(outcome, status);
        Ok(status)
    }

    /// Re-rectify with user-supplied corners.
    ///
    /// The corners are always treated as manual, whatever their origin
    /// tag.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidTransition`] from
    /// [`PageStatus::Pending`] or [`PageStatus::Processing`].
    pub fn adjust(&mut self, corners: CornerSet, config: &ScanConfig) -> Result<PageStatus, ScanError> {
        self.require(
            &[
                PageStatus::NeedsReview,
                PageStatus::Done,
                PageStatus::Failed,
                PageStatus::Adjusted,
            ],
            "adjust",
        )?;

        let manual = CornerSet::manual(*corners.points());
        let outcome = crate::scan_with_corners(&self.source, manual, config);
        let status = if outcome.rectified {
            PageStatus::Adjusted
        } else {
            PageStatus::Failed
        };
        self.apply(outcome, status);
        Ok(status)
    }

    /// Accept the current result.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidTransition`] unless the page is
    /// [`PageStatus::NeedsReview`] or [`PageStatus::Adjusted`].
    pub fn confirm(&mut self) -> Result<(), ScanError> {
        self.require(&[PageStatus::NeedsReview, PageStatus::Adjusted], "confirm")?;
        self.status = PageStatus::Done;
        Ok(())
    }

    fn require(&self, allowed: &[PageStatus], action: &'static str) -> Result<(), ScanError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(ScanError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    fn apply(&mut self, outcome: ScanOutcome, status: PageStatus) {
        debug!(?status, fallbacks = ?outcome.fallbacks, "page scanned");
        self.corners = Some(outcome.corners);
        self.output = Some(outcome.image);
        self.fallbacks = outcome.fallbacks;
        self.status = status;
    }
}

/// An ordered collection of captured pages.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    pages: Vec<Page>,
}

impl CaptureSession {
    /// An empty session.
    #[must_use]
    pub const fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Append a captured image as a pending page and return its index.
    pub fn push(&mut self, image: RgbaImage) -> usize {
        self.pages.push(Page::new(image));
        self.pages.len() - 1
    }

    /// Page at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Mutable page at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    /// Number of pages.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if the session has no pages.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Remove a page, shifting later pages down.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::PageIndex`] if `index` is out of range.
    pub fn discard(&mut self, index: usize) -> Result<Page, ScanError> {
        if index >= self.pages.len() {
            return Err(ScanError::PageIndex(index));
        }
        info!(index, "page discarded");
        Ok(self.pages.remove(index))
    }

    /// Replace a page's image and reset it to pending.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::PageIndex`] if `index` is out of range.
    pub fn retake(&mut self, index: usize, image: RgbaImage) -> Result<(), ScanError> {
        let page = self.pages.get_mut(index).ok_or(ScanError::PageIndex(index))?;
        *page = Page::new(image);
        info!(index, "page retaken");
        Ok(())
    }

    /// Process every pending page. Returns how many were processed.
    pub fn process_pending(&mut self, config: &ScanConfig) -> usize {
        let mut processed = 0;
        for page in &mut self.pages {
            if page.status == PageStatus::Pending && page.process(config).is_ok() {
                processed += 1;
            }
        }
        processed
    }

    /// Pages in capture order.
    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::types::{Dimensions, Point};

    /// Dark table with a bright axis-aligned page.
    fn document() -> RgbaImage {
        RgbaImage::from_fn(200, 200, |x, y| {
            if (40..160).contains(&x) && (40..160).contains(&y) {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([30, 30, 30, 255])
            }
        })
    }

    fn uniform() -> RgbaImage {
        RgbaImage::from_pixel(100, 100, Rgba([120, 120, 120, 255]))
    }

    #[test]
    fn new_page_is_pending() {
        let page = Page::new(uniform());
        assert_eq!(page.status(), PageStatus::Pending);
        assert!(page.output().is_none());
        assert!(page.corners().is_none());
    }

    #[test]
    fn detected_document_is_done() {
        let mut page = Page::new(document());
        assert_eq!(page.process(&ScanConfig::default()).unwrap(), PageStatus::Done);
        assert_eq!(page.corners().unwrap().origin(), CornerOrigin::Detected);
        assert!(page.fallbacks().is_empty());
    }

    #[test]
    fn uniform_image_needs_review() {
        let mut page = Page::new(uniform());
        assert_eq!(
            page.process(&ScanConfig::default()).unwrap(),
            PageStatus::NeedsReview
        );
        assert_eq!(page.fallbacks(), &[Fallback::DetectionFailure]);
        page.confirm().unwrap();
        assert_eq!(page.status(), PageStatus::Done);
    }

    #[test]
    fn process_twice_is_rejected() {
        let mut page = Page::new(uniform());
        page.process(&ScanConfig::default()).unwrap();
        let err = page.process(&ScanConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidTransition {
                from: PageStatus::NeedsReview,
                action: "process"
            }
        ));
    }

    #[test]
    fn adjust_then_confirm() {
        let config = ScanConfig::default();
        let mut page = Page::new(uniform());
        page.process(&config).unwrap();

        let corners = CornerSet::full_frame(Dimensions::new(100, 100));
        assert_eq!(page.adjust(corners, &config).unwrap(), PageStatus::Adjusted);
        assert_eq!(page.corners().unwrap().origin(), CornerOrigin::Manual);
        assert_eq!(page.output().unwrap().dimensions(), (100, 100));

        page.confirm().unwrap();
        assert_eq!(page.status(), PageStatus::Done);
    }

    #[test]
    fn adjust_with_tiny_quad_fails() {
        let config = ScanConfig::default();
        let mut page = Page::new(uniform());
        page.process(&config).unwrap();
        let tiny = CornerSet::manual([
            Point::new(10.0, 10.0),
            Point::new(12.0, 10.0),
            Point::new(12.0, 12.0),
            Point::new(10.0, 12.0),
        ]);
        assert_eq!(page.adjust(tiny, &config).unwrap(), PageStatus::Failed);
        assert_eq!(page.output().unwrap(), page.source());
        // Failed pages can be adjusted again but not confirmed.
        assert!(page.confirm().is_err());
    }

    #[test]
    fn adjust_pending_is_rejected() {
        let mut page = Page::new(uniform());
        let corners = CornerSet::full_frame(Dimensions::new(100, 100));
        assert!(page.adjust(corners, &ScanConfig::default()).is_err());
        assert_eq!(page.status(), PageStatus::Pending);
    }

    #[test]
    fn confirm_done_is_rejected() {
        let mut page = Page::new(document());
        page.process(&ScanConfig::default()).unwrap();
        assert!(page.confirm().is_err());
    }

    #[test]
    fn session_push_discard_retake() {
        let mut session = CaptureSession::new();
        assert!(session.is_empty());
        assert_eq!(session.push(uniform()), 0);
        assert_eq!(session.push(document()), 1);
        assert_eq!(session.len(), 2);

        assert_eq!(session.process_pending(&ScanConfig::default()), 2);
        assert_eq!(session.get(1).unwrap().status(), PageStatus::Done);

        session.retake(1, uniform()).unwrap();
        assert_eq!(session.get(1).unwrap().status(), PageStatus::Pending);
        assert_eq!(session.process_pending(&ScanConfig::default()), 1);

        let removed = session.discard(0).unwrap();
        assert_eq!(removed.status(), PageStatus::NeedsReview);
        assert_eq!(session.len(), 1);
        assert_eq!(session.iter().count(), 1);

        assert!(matches!(session.discard(5), Err(ScanError::PageIndex(5))));
        assert!(matches!(
            session.retake(5, uniform()),
            Err(ScanError::PageIndex(5))
        ));
    }
}
