//! Rendered page previews and the temporary files behind them

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;

use super::types::PagePreview;
use crate::error::Result;

/// Produces page images for one document
pub trait PageRenderer {
    fn page_count(&self) -> usize;

    /// Render page `page_number` (1-indexed) as an image inside `dir`
    fn render(&mut self, page_number: usize, dir: &Path) -> Result<PagePreview>;
}

/// Owns the preview images of one comparison run.
///
/// Requests may arrive in any order and repeat; each page is rendered once.
/// Files are removed on [`PreviewStore::reset`] and on drop.
#[derive(Debug, Default)]
pub struct PreviewStore {
    dir: Option<TempDir>,
    pages: BTreeMap<usize, PagePreview>,
}

impl PreviewStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the rendered files, once anything was rendered
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    #[must_use]
    pub fn get(&self, page_number: usize) -> Option<&PagePreview> {
        self.pages.get(&page_number)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Previews rendered so far, in page order
    pub fn previews(&self) -> impl Iterator<Item = &PagePreview> {
        self.pages.values()
    }

    fn ensure_dir(&mut self) -> Result<PathBuf> {
        if self.dir.is_none() {
            let dir = tempfile::Builder::new().prefix("pagediff-").tempdir()?;
            debug!("Preview directory {}", dir.path().display());
            self.dir = Some(dir);
        }
        Ok(self
            .dir
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .unwrap_or_default())
    }

    /// Return the preview for `page_number`, rendering it on first request
    pub fn get_or_render(
        &mut self,
        renderer: &mut dyn PageRenderer,
        page_number: usize,
    ) -> Result<&PagePreview> {
        if !self.pages.contains_key(&page_number) {
            let dir = self.ensure_dir()?;
            let preview = renderer.render(page_number, &dir)?;
            self.pages.insert(page_number, preview);
        }
        self.pages
            .get(&page_number)
            .ok_or_else(|| crate::error::CompareError::extraction(format!("page {page_number} missing")))
    }

    /// Render every page of the document
    pub fn render_all(&mut self, renderer: &mut dyn PageRenderer) -> Result<()> {
        for page_number in 1..=renderer.page_count() {
            self.get_or_render(renderer, page_number)?;
        }
        Ok(())
    }

    /// Forget every preview and delete the files
    pub fn reset(&mut self) {
        self.pages.clear();
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                warn!("Failed to remove preview directory {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingRenderer {
        pages: usize,
        calls: Vec<usize>,
    }

    impl PageRenderer for CountingRenderer {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render(&mut self, page_number: usize, dir: &Path) -> Result<PagePreview> {
            self.calls.push(page_number);
            let path = dir.join(format!("page-{page_number}.png"));
            std::fs::write(&path, b"png")?;
            Ok(PagePreview {
                page_number,
                width: 100.0,
                height: 150.0,
                url: path.display().to_string(),
                rotation: 0,
            })
        }
    }

    #[test]
    fn repeated_requests_render_once() {
        let mut store = PreviewStore::new();
        let mut renderer = CountingRenderer {
            pages: 3,
            calls: Vec::new(),
        };
        store.get_or_render(&mut renderer, 3).unwrap();
        store.get_or_render(&mut renderer, 1).unwrap();
        store.get_or_render(&mut renderer, 3).unwrap();
        assert_eq!(renderer.calls, vec![3, 1]);

        store.render_all(&mut renderer).unwrap();
        assert_eq!(renderer.calls, vec![3, 1, 2]);
        let order: Vec<usize> = store.previews().map(|p| p.page_number).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn reset_removes_files() {
        let mut store = PreviewStore::new();
        let mut renderer = CountingRenderer {
            pages: 1,
            calls: Vec::new(),
        };
        let url = store.get_or_render(&mut renderer, 1).unwrap().url.clone();
        let dir = store.path().unwrap().to_path_buf();
        assert!(Path::new(&url).exists());

        store.reset();
        assert!(store.is_empty());
        assert!(!dir.exists());
    }
}
