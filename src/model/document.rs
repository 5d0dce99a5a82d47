//! Document-level types: the flattened page tree over a resolver.

use crate::parser::{Dictionary, ObjectId, PdfObject, Resolver};

use super::font::FontCache;
use super::page::{parse_rect, Page, Resources, DEFAULT_MEDIA_BOX};

/// Deepest page tree accepted.
const MAX_TREE_DEPTH: usize = 256;

/// A parsed PDF document.
///
/// Built once from a [`Resolver`]; never mutated afterwards.
pub struct Document<'a> {
    resolver: Resolver<'a>,
    pages: Vec<Page>,
    info: Option<Dictionary>,
    fonts: FontCache,
    warnings: Vec<String>,
}

impl<'a> Document<'a> {
    /// Flatten the page tree under the catalog.
    ///
    /// Damage in the tree (unresolvable kids, cycles) drops the affected
    /// subtree and is recorded in [`warnings`](Self::warnings).
    pub fn build(resolver: Resolver<'a>) -> Self {
        let fonts = FontCache::new();
        let mut warnings = resolver.warnings().to_vec();

        let mut walker = TreeWalker {
            resolver: &resolver,
            fonts: &fonts,
            pages: Vec::new(),
            warnings: Vec::new(),
        };
        match resolver.catalog().get("Pages") {
            Some(root) if !root.is_null() => {
                let mut path = Vec::new();
                walker.walk(root, &Inherited::default(), &mut path, 0);
            }
            _ => walker.warnings.push("Document catalog has no page tree".to_string()),
        }
        let TreeWalker {
            pages,
            warnings: tree_warnings,
            ..
        } = walker;
        warnings.extend(tree_warnings);

        if let Some(count) = resolver
            .catalog()
            .get("Pages")
            .and_then(|root| resolver.follow(root).ok())
            .and_then(|root| root.as_dict().and_then(|d| d.get_i64("Count")))
        {
            if count != pages.len() as i64 {
                log::debug!("Page tree /Count is {} but {} pages were found", count, pages.len());
            }
        }
        log::debug!("Flattened page tree into {} pages", pages.len());

        let info = match resolver.get_dict(resolver.trailer(), "Info") {
            Ok(info) => info.and_then(|info| info.as_dict().cloned()),
            Err(err) => {
                log::warn!("Information dictionary cannot be resolved: {}", err);
                warnings.push(format!("Document information dictionary cannot be resolved: {err}"));
                None
            }
        };

        Self {
            resolver,
            pages,
            info,
            fonts,
            warnings,
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    /// Pages in page-tree order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_num: u32) -> Option<&Page> {
        if page_num == 0 {
            return None;
        }
        self.pages.get((page_num - 1) as usize)
    }

    /// The document information dictionary.
    pub fn info(&self) -> Option<&Dictionary> {
        self.info.as_ref()
    }

    pub fn catalog(&self) -> &Dictionary {
        self.resolver.catalog()
    }

    pub fn fonts(&self) -> &FontCache {
        &self.fonts
    }

    /// Structural damage: resolver warnings first, then page tree warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Load a resource dictionary (a form XObject's, for instance) through
    /// the document's font cache.
    pub fn load_resources(&self, dict: &Dictionary) -> (Resources, Vec<String>) {
        Resources::load(dict, &self.resolver, &self.fonts)
    }
}

/// Attributes passed down the page tree.
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Dictionary>,
    media_box: Option<[f64; 4]>,
}

struct TreeWalker<'r, 'a> {
    resolver: &'r Resolver<'a>,
    fonts: &'r FontCache,
    pages: Vec<Page>,
    warnings: Vec<String>,
}

impl TreeWalker<'_, '_> {
    /// Pre-order, left to right. `path` holds the ancestors of `node`.
    fn walk(&mut self, node: &PdfObject, inherited: &Inherited, path: &mut Vec<ObjectId>, depth: usize) {
        let id = node.as_reference();
        if let Some(id) = id {
            if path.contains(&id) {
                log::warn!("Page tree cycle at {} {} R", id.0, id.1);
                self.warnings.push(format!(
                    "Page tree contains a cycle at object {} {} R; subtree skipped",
                    id.0, id.1
                ));
                return;
            }
        }
        if depth > MAX_TREE_DEPTH {
            self.warnings
                .push("Page tree is nested too deeply; deeper pages skipped".to_string());
            return;
        }

        let resolved = match self.resolver.follow(node) {
            Ok(resolved) => resolved,
            Err(err) => {
                log::warn!("Page tree node cannot be resolved: {}", err);
                self.warnings.push(format!("Page tree node cannot be resolved: {err}"));
                return;
            }
        };
        let Some(dict) = resolved.as_dict() else {
            self.warnings.push(format!(
                "Page tree node is a {}, not a dictionary; skipped",
                resolved.type_name()
            ));
            return;
        };

        let mut attrs = inherited.clone();
        match self.resolver.get_dict(dict, "Resources") {
            Ok(Some(resources)) => attrs.resources = resources.as_dict().cloned(),
            Ok(None) => {}
            Err(err) => self
                .warnings
                .push(format!("Page resources cannot be resolved: {err}")),
        }
        if let Some(media_box) = self
            .resolver
            .get(dict, "MediaBox")
            .ok()
            .flatten()
            .and_then(|rect| parse_rect(&rect))
        {
            attrs.media_box = Some(media_box);
        }

        let is_tree_node = match dict.type_name() {
            Some("Pages") => true,
            Some("Page") => false,
            _ => dict.contains_key("Kids"),
        };
        if !is_tree_node {
            self.add_page(id, dict, &attrs);
            return;
        }

        let kids = match self.resolver.get(dict, "Kids") {
            Ok(Some(kids)) => kids,
            Ok(None) => return,
            Err(err) => {
                self.warnings.push(format!("Page tree /Kids cannot be resolved: {err}"));
                return;
            }
        };
        let Some(kids) = kids.as_array() else {
            self.warnings.push("Page tree /Kids is not an array".to_string());
            return;
        };
        if let Some(id) = id {
            path.push(id);
        }
        for kid in kids {
            self.walk(kid, &attrs, path, depth + 1);
        }
        if id.is_some() {
            path.pop();
        }
    }

    fn add_page(&mut self, id: Option<ObjectId>, dict: &Dictionary, attrs: &Inherited) {
        let index = self.pages.len() as u32 + 1;
        let (resources, mut warnings) = match &attrs.resources {
            Some(resources) => Resources::load(resources, self.resolver, self.fonts),
            None => (Resources::new(), Vec::new()),
        };
        let contents = self.content_ids(dict, &mut warnings);
        self.pages.push(Page {
            index,
            id,
            media_box: attrs.media_box.unwrap_or(DEFAULT_MEDIA_BOX),
            resources,
            contents,
            warnings,
        });
    }

    /// `/Contents` may be one stream reference, an array of them, or a
    /// reference to such an array.
    fn content_ids(&self, dict: &Dictionary, warnings: &mut Vec<String>) -> Vec<ObjectId> {
        let references = |items: &[PdfObject]| -> Vec<ObjectId> {
            items.iter().filter_map(PdfObject::as_reference).collect()
        };
        match dict.get("Contents") {
            None | Some(PdfObject::Null) => Vec::new(),
            Some(PdfObject::Reference(id)) => match self.resolver.resolve(*id) {
                Ok(object) => match object.as_array() {
                    Some(items) => references(items),
                    None => vec![*id],
                },
                // Kept so the interpreter reports it against the page.
                Err(_) => vec![*id],
            },
            Some(PdfObject::Array(items)) => references(items),
            Some(other) => {
                warnings.push(format!("Page /Contents is a {}; ignored", other.type_name()));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractOptions;

    fn build_pdf(objects: &[&str]) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R /Info 2 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        out
    }

    fn document(pdf: &[u8]) -> Document<'_> {
        Document::build(Resolver::new(pdf, &ExtractOptions::default()).unwrap())
    }

    #[test]
    fn test_nested_tree_order_and_inheritance() {
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< /Title (T) >>",
            "<< /Type /Pages /Kids [4 0 R 5 0 R] /Count 3 /MediaBox [0 0 200 100] >>",
            "<< /Type /Pages /Kids [6 0 R 7 0 R] /Count 2 /Parent 3 0 R >>",
            "<< /Type /Page /Parent 3 0 R /Contents 8 0 R >>",
            "<< /Type /Page /Parent 4 0 R >>",
            "<< /Type /Page /Parent 4 0 R /MediaBox [0 0 50 50] >>",
            "<< /Length 0 >>\nstream\n\nendstream",
        ]);
        let doc = document(&pdf);
        assert_eq!(doc.page_count(), 3);
        let ids: Vec<_> = doc.pages().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![Some((6, 0)), Some((7, 0)), Some((5, 0))]);
        assert_eq!(doc.pages()[0].media_box, [0.0, 0.0, 200.0, 100.0]);
        assert_eq!(doc.pages()[1].media_box, [0.0, 0.0, 50.0, 50.0]);
        assert_eq!(doc.pages()[2].contents, vec![(8, 0)]);
        assert_eq!(doc.get_page(3).map(|p| p.index), Some(3));
        assert!(doc.info().is_some());
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_cycle_is_broken_with_warning() {
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< >>",
            "<< /Type /Pages /Kids [4 0 R 3 0 R] >>",
            "<< /Type /Page >>",
        ]);
        let doc = document(&pdf);
        assert_eq!(doc.page_count(), 1);
        assert!(doc.warnings().iter().any(|w| w.contains("cycle")));
    }

    #[test]
    fn test_missing_type_is_inferred_from_kids() {
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< >>",
            "<< /Kids [4 0 R] >>",
            "<< /Contents [5 0 R 6 0 R] >>",
        ]);
        let doc = document(&pdf);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages()[0].contents, vec![(5, 0), (6, 0)]);
    }

    #[test]
    fn test_unresolvable_kid_is_skipped() {
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< >>",
            "<< /Type /Pages /Kids [4 0 R 40 0 R] >>",
            "<< /Type /Page >>",
        ]);
        let doc = document(&pdf);
        assert_eq!(doc.page_count(), 1);
        assert!(doc.warnings().iter().any(|w| w.contains("cannot be resolved")));
    }

    #[test]
    fn test_fonts_are_shared_between_pages() {
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 3 0 R >>",
            "<< >>",
            "<< /Type /Pages /Kids [4 0 R 5 0 R] /Resources << /Font << /F1 6 0 R >> >> >>",
            "<< /Type /Page >>",
            "<< /Type /Page >>",
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        ]);
        let doc = document(&pdf);
        let first = doc.pages()[0].resources.font("F1").unwrap();
        let second = doc.pages()[1].resources.font("F1").unwrap();
        assert!(std::sync::Arc::ptr_eq(first, second));
        assert_eq!(doc.fonts().len(), 1);
    }
}
