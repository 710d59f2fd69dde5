//! Leaf elements: path, text and image.

use kurbo::{BezPath, Point, Rect, Size};

use super::element::{CanvasElement, DirtyFlags, ElementKind};
use super::paint::PaintContext;
use crate::canvas::images::{LoadedImage, SharedImageLoader, lock_loader};
use crate::tree::{NodeId, PropValue, PropertyTree};

/// Geometry of a path element.
#[derive(Debug, Clone, Default)]
pub struct PathState {
    pub(crate) source: Option<String>,
    pub(crate) path: BezPath,
}

impl PathState {
    /// SVG path data the geometry was built from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    /// Re-read the path data: the `svg` child if present, else the node's own value.
    fn refresh(&mut self, tree: &PropertyTree, node: NodeId) {
        self.source = tree
            .value_at(node, "svg")
            .or_else(|| tree.value(node).filter(|v| !v.is_none()))
            .and_then(PropValue::to_text);

        self.path = match self.source.as_deref() {
            Some(data) => BezPath::from_svg(data).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %tree.path(node), "invalid SVG path data");
                BezPath::new()
            }),
            None => BezPath::new(),
        };
    }
}

/// Content of a text element.
#[derive(Debug, Clone, Default)]
pub struct TextState {
    pub(crate) content: String,
}

impl TextState {
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Source and decoded bytes of an image element.
#[derive(Debug, Clone, Default)]
pub struct ImageState {
    pub(crate) source: Option<String>,
    pub(crate) size: Option<Size>,
    pub(crate) image: Option<LoadedImage>,
}

impl ImageState {
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    /// Destination rectangle: the explicit `size`, else the decoded size.
    pub fn dest_rect(&self) -> Option<Rect> {
        let size = self.size.or_else(|| {
            self.image
                .as_ref()
                .map(|img| Size::new(f64::from(img.width), f64::from(img.height)))
        })?;
        Some(Rect::from_origin_size(Point::ORIGIN, size))
    }
}

fn read_size(tree: &PropertyTree, node: NodeId) -> Option<Size> {
    let width = tree.value_at(node, "size[0]").and_then(PropValue::as_f64)?;
    let height = tree.value_at(node, "size[1]").and_then(PropValue::as_f64)?;
    Some(Size::new(width, height))
}

/// Refresh the dirty aspects of a leaf element and draw it.
pub(super) fn paint_leaf(
    element: &mut CanvasElement,
    tree: &PropertyTree,
    images: Option<&SharedImageLoader>,
    ctx: &mut dyn PaintContext,
) {
    let node = element.property;
    let dirty = element.dirty;
    element
        .dirty
        .remove(DirtyFlags::GEOMETRY | DirtyFlags::IMAGE);

    match &mut element.kind {
        ElementKind::Path(state) => {
            if dirty.contains(DirtyFlags::GEOMETRY) {
                state.refresh(tree, node);
            }
            if !state.path.elements().is_empty() {
                ctx.draw_path(&state.path, &element.style);
            }
        }
        ElementKind::Text(state) => {
            if dirty.contains(DirtyFlags::GEOMETRY) {
                state.content = tree
                    .value_at(node, "text")
                    .and_then(PropValue::to_text)
                    .unwrap_or_default();
            }
            if !state.content.is_empty() {
                ctx.draw_text(Point::ORIGIN, &state.content, &element.style);
            }
        }
        ElementKind::Image(state) => {
            if dirty.contains(DirtyFlags::GEOMETRY) {
                state.size = read_size(tree, node);
            }
            if dirty.contains(DirtyFlags::IMAGE) {
                state.source = tree
                    .value_at(node, "src")
                    .or_else(|| tree.value_at(node, "file"))
                    .and_then(PropValue::to_text);
                state.image = None;
            }
            if state.image.is_none()
                && let (Some(source), Some(loader)) = (&state.source, images)
            {
                state.image = lock_loader(loader).get_image(source);
            }
            if let (Some(image), Some(rect)) = (&state.image, state.dest_rect()) {
                ctx.draw_image(rect, image);
            }
        }
        ElementKind::Group(_) | ElementKind::Map(_) => {}
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn path_prefers_svg_child() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let path = tree.resolve_path(root, "path", &mut ()).unwrap();
        tree.set_value(path, "M0 0 L1 1".into(), &mut ()).unwrap();

        let mut state = PathState::default();
        state.refresh(&tree, path);
        assert_eq!(state.source(), Some("M0 0 L1 1"));
        assert_eq!(state.path().elements().len(), 2);

        let svg = tree.resolve_path(path, "svg", &mut ()).unwrap();
        tree.set_value(svg, "M0 0 L5 5 L9 0 Z".into(), &mut ()).unwrap();
        state.refresh(&tree, path);
        assert_eq!(state.source(), Some("M0 0 L5 5 L9 0 Z"));
        assert_eq!(state.path().elements().len(), 4);
    }

    #[test]
    fn invalid_path_data_gives_empty_geometry() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let path = tree.resolve_path(root, "path", &mut ()).unwrap();
        tree.set_value(path, "not svg".into(), &mut ()).unwrap();
        let mut state = PathState::default();
        state.refresh(&tree, path);
        assert!(state.path().elements().is_empty());
    }

    #[test]
    fn image_rect_prefers_explicit_size() {
        let mut state = ImageState {
            image: Some(LoadedImage {
                path: "a.png".into(),
                bytes: bytes::Bytes::new(),
                width: 16,
                height: 8,
            }),
            ..ImageState::default()
        };
        assert_eq!(state.dest_rect(), Some(Rect::new(0.0, 0.0, 16.0, 8.0)));
        state.size = Some(Size::new(32.0, 32.0));
        assert_eq!(state.dest_rect(), Some(Rect::new(0.0, 0.0, 32.0, 32.0)));
    }
}
