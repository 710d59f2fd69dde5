//! Canvas elements and their per-aspect dirty flags.

use bitflags::bitflags;
use kurbo::Affine;

use super::group::{GroupState, MapState};
use super::shapes::{ImageState, PathState, TextState};
use super::style::Style;
use crate::tree::{NodeId, PropValue, PropertyTree};

bitflags! {
    /// Aspects of an element that must be recomputed before the next paint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        const CLIP = 1;
        const Z_ORDER = 1 << 1;
        const CACHED_SYMBOL = 1 << 2;
        const STYLE = 1 << 3;
        const GEOMETRY = 1 << 4;
        const TRANSFORM = 1 << 5;
        const IMAGE = 1 << 6;
    }
}

/// Property tags that become elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTag {
    Group,
    Path,
    Text,
    Image,
    Map,
}

impl ElementTag {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "group" => Some(Self::Group),
            "path" => Some(Self::Path),
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "map" => Some(Self::Map),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Path => "path",
            Self::Text => "text",
            Self::Image => "image",
            Self::Map => "map",
        }
    }
}

impl std::fmt::Display for ElementTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific rendering state.
#[derive(Debug, Clone)]
pub enum ElementKind {
    Group(GroupState),
    Path(PathState),
    Text(TextState),
    Image(ImageState),
    Map(MapState),
}

impl ElementKind {
    pub fn new(tag: ElementTag) -> Self {
        match tag {
            ElementTag::Group => Self::Group(GroupState::default()),
            ElementTag::Path => Self::Path(PathState::default()),
            ElementTag::Text => Self::Text(TextState::default()),
            ElementTag::Image => Self::Image(ImageState::default()),
            ElementTag::Map => Self::Map(MapState::default()),
        }
    }

    pub fn tag(&self) -> ElementTag {
        match self {
            Self::Group(_) => ElementTag::Group,
            Self::Path(_) => ElementTag::Path,
            Self::Text(_) => ElementTag::Text,
            Self::Image(_) => ElementTag::Image,
            Self::Map(_) => ElementTag::Map,
        }
    }

    /// Child list of groups and maps.
    pub fn group(&self) -> Option<&GroupState> {
        match self {
            Self::Group(g) => Some(g),
            Self::Map(m) => Some(&m.group),
            _ => None,
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut GroupState> {
        match self {
            Self::Group(g) => Some(g),
            Self::Map(m) => Some(&mut m.group),
            _ => None,
        }
    }
}

/// A renderable node bound to one property node.
#[derive(Debug, Clone)]
pub struct CanvasElement {
    pub(crate) property: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: ElementKind,
    pub(crate) z_index: i32,
    pub(crate) visible: bool,
    pub(crate) dirty: DirtyFlags,
    pub(crate) style: Style,
    pub(crate) transform: Affine,
}

impl CanvasElement {
    /// New element with every aspect dirty.
    pub(crate) fn new(property: NodeId, parent: Option<NodeId>, tag: ElementTag) -> Self {
        Self {
            property,
            parent,
            kind: ElementKind::new(tag),
            z_index: 0,
            visible: true,
            dirty: DirtyFlags::all(),
            style: Style::default(),
            transform: Affine::IDENTITY,
        }
    }

    /// Property node this element renders.
    pub fn property(&self) -> NodeId {
        self.property
    }

    /// Property node of the owning group; `None` for the scene root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn tag(&self) -> ElementTag {
        self.kind.tag()
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn transform(&self) -> Affine {
        self.transform
    }
}

/// Compose the `tf[n]/m[0..5]` children of `node`, in index order.
///
/// Missing matrix entries fall back to the identity.
pub fn compose_transform(tree: &PropertyTree, node: NodeId) -> Affine {
    let mut transforms: Vec<NodeId> = tree.children_named(node, "tf").collect();
    transforms.sort_by_key(|tf| tree.get(*tf).map_or(0, |n| n.index()));

    transforms.into_iter().fold(Affine::IDENTITY, |acc, tf| {
        let mut m = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        for (i, slot) in m.iter_mut().enumerate() {
            if let Some(v) = tree
                .child(tf, "m", i as u32)
                .and_then(|n| tree.value(n))
                .and_then(PropValue::as_f64)
            {
                *slot = v;
            }
        }
        acc * Affine::new(m)
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn set(tree: &mut PropertyTree, from: NodeId, path: &str, v: f64) {
        let node = tree.resolve_path(from, path, &mut ()).unwrap();
        tree.set_value(node, PropValue::Number(v), &mut ()).unwrap();
    }

    #[test]
    fn tags_round_trip() {
        for tag in ["group", "path", "text", "image", "map"] {
            assert_eq!(ElementTag::from_tag(tag).unwrap().as_str(), tag);
        }
        assert!(ElementTag::from_tag("clip").is_none());
    }

    #[test]
    fn transforms_compose_in_index_order() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        // Created out of order on purpose.
        set(&mut tree, root, "tf[1]/m[4]", 5.0);
        set(&mut tree, root, "tf[0]/m[0]", 2.0);
        set(&mut tree, root, "tf[0]/m[3]", 2.0);

        let affine = compose_transform(&tree, root);
        let expected = Affine::scale(2.0) * Affine::translate((5.0, 0.0));
        assert_eq!(affine, expected);
    }

    #[test]
    fn no_transform_is_identity() {
        let tree = PropertyTree::new();
        assert_eq!(compose_transform(&tree, tree.root()), Affine::IDENTITY);
    }

    #[test]
    fn new_element_is_fully_dirty() {
        let tree = PropertyTree::new();
        let el = CanvasElement::new(tree.root(), None, ElementTag::Group);
        assert_eq!(el.dirty(), DirtyFlags::all());
        assert!(el.kind().group().is_some());
        assert!(el.is_visible());
    }
}
