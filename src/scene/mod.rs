//! Canvas element tree.
//!
//! A [`CanvasScene`] projects a [`PropertyTree`] onto renderable elements. It is a
//! [`TreeObserver`]: pass it to the session while applying updates and it creates,
//! drops and invalidates elements as the tree changes. Only children tagged
//! `group`, `path`, `text`, `image` or `map` become elements; other tags are bound
//! as attributes of the element that owns them.
//!
//! Invalidation is pull-based. Changes only set [`DirtyFlags`] and raise a single
//! paint request; the work happens in [`CanvasScene::paint`].

pub mod element;
pub mod group;
pub mod paint;
pub mod shapes;
pub mod style;

use std::collections::HashMap;

pub use element::{CanvasElement, DirtyFlags, ElementKind, ElementTag, compose_transform};
pub use group::{GroupState, MapProjection, MapState};
pub use paint::{CommandRecorder, DrawCommand, PaintContext};
pub use shapes::{ImageState, PathState, TextState};
pub use style::Style;

use crate::canvas::images::SharedImageLoader;
use crate::tree::{NodeId, PropValue, PropertyTree, TreeObserver};

/// Canvas edge length used when the root has no `size` entry.
pub const DEFAULT_CANVAS_SIZE: f64 = 256.0;

/// Structural notifications for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEvent {
    /// An element was appended to `group` at `index`.
    ChildAdded { group: NodeId, index: usize },
    /// The element at `index` of `group` was destroyed.
    ChildRemoved { group: NodeId, index: usize },
    CanvasResized { width: f64, height: f64 },
    /// The bound tree went away; the scene is empty until rebuilt.
    Destroyed,
}

/// What a bound attribute node controls on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aspect {
    Clip,
    CachedSymbol,
    ZIndex,
    Visible,
    Transform,
    Style,
    Geometry,
    ImageSource,
    Projection,
    CanvasSize,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    owner: NodeId,
    aspect: Aspect,
}

/// Attribute tags every element understands.
fn generic_aspect(tag: &str) -> Option<Aspect> {
    match tag {
        "z-index" => Some(Aspect::ZIndex),
        "visible" => Some(Aspect::Visible),
        "tf" => Some(Aspect::Transform),
        _ if style::is_style_tag(tag) => Some(Aspect::Style),
        _ => None,
    }
}

/// Element tree bound to one property tree.
#[derive(Debug, Default)]
pub struct CanvasScene {
    root: Option<NodeId>,
    elements: HashMap<NodeId, CanvasElement>,
    bindings: HashMap<NodeId, Binding>,
    images: Option<SharedImageLoader>,
    events: Vec<SceneEvent>,
    paint_requested: bool,
    canvas_size: (f64, f64),
}

impl CanvasScene {
    pub fn new(images: Option<SharedImageLoader>) -> Self {
        Self {
            images,
            canvas_size: (DEFAULT_CANVAS_SIZE, DEFAULT_CANVAS_SIZE),
            ..Self::default()
        }
    }

    /// Rebuild every element from the current contents of `tree`.
    pub fn rebuild(&mut self, tree: &PropertyTree) {
        self.elements.clear();
        self.bindings.clear();

        let root = tree.root();
        self.root = Some(root);
        self.elements
            .insert(root, CanvasElement::new(root, None, ElementTag::Group));
        tree.recursive_notify_restored(root, self);
        self.update_canvas_size(tree, None);
        tracing::debug!(elements = self.elements.len(), "scene rebuilt");
        self.request_paint();
    }

    /// Property node of the root group, if a tree is bound.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn element(&self, id: NodeId) -> Option<&CanvasElement> {
        self.elements.get(&id)
    }

    /// Number of elements, root included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Child elements of `group`, in paint order.
    pub fn children(&self, group: NodeId) -> &[NodeId] {
        self.elements
            .get(&group)
            .and_then(|e| e.kind.group())
            .map_or(&[], GroupState::children)
    }

    pub fn child_at(&self, group: NodeId, index: usize) -> Option<NodeId> {
        self.children(group).get(index).copied()
    }

    /// Position of `child` in `group`'s child list.
    pub fn index_of_child(&self, group: NodeId, child: NodeId) -> Option<usize> {
        self.children(group).iter().position(|c| *c == child)
    }

    /// Source canvas size from the root `size[0]`/`size[1]`.
    pub fn canvas_size(&self) -> (f64, f64) {
        self.canvas_size
    }

    /// Drain pending structural notifications.
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn paint_requested(&self) -> bool {
        self.paint_requested
    }

    /// Return and clear the pending paint request.
    pub fn take_paint_request(&mut self) -> bool {
        std::mem::take(&mut self.paint_requested)
    }

    /// Ask for a paint. Requests made before the next paint collapse into one.
    pub fn request_paint(&mut self) {
        self.paint_requested = true;
    }

    /// Mark `id` and every element below it for style recomputation.
    pub fn mark_style_dirty(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(element) = self.elements.get_mut(&node) {
                element.dirty |= DirtyFlags::STYLE;
                if let Some(group) = element.kind.group() {
                    stack.extend(group.children.iter().copied());
                }
            }
        }
    }

    /// An image finished loading; refresh every element showing it.
    pub fn image_loaded(&mut self, path: &str) {
        let mut hit = false;
        for element in self.elements.values_mut() {
            if let ElementKind::Image(state) = &element.kind
                && state.source.as_deref() == Some(path)
            {
                element.dirty |= DirtyFlags::IMAGE;
                hit = true;
            }
        }
        if hit {
            self.request_paint();
        }
    }

    /// Paint the whole scene and clear the paint request.
    pub fn paint(&mut self, tree: &PropertyTree, ctx: &mut dyn PaintContext) {
        self.paint_requested = false;
        if let Some(root) = self.root {
            self.paint_element(tree, root, ctx);
        }
    }

    fn paint_element(&mut self, tree: &PropertyTree, id: NodeId, ctx: &mut dyn PaintContext) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if !element.visible {
            return;
        }
        let dirty = element.dirty;

        if dirty.contains(DirtyFlags::STYLE) {
            let style = Style::resolve(tree, &self.element_chain(id));
            if let Some(element) = self.elements.get_mut(&id) {
                element.style = style;
                element.dirty.remove(DirtyFlags::STYLE);
            }
        }
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        if dirty.contains(DirtyFlags::TRANSFORM) {
            element.transform = compose_transform(tree, id);
            element.dirty.remove(DirtyFlags::TRANSFORM);
        }

        ctx.save();
        if element.transform != kurbo::Affine::IDENTITY {
            ctx.transform(element.transform);
        }
        match element.tag() {
            ElementTag::Group | ElementTag::Map => self.paint_group(tree, id, ctx),
            _ => shapes::paint_leaf(element, tree, self.images.as_ref(), ctx),
        }
        ctx.restore();
    }

    /// `id` followed by the property nodes of its ancestor elements.
    fn element_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.elements.get(&node).and_then(|e| e.parent);
        }
        chain
    }

    fn bind(&mut self, tree: &PropertyTree, node: NodeId, owner: NodeId, aspect: Aspect) {
        let binding = Binding { owner, aspect };
        self.bindings.insert(node, binding);
        self.apply_binding(tree, node, binding, false);
    }

    fn mark(&mut self, id: NodeId, flags: DirtyFlags) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.dirty |= flags;
        }
    }

    /// Push the value of an attribute node into its owner. `removed` means the
    /// attribute node is about to be destroyed and must read as absent.
    fn apply_binding(&mut self, tree: &PropertyTree, node: NodeId, binding: Binding, removed: bool) {
        let value = if removed {
            None
        } else {
            tree.value(node).filter(|v| !v.is_none())
        };
        let owner = binding.owner;

        match binding.aspect {
            Aspect::ZIndex => {
                let z = value
                    .and_then(PropValue::as_f64)
                    .map_or(0, |z| z.round() as i32);
                let parent = self.elements.get_mut(&owner).and_then(|e| {
                    e.z_index = z;
                    e.parent
                });
                if let Some(parent) = parent {
                    self.mark(parent, DirtyFlags::Z_ORDER);
                }
            }
            Aspect::Visible => {
                if let Some(element) = self.elements.get_mut(&owner) {
                    element.visible = value.and_then(PropValue::as_bool).unwrap_or(true);
                }
            }
            Aspect::Style => self.mark_style_dirty(owner),
            Aspect::Clip => self.mark(owner, DirtyFlags::CLIP),
            Aspect::CachedSymbol => self.mark(owner, DirtyFlags::CACHED_SYMBOL),
            Aspect::Transform => self.mark(owner, DirtyFlags::TRANSFORM),
            Aspect::Geometry | Aspect::Projection => self.mark(owner, DirtyFlags::GEOMETRY),
            Aspect::ImageSource => self.mark(owner, DirtyFlags::IMAGE),
            Aspect::CanvasSize => self.update_canvas_size(tree, removed.then_some(node)),
        }
        self.request_paint();
    }

    fn update_canvas_size(&mut self, tree: &PropertyTree, skip: Option<NodeId>) {
        let Some(root) = self.root else {
            return;
        };
        let read = |index: u32| {
            tree.child(root, "size", index)
                .filter(|n| Some(*n) != skip)
                .and_then(|n| tree.value(n))
                .and_then(PropValue::as_f64)
                .filter(|v| *v > 0.0)
                .unwrap_or(DEFAULT_CANVAS_SIZE)
        };
        let size = (read(0), read(1));
        if size != self.canvas_size {
            self.canvas_size = size;
            tracing::debug!(width = size.0, height = size.1, "canvas resized");
            self.events.push(SceneEvent::CanvasResized {
                width: size.0,
                height: size.1,
            });
        }
    }
}

impl TreeObserver for CanvasScene {
    fn child_added(&mut self, tree: &PropertyTree, parent: NodeId, child: NodeId) {
        if self.root.is_none() {
            return;
        }
        let Some(tag) = tree.name(child) else {
            return;
        };

        if let Some(binding) = self.bindings.get(&parent).copied() {
            // Nested attribute nodes such as tf[n]/m[i].
            if binding.aspect == Aspect::Transform {
                self.bindings.insert(child, binding);
            }
            return;
        }
        let Some(owner) = self.elements.get(&parent) else {
            return;
        };
        let owner_tag = owner.tag();

        if let Some(aspect) = generic_aspect(tag) {
            return self.bind(tree, child, parent, aspect);
        }

        let aspect = match (owner_tag, tag) {
            (ElementTag::Group, _) => {
                return self.group_child_added(tree, parent, child, tag, false);
            }
            (ElementTag::Map, _) => {
                return self.group_child_added(tree, parent, child, tag, true);
            }
            (ElementTag::Path, "svg") => Aspect::Geometry,
            (ElementTag::Text, "text") => Aspect::Geometry,
            (ElementTag::Image, "src" | "file") => Aspect::ImageSource,
            (ElementTag::Image, "size") => Aspect::Geometry,
            _ => {
                tracing::debug!(tag, element = %owner_tag, "ignoring attribute");
                return;
            }
        };
        self.bind(tree, child, parent, aspect);
    }

    fn child_removed(&mut self, tree: &PropertyTree, parent: NodeId, child: NodeId) {
        if self.root.is_none() {
            return;
        }

        if let Some(binding) = self.bindings.remove(&child) {
            for node in tree.descendants(child) {
                self.bindings.remove(&node);
            }
            self.apply_binding(tree, child, binding, true);
            return;
        }
        if !self.elements.contains_key(&child) {
            return;
        }

        match self.index_of_child(parent, child) {
            Some(index) => {
                if let Some(group) = self
                    .elements
                    .get_mut(&parent)
                    .and_then(|g| g.kind.group_mut())
                {
                    group.children.remove(index);
                }
                self.events.push(SceneEvent::ChildRemoved {
                    group: parent,
                    index,
                });
            }
            None => {
                tracing::warn!(path = %tree.path(child), "removed element not found in its group");
            }
        }
        for node in tree.descendants(child) {
            self.elements.remove(&node);
            self.bindings.remove(&node);
        }
        self.request_paint();
    }

    fn value_changed(&mut self, tree: &PropertyTree, node: NodeId) {
        if let Some(binding) = self.bindings.get(&node).copied() {
            self.apply_binding(tree, node, binding, false);
            return;
        }
        if let Some(element) = self.elements.get_mut(&node) {
            if element.tag() == ElementTag::Path {
                element.dirty |= DirtyFlags::GEOMETRY;
            }
            self.request_paint();
        }
    }

    fn value_restored(&mut self, tree: &PropertyTree, node: NodeId) {
        if self.root.is_none() {
            return;
        }
        if !self.elements.contains_key(&node)
            && !self.bindings.contains_key(&node)
            && let Some(parent) = tree.parent(node)
        {
            self.child_added(tree, parent, node);
        }
        self.value_changed(tree, node);
    }

    fn tree_reset(&mut self) {
        if self.root.take().is_some() {
            self.events.push(SceneEvent::Destroyed);
        }
        self.elements.clear();
        self.bindings.clear();
        self.request_paint();
    }
}
