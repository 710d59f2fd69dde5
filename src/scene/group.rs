//! Groups and maps: child dispatch by tag and the group paint pass.

use kurbo::Rect;

use super::element::{CanvasElement, DirtyFlags, ElementKind, ElementTag};
use super::paint::PaintContext;
use super::{Aspect, CanvasScene, SceneEvent};
use crate::tree::{NodeId, PropValue, PropertyTree};

/// Tags accepted silently on the canvas root.
const ROOT_METADATA_TAGS: &[&str] = &["view", "name", "mipmapping", "placement"];

/// Map projection tags.
const MAP_TAGS: &[&str] = &["ref-lat", "ref-lon", "range", "screen-range"];

fn is_root_metadata(tag: &str) -> bool {
    ROOT_METADATA_TAGS.contains(&tag) || tag.starts_with("status")
}

/// Ordered children plus group-only attributes.
#[derive(Debug, Clone, Default)]
pub struct GroupState {
    pub(crate) children: Vec<NodeId>,
    pub(crate) clip: Option<Rect>,
    pub(crate) symbol_type: Option<String>,
}

impl GroupState {
    /// Property nodes of the child elements, in paint order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Active clip rectangle.
    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub fn symbol_type(&self) -> Option<&str> {
        self.symbol_type.as_deref()
    }
}

/// Projection parameters of a map element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapProjection {
    pub ref_lat: f64,
    pub ref_lon: f64,
    /// Range in nautical miles covered by `screen_range`.
    pub range: f64,
    /// Range in canvas units.
    pub screen_range: f64,
}

impl MapProjection {
    fn read(tree: &PropertyTree, node: NodeId) -> Self {
        let number = |tag: &str| tree.value_at(node, tag).and_then(PropValue::as_f64);
        Self {
            ref_lat: number("ref-lat").unwrap_or(0.0),
            ref_lon: number("ref-lon").unwrap_or(0.0),
            range: number("range").unwrap_or(0.0),
            screen_range: number("screen-range").unwrap_or(0.0),
        }
    }

    /// Canvas units per nautical mile, when the range is set.
    pub fn scale(&self) -> Option<f64> {
        (self.range > 0.0 && self.screen_range > 0.0).then(|| self.screen_range / self.range)
    }
}

/// A map is a group with a projection.
///
/// The projection is read and kept but not applied: children paint as in a plain group.
#[derive(Debug, Clone, Default)]
pub struct MapState {
    pub(crate) group: GroupState,
    pub(crate) projection: MapProjection,
}

impl MapState {
    pub fn group(&self) -> &GroupState {
        &self.group
    }

    pub fn projection(&self) -> MapProjection {
        self.projection
    }
}

/// Parse a clip string: four numbers in top, right, bottom, left order.
///
/// Accepts `rect(...)` wrapping and `px` suffixes. Returns `None` for anything else.
pub fn parse_clip(text: &str) -> Option<Rect> {
    let text = text.trim();
    let inner = text
        .strip_prefix("rect(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(text);

    let values: Vec<f64> = inner
        .split(',')
        .map(|part| part.trim().trim_end_matches("px").trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [top, right, bottom, left] => Some(Rect::new(*left, *top, *right, *bottom)),
        _ => None,
    }
}

impl CanvasScene {
    /// A child property appeared under a group (or map) element.
    pub(super) fn group_child_added(
        &mut self,
        tree: &PropertyTree,
        group: NodeId,
        child: NodeId,
        tag: &str,
        is_map: bool,
    ) {
        if let Some(element_tag) = ElementTag::from_tag(tag) {
            let Some(state) = self
                .elements
                .get_mut(&group)
                .and_then(|g| g.kind.group_mut())
            else {
                return;
            };
            state.children.push(child);
            let index = state.children.len() - 1;
            self.elements
                .insert(child, CanvasElement::new(child, Some(group), element_tag));
            self.mark(group, DirtyFlags::Z_ORDER);
            tracing::debug!(tag, index, path = %tree.path(child), "element added");
            self.events.push(SceneEvent::ChildAdded { group, index });
            self.request_paint();
            return;
        }

        match tag {
            "clip" => return self.bind(tree, child, group, Aspect::Clip),
            "symbol-type" => return self.bind(tree, child, group, Aspect::CachedSymbol),
            _ => {}
        }
        if is_map && MAP_TAGS.contains(&tag) {
            return self.bind(tree, child, group, Aspect::Projection);
        }
        if self.root == Some(group) {
            if tag == "size" {
                return self.bind(tree, child, group, Aspect::CanvasSize);
            }
            if is_root_metadata(tag) {
                return;
            }
        }
        tracing::debug!(tag, group = %tree.path(group), "unknown child tag");
    }

    /// Run the dirty phases of a group and paint its children.
    pub(super) fn paint_group(
        &mut self,
        tree: &PropertyTree,
        id: NodeId,
        ctx: &mut dyn PaintContext,
    ) {
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        let dirty = element.dirty;
        element
            .dirty
            .remove(DirtyFlags::CLIP | DirtyFlags::CACHED_SYMBOL | DirtyFlags::Z_ORDER);

        if let ElementKind::Map(map) = &mut element.kind
            && dirty.contains(DirtyFlags::GEOMETRY)
        {
            map.projection = MapProjection::read(tree, id);
            element.dirty.remove(DirtyFlags::GEOMETRY);
        }

        let Some(state) = element.kind.group_mut() else {
            return;
        };

        if dirty.contains(DirtyFlags::CLIP) {
            state.clip = match tree.value_at(id, "clip").and_then(PropValue::as_str) {
                Some(text) => {
                    let clip = parse_clip(text);
                    if clip.is_none() {
                        tracing::warn!(clip = text, path = %tree.path(id), "unparseable clip");
                    }
                    clip
                }
                None => None,
            };
        }

        if dirty.contains(DirtyFlags::CACHED_SYMBOL) {
            state.symbol_type = tree
                .value_at(id, "symbol-type")
                .and_then(PropValue::to_text);
            if let Some(symbol) = &state.symbol_type {
                tracing::debug!(symbol, path = %tree.path(id), "cached symbol type changed");
            }
        }

        let mut children = std::mem::take(&mut state.children);
        let clip = state.clip;

        if dirty.contains(DirtyFlags::Z_ORDER) {
            // Stable: equal z-index keeps creation order.
            children.sort_by_key(|c| self.elements.get(c).map_or(0, CanvasElement::z_index));
        }

        if let Some(state) = self
            .elements
            .get_mut(&id)
            .and_then(|g| g.kind.group_mut())
        {
            state.children.clone_from(&children);
        }

        if let Some(rect) = clip {
            ctx.save();
            ctx.draw_clip_region(rect);
            ctx.restore();
        }

        for child in children {
            self.paint_element(tree, child, ctx);
        }
    }
}
