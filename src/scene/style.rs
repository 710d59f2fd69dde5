//! Inherited presentation attributes.

use crate::tree::{NodeId, PropValue, PropertyTree};

/// Child tags that carry style.
pub const STYLE_TAGS: &[&str] = &[
    "fill",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "fill-opacity",
    "font",
    "character-size",
    "alignment",
    "color",
    "opacity",
];

pub fn is_style_tag(tag: &str) -> bool {
    STYLE_TAGS.contains(&tag)
}

/// Resolved style of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,
    pub stroke_opacity: f64,
    pub fill_opacity: f64,
    pub font: Option<String>,
    pub character_size: f64,
    pub alignment: Option<String>,
    pub color: Option<String>,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            fill_opacity: 1.0,
            font: None,
            character_size: 10.0,
            alignment: None,
            color: None,
            opacity: 1.0,
        }
    }
}

impl Style {
    /// Resolve the style of an element.
    ///
    /// `chain` is the element's property node followed by the property nodes of its
    /// ancestor elements, innermost first. Each tag takes the first value found.
    pub fn resolve(tree: &PropertyTree, chain: &[NodeId]) -> Self {
        let lookup = |tag: &str| -> Option<&PropValue> {
            chain.iter().find_map(|node| tree.value_at(*node, tag))
        };
        let text = |tag: &str| lookup(tag).and_then(PropValue::to_text);
        let number = |tag: &str, default: f64| lookup(tag).and_then(PropValue::as_f64).unwrap_or(default);

        let defaults = Self::default();
        Self {
            fill: text("fill"),
            stroke: text("stroke"),
            stroke_width: number("stroke-width", defaults.stroke_width),
            stroke_opacity: number("stroke-opacity", defaults.stroke_opacity),
            fill_opacity: number("fill-opacity", defaults.fill_opacity),
            font: text("font"),
            character_size: number("character-size", defaults.character_size),
            alignment: text("alignment"),
            color: text("color"),
            opacity: number("opacity", defaults.opacity),
        }
    }

    /// Colour used for text glyphs: `fill`, then `color`.
    pub fn text_color(&self) -> Option<&str> {
        self.fill.as_deref().or(self.color.as_deref())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn inner_values_override_inherited_ones() {
        let mut tree = PropertyTree::new();
        let root = tree.root();
        let group = tree.resolve_path(root, "group", &mut ()).unwrap();
        let path = tree.resolve_path(group, "path", &mut ()).unwrap();
        let gfill = tree.resolve_path(group, "fill", &mut ()).unwrap();
        let gwidth = tree.resolve_path(group, "stroke-width", &mut ()).unwrap();
        let pfill = tree.resolve_path(path, "fill", &mut ()).unwrap();
        tree.set_value(gfill, "#ff0000".into(), &mut ()).unwrap();
        tree.set_value(gwidth, PropValue::Number(3.0), &mut ()).unwrap();
        tree.set_value(pfill, "#00ff00".into(), &mut ()).unwrap();

        let style = Style::resolve(&tree, &[path, group]);
        assert_eq!(style.fill.as_deref(), Some("#00ff00"));
        assert_eq!(style.stroke_width, 3.0);
        assert_eq!(style.opacity, 1.0);
        assert!(style.stroke.is_none());
    }

    #[test]
    fn text_color_prefers_fill() {
        let style = Style {
            color: Some("#111".into()),
            ..Style::default()
        };
        assert_eq!(style.text_color(), Some("#111"));
        let style = Style {
            fill: Some("#222".into()),
            ..style
        };
        assert_eq!(style.text_color(), Some("#222"));
    }

    #[test]
    fn style_tags() {
        assert!(is_style_tag("stroke-width"));
        assert!(!is_style_tag("clip"));
    }
}
