//! Scoped drawing context used by the paint pass.
//!
//! The scene never talks to a concrete backend. It pushes and pops state with
//! [`PaintContext::save`]/[`PaintContext::restore`], applies element transforms and
//! issues primitive draw calls. [`CommandRecorder`] keeps the calls as a list, which
//! is what tests and the SVG writer both build on.

use kurbo::{Affine, BezPath, Point, Rect};

use super::style::Style;
use crate::canvas::images::LoadedImage;

/// Drawing backend for one paint pass.
pub trait PaintContext {
    /// Push the current transform.
    fn save(&mut self);

    /// Pop back to the last saved transform.
    fn restore(&mut self);

    /// Pre-multiply the current transform.
    fn transform(&mut self, affine: Affine);

    /// Mark a clip rectangle. Only drawn as an indicator; children are not clipped.
    fn draw_clip_region(&mut self, rect: Rect);

    fn draw_path(&mut self, path: &BezPath, style: &Style);

    fn draw_text(&mut self, origin: Point, text: &str, style: &Style);

    fn draw_image(&mut self, rect: Rect, image: &LoadedImage);
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Transform(Affine),
    ClipRegion(Rect),
    Path { path: BezPath, style: Style },
    Text { origin: Point, text: String, style: Style },
    Image { rect: Rect, source: String },
}

/// Paint context that only records what it was asked to draw.
#[derive(Debug, Default, Clone)]
pub struct CommandRecorder {
    pub commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands, excluding save/restore/transform bookkeeping.
    pub fn primitives(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands.iter().filter(|c| {
            !matches!(
                c,
                DrawCommand::Save | DrawCommand::Restore | DrawCommand::Transform(_)
            )
        })
    }

    /// Text of every text primitive, in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PaintContext for CommandRecorder {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn transform(&mut self, affine: Affine) {
        self.commands.push(DrawCommand::Transform(affine));
    }

    fn draw_clip_region(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::ClipRegion(rect));
    }

    fn draw_path(&mut self, path: &BezPath, style: &Style) {
        self.commands.push(DrawCommand::Path {
            path: path.clone(),
            style: style.clone(),
        });
    }

    fn draw_text(&mut self, origin: Point, text: &str, style: &Style) {
        self.commands.push(DrawCommand::Text {
            origin,
            text: text.to_owned(),
            style: style.clone(),
        });
    }

    fn draw_image(&mut self, rect: Rect, image: &LoadedImage) {
        self.commands.push(DrawCommand::Image {
            rect,
            source: image.path.clone(),
        });
    }
}
