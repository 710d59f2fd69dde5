//! SVG rendering of a canvas scene.
//!
//! [`SvgContext`] implements [`PaintContext`] by appending SVG markup. Transforms
//! become nested `<g>` elements, images are embedded as base64 data URIs and clip
//! regions are drawn as a hatched overlay.

use kurbo::{Affine, BezPath, Point, Rect};

use super::images::LoadedImage;
use crate::scene::{PaintContext, Style};

/// Pattern used for clip-region overlays.
const CLIP_PATTERN_ID: &str = "clip-hatch";

/// Paint context producing an SVG document.
#[derive(Debug, Clone)]
pub struct SvgContext {
    width: f64,
    height: f64,
    body: String,
    open_groups: usize,
    saved: Vec<usize>,
}

impl SvgContext {
    /// Start a document for a canvas of the given source size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
            open_groups: 0,
            saved: Vec::new(),
        }
    }

    /// Close the document. Unless `frameless`, a border and `title` are drawn on top.
    pub fn finish(mut self, title: &str, frameless: bool) -> String {
        for _ in 0..self.open_groups {
            self.body.push_str("</g>");
        }
        let (w, h) = (self.width, self.height);
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" \
             viewBox=\"0 0 {w} {h}\">\
             <defs><pattern id=\"{CLIP_PATTERN_ID}\" width=\"8\" height=\"8\" \
             patternUnits=\"userSpaceOnUse\" patternTransform=\"rotate(45)\">\
             <line x1=\"0\" y1=\"0\" x2=\"0\" y2=\"8\" stroke=\"#ff00ff\" stroke-width=\"2\"/>\
             </pattern></defs>"
        );
        svg.push_str(&self.body);
        if !frameless {
            svg.push_str(&format!(
                "<rect x=\"0.5\" y=\"0.5\" width=\"{}\" height=\"{}\" fill=\"none\" \
                 stroke=\"#808080\"/><text x=\"4\" y=\"14\" font-size=\"12\" \
                 fill=\"#808080\">{}</text>",
                (w - 1.0).max(0.0),
                (h - 1.0).max(0.0),
                xml_escape(title),
            ));
        }
        svg.push_str("</svg>");
        svg
    }
}

impl PaintContext for SvgContext {
    fn save(&mut self) {
        self.saved.push(self.open_groups);
    }

    fn restore(&mut self) {
        let target = self.saved.pop().unwrap_or(0);
        while self.open_groups > target {
            self.body.push_str("</g>");
            self.open_groups -= 1;
        }
    }

    fn transform(&mut self, affine: Affine) {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        self.body
            .push_str(&format!("<g transform=\"matrix({a} {b} {c} {d} {e} {f})\">"));
        self.open_groups += 1;
    }

    fn draw_clip_region(&mut self, rect: Rect) {
        self.body.push_str(&format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"url(#{CLIP_PATTERN_ID})\" \
             fill-opacity=\"0.3\" stroke=\"#ff00ff\" stroke-dasharray=\"4 2\"/>",
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height(),
        ));
    }

    fn draw_path(&mut self, path: &BezPath, style: &Style) {
        self.body.push_str(&format!(
            "<path d=\"{}\" fill=\"{}\" fill-opacity=\"{}\" stroke=\"{}\" stroke-width=\"{}\" \
             stroke-opacity=\"{}\" opacity=\"{}\"/>",
            xml_escape(&path.to_svg()),
            xml_escape(style.fill.as_deref().unwrap_or("none")),
            style.fill_opacity,
            xml_escape(style.stroke.as_deref().unwrap_or("none")),
            style.stroke_width,
            style.stroke_opacity,
            style.opacity,
        ));
    }

    fn draw_text(&mut self, origin: Point, text: &str, style: &Style) {
        let font = style
            .font
            .as_deref()
            .map(|f| format!(" font-family=\"{}\"", xml_escape(f)))
            .unwrap_or_default();
        self.body.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\"{font} text-anchor=\"{}\" fill=\"{}\" \
             opacity=\"{}\">{}</text>",
            origin.x,
            origin.y,
            style.character_size,
            text_anchor(style.alignment.as_deref()),
            xml_escape(style.text_color().unwrap_or("#000000")),
            style.opacity,
            xml_escape(text),
        ));
    }

    fn draw_image(&mut self, rect: Rect, image: &LoadedImage) {
        use base64::Engine as _;

        let mime = image::guess_format(&image.bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");
        let b64 = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        self.body.push_str(&format!(
            "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" \
             preserveAspectRatio=\"none\" href=\"data:{mime};base64,{b64}\"/>",
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height(),
        ));
    }
}

/// SVG `text-anchor` for a canvas alignment such as `center-baseline`.
fn text_anchor(alignment: Option<&str>) -> &'static str {
    match alignment.and_then(|a| a.split('-').next()) {
        Some("center") => "middle",
        Some("right") => "end",
        _ => "start",
    }
}

/// Escape text for use in XML content and attribute values.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
