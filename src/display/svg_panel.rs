use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Tree, fontdb};

use super::{CHAR_WIDTH, Display, HEIGHT, LINE_HEIGHT, Pen, WIDTH};
use crate::errors::{ClientResult, render_error};

/// A [`Display`] without LED hardware: draw calls are collected as SVG elements
/// and every `update()` rasterizes the frame into a PNG file, each panel pixel
/// magnified `scale` times.
pub struct SvgPanel {
    pen: Pen,
    elements: Vec<Element>,
    scale: u32,
    out: PathBuf,
    usvg_options: usvg::Options<'static>,
}

impl SvgPanel {
    pub fn new(out: &Path, scale: u32) -> Self {
        let mut fontdb = fontdb::Database::new();
        fontdb.load_system_fonts();
        let mut usvg_options = usvg::Options::default();
        usvg_options.fontdb = Arc::new(fontdb);

        SvgPanel {
            pen: Pen::new(0, 0, 0),
            elements: vec![Element::Rect(Rect::full(), Pen::new(0, 0, 0))],
            scale: scale.max(1),
            out: out.to_path_buf(),
            usvg_options,
        }
    }

    pub fn to_svg(&self) -> String {
        format!(
            r#"<svg width='{w}' height='{h}' viewBox='0 0 {w} {h}' xmlns='http://www.w3.org/2000/svg' shape-rendering='crispEdges'>
{elements}
</svg>"#,
            w = WIDTH,
            h = HEIGHT,
            elements = self.elements.iter().map(Element::to_svg).collect::<Vec<_>>().join("\n")
        )
    }

    /// Number of SVG elements in the current frame.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn to_png(&self) -> ClientResult<Vec<u8>> {
        let tree = Tree::from_str(&self.to_svg(), &self.usvg_options).map_err(render_error)?;

        let width = WIDTH as u32 * self.scale;
        let height = HEIGHT as u32 * self.scale;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| render_error("empty pixmap"))?;
        let transform = tiny_skia::Transform::from_scale(self.scale as f32, self.scale as f32);
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        pixmap.encode_png().map_err(render_error)
    }
}

impl Display for SvgPanel {
    fn set_pen(&mut self, pen: Pen) {
        self.pen = pen;
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.elements.push(Element::Rect(Rect::full(), self.pen));
    }

    fn text(&mut self, text: &str, x: i32, y: i32, wrap: i32, scale: i32) {
        let scale = scale.max(1);
        for (i, line) in wrap_words(text, x, wrap, CHAR_WIDTH * scale).iter().enumerate() {
            let baseline = y + (i as i32 + 1) * LINE_HEIGHT * scale - scale;
            self.elements.push(Element::Text(format!(
                "<text x='{x}' y='{baseline}' font-family='monospace' font-size='{size}' textLength='{len}' fill='{fill}'>{text}</text>",
                size = LINE_HEIGHT * scale,
                len = line.chars().count() as i32 * CHAR_WIDTH * scale,
                fill = hex(self.pen),
                text = escape(line),
            )));
        }
    }

    fn rectangle(&mut self, x: i32, y: i32, w: i32, h: i32) {
        // rects are opaque, whatever they cover completely can go
        let rect = Rect { x, y, w, h };
        self.elements
            .retain(|e| !matches!(e, Element::Rect(below, _) if rect.covers(below)));
        self.elements.push(Element::Rect(rect, self.pen));
    }

    fn update(&mut self) -> ClientResult<()> {
        let png = self.to_png()?;
        std::fs::write(&self.out, png)?;
        debug!("panel frame written to {:?}", self.out);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Rect {
    fn full() -> Self {
        Rect { x: 0, y: 0, w: WIDTH, h: HEIGHT }
    }

    fn covers(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.x + self.w >= other.x + other.w
            && self.y + self.h >= other.y + other.h
    }
}

enum Element {
    Rect(Rect, Pen),
    Text(String),
}

impl Element {
    fn to_svg(&self) -> String {
        match self {
            Element::Rect(Rect { x, y, w, h }, pen) => {
                format!("<rect x='{x}' y='{y}' width='{w}' height='{h}' fill='{}' />", hex(*pen))
            }
            Element::Text(text) => text.clone(),
        }
    }
}

fn hex(pen: Pen) -> String {
    format!("#{:02x}{:02x}{:02x}", pen.r, pen.g, pen.b)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Break `text` into lines at word boundaries so that no line runs past `wrap`
/// pixels (measured from the panel's left edge). Single words longer than that
/// stay on their own line and get clipped.
fn wrap_words(text: &str, x: i32, wrap: i32, char_width: i32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split(' ') {
        let candidate_len = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };

        if !line.is_empty() && x + candidate_len as i32 * char_width > wrap {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    lines.push(line);
    lines
}
