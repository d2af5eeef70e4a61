//! Drawing the closest-flight summary on a 64x32 LED matrix.
//!
//! [`Display`] is the small pen-based drawing surface the panel driver offers.
//! The free functions in this module lay out what the client shows on it.

use crate::errors::ClientResult;
use crate::flight::ClosestFlightReply;

pub mod svg_panel;

pub const WIDTH: i32 = 64;
pub const HEIGHT: i32 = 32;

// the bitmap8 font cell
pub const CHAR_WIDTH: i32 = 6;
pub const LINE_HEIGHT: i32 = 8;

const COUNTDOWN_WIDTH: i32 = 15;
const COUNTDOWN_HEIGHT: i32 = 3;

const KM_TO_MI: f64 = 0.621371;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pen {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Pen { r, g, b }
    }
}

pub trait Display {
    fn set_pen(&mut self, pen: Pen);

    /// fill the whole panel with the current pen
    fn clear(&mut self);

    /// draw `text` with its top left corner at `x,y`, wrapping words at `wrap` pixels
    fn text(&mut self, text: &str, x: i32, y: i32, wrap: i32, scale: i32);

    fn rectangle(&mut self, x: i32, y: i32, w: i32, h: i32);

    /// push the frame to the panel
    fn update(&mut self) -> ClientResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub black: Pen,
    pub white: Pen,
    pub red: Pen,
    pub green: Pen,
    pub blue: Pen,
    pub cyan: Pen,
    pub magenta: Pen,
    pub yellow: Pen,
}

impl Palette {
    /// `bright` drives the LEDs at full intensity, otherwise colors are dimmed
    pub fn new(bright: bool) -> Self {
        let (hi, lo, white) = if bright { (255, 64, 255) } else { (128, 32, 200) };
        Palette {
            black: Pen::new(0, 0, 0),
            white: Pen::new(white, white, white),
            red: Pen::new(hi, lo, lo),
            green: Pen::new(lo, hi, lo),
            blue: Pen::new(lo, lo, hi),
            cyan: Pen::new(lo, hi, hi),
            magenta: Pen::new(hi, lo, hi),
            yellow: Pen::new(hi, hi, lo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DistanceUnit {
    #[default]
    Km,
    Mi,
}

impl DistanceUnit {
    pub fn from_km(self, km: f64) -> f64 {
        match self {
            DistanceUnit::Km => km,
            DistanceUnit::Mi => km * KM_TO_MI,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::Mi => "mi",
        }
    }
}

/// Round for display: whole numbers from 1 up, one decimal below 1, zero and
/// negative values unchanged.
pub fn round_value(value: f64) -> f64 {
    if value >= 1.0 {
        value.round()
    } else if value > 0.0 {
        (value * 10.0).round() / 10.0
    } else {
        value
    }
}

/// Cut the variant suffix ("Airbus A319-132" -> "Airbus A319") and abbreviate
/// long manufacturer names.
pub fn shorten_aircraft_model(model: &str) -> String {
    let model = model.split('-').next().unwrap_or(model);

    let mut words = model.split_whitespace();
    let Some(first) = words.next() else {
        return model.to_string();
    };
    let first = match first {
        "Mitsubishi" => "Mitsu",
        "Bombardier" => "Bomba",
        other => other,
    };

    std::iter::once(first).chain(words).collect::<Vec<_>>().join(" ")
}

pub fn clear_display(display: &mut impl Display, palette: &Palette) -> ClientResult<()> {
    display.set_pen(palette.black);
    display.clear();
    display.update()
}

/// Replace the panel content with a short status text, one line per entry.
pub fn show_status(display: &mut impl Display, palette: &Palette, pen: Pen, lines: &[&str]) -> ClientResult<()> {
    display.set_pen(palette.black);
    display.clear();
    display.set_pen(pen);
    for (i, line) in lines.iter().enumerate() {
        display.text(line, 2, 2 + i as i32 * 6, WIDTH, 1);
    }
    display.update()
}

pub fn render_flight(
    display: &mut impl Display,
    palette: &Palette,
    reply: &ClosestFlightReply,
    unit: DistanceUnit,
    radius_km: f64,
) -> ClientResult<()> {
    display.set_pen(palette.black);
    display.clear();

    if !reply.found {
        let radius = round_value(unit.from_km(radius_km));
        display.set_pen(palette.yellow);
        display.text(&format!("No flights in radius {}{}", radius, unit.label()), 2, 8, WIDTH, 1);
        return display.update();
    }
    let Some(flight) = &reply.flight else {
        display.set_pen(palette.yellow);
        display.text("No data returned", 2, 8, WIDTH, 1);
        return display.update();
    };

    let number = flight.number.as_deref().unwrap_or("N/A");
    let origin = flight.route.origin_iata.as_deref().unwrap_or("N/A");
    let destination = flight.route.destination_iata.as_deref().unwrap_or("N/A");
    let model = shorten_aircraft_model(flight.aircraft.model.as_deref().unwrap_or("N/A"));
    let distance = round_value(unit.from_km(reply.distance_km.unwrap_or_default()));

    display.set_pen(palette.yellow);
    display.text(&format!("{origin} > {destination}"), 2, 2, WIDTH, 1);

    display.set_pen(palette.cyan);
    display.text(number, 2, 13, WIDTH, 1);
    display.set_pen(palette.blue);
    let number_width = number.chars().count() as i32 * CHAR_WIDTH;
    display.text(&format!("{}{}", distance, unit.label()), number_width, 13, 100, 1);

    // wide wrap so the model never breaks
    display.set_pen(palette.magenta);
    display.text(&model, 2, 23, 100, 1);

    display.update()
}

/// Width of the countdown bar once `progress` (0..1) of the refresh interval has passed.
pub fn countdown_width(progress: f64) -> i32 {
    ((COUNTDOWN_WIDTH as f64 * (1.0 - progress)) as i32).max(0)
}

/// Redraw the countdown bar in the top right corner. It starts full and shrinks
/// from the left, disappearing at the end of the interval. Needs an `update()`.
pub fn draw_countdown(display: &mut impl Display, palette: &Palette, progress: f64) {
    let x = WIDTH - COUNTDOWN_WIDTH;
    let y = 2;
    let filled = countdown_width(progress);

    display.set_pen(palette.black);
    display.rectangle(x, y, COUNTDOWN_WIDTH, COUNTDOWN_HEIGHT);

    if filled > 0 {
        display.set_pen(palette.green);
        display.rectangle(x + COUNTDOWN_WIDTH - filled, y, filled, COUNTDOWN_HEIGHT);
    }
    display.set_pen(palette.black);
}
