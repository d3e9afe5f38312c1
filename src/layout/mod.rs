//! Certificate page composition.
//!
//! [`compose`] turns a request and its styling into a flat list of
//! positioned draw operations on a US Letter landscape page. Coordinates are
//! PDF points with the origin at the bottom-left corner; every element sits
//! at a fixed offset from the nearest page edge so that optional pieces
//! (border, separator, logo, signature, authority) never move anything else.

use crate::certificate::{CertificateRequest, FontChoice, ImageAsset, Rgb, StyleParameters};
use crate::error::CertError;

/// US Letter, landscape.
pub const PAGE_WIDTH: f64 = 792.0;
pub const PAGE_HEIGHT: f64 = 612.0;

pub const TITLE: &str = "Certificate of Completion";
pub const SUBTITLE: &str = "has successfully completed the course";

const MARGIN_X: f64 = 60.0;
const BORDER_INSET: f64 = 20.0;
const BORDER_WIDTH: f64 = 3.0;
const SEPARATOR_WIDTH: f64 = 1.0;
const RULE_COLOR: Rgb = Rgb::new(0x33, 0x33, 0x33);

// Baselines measured down from the top edge.
const TITLE_FROM_TOP: f64 = 80.0;
const SEPARATOR_FROM_TOP: f64 = 95.0;
const NAME_FROM_TOP: f64 = 140.0;
const SUBTITLE_FROM_TOP: f64 = 175.0;
const COURSE_FROM_TOP: f64 = 210.0;
const SUMMARY_FROM_TOP: f64 = 245.0;
const POSITION_FROM_TOP: f64 = 275.0;
const LOGO_BOTTOM_FROM_TOP: f64 = 100.0;

// Measured up from the bottom edge.
const FOOTER_BASELINE: f64 = 40.0;
const SIGNATURE_BOTTOM: f64 = 30.0;
const REGISTERED_SIGNATURE_BOTTOM: f64 = 55.0;

const SUBTITLE_SIZE: u8 = 14;
const POSITION_SIZE: u8 = 12;
const FOOTER_SIZE: u8 = 10;

const LOGO_WIDTH: f64 = 80.0;
const SIGNATURE_WIDTH: f64 = 100.0;
const SIGNATURE_RIGHT_OFFSET: f64 = 140.0;

/// Which footer the page carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutVariant {
    /// Centered date, no identifier.
    Classic,
    /// Left date, centered identifier caption, right-hand authority line.
    Registered { identifier: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Horizontal anchoring of a text run relative to its `x` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Logo,
    Signature,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillPage {
        color: Rgb,
    },
    StrokeRect {
        origin: Point,
        width: f64,
        height: f64,
        line_width: f64,
        color: Rgb,
    },
    Line {
        from: Point,
        to: Point,
        line_width: f64,
        color: Rgb,
    },
    Text {
        text: String,
        anchor: Anchor,
        /// `x` is interpreted according to `anchor`; `y` is the baseline.
        at: Point,
        weight: FontWeight,
        size: u8,
        color: Rgb,
    },
    Image {
        slot: ImageSlot,
        /// Bottom-left corner.
        origin: Point,
        width: f64,
        height: f64,
    },
}

/// A fully positioned certificate page.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub font: FontChoice,
    pub background: Rgb,
    pub ops: Vec<DrawOp>,
}

#[cfg(test)]
impl Layout {
    /// The first text operation whose content equals `text`.
    pub fn text(&self, text: &str) -> Option<&DrawOp> {
        self.ops
            .iter()
            .find(|op| matches!(op, DrawOp::Text { text: t, .. } if t == text))
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&DrawOp> {
        self.ops
            .iter()
            .find(|op| matches!(op, DrawOp::Image { slot: s, .. } if *s == slot))
    }

    /// All operations except images.
    pub fn without_images(&self) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, DrawOp::Image { .. }))
            .collect()
    }
}

/// Formats an issue date the way it is printed on the page, e.g. `15 March 2024`.
pub fn display_date(date: chrono::NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

/// Lays out one certificate page.
///
/// Colors and font sizes are checked before anything is placed, so an
/// invalid style yields an error and no partial layout.
pub fn compose(
    request: &CertificateRequest,
    style: &StyleParameters,
    variant: &LayoutVariant,
) -> Result<Layout, CertError> {
    let ink = Rgb::from_hex(&style.font_color)?;
    let background = Rgb::from_hex(&style.background_color)?;
    style.sizes.validate()?;

    let center_x = PAGE_WIDTH / 2.0;
    let from_top = |offset: f64| PAGE_HEIGHT - offset;
    let text = |text: String, anchor: Anchor, at: Point, weight: FontWeight, size: u8| DrawOp::Text {
        text,
        anchor,
        at,
        weight,
        size,
        color: ink,
    };
    let centered = |s: String, offset: f64, weight: FontWeight, size: u8| {
        text(s, Anchor::Center, Point::new(center_x, from_top(offset)), weight, size)
    };

    let mut ops = vec![DrawOp::FillPage { color: background }];

    if style.border {
        ops.push(DrawOp::StrokeRect {
            origin: Point::new(BORDER_INSET, BORDER_INSET),
            width: PAGE_WIDTH - 2.0 * BORDER_INSET,
            height: PAGE_HEIGHT - 2.0 * BORDER_INSET,
            line_width: BORDER_WIDTH,
            color: RULE_COLOR,
        });
    }

    ops.push(centered(
        TITLE.to_string(),
        TITLE_FROM_TOP,
        FontWeight::Bold,
        style.sizes.title,
    ));

    if style.separator {
        ops.push(DrawOp::Line {
            from: Point::new(MARGIN_X, from_top(SEPARATOR_FROM_TOP)),
            to: Point::new(PAGE_WIDTH - MARGIN_X, from_top(SEPARATOR_FROM_TOP)),
            line_width: SEPARATOR_WIDTH,
            color: RULE_COLOR,
        });
    }

    ops.push(centered(
        request.recipient.clone(),
        NAME_FROM_TOP,
        FontWeight::Bold,
        style.sizes.name,
    ));
    ops.push(centered(
        SUBTITLE.to_string(),
        SUBTITLE_FROM_TOP,
        FontWeight::Regular,
        SUBTITLE_SIZE,
    ));
    ops.push(centered(
        request.course.clone(),
        COURSE_FROM_TOP,
        FontWeight::Bold,
        style.sizes.course,
    ));
    ops.push(centered(
        request.summary.clone(),
        SUMMARY_FROM_TOP,
        FontWeight::Regular,
        style.sizes.summary,
    ));
    ops.push(centered(
        format!("Position: {}", request.position),
        POSITION_FROM_TOP,
        FontWeight::Italic,
        POSITION_SIZE,
    ));

    let date_line = format!("Date: {}", display_date(request.issued_on));
    let signature_bottom = match variant {
        LayoutVariant::Classic => {
            ops.push(text(
                date_line,
                Anchor::Center,
                Point::new(center_x, FOOTER_BASELINE),
                FontWeight::Regular,
                FOOTER_SIZE,
            ));
            SIGNATURE_BOTTOM
        }
        LayoutVariant::Registered { identifier } => {
            ops.push(text(
                date_line,
                Anchor::Left,
                Point::new(MARGIN_X, FOOTER_BASELINE),
                FontWeight::Regular,
                FOOTER_SIZE,
            ));
            ops.push(text(
                format!("Certificate ID: {}", identifier),
                Anchor::Center,
                Point::new(center_x, FOOTER_BASELINE),
                FontWeight::Regular,
                FOOTER_SIZE,
            ));
            if let Some(authority) = request.authority.as_deref().map(str::trim) {
                if !authority.is_empty() {
                    ops.push(text(
                        format!("Authorized by: {}", authority),
                        Anchor::Right,
                        Point::new(PAGE_WIDTH - MARGIN_X, FOOTER_BASELINE),
                        FontWeight::Regular,
                        FOOTER_SIZE,
                    ));
                }
            }
            REGISTERED_SIGNATURE_BOTTOM
        }
    };

    if let Some(logo) = &request.logo {
        ops.push(place_image(
            ImageSlot::Logo,
            logo,
            Point::new(MARGIN_X, from_top(LOGO_BOTTOM_FROM_TOP)),
            LOGO_WIDTH,
        ));
    }
    if let Some(signature) = &request.signature {
        ops.push(place_image(
            ImageSlot::Signature,
            signature,
            Point::new(PAGE_WIDTH - SIGNATURE_RIGHT_OFFSET, signature_bottom),
            SIGNATURE_WIDTH,
        ));
    }

    Ok(Layout {
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        font: style.font,
        background,
        ops,
    })
}

/// Fixed width, height from the image's own proportions.
fn place_image(slot: ImageSlot, asset: &ImageAsset, origin: Point, width: f64) -> DrawOp {
    DrawOp::Image {
        slot,
        origin,
        width,
        height: width * asset.aspect_ratio(),
    }
}
