use chrono::NaiveDate;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::CertError;

static HEX_COLOR: OnceLock<Regex> = OnceLock::new();

/// An sRGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` or `RRGGBB`, case-insensitively.
    pub fn from_hex(input: &str) -> Result<Self, CertError> {
        let re = HEX_COLOR.get_or_init(|| {
            Regex::new(r"^#?([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})([0-9A-Fa-f]{2})$").unwrap()
        });
        let caps = re
            .captures(input.trim())
            .ok_or_else(|| CertError::InvalidColor(input.to_string()))?;
        let channel = |i: usize| {
            u8::from_str_radix(&caps[i], 16).map_err(|_| CertError::InvalidColor(input.to_string()))
        };
        Ok(Self::new(channel(1)?, channel(2)?, channel(3)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// The supported font families. Each maps onto one of the PDF base-14 fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FontChoice {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontChoice {
    pub const ALL: [FontChoice; 3] = [FontChoice::Helvetica, FontChoice::Times, FontChoice::Courier];

    pub fn name(self) -> &'static str {
        match self {
            FontChoice::Helvetica => "Helvetica",
            FontChoice::Times => "Times",
            FontChoice::Courier => "Courier",
        }
    }

    /// Installed font families that can stand in for the face, in order of
    /// preference. Names are file name stems.
    pub fn metric_families(self) -> &'static [&'static str] {
        match self {
            FontChoice::Helvetica => &["LiberationSans", "DejaVuSans", "Arial"],
            FontChoice::Times => &["LiberationSerif", "DejaVuSerif", "Times New Roman"],
            FontChoice::Courier => &["LiberationMono", "DejaVuSansMono", "Courier New"],
        }
    }
}

impl fmt::Display for FontChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FontChoice {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FontChoice::ALL
            .into_iter()
            .find(|choice| choice.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CertError::UnsupportedFont(s.to_string()))
    }
}

/// Point sizes for the four user-sized text blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontSizes {
    pub title: u8,
    pub name: u8,
    pub course: u8,
    pub summary: u8,
}

impl FontSizes {
    pub const TITLE_RANGE: (u8, u8) = (24, 40);
    pub const NAME_RANGE: (u8, u8) = (18, 30);
    pub const COURSE_RANGE: (u8, u8) = (16, 28);
    pub const SUMMARY_RANGE: (u8, u8) = (12, 20);

    pub fn validate(&self) -> Result<(), CertError> {
        check_size("title", self.title, Self::TITLE_RANGE)?;
        check_size("name", self.name, Self::NAME_RANGE)?;
        check_size("course", self.course, Self::COURSE_RANGE)?;
        check_size("summary", self.summary, Self::SUMMARY_RANGE)
    }
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            title: 30,
            name: 22,
            course: 20,
            summary: 14,
        }
    }
}

fn check_size(field: &'static str, value: u8, (min, max): (u8, u8)) -> Result<(), CertError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CertError::InvalidFontSize {
            field,
            value,
            min,
            max,
        })
    }
}

/// Styling choices. Colors stay as the caller wrote them and are resolved
/// when the page is composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleParameters {
    pub font_color: String,
    pub background_color: String,
    pub border: bool,
    pub separator: bool,
    pub font: FontChoice,
    pub sizes: FontSizes,
}

impl Default for StyleParameters {
    fn default() -> Self {
        Self {
            font_color: "#222222".to_string(),
            background_color: "#FFF7F0".to_string(),
            border: true,
            separator: true,
            font: FontChoice::default(),
            sizes: FontSizes::default(),
        }
    }
}

/// A decoded logo or signature.
#[derive(Clone)]
pub struct ImageAsset {
    image: DynamicImage,
}

impl ImageAsset {
    /// Longest accepted side in pixels.
    pub const MAX_SIDE: u32 = 4096;

    /// Decodes PNG or JPEG bytes. The header is checked before any pixels
    /// are decoded, so an image claiming a huge canvas is rejected cheaply.
    pub fn decode(bytes: &[u8]) -> Result<Self, CertError> {
        let invalid = |e: image::ImageError| CertError::InvalidImage(e.to_string());
        let reader = || {
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| CertError::InvalidImage(e.to_string()))
        };

        let (width, height) = reader()?.into_dimensions().map_err(invalid)?;
        if width > Self::MAX_SIDE || height > Self::MAX_SIDE {
            return Err(CertError::InvalidImage(format!(
                "image is {width}x{height}, larger than {max}x{max}",
                max = Self::MAX_SIDE
            )));
        }

        let mut limits = Limits::default();
        limits.max_image_width = Some(Self::MAX_SIDE);
        limits.max_image_height = Some(Self::MAX_SIDE);
        let mut reader = reader()?;
        reader.limits(limits);
        Self::from_image(reader.decode().map_err(invalid)?)
    }

    pub fn from_image(image: DynamicImage) -> Result<Self, CertError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CertError::InvalidImage(format!(
                "image has no pixels ({width}x{height})"
            )));
        }
        Ok(Self { image })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Height over width.
    pub fn aspect_ratio(&self) -> f64 {
        let (w, h) = self.pixel_size();
        f64::from(h) / f64::from(w)
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.pixel_size();
        f.debug_struct("ImageAsset")
            .field("width", &w)
            .field("height", &h)
            .finish()
    }
}

/// Everything printed on one certificate apart from styling.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub recipient: String,
    pub course: String,
    pub summary: String,
    pub position: String,
    pub issued_on: NaiveDate,
    pub authority: Option<String>,
    pub logo: Option<ImageAsset>,
    pub signature: Option<ImageAsset>,
}

impl CertificateRequest {
    /// Download name offered to the browser.
    pub fn file_name(&self) -> String {
        let recipient: String = self
            .recipient
            .trim()
            .chars()
            .map(|c| match c {
                '"' | '/' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{}_certificate.pdf", recipient)
    }
}
