// Certificate PDF rendering
// Pages are drawn with printpdf ops directly in layout coordinates (points,
// bottom-left origin). Text is set in embedded TrueType faces: the base-14
// substitutes bundled with printpdf, or metric-compatible families found on disk.
use image::RgbImage;
use printpdf::{
    BuiltinFont, Color, FontId, Line, LinePoint, Mm, Op, PaintMode, ParsedFont, PdfDocument,
    PdfPage, PdfSaveOptions, Point as PdfPoint, Polygon, PolygonRing, Pt, RawImage, RawImageData,
    RawImageFormat, Rgb as PdfRgb, TextItem, TextMatrix, WindingOrder, XObjectTransform,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::certificate::{CertificateRequest, FontChoice, ImageAsset, Rgb};
use crate::error::CertError;
use crate::layout::{Anchor, DrawOp, FontWeight, ImageSlot, Layout, Point, TITLE};

pub const DEFAULT_FONT_DIRS: [&str; 5] = [
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
];

// File name suffixes per weight, covering Liberation (`-Regular`), DejaVu
// (bare name, `-Oblique`) and macOS (`Arial Bold.ttf`) naming.
const REGULAR_SUFFIXES: [&str; 2] = ["-Regular", ""];
const BOLD_SUFFIXES: [&str; 2] = ["-Bold", " Bold"];
const ITALIC_SUFFIXES: [&str; 4] = ["-Italic", "-Oblique", " Italic", " Oblique"];

/// Images are placed at one pixel per point and scaled from there.
const IMAGE_DPI: f32 = 72.0;

/// One TrueType face.
#[derive(Clone)]
struct FontFace {
    source: String,
    bytes: Arc<Vec<u8>>,
}

impl FontFace {
    fn parse(source: String, bytes: Vec<u8>) -> Option<Self> {
        if let Err(e) = ttf_parser::Face::parse(&bytes, 0) {
            tracing::warn!("Skipping font {}: {}", source, e);
            return None;
        }
        Some(Self {
            source,
            bytes: Arc::new(bytes),
        })
    }

    /// Advance width of `text` at `size` points. Characters the face has no
    /// glyph for count as the missing-glyph box.
    fn text_width(&self, text: &str, size: f32) -> Result<f32, CertError> {
        let face = ttf_parser::Face::parse(&self.bytes, 0)
            .map_err(|e| CertError::Render(format!("font {}: {e}", self.source)))?;
        let units: u32 = text
            .chars()
            .map(|c| {
                let glyph = face.glyph_index(c).unwrap_or(ttf_parser::GlyphId(0));
                u32::from(face.glyph_hor_advance(glyph).unwrap_or(0))
            })
            .sum();
        Ok(units as f32 * size / f32::from(face.units_per_em()))
    }
}

#[derive(Clone)]
struct FontFamily {
    regular: FontFace,
    bold: FontFace,
    italic: FontFace,
}

impl FontFamily {
    fn face(&self, weight: FontWeight) -> &FontFace {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
            FontWeight::Italic => &self.italic,
        }
    }

    fn builtin(choice: FontChoice) -> Option<Self> {
        let [regular, bold, italic] = match choice {
            FontChoice::Helvetica => [
                BuiltinFont::Helvetica,
                BuiltinFont::HelveticaBold,
                BuiltinFont::HelveticaOblique,
            ],
            FontChoice::Times => [
                BuiltinFont::TimesRoman,
                BuiltinFont::TimesBold,
                BuiltinFont::TimesItalic,
            ],
            FontChoice::Courier => [
                BuiltinFont::Courier,
                BuiltinFont::CourierBold,
                BuiltinFont::CourierOblique,
            ],
        };
        let load = |font: BuiltinFont| {
            FontFace::parse(format!("builtin {:?}", font), font.get_subset_font().bytes)
        };
        Some(Self {
            regular: load(regular)?,
            bold: load(bold)?,
            italic: load(italic)?,
        })
    }

    fn from_dir(dir: &Path, name: &str) -> Option<Self> {
        let load = |suffixes: &[&str]| {
            suffixes.iter().find_map(|suffix| {
                let path = dir.join(format!("{name}{suffix}.ttf"));
                let bytes = std::fs::read(&path).ok()?;
                FontFace::parse(path.display().to_string(), bytes)
            })
        };
        Some(Self {
            regular: load(&REGULAR_SUFFIXES)?,
            bold: load(&BOLD_SUFFIXES)?,
            italic: load(&ITALIC_SUFFIXES)?,
        })
    }
}

/// Font families available for rendering, keyed by the face they stand in for.
#[derive(Default)]
pub struct FontLibrary {
    families: HashMap<FontChoice, FontFamily>,
}

impl FontLibrary {
    /// The base-14 substitutes bundled with the PDF writer.
    pub fn builtin() -> Self {
        let mut families = HashMap::new();
        for choice in FontChoice::ALL {
            match FontFamily::builtin(choice) {
                Some(family) => {
                    families.insert(choice, family);
                }
                None => tracing::warn!("Bundled font for {} failed to parse", choice),
            }
        }
        Self { families }
    }

    /// Starts from [`FontLibrary::builtin`] and replaces each family with the
    /// first complete metric-compatible family found in `dirs`. Installed
    /// families cover more scripts than the bundled subsets.
    pub fn discover<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let existing: Vec<PathBuf> = dirs
            .iter()
            .map(|d| d.as_ref().to_path_buf())
            .filter(|d| d.exists())
            .collect();

        let mut library = Self::builtin();
        for choice in FontChoice::ALL {
            let found = existing.iter().find_map(|dir| {
                choice
                    .metric_families()
                    .iter()
                    .find_map(|name| FontFamily::from_dir(dir, name).map(|f| (dir, *name, f)))
            });
            match found {
                Some((dir, name, family)) => {
                    tracing::info!("Font {} uses {} from {}", choice, name, dir.display());
                    library.families.insert(choice, family);
                }
                None => tracing::info!("Font {} uses the bundled face", choice),
            }
        }
        library
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn available(&self) -> Vec<FontChoice> {
        FontChoice::ALL
            .into_iter()
            .filter(|c| self.families.contains_key(c))
            .collect()
    }

    fn face(&self, choice: FontChoice, weight: FontWeight) -> Result<&FontFace, CertError> {
        self.families
            .get(&choice)
            .map(|family| family.face(weight))
            .ok_or(CertError::FontUnavailable(choice.name()))
    }
}

/// Renders a composed layout to PDF bytes. Images are taken from `request`
/// and placed wherever the layout put their slot.
pub fn render(
    layout: &Layout,
    request: &CertificateRequest,
    fonts: &FontLibrary,
) -> Result<Vec<u8>, CertError> {
    let mut doc = PdfDocument::new(TITLE);
    let ops = page_ops(&mut doc, layout, request, fonts)?;
    doc.pages.push(PdfPage::new(
        Mm(pt_to_mm(layout.width)),
        Mm(pt_to_mm(layout.height)),
        ops,
    ));

    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for warning in &warnings {
        tracing::debug!("PDF writer: {:?}", warning);
    }
    Ok(bytes)
}

/// Translates layout operations into page ops, registering the fonts and
/// images they use with `doc`.
fn page_ops(
    doc: &mut PdfDocument,
    layout: &Layout,
    request: &CertificateRequest,
    fonts: &FontLibrary,
) -> Result<Vec<Op>, CertError> {
    let mut registered: HashMap<FontWeight, (FontId, &FontFace)> = HashMap::new();
    let mut ops = Vec::new();

    for op in &layout.ops {
        match op {
            DrawOp::FillPage { color } => {
                let corners = [
                    Point::new(0.0, 0.0),
                    Point::new(layout.width, 0.0),
                    Point::new(layout.width, layout.height),
                    Point::new(0.0, layout.height),
                ];
                ops.push(Op::SetFillColor {
                    col: color_of(*color),
                });
                ops.push(Op::DrawPolygon {
                    polygon: Polygon {
                        rings: vec![PolygonRing {
                            points: corners.iter().map(|p| line_point(*p)).collect(),
                        }],
                        mode: PaintMode::Fill,
                        winding_order: WindingOrder::NonZero,
                    },
                });
            }
            DrawOp::StrokeRect {
                origin,
                width,
                height,
                line_width,
                color,
            } => {
                let corners = [
                    *origin,
                    Point::new(origin.x + width, origin.y),
                    Point::new(origin.x + width, origin.y + height),
                    Point::new(origin.x, origin.y + height),
                ];
                stroke(&mut ops, &corners, true, *line_width, *color);
            }
            DrawOp::Line {
                from,
                to,
                line_width,
                color,
            } => stroke(&mut ops, &[*from, *to], false, *line_width, *color),
            DrawOp::Text {
                text,
                anchor,
                at,
                weight,
                size,
                color,
            } => {
                if text.is_empty() {
                    continue;
                }
                let (font_id, face) = match registered.get(weight) {
                    Some(entry) => entry.clone(),
                    None => {
                        let face = fonts.face(layout.font, *weight)?;
                        let parsed = ParsedFont::from_bytes(&face.bytes, 0, &mut Vec::new())
                            .ok_or_else(|| {
                                CertError::Render(format!("font {} could not be embedded", face.source))
                            })?;
                        let id = doc.add_font(&parsed);
                        registered.insert(*weight, (id.clone(), face));
                        (id, face)
                    }
                };

                let size = f32::from(*size);
                let width = face.text_width(text, size)?;
                let x = at.x as f32
                    - match anchor {
                        Anchor::Left => 0.0,
                        Anchor::Center => width / 2.0,
                        Anchor::Right => width,
                    };
                ops.extend([
                    Op::SetFillColor {
                        col: color_of(*color),
                    },
                    Op::StartTextSection,
                    Op::SetFontSize {
                        size: Pt(size),
                        font: font_id.clone(),
                    },
                    Op::SetTextMatrix {
                        matrix: TextMatrix::Translate(Pt(x), Pt(at.y as f32)),
                    },
                    Op::WriteText {
                        items: vec![TextItem::Text(text.clone())],
                        font: font_id,
                    },
                    Op::EndTextSection,
                ]);
            }
            DrawOp::Image {
                slot,
                origin,
                width,
                height,
            } => {
                let asset = match slot {
                    ImageSlot::Logo => request.logo.as_ref(),
                    ImageSlot::Signature => request.signature.as_ref(),
                };
                let Some(asset) = asset else {
                    continue;
                };
                let flat = flatten_alpha(asset, layout.background);
                let (px_width, px_height) = flat.dimensions();
                let image = RawImage {
                    pixels: RawImageData::U8(flat.into_raw()),
                    width: px_width as usize,
                    height: px_height as usize,
                    data_format: RawImageFormat::RGB8,
                    tag: Vec::new(),
                };
                let id = doc.add_image(&image);
                ops.push(Op::UseXobject {
                    id,
                    transform: XObjectTransform {
                        translate_x: Some(Pt(origin.x as f32)),
                        translate_y: Some(Pt(origin.y as f32)),
                        scale_x: Some(*width as f32 / px_width as f32),
                        scale_y: Some(*height as f32 / px_height as f32),
                        dpi: Some(IMAGE_DPI),
                        ..Default::default()
                    },
                });
            }
        }
    }

    Ok(ops)
}

fn stroke(ops: &mut Vec<Op>, points: &[Point], is_closed: bool, line_width: f64, color: Rgb) {
    ops.extend([
        Op::SetOutlineColor {
            col: color_of(color),
        },
        Op::SetOutlineThickness {
            pt: Pt(line_width as f32),
        },
        Op::DrawLine {
            line: Line {
                points: points.iter().map(|p| line_point(*p)).collect(),
                is_closed,
            },
        },
    ]);
}

fn line_point(point: Point) -> LinePoint {
    LinePoint {
        p: PdfPoint {
            x: Pt(point.x as f32),
            y: Pt(point.y as f32),
        },
        bezier: false,
    }
}

fn pt_to_mm(pt: f64) -> f32 {
    (pt * 25.4 / 72.0) as f32
}

fn color_of(rgb: Rgb) -> Color {
    let channel = |c: u8| f32::from(c) / 255.0;
    Color::Rgb(PdfRgb::new(channel(rgb.r), channel(rgb.g), channel(rgb.b), None))
}

/// Composites transparent pixels over the page background; images are
/// embedded as opaque RGB.
fn flatten_alpha(asset: &ImageAsset, background: Rgb) -> RgbImage {
    let image = asset.image();
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let blend = |fg: u8, bg: u8, alpha: u8| -> u8 {
        let a = u16::from(alpha);
        ((u16::from(fg) * a + u16::from(bg) * (255 - a) + 127) / 255) as u8
    };
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([
            blend(r, background.r, a),
            blend(g, background.g, a),
            blend(b, background.b, a),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::StyleParameters;
    use crate::layout::{compose, LayoutVariant, PAGE_HEIGHT, PAGE_WIDTH};
    use chrono::NaiveDate;
    use image::{DynamicImage, RgbaImage};

    fn request() -> CertificateRequest {
        CertificateRequest {
            recipient: "Jane Doe".into(),
            course: "Systems Design".into(),
            summary: "Awarded for outstanding performance in the course.".into(),
            position: "Top Scorer".into(),
            issued_on: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            authority: None,
            logo: None,
            signature: None,
        }
    }

    fn classic_ops(req: &CertificateRequest, style: &StyleParameters) -> Vec<Op> {
        let layout = compose(req, style, &LayoutVariant::Classic).unwrap();
        let mut doc = PdfDocument::new("test");
        page_ops(&mut doc, &layout, req, &FontLibrary::builtin()).unwrap()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_pt_to_mm() {
        assert!(approx(pt_to_mm(72.0), 25.4));
        assert!(approx(pt_to_mm(792.0), 279.4));
        assert!(approx(pt_to_mm(612.0), 215.9));
    }

    #[test]
    fn test_flatten_alpha_blends_over_background() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, image::Rgba([0, 0, 0, 255]));
        let asset = ImageAsset::from_image(DynamicImage::ImageRgba8(rgba)).unwrap();

        let flat = flatten_alpha(&asset, Rgb::new(255, 247, 240));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 247, 240]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_missing_font_is_reported() {
        let layout = compose(&request(), &StyleParameters::default(), &LayoutVariant::Classic)
            .unwrap();
        let result = render(&layout, &request(), &FontLibrary::empty());
        assert!(matches!(result, Err(CertError::FontUnavailable("Helvetica"))));
    }

    #[test]
    fn test_builtin_library_covers_every_choice() {
        let library = FontLibrary::builtin();
        assert_eq!(library.available(), FontChoice::ALL.to_vec());
        let face = library.face(FontChoice::Times, FontWeight::Bold).unwrap();
        assert!(face.source.starts_with("builtin"));
    }

    #[test]
    fn test_discover_falls_back_to_builtin_faces() {
        let library = FontLibrary::discover(&["/nonexistent/certmint/fonts"]);
        assert_eq!(library.available(), FontChoice::ALL.to_vec());
    }

    #[test]
    fn test_discover_reads_dejavu_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = BuiltinFont::Helvetica.get_subset_font().bytes;
        for file in ["DejaVuSans.ttf", "DejaVuSans-Bold.ttf", "DejaVuSans-Oblique.ttf"] {
            std::fs::write(dir.path().join(file), &bytes).unwrap();
        }

        let library = FontLibrary::discover(&[dir.path()]);
        let italic = library
            .face(FontChoice::Helvetica, FontWeight::Italic)
            .unwrap();
        assert!(italic.source.ends_with("DejaVuSans-Oblique.ttf"));
        // Families without files keep the bundled faces.
        let courier = library.face(FontChoice::Courier, FontWeight::Regular).unwrap();
        assert!(courier.source.starts_with("builtin"));
    }

    #[test]
    fn test_incomplete_family_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = BuiltinFont::Helvetica.get_subset_font().bytes;
        std::fs::write(dir.path().join("LiberationSans-Regular.ttf"), &bytes).unwrap();

        let library = FontLibrary::discover(&[dir.path()]);
        let face = library
            .face(FontChoice::Helvetica, FontWeight::Regular)
            .unwrap();
        assert!(face.source.starts_with("builtin"));
    }

    #[test]
    fn test_page_is_filled_with_background() {
        let ops = classic_ops(&request(), &StyleParameters::default());

        let fill = ops
            .iter()
            .position(|op| {
                matches!(op, Op::DrawPolygon { polygon } if matches!(polygon.mode, PaintMode::Fill))
            })
            .expect("background polygon");
        assert_eq!(fill, 1, "background is painted before anything else");
        match &ops[0] {
            Op::SetFillColor {
                col: Color::Rgb(rgb),
            } => {
                assert!(approx(rgb.r, 1.0));
                assert!(approx(rgb.g, 247.0 / 255.0));
                assert!(approx(rgb.b, 240.0 / 255.0));
            }
            other => panic!("expected background color, got {other:?}"),
        }
        match &ops[fill] {
            Op::DrawPolygon { polygon } => {
                let xs: Vec<f32> = polygon.rings[0].points.iter().map(|p| p.p.x.0).collect();
                let ys: Vec<f32> = polygon.rings[0].points.iter().map(|p| p.p.y.0).collect();
                assert!(xs.contains(&0.0) && xs.contains(&(PAGE_WIDTH as f32)));
                assert!(ys.contains(&0.0) && ys.contains(&(PAGE_HEIGHT as f32)));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_strokes_carry_their_widths() {
        let thicknesses: Vec<f32> = classic_ops(&request(), &StyleParameters::default())
            .iter()
            .filter_map(|op| match op {
                Op::SetOutlineThickness { pt } => Some(pt.0),
                _ => None,
            })
            .collect();
        assert_eq!(thicknesses, vec![3.0, 1.0]);

        let plain = StyleParameters {
            border: false,
            separator: false,
            ..StyleParameters::default()
        };
        let ops = classic_ops(&request(), &plain);
        assert!(!ops.iter().any(|op| matches!(op, Op::DrawLine { .. })));
    }

    #[test]
    fn test_title_is_centered_on_the_page() {
        let ops = classic_ops(&request(), &StyleParameters::default());
        let (x, y) = ops
            .iter()
            .find_map(|op| match op {
                Op::SetTextMatrix {
                    matrix: TextMatrix::Translate(x, y),
                } => Some((x.0, y.0)),
                _ => None,
            })
            .expect("title position");

        let width = FontLibrary::builtin()
            .face(FontChoice::Helvetica, FontWeight::Bold)
            .unwrap()
            .text_width(TITLE, 30.0)
            .unwrap();
        assert!(width > 0.0);
        assert!(approx(x, (PAGE_WIDTH as f32 - width) / 2.0));
        assert!(approx(y, PAGE_HEIGHT as f32 - 80.0));
    }

    #[test]
    fn test_images_are_embedded_only_when_uploaded() {
        let ops = classic_ops(&request(), &StyleParameters::default());
        assert!(!ops.iter().any(|op| matches!(op, Op::UseXobject { .. })));

        let mut req = request();
        req.logo = Some(ImageAsset::from_image(DynamicImage::new_rgb8(40, 20)).unwrap());
        let ops = classic_ops(&req, &StyleParameters::default());
        let (scale_x, scale_y, translate_x) = ops
            .iter()
            .find_map(|op| match op {
                Op::UseXobject { transform, .. } => {
                    Some((transform.scale_x, transform.scale_y, transform.translate_x))
                }
                _ => None,
            })
            .expect("logo placed");
        // 40 px shown 80 pt wide, 20 px shown 40 pt high.
        assert_eq!(scale_x, Some(2.0));
        assert_eq!(scale_y, Some(2.0));
        assert_eq!(translate_x.map(|pt| pt.0), Some(60.0));
    }

    #[test]
    fn test_renders_pdf_with_bundled_faces() {
        let mut req = request();
        req.logo = Some(ImageAsset::from_image(DynamicImage::new_rgb8(40, 20)).unwrap());
        req.signature = Some(ImageAsset::from_image(DynamicImage::new_rgba8(30, 10)).unwrap());
        let layout = compose(&req, &StyleParameters::default(), &LayoutVariant::Classic).unwrap();
        let bytes = render(&layout, &req, &FontLibrary::builtin()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_renders_text_outside_latin1() {
        let mut req = request();
        req.recipient = "Łukasz Nowak".into();
        req.course = "Введение в Rust".into();
        let layout = compose(&req, &StyleParameters::default(), &LayoutVariant::Classic).unwrap();
        let bytes = render(&layout, &req, &FontLibrary::builtin()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
