use axum::{
    extract::{Multipart, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tera::Context;

use crate::certificate::{
    CertificateRequest, FontChoice, FontSizes, ImageAsset, StyleParameters,
};
use crate::error::AppError;
use crate::issue::issue;
use crate::routes::RecordView;
use crate::state::AppState;

const ACCEPTED_IMAGE_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

#[derive(Serialize)]
struct SizeSlider {
    label: &'static str,
    field: &'static str,
    min: u8,
    max: u8,
    value: u8,
}

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let style = StyleParameters::default();
    let sizes = style.sizes;
    let slider = |label, field, (min, max): (u8, u8), value| SizeSlider {
        label,
        field,
        min,
        max,
        value,
    };

    let mut ctx = Context::new();
    ctx.insert("ledger_enabled", &state.ledger.is_some());
    ctx.insert("today", &chrono::Local::now().date_naive().format("%Y-%m-%d").to_string());
    ctx.insert(
        "defaults",
        &serde_json::json!({
            "recipient": "Vaibhav Rawat",
            "course": "AI Fundamentals",
            "summary": "Awarded for outstanding performance in the course.",
            "position": "Top Scorer",
        }),
    );
    let fonts: Vec<&str> = FontChoice::ALL.iter().map(|f| f.name()).collect();
    ctx.insert("fonts", &fonts);
    ctx.insert(
        "sizes",
        &[
            slider("Title", "title_size", FontSizes::TITLE_RANGE, sizes.title),
            slider("Name", "name_size", FontSizes::NAME_RANGE, sizes.name),
            slider("Course", "course_size", FontSizes::COURSE_RANGE, sizes.course),
            slider("Summary", "summary_size", FontSizes::SUMMARY_RANGE, sizes.summary),
        ],
    );
    ctx.insert("style", &style);

    render_template("index.html", &ctx)
}

/// Fields of the certificate form, collected from a multipart body.
#[derive(Default)]
pub(crate) struct CertificateForm {
    text: HashMap<String, String>,
    logo: Option<ImageAsset>,
    signature: Option<ImageAsset>,
}

impl CertificateForm {
    pub(crate) async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed form data: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "logo" | "signature" => {
                    let filename = field.file_name().unwrap_or("").to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
                    let asset = decode_upload(&name, &filename, &data);
                    if name == "logo" {
                        form.logo = asset;
                    } else {
                        form.signature = asset;
                    }
                }
                _ => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
                    form.text.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.text.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    fn checkbox(&self, key: &str) -> bool {
        match self.text.get(key) {
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "off" | "false" | "0"),
            None => false,
        }
    }

    fn size(&self, key: &str, default: u8) -> Result<u8, AppError> {
        match self.text(key) {
            Some(raw) => raw
                .parse::<u8>()
                .map_err(|_| AppError::Validation(format!("{key} must be a whole number, got {raw:?}"))),
            None => Ok(default),
        }
    }

    /// Splits the form into the certificate content and its styling.
    /// `today` fills in a missing date.
    pub(crate) fn into_parts(
        self,
        today: NaiveDate,
    ) -> Result<(CertificateRequest, StyleParameters), AppError> {
        let defaults = StyleParameters::default();

        let issued_on = match self.text("date") {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::Validation(format!("date must be YYYY-MM-DD, got {raw:?}")))?,
            None => today,
        };
        let font = match self.text("font_family") {
            Some(raw) => raw.parse::<FontChoice>()?,
            None => defaults.font,
        };
        let sizes = FontSizes {
            title: self.size("title_size", defaults.sizes.title)?,
            name: self.size("name_size", defaults.sizes.name)?,
            course: self.size("course_size", defaults.sizes.course)?,
            summary: self.size("summary_size", defaults.sizes.summary)?,
        };
        let style = StyleParameters {
            font_color: self
                .text("font_color")
                .map(String::from)
                .unwrap_or(defaults.font_color),
            background_color: self
                .text("bg_color")
                .map(String::from)
                .unwrap_or(defaults.background_color),
            border: self.checkbox("border"),
            separator: self.checkbox("separator"),
            font,
            sizes,
        };

        let owned = |key: &str| self.text(key).unwrap_or("").to_string();
        let recipient = owned("recipient_name");
        if recipient.is_empty() {
            return Err(AppError::Validation("recipient_name is required".to_string()));
        }
        let request = CertificateRequest {
            recipient,
            course: owned("course_title"),
            summary: owned("summary"),
            position: owned("position"),
            issued_on,
            authority: self.text("authority").map(String::from),
            logo: self.logo.clone(),
            signature: self.signature.clone(),
        };
        Ok((request, style))
    }
}

/// An empty, unsupported, or undecodable upload is treated as absent.
fn decode_upload(field: &str, filename: &str, data: &[u8]) -> Option<ImageAsset> {
    if data.is_empty() {
        return None;
    }
    let mime = mime_guess::from_path(filename).first_raw().unwrap_or("");
    if !ACCEPTED_IMAGE_TYPES.contains(&mime) {
        tracing::warn!("Ignoring {} upload {:?}: unsupported type {:?}", field, filename, mime);
        return None;
    }
    match ImageAsset::decode(data) {
        Ok(asset) => Some(asset),
        Err(e) => {
            tracing::warn!("Ignoring {} upload {:?}: {}", field, filename, e);
            None
        }
    }
}

pub async fn generate_certificate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = CertificateForm::read(multipart).await?;
    let (request, style) = form.into_parts(chrono::Local::now().date_naive())?;

    let fonts = state.fonts.clone();
    let ledger = state.ledger.clone();
    let issued = tokio::task::spawn_blocking(move || {
        issue(&request, &style, &fonts, ledger.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;

    tracing::info!(
        "Issued {} ({} bytes){}",
        issued.file_name,
        issued.pdf.len(),
        issued
            .identifier
            .as_deref()
            .map(|id| format!(" as {id}"))
            .unwrap_or_default()
    );

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", issued.file_name),
        );
    if let Some(id) = &issued.identifier {
        response = response.header("X-Certificate-Id", id.as_str());
    }
    if let Some(e) = &issued.ledger_error {
        let warning: String = e
            .to_string()
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        response = response.header("X-Ledger-Warning", warning);
    }

    response
        .body(axum::body::Body::from(issued.pdf))
        .map_err(|e| AppError::Internal(e.into()))
}

pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let Some(ledger) = state.ledger.clone() else {
        return Err(AppError::NotFound("The certificate ledger is disabled".to_string()));
    };
    let records = tokio::task::spawn_blocking(move || ledger.load_all())
        .await
        .map_err(|e| AppError::Internal(e.into()))??;
    let records: Vec<RecordView> = records.iter().map(RecordView::from).collect();

    let mut ctx = Context::new();
    ctx.insert("ledger_enabled", &true);
    ctx.insert("records", &records);
    render_template("certificates.html", &ctx)
}

fn render_template(name: &str, ctx: &Context) -> Result<Html<String>, AppError> {
    let tera = crate::templates::get_tera();
    tera.render(name, ctx)
        .map(Html)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Template {name} failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CertError;

    fn form(fields: &[(&str, &str)]) -> CertificateForm {
        CertificateForm {
            text: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..CertificateForm::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()
    }

    #[test]
    fn test_full_form() {
        let (request, style) = form(&[
            ("recipient_name", "Jane Doe"),
            ("course_title", "Systems Design"),
            ("summary", "Great work"),
            ("position", "Top Scorer"),
            ("date", "2024-03-15"),
            ("font_color", "#222222"),
            ("bg_color", "#FFF7F0"),
            ("font_family", "Times"),
            ("title_size", "32"),
            ("border", "on"),
        ])
        .into_parts(today())
        .unwrap();

        assert_eq!(request.recipient, "Jane Doe");
        assert_eq!(request.issued_on, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert!(request.authority.is_none());
        assert!(request.logo.is_none());
        assert_eq!(style.font, FontChoice::Times);
        assert_eq!(style.sizes.title, 32);
        assert_eq!(style.sizes.name, 22);
        assert!(style.border);
        assert!(!style.separator);
    }

    #[test]
    fn test_missing_date_uses_injected_today() {
        let (request, _) = form(&[("recipient_name", "Ada"), ("date", "")])
            .into_parts(today())
            .unwrap();
        assert_eq!(request.issued_on, today());
    }

    #[test]
    fn test_missing_recipient_is_rejected() {
        assert!(matches!(
            form(&[("course_title", "Math")]).into_parts(today()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_date_and_size_are_rejected() {
        assert!(matches!(
            form(&[("recipient_name", "Ada"), ("date", "15/03/2024")]).into_parts(today()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            form(&[("recipient_name", "Ada"), ("name_size", "big")]).into_parts(today()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_font_is_rejected() {
        assert!(matches!(
            form(&[("recipient_name", "Ada"), ("font_family", "Papyrus")]).into_parts(today()),
            Err(AppError::Certificate(CertError::UnsupportedFont(_)))
        ));
    }

    #[test]
    fn test_checkbox_values() {
        let f = form(&[("border", "false"), ("separator", "true")]);
        assert!(!f.checkbox("border"));
        assert!(f.checkbox("separator"));
        assert!(!f.checkbox("missing"));
    }

    #[test]
    fn test_uploads_are_filtered() {
        assert!(decode_upload("logo", "logo.png", b"").is_none());
        assert!(decode_upload("logo", "logo.gif", b"GIF89a").is_none());
        assert!(decode_upload("logo", "logo.png", b"not a png").is_none());

        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(4, 2)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        let asset =
            decode_upload("logo", "logo.PNG", png.get_ref()).expect("valid png decodes");
        assert_eq!(asset.pixel_size(), (4, 2));
    }
}
