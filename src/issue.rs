use crate::certificate::{CertificateRequest, StyleParameters};
use crate::error::CertError;
use crate::layout::{compose, Layout, LayoutVariant};
use crate::ledger::{CertificateRecord, Ledger};
use crate::pdf::{self, FontLibrary};
use crate::storage::generate_certificate_id;

/// A rendered certificate ready for download.
#[derive(Debug)]
pub struct IssuedCertificate {
    pub pdf: Vec<u8>,
    pub file_name: String,
    /// Set when the certificate was issued against a ledger.
    pub identifier: Option<String>,
    /// A ledger failure that did not prevent delivering the document.
    pub ledger_error: Option<CertError>,
}

/// Composes and renders a certificate, recording it in `ledger` when one is given.
pub fn issue(
    request: &CertificateRequest,
    style: &StyleParameters,
    fonts: &FontLibrary,
    ledger: Option<&Ledger>,
) -> Result<IssuedCertificate, CertError> {
    issue_with(request, style, ledger, |layout, request| {
        pdf::render(layout, request, fonts)
    })
}

/// [`issue`] with the PDF backend supplied by the caller.
pub fn issue_with<R>(
    request: &CertificateRequest,
    style: &StyleParameters,
    ledger: Option<&Ledger>,
    render: R,
) -> Result<IssuedCertificate, CertError>
where
    R: FnOnce(&Layout, &CertificateRequest) -> Result<Vec<u8>, CertError>,
{
    let mut ledger_error = None;

    let identifier = ledger.map(|ledger| match ledger.mint_identifier() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Could not check ledger for ID collisions: {}", e);
            ledger_error = Some(e);
            generate_certificate_id()
        }
    });

    let variant = match &identifier {
        Some(identifier) => LayoutVariant::Registered {
            identifier: identifier.clone(),
        },
        None => LayoutVariant::Classic,
    };

    let layout = compose(request, style, &variant)?;
    let pdf = render(&layout, request)?;

    if let (Some(ledger), Some(id)) = (ledger, &identifier) {
        let record = CertificateRecord {
            id: id.clone(),
            recipient: request.recipient.clone(),
            course: request.course.clone(),
            issued_on: request.issued_on,
        };
        match ledger.append(record) {
            Ok(()) => tracing::info!("Recorded certificate {} for {}", id, request.recipient),
            Err(e) => {
                tracing::error!("Failed to record certificate {}: {}", id, e);
                ledger_error = Some(e);
            }
        }
    }

    Ok(IssuedCertificate {
        pdf,
        file_name: request.file_name(),
        identifier,
        ledger_error,
    })
}
