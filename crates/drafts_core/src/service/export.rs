//! PDF export hand-off.
//!
//! Core only names the file and forwards the session's current content to an
//! injected exporter; rasterization lives outside core.

use crate::clock::Clock;
use crate::service::autosave::AutosaveSession;
use crate::store::RecordStore;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

const FALLBACK_EXPORT_STEM: &str = "document";

/// Boxed error returned by exporter implementations.
pub type ExporterFailure = Box<dyn Error + Send + Sync + 'static>;

/// Export request handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub filename: String,
    /// Serialized rich-text content currently in the editor.
    pub content: String,
}

/// External renderer producing the downloadable file.
pub trait PdfExporter {
    fn export(&mut self, request: &ExportRequest) -> Result<(), ExporterFailure>;
}

#[derive(Debug)]
pub enum ExportError {
    Exporter(ExporterFailure),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exporter(err) => write!(f, "export failed: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Exporter(err) => Some(err.as_ref()),
        }
    }
}

/// Returns `<title>.pdf`, or `document.pdf` when the title is empty.
///
/// Whitespace-only titles are kept as typed.
pub fn export_filename(title: &str) -> String {
    if title.is_empty() {
        format!("{FALLBACK_EXPORT_STEM}.pdf")
    } else {
        format!("{title}.pdf")
    }
}

/// Exports the session's current editor state.
///
/// Failures are logged and returned; the session is left untouched.
pub fn export_document<S, C, E>(
    session: &AutosaveSession<S, C>,
    exporter: &mut E,
) -> Result<ExportRequest, ExportError>
where
    S: RecordStore,
    C: Clock,
    E: PdfExporter + ?Sized,
{
    let request = ExportRequest {
        filename: export_filename(session.title()),
        content: session.content().to_string(),
    };

    match exporter.export(&request) {
        Ok(()) => {
            info!(
                "event=doc_export module=export status=ok doc_id={} content_bytes={}",
                session.document_id(),
                request.content.len()
            );
            Ok(request)
        }
        Err(err) => {
            error!(
                "event=doc_export module=export status=error doc_id={} error_code=exporter_failed error={}",
                session.document_id(),
                err
            );
            Err(ExportError::Exporter(err))
        }
    }
}
