//! Terminal rendering of pairing codes.

use qrcode::{QrCode, render::unicode, types::QrError};

/// Render `code` as a compact Unicode QR block suitable for a terminal.
pub fn render_terminal(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
