//! Pairing code rendering: QR images for the HTTP facade and the terminal.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use thiserror::Error;

/// Smallest side of the rendered SVG, in pixels.
const IMAGE_MIN_SIZE: u32 = 256;

#[derive(Debug, Error)]
#[error("pairing code cannot be rendered as a QR code: {0}")]
pub struct QrError(String);

fn encode(code: &str) -> Result<QrCode, QrError> {
    QrCode::new(code.as_bytes()).map_err(|e| QrError(e.to_string()))
}

/// Render a pairing code as an SVG QR code wrapped in a `data:` URL.
pub fn render_pairing_image(code: &str) -> Result<String, QrError> {
    let svg_xml = encode(code)?
        .render::<svg::Color>()
        .min_dimensions(IMAGE_MIN_SIZE, IMAGE_MIN_SIZE)
        .quiet_zone(true)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(svg_xml)
    ))
}

/// Render a pairing code with Unicode half blocks, for printing in a terminal.
pub fn render_pairing_terminal(code: &str) -> Result<String, QrError> {
    Ok(encode(code)?
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "2@abcDEF123==,xyzXYZ456==,AbCdEf789==,1";

    #[test]
    fn test_image_is_svg_data_url() {
        let url = render_pairing_image(CODE).unwrap();
        let encoded = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_distinct_codes_render_differently() {
        assert_ne!(
            render_pairing_image("1@2,ABCxyz==").unwrap(),
            render_pairing_image("1@2,ABCxyz==refreshed").unwrap()
        );
    }

    #[test]
    fn test_terminal_rendering() {
        let art = render_pairing_terminal(CODE).unwrap();
        assert!(art.lines().count() > 10);
        assert!(art.contains('█') || art.contains('▀') || art.contains('▄'));
    }

    #[test]
    fn test_oversized_code_is_error() {
        let huge = "x".repeat(8000);
        assert!(render_pairing_image(&huge).is_err());
    }
}
