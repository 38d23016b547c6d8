use reqwest::StatusCode;

use crate::constants::*;
use crate::types::GateResponse;

// Markers are literal strings produced by the site; update them here if its pages change.

pub fn is_gate_page(body: &str) -> bool {
    body.contains(GATE_PAGE_MARKER)
}

pub fn classify_response(status: StatusCode, body: &str) -> GateResponse {
    if status != StatusCode::OK {
        GateResponse::Unrecognized
    } else if body.contains(REAL_PAGE_MARKER) {
        GateResponse::RealPage
    } else if is_gate_page(body) {
        GateResponse::ObfuscationGate
    } else {
        GateResponse::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_response() {
        let real = "<!DOCTYPE html><html><head></head><body>lines</body></html>";
        let gate = "<html><body><script language=\"javascript\">window.onload=f;</script></body></html>";
        assert_eq!(classify_response(StatusCode::OK, real), GateResponse::RealPage);
        assert_eq!(classify_response(StatusCode::OK, gate), GateResponse::ObfuscationGate);
        assert_eq!(classify_response(StatusCode::OK, "{\"lines\":[]}"), GateResponse::Unrecognized);
        assert_eq!(classify_response(StatusCode::NOT_FOUND, real), GateResponse::Unrecognized);
        assert_eq!(classify_response(StatusCode::SERVICE_UNAVAILABLE, gate), GateResponse::Unrecognized);
    }
}
