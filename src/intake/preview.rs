use base64::Engine as _;

/// Local preview of the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub file_name: String,
    pub data_url: String,
}

/// Encode bytes as a `data:` URL suitable for an `<img src>`.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_embeds_mime_and_base64() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[test]
    fn empty_payload_still_yields_url() {
        assert_eq!(data_url("image/jpeg", &[]), "data:image/jpeg;base64,");
    }
}
