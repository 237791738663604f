//! Content-type sniffing over a stream's leading bytes.

/// File kinds eligible for re-hosting. Everything else passes through with
/// its original URL.
const HOSTABLE_KINDS: &[&str] = &["jpg", "png", "gif", "mp4", "pdf", "docx", "pptx"];

/// Sniff the file kind from the leading bytes of a stream.
///
/// Returns the canonical extension, or `None` when the kind cannot be
/// determined from the bytes seen so far.
pub fn sniff_kind(head: &[u8]) -> Option<&'static str> {
    infer::get(head).map(|kind| kind.extension())
}

/// Whether a sniffed kind is eligible for re-hosting.
pub fn is_hostable(kind: &str) -> bool {
    HOSTABLE_KINDS.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_asset_kinds() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
        assert_eq!(sniff_kind(&png), Some("png"));

        let jpg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(sniff_kind(&jpg), Some("jpg"));

        let gif = b"GIF89a\x01\x00";
        assert_eq!(sniff_kind(gif), Some("gif"));

        let pdf = b"%PDF-1.7 rest of document";
        assert_eq!(sniff_kind(pdf), Some("pdf"));
    }

    #[test]
    fn unknown_bytes_are_undetermined() {
        assert_eq!(sniff_kind(b"just some plain text"), None);
        assert_eq!(sniff_kind(&[]), None);
    }

    #[test]
    fn allow_list_gates_hosting() {
        assert!(is_hostable("png"));
        assert!(is_hostable("mp4"));
        assert!(is_hostable("pdf"));
        // Detectable but not eligible
        assert!(!is_hostable("zip"));
        assert!(!is_hostable("exe"));
    }
}
