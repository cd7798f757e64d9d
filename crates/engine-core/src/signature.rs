use crate::text::normalize_text;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use model::core::identifiers::Sid;

/// Normalization applied before signing. Must stay the segmenter's normalization.
pub fn normalize_for_signature(text: &str) -> String {
    normalize_text(text)
}

/// Stable fingerprint of `(text, sid)`: base64 of `"<normalized>#<sid>"`.
pub fn signature(text: &str, sid: Sid) -> String {
    let content = format!("{}#{}", normalize_for_signature(text), sid);
    STANDARD.encode(content.as_bytes())
}

pub fn verify(sig: &str, text: &str, sid: Sid) -> bool {
    sig == signature(text, sid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_normalized_text_and_sid() {
        assert_eq!(signature("Sveiki!", 0), STANDARD.encode("Sveiki!#0"));
        assert_eq!(signature("  Labrīt,\n  pasaule. ", 3), STANDARD.encode("Labrīt, pasaule.#3"));
    }

    #[test]
    fn whitespace_variants_share_a_signature() {
        assert_eq!(signature("a  b\r\nc", 1), signature("a b c", 1));
        assert!(verify(&signature("a b c", 1), "a\tb c", 1));
    }

    proptest! {
        #[test]
        fn normalization_matches_segmenter(s in "\\PC{0,64}|[ \t\r\n]{0,8}") {
            prop_assert_eq!(normalize_for_signature(&s), normalize_text(&s));
        }

        #[test]
        fn signature_is_deterministic(text in "\\PC{0,64}", sid in 0usize..10_000) {
            prop_assert_eq!(signature(&text, sid), signature(&text, sid));
        }

        #[test]
        fn sid_changes_signature(text in "[a-zA-Z .]{1,40}", sid in 0usize..10_000) {
            prop_assert_ne!(signature(&text, sid), signature(&text, sid + 1));
        }

        #[test]
        fn text_changes_signature(
            a in "[a-z]{1,20}",
            b in "[a-z]{1,20}",
            sid in 0usize..100,
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(signature(&a, sid), signature(&b, sid));
        }
    }
}
