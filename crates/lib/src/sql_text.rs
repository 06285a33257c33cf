//! Lexical helpers shared by the security validator and the visualization parser.

/// Replaces the contents of single-quoted string literals with spaces.
///
/// The quotes themselves are kept and `''` escapes are honoured. Quoted identifiers
/// (`"..."`, `` `...` `` and `[...]`) are skipped unmasked, so a `'` inside one never
/// opens a literal. Byte offsets are preserved, so positions found in the masked text
/// index the original. Scanning stops at an unterminated literal or identifier and the
/// rest is left as is.
pub(crate) fn mask_literals(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut masked = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => match closing_quote(bytes, i, b'\'') {
                Some(end) => {
                    for b in &mut masked[i + 1..end] {
                        *b = b' ';
                    }
                    i = end + 1;
                }
                None => break,
            },
            quote @ (b'"' | b'`') => match closing_quote(bytes, i, quote) {
                Some(end) => i = end + 1,
                None => break,
            },
            b'[' => match bytes[i + 1..].iter().position(|&b| b == b']') {
                Some(offset) => i += offset + 2,
                None => break,
            },
            _ => i += 1,
        }
    }

    // Only ASCII bytes inside complete literals were replaced, each multi-byte
    // sequence entirely, so the result is still valid UTF-8.
    String::from_utf8(masked).unwrap_or_else(|_| sql.to_string())
}

/// Index of the quote closing the one at `start`. A doubled quote is an escape.
fn closing_quote(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return Some(j);
        }
        j += 1;
    }
    None
}

/// Parenthesis depth before each byte of `text`. Unbalanced closers clamp at zero.
pub(crate) fn paren_depths(text: &str) -> Vec<usize> {
    let mut depths = Vec::with_capacity(text.len());
    let mut depth = 0usize;
    for b in text.bytes() {
        depths.push(depth);
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depths
}

/// Splits `text` on commas at parenthesis depth zero, trimming each part.
/// `masked` must be the literal-masked form of `text`.
pub(crate) fn split_top_level(text: &str, masked: &str) -> Vec<String> {
    let depths = paren_depths(masked);
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, b) in masked.bytes().enumerate() {
        if b == b',' && depths[i] == 0 {
            parts.push(text[start..i].trim().to_string());
            start = i + 1;
        }
    }
    parts.push(text[start..].trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_literals() {
        assert_eq!(
            mask_literals("SELECT 'a;b' FROM t WHERE x = 'it''s'"),
            "SELECT '   ' FROM t WHERE x = '     '"
        );
        assert_eq!(mask_literals("SELECT 'open; DROP"), "SELECT 'open; DROP");
        assert_eq!(mask_literals("SELECT 'é'"), "SELECT '  '");
    }

    #[test]
    fn test_quoted_identifiers_do_not_open_literals() {
        assert_eq!(
            mask_literals(r#"SELECT "it's", 'x' FROM t"#),
            r#"SELECT "it's", ' ' FROM t"#
        );
        assert_eq!(
            mask_literals("SELECT `a'b`, [c'd], 'e' FROM t"),
            "SELECT `a'b`, [c'd], ' ' FROM t"
        );
        assert_eq!(
            mask_literals(r#"SELECT "a""'b", 'x'"#),
            r#"SELECT "a""'b", ' '"#
        );
    }

    #[test]
    fn test_split_top_level_ignores_nested_commas() {
        let text = "a, ROUND(AVG(b), 2) AS c, 'x,y'";
        let parts = split_top_level(text, &mask_literals(text));
        assert_eq!(parts, vec!["a", "ROUND(AVG(b), 2) AS c", "'x,y'"]);
    }
}
