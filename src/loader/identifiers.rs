//! Random JavaScript identifiers

use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Shortest generated identifier
pub const MIN_IDENTIFIER_LEN: usize = 6;

/// Longest generated identifier
pub const MAX_IDENTIFIER_LEN: usize = 20;

/// Names a generated identifier must never shadow
const RESERVED: &[&str] = &[
    "arguments", "async", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false",
    "finally", "for", "function", "if", "implements", "import", "in", "instanceof", "interface",
    "let", "new", "null", "package", "private", "protected", "public", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield", "atob", "Blob", "clearInterval", "console", "decodeURIComponent",
    "document", "fetch", "location", "setInterval", "TextEncoder", "Uint8Array", "URL",
    "window",
];

fn random_string(rng: &mut impl Rng, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect()
}

/// `count` distinct random lengths in the identifier range
fn distinct_lengths(rng: &mut impl Rng, count: usize) -> Vec<usize> {
    let span = MAX_IDENTIFIER_LEN - MIN_IDENTIFIER_LEN + 1;
    let count = count.min(span);

    let mut lengths = Vec::with_capacity(count);
    while lengths.len() < count {
        let len = rng.gen_range(MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN);
        if !lengths.contains(&len) {
            lengths.push(len);
        }
    }
    lengths
}

/// `count` letter-only identifiers of pairwise distinct lengths, so no
/// two can collide. At most one identifier per possible length is drawn.
pub fn random_identifiers(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();

    distinct_lengths(&mut rng, count)
        .into_iter()
        .map(|len| loop {
            let name = random_string(&mut rng, LETTERS, len);
            if !RESERVED.contains(&name.as_str()) {
                break name;
            }
        })
        .collect()
}

/// Random alphanumeric token, used as a query string value
pub fn random_token(min_len: usize, max_len: usize) -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(min_len..=max_len.max(min_len));
    random_string(&mut rng, ALPHANUMERIC, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifiers_are_distinct_letters() {
        for _ in 0..50 {
            let names = random_identifiers(8);
            assert_eq!(names.len(), 8);

            let unique: HashSet<&String> = names.iter().collect();
            assert_eq!(unique.len(), 8);

            for name in &names {
                assert!(name.len() >= MIN_IDENTIFIER_LEN && name.len() <= MAX_IDENTIFIER_LEN);
                assert!(name.bytes().all(|b| b.is_ascii_alphabetic()));
            }
        }
    }

    #[test]
    fn test_count_is_capped_by_length_range() {
        assert_eq!(random_identifiers(100).len(), MAX_IDENTIFIER_LEN - MIN_IDENTIFIER_LEN + 1);
    }

    #[test]
    fn test_token() {
        let token = random_token(6, 20);
        assert!((6..=20).contains(&token.len()));
        assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
    }
}
