//! Path Codec
//!
//! Translates opaque path segments received on the wire into real paths
//! relative to the served root, and back. Callers must flatten every error
//! from this module to a plain "not found" at the HTTP boundary.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::transform::{TransformChain, TransformError};

/// Path codec error types
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Failed to decode path: {0}")]
    Decode(#[from] TransformError),

    #[error("Decoded path is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid character in file path")]
    InvalidCharacter,
}

/// Deobfuscate an opaque path segment.
///
/// A single leading `/` is stripped before inversion.
pub fn decode_path(chain: &TransformChain, opaque: &str) -> Result<String, PathError> {
    let opaque = opaque.strip_prefix('/').unwrap_or(opaque);
    let decoded = chain.invert(opaque.as_bytes())?;
    String::from_utf8(decoded).map_err(|_| PathError::NotUtf8)
}

/// Obfuscate a real relative path for use in an outbound reference.
///
/// The chain must end in a text-producing transform for the result to be
/// usable in a URL.
pub fn encode_path(chain: &TransformChain, real: &str) -> Result<String, PathError> {
    let encoded = chain.apply(real.as_bytes())?;
    String::from_utf8(encoded).map_err(|_| PathError::NotUtf8)
}

/// Join `relative` onto `root` after cleaning it.
///
/// The relative path is treated as rooted at `/`, so `..` components can
/// never climb above `root`. Platform separators other than `/` are
/// rejected outright.
pub fn to_absolute(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    if MAIN_SEPARATOR != '/' && relative.contains(MAIN_SEPARATOR) {
        return Err(PathError::InvalidCharacter);
    }
    if relative.contains('\0') {
        return Err(PathError::InvalidCharacter);
    }

    let root = if root.as_os_str().is_empty() {
        Path::new(".")
    } else {
        root
    };

    let mut absolute = root.to_path_buf();
    for component in clean_components(relative) {
        absolute.push(component);
    }
    Ok(absolute)
}

/// Lexically clean a slash-separated path rooted at `/`
fn clean_components(path: &str) -> Vec<&str> {
    let mut components: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformConfig;

    fn chain() -> TransformChain {
        TransformChain::from_configs(&[
            TransformConfig::new("xor").with_option("key", "secret"),
            TransformConfig::new("base64").with_option("alphabet", "url"),
        ])
        .0
    }

    #[test]
    fn test_decode_strips_single_leading_slash() {
        let chain = chain();
        let opaque = encode_path(&chain, "/docs/report.pdf").unwrap();

        assert_eq!(decode_path(&chain, &opaque).unwrap(), "/docs/report.pdf");
        assert_eq!(decode_path(&chain, &format!("/{}", opaque)).unwrap(), "/docs/report.pdf");
        assert!(decode_path(&chain, &format!("//{}", opaque)).is_err());
    }

    #[test]
    fn test_decode_failure() {
        assert!(matches!(decode_path(&chain(), "!!!"), Err(PathError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_non_utf8() {
        let chain = TransformChain::from_configs(&[TransformConfig::new("base64")]).0;
        // "gA==" decodes to a lone 0x80 continuation byte
        assert!(matches!(decode_path(&chain, "/gA=="), Err(PathError::NotUtf8)));
    }

    #[test]
    fn test_to_absolute_joins_and_cleans() {
        let root = Path::new("/srv/root");
        assert_eq!(to_absolute(root, "/a/b.bin").unwrap(), PathBuf::from("/srv/root/a/b.bin"));
        assert_eq!(to_absolute(root, "a/./c/../b.bin").unwrap(), PathBuf::from("/srv/root/a/b.bin"));
        assert_eq!(to_absolute(root, "/").unwrap(), PathBuf::from("/srv/root"));
    }

    #[test]
    fn test_to_absolute_cannot_escape_root() {
        let root = Path::new("/srv/root");
        assert_eq!(
            to_absolute(root, "../../etc/passwd").unwrap(),
            PathBuf::from("/srv/root/etc/passwd")
        );
        assert_eq!(to_absolute(root, "/a/../../..").unwrap(), PathBuf::from("/srv/root"));
    }

    #[test]
    fn test_to_absolute_rejects_nul() {
        assert!(matches!(
            to_absolute(Path::new("/srv"), "a\0b"),
            Err(PathError::InvalidCharacter)
        ));
    }

    #[test]
    fn test_empty_root_defaults_to_cwd() {
        assert_eq!(to_absolute(Path::new(""), "/x").unwrap(), PathBuf::from("./x"));
    }
}
