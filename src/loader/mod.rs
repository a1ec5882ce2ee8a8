//! Bootstrap Loader Generator
//!
//! Builds a fresh two-stage loader per request:
//! 1. Stage 1 is rendered with random names, a random query value and the
//!    landing asset URLs, then minified
//! 2. A shuffled ASCII table substitutes every character of stage 1 and
//!    the substituted text is base64 encoded
//! 3. Stage 0 embeds the unshuffle key and the payload, and is minified
//!
//! Artifacts are never cached; two calls never return the same bytes.

pub mod identifiers;
pub mod minify;
pub mod substitution;
pub mod templates;

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

use identifiers::{random_identifiers, random_token};
use minify::minify_js;
use substitution::SubstitutionTable;
use templates::{render, AUTO_HTML, MANUAL_HTML, STAGE0_JS, STAGE1_JS};

/// Loader error types
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Character {0:?} is outside the substitution table")]
    UnsupportedCharacter(char),

    #[error("Failed to serialize loader data: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Assets
// ============================================================================

/// A `<link>` the loader creates: stylesheet, icon or manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAsset {
    pub url: String,
    pub rel: String,
    pub mime: String,
}

/// Landing asset URLs the loader fetches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderAssets {
    pub links: Vec<LinkAsset>,
    /// Script URLs in execution order
    pub scripts: Vec<String>,
}

// ============================================================================
// Artifact
// ============================================================================

/// One generated loader and the values it was built from
#[derive(Debug, Clone)]
pub struct LoaderArtifact {
    /// Minified stage 0, the bytes served to clients
    pub script: String,
    /// Minified stage 1 before substitution
    pub stage1: String,
    /// Base64 of the substituted stage 1
    pub payload: String,
    /// Substitute to original character
    pub unshuffle_key: BTreeMap<String, String>,
    /// `param=value` appended to asset URLs
    pub query: String,
    /// Random names used across both stages
    pub identifiers: Vec<String>,
}

// ============================================================================
// Generator
// ============================================================================

/// Stage 1 uses five random names and stage 0 three
const IDENTIFIER_COUNT: usize = 8;

/// Generates loader artifacts for one landing asset set
#[derive(Debug, Clone)]
pub struct LoaderGenerator {
    uri_param: String,
    root_element_id: String,
    assets: LoaderAssets,
}

impl LoaderGenerator {
    pub fn new(
        uri_param: impl Into<String>,
        root_element_id: impl Into<String>,
        assets: LoaderAssets,
    ) -> Self {
        Self {
            uri_param: uri_param.into(),
            root_element_id: root_element_id.into(),
            assets,
        }
    }

    pub fn assets(&self) -> &LoaderAssets {
        &self.assets
    }

    /// Build a fresh artifact
    pub fn build(&self) -> Result<LoaderArtifact, LoaderError> {
        let identifiers = random_identifiers(IDENTIFIER_COUNT);
        let name: Vec<&str> = identifiers.iter().map(String::as_str).collect();
        let query = format!("{}={}", self.uri_param, random_token(6, 20));

        // Stage 1
        let links: Vec<(&str, &str, &str)> = self
            .assets
            .links
            .iter()
            .map(|l| (l.url.as_str(), l.rel.as_str(), l.mime.as_str()))
            .collect();
        let links = ascii_json(&links)?;
        let scripts = ascii_json(&self.assets.scripts)?;
        let root_id = ascii_json(&self.root_element_id)?;
        let query_literal = ascii_json(&query)?;
        let query_literal = &query_literal[1..query_literal.len() - 1];

        let stage1 = minify_js(&render(
            STAGE1_JS,
            &[
                ("key_var", name[0]),
                ("timer_var", name[1]),
                ("fetch_fn", name[2]),
                ("hash_fn", name[3]),
                ("assemble_fn", name[4]),
                ("query", query_literal),
                ("root_id", root_id.as_str()),
                ("links", links.as_str()),
                ("scripts", scripts.as_str()),
            ],
        ));

        // Substitution
        let (substituted, unshuffle_key) = SubstitutionTable::shuffled().apply(&stage1)?;
        let payload = STANDARD.encode(substituted.as_bytes());

        // Stage 0
        let key_json = ascii_json(&unshuffle_key)?;
        let script = minify_js(&render(
            STAGE0_JS,
            &[
                ("key_var", name[5]),
                ("payload_var", name[6]),
                ("buffer_var", name[7]),
                ("unshuffle_key", key_json.as_str()),
                ("payload", payload.as_str()),
            ],
        ));

        tracing::debug!(
            stage1_len = stage1.len(),
            script_len = script.len(),
            "Generated loader"
        );

        Ok(LoaderArtifact {
            script,
            stage1,
            payload,
            unshuffle_key,
            query,
            identifiers,
        })
    }

    /// Fresh stage 0 script bytes
    pub fn generate(&self) -> Result<Vec<u8>, LoaderError> {
        Ok(self.build()?.script.into_bytes())
    }

    /// Page displaying a fresh loader for manual execution
    pub fn manual_html(&self) -> Result<String, LoaderError> {
        let script = self.build()?.script;
        let escaped = html_escape::encode_text(&script);
        Ok(render(MANUAL_HTML, &[("script", escaped.as_ref())]))
    }

    /// Page executing a fresh loader on load
    pub fn auto_html(&self) -> Result<String, LoaderError> {
        let script = self.build()?.script.replace("</", "<\\/");
        Ok(render(AUTO_HTML, &[("script", script.as_str())]))
    }
}

/// Serialize to JSON with every character above `~` escaped as `\uXXXX`,
/// so the output is valid JavaScript and fits the substitution table.
fn ascii_json<T: Serialize + ?Sized>(value: &T) -> Result<String, LoaderError> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if (c as u32) < 0x7f {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}
