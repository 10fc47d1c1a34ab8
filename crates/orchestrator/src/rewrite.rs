//! Rewrites prompt wording so it refers to the extracted PlantUML text.

use once_cell::sync::Lazy;
use regex::Regex;

// `\b` is Unicode-aware, so accented forms keep their word boundaries.
static PLURAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:images|imágenes|imagenes)\b").expect("plural pattern is valid")
});

static SINGULAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:image|imagen)\b").expect("singular pattern is valid"));

/// Replaces whole-word "image(s)" in any supported spelling with
/// "PlantUML code(s)". Plural forms are replaced first.
///
/// ```
/// use umlforge_orchestrator::rewrite_prompt;
///
/// assert_eq!(rewrite_prompt("describe the images"), "describe the PlantUML codes");
/// assert_eq!(rewrite_prompt("keep the imagery"), "keep the imagery");
/// ```
pub fn rewrite_prompt(prompt: &str) -> String {
    let plural = PLURAL.replace_all(prompt, "PlantUML codes");
    SINGULAR.replace_all(&plural, "PlantUML code").into_owned()
}
