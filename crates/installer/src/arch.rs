//! Bottle tag selection.
//!
//! Arm64 bottles are tagged `arm64_<os>`, Intel bottles plain `<os>`.
//! Portable bottles use `all` and are the last resort for either.

use vl_common::Architecture;

/// Tag used by architecture-independent bottles.
pub const PORTABLE_TAG: &str = "all";

/// Candidate tags for `arch`, in the order they should be tried.
///
/// `os_tags` is newest first; the result keeps that order.
pub fn tag_candidates(arch: Architecture, os_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = os_tags
        .iter()
        .map(|os| match arch {
            Architecture::Arm64 => format!("arm64_{os}"),
            Architecture::X86_64 => os.clone(),
        })
        .collect();
    tags.push(PORTABLE_TAG.to_string());
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os() -> Vec<String> {
        vec!["sequoia".into(), "sonoma".into()]
    }

    #[test]
    fn arm64_prefixes_every_os_tag() {
        assert_eq!(
            tag_candidates(Architecture::Arm64, &os()),
            vec!["arm64_sequoia", "arm64_sonoma", "all"]
        );
    }

    #[test]
    fn x86_uses_bare_os_tags() {
        assert_eq!(
            tag_candidates(Architecture::X86_64, &os()),
            vec!["sequoia", "sonoma", "all"]
        );
    }

    #[test]
    fn empty_os_list_still_offers_portable() {
        assert_eq!(tag_candidates(Architecture::Arm64, &[]), vec!["all"]);
    }
}
