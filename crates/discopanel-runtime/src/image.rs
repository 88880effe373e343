//! Image reference resolution (§4.1 Create contract, SPEC_FULL.md §F): a
//! reference given only as a short tag is resolved against a known base
//! repository; anything carrying a registry host or a path separator is
//! used verbatim.

/// Base repository short tags resolve against when a reference carries
/// neither a registry host nor a slash.
pub const DEFAULT_BASE_REPOSITORY: &str = "itzg/minecraft-server";

/// Resolves `image_ref` to the reference that should actually be pulled.
///
/// A reference is a "short tag" when it has no slash at all (e.g. `"latest"`,
/// `"java21"`) — those resolve against [`DEFAULT_BASE_REPOSITORY`]. Anything
/// with a slash is already a repository path (`"itzg/minecraft-server:latest"`,
/// `"ghcr.io/org/image:tag"`, `"registry.internal:5000/ns/image"`) and is
/// used verbatim.
pub fn resolve_image_ref(image_ref: &str) -> String {
    if image_ref.contains('/') {
        image_ref.to_owned()
    } else {
        format!("{DEFAULT_BASE_REPOSITORY}:{image_ref}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tag_resolves_against_base_repository() {
        assert_eq!(resolve_image_ref("latest"), "itzg/minecraft-server:latest");
        assert_eq!(resolve_image_ref("java21"), "itzg/minecraft-server:java21");
    }

    #[test]
    fn fully_qualified_reference_is_used_verbatim() {
        assert_eq!(resolve_image_ref("itzg/minecraft-server:2024.1.0"), "itzg/minecraft-server:2024.1.0");
        assert_eq!(resolve_image_ref("ghcr.io/org/image:tag"), "ghcr.io/org/image:tag");
        assert_eq!(
            resolve_image_ref("registry.internal:5000/ns/image"),
            "registry.internal:5000/ns/image"
        );
    }
}
