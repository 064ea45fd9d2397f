//! Version handling built on `semver`.

use semver::{BuildMetadata, Prerelease};

use crate::error::DomainError;
use crate::proposal::BumpKind;

/// Semantic version re-exported as the workspace version type.
pub type Version = semver::Version;

/// Parse a version string, tolerating a leading `v`.
pub fn parse_version(s: &str) -> Result<Version, DomainError> {
    let trimmed = s.strip_prefix('v').unwrap_or(s);
    trimmed.parse::<Version>().map_err(|e| DomainError::Validation {
        field: "version".into(),
        reason: format!("{s:?}: {e}"),
    })
}

/// Apply a bump to a version per semver rules. `BumpKind::None` returns the
/// version unchanged; a bump clears prerelease and build metadata.
#[must_use]
pub fn bump_version(current: &Version, kind: BumpKind) -> Version {
    let mut next = current.clone();
    match kind {
        BumpKind::Major => {
            next.major += 1;
            next.minor = 0;
            next.patch = 0;
        }
        BumpKind::Minor => {
            next.minor += 1;
            next.patch = 0;
        }
        BumpKind::Patch => {
            next.patch += 1;
        }
        BumpKind::Prerelease => {
            let pre = match current.pre.as_str() {
                "" => "rc.1".to_string(),
                existing => match existing.rsplit_once('.') {
                    Some((tag, n)) => match n.parse::<u64>() {
                        Ok(n) => format!("{tag}.{}", n + 1),
                        Err(_) => format!("{existing}.1"),
                    },
                    None => format!("{existing}.1"),
                },
            };
            next.pre = Prerelease::new(&pre).unwrap_or(Prerelease::EMPTY);
            next.build = BuildMetadata::EMPTY;
            return next;
        }
        BumpKind::None => return next,
    }
    next.pre = Prerelease::EMPTY;
    next.build = BuildMetadata::EMPTY;
    next
}

/// Render the conventional tag name for a version.
#[must_use]
pub fn tag_name(version: &Version) -> String {
    format!("v{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        assert_eq!(parse_version("1.2.3").unwrap().to_string(), "1.2.3");
        assert_eq!(parse_version("v1.2.3").unwrap().to_string(), "1.2.3");
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn bumps_follow_semver() {
        let v = parse_version("1.2.3").unwrap();
        assert_eq!(bump_version(&v, BumpKind::Major).to_string(), "2.0.0");
        assert_eq!(bump_version(&v, BumpKind::Minor).to_string(), "1.3.0");
        assert_eq!(bump_version(&v, BumpKind::Patch).to_string(), "1.2.4");
        assert_eq!(bump_version(&v, BumpKind::None).to_string(), "1.2.3");
    }

    #[test]
    fn prerelease_bump_increments_counter() {
        let v = parse_version("2.0.0").unwrap();
        let rc1 = bump_version(&v, BumpKind::Prerelease);
        assert_eq!(rc1.to_string(), "2.0.0-rc.1");
        let rc2 = bump_version(&rc1, BumpKind::Prerelease);
        assert_eq!(rc2.to_string(), "2.0.0-rc.2");
    }

    #[test]
    fn bump_clears_prerelease() {
        let v = parse_version("2.0.0-rc.2").unwrap();
        assert_eq!(bump_version(&v, BumpKind::Patch).to_string(), "2.0.1");
    }

    #[test]
    fn tag_uses_v_prefix() {
        assert_eq!(tag_name(&parse_version("1.0.0").unwrap()), "v1.0.0");
    }
}
