//! Shallow well-formedness checks for content identifiers.
//!
//! Only the shape is checked here. Whether the identifier actually resolves
//! to a bundle is discovered by fetching and extracting it.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ViewerError;

/// CIDv0 (base58btc multihash) or CIDv1 in lowercase base32.
static CID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Qm[1-9A-HJ-NP-Za-km-z]{44}|b[a-z2-7]{50,100})$").expect("valid CID regex")
});

/// Return `true` if `cid` looks like a content identifier.
#[must_use]
pub fn is_well_formed(cid: &str) -> bool {
    CID_RE.is_match(cid)
}

/// Trim `cid` and check it, returning the normalized identifier.
pub fn validate(cid: &str) -> Result<&str, ViewerError> {
    let trimmed = cid.trim();
    if is_well_formed(trimmed) {
        Ok(trimmed)
    } else {
        Err(ViewerError::InvalidIdentifier(cid.to_string()))
    }
}

/// Short label used when a repository has no display name.
#[must_use]
pub fn default_display_name(cid: &str) -> String {
    let head: String = cid.chars().take(8).collect();
    format!("Repo {head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
    const V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn test_accepts_v0_and_v1() {
        assert!(is_well_formed(V0));
        assert!(is_well_formed(V1));
        assert_eq!(validate(&format!("  {V0}\n")).unwrap(), V0);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("Qm"));
        // '0' and 'O' are not in the base58 alphabet
        assert!(!is_well_formed("Qm0wAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
        assert!(!is_well_formed("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbd/"));
        assert!(!is_well_formed("../../etc/passwd"));
        assert!(matches!(
            validate("not-a-cid"),
            Err(ViewerError::InvalidIdentifier(s)) if s == "not-a-cid"
        ));
    }

    #[test]
    fn test_default_display_name() {
        assert_eq!(default_display_name(V0), "Repo QmYwAPJz...");
    }
}
