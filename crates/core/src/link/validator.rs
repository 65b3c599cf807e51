//! Structural and policy checks for score links.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::config::LinkPolicyConfig;

/// Anchored score-link pattern: host, user segment, numeric score id,
/// optional query or fragment.
static SCORE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?musescore\.com/(user/\d+|[A-Za-z0-9_.\-]+)/scores/(\d+)/?(?:[?#][^\s]*)?$",
    )
    .expect("score link pattern is valid")
});

/// Result of classifying a candidate link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    /// A well-formed link that may be downloaded.
    Accepted { link: String },
    /// A well-formed link to a restricted collection.
    RejectedPolicy { message: String },
    /// Not a score link.
    Malformed,
}

impl LinkVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Classifies inbound text. Pure; holds only the policy.
#[derive(Debug, Clone, Default)]
pub struct LinkValidator {
    policy: LinkPolicyConfig,
}

impl LinkValidator {
    pub fn new(policy: LinkPolicyConfig) -> Self {
        Self { policy }
    }

    /// Classifies `text`. Structure is checked before policy, so a malformed
    /// link is always `Malformed` even if it mentions a restricted segment.
    pub fn validate(&self, text: &str) -> LinkVerdict {
        let candidate = text.trim();
        if !SCORE_LINK.is_match(candidate) {
            return LinkVerdict::Malformed;
        }

        if self.is_restricted(candidate) {
            return LinkVerdict::RejectedPolicy {
                message: self.policy.policy_message.clone(),
            };
        }

        LinkVerdict::Accepted {
            link: candidate.to_string(),
        }
    }

    /// True when any word of the link (path segments, query keys and values,
    /// fragment) is a restricted marker.
    fn is_restricted(&self, link: &str) -> bool {
        link.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .filter(|word| !word.is_empty())
            .any(|word| {
                self.policy
                    .restricted_segments
                    .iter()
                    .any(|restricted| restricted.eq_ignore_ascii_case(word))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> LinkValidator {
        LinkValidator::default()
    }

    #[test]
    fn test_accepts_user_score_link() {
        let verdict = validator().validate("https://musescore.com/user/123/scores/456");
        assert_eq!(
            verdict,
            LinkVerdict::Accepted {
                link: "https://musescore.com/user/123/scores/456".to_string()
            }
        );
    }

    #[test]
    fn test_accepts_variants() {
        let v = validator();
        assert!(v.validate("  https://musescore.com/user/1/scores/2\n").is_accepted());
        assert!(v.validate("http://www.musescore.com/user/1/scores/2/").is_accepted());
        assert!(v.validate("https://musescore.com/someone/scores/987").is_accepted());
        assert!(v.validate("https://musescore.com/user/1/scores/2?share=copy_link").is_accepted());
    }

    #[test]
    fn test_rejects_official_scores_by_policy() {
        let verdict = validator().validate("https://musescore.com/official_scores/scores/6234478");
        assert!(matches!(verdict, LinkVerdict::RejectedPolicy { .. }));
    }

    #[test]
    fn test_restricted_marker_in_query_or_fragment_is_rejected() {
        let v = validator();
        for text in [
            "https://musescore.com/user/1/scores/2?from=official_scores",
            "https://musescore.com/user/1/scores/2?a=1&official_scores",
            "https://musescore.com/user/1/scores/2#official_scores",
            "https://musescore.com/user/1/scores/2/?ref=OFFICIAL_SCORES",
        ] {
            assert!(
                matches!(v.validate(text), LinkVerdict::RejectedPolicy { .. }),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_policy_message_is_returned_verbatim() {
        let validator = LinkValidator::new(LinkPolicyConfig {
            restricted_segments: vec!["official_scores".to_string()],
            policy_message: "Not allowed.".to_string(),
        });
        let verdict = validator.validate("https://musescore.com/official_scores/scores/1");
        assert_eq!(
            verdict,
            LinkVerdict::RejectedPolicy {
                message: "Not allowed.".to_string()
            }
        );
    }

    #[test]
    fn test_restricted_marker_in_malformed_link_is_malformed() {
        let v = validator();
        assert_eq!(
            v.validate("https://example.com/official_scores/scores/1"),
            LinkVerdict::Malformed
        );
        assert_eq!(v.validate("official_scores"), LinkVerdict::Malformed);
    }

    #[test]
    fn test_malformed_links() {
        let v = validator();
        for text in [
            "",
            "hello",
            "https://musescore.com/user/123",
            "https://musescore.com/user/abc/scores/456",
            "https://musescore.com/user/123/scores/abc",
            "https://musescore.com.evil.net/user/1/scores/2",
            "ftp://musescore.com/user/1/scores/2",
        ] {
            assert_eq!(v.validate(text), LinkVerdict::Malformed, "{text:?}");
        }
    }

    #[test]
    fn test_pattern_is_anchored() {
        let v = validator();
        assert_eq!(
            v.validate("look at https://musescore.com/user/1/scores/2"),
            LinkVerdict::Malformed
        );
        assert_eq!(
            v.validate("https://musescore.com/user/1/scores/2 please"),
            LinkVerdict::Malformed
        );
    }

    #[test]
    fn test_restricted_segment_must_match_whole_segment() {
        let verdict = validator().validate("https://musescore.com/not_official_scores/scores/5");
        assert!(verdict.is_accepted());
    }
}
