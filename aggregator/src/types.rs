use std::fmt;
use std::str::FromStr;

/// The resources served by the public API.
///
/// `name` is the public path segment (`/api/<name>`), `store_key` the key the
/// records live under in the manual document. They only differ for breaking
/// news, which the manual document has always called `breaking`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Matches,
    Trending,
    BreakingNews,
    Articles,
    Videos,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::Matches,
        ResourceType::Trending,
        ResourceType::BreakingNews,
        ResourceType::Articles,
        ResourceType::Videos,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ResourceType::Matches => "matches",
            ResourceType::Trending => "trending",
            ResourceType::BreakingNews => "breaking-news",
            ResourceType::Articles => "articles",
            ResourceType::Videos => "videos",
        }
    }

    pub const fn store_key(&self) -> &'static str {
        match self {
            ResourceType::BreakingNews => "breaking",
            other => other.name(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown resource type: {0}")]
pub struct UnknownResourceType(pub String);

/// Accepts both the store key and the public name.
impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|r| r.store_key() == s || r.name() == s)
            .ok_or_else(|| UnknownResourceType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_type() {
        assert_eq!("matches".parse::<ResourceType>(), Ok(ResourceType::Matches));
        assert_eq!("breaking".parse::<ResourceType>(), Ok(ResourceType::BreakingNews));
        assert_eq!("breaking-news".parse::<ResourceType>(), Ok(ResourceType::BreakingNews));
        assert_eq!("videos".parse::<ResourceType>(), Ok(ResourceType::Videos));
        assert_eq!(
            "Matches".parse::<ResourceType>(),
            Err(UnknownResourceType("Matches".into()))
        );
        assert!("".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_store_keys_are_unique() {
        let mut keys: Vec<_> = ResourceType::ALL.iter().map(|r| r.store_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), ResourceType::ALL.len());
        assert_eq!(ResourceType::BreakingNews.store_key(), "breaking");
        assert_eq!(ResourceType::BreakingNews.to_string(), "breaking-news");
    }
}
