//! 深链解析 - `<prefix>history` / `<prefix>message/:messageId`

use anyhow::{anyhow, Result};
use regex::Regex;

use super::routing::Route;

/// 默认深链前缀
pub const DEFAULT_LINK_PREFIX: &str = "app://";

/// 深链解析器（每个前缀预编译一条规则）
#[derive(Debug, Clone)]
pub struct DeepLinkResolver {
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
}

impl DeepLinkResolver {
    pub fn new<I, S>(prefixes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        if prefixes.is_empty() {
            return Err(anyhow!("at least one deep link prefix is required"));
        }

        let patterns = prefixes
            .iter()
            .map(|prefix| {
                let pattern = format!(
                    r"^{}(?:(?P<history>history)|message/(?P<id>[^/?#]+))/?(?:[?#].*)?$",
                    regex::escape(prefix)
                );
                Regex::new(&pattern).map_err(|e| anyhow!("invalid deep link prefix {}: {}", prefix, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { prefixes, patterns })
    }

    /// 解析 URL，无法识别时返回 `None`
    pub fn resolve(&self, url: &str) -> Option<Route> {
        let url = url.trim();
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(url) {
                if caps.name("history").is_some() {
                    return Some(Route::History);
                }
                if let Some(id) = caps.name("id") {
                    return Some(Route::MessageDetail {
                        message_id: id.as_str().to_string(),
                    });
                }
            }
        }
        None
    }

    /// 生成路由对应的深链（使用第一个前缀）
    pub fn link_for(&self, route: &Route) -> String {
        let prefix = &self.prefixes[0];
        match route {
            Route::History => format!("{}history", prefix),
            Route::MessageDetail { message_id } => format!("{}message/{}", prefix, message_id),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for DeepLinkResolver {
    fn default() -> Self {
        Self::new([DEFAULT_LINK_PREFIX]).expect("default deep link prefix compiles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_history() {
        let resolver = DeepLinkResolver::default();
        assert_eq!(resolver.resolve("app://history"), Some(Route::History));
        assert_eq!(resolver.resolve("app://history/"), Some(Route::History));
    }

    #[test]
    fn test_resolve_message_detail() {
        let resolver = DeepLinkResolver::default();
        assert_eq!(
            resolver.resolve("app://message/abc-123"),
            Some(Route::MessageDetail {
                message_id: "abc-123".to_string()
            })
        );
        assert_eq!(
            resolver.resolve("app://message/abc?utm=push"),
            Some(Route::MessageDetail {
                message_id: "abc".to_string()
            })
        );
    }

    #[test]
    fn test_percent_encoded_id_kept_opaque() {
        let resolver = DeepLinkResolver::default();
        assert_eq!(
            resolver.resolve("app://message/0%3A17"),
            Some(Route::MessageDetail {
                message_id: "0%3A17".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_links_rejected() {
        let resolver = DeepLinkResolver::default();
        assert_eq!(resolver.resolve("app://settings"), None);
        assert_eq!(resolver.resolve("app://message/"), None);
        assert_eq!(resolver.resolve("app://message/a/b"), None);
        assert_eq!(resolver.resolve("other://history"), None);
        assert_eq!(resolver.resolve("https://app://history"), None);
    }

    #[test]
    fn test_multiple_prefixes() {
        let resolver = DeepLinkResolver::new(["hwtask://", "https://example.com/"]).unwrap();
        assert_eq!(resolver.resolve("hwtask://history"), Some(Route::History));
        assert_eq!(
            resolver.resolve("https://example.com/message/m1"),
            Some(Route::MessageDetail {
                message_id: "m1".to_string()
            })
        );
        assert_eq!(
            resolver.link_for(&Route::MessageDetail {
                message_id: "m1".to_string()
            }),
            "hwtask://message/m1"
        );
    }

    #[test]
    fn test_empty_prefix_list_rejected() {
        assert!(DeepLinkResolver::new(Vec::<String>::new()).is_err());
    }
}
