//! DeepWiki URL model
//!
//! Pure structural parsing, no network access.

use crate::config::DEFAULT_DOMAIN;
use url::Url;

/// Path segments a library URL needs: owner/namespace and library name
const MIN_LIBRARY_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlState {
    Valid,
    Invalid(String),
}

/// A parsed reference to a resource on the wiki site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepWikiUrl {
    raw: String,
    parsed: Option<Url>,
    path_parts: Vec<String>,
    state: UrlState,
}

impl DeepWikiUrl {
    pub fn parse(raw: &str) -> Self {
        Self::parse_for_domain(raw, DEFAULT_DOMAIN)
    }

    /// Parse against an explicit site domain (mirrors, local test servers)
    pub fn parse_for_domain(raw: &str, domain: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = match Url::parse(&raw) {
            Ok(u) => u,
            Err(e) => {
                return Self {
                    raw,
                    parsed: None,
                    path_parts: Vec::new(),
                    state: UrlState::Invalid(e.to_string()),
                }
            }
        };

        let path_parts: Vec<String> = parsed
            .path_segments()
            .map(|segs| {
                segs.filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let state = validate(&parsed, &path_parts, domain);

        Self {
            raw,
            parsed: Some(parsed),
            path_parts,
            state,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == UrlState::Valid
    }

    pub fn is_valid_deepwiki(&self) -> bool {
        self.is_valid()
    }

    pub fn state(&self) -> &UrlState {
        &self.state
    }

    /// Reason for rejection, if invalid
    pub fn invalid_reason(&self) -> Option<&str> {
        match &self.state {
            UrlState::Valid => None,
            UrlState::Invalid(reason) => Some(reason),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> Option<&Url> {
        self.parsed.as_ref()
    }

    /// Host without port; empty for malformed input
    pub fn domain(&self) -> &str {
        self.parsed
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or("")
    }

    pub fn path_parts(&self) -> &[String] {
        &self.path_parts
    }

    pub fn owner(&self) -> &str {
        self.path_parts.first().map(String::as_str).unwrap_or("")
    }

    /// Second path segment, or the only one; empty when there is none.
    ///
    /// Best-effort even for invalid URLs. Check [`is_valid`](Self::is_valid)
    /// before using it for file naming.
    pub fn library_name(&self) -> &str {
        match self.path_parts.as_slice() {
            [] => "",
            [only] => only,
            [_, lib, ..] => lib,
        }
    }

    /// `scheme://host[:port]`
    pub fn get_base_url(&self) -> String {
        match &self.parsed {
            Some(u) => {
                let host = u.host_str().unwrap_or("");
                match u.port() {
                    Some(port) => format!("{}://{}:{}", u.scheme(), host, port),
                    None => format!("{}://{}", u.scheme(), host),
                }
            }
            None => String::new(),
        }
    }

    /// Dedupe key: fragment dropped, trailing slash trimmed
    pub fn normalized(&self) -> String {
        match &self.parsed {
            Some(u) => normalize(u),
            None => self.raw.trim_end_matches('/').to_string(),
        }
    }

    /// [`normalized`](Self::normalized) with the query string dropped too
    pub fn normalized_path(&self) -> String {
        match &self.parsed {
            Some(u) => {
                let mut u = u.clone();
                u.set_query(None);
                normalize(&u)
            }
            None => self.normalized(),
        }
    }

    /// Same host and same owner/library prefix
    pub fn is_in_library(&self, other: &DeepWikiUrl) -> bool {
        if self.path_parts.len() < MIN_LIBRARY_DEPTH || other.path_parts.len() < MIN_LIBRARY_DEPTH {
            return false;
        }
        self.domain().eq_ignore_ascii_case(other.domain())
            && self.path_parts[..MIN_LIBRARY_DEPTH] == other.path_parts[..MIN_LIBRARY_DEPTH]
    }

    /// Best-effort title from the last path segment: `2-core-api` -> `2 core api`
    pub fn title_hint(&self) -> String {
        self.path_parts
            .last()
            .map(|seg| seg.replace(['-', '_'], " ").trim().to_string())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for DeepWikiUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn validate(url: &Url, path_parts: &[String], domain: &str) -> UrlState {
    if !matches!(url.scheme(), "http" | "https") {
        return UrlState::Invalid(format!("unsupported scheme '{}'", url.scheme()));
    }
    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return UrlState::Invalid("missing host".to_string()),
    };
    let domain = domain.trim().to_ascii_lowercase();
    if host != domain && !host.ends_with(&format!(".{}", domain)) {
        return UrlState::Invalid(format!("host '{}' is not {}", host, domain));
    }
    if path_parts.len() < MIN_LIBRARY_DEPTH {
        return UrlState::Invalid("expected /<owner>/<library> path".to_string());
    }
    UrlState::Valid
}

pub(crate) fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    url.to_string().trim_end_matches('/').to_string()
}
