//! URL shapes of the CPF REST API
//!
//! - Base URLs are normalized so `/ws` is never doubled: trailing slashes and
//!   an optional trailing `/ws` segment are stripped, and every path joined
//!   onto the base starts with `/ws/`.
//! - Job resource URLs end with a slash; `cancel` and `results/` are appended
//!   directly after it.
//! - The `intermediate` marker is merged into the query string.

use std::sync::OnceLock;

use cpf_protocol::fields;
use regex_lite::Regex;
use url::Url;

fn repeated_slashes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/+").expect("valid pattern"))
}

fn leading_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".+/").expect("valid pattern"))
}

/// Normalized server base URL (never ends with `/` or `/ws`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn new(raw: &str) -> Self {
        let mut url = raw.trim().trim_end_matches('/');
        if let Some(stripped) = url.strip_suffix("/ws") {
            url = stripped.trim_end_matches('/');
        }
        Self(url.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a `/ws/...` path, collapsing repeated slashes in the path.
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, repeated_slashes().replace_all(path, "/"))
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of an application's submission collection, e.g. `/ws/apps/App/single/`.
pub fn app_path(app_name: &str, mode: cpf_protocol::SubmissionMode) -> String {
    format!("/ws/apps/{}/{}/", app_name, mode.as_str())
}

/// Job id: the last path segment of the job URL.
pub fn job_id_from_url(url: &str) -> String {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    leading_path().replace(trimmed, "").into_owned()
}

/// Merge `intermediate=true` into the URL's query string when requested.
///
/// Unparseable URLs are returned unchanged; the request against them will
/// fail in the transport with a proper error.
pub fn add_intermediate(url: &str, intermediate: bool) -> String {
    if !intermediate {
        return url.to_string();
    }

    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != fields::INTERMEDIATE)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.push((fields::INTERMEDIATE.to_string(), "true".to_string()));

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpf_protocol::SubmissionMode;

    #[test]
    fn test_base_url_strips_trailing_ws() {
        assert_eq!(BaseUrl::new("http://localhost:8336/cpf/ws").as_str(), "http://localhost:8336/cpf");
        assert_eq!(BaseUrl::new("http://localhost:8336/cpf/ws/").as_str(), "http://localhost:8336/cpf");
        assert_eq!(BaseUrl::new("http://localhost:8336/cpf///").as_str(), "http://localhost:8336/cpf");
        assert_eq!(BaseUrl::new("http://localhost:8336/cpf").as_str(), "http://localhost:8336/cpf");
    }

    #[test]
    fn test_base_url_keeps_ws_prefixed_segments() {
        assert_eq!(BaseUrl::new("http://host/wsdl").as_str(), "http://host/wsdl");
    }

    #[test]
    fn test_join_reinserts_ws() {
        let base = BaseUrl::new("http://localhost/cpf/ws/");
        assert_eq!(base.join("/ws/apps/"), "http://localhost/cpf/ws/apps/");
        assert_eq!(base.join("/ws//apps///X/single/"), "http://localhost/cpf/ws/apps/X/single/");
    }

    #[test]
    fn test_app_path() {
        assert_eq!(app_path("MapTileByTileId", SubmissionMode::Multiple), "/ws/apps/MapTileByTileId/multiple/");
    }

    #[test]
    fn test_job_id_from_url() {
        assert_eq!(job_id_from_url("http://localhost/cpf/ws/jobs/1234/"), "1234");
        assert_eq!(job_id_from_url("http://localhost/cpf/ws/jobs/1234"), "1234");
        assert_eq!(job_id_from_url("1234"), "1234");
    }

    #[test]
    fn test_add_intermediate_disabled_is_identity() {
        let url = "http://h/ws/jobs/1/results/?a=1";
        assert_eq!(add_intermediate(url, false), url);
    }

    #[test]
    fn test_add_intermediate_merges_query() {
        let url = add_intermediate("http://h/ws/jobs/1/results/?format=json", true);
        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("format".to_string(), "json".to_string()),
                ("intermediate".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_intermediate_replaces_existing_marker() {
        let url = add_intermediate("http://h/ws/jobs/1/results/?intermediate=false", true);
        assert_eq!(url, "http://h/ws/jobs/1/results/?intermediate=true");
    }

    #[test]
    fn test_add_intermediate_without_query() {
        assert_eq!(
            add_intermediate("http://h/ws/jobs/1/results/", true),
            "http://h/ws/jobs/1/results/?intermediate=true"
        );
    }
}
