//! Text helpers used by email rendering and redirects.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Removes HTML tags, decodes the common entities and tidies whitespace.
///
/// Used to derive the plain-text part of an HTML email.
///
/// # Examples
///
/// ```
/// use accounts_core::text::strip_tags;
///
/// assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_tags("Tom &amp; Jerry"), "Tom & Jerry");
/// ```
pub fn strip_tags(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&");

    let trimmed: Vec<&str> = decoded.lines().map(str::trim).collect();
    let joined = trimmed.join("\n");
    BLANK_LINES_RE
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}

/// Returns `true` if `url` is safe to redirect to.
///
/// Relative paths are safe. Absolute URLs must use `http` or `https` and
/// point at one of `allowed_hosts` (with or without a port). Scheme-relative
/// URLs (`//host/...`), backslash variants browsers treat the same way, and
/// URLs containing control characters are checked or rejected accordingly.
///
/// # Examples
///
/// ```
/// use accounts_core::text::is_safe_url;
///
/// let hosts = vec!["example.com".to_string()];
/// assert!(is_safe_url("/accounts/change/profile/", &hosts));
/// assert!(is_safe_url("https://example.com/done/", &hosts));
/// assert!(!is_safe_url("https://evil.com/", &hosts));
/// assert!(!is_safe_url("//evil.com/", &hosts));
/// ```
pub fn is_safe_url(url: &str, allowed_hosts: &[String]) -> bool {
    let url = url.trim();
    if url.is_empty() || url.starts_with("///") || url.chars().any(char::is_control) {
        return false;
    }
    let normalized = url.replace('\\', "/");
    url_is_safe(url, allowed_hosts) && url_is_safe(&normalized, allowed_hosts)
}

fn url_is_safe(url: &str, allowed_hosts: &[String]) -> bool {
    if let Some(rest) = url.strip_prefix("//") {
        return url::Url::parse(&format!("http://{rest}"))
            .is_ok_and(|parsed| host_allowed(&parsed, allowed_hosts));
    }

    match url::Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && host_allowed(&parsed, allowed_hosts)
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

fn host_allowed(parsed: &url::Url, allowed_hosts: &[String]) -> bool {
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let with_port = parsed.port().map(|port| format!("{host}:{port}"));
    allowed_hosts.iter().any(|allowed| {
        allowed.eq_ignore_ascii_case(host)
            || with_port
                .as_deref()
                .is_some_and(|hp| allowed.eq_ignore_ascii_case(hp))
    })
}
