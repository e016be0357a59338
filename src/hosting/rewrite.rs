//! Rewriting of relative `href`/`src` attributes for sites served from a raw
//! file host.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::Url;

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(^|\s)(href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex is a valid static pattern")
});

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme regex is a valid static pattern")
});

/// True for references that already point somewhere absolute or stay within
/// the document.
fn is_left_alone(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.starts_with('#')
        || value.starts_with("//")
        || SCHEME_RE.is_match(value)
}

/// `value` as a path relative to the site root. `.` segments are dropped and
/// `..` never climbs above the root. A query or fragment is kept as is.
fn within_root(value: &str) -> String {
    let split = value.find(['?', '#']).unwrap_or(value.len());
    let (path, suffix) = value.split_at(split);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = segments.join("/");
    if path.ends_with('/') && !out.is_empty() {
        out.push('/');
    }
    out.push_str(suffix);
    out
}

/// Resolve every relative `href`/`src` in `html` against `base`.
///
/// `base` should end with `/` so paths resolve inside it. Root-relative
/// values (`/style.css`) also resolve against `base` rather than the host
/// root, because the site's root is the repository directory, and `..`
/// stops at `base`. If `base`
/// itself is not a valid URL, `html` is returned unchanged.
pub fn rewrite_relative_urls(html: &str, base: &str) -> String {
    let Ok(base_url) = Url::parse(base) else {
        tracing::warn!(base, "not rewriting links: invalid base URL");
        return html.to_string();
    };

    ATTR_RE
        .replace_all(html, |caps: &Captures| {
            let lead = &caps[1];
            let attr = &caps[2];
            let (value, quote) = match (caps.get(3), caps.get(4)) {
                (Some(v), _) => (v.as_str(), '"'),
                (None, Some(v)) => (v.as_str(), '\''),
                (None, None) => return caps[0].to_string(),
            };
            if is_left_alone(value) {
                return caps[0].to_string();
            }
            match base_url.join(&within_root(value.trim())) {
                Ok(resolved) => format!("{lead}{attr}={quote}{resolved}{quote}"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}
