//! Request path resolution.
//!
//! A request path has the shape
//!
//! ```text
//! [rewrite root | script name]/{group-prefix}/{group-key}{/sub/path...}/{transform-filename}
//! ```
//!
//! When the path contains `.php` the request went through a front script and
//! the script name is stripped; otherwise rewriting is on and the script's
//! directory is stripped. Every derived component is computed lazily and
//! cached for the lifetime of the request.

use std::cell::OnceCell;

use url::Url;

use crate::error::ThumbError;

/// Marker identifying a front-controller script in a path.
const SCRIPT_MARKER: &str = ".php";

// =============================================================================
// Request Context
// =============================================================================

/// The parts of an incoming request the path resolver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub scheme: String,
    pub host: String,
    /// Explicit port; `None` when the scheme's default port is used
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    /// Server-reported script name (e.g. `/index.php`)
    pub script_name: Option<String>,
}

impl RequestContext {
    /// Parse an absolute request URL.
    pub fn from_url(raw: &str, script_name: Option<&str>) -> Result<Self, ThumbError> {
        let url = Url::parse(raw)
            .map_err(|e| ThumbError::InvalidRequest(format!("invalid URL '{}': {}", raw, e)))?;

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port(),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            script_name: script_name.filter(|s| !s.is_empty()).map(str::to_string),
        })
    }

    /// Build a context from the pieces of an HTTP request.
    ///
    /// `authority` is the `Host` header value, `path_and_query` the request
    /// target.
    pub fn from_parts(
        scheme: &str,
        authority: &str,
        path_and_query: &str,
        script_name: Option<&str>,
    ) -> Result<Self, ThumbError> {
        if authority.is_empty() {
            return Err(ThumbError::InvalidRequest("missing Host header".to_string()));
        }
        Self::from_url(
            &format!("{}://{}{}", scheme, authority, path_and_query),
            script_name,
        )
    }

    /// The request reassembled as an absolute URL.
    pub fn url(&self) -> String {
        let mut url = format!("{}://{}", self.scheme, self.host);
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        url.push_str(&self.path);
        if let Some(query) = &self.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

// =============================================================================
// Route Path
// =============================================================================

/// Lazily derived view of a request path.
#[derive(Debug)]
pub struct RoutePath {
    ctx: RequestContext,
    rewrite_enabled: OnceCell<bool>,
    script_name: OnceCell<String>,
    rewrite_root: OnceCell<String>,
    image_path: OnceCell<String>,
}

impl RoutePath {
    pub fn new(ctx: RequestContext) -> Self {
        Self {
            ctx,
            rewrite_enabled: OnceCell::new(),
            script_name: OnceCell::new(),
            rewrite_root: OnceCell::new(),
            image_path: OnceCell::new(),
        }
    }

    /// Rewriting is on when the path does not name a script.
    pub fn rewrite_enabled(&self) -> bool {
        *self
            .rewrite_enabled
            .get_or_init(|| !self.ctx.path.contains(SCRIPT_MARKER))
    }

    /// The script prefix present in the request, or empty.
    pub fn script_name(&self) -> &str {
        self.script_name.get_or_init(|| {
            let Some(script) = self.ctx.script_name.as_deref() else {
                return String::new();
            };
            if !script.contains(SCRIPT_MARKER) {
                return String::new();
            }

            if script.ends_with(SCRIPT_MARKER) {
                // Some proxies report the absolute filesystem path of the
                // script; it only counts if its directory is in the request.
                let mut parts: Vec<&str> = script.split('/').collect();
                parts.pop();
                let directory = parts.join("/");
                let directory = directory.trim_start_matches('/');
                if !directory.is_empty() && !self.ctx.url().contains(directory) {
                    return String::new();
                }
                return script.to_string();
            }

            let mut kept = Vec::new();
            for part in script.split('/') {
                kept.push(part);
                if part.contains(SCRIPT_MARKER) {
                    break;
                }
            }
            kept.join("/")
        })
    }

    /// Prefix stripped from the request path before segment parsing.
    pub fn rewrite_root(&self) -> &str {
        self.rewrite_root.get_or_init(|| {
            let script = self.script_name();
            if script.is_empty() {
                return String::new();
            }
            if !self.rewrite_enabled() {
                return script.to_string();
            }
            match script.rsplit_once('/') {
                Some((directory, _)) => directory.to_string(),
                None => String::new(),
            }
        })
    }

    /// Request path with the rewrite root or script name removed.
    pub fn image_path(&self) -> &str {
        self.image_path.get_or_init(|| {
            let path = self.ctx.path.as_str();
            let root = self.rewrite_root();
            if root.is_empty() {
                return path.to_string();
            }
            match path.strip_prefix(root) {
                Some(rest) => rest.to_string(),
                None => path.replacen(root, "", 1),
            }
        })
    }

    fn segments(&self) -> Vec<&str> {
        self.image_path().trim_start_matches('/').split('/').collect()
    }

    /// First path segment (e.g. `thumb`), or empty with fewer than two segments.
    pub fn group_prefix(&self) -> &str {
        let segments = self.segments();
        if segments.len() < 2 {
            return "";
        }
        segments[0]
    }

    /// Second path segment, or empty with fewer than three segments.
    pub fn group_key(&self) -> &str {
        let segments = self.segments();
        if segments.len() < 3 {
            return "";
        }
        segments[1]
    }

    /// Directories between the group key and the filename, with a leading `/`.
    pub fn source_sub_path(&self) -> String {
        let segments = self.segments();
        if segments.len() < 4 {
            return String::new();
        }
        format!("/{}", segments[2..segments.len() - 1].join("/"))
    }

    /// Last path segment if it carries a non-empty extension, else empty.
    pub fn transform_filename(&self) -> &str {
        let last = self.image_path().rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => last,
            _ => "",
        }
    }

    /// Source image filename: the transform filename with its tokens removed.
    pub fn source_filename(&self) -> String {
        let name = self.transform_filename();
        let Some((main, ext)) = name.rsplit_once('.') else {
            return String::new();
        };
        let base = main.split(',').next().unwrap_or_default();
        if base.is_empty() {
            return String::new();
        }
        format!("{}.{}", base, ext)
    }

    /// Rebuild the request URL with a different transform filename.
    ///
    /// Returns an empty string when the request carried no host.
    pub fn to_url(&self, filename: &str) -> String {
        if self.ctx.host.is_empty() {
            return String::new();
        }

        let mut url = format!("{}://{}", self.ctx.scheme, self.ctx.host);
        if let Some(port) = self.ctx.port {
            url.push_str(&format!(":{}", port));
        }
        url.push_str(self.rewrite_root());

        let prefix = self.group_prefix();
        if !prefix.is_empty() {
            url.push('/');
            url.push_str(prefix);
        }
        let key = self.group_key();
        if !key.is_empty() {
            url.push('/');
            url.push_str(key);
        }
        url.push_str(&self.source_sub_path());
        if !filename.is_empty() {
            url.push('/');
            url.push_str(filename);
        }
        if let Some(query) = &self.ctx.query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

// =============================================================================
// Tests
// =============================================================================
