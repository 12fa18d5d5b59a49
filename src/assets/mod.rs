//! Static asset store
//!
//! Filesystem-backed [`AssetResolver`]: maps request paths to files under a
//! root directory with index-file lookup, `ETag`/`If-None-Match`, single byte
//! ranges and a configurable not-found policy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::header::{ACCEPT, IF_NONE_MATCH, RANGE};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use tokio::fs;

use crate::config::{AssetsConfig, NotFoundHandling};
use crate::dispatch::{AssetError, AssetResolver, IncomingRequest, OutgoingResponse};
use crate::http::range::RangeParseResult;
use crate::http::{self, cache, mime, response};
use crate::logger;

const ALLOW: &str = "GET, HEAD, OPTIONS";
const SEC_FETCH_MODE: &str = "sec-fetch-mode";
const NOT_FOUND_PAGE: &str = "404.html";

/// Serves files from one directory
#[derive(Debug, Clone)]
pub struct StaticAssetStore {
    root: PathBuf,
    index_files: Vec<String>,
    not_found: NotFoundHandling,
    enable_cors: bool,
}

/// Request headers that affect how a file is answered
struct Conditions<'a> {
    if_none_match: Option<&'a str>,
    range: Option<&'a str>,
    is_head: bool,
}

/// Outcome of mapping a request path onto the root
enum Located {
    File(PathBuf),
    /// A directory asked for without its trailing slash
    Directory,
    Missing,
}

impl<'a> Conditions<'a> {
    fn from_request(method: &Method, headers: &'a HeaderMap) -> Self {
        Self {
            if_none_match: headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok()),
            range: headers.get(RANGE).and_then(|v| v.to_str().ok()),
            is_head: method == Method::HEAD,
        }
    }
}

impl StaticAssetStore {
    pub fn new(config: &AssetsConfig, enable_cors: bool) -> Self {
        Self {
            root: PathBuf::from(&config.directory),
            index_files: config.index_files.clone(),
            not_found: config.not_found_handling,
            enable_cors,
        }
    }

    async fn canonical_root(&self) -> Result<PathBuf, AssetError> {
        fs::canonicalize(&self.root)
            .await
            .map_err(|source| AssetError::RootUnavailable {
                root: self.root.clone(),
                source,
            })
    }

    /// Find the file a request path refers to
    async fn locate(&self, root: &Path, request_path: &str) -> Result<Located, AssetError> {
        let Some(relative) = relative_path(request_path) else {
            logger::log_warning(&format!("Rejected asset path: {request_path}"));
            return Ok(Located::Missing);
        };

        let candidate = root.join(relative);
        let is_dir = match fs::metadata(&candidate).await {
            Ok(meta) => meta.is_dir(),
            Err(e) if is_absent(e.kind()) => return Ok(Located::Missing),
            Err(source) => {
                return Err(AssetError::Read {
                    path: candidate,
                    source,
                })
            }
        };

        if is_dir && !request_path.ends_with('/') {
            return Ok(match contained(root, candidate, request_path).await? {
                Some(_) => Located::Directory,
                None => Located::Missing,
            });
        }

        let file = if is_dir {
            match self.find_index(&candidate).await? {
                Some(index) => index,
                None => return Ok(Located::Missing),
            }
        } else {
            candidate
        };

        Ok(match contained(root, file, request_path).await? {
            Some(canonical) => Located::File(canonical),
            None => Located::Missing,
        })
    }

    async fn find_index(&self, dir: &Path) -> Result<Option<PathBuf>, AssetError> {
        for name in &self.index_files {
            if let Some(path) = existing_file(&dir.join(name)).await? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Nearest `404.html`, walking from the requested directory up to the root
    async fn find_not_found_page(
        &self,
        root: &Path,
        request_path: &str,
    ) -> Result<Option<PathBuf>, AssetError> {
        let mut dir = relative_path(request_path)
            .map(|rel| root.join(rel))
            .unwrap_or_else(|| root.to_path_buf());

        loop {
            if dir.starts_with(root) {
                if let Some(page) = existing_file(&dir.join(NOT_FOUND_PAGE)).await? {
                    return Ok(Some(page));
                }
            }
            if dir == root || !dir.pop() {
                return Ok(None);
            }
        }
    }

    async fn not_found(
        &self,
        root: &Path,
        request_path: &str,
        headers: &HeaderMap,
        conditions: &Conditions<'_>,
    ) -> Result<OutgoingResponse, AssetError> {
        match self.not_found {
            NotFoundHandling::None => Ok(http::build_404_response()),
            NotFoundHandling::NotFoundPage => {
                match self.find_not_found_page(root, request_path).await? {
                    Some(page) => {
                        let data = read_file(&page).await?;
                        let etag = cache::generate_etag(&data);
                        Ok(response::build_cached_response(
                            data,
                            StatusCode::NOT_FOUND,
                            mime::content_type_for(&page),
                            &etag,
                            conditions.is_head,
                        ))
                    }
                    None => Ok(http::build_404_response()),
                }
            }
            NotFoundHandling::SinglePageApplication => {
                if !is_navigation(request_path, headers) {
                    return Ok(http::build_404_response());
                }
                match self.find_index(root).await? {
                    Some(index) => {
                        let data = read_file(&index).await?;
                        Ok(build_file_response(data, mime::content_type_for(&index), conditions))
                    }
                    None => Ok(http::build_404_response()),
                }
            }
        }
    }
}

#[async_trait]
impl AssetResolver for StaticAssetStore {
    async fn resolve(&self, request: IncomingRequest) -> Result<OutgoingResponse, AssetError> {
        let method = request.method();
        match *method {
            Method::GET | Method::HEAD => {}
            Method::OPTIONS => return Ok(http::build_options_response(ALLOW, self.enable_cors)),
            _ => return Ok(http::build_405_response(ALLOW)),
        }

        let root = self.canonical_root().await?;
        let conditions = Conditions::from_request(method, request.headers());

        let Ok(path) = urlencoding::decode(request.uri().path()) else {
            return Ok(http::build_404_response());
        };

        match self.locate(&root, &path).await? {
            Located::File(file) => {
                let data = read_file(&file).await?;
                Ok(build_file_response(data, mime::content_type_for(&file), &conditions))
            }
            Located::Directory => Ok(http::build_301_response(&with_trailing_slash(
                request.uri(),
            ))),
            Located::Missing => {
                self.not_found(&root, &path, request.headers(), &conditions)
                    .await
            }
        }
    }
}

/// Relative path below the root, or `None` if the path tries to climb out
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in request_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

const fn is_absent(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::NotFound | ErrorKind::NotADirectory)
}

async fn existing_file(path: &Path) -> Result<Option<PathBuf>, AssetError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(path.to_path_buf())),
        Ok(_) => Ok(None),
        Err(e) if is_absent(e.kind()) => Ok(None),
        Err(source) => Err(AssetError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_file(path: &Path) -> Result<Bytes, AssetError> {
    fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| AssetError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Canonical path of `path` if it stays inside `root`; symlinks may point outside
async fn contained(
    root: &Path,
    path: PathBuf,
    request_path: &str,
) -> Result<Option<PathBuf>, AssetError> {
    let canonical = match fs::canonicalize(&path).await {
        Ok(p) => p,
        Err(e) if is_absent(e.kind()) => return Ok(None),
        Err(source) => return Err(AssetError::Read { path, source }),
    };
    if !canonical.starts_with(root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        ));
        return Ok(None);
    }
    Ok(Some(canonical))
}

/// Same path with a trailing `/`, query kept, still percent-encoded
fn with_trailing_slash(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    }
}

/// A browser page load, as opposed to a script, style or `fetch()` request.
///
/// Paths ending in a file name with an extension are never page loads.
/// Otherwise `Sec-Fetch-Mode` decides when sent; older clients must list
/// `text/html` in `Accept` (a bare `*/*` is what subresource loads send).
fn is_navigation(request_path: &str, headers: &HeaderMap) -> bool {
    let last_segment = request_path
        .rsplit_once('/')
        .map_or(request_path, |(_, last)| last);
    if Path::new(last_segment).extension().is_some() {
        return false;
    }

    if let Some(mode) = headers.get(SEC_FETCH_MODE).and_then(|v| v.to_str().ok()) {
        return mode.eq_ignore_ascii_case("navigate");
    }

    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// 200/206/304/416 for a found file
fn build_file_response(
    data: Bytes,
    content_type: &str,
    conditions: &Conditions<'_>,
) -> OutgoingResponse {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(conditions.if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    let total = data.len();
    match http::parse_range_header(conditions.range, total) {
        RangeParseResult::Satisfiable(range) => response::build_partial_response(
            data.slice(range.start..=range.end),
            content_type,
            &etag,
            range.start,
            range.end,
            total,
            conditions.is_head,
        ),
        RangeParseResult::NotSatisfiable => http::build_416_response(total),
        RangeParseResult::Ignored => response::build_cached_response(
            data,
            StatusCode::OK,
            content_type,
            &etag,
            conditions.is_head,
        ),
    }
}
