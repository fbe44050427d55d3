//! Request dispatch.
//!
//! Maps a parsed request onto one of the synthesized pages, a login or
//! registration query against the user store, or a file under the document
//! root.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use bytes::Bytes;
use serde::Deserialize;

use crate::http::mapped::MappedFile;
use crate::http::pages;
use crate::http::request::{Method, Request};
use crate::http::response::StatusCode;
use crate::store::{StoreError, StorePool};

const WORLD_READABLE: u32 = 0o004;

/// Result of resolving a request.
#[derive(Debug)]
pub enum Outcome {
    /// A non-empty file, mapped and ready to be sent as segment 1.
    File(MappedFile),
    /// A body generated in-process.
    Page(StatusCode, Bytes),
    BadRequest,
    NoResource,
    Forbidden,
    InternalError,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::File(_) => StatusCode::Ok,
            Outcome::Page(status, _) => *status,
            Outcome::BadRequest => StatusCode::BadRequest,
            Outcome::NoResource => StatusCode::NotFound,
            Outcome::Forbidden => StatusCode::Forbidden,
            Outcome::InternalError => StatusCode::InternalServerError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Register,
    Login,
    Alias(&'static str),
}

fn route(path: &str) -> Option<Route> {
    match path {
        "/register" => Some(Route::Register),
        "/login" => Some(Route::Login),
        "/picture" => Some(Route::Alias("/picture.html")),
        "/video" => Some(Route::Alias("/video.html")),
        "/fans" => Some(Route::Alias("/fans.html")),
        _ => None,
    }
}

/// Form body of a login or registration POST.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Credentials {
    user: String,
    password: String,
}

pub struct Router {
    doc_root: PathBuf,
    store: Arc<StorePool>,
}

impl Router {
    /// `doc_root` must exist; it is canonicalized once here so containment
    /// checks compare canonical paths.
    pub fn new(doc_root: impl AsRef<Path>, store: Arc<StorePool>) -> anyhow::Result<Self> {
        let doc_root = doc_root.as_ref();
        let doc_root = doc_root
            .canonicalize()
            .with_context(|| format!("document root {} is not accessible", doc_root.display()))?;

        Ok(Self { doc_root, store })
    }

    pub fn doc_root(&self) -> &Path {
        &self.doc_root
    }

    pub fn dispatch(&self, req: &Request) -> Outcome {
        let outcome = match route(&req.url) {
            Some(Route::Register) if req.method == Method::POST => self.register(&req.body),
            Some(Route::Login) if req.method == Method::POST => self.login(&req.body),
            Some(Route::Register) => Outcome::Page(StatusCode::Ok, pages::REGISTER_FORM),
            Some(Route::Login) => Outcome::Page(StatusCode::Ok, pages::LOGIN_FORM),
            Some(Route::Alias(path)) => self.resolve_file(path),
            None => self.resolve_file(&req.url),
        };

        tracing::debug!(
            method = req.method.as_str(),
            url = %req.url,
            status = outcome.status().as_u16(),
            "dispatched request"
        );
        outcome
    }

    fn register(&self, body: &[u8]) -> Outcome {
        let Some(creds) = decode_credentials(body) else {
            return Outcome::InternalError;
        };

        let mut conn = self.store.acquire();
        match conn.find_password(&creds.user) {
            Ok(Some(_)) => return Outcome::Page(StatusCode::Ok, pages::REGISTER_ERROR),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "user lookup failed");
                return Outcome::InternalError;
            }
        }

        match conn.insert_user(&creds.user, &creds.password) {
            Ok(()) => Outcome::Page(StatusCode::Ok, pages::LOGIN_FORM),
            Err(StoreError::Duplicate(_)) => Outcome::Page(StatusCode::Ok, pages::REGISTER_ERROR),
            Err(e) => {
                tracing::error!(error = %e, "user insert failed");
                Outcome::InternalError
            }
        }
    }

    fn login(&self, body: &[u8]) -> Outcome {
        let Some(creds) = decode_credentials(body) else {
            return Outcome::InternalError;
        };

        let mut conn = self.store.acquire();
        match conn.find_password(&creds.user) {
            Ok(Some(password)) if password == creds.password => {
                Outcome::Page(StatusCode::Ok, pages::WELCOME)
            }
            Ok(_) => Outcome::Page(StatusCode::Ok, pages::LOGIN_ERROR),
            Err(e) => {
                tracing::error!(error = %e, "user lookup failed");
                Outcome::InternalError
            }
        }
    }

    /// Resolves `url` beneath the document root and maps it.
    pub fn resolve_file(&self, url: &str) -> Outcome {
        let path = self.doc_root.join(url.trim_start_matches('/'));

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if is_missing(&e) => return Outcome::NoResource,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "stat failed");
                return Outcome::InternalError;
            }
        };

        if meta.permissions().mode() & WORLD_READABLE == 0 || meta.is_dir() {
            return Outcome::Forbidden;
        }

        let real = match path.canonicalize() {
            Ok(real) if real.starts_with(&self.doc_root) => real,
            Ok(real) => {
                tracing::warn!(path = %real.display(), "resolved outside document root");
                return Outcome::Forbidden;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "canonicalize failed");
                return Outcome::InternalError;
            }
        };

        if meta.len() == 0 {
            return Outcome::Page(StatusCode::Ok, pages::EMPTY_FILE);
        }

        match MappedFile::open(&real) {
            Ok(file) => Outcome::File(file),
            Err(e) => {
                tracing::error!(path = %real.display(), error = %e, "mmap failed");
                Outcome::InternalError
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("doc_root", &self.doc_root)
            .field("store", &self.store)
            .finish()
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn decode_credentials(body: &[u8]) -> Option<Credentials> {
    match serde_urlencoded::from_bytes::<Credentials>(body) {
        Ok(creds) => Some(creds),
        Err(e) => {
            tracing::error!(error = %e, "undecodable form body");
            None
        }
    }
}
