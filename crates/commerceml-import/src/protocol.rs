//! Exchange-session protocol with the vendor client
//!
//! Transport-agnostic rendition of the plain-text request/response protocol
//! the exchange client speaks (the HTTP plumbing around it is someone
//! else's problem). One catalog exchange is a fixed mode sequence:
//!
//! ```text
//! checkauth ──► init ──► file* ──► import* ──► complete
//!    │            │        │          │           │
//!  grant       limits   upload     stage to    drain list,
//!  session              (stored    import      launch job
//!  token                outside)   list
//! ```
//!
//! The session token is a signed timestamp: `ts:sha256(secret:ts)`, valid
//! for a configured number of minutes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// Cookie under which the client is told to return the session token.
pub const COOKIE_NAME: &str = "WSE_CML";

// ============================================================================
// Configuration
// ============================================================================

/// Exchange credentials and limits, registered as plugin settings by the
/// host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Master switch; everything is `forbidden` while off.
    pub enabled: bool,
    pub login: String,
    pub password: String,
    /// Secret the session token is signed with.
    pub secret: String,
    /// Upload limit advertised during `init`, in bytes.
    pub max_file_size: u64,
    /// Session token lifetime.
    pub session_ttl_minutes: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            login: "Administrator".to_string(),
            password: String::new(),
            secret: String::new(),
            max_file_size: 100 * 1000 * 1000,
            session_ttl_minutes: 10,
        }
    }
}

// ============================================================================
// Requests & Responses
// ============================================================================

/// How the client authenticated this request.
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    /// `login:password` userinfo.
    UserInfo(&'a str),
    /// Previously granted session token.
    Token(&'a str),
    None,
}

/// One client request: `type` and `mode` query values plus the optional
/// filename some modes carry.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    pub kind: &'a str,
    pub mode: &'a str,
    pub filename: Option<&'a str>,
    pub credentials: Credentials<'a>,
}

/// Reply vocabulary of the exchange protocol. Renders to the exact
/// plain-text bodies the client expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeResponse {
    Success,
    Failed,
    WrongMethod,
    Forbidden,
    /// Three-line checkauth grant: `success`, cookie name, token.
    Grant { token: String },
    /// Init reply advertising transfer limits.
    Limits { file_limit: u64 },
    /// `complete` acknowledged; the drained staging list is the import
    /// job's input.
    Completed { files: Vec<String> },
}

impl fmt::Display for ExchangeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeResponse::Success | ExchangeResponse::Completed { .. } => write!(f, "success"),
            ExchangeResponse::Failed => write!(f, "failed"),
            ExchangeResponse::WrongMethod => write!(f, "wrong method"),
            ExchangeResponse::Forbidden => write!(f, "forbidden"),
            ExchangeResponse::Grant { token } => {
                write!(f, "success\n{COOKIE_NAME}\n{token}")
            }
            ExchangeResponse::Limits { file_limit } => {
                write!(f, "zip=no\nfile_limit={file_limit}")
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Server half of one exchange conversation.
#[derive(Debug, Default)]
pub struct ExchangeSession {
    config: ExchangeConfig,
    /// Filenames staged by `import` mode, `.xml` suffix stripped; drained
    /// by `complete`.
    staged: Vec<String>,
}

impl ExchangeSession {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            staged: Vec::new(),
        }
    }

    /// Filenames staged so far (mostly for tests and diagnostics).
    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Dispatch one request.
    pub fn handle(&mut self, request: ExchangeRequest<'_>) -> ExchangeResponse {
        debug!(kind = request.kind, mode = request.mode, "exchange request");

        if !self.authorized(request.credentials) {
            return ExchangeResponse::Forbidden;
        }

        match (request.kind, request.mode) {
            ("catalog", "checkauth") => ExchangeResponse::Grant {
                token: issue_token(&self.config.secret, Utc::now()),
            },
            ("catalog", "init") => ExchangeResponse::Limits {
                file_limit: self.config.max_file_size,
            },
            ("catalog", "file") => match request.filename {
                Some(_) => ExchangeResponse::Success,
                None => ExchangeResponse::Failed,
            },
            ("catalog", "import") => match request.filename {
                Some(filename) => {
                    let name = filename.trim_end_matches(".xml").to_string();
                    self.staged.push(name);
                    ExchangeResponse::Success
                }
                None => ExchangeResponse::Failed,
            },
            ("catalog", "complete") => {
                if self.staged.is_empty() {
                    ExchangeResponse::Failed
                } else {
                    ExchangeResponse::Completed {
                        files: std::mem::take(&mut self.staged),
                    }
                }
            }
            // The sale exchange is not implemented for this feed type.
            _ => ExchangeResponse::WrongMethod,
        }
    }

    fn authorized(&self, credentials: Credentials<'_>) -> bool {
        if !self.config.enabled {
            return false;
        }
        match credentials {
            Credentials::UserInfo(userinfo) => {
                userinfo == format!("{}:{}", self.config.login, self.config.password)
            }
            Credentials::Token(token) => verify_token(
                &self.config.secret,
                token,
                Utc::now(),
                self.config.session_ttl_minutes,
            ),
            Credentials::None => false,
        }
    }
}

// ============================================================================
// Session Tokens
// ============================================================================

/// Issue a signed-timestamp token.
pub fn issue_token(secret: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.timestamp();
    format!("{timestamp}:{}", signature(secret, timestamp))
}

/// Check signature and age.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>, ttl_minutes: i64) -> bool {
    let Some((timestamp, signed)) = token.split_once(':') else {
        return false;
    };
    let Ok(timestamp) = timestamp.parse::<i64>() else {
        return false;
    };
    if signed != signature(secret, timestamp) {
        return false;
    }
    let age_minutes = (now.timestamp() - timestamp) / 60;
    (0..=ttl_minutes).contains(&age_minutes)
}

fn signature(secret: &str, timestamp: i64) -> String {
    let digest = Sha256::digest(format!("{secret}:{timestamp}").as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

// ============================================================================
// Tests
// ============================================================================
