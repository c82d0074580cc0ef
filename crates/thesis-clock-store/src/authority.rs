//! Remote time authority clients.
//!
//! The backend computes its own "current time" to decide which thesis
//! proposals have expired. Whenever the user commits a virtual time (or
//! returns to real time) the clock tells the backend so both sides agree.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible.
//!
//! # HTTP contract
//!
//! | Method | Path | Body | Meaning |
//! |--------|------|------|---------|
//! | `PUT` | `{base}/virtual-clock` | `{"virtual_time": "..."}` | Use this time |
//! | `DELETE` | `{base}/virtual-clock` | -- | Use real time |
//! | `GET` | `{base}/virtual-clock` | -- | `{"current_time": "...", "virtual": bool}` |
//!
//! Timestamps are local wall times formatted `YYYY-MM-DDThh:mm:ss`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thesis_clock_core::config::AuthorityConfig;
use thesis_clock_core::wall::{SystemClock, WallClock};

use crate::error::AuthorityError;

/// Path appended to the configured base URL.
pub const VIRTUAL_CLOCK_PATH: &str = "virtual-clock";

/// The authority's view of the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTime {
    /// Time the backend currently uses as "now".
    pub current_time: NaiveDateTime,
    /// Whether that time is virtual.
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
}

/// Body of the `PUT` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVirtualRequest {
    /// The new virtual time.
    pub virtual_time: NaiveDateTime,
}

/// A remote time authority.
#[derive(Debug)]
pub enum TimeAuthority {
    /// The backend's REST API.
    Http(HttpTimeAuthority),
    /// An in-process stand-in, used when no backend is configured.
    Memory(MemoryAuthority),
}

impl TimeAuthority {
    /// Build the authority described by `config`: HTTP when a base URL is
    /// set, in-memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the base URL is malformed or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &AuthorityConfig) -> Result<Self, AuthorityError> {
        match config.base_url.as_deref() {
            Some(base_url) => Ok(Self::Http(HttpTimeAuthority::new(
                base_url,
                Duration::from_millis(config.timeout_ms),
                config.session_cookie.clone(),
            )?)),
            None => Ok(Self::Memory(MemoryAuthority::new())),
        }
    }

    /// Tell the authority to use `value` as the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the authority cannot be reached or
    /// rejects the request.
    pub async fn set_virtual(&self, value: NaiveDateTime) -> Result<(), AuthorityError> {
        match self {
            Self::Http(http) => http.set_virtual(value).await,
            Self::Memory(memory) => memory.set_virtual(value),
        }
    }

    /// Tell the authority to go back to real time.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the authority cannot be reached or
    /// rejects the request.
    pub async fn set_real(&self) -> Result<(), AuthorityError> {
        match self {
            Self::Http(http) => http.set_real().await,
            Self::Memory(memory) => memory.set_real(),
        }
    }

    /// Ask the authority what time it uses.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] if the authority cannot be reached or
    /// answers with something unexpected.
    pub async fn current(&self) -> Result<RemoteTime, AuthorityError> {
        match self {
            Self::Http(http) => http.current().await,
            Self::Memory(memory) => memory.current(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Memory(_) => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP authority
// ---------------------------------------------------------------------------

/// Client for the backend's virtual clock endpoints.
#[derive(Debug, Clone)]
pub struct HttpTimeAuthority {
    client: reqwest::Client,
    endpoint: String,
    session_cookie: Option<String>,
}

impl HttpTimeAuthority {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Config`] if `base_url` is not an http(s)
    /// URL, or [`AuthorityError::Http`] if the client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session_cookie: Option<String>,
    ) -> Result<Self, AuthorityError> {
        let endpoint = format!("{}/{VIRTUAL_CLOCK_PATH}", base_url.trim_end_matches('/'));
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| AuthorityError::Config(format!("invalid base URL `{base_url}`: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuthorityError::Config(format!(
                "base URL `{base_url}` must use http or https"
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            session_cookie,
        })
    }

    /// Full URL of the virtual clock resource.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn set_virtual(&self, value: NaiveDateTime) -> Result<(), AuthorityError> {
        let request = self
            .with_session(self.client.put(&self.endpoint))
            .json(&SetVirtualRequest {
                virtual_time: value,
            });
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn set_real(&self) -> Result<(), AuthorityError> {
        let request = self.with_session(self.client.delete(&self.endpoint));
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn current(&self) -> Result<RemoteTime, AuthorityError> {
        let request = self.with_session(self.client.get(&self.endpoint));
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        }
    }
}

/// Turn a non-2xx response into [`AuthorityError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AuthorityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned());
    Err(AuthorityError::Status {
        status: status.as_u16(),
        body,
    })
}

// ---------------------------------------------------------------------------
// In-memory authority
// ---------------------------------------------------------------------------

/// A call received by a [`MemoryAuthority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityCall {
    /// `set_virtual(time)`.
    SetVirtual(NaiveDateTime),
    /// `set_real()`.
    SetReal,
}

#[derive(Debug, Default)]
struct MemoryAuthorityState {
    virtual_time: Option<NaiveDateTime>,
    calls: Vec<AuthorityCall>,
    failing: bool,
}

/// In-process authority that remembers what it was told.
///
/// Clones share state, so a test can keep one handle while the clock
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthority {
    state: Arc<Mutex<MemoryAuthorityState>>,
}

impl MemoryAuthority {
    /// Create a healthy authority running on real time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Successful calls received so far, oldest first.
    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.lock().calls.clone()
    }

    /// The virtual time currently held, if any.
    pub fn virtual_time(&self) -> Option<NaiveDateTime> {
        self.lock().virtual_time
    }

    fn set_virtual(&self, value: NaiveDateTime) -> Result<(), AuthorityError> {
        let mut state = self.healthy()?;
        state.virtual_time = Some(value);
        state.calls.push(AuthorityCall::SetVirtual(value));
        Ok(())
    }

    fn set_real(&self) -> Result<(), AuthorityError> {
        let mut state = self.healthy()?;
        state.virtual_time = None;
        state.calls.push(AuthorityCall::SetReal);
        Ok(())
    }

    fn current(&self) -> Result<RemoteTime, AuthorityError> {
        let state = self.healthy()?;
        Ok(state.virtual_time.map_or_else(
            || RemoteTime {
                current_time: SystemClock.now(),
                is_virtual: false,
            },
            |current_time| RemoteTime {
                current_time,
                is_virtual: true,
            },
        ))
    }

    fn healthy(&self) -> Result<std::sync::MutexGuard<'_, MemoryAuthorityState>, AuthorityError> {
        let state = self.lock();
        if state.failing {
            return Err(AuthorityError::Unavailable(
                "in-memory authority set to fail".to_owned(),
            ));
        }
        Ok(state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryAuthorityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
