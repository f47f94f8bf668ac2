//! Session-aware API transport: single-flight credential renewal, one-shot authentication
//! retries, and incremental decoding of newline-delimited chat event streams.
//!
//! The entry point is [`client::SessionClient`]. It attaches the credential held by a
//! [`session::SessionStore`] to every request, collapses concurrent authentication failures
//! onto one shared renewal through [`renewal::RenewalCoordinator`], and feeds streaming
//! bodies into a [`stream::StreamSession`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod renewal;
pub mod request;
pub mod session;
pub mod stream;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use bytes::Bytes;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
