//! Default [`Renewer`] that posts to the configured renewal endpoint.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	error::RenewalError,
	http::Transport,
	renewal::{RenewalFuture, Renewer},
	request::OutboundRequest,
	session::SessionStore,
};

/// Issues `POST <renewal endpoint>` through the shared [`Transport`].
///
/// The [`SessionStore`] decorates the request and absorbs a 2xx response; any other status
/// or a transport failure fails the renewal.
pub struct HttpRenewer<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	store: Arc<dyn SessionStore>,
	endpoint: Url,
}
impl<T> HttpRenewer<T>
where
	T: ?Sized + Transport,
{
	/// Creates a renewer for `endpoint`.
	pub fn new(transport: Arc<T>, store: Arc<dyn SessionStore>, endpoint: Url) -> Self {
		Self { transport, store, endpoint }
	}
}
impl<T> Renewer for HttpRenewer<T>
where
	T: ?Sized + Transport,
{
	fn renew(&self) -> RenewalFuture {
		let transport = self.transport.clone();
		let store = self.store.clone();
		let endpoint = self.endpoint.clone();

		Box::pin(async move {
			let mut request = OutboundRequest::new(Method::POST, endpoint);

			store.attach_renewal(&mut request)?;

			let response = transport
				.execute(&request)
				.await
				.map_err(|e| RenewalError::Unreachable { message: e.to_string() })?;

			if !response.status.is_success() {
				return Err(RenewalError::Rejected { status: response.status.as_u16() });
			}

			store.absorb_renewal(&response)
		})
	}
}
impl<T> Debug for HttpRenewer<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRenewer").field("endpoint", &self.endpoint.as_str()).finish()
	}
}
