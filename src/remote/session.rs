use crate::error::{Error, Result};
use crate::remote::auth::{AuthMethod, ConnectionParams, authenticate};
use ssh2::{ErrorCode, HashType, Session};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// libssh2's code for a blocking call that exceeded the session timeout.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// One authenticated SSH session, scoped to a single operation.
///
/// The session is never pooled: it is opened by [`RemoteSession::open`] and
/// disconnected when dropped, on every exit path.
pub struct RemoteSession {
	session: Session,
	host: String,
	method: AuthMethod,
}

impl RemoteSession {
	/// Connect, handshake and authenticate within `params.connect_timeout`.
	///
	/// The host key is not checked against any known-hosts store.
	pub fn open(params: &ConnectionParams) -> Result<Self> {
		let tcp = connect_tcp(params)?;

		let mut session = Session::new().map_err(|source| Error::Ssh {
			context: "session initialization",
			source,
		})?;
		session.set_tcp_stream(tcp);
		session.set_timeout(millis(params.connect_timeout));
		session.handshake().map_err(|source| {
			if is_timeout(&source) {
				timed_out(params)
			} else {
				Error::Ssh {
					context: "handshake",
					source,
				}
			}
		})?;

		if let Some(hash) = session.host_key_hash(HashType::Sha256) {
			tracing::debug!(host = %params.host, fingerprint = %hex_fingerprint(hash), "accepted host key without verification");
		}

		let method = authenticate(&mut session, params)?;
		if !session.authenticated() {
			return Err(Error::AuthenticationFailure {
				host: params.host.clone(),
				user: params.user.clone(),
				reason: "server did not accept the credential".to_string(),
			});
		}
		tracing::debug!(host = %params.host, user = %params.user, ?method, "session authenticated");

		Ok(RemoteSession {
			session,
			host: params.host.clone(),
			method,
		})
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn auth_method(&self) -> &AuthMethod {
		&self.method
	}

	pub(crate) fn handle(&self) -> &Session {
		&self.session
	}

	/// Open an SFTP channel on this session.
	pub fn sftp(&self) -> Result<ssh2::Sftp> {
		self.session.set_blocking(true);
		self.session.sftp().map_err(|source| Error::Ssh {
			context: "sftp subsystem",
			source,
		})
	}
}

impl Drop for RemoteSession {
	fn drop(&mut self) {
		self.session.set_blocking(true);
		if let Err(e) = self.session.disconnect(None, "pcapctl operation complete", None) {
			tracing::warn!(host = %self.host, error = %e, "ignoring session teardown failure");
		}
	}
}

/// Connect to the first resolved address that answers within the timeout.
fn connect_tcp(params: &ConnectionParams) -> Result<TcpStream> {
	let (host, port) = params.host_port();
	let addrs: Vec<SocketAddr> = (host, port)
		.to_socket_addrs()
		.map_err(|source| Error::Connect {
			host: params.host.clone(),
			source,
		})?
		.collect();

	let mut last_error = None;
	for addr in addrs {
		match TcpStream::connect_timeout(&addr, params.connect_timeout) {
			Ok(stream) => return Ok(stream),
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(timed_out(params)),
			Err(e) => last_error = Some(e),
		}
	}

	Err(Error::Connect {
		host: params.host.clone(),
		source: last_error.unwrap_or_else(|| {
			std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses")
		}),
	})
}

fn timed_out(params: &ConnectionParams) -> Error {
	Error::AuthenticationFailure {
		host: params.host.clone(),
		user: params.user.clone(),
		reason: format!(
			"connection not established within {}s",
			params.connect_timeout.as_secs()
		),
	}
}

pub(crate) fn is_timeout(err: &ssh2::Error) -> bool {
	matches!(err.code(), ErrorCode::Session(code) if code == LIBSSH2_ERROR_TIMEOUT)
}

/// Convert a duration to libssh2's millisecond timeout, where 0 means none.
pub(crate) fn millis(duration: Duration) -> u32 {
	u32::try_from(duration.as_millis()).unwrap_or(u32::MAX).max(1)
}

fn hex_fingerprint(hash: &[u8]) -> String {
	hash.iter()
		.map(|b| format!("{b:02x}"))
		.collect::<Vec<_>>()
		.join(":")
}
