//! IPv4 resolution of agent addresses.
//!
//! Agents are reached over IPv4 TCP only and the service is always a
//! numeric port. Resolver failures are reported as distinct
//! [`ResolveError`](crate::error::ResolveError) variants and are never
//! retried here; a temporary failure is left for the caller to retry.

use std::{
    ffi::CString,
    io,
    net::{Ipv4Addr, SocketAddrV4},
};

use crate::error::{CommError, Result};

/// Resolve `host` and the numeric `port` to the first IPv4 TCP endpoint.
///
/// Dotted-quad hosts are parsed directly; anything else goes through the
/// system resolver on a blocking worker thread.
///
/// # Errors
///
/// Returns [`CommError::InvalidArgument`] if `port` is not a decimal port
/// number or `host` contains a NUL byte, and [`CommError::Resolve`] if the
/// resolver fails.
///
/// # Examples
///
/// ```
/// use std::net::{Ipv4Addr, SocketAddrV4};
///
/// use agentwire::resolve::resolve_ipv4;
///
/// # #[tokio::main]
/// # async fn main() -> agentwire::Result<()> {
/// let addr = resolve_ipv4("127.0.0.1", "4000").await?;
/// assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4000));
/// # Ok(())
/// # }
/// ```
pub async fn resolve_ipv4(host: &str, port: &str) -> Result<SocketAddrV4> {
    let port_number = parse_port(port)?;
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port_number));
    }

    let c_host =
        CString::new(host).map_err(|_| CommError::InvalidArgument("host contains NUL byte"))?;
    let c_port =
        CString::new(port).map_err(|_| CommError::InvalidArgument("port contains NUL byte"))?;

    let resolved = tokio::task::spawn_blocking(move || sys::lookup(&c_host, &c_port, port_number))
        .await
        .map_err(|err| CommError::Io(io::Error::other(err)))?;
    Ok(resolved?)
}

fn parse_port(port: &str) -> Result<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommError::InvalidArgument("port must be a decimal number"));
    }
    port.parse()
        .map_err(|_| CommError::InvalidArgument("port is out of range"))
}

#[cfg(unix)]
mod sys {
    use std::{
        ffi::{CStr, c_int},
        io,
        mem,
        net::{Ipv4Addr, SocketAddrV4},
        ptr,
    };

    use crate::error::ResolveError;

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    const EAI_ADDRFAMILY: Option<c_int> = Some(-9);
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    const EAI_ADDRFAMILY: Option<c_int> = Some(1);
    #[cfg(not(any(
        all(target_os = "linux", target_env = "gnu"),
        target_os = "macos",
        target_os = "ios",
    )))]
    const EAI_ADDRFAMILY: Option<c_int> = None;

    #[cfg(target_os = "linux")]
    const EAI_NODATA: Option<c_int> = Some(-5);
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    const EAI_NODATA: Option<c_int> = Some(7);
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
    const EAI_NODATA: Option<c_int> = None;

    pub(super) fn lookup(
        host: &CStr,
        service: &CStr,
        port: u16,
    ) -> Result<SocketAddrV4, ResolveError> {
        // SAFETY: `addrinfo` is a plain C struct for which all-zero is the
        // documented "no hints" value.
        let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
        hints.ai_flags = libc::AI_NUMERICSERV;
        hints.ai_family = libc::AF_INET;
        hints.ai_socktype = libc::SOCK_STREAM;

        let mut res: *mut libc::addrinfo = ptr::null_mut();
        // SAFETY: both strings are NUL-terminated and outlive the call;
        // `hints` is initialised and `res` is a valid out-pointer.
        let rc = unsafe { libc::getaddrinfo(host.as_ptr(), service.as_ptr(), &hints, &mut res) };
        if rc != 0 {
            return Err(classify(rc));
        }

        let ip = first_ipv4(res);
        // SAFETY: `res` came from a successful `getaddrinfo` and is freed once.
        unsafe { libc::freeaddrinfo(res) };
        ip.map(|ip| SocketAddrV4::new(ip, port))
            .ok_or(ResolveError::AddressFamilyUnsupported)
    }

    fn first_ipv4(mut entry: *const libc::addrinfo) -> Option<Ipv4Addr> {
        while !entry.is_null() {
            // SAFETY: entries form a list owned by `getaddrinfo` that stays
            // valid until `freeaddrinfo`.
            let info = unsafe { &*entry };
            if info.ai_family == libc::AF_INET && !info.ai_addr.is_null() {
                // SAFETY: AF_INET entries carry a `sockaddr_in`.
                let sin = unsafe { info.ai_addr.cast::<libc::sockaddr_in>().read_unaligned() };
                return Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            }
            entry = info.ai_next;
        }
        None
    }

    fn classify(code: c_int) -> ResolveError {
        match code {
            libc::EAI_NONAME => ResolveError::HostUnreachable,
            libc::EAI_AGAIN => ResolveError::Temporary,
            libc::EAI_SYSTEM => ResolveError::System(io::Error::last_os_error()),
            code if Some(code) == EAI_ADDRFAMILY => ResolveError::AddressFamilyUnsupported,
            code if Some(code) == EAI_NODATA => ResolveError::NoData,
            code => ResolveError::Failed {
                code,
                message: describe(code),
            },
        }
    }

    fn describe(code: c_int) -> String {
        // SAFETY: `gai_strerror` returns a pointer to a static NUL-terminated
        // string for any code.
        unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
            .to_string_lossy()
            .into_owned()
    }

    #[cfg(test)]
    pub(super) fn classify_for_test(code: c_int) -> ResolveError { classify(code) }
}

#[cfg(not(unix))]
mod sys {
    use std::{
        ffi::CStr,
        net::{SocketAddr, SocketAddrV4, ToSocketAddrs},
    };

    use crate::error::ResolveError;

    pub(super) fn lookup(
        host: &CStr,
        _service: &CStr,
        port: u16,
    ) -> Result<SocketAddrV4, ResolveError> {
        let host = host.to_string_lossy();
        let mut addrs = (host.as_ref(), port)
            .to_socket_addrs()
            .map_err(ResolveError::System)?;
        addrs
            .find_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(v4),
                SocketAddr::V6(_) => None,
            })
            .ok_or(ResolveError::AddressFamilyUnsupported)
    }
}
