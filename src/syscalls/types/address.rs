/*!
 * Socket Addresses
 * Family-tagged sockaddr storage shared by bind and connect
 */

use nix::errno::Errno;
use std::mem;
use std::net::SocketAddr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// A socket address in kernel layout, sized for its family
#[derive(Clone, Copy)]
pub struct SocketAddress {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl SocketAddress {
    /// Build an AF_INET or AF_INET6 address
    pub fn inet(addr: SocketAddr) -> Self {
        // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let len = match addr {
            SocketAddr::V4(v4) => {
                // SAFETY: sockaddr_storage is large enough and suitably aligned
                // for every sockaddr_* type.
                let sin = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in) };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(v4.ip().octets()),
                };
                mem::size_of::<libc::sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                // SAFETY: as above.
                let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6) };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr = libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                };
                sin6.sin6_scope_id = v6.scope_id();
                mem::size_of::<libc::sockaddr_in6>()
            }
        };

        Self {
            storage,
            len: len as libc::socklen_t,
        }
    }

    /// Build an AF_UNIX address bound to a filesystem path
    ///
    /// Fails with `ENAMETOOLONG` when the path (plus its NUL) does not fit
    /// in `sun_path`, and with `EINVAL` for an empty path or interior NUL.
    pub fn unix(path: impl AsRef<Path>) -> Result<Self, Errno> {
        let bytes = path.as_ref().as_os_str().as_bytes();
        if bytes.is_empty() || bytes.contains(&0) {
            return Err(Errno::EINVAL);
        }

        // SAFETY: all-zero is a valid sockaddr_storage.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        // SAFETY: sockaddr_storage covers sockaddr_un.
        let sun = unsafe { &mut *(&mut storage as *mut _ as *mut libc::sockaddr_un) };
        if bytes.len() >= sun.sun_path.len() {
            return Err(Errno::ENAMETOOLONG);
        }

        sun.sun_family = libc::AF_UNIX as libc::sa_family_t;
        for (dst, src) in sun.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }

        let len = mem::offset_of!(libc::sockaddr_un, sun_path) + bytes.len() + 1;
        Ok(Self {
            storage,
            len: len as libc::socklen_t,
        })
    }

    /// Wrap caller-provided storage without interpreting it
    ///
    /// Use [`SocketAddress::validate`] before handing it to the kernel.
    pub fn from_raw(storage: libc::sockaddr_storage, len: libc::socklen_t) -> Self {
        Self { storage, len }
    }

    /// Address family (`AF_INET`, `AF_INET6`, `AF_UNIX`, ...)
    #[inline]
    pub fn family(&self) -> libc::c_int {
        libc::c_int::from(self.storage.ss_family)
    }

    #[inline]
    pub fn len(&self) -> libc::socklen_t {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const _ as *const libc::sockaddr
    }

    /// Check that the length is consistent with the family
    pub fn validate(&self) -> Result<(), Errno> {
        let len = self.len as usize;
        let consistent = match self.family() {
            libc::AF_INET => len == mem::size_of::<libc::sockaddr_in>(),
            libc::AF_INET6 => len == mem::size_of::<libc::sockaddr_in6>(),
            libc::AF_UNIX => {
                len > mem::offset_of!(libc::sockaddr_un, sun_path)
                    && len <= mem::size_of::<libc::sockaddr_un>()
            }
            _ => return Err(Errno::EAFNOSUPPORT),
        };

        if consistent {
            Ok(())
        } else {
            Err(Errno::EINVAL)
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::inet(addr)
    }
}

impl std::fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketAddress")
            .field("family", &self.family())
            .field("len", &self.len)
            .finish()
    }
}
