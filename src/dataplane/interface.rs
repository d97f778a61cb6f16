//! Local interface enumeration

use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::ffi::{CStr, CString};
use std::net::Ipv4Addr;
use tracing::debug;

const DEFAULT_MTU: usize = 1500;

/// An IPv4 address assigned to an interface, with its subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl InterfaceAddr {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }

    /// Whether `ip` is on this address's subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = match self.prefix_len {
            0 => 0,
            len => !0u32 << (32 - u32::from(len.min(32))),
        };
        u32::from(ip) & mask == u32::from(self.addr) & mask
    }
}

/// What the resolvers need to know about a local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub index: u32,
    pub mac: MacAddr,
    /// IPv4 addresses in the order the kernel reports them
    pub addrs: Vec<InterfaceAddr>,
    pub mtu: usize,
    pub loopback: bool,
}

impl InterfaceInfo {
    fn new(name: String, loopback: bool) -> Self {
        Self {
            name,
            index: 0,
            mac: MacAddr::ZERO,
            addrs: Vec::new(),
            mtu: DEFAULT_MTU,
            loopback,
        }
    }

    /// Whether `ip` is assigned to this interface
    pub fn owns(&self, ip: Ipv4Addr) -> bool {
        self.addrs.iter().any(|a| a.addr == ip)
    }

    /// Source address for talking to `target` on this link: the address
    /// whose subnet holds `target`, else the first one.
    pub fn source_for(&self, target: Ipv4Addr) -> Option<Ipv4Addr> {
        self.addrs
            .iter()
            .find(|a| a.contains(target))
            .or_else(|| self.addrs.first())
            .map(|a| a.addr)
    }
}

/// List the host's interfaces with their first IPv4 address.
pub fn list() -> Result<Vec<InterfaceInfo>> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    let mut interfaces: Vec<InterfaceInfo> = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        let ifa = unsafe { &*cursor };
        cursor = ifa.ifa_next;

        if ifa.ifa_name.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();
        let loopback = ifa.ifa_flags & libc::IFF_LOOPBACK as libc::c_uint != 0;

        let pos = match interfaces.iter().position(|i| i.name == name) {
            Some(pos) => pos,
            None => {
                interfaces.push(InterfaceInfo::new(name, loopback));
                interfaces.len() - 1
            }
        };
        let entry = &mut interfaces[pos];

        if let Some(addr) = unsafe { sockaddr_ipv4(ifa.ifa_addr) } {
            let prefix_len = unsafe { sockaddr_ipv4(ifa.ifa_netmask) }
                .map(|mask| u32::from(mask).count_ones() as u8)
                .unwrap_or(32);
            entry.addrs.push(InterfaceAddr::new(addr, prefix_len));
        }
    }
    unsafe { libc::freeifaddrs(ifap) };

    for iface in &mut interfaces {
        iface.index = if_index(&iface.name);
        iface.mac = read_mac(&iface.name);
        iface.mtu = read_mtu(&iface.name);
        debug!(
            name = %iface.name,
            index = iface.index,
            mac = %iface.mac,
            addrs = ?iface.addrs,
            loopback = iface.loopback,
            "found interface"
        );
    }

    Ok(interfaces)
}

/// # Safety
/// `sa` must be null or point to a valid `sockaddr`.
unsafe fn sockaddr_ipv4(sa: *const libc::sockaddr) -> Option<Ipv4Addr> {
    if sa.is_null() || unsafe { (*sa).sa_family } != libc::AF_INET as libc::sa_family_t {
        return None;
    }
    let sin = unsafe { &*(sa as *const libc::sockaddr_in) };
    Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)))
}

fn if_index(name: &str) -> u32 {
    match CString::new(name) {
        Ok(name) => unsafe { libc::if_nametoindex(name.as_ptr()) },
        Err(_) => 0,
    }
}

fn read_mac(name: &str) -> MacAddr {
    // Read MAC from /sys/class/net/{name}/address
    let path = format!("/sys/class/net/{}/address", name);
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .unwrap_or(MacAddr::ZERO)
}

fn read_mtu(name: &str) -> usize {
    let path = format!("/sys/class/net/{}/mtu", name);
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse().ok())
        .unwrap_or(DEFAULT_MTU)
}

/// Find an interface by name.
pub fn find<'a>(interfaces: &'a [InterfaceInfo], name: &str) -> Result<&'a InterfaceInfo> {
    interfaces
        .iter()
        .find(|i| i.name == name)
        .ok_or_else(|| Error::InterfaceNotFound {
            name: name.to_string(),
        })
}
