use std::{
    io,
    net::{IpAddr, Ipv4Addr},
};

use tracing::warn;

/// Answer given when no LAN address can be found.
pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub loopback: bool,
    pub ip: IpAddr,
}

/// Where interface addresses come from. Lets tests stand in for the host.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> io::Result<Vec<InterfaceAddr>>;
}

pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn interfaces(&self) -> io::Result<Vec<InterfaceAddr>> {
        Ok(if_addrs::get_if_addrs()?
            .into_iter()
            .map(|iface| InterfaceAddr {
                loopback: iface.is_loopback(),
                ip: iface.ip(),
            })
            .collect())
    }
}

/// First IPv4 address that is not on a loopback interface.
pub fn first_lan_ipv4(addrs: &[InterfaceAddr]) -> Option<Ipv4Addr> {
    addrs.iter().find_map(|addr| match addr.ip {
        IpAddr::V4(v4) if !addr.loopback && !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

/// Address players should use to reach this host, or `"localhost"` when
/// there is none. Never fails.
pub fn local_address(source: &dyn InterfaceSource) -> String {
    match source.interfaces() {
        Ok(addrs) => first_lan_ipv4(&addrs)
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| LOCALHOST.to_string()),
        Err(err) => {
            warn!(error = %err, "failed to enumerate network interfaces");
            LOCALHOST.to_string()
        }
    }
}
