use crate::config::BindMode;
use crate::error::AppError;
use nix::ifaddrs::getifaddrs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// One address assigned to a local network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub ip: IpAddr,
}

/// Where to listen, and the URLs an operator can use to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTarget {
    pub addr: SocketAddr,
    pub urls: Vec<String>,
}

pub fn resolve(mode: BindMode, port: u16) -> Result<BindTarget, AppError> {
    match mode {
        BindMode::Loopback => select_bind_target(mode, port, &[]),
        BindMode::Intranet | BindMode::AllInterfaces => {
            select_bind_target(mode, port, &interface_addrs()?)
        }
    }
}

/// Lists every inet address of every local interface, in the order the
/// kernel reports them.
pub fn interface_addrs() -> Result<Vec<InterfaceAddr>, AppError> {
    let ifaddrs = getifaddrs().map_err(|e| AppError::NetworkEnumeration {
        message: "Failed to list network interfaces".to_string(),
        source: Some(e),
    })?;

    Ok(ifaddrs
        .filter_map(|ifaddr| {
            let address = ifaddr.address?;
            let ip = if let Some(sin) = address.as_sockaddr_in() {
                IpAddr::V4(*SocketAddrV4::from(*sin).ip())
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                IpAddr::V6(*SocketAddrV6::from(*sin6).ip())
            } else {
                return None;
            };
            Some(InterfaceAddr {
                name: ifaddr.interface_name,
                ip,
            })
        })
        .collect())
}

pub fn select_bind_target(
    mode: BindMode,
    port: u16,
    addrs: &[InterfaceAddr],
) -> Result<BindTarget, AppError> {
    match mode {
        BindMode::Loopback => {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
            Ok(BindTarget {
                addr,
                urls: vec![url_for(addr)],
            })
        }
        BindMode::Intranet => {
            let ip = addrs
                .iter()
                .map(|a| a.ip)
                .find(|ip| ip.is_ipv4() && !ip.is_loopback())
                .ok_or_else(|| AppError::NetworkEnumeration {
                    message: "No non-loopback IPv4 address found".to_string(),
                    source: None,
                })?;
            let addr = SocketAddr::new(ip, port);
            Ok(BindTarget {
                addr,
                urls: vec![url_for(addr)],
            })
        }
        BindMode::AllInterfaces => Ok(BindTarget {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            urls: addrs
                .iter()
                .map(|a| url_for(SocketAddr::new(a.ip, port)))
                .collect(),
        }),
    }
}

fn url_for(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}
