//! Parsers for `/proc/net/{tcp,tcp6,udp,udp6}`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetProto {
    Tcp,
    Udp,
}

/// One row of a `/proc/net/*` socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSocket {
    pub proto: NetProto,
    pub local: SocketAddr,
    pub state: SocketState,
    pub inode: u64,
}

impl NetSocket {
    /// Whether this socket accepts traffic on its local port: a listening
    /// TCP socket or a bound UDP socket.
    pub fn is_bound_listener(&self) -> bool {
        match self.proto {
            NetProto::Tcp => self.state == SocketState::Listen,
            NetProto::Udp => self.local.port() != 0,
        }
    }

    /// `0.0.0.0:80` / `[::]:80` style address.
    pub fn local_display(&self) -> String {
        self.local.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown(u8),
}

impl SocketState {
    fn from_hex(hex: &str) -> Result<Self> {
        let num = u8::from_str_radix(hex, 16).context("Invalid state hex")?;
        Ok(match num {
            1 => SocketState::Established,
            2 => SocketState::SynSent,
            3 => SocketState::SynRecv,
            4 => SocketState::FinWait1,
            5 => SocketState::FinWait2,
            6 => SocketState::TimeWait,
            7 => SocketState::Close,
            8 => SocketState::CloseWait,
            9 => SocketState::LastAck,
            10 => SocketState::Listen,
            11 => SocketState::Closing,
            n => SocketState::Unknown(n),
        })
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::Established => "ESTABLISHED",
            SocketState::SynSent => "SYN_SENT",
            SocketState::SynRecv => "SYN_RECV",
            SocketState::FinWait1 => "FIN_WAIT1",
            SocketState::FinWait2 => "FIN_WAIT2",
            SocketState::TimeWait => "TIME_WAIT",
            SocketState::Close => "CLOSE",
            SocketState::CloseWait => "CLOSE_WAIT",
            SocketState::LastAck => "LAST_ACK",
            SocketState::Listen => "LISTEN",
            SocketState::Closing => "CLOSING",
            SocketState::Unknown(n) => return write!(f, "UNKNOWN({n})"),
        };
        f.write_str(name)
    }
}

/// Kernel-order hex IPv4 (`0100007F` is 127.0.0.1).
pub fn parse_hex_addr_v4(hex: &str) -> Result<Ipv4Addr> {
    let num = u32::from_str_radix(hex, 16).context("Invalid address hex")?;
    Ok(Ipv4Addr::from(num.to_le_bytes()))
}

/// Kernel-order hex IPv6: four little-endian 32-bit words.
pub fn parse_hex_addr_v6(hex: &str) -> Result<Ipv6Addr> {
    if hex.len() != 32 {
        bail!("IPv6 address must be 32 hex chars, got {}", hex.len());
    }

    let mut octets = [0u8; 16];
    for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
        let word = u32::from_str_radix(&hex[i * 8..(i + 1) * 8], 16)
            .context("Invalid IPv6 hex")?;
        chunk.copy_from_slice(&word.to_le_bytes());
    }

    Ok(Ipv6Addr::from(octets))
}

fn parse_endpoint(field: &str) -> Result<SocketAddr> {
    let (addr_hex, port_hex) = field
        .split_once(':')
        .context("Invalid address format")?;
    let ip = match addr_hex.len() {
        8 => IpAddr::V4(parse_hex_addr_v4(addr_hex)?),
        32 => IpAddr::V6(parse_hex_addr_v6(addr_hex)?),
        n => bail!("Invalid address length: {} (expected 8 or 32)", n),
    };
    let port = u16::from_str_radix(port_hex, 16).context("Invalid port hex")?;
    Ok(SocketAddr::new(ip, port))
}

pub fn parse_socket_line(line: &str, proto: NetProto) -> Result<NetSocket> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 10 {
        bail!("Invalid socket line: not enough fields");
    }

    Ok(NetSocket {
        proto,
        local: parse_endpoint(parts[1])?,
        state: SocketState::from_hex(parts[3])?,
        inode: parts[9].parse().context("Invalid inode")?,
    })
}

/// Parse a whole table, skipping the header and malformed rows.
pub fn parse_net_table(content: &str, proto: NetProto) -> Vec<NetSocket> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| parse_socket_line(line, proto).ok())
        .collect()
}
