use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network in CIDR notation, e.g. `192.168.0.0/16`. The address is always stored with
/// its host bits cleared.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    addr: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        ensure!(
            prefix <= 32,
            error::CidrParseSnafu {
                input: format!("{}/{}", addr, prefix),
                reason: "prefix length must be at most 32",
            }
        );
        let bits = u32::from(addr) & mask(prefix);
        Ok(Self {
            addr: Ipv4Addr::from(bits),
            prefix,
        })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns `true` if `other` lies entirely within this network.
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix >= self.prefix
            && u32::from(other.addr) & mask(self.prefix) == u32::from(self.addr)
    }

    /// Splits the network into the smallest power-of-two number of equally sized blocks that is at
    /// least `count`, returned in address order.
    pub fn split(&self, count: usize) -> Result<Vec<Ipv4Cidr>> {
        let count = count.max(1);
        let extra_bits = count.next_power_of_two().trailing_zeros();
        let new_prefix = u32::from(self.prefix) + extra_bits;
        ensure!(
            new_prefix <= 32,
            error::CidrSplitSnafu {
                cidr: self.to_string(),
                count
            }
        );
        let new_prefix = new_prefix as u8;
        let block_size = 1u64 << (32 - u32::from(new_prefix));
        let base = u64::from(u32::from(self.addr));
        (0..(1u64 << extra_bits))
            .map(|i| Ipv4Cidr::new(Ipv4Addr::from((base + i * block_size) as u32), new_prefix))
            .collect()
    }
}

/// The default network of a dedicated VPC, `192.168.0.0/16`.
impl Default for Ipv4Cidr {
    fn default() -> Self {
        Self {
            addr: Ipv4Addr::new(192, 168, 0, 0),
            prefix: 16,
        }
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl FromStr for Ipv4Cidr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.trim().split_once('/').context(error::CidrParseSnafu {
            input: s,
            reason: "expected the form 'a.b.c.d/n'",
        })?;
        let addr = Ipv4Addr::from_str(addr).ok().context(error::CidrParseSnafu {
            input: s,
            reason: "invalid IPv4 address",
        })?;
        let prefix = prefix.parse::<u8>().ok().context(error::CidrParseSnafu {
            input: s,
            reason: "invalid prefix length",
        })?;
        Self::new(addr, prefix)
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_str(&value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::Ipv4Cidr;
    use std::str::FromStr;

    #[test]
    fn parse_and_display() {
        let cidr = Ipv4Cidr::from_str("192.168.0.0/16").unwrap();
        assert_eq!(cidr.prefix(), 16);
        assert_eq!(cidr.to_string(), "192.168.0.0/16");
    }

    #[test]
    fn host_bits_are_cleared() {
        let cidr = Ipv4Cidr::from_str("10.1.2.3/8").unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn invalid_input() {
        assert!(Ipv4Cidr::from_str("192.168.0.0").is_err());
        assert!(Ipv4Cidr::from_str("192.168.0/16").is_err());
        assert!(Ipv4Cidr::from_str("192.168.0.0/33").is_err());
        assert!(Ipv4Cidr::from_str("192.168.0.0/x").is_err());
    }

    #[test]
    fn split_into_eight() {
        let blocks = Ipv4Cidr::from_str("192.168.0.0/16")
            .unwrap()
            .split(8)
            .unwrap();
        let blocks: Vec<String> = blocks.iter().map(ToString::to_string).collect();
        assert_eq!(
            blocks,
            vec![
                "192.168.0.0/19",
                "192.168.32.0/19",
                "192.168.64.0/19",
                "192.168.96.0/19",
                "192.168.128.0/19",
                "192.168.160.0/19",
                "192.168.192.0/19",
                "192.168.224.0/19",
            ]
        );
    }

    #[test]
    fn split_rounds_up_to_power_of_two() {
        let cidr = Ipv4Cidr::from_str("10.0.0.0/16").unwrap();
        let blocks = cidr.split(10).unwrap();
        assert_eq!(blocks.len(), 16);
        assert!(blocks.iter().all(|block| block.prefix() == 20));
        assert!(blocks.iter().all(|block| cidr.contains(block)));
    }

    #[test]
    fn split_too_small() {
        let cidr = Ipv4Cidr::from_str("10.0.0.0/31").unwrap();
        assert!(cidr.split(8).is_err());
    }

    #[test]
    fn serde_as_string() {
        let cidr: Ipv4Cidr = serde_json::from_str(r#""172.16.0.0/12""#).unwrap();
        assert_eq!(serde_json::to_string(&cidr).unwrap(), r#""172.16.0.0/12""#);
    }
}
