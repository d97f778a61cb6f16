//! Routing table and route resolution

use super::interface::{self, InterfaceInfo};
use crate::{Error, Result};
use std::net::Ipv4Addr;
use tracing::debug;

const PROC_NET_ROUTE: &str = "/proc/net/route";

/// `rtentry` flags as printed in /proc/net/route
const RTF_UP: u16 = 0x0001;
const RTF_GATEWAY: u16 = 0x0002;
const RTF_REJECT: u16 = 0x0200;

/// Route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination network
    pub destination: Ipv4Addr,
    /// Network prefix length
    pub prefix_len: u8,
    /// Gateway (None for directly connected)
    pub gateway: Option<Ipv4Addr>,
    /// Outgoing interface name
    pub interface: String,
    /// Route metric
    pub metric: u32,
}

impl Route {
    fn matches(&self, addr: Ipv4Addr) -> bool {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - self.prefix_len)
        };
        (u32::from(addr) & mask) == (u32::from(self.destination) & mask)
    }
}

/// Routing table using longest prefix match
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Snapshot the kernel's main routing table.
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string(PROC_NET_ROUTE)?;
        Self::parse_proc(&content)
    }

    /// Parse the contents of /proc/net/route.
    ///
    /// Routes that are down or of reject type are left out.
    pub fn parse_proc(content: &str) -> Result<Self> {
        let mut table = Self::new();

        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < 8 {
                return Err(Error::Parse(format!("malformed route entry: {}", line)));
            }

            let flags = u16::from_str_radix(fields[3], 16)
                .map_err(|_| Error::Parse(format!("bad route flags: {}", fields[3])))?;
            if flags & RTF_UP == 0 || flags & RTF_REJECT != 0 {
                continue;
            }

            let destination = parse_hex_addr(fields[1])?;
            let gateway = parse_hex_addr(fields[2])?;
            let mask = parse_hex_addr(fields[7])?;
            let metric = fields[6]
                .parse()
                .map_err(|_| Error::Parse(format!("bad route metric: {}", fields[6])))?;

            table.add(Route {
                destination,
                prefix_len: u32::from(mask).count_ones() as u8,
                gateway: (flags & RTF_GATEWAY != 0).then_some(gateway),
                interface: fields[0].to_string(),
                metric,
            });
        }

        Ok(table)
    }

    /// Add a route
    pub fn add(&mut self, route: Route) {
        self.routes.push(route);

        // Longest prefix first, lowest metric breaks ties
        self.routes
            .sort_by(|a, b| b.prefix_len.cmp(&a.prefix_len).then(a.metric.cmp(&b.metric)));
    }

    /// Lookup route using longest prefix match
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(addr))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Addresses in /proc/net/route are the raw network-order word printed as
/// a host-order integer.
fn parse_hex_addr(field: &str) -> Result<Ipv4Addr> {
    let raw = u32::from_str_radix(field, 16)
        .map_err(|_| Error::Parse(format!("bad address in route table: {}", field)))?;
    Ok(Ipv4Addr::from(raw.to_ne_bytes()))
}

/// Where a destination is reached from this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Egress interface
    pub interface: InterfaceInfo,
    /// Address to resolve at the link layer: the gateway, or the
    /// destination itself when it is on-link
    pub next_hop: Ipv4Addr,
    /// Interface address on the next hop's subnet (else its first one),
    /// used when the caller did not pick a source
    pub preferred_src: Option<Ipv4Addr>,
}

/// Resolve how `dst` is reached.
///
/// Destinations owned by this host are delivered over loopback, which
/// raw frame injection cannot use.
pub fn resolve(
    table: &RoutingTable,
    interfaces: &[InterfaceInfo],
    dst: Ipv4Addr,
) -> Result<ResolvedRoute> {
    if dst.is_loopback() || interfaces.iter().any(|i| i.owns(dst)) {
        let name = interfaces
            .iter()
            .find(|i| i.loopback)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "lo".to_string());
        return Err(Error::Loopback { name });
    }

    let route = table.lookup(dst).ok_or(Error::NoRoute(dst))?;
    let interface = interface::find(interfaces, &route.interface)?;
    if interface.loopback {
        return Err(Error::Loopback {
            name: interface.name.clone(),
        });
    }

    let next_hop = route.gateway.unwrap_or(dst);
    debug!(
        %dst,
        interface = %interface.name,
        %next_hop,
        prefix = route.prefix_len,
        "resolved route"
    );

    Ok(ResolvedRoute {
        interface: interface.clone(),
        next_hop,
        preferred_src: interface.source_for(next_hop),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::interface::InterfaceAddr;
    use crate::protocol::MacAddr;

    // Captured on a little-endian host
    const PROC_ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t010AA8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t000AA8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
wlan0\t00000000\t0101A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0
docker0\t000011AC\t00000000\t0001\t0\t0\t0\t0000FFFF\t0\t0\t0
eth0\t0000000A\t00000000\t0200\t0\t0\t0\t000000FF\t0\t0\t0
eth1\t0014A8C0\t00000000\t0000\t0\t0\t0\t00FFFFFF\t0\t0\t0
";

    fn interfaces() -> Vec<InterfaceInfo> {
        let iface = |name: &str, addrs: &[(Ipv4Addr, u8)], loopback: bool| InterfaceInfo {
            name: name.to_string(),
            index: 1,
            mac: MacAddr([0x02, 0, 0, 0, 0, 1]),
            addrs: addrs
                .iter()
                .map(|&(addr, prefix_len)| InterfaceAddr::new(addr, prefix_len))
                .collect(),
            mtu: 1500,
            loopback,
        };
        vec![
            iface("lo", &[(Ipv4Addr::LOCALHOST, 8)], true),
            iface(
                "eth0",
                &[
                    (Ipv4Addr::new(192, 168, 10, 20), 24),
                    (Ipv4Addr::new(192, 168, 20, 5), 24),
                ],
                false,
            ),
            iface("wlan0", &[(Ipv4Addr::new(192, 168, 1, 33), 24)], false),
            iface("docker0", &[], false),
        ]
    }

    #[test]
    fn test_parse_proc_route() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();

        // reject route and down route are skipped
        assert_eq!(table.len(), 4);

        let connected = table
            .routes()
            .iter()
            .find(|r| r.prefix_len == 24)
            .unwrap();
        assert_eq!(connected.destination, Ipv4Addr::new(192, 168, 10, 0));
        assert_eq!(connected.gateway, None);
        assert_eq!(connected.interface, "eth0");
        assert_eq!(connected.metric, 100);

        let default = table.lookup(Ipv4Addr::new(8, 8, 8, 8)).unwrap();
        assert_eq!(default.gateway, Some(Ipv4Addr::new(192, 168, 10, 1)));
    }

    #[test]
    fn test_parse_proc_route_malformed() {
        let content = "Iface\tDestination\nfoo\tbar\n";
        assert!(RoutingTable::parse_proc(content).is_err());
    }

    #[test]
    fn test_longest_prefix_match() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();

        let route = table.lookup(Ipv4Addr::new(192, 168, 10, 77)).unwrap();
        assert_eq!(route.prefix_len, 24);

        let route = table.lookup(Ipv4Addr::new(172, 17, 0, 2)).unwrap();
        assert_eq!(route.interface, "docker0");
    }

    #[test]
    fn test_lowest_metric_wins_between_equal_prefixes() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();
        let route = table.lookup(Ipv4Addr::new(1, 1, 1, 1)).unwrap();
        assert_eq!(route.interface, "eth0");
        assert_eq!(route.metric, 100);
    }

    #[test]
    fn test_resolve_via_gateway() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();
        let resolved = resolve(&table, &interfaces(), Ipv4Addr::new(203, 0, 113, 9)).unwrap();

        assert_eq!(resolved.interface.name, "eth0");
        assert_eq!(resolved.next_hop, Ipv4Addr::new(192, 168, 10, 1));
        assert_eq!(resolved.preferred_src, Some(Ipv4Addr::new(192, 168, 10, 20)));
    }

    #[test]
    fn test_resolve_on_link() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();
        let dst = Ipv4Addr::new(192, 168, 10, 5);
        let resolved = resolve(&table, &interfaces(), dst).unwrap();

        assert_eq!(resolved.next_hop, dst);
    }

    #[test]
    fn test_resolve_without_interface_address() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();
        let resolved = resolve(&table, &interfaces(), Ipv4Addr::new(172, 17, 0, 2)).unwrap();

        assert_eq!(resolved.interface.name, "docker0");
        assert_eq!(resolved.preferred_src, None);
    }

    #[test]
    fn test_resolve_loopback_destination() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();

        let err = resolve(&table, &interfaces(), Ipv4Addr::new(127, 0, 0, 1)).unwrap_err();
        assert!(matches!(err, Error::Loopback { ref name } if name == "lo"));

        // Our own address is local delivery as well
        let err = resolve(&table, &interfaces(), Ipv4Addr::new(192, 168, 10, 20)).unwrap_err();
        assert!(matches!(err, Error::Loopback { .. }));
    }

    #[test]
    fn test_resolve_secondary_address_is_local() {
        let table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();

        let err = resolve(&table, &interfaces(), Ipv4Addr::new(192, 168, 20, 5)).unwrap_err();
        assert!(matches!(err, Error::Loopback { .. }));
    }

    #[test]
    fn test_resolve_source_matches_next_hop_subnet() {
        let mut table = RoutingTable::parse_proc(PROC_ROUTE).unwrap();
        table.add(Route {
            destination: Ipv4Addr::new(192, 168, 20, 0),
            prefix_len: 24,
            gateway: None,
            interface: "eth0".to_string(),
            metric: 100,
        });

        let dst = Ipv4Addr::new(192, 168, 20, 9);
        let resolved = resolve(&table, &interfaces(), dst).unwrap();
        assert_eq!(resolved.next_hop, dst);
        assert_eq!(resolved.preferred_src, Some(Ipv4Addr::new(192, 168, 20, 5)));

        // via the default gateway the primary address is used
        let resolved = resolve(&table, &interfaces(), Ipv4Addr::new(203, 0, 113, 9)).unwrap();
        assert_eq!(resolved.preferred_src, Some(Ipv4Addr::new(192, 168, 10, 20)));
    }

    #[test]
    fn test_resolve_loopback_egress() {
        let mut table = RoutingTable::new();
        table.add(Route {
            destination: Ipv4Addr::new(10, 99, 0, 0),
            prefix_len: 16,
            gateway: None,
            interface: "lo".to_string(),
            metric: 0,
        });

        let err = resolve(&table, &interfaces(), Ipv4Addr::new(10, 99, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::Loopback { .. }));
    }

    #[test]
    fn test_resolve_no_route() {
        let table = RoutingTable::new();
        let dst = Ipv4Addr::new(198, 51, 100, 1);
        let err = resolve(&table, &interfaces(), dst).unwrap_err();
        assert!(matches!(err, Error::NoRoute(addr) if addr == dst));
    }

    #[test]
    fn test_resolve_unknown_interface() {
        let mut table = RoutingTable::new();
        table.add(Route {
            destination: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
            gateway: Some(Ipv4Addr::new(10, 0, 0, 1)),
            interface: "tun7".to_string(),
            metric: 0,
        });

        let err = resolve(&table, &interfaces(), Ipv4Addr::new(9, 9, 9, 9)).unwrap_err();
        assert!(matches!(err, Error::InterfaceNotFound { .. }));
    }
}
