/*
 * SPDX-FileCopyrightText: 2022 Empo Inc.
 *
 * SPDX-License-Identifier: GPL-3.0-or-later
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

//! Address allocation for new clients.
//!
//! There is no counter: the next pair is the roster tail's pair with the last
//! byte of each address bumped by one. Addresses of removed clients are never
//! handed out again while a later client sits at the tail.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use custom_error::custom_error;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::model::GatewayConfig;

custom_error! {pub AllocationError
    Exhausted{last: IpNet} = "no address left after {last}",
    OutsideSubnet{candidate: IpAddr, subnet: IpNet} = "{candidate} is outside {subnet}",
    Malformed{msg: String} = "cannot allocate: {msg}",
}

/// Next address pair from `subnets` (stack A, stack B) following `last`.
pub fn next_pair(subnets: &[IpNet], last: &[IpNet]) -> Result<[IpNet; 2], AllocationError> {
    if subnets.len() < 2 {
        return Err(AllocationError::Malformed {
            msg: format!("interface has {} subnets, need 2", subnets.len()),
        });
    }
    if last.len() < 2 {
        return Err(AllocationError::Malformed {
            msg: format!("last peer has {} allowed IPs, need 2", last.len()),
        });
    }

    Ok([
        next_in(&subnets[0], &last[0])?,
        next_in(&subnets[1], &last[1])?,
    ])
}

/// Allocation for the next client of `cfg`.
///
/// With an empty roster the interface's own addresses are the starting point,
/// narrowed to host routes, so the first client gets the gateway address plus
/// one as a /32 and /128.
pub fn next_for(cfg: &GatewayConfig) -> Result<[IpNet; 2], AllocationError> {
    match cfg.peers.last() {
        Some(peer) => next_pair(&cfg.address, &peer.allowed_ips),
        None => {
            let hosts = cfg
                .address
                .iter()
                .map(host_route)
                .collect::<Result<Vec<_>, _>>()?;
            next_pair(&cfg.address, &hosts)
        }
    }
}

fn host_route(net: &IpNet) -> Result<IpNet, AllocationError> {
    IpNet::new(net.addr(), net.max_prefix_len()).map_err(|e| AllocationError::Malformed {
        msg: e.to_string(),
    })
}

fn next_in(subnet: &IpNet, last: &IpNet) -> Result<IpNet, AllocationError> {
    let next = increment(last).ok_or(AllocationError::Exhausted { last: *last })?;
    if !subnet.contains(&next.addr()) {
        return Err(AllocationError::OutsideSubnet {
            candidate: next.addr(),
            subnet: *subnet,
        });
    }
    Ok(next)
}

// Bumps the least significant byte, keeping the prefix length.
fn increment(net: &IpNet) -> Option<IpNet> {
    match net {
        IpNet::V4(v4) => {
            let mut octets = v4.addr().octets();
            octets[3] = octets[3].checked_add(1)?;
            Ipv4Net::new(Ipv4Addr::from(octets), v4.prefix_len())
                .ok()
                .map(IpNet::V4)
        }
        IpNet::V6(v6) => {
            let mut octets = v6.addr().octets();
            octets[15] = octets[15].checked_add(1)?;
            Ipv6Net::new(Ipv6Addr::from(octets), v6.prefix_len())
                .ok()
                .map(IpNet::V6)
        }
    }
}
