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

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Interface section of the gateway plus its peer roster.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Subnets owned by the interface, stack A first.
    #[serde(default)]
    pub address: Vec<IpNet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Key>,
    #[serde(default)]
    pub post_up: String,
    #[serde(default)]
    pub post_down: String,
    /// Externally reachable address handed to clients as the endpoint host.
    #[serde(default)]
    pub server_ip: String,
    #[serde(default)]
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Peer {
    pub client: String,
    pub public_key: Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<Key>,
    #[serde(default)]
    pub allowed_ips: Vec<IpNet>,
}

/// Everything a new client needs to connect. Only exists while a client is
/// being provisioned.
#[derive(Debug, Clone)]
pub struct PeerHandOut {
    pub address: Vec<IpNet>,
    pub endpoint: String,
    pub private_key: Key,
    pub preshared_key: Option<Key>,
    /// The gateway's public key.
    pub public_key: Key,
    pub dns: Vec<String>,
    pub allowed_ips: Vec<String>,
}

impl GatewayConfig {
    /// Derived from the stored private key every time; never cached.
    pub fn public_key(&self) -> Option<Key> {
        self.private_key.as_ref().map(Key::public_key)
    }

    /// `None` until both the server address and the listen port are known.
    pub fn endpoint(&self) -> Option<String> {
        match (self.server_ip.is_empty(), self.listen_port) {
            (false, Some(port)) => Some(format!("{}:{}", self.server_ip, port)),
            _ => None,
        }
    }

    pub fn client_names(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.client.clone()).collect()
    }
}
