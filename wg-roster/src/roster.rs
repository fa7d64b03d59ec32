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

//! Client provisioning on top of the gateway model.
//!
//! Calls must not overlap: two adds racing on the same roster tail would
//! hand out the same addresses. Taking `&mut self` keeps that honest for
//! in-process callers.

use std::path::PathBuf;

use custom_error::custom_error;
use lazy_static::lazy_static;
use regex::Regex;

use wgconf::alloc::{self, AllocationError};
use wgconf::render::{render_client, RenderError};
use wgconf::{ErrorExt, GatewayConfig, Key, KeyError, Peer, PeerHandOut};

use crate::config::Config;
use crate::store::{self, Layout, StoreError};
use crate::sync::{Enforcer, NoSync, WgQuickSync};

custom_error! {pub RosterError
    InvalidName{name: String} = "invalid client name: '{name}'",
    ClientExists{name: String} = "client exists: {name}",
    MissingField{field: String} = "gateway config has no {field}",
    Allocation{source: AllocationError} = "address allocation failed",
    Key{source: KeyError} = "key generation failed",
    Store{source: StoreError} = "failed to save gateway state",
    Render{source: RenderError} = "failed to render client config",
}

lazy_static! {
    // Must survive the `### Client <name>` comment on the next parse
    static ref NAME_RE: Regex = Regex::new(r"^\w+$").unwrap();
}

/// What a front-end may do with the roster.
pub trait ClientRoster {
    fn list_clients(&self) -> Vec<String>;
    /// Returns the path of the client's config document.
    fn add_client(&mut self, name: &str) -> Result<PathBuf, RosterError>;
    /// Returns whether a client was removed. Matching is case-sensitive.
    fn remove_client(&mut self, name: &str) -> Result<bool, RosterError>;
}

pub struct ClientSettings {
    pub dns: Vec<String>,
    pub allowed_ips: Vec<String>,
}

pub struct Roster {
    cfg: GatewayConfig,
    layout: Layout,
    client: ClientSettings,
    enforcer: Box<dyn Enforcer>,
}

impl Roster {
    pub fn new(
        cfg: GatewayConfig,
        layout: Layout,
        client: ClientSettings,
        enforcer: Box<dyn Enforcer>,
    ) -> Self {
        Roster {
            cfg,
            layout,
            client,
            enforcer,
        }
    }

    /// Loads the gateway state described by the settings file.
    pub fn open(settings: &Config) -> Result<Self, RosterError> {
        let layout = settings.layout();
        let cfg = store::load(&layout, settings.public_ip())?;
        let enforcer: Box<dyn Enforcer> = match settings.sync_enabled() {
            true => Box::new(WgQuickSync::new(settings.interface())),
            false => Box::new(NoSync),
        };
        let client = ClientSettings {
            dns: settings.client_dns(),
            allowed_ips: settings.client_allowed_ips(),
        };
        Ok(Roster::new(cfg, layout, client, enforcer))
    }

    pub fn gateway(&self) -> &GatewayConfig {
        &self.cfg
    }

    fn commit(&self) -> Result<(), RosterError> {
        store::persist(&self.layout, &self.cfg)?;
        if let Err(e) = self.enforcer.sync() {
            log::warn!("{}", e.display_chain("Failed to sync daemon"));
        }
        Ok(())
    }
}

impl ClientRoster for Roster {
    fn list_clients(&self) -> Vec<String> {
        self.cfg.client_names()
    }

    fn add_client(&mut self, name: &str) -> Result<PathBuf, RosterError> {
        let name = name.trim().to_lowercase();
        if !NAME_RE.is_match(&name) {
            return Err(RosterError::InvalidName { name });
        }
        if self.cfg.peers.iter().any(|p| p.client == name) {
            return Err(RosterError::ClientExists { name });
        }

        let ips = alloc::next_for(&self.cfg)?;
        let private_key = Key::generate_private()?;
        let preshared_key = Key::generate()?;

        let server_key = self.cfg.public_key().ok_or(RosterError::MissingField {
            field: "PrivateKey".to_string(),
        })?;
        let endpoint = self.cfg.endpoint().ok_or(RosterError::MissingField {
            field: "endpoint (public IP and ListenPort)".to_string(),
        })?;

        let handout = PeerHandOut {
            address: ips.to_vec(),
            endpoint,
            private_key,
            preshared_key: Some(preshared_key),
            public_key: server_key,
            dns: self.client.dns.clone(),
            allowed_ips: self.client.allowed_ips.clone(),
        };
        let doc = store::write_client(&self.layout, &name, &render_client(&handout)?)?;

        self.cfg.peers.push(Peer {
            client: name.clone(),
            public_key: private_key.public_key(),
            preshared_key: Some(preshared_key),
            allowed_ips: ips.to_vec(),
        });
        log::info!("Added client {} at {}, {}", name, ips[0], ips[1]);

        // Memory stays ahead of disk if this fails
        self.commit()?;
        Ok(doc)
    }

    fn remove_client(&mut self, name: &str) -> Result<bool, RosterError> {
        let removed = match self.cfg.peers.iter().position(|p| p.client == name) {
            Some(idx) => {
                self.cfg.peers.remove(idx);
                log::info!("Removed client {}", name);
                true
            }
            None => {
                log::info!("No client named {}", name);
                false
            }
        };

        self.commit()?;
        Ok(removed)
    }
}
