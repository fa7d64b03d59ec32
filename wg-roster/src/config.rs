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

use std::fs;
use std::path::PathBuf;

use custom_error::custom_error;
use serde::Deserialize;

use crate::store::Layout;

custom_error! {pub ConfigError
    NotFound{path: String} = "config file not found: {path}",
    Parse{source: toml::de::Error} = "invalid config file",
}

#[derive(Deserialize)]
pub struct Config {
    pub paths: Option<Paths>,
    pub gateway: Option<Gateway>,
    pub client: Option<ClientDefaults>,
}

#[derive(Deserialize)]
pub struct Paths {
    /// Hand-maintained config parsed when no snapshot exists yet.
    pub legacy: Option<String>,
    /// Where the rendered config for the daemon goes.
    pub rendered: Option<String>,
    pub snapshot: Option<String>,
    pub client_dir: Option<String>,
}

#[derive(Deserialize)]
pub struct Gateway {
    pub public_ip: Option<String>,
    pub interface: Option<String>,
    /// Set to false to skip `wg syncconf` after changes.
    pub sync: Option<bool>,
}

#[derive(Deserialize)]
pub struct ClientDefaults {
    pub dns: Option<Vec<String>>,
    pub allowed_ips: Option<Vec<String>>,
}

const WG_CONF_PATH: &str = "/etc/wireguard/wg0.conf";
const SNAPSHOT_PATH: &str = "./wg0.toml";

fn get_default_config() -> Config {
    Config {
        paths: Some(Paths {
            legacy: Some(WG_CONF_PATH.to_string()),
            rendered: Some(WG_CONF_PATH.to_string()),
            snapshot: Some(SNAPSHOT_PATH.to_string()),
            client_dir: Some(".".to_string()),
        }),
        gateway: Some(Gateway {
            public_ip: None,
            interface: Some("wg0".to_string()),
            sync: Some(true),
        }),
        client: Some(ClientDefaults {
            dns: Some(Vec::new()),
            allowed_ips: Some(vec!["0.0.0.0/0".to_string(), "::/0".to_string()]),
        }),
    }
}

fn parse_toml(tomlstr: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(tomlstr)?;
    let def = get_default_config();

    let paths = match (cfg.paths, def.paths) {
        (Some(p), Some(d)) => Some(Paths {
            legacy: p.legacy.or(d.legacy),
            rendered: p.rendered.or(d.rendered),
            snapshot: p.snapshot.or(d.snapshot),
            client_dir: p.client_dir.or(d.client_dir),
        }),
        (p, d) => p.or(d),
    };

    let gateway = match (cfg.gateway, def.gateway) {
        (Some(g), Some(d)) => Some(Gateway {
            public_ip: g.public_ip.or(d.public_ip),
            interface: g.interface.or(d.interface),
            sync: g.sync.or(d.sync),
        }),
        (g, d) => g.or(d),
    };

    let client = match (cfg.client, def.client) {
        (Some(c), Some(d)) => Some(ClientDefaults {
            dns: c.dns.or(d.dns),
            allowed_ips: c.allowed_ips.or(d.allowed_ips),
        }),
        (c, d) => c.or(d),
    };

    Ok(Config {
        paths,
        gateway,
        client,
    })
}

pub fn read_config(cfgpath: &str, fail_on_notfound: bool) -> Result<Config, ConfigError> {
    match fs::read_to_string(cfgpath) {
        Ok(x) => parse_toml(&x),
        Err(_) => match fail_on_notfound {
            true => Err(ConfigError::NotFound {
                path: cfgpath.to_string(),
            }),
            false => {
                log::info!("No config at {}, using defaults", cfgpath);
                Ok(get_default_config())
            }
        },
    }
}

impl Config {
    pub fn layout(&self) -> Layout {
        let paths = self.paths.as_ref();
        let pick = |value: Option<&String>, fallback: &str| -> PathBuf {
            value.map(String::as_str).unwrap_or(fallback).into()
        };
        Layout {
            legacy: pick(paths.and_then(|p| p.legacy.as_ref()), WG_CONF_PATH),
            rendered: pick(paths.and_then(|p| p.rendered.as_ref()), WG_CONF_PATH),
            snapshot: pick(paths.and_then(|p| p.snapshot.as_ref()), SNAPSHOT_PATH),
            client_dir: pick(paths.and_then(|p| p.client_dir.as_ref()), "."),
        }
    }

    pub fn public_ip(&self) -> Option<&str> {
        self.gateway.as_ref()?.public_ip.as_deref()
    }

    pub fn interface(&self) -> &str {
        self.gateway
            .as_ref()
            .and_then(|g| g.interface.as_deref())
            .unwrap_or("wg0")
    }

    pub fn sync_enabled(&self) -> bool {
        self.gateway.as_ref().and_then(|g| g.sync).unwrap_or(true)
    }

    pub fn client_dns(&self) -> Vec<String> {
        self.client
            .as_ref()
            .and_then(|c| c.dns.clone())
            .unwrap_or_default()
    }

    pub fn client_allowed_ips(&self) -> Vec<String> {
        self.client
            .as_ref()
            .and_then(|c| c.allowed_ips.clone())
            .unwrap_or_default()
    }
}
