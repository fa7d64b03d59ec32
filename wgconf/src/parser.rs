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

//! Parser for wg-quick style gateway configuration.
//!
//! Peers are introduced by a `### Client <name>` comment rather than by the
//! `[Peer]` header, so the parser keeps the peer it is currently filling in a
//! pending slot. The slot is flushed when the next client comment shows up and
//! once more at the end of input. Line numbers in errors start at 1.

use std::num::ParseIntError;

use custom_error::custom_error;
use ipnet::IpNet;
use lazy_static::lazy_static;
use regex::Regex;

use crate::key::{Key, KeyError};
use crate::model::{GatewayConfig, Peer};

custom_error! {pub ParseError
    DuplicateSection{line: usize, section: String} = "duplicated {section} section (line {line})",
    UnknownSection{line: usize, section: String} = "unknown section: {section} (line {line})",
    TopLevelPair{line: usize} = "invalid top level key-value pair (line {line})",
    UnknownField{line: usize, section: String, key: String} = "invalid key {key} for {section} section (line {line})",
    OrphanPeer{line: usize} = "peer field before any client comment (line {line})",
    MissingPublicKey{line: usize, client: String} = "client {client} has no PublicKey (line {line})",
    InvalidKey{line: usize, source: KeyError} = "invalid key (line {line})",
    InvalidPort{line: usize, source: ParseIntError} = "invalid listen port (line {line})",
    InvalidCidr{line: usize, source: ipnet::AddrParseError} = "invalid CIDR address (line {line})",
    MissingInterface{line: usize} = "no Interface section found (line {line})",
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::DuplicateSection { line, .. }
            | ParseError::UnknownSection { line, .. }
            | ParseError::TopLevelPair { line }
            | ParseError::UnknownField { line, .. }
            | ParseError::OrphanPeer { line }
            | ParseError::MissingPublicKey { line, .. }
            | ParseError::InvalidKey { line, .. }
            | ParseError::InvalidPort { line, .. }
            | ParseError::InvalidCidr { line, .. }
            | ParseError::MissingInterface { line } => *line,
        }
    }
}

pub const SECTION_INTERFACE: &str = "Interface";
pub const SECTION_PEER: &str = "Peer";

lazy_static! {
    static ref CLIENT_RE: Regex = Regex::new(r"###\s?Client\s+(\w+)").unwrap();
    static ref SECTION_RE: Regex = Regex::new(r"^\s*\[([^\]]*)\]\s*$").unwrap();
    static ref PAIR_RE: Regex = Regex::new(r"^\s*(\w+)\s*=(.*)$").unwrap();
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Empty,
    Interface,
    Peer,
}

struct PendingPeer {
    client: String,
    line: usize,
    public_key: Option<Key>,
    preshared_key: Option<Key>,
    allowed_ips: Vec<IpNet>,
}

impl PendingPeer {
    fn finish(self) -> Result<Peer, ParseError> {
        match self.public_key {
            Some(public_key) => Ok(Peer {
                client: self.client,
                public_key,
                preshared_key: self.preshared_key,
                allowed_ips: self.allowed_ips,
            }),
            None => Err(ParseError::MissingPublicKey {
                line: self.line,
                client: self.client,
            }),
        }
    }
}

struct Parser {
    section: Section,
    cfg: Option<GatewayConfig>,
    pending: Option<PendingPeer>,
    peers: Vec<Peer>,
}

/// Parses the gateway configuration text. The first error aborts the parse.
pub fn parse_config(text: &str) -> Result<GatewayConfig, ParseError> {
    let mut parser = Parser {
        section: Section::Empty,
        cfg: None,
        pending: None,
        peers: Vec::new(),
    };

    let mut line_count = 0;
    for (idx, line) in text.lines().enumerate() {
        line_count = idx + 1;
        parser.feed(line, line_count)?;
    }

    parser.flush()?;
    let mut cfg = parser
        .cfg
        .ok_or(ParseError::MissingInterface { line: line_count })?;
    cfg.peers = parser.peers;
    log::debug!("Parsed gateway config with {} peers", cfg.peers.len());
    Ok(cfg)
}

impl Parser {
    fn feed(&mut self, line: &str, lineno: usize) -> Result<(), ParseError> {
        if line.trim().is_empty() {
            return Ok(());
        }

        if let Some(caps) = CLIENT_RE.captures(line) {
            self.flush()?;
            self.pending = Some(PendingPeer {
                client: caps[1].to_string(),
                line: lineno,
                public_key: None,
                preshared_key: None,
                allowed_ips: Vec::new(),
            });
        } else if let Some(caps) = SECTION_RE.captures(line) {
            let sec = &caps[1];
            self.section = match sec {
                SECTION_INTERFACE => {
                    if self.cfg.is_some() {
                        return Err(ParseError::DuplicateSection {
                            line: lineno,
                            section: sec.to_string(),
                        });
                    }
                    self.cfg = Some(GatewayConfig::default());
                    Section::Interface
                }
                SECTION_PEER => Section::Peer,
                _ => {
                    return Err(ParseError::UnknownSection {
                        line: lineno,
                        section: sec.to_string(),
                    })
                }
            };
        } else if let Some(caps) = PAIR_RE.captures(line) {
            let key = &caps[1];
            let value = caps[2].trim();
            match self.section {
                Section::Empty => return Err(ParseError::TopLevelPair { line: lineno }),
                Section::Interface => self.interface_field(key, value, lineno)?,
                Section::Peer => self.peer_field(key, value, lineno)?,
            }
        }

        // Anything else is a comment or noise
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ParseError> {
        if let Some(pending) = self.pending.take() {
            self.peers.push(pending.finish()?);
        }
        Ok(())
    }

    fn interface_field(&mut self, key: &str, value: &str, line: usize) -> Result<(), ParseError> {
        // An interface section always allocates the config before its fields
        let cfg = match self.cfg.as_mut() {
            Some(cfg) => cfg,
            None => return Err(ParseError::TopLevelPair { line }),
        };

        match key {
            "PrivateKey" => cfg.private_key = Some(decode_key(value, line)?),
            "ListenPort" => {
                let port = value
                    .parse::<u16>()
                    .map_err(|source| ParseError::InvalidPort { line, source })?;
                cfg.listen_port = Some(port);
            }
            "Address" => cfg.address = parse_cidr_list(value, line)?,
            "PostUp" => cfg.post_up = value.to_string(),
            "PostDown" => cfg.post_down = value.to_string(),
            _ => {
                return Err(ParseError::UnknownField {
                    line,
                    section: SECTION_INTERFACE.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    fn peer_field(&mut self, key: &str, value: &str, line: usize) -> Result<(), ParseError> {
        let peer = match self.pending.as_mut() {
            Some(peer) => peer,
            None => return Err(ParseError::OrphanPeer { line }),
        };

        match key {
            "PublicKey" => peer.public_key = Some(decode_key(value, line)?),
            "PresharedKey" => peer.preshared_key = Some(decode_key(value, line)?),
            "AllowedIPs" => peer.allowed_ips = parse_cidr_list(value, line)?,
            _ => {
                return Err(ParseError::UnknownField {
                    line,
                    section: SECTION_PEER.to_string(),
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn decode_key(value: &str, line: usize) -> Result<Key, ParseError> {
    Key::decode(value).map_err(|source| ParseError::InvalidKey { line, source })
}

fn parse_cidr_list(value: &str, line: usize) -> Result<Vec<IpNet>, ParseError> {
    value
        .split(',')
        .map(|seg| {
            seg.trim()
                .parse::<IpNet>()
                .map_err(|source| ParseError::InvalidCidr { line, source })
        })
        .collect()
}
