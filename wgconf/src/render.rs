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

//! Renders the gateway config and client hand-out documents.
//!
//! Nothing is validated here. Whatever the model holds is written out.
//! `{{x}}` fields go through [`collapse_line_breaks`] so a value cannot add
//! lines to a line-oriented config; `{{{x}}}` (the scripts) is inserted as is.

use handlebars::{Handlebars, TemplateError};
use lazy_static::lazy_static;
use serde::Serialize;

use crate::model::{GatewayConfig, Peer, PeerHandOut};

pub use handlebars::RenderError;

const GATEWAY: &str = "wg.conf";
const CLIENT: &str = "wg-client.conf";

lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = registry().expect("bad built-in template");
}

fn registry() -> Result<Handlebars<'static>, TemplateError> {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(collapse_line_breaks);
    hb.register_template_string(GATEWAY, include_str!("../templates/wg.conf"))?;
    hb.register_template_string(CLIENT, include_str!("../templates/wg-client.conf"))?;
    Ok(hb)
}

/// Replaces each run of CR/LF characters with a single space.
pub fn collapse_line_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_break = false;
    for c in s.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out
}

// Lists are comma-joined before they reach the templates
fn joined<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Serialize)]
struct GatewayView<'a> {
    address: String,
    listen_port: Option<u16>,
    private_key: Option<String>,
    post_up: &'a str,
    post_down: &'a str,
    peers: Vec<PeerView<'a>>,
}

#[derive(Serialize)]
struct PeerView<'a> {
    client: &'a str,
    public_key: String,
    preshared_key: Option<String>,
    allowed_ips: String,
}

#[derive(Serialize)]
struct ClientView<'a> {
    private_key: String,
    address: String,
    dns: String,
    public_key: String,
    preshared_key: Option<String>,
    endpoint: &'a str,
    allowed_ips: String,
}

impl<'a> From<&'a GatewayConfig> for GatewayView<'a> {
    fn from(cfg: &'a GatewayConfig) -> Self {
        GatewayView {
            address: joined(&cfg.address),
            listen_port: cfg.listen_port,
            private_key: cfg.private_key.map(|k| k.encode()),
            post_up: &cfg.post_up,
            post_down: &cfg.post_down,
            peers: cfg.peers.iter().map(PeerView::from).collect(),
        }
    }
}

impl<'a> From<&'a Peer> for PeerView<'a> {
    fn from(peer: &'a Peer) -> Self {
        PeerView {
            client: &peer.client,
            public_key: peer.public_key.encode(),
            preshared_key: peer.preshared_key.map(|k| k.encode()),
            allowed_ips: joined(&peer.allowed_ips),
        }
    }
}

impl<'a> From<&'a PeerHandOut> for ClientView<'a> {
    fn from(handout: &'a PeerHandOut) -> Self {
        ClientView {
            private_key: handout.private_key.encode(),
            address: joined(&handout.address),
            dns: joined(&handout.dns),
            public_key: handout.public_key.encode(),
            preshared_key: handout.preshared_key.map(|k| k.encode()),
            endpoint: &handout.endpoint,
            allowed_ips: joined(&handout.allowed_ips),
        }
    }
}

/// Text for the daemon's config file.
pub fn render_gateway(cfg: &GatewayConfig) -> Result<String, RenderError> {
    TEMPLATES.render(GATEWAY, &GatewayView::from(cfg))
}

/// Text for a client's own config file.
pub fn render_client(handout: &PeerHandOut) -> Result<String, RenderError> {
    TEMPLATES.render(CLIENT, &ClientView::from(handout))
}
