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

//! On-disk state: the TOML snapshot, the rendered daemon config and the
//! per-client documents.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use custom_error::custom_error;

use wgconf::render::{render_gateway, RenderError};
use wgconf::{parse_config, GatewayConfig, ParseError};

custom_error! {pub StoreError
    Io{path: String, source: io::Error} = "I/O error on {path}",
    SnapshotRead{source: toml::de::Error} = "snapshot is not valid",
    SnapshotWrite{source: toml::ser::Error} = "failed to serialize snapshot",
    Legacy{source: ParseError} = "legacy config is not valid",
    Render{source: RenderError} = "failed to render gateway config",
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub legacy: PathBuf,
    pub rendered: PathBuf,
    pub snapshot: PathBuf,
    pub client_dir: PathBuf,
}

impl Layout {
    pub fn client_doc(&self, client: &str) -> PathBuf {
        self.client_dir.join(format!("client-{}.conf", client))
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(io_err(path))?;
    file.write_all(contents.as_bytes()).map_err(io_err(path))?;
    file.sync_all().map_err(io_err(path))?;
    Ok(())
}

/// Loads the gateway model.
///
/// The snapshot is preferred. Without one, the legacy config is parsed and
/// both files are written once so the next start skips the parser. A
/// configured public IP replaces whatever the snapshot holds.
pub fn load(layout: &Layout, public_ip: Option<&str>) -> Result<GatewayConfig, StoreError> {
    if layout.snapshot.exists() {
        let text = fs::read_to_string(&layout.snapshot).map_err(io_err(&layout.snapshot))?;
        let mut cfg: GatewayConfig = toml::from_str(&text)?;
        if let Some(ip) = public_ip {
            cfg.server_ip = ip.to_string();
        }
        log::info!(
            "Restored {} peers from {}",
            cfg.peers.len(),
            layout.snapshot.display()
        );
        return Ok(cfg);
    }

    let text = fs::read_to_string(&layout.legacy).map_err(io_err(&layout.legacy))?;
    let mut cfg = parse_config(&text)?;
    cfg.server_ip = public_ip.unwrap_or_default().to_string();
    log::info!(
        "Parsed {} peers from {}",
        cfg.peers.len(),
        layout.legacy.display()
    );

    persist(layout, &cfg)?;
    Ok(cfg)
}

/// Renders the daemon config and overwrites the snapshot.
pub fn persist(layout: &Layout, cfg: &GatewayConfig) -> Result<(), StoreError> {
    write_file(&layout.rendered, &render_gateway(cfg)?)?;
    write_file(&layout.snapshot, &toml::to_string(cfg)?)?;
    log::debug!("Saved gateway state ({} peers)", cfg.peers.len());
    Ok(())
}

pub fn write_client(layout: &Layout, client: &str, text: &str) -> Result<PathBuf, StoreError> {
    let path = layout.client_doc(client);
    write_file(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;

    const LEGACY: &str = "[Interface]
Address = 10.66.66.1/24,fd42:42:42::1/64
ListenPort = 51820
PrivateKey = ADD7fFbGmA0TqivcbwW7RACosgn2ZqK5uDSijvUul2c=

### Client alice
[Peer]
PublicKey = LCBsla9u/BT2i9yYKqCi6yHh2nKvvdgyMPVYCkLh/3Y=
AllowedIPs = 10.66.66.2/32,fd42:42:42::2/128
";

    fn layout(dir: &Path) -> Layout {
        Layout {
            legacy: dir.join("legacy.conf"),
            rendered: dir.join("wg0.conf"),
            snapshot: dir.join("wg0.toml"),
            client_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_load_from_legacy_then_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        fs::write(&layout.legacy, LEGACY).unwrap();

        let cfg = load(&layout, Some("203.0.113.7")).unwrap();
        assert_eq!(cfg.client_names(), vec!["alice"]);
        assert_eq!(cfg.server_ip, "203.0.113.7");
        assert!(layout.snapshot.exists());
        assert!(layout.rendered.exists());

        // The legacy file is not read again once a snapshot exists
        fs::write(&layout.legacy, "garbage").unwrap();
        let again = load(&layout, None).unwrap();
        assert_eq!(again, cfg);
    }

    #[test]
    fn test_public_ip_override() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        fs::write(&layout.legacy, LEGACY).unwrap();

        load(&layout, Some("203.0.113.7")).unwrap();
        let cfg = load(&layout, Some("198.51.100.1")).unwrap();
        assert_eq!(cfg.server_ip, "198.51.100.1");
    }

    #[test]
    fn test_bad_legacy_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());
        fs::write(&layout.legacy, "### Client alice\n").unwrap();

        assert!(matches!(load(&layout, None), Err(StoreError::Legacy { .. })));
        assert!(!layout.snapshot.exists());
    }

    #[test]
    fn test_missing_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());

        assert!(matches!(load(&layout, None), Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_client_doc_path() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout(dir.path());

        let path = write_client(&layout, "alice", "[Interface]\n").unwrap();
        assert_eq!(path, dir.path().join("client-alice.conf"));
        assert_eq!(fs::read_to_string(path).unwrap(), "[Interface]\n");
    }
}
