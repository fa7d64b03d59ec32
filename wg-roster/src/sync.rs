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

use std::io;
use std::process::Command;

use custom_error::custom_error;
use shell_escape::escape;

custom_error! {pub SyncError
    Spawn{source: io::Error} = "failed to run sync command",
    Failed{status: String, stderr: String} = "sync command exited with {status}: {stderr}",
}

/// Tells the running VPN daemon to pick up the rendered config.
pub trait Enforcer {
    fn sync(&self) -> Result<(), SyncError>;
}

/// `wg syncconf` fed from `wg-quick strip`, which needs bash for the process
/// substitution.
pub struct WgQuickSync {
    interface: String,
}

impl WgQuickSync {
    pub fn new(interface: &str) -> Self {
        WgQuickSync {
            interface: interface.to_string(),
        }
    }

    pub fn script(&self) -> String {
        let iface = escape(self.interface.as_str().into());
        format!("wg syncconf {0} <(wg-quick strip {0})", iface)
    }
}

impl Enforcer for WgQuickSync {
    fn sync(&self) -> Result<(), SyncError> {
        let output = Command::new("bash").arg("-c").arg(self.script()).output()?;
        if !output.status.success() {
            return Err(SyncError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// For hosts where the daemon is reloaded some other way.
pub struct NoSync;

impl Enforcer for NoSync {
    fn sync(&self) -> Result<(), SyncError> {
        log::debug!("Daemon sync disabled");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_script() {
        assert_eq!(
            WgQuickSync::new("wg0").script(),
            "wg syncconf wg0 <(wg-quick strip wg0)"
        );
    }

    #[test]
    fn test_script_escapes_interface() {
        assert_eq!(
            WgQuickSync::new("wg0; rm -rf /").script(),
            "wg syncconf 'wg0; rm -rf /' <(wg-quick strip 'wg0; rm -rf /')"
        );
    }
}
