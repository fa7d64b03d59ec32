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

use clap::Parser;
use custom_error::custom_error;

use wg_roster::config::{read_config, ConfigError};
use wg_roster::{ClientRoster, Roster, RosterError};
use wgconf::ErrorExt;

#[macro_use]
extern crate lazy_static;

lazy_static! {
    static ref ARGS: Args = Args::parse();
}

#[derive(clap::Parser)]
#[clap(about, version)]
struct Args {
    #[clap(long, short = 'c', value_name = "CONFIG", default_value = "wg-roster.toml")]
    config: String,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Subcommand)]
enum Cmd {
    /// List client names in roster order
    List,
    /// Provision a client and write its config document
    Add { name: String },
    /// Remove a client (exact, case-sensitive name)
    Remove { name: String },
}

custom_error! {RunError
    Config{source: ConfigError} = "failed to read settings",
    Roster{source: RosterError} = "roster operation failed",
}

fn run() -> Result<(), RunError> {
    let settings = read_config(&ARGS.config, false)?;
    let mut roster = Roster::open(&settings)?;

    match &ARGS.cmd {
        Cmd::List => {
            for name in roster.list_clients() {
                println!("{}", name);
            }
        }
        Cmd::Add { name } => {
            let doc = roster.add_client(name)?;
            println!("{}", doc.display());
        }
        Cmd::Remove { name } => match roster.remove_client(name)? {
            true => println!("Removed {}", name),
            false => println!("No client named {}", name),
        },
    }
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e.display_chain("wg-roster failed"));
        std::process::exit(1);
    }
}
