// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use billfold::{cli, commands, db, utils};

fn main() -> Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("user", sub)) => match sub.subcommand() {
            Some(("set", s)) => {
                let name = s.get_one::<String>("name").unwrap();
                utils::set_active_user(&conn, name)?;
                println!("Acting user is now '{}'", name);
            }
            _ => println!("Acting user: {}", utils::active_user(&conn)?),
        },
        Some(("category", sub)) => commands::categories::handle(&conn, sub)?,
        Some(("method", sub)) => commands::methods::handle(&conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&mut conn, sub)?,
        Some(("cycle", sub)) => commands::cycles::handle(&conn, sub)?,
        Some(("card", sub)) => commands::cards::handle(&conn, sub)?,
        Some(("installment", sub)) => commands::installments::handle(&mut conn, sub)?,
        Some(("tax", sub)) => commands::taxes::handle(&mut conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
