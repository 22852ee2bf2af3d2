// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print JSON lines"),
    )
}

pub fn build_cli() -> Command {
    Command::new("billfold")
        .about("Personal ledger with billing cycles, card statements, and installments")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("user")
                .about("Acting user")
                .subcommand(
                    Command::new("set")
                        .about("Set the acting user")
                        .arg(Arg::new("name").required(true)),
                )
                .subcommand(Command::new("show").about("Show the acting user")),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add").arg(Arg::new("name").required(true)),
                )
                .subcommand(Command::new("list"))
                .subcommand(Command::new("rm").arg(Arg::new("name").required(true))),
        )
        .subcommand(
            Command::new("method")
                .about("Manage payment methods")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .required(true)
                                .help("credit_card, debit_card, cash, ..."),
                        )
                        .arg(
                            Arg::new("closing-day")
                                .long("closing-day")
                                .value_parser(value_parser!(u32))
                                .help("Statement closing day (1-31, credit cards)"),
                        ),
                )
                .subcommand(Command::new("list"))
                .subcommand(
                    Command::new("disable").arg(Arg::new("name").required(true)),
                ),
        )
        .subcommand(
            Command::new("tx")
                .about("Record and inspect transactions")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD, default today"))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .help("income|expense|deposit|withdrawal (default expense)"),
                        )
                        .arg(Arg::new("description").long("description").required(true))
                        .arg(Arg::new("category").long("category"))
                        .arg(Arg::new("method").long("method"))
                        .arg(
                            Arg::new("installments")
                                .long("installments")
                                .value_parser(value_parser!(u32))
                                .help("Split into N monthly installments (credit cards)"),
                        ),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .arg(Arg::new("month").long("month").help("YYYY-MM"))
                        .arg(Arg::new("kind").long("kind"))
                        .arg(Arg::new("card").long("card"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                ))
                .subcommand(
                    Command::new("rm").arg(
                        Arg::new("id")
                            .long("id")
                            .required(true)
                            .value_parser(value_parser!(i64)),
                    ),
                ),
        )
        .subcommand(
            Command::new("cycle")
                .about("Billing cycles")
                .subcommand(
                    Command::new("start")
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD, default now")),
                )
                .subcommand(json_flags(Command::new("current")))
                .subcommand(json_flags(Command::new("list")))
                .subcommand(json_flags(Command::new("summary"))),
        )
        .subcommand(
            Command::new("card")
                .about("Credit card statements")
                .subcommand(json_flags(Command::new("summaries")))
                .subcommand(
                    Command::new("pay")
                        .arg(Arg::new("card").long("card").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("method").long("method").required(true))
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD, default today"))
                        .arg(Arg::new("description").long("description"))
                        .arg(
                            Arg::new("current-window")
                                .long("current-window")
                                .action(ArgAction::SetTrue)
                                .help("Settle only charges inside the current statement window"),
                        ),
                ),
        )
        .subcommand(
            Command::new("installment")
                .about("Installment purchases")
                .subcommand(json_flags(Command::new("list")))
                .subcommand(json_flags(Command::new("projection")))
                .subcommand(
                    Command::new("update")
                        .arg(Arg::new("group").long("group").required(true))
                        .arg(Arg::new("description").long("description").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(
                            Arg::new("count")
                                .long("count")
                                .required(true)
                                .value_parser(value_parser!(u32)),
                        )
                        .arg(Arg::new("start").long("start").required(true).help("YYYY-MM-DD"))
                        .arg(Arg::new("method").long("method").required(true))
                        .arg(Arg::new("category").long("category")),
                )
                .subcommand(
                    Command::new("rm").arg(Arg::new("group").long("group").required(true)),
                ),
        )
        .subcommand(
            Command::new("tax")
                .about("Recurring charges")
                .subcommand(json_flags(Command::new("list")))
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD, default today")),
                )
                .subcommand(
                    Command::new("pay").arg(
                        Arg::new("id")
                            .long("id")
                            .required(true)
                            .value_parser(value_parser!(i64)),
                    ),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export data")
                .subcommand(
                    Command::new("transactions")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .default_value("csv")
                                .help("csv|json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(Command::new("doctor").about("Scan for data anomalies"))
}
