use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_init;
mod cmd_caches;
mod cmd_list;
mod cmd_check;
mod cmd_fingerprint;
mod cmd_put;
mod cmd_get;
mod cmd_status;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт: info.
    // Пример: RUST_LOG=debug imagebank list
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let cfg = util::load_config(cli.user_dir, cli.output_dir);

    match cli.cmd {
        cli::Cmd::Init => cmd_init::exec(&cfg),

        cli::Cmd::Caches { json } => cmd_caches::exec(&cfg, json),

        cli::Cmd::List { cache, json } => cmd_list::exec(&cfg, cache, json),

        cli::Cmd::Check { cache, bank_name, bank_id, structured } =>
            cmd_check::exec(&cfg, cache, bank_name, bank_id, structured),

        cli::Cmd::Fingerprint { bank_id, structured } =>
            cmd_fingerprint::exec(bank_id, structured),

        cli::Cmd::Put { cache, bank_name, bank_id, structured, index, images } =>
            cmd_put::exec(&cfg, cache, bank_name, bank_id, structured, index, images),

        cli::Cmd::Get { cache, bank_name, bank_id, structured, index, out } =>
            cmd_get::exec(&cfg, cache, bank_name, bank_id, structured, index, out),

        cli::Cmd::Status { json } => cmd_status::exec(&cfg, json),
    }
}
