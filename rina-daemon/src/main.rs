//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod admin;
mod config;

use std::sync::Arc;

use capctl::caps;
use clap::{App, Arg};
use config::{Config, Logging};
use nix::unistd::{Uid, User};
use tracing::{error, info};
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &Logging) {
    let file = config.file.enabled.then(|| {
        let file_appender = tracing_appender::rolling::never(&config.file.dir, &config.file.name);
        tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(false)
            .with_ansi(false)
    });

    let stdout = config
        .stdout
        .enabled
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("rina=debug".parse().unwrap())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file)
        .with(stdout)
        .init();
}

fn privdrop(user: &str) -> nix::Result<()> {
    capctl::prctl::set_securebits(capctl::prctl::Secbits::KEEP_CAPS).unwrap();

    if let Some(user) = User::from_name(user)? {
        nix::unistd::setgroups(&[user.gid])?;
        nix::unistd::setresgid(user.gid, user.gid, user.gid)?;
        nix::unistd::setresuid(user.uid, user.uid, user.uid)?;
    } else {
        error!(name = %user, "failed to find user");
        std::process::exit(1);
    }

    let mut caps = caps::CapState::empty();
    caps.permitted.add(caps::Cap::NET_ADMIN);
    if let Err(error) = caps.set_current() {
        error!(%error, "failed to set permitted capabilities");
    }

    Ok(())
}

fn main() {
    let matches = App::new("RINA control-plane daemon")
        .version(clap::crate_version!())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    let config_file = matches.value_of("config");
    let config = Arc::new(Config::load(config_file));

    if !Uid::effective().is_root() {
        eprintln!("need privileged user");
        std::process::exit(1);
    }

    init_tracing(&config.logging);

    if let Err(error) = privdrop(&config.user) {
        error!(%error, "failed to drop root privileges");
        std::process::exit(1);
    }

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    info!("starting up");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            if let Err(error) = admin::serve(&config.admin_socket, config.clone()).await {
                error!(%error, "failed to bind admin socket");
                std::process::exit(1);
            }
        });
}
