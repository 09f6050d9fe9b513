use core::error::Error;
use std::io;

use blaster::{
    cfg::{Config, Format},
    cmd::Cmd,
    protocol::echo::EchoTcp,
    Blast, JsonSink, Sink, TextSink,
};
use clap::Parser;
use tokio::runtime::Builder;

pub fn main() {
    let cmd = Cmd::parse();
    if let Err(err) = blaster::logging::init(cmd.verbose as usize, cmd.debug) {
        eprintln!("ERROR: failed to initialize logging: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cmd) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(cmd: Cmd) -> Result<(), Box<dyn Error>> {
    let cfg: Config = cmd.try_into()?;

    Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .thread_name("blaster")
        .build()?
        .block_on(async {
            let blast = Blast::new(cfg.blast, EchoTcp::new(cfg.echo))?;

            let stop = blast.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("interrupted, stopping");
                    stop.stop();
                }
            });

            let stdout = io::stdout();
            let mut sink: Box<dyn Sink> = match cfg.format {
                Format::Text => Box::new(TextSink::new(stdout)),
                Format::Json => Box::new(JsonSink::new(stdout)),
            };

            blast.run(sink.as_mut()).await?;

            Ok::<(), Box<dyn Error>>(())
        })
}
