//! Play Simon Says in a terminal
//!
//! Runs the game controller against the host board: stdin feeds the serial
//! receive side, stdout shows everything the board transmits, and a tokio task
//! delivers the one-second supervisor tick.

use std::io::Read;
use std::time::Duration;

use simon_core::{default_config, Controller, HalError, IdleSupervisor};
use simon_tests::host::{self, HostOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = host::leak_supervisor(IdleSupervisor::new());
    let options = HostOptions { mirror_stdout: true, ..HostOptions::default() };
    let (board, handle) = host::board(supervisor, options);

    let ticker = handle.spawn_ticker(Duration::from_secs(1));

    let input = handle.clone();
    std::thread::spawn(move || {
        let mut buf = [0u8; 64];
        let mut stdin = std::io::stdin();
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => input.send(&String::from_utf8_lossy(&buf[..n])),
            }
        }
        input.shutdown();
    });

    let result = tokio::task::spawn_blocking(move || {
        let mut controller = Controller::new(board, supervisor, default_config());
        controller.run()
    })
    .await?;

    ticker.abort();
    println!();

    match result {
        Err(HalError::InterruptError) => Ok(()),
        Err(e) => Err(e.into()),
        Ok(never) => match never {},
    }
}
