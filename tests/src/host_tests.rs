//! The controller on a real thread with tokio-driven interrupts

use std::time::Duration;

use simon_core::test_utils::ScriptedRandom;
use simon_core::{
    default_config, Controller, GameConfig, HalError, IdleEvent, IdleSupervisor, Phase,
    PowerControl, SerialLink, SimonHal,
};
use tokio_test::assert_ok;

use crate::host::{self, HostOptions};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> GameConfig {
    GameConfig {
        self_test: false,
        symbol_display: simon_core::Duration::from_millis(5),
        sleep_grace: simon_core::Duration::from_millis(5),
        wake_settle: simon_core::Duration::from_millis(5),
        ..default_config()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_round_trip() {
    println!("🖥️ host board: start, one correct round, then a miss");
    let supervisor = host::leak_supervisor(IdleSupervisor::new());
    let random = ScriptedRandom::new(&[2, 4]);
    let (board, handle) = host::board_with_random(supervisor, HostOptions::default(), random);

    let controller = std::thread::spawn(move || {
        let mut controller = Controller::new(board, supervisor, fast_config());
        let result = controller.run();
        (result, controller.session().phase(), controller.session().score())
    });

    assert!(handle.wait_for_output("Type Start to begin...", WAIT).await);
    handle.send_line("start");
    assert!(handle.wait_for_output("Its your turn! What did Simon say?", WAIT).await);
    handle.send_line("a");
    assert!(handle.wait_for_output("That matched!", WAIT).await);
    handle.send_line("AW");
    assert!(handle.wait_for_output("YOU LOST! Your final score was: 1", WAIT).await);

    handle.shutdown();
    let (result, phase, score) = tokio::task::spawn_blocking(move || controller.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.err(), Some(HalError::InterruptError));
    assert_eq!(phase, Phase::NotStarted);
    assert_eq!(score, 0);
    assert!(handle.leds().iter().all(|on| !on));
    assert!(handle.watchdog_feeds() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_sleep_and_wake() {
    println!("💤 host board: fast ticks force a sleep cycle");
    let supervisor = host::leak_supervisor(assert_ok!(IdleSupervisor::try_with_thresholds(3, 6)));
    let (board, handle) = host::board(supervisor, HostOptions::default());

    let controller = std::thread::spawn(move || {
        let mut controller = Controller::new(board, supervisor, fast_config());
        controller.run()
    });
    assert!(handle.wait_for_output("Type Start to begin...", WAIT).await);

    let ticker = handle.spawn_ticker(Duration::from_millis(10));
    assert!(handle.wait_for_output("SleepMode in t-minus 3s", WAIT).await);
    assert!(handle.wait_for_output("Sleep mode activated. Hit enter to wake.", WAIT).await);

    // ticks keep arriving while asleep; only input wakes
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(supervisor.is_sleeping());
    assert!(!handle.output().contains("Sleep-Cycle Ended"));

    handle.send("\r");
    assert!(handle.wait_for_output("Sleep-Cycle Ended: Welcome back to Simon-Says!", WAIT).await);
    assert!(!supervisor.is_sleeping());

    ticker.abort();
    handle.shutdown();
    let result = tokio::task::spawn_blocking(move || controller.join()).await.unwrap().unwrap();
    assert_eq!(result.err(), Some(HalError::InterruptError));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_host_help_and_echo() {
    let supervisor = host::leak_supervisor(IdleSupervisor::new());
    let (board, handle) = host::board(supervisor, HostOptions::default());
    let controller = std::thread::spawn(move || {
        Controller::new(board, supervisor, fast_config()).run()
    });

    handle.send("HeLp\r\n");
    assert!(handle.wait_for_output("Start - begins a new game with Simon", WAIT).await);
    handle.send_line("what");
    assert!(handle.wait_for_output("You typed in 'what'", WAIT).await);

    handle.shutdown();
    let result = tokio::task::spawn_blocking(move || controller.join()).await.unwrap().unwrap();
    assert!(result.is_err());
}

#[test]
fn test_pending_count_tracks_concurrent_sends() {
    println!("📨 sender thread races the serial reader");
    const BYTES: usize = 2_000;
    let supervisor = host::leak_supervisor(IdleSupervisor::new());
    let (mut board, handle) = host::board(supervisor, HostOptions::default());

    let sender = handle.clone();
    let writer = std::thread::spawn(move || {
        for _ in 0..BYTES {
            sender.send("x");
        }
    });

    let mut received = 0;
    while received < BYTES {
        if assert_ok!(board.serial().read_byte()).is_some() {
            received += 1;
            assert!(handle.pending_rx() <= BYTES, "pending count wrapped");
        }
    }
    writer.join().unwrap();
    assert_eq!(handle.pending_rx(), 0);

    // nothing is waiting, so arming must not wake
    assert_ok!(board.power().arm_wake());
    assert_ne!(supervisor.take_event(), Some(IdleEvent::Wake));
}
