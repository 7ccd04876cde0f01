//! Shared harness for runtime integration tests: a manager wired to a
//! scripted engine factory, with every host callback collected on a
//! channel.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use hornet_runtime::testing::ScriptedEngineFactory;
use hornet_runtime::{ConsoleLevel, WorkerManager};

pub struct TestHost {
    pub manager: WorkerManager,
    pub messages: Receiver<(String, String)>,
    pub binary: Receiver<(String, Vec<u8>)>,
    pub console: Receiver<(String, ConsoleLevel, String)>,
    pub errors: Receiver<(String, String)>,
}

pub fn host_with(factory: ScriptedEngineFactory) -> TestHost {
    let manager = WorkerManager::new(Arc::new(factory));

    let (message_tx, messages) = unbounded();
    manager.set_message_callback(move |worker_id, message| {
        let _ = message_tx.send((worker_id.to_string(), message.to_string()));
    });

    let (binary_tx, binary) = unbounded();
    manager.set_binary_message_callback(move |worker_id, bytes| {
        let _ = binary_tx.send((worker_id.to_string(), bytes.to_vec()));
    });

    let (console_tx, console) = unbounded();
    manager.set_console_callback(move |worker_id, level, message| {
        let _ = console_tx.send((worker_id.to_string(), level, message.to_string()));
    });

    let (error_tx, errors) = unbounded();
    manager.set_error_callback(move |worker_id, message| {
        let _ = error_tx.send((worker_id.to_string(), message.to_string()));
    });

    TestHost {
        manager,
        messages,
        binary,
        console,
        errors,
    }
}

pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);

impl TestHost {
    pub fn expect_message(&self) -> (String, String) {
        self.messages
            .recv_timeout(RECV_TIMEOUT)
            .expect("expected a text message within the timeout")
    }

    pub fn expect_binary(&self) -> (String, Vec<u8>) {
        self.binary
            .recv_timeout(RECV_TIMEOUT)
            .expect("expected a binary message within the timeout")
    }

    pub fn expect_error(&self) -> (String, String) {
        self.errors
            .recv_timeout(RECV_TIMEOUT)
            .expect("expected an error within the timeout")
    }
}

/// Poll `condition` until it holds or a second passes.
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
