//! End-to-end tests for master mode: a real supervisor with real worker
//! child processes on sequential ports.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serial_test::serial;

const READY_TIMEOUT: Duration = Duration::from_secs(30);
const EXIT_TIMEOUT: Duration = Duration::from_secs(30);

struct Fleet {
    master: Child,
    base_port: u16,
    workers: u16,
}

impl Fleet {
    fn spawn(base_port: u16, workers: u16, extra_env: &[(&str, &str)]) -> Self {
        let config_dir = std::env::temp_dir().join(format!("herd-fleet-{base_port}"));
        std::fs::create_dir_all(&config_dir).expect("failed to create config dir");

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_herd"));
        cmd.env("HERD_CONFIG_DIR", &config_dir)
            .env("HERD_WORKERS", workers.to_string())
            .env("HERD_BASE_PORT", base_port.to_string())
            .env("HERD_SERVER", "demo")
            .env("HERD_RESTART_INITIAL_DELAY_MS", "100")
            .env("HERD_LOG_LEVEL", "debug")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        for (key, value) in extra_env {
            cmd.env(key, value);
        }

        let master = cmd.spawn().expect("failed to spawn master");

        Self {
            master,
            base_port,
            workers,
        }
    }

    fn signal(&self, signal: Signal) {
        kill(Pid::from_raw(self.master.id() as i32), signal).expect("failed to signal master");
    }

    async fn wait_all_ready(&self) {
        for offset in 0..self.workers {
            wait_ready(self.base_port + offset).await;
        }
    }

    async fn wait_exit(mut self, timeout: Duration) -> ExitStatus {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(status) = self.master.try_wait().expect("try_wait failed") {
                return status;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "master did not exit within {timeout:?}"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        // Workers run in their own sessions; SIGKILLing only the master
        // would orphan them, so drain first
        let _ = kill(Pid::from_raw(self.master.id() as i32), Signal::SIGTERM);
        let _ = self.master.wait();
    }
}

async fn wait_ready(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/internal/ready");
    let deadline = tokio::time::Instant::now() + READY_TIMEOUT;

    loop {
        if let Ok(response) = client.get(&url).send().await
            && response.status().is_success()
        {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "worker on port {port} never became ready"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn worker_pid(port: u16) -> u32 {
    let health: serde_json::Value = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/internal/health"))
        .send()
        .await
        .expect("health request failed")
        .json()
        .await
        .expect("health body was not JSON");

    health["pid"].as_u64().expect("health payload had no pid") as u32
}

#[tokio::test]
#[serial]
async fn given_a_fleet_of_two_then_both_ports_serve_and_sigterm_stops_everything() {
    let fleet = Fleet::spawn(9450, 2, &[]);
    fleet.wait_all_ready().await;

    let client = reqwest::Client::new();
    for port in [9450, 9451] {
        let body = client
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .expect("request failed")
            .text()
            .await
            .expect("body failed");
        assert_eq!(body, "Hello from the herd");
    }

    fleet.signal(Signal::SIGTERM);
    let status = fleet.wait_exit(EXIT_TIMEOUT).await;
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
#[serial]
async fn given_a_killed_middle_worker_then_a_replacement_takes_over_its_port() {
    let fleet = Fleet::spawn(9460, 3, &[]);
    fleet.wait_all_ready().await;

    let old_pid = worker_pid(9461).await;
    kill(Pid::from_raw(old_pid as i32), Signal::SIGKILL).expect("failed to kill worker");

    let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
    let new_pid = loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "replacement worker never appeared on port 9461"
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        if let Ok(response) = reqwest::Client::new()
            .get("http://127.0.0.1:9461/internal/health")
            .send()
            .await
            && response.status().is_success()
            && let Ok(health) = response.json::<serde_json::Value>().await
            && let Some(pid) = health["pid"].as_u64()
            && pid as u32 != old_pid
        {
            break pid as u32;
        }
    };

    assert_ne!(new_pid, old_pid);

    // The untouched siblings kept serving throughout
    wait_ready(9460).await;
    wait_ready(9462).await;

    fleet.signal(Signal::SIGTERM);
    let status = fleet.wait_exit(EXIT_TIMEOUT).await;
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
#[serial]
async fn given_sighup_then_the_fleet_is_replaced_on_the_same_ports() {
    let fleet = Fleet::spawn(9470, 2, &[]);
    fleet.wait_all_ready().await;

    let old_pids = [worker_pid(9470).await, worker_pid(9471).await];

    fleet.signal(Signal::SIGHUP);

    let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
    loop {
        assert!(
            tokio::time::Instant::now() < deadline,
            "fleet was not replaced after SIGHUP"
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut replaced = 0;
        for (port, old_pid) in [(9470u16, old_pids[0]), (9471, old_pids[1])] {
            if let Ok(response) = reqwest::Client::new()
                .get(format!("http://127.0.0.1:{port}/internal/health"))
                .send()
                .await
                && response.status().is_success()
                && let Ok(health) = response.json::<serde_json::Value>().await
                && let Some(pid) = health["pid"].as_u64()
                && pid as u32 != old_pid
            {
                replaced += 1;
            }
        }
        if replaced == 2 {
            break;
        }
    }

    fleet.signal(Signal::SIGTERM);
    let status = fleet.wait_exit(EXIT_TIMEOUT).await;
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
#[serial]
async fn given_a_busy_worker_when_the_master_drains_then_the_request_still_completes() {
    let fleet = Fleet::spawn(9480, 2, &[("HERD_APP_CONFIG", r#"{"slow_ms":1500}"#)]);
    fleet.wait_all_ready().await;

    let slow = tokio::spawn(async {
        reqwest::Client::new()
            .get("http://127.0.0.1:9481/slow")
            .send()
            .await
            .expect("slow request failed")
            .text()
            .await
            .expect("slow body failed")
    });

    // Let the request land before draining the fleet
    tokio::time::sleep(Duration::from_millis(300)).await;
    fleet.signal(Signal::SIGTERM);

    let body = slow.await.unwrap();
    assert_eq!(body, "done");

    let status = fleet.wait_exit(EXIT_TIMEOUT).await;
    assert_eq!(status.code(), Some(0));
}
