//! Test helpers: in-process fake nodes and a watcher harness.
//!
//! A [`FakeNode`] speaks enough RESP to stand in for a primary, a replica
//! or the topology store. It runs on plain threads so tests can drive the
//! controller with a [`ManualReactor`] on the test thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use vigil_failover::{
    Alert, Alerter, ConnectionConfig, ControllerConfig, FailoverController, ManualReactor,
    MemoryStore, NodeAddress,
};
use vigil_protocol::{parse_frame, Frame};

/// How often connection threads look at the kill switch.
const POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Primary,
    Replica { host: String, port: u16 },
}

#[derive(Default)]
struct State {
    role: Option<Role>,
    password: Option<String>,
    refuse_replicaof: bool,
    loading: bool,
    commands: Vec<Vec<String>>,
    strings: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    published: Vec<(String, String)>,
}

struct Shared {
    state: Mutex<State>,
    alive: AtomicBool,
}

/// Cloneable control surface for a running fake node.
#[derive(Clone)]
pub struct NodeControl {
    shared: Arc<Shared>,
    addr: NodeAddress,
}

impl NodeControl {
    pub fn addr(&self) -> NodeAddress {
        self.addr.clone()
    }

    /// Stops accepting and closes every open connection. Requests that
    /// arrive afterwards get no reply.
    pub fn kill(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }

    pub fn role(&self) -> Option<Role> {
        self.shared.state.lock().unwrap().role.clone()
    }

    /// Every command received, as upper-cased name plus arguments.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.shared.state.lock().unwrap().commands.clone()
    }

    /// Number of received commands named `name`.
    pub fn count(&self, name: &str) -> usize {
        self.commands().iter().filter(|c| c[0] == name).count()
    }

    pub fn set_refuse_replicaof(&self, refuse: bool) {
        self.shared.state.lock().unwrap().refuse_replicaof = refuse;
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.shared.state.lock().unwrap().strings.get(key).cloned()
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.shared
            .state
            .lock()
            .unwrap()
            .lists
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.shared.state.lock().unwrap().published.clone()
    }
}

/// A fake node on an ephemeral localhost port. Killed on drop.
pub struct FakeNode {
    control: NodeControl,
}

#[derive(Default)]
pub struct NodeOptions {
    pub role: Option<Role>,
    pub password: Option<String>,
    pub loading: bool,
}

impl FakeNode {
    pub fn primary() -> Self {
        Self::start_with(NodeOptions {
            role: Some(Role::Primary),
            ..Default::default()
        })
    }

    pub fn replica_of(primary: &FakeNode) -> Self {
        let addr = primary.addr();
        Self::start_with(NodeOptions {
            role: Some(Role::Replica {
                host: addr.host().to_string(),
                port: addr.port(),
            }),
            ..Default::default()
        })
    }

    /// A node with no replication role, for use as the topology store.
    pub fn store() -> Self {
        Self::start_with(NodeOptions::default())
    }

    pub fn start_with(opts: NodeOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        listener.set_nonblocking(true).unwrap();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                role: opts.role,
                password: opts.password,
                loading: opts.loading,
                ..Default::default()
            }),
            alive: AtomicBool::new(true),
        });

        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || accept_loop(listener, accept_shared));

        Self {
            control: NodeControl {
                shared,
                addr: NodeAddress::new("127.0.0.1", port),
            },
        }
    }

    pub fn addr(&self) -> NodeAddress {
        self.control.addr()
    }

    pub fn control(&self) -> NodeControl {
        self.control.clone()
    }
}

impl std::ops::Deref for FakeNode {
    type Target = NodeControl;

    fn deref(&self) -> &NodeControl {
        &self.control
    }
}

impl Drop for FakeNode {
    fn drop(&mut self) {
        self.control.kill();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    while shared.alive.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((sock, _)) => {
                let conn_shared = Arc::clone(&shared);
                thread::spawn(move || serve(sock, conn_shared));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL),
            Err(_) => return,
        }
    }
    // listener drops here, so new connects are refused
}

fn serve(mut sock: TcpStream, shared: Arc<Shared>) {
    let _ = sock.set_nonblocking(false);
    let _ = sock.set_read_timeout(Some(POLL));
    let mut buf = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        if !shared.alive.load(Ordering::SeqCst) {
            return;
        }
        match sock.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(_) => return,
        }

        loop {
            let (frame, consumed) = match parse_frame(&buf) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => break,
                Err(_) => return,
            };
            let _ = buf.split_to(consumed);
            if !shared.alive.load(Ordering::SeqCst) {
                return;
            }

            let args = frame_args(&frame);
            let reply = {
                let mut state = shared.state.lock().unwrap();
                state.commands.push(args.clone());
                respond(&mut state, &args)
            };
            let mut out = BytesMut::new();
            reply.serialize(&mut out);
            if sock.write_all(&out).is_err() {
                return;
            }
        }
    }
}

fn frame_args(frame: &Frame) -> Vec<String> {
    let Frame::Array(items) = frame else {
        return vec![String::new()];
    };
    let mut args: Vec<String> = items
        .iter()
        .map(|f| f.as_str().unwrap_or_default().to_string())
        .collect();
    if let Some(name) = args.first_mut() {
        *name = name.to_ascii_uppercase();
    }
    args
}

fn ok() -> Frame {
    Frame::Simple("OK".into())
}

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
}

fn respond(state: &mut State, args: &[String]) -> Frame {
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");

    if state.loading && arg(0) != "AUTH" {
        return Frame::Error("LOADING Redis is loading the dataset in memory".into());
    }

    match arg(0) {
        "PING" => Frame::Simple("PONG".into()),
        "AUTH" => match &state.password {
            Some(p) if p == arg(1) => ok(),
            Some(_) => Frame::Error("ERR invalid password".into()),
            None => Frame::Error("ERR Client sent AUTH, but no password is set".into()),
        },
        "SELECT" => match arg(1).parse::<u32>() {
            Ok(db) if db < 16 => ok(),
            _ => Frame::Error("ERR DB index is out of range".into()),
        },
        "INFO" => {
            let role = match &state.role {
                Some(Role::Primary) => "role:master\r\nconnected_slaves:0\r\n".to_string(),
                Some(Role::Replica { host, port }) => format!(
                    "role:slave\r\nmaster_host:{host}\r\nmaster_port:{port}\r\nmaster_link_status:up\r\n"
                ),
                None => "role:none\r\n".to_string(),
            };
            bulk(&format!("# Replication\r\n{role}"))
        }
        "SLAVEOF" | "REPLICAOF" => {
            if state.refuse_replicaof {
                return Frame::Error("ERR replication refused".into());
            }
            if arg(1).eq_ignore_ascii_case("NO") && arg(2).eq_ignore_ascii_case("ONE") {
                state.role = Some(Role::Primary);
            } else {
                let Ok(port) = arg(2).parse() else {
                    return Frame::Error("ERR value is not an integer or out of range".into());
                };
                state.role = Some(Role::Replica {
                    host: arg(1).to_string(),
                    port,
                });
            }
            ok()
        }
        "GET" => match state.strings.get(arg(1)) {
            Some(v) => bulk(v),
            None => Frame::Null,
        },
        "SET" => {
            state.strings.insert(arg(1).into(), arg(2).into());
            ok()
        }
        "DEL" => {
            let removed = state.strings.remove(arg(1)).is_some() as i64
                + state.lists.remove(arg(1)).is_some() as i64;
            Frame::Integer(removed)
        }
        "RPUSH" => {
            let list = state.lists.entry(arg(1).into()).or_default();
            list.push(arg(2).into());
            Frame::Integer(list.len() as i64)
        }
        "LREM" => {
            let list = state.lists.entry(arg(1).into()).or_default();
            let before = list.len();
            list.retain(|v| v != arg(3));
            Frame::Integer((before - list.len()) as i64)
        }
        "LRANGE" => {
            let items: Vec<Frame> = state
                .lists
                .get(arg(1))
                .map(|l| l.iter().map(|v| bulk(v)).collect())
                .unwrap_or_default();
            Frame::Array(items)
        }
        "PUBLISH" => {
            state.published.push((arg(1).into(), arg(2).into()));
            Frame::Integer(0)
        }
        other => Frame::Error(format!("ERR unknown command '{other}'")),
    }
}

/// Alerter that keeps every alert for later inspection.
#[derive(Clone, Default)]
pub struct RecordingAlerter {
    alerts: Rc<RefCell<Vec<Alert>>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.borrow().clone()
    }
}

impl Alerter for RecordingAlerter {
    fn alert(&self, alert: &Alert) {
        self.alerts.borrow_mut().push(alert.clone());
    }
}

/// Connection settings with short timeouts so failing tests fail fast.
pub fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig {
        connect_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

/// A controller wired to a manual reactor, an in-memory store and a
/// recording alerter.
pub struct Harness {
    pub reactor: Rc<ManualReactor>,
    pub store: MemoryStore,
    pub alerts: RecordingAlerter,
    pub controller: FailoverController,
}

impl Harness {
    pub fn new(seeds: Vec<NodeAddress>) -> Self {
        Self::with_store(seeds, MemoryStore::new())
    }

    pub fn with_store(seeds: Vec<NodeAddress>, store: MemoryStore) -> Self {
        let reactor = Rc::new(ManualReactor::new());
        let alerts = RecordingAlerter::default();
        let config = ControllerConfig {
            seeds,
            connection: test_connection_config(),
            ..Default::default()
        };
        let controller = FailoverController::new(
            config,
            reactor.clone(),
            Box::new(store.clone()),
            Box::new(alerts.clone()),
        );
        Self {
            reactor,
            store,
            alerts,
            controller,
        }
    }
}

/// Gives connection threads time to notice a kill.
pub fn settle() {
    thread::sleep(POLL * 5);
}

/// Locates the `vigil` binary in the cargo target directory, if built.
pub fn watcher_binary() -> Option<PathBuf> {
    let mut path = std::env::current_exe().ok()?;
    // test binary is in target/debug/deps/, go up to target/debug/
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("vigil");
    path.exists().then_some(path)
}
