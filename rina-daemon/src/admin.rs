//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

//
// The administrative socket: a Unix stream socket accepting one
// newline-delimited JSON request per line, each yielding one JSON
// response line. `UIPCP_CREATE`/`UIPCP_DESTROY` spawn or tear down
// the task an `Instance` runs in; every other command is forwarded to
// the already-running instance it names.
//

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use rina_kernel::IpcpId;
use rina_kernel::channel::{MockControlChannel, MockManagementChannel};
use rina_rib::{AdminCommand, AdminResponse, Instance, InstanceConfig};
use rina_utils::persist::{self, PersistedIpcp};
use rina_utils::{Address, ApplicationName, PortId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireCommand {
    UipcpCreate {
        ipcp_name: String,
        dif_name: String,
        address: u64,
    },
    UipcpDestroy {
        ipcp_id: u16,
    },
    UipcpUpdate {
        ipcp_id: u16,
        address: u64,
    },
    IpcpRegister {
        ipcp_id: u16,
        appl_name: String,
        register: bool,
    },
    IpcpEnroll {
        ipcp_id: u16,
        neighbor_name: String,
        port_id: u32,
    },
    IpcpDftSet {
        ipcp_id: u16,
        appl_name: String,
        address: u64,
    },
    IpcpNeighborsList {
        ipcp_id: u16,
    },
}

#[derive(Deserialize)]
struct WireRequest {
    event_id: u32,
    #[serde(flatten)]
    command: WireCommand,
}

#[derive(Serialize)]
struct WireNeighbor {
    name: String,
    port_id: u32,
    address: Option<u64>,
    enrolled: bool,
}

#[derive(Serialize)]
struct WireCandidate {
    name: String,
    address: u64,
}

#[derive(Default, Serialize)]
struct WireResponse {
    event_id: u32,
    result: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipcp_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    neighbors: Option<Vec<WireNeighbor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<WireCandidate>>,
}

impl WireResponse {
    fn ok(event_id: u32) -> WireResponse {
        WireResponse { event_id, result: 0, ..Default::default() }
    }

    fn error(event_id: u32) -> WireResponse {
        WireResponse { event_id, result: -1, ..Default::default() }
    }

    fn created(event_id: u32, ipcp_id: u16) -> WireResponse {
        WireResponse {
            event_id,
            result: 0,
            ipcp_id: Some(ipcp_id),
            ..Default::default()
        }
    }
}

struct RunningIpcp {
    admin: rina_rib::AdminHandle,
    dif_name: String,
    ipcp_name: ApplicationName,
    task: JoinHandle<()>,
}

/// Owns every IPCP instance this process hosts and the admin socket's
/// in-memory view of them. Runs in its own task; every admin connection
/// forwards requests to it over `request_tx` rather than touching this
/// state directly, so concurrent connections never race on instance
/// creation/teardown.
pub struct Daemon {
    config: Arc<Config>,
    next_ipcp_id: u16,
    instances: BTreeMap<IpcpId, RunningIpcp>,
}

impl Daemon {
    pub fn new(config: Arc<Config>) -> Daemon {
        Daemon {
            config,
            next_ipcp_id: 1,
            instances: BTreeMap::new(),
        }
    }

    /// Recreates IPCPs recorded in the persistent state file. Addresses
    /// aren't persisted (address allocation is an administrative input)
    /// so each comes back unallocated, awaiting a `UIPCP_UPDATE` to assign
    /// one.
    pub fn restore(&mut self, entries: Vec<PersistedIpcp>) {
        for entry in entries {
            self.next_ipcp_id = self.next_ipcp_id.max(entry.ipcp_id + 1);
            self.spawn_instance_with_id(
                IpcpId(entry.ipcp_id),
                entry.ipcp_name,
                entry.dif_name,
                Address::UNALLOCATED,
            );
            info!(ipcp_id = entry.ipcp_id, "restored IPCP from persistent state");
        }
    }

    fn spawn_instance(
        &mut self,
        ipcp_name: ApplicationName,
        dif_name: String,
        address: Address,
    ) -> IpcpId {
        let ipcp_id = IpcpId(self.next_ipcp_id);
        self.next_ipcp_id += 1;
        self.spawn_instance_with_id(ipcp_id, ipcp_name, dif_name, address)
    }

    fn spawn_instance_with_id(
        &mut self,
        ipcp_id: IpcpId,
        ipcp_name: ApplicationName,
        dif_name: String,
        address: Address,
    ) -> IpcpId {
        let instance_config = InstanceConfig {
            address,
            name: ipcp_name.clone(),
            dif_name: dif_name.clone(),
            max_pending: self.config.max_pending_invoke_ids,
            spf_debounce: self.config.spf_debounce(),
            age_max: self.config.lfdb_age_max(),
            age_tick: self.config.lfdb_age_tick(),
            flow_timeout: self.config.flow_timeout(),
            enrollment_timeout: self.config.enrollment_timeout(),
        };

        // No real kernel module lives in this repository; every instance
        // runs against the in-memory simulation channels until a
        // production transport is wired in.
        let (kernel, _kernel_peer) = MockControlChannel::pair();
        let (mgmt, _mgmt_peer) = MockManagementChannel::pair();
        let (mut instance, admin) = Instance::new(instance_config, kernel, mgmt);

        let task = tokio::spawn(async move {
            if let Err(error) = instance.run().await {
                error.log();
            }
        });

        self.instances.insert(
            ipcp_id,
            RunningIpcp { admin, dif_name, ipcp_name, task },
        );
        ipcp_id
    }

    fn persisted_snapshot(&self) -> Vec<PersistedIpcp> {
        self.instances
            .iter()
            .map(|(ipcp_id, running)| PersistedIpcp {
                dif_name: running.dif_name.clone(),
                ipcp_id: ipcp_id.0,
                ipcp_name: running.ipcp_name.clone(),
            })
            .collect()
    }

    fn save_persisted_state(&self) {
        if let Err(error) = persist::save(
            std::path::Path::new(&self.config.persist_path),
            &self.persisted_snapshot(),
        ) {
            warn!(%error, "failed to rewrite persistent state file");
        }
    }

    async fn handle(&mut self, request: WireRequest) -> WireResponse {
        let event_id = request.event_id;
        match request.command {
            WireCommand::UipcpCreate { ipcp_name, dif_name, address } => {
                let Ok(ipcp_name) = ApplicationName::from_canonical_string(&ipcp_name)
                else {
                    return WireResponse::error(event_id);
                };
                let ipcp_id =
                    self.spawn_instance(ipcp_name, dif_name, Address::new(address));
                self.save_persisted_state();
                WireResponse::created(event_id, ipcp_id.0)
            }
            WireCommand::UipcpDestroy { ipcp_id } => {
                match self.instances.remove(&IpcpId(ipcp_id)) {
                    Some(running) => {
                        running.task.abort();
                        self.save_persisted_state();
                        WireResponse::ok(event_id)
                    }
                    None => WireResponse::error(event_id),
                }
            }
            WireCommand::UipcpUpdate { ipcp_id, address } => {
                self.forward(
                    event_id,
                    ipcp_id,
                    AdminCommand::UpdateAddress { address: Address::new(address) },
                )
                .await
            }
            WireCommand::IpcpRegister { ipcp_id, appl_name, register } => {
                let Ok(appl_name) = ApplicationName::from_canonical_string(&appl_name)
                else {
                    return WireResponse::error(event_id);
                };
                self.forward(
                    event_id,
                    ipcp_id,
                    AdminCommand::Register { appl_name, register },
                )
                .await
            }
            WireCommand::IpcpEnroll { ipcp_id, neighbor_name, port_id } => {
                let Ok(neighbor_name) =
                    ApplicationName::from_canonical_string(&neighbor_name)
                else {
                    return WireResponse::error(event_id);
                };
                self.forward(
                    event_id,
                    ipcp_id,
                    AdminCommand::Enroll {
                        neighbor_name,
                        port_id: PortId::new(port_id),
                    },
                )
                .await
            }
            WireCommand::IpcpDftSet { ipcp_id, appl_name, address } => {
                let Ok(appl_name) = ApplicationName::from_canonical_string(&appl_name)
                else {
                    return WireResponse::error(event_id);
                };
                self.forward(
                    event_id,
                    ipcp_id,
                    AdminCommand::DftSet { appl_name, address: Address::new(address) },
                )
                .await
            }
            WireCommand::IpcpNeighborsList { ipcp_id } => {
                self.forward(event_id, ipcp_id, AdminCommand::NeighborsList).await
            }
        }
    }

    async fn forward(
        &self,
        event_id: u32,
        ipcp_id: u16,
        command: AdminCommand,
    ) -> WireResponse {
        let Some(running) = self.instances.get(&IpcpId(ipcp_id)) else {
            return WireResponse::error(event_id);
        };
        match running.admin.send(command).await {
            Ok(AdminResponse::Result { result }) => {
                WireResponse { event_id, result, ..Default::default() }
            }
            Ok(AdminResponse::Neighbors { enrolled, candidates }) => WireResponse {
                event_id,
                result: 0,
                neighbors: Some(
                    enrolled
                        .into_iter()
                        .map(|n| WireNeighbor {
                            name: n.name.to_canonical_string(),
                            port_id: n.port_id.value(),
                            address: n.address.map(|a| a.value()),
                            enrolled: n.enrolled,
                        })
                        .collect(),
                ),
                candidates: Some(
                    candidates
                        .into_iter()
                        .map(|c| WireCandidate {
                            name: c.name.to_canonical_string(),
                            address: c.address.value(),
                        })
                        .collect(),
                ),
                ..Default::default()
            },
            Err(error) => {
                error.log();
                WireResponse::error(event_id)
            }
        }
    }
}

struct DaemonRequest {
    request: WireRequest,
    reply: oneshot::Sender<WireResponse>,
}

/// Drives the single `Daemon` owning every instance; the only task
/// allowed to mutate `Daemon` directly.
async fn run_registry(mut daemon: Daemon, mut rx: mpsc::UnboundedReceiver<DaemonRequest>) {
    while let Some(req) = rx.recv().await {
        let response = daemon.handle(req.request).await;
        let _ = req.reply.send(response);
    }
}

async fn handle_connection(
    stream: UnixStream,
    tx: mpsc::UnboundedSender<DaemonRequest>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<WireRequest>(&line) {
            Ok(request) => {
                let event_id = request.event_id;
                let (reply_tx, reply_rx) = oneshot::channel();
                if tx.send(DaemonRequest { request, reply: reply_tx }).is_err() {
                    WireResponse::error(event_id)
                } else {
                    reply_rx.await.unwrap_or_else(|_| WireResponse::error(event_id))
                }
            }
            Err(error) => {
                warn!(%error, line = %line, "malformed admin request");
                WireResponse::error(0)
            }
        };
        let mut encoded = serde_json::to_string(&response)
            .expect("WireResponse always serializes");
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
    }
    Ok(())
}

/// Binds the admin socket and runs its accept loop and registry task
/// forever (or until a fatal bind/listen error).
pub async fn serve(socket_path: &str, config: Arc<Config>) -> std::io::Result<()> {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o660))?;

    let mut daemon = Daemon::new(config.clone());
    let restored = persist::load(std::path::Path::new(&config.persist_path))
        .unwrap_or_else(|error| {
            warn!(%error, "failed to load persistent state, starting empty");
            Vec::new()
        });
    daemon.restore(restored);

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_registry(daemon, rx));

    info!(socket = %socket_path, "admin socket listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, tx).await {
                warn!(%error, "admin connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon() -> Daemon {
        Daemon::new(Arc::new(Config::default()))
    }

    #[test]
    fn uipcp_create_request_parses_from_json() {
        let line = r#"{"cmd":"UIPCP_CREATE","event_id":1,"ipcp_name":"a|||","dif_name":"dif1","address":0}"#;
        let request: WireRequest = serde_json::from_str(line).unwrap();
        assert!(matches!(request.command, WireCommand::UipcpCreate { .. }));
        assert_eq!(request.event_id, 1);
    }

    #[test]
    fn wire_response_skips_absent_fields_on_encode() {
        let encoded = serde_json::to_string(&WireResponse::ok(7)).unwrap();
        assert_eq!(encoded, r#"{"event_id":7,"result":0}"#);
    }

    #[tokio::test]
    async fn create_then_destroy_round_trips_through_daemon() {
        let mut daemon = daemon();

        let response = daemon
            .handle(WireRequest {
                event_id: 1,
                command: WireCommand::UipcpCreate {
                    ipcp_name: "a|||".to_owned(),
                    dif_name: "dif1".to_owned(),
                    address: 0,
                },
            })
            .await;
        assert_eq!(response.result, 0);
        let ipcp_id = response.ipcp_id.expect("create returns an ipcp_id");

        let response = daemon
            .handle(WireRequest {
                event_id: 2,
                command: WireCommand::UipcpDestroy { ipcp_id },
            })
            .await;
        assert_eq!(response.result, 0);

        let response = daemon
            .handle(WireRequest {
                event_id: 3,
                command: WireCommand::UipcpDestroy { ipcp_id },
            })
            .await;
        assert_eq!(response.result, -1, "destroying twice must fail the second time");
    }

    #[tokio::test]
    async fn commands_against_unknown_ipcp_id_fail() {
        let daemon = daemon();
        let response = daemon.forward(5, 99, AdminCommand::NeighborsList).await;
        assert_eq!(response.result, -1);
    }

    #[tokio::test]
    async fn register_and_neighbors_list_reach_the_spawned_instance() {
        let mut daemon = daemon();
        let create = daemon
            .handle(WireRequest {
                event_id: 1,
                command: WireCommand::UipcpCreate {
                    ipcp_name: "a|||".to_owned(),
                    dif_name: "dif1".to_owned(),
                    address: 1,
                },
            })
            .await;
        let ipcp_id = create.ipcp_id.unwrap();

        let response = daemon
            .handle(WireRequest {
                event_id: 2,
                command: WireCommand::IpcpRegister {
                    ipcp_id,
                    appl_name: "b|||".to_owned(),
                    register: true,
                },
            })
            .await;
        assert_eq!(response.result, 0);

        let response = daemon
            .handle(WireRequest {
                event_id: 3,
                command: WireCommand::IpcpNeighborsList { ipcp_id },
            })
            .await;
        assert_eq!(response.result, 0);
        assert!(response.neighbors.is_some());
        assert!(response.candidates.is_some());
    }

    #[tokio::test]
    async fn malformed_application_name_is_rejected_before_reaching_instance() {
        let mut daemon = daemon();
        let create = daemon
            .handle(WireRequest {
                event_id: 1,
                command: WireCommand::UipcpCreate {
                    ipcp_name: "a|||".to_owned(),
                    dif_name: "dif1".to_owned(),
                    address: 1,
                },
            })
            .await;
        let ipcp_id = create.ipcp_id.unwrap();

        let response = daemon
            .handle(WireRequest {
                event_id: 2,
                command: WireCommand::IpcpRegister {
                    ipcp_id,
                    appl_name: "a|b|c".to_owned(),
                    register: true,
                },
            })
            .await;
        assert_eq!(response.result, -1);
    }
}
