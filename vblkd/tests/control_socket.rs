//! Drives vblkd over its control socket against an in-process SPDK stand-in.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tonic::Code;

use vblkd::config::SpdkConfig;
use vblkd::control::{Request, Response};
use vblkd::types::{
    CreateVirtioBlkRequest, DeleteVirtioBlkRequest, GetVirtioBlkRequest, ListVirtioBlksRequest,
    ObjectKey, PciEndpoint, VirtioBlk, VirtioBlkStatsRequest,
};
use vblkd::{Config, Server};

/// Controllers the fake target knows about: `(name, pf_id, bdev)`.
type Controllers = Arc<Mutex<Vec<(String, u32, String)>>>;

/// Minimal SNAP target: tracks created controllers and answers the four
/// controller methods.
async fn fake_spdk(listener: UnixListener, controllers: Controllers) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let controllers = Arc::clone(&controllers);
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let request: Value = loop {
                let mut chunk = [0u8; 1024];
                let n = stream.read(&mut chunk).await.expect("read");
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Ok(value) = serde_json::from_slice(&buf) {
                    break value;
                }
            };

            let result = answer(&request, &controllers);
            let response = json!({"jsonrpc": "2.0", "id": request["id"], "result": result});
            stream
                .write_all(&serde_json::to_vec(&response).unwrap())
                .await
                .expect("write");
        });
    }
}

fn answer(request: &Value, controllers: &Controllers) -> Value {
    let params = &request["params"];
    let mut controllers = controllers.lock().unwrap();
    match request["method"].as_str().unwrap() {
        "controller_virtio_blk_create" => {
            let pf_id = params["pf_id"].as_u64().unwrap() as u32;
            controllers.push((
                params["serial"].as_str().unwrap().to_string(),
                pf_id,
                params["bdev"].as_str().unwrap().to_string(),
            ));
            json!(format!("VblkEmu0pf{pf_id}"))
        }
        "controller_virtio_blk_delete" => {
            let name = params["name"].as_str().unwrap();
            let before = controllers.len();
            controllers.retain(|(n, _, _)| n != name);
            json!(controllers.len() < before)
        }
        "controller_list" => {
            let mut entries: Vec<Value> = controllers
                .iter()
                .map(|(name, pf_id, _)| {
                    json!({"name": name, "emulation_manager": "mlx5_0", "type": "virtio_blk", "pci_index": pf_id})
                })
                .collect();
            entries.push(json!({"name": "NvmeEmu0pf0", "type": "nvme", "pci_index": 0}));
            Value::Array(entries)
        }
        "controller_virtio_blk_get_iostat" => {
            let stats: Vec<Value> = controllers
                .iter()
                .map(|(_, pf_id, bdev)| {
                    json!({
                        "name": format!("VblkEmu0pf{pf_id}"),
                        "bdevs": [{"bdev_name": bdev, "read_ios": pf_id * 10, "write_ios": pf_id * 20}]
                    })
                })
                .collect();
            json!({"controllers": stats})
        }
        other => panic!("unexpected method {other}"),
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_line(&mut self, line: &str) -> Response {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();

        let mut response = String::new();
        self.reader.read_line(&mut response).await.unwrap();
        serde_json::from_str(&response).expect("response should be JSON")
    }

    async fn call(&mut self, request: Request) -> Response {
        let line = serde_json::to_string(&request).unwrap();
        self.send_line(&line).await
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    socket: PathBuf,
    controllers: Controllers,
}

async fn start(with_backend: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("vblkd").join("vblkd.sock");
    let spdk_socket = dir.path().join("spdk.sock");
    let controllers = Controllers::default();

    if with_backend {
        let listener = UnixListener::bind(&spdk_socket).unwrap();
        tokio::spawn(fake_spdk(listener, Arc::clone(&controllers)));
    }

    let server = Arc::new(Server::new(Config {
        socket: socket.clone(),
        spdk: SpdkConfig {
            socket: spdk_socket,
        },
        ..Config::default()
    }));
    let listener = server.bind().unwrap();
    tokio::spawn(async move { server.serve(listener).await });

    Harness {
        _dir: dir,
        socket,
        controllers,
    }
}

fn create(id: &str, pf: u32, volume: &str) -> Request {
    Request::Create(CreateVirtioBlkRequest {
        virtio_blk: Some(VirtioBlk {
            pcie_id: Some(PciEndpoint {
                physical_function: pf,
                virtual_function: None,
            }),
            volume_id: Some(ObjectKey::new(volume)),
            max_io_qps: 1,
            ..Default::default()
        }),
        virtio_blk_id: Some(id.to_string()),
    })
}

fn code(response: &Response) -> Code {
    response.status().map_or(Code::Ok, |s| s.code())
}

#[tokio::test]
async fn controller_lifecycle_over_control_socket() {
    let harness = start(true).await;
    let mut client = Client::connect(&harness.socket).await;

    for (id, pf, volume) in [("disk-1", 1, "Malloc1"), ("disk-2", 2, "Malloc2")] {
        let response = client.call(create(id, pf, volume)).await;
        let Response::VirtioBlk(created) = response else {
            panic!("create {id} failed: {response:?}");
        };
        assert_eq!(created.name, format!("//storage.opiproject.org/volumes/{id}"));
    }

    // Repeating a create does not reach the backend again.
    client.call(create("disk-1", 1, "Malloc1")).await;
    assert_eq!(harness.controllers.lock().unwrap().len(), 2);

    let response = client
        .call(Request::List(ListVirtioBlksRequest {
            page_size: 1,
            page_token: String::new(),
        }))
        .await;
    let Response::List(page1) = response else {
        panic!("list failed: {response:?}");
    };
    assert_eq!(page1.virtio_blks.len(), 1);
    assert!(!page1.next_page_token.is_empty());

    let response = client
        .call(Request::List(ListVirtioBlksRequest {
            page_size: 1,
            page_token: page1.next_page_token,
        }))
        .await;
    let Response::List(page2) = response else {
        panic!("list failed: {response:?}");
    };
    assert_eq!(page2.virtio_blks.len(), 1);
    assert!(page2.next_page_token.is_empty());
    assert_ne!(page1.virtio_blks[0].name, page2.virtio_blks[0].name);

    let response = client
        .call(Request::Get(GetVirtioBlkRequest {
            name: "//storage.opiproject.org/volumes/disk-2".to_string(),
        }))
        .await;
    let Response::VirtioBlk(disk2) = response else {
        panic!("get failed: {response:?}");
    };
    assert_eq!(disk2.pcie_id.unwrap().physical_function, 2);
    assert_eq!(disk2.volume_id, Some(ObjectKey::new("Malloc2")));

    let response = client
        .call(Request::Stats(VirtioBlkStatsRequest {
            controller_id: Some(ObjectKey::new("Malloc2")),
        }))
        .await;
    let Response::Stats(stats) = response else {
        panic!("stats failed: {response:?}");
    };
    assert_eq!(stats.stats.read_ops_count, 20);
    assert_eq!(stats.stats.write_ops_count, 40);

    let response = client
        .call(Request::Delete(DeleteVirtioBlkRequest {
            name: "//storage.opiproject.org/volumes/disk-1".to_string(),
            allow_missing: false,
        }))
        .await;
    assert_eq!(response, Response::Empty);
    assert_eq!(harness.controllers.lock().unwrap().len(), 1);

    let response = client
        .call(Request::Get(GetVirtioBlkRequest {
            name: "//storage.opiproject.org/volumes/disk-1".to_string(),
        }))
        .await;
    assert_eq!(code(&response), Code::InvalidArgument);

    let response = client
        .call(Request::Delete(DeleteVirtioBlkRequest {
            name: "//storage.opiproject.org/volumes/disk-1".to_string(),
            allow_missing: false,
        }))
        .await;
    assert_eq!(code(&response), Code::NotFound);
}

#[tokio::test]
async fn malformed_line_keeps_connection_open() {
    let harness = start(true).await;
    let mut client = Client::connect(&harness.socket).await;

    let response = client.send_line("{not json").await;
    assert_eq!(code(&response), Code::InvalidArgument);

    let response = client.call(create("disk-9", 9, "Malloc9")).await;
    assert!(matches!(response, Response::VirtioBlk(_)));
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let harness = start(false).await;
    let mut client = Client::connect(&harness.socket).await;

    let response = client.call(create("disk-1", 1, "Malloc1")).await;
    assert_eq!(code(&response), Code::Unavailable);

    let response = client.call(Request::List(ListVirtioBlksRequest::default())).await;
    assert_eq!(code(&response), Code::Unavailable);
}
