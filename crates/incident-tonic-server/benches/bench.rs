use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use incident_tonic_core::proto::incident::{
    GetIncidentRequest, IncidentReport, ReportIncidentRequest,
    incident_service_client::IncidentServiceClient,
};
use std::{
    net::{SocketAddr, TcpStream},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};
use tokio::{runtime::Builder, task::JoinSet};
use tonic::{codec::CompressionEncoding, transport::Channel};

const ADDR: &str = "127.0.0.1:50051";

const ENCODINGS: [(&str, Option<CompressionEncoding>); 4] = [
    ("none", None),
    ("zstd", Some(CompressionEncoding::Zstd)),
    ("gzip", Some(CompressionEncoding::Gzip)),
    ("deflate", Some(CompressionEncoding::Deflate)),
];

/// One benchmark point: `clients` concurrent tasks, each doing `round_trips`
/// report-then-get pairs.
#[derive(Clone, Copy)]
struct Load {
    round_trips: usize,
    clients: usize,
    label: &'static str,
    encoding: Option<CompressionEncoding>,
}

impl Load {
    fn all() -> impl Iterator<Item = Load> {
        [1, 10, 100].into_iter().flat_map(|round_trips| {
            [1, 4, 16, 64].into_iter().flat_map(move |clients| {
                ENCODINGS.into_iter().map(move |(label, encoding)| Load {
                    round_trips,
                    clients,
                    label,
                    encoding,
                })
            })
        })
    }

    fn name(&self) -> String {
        format!(
            "round_trips/{}/clients/{}/{}",
            self.round_trips, self.clients, self.label
        )
    }

    fn total(&self) -> u64 {
        (self.round_trips * self.clients) as u64
    }
}

/// The release server binary, killed when dropped.
struct ServerProcess(Child);

impl ServerProcess {
    fn launch(addr: SocketAddr) -> Self {
        let child = Command::new("cargo")
            .args(["run", "--release", "--bin", "incident-tonic-server", "--"])
            .arg("--server-addr")
            .arg(addr.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("could not spawn incident-tonic-server");
        Self(child)
    }

    /// Polls `addr` until it accepts a connection. A cold `cargo run` compiles
    /// first, so the deadline is generous.
    fn wait_until_listening(&self, addr: SocketAddr, within: Duration) {
        let deadline = Instant::now() + within;
        while TcpStream::connect(addr).is_err() {
            assert!(
                Instant::now() < deadline,
                "incident-tonic-server never listened on {addr}"
            );
            thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn report_then_get(c: &mut Criterion) {
    let addr: SocketAddr = ADDR.parse().unwrap();
    let server = ServerProcess::launch(addr);
    server.wait_until_listening(addr, Duration::from_secs(300));

    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("incident/report_then_get");

    for load in Load::all() {
        group.throughput(Throughput::Elements(load.total()));
        group.bench_function(load.name(), |b| {
            b.to_async(&rt).iter_custom(|iters| async move {
                let channel = Channel::from_shared(format!("http://{addr}"))
                    .unwrap()
                    .connect()
                    .await
                    .unwrap();

                let start = Instant::now();
                for _ in 0..iters {
                    drive(&channel, load).await;
                }
                start.elapsed()
            });
        });
    }

    group.finish();
    drop(server);
}

async fn drive(channel: &Channel, load: Load) {
    let mut clients = JoinSet::new();

    for _ in 0..load.clients {
        let mut client = IncidentServiceClient::new(channel.clone());
        if let Some(encoding) = load.encoding {
            client = client.send_compressed(encoding).accept_compressed(encoding);
        }

        clients.spawn(async move {
            for _ in 0..load.round_trips {
                let id = client
                    .report_incident(ReportIncidentRequest {
                        incident: Some(IncidentReport {
                            r#type: Some("benchmark".into()),
                            description: Some("synthetic load".into()),
                            anonymous: Some(true),
                            ..Default::default()
                        }),
                    })
                    .await
                    .unwrap()
                    .into_inner()
                    .id;

                let found = client
                    .get_incident(GetIncidentRequest { id })
                    .await
                    .unwrap()
                    .into_inner();
                black_box(found);
            }
        });
    }

    while let Some(joined) = clients.join_next().await {
        joined.unwrap();
    }
}

criterion_group!(benches, report_then_get);
criterion_main!(benches);
