use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use waitline_testserver::{PATH_API, PATH_WS, QueueMode, ServerOptions};

fn parse_mode(raw: &str) -> anyhow::Result<QueueMode> {
    Ok(match raw {
        "immediate" => QueueMode::Immediate,
        "admit" => QueueMode::Admit {
            ranks: vec![7, 3, 1],
            interval: Duration::from_secs(1),
        },
        "silent" => QueueMode::Silent { rank: 50 },
        "refuse" => QueueMode::Refuse {
            message: "queue closed".to_string(),
        },
        other => anyhow::bail!("unknown queue mode: {other} (immediate|admit|silent|refuse)"),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = ServerOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--queue" => {
                let mode = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--queue requires a mode"))?;
                options.queue = parse_mode(&mode)?;
            }
            "-h" | "--help" => {
                eprintln!(
                    "waitline-testserver\n\nUSAGE:\n  waitline-testserver [--bind 127.0.0.1:0] [--queue immediate|admit|silent|refuse]\n\nOUTPUT:\n  Prints BASE_URL=<url> and WS_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = waitline_testserver::TestServerStats::default();
    let app = waitline_testserver::router(options, stats);

    println!("BASE_URL=http://{addr}{PATH_API}");
    println!("WS_URL=ws://{addr}{PATH_WS}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
