//! Demo binary: dials a loopback server with a client `Endpoint`, opens a
//! bidirectional stream, and drives both sides' poll loops until the
//! message round-trips. Mirrors `client.c`/`server.c`'s `start_loop`
//! shape, collapsed into one process so it doesn't need a second binary.

use std::time::Duration;

use tokio::time::sleep;

use rquic::config::Config;
use rquic::crypto::tls::NullTls;
use rquic::endpoint::Endpoint;
use rquic::stream::Direction;
use rquic::{time, QuicResult};

const LOCAL_CID_LEN: usize = 8;
const MAX_ITERATIONS: u32 = 500;

#[tokio::main]
async fn main() -> QuicResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server_socket = rquic::transmission::UdpTransmission::bind("127.0.0.1:0".parse().unwrap()).await?;
    let server_addr = server_socket.local_addr()?;
    let mut server = Endpoint::server(server_socket, Config::server(), LOCAL_CID_LEN, |is_client| {
        Box::new(NullTls::new(is_client)) as Box<dyn rquic::crypto::TlsEndpoint + Send>
    });

    let client_socket = rquic::transmission::UdpTransmission::bind("127.0.0.1:0".parse().unwrap()).await?;
    let mut client = Endpoint::client(client_socket, Config::client(), LOCAL_CID_LEN, |is_client| {
        Box::new(NullTls::new(is_client)) as Box<dyn rquic::crypto::TlsEndpoint + Send>
    });

    let client_cid = client.connect(server_addr)?;
    {
        let session = client.session_mut(&client_cid).expect("just connected");
        let stream_id = session.open_stream(Direction::Bidi)?;
        session.stream_write(stream_id, b"hello from rquic", true)?;
    }

    let mut server_cid = None;
    for _ in 0..MAX_ITERATIONS {
        let now = time::now();
        client.drive_sends(now).await?;
        server.drive_sends(now).await?;

        tokio::select! {
            result = client.recv_and_dispatch(now) => result?,
            result = server.recv_and_dispatch(now) => result?,
            _ = sleep(Duration::from_millis(2)) => {}
        }

        if server_cid.is_none() {
            server_cid = server.try_accept();
        }

        if let Some(id) = &server_cid {
            let done = server
                .session_mut(id)
                .map(|session| session.is_handshake_confirmed())
                .unwrap_or(false);
            if done {
                break;
            }
        }
    }

    let Some(id) = server_cid else {
        tracing::warn!("server never accepted a session within the iteration budget");
        return Ok(());
    };
    let session = server.session_mut(&id).expect("accepted session still live");
    let stream_id = rquic::stream::StreamId::initial(rquic::stream::Side::Client, Direction::Bidi);

    if let Ok((data, fin)) = session.stream_read(stream_id, 64).await {
        println!("server received {} bytes (fin={}): {:?}", data.len(), fin, String::from_utf8_lossy(&data));
    }

    Ok(())
}
