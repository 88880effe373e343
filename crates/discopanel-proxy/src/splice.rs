use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Copies bytes from `r` to `w` using a fixed-size buffer until `r` hits
/// EOF or either side errors, then half-closes `w`'s write side.
async fn pump<R, W>(mut r: R, mut w: W, buf_size: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buf_size];
    loop {
        let n = r.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        w.write_all(&buf[..n]).await?;
    }
    let _ = w.shutdown().await;
    Ok(())
}

/// Splices `client` and `backend` in both directions until either side
/// closes or errors. On one side's EOF, the other is half-closed and
/// allowed to drain before the connection is torn down. This is line-rate
/// I/O — no framing or reordering beyond what TCP itself guarantees.
pub async fn splice(client: TcpStream, backend: TcpStream, buf_size: usize) {
    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let client_to_backend = pump(client_read, backend_write, buf_size);
    let backend_to_client = pump(backend_read, client_write, buf_size);

    let _ = tokio::join!(client_to_backend, backend_to_client);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt as _;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn splices_bytes_in_both_directions() {
        let client_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_listener.local_addr().unwrap();
        let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend_listener.local_addr().unwrap();

        let client_side = tokio::spawn(async move {
            let mut s = TcpStream::connect(client_addr).await.unwrap();
            s.write_all(b"ping").await.unwrap();
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"pong");
        });

        let backend_side = tokio::spawn(async move {
            let (mut s, _) = backend_listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
            s.write_all(b"pong").await.unwrap();
        });

        let (client, _) = client_listener.accept().await.unwrap();
        let backend = TcpStream::connect(backend_addr).await.unwrap();

        let splicer = tokio::spawn(splice(client, backend, 4096));

        client_side.await.unwrap();
        backend_side.await.unwrap();
        splicer.await.unwrap();
    }
}
