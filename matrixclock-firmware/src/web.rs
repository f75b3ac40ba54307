//! HTTP on port 80
//!
//! The configuration server keeps one listening socket. Each loop pass
//! checks it without waiting: a connection that is already established is
//! read, handed to the route handler and closed; anything else is left for
//! a later pass.

use defmt::*;
use embassy_futures::poll_once;
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write as _;
use static_cell::StaticCell;

use matrixclock_core::traits::WebPort;
use matrixclock_protocol::http::{message_len, MAX_REQUEST_SIZE};
use matrixclock_protocol::{Request, Response, StatusCode};

/// Listening port
pub const HTTP_PORT: u16 = 80;

/// Socket buffer sizes
const RX_BUFFER_SIZE: usize = 2048;
const TX_BUFFER_SIZE: usize = 4096;

/// Longest wait for more request bytes
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest wait for the peer to acknowledge a response
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Read one request into `buf`; returns its length
///
/// Reads until the header block and any announced body have arrived.
/// Returns `None` on timeout, disconnect or a request larger than `buf`.
pub async fn read_request(socket: &mut TcpSocket<'_>, buf: &mut [u8]) -> Option<usize> {
    let mut len = 0;
    loop {
        if let Some(total) = message_len(&buf[..len]) {
            if len >= total {
                return Some(total);
            }
        }
        if len == buf.len() {
            warn!("HTTP request larger than {} bytes", buf.len());
            return None;
        }
        match with_timeout(READ_TIMEOUT, socket.read(&mut buf[len..])).await {
            Ok(Ok(0)) => return None,
            Ok(Ok(n)) => len += n,
            Ok(Err(e)) => {
                warn!("HTTP read error: {:?}", e);
                return None;
            }
            Err(_) => {
                debug!("HTTP read timed out after {} bytes", len);
                return None;
            }
        }
    }
}

/// Send a response and close the connection
pub async fn write_response(socket: &mut TcpSocket<'_>, response: &Response) {
    let head = response.head();
    let result = match socket.write_all(head.as_bytes()).await {
        Ok(()) => socket.write_all(response.body().as_bytes()).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!("HTTP write error: {:?}", e);
    }
    socket.close();
    let _ = with_timeout(FLUSH_TIMEOUT, socket.flush()).await;
}

/// Parse `raw`, answering malformed requests with 400
pub fn dispatch<F>(raw: &[u8], mut handler: F) -> Response
where
    F: FnMut(&Request<'_>) -> Response,
{
    match Request::parse(raw) {
        Ok(request) => {
            info!("HTTP {} {}", request.method, request.path);
            handler(&request)
        }
        Err(e) => {
            warn!("Malformed HTTP request: {:?}", e);
            Response::plain(StatusCode::BadRequest, "Bad Request\n")
        }
    }
}

/// The configuration web server
pub struct HttpServer {
    socket: TcpSocket<'static>,
    request: &'static mut [u8; MAX_REQUEST_SIZE],
}

impl HttpServer {
    pub fn new(stack: Stack<'static>) -> Self {
        static RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
        static TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
        static REQUEST_BUFFER: StaticCell<[u8; MAX_REQUEST_SIZE]> = StaticCell::new();

        let mut socket = TcpSocket::new(
            stack,
            RX_BUFFER.init([0; RX_BUFFER_SIZE]),
            TX_BUFFER.init([0; TX_BUFFER_SIZE]),
        );
        socket.set_timeout(Some(Duration::from_secs(10)));

        let mut server = Self {
            socket,
            request: REQUEST_BUFFER.init([0; MAX_REQUEST_SIZE]),
        };
        server.listen();
        info!("HTTP server listening on port {}", HTTP_PORT);
        server
    }

    /// Put the socket into LISTEN without waiting for a peer
    fn listen(&mut self) {
        if let core::task::Poll::Ready(Err(e)) = poll_once(self.socket.accept(HTTP_PORT)) {
            warn!("HTTP listen failed: {:?}", e);
        }
    }

    /// Drop whatever is left of the previous connection and listen again
    fn recycle(&mut self) {
        self.socket.abort();
        self.listen();
    }
}

impl WebPort for HttpServer {
    async fn poll<F>(&mut self, handler: F) -> bool
    where
        F: FnMut(&Request<'_>) -> Response,
    {
        match self.socket.state() {
            State::Established | State::CloseWait => {}
            State::Listen | State::SynReceived => return false,
            State::Closed => {
                self.listen();
                return false;
            }
            _ => {
                self.recycle();
                return false;
            }
        }

        let Some(len) = read_request(&mut self.socket, &mut self.request[..]).await else {
            self.recycle();
            return false;
        };

        let response = dispatch(&self.request[..len], handler);
        write_response(&mut self.socket, &response).await;
        self.recycle();
        true
    }
}
