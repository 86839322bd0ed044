use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use semivibe_transport::DeviceStream;
use tracing::trace;

use crate::codec::{decode_response, FrameConfig, Response, EXIT, FRAME_LEN};
use crate::error::{transport_to_frame_error, FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64;
const READ_CHUNK_SIZE: usize = 64;

/// One unit received on the server side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Six raw bytes, not yet validated as hex.
    Frame([u8; FRAME_LEN]),
    /// The driver's `exit` token.
    Exit,
}

/// Reads fixed-width frames from any `Read` stream.
///
/// Handles partial reads internally. Bytes already received stay buffered
/// when a read times out, so a caller may retry after `WouldBlock` or
/// `TimedOut` without losing its place in the stream.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next command frame or `exit` token (blocking).
    ///
    /// `exit` is recognised only at a frame boundary. Returns
    /// `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Inbound> {
        self.fill(EXIT.len())?;
        if self.buf[..EXIT.len()] == EXIT[..] {
            let _ = self.buf.split_to(EXIT.len());
            trace!("exit token received");
            return Ok(Inbound::Exit);
        }

        self.fill(FRAME_LEN)?;
        let mut raw = [0u8; FRAME_LEN];
        raw.copy_from_slice(&self.buf.split_to(FRAME_LEN));
        Ok(Inbound::Frame(raw))
    }

    /// Read the next response frame (blocking) and decode it.
    pub fn read_response(&mut self) -> Result<Response> {
        let raw = self.read_bytes(FRAME_LEN)?;
        decode_response(&raw)
    }

    /// Read exactly `len` bytes (blocking).
    ///
    /// Used for out-of-band tokens such as the `ACK` greeting.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.fill(len)?;
        Ok(self.buf.split_to(len).freeze())
    }

    /// Number of bytes received but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn fill(&mut self, len: usize) -> Result<()> {
        while self.buf.len() < len {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    trace!(pending = self.buf.len(), "stream closed mid-frame");
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<DeviceStream> {
    /// Create a frame reader for `DeviceStream` and apply read timeout from config.
    pub fn with_config_stream(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    use super::*;
    use crate::codec::{ErrorCode, Frame};

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr should resolve");
        let client = TcpStream::connect(addr).expect("connect should succeed");
        let (server, _) = listener.accept().expect("accept should succeed");
        (client, server)
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"310180".to_vec()));
        let inbound = reader.read_frame().unwrap();
        assert_eq!(inbound, Inbound::Frame(*b"310180"));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn read_back_to_back_frames() {
        let mut reader = FrameReader::new(Cursor::new(b"10100021000031018".to_vec()));

        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"101000"));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"210000"));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn exit_at_frame_boundary() {
        let mut reader = FrameReader::new(Cursor::new(b"101000exit".to_vec()));

        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"101000"));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Exit);
    }

    #[test]
    fn exit_inside_frame_is_not_a_token() {
        let mut reader = FrameReader::new(Cursor::new(b"10exit".to_vec()));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"10exit"));
    }

    #[test]
    fn non_hex_bytes_still_form_a_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"zzzzzz".to_vec()));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"zzzzzz"));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"4FB103exit".to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"4FB103"));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Exit);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"3101".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn read_ack_then_response() {
        let mut reader = FrameReader::new(Cursor::new(b"ACK3100802FFFFF".to_vec()));

        assert_eq!(reader.read_bytes(3).unwrap().as_ref(), b"ACK");
        assert_eq!(
            reader.read_response().unwrap(),
            Response::Value(Frame {
                region: 3,
                offset: 0x10,
                rw: 0,
                data: 0x80
            })
        );
        assert_eq!(
            reader.read_response().unwrap(),
            Response::Error(ErrorCode::Invalid)
        );
    }

    #[test]
    fn garbled_response_is_a_decode_error() {
        let mut reader = FrameReader::new(Cursor::new(b"31??80".to_vec()));
        let err = reader.read_response().unwrap_err();
        assert!(matches!(err, FrameError::NotHex { position: 2, .. }));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        assert!(reader.config().read_timeout.is_none());
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[test]
    fn read_would_block_keeps_partial_frame() {
        let reader = WouldBlockMidFrame {
            chunks: vec![Ok(b"310".to_vec()), Err(ErrorKind::WouldBlock), Ok(b"180".to_vec())],
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert_eq!(framed.buffered(), 3);

        assert_eq!(framed.read_frame().unwrap(), Inbound::Frame(*b"310180"));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = WouldBlockMidFrame {
            chunks: vec![Err(ErrorKind::Interrupted), Ok(b"210000".to_vec())],
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap(), Inbound::Frame(*b"210000"));
    }

    #[test]
    fn applies_read_timeout_for_device_stream() {
        let (_client, server) = tcp_pair();
        let stream = DeviceStream::from_tcp(server).expect("wrap should succeed");

        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config_stream(stream, cfg).expect("timeout should apply");

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }

    #[test]
    fn roundtrip_over_tcp() {
        let (client, server) = tcp_pair();
        let mut writer = crate::writer::FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_frame(&Frame::write(4, 0xFB, 0x03)).unwrap();
        writer.write_raw(EXIT).unwrap();

        assert_eq!(reader.read_frame().unwrap(), Inbound::Frame(*b"4FB103"));
        assert_eq!(reader.read_frame().unwrap(), Inbound::Exit);
    }

    #[test]
    fn concurrent_reader_writer_threads() {
        let (client, server) = tcp_pair();
        let mut writer = crate::writer::FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let reader_thread = std::thread::spawn(move || {
            for expected in 0..64u8 {
                let inbound = reader.read_frame().unwrap();
                let wire = crate::codec::encode_frame(&Frame::write(3, 0x10, expected)).unwrap();
                assert_eq!(inbound, Inbound::Frame(wire));
            }
        });

        for i in 0..64u8 {
            writer.write_frame(&Frame::write(3, 0x10, i)).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct WouldBlockMidFrame {
        chunks: Vec<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Read for WouldBlockMidFrame {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            match self.chunks.remove(0) {
                Ok(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(kind) => Err(std::io::Error::from(kind)),
            }
        }
    }
}
