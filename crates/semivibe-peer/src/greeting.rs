use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use semivibe_frame::{FrameError, FrameReader, FrameWriter, ACK};
use tracing::debug;

use crate::error::GreetingError;

/// Send the `ACK` greeting on a freshly accepted connection.
pub fn send_greeting<W: Write>(writer: &mut FrameWriter<W>) -> Result<(), FrameError> {
    writer.write_raw(ACK)?;
    debug!("greeting sent");
    Ok(())
}

/// Wait for the `ACK` greeting on a freshly opened connection.
///
/// Read timeouts shorter than `timeout` are retried until the deadline; the
/// partial greeting stays buffered in the reader between attempts.
pub fn expect_greeting<R: Read>(
    reader: &mut FrameReader<R>,
    timeout: Duration,
) -> Result<(), GreetingError> {
    let deadline = Instant::now() + timeout;
    loop {
        match reader.read_bytes(ACK.len()) {
            Ok(bytes) if bytes.as_ref() == ACK => {
                debug!("greeting received");
                return Ok(());
            }
            Ok(bytes) => {
                return Err(GreetingError::Unexpected(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ));
            }
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                if Instant::now() >= deadline {
                    return Err(GreetingError::Timeout(timeout));
                }
            }
            Err(FrameError::ConnectionClosed) => return Err(GreetingError::Disconnected),
            Err(err) => return Err(GreetingError::Frame(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn greeting_round_trip() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        send_greeting(&mut writer).expect("greeting should be written");

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"ACK");

        let mut reader = FrameReader::new(Cursor::new(wire));
        expect_greeting(&mut reader, Duration::from_secs(1)).expect("greeting should match");
    }

    #[test]
    fn greeting_leaves_following_frames_buffered() {
        let mut reader = FrameReader::new(Cursor::new(b"ACK310080".to_vec()));
        expect_greeting(&mut reader, Duration::from_secs(1)).expect("greeting should match");
        assert!(reader.read_response().is_ok());
    }

    #[test]
    fn wrong_greeting_rejected() {
        let mut reader = FrameReader::new(Cursor::new(b"NAK".to_vec()));
        let err = expect_greeting(&mut reader, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, GreetingError::Unexpected(ref got) if got == "NAK"));
    }

    #[test]
    fn closed_before_greeting() {
        let mut reader = FrameReader::new(Cursor::new(b"AC".to_vec()));
        let err = expect_greeting(&mut reader, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, GreetingError::Disconnected));
    }

    #[test]
    fn silent_server_times_out() {
        let mut reader = FrameReader::new(AlwaysTimesOut);
        let err = expect_greeting(&mut reader, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, GreetingError::Timeout(_)));
    }

    struct AlwaysTimesOut;

    impl Read for AlwaysTimesOut {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
