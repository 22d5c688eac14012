//! Session channel over a byte stream carrying one JSON object per line.

use std::{
    io::{BufRead, BufReader, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use tabletop_core::{ChannelError, Envelope, Intent};
use tracing::{debug, info, warn};

use crate::{wire, Channel};

/// Channel that writes intents to a stream and decodes envelopes on a reader thread.
///
/// The reader thread only decodes lines and forwards them; the owner drains
/// them through [`Channel::try_recv`].
pub struct StreamChannel {
    writer: Box<dyn Write + Send>,
    inbound: Receiver<Result<Envelope, ChannelError>>,
}

impl std::fmt::Debug for StreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel").finish_non_exhaustive()
    }
}

impl StreamChannel {
    /// Connects to a session service over TCP.
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(address).map_err(io_error)?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "connected to session service");
        }
        stream.set_nodelay(true).map_err(io_error)?;
        let reader = stream.try_clone().map_err(io_error)?;
        Self::from_parts(BufReader::new(reader), stream)
    }

    /// Builds a channel from an already established reader and writer pair.
    pub fn from_parts<R, W>(reader: R, writer: W) -> Result<Self, ChannelError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let (sender, inbound) = mpsc::channel();
        let _ = thread::Builder::new()
            .name("session-reader".to_owned())
            .spawn(move || read_lines(reader, &sender))
            .map_err(io_error)?;

        Ok(Self {
            writer: Box::new(writer),
            inbound,
        })
    }
}

impl Channel for StreamChannel {
    fn send(&mut self, intent: Intent) -> Result<(), ChannelError> {
        let line = wire::encode_intent(&intent)?;
        writeln!(self.writer, "{line}").map_err(io_error)?;
        self.writer.flush().map_err(io_error)
    }

    fn try_recv(&mut self) -> Result<Option<Envelope>, ChannelError> {
        match self.inbound.try_recv() {
            Ok(Ok(envelope)) => Ok(Some(envelope)),
            Ok(Err(error)) => Err(error),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}

fn read_lines<R: BufRead>(mut reader: R, sender: &mpsc::Sender<Result<Envelope, ChannelError>>) {
    let mut bytes = Vec::new();
    loop {
        bytes.clear();
        match reader.read_until(b'\n', &mut bytes) {
            Ok(0) => {
                debug!("session stream reached end of input");
                break;
            }
            Ok(_) => {
                let line = match std::str::from_utf8(&bytes) {
                    Ok(line) => line,
                    Err(error) => {
                        warn!(%error, "dropping inbound line that is not utf-8");
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match wire::decode_line(line) {
                    Ok(envelope) => {
                        if sender.send(Ok(envelope)).is_err() {
                            break;
                        }
                    }
                    Err(error) => warn!(%error, "dropping inbound line"),
                }
            }
            Err(error) => {
                warn!(%error, "session stream read failed");
                let _ = sender.send(Err(io_error(error)));
                break;
            }
        }
    }
}

fn io_error(error: std::io::Error) -> ChannelError {
    ChannelError::Io(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    };

    use tabletop_core::{EntityId, GridCell, Inbound};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn drain(channel: &mut StreamChannel) -> (Vec<Envelope>, Option<ChannelError>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while Instant::now() < deadline {
            match channel.try_recv() {
                Ok(Some(envelope)) => received.push(envelope),
                Ok(None) => thread::sleep(Duration::from_millis(5)),
                Err(error) => return (received, Some(error)),
            }
        }
        (received, None)
    }

    #[test]
    fn decodes_lines_and_skips_malformed_ones() {
        let input = concat!(
            "{\"seq\":1,\"type\":\"entity_removed\",\"entity\":\"orc\"}\n",
            "\n",
            "not json\n",
            "{\"type\":\"error_notice\",\"detail\":\"slow down\"}\n",
        );
        let mut channel =
            StreamChannel::from_parts(Cursor::new(input), SharedBuffer::default()).expect("spawn");

        let (received, error) = drain(&mut channel);

        assert_eq!(
            received,
            vec![
                Envelope::sequenced(
                    1,
                    Inbound::EntityRemoved {
                        entity: EntityId::new("orc")
                    }
                ),
                Envelope::unsequenced(Inbound::ErrorNotice {
                    detail: "slow down".to_owned()
                }),
            ]
        );
        assert_eq!(error, Some(ChannelError::Disconnected));
    }

    #[test]
    fn skips_lines_that_are_not_utf8() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(b"{\"type\":\"error_notice\",\"detail\":\"still here\"}\n");
        let mut channel =
            StreamChannel::from_parts(Cursor::new(input), SharedBuffer::default()).expect("spawn");

        let (received, error) = drain(&mut channel);

        assert_eq!(
            received,
            vec![Envelope::unsequenced(Inbound::ErrorNotice {
                detail: "still here".to_owned()
            })]
        );
        assert_eq!(error, Some(ChannelError::Disconnected));
    }

    #[test]
    fn writes_one_intent_per_line() {
        let buffer = SharedBuffer::default();
        let mut channel =
            StreamChannel::from_parts(Cursor::new(String::new()), buffer.clone()).expect("spawn");

        channel
            .send(Intent::RequestMove {
                entity: EntityId::new("orc"),
                target: GridCell::new(1, 2),
            })
            .expect("send");
        channel
            .send(Intent::RequestEntityList {
                code: "crypt".to_owned(),
            })
            .expect("send");

        let written = String::from_utf8(buffer.0.lock().expect("buffer lock").clone())
            .expect("utf-8 output");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"type\":\"request_move\""));
        assert!(lines[1].contains("\"code\":\"crypt\""));
    }
}
