//! Output relay workers.
//!
//! Each worker is a thread that copies one of the child's output pipes to a
//! writer until the pipe reaches end of file. Workers are started before
//! the child exists and receive their pipe over a channel: once the PID
//! namespace for children has been unshared, the kernel refuses to create
//! new threads in this process.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use dockling_common::error::LaunchError;

type Source = Box<dyn Read + Send>;

/// A running relay thread for one output stream.
#[derive(Debug)]
pub struct RelayWorker<W> {
    stream: &'static str,
    sender: Option<Sender<Source>>,
    handle: JoinHandle<io::Result<(W, u64)>>,
}

impl<W: Write + Send + 'static> RelayWorker<W> {
    /// Starts a worker named after `stream` that will write into `writer`.
    ///
    /// The worker idles until a source is attached. If it is finished
    /// without one, it copies nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] if the thread cannot be created.
    pub fn start(stream: &'static str, mut writer: W) -> Result<Self, LaunchError> {
        let (sender, receiver) = mpsc::channel::<Source>();
        let handle = thread::Builder::new()
            .name(format!("relay-{stream}"))
            .spawn(move || -> io::Result<(W, u64)> {
                let copied = match receiver.recv() {
                    Ok(mut source) => io::copy(&mut source, &mut writer)?,
                    Err(_) => 0,
                };
                writer.flush()?;
                Ok((writer, copied))
            })
            .map_err(|source| LaunchError::Relay { stream, source })?;

        tracing::trace!(stream, "relay worker started");
        Ok(Self {
            stream,
            sender: Some(sender),
            handle,
        })
    }

    /// Hands the pipe to copy from to the worker. A worker accepts one source.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] if a source was already attached or
    /// the worker has already stopped.
    pub fn attach(&mut self, source: impl Read + Send + 'static) -> Result<(), LaunchError> {
        let stream = self.stream;
        let sender = self.sender.take().ok_or_else(|| LaunchError::Relay {
            stream,
            source: io::Error::new(io::ErrorKind::AlreadyExists, "source already attached"),
        })?;
        sender
            .send(Box::new(source))
            .map_err(|_| LaunchError::Relay {
                stream,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "relay worker has stopped"),
            })
    }

    /// Waits for the worker to drain its source.
    ///
    /// Returns the writer and the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] if copying failed or the worker panicked.
    pub fn finish(mut self) -> Result<(W, u64), LaunchError> {
        let stream = self.stream;
        // Without a source the worker must see the channel close to stop.
        drop(self.sender.take());

        let (writer, copied) = self
            .handle
            .join()
            .map_err(|_| LaunchError::Relay {
                stream,
                source: io::Error::other("relay worker panicked"),
            })?
            .map_err(|source| LaunchError::Relay { stream, source })?;

        tracing::debug!(stream, bytes = copied, "relay finished");
        Ok((writer, copied))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn attached_source_is_copied_verbatim() {
        let mut worker = RelayWorker::start("stdout", Vec::new()).unwrap();
        let data: Vec<u8> = (0..=255).cycle().take(100_000).collect();
        worker.attach(Cursor::new(data.clone())).unwrap();

        let (out, copied) = worker.finish().unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn worker_without_source_copies_nothing() {
        let worker = RelayWorker::start("stderr", Vec::new()).unwrap();
        let (out, copied) = worker.finish().unwrap();
        assert_eq!(copied, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn second_source_is_rejected() {
        let mut worker = RelayWorker::start("stdout", Vec::new()).unwrap();
        worker.attach(Cursor::new(b"one".to_vec())).unwrap();
        let err = worker.attach(Cursor::new(b"two".to_vec())).unwrap_err();
        assert!(matches!(err, LaunchError::Relay { stream: "stdout", .. }));

        let (out, _) = worker.finish().unwrap();
        assert_eq!(out, b"one");
    }

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_reported_for_the_stream() {
        let mut worker = RelayWorker::start("stderr", FailingWriter).unwrap();
        worker.attach(Cursor::new(b"payload".to_vec())).unwrap();
        let err = worker.finish().unwrap_err();
        assert!(matches!(err, LaunchError::Relay { stream: "stderr", .. }));
    }
}
