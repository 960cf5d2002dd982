//! Optional file sink for log records.
//!
//! `env_logger` formats records on the calling thread and hands the bytes to an
//! unbounded channel. The [`Logger`] service owns the receiving end and appends
//! everything it drains to the configured file.

use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use env_logger::Builder;
use log::LevelFilter;
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use tokio::{
    fs::{create_dir_all, File, OpenOptions},
    io::{AsyncWrite, AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::config;

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sender
            .send(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    config: config::Log,
}

impl Logger {
    pub fn new(config: config::Log) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            config,
        }
    }

    fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }

    /// Route the global logger into this sink. `RUST_LOG` still applies on top of
    /// the `info` default.
    pub fn init_env_logger(&self) {
        let writer = self.create_async_writer();
        Builder::new()
            .filter_level(LevelFilter::Info)
            .parse_env(env_logger::Env::default())
            .target(env_logger::Target::Pipe(Box::new(writer)))
            .init();
    }

    async fn open(path: &str) -> io::Result<BufWriter<File>> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(BufWriter::new(file))
    }

    /// Write every record still queued, returning how many could not be written.
    async fn drain_pending<W: AsyncWrite + Unpin>(&mut self, file: &mut W) -> usize {
        let mut failed = 0;
        while let Ok(data) = self.receiver.try_recv() {
            if !write_record(file, &data).await {
                failed += 1;
            }
        }
        failed
    }
}

async fn write_record<W: AsyncWrite + Unpin>(file: &mut W, data: &[u8]) -> bool {
    match file.write_all(data).await {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Failed to write to log file: {e}");
            false
        }
    }
}

#[async_trait]
impl Service for Logger {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        let mut file = match Self::open(&self.config.path).await {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Unable to open log file {}: {e}", self.config.path);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            write_record(&mut file, &data).await;
                        }
                        None => break,
                    }
                }
            }
        }

        // drain what was logged before shutdown
        self.drain_pending(&mut file).await;

        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {e}");
        }
    }

    fn name(&self) -> &'static str {
        "log sync"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}
