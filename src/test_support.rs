//! Recording fakes for the process and object-storage seams.

use anyhow::Result;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use crate::backup::s3_upload::ObjectStore;
use crate::utils::process::ProcessRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCall {
    pub program: String,
    pub args: Vec<String>,
}

type Hook = Box<dyn Fn(&str, &[String]) -> Result<()> + Send + Sync>;

/// Records every command; `hook` decides the outcome and may touch the filesystem
/// the way the real tool would.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ProcessCall>>,
    hook: Option<Hook>,
}

impl RecordingRunner {
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<()> + Send + Sync + 'static,
    {
        RecordingRunner {
            calls: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    pub fn calls(&self) -> Vec<ProcessCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ProcessCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(ProcessCall {
            program: program.to_string(),
            args: args.to_vec(),
        });
        match &self.hook {
            Some(hook) => hook(program, args),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upload {
        bucket: String,
        key: String,
        file: PathBuf,
    },
    List {
        bucket: String,
        prefix: String,
    },
    Delete {
        bucket: String,
        key: String,
    },
}

/// In-memory object store. Uploaded keys become listable.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub calls: Mutex<Vec<StoreCall>>,
    pub keys: Mutex<Vec<String>>,
    pub fail_uploads: bool,
    pub fail_deletes: HashSet<String>,
}

impl RecordingStore {
    pub fn with_keys(keys: &[&str]) -> Self {
        RecordingStore {
            keys: Mutex::new(keys.iter().map(|k| k.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::Upload { .. }))
            .count()
    }
}

impl ObjectStore for RecordingStore {
    async fn upload(&self, bucket: &str, key: &str, file_path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(StoreCall::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            file: file_path.to_path_buf(),
        });
        if self.fail_uploads {
            anyhow::bail!("access denied");
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(StoreCall::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        });
        Ok(self
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix) && !k[prefix.len()..].contains('/'))
            .collect())
    }

    async fn delete_key(&self, bucket: &str, key: &str) -> Result<()> {
        self.calls.lock().unwrap().push(StoreCall::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if self.fail_deletes.contains(key) {
            anyhow::bail!("cannot delete {}", key);
        }
        self.keys.lock().unwrap().retain(|k| k != key);
        Ok(())
    }
}

/// Formatted log output collected by [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures this thread's logs with the same default `info` filter as `main`.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
