//! Scripted backends shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use datastore::{Backend, Config, Error, Result, Scheme, Statement, Transactional, Tx, TxOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend counting opens and pings, with a configurable delay and outcome
#[derive(Default)]
pub struct ScriptedBackend {
    pub opens: AtomicUsize,
    pub pings: AtomicUsize,
    pub open_delay: Duration,
    pub fail_open: bool,
    pub fail_ping: bool,
    pub script: TxScript,
}

impl ScriptedBackend {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    type Client = JournalClient;

    const NAME: &'static str = "scripted";
    const SCHEME: Scheme = Scheme::Postgres;

    async fn open(&self, _config: &Config, uri: &str) -> Result<JournalClient> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_open {
            return Err(Error::Connection("connection refused".into()));
        }
        Ok(JournalClient::new(uri, self.script))
    }

    async fn ping(&self, _client: &JournalClient) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_ping {
            return Err(Error::Connection("server went away".into()));
        }
        Ok(())
    }
}

/// Which transaction steps fail
#[derive(Debug, Default, Clone, Copy)]
pub struct TxScript {
    pub fail_begin: bool,
    pub fail_exec: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

/// Client journaling every transaction step
#[derive(Debug, Clone)]
pub struct JournalClient {
    pub uri: String,
    pub script: TxScript,
    pub journal: Arc<Mutex<Vec<String>>>,
}

impl JournalClient {
    pub fn new(uri: &str, script: TxScript) -> Self {
        Self {
            uri: uri.to_string(),
            script,
            journal: Arc::default(),
        }
    }

    pub fn steps(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn count(&self, step: &str) -> usize {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == step)
            .count()
    }

    fn record(&self, step: &str) {
        self.journal.lock().unwrap().push(step.to_string());
    }
}

pub struct JournalTx {
    client: JournalClient,
}

#[async_trait]
impl Transactional for JournalClient {
    type Args = Vec<String>;
    type Tx = JournalTx;

    async fn begin(&self, _options: &TxOptions) -> Result<JournalTx> {
        self.record("begin");
        if self.script.fail_begin {
            return Err(Error::Connection("too many connections".into()));
        }
        Ok(JournalTx {
            client: self.clone(),
        })
    }
}

#[async_trait]
impl Tx for JournalTx {
    type Args = Vec<String>;

    async fn exec(&mut self, _statement: &Statement, args: Vec<String>) -> Result<u64> {
        self.client.record("exec");
        if self.client.script.fail_exec {
            return Err(Error::Connection("duplicate key value".into()));
        }
        Ok(args.len() as u64)
    }

    async fn commit(self) -> Result<()> {
        self.client.record("commit");
        if self.client.script.fail_commit {
            return Err(Error::Connection("could not serialize access".into()));
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.client.record("rollback");
        if self.client.script.fail_rollback {
            return Err(Error::Connection("connection reset".into()));
        }
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config::new("db.test", 5432)
        .credentials("app", "secret")
        .database("orders")
        .ssl_mode("disable")
}
