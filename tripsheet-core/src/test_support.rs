//! In-crate doubles for the network-facing capabilities.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ingest::{CsvSource, SheetError};
use crate::sync::{RemoteWriteError, RemoteWriter, WriteRequest, WriteResponse};

/// Records every request and answers from a per-item script.
#[derive(Default)]
pub(crate) struct ScriptedWriter {
    sent: Mutex<Vec<WriteRequest>>,
    failures: Mutex<HashMap<String, RemoteWriteError>>,
    fail_all: Mutex<Option<RemoteWriteError>>,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request for `item_id` fails with `error` until cleared.
    pub fn fail_for(&self, item_id: &str, error: RemoteWriteError) {
        self.failures
            .lock()
            .unwrap()
            .insert(item_id.to_string(), error);
    }

    pub fn fail_everything(&self, error: RemoteWriteError) {
        *self.fail_all.lock().unwrap() = Some(error);
    }

    pub fn succeed_everything(&self) {
        *self.fail_all.lock().unwrap() = None;
        self.failures.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<WriteRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteWriter for ScriptedWriter {
    async fn send(&self, request: &WriteRequest) -> Result<WriteResponse, RemoteWriteError> {
        self.sent.lock().unwrap().push(request.clone());

        if let Some(error) = self.fail_all.lock().unwrap().clone() {
            return Err(error);
        }
        let scripted = request
            .item_id
            .as_ref()
            .and_then(|id| self.failures.lock().unwrap().get(id).cloned());
        if let Some(error) = scripted {
            return Err(error);
        }

        Ok(WriteResponse {
            success: true,
            message: format!("{} ok", request.operation),
            data: None,
        })
    }
}

/// Serves canned CSV bodies by tab id.
#[derive(Default)]
pub(crate) struct FixedCsvSource {
    sheets: Mutex<HashMap<String, Result<String, SheetError>>>,
}

impl FixedCsvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, gid: &str, csv: &str) {
        self.sheets
            .lock()
            .unwrap()
            .insert(gid.to_string(), Ok(csv.to_string()));
    }

    pub fn fail(&self, gid: &str, error: SheetError) {
        self.sheets
            .lock()
            .unwrap()
            .insert(gid.to_string(), Err(error));
    }
}

#[async_trait]
impl CsvSource for FixedCsvSource {
    async fn fetch(&self, gid: &str) -> Result<String, SheetError> {
        self.sheets
            .lock()
            .unwrap()
            .get(gid)
            .cloned()
            .unwrap_or(Err(SheetError::Status(404)))
    }
}
