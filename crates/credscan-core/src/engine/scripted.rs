//! In-process engine with a fixed reply, for pipeline and orchestrator tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use credscan_types::{DocumentSide, EngineInfo, ErrorKind, RawFields};

use crate::engine::{EngineError, RecognitionEngine};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Fields(RawFields),
    Fail(ErrorKind, String),
}

/// Blocks `extract` until [`Gate::open`] is called.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub(crate) fn open(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = true;
            self.cond.notify_all();
        }
    }

    fn wait(&self) {
        let Ok(mut open) = self.open.lock() else {
            return;
        };
        while !*open {
            open = match self.cond.wait(open) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedEngine {
    reply: Reply,
    precheck: bool,
    latency: Option<Duration>,
    gate: Option<Gate>,
    entered: AtomicUsize,
    returned: AtomicUsize,
}

impl ScriptedEngine {
    pub(crate) fn returning(fields: RawFields) -> Self {
        Self::with_reply(Reply::Fields(fields))
    }

    pub(crate) fn failing(kind: ErrorKind, message: &str) -> Self {
        Self::with_reply(Reply::Fail(kind, message.to_owned()))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            precheck: true,
            latency: None,
            gate: None,
            entered: AtomicUsize::new(0),
            returned: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_precheck(mut self, answer: bool) -> Self {
        self.precheck = answer;
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Hold every `extract` call until [`ScriptedEngine::release`].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Gate::default());
        self
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.open();
        }
    }

    /// Number of `extract` calls that have started.
    pub(crate) fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Number of `extract` calls that have returned.
    pub(crate) fn returned(&self) -> usize {
        self.returned.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn extract(&self, _image_path: &Path, _side: DocumentSide) -> Result<RawFields, EngineError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let reply = match &self.reply {
            Reply::Fields(fields) => Ok(fields.clone()),
            Reply::Fail(kind, message) => Err(EngineError::reported(*kind, message.clone())),
        };
        self.returned.fetch_add(1, Ordering::SeqCst);
        reply
    }

    fn precheck(&self, _image_path: &Path, _side: DocumentSide) -> bool {
        self.precheck
    }

    fn engine_info(&self) -> EngineInfo {
        EngineInfo::new("scripted", "test").with_capability("front_data_extraction")
    }
}

/// Raw output for a complete T2 front side.
pub(crate) fn t2_front_fields() -> RawFields {
    RawFields::new()
        .with("fullName", "JUAN PEREZ LOPEZ")
        .with("address", "AV SIEMPRE VIVA 742")
        .with("curp", "GALJ900101HDFRRN09")
        .with("voterKey", "PRLPJN90010109H100")
        .with("birthDate", "01/01/1990")
        .with("sex", "H")
        .with("section", "1234")
        .with("state", "CDMX")
        .with("municipality", "COYOACAN")
}

/// Raw output for a complete back side.
pub(crate) fn back_fields() -> RawFields {
    RawFields::new()
        .with("mrzContent", "IDMEX1234567890<<\n9001017H3012315MEX<<\nPEREZ<<JUAN")
        .with("mrzDocumentNumber", "1234567890")
        .with("mrzNationality", "MEX")
        .with("mrzName", "PEREZ<<JUAN")
}
