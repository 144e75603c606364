//! User-facing notices, delivered through an injected capability instead of a
//! process-wide toast bridge.

use crate::tracker::OpId;
use std::sync::Mutex;
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub op_id: Option<OpId>,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(op_id: Option<OpId>, level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            op_id,
            level,
            message: message.into(),
        }
    }
}

pub trait CartNotifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Default notifier: turns notices into log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl CartNotifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let op_id = notice
            .op_id
            .map(|op_id| op_id.to_string())
            .unwrap_or_default();
        match notice.level {
            NoticeLevel::Info => event!(Level::INFO, op_id = %op_id, "{}", notice.message),
            NoticeLevel::Warning => event!(Level::WARN, op_id = %op_id, "{}", notice.message),
            NoticeLevel::Error => event!(Level::ERROR, op_id = %op_id, "{}", notice.message),
        }
    }
}

/// Keeps every notice in memory; handy for UI shells that drain notices on render.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }
}

impl CartNotifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
