// content-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared stubs for artifact stores, watermarkers, and channels.
// Purpose: Drive the runtime services without filesystem or network access.
// Dependencies: content-gate-core, async-trait, bytes, tokio
// ============================================================================

//! ## Overview
//! Fixtures here stand in for the production collaborators: a map-backed
//! artifact store with optional latency, watermarkers that succeed or fail on
//! demand, a recording audit sink, and a dispatcher whose per-channel results
//! are scripted in advance.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use content_gate_core::ArtifactError;
use content_gate_core::ArtifactFormat;
use content_gate_core::ArtifactStore;
use content_gate_core::AuditEvent;
use content_gate_core::AuditSink;
use content_gate_core::ChannelDispatcher;
use content_gate_core::ChannelFailureKind;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use content_gate_core::ChannelOutcome;
use content_gate_core::PersonalizationMeta;
use content_gate_core::ResourceId;
use content_gate_core::StoredArtifact;
use content_gate_core::WatermarkError;
use content_gate_core::Watermarker;

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// Map-backed artifact store with optional fetch latency.
#[derive(Default)]
pub struct MemoryArtifacts {
    pub artifacts: Mutex<BTreeMap<String, StoredArtifact>>,
    pub delay: Option<Duration>,
}

impl MemoryArtifacts {
    pub fn with(resource: &str, filename: &str, format: ArtifactFormat, bytes: &[u8]) -> Self {
        let store = Self::default();
        store.insert(resource, filename, format, bytes);
        store
    }

    pub fn insert(&self, resource: &str, filename: &str, format: ArtifactFormat, bytes: &[u8]) {
        self.artifacts.lock().unwrap().insert(
            resource.to_string(),
            StoredArtifact {
                bytes: Bytes::copy_from_slice(bytes),
                filename: filename.to_string(),
                format,
            },
        );
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn fetch(&self, resource_id: &ResourceId) -> Result<StoredArtifact, ArtifactError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.artifacts
            .lock()
            .unwrap()
            .get(resource_id.as_str())
            .cloned()
            .ok_or_else(|| ArtifactError::UnknownResource(resource_id.to_string()))
    }
}

// ============================================================================
// SECTION: Watermarkers
// ============================================================================

/// Appends a marker and records the metadata it saw.
#[derive(Default)]
pub struct MarkingWatermarker {
    pub seen: Mutex<Vec<PersonalizationMeta>>,
}

pub const WATERMARK_SUFFIX: &[u8] = b"|personalized";

impl Watermarker for MarkingWatermarker {
    fn personalize(&self, raw: &[u8], meta: &PersonalizationMeta) -> Result<Vec<u8>, WatermarkError> {
        self.seen.lock().unwrap().push(meta.clone());
        let mut out = raw.to_vec();
        out.extend_from_slice(WATERMARK_SUFFIX);
        Ok(out)
    }
}

/// Rejects every input as an invalid container.
pub struct FailingWatermarker;

impl Watermarker for FailingWatermarker {
    fn personalize(&self, _raw: &[u8], _meta: &PersonalizationMeta) -> Result<Vec<u8>, WatermarkError> {
        Err(WatermarkError::InvalidContainer("central directory unreadable".to_string()))
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Collects audit events in memory.
#[derive(Default)]
pub struct RecordingAudit {
    pub events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn labels(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(AuditEvent::label).collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Scripted channel result.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Deliver,
    Fail(ChannelFailureKind),
}

/// Dispatcher returning scripted results per channel.
///
/// When a channel's script runs out, its last entry repeats.
pub struct ScriptedDispatcher {
    pub names: Vec<ChannelName>,
    pub scripts: Mutex<BTreeMap<ChannelName, VecDeque<Script>>>,
    pub calls: Mutex<Vec<(ChannelName, ChannelMessage)>>,
}

impl ScriptedDispatcher {
    pub fn new(channels: &[(&str, &[Script])]) -> Arc<Self> {
        let names = channels.iter().map(|(name, _)| ChannelName::new(*name)).collect();
        let scripts = channels
            .iter()
            .map(|(name, script)| (ChannelName::new(*name), script.iter().copied().collect()))
            .collect();
        Arc::new(Self {
            names,
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls_for(&self, channel: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(name, _)| name.as_str() == channel).count()
    }
}

#[async_trait]
impl ChannelDispatcher for ScriptedDispatcher {
    fn channels(&self) -> Vec<ChannelName> {
        self.names.clone()
    }

    async fn dispatch(&self, message: &ChannelMessage, channels: &[ChannelName]) -> Vec<ChannelOutcome> {
        let mut outcomes = Vec::new();
        for name in self.names.iter().filter(|name| channels.contains(name)) {
            self.calls.lock().unwrap().push((name.clone(), message.clone()));
            let step = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts.get_mut(name).unwrap();
                if queue.len() > 1 { queue.pop_front().unwrap() } else { *queue.front().unwrap() }
            };
            outcomes.push(match step {
                Script::Deliver => ChannelOutcome::delivered(name.clone()),
                Script::Fail(kind) => ChannelOutcome::failed(name.clone(), kind, format!("{name} scripted failure")),
            });
        }
        outcomes
    }
}
