//! The assistant dispatcher: one conversation, three backends.
//!
//! Every user turn produces exactly one bot message. Text turns are routed by
//! [`detect_intent`](crate::routing::detect_intent) and then either answered
//! locally, sent to the chat backend, or answered from the canned replies.
//! File uploads are held per kind until submitted to the matching classifier.
//!
//! All state sits behind short `std::sync` locks that are never held across
//! an `.await`, so a dispatcher can be shared as `Arc<Dispatcher>` between
//! request handlers. Concurrent turns on the same dispatcher are not
//! serialised.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{
    Mutex, MutexGuard, PoisonError, RwLock,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{BackendKind, BackendReply, BackendRequest, BackendSet},
    config::{BackendEndpoint, DispatcherConfig},
    error::{DispatchError, Result},
    format::{format_alzheimer_result, format_eeg_results},
    markdown::strip_markdown,
    message::{Message, MessageKind, MessageLog, SourceTag},
    notice::Notice,
    replies::ReplyPicker,
    routing::{detect_intent, info_reply},
    upload::{PendingUploadInfo, PendingUploads, UploadKind, UploadedFile},
};

const FALLBACK_NOTICE: &str = "AI service error, using fallback response";

/// Connection state of one backend as seen by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConnection {
    pub kind: BackendKind,
    pub endpoint: BackendEndpoint,
    pub connected: bool,
}

pub struct Dispatcher {
    id: String,
    config: RwLock<DispatcherConfig>,
    backends: BackendSet,
    connected: DashMap<BackendKind, bool>,
    ai_enabled: AtomicBool,
    log: Mutex<MessageLog>,
    pending: Mutex<PendingUploads>,
    notices: Mutex<Vec<Notice>>,
    in_flight: AtomicUsize,
    replies: ReplyPicker,
}

/// Keeps the typing indicator raised until dropped.
struct TypingGuard<'a>(&'a AtomicUsize);

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    /// Creates a dispatcher with every backend marked disconnected.
    ///
    /// Call [`initialize`](Self::initialize) to probe the backends.
    pub fn new(config: DispatcherConfig, backends: BackendSet) -> Self {
        let connected = DashMap::new();
        for kind in BackendKind::all() {
            connected.insert(kind, false);
        }

        Self {
            id: Uuid::new_v4().to_string(),
            replies: ReplyPicker::new(config.reply_seed),
            config: RwLock::new(config),
            backends,
            connected,
            ai_enabled: AtomicBool::new(false),
            log: Mutex::new(MessageLog::new()),
            pending: Mutex::new(PendingUploads::default()),
            notices: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Probes all three backends concurrently.
    ///
    /// Each probe only affects its own backend, so one service being down
    /// never blocks the others.
    pub async fn initialize(&self) -> Vec<BackendConnection> {
        info!(dispatcher_id = %self.id, "Probing analysis backends");
        tokio::join!(
            self.probe(BackendKind::Chat),
            self.probe(BackendKind::Eeg),
            self.probe(BackendKind::Alzheimer),
        );
        self.connections()
    }

    /// Points one backend at a new endpoint and re-probes it.
    ///
    /// An endpoint without a credential keeps the current one.
    pub async fn reconfigure(&self, kind: BackendKind, endpoint: BackendEndpoint) -> Result<bool> {
        if endpoint.base_url.trim().is_empty() {
            return Err(DispatchError::Validation("Base URL is required".to_string()));
        }

        {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let mut endpoint = endpoint;
            if endpoint.credential.is_none() {
                endpoint.credential = config.endpoint(kind).credential.clone();
            }
            info!(
                dispatcher_id = %self.id,
                backend = %kind,
                base_url = %endpoint.base_url,
                "Reconfiguring backend"
            );
            config.set_endpoint(kind, endpoint);
        }

        Ok(self.probe(kind).await)
    }

    /// Lets the user switch AI replies off and back on.
    ///
    /// AI replies are only used while the chat backend is also connected.
    pub fn set_ai_enabled(&self, enabled: bool) {
        self.ai_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn ai_enabled(&self) -> bool {
        self.ai_enabled.load(Ordering::SeqCst)
    }

    /// Answers one text turn.
    ///
    /// Blank input is ignored. Otherwise the user message is appended first
    /// and exactly one bot message follows; the bot message is returned.
    pub async fn handle_user_text(&self, input: &str) -> Option<Message> {
        if input.trim().is_empty() {
            return None;
        }

        lock(&self.log).push_user(input);
        let _typing = self.start_typing();

        let intent = detect_intent(input);
        let (text, source) = match intent.upload_kind() {
            Some(kind) => {
                let connected = self.is_connected(kind.backend());
                (info_reply(kind, connected).to_string(), SourceTag::Predefined)
            }
            None if self.ai_available() => self.ask_ai(input).await,
            None => {
                let (category, reply) = self.replies.pick(input);
                debug!(dispatcher_id = %self.id, category = ?category, "Using predefined reply");
                (reply.to_string(), SourceTag::Predefined)
            }
        };

        let message = lock(&self.log).push_bot(text, source, MessageKind::Normal);
        debug!(
            dispatcher_id = %self.id,
            intent = ?intent,
            source = ?source,
            message_id = message.id,
            "Text turn answered"
        );
        Some(message)
    }

    /// Holds `file` for a later [`submit_upload`](Self::submit_upload).
    pub fn select_upload(&self, kind: UploadKind, file: UploadedFile) -> Result<()> {
        if !kind.accepts(&file) {
            self.notify(Notice::error(kind.wrong_type_notice()));
            return Err(DispatchError::Validation(
                kind.wrong_type_notice().to_string(),
            ));
        }

        self.notify(Notice::success(kind.selected_notice(&file.file_name)));
        info!(
            dispatcher_id = %self.id,
            kind = ?kind,
            file_name = %file.file_name,
            size = file.bytes.len(),
            "Upload selected"
        );
        lock(&self.pending).replace(kind, file);
        Ok(())
    }

    /// Sends the pending file of `kind` to its classifier.
    ///
    /// Precondition failures (no file, backend disconnected) leave the log
    /// untouched and return an error. Once the call is made, success and
    /// failure both append one bot message and clear the pending file.
    pub async fn submit_upload(&self, kind: UploadKind) -> Result<Message> {
        let pending = lock(&self.pending).get(kind).cloned();
        let Some(pending) = pending else {
            self.notify(Notice::error(kind.missing_notice()));
            return Err(DispatchError::Validation(kind.missing_notice().to_string()));
        };

        let backend_kind = kind.backend();
        if !self.is_connected(backend_kind) {
            self.notify(Notice::error(kind.unavailable_notice()));
            return Err(DispatchError::Unavailable { kind: backend_kind });
        }

        let _typing = self.start_typing();
        let endpoint = self.endpoint(backend_kind);
        info!(
            dispatcher_id = %self.id,
            backend = %backend_kind,
            file_name = %pending.file.file_name,
            "Submitting upload"
        );

        let outcome = self
            .backends
            .get(backend_kind)
            .call(&endpoint, BackendRequest::Upload(pending.file))
            .await;

        lock(&self.pending).clear_if_current(kind, pending.selection);

        let formatted = match (kind, outcome) {
            (UploadKind::Eeg, Ok(BackendReply::Eeg(results))) => {
                Ok((format_eeg_results(&results), SourceTag::EegAnalysis))
            }
            (UploadKind::Alzheimer, Ok(BackendReply::Alzheimer(prediction))) => Ok((
                format_alzheimer_result(&prediction),
                SourceTag::AlzheimerAnalysis,
            )),
            (_, Ok(other)) => Err(DispatchError::Backend(format!(
                "Unexpected reply from {} service: {:?}",
                backend_kind, other
            ))),
            (_, Err(e)) => Err(e),
        };

        let message = match formatted {
            Ok((text, source)) => lock(&self.log).push_bot(text, source, MessageKind::Result),
            Err(e) => {
                warn!(
                    dispatcher_id = %self.id,
                    backend = %backend_kind,
                    error = %e,
                    "Upload analysis failed"
                );
                lock(&self.log).push_bot(
                    format!("{}: {}", kind.failure_prefix(), e),
                    SourceTag::Error,
                    MessageKind::Normal,
                )
            }
        };
        Ok(message)
    }

    /// Starts the conversation over with a fresh welcome message.
    pub fn clear(&self) {
        lock(&self.log).reset();
        self.notify(Notice::success("Chat cleared"));
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.log).messages().to_vec()
    }

    pub fn is_typing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn connections(&self) -> Vec<BackendConnection> {
        let config = self.config();
        BackendKind::all()
            .into_iter()
            .map(|kind| BackendConnection {
                kind,
                endpoint: config.endpoint(kind).clone(),
                connected: self.is_connected(kind),
            })
            .collect()
    }

    pub fn is_connected(&self, kind: BackendKind) -> bool {
        self.connected.get(&kind).map(|c| *c).unwrap_or(false)
    }

    pub fn pending_upload(&self, kind: UploadKind) -> Option<PendingUploadInfo> {
        lock(&self.pending).get(kind).map(PendingUploadInfo::from)
    }

    /// Returns queued notices and forgets them.
    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *lock(&self.notices))
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn endpoint(&self, kind: BackendKind) -> BackendEndpoint {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .endpoint(kind)
            .clone()
    }

    fn ai_available(&self) -> bool {
        self.ai_enabled() && self.is_connected(BackendKind::Chat)
    }

    fn start_typing(&self) -> TypingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        TypingGuard(&self.in_flight)
    }

    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }

    async fn ask_ai(&self, input: &str) -> (String, SourceTag) {
        let endpoint = self.endpoint(BackendKind::Chat);
        let strip = self.config().strip_markdown;

        let outcome = match self
            .backends
            .chat
            .call(&endpoint, BackendRequest::Chat(input.to_string()))
            .await
        {
            Ok(BackendReply::Chat(reply)) => Ok(reply),
            Ok(other) => Err(DispatchError::Backend(format!(
                "Unexpected reply from chat service: {:?}",
                other
            ))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(reply) if strip => (strip_markdown(&reply), SourceTag::Ai),
            Ok(reply) => (reply, SourceTag::Ai),
            Err(e) => {
                // the chosen category is not reported back to the caller
                let (category, reply) = self.replies.pick(input);
                warn!(
                    dispatcher_id = %self.id,
                    error = %e,
                    category = ?category,
                    "Chat backend failed, using fallback reply"
                );
                self.notify(Notice::error(FALLBACK_NOTICE));
                (reply.to_string(), SourceTag::Fallback)
            }
        }
    }

    /// Runs one health probe and records the result.
    async fn probe(&self, kind: BackendKind) -> bool {
        let endpoint = self.endpoint(kind);
        debug!(dispatcher_id = %self.id, backend = %kind, base_url = %endpoint.base_url, "Probing backend");

        let outcome = self.backends.get(kind).probe(&endpoint).await;
        let healthy = outcome.is_ok();
        self.connected.insert(kind, healthy);
        if kind == BackendKind::Chat {
            self.set_ai_enabled(healthy);
        }

        match outcome {
            Ok(()) => {
                info!(dispatcher_id = %self.id, backend = %kind, "Backend connected");
                self.notify(Notice::success(connected_notice(kind)));
            }
            Err(DispatchError::Transport(e)) => {
                warn!(dispatcher_id = %self.id, backend = %kind, error = %e, "Backend unreachable");
                self.notify(Notice::error(format!(
                    "Failed to connect to {} service: {}",
                    short_name(kind),
                    e
                )));
            }
            Err(e) => {
                warn!(dispatcher_id = %self.id, backend = %kind, error = %e, "Backend health check failed");
                self.notify(Notice::error(unavailable_notice(kind)));
            }
        }
        healthy
    }
}

fn short_name(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Chat => "AI",
        BackendKind::Eeg => "EEG",
        BackendKind::Alzheimer => "Alzheimer",
    }
}

fn connected_notice(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Chat => "AI Assistant connected!",
        BackendKind::Eeg => "EEG Analysis service connected!",
        BackendKind::Alzheimer => "Alzheimer Analysis service connected!",
    }
}

fn unavailable_notice(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Chat => "AI service unavailable - check if FastAPI server is running",
        BackendKind::Eeg => "EEG service unavailable - check if backend server is running",
        BackendKind::Alzheimer => {
            "Alzheimer service unavailable - check if Python API server is running"
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        backend::{AlzheimerPrediction, AnalysisBackend, EegPrediction},
        message::{Sender, WELCOME_TEXT},
        notice::NoticeLevel,
        replies::Category,
        routing::{ALZHEIMER_UNAVAILABLE_REPLY, EEG_READY_REPLY, EEG_UNAVAILABLE_REPLY},
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    pub(crate) enum Behaviour {
        Reply(BackendReply),
        Fail(String),
    }

    /// In-process backend with a scripted reply.
    pub(crate) struct FakeBackend {
        kind: BackendKind,
        healthy: AtomicBool,
        behaviour: Mutex<Behaviour>,
        pub calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        pub(crate) fn new(kind: BackendKind, healthy: bool, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                kind,
                healthy: AtomicBool::new(healthy),
                behaviour: Mutex::new(behaviour),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated(kind: BackendKind, behaviour: Behaviour, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                healthy: AtomicBool::new(true),
                behaviour: Mutex::new(behaviour),
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            })
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl AnalysisBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn probe(&self, _endpoint: &BackendEndpoint) -> Result<()> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DispatchError::Backend("unhealthy".to_string()))
            }
        }

        async fn call(
            &self,
            _endpoint: &BackendEndpoint,
            _request: BackendRequest,
        ) -> Result<BackendReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &*lock(&self.behaviour) {
                Behaviour::Reply(reply) => Ok(reply.clone()),
                Behaviour::Fail(message) => Err(DispatchError::Backend(message.clone())),
            }
        }
    }

    pub(crate) fn chat_reply(text: &str) -> Behaviour {
        Behaviour::Reply(BackendReply::Chat(text.to_string()))
    }

    pub(crate) fn eeg_reply(classes: &[i64]) -> Behaviour {
        Behaviour::Reply(BackendReply::Eeg(
            classes
                .iter()
                .map(|&prediction| EegPrediction { prediction })
                .collect(),
        ))
    }

    pub(crate) fn alzheimer_reply(prediction: &str, meaning: &str) -> Behaviour {
        Behaviour::Reply(BackendReply::Alzheimer(AlzheimerPrediction {
            prediction: prediction.to_string(),
            meaning: meaning.to_string(),
        }))
    }

    struct Harness {
        dispatcher: Dispatcher,
        chat: Arc<FakeBackend>,
        eeg: Arc<FakeBackend>,
        alzheimer: Arc<FakeBackend>,
    }

    fn harness(chat: Arc<FakeBackend>, eeg: Arc<FakeBackend>, alzheimer: Arc<FakeBackend>) -> Harness {
        let config = DispatcherConfig {
            reply_seed: Some(7),
            ..DispatcherConfig::default()
        };
        let backends = BackendSet {
            chat: chat.clone(),
            eeg: eeg.clone(),
            alzheimer: alzheimer.clone(),
        };
        Harness {
            dispatcher: Dispatcher::new(config, backends),
            chat,
            eeg,
            alzheimer,
        }
    }

    fn default_harness(chat_up: bool, eeg_up: bool, alzheimer_up: bool) -> Harness {
        harness(
            FakeBackend::new(BackendKind::Chat, chat_up, chat_reply("Drink water.")),
            FakeBackend::new(BackendKind::Eeg, eeg_up, eeg_reply(&[0, 1, 0])),
            FakeBackend::new(
                BackendKind::Alzheimer,
                alzheimer_up,
                alzheimer_reply("Moderate Impairment", "Significant decline"),
            ),
        )
    }

    fn csv(name: &str) -> UploadedFile {
        UploadedFile::new(name, Some("text/csv".to_string()), b"a,b\n1,2\n".to_vec())
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile::new(name, Some("image/png".to_string()), vec![0x89, 0x50])
    }

    #[test]
    fn test_new_dispatcher_starts_with_welcome() {
        let h = default_harness(true, true, true);
        let messages = h.dispatcher.messages();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, WELCOME_TEXT);
        assert_eq!(messages[0].kind, MessageKind::Welcome);
        assert!(!h.dispatcher.ai_enabled());
        assert!(h.dispatcher.connections().iter().all(|c| !c.connected));
    }

    #[tokio::test]
    async fn test_initialize_probes_backends_independently() {
        let h = default_harness(true, false, true);
        let connections = h.dispatcher.initialize().await;

        let connected: Vec<_> = connections.iter().map(|c| (c.kind, c.connected)).collect();
        assert_eq!(
            connected,
            vec![
                (BackendKind::Chat, true),
                (BackendKind::Eeg, false),
                (BackendKind::Alzheimer, true),
            ]
        );
        assert!(h.dispatcher.ai_enabled());

        let notices = h.dispatcher.drain_notices();
        assert_eq!(notices.len(), 3);
        assert!(notices.contains(&Notice::error(
            "EEG service unavailable - check if backend server is running"
        )));
        assert!(notices.contains(&Notice::success("AI Assistant connected!")));
        assert!(h.dispatcher.drain_notices().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;

        assert!(h.dispatcher.handle_user_text("   \n\t").await.is_none());
        assert_eq!(h.dispatcher.messages().len(), 1);
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_eeg_question_answered_locally() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;

        let reply = h.dispatcher.handle_user_text("What does my EEG say?").await.unwrap();
        assert_eq!(reply.text, EEG_READY_REPLY);
        assert_eq!(reply.source, Some(SourceTag::Predefined));
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);

        let messages = h.dispatcher.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[2].sender, Sender::Bot);
    }

    #[tokio::test]
    async fn test_eeg_question_while_disconnected() {
        let h = default_harness(true, false, true);
        h.dispatcher.initialize().await;

        let reply = h.dispatcher.handle_user_text("seizure?").await.unwrap();
        assert_eq!(reply.text, EEG_UNAVAILABLE_REPLY);
        assert_eq!(reply.source, Some(SourceTag::Predefined));
        assert_eq!(h.eeg.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.dispatcher.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_alzheimer_question_while_disconnected() {
        let h = default_harness(true, true, false);
        h.dispatcher.initialize().await;

        let reply = h
            .dispatcher
            .handle_user_text("Is this dementia on my MRI?")
            .await
            .unwrap();
        assert_eq!(reply.text, ALZHEIMER_UNAVAILABLE_REPLY);
        assert_eq!(reply.source, Some(SourceTag::Predefined));
        assert_eq!(h.alzheimer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.dispatcher.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_ai_reply_is_stripped_and_tagged() {
        let chat = FakeBackend::new(BackendKind::Chat, true, chat_reply("**Rest** and _hydrate_"));
        let h = harness(
            chat,
            FakeBackend::new(BackendKind::Eeg, true, eeg_reply(&[])),
            FakeBackend::new(BackendKind::Alzheimer, true, alzheimer_reply("", "")),
        );
        h.dispatcher.initialize().await;

        let reply = h.dispatcher.handle_user_text("I have a headache").await.unwrap();
        assert_eq!(reply.text, "Rest and hydrate");
        assert_eq!(reply.source, Some(SourceTag::Ai));
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_failure_falls_back_to_canned_reply() {
        let chat = FakeBackend::new(
            BackendKind::Chat,
            true,
            Behaviour::Fail("API request failed: 500".to_string()),
        );
        let h = harness(
            chat,
            FakeBackend::new(BackendKind::Eeg, true, eeg_reply(&[])),
            FakeBackend::new(BackendKind::Alzheimer, true, alzheimer_reply("", "")),
        );
        h.dispatcher.initialize().await;
        h.dispatcher.drain_notices();

        let reply = h.dispatcher.handle_user_text("I need an appointment").await.unwrap();
        assert_eq!(reply.source, Some(SourceTag::Fallback));
        assert!(Category::Appointment.replies().contains(&reply.text.as_str()));
        assert_eq!(
            h.dispatcher.drain_notices(),
            vec![Notice::error(FALLBACK_NOTICE)]
        );
        assert!(!h.dispatcher.is_typing());
    }

    #[tokio::test]
    async fn test_ai_disabled_uses_predefined_replies() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;
        h.dispatcher.set_ai_enabled(false);

        let reply = h.dispatcher.handle_user_text("prescription refill").await.unwrap();
        assert_eq!(reply.source, Some(SourceTag::Predefined));
        assert!(Category::Prescription.replies().contains(&reply.text.as_str()));
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ai_enabled_without_connection_stays_local() {
        let h = default_harness(false, true, true);
        h.dispatcher.initialize().await;
        h.dispatcher.set_ai_enabled(true);

        let reply = h.dispatcher.handle_user_text("hello").await.unwrap();
        assert_eq!(reply.source, Some(SourceTag::Predefined));
        assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_select_upload_rejects_wrong_type() {
        let h = default_harness(true, true, true);

        let result = h.dispatcher.select_upload(UploadKind::Eeg, png("scan.png"));
        assert!(matches!(result, Err(DispatchError::Validation(_))));
        assert!(h.dispatcher.pending_upload(UploadKind::Eeg).is_none());
        assert_eq!(
            h.dispatcher.drain_notices(),
            vec![Notice::error("Please select a CSV file")]
        );
    }

    #[tokio::test]
    async fn test_submit_without_file_leaves_log_untouched() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;
        h.dispatcher.drain_notices();

        let result = h.dispatcher.submit_upload(UploadKind::Alzheimer).await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
        assert_eq!(h.dispatcher.messages().len(), 1);
        assert_eq!(
            h.dispatcher.drain_notices(),
            vec![Notice::error("Please select an image first")]
        );
    }

    #[tokio::test]
    async fn test_submit_while_disconnected_keeps_pending_file() {
        let h = default_harness(true, false, true);
        h.dispatcher.initialize().await;
        h.dispatcher.select_upload(UploadKind::Eeg, csv("signals.csv")).unwrap();

        let result = h.dispatcher.submit_upload(UploadKind::Eeg).await;
        assert!(matches!(
            result,
            Err(DispatchError::Unavailable { kind: BackendKind::Eeg })
        ));
        assert_eq!(h.eeg.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.dispatcher.messages().len(), 1);
        assert!(h.dispatcher.pending_upload(UploadKind::Eeg).is_some());
    }

    #[tokio::test]
    async fn test_eeg_submit_formats_result_and_clears_file() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;
        h.dispatcher.select_upload(UploadKind::Eeg, csv("signals.csv")).unwrap();

        let message = h.dispatcher.submit_upload(UploadKind::Eeg).await.unwrap();
        assert_eq!(message.kind, MessageKind::Result);
        assert_eq!(message.source, Some(SourceTag::EegAnalysis));
        assert!(message.text.contains("Normal signals: 2"));
        assert!(message.text.contains("Seizure detections: 1"));
        assert!(h.dispatcher.pending_upload(UploadKind::Eeg).is_none());
        assert_eq!(h.dispatcher.messages().last(), Some(&message));
    }

    #[tokio::test]
    async fn test_alzheimer_submit_formats_result() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;
        h.dispatcher.select_upload(UploadKind::Alzheimer, png("scan.png")).unwrap();

        let message = h.dispatcher.submit_upload(UploadKind::Alzheimer).await.unwrap();
        assert_eq!(message.source, Some(SourceTag::AlzheimerAnalysis));
        assert!(message.text.contains("🔴"));
        assert_eq!(h.alzheimer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_analysis_reports_error_and_clears_file() {
        let eeg = FakeBackend::new(
            BackendKind::Eeg,
            true,
            Behaviour::Fail("Invalid API key".to_string()),
        );
        let h = harness(
            FakeBackend::new(BackendKind::Chat, true, chat_reply("ok")),
            eeg,
            FakeBackend::new(BackendKind::Alzheimer, true, alzheimer_reply("", "")),
        );
        h.dispatcher.initialize().await;
        h.dispatcher.select_upload(UploadKind::Eeg, csv("signals.csv")).unwrap();

        let message = h.dispatcher.submit_upload(UploadKind::Eeg).await.unwrap();
        assert_eq!(message.text, "Error analyzing EEG data: Invalid API key");
        assert_eq!(message.source, Some(SourceTag::Error));
        assert_eq!(message.kind, MessageKind::Normal);
        assert!(h.dispatcher.pending_upload(UploadKind::Eeg).is_none());
        assert!(!h.dispatcher.is_typing());
    }

    #[tokio::test]
    async fn test_typing_flag_raised_during_call() {
        let gate = Arc::new(Notify::new());
        let chat = FakeBackend::gated(BackendKind::Chat, chat_reply("fine"), gate.clone());
        let h = harness(
            chat,
            FakeBackend::new(BackendKind::Eeg, true, eeg_reply(&[])),
            FakeBackend::new(BackendKind::Alzheimer, true, alzheimer_reply("", "")),
        );
        h.dispatcher.initialize().await;
        let dispatcher = Arc::new(h.dispatcher);

        let turn = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.handle_user_text("how are you").await }
        });

        while h.chat.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(dispatcher.is_typing());

        gate.notify_one();
        let reply = turn.await.unwrap().unwrap();
        assert_eq!(reply.text, "fine");
        assert!(!dispatcher.is_typing());
    }

    #[tokio::test]
    async fn test_clear_keeps_ids_increasing() {
        let h = default_harness(false, true, true);
        h.dispatcher.initialize().await;
        let reply = h.dispatcher.handle_user_text("hello").await.unwrap();

        h.dispatcher.clear();
        let messages = h.dispatcher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, WELCOME_TEXT);
        assert!(messages[0].id > reply.id);
        assert!(
            h.dispatcher
                .drain_notices()
                .iter()
                .any(|n| n.level == NoticeLevel::Success && n.text == "Chat cleared")
        );
    }

    #[tokio::test]
    async fn test_reconfigure_reprobes_and_keeps_credential() {
        let h = default_harness(true, false, true);
        h.dispatcher.initialize().await;
        assert!(!h.dispatcher.is_connected(BackendKind::Eeg));

        h.eeg.set_healthy(true);
        let connected = h
            .dispatcher
            .reconfigure(BackendKind::Eeg, BackendEndpoint::new("http://eeg.internal:9000"))
            .await
            .unwrap();

        assert!(connected);
        assert!(h.dispatcher.is_connected(BackendKind::Eeg));
        let config = h.dispatcher.config();
        assert_eq!(config.eeg.base_url, "http://eeg.internal:9000");
        assert_eq!(config.eeg.credential.as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn test_reconfigure_rejects_empty_url() {
        let h = default_harness(true, true, true);
        let result = h
            .dispatcher
            .reconfigure(BackendKind::Chat, BackendEndpoint::new("  "))
            .await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_chat_probe_failure_disables_ai() {
        let h = default_harness(true, true, true);
        h.dispatcher.initialize().await;
        assert!(h.dispatcher.ai_enabled());

        h.chat.set_healthy(false);
        let connected = h
            .dispatcher
            .reconfigure(BackendKind::Chat, BackendEndpoint::new("http://localhost:5999"))
            .await
            .unwrap();

        assert!(!connected);
        assert!(!h.dispatcher.ai_enabled());
    }
}
