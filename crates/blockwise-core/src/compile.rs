use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use blockwise_observability::{emit_event, ObservabilityEvent, ProcessKind};
use blockwise_types::{is_compile_success_body, CompileRequest, Language};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::editor::Submission;
use crate::notify::{Notification, Notifier};

pub const COMPILE_SUCCESS_MESSAGE: &str = "Compilation successful!";
pub const COMPILE_FAILURE_MESSAGE: &str = "Compilation failed!";

/// Remote side of a Run. `Ok` carries the body of a 2xx response; transport
/// failures and non-2xx statuses are errors.
#[async_trait]
pub trait CompileBackend: Send + Sync {
    async fn compile(&self, language: Language, request: &CompileRequest)
        -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Succeeded,
    Rejected { body: String },
    TransportFailed { error: String },
}

impl CompileOutcome {
    pub fn from_body(body: &str) -> Self {
        if is_compile_success_body(body) {
            CompileOutcome::Succeeded
        } else {
            CompileOutcome::Rejected {
                body: body.to_string(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Succeeded)
    }

    /// Rejections and transport failures look the same to the user.
    pub fn notification(&self, language: Language) -> Notification {
        let notification = if self.is_success() {
            Notification::success(COMPILE_SUCCESS_MESSAGE)
        } else {
            Notification::failure(COMPILE_FAILURE_MESSAGE)
        };
        notification.for_language(language)
    }

    fn status(&self) -> &'static str {
        match self {
            CompileOutcome::Succeeded => "succeeded",
            CompileOutcome::Rejected { .. } => "rejected",
            CompileOutcome::TransportFailed { .. } => "transport_failed",
        }
    }
}

#[derive(Debug, Default)]
struct FlagSlot {
    issued: u64,
    latest_pending: Option<u64>,
}

/// Per-language compiling flags.
///
/// Each run takes the next sequence number for its language; only the
/// settlement of the latest run clears the flag, so an older run finishing
/// late cannot report a newer one as done.
#[derive(Debug, Clone, Default)]
pub struct CompilingFlags {
    slots: Arc<Mutex<HashMap<Language, FlagSlot>>>,
}

impl CompilingFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_compiling(&self, language: Language) -> bool {
        self.slots
            .lock()
            .get(&language)
            .is_some_and(|slot| slot.latest_pending.is_some())
    }

    fn begin(&self, language: Language) -> RunTicket {
        let mut slots = self.slots.lock();
        let slot = slots.entry(language).or_default();
        slot.issued += 1;
        slot.latest_pending = Some(slot.issued);
        RunTicket {
            flags: self.clone(),
            language,
            seq: slot.issued,
        }
    }

    fn settle(&self, language: Language, seq: u64) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&language) {
            if slot.latest_pending == Some(seq) {
                slot.latest_pending = None;
            }
        }
    }
}

/// Clears its run's flag on drop, whichever way the run ends.
struct RunTicket {
    flags: CompilingFlags,
    language: Language,
    seq: u64,
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        self.flags.settle(self.language, self.seq);
    }
}

#[derive(Clone)]
pub struct CompileController {
    backend: Arc<dyn CompileBackend>,
    notifier: Arc<dyn Notifier>,
    flags: CompilingFlags,
    process: ProcessKind,
}

impl CompileController {
    pub fn new(backend: Arc<dyn CompileBackend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            flags: CompilingFlags::new(),
            process: ProcessKind::Cli,
        }
    }

    pub fn with_process(mut self, process: ProcessKind) -> Self {
        self.process = process;
        self
    }

    pub fn flags(&self) -> &CompilingFlags {
        &self.flags
    }

    pub fn is_compiling(&self, language: Language) -> bool {
        self.flags.is_compiling(language)
    }

    /// Starts one compile submission.
    ///
    /// The flag for `language` is raised before this returns, so callers see
    /// it set even before the returned future is first polled. Exactly one
    /// request is sent; the outcome is both notified and returned.
    pub fn run(
        &self,
        submission: Submission,
        language: Language,
        task_id: impl Into<String>,
    ) -> impl Future<Output = CompileOutcome> + Send + 'static {
        let ticket = self.flags.begin(language);
        let backend = self.backend.clone();
        let notifier = self.notifier.clone();
        let process = self.process;
        let task_id = task_id.into();

        async move {
            let request = CompileRequest::new(&task_id, submission.content, submission.tab_name);
            let outcome = match backend.compile(language, &request).await {
                Ok(body) => CompileOutcome::from_body(&body),
                Err(err) => {
                    let error = format!("{err:#}");
                    tracing::error!(
                        language = language.as_str(),
                        task_id = task_id.as_str(),
                        "compile request failed: {error}"
                    );
                    CompileOutcome::TransportFailed { error }
                }
            };

            emit_event(
                if outcome.is_success() {
                    tracing::Level::INFO
                } else {
                    tracing::Level::WARN
                },
                process,
                ObservabilityEvent {
                    event: "compile.settled",
                    component: "core.compile",
                    task_id: Some(&task_id),
                    language: Some(language.as_str()),
                    status: Some(outcome.status()),
                    ..Default::default()
                },
            );

            if let Err(err) = notifier.notify(outcome.notification(language)) {
                tracing::warn!("compile notification dropped: {err:#}");
            }
            drop(ticket);
            outcome
        }
    }

    /// Runs on the tokio runtime so the caller's event loop keeps going.
    pub fn spawn_run(
        &self,
        submission: Submission,
        language: Language,
        task_id: impl Into<String>,
    ) -> JoinHandle<CompileOutcome> {
        tokio::spawn(self.run(submission, language, task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationKind;
    use tokio::sync::{mpsc, oneshot};

    type Reply = anyhow::Result<String>;

    /// Holds each request until the test sends its reply.
    struct GatedBackend {
        requests: mpsc::UnboundedSender<(Language, CompileRequest, oneshot::Sender<Reply>)>,
    }

    #[async_trait]
    impl CompileBackend for GatedBackend {
        async fn compile(
            &self,
            language: Language,
            request: &CompileRequest,
        ) -> anyhow::Result<String> {
            let (tx, rx) = oneshot::channel();
            self.requests
                .send((language, request.clone(), tx))
                .map_err(|_| anyhow::anyhow!("test dropped"))?;
            rx.await.map_err(|_| anyhow::anyhow!("reply dropped"))?
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) -> anyhow::Result<()> {
            self.seen.lock().push(notification);
            if self.fail {
                anyhow::bail!("toast surface unavailable");
            }
            Ok(())
        }
    }

    fn controller(
        fail_notify: bool,
    ) -> (
        CompileController,
        Arc<RecordingNotifier>,
        mpsc::UnboundedReceiver<(Language, CompileRequest, oneshot::Sender<Reply>)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Arc::new(RecordingNotifier {
            fail: fail_notify,
            ..Default::default()
        });
        let controller = CompileController::new(
            Arc::new(GatedBackend { requests: tx }),
            notifier.clone(),
        );
        (controller, notifier, rx)
    }

    fn submission() -> Submission {
        Submission {
            tab_name: "Main.sol".to_string(),
            content: "contract A {}".to_string(),
        }
    }

    async fn run_with_reply(
        language: Language,
        reply: Reply,
        fail_notify: bool,
    ) -> (CompileOutcome, Vec<Notification>, bool) {
        let (controller, notifier, mut requests) = controller(fail_notify);
        assert!(!controller.is_compiling(language));

        let handle = controller.spawn_run(submission(), language, "12");
        assert!(controller.is_compiling(language));

        let (seen_language, request, reply_tx) = requests.recv().await.expect("request");
        assert_eq!(seen_language, language);
        assert_eq!(request, CompileRequest::new("12", "contract A {}", "Main.sol"));
        assert!(controller.is_compiling(language));

        reply_tx.send(reply).expect("reply");
        let outcome = handle.await.expect("join");
        let seen = notifier.seen.lock().clone();
        (outcome, seen, controller.is_compiling(language))
    }

    #[tokio::test]
    async fn yes_body_notifies_success_and_clears_flag() {
        let (outcome, seen, compiling) =
            run_with_reply(Language::Solidity, Ok("yes".to_string()), false).await;
        assert_eq!(outcome, CompileOutcome::Succeeded);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Success);
        assert_eq!(seen[0].language, Some(Language::Solidity));
        assert!(!compiling);
    }

    #[tokio::test]
    async fn other_body_notifies_failure_and_clears_flag() {
        let (outcome, seen, compiling) =
            run_with_reply(Language::Sui, Ok("no".to_string()), false).await;
        assert_eq!(
            outcome,
            CompileOutcome::Rejected {
                body: "no".to_string()
            }
        );
        assert_eq!(seen[0].kind, NotificationKind::Failure);
        assert_eq!(seen[0].message, COMPILE_FAILURE_MESSAGE);
        assert!(!compiling);
    }

    #[tokio::test]
    async fn transport_error_notifies_failure_and_clears_flag() {
        let (outcome, seen, compiling) = run_with_reply(
            Language::Solidity,
            Err(anyhow::anyhow!("connection refused")),
            false,
        )
        .await;
        match outcome {
            CompileOutcome::TransportFailed { error } => {
                assert!(error.contains("connection refused"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(seen[0].kind, NotificationKind::Failure);
        assert!(!compiling);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn transport_error_is_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (controller, _notifier, mut requests) = controller(false);
        let run = controller.run(submission(), Language::Sui, "7");
        let reply = async {
            let (_, _, reply_tx) = requests.recv().await.expect("request");
            reply_tx
                .send(Err(anyhow::anyhow!("connection refused")))
                .expect("reply");
        };
        let (outcome, ()) = tokio::join!(run, reply);
        assert!(matches!(outcome, CompileOutcome::TransportFailed { .. }));

        let out = String::from_utf8(logs.0.lock().clone()).expect("utf8");
        let failure = out
            .lines()
            .find(|line| line.contains("compile request failed"))
            .expect("transport error line");
        assert!(failure.contains("ERROR"));
        assert!(failure.contains("connection refused"));
        assert!(failure.contains("task_id=\"7\""));

        let settled = out
            .lines()
            .find(|line| line.contains("compile.settled"))
            .expect("settled event");
        assert!(settled.contains("WARN"));
        assert!(settled.contains("status=\"transport_failed\""));
    }

    #[tokio::test]
    async fn failed_notification_still_clears_flag() {
        let (outcome, seen, compiling) =
            run_with_reply(Language::Sui, Ok("yes".to_string()), true).await;
        assert!(outcome.is_success());
        assert_eq!(seen.len(), 1);
        assert!(!compiling);
    }

    #[tokio::test]
    async fn flag_is_raised_before_future_is_polled() {
        let (controller, _notifier, _requests) = controller(false);
        let pending = controller.run(submission(), Language::Sui, "1");
        assert!(controller.is_compiling(Language::Sui));
        assert!(!controller.is_compiling(Language::Solidity));
        drop(pending);
        assert!(!controller.is_compiling(Language::Sui));
    }

    #[tokio::test]
    async fn stale_settlement_does_not_clear_newer_run() {
        let (controller, notifier, mut requests) = controller(false);
        let first = controller.spawn_run(submission(), Language::Solidity, "1");
        let (_, _, first_reply) = requests.recv().await.expect("first request");
        let second = controller.spawn_run(submission(), Language::Solidity, "1");
        let (_, _, second_reply) = requests.recv().await.expect("second request");

        first_reply.send(Ok("no".to_string())).expect("reply");
        assert!(!first.await.expect("join").is_success());
        assert!(controller.is_compiling(Language::Solidity));

        second_reply.send(Ok("yes".to_string())).expect("reply");
        assert!(second.await.expect("join").is_success());
        assert!(!controller.is_compiling(Language::Solidity));
        assert_eq!(notifier.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn languages_do_not_share_flags() {
        let (controller, _notifier, mut requests) = controller(false);
        let sol = controller.spawn_run(submission(), Language::Solidity, "1");
        let (_, _, sol_reply) = requests.recv().await.expect("request");
        assert!(!controller.is_compiling(Language::Sui));
        sol_reply.send(Ok("yes".to_string())).expect("reply");
        sol.await.expect("join");
        assert!(!controller.is_compiling(Language::Solidity));
    }
}
