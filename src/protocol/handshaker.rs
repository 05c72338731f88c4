//! The connection handshake state machine.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use super::auth::AuthMechanism;
use super::error::HandshakeError;
use super::properties::client_properties;
use super::tuning::NegotiatedParameters;
use crate::codec::{FieldTable, Frame, FramePayload, Method, Open, Start, StartOk, Tune};
use crate::config::ConnectionConfig;
use crate::transport::{FrameHandler, ReadError, Sender};

/// Observable handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Protocol header sent (or about to be), waiting for `connection.start`
    AwaitingStart,
    /// Start-Ok sent, waiting for `connection.tune`
    AwaitingTune,
    /// Tune-Ok and Open sent, waiting for `connection.open-ok`
    AwaitingOpenOk,
    /// Connection is open
    Completed,
    /// Handshake failed; nothing further is processed
    Failed,
}

impl HandshakeState {
    /// Whether no further frames will be processed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The method this state is waiting for.
    pub fn expected(&self) -> &'static str {
        match self {
            Self::AwaitingStart => "connection.start",
            Self::AwaitingTune => "connection.tune",
            Self::AwaitingOpenOk => "connection.open-ok",
            Self::Completed | Self::Failed => "nothing",
        }
    }
}

/// What the broker told us about itself during Start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    /// Protocol major version the server speaks
    pub version_major: u8,
    /// Protocol minor version the server speaks
    pub version_minor: u8,
    /// `server-properties` table
    pub properties: FieldTable,
    /// Mechanism chosen for authentication
    pub mechanism: AuthMechanism,
    /// Locale chosen for the session
    pub locale: String,
}

impl ServerInfo {
    /// Broker product name, e.g. `RabbitMQ`
    pub fn product(&self) -> Option<&str> {
        self.properties.get_str("product")
    }

    /// Broker product version
    pub fn version(&self) -> Option<&str> {
        self.properties.get_str("version")
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeOutcome {
    /// Values agreed in Tune-Ok
    pub params: NegotiatedParameters,
    /// Broker details from Start
    pub server: ServerInfo,
}

impl HandshakeOutcome {
    /// Negotiated heartbeat interval in seconds; 0 = disabled
    pub fn heartbeat(&self) -> u16 {
        self.params.heartbeat
    }

    /// Negotiated heartbeat interval, `None` when disabled
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.params.heartbeat {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }
}

type CompletionResult = Result<HandshakeOutcome, HandshakeError>;

/// Resolves once, when the handshake completes or fails.
///
/// Dropping the [`Handshaker`] first resolves it to
/// [`HandshakeError::Aborted`].
#[derive(Debug)]
pub struct HandshakeCompletion {
    rx: oneshot::Receiver<CompletionResult>,
}

impl HandshakeCompletion {
    /// Non-blocking check. `None` while the handshake is still running.
    pub fn try_outcome(&mut self) -> Option<CompletionResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(HandshakeError::Aborted)),
        }
    }
}

impl Future for HandshakeCompletion {
    type Output = CompletionResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(HandshakeError::Aborted)))
    }
}

/// Internal state, carrying what each step has learned so far.
enum Phase {
    AwaitingStart,
    AwaitingTune {
        server: ServerInfo,
    },
    AwaitingOpenOk {
        server: ServerInfo,
        params: NegotiatedParameters,
    },
    Completed,
    Failed,
}

impl Phase {
    fn state(&self) -> HandshakeState {
        match self {
            Phase::AwaitingStart => HandshakeState::AwaitingStart,
            Phase::AwaitingTune { .. } => HandshakeState::AwaitingTune,
            Phase::AwaitingOpenOk { .. } => HandshakeState::AwaitingOpenOk,
            Phase::Completed => HandshakeState::Completed,
            Phase::Failed => HandshakeState::Failed,
        }
    }
}

/// Drives connection negotiation on channel 0.
///
/// Register it with a [`FrameDispatcher`](crate::transport::FrameDispatcher)
/// on channel 0; registration sends the protocol header. Every inbound
/// frame goes through [`handle_frame`](FrameHandler::handle_frame), which
/// never blocks. The outcome arrives on the [`HandshakeCompletion`] returned
/// by [`Handshaker::new`].
pub struct Handshaker<S> {
    sender: S,
    config: ConnectionConfig,
    phase: Phase,
    header_sent: bool,
    completion: Option<oneshot::Sender<CompletionResult>>,
}

impl<S: Sender> Handshaker<S> {
    /// Bind a sender and config. Nothing is sent until [`start`](Self::start).
    pub fn new(sender: S, config: ConnectionConfig) -> (Self, HandshakeCompletion) {
        let (tx, rx) = oneshot::channel();
        let handshaker = Self {
            sender,
            config,
            phase: Phase::AwaitingStart,
            header_sent: false,
            completion: Some(tx),
        };
        (handshaker, HandshakeCompletion { rx })
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.phase.state()
    }

    /// Config this handshake negotiates with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Send the protocol header. Further calls do nothing.
    pub fn start(&mut self) {
        if self.header_sent || self.state().is_terminal() {
            return;
        }
        self.header_sent = true;

        tracing::debug!("sending protocol header");
        if let Err(e) = self.sender.send_protocol_header() {
            self.fail(HandshakeError::Transport(e));
        }
    }

    /// Force the handshake into `Failed`. No success is reported afterwards.
    pub fn abort(&mut self) {
        if !self.state().is_terminal() {
            self.fail(HandshakeError::Aborted);
        }
    }

    fn handle_method(&mut self, method: Method) {
        tracing::debug!(state = ?self.state(), method = %method.id(), "received");
        let phase = std::mem::replace(&mut self.phase, Phase::Failed);
        match (phase, method) {
            (phase @ (Phase::Completed | Phase::Failed), _) => self.phase = phase,
            (_, Method::Close(close)) => {
                // The peer receiving Close must answer with Close-Ok
                if let Err(e) = self.send_method(Method::CloseOk) {
                    tracing::debug!("could not acknowledge broker close: {}", e);
                }
                self.fail(HandshakeError::BrokerClose {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text,
                    class_id: close.class_id,
                    method_id: close.method_id,
                });
            },
            (Phase::AwaitingStart, Method::Start(start)) => self.on_start(start),
            (Phase::AwaitingTune { server }, Method::Tune(tune)) => self.on_tune(server, tune),
            (Phase::AwaitingOpenOk { server, params }, Method::OpenOk { .. }) => {
                self.on_open_ok(server, params)
            },
            (phase, method) => {
                let expected = phase.state().expected();
                self.phase = phase;
                self.fail(HandshakeError::ProtocolViolation {
                    expected,
                    received: method.id().to_string(),
                });
            },
        }
    }

    fn on_start(&mut self, start: Start) {
        if (start.version_major, start.version_minor) != (0, 9) {
            self.fail(HandshakeError::Negotiation(format!(
                "server speaks AMQP {}-{}, need 0-9",
                start.version_major, start.version_minor
            )));
            return;
        }

        let Some(mechanism) = AuthMechanism::select(self.config.mechanisms(), &start.mechanisms)
        else {
            self.fail(HandshakeError::Negotiation(format!(
                "no common auth mechanism (server offers {:?})",
                start.mechanisms
            )));
            return;
        };

        let locale = select_locale(self.config.locale(), &start.locales);
        let start_ok = StartOk {
            client_properties: client_properties(&self.config),
            mechanism: mechanism.as_str().to_string(),
            response: mechanism.response(self.config.username(), self.config.password()),
            locale: locale.clone(),
        };
        if let Err(e) = self.send_method(Method::StartOk(start_ok)) {
            self.fail(HandshakeError::Transport(e));
            return;
        }

        let server = ServerInfo {
            version_major: start.version_major,
            version_minor: start.version_minor,
            properties: start.server_properties,
            mechanism,
            locale,
        };
        tracing::debug!(
            product = server.product().unwrap_or("unknown"),
            %mechanism,
            "start accepted, awaiting tune"
        );
        self.phase = Phase::AwaitingTune { server };
    }

    fn on_tune(&mut self, server: ServerInfo, proposal: Tune) {
        let params = NegotiatedParameters::negotiate(&self.config.tune_preferences(), &proposal);
        tracing::debug!(
            heartbeat = params.heartbeat,
            frame_max = params.frame_max,
            channel_max = params.channel_max,
            "tuning negotiated"
        );

        let sent = self
            .send_method(Method::TuneOk(params.to_tune_ok()))
            .and_then(|()| {
                let open = Open::new(self.config.virtual_host());
                self.send_method(Method::Open(open))
            });
        if let Err(e) = sent {
            self.fail(HandshakeError::Transport(e));
            return;
        }

        tracing::debug!(vhost = self.config.virtual_host(), "awaiting open-ok");
        self.phase = Phase::AwaitingOpenOk { server, params };
    }

    fn on_open_ok(&mut self, server: ServerInfo, params: NegotiatedParameters) {
        self.phase = Phase::Completed;
        tracing::info!(
            vhost = self.config.virtual_host(),
            heartbeat = params.heartbeat,
            "connection open"
        );

        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Ok(HandshakeOutcome { params, server }));
        }
    }

    fn send_method(&mut self, method: Method) -> Result<(), crate::transport::TransportError> {
        tracing::debug!(method = %method.id(), "sending");
        self.sender.send(Frame::method(0, method))
    }

    fn fail(&mut self, error: HandshakeError) {
        tracing::warn!("handshake failed: {}", error);
        self.phase = Phase::Failed;

        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(error));
        }
    }
}

fn select_locale(preferred: &str, offered: &str) -> String {
    if offered.split_whitespace().any(|l| l == preferred) {
        return preferred.to_string();
    }
    offered.split_whitespace().next().unwrap_or(preferred).to_string()
}

impl<S: Sender> FrameHandler for Handshaker<S> {
    fn on_register(&mut self) {
        self.start();
    }

    fn handle_frame(&mut self, frame: Frame) {
        if self.state().is_terminal() {
            tracing::trace!(frame = %frame.describe(), "handshake finished, frame ignored");
            return;
        }

        if frame.channel != 0 {
            self.fail(HandshakeError::ProtocolViolation {
                expected: self.state().expected(),
                received: frame.describe(),
            });
            return;
        }

        match frame.payload {
            FramePayload::Heartbeat => tracing::trace!("heartbeat during handshake ignored"),
            FramePayload::Method(method) => self.handle_method(method),
            FramePayload::Header(_) | FramePayload::Body(_) => {
                self.fail(HandshakeError::ProtocolViolation {
                    expected: self.state().expected(),
                    received: frame.describe(),
                });
            },
        }
    }

    fn handle_read_error(&mut self, error: ReadError) {
        if !self.state().is_terminal() {
            self.fail(error.into());
        }
    }
}

impl<S> Drop for Handshaker<S> {
    fn drop(&mut self) {
        if let Some(tx) = self.completion.take() {
            tracing::debug!("handshaker dropped before finishing");
            let _ = tx.send(Err(HandshakeError::Aborted));
        }
    }
}

impl<S> std::fmt::Debug for Handshaker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshaker")
            .field("state", &self.phase.state())
            .field("header_sent", &self.header_sent)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::codec::{Close, DecodeError, PROTOCOL_HEADER};
    use crate::transport::TransportError;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Header,
        Frame(Frame),
    }

    /// Records everything sent; fails once `budget` sends are used up.
    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<Sent>>>,
        budget: Option<usize>,
    }

    impl RecordingSender {
        fn failing_after(sends: usize) -> Self {
            Self {
                budget: Some(sends),
                ..Self::default()
            }
        }

        fn record(&mut self, sent: Sent) -> Result<(), TransportError> {
            if let Some(budget) = self.budget.as_mut() {
                if *budget == 0 {
                    return Err(TransportError::Closed);
                }
                *budget -= 1;
            }
            self.sent.lock().unwrap().push(sent);
            Ok(())
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn methods(&self) -> Vec<Method> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Frame(frame) => frame.as_method().cloned(),
                    Sent::Header => None,
                })
                .collect()
        }
    }

    impl Sender for RecordingSender {
        fn send_protocol_header(&mut self) -> Result<(), TransportError> {
            self.record(Sent::Header)
        }

        fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
            self.record(Sent::Frame(frame))
        }
    }

    fn start_frame() -> Frame {
        Frame::method(
            0,
            Method::Start(Start {
                version_major: 0,
                version_minor: 9,
                server_properties: FieldTable::new()
                    .with("product", "RabbitMQ")
                    .with("version", "3.13.0"),
                mechanisms: "AMQPLAIN PLAIN".to_string(),
                locales: "en_US".to_string(),
            }),
        )
    }

    fn tune_frame(heartbeat: u16, frame_max: u32, channel_max: u16) -> Frame {
        Frame::method(
            0,
            Method::Tune(Tune {
                channel_max,
                frame_max,
                heartbeat,
            }),
        )
    }

    fn open_ok_frame() -> Frame {
        Frame::method(
            0,
            Method::OpenOk {
                known_hosts: String::new(),
            },
        )
    }

    fn close_frame(reply_code: u16, reply_text: &str) -> Frame {
        Frame::method(
            0,
            Method::Close(Close {
                reply_code,
                reply_text: reply_text.to_string(),
                class_id: 10,
                method_id: 40,
            }),
        )
    }

    fn scenario_config() -> ConnectionConfig {
        ConnectionConfig::new("guest", "guest")
            .with_heartbeat(60)
            .with_frame_max(131072)
            .with_channel_max(0)
    }

    fn started(
        config: ConnectionConfig,
    ) -> (Handshaker<RecordingSender>, HandshakeCompletion, RecordingSender) {
        let sender = RecordingSender::default();
        let (mut handshaker, completion) = Handshaker::new(sender.clone(), config);
        handshaker.on_register();
        (handshaker, completion, sender)
    }

    #[test]
    fn test_new_sends_nothing() {
        let sender = RecordingSender::default();
        let (handshaker, mut completion) = Handshaker::new(sender.clone(), scenario_config());
        assert_eq!(handshaker.state(), HandshakeState::AwaitingStart);
        assert!(sender.sent().is_empty());
        assert!(completion.try_outcome().is_none());
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut handshaker, _completion, sender) = started(scenario_config());
        handshaker.start();
        handshaker.start();
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_full_handshake() {
        let (mut handshaker, mut completion, sender) = started(scenario_config());

        handshaker.handle_frame(start_frame());
        assert_eq!(handshaker.state(), HandshakeState::AwaitingTune);

        let methods = sender.methods();
        let Method::StartOk(start_ok) = &methods[0] else {
            panic!("expected start-ok, got {:?}", methods[0]);
        };
        assert_eq!(start_ok.mechanism, "PLAIN");
        assert_eq!(start_ok.locale, "en_US");
        assert_eq!(&start_ok.response[..], b"\0guest\0guest");
        assert!(start_ok.client_properties.get("capabilities").is_some());

        handshaker.handle_frame(tune_frame(30, 4096, 2047));
        assert_eq!(handshaker.state(), HandshakeState::AwaitingOpenOk);
        assert!(completion.try_outcome().is_none());

        let methods = sender.methods();
        assert_eq!(
            methods[1],
            Method::TuneOk(Tune {
                channel_max: 2047,
                frame_max: 4096,
                heartbeat: 30,
            })
        );
        assert_eq!(methods[2], Method::Open(Open::new("/")));

        handshaker.handle_frame(open_ok_frame());
        assert_eq!(handshaker.state(), HandshakeState::Completed);

        let outcome = completion.try_outcome().unwrap().unwrap();
        assert_eq!(outcome.heartbeat(), 30);
        assert_eq!(outcome.heartbeat_interval(), Some(Duration::from_secs(30)));
        assert_eq!(outcome.params.frame_max, 4096);
        assert_eq!(outcome.params.channel_max, 2047);
        assert_eq!(outcome.server.product(), Some("RabbitMQ"));
        assert_eq!(outcome.server.mechanism, AuthMechanism::Plain);

        // header + start-ok + tune-ok + open
        assert_eq!(sender.sent().len(), 4);
        assert_eq!(sender.sent()[0], Sent::Header);
    }

    #[test]
    fn test_disabled_heartbeat_stays_disabled() {
        let (mut handshaker, mut completion, _sender) =
            started(scenario_config().with_heartbeat(0));

        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(tune_frame(60, 131072, 2047));
        handshaker.handle_frame(open_ok_frame());

        let outcome = completion.try_outcome().unwrap().unwrap();
        assert_eq!(outcome.heartbeat(), 0);
        assert_eq!(outcome.heartbeat_interval(), None);
    }

    #[test]
    fn test_terminal_states_ignore_frames() {
        let (mut handshaker, _completion, sender) = started(scenario_config());
        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(tune_frame(30, 4096, 2047));
        handshaker.handle_frame(open_ok_frame());
        let sent_before = sender.sent().len();

        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(close_frame(320, "CONNECTION_FORCED"));
        handshaker.handle_read_error(TransportError::Closed.into());
        handshaker.abort();

        assert_eq!(handshaker.state(), HandshakeState::Completed);
        assert_eq!(sender.sent().len(), sent_before);
    }

    #[test]
    fn test_failed_state_ignores_frames() {
        let (mut handshaker, _completion, sender) = started(scenario_config());
        handshaker.handle_frame(open_ok_frame());
        assert_eq!(handshaker.state(), HandshakeState::Failed);

        handshaker.handle_frame(start_frame());
        assert_eq!(handshaker.state(), HandshakeState::Failed);
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_tune_before_start() {
        let (mut handshaker, mut completion, sender) = started(scenario_config());
        handshaker.handle_frame(tune_frame(30, 4096, 2047));

        assert_eq!(handshaker.state(), HandshakeState::Failed);
        match completion.try_outcome() {
            Some(Err(HandshakeError::ProtocolViolation { expected, received })) => {
                assert_eq!(expected, "connection.start");
                assert_eq!(received, "connection.tune");
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_open_ok_before_open() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(open_ok_frame());

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::ProtocolViolation {
                expected: "connection.tune",
                ..
            }))
        ));

        // A later valid tune does not resurrect the handshake
        handshaker.handle_frame(tune_frame(30, 4096, 2047));
        handshaker.handle_frame(open_ok_frame());
        assert_eq!(handshaker.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_secure_is_a_violation() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(Frame::method(
            0,
            Method::Secure {
                challenge: Bytes::from_static(b"nonce"),
            },
        ));

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::ProtocolViolation { received, .. })) if received == "connection.secure"
        ));
    }

    #[test]
    fn test_broker_close_in_every_waiting_state() {
        let prefixes: [Vec<Frame>; 3] = [
            vec![],
            vec![start_frame()],
            vec![start_frame(), tune_frame(30, 4096, 2047)],
        ];

        for prefix in prefixes {
            let (mut handshaker, mut completion, sender) = started(scenario_config());
            for frame in prefix {
                handshaker.handle_frame(frame);
            }
            handshaker.handle_frame(close_frame(530, "NOT_ALLOWED"));

            assert_eq!(handshaker.state(), HandshakeState::Failed);
            assert!(matches!(
                completion.try_outcome(),
                Some(Err(HandshakeError::BrokerClose { reply_code: 530, ref reply_text, .. }))
                    if reply_text == "NOT_ALLOWED"
            ));
            assert_eq!(sender.methods().last(), Some(&Method::CloseOk));
        }
    }

    #[test]
    fn test_access_refused() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(close_frame(403, "ACCESS_REFUSED - Login was refused"));

        let err = completion.try_outcome().unwrap().unwrap_err();
        assert!(err.is_access_refused());
    }

    #[test]
    fn test_decode_error_fails_without_sending() {
        let (mut handshaker, mut completion, sender) = started(scenario_config());
        handshaker.handle_read_error(DecodeError::BadFrameEnd { found: 0x00 }.into());

        assert_eq!(handshaker.state(), HandshakeState::Failed);
        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Decode(DecodeError::BadFrameEnd { found: 0 })))
        ));

        handshaker.handle_frame(start_frame());
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_send_failure_is_transport_error() {
        // Header goes through, Start-Ok does not
        let sender = RecordingSender::failing_after(1);
        let (mut handshaker, mut completion) = Handshaker::new(sender, scenario_config());
        handshaker.start();
        handshaker.handle_frame(start_frame());

        assert_eq!(handshaker.state(), HandshakeState::Failed);
        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Transport(TransportError::Closed)))
        ));
    }

    #[test]
    fn test_header_send_failure() {
        let sender = RecordingSender::failing_after(0);
        let (mut handshaker, mut completion) = Handshaker::new(sender, scenario_config());
        handshaker.start();

        assert_eq!(handshaker.state(), HandshakeState::Failed);
        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Transport(_)))
        ));
    }

    #[test]
    fn test_drop_aborts() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(start_frame());
        drop(handshaker);

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Aborted))
        ));
    }

    #[test]
    fn test_abort() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.abort();
        handshaker.handle_frame(start_frame());

        assert_eq!(handshaker.state(), HandshakeState::Failed);
        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Aborted))
        ));
    }

    #[test]
    fn test_heartbeat_ignored() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(Frame::heartbeat());
        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(Frame::heartbeat());
        assert_eq!(handshaker.state(), HandshakeState::AwaitingTune);
        assert!(completion.try_outcome().is_none());
    }

    #[test]
    fn test_non_zero_channel_is_a_violation() {
        let (mut handshaker, mut completion, _sender) = started(scenario_config());
        handshaker.handle_frame(Frame::method(1, Method::CloseOk));

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::ProtocolViolation { received, .. }))
                if received == "connection.close-ok on channel 1"
        ));
    }

    #[test]
    fn test_content_frame_is_a_violation() {
        let (mut handshaker, _completion, _sender) = started(scenario_config());
        handshaker.handle_frame(Frame {
            channel: 0,
            payload: FramePayload::Body(Bytes::from_static(b"payload")),
        });
        assert_eq!(handshaker.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_unsupported_server_version() {
        let (mut handshaker, mut completion, sender) = started(scenario_config());
        let mut frame = start_frame();
        if let FramePayload::Method(Method::Start(start)) = &mut frame.payload {
            start.version_minor = 8;
        }
        handshaker.handle_frame(frame);

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Negotiation(_)))
        ));
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_no_common_mechanism() {
        let config = scenario_config().with_mechanisms(vec![AuthMechanism::External]);
        let (mut handshaker, mut completion, sender) = started(config);
        handshaker.handle_frame(start_frame());

        assert!(matches!(
            completion.try_outcome(),
            Some(Err(HandshakeError::Negotiation(_)))
        ));
        assert_eq!(sender.sent(), vec![Sent::Header]);
    }

    #[test]
    fn test_select_locale() {
        assert_eq!(select_locale("en_US", "de_DE en_US"), "en_US");
        assert_eq!(select_locale("fr_FR", "de_DE en_US"), "de_DE");
        assert_eq!(select_locale("en_US", ""), "en_US");
    }

    #[tokio::test]
    async fn test_completion_future() {
        let (mut handshaker, completion, _sender) = started(scenario_config());
        let task = tokio::spawn(completion);

        handshaker.handle_frame(start_frame());
        handshaker.handle_frame(tune_frame(10, 1 << 20, 0));
        handshaker.handle_frame(open_ok_frame());

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.heartbeat(), 10);
        assert_eq!(outcome.params.frame_max, 131072);
        assert_eq!(outcome.params.channel_max, 0);
    }

    #[test]
    fn test_protocol_header_bytes() {
        assert_eq!(&PROTOCOL_HEADER, b"AMQP\x00\x00\x09\x01");
    }
}
