// ABOUTME: Session runtime — the cooperative event loop around the controller.
// ABOUTME: Bridges render-surface commands and transport resolutions over mpsc channels.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::ChatConfig;
use crate::controller::{ChatController, OutboundRequest, SessionView, SubmitError};
use crate::transport::{AskReply, Transport, TransportError};

/// Commands sent from the render surface to the session loop.
pub enum ClientCommand {
    /// Submit user input for a new exchange.
    Submit(String),
    /// Reset the conversation to a fresh greeting.
    ClearConversation,
    /// Fire the best-effort end-of-session notification. Does not alter
    /// conversation state and may be sent more than once.
    EndSession,
    /// Hot-swap the configuration for future exchanges.
    Reconfigure(ChatConfig),
    /// Stop the loop.
    Shutdown,
}

/// Events sent from the session loop to the render surface, which is
/// expected to redraw on every `Updated`.
pub enum SessionEvent {
    /// The session state changed; carries a point-in-time view.
    Updated(SessionView),
    /// A submission was rejected; no state changed.
    SubmitRejected(SubmitError),
}

/// A transport outcome routed back into the single-threaded loop.
struct ExchangeResolution {
    request_id: u64,
    generation: u64,
    outcome: Result<AskReply, TransportError>,
}

/// Run the session loop until `Shutdown` or until the command channel
/// closes.
///
/// All controller transitions happen here, one at a time: user commands
/// and transport resolutions are interleaved through `select!`, so no two
/// transitions ever race against the same timeline. The transport call is
/// the only asynchronous operation; it runs in a spawned task and its
/// outcome is delivered back as an `ExchangeResolution`.
pub async fn run_session_loop(
    mut controller: ChatController,
    transport: Arc<dyn Transport>,
    mut commands: mpsc::Receiver<ClientCommand>,
    events: mpsc::Sender<SessionEvent>,
) {
    let (resolution_tx, mut resolutions) = mpsc::channel::<ExchangeResolution>(16);

    // Initial view so the render surface can draw the greeting.
    let _ = events.send(SessionEvent::Updated(controller.view())).await;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    ClientCommand::Submit(text) => match controller.submit(&text) {
                        Ok(outbound) => {
                            dispatch_exchange(transport.clone(), outbound, resolution_tx.clone());
                            let _ = events.send(SessionEvent::Updated(controller.view())).await;
                        }
                        Err(e) => {
                            let _ = events.send(SessionEvent::SubmitRejected(e)).await;
                        }
                    },
                    ClientCommand::ClearConversation => {
                        controller.clear_conversation();
                        let _ = events.send(SessionEvent::Updated(controller.view())).await;
                    }
                    ClientCommand::EndSession => {
                        // Fire-and-forget so a slow endpoint never blocks the loop.
                        let transport = transport.clone();
                        let user_id = controller.identity().user_id().to_string();
                        let auth_token = controller.config().auth_token.clone();
                        tokio::spawn(async move {
                            transport.notify_end_of_session(&user_id, &auth_token).await;
                        });
                    }
                    ClientCommand::Reconfigure(config) => {
                        controller.reconfigure(config);
                        let _ = events.send(SessionEvent::Updated(controller.view())).await;
                    }
                    ClientCommand::Shutdown => break,
                }
            }
            resolution = resolutions.recv() => {
                let Some(resolution) = resolution else { break };
                match controller.resolve(
                    resolution.request_id,
                    resolution.generation,
                    resolution.outcome,
                ) {
                    Ok(true) => {
                        let _ = events.send(SessionEvent::Updated(controller.view())).await;
                    }
                    Ok(false) => {
                        // Stale resolution, already logged by the controller.
                    }
                    Err(e) => {
                        log::error!("timeline contract violation while resolving: {e}");
                    }
                }
            }
        }
    }
}

/// Spawn the transport call for one accepted submission. The configured
/// response delay runs inside the task so the loop stays responsive.
fn dispatch_exchange(
    transport: Arc<dyn Transport>,
    outbound: OutboundRequest,
    resolution_tx: mpsc::Sender<ExchangeResolution>,
) {
    tokio::spawn(async move {
        if !outbound.delay.is_zero() {
            tokio::time::sleep(outbound.delay).await;
        }
        let outcome = transport
            .ask(&outbound.query, &outbound.user_id, &outbound.auth_token)
            .await;
        let _ = resolution_tx
            .send(ExchangeResolution {
                request_id: outbound.request_id,
                generation: outbound.generation,
                outcome,
            })
            .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerStatus;
    use crate::identity::{NoAuth, SessionIdentity};
    use async_trait::async_trait;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn ask(
            &self,
            query: &str,
            _user_id: &str,
            _auth_token: &str,
        ) -> Result<AskReply, TransportError> {
            Ok(AskReply {
                response: Some(format!("echo: {query}")),
                ..AskReply::default()
            })
        }

        async fn notify_end_of_session(&self, _user_id: &str, _auth_token: &str) {}
    }

    fn test_controller() -> ChatController {
        let config = ChatConfig {
            response_delay_ms: 0,
            ..ChatConfig::default()
        };
        ChatController::new(config, SessionIdentity::resolve(&NoAuth))
    }

    #[tokio::test]
    async fn loop_emits_initial_view_and_stops_on_shutdown() {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_session_loop(
            test_controller(),
            Arc::new(EchoTransport),
            cmd_rx,
            event_tx,
        ));

        match event_rx.recv().await.unwrap() {
            SessionEvent::Updated(view) => {
                assert_eq!(view.messages.len(), 1);
                assert_eq!(view.status, ControllerStatus::Idle);
            }
            SessionEvent::SubmitRejected(e) => panic!("unexpected rejection: {e}"),
        }

        cmd_tx.send(ClientCommand::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn loop_stops_when_command_channel_closes() {
        let (cmd_tx, cmd_rx) = mpsc::channel::<ClientCommand>(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_session_loop(
            test_controller(),
            Arc::new(EchoTransport),
            cmd_rx,
            event_tx,
        ));

        let _ = event_rx.recv().await;
        drop(cmd_tx);
        handle.await.unwrap();
    }
}
