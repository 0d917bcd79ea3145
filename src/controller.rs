//! Drives one message from send to final render.
//!
//! The controller owns the transport and the render pipeline. At most one
//! session is active at a time; a send while one is pending or streaming is
//! refused with [`SendError::Busy`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chat_api::{await_or_cancel, CancellationSignal, ChatApiError, ChatRequest, ChatTransport};
use futures_util::StreamExt;

use crate::error::SendError;
use crate::render::{
    escape_html, greeting_html, sidebar_html, MessageList, MessageSurface, RenderPipeline,
    SendControl, Sidebar, SourcesView,
};
use crate::session::{SessionId, SessionStatus, StreamSession, Transition};

/// Shown when the request fails before any response data arrived.
pub const COMMUNICATION_FAILURE_MESSAGE: &str =
    "Sorry, there was a problem communicating with the server. Please try again.";
/// Shown when the stream breaks after data started arriving.
pub const CONNECTION_LOST_MESSAGE: &str =
    "The connection to the server was lost before the answer was complete.";
pub const CANCELLED_MESSAGE: &str = "The response was cancelled.";

/// Final state of one sent message.
#[derive(Debug)]
pub struct MessageOutcome<M> {
    pub session: StreamSession,
    /// The assistant message node the session rendered into.
    pub message: M,
    /// Present when the sources affordance was attached.
    pub sources: Option<SourcesView>,
}

impl<M> MessageOutcome<M> {
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationSignal,
}

pub struct ChatController<T> {
    transport: T,
    pipeline: Mutex<RenderPipeline>,
    next_session_id: AtomicU64,
    active_session: Mutex<Option<ActiveSession>>,
}

impl<T> std::fmt::Debug for ChatController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatController")
            .field(
                "active_session",
                &lock_unpoisoned(&self.active_session)
                    .as_ref()
                    .map(|active| active.id),
            )
            .finish_non_exhaustive()
    }
}

impl<T: ChatTransport> ChatController<T> {
    pub fn new(transport: T, pipeline: RenderPipeline) -> Self {
        Self {
            transport,
            pipeline: Mutex::new(pipeline),
            next_session_id: AtomicU64::new(1),
            active_session: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one message and render its response into a fresh assistant node.
    ///
    /// The send control is disabled for the duration and re-enabled on every
    /// exit path, including when the returned future is dropped.
    pub async fn send<L, C>(
        &self,
        message: &str,
        list: &mut L,
        send_control: &mut C,
    ) -> Result<MessageOutcome<L::Message>, SendError>
    where
        L: MessageList,
        C: SendControl,
    {
        let text = ChatRequest::new(message)
            .trimmed()
            .map(str::to_string)
            .ok_or(SendError::EmptyMessage)?;
        let (session_id, cancel) = self.begin_session()?;
        let _active = ActiveSessionGuard {
            controller: self,
            session_id,
        };
        let _control = SendControlGuard::disable(send_control);

        list.append_user_message(&escape_html(&text));
        let mut target = list.append_assistant_message();
        let mut session = StreamSession::new(session_id);
        tracing::info!(session = session_id, chars = text.chars().count(), "sending message");

        let request = ChatRequest::new(text);
        let sources = self
            .drive(&request, &cancel, &mut session, &mut target)
            .await;

        tracing::info!(
            session = session_id,
            status = session.status().as_str(),
            "session finished"
        );
        Ok(MessageOutcome {
            session,
            message: target,
            sources,
        })
    }

    /// Abort the active session, if any. The stream stops at its next poll.
    pub fn cancel_active(&self) -> bool {
        match self.lock_active_session().as_ref() {
            Some(active) => {
                active.cancel.store(true, Ordering::SeqCst);
                tracing::info!(session = active.id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock_active_session().is_some()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        self.lock_active_session().as_ref().map(|active| active.id)
    }

    /// Fetch the knowledge areas once and render greeting and sidebar.
    ///
    /// Failures are logged and leave both surfaces untouched.
    pub async fn load_knowledge_areas<L, S>(&self, list: &mut L, sidebar: &mut S) -> bool
    where
        L: MessageList,
        S: Sidebar,
    {
        match self.transport.fetch_knowledge_areas().await {
            Ok(areas) => {
                tracing::debug!(count = areas.areas.len(), "knowledge areas loaded");
                let mut greeting = list.append_assistant_message();
                greeting.replace_html(&greeting_html(&areas));
                sidebar.show(&sidebar_html(&areas));
                true
            }
            Err(error) => {
                tracing::warn!(%error, "failed to load knowledge areas");
                false
            }
        }
    }

    async fn drive<M: MessageSurface>(
        &self,
        request: &ChatRequest,
        cancel: &CancellationSignal,
        session: &mut StreamSession,
        target: &mut M,
    ) -> Option<SourcesView> {
        let mut fragments = match self.transport.open_chat_stream(request, Some(cancel)).await {
            Ok(fragments) => fragments,
            Err(error) => {
                tracing::warn!(session = session.id(), %error, "chat request failed");
                let message = match error {
                    ChatApiError::Cancelled => CANCELLED_MESSAGE,
                    _ => COMMUNICATION_FAILURE_MESSAGE,
                };
                let transition = session.fail_transport(message);
                return self.render(transition, session, target);
            }
        };

        let mut sources = None;
        let mut received_data = false;
        loop {
            let next = match await_or_cancel(fragments.next(), Some(cancel)).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!(session = session.id(), "stream cancelled");
                    let transition = session.fail_transport(CANCELLED_MESSAGE);
                    return self.render(transition, session, target).or(sources);
                }
            };

            match next {
                Some(Ok(fragment)) => {
                    received_data |= !fragment.is_empty();
                    for event in session.decode(&fragment) {
                        let transition = session.apply(event);
                        if let Some(view) = self.render(transition, session, target) {
                            sources = Some(view);
                        }
                    }
                }
                Some(Err(error)) => {
                    tracing::warn!(session = session.id(), %error, received_data, "stream failed");
                    let message = if received_data {
                        CONNECTION_LOST_MESSAGE
                    } else {
                        COMMUNICATION_FAILURE_MESSAGE
                    };
                    let transition = session.fail_transport(message);
                    return self.render(transition, session, target).or(sources);
                }
                None => {
                    let transition = session.finish_stream();
                    return self.render(transition, session, target).or(sources);
                }
            }
        }
    }

    fn render<M: MessageSurface>(
        &self,
        transition: Transition,
        session: &StreamSession,
        target: &mut M,
    ) -> Option<SourcesView> {
        lock_unpoisoned(&self.pipeline).render(transition, session, target)
    }

    fn begin_session(&self) -> Result<(SessionId, CancellationSignal), SendError> {
        let mut active = self.lock_active_session();
        if let Some(current) = active.as_ref() {
            tracing::debug!(session = current.id, "send refused while a session is active");
            return Err(SendError::Busy);
        }

        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        *active = Some(ActiveSession {
            id,
            cancel: Arc::clone(&cancel),
        });
        Ok((id, cancel))
    }

    fn clear_active_session_if_matching(&self, session_id: SessionId) {
        let mut active = self.lock_active_session();
        if active.as_ref().map(|current| current.id) == Some(session_id) {
            active.take();
        }
    }

    fn lock_active_session(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        lock_unpoisoned(&self.active_session)
    }
}

struct ActiveSessionGuard<'a, T: ChatTransport> {
    controller: &'a ChatController<T>,
    session_id: SessionId,
}

impl<T: ChatTransport> Drop for ActiveSessionGuard<'_, T> {
    fn drop(&mut self) {
        self.controller
            .clear_active_session_if_matching(self.session_id);
    }
}

struct SendControlGuard<'a, C: SendControl> {
    control: &'a mut C,
}

impl<'a, C: SendControl> SendControlGuard<'a, C> {
    fn disable(control: &'a mut C) -> Self {
        control.set_enabled(false);
        Self { control }
    }
}

impl<C: SendControl> Drop for SendControlGuard<'_, C> {
    fn drop(&mut self) {
        self.control.set_enabled(true);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
