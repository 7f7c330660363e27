use crate::error::Result;
use crate::media::{LocalTrack, MediaCapture, MediaConstraints};
use crate::negotiation::{NegotiationStateMachine, PeerEvent};
use crate::peer::connection::PeerConnector;
use crate::peer::state::Role;
use crate::peer::types::{MemberId, SessionDescription, TrackKind};
use crate::session::{Session, SessionEvent};
use crate::signaling::{ChannelEvent, NegotiationMessage, SignalingChannel};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const NOTIFICATION_CAPACITY: usize = 64;

/// Связывает события канала с переговорами и владеет локальным медиа
pub struct SessionController {
    channel: Arc<dyn SignalingChannel>,
    capture: Arc<dyn MediaCapture>,
    constraints: MediaConstraints,
    negotiator: NegotiationStateMachine,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    local_tracks: Option<Vec<LocalTrack>>,
    sessions: HashMap<MemberId, Session>,
    notifications: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        channel: Arc<dyn SignalingChannel>,
        connector: Arc<dyn PeerConnector>,
        capture: Arc<dyn MediaCapture>,
        constraints: MediaConstraints,
    ) -> Self {
        let (negotiator, peer_events) = NegotiationStateMachine::new(connector, channel.clone());
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            channel,
            capture,
            constraints,
            negotiator,
            peer_events,
            local_tracks: None,
            sessions: HashMap::new(),
            notifications,
        }
    }

    /// Подписка на уведомления для UI
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.notifications.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        // нет подписчиков - не ошибка
        let _ = self.notifications.send(event);
    }

    pub fn member_id(&self) -> &str {
        self.channel.member_id()
    }

    pub fn session(&self, member_id: &str) -> Option<&Session> {
        self.sessions.get(member_id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn local_tracks(&self) -> &[LocalTrack] {
        self.local_tracks.as_deref().unwrap_or_default()
    }

    /// Входит в канал и захватывает локальное медиа
    pub async fn init(&mut self) -> Result<()> {
        self.channel.join().await?;
        info!(member = %self.member_id(), "joined signaling channel");
        self.ensure_local_media().await?;
        Ok(())
    }

    /// Захватывает локальные треки один раз. Ошибка захвата уходит
    /// вызывающему и в UI; повторный вызов после ошибки пробует снова.
    pub async fn ensure_local_media(&mut self) -> Result<Vec<LocalTrack>> {
        if let Some(tracks) = &self.local_tracks {
            return Ok(tracks.clone());
        }
        match self.capture.acquire(&self.constraints).await {
            Ok(tracks) => {
                info!(tracks = tracks.len(), "local media ready");
                self.notify(SessionEvent::LocalMediaReady {
                    track_ids: tracks.iter().map(|t| t.id().to_string()).collect(),
                });
                self.local_tracks = Some(tracks.clone());
                Ok(tracks)
            }
            Err(e) => {
                warn!(error = %e, "local media acquisition failed");
                self.notify(SessionEvent::MediaFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Участник вошёл: создаём offer. Повторный вход перезапускает переговоры.
    pub async fn on_member_joined(&mut self, member_id: &str) -> Result<()> {
        info!(member = %member_id, "member joined");
        let tracks = self.ensure_local_media().await?;
        let session = self
            .sessions
            .entry(member_id.to_string())
            .or_insert_with(|| Session::new(member_id, Role::Initiator));
        self.negotiator.begin_as_initiator(session, &tracks).await
    }

    /// Участник вышел: закрываем его сессию. Неизвестный участник - no-op.
    pub async fn on_member_left(&mut self, member_id: &str) -> bool {
        let Some(mut session) = self.sessions.remove(member_id) else {
            debug!(member = %member_id, "member left without a session");
            return false;
        };
        self.negotiator.close(&mut session).await;
        self.notify(SessionEvent::PeerLeft {
            member_id: member_id.to_string(),
        });
        true
    }

    /// Разбор и маршрутизация входящего сообщения. Ошибки только логируются:
    /// одно плохое сообщение не должно ронять сессию.
    pub async fn on_signaling_message(&mut self, raw: &str, from: &str) {
        let msg = match NegotiationMessage::decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(from = %from, error = %e, "dropping malformed signaling message");
                return;
            }
        };
        let kind = msg.kind();
        debug!(from = %from, kind, "signaling message");

        let result = match msg {
            NegotiationMessage::Offer { offer } => self.answer_offer(from, offer).await,
            NegotiationMessage::Answer { answer } => match self.sessions.get_mut(from) {
                Some(session) => self.negotiator.apply_answer(session, answer).await.map(|_| ()),
                None => {
                    warn!(from = %from, "answer from a member without a session");
                    Ok(())
                }
            },
            NegotiationMessage::Candidate { candidate } => match self.sessions.get_mut(from) {
                Some(session) => self
                    .negotiator
                    .apply_candidate(session, candidate)
                    .await
                    .map(|_| ()),
                None => {
                    debug!(from = %from, "candidate before connection setup dropped");
                    Ok(())
                }
            },
            NegotiationMessage::Unknown => {
                debug!(from = %from, "unknown message type ignored");
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(from = %from, error = %e, "failed to handle {kind} message");
        }
    }

    async fn answer_offer(&mut self, from: &str, offer: SessionDescription) -> Result<()> {
        let tracks = self.ensure_local_media().await?;
        let session = self
            .sessions
            .entry(from.to_string())
            .or_insert_with(|| Session::new(from, Role::Responder));
        self.negotiator
            .begin_as_responder(session, &tracks, offer)
            .await
    }

    /// Включает/выключает локальный трек без пересогласования.
    /// Возвращает `false`, если трека такого вида нет.
    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        let Some(track) = self.local_tracks().iter().find(|t| t.kind() == kind) else {
            debug!(%kind, "no local track to toggle");
            return false;
        };
        track.set_enabled(enabled);
        info!(%kind, enabled, "local track toggled");
        self.notify(SessionEvent::TrackToggled { kind, enabled });
        true
    }

    /// Кнопки камеры/микрофона: переключает трек и возвращает новое состояние
    pub fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let enabled = !self
            .local_tracks()
            .iter()
            .find(|t| t.kind() == kind)?
            .is_enabled();
        self.set_track_enabled(kind, enabled);
        Some(enabled)
    }

    /// Выход из канала. Ошибки логируются и не возвращаются.
    pub async fn leave(&mut self) {
        let members: Vec<MemberId> = self.sessions.keys().cloned().collect();
        for member in members {
            if let Some(mut session) = self.sessions.remove(&member) {
                self.negotiator.close(&mut session).await;
            }
        }
        if let Err(e) = self.channel.leave().await {
            warn!(error = %e, "leaving channel failed");
        }
        if let Err(e) = self.channel.logout().await {
            warn!(error = %e, "logout failed");
        }
        info!(member = %self.member_id(), "left signaling channel");
        self.notify(SessionEvent::Left);
    }

    pub async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::MemberJoined(member_id) => {
                if let Err(e) = self.on_member_joined(&member_id).await {
                    warn!(member = %member_id, error = %e, "offer negotiation failed");
                }
            }
            ChannelEvent::MemberLeft(member_id) => {
                self.on_member_left(&member_id).await;
            }
            ChannelEvent::Message { payload, from } => {
                self.on_signaling_message(&payload, &from).await;
            }
        }
    }

    pub async fn handle_peer_event(&mut self, event: PeerEvent) {
        let Some(session) = self.sessions.get_mut(&event.member_id) else {
            debug!(member = %event.member_id, "peer event for a closed session");
            return;
        };
        if let Some(notification) = self.negotiator.handle_peer_event(session, event).await {
            self.notify(notification);
        }
    }

    /// Обрабатывает уже накопленные события peer connection
    pub async fn process_peer_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.peer_events.try_recv() {
            self.handle_peer_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Цикл событий: канал и peer connection обрабатываются по одному.
    /// Завершается, когда закрывается поток событий канала.
    pub async fn run(&mut self, events: &mut mpsc::UnboundedReceiver<ChannelEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_channel_event(event).await,
                    None => break,
                },
                Some(event) = self.peer_events.recv() => self.handle_peer_event(event).await,
            }
        }
        debug!(member = %self.member_id(), "channel event stream closed");
    }
}
