use crate::error::{Error, Result};
use crate::media::{LocalTrack, RemoteTrack};
use crate::peer::connection::{PeerConnection, PeerConnector};
use crate::peer::ice::analyze_candidates;
use crate::peer::state::{NegotiationState, Role};
use crate::peer::types::{IceCandidate, MemberId, SdpType, SessionDescription, TransportState};
use crate::session::{Session, SessionEvent};
use crate::signaling::{NegotiationMessage, SignalingChannel};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Событие от peer connection, доставленное в цикл контроллера
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub member_id: MemberId,
    pub generation: u64,
    pub kind: PeerEventKind,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
    State(TransportState),
}

/// Переговоры одного peer connection: offer/answer и ICE кандидаты.
///
/// Сессию получает по ссылке на время вызова и не хранит её. Колбэки
/// peer connection состояние сессии не трогают: они кладут [`PeerEvent`]
/// в очередь, которую разбирает контроллер через [`Self::handle_peer_event`].
pub struct NegotiationStateMachine {
    connector: Arc<dyn PeerConnector>,
    channel: Arc<dyn SignalingChannel>,
    events: mpsc::UnboundedSender<PeerEvent>,
    generation: AtomicU64,
}

impl NegotiationStateMachine {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        channel: Arc<dyn SignalingChannel>,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let machine = Self {
            connector,
            channel,
            events,
            generation: AtomicU64::new(0),
        };
        (machine, rx)
    }

    /// Новый peer connection для сессии; старый закрывается
    async fn open_peer(
        &self,
        session: &mut Session,
        tracks: &[LocalTrack],
    ) -> Result<Arc<dyn PeerConnection>> {
        if let Some(old) = session.peer.take() {
            info!(member = %session.member_id, "renegotiating, replacing peer connection");
            if let Err(e) = old.close().await {
                warn!(member = %session.member_id, error = %e, "closing replaced peer connection failed");
            }
        }
        session.remote_stream.clear();
        session.local_candidates.clear();
        session.state = NegotiationState::Idle;
        session.started_at = Utc::now();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        session.generation = generation;

        let pc = self.connector.connect(&session.member_id).await?;
        if let Err(e) = attach_tracks(pc.as_ref(), tracks).await {
            // соединение ещё ничьё: закрываем сами
            if let Err(close_err) = pc.close().await {
                warn!(member = %session.member_id, error = %close_err, "closing half-built peer connection failed");
            }
            return Err(e);
        }

        let member = session.member_id.clone();
        let tx = self.events.clone();
        pc.on_track(Box::new(move |track| {
            let _ = tx.send(PeerEvent {
                member_id: member.clone(),
                generation,
                kind: PeerEventKind::RemoteTrack(track),
            });
        }));

        let member = session.member_id.clone();
        let tx = self.events.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            let _ = tx.send(PeerEvent {
                member_id: member.clone(),
                generation,
                kind: PeerEventKind::LocalCandidate(candidate),
            });
        }));

        let member = session.member_id.clone();
        let tx = self.events.clone();
        pc.on_connection_state_change(Box::new(move |state| {
            let _ = tx.send(PeerEvent {
                member_id: member.clone(),
                generation,
                kind: PeerEventKind::State(state),
            });
        }));

        session.peer = Some(pc.clone());
        Ok(pc)
    }

    /// Сторона A: создаём offer и отправляем его вошедшему участнику
    pub async fn begin_as_initiator(
        &self,
        session: &mut Session,
        tracks: &[LocalTrack],
    ) -> Result<()> {
        session.role = Role::Initiator;
        let pc = self.open_peer(session, tracks).await?;

        let offer = pc.create_offer().await?;
        pc.set_local_description(offer.clone()).await?;
        session.state = NegotiationState::OfferCreated;
        debug!(member = %session.member_id, "offer committed as local description");

        self.send(&session.member_id, &NegotiationMessage::Offer { offer })
            .await;
        Ok(())
    }

    /// Сторона B: применяем offer, создаём answer и отправляем обратно
    pub async fn begin_as_responder(
        &self,
        session: &mut Session,
        tracks: &[LocalTrack],
        remote_offer: SessionDescription,
    ) -> Result<()> {
        if remote_offer.sdp_type != SdpType::Offer {
            return Err(Error::Peer(format!(
                "expected an offer from {}, got {:?}",
                session.member_id, remote_offer.sdp_type
            )));
        }
        session.role = Role::Responder;
        let pc = self.open_peer(session, tracks).await?;

        // для A local = offer, remote = answer; для B наоборот
        pc.set_remote_description(remote_offer).await?;
        let answer = pc.create_answer().await?;
        pc.set_local_description(answer.clone()).await?;
        session.state = NegotiationState::AnswerCreated;
        debug!(member = %session.member_id, "answer committed as local description");

        self.send(&session.member_id, &NegotiationMessage::Answer { answer })
            .await;
        Ok(())
    }

    /// Применяет answer, только если remote description ещё не установлен.
    /// Возвращает `true`, если answer был применён.
    pub async fn apply_answer(
        &self,
        session: &mut Session,
        remote_answer: SessionDescription,
    ) -> Result<bool> {
        if remote_answer.sdp_type != SdpType::Answer {
            return Err(Error::Peer(format!(
                "expected an answer from {}, got {:?}",
                session.member_id, remote_answer.sdp_type
            )));
        }
        let Some(pc) = session.peer.clone() else {
            warn!(member = %session.member_id, "answer received without a peer connection");
            return Ok(false);
        };
        if pc.has_remote_description().await {
            debug!(member = %session.member_id, "remote description already set, answer ignored");
            return Ok(false);
        }
        pc.set_remote_description(remote_answer).await?;
        session.state = NegotiationState::AnswerReceived;
        Ok(true)
    }

    /// Добавляет удалённый кандидат, если peer connection уже есть.
    /// Кандидаты без соединения отбрасываются, не буферизуются.
    pub async fn apply_candidate(
        &self,
        session: &mut Session,
        candidate: IceCandidate,
    ) -> Result<bool> {
        let Some(pc) = session.peer.clone() else {
            debug!(member = %session.member_id, "no peer connection, candidate dropped");
            return Ok(false);
        };
        pc.add_ice_candidate(candidate).await?;
        Ok(true)
    }

    /// Обрабатывает событие peer connection; события заменённых соединений
    /// игнорируются.
    pub async fn handle_peer_event(
        &self,
        session: &mut Session,
        event: PeerEvent,
    ) -> Option<SessionEvent> {
        if event.generation != session.generation || session.state.is_closed() {
            debug!(member = %event.member_id, generation = event.generation, "stale peer event dropped");
            return None;
        }

        match event.kind {
            PeerEventKind::LocalCandidate(candidate) => {
                session.local_candidates.push(candidate.clone());
                self.send(
                    &session.member_id,
                    &NegotiationMessage::Candidate { candidate },
                )
                .await;
                None
            }
            PeerEventKind::RemoteTrack(track) => {
                let track_id = track.id.clone();
                let kind = track.kind;
                session.remote_stream.add_track(track).then(|| {
                    debug!(member = %session.member_id, track = %track_id, "remote track added");
                    SessionEvent::RemoteTrack {
                        member_id: session.member_id.clone(),
                        track_id,
                        kind,
                    }
                })
            }
            PeerEventKind::State(TransportState::Connected) => {
                if !session.state.can_connect() {
                    debug!(member = %session.member_id, state = %session.state, "connected report ignored");
                    return None;
                }
                session.state = NegotiationState::Connected;
                info!(member = %session.member_id, role = ?session.role, "peer connected");
                analyze_candidates(&session.local_candidates);
                Some(SessionEvent::PeerConnected {
                    member_id: session.member_id.clone(),
                })
            }
            PeerEventKind::State(state @ (TransportState::Disconnected | TransportState::Failed)) => {
                warn!(member = %session.member_id, ?state, "connection problem");
                Some(SessionEvent::ConnectionProblem {
                    member_id: session.member_id.clone(),
                })
            }
            PeerEventKind::State(state) => {
                debug!(member = %session.member_id, ?state, "transport state");
                None
            }
        }
    }

    /// Закрывает соединение и очищает удалённый поток
    pub async fn close(&self, session: &mut Session) {
        if let Some(pc) = session.peer.take() {
            if let Err(e) = pc.close().await {
                warn!(member = %session.member_id, error = %e, "peer connection close failed");
            }
        }
        session.remote_stream.clear();
        session.state = NegotiationState::Closed;
        let lasted = Utc::now() - session.started_at;
        info!(member = %session.member_id, seconds = lasted.num_seconds(), "session closed");
    }

    /// Ошибки доставки только логируются
    async fn send(&self, member_id: &str, msg: &NegotiationMessage) {
        let payload = match msg.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(member = %member_id, error = %e, "failed to encode {} message", msg.kind());
                return;
            }
        };
        if let Err(e) = self.channel.send_to_member(member_id, payload).await {
            warn!(member = %member_id, error = %e, "failed to deliver {} message", msg.kind());
        }
    }
}

async fn attach_tracks(pc: &dyn PeerConnection, tracks: &[LocalTrack]) -> Result<()> {
    for track in tracks {
        pc.add_track(track).await?;
    }
    Ok(())
}
