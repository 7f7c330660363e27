use crate::error::{Error, Result};
use crate::peer::types::MemberId;
use crate::signaling::{ChannelEvent, SignalingChannel};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

type Rooms = HashMap<String, HashMap<MemberId, mpsc::UnboundedSender<ChannelEvent>>>;

/// Комнаты сигнализации внутри одного процесса
#[derive(Clone, Default)]
pub struct LocalHub {
    rooms: Arc<Mutex<Rooms>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Входит в хаб под `member_id` и открывает канал комнаты `room`
    pub fn channel(
        &self,
        room: impl Into<String>,
        member_id: impl Into<MemberId>,
    ) -> (LocalChannel, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = LocalChannel {
            hub: self.clone(),
            room: room.into(),
            member_id: member_id.into(),
            events: tx,
            logged_in: AtomicBool::new(true),
        };
        (channel, rx)
    }

    pub async fn members(&self, room: &str) -> Vec<MemberId> {
        let rooms = self.rooms.lock().await;
        let mut members: Vec<_> = rooms
            .get(room)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

pub struct LocalChannel {
    hub: LocalHub,
    room: String,
    member_id: MemberId,
    events: mpsc::UnboundedSender<ChannelEvent>,
    logged_in: AtomicBool,
}

impl LocalChannel {
    fn ensure_logged_in(&self) -> Result<()> {
        if self.logged_in.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Signaling(format!("{} is logged out", self.member_id)))
        }
    }
}

#[async_trait]
impl SignalingChannel for LocalChannel {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    async fn join(&self) -> Result<()> {
        self.ensure_logged_in()?;
        let mut rooms = self.hub.rooms.lock().await;
        let room = rooms.entry(self.room.clone()).or_default();
        // MemberJoined получают только остальные участники
        for (id, tx) in room.iter() {
            if *id != self.member_id {
                let _ = tx.send(ChannelEvent::MemberJoined(self.member_id.clone()));
            }
        }
        room.insert(self.member_id.clone(), self.events.clone());
        debug!(room = %self.room, member = %self.member_id, "joined channel");
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let mut rooms = self.hub.rooms.lock().await;
        let Some(room) = rooms.get_mut(&self.room) else {
            return Ok(());
        };
        if room.remove(&self.member_id).is_some() {
            for tx in room.values() {
                let _ = tx.send(ChannelEvent::MemberLeft(self.member_id.clone()));
            }
            debug!(room = %self.room, member = %self.member_id, "left channel");
        }
        if room.is_empty() {
            rooms.remove(&self.room);
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_to_member(&self, member_id: &str, payload: String) -> Result<()> {
        self.ensure_logged_in()?;
        let rooms = self.hub.rooms.lock().await;
        let target = rooms
            .get(&self.room)
            .and_then(|room| room.get(member_id))
            .ok_or_else(|| {
                Error::Signaling(format!("member {member_id} is not in room {}", self.room))
            })?;
        target
            .send(ChannelEvent::Message {
                payload,
                from: self.member_id.clone(),
            })
            .map_err(|_| Error::Signaling(format!("member {member_id} stopped listening")))
    }
}
