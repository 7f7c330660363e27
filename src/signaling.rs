use crate::error::Result;
use crate::peer::types::{IceCandidate, MemberId, SessionDescription};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Сообщение переговоров, которое ходит через канал сигнализации.
///
/// На проводе это JSON с полем `type`, совместимый с браузерной стороной:
/// `{"type":"offer","offer":{"type":"offer","sdp":"..."}}`.
/// Неизвестный `type` разбирается в [`NegotiationMessage::Unknown`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NegotiationMessage {
    Offer { offer: SessionDescription },
    Answer { answer: SessionDescription },
    Candidate { candidate: IceCandidate },
    #[serde(other)]
    Unknown,
}

impl NegotiationMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NegotiationMessage::Offer { .. } => "offer",
            NegotiationMessage::Answer { .. } => "answer",
            NegotiationMessage::Candidate { .. } => "candidate",
            NegotiationMessage::Unknown => "unknown",
        }
    }
}

/// События канала, доставляемые контроллеру
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    MemberJoined(MemberId),
    MemberLeft(MemberId),
    Message { payload: String, from: MemberId },
}

/// Канал сигнализации: адресная доставка текстовых сообщений между
/// участниками комнаты. События приходят через отдельный приёмник,
/// который отдаёт реализация при создании канала.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    fn member_id(&self) -> &str;
    async fn join(&self) -> Result<()>;
    async fn leave(&self) -> Result<()>;
    async fn logout(&self) -> Result<()>;
    async fn send_to_member(&self, member_id: &str, payload: String) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn offer_wire_format() {
        let msg = NegotiationMessage::Offer {
            offer: SessionDescription::offer("O1"),
        };
        assert_eq!(
            msg.encode().unwrap(),
            r#"{"type":"offer","offer":{"type":"offer","sdp":"O1"}}"#
        );
    }

    #[test]
    fn browser_candidate_message_decodes() {
        let raw = r#"{"type":"candidate","candidate":{"candidate":"candidate:1 1 udp 1 10.0.0.1 9 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        match NegotiationMessage::decode(raw).unwrap() {
            NegotiationMessage::Candidate { candidate } => {
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_mline_index, Some(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = NegotiationMessage::decode(r#"{"type":"bye","reason":"x"}"#).unwrap();
        assert_eq!(msg, NegotiationMessage::Unknown);
    }

    #[test]
    fn malformed_payloads_fail() {
        for raw in ["not json", r#"{"offer":{}}"#, r#"{"type":"answer"}"#] {
            assert!(matches!(
                NegotiationMessage::decode(raw),
                Err(Error::Codec(_))
            ));
        }
    }
}
