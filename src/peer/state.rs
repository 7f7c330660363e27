use std::fmt;

/// Роль стороны в переговорах
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Создаёт offer, когда в канал входит участник
    Initiator,
    /// Отвечает answer на полученный offer
    Responder,
}

/// Состояние переговоров одной сессии.
///
/// Инициатор: `Idle -> OfferCreated -> AnswerReceived -> Connected`.
/// Отвечающий: `Idle -> AnswerCreated -> Connected`.
/// `Closed` достижим из любого состояния и конечен.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    AnswerReceived,
    AnswerCreated,
    Connected,
    Closed,
}

impl NegotiationState {
    /// Обе половины SDP уже применены
    pub fn can_connect(self) -> bool {
        matches!(
            self,
            NegotiationState::AnswerReceived | NegotiationState::AnswerCreated
        )
    }

    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::OfferCreated => "offer-created",
            NegotiationState::AnswerReceived => "answer-received",
            NegotiationState::AnswerCreated => "answer-created",
            NegotiationState::Connected => "connected",
            NegotiationState::Closed => "closed",
        };
        f.write_str(name)
    }
}
