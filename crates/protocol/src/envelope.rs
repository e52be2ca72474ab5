use serde::{Deserialize, Serialize};

use crate::constants::EventType;

/// Error reported by the daemon in place of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonError {
    pub code: i32,
    pub message: String,
}

/// Envelope for every frame exchanged with the wallet daemon.
///
/// A response carries the `id` of the request it answers, which lets
/// several calls share one socket. The payload is kept as raw JSON until
/// the caller knows which type to decode it into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub event: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DaemonError>,
}

impl Message {
    /// Creates a new message for `event` with an optional payload.
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        event: EventType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => Some(serde_json::value::to_raw_value(p)?),
            None => None,
        };
        Ok(Self {
            id: id.into(),
            event,
            payload: raw,
            error: None,
        })
    }

    /// Decodes the payload, `None` when the frame carried none.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Builds the response to this request.
    pub fn reply<T: Serialize>(&self, payload: Option<&T>) -> Result<Self, serde_json::Error> {
        Message::new(&self.id, self.event, payload)
    }

    /// Builds an error response to this request.
    pub fn reply_error(&self, code: i32, message: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            event: self.event,
            payload: None,
            error: Some(DaemonError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Authorization;

    #[test]
    fn new_message_carries_payload() {
        let payload = serde_json::json!({"chainId": "abc"});
        let msg = Message::new("m-1", EventType::GetAuthorizations, Some(&payload)).unwrap();
        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.event, EventType::GetAuthorizations);
        assert!(msg.payload.is_some());
        assert!(msg.error.is_none());
    }

    #[test]
    fn empty_message_omits_optional_fields() {
        let msg = Message::new::<()>("m-2", EventType::LogOut, None).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"id":"m-2","event":"log_out"}"#);
    }

    #[test]
    fn reply_keeps_id_and_event() {
        let req = Message::new::<()>("req-7", EventType::IsLoggedIn, None).unwrap();
        let resp = req.reply(Some(&true)).unwrap();
        assert_eq!(resp.id, "req-7");
        assert_eq!(resp.event, EventType::IsLoggedIn);
        assert_eq!(resp.parse_payload::<bool>().unwrap(), Some(true));
    }

    #[test]
    fn reply_error_has_no_payload() {
        let req = Message::new::<()>("req-8", EventType::Transact, None).unwrap();
        let resp = req.reply_error(403, "user declined");
        assert!(resp.payload.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, 403);
        assert_eq!(err.message, "user declined");
    }

    #[test]
    fn parse_payload_decodes_authorizations() {
        let auths = vec![Authorization::new("alice", "active")];
        let text = serde_json::to_string(
            &Message::new("r", EventType::GetAuthorizations, Some(&auths)).unwrap(),
        )
        .unwrap();
        let msg: Message = serde_json::from_str(&text).unwrap();
        let parsed: Vec<Authorization> = msg.parse_payload().unwrap().unwrap();
        assert_eq!(parsed, auths);
    }
}
