//! Control-document handling for the CoT stream.
//!
//! Every framed document is either protocol-internal (keepalive request,
//! server version announcement) or application data. Classification looks
//! only at the `type` attribute; the reaction is computed here and executed
//! by the session.

use tracing::warn;

use super::{TYPE_KEEPALIVE_REQUEST, TYPE_VERSION_ANNOUNCE};
use crate::cot::CotEvent;

/// Required reaction to one framed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Queue this reply on the connection; do not forward the request.
    Reply(CotEvent),
    /// Record the announced server version; do not forward.
    ServerVersion(String),
    /// Forward to consumers as an application document.
    Forward(CotEvent),
    /// Drop the document (malformed); the stream continues unaffected.
    Discard,
}

/// Classify one framed document and compute the reaction.
///
/// Faults are strictly per-document: invalid UTF-8, malformed XML, or a
/// version announcement missing its nested field discard only that
/// document, leaving the connection and any following documents untouched.
pub fn classify(raw: &[u8]) -> Reaction {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "discarding document with invalid UTF-8");
            return Reaction::Discard;
        }
    };

    let event = match CotEvent::from_xml(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, document = text, "discarding malformed document");
            return Reaction::Discard;
        }
    };

    match event.event_type() {
        TYPE_KEEPALIVE_REQUEST => Reaction::Reply(CotEvent::ping()),
        TYPE_VERSION_ANNOUNCE => match event.server_version() {
            Some(version) => Reaction::ServerVersion(version),
            None => {
                warn!(document = text, "version announcement without server version");
                Reaction::Discard
            }
        },
        _ => Reaction::Forward(event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_request_yields_reply() {
        let reaction = classify(br#"<event type="t-x-c-t-r" uid="ping"/>"#);

        match reaction {
            Reaction::Reply(pong) => {
                assert_eq!(pong.event_type(), "t-x-c-t");
                assert_eq!(pong.uid(), Some("takPong"));
                assert!(pong.as_xml().ends_with("/>"));
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn test_version_announcement_is_captured() {
        let doc = br#"<event version="2.0" uid="takserver" type="t-x-takp-v"><detail><TakControl><TakServerVersionInfo serverVersion="5.4"/></TakControl></detail></event>"#;

        assert_eq!(
            classify(doc),
            Reaction::ServerVersion("5.4".to_string())
        );
    }

    #[test]
    fn test_version_announcement_missing_field_is_discarded() {
        let doc = br#"<event uid="takserver" type="t-x-takp-v"><detail/></event>"#;
        assert_eq!(classify(doc), Reaction::Discard);
    }

    #[test]
    fn test_application_document_is_forwarded() {
        let doc = br#"<event type="a-f-G" uid="ANDROID-1"><point lat="1" lon="2"/></event>"#;

        match classify(doc) {
            Reaction::Forward(event) => {
                assert_eq!(event.event_type(), "a-f-G");
                assert_eq!(event.as_xml().as_bytes(), doc.as_slice());
            }
            other => panic!("expected Forward, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document_is_discarded() {
        assert_eq!(classify(b"<event type=\"a\" uid=></event>"), Reaction::Discard);
        assert_eq!(classify(b"<event uid=\"no-type\"/>"), Reaction::Discard);
        assert_eq!(classify(&[0x80, 0x81]), Reaction::Discard);
    }

    #[test]
    fn test_fault_isolation_across_documents() {
        // Valid A, malformed B, valid C: exactly A and C survive, in order.
        let mut buf = super::super::FrameBuffer::new();
        buf.extend(br#"<event type="a-f-G" uid="A"/><event uid="B"></event><event type="a-h-G" uid="C"/>"#);

        let mut forwarded = Vec::new();
        while let Some(doc) = buf.next_document() {
            if let Reaction::Forward(event) = classify(&doc) {
                forwarded.push(event.uid().unwrap().to_string());
            }
        }

        assert_eq!(forwarded, vec!["A", "C"]);
    }
}
