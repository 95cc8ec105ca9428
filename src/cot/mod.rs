//! Cursor-on-Target (CoT) document model.
//!
//! A CoT document is a single `<event>` XML element. This module parses the
//! handful of fields the protocol core needs (the `type` and `uid`
//! attributes, and the server version carried inside a version
//! announcement), composes the keepalive reply, and serializes documents for
//! the wire. The full detail payload is opaque to this crate: documents are
//! forwarded to consumers with their raw XML intact.

use chrono::{SecondsFormat, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, TakError};

/// Declaration header prefixed to every outbound document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// One framed CoT document.
///
/// Holds the raw XML span exactly as it appeared on the wire alongside the
/// parsed routing attributes. Cloning is cheap enough for dispatch; documents
/// are transient and not retained after delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CotEvent {
    /// Raw XML of the document, without declaration header.
    xml: String,
    /// Value of the `type` attribute.
    event_type: String,
    /// Value of the `uid` attribute, if present.
    uid: Option<String>,
}

impl CotEvent {
    /// Parse a framed document.
    ///
    /// The input must be a single well-formed `<event>` element (paired or
    /// self-closing). The routing attributes are extracted; the detail
    /// payload is checked for well-formedness but otherwise left opaque.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        // Locate the root element
        let (root, self_closing) = loop {
            match reader.read_event() {
                Ok(Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_)) => {
                    continue;
                }
                Ok(Event::Text(t)) => {
                    // Inter-document whitespace; anything else is stray text
                    if t.into_inner().iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    return Err(TakError::Document(
                        "text content before root element".to_string(),
                    ));
                }
                Ok(Event::Start(e)) => break (e, false),
                Ok(Event::Empty(e)) => break (e, true),
                Ok(Event::End(_)) => {
                    return Err(TakError::Document(
                        "close tag before root element".to_string(),
                    ));
                }
                Ok(Event::CData(_)) => {
                    return Err(TakError::Document("CDATA before root element".to_string()));
                }
                Ok(Event::Eof) => {
                    return Err(TakError::Document("empty document".to_string()));
                }
                Err(e) => {
                    return Err(TakError::Document(e.to_string()));
                }
            }
        };

        if root.name().local_name().as_ref() != b"event" {
            return Err(TakError::Document(format!(
                "root element is <{}>, expected <event>",
                String::from_utf8_lossy(root.name().as_ref())
            )));
        }

        let mut event_type = None;
        let mut uid = None;
        for attr in root.attributes() {
            let attr = attr.map_err(|e| TakError::Document(format!("bad attribute: {e}")))?;
            match attr.key.as_ref() {
                b"type" => {
                    event_type = Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                b"uid" => {
                    uid = Some(String::from_utf8_lossy(&attr.value).into_owned());
                }
                _ => {}
            }
        }

        let event_type = event_type.ok_or_else(|| {
            TakError::Document("event is missing the type attribute".to_string())
        })?;

        // A paired root must parse through to its close tag: a mangled
        // payload fails the whole document, not the consumer downstream
        if !self_closing {
            loop {
                match reader.read_event() {
                    Ok(Event::Eof) => break,
                    Ok(_) => continue,
                    Err(e) => return Err(TakError::Document(e.to_string())),
                }
            }
        }

        Ok(Self {
            xml: xml.to_string(),
            event_type,
            uid,
        })
    }

    /// Compose the payload-free keepalive reply.
    ///
    /// All three timestamps are "now": the reply carries no liveness window
    /// of its own, it only proves the connection is still being serviced.
    pub fn ping() -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let xml = format!(
            r#"<event version="2.0" uid="takPong" type="{}" how="h-g-i-g-o" time="{now}" start="{now}" stale="{now}"/>"#,
            crate::protocol::TYPE_KEEPALIVE_REPLY
        );

        Self {
            xml,
            event_type: crate::protocol::TYPE_KEEPALIVE_REPLY.to_string(),
            uid: Some("takPong".to_string()),
        }
    }

    /// Value of the `type` attribute.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Value of the `uid` attribute, if the document carries one.
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// Raw XML of the document, exactly as framed.
    pub fn as_xml(&self) -> &str {
        &self.xml
    }

    /// Serialize for the wire: declaration header, newline, document.
    pub fn to_wire(&self) -> String {
        format!("{XML_DECLARATION}\n{}", self.xml)
    }

    /// Server version carried by a version announcement.
    ///
    /// Reads `detail/TakControl/TakServerVersionInfo/@serverVersion`.
    /// Returns `None` when the document does not carry the nested control
    /// field (including on non-announcement documents).
    pub fn server_version(&self) -> Option<String> {
        let mut reader = Reader::from_str(&self.xml);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e)) => {
                    if e.name().local_name().as_ref() != b"TakServerVersionInfo" {
                        continue;
                    }
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"serverVersion" {
                            return Some(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                    return None;
                }
                Ok(Event::Eof) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }
}

impl std::fmt::Display for CotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paired_event() {
        let xml = r#"<event version="2.0" uid="ANDROID-1" type="a-f-G"><point lat="1" lon="2" hae="0" ce="10" le="10"/></event>"#;
        let event = CotEvent::from_xml(xml).unwrap();

        assert_eq!(event.event_type(), "a-f-G");
        assert_eq!(event.uid(), Some("ANDROID-1"));
        assert_eq!(event.as_xml(), xml);
    }

    #[test]
    fn test_parse_self_closing_event() {
        let event = CotEvent::from_xml(r#"<event type="t-x-c-t-r" uid="ping"/>"#).unwrap();
        assert_eq!(event.event_type(), "t-x-c-t-r");
        assert_eq!(event.uid(), Some("ping"));
    }

    #[test]
    fn test_parse_missing_type_attribute() {
        let result = CotEvent::from_xml(r#"<event uid="no-type"/>"#);
        assert!(matches!(result, Err(TakError::Document(_))));
    }

    #[test]
    fn test_parse_wrong_root_element() {
        let result = CotEvent::from_xml("<point lat='1' lon='2'/>");
        assert!(matches!(result, Err(TakError::Document(_))));
    }

    #[test]
    fn test_parse_malformed_xml() {
        assert!(CotEvent::from_xml("<event type='a'").is_err());
        assert!(CotEvent::from_xml("").is_err());
        assert!(CotEvent::from_xml("</event>").is_err());
    }

    #[test]
    fn test_parse_mangled_payload_fails_the_document() {
        // Correctly framed, but the payload never closes <detail>
        assert!(CotEvent::from_xml(r#"<event type="a"><detail></event>"#).is_err());
    }

    #[test]
    fn test_ping_shape() {
        let ping = CotEvent::ping();

        assert_eq!(ping.event_type(), "t-x-c-t");
        assert_eq!(ping.uid(), Some("takPong"));
        // Payload-free: a single self-closing element
        assert!(ping.as_xml().ends_with("/>"));
        assert!(!ping.as_xml().contains("<point"));
        assert!(!ping.as_xml().contains("<detail"));
        // Round-trips through the parser
        CotEvent::from_xml(ping.as_xml()).unwrap();
    }

    #[test]
    fn test_wire_serialization() {
        let event = CotEvent::from_xml(r#"<event type="a-f-G" uid="u"/>"#).unwrap();
        let wire = event.to_wire();

        assert!(wire.starts_with(XML_DECLARATION));
        assert!(wire.ends_with(r#"<event type="a-f-G" uid="u"/>"#));
    }

    #[test]
    fn test_server_version_extraction() {
        let xml = r#"<event version="2.0" uid="takserver" type="t-x-takp-v" how="h-g-i-g-o"><detail><TakControl><TakServerVersionInfo serverVersion="5.4" apiVersion="3"/></TakControl></detail></event>"#;
        let event = CotEvent::from_xml(xml).unwrap();

        assert_eq!(event.server_version(), Some("5.4".to_string()));
    }

    #[test]
    fn test_server_version_missing_field() {
        let xml = r#"<event uid="takserver" type="t-x-takp-v"><detail><TakControl/></detail></event>"#;
        let event = CotEvent::from_xml(xml).unwrap();

        assert_eq!(event.server_version(), None);
    }

    #[test]
    fn test_server_version_on_application_event() {
        let event = CotEvent::from_xml(r#"<event type="a-f-G" uid="u"/>"#).unwrap();
        assert_eq!(event.server_version(), None);
    }
}
