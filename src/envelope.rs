//! Response envelope - the JSON contract for every asynchronous exchange
//!
//! Every request a component makes is answered with the same shape:
//!
//! ```text
//! {"status":true,"content":"<div>..</div>","isScript":false,"elementId":"0",
//!  <extra keys...>, "event":{"name":"..","data":{..}}}
//! ```
//!
//! `status == false` is a handled failure: `content` then carries the
//! server's explanation. A body that doesn't parse is a transport failure and
//! is reported through a different error (see `crate::error`).

use crate::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys owned by the envelope itself. Extra attributes may not use them.
pub const RESERVED_KEYS: [&str; 5] = ["status", "content", "isScript", "elementId", "event"];

/// `elementId` value meaning "no specific target".
pub const NO_ELEMENT: &str = "0";

fn no_element() -> String {
    NO_ELEMENT.to_string()
}

/// Out-of-band signal the client re-dispatches on the component's event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEvent {
    pub name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// A parsed (or about to be encoded) server response
///
/// Field order is the wire order. The extra attributes are flattened in
/// between `elementId` and `event`, in the order the server wrote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    status: bool,
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_script: bool,
    #[serde(default = "no_element")]
    element_id: String,
    #[serde(flatten)]
    additional_attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<EnvelopeEvent>,
}

/// What handling an envelope amounts to, before any side effect happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `status == false`; the message must be surfaced, nothing else runs
    Failure(&'a str),
    /// Content is script to execute in the page
    Script(&'a str),
    /// Replace a region; `None` means the caller's default region
    Replace {
        region: Option<&'a str>,
        markup: &'a str,
    },
    /// Empty content: terminal success, no DOM change
    Terminal,
}

impl Envelope {
    /// Successful envelope with the given content and no target region
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            status: true,
            content: content.into(),
            is_script: false,
            element_id: no_element(),
            additional_attributes: Map::new(),
            event: None,
        }
    }

    /// Failed envelope carrying a human-readable explanation
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            ..Self::success(message)
        }
    }

    /// Mark the content as script rather than markup
    pub fn as_script(mut self) -> Self {
        self.is_script = true;
        self
    }

    /// Target a specific DOM region
    pub fn with_element_id(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = element_id.into();
        self
    }

    /// Attach an extra top-level attribute
    ///
    /// Fails if the key is one of [`RESERVED_KEYS`].
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, EnvelopeError> {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return Err(EnvelopeError::ReservedKey(key));
        }
        self.additional_attributes.insert(key, value.into());
        Ok(self)
    }

    /// Attach the out-of-band event
    pub fn with_event(mut self, name: impl Into<String>, data: Map<String, Value>) -> Self {
        self.event = Some(EnvelopeEvent {
            name: name.into(),
            data,
        });
        self
    }

    /// Parse a response body
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize with the stable key order
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_script(&self) -> bool {
        self.is_script
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// The region to replace, or `None` for the "0" sentinel
    pub fn target_region(&self) -> Option<&str> {
        if self.element_id == NO_ELEMENT {
            None
        } else {
            Some(&self.element_id)
        }
    }

    pub fn additional_attributes(&self) -> &Map<String, Value> {
        &self.additional_attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.additional_attributes.get(key)
    }

    pub fn event(&self) -> Option<&EnvelopeEvent> {
        self.event.as_ref()
    }

    /// Classify the envelope without touching anything
    pub fn route(&self) -> Route<'_> {
        if !self.status {
            Route::Failure(&self.content)
        } else if self.content.is_empty() {
            Route::Terminal
        } else if self.is_script {
            Route::Script(&self.content)
        } else {
            Route::Replace {
                region: self.target_region(),
                markup: &self.content,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encode_matches_wire_order() {
        let data = json!({"eventDataKey": ["item1", "item2"]});
        let envelope = Envelope::success("test content")
            .with_attribute("testObj", json!({"someInt": 5, "someFloat": 5.5}))
            .unwrap()
            .with_event("someEvent", data.as_object().unwrap().clone());

        let expected = concat!(
            r#"{"status":true,"content":"test content","isScript":false,"elementId":"0","#,
            r#""testObj":{"someInt":5,"someFloat":5.5},"#,
            r#""event":{"name":"someEvent","data":{"eventDataKey":["item1","item2"]}}}"#
        );
        assert_eq!(envelope.encode().unwrap(), expected);
    }

    #[test]
    fn test_extra_attributes_keep_insertion_order() {
        let envelope = Envelope::success("")
            .with_attribute("zeta", 1)
            .unwrap()
            .with_attribute("alpha", 2)
            .unwrap();
        let encoded = envelope.encode().unwrap();
        assert!(encoded.find("zeta").unwrap() < encoded.find("alpha").unwrap());
        assert!(!encoded.contains("event"));
    }

    #[test]
    fn test_reserved_attribute_rejected() {
        for key in RESERVED_KEYS {
            let err = Envelope::success("").with_attribute(key, true).unwrap_err();
            assert!(matches!(err, EnvelopeError::ReservedKey(k) if k == key));
        }
    }

    #[test]
    fn test_parse_fills_defaults() {
        let envelope = Envelope::parse(r#"{"status":false,"content":"File too large"}"#).unwrap();
        assert!(!envelope.status());
        assert!(!envelope.is_script());
        assert_eq!(envelope.element_id(), NO_ELEMENT);
        assert!(envelope.event().is_none());
        assert_eq!(envelope.route(), Route::Failure("File too large"));
    }

    #[test]
    fn test_parse_collects_extra_keys() {
        let envelope = Envelope::parse(
            r#"{"status":true,"content":"","isScript":false,"elementId":"0","uploadedFile":{"id":7}}"#,
        )
        .unwrap();
        assert_eq!(envelope.attribute("uploadedFile"), Some(&json!({"id": 7})));
        assert_eq!(envelope.additional_attributes().len(), 1);
        assert_eq!(envelope.route(), Route::Terminal);
    }

    #[test]
    fn test_malformed_bodies_are_errors() {
        for raw in ["", "not json", "[1,2]", r#"{"content":"x"}"#, r#"{"status":"yes"}"#] {
            assert!(
                matches!(Envelope::parse(raw), Err(EnvelopeError::Malformed(_))),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_route_variants() {
        let script = Envelope::success("alert(1)").as_script();
        assert_eq!(script.route(), Route::Script("alert(1)"));

        let targeted = Envelope::success("<p/>").with_element_id("grid-3");
        assert_eq!(
            targeted.route(),
            Route::Replace {
                region: Some("grid-3"),
                markup: "<p/>"
            }
        );

        let failure_with_event = Envelope::failure("nope").with_event("x", Map::new());
        assert_eq!(failure_with_event.route(), Route::Failure("nope"));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,12}".prop_map(Value::from),
            prop::collection::vec(any::<u16>(), 0..4).prop_map(Value::from),
        ]
    }

    fn envelope_strategy() -> impl Strategy<Value = Envelope> {
        (
            any::<bool>(),
            "[ -~]{0,24}",
            any::<bool>(),
            prop_oneof![Just(NO_ELEMENT.to_string()), "[a-z][a-z0-9-]{0,8}"],
            prop::collection::vec(("x[a-zA-Z]{1,8}", value_strategy()), 0..4),
            prop::option::of(("[a-zA-Z]{1,10}", "[a-z]{1,6}", value_strategy())),
        )
            .prop_map(|(status, content, script, element, attrs, event)| {
                let mut envelope = if status {
                    Envelope::success(content)
                } else {
                    Envelope::failure(content)
                }
                .with_element_id(element);
                if script {
                    envelope = envelope.as_script();
                }
                for (key, value) in attrs {
                    envelope = envelope.with_attribute(key, value).unwrap();
                }
                if let Some((name, key, value)) = event {
                    let mut data = Map::new();
                    data.insert(key, value);
                    envelope = envelope.with_event(name, data);
                }
                envelope
            })
    }

    proptest! {
        #[test]
        fn prop_parse_encode_roundtrip(envelope in envelope_strategy()) {
            let encoded = envelope.encode().unwrap();
            prop_assert_eq!(Envelope::parse(&encoded).unwrap(), envelope);
        }
    }
}
