//! Translation of native host events into EVM logs.
//!
//! A host module reports what happened as a [`NativeEvent`]: a kind plus
//! string attributes. Dynamic precompiles declare matching ABI events; the
//! translator maps the kind to the event, parses every attribute by its ABI
//! type and lays the values out as topics and data the way a contract
//! emitting that event would.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_dyn_abi::{DynSolValue, Specifier};
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use strata_types::Log;
use tracing::trace;

use crate::error::VmError;

/// Parses one attribute value from its string form.
pub type ValueDecoder = Arc<dyn Fn(&str) -> Result<DynSolValue, VmError> + Send + Sync>;

/// An event emitted by a native host module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeEvent {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl NativeEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// First value recorded under `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Convert a `CamelCase` or `camelCase` name to `snake_case`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Event-to-log translation for one dynamic precompile.
#[derive(Clone)]
pub struct EventTranslator {
    address: Address,
    events: HashMap<String, Event>,
    decoders: HashMap<String, ValueDecoder>,
}

impl EventTranslator {
    /// Index the events of `abi` by native event kind.
    pub fn new(address: Address, abi: &JsonAbi, decoders: HashMap<String, ValueDecoder>) -> Self {
        let events = abi
            .events()
            .map(|event| (snake_case(&event.name), event.clone()))
            .collect();
        Self {
            address,
            events,
            decoders,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether native events of `kind` are translated.
    pub fn handles(&self, kind: &str) -> bool {
        self.events.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Translate `native` into a log, or `None` if its kind is not declared.
    ///
    /// # Errors
    /// Fails if an attribute named by the ABI event is missing or cannot be
    /// parsed as its declared type.
    pub fn translate(&self, native: &NativeEvent) -> Result<Option<Log>, VmError> {
        let Some(event) = self.events.get(&native.kind) else {
            trace!(kind = %native.kind, "No log translation for native event");
            return Ok(None);
        };

        let mut topics = Vec::with_capacity(4);
        if !event.anonymous {
            topics.push(event.selector());
        }
        let mut data = Vec::new();

        for input in &event.inputs {
            let key = snake_case(&input.name);
            let raw = native
                .attribute(&key)
                .ok_or_else(|| VmError::MissingEventAttribute {
                    event: event.name.clone(),
                    attribute: key.clone(),
                })?;

            let value = match self.decoders.get(&key) {
                Some(decode) => decode(raw)?,
                None => input
                    .resolve()
                    .and_then(|ty| ty.coerce_str(raw))
                    .map_err(|e| VmError::Codec(format!("{}.{key}: {e}", event.name)))?,
            };

            if input.indexed {
                let topic = topic_for(&value).ok_or_else(|| {
                    VmError::Codec(format!(
                        "{}.{key}: indexed {} cannot be a topic",
                        event.name, input.ty
                    ))
                })?;
                topics.push(topic);
            } else {
                data.push(value);
            }
        }

        let data = if data.is_empty() {
            Bytes::new()
        } else {
            Bytes::from(DynSolValue::Tuple(data).abi_encode_params())
        };
        Ok(Some(Log::new(self.address, topics, data)))
    }
}

/// Value types fit in a topic as-is. Strings and bytes are hashed raw and
/// arrays of value types are hashed as their padded words. Structs and
/// nested arrays have no supported topic form.
fn topic_for(value: &DynSolValue) -> Option<B256> {
    match value {
        DynSolValue::String(s) => Some(keccak256(s.as_bytes())),
        DynSolValue::Bytes(b) => Some(keccak256(b)),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let mut words = Vec::with_capacity(items.len() * 32);
            for item in items {
                words.extend_from_slice(item.as_word()?.as_slice());
            }
            Some(keccak256(words))
        }
        other => other.as_word(),
    }
}

impl fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.events.keys().collect();
        kinds.sort();
        f.debug_struct("EventTranslator")
            .field("address", &self.address)
            .field("kinds", &kinds)
            .field("decoders", &self.decoders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn abi() -> JsonAbi {
        JsonAbi::parse([
            "event Transfer(address indexed from, address indexed to, uint256 amount)",
            "event MemoSet(string indexed memo, uint64 creationHeight)",
        ])
        .unwrap()
    }

    fn translator() -> EventTranslator {
        EventTranslator::new(Address::with_last_byte(0x69), &abi(), HashMap::new())
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("CancelUnbondingDelegation"), "cancel_unbonding_delegation");
        assert_eq!(snake_case("creationHeight"), "creation_height");
        assert_eq!(snake_case("Transfer"), "transfer");
        assert_eq!(snake_case("amount"), "amount");
    }

    #[test]
    fn test_native_event_attribute_lookup() {
        let event = NativeEvent::new("transfer")
            .with_attribute("amount", "1")
            .with_attribute("amount", "2");
        assert_eq!(event.attribute("amount"), Some("1"));
        assert_eq!(event.attribute("memo"), None);
    }

    #[test]
    fn test_translate_indexed_and_data() {
        let from = Address::with_last_byte(1);
        let to = Address::with_last_byte(2);
        let native = NativeEvent::new("transfer")
            .with_attribute("from", from.to_string())
            .with_attribute("to", to.to_string())
            .with_attribute("amount", "1000");

        let log = translator().translate(&native).unwrap().unwrap();
        assert_eq!(log.address, Address::with_last_byte(0x69));
        assert_eq!(log.topics.len(), 3);
        assert_eq!(log.topics[0], keccak256("Transfer(address,address,uint256)"));
        assert_eq!(log.topics[1], from.into_word());
        assert_eq!(log.topics[2], to.into_word());
        assert_eq!(log.data.as_ref(), &U256::from(1000).to_be_bytes::<32>()[..]);
    }

    #[test]
    fn test_translate_hashes_dynamic_indexed_values() {
        let native = NativeEvent::new("memo_set")
            .with_attribute("memo", "hello")
            .with_attribute("creation_height", "42");

        let log = translator().translate(&native).unwrap().unwrap();
        assert_eq!(log.topics[1], keccak256("hello"));
        assert_eq!(log.data.len(), 32);
        assert_eq!(log.data[31], 42);
    }

    #[test]
    fn test_translate_unknown_kind_is_skipped() {
        let native = NativeEvent::new("unbond");
        assert_eq!(translator().translate(&native).unwrap(), None);
        assert!(!translator().handles("unbond"));
        assert_eq!(translator().len(), 2);
    }

    #[test]
    fn test_translate_missing_attribute() {
        let native = NativeEvent::new("memo_set").with_attribute("memo", "hello");
        let err = translator().translate(&native).unwrap_err();
        assert_eq!(
            err,
            VmError::MissingEventAttribute {
                event: "MemoSet".to_string(),
                attribute: "creation_height".to_string(),
            }
        );
    }

    #[test]
    fn test_translate_with_value_decoder() {
        let mut decoders: HashMap<String, ValueDecoder> = HashMap::new();
        decoders.insert(
            "amount".to_string(),
            Arc::new(|raw: &str| {
                let digits = raw.trim_end_matches(|c: char| c.is_ascii_alphabetic());
                digits
                    .parse::<u64>()
                    .map(|n| DynSolValue::Uint(U256::from(n), 256))
                    .map_err(|e| VmError::Codec(e.to_string()))
            }),
        );
        let translator = EventTranslator::new(Address::with_last_byte(0x69), &abi(), decoders);
        let native = NativeEvent::new("transfer")
            .with_attribute("from", Address::with_last_byte(1).to_string())
            .with_attribute("to", Address::with_last_byte(2).to_string())
            .with_attribute("amount", "250stake");

        let log = translator.translate(&native).unwrap().unwrap();
        assert_eq!(log.data[31], 250);
    }

    #[test]
    fn test_indexed_arrays() {
        let abi = JsonAbi::parse([
            "event Batch(uint256[] indexed ids)",
            "event Grid(uint256[][] indexed cells)",
        ])
        .unwrap();
        let translator = EventTranslator::new(Address::with_last_byte(0x69), &abi, HashMap::new());

        let log = translator
            .translate(&NativeEvent::new("batch").with_attribute("ids", "[1, 2]"))
            .unwrap()
            .unwrap();
        let mut words = U256::from(1).to_be_bytes::<32>().to_vec();
        words.extend_from_slice(&U256::from(2).to_be_bytes::<32>());
        assert_eq!(log.topics[1], keccak256(words));

        let err = translator
            .translate(&NativeEvent::new("grid").with_attribute("cells", "[[1], [2]]"))
            .unwrap_err();
        assert!(matches!(err, VmError::Codec(msg) if msg.contains("cannot be a topic")));
    }

    #[test]
    fn test_translate_unparseable_value() {
        let native = NativeEvent::new("transfer")
            .with_attribute("from", "not-an-address")
            .with_attribute("to", Address::with_last_byte(2).to_string())
            .with_attribute("amount", "1");
        assert!(matches!(
            translator().translate(&native),
            Err(VmError::Codec(_))
        ));
    }
}
