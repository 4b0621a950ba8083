use deno_core::v8;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of script value a [`JsValue`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    Function,
    Array,
    Object,
}

impl ValueKind {
    /// Whether values of this kind have members that can be read or called
    pub fn is_object(self) -> bool {
        matches!(self, Self::Function | Self::Array | Self::Object)
    }
}

/// Handle to a value living in an engine.
///
/// The handle keeps the value alive for as long as it exists and is only
/// usable with the engine that produced it; any other engine reports
/// [`HostError::ForeignValue`](crate::HostError::ForeignValue).
pub struct JsValue {
    pub(crate) global: v8::Global<v8::Value>,
    pub(crate) engine_id: u64,
}

impl JsValue {
    pub(crate) fn new(global: v8::Global<v8::Value>, engine_id: u64) -> Self {
        Self { global, engine_id }
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsValue")
            .field("engine_id", &self.engine_id)
            .finish_non_exhaustive()
    }
}

/// A [`JsValue`] known to be an object (plain object, array or function)
#[derive(Debug)]
pub struct JsObject {
    value: JsValue,
}

impl JsObject {
    pub(crate) fn new(value: JsValue) -> Self {
        Self { value }
    }

    pub fn as_value(&self) -> &JsValue {
        &self.value
    }

    pub fn into_value(self) -> JsValue {
        self.value
    }
}

impl AsRef<JsValue> for JsObject {
    fn as_ref(&self) -> &JsValue {
        &self.value
    }
}

impl From<JsObject> for JsValue {
    fn from(object: JsObject) -> Self {
        object.value
    }
}
