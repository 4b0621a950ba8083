//! Shared macro for implementing `JsErrorClass` for error types

/// Implements `JsErrorClass` so an op error surfaces in script as a regular
/// JS exception carrying the error's `Display` text as its message.
///
/// The optional second argument maps an error value to its JS class name,
/// everything is reported as `Error` otherwise.
///
/// ```ignore
/// impl_js_error_class!(ModuleError, |err| match err {
///     ModuleError::FunctionNotFound { .. } => "TypeError",
///     _ => "Error",
/// });
/// ```
#[macro_export]
macro_rules! impl_js_error_class {
    ($error_type:ty) => {
        $crate::impl_js_error_class!($error_type, |_| "Error");
    };
    ($error_type:ty, $class_of:expr) => {
        impl deno_error::JsErrorClass for $error_type {
            fn get_class(&self) -> std::borrow::Cow<'static, str> {
                let class_of: fn(&$error_type) -> &'static str = $class_of;
                std::borrow::Cow::Borrowed(class_of(self))
            }

            fn get_message(&self) -> std::borrow::Cow<'static, str> {
                std::borrow::Cow::Owned(self.to_string())
            }

            fn get_additional_properties(
                &self,
            ) -> Box<dyn Iterator<Item = (std::borrow::Cow<'static, str>, deno_error::PropertyValue)>>
            {
                Box::new(std::iter::empty())
            }

            fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
                self
            }
        }
    };
}
