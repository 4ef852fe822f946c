/*!
 * Failure Message Prefixes
 */

use std::borrow::Cow;
use std::fmt;

/// Caller-supplied prefix for a timeout failure
///
/// A [`Message::Supplier`] is evaluated only when a failure is actually
/// reported, never when the work finishes within budget.
#[derive(Default)]
pub enum Message<'a> {
    #[default]
    None,
    Literal(Cow<'a, str>),
    Supplier(Box<dyn FnOnce() -> String + 'a>),
}

impl<'a> Message<'a> {
    /// Lazily-evaluated message
    pub fn supplier(supplier: impl FnOnce() -> String + 'a) -> Self {
        Self::Supplier(Box::new(supplier))
    }

    /// Produce the prefix text; blank messages yield no prefix
    pub fn resolve(self) -> Option<String> {
        let text = match self {
            Self::None => return None,
            Self::Literal(text) => text.into_owned(),
            Self::Supplier(supplier) => supplier(),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

impl<'a> From<&'a str> for Message<'a> {
    fn from(text: &'a str) -> Self {
        Self::Literal(Cow::Borrowed(text))
    }
}

impl From<String> for Message<'_> {
    fn from(text: String) -> Self {
        Self::Literal(Cow::Owned(text))
    }
}

impl<'a, T> From<Option<T>> for Message<'a>
where
    T: Into<Message<'a>>,
{
    fn from(message: Option<T>) -> Self {
        message.map(Into::into).unwrap_or_default()
    }
}
