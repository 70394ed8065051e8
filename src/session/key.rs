//! Namespaced session keys.

// self
use crate::_prelude::*;

const SEPARATOR: char = ':';
const ESCAPE: char = '\\';

/// Session-store key qualified by broker identity.
///
/// Renders as `"{namespace}:{field}"`. Separator and escape characters inside either component
/// are backslash-escaped, so two different `(namespace, field)` pairs never render to the same
/// key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);
impl SessionKey {
	/// Builds the namespaced key for `field` under `namespace`.
	pub fn new(namespace: &str, field: &str) -> Self {
		let mut rendered = String::with_capacity(namespace.len() + field.len() + 1);

		push_escaped(&mut rendered, namespace);
		rendered.push(SEPARATOR);
		push_escaped(&mut rendered, field);

		Self(rendered)
	}

	/// Rendered key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for SessionKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SessionKey({})", self.0)
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn push_escaped(buf: &mut String, component: &str) {
	for ch in component.chars() {
		if ch == SEPARATOR || ch == ESCAPE {
			buf.push(ESCAPE);
		}

		buf.push(ch);
	}
}
